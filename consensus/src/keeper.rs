//! Deterministic keeper election
//!
//! The keeper is the single agent allowed to perform external side effects
//! for a period. Every agent computes the keeper locally from the agreed
//! randomness and the sorted participant set, so no further communication is
//! needed and all honest agents land on the same choice.

use tracing::info;

use crate::state::AgentId;

/// Elect the keeper for a period.
///
/// The index is the first eight bytes of the blake3 digest of the agreed
/// randomness, taken modulo the participant count over the sorted list.
/// Returns `None` when no participants are registered.
pub fn select_keeper<'a>(participants: &'a [AgentId], randomness: &str) -> Option<&'a AgentId> {
    if participants.is_empty() {
        return None;
    }

    debug_assert!(participants.windows(2).all(|w| w[0] <= w[1]));

    let digest = blake3::hash(randomness.as_bytes());
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest.as_bytes()[..8]);
    let index = (u64::from_be_bytes(prefix) % participants.len() as u64) as usize;

    let keeper = &participants[index];
    info!(keeper = %keeper, index, "Elected keeper");
    Some(keeper)
}
