//! Rounds of the quorum state machine
//!
//! Each round collects payloads from participants and, once its terminal
//! condition holds, produces a new synchronized snapshot plus a transition
//! event from `end_block`. Until then `end_block` returns `None` and the
//! round stays open for later consensus blocks.
//!
//! The replicated snapshot is mutated only here; behaviours read snapshots
//! and submit proposed payloads.

mod collection;
mod lifecycle;
mod work;

pub use collection::{consensus_threshold, PayloadCollection};
pub use lifecycle::{
    CollectRandomnessRound, RegistrationRound, ResetAndPauseRound, SelectKeeperRound,
};
pub use work::{
    Failure, ProcessPayload, ProcessRequestRound, PublishPayload, PublishResponseRound,
    SyncPayload, WaitForRequestRound,
};

use serde::{Deserialize, Serialize};

use crate::state::{AgentId, SynchronizedData};

/// Transition events a round can emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Event {
    /// Terminal condition satisfied, snapshot updated.
    Done,
    /// Synchronization finished but nothing is pending.
    NoRequest,
    /// Agreement has become impossible for this round.
    NoMajority,
    /// A behaviour-level failure that aborts the period.
    Error,
    /// The round did not finalize within its window.
    RoundTimeout,
    /// The reset round did not finalize within its window.
    ResetTimeout,
}

impl std::fmt::Display for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Event::Done => "done",
            Event::NoRequest => "no_request",
            Event::NoMajority => "no_majority",
            Event::Error => "error",
            Event::RoundTimeout => "round_timeout",
            Event::ResetTimeout => "reset_timeout",
        };
        write!(f, "{name}")
    }
}

/// Errors raised while collecting payloads. None of these mutate the store.
#[derive(Debug, thiserror::Error)]
pub enum RoundError {
    #[error("sender {sender} is not a registered participant")]
    UnknownSender { sender: AgentId },

    #[error("participant {sender} already submitted a payload for this round")]
    DuplicatePayload { sender: AgentId },
}

/// Common surface of all rounds.
pub trait Round {
    /// Payload type collected by this round.
    type Payload;

    /// Accept one participant's payload.
    fn process_payload(
        &mut self,
        data: &SynchronizedData,
        sender: AgentId,
        payload: Self::Payload,
    ) -> Result<(), RoundError>;

    /// Check the terminal condition. Returns the next snapshot and the
    /// transition event once satisfied, `None` while the round stays open.
    fn end_block(&self, data: &SynchronizedData) -> Option<(SynchronizedData, Event)>;
}
