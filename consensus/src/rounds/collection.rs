//! Payload collection machinery shared by all rounds
//!
//! A round accumulates exactly one payload per registered participant.
//! Collections are keyed by a `BTreeMap` so every agent iterates submissions
//! in the same order, which keeps `end_block` outcomes deterministic.

use std::collections::BTreeMap;

use tracing::debug;

use crate::state::AgentId;

use super::RoundError;

/// Byzantine-fault-tolerant agreement threshold: more than two thirds.
pub fn consensus_threshold(nb_participants: usize) -> usize {
    2 * nb_participants / 3 + 1
}

/// One payload per sender, collected over the lifetime of a round.
#[derive(Debug, Clone)]
pub struct PayloadCollection<P> {
    payloads: BTreeMap<AgentId, P>,
}

// Manual impl: an empty collection needs no `P: Default`.
impl<P> Default for PayloadCollection<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P> PayloadCollection<P> {
    pub fn new() -> Self {
        Self {
            payloads: BTreeMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.payloads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payloads.is_empty()
    }

    /// Accept a payload from a registered participant.
    ///
    /// Foreign senders and double submissions never enter the collection.
    pub fn insert(
        &mut self,
        participants: &[AgentId],
        sender: AgentId,
        payload: P,
    ) -> Result<(), RoundError> {
        if !participants.contains(&sender) {
            return Err(RoundError::UnknownSender { sender });
        }
        self.insert_unchecked(sender, payload)
    }

    /// Accept a payload without a participant check. Used by registration,
    /// where the participant set is the thing being agreed on.
    pub fn insert_unchecked(&mut self, sender: AgentId, payload: P) -> Result<(), RoundError> {
        if self.payloads.contains_key(&sender) {
            return Err(RoundError::DuplicatePayload { sender });
        }
        debug!(sender = %sender, collected = self.payloads.len() + 1, "Payload accepted");
        self.payloads.insert(sender, payload);
        Ok(())
    }

    /// Senders that have submitted, in sorted order.
    pub fn senders(&self) -> impl Iterator<Item = &AgentId> {
        self.payloads.keys()
    }

    /// Payloads in sender-sorted order.
    pub fn values(&self) -> impl Iterator<Item = &P> {
        self.payloads.values()
    }

    pub fn get(&self, sender: &AgentId) -> Option<&P> {
        self.payloads.get(sender)
    }

    /// Whether every participant has submitted (collect-different-until-all
    /// and collect-same-until-all terminal condition).
    pub fn complete(&self, participants: &[AgentId]) -> bool {
        !participants.is_empty() && participants.iter().all(|p| self.payloads.contains_key(p))
    }
}

impl<P: Ord + Clone> PayloadCollection<P> {
    /// The payload value with the most votes, with its count. Ties break
    /// toward the smallest value so all agents agree.
    pub fn most_voted(&self) -> Option<(P, usize)> {
        let mut counts: BTreeMap<&P, usize> = BTreeMap::new();
        for payload in self.payloads.values() {
            *counts.entry(payload).or_insert(0) += 1;
        }
        counts
            .into_iter()
            .max_by(|a, b| a.1.cmp(&b.1).then_with(|| b.0.cmp(a.0)))
            .map(|(value, count)| (value.clone(), count))
    }

    /// Whether the threshold is reached by some value
    /// (collect-same-until-threshold terminal condition).
    pub fn threshold_reached(&self, nb_participants: usize) -> bool {
        self.most_voted()
            .is_some_and(|(_, count)| count >= consensus_threshold(nb_participants))
    }

    /// Whether any value can still reach the threshold given the
    /// outstanding submissions.
    pub fn majority_possible(&self, nb_participants: usize) -> bool {
        let outstanding = nb_participants.saturating_sub(self.payloads.len());
        let top = self.most_voted().map(|(_, count)| count).unwrap_or(0);
        top + outstanding >= consensus_threshold(nb_participants)
    }
}
