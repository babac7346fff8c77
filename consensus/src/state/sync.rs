//! The replicated snapshot every agent observes identically
//!
//! `SynchronizedData` is the strongly-typed equivalent of the replication
//! layer's key-value store: one explicit field per collection instead of
//! dynamic keys. Rounds produce a new snapshot in `end_block`; behaviours
//! only ever read it.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::types::{AgentId, ChatTurn, WorkItem};

/// Replicated state agreed on by the quorum, one snapshot per finalized round.
///
/// Invariants upheld by the rounds that produce snapshots:
/// - item ids are unique within each collection
/// - an id entering `responses` leaves `requests` in the same transition
/// - `participants` stays sorted
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SynchronizedData {
    /// Sorted set of registered agents.
    pub participants: Vec<AgentId>,

    /// Shared randomness agreed for the current period.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub randomness: Option<String>,

    /// Keeper elected for the current period.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keeper: Option<AgentId>,

    /// Pending work items awaiting processing.
    pub requests: Vec<WorkItem>,

    /// Completed work items.
    pub responses: Vec<WorkItem>,

    /// Chat memories keyed by memory id. BTreeMap keeps serialization
    /// order stable across agents.
    pub chat_histories: BTreeMap<String, Vec<ChatTurn>>,

    /// Items evicted at the retry ceiling. Never retried, kept observable.
    pub dead_letters: Vec<WorkItem>,

    /// How many full periods the quorum has completed.
    pub period_count: u64,
}

impl SynchronizedData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot with a registered participant set (sorted on the way in).
    pub fn with_participants(participants: Vec<AgentId>) -> Self {
        let mut data = Self::default();
        data.set_participants(participants);
        data
    }

    /// Replace the participant set, keeping it sorted.
    pub fn set_participants(&mut self, mut participants: Vec<AgentId>) {
        participants.sort();
        participants.dedup();
        self.participants = participants;
    }

    /// Number of registered participants.
    pub fn nb_participants(&self) -> usize {
        self.participants.len()
    }

    /// Whether the given agent is the elected keeper.
    pub fn is_keeper(&self, agent: &AgentId) -> bool {
        self.keeper.as_ref() == Some(agent)
    }

    /// Pending items assigned to the given agent.
    pub fn assigned_to(&self, agent: &AgentId) -> Vec<&WorkItem> {
        self.requests
            .iter()
            .filter(|item| item.is_pending() && item.processor.as_ref() == Some(agent))
            .collect()
    }

    /// Completed responses the keeper has not yet published.
    pub fn unpublished_responses(&self) -> Vec<&WorkItem> {
        self.responses.iter().filter(|r| !r.published).collect()
    }

    /// Start the next period: randomness and keeper are per-period values,
    /// everything else carries over.
    pub fn next_period(&self) -> Self {
        let mut next = self.clone();
        next.randomness = None;
        next.keeper = None;
        next.period_count += 1;
        next
    }
}
