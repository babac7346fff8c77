//! Work rounds: synchronize, process, publish
//!
//! The synchronize round (wait-for-request) is where the merger, retry
//! eviction, and partitioner run; the process round moves completed items
//! from requests to responses and records failures; the publish round marks
//! what the keeper pushed back out.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::merge::{dedup_by_id, merge_submissions};
use crate::partition::assign_processors;
use crate::retry::{evict_exhausted, record_failure};
use crate::state::{AgentId, ChatTurn, SynchronizedData, WorkItem, WorkKind};

use super::collection::PayloadCollection;
use super::{Event, Round, RoundError};

/// Payload of the wait-for-request round: the items an agent wants merged
/// into the store. The keeper's payload carries queue-consumed items, every
/// agent's payload carries its local ingress buffer; an empty payload is a
/// valid no-op submission that still counts toward quorum.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncPayload {
    pub new_items: Vec<WorkItem>,
}

impl SyncPayload {
    pub fn new(new_items: Vec<WorkItem>) -> Self {
        Self { new_items }
    }

    pub fn empty() -> Self {
        Self::default()
    }
}

/// A processing failure reported for one item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Failure {
    pub id: String,
    pub reason: String,
}

impl Failure {
    pub fn new(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            reason: reason.into(),
        }
    }
}

/// Payload of the process round: completed items plus failures.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProcessPayload {
    pub responses: Vec<WorkItem>,
    pub failures: Vec<Failure>,
}

impl ProcessPayload {
    pub fn new(responses: Vec<WorkItem>, failures: Vec<Failure>) -> Self {
        Self {
            responses,
            failures,
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }
}

/// Payload of the publish round: ids the keeper pushed to the external
/// queue. Non-keepers submit an empty list.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PublishPayload {
    pub published: Vec<String>,
}

impl PublishPayload {
    pub fn new(published: Vec<String>) -> Self {
        Self { published }
    }

    pub fn empty() -> Self {
        Self::default()
    }
}

/// Collect-different-until-all round that merges newly-submitted work,
/// evicts retry-exhausted items, and partitions the pending collection
/// across participants.
#[derive(Debug, Default)]
pub struct WaitForRequestRound {
    collection: PayloadCollection<SyncPayload>,
}

impl WaitForRequestRound {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Round for WaitForRequestRound {
    type Payload = SyncPayload;

    fn process_payload(
        &mut self,
        data: &SynchronizedData,
        sender: AgentId,
        payload: SyncPayload,
    ) -> Result<(), RoundError> {
        self.collection.insert(&data.participants, sender, payload)
    }

    fn end_block(&self, data: &SynchronizedData) -> Option<(SynchronizedData, Event)> {
        if !self.collection.complete(&data.participants) {
            return None;
        }

        let batches: Vec<Vec<WorkItem>> = self
            .collection
            .values()
            .map(|p| p.new_items.clone())
            .collect();
        let accepted = merge_submissions(&data.requests, &data.responses, batches);

        let mut requests = data.requests.clone();
        requests.extend(accepted);

        let (mut kept, evicted) = evict_exhausted(requests);
        let assigned = assign_processors(&mut kept, &data.participants);

        let mut next = data.clone();
        next.requests = kept;
        next.dead_letters.extend(evicted);

        let pending = next.requests.iter().filter(|i| i.is_pending()).count();
        info!(pending, assigned, "Requests synchronized");

        let event = if pending > 0 {
            Event::Done
        } else {
            Event::NoRequest
        };
        Some((next, event))
    }
}

/// Collect-different-until-all round that applies processing outcomes:
/// completed items leave `requests` and enter `responses` exactly once,
/// failures release the item for reassignment, chat outputs extend the
/// replicated chat histories.
#[derive(Debug, Default)]
pub struct ProcessRequestRound {
    collection: PayloadCollection<ProcessPayload>,
}

impl ProcessRequestRound {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Round for ProcessRequestRound {
    type Payload = ProcessPayload;

    fn process_payload(
        &mut self,
        data: &SynchronizedData,
        sender: AgentId,
        payload: ProcessPayload,
    ) -> Result<(), RoundError> {
        self.collection.insert(&data.participants, sender, payload)
    }

    fn end_block(&self, data: &SynchronizedData) -> Option<(SynchronizedData, Event)> {
        if !self.collection.complete(&data.participants) {
            return None;
        }

        let mut next = data.clone();

        for payload in self.collection.values() {
            for failure in &payload.failures {
                if let Some(item) = next.requests.iter_mut().find(|i| i.id == failure.id) {
                    record_failure(item, failure.reason.clone());
                }
            }
        }

        let known: HashSet<String> = next.responses.iter().map(|r| r.id.clone()).collect();
        let new_responses: Vec<WorkItem> = dedup_by_id(
            self.collection
                .values()
                .flat_map(|p| p.responses.clone())
                .collect(),
        )
        .into_iter()
        .filter(|r| r.processed && !known.contains(&r.id))
        .collect();

        for response in new_responses {
            next.requests.retain(|r| r.id != response.id);
            if response.kind == WorkKind::Chat {
                if let (Some(memory_id), Some(output)) = (&response.memory_id, &response.output) {
                    let history = next.chat_histories.entry(memory_id.clone()).or_default();
                    history.push(ChatTurn::new("user", response.input.clone()));
                    history.push(ChatTurn::new("assistant", output.clone()));
                }
            }
            next.responses.push(response);
        }

        info!(
            requests = next.requests.len(),
            responses = next.responses.len(),
            "Processing outcomes applied"
        );
        Some((next, Event::Done))
    }
}

/// Collect-different-until-all round that marks which responses the keeper
/// pushed back to the external queue.
#[derive(Debug, Default)]
pub struct PublishResponseRound {
    collection: PayloadCollection<PublishPayload>,
}

impl PublishResponseRound {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Round for PublishResponseRound {
    type Payload = PublishPayload;

    fn process_payload(
        &mut self,
        data: &SynchronizedData,
        sender: AgentId,
        payload: PublishPayload,
    ) -> Result<(), RoundError> {
        self.collection.insert(&data.participants, sender, payload)
    }

    fn end_block(&self, data: &SynchronizedData) -> Option<(SynchronizedData, Event)> {
        if !self.collection.complete(&data.participants) {
            return None;
        }

        // Only the elected keeper performs external publication, so only
        // its payload decides which ids count as published.
        let published: HashSet<&str> = data
            .keeper
            .as_ref()
            .and_then(|keeper| self.collection.get(keeper))
            .map(|p| p.published.iter().map(String::as_str).collect())
            .unwrap_or_default();

        let mut next = data.clone();
        let mut marked = 0;
        for response in &mut next.responses {
            if published.contains(response.id.as_str()) && !response.published {
                response.published = true;
                marked += 1;
            }
        }

        info!(marked, "Responses published");
        Some((next, Event::Done))
    }
}
