//! Agent-side behaviours, one per round
//!
//! A behaviour reads a snapshot of the synchronized data and produces the
//! payload this agent proposes for the current round. Behaviours never
//! mutate the snapshot; only `end_block` does. External side effects
//! (queue consumption, queue publication) happen here, and only when this
//! agent is the elected keeper.

use std::sync::Arc;

use tracing::{info, warn};

use consensus::{
    select_keeper, AgentId, Failure, ProcessPayload, PublishPayload, SyncPayload,
    SynchronizedData, WorkItem,
};

use crate::beacon::{BeaconError, RandomnessSource};
use crate::llm::CompletionClient;
use crate::queue::WorkQueue;

/// Per-agent context: identity, local ingress buffer, and the external
/// collaborators the behaviours talk to.
pub struct AgentContext {
    id: AgentId,
    /// Submissions received by this agent's own ingress, awaiting the next
    /// wait-for-request round.
    ingress: Vec<WorkItem>,
    queue: Arc<dyn WorkQueue>,
    client: Arc<dyn CompletionClient>,
    randomness: Arc<dyn RandomnessSource>,
    batch_size: usize,
}

impl AgentContext {
    pub fn new(
        id: AgentId,
        queue: Arc<dyn WorkQueue>,
        client: Arc<dyn CompletionClient>,
        randomness: Arc<dyn RandomnessSource>,
        batch_size: usize,
    ) -> Self {
        Self {
            id,
            ingress: Vec::new(),
            queue,
            client,
            randomness,
            batch_size,
        }
    }

    pub fn id(&self) -> &AgentId {
        &self.id
    }

    /// Accept a submission through this agent's own ingress.
    pub fn submit_local(&mut self, item: WorkItem) {
        self.ingress.push(item);
    }

    /// Randomness behaviour: fetch the beacon value for this period.
    pub async fn randomness_act(&self, period: u64) -> Result<String, BeaconError> {
        self.randomness.fetch(period).await
    }

    /// Keeper-selection behaviour: compute the keeper locally from the
    /// agreed randomness. `None` when the prerequisites are missing.
    pub fn select_keeper_act(&self, data: &SynchronizedData) -> Option<AgentId> {
        let randomness = data.randomness.as_deref()?;
        select_keeper(&data.participants, randomness).cloned()
    }

    /// Wait-for-request behaviour: every agent contributes its local
    /// ingress buffer; the keeper additionally drains the external queue.
    pub async fn wait_for_request_act(&mut self, data: &SynchronizedData) -> SyncPayload {
        let mut new_items = std::mem::take(&mut self.ingress);
        if data.is_keeper(&self.id) {
            let consumed = self.queue.consume(self.batch_size).await;
            info!(agent = %self.id, consumed = consumed.len(), "Keeper consumed queue");
            new_items.extend(consumed);
        }
        SyncPayload::new(new_items)
    }

    /// Process behaviour: complete the items assigned to this agent,
    /// reporting failures instead of crashing the round.
    pub async fn process_act(&self, data: &SynchronizedData) -> ProcessPayload {
        let mut responses = Vec::new();
        let mut failures = Vec::new();

        for item in data.assigned_to(&self.id) {
            let history = item
                .memory_id
                .as_ref()
                .and_then(|memory_id| data.chat_histories.get(memory_id))
                .map(Vec::as_slice)
                .unwrap_or(&[]);

            match self.client.complete(item, history).await {
                Ok(output) => {
                    let mut done = item.clone();
                    done.complete(output);
                    responses.push(done);
                }
                Err(e) => {
                    warn!(agent = %self.id, item = %item.id, "Processing failed: {e}");
                    failures.push(Failure::new(&item.id, e.to_string()));
                }
            }
        }

        ProcessPayload::new(responses, failures)
    }

    /// Publish behaviour: the keeper pushes completed, unpublished
    /// responses to the external queue; everyone else submits a no-op so
    /// the round still reaches quorum.
    pub async fn publish_act(&self, data: &SynchronizedData) -> PublishPayload {
        if !data.is_keeper(&self.id) {
            return PublishPayload::empty();
        }

        let unpublished: Vec<WorkItem> = data
            .unpublished_responses()
            .into_iter()
            .cloned()
            .collect();
        if unpublished.is_empty() {
            return PublishPayload::empty();
        }

        self.queue.publish(&unpublished).await;
        info!(agent = %self.id, published = unpublished.len(), "Keeper published responses");
        PublishPayload::new(unpublished.into_iter().map(|item| item.id).collect())
    }

    /// Reset behaviour: propose the next period count.
    pub fn reset_act(&self, data: &SynchronizedData) -> u64 {
        data.period_count + 1
    }
}
