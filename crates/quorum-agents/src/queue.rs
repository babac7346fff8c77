//! External work queue seam
//!
//! The broker (RabbitMQ in production) is out of scope; the trait captures
//! the two operations the keeper performs on it, and the in-memory
//! implementation backs simulations and tests.

use std::collections::VecDeque;

use async_trait::async_trait;
use tokio::sync::Mutex;

use consensus::WorkItem;

/// The keeper's view of the external queue.
#[async_trait]
pub trait WorkQueue: Send + Sync {
    /// Take up to `max` submitted items off the queue.
    async fn consume(&self, max: usize) -> Vec<WorkItem>;

    /// Push completed responses back out.
    async fn publish(&self, items: &[WorkItem]);
}

/// In-process queue shared by all simulated agents.
#[derive(Default)]
pub struct InMemoryQueue {
    pending: Mutex<VecDeque<WorkItem>>,
    published: Mutex<Vec<WorkItem>>,
}

impl InMemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue an external submission.
    pub async fn submit(&self, item: WorkItem) {
        self.pending.lock().await.push_back(item);
    }

    /// Responses published so far (test observability).
    pub async fn published(&self) -> Vec<WorkItem> {
        self.published.lock().await.clone()
    }
}

#[async_trait]
impl WorkQueue for InMemoryQueue {
    async fn consume(&self, max: usize) -> Vec<WorkItem> {
        let mut pending = self.pending.lock().await;
        let take = max.min(pending.len());
        pending.drain(..take).collect()
    }

    async fn publish(&self, items: &[WorkItem]) {
        self.published.lock().await.extend_from_slice(items);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use consensus::WorkKind;

    #[tokio::test]
    async fn test_consume_respects_max_and_order() {
        let queue = InMemoryQueue::new();
        for i in 0..3 {
            queue
                .submit(WorkItem::with_id(
                    format!("req-{i}"),
                    WorkKind::Completion,
                    "x",
                ))
                .await;
        }

        let first = queue.consume(2).await;
        assert_eq!(first.len(), 2);
        assert_eq!(first[0].id, "req-0");

        let rest = queue.consume(10).await;
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].id, "req-2");
        assert!(queue.consume(10).await.is_empty());
    }

    #[tokio::test]
    async fn test_publish_is_observable() {
        let queue = InMemoryQueue::new();
        let mut item = WorkItem::with_id("req-1", WorkKind::Completion, "x");
        item.complete("out");
        queue.publish(&[item]).await;

        let published = queue.published().await;
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].output.as_deref(), Some("out"));
    }
}
