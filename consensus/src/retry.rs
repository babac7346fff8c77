//! Retry and failure tracking
//!
//! A failed item loses its processor and becomes eligible for reassignment;
//! its try counter goes up. Items that hit the ceiling are evicted from the
//! pending collection permanently. Evicted items are handed back to the
//! caller (and land in the snapshot's dead-letter collection) rather than
//! disappearing, so operators can observe what was given up on.

use tracing::warn;

use crate::state::WorkItem;

/// Maximum processing attempts before an item is evicted from pending work.
pub const MAX_TRIES: u32 = 3;

/// Record a processing failure: bump the try counter and release the item
/// for reassignment in a later partitioning pass.
pub fn record_failure(item: &mut WorkItem, message: impl Into<String>) {
    item.num_tries += 1;
    item.processed = false;
    item.processor = None;
    item.error = true;
    item.error_message = Some(message.into());
    warn!(
        item = %item.id,
        num_tries = item.num_tries,
        "Processing failed"
    );
}

/// Split the pending collection into items still eligible for retry and
/// items that exhausted the ceiling.
pub fn evict_exhausted(requests: Vec<WorkItem>) -> (Vec<WorkItem>, Vec<WorkItem>) {
    let (kept, evicted): (Vec<_>, Vec<_>) = requests
        .into_iter()
        .partition(|item| item.num_tries < MAX_TRIES);

    for item in &evicted {
        warn!(
            item = %item.id,
            num_tries = item.num_tries,
            "Retry ceiling reached, moving item to dead letters"
        );
    }

    (kept, evicted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{AgentId, WorkKind};

    fn item(id: &str) -> WorkItem {
        WorkItem::with_id(id, WorkKind::Completion, "payload")
    }

    #[test]
    fn test_failure_increments_and_releases() {
        let mut it = item("req-1");
        it.processor = Some(AgentId::from("agent-a"));
        it.processed = true;

        record_failure(&mut it, "api timeout");

        assert_eq!(it.num_tries, 1);
        assert!(it.is_unassigned());
        assert!(it.error);
        assert_eq!(it.error_message.as_deref(), Some("api timeout"));
    }

    #[test]
    fn test_num_tries_strictly_increases() {
        let mut it = item("req-1");
        for expected in 1..=3 {
            record_failure(&mut it, "fail");
            assert_eq!(it.num_tries, expected);
        }
    }

    #[test]
    fn test_eviction_at_ceiling() {
        let mut exhausted = item("req-1");
        exhausted.num_tries = MAX_TRIES;
        let mut still_ok = item("req-2");
        still_ok.num_tries = MAX_TRIES - 1;

        let (kept, evicted) = evict_exhausted(vec![exhausted, still_ok]);

        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].id, "req-2");
        assert_eq!(evicted.len(), 1);
        assert_eq!(evicted[0].id, "req-1");
    }

    #[test]
    fn test_evicted_item_never_returns_to_pending() {
        let mut it = item("req-1");
        for _ in 0..MAX_TRIES {
            record_failure(&mut it, "fail");
        }

        let (kept, evicted) = evict_exhausted(vec![it]);
        assert!(kept.is_empty());
        assert_eq!(evicted.len(), 1);

        // Re-running eviction over the kept set stays empty.
        let (kept, _) = evict_exhausted(kept);
        assert!(kept.is_empty());
    }
}
