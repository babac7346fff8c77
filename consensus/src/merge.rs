//! Submission merger
//!
//! Every agent may have received the same external submission independently,
//! so batches arriving in a round are deduplicated by id (first-seen wins)
//! and filtered against ids already known to the store. Merging is
//! idempotent: applying the same batch twice changes nothing.

use std::collections::HashSet;

use tracing::debug;

use crate::state::WorkItem;

/// Drop items whose id was already seen, keeping the first occurrence.
pub fn dedup_by_id(items: Vec<WorkItem>) -> Vec<WorkItem> {
    let mut seen: HashSet<String> = HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(item.id.clone()))
        .collect()
}

/// Merge newly-submitted batches into the pending collection.
///
/// Ids already present in `existing_requests` or `existing_responses` are
/// excluded: a processed item must never re-enter the pending collection.
/// Returns the accepted new items in submission order.
pub fn merge_submissions(
    existing_requests: &[WorkItem],
    existing_responses: &[WorkItem],
    batches: Vec<Vec<WorkItem>>,
) -> Vec<WorkItem> {
    let known: HashSet<&str> = existing_requests
        .iter()
        .chain(existing_responses.iter())
        .map(|item| item.id.as_str())
        .collect();

    let submitted: usize = batches.iter().map(Vec::len).sum();
    let accepted: Vec<WorkItem> = dedup_by_id(batches.into_iter().flatten().collect())
        .into_iter()
        .filter(|item| !known.contains(item.id.as_str()))
        .collect();

    debug!(
        submitted,
        accepted = accepted.len(),
        "Merged submission batches"
    );
    accepted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::WorkKind;

    fn item(id: &str) -> WorkItem {
        WorkItem::with_id(id, WorkKind::Completion, "payload")
    }

    #[test]
    fn test_dedup_keeps_first_seen() {
        let mut a = item("req-1");
        a.input = "first".into();
        let mut b = item("req-1");
        b.input = "second".into();

        let deduped = dedup_by_id(vec![a, b, item("req-2")]);
        assert_eq!(deduped.len(), 2);
        assert_eq!(deduped[0].input, "first");
    }

    #[test]
    fn test_merge_same_batch_twice_is_idempotent() {
        let batch = vec![item("req-1"), item("req-2")];

        // Same submission arriving via two agents in the same round.
        let merged = merge_submissions(&[], &[], vec![batch.clone(), batch.clone()]);
        assert_eq!(merged.len(), 2);

        // Same batch again in a later round, now against a populated store.
        let merged_again = merge_submissions(&merged, &[], vec![batch]);
        assert!(merged_again.is_empty());
    }

    #[test]
    fn test_processed_id_never_reenters_requests() {
        let mut done = item("req-1");
        done.complete("out");

        let merged = merge_submissions(&[], &[done], vec![vec![item("req-1"), item("req-2")]]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].id, "req-2");
    }

    #[test]
    fn test_merge_empty_batches() {
        assert!(merge_submissions(&[], &[], vec![]).is_empty());
        assert!(merge_submissions(&[], &[], vec![vec![], vec![]]).is_empty());
    }
}
