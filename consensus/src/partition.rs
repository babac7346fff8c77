//! Assignment partitioner
//!
//! Maps unprocessed items to participants round-robin by sorted position.
//! Items are ordered by `request_time` (earliest first) and at most N
//! unassigned items receive a processor per pass, N being the participant
//! count. Later items wait for a subsequent round, which bounds per-round
//! assignment work.

use tracing::{debug, warn};

use crate::state::{AgentId, WorkItem};

/// Sort pending items by request time and assign processors to the first N
/// unassigned ones. Returns how many assignments were made.
///
/// An empty participant set is a no-op: there is nobody to assign to, and
/// the items simply stay unassigned until agents register.
pub fn assign_processors(items: &mut [WorkItem], participants: &[AgentId]) -> usize {
    let n = participants.len();
    if n == 0 {
        warn!("No participants registered, skipping assignment");
        return 0;
    }

    items.sort_by(|a, b| a.request_time.cmp(&b.request_time));

    let mut assigned = 0;
    for item in items.iter_mut().filter(|item| item.is_unassigned()) {
        if assigned >= n {
            break;
        }
        let processor = participants[assigned % n].clone();
        debug!(item = %item.id, processor = %processor, "Assigned processor");
        item.processor = Some(processor);
        assigned += 1;
    }

    assigned
}
