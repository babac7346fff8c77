//! Replicated state: work items, participants, and the synchronized snapshot.

mod sync;
mod types;

pub use sync::SynchronizedData;
pub use types::{AgentId, ChatTurn, WorkItem, WorkKind};
