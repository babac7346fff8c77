//! Core types for the replicated quorum state
//!
//! These types are the unit of agreement between agents: every field here is
//! part of the synchronized snapshot that all agents must compute identically
//! from the same finalized round outcomes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier of a participant agent.
///
/// Ordered so participant sets can be kept sorted; stable ordering is what
/// makes round-robin assignment and keeper election deterministic.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentId(pub String);

impl AgentId {
    pub fn new(addr: impl Into<String>) -> Self {
        Self(addr.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for AgentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for AgentId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Kind of work an item represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkKind {
    /// One-shot text completion.
    Completion,
    /// Chat turn with memory threading.
    Chat,
    /// Embedding computation.
    Embedding,
}

/// One message of a chat history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: String,
    pub content: String,
}

impl ChatTurn {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }
}

/// A unit of externally-submitted work flowing through the quorum.
///
/// Created at ingress, merged into the replicated store during a
/// wait-for-request round, assigned a `processor` by the partitioner, then
/// either completed (moves to the response collection) or retried until the
/// ceiling is hit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkItem {
    /// Unique item identifier; the dedup key across agents.
    pub id: String,

    /// What kind of processing this item needs.
    pub kind: WorkKind,

    /// The prompt / text to process.
    pub input: String,

    /// Chat memory this item belongs to (chat items only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_id: Option<String>,

    /// When the submitter created the item. Assignment order follows this.
    pub request_time: DateTime<Utc>,

    /// Whether a processor has completed this item.
    pub processed: bool,

    /// Agent assigned to process this item, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processor: Option<AgentId>,

    /// Whether the most recent processing attempt failed.
    pub error: bool,

    /// Message from the most recent failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,

    /// Number of failed processing attempts so far.
    pub num_tries: u32,

    /// The produced response, once processed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,

    /// Whether the keeper has pushed this response to the external queue.
    pub published: bool,
}

impl WorkItem {
    /// Create a fresh pending item with a generated id.
    pub fn new(kind: WorkKind, input: impl Into<String>) -> Self {
        Self::with_id(uuid::Uuid::new_v4().to_string(), kind, input)
    }

    /// Create a fresh pending item with an explicit id (ingress adapters
    /// carry the submitter's id through).
    pub fn with_id(id: impl Into<String>, kind: WorkKind, input: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind,
            input: input.into(),
            memory_id: None,
            request_time: Utc::now(),
            processed: false,
            processor: None,
            error: false,
            error_message: None,
            num_tries: 0,
            output: None,
            published: false,
        }
    }

    /// Attach a chat memory id.
    pub fn with_memory(mut self, memory_id: impl Into<String>) -> Self {
        self.memory_id = Some(memory_id.into());
        self
    }

    /// Override the request time (tests and replay).
    pub fn with_request_time(mut self, at: DateTime<Utc>) -> Self {
        self.request_time = at;
        self
    }

    /// Mark this item completed with the given output.
    pub fn complete(&mut self, output: impl Into<String>) {
        self.processed = true;
        self.error = false;
        self.error_message = None;
        self.output = Some(output.into());
    }

    /// Whether this item still awaits processing.
    pub fn is_pending(&self) -> bool {
        !self.processed
    }

    /// Whether this item awaits processing and has no processor yet.
    pub fn is_unassigned(&self) -> bool {
        !self.processed && self.processor.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_item_is_pending_and_unassigned() {
        let item = WorkItem::new(WorkKind::Completion, "hello");
        assert!(item.is_pending());
        assert!(item.is_unassigned());
        assert_eq!(item.num_tries, 0);
        assert!(!item.published);
    }

    #[test]
    fn test_complete_clears_error_state() {
        let mut item = WorkItem::new(WorkKind::Chat, "hi").with_memory("mem-1");
        item.error = true;
        item.error_message = Some("boom".into());

        item.complete("response text");

        assert!(item.processed);
        assert!(!item.error);
        assert!(item.error_message.is_none());
        assert_eq!(item.output.as_deref(), Some("response text"));
    }

    #[test]
    fn test_agent_id_ordering_is_lexicographic() {
        let mut ids = vec![AgentId::from("agent-c"), AgentId::from("agent-a")];
        ids.sort();
        assert_eq!(ids[0].as_str(), "agent-a");
    }

    #[test]
    fn test_work_item_serde_roundtrip() {
        let item = WorkItem::with_id("req-1", WorkKind::Embedding, "embed me");
        let json = serde_json::to_string(&item).unwrap();
        let restored: WorkItem = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, item);
    }
}
