//! Round FSM — explicit states and an event-keyed transition table.
//!
//! Sequences the quorum's rounds so that:
//! 1. Every transition is auditable and logged.
//! 2. Undefined (state, event) pairs are rejected instead of wedging the app.
//! 3. Offline replay can reconstruct the exact sequence of rounds.
//!
//! Every state has a recovery edge: timeouts and errors fall back to
//! registration or loop the round, never hang.

use std::fmt;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::rounds::Event;

/// The states of the quorum state machine, one per round.
///
/// The happy path cycles Registration → CollectRandomness → SelectKeeper →
/// WaitForRequest → ProcessRequest → PublishResponse → ResetAndPause →
/// CollectRandomness. There is no terminal state; the quorum runs in
/// periods until shut down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundState {
    /// Agreeing on the participant set.
    Registration,
    /// Agreeing on the period's shared randomness.
    CollectRandomness,
    /// Electing the keeper for external side effects.
    SelectKeeper,
    /// Merging submitted work and partitioning it across agents.
    WaitForRequest,
    /// Applying processing outcomes to the store.
    ProcessRequest,
    /// Recording what the keeper published externally.
    PublishResponse,
    /// Rolling over into the next period.
    ResetAndPause,
}

impl fmt::Display for RoundState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Registration => "Registration",
            Self::CollectRandomness => "CollectRandomness",
            Self::SelectKeeper => "SelectKeeper",
            Self::WaitForRequest => "WaitForRequest",
            Self::ProcessRequest => "ProcessRequest",
            Self::PublishResponse => "PublishResponse",
            Self::ResetAndPause => "ResetAndPause",
        };
        write!(f, "{name}")
    }
}

/// The transition table.
///
/// ```text
/// Registration      --done--> CollectRandomness   (timeout: self)
/// CollectRandomness --done--> SelectKeeper        (no_majority/timeout: self)
/// SelectKeeper      --done--> WaitForRequest      (no_majority/timeout: Registration)
/// WaitForRequest    --done--> ProcessRequest
///                   --no_request--> ResetAndPause (error/timeout: Registration)
/// ProcessRequest    --done--> PublishResponse     (error/timeout: WaitForRequest)
/// PublishResponse   --done--> ResetAndPause       (error/timeout: Registration)
/// ResetAndPause     --done--> CollectRandomness   (no_majority/reset_timeout: Registration)
/// ```
pub fn transition(state: RoundState, event: Event) -> Option<RoundState> {
    use Event::*;
    use RoundState::*;

    match (state, event) {
        (Registration, Done) => Some(CollectRandomness),
        (Registration, RoundTimeout) => Some(Registration),

        (CollectRandomness, Done) => Some(SelectKeeper),
        (CollectRandomness, NoMajority) => Some(CollectRandomness),
        (CollectRandomness, RoundTimeout) => Some(CollectRandomness),

        (SelectKeeper, Done) => Some(WaitForRequest),
        (SelectKeeper, NoMajority) => Some(Registration),
        (SelectKeeper, RoundTimeout) => Some(Registration),

        (WaitForRequest, Done) => Some(ProcessRequest),
        (WaitForRequest, NoRequest) => Some(ResetAndPause),
        (WaitForRequest, Error) => Some(Registration),
        (WaitForRequest, RoundTimeout) => Some(Registration),

        (ProcessRequest, Done) => Some(PublishResponse),
        (ProcessRequest, Error) => Some(WaitForRequest),
        (ProcessRequest, RoundTimeout) => Some(WaitForRequest),

        (PublishResponse, Done) => Some(ResetAndPause),
        (PublishResponse, Error) => Some(Registration),
        (PublishResponse, RoundTimeout) => Some(Registration),

        (ResetAndPause, Done) => Some(CollectRandomness),
        (ResetAndPause, NoMajority) => Some(Registration),
        (ResetAndPause, ResetTimeout) => Some(Registration),

        _ => None,
    }
}

/// A single recorded transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionRecord {
    pub from: RoundState,
    pub event: Event,
    pub to: RoundState,
    /// Period count at the time of transition.
    pub period: u64,
    /// Milliseconds since the state machine was created.
    pub elapsed_ms: u64,
    /// Optional context about why this transition happened.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Error returned when an event has no edge from the current state.
#[derive(Debug, Clone, thiserror::Error)]
#[error("no transition from {state} on {event}")]
pub struct TransitionError {
    pub state: RoundState,
    pub event: Event,
}

/// The quorum state machine.
///
/// Tracks the current round state, enforces the transition table, and keeps
/// a complete log of transitions for replay and diagnostics.
pub struct QuorumFsm {
    current: RoundState,
    period: u64,
    created_at: Instant,
    transitions: Vec<TransitionRecord>,
}

impl QuorumFsm {
    /// Create a new state machine starting at `Registration`.
    pub fn new() -> Self {
        Self {
            current: RoundState::Registration,
            period: 0,
            created_at: Instant::now(),
            transitions: Vec::new(),
        }
    }

    /// Get the current state.
    pub fn current(&self) -> RoundState {
        self.current
    }

    /// Get the current period count.
    pub fn period(&self) -> u64 {
        self.period
    }

    /// Set the period counter (driven by the reset round's outcome).
    pub fn set_period(&mut self, period: u64) {
        self.period = period;
    }

    /// Apply an event against the transition table.
    ///
    /// Returns the new state, or `TransitionError` when the table has no
    /// edge for this (state, event) pair.
    pub fn advance(
        &mut self,
        event: Event,
        reason: Option<&str>,
    ) -> Result<RoundState, TransitionError> {
        let to = transition(self.current, event).ok_or(TransitionError {
            state: self.current,
            event,
        })?;

        let record = TransitionRecord {
            from: self.current,
            event,
            to,
            period: self.period,
            elapsed_ms: self.created_at.elapsed().as_millis() as u64,
            reason: reason.map(String::from),
        };

        tracing::debug!(
            from = %self.current,
            event = %event,
            to = %to,
            period = self.period,
            "Round transition"
        );

        self.transitions.push(record);
        self.current = to;
        Ok(to)
    }

    /// Get the full transition log.
    pub fn transitions(&self) -> &[TransitionRecord] {
        &self.transitions
    }

    /// Summary string of the machine's history.
    pub fn summary(&self) -> String {
        format!(
            "{} → {} (period {}, {} transitions)",
            RoundState::Registration,
            self.current,
            self.period,
            self.transitions.len(),
        )
    }
}

impl Default for QuorumFsm {
    fn default() -> Self {
        Self::new()
    }
}
