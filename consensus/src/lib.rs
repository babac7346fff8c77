//! Deterministic work distribution for a BFT agent quorum
//!
//! This library is the round core of a multi-agent consensus application:
//! agents collectively ingest externally-submitted work items, agree on
//! round outcomes through a replicated snapshot, and elect a keeper to
//! perform external side effects on the group's behalf.
//!
//! The pieces, in dependency order:
//! - `state`: the typed replicated snapshot (`SynchronizedData`) and the
//!   work items flowing through it
//! - `merge`: idempotent merge-by-id of concurrently-submitted work
//! - `partition`: deterministic round-robin assignment over the sorted
//!   participant set
//! - `retry`: per-item failure tracking with an eviction ceiling
//! - `keeper`: seeded, communication-free keeper election
//! - `rounds`: payload collection with threshold predicates, plus the
//!   concrete rounds and their `end_block` semantics
//! - `fsm`: the explicit transition table sequencing the rounds
//!
//! The replication engine itself (block production, gossip, finality) is an
//! external collaborator. Everything here is a pure function of collected
//! payloads and the previous snapshot, which is what lets every agent
//! compute identical outcomes from the same consensus-ordered inputs.

pub mod fsm;
pub mod keeper;
pub mod merge;
pub mod partition;
pub mod retry;
pub mod rounds;
pub mod state;

// Re-export key state types
pub use state::{AgentId, ChatTurn, SynchronizedData, WorkItem, WorkKind};

// Re-export the round surface
pub use rounds::{
    consensus_threshold, CollectRandomnessRound, Event, Failure, PayloadCollection,
    ProcessPayload, ProcessRequestRound, PublishPayload, PublishResponseRound, RegistrationRound,
    ResetAndPauseRound, Round, RoundError, SelectKeeperRound, SyncPayload, WaitForRequestRound,
};

// Re-export FSM types
pub use fsm::{transition, QuorumFsm, RoundState, TransitionError, TransitionRecord};

// Re-export the core algorithms
pub use keeper::select_keeper;
pub use merge::{dedup_by_id, merge_submissions};
pub use partition::assign_processors;
pub use retry::{evict_exhausted, record_failure, MAX_TRIES};
