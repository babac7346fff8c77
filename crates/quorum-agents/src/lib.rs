//! Agent-side half of the quorum app: behaviours that produce round
//! payloads, the external seams they talk to (work queue, completion API,
//! randomness beacon), and a driver that runs a set of agents through full
//! periods in-process.

pub mod beacon;
pub mod behaviours;
pub mod config;
pub mod driver;
pub mod llm;
pub mod queue;

pub use beacon::{BeaconError, DrandBeacon, LocalRandomness, RandomnessSource};
pub use behaviours::AgentContext;
pub use config::{AgentConfig, BeaconConfig, CompletionConfig, ConfigError};
pub use driver::PeriodDriver;
pub use llm::{CompletionClient, HttpCompletionClient, ProcessError, ScriptedClient};
pub use queue::{InMemoryQueue, WorkQueue};
