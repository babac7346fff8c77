//! Period driver
//!
//! Runs a set of agents through the round sequence in a single-threaded
//! cooperative loop: behaviours produce payloads round-robin, the current
//! round collects them, `end_block` yields the next snapshot and event, and
//! the FSM decides which round comes next. This is the in-process stand-in
//! for the replication engine's block loop, used by the simulation binary
//! and the integration tests.

use anyhow::{bail, Context, Result};
use tracing::{info, warn};

use consensus::{
    CollectRandomnessRound, Event, ProcessRequestRound, PublishResponseRound, QuorumFsm,
    RegistrationRound, ResetAndPauseRound, Round, RoundState, SelectKeeperRound,
    SynchronizedData, WaitForRequestRound, WorkItem,
};

use crate::behaviours::AgentContext;

/// Guard against FSM cycles that make no progress (persistent beacon
/// outage, for example) wedging `run_period` forever.
const MAX_STEPS_PER_PERIOD: usize = 64;

pub struct PeriodDriver {
    agents: Vec<AgentContext>,
    data: SynchronizedData,
    fsm: QuorumFsm,
}

impl PeriodDriver {
    pub fn new(agents: Vec<AgentContext>) -> Self {
        Self {
            agents,
            data: SynchronizedData::new(),
            fsm: QuorumFsm::new(),
        }
    }

    /// Current synchronized snapshot.
    pub fn data(&self) -> &SynchronizedData {
        &self.data
    }

    /// Current round state.
    pub fn state(&self) -> RoundState {
        self.fsm.current()
    }

    /// Route a submission to one agent's local ingress, as if it arrived
    /// over that agent's HTTP handler.
    pub fn submit_to(&mut self, agent_index: usize, item: WorkItem) {
        self.agents[agent_index].submit_local(item);
    }

    /// Run the current round to completion and advance the FSM.
    pub async fn step(&mut self) -> Result<Event> {
        let state = self.fsm.current();
        let event = match state {
            RoundState::Registration => self.run_registration()?,
            RoundState::CollectRandomness => self.run_randomness().await?,
            RoundState::SelectKeeper => self.run_select_keeper()?,
            RoundState::WaitForRequest => self.run_wait_for_request().await?,
            RoundState::ProcessRequest => self.run_process().await?,
            RoundState::PublishResponse => self.run_publish().await?,
            RoundState::ResetAndPause => self.run_reset()?,
        };

        self.fsm
            .advance(event, None)
            .with_context(|| format!("advancing from {state} on {event}"))?;
        self.fsm.set_period(self.data.period_count);
        Ok(event)
    }

    /// Run rounds until the reset round completes one full period.
    pub async fn run_period(&mut self) -> Result<()> {
        for _ in 0..MAX_STEPS_PER_PERIOD {
            let state = self.fsm.current();
            let event = self.step().await?;
            if state == RoundState::ResetAndPause && event == Event::Done {
                info!(period = self.data.period_count, "Period complete");
                return Ok(());
            }
        }
        bail!("period made no progress after {MAX_STEPS_PER_PERIOD} rounds");
    }

    fn run_registration(&mut self) -> Result<Event> {
        let mut round = RegistrationRound::new(self.agents.len());
        for agent in &self.agents {
            round.process_payload(&self.data, agent.id().clone(), ())?;
        }
        self.apply(round.end_block(&self.data))
    }

    async fn run_randomness(&mut self) -> Result<Event> {
        let mut round = CollectRandomnessRound::new();
        let snapshot = self.data.clone();
        for agent in &self.agents {
            match agent.randomness_act(snapshot.period_count).await {
                Ok(randomness) => {
                    round.process_payload(&snapshot, agent.id().clone(), randomness)?;
                }
                Err(e) => warn!(agent = %agent.id(), "No randomness this round: {e}"),
            }
        }
        // Agents without a beacon value simply did not submit; if that
        // leaves the round short of threshold, it times out and loops.
        self.apply(round.end_block(&snapshot))
    }

    fn run_select_keeper(&mut self) -> Result<Event> {
        let mut round = SelectKeeperRound::new();
        let snapshot = self.data.clone();
        for agent in &self.agents {
            match agent.select_keeper_act(&snapshot) {
                Some(choice) => round.process_payload(&snapshot, agent.id().clone(), choice)?,
                None => warn!(agent = %agent.id(), "Keeper computation unavailable"),
            }
        }
        self.apply(round.end_block(&snapshot))
    }

    async fn run_wait_for_request(&mut self) -> Result<Event> {
        let mut round = WaitForRequestRound::new();
        let snapshot = self.data.clone();
        for agent in &mut self.agents {
            let payload = agent.wait_for_request_act(&snapshot).await;
            round.process_payload(&snapshot, agent.id().clone(), payload)?;
        }
        self.apply(round.end_block(&snapshot))
    }

    async fn run_process(&mut self) -> Result<Event> {
        let mut round = ProcessRequestRound::new();
        let snapshot = self.data.clone();
        for agent in &self.agents {
            let payload = agent.process_act(&snapshot).await;
            round.process_payload(&snapshot, agent.id().clone(), payload)?;
        }
        self.apply(round.end_block(&snapshot))
    }

    async fn run_publish(&mut self) -> Result<Event> {
        let mut round = PublishResponseRound::new();
        let snapshot = self.data.clone();
        for agent in &self.agents {
            let payload = agent.publish_act(&snapshot).await;
            round.process_payload(&snapshot, agent.id().clone(), payload)?;
        }
        self.apply(round.end_block(&snapshot))
    }

    fn run_reset(&mut self) -> Result<Event> {
        let mut round = ResetAndPauseRound::new();
        let snapshot = self.data.clone();
        for agent in &self.agents {
            let payload = agent.reset_act(&snapshot);
            round.process_payload(&snapshot, agent.id().clone(), payload)?;
        }
        self.apply(round.end_block(&snapshot))
    }

    /// Apply an `end_block` outcome; a round left open maps to a timeout,
    /// which the transition table turns into the recovery edge.
    fn apply(&mut self, outcome: Option<(SynchronizedData, Event)>) -> Result<Event> {
        match outcome {
            Some((next, event)) => {
                self.data = next;
                Ok(event)
            }
            None => Ok(Event::RoundTimeout),
        }
    }
}
