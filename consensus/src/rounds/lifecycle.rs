//! Lifecycle rounds: registration, randomness, keeper selection, reset
//!
//! These rounds establish who participates, the shared randomness for the
//! period, the elected keeper, and the rollover into the next period.

use tracing::info;

use crate::state::{AgentId, SynchronizedData};

use super::collection::PayloadCollection;
use super::{Event, Round, RoundError};

/// Collects registrations until the expected number of agents has shown up,
/// then agrees on the sorted participant set.
#[derive(Debug)]
pub struct RegistrationRound {
    expected: usize,
    collection: PayloadCollection<()>,
}

impl RegistrationRound {
    pub fn new(expected: usize) -> Self {
        Self {
            expected,
            collection: PayloadCollection::new(),
        }
    }
}

impl Round for RegistrationRound {
    type Payload = ();

    fn process_payload(
        &mut self,
        _data: &SynchronizedData,
        sender: AgentId,
        _payload: (),
    ) -> Result<(), RoundError> {
        // The participant set does not exist yet; any sender may register.
        self.collection.insert_unchecked(sender, ())
    }

    fn end_block(&self, data: &SynchronizedData) -> Option<(SynchronizedData, Event)> {
        if self.collection.len() < self.expected {
            return None;
        }
        let mut next = data.clone();
        next.set_participants(self.collection.senders().cloned().collect());
        info!(participants = next.nb_participants(), "Registration complete");
        Some((next, Event::Done))
    }
}

/// Collects the randomness beacon value until a threshold of agents reports
/// the same one.
#[derive(Debug, Default)]
pub struct CollectRandomnessRound {
    collection: PayloadCollection<String>,
}

impl CollectRandomnessRound {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Round for CollectRandomnessRound {
    type Payload = String;

    fn process_payload(
        &mut self,
        data: &SynchronizedData,
        sender: AgentId,
        payload: String,
    ) -> Result<(), RoundError> {
        self.collection.insert(&data.participants, sender, payload)
    }

    fn end_block(&self, data: &SynchronizedData) -> Option<(SynchronizedData, Event)> {
        let n = data.nb_participants();
        if self.collection.threshold_reached(n) {
            let (randomness, votes) = self.collection.most_voted()?;
            info!(votes, "Randomness agreed");
            let mut next = data.clone();
            next.randomness = Some(randomness);
            return Some((next, Event::Done));
        }
        if !self.collection.majority_possible(n) {
            return Some((data.clone(), Event::NoMajority));
        }
        None
    }
}

/// Collects each agent's locally-computed keeper choice until a threshold
/// agrees. With honest agents and the same randomness the vote is unanimous.
#[derive(Debug, Default)]
pub struct SelectKeeperRound {
    collection: PayloadCollection<AgentId>,
}

impl SelectKeeperRound {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Round for SelectKeeperRound {
    type Payload = AgentId;

    fn process_payload(
        &mut self,
        data: &SynchronizedData,
        sender: AgentId,
        payload: AgentId,
    ) -> Result<(), RoundError> {
        self.collection.insert(&data.participants, sender, payload)
    }

    fn end_block(&self, data: &SynchronizedData) -> Option<(SynchronizedData, Event)> {
        let n = data.nb_participants();
        if self.collection.threshold_reached(n) {
            let (keeper, _) = self.collection.most_voted()?;
            info!(keeper = %keeper, "Keeper selected");
            let mut next = data.clone();
            next.keeper = Some(keeper);
            return Some((next, Event::Done));
        }
        if !self.collection.majority_possible(n) {
            return Some((data.clone(), Event::NoMajority));
        }
        None
    }
}

/// Agrees on the next period count and rolls the snapshot over, clearing the
/// per-period randomness and keeper.
#[derive(Debug, Default)]
pub struct ResetAndPauseRound {
    collection: PayloadCollection<u64>,
}

impl ResetAndPauseRound {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Round for ResetAndPauseRound {
    type Payload = u64;

    fn process_payload(
        &mut self,
        data: &SynchronizedData,
        sender: AgentId,
        payload: u64,
    ) -> Result<(), RoundError> {
        self.collection.insert(&data.participants, sender, payload)
    }

    fn end_block(&self, data: &SynchronizedData) -> Option<(SynchronizedData, Event)> {
        let n = data.nb_participants();
        if self.collection.threshold_reached(n) {
            let next = data.next_period();
            info!(period = next.period_count, "Period reset");
            return Some((next, Event::Done));
        }
        if !self.collection.majority_possible(n) {
            return Some((data.clone(), Event::NoMajority));
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn agents(n: usize) -> Vec<AgentId> {
        (0..n).map(|i| AgentId::new(format!("agent-{i}"))).collect()
    }

    fn registered(n: usize) -> SynchronizedData {
        SynchronizedData::with_participants(agents(n))
    }

    #[test]
    fn test_registration_waits_for_expected_count() {
        let data = SynchronizedData::new();
        let mut round = RegistrationRound::new(3);

        round
            .process_payload(&data, AgentId::from("agent-b"), ())
            .unwrap();
        round
            .process_payload(&data, AgentId::from("agent-a"), ())
            .unwrap();
        assert!(round.end_block(&data).is_none());

        round
            .process_payload(&data, AgentId::from("agent-c"), ())
            .unwrap();
        let (next, event) = round.end_block(&data).unwrap();
        assert_eq!(event, Event::Done);
        // Sorted regardless of arrival order.
        assert_eq!(
            next.participants,
            vec![
                AgentId::from("agent-a"),
                AgentId::from("agent-b"),
                AgentId::from("agent-c"),
            ]
        );
    }

    #[test]
    fn test_randomness_threshold_then_done() {
        let data = registered(3);
        let mut round = CollectRandomnessRound::new();

        for agent in &data.participants {
            round
                .process_payload(&data, agent.clone(), "cafe01".into())
                .unwrap();
        }
        let (next, event) = round.end_block(&data).unwrap();
        assert_eq!(event, Event::Done);
        assert_eq!(next.randomness.as_deref(), Some("cafe01"));
    }

    #[test]
    fn test_randomness_open_below_threshold() {
        let data = registered(3);
        let mut round = CollectRandomnessRound::new();
        round
            .process_payload(&data, data.participants[0].clone(), "cafe01".into())
            .unwrap();
        assert!(round.end_block(&data).is_none());
    }

    #[test]
    fn test_randomness_no_majority_when_split() {
        let data = registered(3);
        let mut round = CollectRandomnessRound::new();
        round
            .process_payload(&data, data.participants[0].clone(), "aaaa".into())
            .unwrap();
        round
            .process_payload(&data, data.participants[1].clone(), "bbbb".into())
            .unwrap();

        let (next, event) = round.end_block(&data).unwrap();
        assert_eq!(event, Event::NoMajority);
        assert!(next.randomness.is_none());
    }

    #[test]
    fn test_select_keeper_sets_keeper() {
        let data = registered(3);
        let mut round = SelectKeeperRound::new();
        let choice = data.participants[1].clone();

        for agent in &data.participants {
            round
                .process_payload(&data, agent.clone(), choice.clone())
                .unwrap();
        }
        let (next, event) = round.end_block(&data).unwrap();
        assert_eq!(event, Event::Done);
        assert_eq!(next.keeper, Some(choice));
    }

    #[test]
    fn test_reset_bumps_period_and_clears_election() {
        let mut data = registered(3);
        data.randomness = Some("cafe01".into());
        data.keeper = Some(data.participants[0].clone());

        let mut round = ResetAndPauseRound::new();
        for agent in &data.participants.clone() {
            round.process_payload(&data, agent.clone(), 1).unwrap();
        }
        let (next, event) = round.end_block(&data).unwrap();
        assert_eq!(event, Event::Done);
        assert_eq!(next.period_count, 1);
        assert!(next.randomness.is_none());
        assert!(next.keeper.is_none());
        assert_eq!(next.participants, data.participants);
    }

    #[test]
    fn test_foreign_sender_rejected_after_registration() {
        let data = registered(2);
        let mut round = CollectRandomnessRound::new();
        let err = round
            .process_payload(&data, AgentId::from("intruder"), "cafe".into())
            .unwrap_err();
        assert!(matches!(err, RoundError::UnknownSender { .. }));
    }
}
