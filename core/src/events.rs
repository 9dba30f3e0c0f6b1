//! Encounter signals
//!
//! Signals are the engine's outbound event stream: "interesting things that
//! happened" at a level the transport layer can fan out to connected
//! participants. The engine writes to an explicit broadcast channel and
//! knows nothing about subscribers; a dropped or lagging subscriber never
//! blocks a state transition.

use std::sync::Arc;

use chrono::NaiveDateTime;
use tokio::sync::broadcast;

use crate::encounter::EncounterId;
use crate::loot::LootDistribution;

#[derive(Debug, Clone)]
pub enum EncounterSignal {
    /// Countdown elapsed; the encounter is live
    Started {
        encounter_id: EncounterId,
        timestamp: NaiveDateTime,
    },

    PhaseChanged {
        encounter_id: EncounterId,
        new_phase_index: usize,
        mechanics_delta: Vec<String>,
        timestamp: NaiveDateTime,
    },

    AbilityUsed {
        encounter_id: EncounterId,
        ability_id: String,
        affected_participants: Vec<i64>,
        timestamp: NaiveDateTime,
    },

    /// Emitted after every successful attack
    ProgressUpdated {
        encounter_id: EncounterId,
        pool_remaining: i64,
        contributors: usize,
        timestamp: NaiveDateTime,
    },

    Completed {
        encounter_id: EncounterId,
        mvp_id: Option<i64>,
        loot: Arc<LootDistribution>,
        timestamp: NaiveDateTime,
    },

    Failed {
        encounter_id: EncounterId,
        timestamp: NaiveDateTime,
    },

    Expired {
        encounter_id: EncounterId,
        timestamp: NaiveDateTime,
    },
}

impl EncounterSignal {
    pub fn encounter_id(&self) -> EncounterId {
        match self {
            Self::Started { encounter_id, .. }
            | Self::PhaseChanged { encounter_id, .. }
            | Self::AbilityUsed { encounter_id, .. }
            | Self::ProgressUpdated { encounter_id, .. }
            | Self::Completed { encounter_id, .. }
            | Self::Failed { encounter_id, .. }
            | Self::Expired { encounter_id, .. } => *encounter_id,
        }
    }

    pub fn timestamp(&self) -> NaiveDateTime {
        match self {
            Self::Started { timestamp, .. }
            | Self::PhaseChanged { timestamp, .. }
            | Self::AbilityUsed { timestamp, .. }
            | Self::ProgressUpdated { timestamp, .. }
            | Self::Completed { timestamp, .. }
            | Self::Failed { timestamp, .. }
            | Self::Expired { timestamp, .. } => *timestamp,
        }
    }
}

const BUS_CAPACITY: usize = 256;

/// Fan-out channel the transport layer subscribes to.
#[derive(Debug, Clone)]
pub struct SignalBus {
    tx: broadcast::Sender<EncounterSignal>,
}

impl Default for SignalBus {
    fn default() -> Self {
        Self::new()
    }
}

impl SignalBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(BUS_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EncounterSignal> {
        self.tx.subscribe()
    }

    /// Publish a signal. With no subscribers the signal is dropped, which is
    /// fine: the engine state is authoritative, signals are advisory.
    pub fn publish(&self, signal: EncounterSignal) {
        let _ = self.tx.send(signal);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_receive_published_signals() {
        let bus = SignalBus::new();
        let mut rx = bus.subscribe();
        bus.publish(EncounterSignal::Started {
            encounter_id: 7,
            timestamp: NaiveDateTime::default(),
        });
        let signal = rx.recv().await.expect("signal");
        assert_eq!(signal.encounter_id(), 7);
    }

    #[test]
    fn publish_without_subscribers_does_not_panic() {
        let bus = SignalBus::new();
        bus.publish(EncounterSignal::Failed {
            encounter_id: 1,
            timestamp: NaiveDateTime::default(),
        });
    }
}
