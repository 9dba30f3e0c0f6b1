//! Encounter registry
//!
//! The registry exclusively owns every live encounter instance. Lookup goes
//! through a read lock on the instance map; each instance sits behind its
//! own mutex, so all mutating operations on one encounter serialize while
//! independent encounters proceed fully in parallel. No I/O happens under
//! either lock: loot allocation and summary building are pure computation,
//! and persistence/broadcast run after the lock is released.
//!
//! Countdown and expiry timers are tokio tasks registered per encounter id;
//! any terminal transition aborts the encounter's pending timers so a late
//! callback can never touch a torn-down instance.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration as StdDuration;

use hashbrown::HashMap;
use incursion_types::PlayerSnapshot;
use rand::SeedableRng;
use rand::rngs::StdRng;
use tokio::task::JoinHandle;

use crate::clock::Clock;
use crate::config::{EngineConfig, SpawnPolicy};
use crate::definition::DefinitionStore;
use crate::encounter::{
    AttackOutcome, Encounter, EncounterId, EncounterSnapshot, EncounterStatus, JoinOutcome,
    abilities::{self, AbilityOutcome},
};
use crate::error::EngineError;
use crate::events::{EncounterSignal, SignalBus};
use crate::history::{HistoryRecorder, HistoryStore, HistorySummary};
use crate::loot::{self, AllocationContext, LootDistribution};

/// Lightweight row for `list`.
#[derive(Debug, Clone)]
pub struct EncounterListing {
    pub id: EncounterId,
    pub definition_id: String,
    pub display_name: String,
    pub location: String,
    pub status: EncounterStatus,
    pub current_pool: i64,
    pub max_pool: i64,
    pub phase_index: usize,
    pub participants: usize,
}

pub struct EncounterRegistry {
    definitions: DefinitionStore,
    config: EngineConfig,
    clock: Arc<dyn Clock>,
    bus: SignalBus,
    store: Arc<dyn HistoryStore>,
    recorder: HistoryRecorder,

    encounters: RwLock<HashMap<EncounterId, Arc<Mutex<Encounter>>>>,
    next_id: AtomicU64,
    timers: Mutex<HashMap<EncounterId, Vec<JoinHandle<()>>>>,
}

impl EncounterRegistry {
    pub fn new(
        definitions: DefinitionStore,
        config: EngineConfig,
        clock: Arc<dyn Clock>,
        store: Arc<dyn HistoryStore>,
    ) -> Self {
        Self {
            definitions,
            config,
            clock,
            bus: SignalBus::new(),
            store,
            recorder: HistoryRecorder::new(),
            encounters: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            timers: Mutex::new(HashMap::new()),
        }
    }

    pub fn bus(&self) -> &SignalBus {
        &self.bus
    }

    pub fn definitions(&self) -> &DefinitionStore {
        &self.definitions
    }

    pub fn history(&self) -> &dyn HistoryStore {
        self.store.as_ref()
    }

    // ─── Spawning & Lifecycle ────────────────────────────────────────────────

    /// Create a new instance in `scheduled` status. `pool_modifier` scales
    /// the definition's base pool (external bonuses, consumed here only).
    pub fn spawn(
        &self,
        definition_id: &str,
        location: &str,
        pool_modifier: f64,
    ) -> Result<EncounterId, EngineError> {
        let definition = self
            .definitions
            .get(definition_id)
            .ok_or_else(|| EngineError::DefinitionNotFound(definition_id.to_string()))?;

        let mut encounters = self
            .encounters
            .write()
            .map_err(|_| EngineError::ConcurrencyConflict)?;

        // Duplicate-active check and insert are one atomic step under the
        // map write lock, so two racing spawns cannot both pass the gate.
        for handle in encounters.values() {
            let enc = handle.lock().map_err(|_| EngineError::ConcurrencyConflict)?;
            if enc.status.is_terminal() || enc.definition.id != definition_id {
                continue;
            }
            let collides = match self.config.spawn_policy {
                SpawnPolicy::PerDefinition => true,
                SpawnPolicy::PerLocation => enc.location == location,
            };
            if collides {
                return Err(EngineError::DuplicateActive(definition_id.to_string()));
            }
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let encounter = Encounter::spawn(
            id,
            definition,
            location.to_string(),
            pool_modifier,
            self.config.dot_tick_secs,
            self.clock.now(),
        );
        encounters.insert(id, Arc::new(Mutex::new(encounter)));
        tracing::info!(encounter = id, definition = definition_id, location, "encounter spawned");
        Ok(id)
    }

    /// Transition scheduled → announced and start the countdown. Activation
    /// fires when the countdown elapses; the join-window watchdog expires
    /// the instance if nobody has joined by then.
    pub fn announce(self: &Arc<Self>, id: EncounterId) -> Result<(), EngineError> {
        self.with_encounter(id, |enc| enc.announce())?;
        tracing::info!(encounter = id, "encounter announced");

        let countdown = StdDuration::from_secs_f32(self.config.announce_countdown_secs.max(0.0));
        let registry = Arc::clone(self);
        let activate = tokio::spawn(async move {
            tokio::time::sleep(countdown).await;
            registry.activate_from_timer(id);
        });

        let window = StdDuration::from_secs_f32(self.config.join_window_secs.max(0.0));
        let registry = Arc::clone(self);
        let expiry = tokio::spawn(async move {
            tokio::time::sleep(window).await;
            registry.expire_if_unjoined(id);
        });

        let mut timers = self
            .timers
            .lock()
            .map_err(|_| EngineError::ConcurrencyConflict)?;
        timers.entry(id).or_default().extend([activate, expiry]);
        Ok(())
    }

    fn activate_from_timer(&self, id: EncounterId) {
        let now = self.clock.now();
        match self.with_encounter(id, |enc| enc.activate(now)) {
            Ok(()) => {
                tracing::info!(encounter = id, "encounter active");
                self.bus.publish(EncounterSignal::Started {
                    encounter_id: id,
                    timestamp: now,
                });
            }
            // Already expired or torn down; the transition guard makes a
            // late countdown harmless.
            Err(e) => tracing::debug!(encounter = id, error = %e, "countdown skipped"),
        }
    }

    fn expire_if_unjoined(&self, id: EncounterId) {
        let now = self.clock.now();
        let expired = self.with_encounter(id, |enc| {
            if !enc.ledger.is_empty() || enc.status == EncounterStatus::Active {
                return Ok(false);
            }
            enc.expire(now).map(|_| true)
        });
        if let Ok(true) = expired {
            tracing::info!(encounter = id, "encounter expired with no participants");
            self.cancel_timers(id);
            self.bus.publish(EncounterSignal::Expired {
                encounter_id: id,
                timestamp: now,
            });
        }
    }

    /// External failure report: the defended structure was destroyed.
    pub fn fail(&self, id: EncounterId) -> Result<(), EngineError> {
        let now = self.clock.now();
        let summary = self.with_encounter(id, |enc| {
            enc.fail(now)?;
            Ok(self.finalize_failure(enc, now))
        })?;
        self.cancel_timers(id);
        self.bus.publish(EncounterSignal::Failed {
            encounter_id: id,
            timestamp: now,
        });
        self.persist(summary, now);
        Ok(())
    }

    // ─── Participant Actions ─────────────────────────────────────────────────

    pub fn join(&self, id: EncounterId, player: &PlayerSnapshot) -> Result<JoinOutcome, EngineError> {
        let now = self.clock.now();
        self.with_encounter(id, |enc| enc.join(player, now))
    }

    pub fn leave(&self, id: EncounterId, player_id: i64) -> Result<(), EngineError> {
        let now = self.clock.now();
        self.with_encounter(id, |enc| enc.leave(player_id, now))
    }

    /// Route one attack. Pool decrement, contribution increment, phase
    /// evaluation, and the terminal check all happen atomically under the
    /// encounter lock; signals and persistence follow after release.
    pub fn attack(
        &self,
        id: EncounterId,
        player_id: i64,
        damage: i64,
        critical: bool,
        source: &str,
    ) -> Result<AttackOutcome, EngineError> {
        let now = self.clock.now();
        let mut signals: Vec<EncounterSignal> = Vec::new();
        let mut summary: Option<HistorySummary> = None;

        let outcome = self.with_encounter(id, |enc| {
            let outcome = enc.attack(player_id, damage, critical, source, now)?;

            signals.push(EncounterSignal::ProgressUpdated {
                encounter_id: id,
                pool_remaining: outcome.pool_remaining,
                contributors: enc.ledger.len(),
                timestamp: now,
            });
            if let Some(change) = &outcome.phase_change {
                signals.push(EncounterSignal::PhaseChanged {
                    encounter_id: id,
                    new_phase_index: change.new_phase_index,
                    mechanics_delta: change.mechanics_delta.clone(),
                    timestamp: now,
                });
            }
            if outcome.terminal {
                let (loot, finished) = self.finalize_completed(enc, now);
                signals.push(EncounterSignal::Completed {
                    encounter_id: id,
                    mvp_id: loot.mvp_id,
                    loot,
                    timestamp: now,
                });
                summary = Some(finished);
            }
            Ok(outcome)
        })?;

        if outcome.terminal {
            self.cancel_timers(id);
        }
        for signal in signals {
            self.bus.publish(signal);
        }
        if let Some(summary) = summary {
            self.persist(summary, now);
        }
        Ok(outcome)
    }

    pub fn heal(
        &self,
        id: EncounterId,
        player_id: i64,
        target_id: i64,
        amount: i64,
        source: &str,
    ) -> Result<(), EngineError> {
        let now = self.clock.now();
        self.with_encounter(id, |enc| enc.heal(player_id, target_id, amount, source, now))
    }

    pub fn repair(
        &self,
        id: EncounterId,
        player_id: i64,
        amount: i64,
        source: &str,
    ) -> Result<(), EngineError> {
        let now = self.clock.now();
        self.with_encounter(id, |enc| enc.repair(player_id, amount, source, now))
    }

    /// Resolve an adversary ability (server/timer initiated as well as
    /// operator initiated).
    pub fn use_ability(
        &self,
        id: EncounterId,
        ability_id: &str,
    ) -> Result<AbilityOutcome, EngineError> {
        let now = self.clock.now();
        let outcome =
            self.with_encounter(id, |enc| abilities::resolve_ability(enc, ability_id, now))?;
        self.bus.publish(EncounterSignal::AbilityUsed {
            encounter_id: id,
            ability_id: outcome.ability_id.clone(),
            affected_participants: outcome.affected_participants.clone(),
            timestamp: now,
        });
        Ok(outcome)
    }

    // ─── Reads ───────────────────────────────────────────────────────────────

    /// Point-in-time copy; readers never hold the lock past the copy.
    pub fn get_state(&self, id: EncounterId) -> Result<EncounterSnapshot, EngineError> {
        self.with_encounter(id, |enc| Ok(enc.snapshot()))
    }

    pub fn list(&self, status: Option<EncounterStatus>) -> Vec<EncounterListing> {
        let encounters = match self.encounters.read() {
            Ok(map) => map,
            Err(_) => return Vec::new(),
        };
        let mut rows: Vec<EncounterListing> = encounters
            .values()
            .filter_map(|handle| {
                let enc = handle.lock().ok()?;
                if status.is_some_and(|s| s != enc.status) {
                    return None;
                }
                Some(EncounterListing {
                    id: enc.id,
                    definition_id: enc.definition.id.clone(),
                    display_name: enc.definition.display_name.clone(),
                    location: enc.location.clone(),
                    status: enc.status,
                    current_pool: enc.current_pool,
                    max_pool: enc.max_pool,
                    phase_index: enc.phase_index,
                    participants: enc.ledger.len(),
                })
            })
            .collect();
        rows.sort_by_key(|r| r.id);
        rows
    }

    // ─── Internals ───────────────────────────────────────────────────────────

    fn with_encounter<T>(
        &self,
        id: EncounterId,
        f: impl FnOnce(&mut Encounter) -> Result<T, EngineError>,
    ) -> Result<T, EngineError> {
        let handle = {
            let encounters = self
                .encounters
                .read()
                .map_err(|_| EngineError::ConcurrencyConflict)?;
            encounters
                .get(&id)
                .cloned()
                .ok_or(EngineError::EncounterNotFound(id))?
        };
        let mut enc = handle.lock().map_err(|_| EngineError::ConcurrencyConflict)?;
        f(&mut enc)
    }

    /// Runs at the `active → completed` transition, under the encounter
    /// lock: allocate loot from the frozen ledger, write each bundle back
    /// into its record, and build the immutable summary.
    fn finalize_completed(
        &self,
        enc: &mut Encounter,
        now: chrono::NaiveDateTime,
    ) -> (Arc<LootDistribution>, HistorySummary) {
        let seed = loot_seed(enc.id, now);
        let mut rng = StdRng::seed_from_u64(seed);
        let ctx = AllocationContext {
            definition: enc.definition.as_ref(),
            weights: self.config.score_weights,
            ranks: self.config.ranks,
            tiers: self.config.tier_multipliers,
        };
        let distribution = loot::allocate(&ctx, &enc.ledger, &mut rng);

        for record in enc.ledger.records_mut() {
            record.loot_received = distribution.rewards.get(&record.player_id).cloned();
        }

        let summary = HistorySummary::from_encounter(enc, &distribution, seed, now);
        (Arc::new(distribution), summary)
    }

    /// Failures persist a summary too, with an empty distribution but the
    /// MVP still computed from the ledger.
    fn finalize_failure(&self, enc: &Encounter, now: chrono::NaiveDateTime) -> HistorySummary {
        let total = enc.ledger.total_damage();
        let distribution = match enc.ledger.top_contributor() {
            Some(top) if total > 0 => LootDistribution {
                rewards: HashMap::new(),
                mvp_id: Some(top.player_id),
                mvp_contribution: top.damage_dealt as f64 / total as f64,
            },
            _ => LootDistribution::default(),
        };
        HistorySummary::from_encounter(enc, &distribution, 0, now)
    }

    fn persist(&self, summary: HistorySummary, now: chrono::NaiveDateTime) {
        let store = Arc::clone(&self.store);
        let recorder = self.recorder;
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    recorder.record(store.as_ref(), &summary, now);
                });
            }
            Err(_) => recorder.record(store.as_ref(), &summary, now),
        }
    }

    fn cancel_timers(&self, id: EncounterId) {
        let Ok(mut timers) = self.timers.lock() else {
            return;
        };
        if let Some(handles) = timers.remove(&id) {
            for handle in handles {
                handle.abort();
            }
        }
    }
}

impl Drop for EncounterRegistry {
    fn drop(&mut self) {
        if let Ok(mut timers) = self.timers.lock() {
            for handles in timers.values_mut() {
                for handle in handles.drain(..) {
                    handle.abort();
                }
            }
        }
    }
}

/// Seed derivation for the loot RNG: stable for a given encounter and end
/// time, recorded in the summary for replay.
fn loot_seed(id: EncounterId, ended_at: chrono::NaiveDateTime) -> u64 {
    let millis = ended_at.and_utc().timestamp_millis() as u64;
    id.rotate_left(32) ^ millis
}
