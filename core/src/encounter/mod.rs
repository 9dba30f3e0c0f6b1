//! Live encounter state
//!
//! One `Encounter` exists per running event. It owns the only mutable state
//! in the engine: the shared pool, the phase index, the mechanics overlay,
//! the ability cooldown table, the participant ledger, and the combat log.
//! All mutation happens under the registry's per-encounter lock, so every
//! method here can assume single-writer access.
//!
//! Status flow is strictly one-way:
//! `scheduled → announced → active → completed | failed`, with
//! `scheduled | announced → expired` when the join window lapses.

use std::sync::Arc;

use chrono::{Duration, NaiveDateTime};
use hashbrown::HashMap;
use incursion_types::PlayerSnapshot;

pub mod abilities;
pub mod ledger;
pub mod log;

pub use abilities::AbilityOutcome;
pub use ledger::{JoinOutcome, ParticipantLedger, ParticipantRecord};
pub use log::{ActionKind, ActorKind, CombatLog, CombatLogEntry};

use crate::definition::EncounterDefinition;
use crate::error::EngineError;

pub type EncounterId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EncounterStatus {
    Scheduled,
    Announced,
    Active,
    Completed,
    Failed,
    Expired,
}

impl EncounterStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Expired)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Scheduled => "scheduled",
            Self::Announced => "announced",
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Expired => "expired",
        }
    }
}

/// A phase escalation applied by the most recent pool mutation.
#[derive(Debug, Clone, PartialEq)]
pub struct PhaseTransition {
    /// 1-based phase index after the transition
    pub new_phase_index: usize,
    /// Mechanic tags newly unioned into the overlay
    pub mechanics_delta: Vec<String>,
}

/// Result of a resolved attack.
#[derive(Debug, Clone)]
pub struct AttackOutcome {
    pub pool_remaining: i64,
    pub phase_change: Option<PhaseTransition>,
    /// True exactly when this attack drove the pool to zero
    pub terminal: bool,
}

/// A damage-over-time effect still ticking on a participant.
#[derive(Debug, Clone)]
pub struct PendingDot {
    pub target_id: i64,
    pub amount_per_tick: i32,
    pub remaining_ticks: u32,
    pub next_tick_at: NaiveDateTime,
    pub ability_id: String,
}

#[derive(Debug, Clone)]
pub struct Encounter {
    pub id: EncounterId,
    pub definition: Arc<EncounterDefinition>,
    pub location: String,
    pub status: EncounterStatus,

    pub current_pool: i64,
    pub max_pool: i64,

    /// 0 = no threshold crossed; monotonic, never decreases
    pub phase_index: usize,
    /// Additive overlay of mechanic tags; never removed mid-encounter
    pub active_mechanics: Vec<String>,

    /// ability id → timestamp at which the ability is ready again
    pub cooldowns: HashMap<String, NaiveDateTime>,
    pending_dots: Vec<PendingDot>,
    dot_tick: Duration,

    pub spawned_at: NaiveDateTime,
    pub started_at: Option<NaiveDateTime>,
    pub ended_at: Option<NaiveDateTime>,

    pub ledger: ParticipantLedger,
    pub log: CombatLog,
}

impl Encounter {
    /// Build a fresh instance in `scheduled` status. `pool_modifier` is the
    /// spawn-time scaling supplied by external collaborators (defensive
    /// structure bonuses etc.); it is consumed here and never re-read.
    pub fn spawn(
        id: EncounterId,
        definition: Arc<EncounterDefinition>,
        location: String,
        pool_modifier: f64,
        dot_tick_secs: f32,
        now: NaiveDateTime,
    ) -> Self {
        let max_pool = ((definition.base_pool_size as f64) * pool_modifier).round() as i64;
        let max_pool = max_pool.max(1);
        Self {
            id,
            definition,
            location,
            status: EncounterStatus::Scheduled,
            current_pool: max_pool,
            max_pool,
            phase_index: 0,
            active_mechanics: Vec::new(),
            cooldowns: HashMap::new(),
            pending_dots: Vec::new(),
            dot_tick: Duration::milliseconds((dot_tick_secs * 1000.0) as i64),
            spawned_at: now,
            started_at: None,
            ended_at: None,
            ledger: ParticipantLedger::new(),
            log: CombatLog::new(),
        }
    }

    pub fn pool_percent(&self) -> f32 {
        if self.max_pool > 0 {
            (self.current_pool as f32 / self.max_pool as f32) * 100.0
        } else {
            0.0
        }
    }

    pub fn duration_seconds(&self) -> Option<i64> {
        let start = self.started_at?;
        let end = self.ended_at?;
        Some(end.signed_duration_since(start).num_seconds())
    }

    // ─── Status Transitions ──────────────────────────────────────────────────

    pub fn announce(&mut self) -> Result<(), EngineError> {
        self.require_status(EncounterStatus::Scheduled, "announce")?;
        self.status = EncounterStatus::Announced;
        Ok(())
    }

    pub fn activate(&mut self, now: NaiveDateTime) -> Result<(), EngineError> {
        self.require_status(EncounterStatus::Announced, "activate")?;
        self.status = EncounterStatus::Active;
        self.started_at = Some(now);
        Ok(())
    }

    /// The defended structure was destroyed, or an operator aborted the run.
    pub fn fail(&mut self, now: NaiveDateTime) -> Result<(), EngineError> {
        self.require_status(EncounterStatus::Active, "fail")?;
        self.status = EncounterStatus::Failed;
        self.ended_at = Some(now);
        Ok(())
    }

    /// Join-window lapse with nobody signed up. Only a pre-active instance
    /// can expire; anything else is left alone.
    pub fn expire(&mut self, now: NaiveDateTime) -> Result<(), EngineError> {
        match self.status {
            EncounterStatus::Scheduled | EncounterStatus::Announced => {
                self.status = EncounterStatus::Expired;
                self.ended_at = Some(now);
                Ok(())
            }
            status => Err(EngineError::InvalidState {
                action: "expire",
                status,
            }),
        }
    }

    fn require_status(
        &self,
        expected: EncounterStatus,
        action: &'static str,
    ) -> Result<(), EngineError> {
        if self.status == expected {
            Ok(())
        } else {
            Err(EngineError::InvalidState {
                action,
                status: self.status,
            })
        }
    }

    // ─── Participants ────────────────────────────────────────────────────────

    pub fn join(
        &mut self,
        player: &PlayerSnapshot,
        now: NaiveDateTime,
    ) -> Result<JoinOutcome, EngineError> {
        if self.status.is_terminal() {
            return Err(EngineError::InvalidState {
                action: "join",
                status: self.status,
            });
        }
        if player.level < self.definition.level_requirement {
            return Err(EngineError::LevelTooLow {
                level: player.level,
                required: self.definition.level_requirement,
            });
        }
        Ok(self.ledger.join(player, now))
    }

    pub fn leave(&mut self, player_id: i64, now: NaiveDateTime) -> Result<(), EngineError> {
        if !self.ledger.leave(player_id, now) {
            return Err(EngineError::NotAParticipant(player_id));
        }
        Ok(())
    }

    // ─── Attack Resolution ───────────────────────────────────────────────────

    /// Apply one participant attack as a single atomic unit: dot upkeep,
    /// stun gate, pool decrement, contribution increment, log append, phase
    /// evaluation, and the terminal check.
    pub fn attack(
        &mut self,
        player_id: i64,
        damage: i64,
        critical: bool,
        source: &str,
        now: NaiveDateTime,
    ) -> Result<AttackOutcome, EngineError> {
        self.require_status(EncounterStatus::Active, "attack")?;
        self.advance_dots(now);

        let record = self
            .ledger
            .get_mut(player_id)
            .filter(|r| r.active)
            .ok_or(EngineError::NotAParticipant(player_id))?;

        if record.stun_turns_remaining > 0 {
            record.stun_turns_remaining -= 1;
            return Err(EngineError::Stunned(player_id));
        }

        let damage = if damage < 0 {
            tracing::warn!(
                encounter = self.id,
                player = player_id,
                damage,
                "negative damage clamped to 0"
            );
            0
        } else {
            damage
        };

        record.damage_dealt += damage;
        self.current_pool = (self.current_pool - damage).max(0);
        self.log.append(
            now,
            player_id,
            ActorKind::Participant,
            ActionKind::Attack,
            damage,
            critical,
            source,
        );

        let phase_change = self.evaluate_phase_transition();

        let terminal = self.current_pool == 0;
        if terminal {
            self.status = EncounterStatus::Completed;
            self.ended_at = Some(now);
        }

        Ok(AttackOutcome {
            pool_remaining: self.current_pool,
            phase_change,
            terminal,
        })
    }

    /// Healing contribution. Does not touch the adversary pool.
    pub fn heal(
        &mut self,
        player_id: i64,
        target_id: i64,
        amount: i64,
        source: &str,
        now: NaiveDateTime,
    ) -> Result<(), EngineError> {
        self.require_status(EncounterStatus::Active, "heal")?;
        self.advance_dots(now);

        if !self.ledger.get(player_id).is_some_and(|r| r.active) {
            return Err(EngineError::NotAParticipant(player_id));
        }

        let amount = amount.max(0);
        if let Some(target) = self.ledger.get_mut(target_id) {
            target.current_hp = (target.current_hp + amount as i32).min(target.max_hp);
        }
        if let Some(record) = self.ledger.get_mut(player_id) {
            record.healing_done += amount;
        }
        self.log.append(
            now,
            player_id,
            ActorKind::Participant,
            ActionKind::Heal,
            amount,
            false,
            source,
        );
        Ok(())
    }

    /// Repair/utility contribution (defense variant structures etc.).
    pub fn repair(
        &mut self,
        player_id: i64,
        amount: i64,
        source: &str,
        now: NaiveDateTime,
    ) -> Result<(), EngineError> {
        self.require_status(EncounterStatus::Active, "repair")?;
        self.advance_dots(now);

        let record = self
            .ledger
            .get_mut(player_id)
            .filter(|r| r.active)
            .ok_or(EngineError::NotAParticipant(player_id))?;
        let amount = amount.max(0);
        record.utility_score += amount;
        self.log.append(
            now,
            player_id,
            ActorKind::Participant,
            ActionKind::Repair,
            amount,
            false,
            source,
        );
        Ok(())
    }

    // ─── Phase Evaluation ────────────────────────────────────────────────────

    /// Evaluate thresholds after a pool mutation. Monotonic and idempotent:
    /// replaying the same pool value never re-triggers an applied phase.
    /// When one hit crosses several thresholds at once, the index jumps to
    /// the deepest crossed phase and every skipped phase's mechanics are
    /// unioned in.
    fn evaluate_phase_transition(&mut self) -> Option<PhaseTransition> {
        let percent = self.pool_percent();
        let mut target_index = self.phase_index;
        let mut delta: Vec<String> = Vec::new();

        let definition = Arc::clone(&self.definition);
        for (position, (_, phase)) in definition.phases_descending().into_iter().enumerate() {
            let candidate = position + 1;
            if percent <= phase.threshold_percent && self.phase_index < candidate {
                for tag in &phase.mechanics {
                    if !self.active_mechanics.contains(tag) {
                        self.active_mechanics.push(tag.clone());
                        delta.push(tag.clone());
                    }
                }
                target_index = target_index.max(candidate);
            }
        }

        if target_index > self.phase_index {
            self.phase_index = target_index;
            Some(PhaseTransition {
                new_phase_index: target_index,
                mechanics_delta: delta,
            })
        } else {
            None
        }
    }

    // ─── Dots ────────────────────────────────────────────────────────────────

    pub(crate) fn register_dot(
        &mut self,
        target_id: i64,
        amount_per_tick: i32,
        ticks: u32,
        ability_id: &str,
        now: NaiveDateTime,
    ) {
        self.pending_dots.push(PendingDot {
            target_id,
            amount_per_tick,
            remaining_ticks: ticks,
            next_tick_at: now + self.dot_tick,
            ability_id: ability_id.to_string(),
        });
    }

    /// Deliver every dot tick that has come due. Called at the head of each
    /// mutating operation so dot damage lands in clock order without a
    /// dedicated timer task that could outlive the instance.
    pub(crate) fn advance_dots(&mut self, now: NaiveDateTime) {
        let tick = self.dot_tick;
        let mut deliveries: Vec<(i64, i32, String, NaiveDateTime)> = Vec::new();

        for dot in &mut self.pending_dots {
            while dot.remaining_ticks > 0 && dot.next_tick_at <= now {
                deliveries.push((
                    dot.target_id,
                    dot.amount_per_tick,
                    dot.ability_id.clone(),
                    dot.next_tick_at,
                ));
                dot.remaining_ticks -= 1;
                dot.next_tick_at += tick;
            }
        }
        self.pending_dots.retain(|d| d.remaining_ticks > 0);

        for (target_id, amount, ability_id, at) in deliveries {
            if let Some(target) = self.ledger.get_mut(target_id) {
                target.take_damage(amount);
            }
            self.log.append(
                at,
                target_id,
                ActorKind::Adversary,
                ActionKind::Ability,
                amount as i64,
                false,
                ability_id,
            );
        }
    }

    #[cfg(test)]
    pub(crate) fn pending_dot_count(&self) -> usize {
        self.pending_dots.len()
    }

    // ─── Snapshots ───────────────────────────────────────────────────────────

    /// Consistent point-in-time copy for reads; taken under the lock, served
    /// without it.
    pub fn snapshot(&self) -> EncounterSnapshot {
        EncounterSnapshot {
            id: self.id,
            definition_id: self.definition.id.clone(),
            display_name: self.definition.display_name.clone(),
            location: self.location.clone(),
            status: self.status,
            current_pool: self.current_pool,
            max_pool: self.max_pool,
            phase_index: self.phase_index,
            active_mechanics: self.active_mechanics.clone(),
            participants: self
                .ledger
                .records()
                .map(|r| ParticipantView {
                    player_id: r.player_id,
                    display_name: r.display_name.clone(),
                    active: r.active,
                    current_hp: r.current_hp,
                    max_hp: r.max_hp,
                    damage_dealt: r.damage_dealt,
                    healing_done: r.healing_done,
                    utility_score: r.utility_score,
                })
                .collect(),
            started_at: self.started_at,
            ended_at: self.ended_at,
        }
    }
}

/// Read-only view of one participant inside a snapshot.
#[derive(Debug, Clone)]
pub struct ParticipantView {
    pub player_id: i64,
    pub display_name: String,
    pub active: bool,
    pub current_hp: i32,
    pub max_hp: i32,
    pub damage_dealt: i64,
    pub healing_done: i64,
    pub utility_score: i64,
}

/// Read-only view of one encounter, safe to hand to UI code.
#[derive(Debug, Clone)]
pub struct EncounterSnapshot {
    pub id: EncounterId,
    pub definition_id: String,
    pub display_name: String,
    pub location: String,
    pub status: EncounterStatus,
    pub current_pool: i64,
    pub max_pool: i64,
    pub phase_index: usize,
    pub active_mechanics: Vec<String>,
    pub participants: Vec<ParticipantView>,
    pub started_at: Option<NaiveDateTime>,
    pub ended_at: Option<NaiveDateTime>,
}

#[cfg(test)]
mod engine_tests;
