//! Participant ledger
//!
//! Per-encounter contribution records keyed by player id. The record
//! survives leave/rejoin: leaving only deactivates it, and a rejoin
//! reactivates the same record in place, so contribution counters are
//! monotonic for the lifetime of the encounter.

use chrono::NaiveDateTime;
use hashbrown::HashMap;
use incursion_types::PlayerSnapshot;

/// Contribution record for one player within one encounter.
#[derive(Debug, Clone)]
pub struct ParticipantRecord {
    pub player_id: i64,
    pub display_name: String,
    pub level: u16,
    pub joined_at: NaiveDateTime,
    pub left_at: Option<NaiveDateTime>,
    pub active: bool,

    pub current_hp: i32,
    pub max_hp: i32,

    // Monotonic contribution accumulators
    pub damage_dealt: i64,
    pub healing_done: i64,
    /// Repairs and other contributions not expressed as damage
    pub utility_score: i64,
    pub kills: u32,

    /// Attack attempts still blocked by an adversary stun
    pub stun_turns_remaining: u32,

    /// Filled exactly once, at completion
    pub loot_received: Option<crate::loot::RewardBundle>,
}

impl ParticipantRecord {
    fn new(player: &PlayerSnapshot, joined_at: NaiveDateTime) -> Self {
        Self {
            player_id: player.id,
            display_name: player.name.clone(),
            level: player.level,
            joined_at,
            left_at: None,
            active: true,
            current_hp: player.hp,
            max_hp: player.max_hp,
            damage_dealt: 0,
            healing_done: 0,
            utility_score: 0,
            kills: 0,
            stun_turns_remaining: 0,
            loot_received: None,
        }
    }

    pub fn is_alive(&self) -> bool {
        self.current_hp > 0
    }

    /// Apply incoming damage, clamped so hp never goes below zero.
    pub fn take_damage(&mut self, amount: i32) {
        self.current_hp = (self.current_hp - amount).max(0);
    }
}

/// All participant records for one encounter. Owned by the encounter and
/// mutated only under its lock.
#[derive(Debug, Clone, Default)]
pub struct ParticipantLedger {
    records: HashMap<i64, ParticipantRecord>,
}

/// What `join` did with the incoming player.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinOutcome {
    Created,
    Rejoined,
}

impl ParticipantLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a player. A returning player reactivates their existing
    /// record without touching its contribution counters.
    pub fn join(&mut self, player: &PlayerSnapshot, now: NaiveDateTime) -> JoinOutcome {
        match self.records.get_mut(&player.id) {
            Some(record) => {
                record.active = true;
                record.left_at = None;
                record.current_hp = player.hp;
                record.max_hp = player.max_hp;
                record.display_name = player.name.clone();
                JoinOutcome::Rejoined
            }
            None => {
                self.records.insert(player.id, ParticipantRecord::new(player, now));
                JoinOutcome::Created
            }
        }
    }

    /// Deactivate a record; contribution is retained for final allocation.
    /// Returns false if the player was never a participant.
    pub fn leave(&mut self, player_id: i64, now: NaiveDateTime) -> bool {
        match self.records.get_mut(&player_id) {
            Some(record) => {
                record.active = false;
                record.left_at = Some(now);
                true
            }
            None => false,
        }
    }

    pub fn get(&self, player_id: i64) -> Option<&ParticipantRecord> {
        self.records.get(&player_id)
    }

    pub fn get_mut(&mut self, player_id: i64) -> Option<&mut ParticipantRecord> {
        self.records.get_mut(&player_id)
    }

    pub fn contains(&self, player_id: i64) -> bool {
        self.records.contains_key(&player_id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> impl Iterator<Item = &ParticipantRecord> {
        self.records.values()
    }

    pub fn records_mut(&mut self) -> impl Iterator<Item = &mut ParticipantRecord> {
        self.records.values_mut()
    }

    pub fn active_records(&self) -> impl Iterator<Item = &ParticipantRecord> {
        self.records.values().filter(|r| r.active)
    }

    pub fn active_count(&self) -> usize {
        self.records.values().filter(|r| r.active).count()
    }

    pub fn total_damage(&self) -> i64 {
        self.records.values().map(|r| r.damage_dealt).sum()
    }

    /// Aggro pick: the active participant with the highest damage dealt.
    /// Ties break toward the lower player id so the pick is deterministic.
    pub fn aggro_target(&self) -> Option<&ParticipantRecord> {
        self.records
            .values()
            .filter(|r| r.active)
            .max_by(|a, b| {
                a.damage_dealt
                    .cmp(&b.damage_dealt)
                    .then(b.player_id.cmp(&a.player_id))
            })
    }

    /// Participant with the highest damage overall (active or not), for MVP.
    pub fn top_contributor(&self) -> Option<&ParticipantRecord> {
        self.records.values().max_by(|a, b| {
            a.damage_dealt
                .cmp(&b.damage_dealt)
                .then(b.player_id.cmp(&a.player_id))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(id: i64, name: &str) -> PlayerSnapshot {
        PlayerSnapshot {
            id,
            name: name.to_string(),
            level: 30,
            hp: 500,
            max_hp: 500,
        }
    }

    #[test]
    fn rejoin_keeps_contribution() {
        let mut ledger = ParticipantLedger::new();
        let now = NaiveDateTime::default();

        assert_eq!(ledger.join(&snapshot(1, "Ryn"), now), JoinOutcome::Created);
        ledger.get_mut(1).unwrap().damage_dealt += 400;
        assert!(ledger.leave(1, now));
        assert!(!ledger.get(1).unwrap().active);

        assert_eq!(ledger.join(&snapshot(1, "Ryn"), now), JoinOutcome::Rejoined);
        let record = ledger.get(1).unwrap();
        assert!(record.active);
        assert!(record.left_at.is_none());
        assert_eq!(record.damage_dealt, 400);
    }

    #[test]
    fn leave_unknown_player_is_reported() {
        let mut ledger = ParticipantLedger::new();
        assert!(!ledger.leave(42, NaiveDateTime::default()));
    }

    #[test]
    fn aggro_picks_highest_active_damage() {
        let mut ledger = ParticipantLedger::new();
        let now = NaiveDateTime::default();
        ledger.join(&snapshot(1, "a"), now);
        ledger.join(&snapshot(2, "b"), now);
        ledger.join(&snapshot(3, "c"), now);
        ledger.get_mut(1).unwrap().damage_dealt = 900;
        ledger.get_mut(2).unwrap().damage_dealt = 300;
        ledger.get_mut(3).unwrap().damage_dealt = 500;

        // Highest contributor leaves; aggro falls to the next active one
        ledger.leave(1, now);
        assert_eq!(ledger.aggro_target().unwrap().player_id, 3);
    }

    #[test]
    fn aggro_tie_breaks_to_lower_id() {
        let mut ledger = ParticipantLedger::new();
        let now = NaiveDateTime::default();
        ledger.join(&snapshot(7, "a"), now);
        ledger.join(&snapshot(2, "b"), now);
        ledger.get_mut(7).unwrap().damage_dealt = 100;
        ledger.get_mut(2).unwrap().damage_dealt = 100;
        assert_eq!(ledger.aggro_target().unwrap().player_id, 2);
    }

    #[test]
    fn hp_clamps_at_zero() {
        let mut ledger = ParticipantLedger::new();
        ledger.join(&snapshot(1, "a"), NaiveDateTime::default());
        let record = ledger.get_mut(1).unwrap();
        record.take_damage(9999);
        assert_eq!(record.current_hp, 0);
        assert!(!record.is_alive());
    }
}
