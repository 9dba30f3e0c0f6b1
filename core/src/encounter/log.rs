//! Append-only combat log
//!
//! Every resolved action inside an encounter appends one immutable entry with
//! a monotonically increasing sequence number. Entries are never rewritten;
//! the log is the audit trail the loot distribution can be checked against.

use chrono::NaiveDateTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActorKind {
    Participant,
    Adversary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    Attack,
    Ability,
    Heal,
    Repair,
}

/// One immutable line of the combat log.
#[derive(Debug, Clone)]
pub struct CombatLogEntry {
    pub sequence: u64,
    pub timestamp: NaiveDateTime,
    pub actor_id: i64,
    pub actor: ActorKind,
    pub action: ActionKind,
    /// Damage, healing, or repair amount depending on `action`
    pub amount: i64,
    pub critical: bool,
    /// Free-form source label (weapon, ability name) supplied by the caller
    pub source: String,
}

/// Ordered, append-only collection of log entries.
#[derive(Debug, Clone, Default)]
pub struct CombatLog {
    entries: Vec<CombatLogEntry>,
    next_sequence: u64,
}

impl CombatLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry, assigning it the next sequence number.
    pub fn append(
        &mut self,
        timestamp: NaiveDateTime,
        actor_id: i64,
        actor: ActorKind,
        action: ActionKind,
        amount: i64,
        critical: bool,
        source: impl Into<String>,
    ) -> u64 {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.entries.push(CombatLogEntry {
            sequence,
            timestamp,
            actor_id,
            actor,
            action,
            amount,
            critical,
            source: source.into(),
        });
        sequence
    }

    pub fn entries(&self) -> &[CombatLogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
