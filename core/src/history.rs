//! Encounter history and achievements
//!
//! A `HistorySummary` is written exactly once per encounter, at its terminal
//! transition, and never mutated afterward. Achievement unlocks are
//! idempotent on the `(player, achievement)` pair: granting one a second
//! time is a no-op, not an error. Storage sits behind `HistoryStore` so the
//! engine never blocks on persistence technology; writes happen after the
//! terminal state is finalized and are best-effort.

use std::fs;
use std::io::Write as _;
use std::path::PathBuf;
use std::sync::Mutex;

use chrono::NaiveDateTime;
use hashbrown::HashSet;
use serde::{Deserialize, Serialize};

use crate::encounter::{Encounter, EncounterId, EncounterStatus};
use crate::loot::{LootDistribution, RewardBundle};

/// Terminal outcome of an encounter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Success,
    Failure,
}

/// Immutable record of a finished encounter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistorySummary {
    pub encounter_id: EncounterId,
    pub definition_id: String,
    pub outcome: Outcome,
    pub duration_seconds: i64,
    pub participant_ids: Vec<i64>,
    pub mvp_id: Option<i64>,
    /// MVP share of total damage, 0.0..=1.0
    pub mvp_contribution: f64,
    /// player id → bundle, snapshot of the distribution at completion
    pub loot: Vec<(i64, RewardBundle)>,
    /// RNG seed the allocator ran with; replaying it reproduces `loot`
    pub loot_seed: u64,
    /// ISO 8601 end time
    pub ended_at: String,
}

impl HistorySummary {
    /// Build the summary from a terminal encounter. Completed maps to
    /// success; failed and expired map to failure.
    pub fn from_encounter(
        encounter: &Encounter,
        loot: &LootDistribution,
        loot_seed: u64,
        ended_at: NaiveDateTime,
    ) -> Self {
        let outcome = if encounter.status == EncounterStatus::Completed {
            Outcome::Success
        } else {
            Outcome::Failure
        };
        let mut participant_ids: Vec<i64> =
            encounter.ledger.records().map(|r| r.player_id).collect();
        participant_ids.sort_unstable();

        let mut loot_rows: Vec<(i64, RewardBundle)> = loot
            .rewards
            .iter()
            .map(|(id, bundle)| (*id, bundle.clone()))
            .collect();
        loot_rows.sort_by_key(|(id, _)| *id);

        Self {
            encounter_id: encounter.id,
            definition_id: encounter.definition.id.clone(),
            outcome,
            duration_seconds: encounter.duration_seconds().unwrap_or(0),
            participant_ids,
            mvp_id: loot.mvp_id,
            mvp_contribution: loot.mvp_contribution,
            loot: loot_rows,
            loot_seed,
            ended_at: ended_at.format("%Y-%m-%dT%H:%M:%S").to_string(),
        }
    }
}

/// One idempotent achievement grant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AchievementUnlock {
    pub player_id: i64,
    pub achievement_id: String,
    pub unlocked_at: String,
}

/// Persistence boundary for terminal summaries and achievement unlocks.
pub trait HistoryStore: Send + Sync {
    fn record_summary(&self, summary: &HistorySummary);

    /// Returns true if the unlock is new, false if already held.
    fn grant_achievement(&self, player_id: i64, achievement_id: &str, now: NaiveDateTime) -> bool;

    fn summaries(&self) -> Vec<HistorySummary>;

    fn unlocks_for(&self, player_id: i64) -> Vec<AchievementUnlock>;
}

// ─────────────────────────────────────────────────────────────────────────────
// In-Memory Store
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct MemoryInner {
    summaries: Vec<HistorySummary>,
    unlocks: Vec<AchievementUnlock>,
    unlock_keys: HashSet<(i64, String)>,
}

/// Store used by tests and as the write-through cache for the JSON store.
#[derive(Debug, Default)]
pub struct MemoryHistoryStore {
    inner: Mutex<MemoryInner>,
}

impl MemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl HistoryStore for MemoryHistoryStore {
    fn record_summary(&self, summary: &HistorySummary) {
        let mut inner = self.inner.lock().expect("history lock poisoned");
        inner.summaries.push(summary.clone());
    }

    fn grant_achievement(&self, player_id: i64, achievement_id: &str, now: NaiveDateTime) -> bool {
        let mut inner = self.inner.lock().expect("history lock poisoned");
        if !inner
            .unlock_keys
            .insert((player_id, achievement_id.to_string()))
        {
            return false;
        }
        inner.unlocks.push(AchievementUnlock {
            player_id,
            achievement_id: achievement_id.to_string(),
            unlocked_at: now.format("%Y-%m-%dT%H:%M:%S").to_string(),
        });
        true
    }

    fn summaries(&self) -> Vec<HistorySummary> {
        self.inner.lock().expect("history lock poisoned").summaries.clone()
    }

    fn unlocks_for(&self, player_id: i64) -> Vec<AchievementUnlock> {
        self.inner
            .lock()
            .expect("history lock poisoned")
            .unlocks
            .iter()
            .filter(|u| u.player_id == player_id)
            .cloned()
            .collect()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// JSON-Lines Store
// ─────────────────────────────────────────────────────────────────────────────

/// Appends summaries to `history.jsonl` and unlocks to `achievements.jsonl`
/// under a data directory. Write failures are logged, never propagated; the
/// in-memory copy stays authoritative for the process lifetime.
#[derive(Debug)]
pub struct JsonHistoryStore {
    dir: PathBuf,
    memory: MemoryHistoryStore,
}

impl JsonHistoryStore {
    pub fn new(dir: PathBuf) -> Self {
        Self {
            dir,
            memory: MemoryHistoryStore::new(),
        }
    }

    fn append_line<T: Serialize>(&self, file: &str, row: &T) {
        let path = self.dir.join(file);
        let result = (|| -> std::io::Result<()> {
            fs::create_dir_all(&self.dir)?;
            let line = serde_json::to_string(row)
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
            let mut f = fs::OpenOptions::new().create(true).append(true).open(&path)?;
            writeln!(f, "{line}")?;
            Ok(())
        })();
        if let Err(e) = result {
            tracing::warn!(path = %path.display(), error = %e, "history write failed");
        }
    }
}

impl HistoryStore for JsonHistoryStore {
    fn record_summary(&self, summary: &HistorySummary) {
        self.memory.record_summary(summary);
        self.append_line("history.jsonl", summary);
    }

    fn grant_achievement(&self, player_id: i64, achievement_id: &str, now: NaiveDateTime) -> bool {
        let granted = self.memory.grant_achievement(player_id, achievement_id, now);
        if granted {
            self.append_line(
                "achievements.jsonl",
                &AchievementUnlock {
                    player_id,
                    achievement_id: achievement_id.to_string(),
                    unlocked_at: now.format("%Y-%m-%dT%H:%M:%S").to_string(),
                },
            );
        }
        granted
    }

    fn summaries(&self) -> Vec<HistorySummary> {
        self.memory.summaries()
    }

    fn unlocks_for(&self, player_id: i64) -> Vec<AchievementUnlock> {
        self.memory.unlocks_for(player_id)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Recorder
// ─────────────────────────────────────────────────────────────────────────────

/// Applies the deterministic achievement rules and writes the summary row.
/// Stateless: the store is the idempotence authority for unlocks.
#[derive(Debug, Clone, Copy, Default)]
pub struct HistoryRecorder;

impl HistoryRecorder {
    pub fn new() -> Self {
        Self
    }

    /// Persist one terminal summary and grant rule-based achievements:
    /// `first-clear:<definition>` to every participant on success, and
    /// `mvp:<definition>` to the highest contributor on success.
    pub fn record(&self, store: &dyn HistoryStore, summary: &HistorySummary, now: NaiveDateTime) {
        store.record_summary(summary);

        if summary.outcome != Outcome::Success {
            return;
        }

        let first_clear = format!("first-clear:{}", summary.definition_id);
        for &player_id in &summary.participant_ids {
            store.grant_achievement(player_id, &first_clear, now);
        }

        if let Some(mvp_id) = summary.mvp_id {
            let mvp_achievement = format!("mvp:{}", summary.definition_id);
            store.grant_achievement(mvp_id, &mvp_achievement, now);
        }

        tracing::info!(
            encounter = summary.encounter_id,
            definition = %summary.definition_id,
            outcome = ?summary.outcome,
            "history recorded"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(encounter_id: u64, participants: &[i64], mvp: Option<i64>) -> HistorySummary {
        HistorySummary {
            encounter_id,
            definition_id: "colossus".to_string(),
            outcome: Outcome::Success,
            duration_seconds: 120,
            participant_ids: participants.to_vec(),
            mvp_id: mvp,
            mvp_contribution: 0.8,
            loot: Vec::new(),
            loot_seed: 1,
            ended_at: "2026-01-01T00:00:00".to_string(),
        }
    }

    #[test]
    fn granting_twice_yields_one_unlock() {
        let store = MemoryHistoryStore::new();
        let now = NaiveDateTime::default();
        assert!(store.grant_achievement(1, "first-clear:colossus", now));
        assert!(!store.grant_achievement(1, "first-clear:colossus", now));
        assert_eq!(store.unlocks_for(1).len(), 1);
    }

    #[test]
    fn recorder_grants_first_clear_and_mvp() {
        let store = MemoryHistoryStore::new();
        let recorder = HistoryRecorder::new();
        let now = NaiveDateTime::default();

        recorder.record(&store, &summary(1, &[1, 2], Some(1)), now);
        let unlocks: Vec<String> = store
            .unlocks_for(1)
            .into_iter()
            .map(|u| u.achievement_id)
            .collect();
        assert!(unlocks.contains(&"first-clear:colossus".to_string()));
        assert!(unlocks.contains(&"mvp:colossus".to_string()));
        assert_eq!(store.unlocks_for(2).len(), 1);

        // A second clear of the same definition adds no new unlocks
        recorder.record(&store, &summary(2, &[1, 2], Some(1)), now);
        assert_eq!(store.unlocks_for(1).len(), 2);
        assert_eq!(store.summaries().len(), 2);
    }

    #[test]
    fn failures_record_summary_without_achievements() {
        let store = MemoryHistoryStore::new();
        let recorder = HistoryRecorder::new();
        let mut s = summary(1, &[1], Some(1));
        s.outcome = Outcome::Failure;
        recorder.record(&store, &s, NaiveDateTime::default());
        assert_eq!(store.summaries().len(), 1);
        assert!(store.unlocks_for(1).is_empty());
    }
}
