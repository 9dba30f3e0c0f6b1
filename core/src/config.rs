//! Engine configuration
//!
//! Timings, spawn policy, and the reward-tuning knobs the loot allocator
//! treats as data. Loaded through confy so operators can override defaults
//! without a rebuild.

use incursion_types::{RankConfig, ScoreWeights, TierMultipliers};
use serde::{Deserialize, Serialize};

/// Duplicate-active policy for `spawn`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpawnPolicy {
    /// At most one non-terminal instance per definition (default)
    #[default]
    PerDefinition,
    /// Concurrent instances allowed when they differ by location
    PerLocation,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Seconds between announce and activation
    #[serde(default = "default_countdown")]
    pub announce_countdown_secs: f32,

    /// Seconds a pre-active encounter waits for a first join before expiring
    #[serde(default = "default_join_window")]
    pub join_window_secs: f32,

    /// Seconds between dot ticks
    #[serde(default = "default_dot_tick")]
    pub dot_tick_secs: f32,

    #[serde(default)]
    pub spawn_policy: SpawnPolicy,

    #[serde(default)]
    pub score_weights: ScoreWeights,

    #[serde(default)]
    pub ranks: RankConfig,

    #[serde(default)]
    pub tier_multipliers: TierMultipliers,
}

fn default_countdown() -> f32 {
    60.0
}

fn default_join_window() -> f32 {
    300.0
}

fn default_dot_tick() -> f32 {
    3.0
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            announce_countdown_secs: default_countdown(),
            join_window_secs: default_join_window(),
            dot_tick_secs: default_dot_tick(),
            spawn_policy: SpawnPolicy::default(),
            score_weights: ScoreWeights::default(),
            ranks: RankConfig::default(),
            tier_multipliers: TierMultipliers::default(),
        }
    }
}

impl EngineConfig {
    pub fn load() -> Self {
        confy::load("incursion", None).unwrap_or_default()
    }

    pub fn save(self) -> Result<(), confy::ConfyError> {
        confy::store("incursion", None, self)
    }
}
