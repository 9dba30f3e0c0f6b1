//! Shared configuration types for Incursion
//!
//! This crate contains serializable types that are shared between the engine
//! (incursion-core) and the tool binaries (admin console, validator). Reward
//! tuning lives here as configuration data, not engine logic.

use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────────────────────────────────────
// Player Snapshot
// ─────────────────────────────────────────────────────────────────────────────

/// Point-in-time view of a player supplied by the session layer on `join`.
/// The engine copies what it needs into the participant ledger and never
/// reads the player again.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerSnapshot {
    pub id: i64,
    pub name: String,
    pub level: u16,
    pub hp: i32,
    pub max_hp: i32,
}

// ─────────────────────────────────────────────────────────────────────────────
// Reward Ranks (defense/ranked variant)
// ─────────────────────────────────────────────────────────────────────────────

/// Rank tier a participant is classified into at the end of a ranked
/// (defense) encounter, by share of total participation score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankTier {
    Mvp,
    Hero,
    Defender,
    Participant,
    Spectator,
}

impl RankTier {
    /// All tiers from highest to lowest.
    pub const ALL: [RankTier; 5] = [
        RankTier::Mvp,
        RankTier::Hero,
        RankTier::Defender,
        RankTier::Participant,
        RankTier::Spectator,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            RankTier::Mvp => "MVP",
            RankTier::Hero => "Hero",
            RankTier::Defender => "Defender",
            RankTier::Participant => "Participant",
            RankTier::Spectator => "Spectator",
        }
    }
}

/// Minimum share of total participation score (in percent) required for
/// each rank tier. Anything below `participant` is a spectator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RankThresholds {
    pub mvp: f64,
    pub hero: f64,
    pub defender: f64,
    pub participant: f64,
}

impl Default for RankThresholds {
    fn default() -> Self {
        Self {
            mvp: 30.0,
            hero: 20.0,
            defender: 10.0,
            participant: 5.0,
        }
    }
}

/// Reward multiplier applied per rank tier, on top of the encounter tier
/// (difficulty) multiplier.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RankMultipliers {
    pub mvp: f64,
    pub hero: f64,
    pub defender: f64,
    pub participant: f64,
    pub spectator: f64,
}

impl Default for RankMultipliers {
    fn default() -> Self {
        Self {
            mvp: 2.0,
            hero: 1.5,
            defender: 1.2,
            participant: 1.0,
            spectator: 1.0,
        }
    }
}

impl RankMultipliers {
    pub fn for_tier(&self, tier: RankTier) -> f64 {
        match tier {
            RankTier::Mvp => self.mvp,
            RankTier::Hero => self.hero,
            RankTier::Defender => self.defender,
            RankTier::Participant => self.participant,
            RankTier::Spectator => self.spectator,
        }
    }
}

/// Rank classification configuration for the ranked/defense variant.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RankConfig {
    #[serde(default)]
    pub thresholds: RankThresholds,
    #[serde(default)]
    pub multipliers: RankMultipliers,
}

// ─────────────────────────────────────────────────────────────────────────────
// Participation Score Weights
// ─────────────────────────────────────────────────────────────────────────────

/// Weights for the participation score used by rank classification.
///
/// `score = damage_dealt * damage + kills * kills + utility_score * utility
///        + survival_bonus (if the participant ended the encounter alive)`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreWeights {
    pub damage: f64,
    pub kills: f64,
    pub utility: f64,
    pub survival_bonus: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            damage: 1.0,
            kills: 50.0,
            utility: 2.0,
            survival_bonus: 100.0,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Encounter Tier Multipliers
// ─────────────────────────────────────────────────────────────────────────────

/// Difficulty multiplier per encounter tier (ordinal 1..=4).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TierMultipliers(pub [f64; 4]);

impl Default for TierMultipliers {
    fn default() -> Self {
        Self([1.0, 1.25, 1.5, 2.0])
    }
}

impl TierMultipliers {
    /// Multiplier for a 1-based tier ordinal. Out-of-range tiers clamp to
    /// the nearest defined tier.
    pub fn for_tier(&self, tier: u8) -> f64 {
        let idx = (tier.max(1) as usize - 1).min(self.0.len() - 1);
        self.0[idx]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_multiplier_clamps_out_of_range() {
        let tiers = TierMultipliers::default();
        assert_eq!(tiers.for_tier(0), tiers.0[0]);
        assert_eq!(tiers.for_tier(1), tiers.0[0]);
        assert_eq!(tiers.for_tier(4), tiers.0[3]);
        assert_eq!(tiers.for_tier(9), tiers.0[3]);
    }

    #[test]
    fn rank_multiplier_lookup() {
        let m = RankMultipliers::default();
        assert_eq!(m.for_tier(RankTier::Mvp), 2.0);
        assert_eq!(m.for_tier(RankTier::Spectator), 1.0);
    }
}
