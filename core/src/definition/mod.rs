//! Encounter definition types
//!
//! Definitions are immutable templates loaded from TOML config files. They
//! describe a scripted adversary: its pool size, phase escalation thresholds,
//! ability kit, level gate, and reward table. Nothing in here mutates at
//! runtime; live state lives in [`crate::encounter`].

use serde::{Deserialize, Serialize};

mod loader;

pub use loader::{DefinitionError, DefinitionStore, load_definitions_from_dir, load_definitions_from_file};

// ═══════════════════════════════════════════════════════════════════════════
// Root Config Structure
// ═══════════════════════════════════════════════════════════════════════════

/// File-level metadata for consolidated definition files.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegionConfig {
    /// Display name of the region the encounters belong to (e.g., "Emberhold")
    pub name: String,

    /// Default tier applied to encounters in the file that don't set one
    #[serde(default)]
    pub tier: Option<u8>,
}

/// Root structure for definition files (TOML).
/// A file can contain one or more encounter definitions:
/// ```toml
/// [region]
/// name = "Emberhold"
/// tier = 2
///
/// [[encounter]]
/// id = "ashen_colossus"
/// ...
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DefinitionConfig {
    #[serde(default)]
    pub region: Option<RegionConfig>,

    #[serde(default, rename = "encounter")]
    pub encounters: Vec<EncounterDefinition>,
}

// ═══════════════════════════════════════════════════════════════════════════
// Encounter Definition
// ═══════════════════════════════════════════════════════════════════════════

/// Immutable template an encounter instance is spawned from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncounterDefinition {
    /// Unique identifier (e.g., "ashen_colossus")
    pub id: String,

    /// Display name
    pub display_name: String,

    /// Difficulty tier, ordinal 1..=4
    #[serde(default = "default_tier")]
    pub tier: u8,

    /// Shared health pool before spawn-time modifiers
    pub base_pool_size: i64,

    /// Minimum player level to join
    #[serde(default)]
    pub level_requirement: u16,

    /// Phase escalations, stored by descending threshold
    #[serde(default, alias = "phase")]
    pub phases: Vec<PhaseDefinition>,

    /// Adversary ability kit
    #[serde(default, alias = "ability")]
    pub abilities: Vec<AbilityDefinition>,

    /// Reward table consumed by the loot allocator
    #[serde(default)]
    pub rewards: RewardTable,

    /// Time-boxed defense variant: rewards use rank-tier classification
    #[serde(default)]
    pub ranked: bool,
}

pub(crate) fn default_tier() -> u8 {
    1
}

impl EncounterDefinition {
    /// Get an ability by id
    pub fn ability(&self, ability_id: &str) -> Option<&AbilityDefinition> {
        self.abilities.iter().find(|a| a.id == ability_id)
    }

    /// Phases ordered by descending threshold, paired with their 0-based
    /// definition index. Evaluation order for transition checks.
    pub fn phases_descending(&self) -> Vec<(usize, &PhaseDefinition)> {
        let mut phases: Vec<(usize, &PhaseDefinition)> = self.phases.iter().enumerate().collect();
        phases.sort_by(|(_, a), (_, b)| {
            b.threshold_percent
                .partial_cmp(&a.threshold_percent)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        phases
    }

    /// Structural problems a definition file author should fix. Empty means
    /// the definition is usable.
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();

        if self.id.is_empty() {
            problems.push("missing id".to_string());
        }
        if self.base_pool_size <= 0 {
            problems.push(format!("base_pool_size must be positive, got {}", self.base_pool_size));
        }
        if !(1..=4).contains(&self.tier) {
            problems.push(format!("tier must be 1..=4, got {}", self.tier));
        }

        let mut last_threshold = f32::INFINITY;
        for (i, phase) in self.phases.iter().enumerate() {
            if !(0.0..=100.0).contains(&phase.threshold_percent) {
                problems.push(format!(
                    "phase {} threshold {} outside 0..=100",
                    i, phase.threshold_percent
                ));
            }
            if phase.threshold_percent >= last_threshold {
                problems.push(format!(
                    "phase {} threshold {} not strictly below the previous ({})",
                    i, phase.threshold_percent, last_threshold
                ));
            }
            last_threshold = phase.threshold_percent;
        }

        let mut seen_abilities = std::collections::HashSet::new();
        for ability in &self.abilities {
            if !seen_abilities.insert(ability.id.as_str()) {
                problems.push(format!("duplicate ability id '{}'", ability.id));
            }
            if ability.cooldown_secs < 0.0 {
                problems.push(format!(
                    "ability '{}' has negative cooldown {}",
                    ability.id, ability.cooldown_secs
                ));
            }
        }

        for entry in &self.rewards.guaranteed {
            if !(0.0..=1.0).contains(&entry.chance) {
                problems.push(format!(
                    "guaranteed reward '{}' chance {} outside 0..=1",
                    entry.item_id, entry.chance
                ));
            }
        }
        for entry in &self.rewards.random {
            if !(0.0..=1.0).contains(&entry.chance) {
                problems.push(format!(
                    "random reward '{}' chance {} outside 0..=1",
                    entry.item_id, entry.chance
                ));
            }
            if entry.amount.min > entry.amount.max {
                problems.push(format!(
                    "random reward '{}' range {}..{} is inverted",
                    entry.item_id, entry.amount.min, entry.amount.max
                ));
            }
        }
        if self.rewards.xp.min > self.rewards.xp.max {
            problems.push("xp range is inverted".to_string());
        }
        if self.rewards.gold.min > self.rewards.gold.max {
            problems.push("gold range is inverted".to_string());
        }

        problems
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Phases
// ═══════════════════════════════════════════════════════════════════════════

/// A scripted escalation tier, activated when the shared pool drops to or
/// below its threshold. Mechanics are additive: crossing a phase unions its
/// tags into the encounter's active-mechanics overlay for the rest of the
/// fight.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseDefinition {
    /// Pool percentage (0..=100) at or below which this phase activates
    pub threshold_percent: f32,

    /// Mechanic tags switched on by this phase (interpreted by clients)
    #[serde(default)]
    pub mechanics: Vec<String>,
}

// ═══════════════════════════════════════════════════════════════════════════
// Abilities
// ═══════════════════════════════════════════════════════════════════════════

/// Who an adversary ability strikes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Targeting {
    /// The active participant with the highest damage dealt (aggro)
    Single,
    /// Every currently active participant
    Area,
}

/// What an ability does on hit. Closed set, matched exhaustively.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AbilityEffect {
    Damage { amount: i32 },
    AreaDamage { amount: i32, radius: f32 },
    Dot { amount_per_tick: i32, ticks: u32 },
    Stun { turns: u32 },
}

/// An adversary-side special action, cooldown-gated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AbilityDefinition {
    /// Unique identifier within the encounter (e.g., "molten_slam")
    pub id: String,

    /// Display name
    pub name: String,

    /// Seconds before the ability can fire again
    pub cooldown_secs: f32,

    pub targeting: Targeting,

    /// Raw power rating, carried to clients and the combat log
    #[serde(default)]
    pub base_power: i32,

    pub effect: AbilityEffect,
}

// ═══════════════════════════════════════════════════════════════════════════
// Rewards
// ═══════════════════════════════════════════════════════════════════════════

/// Inclusive integer range for rolled amounts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardRange {
    pub min: i64,
    pub max: i64,
}

impl RewardRange {
    pub fn new(min: i64, max: i64) -> Self {
        Self { min, max }
    }
}

/// Reward rolled independently per participant at its listed chance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuaranteedReward {
    pub item_id: String,
    pub chance: f64,
    #[serde(default = "default_amount")]
    pub amount: u32,
}

fn default_amount() -> u32 {
    1
}

/// Reward whose listed chance is scaled by the participant's contribution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomReward {
    pub item_id: String,
    pub chance: f64,
    pub amount: RewardRange,
}

/// Full reward table for an encounter definition.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RewardTable {
    #[serde(default)]
    pub guaranteed: Vec<GuaranteedReward>,

    #[serde(default)]
    pub random: Vec<RandomReward>,

    #[serde(default)]
    pub xp: RewardRange,

    #[serde(default)]
    pub gold: RewardRange,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_definition() -> EncounterDefinition {
        EncounterDefinition {
            id: "test".to_string(),
            display_name: "Test".to_string(),
            tier: 1,
            base_pool_size: 100,
            level_requirement: 0,
            phases: Vec::new(),
            abilities: Vec::new(),
            rewards: RewardTable::default(),
            ranked: false,
        }
    }

    #[test]
    fn phases_descending_sorts_by_threshold() {
        let mut def = minimal_definition();
        def.phases = vec![
            PhaseDefinition {
                threshold_percent: 25.0,
                mechanics: vec![],
            },
            PhaseDefinition {
                threshold_percent: 75.0,
                mechanics: vec![],
            },
            PhaseDefinition {
                threshold_percent: 50.0,
                mechanics: vec![],
            },
        ];
        let ordered: Vec<f32> = def
            .phases_descending()
            .iter()
            .map(|(_, p)| p.threshold_percent)
            .collect();
        assert_eq!(ordered, vec![75.0, 50.0, 25.0]);
    }

    #[test]
    fn validate_flags_bad_thresholds_and_chances() {
        let mut def = minimal_definition();
        def.phases = vec![
            PhaseDefinition {
                threshold_percent: 50.0,
                mechanics: vec![],
            },
            PhaseDefinition {
                threshold_percent: 50.0,
                mechanics: vec![],
            },
        ];
        def.rewards.guaranteed.push(GuaranteedReward {
            item_id: "relic".to_string(),
            chance: 1.5,
            amount: 1,
        });
        let problems = def.validate();
        assert!(problems.iter().any(|p| p.contains("not strictly below")));
        assert!(problems.iter().any(|p| p.contains("chance 1.5")));
    }

    #[test]
    fn validate_accepts_well_formed_definition() {
        let mut def = minimal_definition();
        def.phases = vec![
            PhaseDefinition {
                threshold_percent: 50.0,
                mechanics: vec!["enrage".to_string()],
            },
            PhaseDefinition {
                threshold_percent: 20.0,
                mechanics: vec![],
            },
        ];
        assert!(def.validate().is_empty());
    }

    #[test]
    fn ability_effect_toml_round_trip() {
        let toml_src = r#"
            id = "molten_slam"
            name = "Molten Slam"
            cooldown_secs = 30.0
            targeting = "single"
            base_power = 120

            [effect]
            kind = "dot"
            amount_per_tick = 15
            ticks = 4
        "#;
        let ability: AbilityDefinition = toml::from_str(toml_src).expect("parse ability");
        assert_eq!(ability.targeting, Targeting::Single);
        assert_eq!(
            ability.effect,
            AbilityEffect::Dot {
                amount_per_tick: 15,
                ticks: 4
            }
        );
    }
}
