//! Loot allocation
//!
//! Pure computation from the final participant ledger to per-participant
//! reward bundles. Nothing in here touches engine state; the registry calls
//! `allocate` exactly once, at the `active → completed` transition, with a
//! frozen ledger and a seeded RNG so the distribution is reproducible from
//! the recorded seed.

use hashbrown::HashMap;
use incursion_types::{RankConfig, RankTier, ScoreWeights, TierMultipliers};
use rand::Rng;
use serde::{Deserialize, Serialize};

pub mod ranks;

use crate::definition::{EncounterDefinition, RewardRange};
use crate::encounter::ParticipantLedger;

/// One granted item stack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemGrant {
    pub item_id: String,
    pub amount: i64,
}

/// Everything one participant walks away with.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RewardBundle {
    pub items: Vec<ItemGrant>,
    pub xp: i64,
    pub gold: i64,
    /// Share of total damage, in 0.0..=1.0
    pub contribution: f64,
    /// Rank tier, only set by the ranked/defense variant
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rank: Option<RankTier>,
}

/// Full distribution for one completed encounter.
#[derive(Debug, Clone, Default)]
pub struct LootDistribution {
    /// player id → bundle
    pub rewards: HashMap<i64, RewardBundle>,
    pub mvp_id: Option<i64>,
    pub mvp_contribution: f64,
}

/// Inputs the allocator needs beyond the ledger. Rank thresholds, score
/// weights, and tier multipliers are configuration data, not engine logic.
#[derive(Debug, Clone, Copy)]
pub struct AllocationContext<'a> {
    pub definition: &'a EncounterDefinition,
    pub weights: ScoreWeights,
    pub ranks: RankConfig,
    pub tiers: TierMultipliers,
}

/// Random-table chance scaled by contribution, capped at certainty.
pub fn effective_chance(listed: f64, contribution: f64) -> f64 {
    (listed * (0.5 + contribution)).min(1.0)
}

/// Compute every participant's reward bundle from the final ledger.
///
/// Participants are visited in ascending player-id order so a given seed
/// always produces the same roll sequence. Contribution is
/// `damage_dealt / total_damage`, defined as 0 when nobody dealt damage.
pub fn allocate<R: Rng>(
    ctx: &AllocationContext<'_>,
    ledger: &ParticipantLedger,
    rng: &mut R,
) -> LootDistribution {
    let table = &ctx.definition.rewards;
    let total_damage = ledger.total_damage();

    let mut player_ids: Vec<i64> = ledger.records().map(|r| r.player_id).collect();
    player_ids.sort_unstable();

    // Ranked variant: classify before rolling so the multiplier is known
    let rank_by_player: HashMap<i64, RankTier> = if ctx.definition.ranked {
        ranks::classify_ledger(ledger, &ctx.weights, &ctx.ranks.thresholds)
    } else {
        HashMap::new()
    };

    let mut rewards = HashMap::with_capacity(player_ids.len());
    for player_id in player_ids {
        let Some(record) = ledger.get(player_id) else {
            continue;
        };
        let contribution = if total_damage > 0 {
            record.damage_dealt as f64 / total_damage as f64
        } else {
            0.0
        };

        let mut items = Vec::new();
        for entry in &table.guaranteed {
            if rng.r#gen::<f64>() < entry.chance {
                items.push(ItemGrant {
                    item_id: entry.item_id.clone(),
                    amount: entry.amount as i64,
                });
            }
        }
        for entry in &table.random {
            if rng.r#gen::<f64>() < effective_chance(entry.chance, contribution) {
                items.push(ItemGrant {
                    item_id: entry.item_id.clone(),
                    amount: roll_range(rng, entry.amount),
                });
            }
        }

        let mut xp = scaled_roll(rng, table.xp, contribution);
        let mut gold = scaled_roll(rng, table.gold, contribution);

        let rank = rank_by_player.get(&player_id).copied();
        if let Some(rank) = rank {
            let multiplier =
                ctx.ranks.multipliers.for_tier(rank) * ctx.tiers.for_tier(ctx.definition.tier);
            xp = (xp as f64 * multiplier).floor() as i64;
            gold = (gold as f64 * multiplier).floor() as i64;
        }

        rewards.insert(
            player_id,
            RewardBundle {
                items,
                xp,
                gold,
                contribution,
                rank,
            },
        );
    }

    let (mvp_id, mvp_contribution) = match ledger.top_contributor() {
        Some(top) if total_damage > 0 => (
            Some(top.player_id),
            top.damage_dealt as f64 / total_damage as f64,
        ),
        _ => (None, 0.0),
    };

    LootDistribution {
        rewards,
        mvp_id,
        mvp_contribution,
    }
}

/// `floor(uniform(range) * (0.3 + contribution))`
fn scaled_roll<R: Rng>(rng: &mut R, range: RewardRange, contribution: f64) -> i64 {
    let base = roll_range(rng, range);
    ((base as f64) * (0.3 + contribution)).floor() as i64
}

fn roll_range<R: Rng>(rng: &mut R, range: RewardRange) -> i64 {
    if range.max <= range.min {
        return range.min;
    }
    rng.gen_range(range.min..=range.max)
}
