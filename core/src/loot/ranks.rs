//! Rank classification for the ranked/defense variant
//!
//! Participants are ranked by their share of the total participation score:
//! a weighted sum of damage, kills, and utility, plus a survival bonus for
//! ending the encounter alive. Thresholds and weights are configuration.

use hashbrown::HashMap;
use incursion_types::{RankThresholds, RankTier, ScoreWeights};

use crate::encounter::{ParticipantLedger, ParticipantRecord};

/// Weighted participation score for one record.
pub fn participation_score(record: &ParticipantRecord, weights: &ScoreWeights) -> f64 {
    let mut score = record.damage_dealt as f64 * weights.damage
        + record.kills as f64 * weights.kills
        + record.utility_score as f64 * weights.utility;
    if record.active && record.is_alive() {
        score += weights.survival_bonus;
    }
    score
}

/// Tier for a share (in percent) of the total score.
pub fn classify(share_percent: f64, thresholds: &RankThresholds) -> RankTier {
    if share_percent >= thresholds.mvp {
        RankTier::Mvp
    } else if share_percent >= thresholds.hero {
        RankTier::Hero
    } else if share_percent >= thresholds.defender {
        RankTier::Defender
    } else if share_percent >= thresholds.participant {
        RankTier::Participant
    } else {
        RankTier::Spectator
    }
}

/// Classify every participant in the ledger. A zero total score makes
/// everyone a spectator.
pub fn classify_ledger(
    ledger: &ParticipantLedger,
    weights: &ScoreWeights,
    thresholds: &RankThresholds,
) -> HashMap<i64, RankTier> {
    let scores: Vec<(i64, f64)> = ledger
        .records()
        .map(|r| (r.player_id, participation_score(r, weights)))
        .collect();
    let total: f64 = scores.iter().map(|(_, s)| s).sum();

    scores
        .into_iter()
        .map(|(player_id, score)| {
            let share = if total > 0.0 { score / total * 100.0 } else { 0.0 };
            (player_id, classify(share, thresholds))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;
    use incursion_types::PlayerSnapshot;

    fn ledger_with_damage(damage: &[(i64, i64)]) -> ParticipantLedger {
        let mut ledger = ParticipantLedger::new();
        let now = NaiveDateTime::default();
        for &(id, dmg) in damage {
            ledger.join(
                &PlayerSnapshot {
                    id,
                    name: format!("p{id}"),
                    level: 50,
                    hp: 100,
                    max_hp: 100,
                },
                now,
            );
            ledger.get_mut(id).unwrap().damage_dealt = dmg;
        }
        ledger
    }

    #[test]
    fn classify_uses_threshold_boundaries_inclusively() {
        let t = RankThresholds::default();
        assert_eq!(classify(30.0, &t), RankTier::Mvp);
        assert_eq!(classify(29.9, &t), RankTier::Hero);
        assert_eq!(classify(20.0, &t), RankTier::Hero);
        assert_eq!(classify(10.0, &t), RankTier::Defender);
        assert_eq!(classify(5.0, &t), RankTier::Participant);
        assert_eq!(classify(4.9, &t), RankTier::Spectator);
    }

    #[test]
    fn survival_bonus_applies_only_to_living_actives() {
        let weights = ScoreWeights {
            damage: 1.0,
            kills: 0.0,
            utility: 0.0,
            survival_bonus: 100.0,
        };
        let mut ledger = ledger_with_damage(&[(1, 50)]);
        assert_eq!(
            participation_score(ledger.get(1).unwrap(), &weights),
            150.0
        );
        ledger.get_mut(1).unwrap().current_hp = 0;
        assert_eq!(participation_score(ledger.get(1).unwrap(), &weights), 50.0);
    }

    #[test]
    fn zero_total_score_is_all_spectators() {
        let weights = ScoreWeights {
            damage: 1.0,
            kills: 0.0,
            utility: 0.0,
            survival_bonus: 0.0,
        };
        let ledger = ledger_with_damage(&[(1, 0), (2, 0)]);
        let ranks = classify_ledger(&ledger, &weights, &RankThresholds::default());
        assert!(ranks.values().all(|&r| r == RankTier::Spectator));
    }

    #[test]
    fn dominant_contributor_ranks_mvp() {
        let ledger = ledger_with_damage(&[(1, 900), (2, 100)]);
        let weights = ScoreWeights {
            damage: 1.0,
            kills: 0.0,
            utility: 0.0,
            survival_bonus: 0.0,
        };
        let ranks = classify_ledger(&ledger, &weights, &RankThresholds::default());
        assert_eq!(ranks[&1], RankTier::Mvp);
        assert_eq!(ranks[&2], RankTier::Defender);
    }
}
