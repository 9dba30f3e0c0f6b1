//! Tests for the encounter state machine and ability resolution
//!
//! Verifies that:
//! - The pool stays in [0, max] and is non-increasing under attacks
//! - Phase transitions are monotonic and idempotent
//! - Leave/rejoin preserves contribution
//! - Cooldowns, targeting, dots, and stuns behave per definition

use std::sync::Arc;

use chrono::{Duration, NaiveDateTime};
use incursion_types::PlayerSnapshot;

use super::abilities::resolve_ability;
use super::{ActorKind, Encounter, EncounterStatus, JoinOutcome};
use crate::definition::{
    AbilityDefinition, AbilityEffect, EncounterDefinition, PhaseDefinition, RewardTable, Targeting,
};
use crate::error::EngineError;

// ═══════════════════════════════════════════════════════════════════════════
// Test Helpers
// ═══════════════════════════════════════════════════════════════════════════

fn t(secs: i64) -> NaiveDateTime {
    NaiveDateTime::default() + Duration::seconds(secs)
}

fn player(id: i64) -> PlayerSnapshot {
    PlayerSnapshot {
        id,
        name: format!("player-{id}"),
        level: 30,
        hp: 500,
        max_hp: 500,
    }
}

fn definition(pool: i64, phases: &[(f32, &[&str])]) -> Arc<EncounterDefinition> {
    Arc::new(EncounterDefinition {
        id: "colossus".to_string(),
        display_name: "The Ashen Colossus".to_string(),
        tier: 2,
        base_pool_size: pool,
        level_requirement: 10,
        phases: phases
            .iter()
            .map(|(threshold, mechanics)| PhaseDefinition {
                threshold_percent: *threshold,
                mechanics: mechanics.iter().map(|m| m.to_string()).collect(),
            })
            .collect(),
        abilities: vec![
            AbilityDefinition {
                id: "molten_slam".to_string(),
                name: "Molten Slam".to_string(),
                cooldown_secs: 30.0,
                targeting: Targeting::Single,
                base_power: 120,
                effect: AbilityEffect::Damage { amount: 120 },
            },
            AbilityDefinition {
                id: "ash_storm".to_string(),
                name: "Ash Storm".to_string(),
                cooldown_secs: 45.0,
                targeting: Targeting::Area,
                base_power: 60,
                effect: AbilityEffect::AreaDamage {
                    amount: 60,
                    radius: 12.0,
                },
            },
            AbilityDefinition {
                id: "smoldering_brand".to_string(),
                name: "Smoldering Brand".to_string(),
                cooldown_secs: 20.0,
                targeting: Targeting::Single,
                effect: AbilityEffect::Dot {
                    amount_per_tick: 10,
                    ticks: 2,
                },
                base_power: 20,
            },
            AbilityDefinition {
                id: "concussive_roar".to_string(),
                name: "Concussive Roar".to_string(),
                cooldown_secs: 60.0,
                targeting: Targeting::Single,
                base_power: 0,
                effect: AbilityEffect::Stun { turns: 2 },
            },
        ],
        rewards: RewardTable::default(),
        ranked: false,
    })
}

/// Active encounter with the given players already joined.
fn active_encounter(pool: i64, phases: &[(f32, &[&str])], players: &[i64]) -> Encounter {
    let mut enc = Encounter::spawn(1, definition(pool, phases), "ember_wastes".to_string(), 1.0, 1.0, t(0));
    for &id in players {
        enc.join(&player(id), t(0)).expect("join");
    }
    enc.announce().expect("announce");
    enc.activate(t(0)).expect("activate");
    enc
}

// ═══════════════════════════════════════════════════════════════════════════
// State Machine
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn attack_outside_active_is_rejected() {
    let mut enc = Encounter::spawn(1, definition(100, &[]), "w".to_string(), 1.0, 1.0, t(0));
    enc.join(&player(1), t(0)).expect("join");
    let err = enc.attack(1, 10, false, "sword", t(1)).unwrap_err();
    assert!(matches!(err, EngineError::InvalidState { .. }));
}

#[test]
fn attack_requires_active_participant() {
    let mut enc = active_encounter(100, &[], &[1]);
    let err = enc.attack(99, 10, false, "sword", t(1)).unwrap_err();
    assert!(matches!(err, EngineError::NotAParticipant(99)));

    enc.leave(1, t(1)).expect("leave");
    let err = enc.attack(1, 10, false, "sword", t(2)).unwrap_err();
    assert!(matches!(err, EngineError::NotAParticipant(1)));
}

#[test]
fn transitions_are_one_way() {
    let mut enc = Encounter::spawn(1, definition(100, &[]), "w".to_string(), 1.0, 1.0, t(0));
    assert!(enc.announce().is_ok());
    assert!(enc.announce().is_err());
    assert!(enc.activate(t(1)).is_ok());
    assert!(enc.activate(t(1)).is_err());
    // An active encounter cannot expire
    assert!(enc.expire(t(2)).is_err());
    assert!(enc.fail(t(2)).is_ok());
    assert_eq!(enc.status, EncounterStatus::Failed);
    assert!(enc.fail(t(3)).is_err());
}

#[test]
fn expire_only_before_activation() {
    let mut enc = Encounter::spawn(1, definition(100, &[]), "w".to_string(), 1.0, 1.0, t(0));
    assert!(enc.expire(t(5)).is_ok());
    assert_eq!(enc.status, EncounterStatus::Expired);

    let mut enc = Encounter::spawn(2, definition(100, &[]), "w".to_string(), 1.0, 1.0, t(0));
    enc.announce().expect("announce");
    assert!(enc.expire(t(5)).is_ok());
}

#[test]
fn join_gates_on_level() {
    let mut enc = active_encounter(100, &[], &[]);
    let mut low = player(1);
    low.level = 5;
    let err = enc.join(&low, t(0)).unwrap_err();
    assert!(matches!(
        err,
        EngineError::LevelTooLow {
            level: 5,
            required: 10
        }
    ));
}

#[test]
fn join_rejected_after_terminal() {
    let mut enc = active_encounter(10, &[], &[1]);
    enc.attack(1, 10, false, "sword", t(1)).expect("attack");
    assert_eq!(enc.status, EncounterStatus::Completed);
    let err = enc.join(&player(2), t(2)).unwrap_err();
    assert!(matches!(err, EngineError::InvalidState { .. }));
}

#[test]
fn pool_modifier_scales_max_pool() {
    let enc = Encounter::spawn(1, definition(100, &[]), "w".to_string(), 1.5, 1.0, t(0));
    assert_eq!(enc.max_pool, 150);
    assert_eq!(enc.current_pool, 150);

    // Degenerate modifiers still leave a fightable pool
    let enc = Encounter::spawn(2, definition(100, &[]), "w".to_string(), 0.0, 1.0, t(0));
    assert_eq!(enc.max_pool, 1);
}

// ═══════════════════════════════════════════════════════════════════════════
// Pool & Phases
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn pool_is_clamped_and_non_increasing() {
    let mut enc = active_encounter(100, &[], &[1]);
    let mut previous = enc.current_pool;
    for damage in [30, 0, 45, 80] {
        if enc.status != EncounterStatus::Active {
            break;
        }
        let outcome = enc.attack(1, damage, false, "sword", t(1)).expect("attack");
        assert!(outcome.pool_remaining <= previous);
        assert!(outcome.pool_remaining >= 0);
        previous = outcome.pool_remaining;
    }
    assert_eq!(enc.current_pool, 0);
    assert_eq!(enc.status, EncounterStatus::Completed);
}

#[test]
fn scenario_three_attacks_cross_phase_then_complete() {
    // maxPool=100, one phase at 50%; attacks of 40, 30, 40
    let mut enc = active_encounter(100, &[(50.0, &["enrage"])], &[1]);

    let first = enc.attack(1, 40, false, "sword", t(1)).expect("attack");
    assert_eq!(first.pool_remaining, 60);
    assert!(first.phase_change.is_none());

    let second = enc.attack(1, 30, false, "sword", t(2)).expect("attack");
    assert_eq!(second.pool_remaining, 30);
    let change = second.phase_change.expect("phase transition at 30%");
    assert_eq!(change.new_phase_index, 1);
    assert_eq!(change.mechanics_delta, vec!["enrage".to_string()]);

    let third = enc.attack(1, 40, false, "sword", t(3)).expect("attack");
    assert_eq!(third.pool_remaining, 0);
    assert!(third.terminal);
    assert_eq!(enc.status, EncounterStatus::Completed);
    // Contribution counts the full swing even though the pool clamped
    assert_eq!(enc.ledger.get(1).unwrap().damage_dealt, 110);
}

#[test]
fn phase_index_is_monotonic_and_idempotent() {
    let mut enc = active_encounter(100, &[(75.0, &["adds"]), (50.0, &["enrage"])], &[1]);

    enc.attack(1, 30, false, "sword", t(1)).expect("attack");
    assert_eq!(enc.phase_index, 1);

    // Replaying the same pool value must not re-trigger the phase
    let replay = enc.attack(1, 0, false, "sword", t(2)).expect("attack");
    assert!(replay.phase_change.is_none());
    assert_eq!(enc.phase_index, 1);

    enc.attack(1, 30, false, "sword", t(3)).expect("attack");
    assert_eq!(enc.phase_index, 2);
    assert_eq!(
        enc.active_mechanics,
        vec!["adds".to_string(), "enrage".to_string()]
    );
}

#[test]
fn one_hit_crossing_two_thresholds_unions_both_deltas() {
    let mut enc = active_encounter(100, &[(75.0, &["adds"]), (50.0, &["enrage"])], &[1]);
    let outcome = enc.attack(1, 60, false, "sword", t(1)).expect("attack");
    let change = outcome.phase_change.expect("transition");
    assert_eq!(change.new_phase_index, 2);
    assert_eq!(
        change.mechanics_delta,
        vec!["adds".to_string(), "enrage".to_string()]
    );
}

// ═══════════════════════════════════════════════════════════════════════════
// Contribution & Rejoin
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn rejoin_preserves_contribution() {
    let mut enc = active_encounter(1000, &[], &[1]);
    enc.attack(1, 150, false, "sword", t(1)).expect("attack");
    enc.leave(1, t(2)).expect("leave");

    assert_eq!(enc.join(&player(1), t(3)).expect("rejoin"), JoinOutcome::Rejoined);
    enc.attack(1, 50, false, "sword", t(4)).expect("attack");
    assert_eq!(enc.ledger.get(1).unwrap().damage_dealt, 200);
}

#[test]
fn heal_and_repair_accumulate() {
    let mut enc = active_encounter(1000, &[], &[1, 2]);
    enc.ledger.get_mut(2).unwrap().current_hp = 100;

    enc.heal(1, 2, 250, "mending_ward", t(1)).expect("heal");
    assert_eq!(enc.ledger.get(1).unwrap().healing_done, 250);
    // Overheal clamps to max_hp
    assert_eq!(enc.ledger.get(2).unwrap().current_hp, 350);

    enc.repair(1, 40, "barricade_kit", t(2)).expect("repair");
    assert_eq!(enc.ledger.get(1).unwrap().utility_score, 40);

    let err = enc.repair(9, 40, "barricade_kit", t(3)).unwrap_err();
    assert!(matches!(err, EngineError::NotAParticipant(9)));
}

// ═══════════════════════════════════════════════════════════════════════════
// Abilities
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn cooldown_gates_until_expiry() {
    let mut enc = active_encounter(1000, &[], &[1]);

    let first = resolve_ability(&mut enc, "molten_slam", t(0)).expect("first use");
    assert_eq!(first.cooldown_until, t(30));

    let err = resolve_ability(&mut enc, "molten_slam", t(10)).unwrap_err();
    assert!(matches!(err, EngineError::AbilityOnCooldown(_)));

    resolve_ability(&mut enc, "molten_slam", t(31)).expect("after cooldown");
}

#[test]
fn unknown_ability_is_not_found() {
    let mut enc = active_encounter(1000, &[], &[1]);
    let err = resolve_ability(&mut enc, "nonexistent", t(0)).unwrap_err();
    assert!(matches!(err, EngineError::AbilityNotFound(_)));
}

#[test]
fn single_targeting_picks_aggro_holder() {
    let mut enc = active_encounter(10_000, &[], &[1, 2, 3]);
    enc.attack(1, 100, false, "sword", t(1)).expect("attack");
    enc.attack(2, 400, false, "axe", t(2)).expect("attack");
    enc.attack(3, 250, false, "bow", t(3)).expect("attack");

    let outcome = resolve_ability(&mut enc, "molten_slam", t(4)).expect("ability");
    assert_eq!(outcome.affected_participants, vec![2]);
    assert_eq!(enc.ledger.get(2).unwrap().current_hp, 500 - 120);
}

#[test]
fn area_targeting_hits_all_active_and_clamps_hp() {
    let mut enc = active_encounter(10_000, &[], &[1, 2, 3]);
    enc.leave(3, t(1)).expect("leave");
    enc.ledger.get_mut(2).unwrap().current_hp = 20;

    let outcome = resolve_ability(&mut enc, "ash_storm", t(2)).expect("ability");
    assert_eq!(outcome.affected_participants, vec![1, 2]);
    assert_eq!(enc.ledger.get(1).unwrap().current_hp, 440);
    assert_eq!(enc.ledger.get(2).unwrap().current_hp, 0);
    // Inactive participants are untouched
    assert_eq!(enc.ledger.get(3).unwrap().current_hp, 500);
}

#[test]
fn ability_use_is_logged_as_adversary() {
    let mut enc = active_encounter(10_000, &[], &[1]);
    resolve_ability(&mut enc, "molten_slam", t(0)).expect("ability");
    let entry = enc.log.entries().last().expect("log entry");
    assert_eq!(entry.actor, ActorKind::Adversary);
    assert_eq!(entry.source, "molten_slam");
}

#[test]
fn dot_ticks_are_delivered_lazily_in_clock_order() {
    let mut enc = active_encounter(10_000, &[], &[1]);
    enc.attack(1, 10, false, "sword", t(0)).expect("attack");
    resolve_ability(&mut enc, "smoldering_brand", t(0)).expect("dot");
    assert_eq!(enc.pending_dot_count(), 1);
    assert_eq!(enc.ledger.get(1).unwrap().current_hp, 500);

    // Ticks at t=1 and t=2 (1s tick interval); both due by t=5
    enc.attack(1, 10, false, "sword", t(5)).expect("attack");
    assert_eq!(enc.ledger.get(1).unwrap().current_hp, 480);
    assert_eq!(enc.pending_dot_count(), 0);

    let dot_entries: Vec<_> = enc
        .log
        .entries()
        .iter()
        .filter(|e| e.source == "smoldering_brand" && e.actor == ActorKind::Adversary && e.amount == 10)
        .collect();
    assert_eq!(dot_entries.len(), 2);
    assert!(dot_entries[0].timestamp < dot_entries[1].timestamp);
}

#[test]
fn stun_consumes_attack_attempts() {
    let mut enc = active_encounter(10_000, &[], &[1]);
    enc.attack(1, 10, false, "sword", t(0)).expect("attack");
    resolve_ability(&mut enc, "concussive_roar", t(1)).expect("stun");

    for attempt in 0..2 {
        let err = enc.attack(1, 10, false, "sword", t(2 + attempt)).unwrap_err();
        assert!(matches!(err, EngineError::Stunned(1)), "attempt {attempt}");
    }
    enc.attack(1, 10, false, "sword", t(5)).expect("stun worn off");
    assert_eq!(enc.ledger.get(1).unwrap().damage_dealt, 20);
}

// ═══════════════════════════════════════════════════════════════════════════
// Snapshots
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn snapshot_reflects_point_in_time_state() {
    let mut enc = active_encounter(100, &[(50.0, &["enrage"])], &[1, 2]);
    enc.attack(1, 60, false, "sword", t(1)).expect("attack");

    let snap = enc.snapshot();
    assert_eq!(snap.current_pool, 40);
    assert_eq!(snap.phase_index, 1);
    assert_eq!(snap.participants.len(), 2);

    // Later mutation does not alter the copy
    enc.attack(1, 10, false, "sword", t(2)).expect("attack");
    assert_eq!(snap.current_pool, 40);
}
