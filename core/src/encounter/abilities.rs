//! Adversary ability resolution
//!
//! Abilities are cooldown-gated adversary actions resolved against the
//! participant ledger: `single` targeting strikes the aggro holder (highest
//! damage dealt among active participants), `area` strikes every active
//! participant. The cooldown check-and-set runs under the per-encounter
//! lock, so two concurrent triggers can never both pass the gate.

use chrono::{Duration, NaiveDateTime};

use super::{ActionKind, ActorKind, Encounter, EncounterStatus};
use crate::definition::{AbilityEffect, Targeting};
use crate::error::EngineError;

/// Result of a resolved ability use.
#[derive(Debug, Clone)]
pub struct AbilityOutcome {
    pub ability_id: String,
    /// Player ids the effect landed on, in deterministic order
    pub affected_participants: Vec<i64>,
    pub cooldown_until: NaiveDateTime,
}

/// Resolve one adversary ability against the encounter. The whole sequence
/// (cooldown gate, target pick, effect application, log append) is one
/// atomic unit under the caller's lock.
pub fn resolve_ability(
    encounter: &mut Encounter,
    ability_id: &str,
    now: NaiveDateTime,
) -> Result<AbilityOutcome, EngineError> {
    if encounter.status != EncounterStatus::Active {
        return Err(EngineError::InvalidState {
            action: "use ability",
            status: encounter.status,
        });
    }
    encounter.advance_dots(now);

    let ability = encounter
        .definition
        .ability(ability_id)
        .ok_or_else(|| EngineError::AbilityNotFound(ability_id.to_string()))?
        .clone();

    // Check-and-set against the cooldown table; ready_at in the future means
    // a previous use is still gating this ability.
    if let Some(ready_at) = encounter.cooldowns.get(ability_id)
        && now < *ready_at
    {
        return Err(EngineError::AbilityOnCooldown(ability_id.to_string()));
    }
    let cooldown_until = now + Duration::milliseconds((ability.cooldown_secs * 1000.0) as i64);
    encounter
        .cooldowns
        .insert(ability_id.to_string(), cooldown_until);

    let mut targets: Vec<i64> = match ability.targeting {
        Targeting::Single => encounter
            .ledger
            .aggro_target()
            .map(|r| vec![r.player_id])
            .unwrap_or_default(),
        Targeting::Area => encounter
            .ledger
            .active_records()
            .map(|r| r.player_id)
            .collect(),
    };
    targets.sort_unstable();

    for &target_id in &targets {
        apply_effect(encounter, target_id, &ability.effect, ability_id, now);
    }

    let logged_amount = match ability.effect {
        AbilityEffect::Damage { amount } | AbilityEffect::AreaDamage { amount, .. } => amount as i64,
        AbilityEffect::Dot { amount_per_tick, ticks } => (amount_per_tick as i64) * (ticks as i64),
        AbilityEffect::Stun { .. } => 0,
    };
    encounter.log.append(
        now,
        0,
        ActorKind::Adversary,
        ActionKind::Ability,
        logged_amount,
        false,
        ability_id,
    );

    tracing::debug!(
        encounter = encounter.id,
        ability = ability_id,
        targets = targets.len(),
        "ability resolved"
    );

    Ok(AbilityOutcome {
        ability_id: ability_id.to_string(),
        affected_participants: targets,
        cooldown_until,
    })
}

fn apply_effect(
    encounter: &mut Encounter,
    target_id: i64,
    effect: &AbilityEffect,
    ability_id: &str,
    now: NaiveDateTime,
) {
    match *effect {
        AbilityEffect::Damage { amount } | AbilityEffect::AreaDamage { amount, .. } => {
            if let Some(target) = encounter.ledger.get_mut(target_id) {
                target.take_damage(amount);
            }
        }
        AbilityEffect::Dot {
            amount_per_tick,
            ticks,
        } => {
            encounter.register_dot(target_id, amount_per_tick, ticks, ability_id, now);
        }
        AbilityEffect::Stun { turns } => {
            if let Some(target) = encounter.ledger.get_mut(target_id) {
                target.stun_turns_remaining += turns;
            }
        }
    }
}
