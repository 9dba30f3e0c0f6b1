//! Console command handlers
//!
//! Each handler maps one REPL command onto a registry call and prints the
//! structured result or the engine's terse user message.

use std::sync::Arc;

use incursion_core::{EncounterRegistry, EncounterStatus, EngineError};
use incursion_types::PlayerSnapshot;

fn report(err: EngineError) {
    println!("error: {err} ({})", err.user_message());
}

pub fn spawn(registry: &Arc<EncounterRegistry>, definition: &str, location: &str, modifier: f64) {
    match registry.spawn(definition, location, modifier) {
        Ok(id) => println!("spawned encounter {id} ({definition} @ {location})"),
        Err(e) => report(e),
    }
}

pub fn announce(registry: &Arc<EncounterRegistry>, id: u64) {
    match registry.announce(id) {
        Ok(()) => println!("encounter {id} announced, countdown running"),
        Err(e) => report(e),
    }
}

pub fn join(
    registry: &Arc<EncounterRegistry>,
    id: u64,
    player: i64,
    name: &str,
    level: u16,
    hp: i32,
) {
    let snapshot = PlayerSnapshot {
        id: player,
        name: name.to_string(),
        level,
        hp,
        max_hp: hp,
    };
    match registry.join(id, &snapshot) {
        Ok(outcome) => println!("{name} joined encounter {id} ({outcome:?})"),
        Err(e) => report(e),
    }
}

pub fn leave(registry: &Arc<EncounterRegistry>, id: u64, player: i64) {
    match registry.leave(id, player) {
        Ok(()) => println!("player {player} left encounter {id}"),
        Err(e) => report(e),
    }
}

pub fn attack(
    registry: &Arc<EncounterRegistry>,
    id: u64,
    player: i64,
    damage: i64,
    critical: bool,
    source: &str,
) {
    match registry.attack(id, player, damage, critical, source) {
        Ok(outcome) => {
            let mut line = format!("pool {}", outcome.pool_remaining);
            if let Some(change) = &outcome.phase_change {
                line.push_str(&format!(", phase -> {}", change.new_phase_index));
            }
            if outcome.terminal {
                line.push_str(", encounter complete");
            }
            println!("{line}");
        }
        Err(e) => report(e),
    }
}

pub fn ability(registry: &Arc<EncounterRegistry>, id: u64, ability: &str) {
    match registry.use_ability(id, ability) {
        Ok(outcome) => println!(
            "{} hit {:?}, ready again at {}",
            outcome.ability_id,
            outcome.affected_participants,
            outcome.cooldown_until.format("%H:%M:%S")
        ),
        Err(e) => report(e),
    }
}

pub fn heal(registry: &Arc<EncounterRegistry>, id: u64, player: i64, target: i64, amount: i64) {
    match registry.heal(id, player, target, amount, "heal") {
        Ok(()) => println!("player {player} healed {target} for {amount}"),
        Err(e) => report(e),
    }
}

pub fn repair(registry: &Arc<EncounterRegistry>, id: u64, player: i64, amount: i64) {
    match registry.repair(id, player, amount, "repair") {
        Ok(()) => println!("player {player} repaired for {amount}"),
        Err(e) => report(e),
    }
}

pub fn fail(registry: &Arc<EncounterRegistry>, id: u64) {
    match registry.fail(id) {
        Ok(()) => println!("encounter {id} failed"),
        Err(e) => report(e),
    }
}

pub fn status(registry: &Arc<EncounterRegistry>, id: u64) {
    match registry.get_state(id) {
        Ok(snap) => {
            println!(
                "{} [{}] {} @ {}: pool {}/{} phase {} mechanics [{}]",
                snap.id,
                snap.status.label(),
                snap.display_name,
                snap.location,
                snap.current_pool,
                snap.max_pool,
                snap.phase_index,
                snap.active_mechanics.join(", ")
            );
            for p in &snap.participants {
                let marker = if p.active { "" } else { " (left)" };
                println!(
                    "  {:<20} hp {}/{} dmg {} heal {} util {}{marker}",
                    p.display_name, p.current_hp, p.max_hp, p.damage_dealt, p.healing_done, p.utility_score
                );
            }
        }
        Err(e) => report(e),
    }
}

pub fn list(registry: &Arc<EncounterRegistry>, status: Option<&str>) {
    let filter = match status {
        Some(s) => match parse_status(s) {
            Some(status) => Some(status),
            None => {
                println!("unknown status '{s}'");
                return;
            }
        },
        None => None,
    };

    let rows = registry.list(filter);
    if rows.is_empty() {
        println!("no encounters");
        return;
    }
    println!("{:<5} {:<24} {:<12} {:<12} pool", "id", "definition", "status", "location");
    for row in rows {
        println!(
            "{:<5} {:<24} {:<12} {:<12} {}/{} ({} joined)",
            row.id,
            row.definition_id,
            row.status.label(),
            row.location,
            row.current_pool,
            row.max_pool,
            row.participants
        );
    }
}

pub fn definitions(registry: &Arc<EncounterRegistry>) {
    for def in registry.definitions().iter() {
        println!(
            "{:<24} tier {} pool {} level {}+ phases {} abilities {}{}",
            def.id,
            def.tier,
            def.base_pool_size,
            def.level_requirement,
            def.phases.len(),
            def.abilities.len(),
            if def.ranked { " (ranked)" } else { "" }
        );
    }
}

pub fn history(registry: &Arc<EncounterRegistry>) {
    let summaries = registry.history().summaries();
    if summaries.is_empty() {
        println!("no history yet");
        return;
    }
    for s in summaries {
        println!(
            "encounter {} ({}) {:?} in {}s, mvp {:?}",
            s.encounter_id, s.definition_id, s.outcome, s.duration_seconds, s.mvp_id
        );
    }
}

fn parse_status(s: &str) -> Option<EncounterStatus> {
    match s {
        "scheduled" => Some(EncounterStatus::Scheduled),
        "announced" => Some(EncounterStatus::Announced),
        "active" => Some(EncounterStatus::Active),
        "completed" => Some(EncounterStatus::Completed),
        "failed" => Some(EncounterStatus::Failed),
        "expired" => Some(EncounterStatus::Expired),
        _ => None,
    }
}
