//! Simulate command - play a scenario to the end with scripted sides
//!
//! ## Architecture (4-layer granularity)
//!
//! - Level 1: run() - orchestration
//! - Level 2: start_battle(), play_battle(), report_results()
//! - Level 3: play_faction_turn(), choose_action(), tally_events()
//! - Level 4: target selection and formatting utilities

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;

use battlescape_core::save::save_to_dir;
use battlescape_core::{
    ActionTarget, Battle, BattleAction, BattleActionType, BattleError, BattleEvent, BattleOutcome,
    Faction, ItemKind, Pathfinder, Position, RuleSet, UnitId,
};

/// Actions a scripted unit may attempt in one turn
const MAX_ACTIONS_PER_UNIT: usize = 4;

// ============================================================================
// COMMAND ARGUMENTS (Level 4 - Configuration)
// ============================================================================

#[derive(Args)]
pub struct SimulateArgs {
    /// Scenario JSON file (defaults to the built-in skirmish)
    #[arg(long, value_name = "FILE")]
    pub scenario: Option<PathBuf>,

    /// Give up after this many turns
    #[arg(long, default_value = "30")]
    pub max_turns: u32,

    /// Write the final battle state into this directory
    #[arg(long, value_name = "DIR")]
    pub save: Option<PathBuf>,

    /// Write the scenario that was played as JSON
    #[arg(long, value_name = "FILE")]
    pub export_scenario: Option<PathBuf>,

    /// Output results as JSON
    #[arg(long)]
    pub json: bool,
}

/// Counters gathered while the battle plays out
#[derive(Clone, Debug, Default, serde::Serialize)]
struct BattleTally {
    actions_attempted: usize,
    actions_failed: usize,
    shots: usize,
    moves: usize,
    kills: usize,
    knockouts: usize,
    explosions: usize,
    panics: usize,
    tiles_destroyed: usize,
}

/// Summary of one simulated battle
#[derive(Clone, Debug, serde::Serialize)]
struct SimulationReport {
    scenario: String,
    seed: u64,
    turns: u32,
    outcome: String,
    survivors: Vec<(String, usize)>,
    tally: BattleTally,
}

// ============================================================================
// LEVEL 1: ORCHESTRATION
// ============================================================================

/// Run the simulate command
///
/// Table of contents:
/// 1. Load the scenario and start the battle
/// 2. Alternate scripted faction turns until it concludes
/// 3. Optionally save the final state
/// 4. Report the outcome
pub fn run(args: SimulateArgs, rules: Arc<RuleSet>, seed: Option<u64>) -> Result<()> {
    let scenario = crate::load_scenario(args.scenario.as_deref(), seed)?;
    if let Some(path) = &args.export_scenario {
        scenario.save(path)?;
    }
    let mut battle = start_battle(&scenario, rules)?;

    let tally = play_battle(&mut battle, args.max_turns)?;

    if let Some(dir) = &args.save {
        save_to_dir(&battle, dir).with_context(|| format!("Failed to save battle to {:?}", dir))?;
        tracing::info!("Saved final state to {:?}", dir);
    }

    let report = build_report(&scenario.name, &battle, tally);
    report_results(&report, args.json);
    Ok(())
}

// ============================================================================
// LEVEL 2: PHASES
// ============================================================================

fn start_battle(scenario: &battlescape_core::Scenario, rules: Arc<RuleSet>) -> Result<Battle> {
    tracing::info!(
        "Starting '{}' ({}x{}x{}, {} units, seed {})",
        scenario.name,
        scenario.width,
        scenario.length,
        scenario.height,
        scenario.units.len(),
        scenario.config.seed
    );
    scenario.start(rules).context("Failed to start scenario")
}

/// Play turns until the battle concludes or the turn limit runs out
fn play_battle(battle: &mut Battle, max_turns: u32) -> Result<BattleTally> {
    let mut tally = BattleTally::default();

    while battle.outcome().is_none() {
        if battle.turn_number() > max_turns {
            tracing::info!("Turn limit {} reached", max_turns);
            battle.abort();
            break;
        }
        if let Some(faction) = battle.phase().faction() {
            if faction != Faction::Neutral {
                play_faction_turn(battle, faction, &mut tally)?;
            }
        }
        if battle.outcome().is_none() {
            battle.end_turn()?;
        }
        tally_events(&battle.drain_events(), &mut tally);
    }
    tally_events(&battle.drain_events(), &mut tally);
    Ok(tally)
}

fn build_report(name: &str, battle: &Battle, tally: BattleTally) -> SimulationReport {
    let survivors = [Faction::Player, Faction::Hostile, Faction::Neutral]
        .iter()
        .map(|&faction| {
            let alive = battle
                .field()
                .units()
                .iter()
                .filter(|u| u.faction == faction && u.is_active())
                .count();
            (format!("{:?}", faction), alive)
        })
        .collect();
    SimulationReport {
        scenario: name.to_string(),
        seed: battle.config().seed,
        turns: battle.turn_number(),
        outcome: outcome_label(battle.outcome()),
        survivors,
        tally,
    }
}

fn report_results(report: &SimulationReport, json: bool) {
    if json {
        print_json_results(report);
    } else {
        print_text_results(report);
    }
}

// ============================================================================
// LEVEL 3: SCRIPTED TURNS
// ============================================================================

/// Let every active unit of `faction` act until it runs out of ideas
fn play_faction_turn(battle: &mut Battle, faction: Faction, tally: &mut BattleTally) -> Result<()> {
    let actors: Vec<UnitId> = battle
        .field()
        .units()
        .iter()
        .filter(|u| u.faction == faction && u.is_active())
        .map(|u| u.id)
        .collect();

    for actor in actors {
        for _ in 0..MAX_ACTIONS_PER_UNIT {
            if battle.outcome().is_some() {
                return Ok(());
            }
            let Some(mut action) = choose_action(battle, actor)? else {
                break;
            };
            tally.actions_attempted += 1;
            let attempt = battle.execute(&mut action);
            battle.skip_projectile()?;
            match attempt {
                Ok(()) => {}
                Err(err) if err.is_fatal() => return Err(err.into()),
                Err(err) => {
                    tally.actions_failed += 1;
                    tracing::debug!("{:?} {:?} refused: {}", actor, action.action_type, err);
                    break;
                }
            }
        }
    }
    Ok(())
}

/// Shoot or strike the nearest known enemy, otherwise close in on the nearest one
fn choose_action(battle: &Battle, actor: UnitId) -> Result<Option<BattleAction>, BattleError> {
    let unit = battle.field().unit(actor)?;
    if !unit.is_active() || battle.phase().faction() != Some(unit.faction) {
        return Ok(None);
    }
    let position = unit.position;
    let time_units = unit.time_units.max(0) as u32;

    let known = battle.visible_units(actor)?;
    if let Some(target) = nearest_enemy(battle, actor, &known)? {
        let target_pos = battle.field().unit(target)?.position;
        let adjacent =
            (target_pos.x - position.x).abs() <= 1 && (target_pos.y - position.y).abs() <= 1;
        let mut candidates = Vec::new();
        if adjacent {
            candidates.push(
                BattleAction::new(actor, BattleActionType::Melee)
                    .with_target(ActionTarget::Unit(target)),
            );
        }
        candidates.push(
            BattleAction::new(actor, BattleActionType::SnapShot)
                .with_target(ActionTarget::Unit(target)),
        );
        if let Some(clip) = carried_ammo(battle, actor)? {
            candidates.push(BattleAction::new(actor, BattleActionType::Reload).with_item(clip));
        }
        for action in candidates {
            if affordable(battle, &action, time_units)? {
                return Ok(Some(action));
            }
        }
    }

    let everyone: Vec<UnitId> = battle.field().units().iter().map(|u| u.id).collect();
    let Some(quarry) = nearest_enemy(battle, actor, &everyone)? else {
        return Ok(None);
    };
    let goal = battle.field().unit(quarry)?.position;
    Ok(best_approach(battle, actor, goal, time_units)?
        .map(|tile| BattleAction::move_to(actor, tile)))
}

/// Count what happened since the last drain
fn tally_events(events: &[BattleEvent], tally: &mut BattleTally) {
    for event in events {
        match event {
            BattleEvent::ProjectileSpawned { .. } => tally.shots += 1,
            BattleEvent::UnitMoved { .. } => tally.moves += 1,
            BattleEvent::UnitKilled(_) => tally.kills += 1,
            BattleEvent::UnitKnockedOut(_) => tally.knockouts += 1,
            BattleEvent::Explosion { .. } => tally.explosions += 1,
            BattleEvent::Panic { .. } => tally.panics += 1,
            BattleEvent::TerrainDestroyed(_) => tally.tiles_destroyed += 1,
            _ => {}
        }
    }
}

// ============================================================================
// LEVEL 4: UTILITIES
// ============================================================================

fn nearest_enemy(
    battle: &Battle,
    actor: UnitId,
    candidates: &[UnitId],
) -> Result<Option<UnitId>, BattleError> {
    let unit = battle.field().unit(actor)?;
    let mut best: Option<(f64, UnitId)> = None;
    for &id in candidates {
        let other = battle.field().unit(id)?;
        if !other.is_active() || !unit.faction.is_enemy_of(other.faction) {
            continue;
        }
        let distance = unit.position.distance_to(other.position);
        if best.map_or(true, |(d, _)| distance < d) {
            best = Some((distance, id));
        }
    }
    Ok(best.map(|(_, id)| id))
}

fn carried_ammo(
    battle: &Battle,
    actor: UnitId,
) -> Result<Option<battlescape_core::ItemId>, BattleError> {
    let unit = battle.field().unit(actor)?;
    for item in unit.inventory.items() {
        let type_id = &battle.field().item(item)?.type_id;
        if battle.rules().item(type_id)?.kind == ItemKind::Ammo {
            return Ok(Some(item));
        }
    }
    Ok(None)
}

fn affordable(
    battle: &Battle,
    action: &BattleAction,
    time_units: u32,
) -> Result<bool, BattleError> {
    match battle.action_cost(action) {
        Ok(cost) => Ok(cost <= time_units),
        Err(err) if err.is_fatal() => Err(err),
        Err(_) => Ok(false),
    }
}

/// Reachable tile that gets closest to `goal`, if any beats standing still
fn best_approach(
    battle: &Battle,
    actor: UnitId,
    goal: Position,
    budget: u32,
) -> Result<Option<Position>, BattleError> {
    let unit = battle.field().unit(actor)?;
    let costs = Pathfinder::new(battle.field(), battle.rules())
        .reachable(actor, unit.position, budget, unit.movement)?;

    let mut best = (unit.position.distance_to(goal), None);
    let mut tiles: Vec<(Position, u32)> = costs.into_iter().collect();
    // Hash map order is not stable across runs
    tiles.sort();
    for (tile, _) in tiles {
        let distance = tile.distance_to(goal);
        if distance < best.0 && battle.field().unit_at(tile).is_none() {
            best = (distance, Some(tile));
        }
    }
    Ok(best.1)
}

fn outcome_label(outcome: Option<BattleOutcome>) -> String {
    match outcome {
        Some(outcome) => format!("{:?}", outcome),
        None => "Undecided".to_string(),
    }
}

/// Print results as JSON
fn print_json_results(report: &SimulationReport) {
    if let Ok(json) = serde_json::to_string_pretty(report) {
        println!("{}", json);
    }
}

/// Print results as text
fn print_text_results(report: &SimulationReport) {
    println!("\n=== Battle Report: {} ===", report.scenario);
    println!("Seed:       {}", report.seed);
    println!("Turns:      {}", report.turns);
    println!("Outcome:    {}", report.outcome);
    for (faction, alive) in &report.survivors {
        println!("  {:<8} {} standing", faction, alive);
    }
    let t = &report.tally;
    println!("\nActions:    {} attempted, {} refused", t.actions_attempted, t.actions_failed);
    println!("Shots:      {}", t.shots);
    println!("Moves:      {} tiles", t.moves);
    println!("Kills:      {} ({} knocked out)", t.kills, t.knockouts);
    println!("Explosions: {}", t.explosions);
    println!("Panics:     {}", t.panics);
    println!("Terrain:    {} parts destroyed", t.tiles_destroyed);
}

// ============================================================================
// TESTS
// ============================================================================
