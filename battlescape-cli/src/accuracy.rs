//! Accuracy command - seeded shot trials on an open firing range
//!
//! ## Architecture (4-layer granularity)
//!
//! - Level 1: run() - orchestration
//! - Level 2: build_range(), run_trials(), report_results()
//! - Level 3: fire_trial(), compute_statistics()
//! - Level 4: fire mode lookup and formatting utilities

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Args;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;

use battlescape_core::action::firing_accuracy;
use battlescape_core::ruleset::FireMode;
use battlescape_core::voxel::VoxelType;
use battlescape_core::{
    Ballistics, Battlefield, Faction, Position, RuleSet, Scenario, ShotParams, UnitId,
};

/// Row the shooter and the target stand on
const RANGE_ROW: i32 = 4;
/// Tiles between the shooter and the west edge
const RANGE_MARGIN: i32 = 2;

// ============================================================================
// COMMAND ARGUMENTS (Level 4 - Configuration)
// ============================================================================

#[derive(Args)]
pub struct AccuracyArgs {
    /// Number of seeded shots
    #[arg(long, default_value = "1000")]
    pub trials: u64,

    /// Tiles between shooter and target
    #[arg(long, default_value = "5")]
    pub distance: i32,

    /// Base accuracy as a fraction; overrides the weapon's fire mode
    #[arg(long)]
    pub accuracy: Option<f64>,

    /// Weapon whose fire mode sets the accuracy
    #[arg(long, default_value = "rifle")]
    pub weapon: String,

    /// Fire mode: aimed, snap or auto
    #[arg(long, default_value = "snap")]
    pub mode: String,

    /// Global darkness 0-15
    #[arg(long, default_value = "0")]
    pub shade: u8,

    /// Output results as JSON
    #[arg(long)]
    pub json: bool,
}

/// A firing range with one shooter and one target
struct FiringRange {
    field: Battlefield,
    shooter: UnitId,
    target: UnitId,
    target_tile: Position,
}

/// Result of a single shot
#[derive(Clone, Copy, Debug)]
struct TrialRecord {
    on_target_tile: bool,
    hit_target: bool,
    bulls_eye: bool,
    /// Tiles between the impact and the target
    miss_distance: f64,
}

/// Aggregated trial results
#[derive(Clone, Debug, serde::Serialize)]
struct AccuracyStats {
    trials: usize,
    base_accuracy: f64,
    distance: i32,
    on_target_tile: usize,
    hit_target: usize,
    bulls_eyes: usize,
    off_target_rate: f64,
    avg_miss_distance: f64,
}

// ============================================================================
// LEVEL 1: ORCHESTRATION
// ============================================================================

/// Run the accuracy command
///
/// Table of contents:
/// 1. Lay out the firing range
/// 2. Work out the base accuracy
/// 3. Fire every trial in parallel, one seed each
/// 4. Report
pub fn run(args: AccuracyArgs, rules: Arc<RuleSet>, seed: Option<u64>) -> Result<()> {
    if args.distance < 1 {
        bail!("Distance must be at least one tile");
    }
    let range = build_range(&rules, args.distance)?;
    let accuracy = match args.accuracy {
        Some(accuracy) => accuracy,
        None => {
            let mode = fire_mode(&rules, &args.weapon, &args.mode)?;
            firing_accuracy(range.field.unit(range.shooter)?, &mode)
        }
    };

    let base_seed = seed.unwrap_or_else(rand::random);
    tracing::info!(
        "Firing {} shots at {:.2} accuracy over {} tiles (seed {})",
        args.trials,
        accuracy,
        args.distance,
        base_seed
    );
    let records = run_trials(&range, &rules, accuracy, args.shade, args.trials, base_seed)?;

    let stats = compute_statistics(&records, accuracy, args.distance);
    report_results(&stats, args.json);
    Ok(())
}

// ============================================================================
// LEVEL 2: PHASES
// ============================================================================

fn build_range(rules: &RuleSet, distance: i32) -> Result<FiringRange> {
    let width = distance + 2 * RANGE_MARGIN + 4;
    let from = Position::new(RANGE_MARGIN, RANGE_ROW, 0);
    let target_tile = Position::new(RANGE_MARGIN + distance, RANGE_ROW, 0);
    let field = Scenario::new("Firing range", width, RANGE_ROW * 2 + 1, 2)
        .with_floor("grass")
        .with_unit("Shooter", "soldier", Faction::Player, from, 2)
        .with_unit("Target", "sectoid", Faction::Hostile, target_tile, 6)
        .build_field(rules)
        .context("Failed to lay out the firing range")?;
    Ok(FiringRange { field, shooter: UnitId(0), target: UnitId(1), target_tile })
}

fn run_trials(
    range: &FiringRange,
    rules: &RuleSet,
    accuracy: f64,
    shade: u8,
    trials: u64,
    base_seed: u64,
) -> Result<Vec<TrialRecord>> {
    let params = ShotParams {
        shooter: range.shooter,
        origin: range.field.eye_voxel(range.shooter, rules)?,
        target: range.field.center_voxel(range.target, rules)?,
        accuracy,
        range: range.field.dimensions().0,
        min_range: 0,
        drop_off: 0,
        burst_index: 0,
        check_line_of_fire: false,
    };

    (0..trials)
        .into_par_iter()
        .map(|i| fire_trial(range, rules, &params, shade, base_seed.wrapping_add(i)))
        .collect()
}

fn report_results(stats: &AccuracyStats, json: bool) {
    if json {
        print_json_results(stats);
    } else {
        print_text_results(stats);
    }
}

// ============================================================================
// LEVEL 3: TRIALS
// ============================================================================

fn fire_trial(
    range: &FiringRange,
    rules: &RuleSet,
    params: &ShotParams,
    shade: u8,
    seed: u64,
) -> Result<TrialRecord> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let result = Ballistics::new(&range.field, rules, shade).resolve_shot(params, &mut rng)?;
    let impact_tile = result.impact.to_tile();
    Ok(TrialRecord {
        on_target_tile: impact_tile == range.target_tile,
        hit_target: result.hit == VoxelType::Unit(range.target),
        bulls_eye: result.bulls_eye,
        miss_distance: impact_tile.distance_to(range.target_tile),
    })
}

fn compute_statistics(records: &[TrialRecord], base_accuracy: f64, distance: i32) -> AccuracyStats {
    let trials = records.len();
    let on_target_tile = records.iter().filter(|r| r.on_target_tile).count();
    let misses: Vec<f64> = records
        .iter()
        .filter(|r| !r.on_target_tile)
        .map(|r| r.miss_distance)
        .collect();
    AccuracyStats {
        trials,
        base_accuracy,
        distance,
        on_target_tile,
        hit_target: records.iter().filter(|r| r.hit_target).count(),
        bulls_eyes: records.iter().filter(|r| r.bulls_eye).count(),
        off_target_rate: if trials > 0 {
            (trials - on_target_tile) as f64 / trials as f64
        } else {
            0.0
        },
        avg_miss_distance: if misses.is_empty() {
            0.0
        } else {
            misses.iter().sum::<f64>() / misses.len() as f64
        },
    }
}

// ============================================================================
// LEVEL 4: UTILITIES
// ============================================================================

fn fire_mode(rules: &RuleSet, weapon: &str, mode: &str) -> Result<FireMode> {
    let item = rules.item(weapon)?;
    let Some(profile) = item.weapon.as_ref() else {
        bail!("'{}' is not a weapon", weapon);
    };
    let found = match mode {
        "aimed" => profile.aimed,
        "snap" => profile.snap,
        "auto" => profile.auto,
        other => bail!("unknown fire mode '{}'", other),
    };
    found.with_context(|| format!("'{}' has no {} mode", weapon, mode))
}

/// Print results as JSON
fn print_json_results(stats: &AccuracyStats) {
    if let Ok(json) = serde_json::to_string_pretty(stats) {
        println!("{}", json);
    }
}

/// Print results as text
fn print_text_results(stats: &AccuracyStats) {
    let pct = |n: usize| {
        if stats.trials > 0 {
            n as f64 / stats.trials as f64 * 100.0
        } else {
            0.0
        }
    };
    println!("\n=== Accuracy Trials ===");
    println!("Shots:          {}", stats.trials);
    println!("Base accuracy:  {:.2}", stats.base_accuracy);
    println!("Distance:       {} tiles", stats.distance);
    println!("Bulls-eyes:     {} ({:.1}%)", stats.bulls_eyes, pct(stats.bulls_eyes));
    println!("Target hit:     {} ({:.1}%)", stats.hit_target, pct(stats.hit_target));
    println!("On target tile: {} ({:.1}%)", stats.on_target_tile, pct(stats.on_target_tile));
    println!("Avg miss:       {:.1} tiles", stats.avg_miss_distance);
}

// ============================================================================
// TESTS
// ============================================================================
