//! Roundtrip command - save a battle, restore it and compare
//!
//! ## Architecture (4-layer granularity)
//!
//! - Level 1: run() - orchestration
//! - Level 2: prepare_battle(), check_roundtrip(), report_results()
//! - Level 3: compare_battles()
//! - Level 4: formatting utilities

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Args;

use battlescape_core::save::{load_from_dir, save_to_dir};
use battlescape_core::{restore_battle, save_battle, Battle, RuleSet};

// ============================================================================
// COMMAND ARGUMENTS (Level 4 - Configuration)
// ============================================================================

#[derive(Args)]
pub struct RoundtripArgs {
    /// Scenario JSON file (defaults to the built-in skirmish)
    #[arg(long, value_name = "FILE")]
    pub scenario: Option<PathBuf>,

    /// Existing save directory to check instead of a fresh scenario
    #[arg(long, value_name = "DIR", conflicts_with = "scenario")]
    pub load: Option<PathBuf>,

    /// Faction turns to play out before saving
    #[arg(long, default_value = "2")]
    pub turns: u32,

    /// Also write the save into this directory and read it back
    #[arg(long, value_name = "DIR")]
    pub out: Option<PathBuf>,

    /// Output results as JSON
    #[arg(long)]
    pub json: bool,
}

/// What matched after the restore
#[derive(Clone, Debug, Default, serde::Serialize)]
struct RoundtripReport {
    document_bytes: usize,
    tile_bytes: usize,
    field_equal: bool,
    turn_equal: bool,
    rng_equal: bool,
    resave_identical: bool,
    directory_equal: Option<bool>,
}

impl RoundtripReport {
    fn passed(&self) -> bool {
        self.field_equal
            && self.turn_equal
            && self.rng_equal
            && self.resave_identical
            && self.directory_equal.unwrap_or(true)
    }
}

// ============================================================================
// LEVEL 1: ORCHESTRATION
// ============================================================================

/// Run the roundtrip command
///
/// Table of contents:
/// 1. Load a save, or start a scenario and end a few turns
/// 2. Save to memory, restore, and compare
/// 3. Optionally repeat through a directory
/// 4. Report, failing the command on any mismatch
pub fn run(args: RoundtripArgs, rules: Arc<RuleSet>, seed: Option<u64>) -> Result<()> {
    let battle = prepare_battle(&args, rules.clone(), seed)?;
    let mut report = check_roundtrip(&battle, rules.clone())?;

    if let Some(dir) = &args.out {
        save_to_dir(&battle, dir)?;
        let restored = load_from_dir(dir, rules)?;
        report.directory_equal = Some(compare_battles(&battle, &restored).0);
    }

    report_results(&report, args.json);
    if !report.passed() {
        bail!("Restored battle differs from the original");
    }
    Ok(())
}

// ============================================================================
// LEVEL 2: PHASES
// ============================================================================

fn prepare_battle(args: &RoundtripArgs, rules: Arc<RuleSet>, seed: Option<u64>) -> Result<Battle> {
    if let Some(dir) = &args.load {
        return load_from_dir(dir, rules)
            .with_context(|| format!("Failed to load save from {:?}", dir));
    }
    let scenario = crate::load_scenario(args.scenario.as_deref(), seed)?;
    let mut battle = scenario.start(rules).context("Failed to start scenario")?;
    for _ in 0..args.turns {
        if battle.outcome().is_some() {
            break;
        }
        battle.end_turn()?;
    }
    Ok(battle)
}

fn check_roundtrip(battle: &Battle, rules: Arc<RuleSet>) -> Result<RoundtripReport> {
    let save = save_battle(battle)?;
    let restored = restore_battle(&save, rules)?;
    let (field_equal, turn_equal, rng_equal) = compare_battles(battle, &restored);
    let again = save_battle(&restored)?;
    tracing::info!(
        "Saved {} byte document and {} byte tile blob",
        save.document.len(),
        save.tiles.len()
    );
    Ok(RoundtripReport {
        document_bytes: save.document.len(),
        tile_bytes: save.tiles.len(),
        field_equal,
        turn_equal,
        rng_equal,
        resave_identical: again == save,
        directory_equal: None,
    })
}

fn report_results(report: &RoundtripReport, json: bool) {
    if json {
        if let Ok(json) = serde_json::to_string_pretty(report) {
            println!("{}", json);
        }
    } else {
        print_text_results(report);
    }
}

// ============================================================================
// LEVEL 3: COMPARISON
// ============================================================================

/// Field, turn state and RNG equality
fn compare_battles(original: &Battle, restored: &Battle) -> (bool, bool, bool) {
    (
        original.field() == restored.field(),
        original.turn_controller() == restored.turn_controller(),
        original.rng() == restored.rng(),
    )
}

// ============================================================================
// LEVEL 4: UTILITIES
// ============================================================================

fn check_mark(ok: bool) -> &'static str {
    if ok {
        "ok"
    } else {
        "MISMATCH"
    }
}

fn print_text_results(report: &RoundtripReport) {
    println!("\n=== Save Roundtrip ===");
    println!("Document:  {} bytes", report.document_bytes);
    println!("Tiles:     {} bytes", report.tile_bytes);
    println!("Field:     {}", check_mark(report.field_equal));
    println!("Turn:      {}", check_mark(report.turn_equal));
    println!("RNG:       {}", check_mark(report.rng_equal));
    println!("Re-save:   {}", check_mark(report.resave_identical));
    if let Some(dir) = report.directory_equal {
        println!("Directory: {}", check_mark(dir));
    }
    println!("Result:    {}", if report.passed() { "PASS" } else { "FAIL" });
}

// ============================================================================
// TESTS
// ============================================================================
