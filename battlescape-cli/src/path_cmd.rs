//! Path command - ask the pathfinder how a unit gets somewhere
//!
//! ## Architecture (4-layer granularity)
//!
//! - Level 1: run() - orchestration
//! - Level 2: build_request(), search(), report_results()
//! - Level 3: summarize_path()
//! - Level 4: argument parsing and formatting utilities

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Args;

use battlescape_core::{
    Battlefield, MovementType, Path, PathRequest, Pathfinder, Position, RuleSet, UnitId,
};

// ============================================================================
// COMMAND ARGUMENTS (Level 4 - Configuration)
// ============================================================================

#[derive(Args)]
pub struct PathArgs {
    /// Scenario JSON file (defaults to the built-in skirmish)
    #[arg(long, value_name = "FILE")]
    pub scenario: Option<PathBuf>,

    /// Index of the unit that walks
    #[arg(long, default_value = "0")]
    pub unit: u32,

    /// Destination tile as x,y,z
    #[arg(long, value_parser = parse_position)]
    pub to: Position,

    /// Time units to plan with (defaults to the unit's current TU)
    #[arg(long)]
    pub budget: Option<u32>,

    /// Movement type override: walk, fly or swim
    #[arg(long, value_parser = parse_movement)]
    pub movement: Option<MovementType>,

    /// Return an overlay even when the budget falls short
    #[arg(long)]
    pub preview: bool,

    /// Also count every tile reachable within the budget
    #[arg(long)]
    pub reachable: bool,

    /// Output results as JSON
    #[arg(long)]
    pub json: bool,
}

/// What the command prints
#[derive(Clone, Debug, serde::Serialize)]
struct PathReport {
    unit: String,
    origin: Position,
    destination: Position,
    budget: u32,
    found: bool,
    total_tu: u32,
    total_energy: u32,
    steps: Vec<StepReport>,
    affordable_steps: Option<usize>,
    reachable_tiles: Option<usize>,
    error: Option<String>,
}

#[derive(Clone, Debug, serde::Serialize)]
struct StepReport {
    position: Position,
    direction: u8,
    tu_cost: u32,
}

// ============================================================================
// LEVEL 1: ORCHESTRATION
// ============================================================================

/// Run the path command
///
/// Table of contents:
/// 1. Build the battlefield from the scenario
/// 2. Search for the path (and the reachable area if asked)
/// 3. Report
pub fn run(args: PathArgs, rules: Arc<RuleSet>, seed: Option<u64>) -> Result<()> {
    let scenario = crate::load_scenario(args.scenario.as_deref(), seed)?;
    let field = scenario.build_field(&rules).context("Failed to build battlefield")?;

    let request = build_request(&field, &args)?;
    let report = search(&field, &rules, &request, &args)?;

    report_results(&report, args.json);
    Ok(())
}

// ============================================================================
// LEVEL 2: PHASES
// ============================================================================

fn build_request(field: &Battlefield, args: &PathArgs) -> Result<PathRequest> {
    let unit = field
        .unit(UnitId(args.unit))
        .with_context(|| format!("Scenario has no unit {}", args.unit))?;
    if !field.in_bounds(args.to) {
        bail!("Destination {:?} is outside the battlefield", args.to);
    }
    Ok(PathRequest {
        unit: unit.id,
        origin: unit.position,
        destination: args.to,
        tu_budget: args.budget.unwrap_or(unit.time_units.max(0) as u32),
        movement: args.movement.unwrap_or(unit.movement),
        preview_only: args.preview,
    })
}

fn search(
    field: &Battlefield,
    rules: &RuleSet,
    request: &PathRequest,
    args: &PathArgs,
) -> Result<PathReport> {
    let pathfinder = Pathfinder::new(field, rules);
    let name = field.unit(request.unit)?.name.clone();

    let mut report = PathReport {
        unit: name,
        origin: request.origin,
        destination: request.destination,
        budget: request.tu_budget,
        found: false,
        total_tu: 0,
        total_energy: 0,
        steps: Vec::new(),
        affordable_steps: None,
        reachable_tiles: None,
        error: None,
    };

    match pathfinder.find_path(request) {
        Ok(path) => summarize_path(&path, &mut report),
        Err(err) if err.is_fatal() => return Err(err.into()),
        Err(err) => {
            tracing::debug!("Path search refused: {}", err);
            report.error = Some(err.code().to_string());
        }
    }

    if args.reachable {
        let area = pathfinder.reachable(
            request.unit,
            request.origin,
            request.tu_budget,
            request.movement,
        )?;
        report.reachable_tiles = Some(area.len());
    }
    Ok(report)
}

fn report_results(report: &PathReport, json: bool) {
    if json {
        print_json_results(report);
    } else {
        print_text_results(report);
    }
}

// ============================================================================
// LEVEL 3: SUMMARY
// ============================================================================

fn summarize_path(path: &Path, report: &mut PathReport) {
    report.found = true;
    report.total_tu = path.total_tu;
    report.total_energy = path.total_energy;
    report.steps = path
        .steps
        .iter()
        .map(|s| StepReport { position: s.position, direction: s.direction, tu_cost: s.tu_cost })
        .collect();
    report.affordable_steps = path.preview.as_ref().map(|p| p.affordable_steps());
}

// ============================================================================
// LEVEL 4: UTILITIES
// ============================================================================

/// Parse `x,y,z` into a tile position
fn parse_position(s: &str) -> Result<Position, String> {
    let parts: Vec<&str> = s.split(',').map(str::trim).collect();
    if parts.len() != 3 {
        return Err(format!("expected x,y,z but got '{}'", s));
    }
    let mut coords = [0i32; 3];
    for (slot, part) in coords.iter_mut().zip(&parts) {
        *slot = part.parse().map_err(|_| format!("'{}' is not a number", part))?;
    }
    Ok(Position::new(coords[0], coords[1], coords[2]))
}

fn parse_movement(s: &str) -> Result<MovementType, String> {
    match s.to_ascii_lowercase().as_str() {
        "walk" => Ok(MovementType::Walk),
        "fly" => Ok(MovementType::Fly),
        "swim" => Ok(MovementType::Swim),
        other => Err(format!("unknown movement type '{}'", other)),
    }
}

/// Print results as JSON
fn print_json_results(report: &PathReport) {
    if let Ok(json) = serde_json::to_string_pretty(report) {
        println!("{}", json);
    }
}

/// Print results as text
fn print_text_results(report: &PathReport) {
    println!("\n=== Path for {} ===", report.unit);
    println!("From {:?} to {:?} with {} TU", report.origin, report.destination, report.budget);
    if let Some(code) = &report.error {
        println!("No path: {}", code);
    } else {
        println!(
            "Cost: {} TU, {} energy, {} steps",
            report.total_tu,
            report.total_energy,
            report.steps.len()
        );
        let mut running = 0;
        for (i, step) in report.steps.iter().enumerate() {
            running += step.tu_cost;
            let marker = match report.affordable_steps {
                Some(n) if i >= n => " (over budget)",
                _ => "",
            };
            println!(
                "  {:>3}. {:?} dir {} -> {} TU{}",
                i + 1,
                step.position,
                step.direction,
                running,
                marker
            );
        }
    }
    if let Some(count) = report.reachable_tiles {
        println!("Reachable tiles within budget: {}", count);
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use battlescape_core::Scenario;

    #[test]
    fn test_parse_position() {
        assert_eq!(parse_position("3, 4,0").unwrap(), Position::new(3, 4, 0));
        assert!(parse_position("3,4").is_err());
        assert!(parse_position("a,4,0").is_err());
    }

    #[test]
    fn test_parse_movement() {
        assert_eq!(parse_movement("FLY").unwrap(), MovementType::Fly);
        assert!(parse_movement("crawl").is_err());
    }

    #[test]
    fn test_search_reports_refusal_codes() {
        let rules = RuleSet::standard();
        let field = Scenario::skirmish().build_field(&rules).unwrap();
        let args = PathArgs {
            scenario: None,
            unit: 0,
            to: Position::new(6, 2, 0),
            budget: Some(4),
            movement: None,
            preview: false,
            reachable: true,
            json: true,
        };
        let request = build_request(&field, &args).unwrap();
        let report = search(&field, &rules, &request, &args).unwrap();
        assert!(!report.found);
        assert_eq!(report.error.as_deref(), Some("not_enough_time_units"));
        assert!(report.reachable_tiles.is_some_and(|n| n >= 1));
    }
}
