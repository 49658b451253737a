//! BATTLESCAPE CLI - Command-line interface
//!
//! Commands:
//! - simulate: Play a scenario to the end with scripted sides
//! - path: Query the pathfinder on a scenario
//! - accuracy: Measure shot scatter over many seeded trials
//! - roundtrip: Save a battle, restore it, and compare

mod accuracy;
mod path_cmd;
mod roundtrip;
mod simulate;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use battlescape_core::{RuleSet, Scenario};

#[derive(Parser)]
#[command(name = "battlescape")]
#[command(about = "Turn-based tactical combat engine")]
#[command(version)]
struct Cli {
    /// Random seed for reproducibility
    #[arg(long, global = true)]
    seed: Option<u64>,

    /// Ruleset JSON file (defaults to the built-in ruleset)
    #[arg(long, global = true, value_name = "FILE")]
    rules: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Play a scenario with scripted sides until it concludes
    Simulate(simulate::SimulateArgs),

    /// Find a path for one unit
    Path(path_cmd::PathArgs),

    /// Run seeded shot trials and report how often they land on target
    Accuracy(accuracy::AccuracyArgs),

    /// Check that a saved battle restores exactly
    Roundtrip(roundtrip::RoundtripArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let rules = Arc::new(load_rules(cli.rules.as_deref())?);

    match cli.command {
        Commands::Simulate(args) => simulate::run(args, rules, cli.seed),
        Commands::Path(args) => path_cmd::run(args, rules, cli.seed),
        Commands::Accuracy(args) => accuracy::run(args, rules, cli.seed),
        Commands::Roundtrip(args) => roundtrip::run(args, rules, cli.seed),
    }
}

fn init_logging(verbose: bool) {
    let level = if verbose { tracing::Level::DEBUG } else { tracing::Level::INFO };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
        .with_writer(std::io::stderr)
        .init();
}

fn load_rules(path: Option<&std::path::Path>) -> Result<RuleSet> {
    match path {
        Some(path) => {
            tracing::info!("Loading ruleset from {:?}", path);
            RuleSet::load(path)
        }
        None => Ok(RuleSet::standard()),
    }
}

/// Scenario from a file, or the built-in skirmish
pub(crate) fn load_scenario(path: Option<&std::path::Path>, seed: Option<u64>) -> Result<Scenario> {
    let mut scenario = match path {
        Some(path) => Scenario::load(path)?,
        None => Scenario::skirmish(),
    };
    if let Some(seed) = seed {
        scenario.config.seed = seed;
    }
    Ok(scenario)
}
