//! assist-sim: scenario runner for the assist activation coordinator.
//!
//! Replays scripted OS callbacks and UI commands against the real engine with
//! recording collaborators and virtual time, then prints every host call and
//! bridge event in order.
//!
//! ## Subcommands
//!
//! - `run`: Run a scenario file and print the transcript
//! - `check-config`: Load and validate a config file

mod logging;
mod runner;
mod scenario;

use std::env;
use std::path::PathBuf;

use assist_core::{default_config_path, load_config, AssistConfig};
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "assist-sim")]
#[command(about = "Assist activation scenario runner")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a scenario (JSON) and print the resulting transcript
    Run {
        /// Scenario file
        #[arg(value_name = "SCENARIO")]
        scenario: PathBuf,

        /// Config file (defaults to $ASSIST_CONFIG, then the user config dir)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Override the session grace delay
        #[arg(long)]
        grace_delay_ms: Option<u64>,
    },

    /// Validate a config file and print the effective values
    CheckConfig {
        #[arg(value_name = "PATH")]
        path: Option<PathBuf>,
    },
}

fn main() {
    let _logging_guard = logging::init();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run {
            scenario,
            config,
            grace_delay_ms,
        } => run(scenario, config, grace_delay_ms),
        Commands::CheckConfig { path } => check_config(path),
    };

    if let Err(e) = result {
        tracing::error!(error = %e, "assist-sim failed");
        std::process::exit(1);
    }
}

fn config_path(explicit: Option<PathBuf>) -> Option<PathBuf> {
    explicit
        .or_else(|| env::var_os("ASSIST_CONFIG").map(PathBuf::from))
        .or_else(default_config_path)
}

fn resolve_config(explicit: Option<PathBuf>) -> Result<AssistConfig, String> {
    let path = config_path(explicit);
    load_config(path.as_deref()).map_err(|err| err.to_string())
}

fn run(
    scenario_path: PathBuf,
    config: Option<PathBuf>,
    grace_delay_ms: Option<u64>,
) -> Result<(), String> {
    let mut config = resolve_config(config)?;
    if let Some(delay) = grace_delay_ms {
        config.grace_delay_ms = delay;
    }

    let scenario = scenario::load(&scenario_path)?;
    tracing::info!(
        scenario = %scenario.name,
        steps = scenario.steps.len(),
        grace_delay_ms = config.grace_delay_ms,
        "Running scenario"
    );

    let transcript = runner::Simulation::new(config, &scenario.device).run(&scenario.steps);
    for line in transcript {
        println!("{}", line);
    }
    Ok(())
}

fn check_config(path: Option<PathBuf>) -> Result<(), String> {
    let config = resolve_config(path)?;
    let rendered = serde_json::to_string_pretty(&config).map_err(|err| err.to_string())?;
    println!("{}", rendered);
    Ok(())
}
