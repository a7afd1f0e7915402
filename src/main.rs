//! CLI entry point: `mend run` drives the repair loop, `mend scan` prints the
//! audit findings without touching anything.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};

use mend::analysis::lint::PylintRunner;
use mend::analysis::pytest::PytestRunner;
use mend::analysis::scan_workspace;
use mend::core::merge::findings_from_records;
use mend::core::types::RunOutcome;
use mend::exit_codes;
use mend::io::config::{RepairConfig, load_config};
use mend::io::sandbox::Sandbox;
use mend::logging;
use mend::oracle::gemini::GeminiOracle;
use mend::run::run_repair;

#[derive(Parser)]
#[command(name = "mend", version, about = "Iterative sandboxed code repair")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Audit, correct, and validate the workspace until tests pass or the
    /// iteration budget runs out. Prints a JSON run summary on stdout.
    Run {
        /// Workspace directory to repair. All edits stay inside it.
        #[arg(long)]
        target_dir: PathBuf,
        /// Override the configured iteration budget.
        #[arg(long)]
        max_iterations: Option<u32>,
        /// Path to the TOML config; missing file means defaults.
        #[arg(long, default_value = "mend.toml")]
        config: PathBuf,
    },
    /// Audit the workspace and print the findings as JSON, changing nothing.
    Scan {
        /// Workspace directory to analyze.
        #[arg(long)]
        target_dir: PathBuf,
        /// Path to the TOML config; missing file means defaults.
        #[arg(long, default_value = "mend.toml")]
        config: PathBuf,
    },
}

fn main() -> ExitCode {
    logging::init();
    let cli = Cli::parse();
    let code = match cli.command {
        Command::Run {
            target_dir,
            max_iterations,
            config,
        } => cmd_run(&target_dir, max_iterations, &config),
        Command::Scan { target_dir, config } => cmd_scan(&target_dir, &config),
    };
    match code {
        Ok(code) => ExitCode::from(code as u8),
        Err(err) => {
            eprintln!("{err:#}");
            ExitCode::from(exit_codes::ERROR as u8)
        }
    }
}

fn cmd_run(
    target_dir: &std::path::Path,
    max_iterations: Option<u32>,
    config_path: &std::path::Path,
) -> Result<i32> {
    let mut config = load_config(config_path)?;
    if let Some(budget) = max_iterations {
        config.max_iterations = budget;
    }

    let sandbox = Sandbox::open(target_dir)?;
    let oracle = GeminiOracle::from_config(&config.oracle)?;
    let summary = run_repair(&sandbox, &PylintRunner, &PytestRunner, &oracle, &config);

    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(match summary.outcome {
        RunOutcome::Success => exit_codes::OK,
        RunOutcome::TestsFailing | RunOutcome::NoTests => exit_codes::FAILURE,
        RunOutcome::Error => exit_codes::ERROR,
    })
}

fn cmd_scan(target_dir: &std::path::Path, config_path: &std::path::Path) -> Result<i32> {
    let config: RepairConfig = load_config(config_path)?;
    let sandbox = Sandbox::open(target_dir)?;

    let records = scan_workspace(&sandbox, &PylintRunner, &PytestRunner, &config)?;
    let findings = findings_from_records(&records);

    println!("{}", serde_json::to_string_pretty(&findings)?);
    Ok(exit_codes::OK)
}
