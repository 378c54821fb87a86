//! Checklist orchestrator CLI.
//!
//! Resolves `<checklist_dir>/<name>.json`, loads and validates it, then
//! either prints the initial status (`--status`) or executes the run and
//! prints the final report. Exit codes are stable; see [`exit_codes`].

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use orchestrator::core::checklist::Checklist;
use orchestrator::core::status::StatusStore;
use orchestrator::engine::ExecutionEngine;
use orchestrator::io::config::load_config;
use orchestrator::{exit_codes, logging, report};

#[derive(Parser)]
#[command(
    name = "orchestrator",
    version,
    about = "Checklist-driven task orchestrator"
)]
struct Cli {
    /// Checklist name, resolved to `<checklist_dir>/<name>.json`.
    #[arg(long)]
    checklist: String,

    /// Print the checklist's initial status without executing anything.
    #[arg(long)]
    status: bool,

    /// Path to the TOML configuration file.
    #[arg(long, default_value = "orchestrator.toml")]
    config: PathBuf,
}

fn main() {
    logging::init();
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{:#}", err);
            std::process::exit(exit_codes::INVALID);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    let path = config.checklist_path(&cli.checklist);
    let document = fs::read_to_string(&path)
        .with_context(|| format!("read checklist {}", path.display()))?;
    let checklist = Checklist::load(&document)?;

    if cli.status {
        let snapshot = StatusStore::new(&checklist).get_status();
        print!("{}", report::render_status(&checklist.name, &snapshot));
        return Ok(exit_codes::OK);
    }

    let mut engine = ExecutionEngine::from_config(&checklist, &config);
    let run_report = engine.run(&checklist);
    print!("{}", report::render_report(&run_report, &engine.status()));

    if run_report.gate_failure.is_some() {
        Ok(exit_codes::GATE_FAILED)
    } else if !run_report.task_failures.is_empty() {
        Ok(exit_codes::TASK_FAILED)
    } else {
        Ok(exit_codes::OK)
    }
}
