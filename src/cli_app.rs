//! Top-level CLI definition and dispatch.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};

use host_sentry::core::config::EngineConfig;
use host_sentry::core::errors::Result;
use host_sentry::core::rules::RulesFile;
use host_sentry::engine::Engine;
use host_sentry::engine::signals::SignalHandler;

/// Host Sentry — reactive watchdog rules against live host state.
#[derive(Debug, Parser)]
#[command(
    name = "hsentry",
    author,
    version,
    about = "Host Sentry - reactive host watchdog engine",
    long_about = None,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Override config file path.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Subcommand to execute.
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run a rule set until SIGTERM/SIGINT.
    Run {
        /// Rules file (TOML, [[rule]] tables).
        #[arg(long, value_name = "PATH")]
        rules: PathBuf,
    },
    /// Validate a rules file without running it.
    Check {
        /// Rules file (TOML, [[rule]] tables).
        #[arg(long, value_name = "PATH")]
        rules: PathBuf,
    },
}

/// Dispatch the parsed command line.
pub fn run(cli: &Cli) -> Result<()> {
    match &cli.command {
        Command::Run { rules } => cmd_run(cli.config.as_deref(), rules),
        Command::Check { rules } => cmd_check(cli.config.as_deref(), rules),
    }
}

fn cmd_run(config_path: Option<&Path>, rules_path: &Path) -> Result<()> {
    let config = EngineConfig::load(config_path)?;
    let rules = RulesFile::load(rules_path)?;

    let engine = Engine::new(config)?;
    let bound = rules.bind(&engine)?;
    eprintln!(
        "[HS] bound {bound} rule(s) from {}, starting engine",
        rules_path.display()
    );

    // SIGTERM/SIGINT flip the engine's shutdown flag; run loops observe it at
    // their next iteration boundary and start() returns.
    let _signals = SignalHandler::install(engine.shutdown_flag());
    engine.start()
}

fn cmd_check(config_path: Option<&Path>, rules_path: &Path) -> Result<()> {
    let config = EngineConfig::load(config_path)?;
    let rules = RulesFile::load(rules_path)?;

    // Binding performs full construction-time validation (parameter ranges,
    // per-unit counts against the live host, template files) without
    // starting any run loop.
    let engine = Engine::new(config)?;
    let bound = rules.bind(&engine)?;
    println!(
        "{}: OK ({bound} rule(s), {} watchdog(s))",
        rules_path.display(),
        engine.watchdog_count()
    );
    Ok(())
}
