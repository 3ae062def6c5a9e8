//! CLI argument parsing and command dispatch

use anyhow::Result;
use clap::{Parser, Subcommand};
use log::LevelFilter;

use crate::commands;

/// Layer Depgraph - Validate and order the features of a filesystem layer
#[derive(Parser, Debug)]
#[command(name = "layer-depgraph")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    /// Colorize output (always, never, auto)
    #[arg(
        long,
        global = true,
        value_name = "WHEN",
        default_value = "auto",
        value_parser = ["auto", "always", "never"]
    )]
    color: String,

    /// Set log level (error, warn, info, debug, trace); RUST_LOG overrides it
    #[arg(
        long,
        global = true,
        value_name = "LEVEL",
        default_value = "warn",
        value_parser = ["error", "warn", "info", "debug", "trace"]
    )]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Compute the build plan of a layer
    Plan(commands::plan::PlanArgs),

    /// Check a layer for conflicts, cycles and unmet requirements
    Check(commands::check::CheckArgs),

    /// Dump the dependency graph of a layer
    Graph(commands::graph::GraphArgs),

    /// List the entries of the namespace after the layer is built
    Ls(commands::ls::LsArgs),

    /// Generate shell completion scripts
    Completions(commands::completions::CompletionsArgs),
}

fn init_logging(level: &str) {
    let filter = level.parse::<LevelFilter>().unwrap_or(LevelFilter::Warn);
    // A logger may already be installed when running under a test harness.
    let _ = env_logger::Builder::new()
        .filter_level(filter)
        .parse_env("RUST_LOG")
        .format_timestamp(None)
        .try_init();
}

impl Cli {
    /// Execute the CLI command
    pub fn execute(self) -> Result<()> {
        init_logging(&self.log_level);

        match self.command {
            Commands::Plan(args) => commands::plan::execute(args),
            Commands::Check(args) => commands::check::execute(args, &self.color),
            Commands::Graph(args) => commands::graph::execute(args),
            Commands::Ls(args) => commands::ls::execute(args),
            Commands::Completions(args) => commands::completions::execute(args),
        }
    }
}
