//! # Plan Command Implementation
//!
//! This module implements the `plan` subcommand, which runs the whole engine
//! on a feature file and emits the build plan as JSON.
//!
//! ## Functionality
//!
//! - **Build Plan**: The ordered feature list, printed to stdout or written
//!   to `--output`.
//! - **Facts Export**: With `--facts-out`, the frozen namespace of the built
//!   layer is written for use as the parent of the next layer.
//!
//! Nothing is written unless the whole layer is consistent.

use anyhow::Result;
use clap::Args;
use log::info;
use std::fs;
use std::path::PathBuf;

use layer_depgraph::phases::orchestrator;

use super::{engine_failure, LayerArgs};

/// Compute the build plan of a layer
#[derive(Args, Debug)]
pub struct PlanArgs {
    #[command(flatten)]
    pub layer: LayerArgs,

    /// Write the plan to FILE instead of stdout.
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Write the facts snapshot of the built layer to FILE.
    #[arg(long, value_name = "FILE")]
    pub facts_out: Option<PathBuf>,
}

/// Execute the `plan` command.
pub fn execute(args: PlanArgs) -> Result<()> {
    let input = args.layer.load_input()?;
    let output = orchestrator::build_layer(&input, &args.layer.engine_config())
        .map_err(|e| engine_failure(&e))?;

    let json = serde_json::to_string_pretty(&output.plan)?;
    match &args.output {
        Some(path) => {
            fs::write(path, format!("{}\n", json)).map_err(|e| {
                anyhow::anyhow!("Failed to write plan to {}: {}", path.display(), e)
            })?;
            info!("Wrote {} steps to {}", output.plan.len(), path.display());
        }
        None => println!("{}", json),
    }

    if let Some(path) = &args.facts_out {
        output.facts.write(path).map_err(|e| {
            anyhow::anyhow!("Failed to write facts to {}: {}", path.display(), e)
        })?;
        info!("Wrote facts snapshot to {}", path.display());
    }

    Ok(())
}
