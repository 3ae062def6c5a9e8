//! # Check Command Implementation
//!
//! This module implements the `check` subcommand, which validates a layer
//! without producing a plan file.
//!
//! ## Functionality
//!
//! - **Text Summary**: By default every problem is printed with its category,
//!   source locations and a hint, followed by a summary.
//! - **JSON Diagnostics**: With `--format json` the structured diagnostics are
//!   printed for tooling, one record per problem.
//!
//! Every requirement failure is reported, not only the first. The command
//! exits non-zero when the layer has any problem.

use anyhow::Result;
use clap::{Args, ValueEnum};
use serde::Serialize;

use layer_depgraph::error::{Diagnostic, Error};
use layer_depgraph::output::{OutputConfig, Status};
use layer_depgraph::phases::orchestrator;
use layer_depgraph::suggestions;

use super::LayerArgs;

/// Output format of the check report
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
pub enum CheckFormat {
    /// Human readable summary
    #[default]
    Text,
    /// Structured diagnostics
    Json,
}

/// Check a layer for conflicts, cycles and unmet requirements
#[derive(Args, Debug)]
pub struct CheckArgs {
    #[command(flatten)]
    pub layer: LayerArgs,

    /// Report format.
    #[arg(long, value_enum, default_value = "text")]
    pub format: CheckFormat,
}

#[derive(Debug, Serialize)]
struct CheckReport {
    ok: bool,
    features: usize,
    diagnostics: Vec<Diagnostic>,
}

/// Execute the `check` command.
///
/// # Arguments
/// * `args` - The command arguments
/// * `color_flag` - The value of the global --color flag
pub fn execute(args: CheckArgs, color_flag: &str) -> Result<()> {
    let out = OutputConfig::from_env_and_flag(color_flag);
    let input = args.layer.load_input()?;
    let result = orchestrator::check_layer(&input, &args.layer.engine_config());

    let (features, failures) = match &result {
        Ok(output) => (output.plan.len(), Vec::new()),
        Err(failures) => (input.records.len(), failures.iter().collect::<Vec<_>>()),
    };

    match args.format {
        CheckFormat::Json => {
            let report = CheckReport {
                ok: failures.is_empty(),
                features,
                diagnostics: failures.iter().map(|e| e.diagnostic()).collect(),
            };
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        CheckFormat::Text => {
            println!(
                "{} Checking layer: {}",
                Status::Scanning.marker(&out),
                args.layer.features.display()
            );
            for failure in &failures {
                print_failure(&out, failure);
            }
            if failures.is_empty() {
                println!(
                    "{} {}",
                    Status::Consistent.marker(&out),
                    out.success(&format!("Layer is consistent: {} steps planned", features))
                );
            }
        }
    }

    if failures.is_empty() {
        Ok(())
    } else {
        Err(anyhow::anyhow!(
            "Layer check failed with {} problem(s)",
            failures.len()
        ))
    }
}

fn print_failure(out: &OutputConfig, failure: &Error) {
    println!(
        "{} {} {}",
        Status::Failed.marker(out),
        out.category(&failure.category().to_string()),
        failure
    );
    for location in failure.locations() {
        println!("   {}", out.dim(&format!("at {}", location)));
    }
    if let Some(hint) = suggestions::hint_for(failure) {
        println!("   hint: {}", hint);
    }
}
