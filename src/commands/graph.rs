//! # Graph Command Implementation
//!
//! This module implements the `graph` subcommand, which dumps the dependency
//! graph of a layer for debugging.
//!
//! ## Formats
//!
//! - **dot**: Graphviz source; pipe it into `dot -Tsvg`.
//! - **json**: `{nodes, edges}` for tooling.
//! - **tree**: the dependency tree of each feature nothing depends on.
//!
//! The graph is dumped even when requirements fail or the ordering edges form
//! a cycle, since that is when it is most useful. Conflicts and input errors
//! still abort, as no graph exists then.

use anyhow::Result;
use clap::{Args, ValueEnum};
use log::warn;
use std::fs;
use std::path::PathBuf;

use layer_depgraph::dump;
use layer_depgraph::phases::orchestrator;

use super::{engine_failure, LayerArgs};

/// Dump format
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
pub enum GraphFormat {
    /// Graphviz DOT
    #[default]
    Dot,
    /// JSON node and edge lists
    Json,
    /// Dependency tree
    Tree,
}

/// Dump the dependency graph of a layer
#[derive(Args, Debug)]
pub struct GraphArgs {
    #[command(flatten)]
    pub layer: LayerArgs,

    /// Output format.
    #[arg(long, value_enum, default_value = "dot")]
    pub format: GraphFormat,

    /// Write the dump to FILE instead of stdout.
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,
}

/// Execute the `graph` command.
pub fn execute(args: GraphArgs) -> Result<()> {
    let input = args.layer.load_input()?;
    let (graph, report) = orchestrator::build_graph(&input, &args.layer.engine_config())
        .map_err(|e| engine_failure(&e))?;
    for failure in report.failures() {
        warn!("{}", failure);
    }

    let rendered = match args.format {
        GraphFormat::Dot => dump::to_dot(&graph),
        GraphFormat::Json => format!("{}\n", dump::to_json(&graph)?),
        GraphFormat::Tree => dump::render_tree(&graph)?,
    };
    match &args.output {
        Some(path) => fs::write(path, rendered).map_err(|e| {
            anyhow::anyhow!("Failed to write graph to {}: {}", path.display(), e)
        })?,
        None => print!("{}", rendered),
    }
    Ok(())
}
