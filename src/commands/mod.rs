//! # CLI Command Implementations
//!
//! This module contains the implementation for each subcommand of the
//! `layer-depgraph` command-line tool. Each subcommand is defined in its own
//! file.
//!
//! ## Structure
//!
//! Each command module typically contains:
//! - An `Args` struct that defines the command-specific arguments and options,
//!   derived using `clap`.
//! - An `execute` function that takes the parsed `Args` and performs the
//!   command's logic.
//!
//! Commands that run the engine share [`LayerArgs`], which names the feature
//! file, the parent snapshot, the auxiliary layer snapshots and the engine
//! tunables.

use anyhow::Result;
use clap::Args;
use std::path::{Path, PathBuf};

use layer_depgraph::defaults::{DEFAULT_FEATURES_FILENAME, MAX_SYMLINK_HOPS};
use layer_depgraph::error::Error;
use layer_depgraph::facts::FrozenNamespace;
use layer_depgraph::phases::orchestrator::{EngineConfig, LayerInput};
use layer_depgraph::suggestions;

pub mod check;
pub mod completions;
pub mod graph;
pub mod ls;
pub mod plan;

/// Inputs of one layer build
#[derive(Args, Debug, Clone)]
pub struct LayerArgs {
    /// Feature file (JSON array, or YAML sequence for .yaml/.yml).
    #[arg(
        short,
        long,
        value_name = "FILE",
        env = "LAYER_DEPGRAPH_FEATURES",
        default_value = DEFAULT_FEATURES_FILENAME
    )]
    pub features: PathBuf,

    /// Facts snapshot of the parent layer.
    #[arg(long, value_name = "FACTS")]
    pub parent: Option<PathBuf>,

    /// Auxiliary layer snapshot for clone and layer_mount sources.
    #[arg(long = "layer", value_name = "LABEL=FACTS")]
    pub layers: Vec<String>,

    /// Maximum symlink substitutions while resolving one path.
    #[arg(
        long,
        value_name = "NUM",
        env = "LAYER_DEPGRAPH_MAX_SYMLINK_HOPS",
        default_value_t = MAX_SYMLINK_HOPS
    )]
    pub max_symlink_hops: usize,

    /// Threads used to evaluate requirements (default: all cores).
    #[arg(long, value_name = "NUM", env = "LAYER_DEPGRAPH_THREADS")]
    pub threads: Option<usize>,
}

impl LayerArgs {
    pub fn engine_config(&self) -> EngineConfig {
        let config = EngineConfig::default().with_max_symlink_hops(self.max_symlink_hops);
        match self.threads {
            Some(threads) => config.with_threads(threads),
            None => config,
        }
    }

    /// Load the feature file and every snapshot named on the command line.
    pub fn load_input(&self) -> Result<LayerInput> {
        if !self.features.exists() {
            return Err(suggestions::features_not_found(&self.features));
        }
        let mut input = LayerInput::load(&self.features).map_err(|e| {
            anyhow::anyhow!(
                "Failed to load features from {}: {}",
                self.features.display(),
                e
            )
        })?;
        if let Some(parent) = &self.parent {
            input = input.with_parent(load_facts(parent)?);
        }
        for arg in &self.layers {
            let (label, path) = parse_layer_arg(arg)?;
            input = input.with_layer(label, load_facts(Path::new(path))?);
        }
        Ok(input)
    }
}

fn load_facts(path: &Path) -> Result<FrozenNamespace> {
    if !path.exists() {
        return Err(suggestions::facts_not_found(path));
    }
    FrozenNamespace::load(path)
        .map_err(|e| anyhow::anyhow!("Failed to load facts from {}: {}", path.display(), e))
}

/// Turn an engine failure into a CLI error carrying its category, source
/// locations and a hint.
pub fn engine_failure(error: &Error) -> anyhow::Error {
    let mut message = format!("{}: {}", error.category(), error);
    for location in error.locations() {
        message.push_str(&format!("\n  at {}", location));
    }
    if let Some(hint) = suggestions::hint_for(error) {
        message.push_str(&format!("\n\nhint: {}", hint));
    }
    anyhow::anyhow!(message)
}

/// Split a `LABEL=FACTS` argument.
fn parse_layer_arg(arg: &str) -> Result<(&str, &str)> {
    match arg.split_once('=') {
        Some((label, path)) if !label.is_empty() && !path.is_empty() => Ok((label, path)),
        _ => Err(suggestions::invalid_layer_arg(arg)),
    }
}
