//! Orchestrator for a complete layer build
//!
//! This module coordinates all phases to provide a clean API for building one
//! layer: from feature records and an optional parent snapshot to a build
//! plan, the exported snapshot and the dependency graph.

use super::validate::RequirementReport;
use super::{phase1, phase2, phase3, phase4, phase5, phase6, BuildPlan, DepGraph};
use crate::config::{self, FeatureRecord};
use crate::defaults;
use crate::error::{Error, Result};
use crate::facts::FrozenNamespace;
use log::info;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Tunables of the engine. The defaults suit every real layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Symlink substitutions allowed while resolving one path
    pub max_symlink_hops: usize,
    /// Evaluate requirements on the rayon thread pool
    pub parallel: bool,
    /// Size of a dedicated thread pool; the global pool when unset
    pub threads: Option<usize>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_symlink_hops: defaults::MAX_SYMLINK_HOPS,
            parallel: true,
            threads: None,
        }
    }
}

impl EngineConfig {
    pub fn sequential() -> Self {
        Self {
            parallel: false,
            ..Self::default()
        }
    }

    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = Some(threads);
        self
    }

    pub fn with_max_symlink_hops(mut self, hops: usize) -> Self {
        self.max_symlink_hops = hops;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.threads == Some(0) {
            return Err(Error::InvalidConfig {
                message: "threads must be at least 1".to_string(),
            });
        }
        if self.max_symlink_hops == 0 {
            return Err(Error::InvalidConfig {
                message: "max_symlink_hops must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

/// Everything one layer build consumes.
#[derive(Debug, Clone, Default)]
pub struct LayerInput {
    pub records: Vec<FeatureRecord>,
    pub parent: Option<FrozenNamespace>,
    /// Auxiliary layer snapshots by label, for `clone` and `layer_mount`
    pub layers: BTreeMap<String, FrozenNamespace>,
}

impl LayerInput {
    pub fn new(records: Vec<FeatureRecord>) -> Self {
        Self {
            records,
            ..Self::default()
        }
    }

    /// Load the feature records of a JSON or YAML file.
    pub fn load(features: &Path) -> Result<Self> {
        Ok(Self::new(config::load(features)?))
    }

    pub fn with_parent(mut self, parent: FrozenNamespace) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn with_layer(mut self, label: impl Into<String>, layer: FrozenNamespace) -> Self {
        self.layers.insert(label.into(), layer);
        self
    }
}

/// Result of a successful layer build.
#[derive(Debug)]
pub struct BuildOutput {
    pub plan: BuildPlan,
    /// Snapshot to hand to child layers
    pub facts: FrozenNamespace,
    pub graph: DepGraph,
}

/// Run Phases 1-4: build the dependency graph and evaluate every
/// requirement, without rejecting cycles or failed requirements.
///
/// Used for graph dumps, which are most useful when the build fails.
pub fn build_graph(
    input: &LayerInput,
    config: &EngineConfig,
) -> Result<(DepGraph, RequirementReport)> {
    config.validate()?;

    // Phase 1: Parent Import
    let parent = phase1::execute(input.parent.as_ref(), config.max_symlink_hops)?;

    // Phase 2: Collection
    let features = phase2::execute(&input.records, &input.layers)?;

    // Phase 3: Graph Construction
    let mut graph = phase3::execute(features, parent, &input.layers)?;

    // Phase 4: Validation
    let report = phase4::execute(&mut graph, config)?;

    Ok((graph, report))
}

fn finish(graph: DepGraph) -> Result<BuildOutput> {
    // Phase 6: Ordering
    let plan = phase6::execute(&graph)?;
    let facts = graph.export();
    info!(
        "Layer planned: {} steps, {} entries exported",
        plan.len(),
        facts.namespace.len()
    );

    Ok(BuildOutput { plan, facts, graph })
}

/// Execute a complete layer build (Phases 1-6)
///
/// This orchestrates the whole pipeline:
/// 1. Import the parent snapshot
/// 2. Normalize and dedupe the records
/// 3. Build the graph, rejecting conflicts
/// 4. Evaluate requirements and link them to their providers
/// 5. Reject cycles
/// 6. Order the features
///
/// Requirement failures from phase 4 are returned after phase 5, so a cycle
/// is reported before the requirement errors it causes.
pub fn build_layer(input: &LayerInput, config: &EngineConfig) -> Result<BuildOutput> {
    let (graph, report) = build_graph(input, config)?;

    // Phase 5: Cycle Detection
    phase5::execute(&graph)?;
    report.into_result()?;

    finish(graph)
}

/// Like [`build_layer`], but reports every requirement failure instead of
/// only the first. Earlier failures (input, conflicts, cycles) abort the
/// build and are reported alone.
pub fn check_layer(
    input: &LayerInput,
    config: &EngineConfig,
) -> std::result::Result<BuildOutput, Vec<Error>> {
    let (graph, report) = build_graph(input, config).map_err(|e| vec![e])?;
    phase5::execute(&graph).map_err(|e| vec![e])?;
    if !report.is_ok() {
        return Err(report.into_failures());
    }
    finish(graph).map_err(|e| vec![e])
}
