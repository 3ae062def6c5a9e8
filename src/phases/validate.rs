//! Phase 4: Validation
//!
//! Evaluates every requirement of every feature against the namespaces built
//! in phase 3 and links each requirer to whatever provides the resolved path
//! (and every symlink traversed on the way) or identity.
//!
//! The namespaces are complete and immutable at this point, so requirements
//! are evaluated as a read-only parallel map on the rayon pool. Results are
//! collected in declaration order and edges are added afterwards on the
//! calling thread; the outcome does not depend on the number of threads.

use super::orchestrator::EngineConfig;
use super::{DepGraph, Edge};
use crate::error::{Error, Result};
use crate::feature::Target;
use crate::validator::{self, Evaluation};
use log::debug;
use rayon::prelude::*;
use std::iter;

/// Requirement failures found while linking, in declaration order of the
/// requiring features and then of their requirements.
#[derive(Debug, Default)]
pub struct RequirementReport {
    pub evaluated: usize,
    failures: Vec<Error>,
}

impl RequirementReport {
    pub fn failures(&self) -> &[Error] {
        &self.failures
    }

    pub fn is_ok(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn into_failures(self) -> Vec<Error> {
        self.failures
    }

    /// The first failure, if any.
    pub fn into_result(self) -> Result<()> {
        match self.failures.into_iter().next() {
            Some(failure) => Err(failure),
            None => Ok(()),
        }
    }
}

fn evaluate_all(
    graph: &DepGraph,
    jobs: &[(usize, usize)],
    config: &EngineConfig,
) -> Result<Vec<Evaluation>> {
    let evaluate = |&(feature, requirement): &(usize, usize)| {
        let feature = &graph.features()[feature];
        validator::evaluate(
            &feature.normalized.requires[requirement],
            feature.phase(),
            graph,
            &feature.feature_ref(),
        )
    };

    if !config.parallel {
        return Ok(jobs.iter().map(evaluate).collect());
    }
    match config.threads {
        Some(threads) => {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .build()
                .map_err(|e| Error::InvalidConfig {
                    message: format!("cannot start {} validation threads: {}", threads, e),
                })?;
            Ok(pool.install(|| jobs.par_iter().map(evaluate).collect()))
        }
        None => Ok(jobs.par_iter().map(evaluate).collect()),
    }
}

/// Execute Phase 4: evaluate requirements and add requirement edges.
///
/// Only engine failures (a thread pool that cannot start) are returned as
/// errors here; requirement failures are collected in the report.
pub fn execute(graph: &mut DepGraph, config: &EngineConfig) -> Result<RequirementReport> {
    let jobs: Vec<(usize, usize)> = graph
        .features()
        .iter()
        .enumerate()
        .flat_map(|(f, feature)| (0..feature.normalized.requires.len()).map(move |r| (f, r)))
        .collect();
    let evaluations = evaluate_all(graph, &jobs, config)?;

    let mut report = RequirementReport {
        evaluated: jobs.len(),
        failures: Vec::new(),
    };
    let mut edges = Vec::new();
    for (&(f, r), evaluation) in jobs.iter().zip(evaluations) {
        let feature = &graph.features()[f];
        let requirement = &feature.normalized.requires[r];
        let Some(from) = graph.feature_node(feature.id) else {
            continue;
        };
        let targets = match (&requirement.target, &evaluation.resolved) {
            (Target::Identity(identity), _) => graph.identity_nodes(identity),
            (Target::Path(_), Some(resolved)) => resolved
                .via
                .iter()
                .chain(iter::once(&resolved.path))
                .flat_map(|path| graph.path_nodes(path, feature.phase()))
                .collect(),
            (Target::Path(_), None) => Vec::new(),
        };
        let edge = Edge::Requires {
            ordered: requirement.ordered,
        };
        edges.extend(targets.into_iter().map(|to| (from, to, edge)));
        if let Some(failure) = evaluation.failure {
            report.failures.push(failure);
        }
    }

    for (from, to, edge) in edges {
        graph.add_edge(from, to, edge);
    }
    debug!(
        "Evaluated {} requirements: {} failed, {} edges in graph",
        report.evaluated,
        report.failures.len(),
        graph.graph.edge_count()
    );
    Ok(report)
}
