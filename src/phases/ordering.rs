//! Phase 6: Ordering
//!
//! Produces the [`BuildPlan`] with Kahn's algorithm over the ordering edges
//! between features. Parent-layer pseudo-nodes are already realized, so edges
//! into them never hold a feature back.
//!
//! Among the features that are ready at any point, removal-phase features go
//! first and ties are broken by declaration order. The plan is therefore a
//! pure function of the input.

use super::{BuildPlan, DepGraph, PlanStep};
use crate::error::{Error, Result};
use crate::feature::{BuildPhase, Feature, FeatureId};
use log::info;
use std::cmp::Reverse;
use std::collections::{BTreeSet, BinaryHeap};

fn step(feature: &Feature) -> PlanStep {
    PlanStep {
        id: feature.id,
        kind: feature.kind,
        phase: feature.phase(),
        description: feature.description().to_string(),
        location: feature.location.clone(),
        spec: feature.spec.clone(),
    }
}

/// Execute Phase 6: order the features of an acyclic graph.
pub fn execute(graph: &DepGraph) -> Result<BuildPlan> {
    let ordering = graph.ordering_graph();
    let features = graph.features();
    let mut waiting_on = vec![0usize; features.len()];
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); features.len()];

    for (index, feature) in features.iter().enumerate() {
        let Some(node) = graph.feature_node(feature.id) else {
            continue;
        };
        let dependencies: BTreeSet<usize> = ordering
            .neighbors(node)
            .filter_map(|n| graph.position(n))
            .filter(|d| *d != index)
            .collect();
        waiting_on[index] = dependencies.len();
        for dependency in dependencies {
            dependents[dependency].push(index);
        }
    }

    let mut ready: BinaryHeap<Reverse<(BuildPhase, FeatureId, usize)>> = features
        .iter()
        .enumerate()
        .filter(|(index, _)| waiting_on[*index] == 0)
        .map(|(index, feature)| Reverse((feature.phase(), feature.id, index)))
        .collect();
    let mut steps = Vec::with_capacity(features.len());

    while let Some(Reverse((_, _, index))) = ready.pop() {
        steps.push(step(&features[index]));
        for &dependent in &dependents[index] {
            waiting_on[dependent] -= 1;
            if waiting_on[dependent] == 0 {
                let feature = &features[dependent];
                ready.push(Reverse((feature.phase(), feature.id, dependent)));
            }
        }
    }

    if steps.len() < features.len() {
        // Phase 5 rejects cycles, so this only guards against misuse.
        return Err(Error::Cycle {
            features: features
                .iter()
                .enumerate()
                .filter(|(index, _)| waiting_on[*index] > 0)
                .map(|(_, feature)| feature.feature_ref())
                .collect(),
        });
    }

    info!(
        "Ordered {} features ({} in removal phase)",
        steps.len(),
        steps
            .iter()
            .filter(|s| s.phase == BuildPhase::Removal)
            .count()
    );
    Ok(BuildPlan::new(steps))
}
