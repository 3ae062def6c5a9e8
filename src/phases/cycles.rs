//! Phase 5: Cycle Detection
//!
//! Runs Tarjan's strongly-connected-components algorithm over the ordering
//! edges of the graph. Unordered requirement edges are ignored: they are
//! validated but never constrain the build order.
//!
//! Pseudo-nodes only ever receive edges, so every cycle consists of
//! features. When several components are cyclic, the one holding the
//! earliest declared feature is reported, as the shortest cycle through that
//! feature.

use super::DepGraph;
use crate::error::{Error, Result};
use crate::feature::FeatureId;
use log::debug;
use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::{HashMap, HashSet, VecDeque};

/// Execute Phase 5: fail on the first cycle among ordering edges.
pub fn execute(graph: &DepGraph) -> Result<()> {
    let ordering = graph.ordering_graph();
    let mut reported: Option<(FeatureId, Vec<NodeIndex>)> = None;

    for component in tarjan_scc(&ordering) {
        let cyclic = match component.as_slice() {
            [single] => ordering.contains_edge(*single, *single),
            _ => true,
        };
        if !cyclic {
            continue;
        }
        let Some(earliest) = component
            .iter()
            .filter_map(|node| graph.node_feature(*node))
            .map(|feature| feature.id)
            .min()
        else {
            continue;
        };
        let earlier = reported.as_ref().map_or(true, |(best, _)| earliest < *best);
        if earlier {
            reported = Some((earliest, component));
        }
    }

    let Some((start, component)) = reported else {
        debug!("No cycles among {} ordering edges", ordering.edge_count());
        return Ok(());
    };
    let Some(start) = graph.feature_node(start) else {
        return Ok(());
    };
    let walk = shortest_cycle(graph, &ordering, start, &component);
    Err(Error::Cycle {
        features: walk
            .into_iter()
            .filter_map(|node| graph.node_feature(node))
            .map(|feature| feature.feature_ref())
            .collect(),
    })
}

/// Breadth-first search for the shortest walk from `start` back to itself
/// inside `component`, visiting neighbours in declaration order.
fn shortest_cycle(
    graph: &DepGraph,
    ordering: &DiGraph<(), ()>,
    start: NodeIndex,
    component: &[NodeIndex],
) -> Vec<NodeIndex> {
    let members: HashSet<NodeIndex> = component.iter().copied().collect();
    let mut previous: HashMap<NodeIndex, NodeIndex> = HashMap::new();
    let mut visited = HashSet::from([start]);
    let mut queue = VecDeque::from([start]);

    while let Some(node) = queue.pop_front() {
        let mut next: Vec<NodeIndex> = ordering
            .neighbors(node)
            .filter(|n| members.contains(n))
            .collect();
        next.sort_by_key(|n| graph.position(*n));
        next.dedup();

        for neighbor in next {
            if neighbor == start {
                let mut walk = vec![node];
                let mut current = node;
                while current != start {
                    match previous.get(&current) {
                        Some(prior) => {
                            current = *prior;
                            walk.push(current);
                        }
                        None => break,
                    }
                }
                walk.reverse();
                return walk;
            }
            if visited.insert(neighbor) {
                previous.insert(neighbor, node);
                queue.push_back(neighbor);
            }
        }
    }
    vec![start]
}
