//! # Graph Dumps
//!
//! Debugging representations of a [`DepGraph`]:
//!
//! - **DOT**: Graphviz source. Unordered requirement edges are dashed.
//! - **JSON**: a `{nodes, edges}` document for tooling.
//! - **Tree**: a `ptree` dependency tree rooted at each feature that nothing
//!   else depends on.
//!
//! Every dump lists nodes by index and edges in insertion order, so it is
//! stable for a given input.

use crate::phases::{DepGraph, Edge, Node};
use petgraph::graph::NodeIndex;
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use ptree::TreeItem;
use serde::Serialize;
use std::borrow::Cow;
use std::collections::HashSet;
use std::fmt::Write as _;
use std::io;

/// Graphviz DOT source for the graph.
pub fn to_dot(graph: &DepGraph) -> String {
    let mut out = String::from("digraph depgraph {\n    rankdir=LR;\n    node [shape=box];\n");
    for node in graph.graph.node_indices() {
        let style = match &graph.graph[node] {
            Node::Feature(_) => "",
            _ => ", style=dashed",
        };
        let _ = writeln!(
            out,
            "    n{} [label=\"{}\"{}];",
            node.index(),
            escape(&graph.node_label(node)),
            style
        );
    }
    for edge in graph.graph.edge_references() {
        let style = if edge.weight().is_ordering() {
            ""
        } else {
            ", style=dashed"
        };
        let _ = writeln!(
            out,
            "    n{} -> n{} [label=\"{}\"{}];",
            edge.source().index(),
            edge.target().index(),
            edge.weight().label(),
            style
        );
    }
    out.push_str("}\n");
    out
}

fn escape(label: &str) -> String {
    label.replace('\\', "\\\\").replace('"', "\\\"")
}

#[derive(Debug, Serialize)]
struct JsonNode {
    index: usize,
    kind: &'static str,
    label: String,
}

#[derive(Debug, Serialize)]
struct JsonEdge {
    from: usize,
    to: usize,
    kind: &'static str,
    ordering: bool,
}

#[derive(Debug, Serialize)]
struct JsonGraph {
    nodes: Vec<JsonNode>,
    edges: Vec<JsonEdge>,
}

fn node_kind(node: &Node) -> &'static str {
    match node {
        Node::Feature(_) => "feature",
        Node::ParentEntry(_) => "parent_entry",
        Node::ParentIdentity(_) => "parent_identity",
        Node::Layer(_) => "layer",
    }
}

/// The graph as pretty-printed JSON.
pub fn to_json(graph: &DepGraph) -> serde_json::Result<String> {
    let document = JsonGraph {
        nodes: graph
            .graph
            .node_indices()
            .map(|node| JsonNode {
                index: node.index(),
                kind: node_kind(&graph.graph[node]),
                label: graph.node_label(node),
            })
            .collect(),
        edges: graph
            .graph
            .edge_references()
            .map(|edge| JsonEdge {
                from: edge.source().index(),
                to: edge.target().index(),
                kind: edge.weight().label(),
                ordering: edge.weight().is_ordering(),
            })
            .collect(),
    };
    serde_json::to_string_pretty(&document)
}

/// Tree node structure for ptree visualization
#[derive(Debug, Clone)]
pub struct TreeNode {
    label: String,
    children: Vec<TreeNode>,
}

impl TreeNode {
    pub fn label(&self) -> &str {
        &self.label
    }
}

impl TreeItem for TreeNode {
    type Child = TreeNode;

    fn write_self<W: io::Write>(&self, f: &mut W, _style: &ptree::Style) -> io::Result<()> {
        write!(f, "{}", self.label)
    }

    fn children(&self) -> Cow<'_, [Self::Child]> {
        Cow::Borrowed(&self.children)
    }
}

fn dependencies(graph: &DepGraph, node: NodeIndex) -> Vec<(NodeIndex, Edge)> {
    let mut out: Vec<(NodeIndex, Edge)> = graph
        .graph
        .edges_directed(node, Direction::Outgoing)
        .map(|edge| (edge.target(), *edge.weight()))
        .collect();
    out.sort_by_key(|(target, _)| (graph.position(*target).unwrap_or(usize::MAX), target.index()));
    out
}

fn build_tree_node(
    graph: &DepGraph,
    node: NodeIndex,
    edge: Option<Edge>,
    expanded: &mut HashSet<NodeIndex>,
    seen: &mut HashSet<NodeIndex>,
) -> TreeNode {
    seen.insert(node);
    let mut label = graph.node_label(node);
    if let Some(edge) = edge {
        if !edge.is_ordering() {
            label.push_str(" (unordered)");
        } else if edge != (Edge::Requires { ordered: true }) {
            let _ = write!(label, " ({})", edge.label());
        }
    }
    let deps = dependencies(graph, node);
    if deps.is_empty() {
        return TreeNode {
            label,
            children: vec![],
        };
    }
    if !expanded.insert(node) {
        label.push_str(" ...");
        return TreeNode {
            label,
            children: vec![],
        };
    }
    let children = deps
        .into_iter()
        .map(|(target, edge)| build_tree_node(graph, target, Some(edge), expanded, seen))
        .collect();
    TreeNode { label, children }
}

/// Dependency tree: the roots are features no other feature depends on,
/// each child is something its parent requires. A node with dependencies is
/// expanded once; later occurrences end in `...`. Features only reachable
/// through a cycle become roots in declaration order.
pub fn to_tree(graph: &DepGraph) -> TreeNode {
    let mut expanded = HashSet::new();
    let mut seen = HashSet::new();
    let nodes: Vec<NodeIndex> = graph
        .features()
        .iter()
        .filter_map(|feature| graph.feature_node(feature.id))
        .collect();
    let mut children: Vec<TreeNode> = nodes
        .iter()
        .filter(|node| {
            graph
                .graph
                .neighbors_directed(**node, Direction::Incoming)
                .next()
                .is_none()
        })
        .map(|node| build_tree_node(graph, *node, None, &mut expanded, &mut seen))
        .collect();
    for node in nodes {
        if !seen.contains(&node) {
            children.push(build_tree_node(graph, node, None, &mut expanded, &mut seen));
        }
    }
    TreeNode {
        label: format!("layer ({} features)", graph.features().len()),
        children,
    }
}

/// Render the dependency tree to a string.
pub fn render_tree(graph: &DepGraph) -> io::Result<String> {
    let mut buffer = Vec::new();
    ptree::write_tree(&to_tree(graph), &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_json;
    use crate::phases::orchestrator::{build_layer, EngineConfig, LayerInput};

    fn graph() -> DepGraph {
        let records = parse_json(
            r#"[
                {"kind": "ensure_dirs_exist", "dir": "/etc"},
                {"kind": "install", "src": "motd", "dst": "/etc/motd", "mode": "0755"},
                {"kind": "group_add", "name": "svc"},
                {"kind": "user_add", "name": "svc", "primary_group": "svc", "home_dir": "/etc",
                 "shell": "/etc/motd"}
            ]"#,
        )
        .unwrap();
        build_layer(&LayerInput::new(records), &EngineConfig::sequential())
            .map(|output| output.graph)
            .unwrap_or_else(|e| panic!("{}", e))
    }

    #[test]
    fn test_dot_marks_unordered_edges_dashed() {
        let graph = graph();
        let dot = to_dot(&graph);
        assert!(dot.starts_with("digraph depgraph {"));
        assert!(dot.contains("[label=\"#1 install(/etc/motd)\"]"));
        assert!(dot.contains("[label=\"parent:/\", style=dashed]"));
        let home = graph.feature_node(crate::feature::FeatureId::new(3, 0)).unwrap();
        let etc = graph.feature_node(crate::feature::FeatureId::new(0, 0)).unwrap();
        assert!(dot.contains(&format!(
            "n{} -> n{} [label=\"requires\", style=dashed];",
            home.index(),
            etc.index()
        )));
    }

    #[test]
    fn test_json_lists_nodes_and_edges() {
        let graph = graph();
        let value: serde_json::Value = serde_json::from_str(&to_json(&graph).unwrap()).unwrap();
        let nodes = value["nodes"].as_array().unwrap();
        assert_eq!(nodes.len(), graph.graph.node_count());
        assert_eq!(nodes[0]["kind"], "feature");
        assert_eq!(nodes[0]["label"], "#0 ensure_dirs_exist(/etc)");
        let edges = value["edges"].as_array().unwrap();
        assert_eq!(edges.len(), graph.graph.edge_count());
        assert!(edges
            .iter()
            .any(|e| e["kind"] == "requires" && e["ordering"] == false));
    }

    #[test]
    fn test_tree_roots_are_undepended_features() {
        let graph = graph();
        let tree = to_tree(&graph);
        let roots: Vec<&str> = tree.children.iter().map(|c| c.label()).collect();
        assert_eq!(roots, vec!["#3 user_add(svc)"]);
        let rendered = render_tree(&graph).unwrap();
        assert!(rendered.starts_with("layer (4 features)"));
        assert!(rendered.contains("#0 ensure_dirs_exist(/etc) (unordered)"));
    }

    #[test]
    fn test_tree_keeps_features_on_a_cycle() {
        let records = parse_json(
            r#"[
                {"kind": "group_add", "name": "alice"},
                {"kind": "user_add", "name": "alice", "primary_group": "alice", "home_dir": "/",
                 "shell": "/sh"},
                {"kind": "install", "src": "sh", "dst": "/sh", "mode": "0755", "user": "alice"}
            ]"#,
        )
        .unwrap();
        let (graph, _) = crate::phases::orchestrator::build_graph(
            &LayerInput::new(records),
            &EngineConfig::sequential(),
        )
        .unwrap();
        let tree = to_tree(&graph);
        let roots: Vec<&str> = tree.children.iter().map(|c| c.label()).collect();
        assert_eq!(roots, vec!["#0 group_add(alice)", "#1 user_add(alice)"]);
        assert!(render_tree(&graph).unwrap().contains("#1 user_add(alice) ..."));
    }
}
