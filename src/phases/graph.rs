//! Phase 3: Graph Construction
//!
//! Builds the [`DepGraph`]: one node per feature, one pseudo-node per parent
//! entry, parent identity and auxiliary layer. This phase decides who provides
//! every path and identity; requirement edges are added in phase 4.
//!
//! ## Provider slots
//!
//! Every provided path gets a slot (indexed through a [`PathArena`]) holding
//! its claims in declaration order:
//!
//! - **Strong** claims (`install`, symlinks, devices, mounts, cloned leaves,
//!   resolved hardlinks) must agree on entry and content. Two different
//!   strong claims are a conflict, and so is a strong claim that rewrites a
//!   visible parent entry differently. Rewriting it identically is a no-op.
//! - **Weak** claims (ensured directories, cloned directories below an
//!   existing destination) yield to a visible parent entry, to any strong
//!   claim and to the first weak claim. A yielding feature instead requires
//!   the path to be a directory.
//!
//! ## Removals
//!
//! A `remove` of `Q` is *parent-provided* when the parent has `Q` or anything
//! below it. Parent entries at and under such a `Q` are hidden from the final
//! namespace, and every provider of a path under `Q` is a reinstall, ordered
//! after the remover. Otherwise the remover is ordered after every in-layer
//! provider at or under `Q`, and those paths are absent from the final
//! namespace.
//!
//! Requirements of removal-phase features see the namespace before
//! removals (parent plus every in-layer path that is not a reinstall); all
//! other requirements see the final namespace.

use super::{Edge, Node};
use crate::config::FeatureSpec;
use crate::error::{Error, FeatureRef, Result};
use crate::facts::FrozenNamespace;
use crate::feature::{BuildPhase, Feature, FeatureId, Identity, Provide, Requirement};
use crate::namespace::{FsEntry, Namespace};
use crate::path::{LayerPath, PathArena, PathId};
use crate::validator::Lookup;
use log::{debug, info, warn};
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// A feature's claim on a path.
#[derive(Debug, Clone)]
struct Claim {
    feature: usize,
    entry: FsEntry,
    content: Option<String>,
}

#[derive(Debug, Clone, Default)]
struct Slot {
    strong: Vec<Claim>,
    weak: Vec<Claim>,
}

#[derive(Debug, Clone)]
struct Removal {
    feature: usize,
    path: LayerPath,
    parent_provided: bool,
}

/// The dependency graph of one layer, with the namespaces it produces.
#[derive(Debug)]
pub struct DepGraph {
    pub graph: DiGraph<Node, Edge>,
    features: Vec<Feature>,
    index: HashMap<FeatureId, usize>,
    feature_nodes: Vec<NodeIndex>,
    parent_entry_nodes: HashMap<LayerPath, NodeIndex>,
    parent_identity_nodes: HashMap<Identity, NodeIndex>,
    layer_nodes: HashMap<String, NodeIndex>,
    arena: PathArena,
    providers: HashMap<PathId, Vec<usize>>,
    identity_providers: BTreeMap<Identity, Vec<usize>>,
    removals: Vec<Removal>,
    parent: FrozenNamespace,
    before: Namespace,
    after: Namespace,
    users: BTreeMap<String, Option<u32>>,
    groups: BTreeMap<String, Option<u32>>,
}

impl DepGraph {
    fn new(
        features: Vec<Feature>,
        parent: FrozenNamespace,
        layers: &BTreeMap<String, FrozenNamespace>,
    ) -> Self {
        let mut graph = DiGraph::new();
        let feature_nodes = features
            .iter()
            .map(|f| graph.add_node(Node::Feature(f.id)))
            .collect();
        let index = features.iter().enumerate().map(|(i, f)| (f.id, i)).collect();

        let mut parent_entry_nodes = HashMap::new();
        for entry in parent.namespace.entries() {
            let node = graph.add_node(Node::ParentEntry(entry.path.clone()));
            parent_entry_nodes.insert(entry.path.clone(), node);
        }
        let mut parent_identity_nodes = HashMap::new();
        let identities = parent
            .users
            .keys()
            .map(|name| Identity::User(name.clone()))
            .chain(parent.groups.keys().map(|name| Identity::Group(name.clone())));
        for identity in identities {
            let node = graph.add_node(Node::ParentIdentity(identity.clone()));
            parent_identity_nodes.insert(identity, node);
        }
        let layer_nodes = layers
            .keys()
            .map(|label| (label.clone(), graph.add_node(Node::Layer(label.clone()))))
            .collect();

        Self {
            graph,
            features,
            index,
            feature_nodes,
            parent_entry_nodes,
            parent_identity_nodes,
            layer_nodes,
            arena: PathArena::new(),
            providers: HashMap::new(),
            identity_providers: BTreeMap::new(),
            removals: Vec::new(),
            users: parent.users.clone(),
            groups: parent.groups.clone(),
            before: Namespace::with_max_hops(parent.namespace.max_hops()),
            after: Namespace::with_max_hops(parent.namespace.max_hops()),
            parent,
        }
    }

    /// Features in declaration order.
    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    pub fn feature(&self, id: FeatureId) -> Option<&Feature> {
        self.index.get(&id).map(|i| &self.features[*i])
    }

    pub fn feature_node(&self, id: FeatureId) -> Option<NodeIndex> {
        self.index.get(&id).map(|i| self.feature_nodes[*i])
    }

    /// The feature a node stands for, if it is a feature node.
    pub fn node_feature(&self, node: NodeIndex) -> Option<&Feature> {
        match &self.graph[node] {
            Node::Feature(id) => self.feature(*id),
            _ => None,
        }
    }

    /// Declaration position of the feature a node stands for.
    pub fn position(&self, node: NodeIndex) -> Option<usize> {
        match &self.graph[node] {
            Node::Feature(id) => self.index.get(id).copied(),
            _ => None,
        }
    }

    /// The graph restricted to edges that constrain the build order. Node
    /// indices are the same as in [`DepGraph::graph`].
    pub fn ordering_graph(&self) -> DiGraph<(), ()> {
        self.graph
            .filter_map(|_, _| Some(()), |_, edge| edge.is_ordering().then_some(()))
    }

    /// The namespace seen by removal-phase requirements.
    pub fn namespace_before(&self) -> &Namespace {
        &self.before
    }

    /// The namespace after every feature of the layer is applied.
    pub fn final_namespace(&self) -> &Namespace {
        &self.after
    }

    fn hidden(&self, path: &LayerPath) -> bool {
        self.removals
            .iter()
            .any(|r| r.parent_provided && path.starts_with(&r.path))
    }

    fn parent_visible(&self, path: &LayerPath) -> bool {
        self.parent.namespace.contains(path) && !self.hidden(path)
    }

    /// Features providing `path` as seen by requirements of `phase`.
    pub fn providers_of(&self, path: &LayerPath, phase: BuildPhase) -> Vec<FeatureId> {
        if phase == BuildPhase::Removal && self.hidden(path) {
            return Vec::new();
        }
        self.arena
            .lookup(path)
            .and_then(|id| self.providers.get(&id))
            .map(|providers| providers.iter().map(|i| self.features[*i].id).collect())
            .unwrap_or_default()
    }

    /// Nodes a requirement on `path` links to: in-layer providers, or else
    /// the parent entry.
    pub fn path_nodes(&self, path: &LayerPath, phase: BuildPhase) -> Vec<NodeIndex> {
        let providers = self.providers_of(path, phase);
        if !providers.is_empty() {
            return providers
                .into_iter()
                .filter_map(|id| self.feature_node(id))
                .collect();
        }
        let visible = match phase {
            BuildPhase::Removal => self.parent.namespace.contains(path),
            BuildPhase::Install => self.parent_visible(path),
        };
        if visible {
            self.parent_entry_nodes.get(path).copied().into_iter().collect()
        } else {
            Vec::new()
        }
    }

    /// Nodes a requirement on `identity` links to.
    pub fn identity_nodes(&self, identity: &Identity) -> Vec<NodeIndex> {
        if let Some(providers) = self.identity_providers.get(identity) {
            return providers.iter().map(|i| self.feature_nodes[*i]).collect();
        }
        let node = match identity {
            Identity::Layer(label) => self.layer_nodes.get(label),
            _ => self.parent_identity_nodes.get(identity),
        };
        node.copied().into_iter().collect()
    }

    /// Add an edge unless one already connects the two nodes. An ordering
    /// edge replaces an existing unordered one.
    pub fn add_edge(&mut self, from: NodeIndex, to: NodeIndex, edge: Edge) {
        if let Some(existing) = self.graph.find_edge(from, to) {
            if !self.graph[existing].is_ordering() && edge.is_ordering() {
                self.graph[existing] = edge;
            }
            return;
        }
        self.graph.add_edge(from, to, edge);
    }

    /// Short label of a node, for dumps and logs.
    pub fn node_label(&self, node: NodeIndex) -> String {
        match self.node_feature(node) {
            Some(feature) => format!("{} {}", feature.id, feature.description()),
            None => self.graph[node].to_string(),
        }
    }

    /// Snapshot of the layer's final state, for use as a child's parent.
    pub fn export(&self) -> FrozenNamespace {
        FrozenNamespace {
            namespace: self.after.clone(),
            users: self.users.clone(),
            groups: self.groups.clone(),
        }
    }

    fn feature_refs(&self, indices: impl IntoIterator<Item = usize>) -> Vec<FeatureRef> {
        let mut seen = BTreeSet::new();
        indices
            .into_iter()
            .filter(|i| seen.insert(*i))
            .map(|i| self.features[i].feature_ref())
            .collect()
    }

    fn slot<'s>(&mut self, slots: &'s mut Vec<Slot>, path: &LayerPath) -> &'s mut Slot {
        let id = self.arena.intern(path);
        if id.index() >= slots.len() {
            slots.resize_with(id.index() + 1, Slot::default);
        }
        &mut slots[id.index()]
    }

    /// The claim whose entry ends up at the slot's path, if any feature's does.
    fn winner<'s>(&self, path: &LayerPath, slot: &'s Slot) -> Option<&'s Claim> {
        if let Some(first) = slot.strong.first() {
            return Some(first);
        }
        if self.parent_visible(path) {
            return None;
        }
        slot.weak.first()
    }

    fn winning_entries<'s>(&self, slots: &'s [Slot]) -> Vec<&'s FsEntry> {
        slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| {
                let path = self.arena.get(PathId::from_index(i));
                self.winner(path, slot).map(|claim| &claim.entry)
            })
            .collect()
    }

    /// Parent, minus parent-provided removals, plus `entries`, minus the
    /// remaining removals.
    fn assemble<'e>(&self, entries: impl IntoIterator<Item = &'e FsEntry>) -> Namespace {
        let mut namespace = self.parent.namespace.clone();
        for removal in self.removals.iter().filter(|r| r.parent_provided) {
            namespace.remove_subtree(&removal.path);
        }
        for entry in entries {
            namespace.insert(entry.clone());
        }
        for removal in self.removals.iter().filter(|r| !r.parent_provided) {
            namespace.remove_subtree(&removal.path);
        }
        namespace
    }

    fn collect_claims(
        &mut self,
        slots: &mut Vec<Slot>,
    ) -> (Vec<(usize, Identity)>, Vec<(usize, LayerPath, LayerPath)>) {
        let mut identities = Vec::new();
        let mut hardlinks = Vec::new();
        let provides: Vec<(usize, Provide)> = self
            .features
            .iter()
            .enumerate()
            .flat_map(|(i, f)| f.normalized.provides.iter().map(move |p| (i, p.clone())))
            .collect();

        for (feature, provide) in provides {
            match provide {
                Provide::Entry { entry, content } => {
                    let path = entry.path.clone();
                    self.slot(slots, &path).strong.push(Claim {
                        feature,
                        entry,
                        content,
                    });
                }
                Provide::WeakDirectory(entry) => {
                    let path = entry.path.clone();
                    self.slot(slots, &path).weak.push(Claim {
                        feature,
                        entry,
                        content: None,
                    });
                }
                Provide::Absence(path) => {
                    let parent_provided = self.parent.namespace.contains(&path)
                        || !self.parent.namespace.descendants(&path).is_empty();
                    self.removals.push(Removal {
                        feature,
                        path,
                        parent_provided,
                    });
                }
                Provide::Identity(identity) => identities.push((feature, identity)),
                Provide::Hardlink { link, target } => hardlinks.push((feature, link, target)),
            }
        }
        (identities, hardlinks)
    }

    /// Give each hardlink the entry of its target. Links to links resolve
    /// once their target has, so this repeats until nothing changes.
    fn resolve_hardlinks(
        &mut self,
        slots: &mut Vec<Slot>,
        mut pending: Vec<(usize, LayerPath, LayerPath)>,
    ) {
        while !pending.is_empty() {
            let draft = self.assemble(self.winning_entries(slots));
            let mut unresolved = Vec::new();
            let mut claims = Vec::new();
            for (feature, link, target) in pending {
                let found = draft
                    .resolve(&target)
                    .ok()
                    .and_then(|resolved| draft.lookup(&resolved.path).cloned());
                match found {
                    Some(entry) if !entry.is_dir() && !entry.is_symlink() => {
                        let content = Some(format!("hardlink:{}", entry.path));
                        let mut entry = entry;
                        entry.path = link;
                        claims.push(Claim {
                            feature,
                            entry,
                            content,
                        });
                    }
                    _ => unresolved.push((feature, link, target)),
                }
            }
            if claims.is_empty() {
                for (feature, link, target) in &unresolved {
                    debug!(
                        "{}: hardlink {} has no usable target {}",
                        self.features[*feature].description(),
                        link,
                        target
                    );
                }
                break;
            }
            for claim in claims {
                let path = claim.entry.path.clone();
                self.slot(slots, &path).strong.push(claim);
            }
            pending = unresolved;
        }
    }

    fn check_path_conflicts(&self, slots: &[Slot]) -> Result<()> {
        for (i, slot) in slots.iter().enumerate() {
            let Some(first) = slot.strong.first() else {
                continue;
            };
            let path = self.arena.get(PathId::from_index(i));
            if slot
                .strong
                .iter()
                .any(|c| c.entry != first.entry || c.content != first.content)
            {
                return Err(Error::Conflict {
                    item: path.to_string(),
                    providers: self.feature_refs(slot.strong.iter().map(|c| c.feature)),
                });
            }
            if let Some(existing) = self.parent.namespace.lookup(path) {
                if !self.hidden(path) && *existing != first.entry {
                    let mut providers = vec![FeatureRef::parent_layer()];
                    providers.extend(self.feature_refs(slot.strong.iter().map(|c| c.feature)));
                    return Err(Error::Conflict {
                        item: path.to_string(),
                        providers,
                    });
                }
            }
        }
        Ok(())
    }

    fn check_identity_conflicts(&self) -> Result<()> {
        for (identity, providers) in &self.identity_providers {
            if providers.len() > 1 {
                return Err(Error::Conflict {
                    item: identity.to_string(),
                    providers: self.feature_refs(providers.iter().copied()),
                });
            }
            let known = match identity {
                Identity::User(name) => self.parent.users.get(name),
                Identity::Group(name) => self.parent.groups.get(name),
                Identity::Layer(_) => None,
            };
            let (Some(known), Some(&feature)) = (known, providers.first()) else {
                continue;
            };
            let declared = declared_id(&self.features[feature]);
            let compatible = match (known, declared) {
                (Some(known), Some(declared)) => *known == declared,
                _ => true,
            };
            if !compatible {
                return Err(Error::Conflict {
                    item: identity.to_string(),
                    providers: vec![
                        FeatureRef::parent_layer(),
                        self.features[feature].feature_ref(),
                    ],
                });
            }
        }
        Ok(())
    }

    /// Turn every yielding weak claim into a directory requirement, and
    /// record the effective providers of each path.
    fn settle_slots(&mut self, slots: &[Slot]) {
        let mut yielded = Vec::new();
        for (i, slot) in slots.iter().enumerate() {
            let id = PathId::from_index(i);
            let path = self.arena.get(id).clone();
            let weak_wins = slot.strong.is_empty() && !self.parent_visible(&path);
            for (n, claim) in slot.weak.iter().enumerate() {
                if !(weak_wins && n == 0) {
                    yielded.push((claim.feature, path.clone()));
                }
            }
            let mut providers: Vec<usize> = if slot.strong.is_empty() {
                slot.weak.iter().take(usize::from(weak_wins)).map(|c| c.feature).collect()
            } else {
                slot.strong.iter().map(|c| c.feature).collect()
            };
            providers.dedup();
            if !providers.is_empty() {
                self.providers.insert(id, providers);
            }
        }

        for (index, path) in yielded {
            let requirement = Requirement::directory(path);
            let feature = &mut self.features[index];
            if !feature.normalized.requires.contains(&requirement) {
                debug!(
                    "{} defers {} to another provider",
                    feature.normalized.description, requirement.target
                );
                feature.normalized.requires.push(requirement);
            }
        }
    }

    fn add_removal_edges(&mut self) {
        let mut edges = Vec::new();
        for removal in &self.removals {
            let remover = self.feature_nodes[removal.feature];
            let mut affected = 0;
            for (id, providers) in &self.providers {
                let path = self.arena.get(*id);
                if !path.starts_with(&removal.path) {
                    continue;
                }
                for &provider in providers.iter().filter(|p| **p != removal.feature) {
                    affected += 1;
                    let provider = self.feature_nodes[provider];
                    if removal.parent_provided {
                        edges.push((provider, remover, Edge::Reinstall));
                    } else {
                        edges.push((remover, provider, Edge::AfterProvider));
                    }
                }
            }
            let feature = &self.features[removal.feature];
            if !removal.parent_provided && affected == 0 && feature.normalized.requires.is_empty() {
                warn!(
                    "{} removes {}, which nothing provides",
                    feature.description(),
                    removal.path
                );
            }
        }
        // Stable edge order regardless of map iteration order.
        edges.sort_by_key(|(from, to, _)| (*from, *to));
        for (from, to, edge) in edges {
            self.add_edge(from, to, edge);
        }
    }

    fn settle_identities(&mut self, claims: Vec<(usize, Identity)>) {
        for (feature, identity) in claims {
            let declared = declared_id(&self.features[feature]);
            let known = match &identity {
                Identity::User(name) => Some(self.users.entry(name.clone()).or_insert(None)),
                Identity::Group(name) => Some(self.groups.entry(name.clone()).or_insert(None)),
                Identity::Layer(_) => None,
            };
            if let Some(known) = known {
                if known.is_none() {
                    *known = declared;
                }
            }
            self.identity_providers.entry(identity).or_default().push(feature);
        }
    }
}

/// The numeric id a `user_add` or `group_add` asks for.
fn declared_id(feature: &Feature) -> Option<u32> {
    match &feature.spec {
        FeatureSpec::UserAdd(spec) => spec.uid,
        FeatureSpec::GroupAdd(spec) => spec.gid,
        _ => None,
    }
}

impl Lookup for DepGraph {
    fn namespace(&self, phase: BuildPhase) -> &Namespace {
        match phase {
            BuildPhase::Removal => &self.before,
            BuildPhase::Install => &self.after,
        }
    }

    fn has_identity(&self, identity: &Identity) -> bool {
        match identity {
            Identity::User(name) => self.users.contains_key(name),
            Identity::Group(name) => self.groups.contains_key(name),
            Identity::Layer(label) => self.layer_nodes.contains_key(label),
        }
    }
}

/// Execute Phase 3: build the graph and the layer's namespaces.
///
/// Fails with the first conflicting path (in order of first declaration),
/// then with the first conflicting identity.
pub fn execute(
    features: Vec<Feature>,
    parent: FrozenNamespace,
    layers: &BTreeMap<String, FrozenNamespace>,
) -> Result<DepGraph> {
    let mut graph = DepGraph::new(features, parent, layers);
    let mut slots = Vec::new();
    let (identities, hardlinks) = graph.collect_claims(&mut slots);
    graph.resolve_hardlinks(&mut slots, hardlinks);

    graph.check_path_conflicts(&slots)?;
    graph.settle_identities(identities);
    graph.check_identity_conflicts()?;
    graph.settle_slots(&slots);

    let entries = graph.winning_entries(&slots);
    let mut before = graph.parent.namespace.clone();
    for entry in entries.iter().filter(|e| !graph.hidden(&e.path)) {
        before.insert((*entry).clone());
    }
    let after = graph.assemble(entries);
    graph.before = before;
    graph.after = after;
    graph.add_removal_edges();

    info!(
        "Built dependency graph: {} features, {} paths provided, {} removals, {} entries in final namespace",
        graph.features.len(),
        graph.providers.len(),
        graph.removals.len(),
        graph.after.len()
    );
    Ok(graph)
}
