//! Implementation of the phases of a layer build.
//!
//! ## Overview
//!
//! A layer build follows 6 phases:
//! 1. Parent Import - Load the parent snapshot and seed the builtin items
//! 2. Collection - Normalize every record and collapse identical features
//! 3. Graph Construction - Fill provider slots, detect conflicts, assemble the
//!    namespaces before and after the layer
//! 4. Validation - Evaluate every requirement (in parallel) and link requirers
//!    to providers
//! 5. Cycle Detection - Reject strongly-connected ordering edges
//! 6. Ordering - Produce the deterministic build plan
//!
//! Requirement failures found in phase 4 are reported only after phase 5 has
//! passed, so a cycle is always reported in preference to the missing
//! requirements it usually causes.
//!
//! Each phase depends only on the previous phases and the foundation modules
//! (`path`, `namespace`, `feature`, `validator`).

use crate::config::FeatureSpec;
use crate::error::Location;
use crate::feature::{BuildPhase, FeatureId, FeatureKind, Identity};
use crate::path::LayerPath;
use serde::{Deserialize, Serialize};
use std::fmt;

// Phase modules
pub mod collect;
pub mod cycles;
pub mod graph;
pub mod import;
pub mod orchestrator;
pub mod ordering;
pub mod validate;

pub use import as phase1;
pub use collect as phase2;
pub use graph as phase3;
pub use validate as phase4;
pub use cycles as phase5;
pub use ordering as phase6;

pub use graph::DepGraph;

/// A vertex of the dependency graph.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Node {
    /// A feature of the layer being built
    Feature(FeatureId),
    /// An entry already present in the parent layer
    ParentEntry(LayerPath),
    /// A user or group already known to the parent layer
    ParentIdentity(Identity),
    /// An auxiliary layer snapshot
    Layer(String),
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Feature(id) => write!(f, "{}", id),
            Self::ParentEntry(path) => write!(f, "parent:{}", path),
            Self::ParentIdentity(identity) => write!(f, "parent:{}", identity),
            Self::Layer(label) => write!(f, "layer:{}", label),
        }
    }
}

/// A dependency edge, pointing from the requirer to the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Edge {
    Requires { ordered: bool },
    /// A `remove` of a path provided in the same layer runs after its providers
    AfterProvider,
    /// An install over a parent path runs after the `remove` that frees it
    Reinstall,
}

impl Edge {
    /// Whether the edge constrains the build order.
    pub fn is_ordering(&self) -> bool {
        match self {
            Self::Requires { ordered } => *ordered,
            Self::AfterProvider | Self::Reinstall => true,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Requires { .. } => "requires",
            Self::AfterProvider => "after_provider",
            Self::Reinstall => "reinstall",
        }
    }
}

/// One step of a build plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanStep {
    pub id: FeatureId,
    pub kind: FeatureKind,
    pub phase: BuildPhase,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
    /// The declaration the step was normalized from
    pub spec: FeatureSpec,
}

/// Features in the order they must be applied.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildPlan {
    pub steps: Vec<PlanStep>,
}

impl BuildPlan {
    pub fn new(steps: Vec<PlanStep>) -> Self {
        Self { steps }
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Position of a feature in the plan.
    pub fn position(&self, id: FeatureId) -> Option<usize> {
        self.steps.iter().position(|step| step.id == id)
    }

    pub fn descriptions(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.description.as_str()).collect()
    }
}
