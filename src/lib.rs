//! # Layer Dependency Graph Library
//!
//! This library computes how to build one filesystem image layer from a set
//! of declarative features (install a file, ensure a directory, symlink,
//! remove, mount, clone, add a user...). It is used by the `layer-depgraph`
//! command-line tool but can also be embedded by build systems that need to
//! validate features and order them before touching a filesystem.
//!
//! Nothing here performs I/O on the layer being built: the engine is a pure,
//! in-memory computation over the feature records and the parent layer's
//! frozen namespace.
//!
//! ## Quick Example
//!
//! ```
//! use layer_depgraph::config;
//! use layer_depgraph::phases::orchestrator::{build_layer, EngineConfig, LayerInput};
//!
//! let records = config::parse_json(
//!     r#"[
//!         {"kind": "install", "src": "motd", "dst": "/etc/motd"},
//!         {"kind": "ensure_dirs_exist", "dir": "/etc"}
//!     ]"#,
//! )
//! .unwrap();
//!
//! let output = build_layer(&LayerInput::new(records), &EngineConfig::default()).unwrap();
//! assert_eq!(
//!     output.plan.descriptions(),
//!     vec!["ensure_dirs_exist(/etc)", "install(/etc/motd)"]
//! );
//!
//! // The exported snapshot is the parent of the next layer.
//! let facts = output.facts.to_json_pretty().unwrap();
//! assert!(facts.contains("/etc/motd"));
//! ```
//!
//! ## Core Concepts
//!
//! - **Paths (`path`)**: canonical absolute paths inside the image and an
//!   arena that interns them for one build.
//! - **Namespace (`namespace`)**: the filesystem model, with symlink-aware
//!   resolution bounded by a hop limit.
//! - **Facts (`facts`)**: the frozen namespace snapshot one layer exports and
//!   the next layer imports.
//! - **Features (`config`, `feature`, `normalize`)**: the input records and
//!   their normalized form, a list of provides and requirements.
//! - **Validators (`validator`)**: predicates checked against resolved
//!   entries.
//! - **Phases (`phases`)**: the pipeline that builds the dependency graph,
//!   rejects conflicts, unmet requirements and cycles, and orders the
//!   features.
//!
//! ## Execution Flow
//!
//! The main entry point is `phases::orchestrator::build_layer`:
//!
//! 1.  **Import**: Load the parent snapshot and seed the builtin root items.
//! 2.  **Collection**: Normalize every record and collapse identical features.
//! 3.  **Graph Construction**: Decide who provides every path and identity.
//! 4.  **Validation**: Evaluate requirements in parallel and link them to
//!     their providers.
//! 5.  **Cycle Detection**: Reject cycles among ordering edges.
//! 6.  **Ordering**: Produce the deterministic build plan.

pub mod config;
pub mod defaults;
pub mod dump;
pub mod error;
pub mod facts;
pub mod feature;
pub mod namespace;
pub mod normalize;
pub mod output;
pub mod path;
pub mod phases;
pub mod suggestions;
pub mod validator;

#[cfg(test)]
mod path_proptest;
