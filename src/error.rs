//! # Error Handling
//!
//! This module defines the centralized error handling mechanism for the
//! depgraph engine. It uses the `thiserror` library to create a single
//! `Error` enum that covers every way a layer can be rejected, providing
//! clear and descriptive error messages.
//!
//! ## Key Components
//!
//! - **`Error`**: The main enum. Five variants are the terminal, user-facing
//!   graph errors (`Cycle`, `Conflict`, `MissingRequirement`, `Validation`,
//!   `UnresolvableSymlink`); the rest describe bad input (malformed paths,
//!   invalid feature records, unreadable snapshots).
//!
//! - **`Diagnostic`**: A serializable record with a `category`, a
//!   human-readable `message` and the source `locations` of the features
//!   involved, so that surrounding tooling can attach the error to the build
//!   declaration that caused it.
//!
//! - **`Result<T>`**: A type alias for `std::result::Result<T, Error>`.
//!
//! The engine never recovers from any of these. The computation is pure, so
//! running it again on the same input reproduces the same error.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Source position of a build declaration.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Location {
    /// File the feature was declared in
    pub file: String,
    /// 1-based line number of the declaration
    pub line: u32,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

/// A feature (or the parent layer) as it is named in error messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureRef {
    /// Human readable description, e.g. `install(/etc/motd)`
    pub description: String,
    /// Where the feature was declared, if known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
}

impl FeatureRef {
    pub fn new(description: impl Into<String>, location: Option<Location>) -> Self {
        Self {
            description: description.into(),
            location,
        }
    }

    /// The frozen namespace of the parent layer, used as a conflict party.
    pub fn parent_layer() -> Self {
        Self::new("parent layer", None)
    }
}

impl fmt::Display for FeatureRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.location {
            Some(location) => write!(f, "{} at {}", self.description, location),
            None => f.write_str(&self.description),
        }
    }
}

fn bullet_list(features: &[FeatureRef]) -> String {
    features
        .iter()
        .map(|f| format!("  {}", f))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Main error type for depgraph operations
#[derive(Error, Debug)]
pub enum Error {
    /// The ordering edges between features form a cycle.
    ///
    /// Features are listed in the order the cycle was walked, starting from
    /// the earliest declared feature that participates in it.
    #[error("cycle in dependency graph:\n{}", bullet_list(.features))]
    Cycle { features: Vec<FeatureRef> },

    /// Two or more features (or a feature and the parent layer) provide the
    /// same path or identity with different content.
    #[error("{item} is provided by multiple features:\n{}", bullet_list(.providers))]
    Conflict {
        item: String,
        providers: Vec<FeatureRef>,
    },

    /// A requirement was never provided by the parent layer or any feature.
    #[error("{requirement} is required by {required_by} but was never provided")]
    MissingRequirement {
        requirement: String,
        required_by: FeatureRef,
    },

    /// A requirement resolved to an entry that fails one of its validators.
    #[error("{path} does not satisfy {predicate} (actual: {actual}) as required by {required_by}")]
    Validation {
        path: String,
        predicate: String,
        actual: String,
        required_by: FeatureRef,
    },

    /// A symlink chain is self-referential or longer than the hop bound.
    #[error("cannot resolve {path}: symlink chain [{}] exceeds {max_hops} hops{}", .chain.join(" -> "), .required_by.as_ref().map(|f| format!(" (required by {})", f)).unwrap_or_default())]
    UnresolvableSymlink {
        path: String,
        chain: Vec<String>,
        max_hops: usize,
        required_by: Option<FeatureRef>,
    },

    /// A path in the input is not absolute or otherwise malformed.
    #[error("Invalid path '{path}': {message}")]
    InvalidPath { path: String, message: String },

    /// A feature record is well-formed but semantically unusable.
    #[error("Invalid feature {feature}: {message}")]
    InvalidFeature { feature: FeatureRef, message: String },

    /// A frozen namespace snapshot could not be imported.
    #[error("Snapshot error: {message}")]
    Snapshot { message: String },

    /// A feature file could not be parsed.
    #[error("Feature file parsing error: {message}{}", hint.as_ref().map(|h| format!("\n  hint: {}", h)).unwrap_or_default())]
    ConfigParse {
        message: String,
        /// Optional hint for how to fix the feature file
        hint: Option<String>,
    },

    /// The engine configuration is unusable (e.g. zero worker threads).
    #[error("Invalid engine configuration: {message}")]
    InvalidConfig { message: String },

    /// An I/O error, wrapped from `std::io::Error`.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A JSON error, wrapped from `serde_json::Error`.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A YAML parsing error, wrapped from `serde_yaml::Error`.
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A glob pattern error, wrapped from `glob::PatternError`.
    #[error("Glob pattern error: {0}")]
    Glob(#[from] glob::PatternError),
}

/// A convenient type alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse classification of an [`Error`], stable for tooling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Cycle,
    Conflict,
    MissingRequirement,
    Validation,
    UnresolvableSymlink,
    Input,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Cycle => "cycle",
            Self::Conflict => "conflict",
            Self::MissingRequirement => "missing_requirement",
            Self::Validation => "validation",
            Self::UnresolvableSymlink => "unresolvable_symlink",
            Self::Input => "input",
        };
        f.write_str(name)
    }
}

/// Structured failure record handed to surrounding tooling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub category: ErrorCategory,
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub locations: Vec<Location>,
}

impl Error {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Cycle { .. } => ErrorCategory::Cycle,
            Self::Conflict { .. } => ErrorCategory::Conflict,
            Self::MissingRequirement { .. } => ErrorCategory::MissingRequirement,
            Self::Validation { .. } => ErrorCategory::Validation,
            Self::UnresolvableSymlink { .. } => ErrorCategory::UnresolvableSymlink,
            _ => ErrorCategory::Input,
        }
    }

    /// Source locations of every feature named by this error, deduplicated
    /// and in the order they are mentioned.
    pub fn locations(&self) -> Vec<Location> {
        let features: Vec<&FeatureRef> = match self {
            Self::Cycle { features } => features.iter().collect(),
            Self::Conflict { providers, .. } => providers.iter().collect(),
            Self::MissingRequirement { required_by, .. } | Self::Validation { required_by, .. } => {
                vec![required_by]
            }
            Self::UnresolvableSymlink { required_by, .. } => required_by.iter().collect(),
            Self::InvalidFeature { feature, .. } => vec![feature],
            _ => Vec::new(),
        };
        let mut locations: Vec<Location> = Vec::new();
        for location in features.into_iter().filter_map(|f| f.location.as_ref()) {
            if !locations.contains(location) {
                locations.push(location.clone());
            }
        }
        locations
    }

    pub fn diagnostic(&self) -> Diagnostic {
        Diagnostic {
            category: self.category(),
            message: self.to_string(),
            locations: self.locations(),
        }
    }
}
