//! # Validator Engine
//!
//! A [`Requirement`] names a path or identity and a list of [`Validator`]
//! predicates. [`evaluate`] resolves the path through symlinks against the
//! namespace of the requiring feature's build phase, then checks every
//! predicate against the entry it lands on.
//!
//! Evaluation is read-only. The namespaces behind a [`Lookup`] are fully
//! populated before any requirement is evaluated, which lets the caller
//! evaluate requirements on as many threads as it likes.

use crate::error::{Error, FeatureRef};
use crate::feature::{BuildPhase, Identity, Requirement, Target};
use crate::namespace::{FileTypeKind, FsEntry, Namespace, ResolvedPath};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A predicate over a resolved filesystem entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Validator {
    Exists,
    FileType(FileTypeKind),
    /// A regular file with an execute bit set
    Executable,
    All(Vec<Validator>),
    Any(Vec<Validator>),
}

impl Validator {
    pub fn directory() -> Self {
        Self::FileType(FileTypeKind::Directory)
    }

    pub fn file() -> Self {
        Self::FileType(FileTypeKind::File)
    }

    /// Anything a hardlink may point at.
    pub fn non_directory() -> Self {
        Self::Any(vec![
            Self::FileType(FileTypeKind::File),
            Self::FileType(FileTypeKind::CharDevice),
            Self::FileType(FileTypeKind::BlockDevice),
        ])
    }

    pub fn satisfied_by(&self, entry: &FsEntry) -> bool {
        match self {
            Self::Exists => true,
            // A mountpoint's directory-ness is asserted, but nothing may be
            // placed or found inside it from this layer.
            Self::FileType(FileTypeKind::Directory) => entry.is_dir() && !entry.opaque,
            Self::FileType(kind) => entry.file_type.kind() == *kind,
            Self::Executable => entry.is_executable(),
            Self::All(all) => all.iter().all(|v| v.satisfied_by(entry)),
            Self::Any(any) => any.iter().any(|v| v.satisfied_by(entry)),
        }
    }

    /// The most specific predicate that fails for `entry`, if any.
    pub fn first_failure(&self, entry: &FsEntry) -> Option<&Validator> {
        match self {
            Self::All(all) => all.iter().find_map(|v| v.first_failure(entry)),
            _ if self.satisfied_by(entry) => None,
            _ => Some(self),
        }
    }
}

fn join(validators: &[Validator]) -> String {
    validators
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

impl fmt::Display for Validator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exists => f.write_str("Exists"),
            Self::FileType(kind) => write!(f, "FileType({})", kind),
            Self::Executable => f.write_str("Executable"),
            Self::All(all) => write!(f, "All[{}]", join(all)),
            Self::Any(any) => write!(f, "Any[{}]", join(any)),
        }
    }
}

/// Read access to the namespaces and identities a layer would produce.
pub trait Lookup: Sync {
    /// The namespace requirements of `phase` are evaluated against.
    fn namespace(&self, phase: BuildPhase) -> &Namespace;

    fn has_identity(&self, identity: &Identity) -> bool;
}

/// Outcome of evaluating one requirement.
#[derive(Debug)]
pub struct Evaluation {
    /// Where a path requirement landed, even when a validator then failed
    pub resolved: Option<ResolvedPath>,
    pub failure: Option<Error>,
}

impl Evaluation {
    fn ok(resolved: Option<ResolvedPath>) -> Self {
        Self {
            resolved,
            failure: None,
        }
    }

    fn failed(resolved: Option<ResolvedPath>, failure: Error) -> Self {
        Self {
            resolved,
            failure: Some(failure),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.failure.is_none()
    }
}

/// Evaluate a single requirement of a feature in build phase `phase`.
pub fn evaluate(
    requirement: &Requirement,
    phase: BuildPhase,
    lookup: &dyn Lookup,
    required_by: &FeatureRef,
) -> Evaluation {
    let path = match &requirement.target {
        Target::Identity(identity) => {
            if lookup.has_identity(identity) {
                return Evaluation::ok(None);
            }
            return Evaluation::failed(
                None,
                Error::MissingRequirement {
                    requirement: identity.to_string(),
                    required_by: required_by.clone(),
                },
            );
        }
        Target::Path(path) => path,
    };

    let namespace = lookup.namespace(phase);
    let resolution = if requirement.follow_symlinks {
        namespace.resolve(path)
    } else {
        namespace.resolve_nofollow(path)
    };
    let resolved = match resolution {
        Ok(resolved) => resolved,
        Err(unresolvable) => {
            return Evaluation::failed(None, unresolvable.into_error(Some(required_by.clone())))
        }
    };
    log::trace!("{} resolved to {} for {}", path, resolved.path, required_by);

    let Some(entry) = namespace.lookup(&resolved.path) else {
        let requirement = if resolved.via.is_empty() {
            path.to_string()
        } else {
            format!("{} (resolves to {})", path, resolved.path)
        };
        return Evaluation::failed(
            Some(resolved),
            Error::MissingRequirement {
                requirement,
                required_by: required_by.clone(),
            },
        );
    };

    for validator in &requirement.validators {
        if let Some(failed) = validator.first_failure(entry) {
            let failure = Error::Validation {
                path: resolved.path.to_string(),
                predicate: failed.to_string(),
                actual: entry.describe(),
                required_by: required_by.clone(),
            };
            return Evaluation::failed(Some(resolved), failure);
        }
    }
    Evaluation::ok(Some(resolved))
}
