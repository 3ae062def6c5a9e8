//! Normalized features: what each declaration provides and requires.
//!
//! Every feature record is converted by [`crate::normalize`] into one or more
//! [`Normalized`] parts sharing the same shape, so the graph builder never
//! needs to know about individual feature kinds.

use crate::config::FeatureSpec;
use crate::error::{FeatureRef, Location};
use crate::namespace::FsEntry;
use crate::path::LayerPath;
use crate::validator::Validator;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Position of a feature: the index of its record, and the part number for
/// records that normalize into several features.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FeatureId {
    pub index: usize,
    pub part: usize,
}

impl FeatureId {
    pub fn new(index: usize, part: usize) -> Self {
        Self { index, part }
    }
}

impl fmt::Display for FeatureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.part == 0 {
            write!(f, "#{}", self.index)
        } else {
            write!(f, "#{}.{}", self.index, self.part)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureKind {
    Install,
    EnsureDirsExist,
    EnsureSubdirsExist,
    Remove,
    EnsureFileSymlink,
    EnsureDirSymlink,
    Hardlink,
    Mknod,
    LayerMount,
    Clone,
    UserAdd,
    GroupAdd,
    UserMod,
    Requires,
    RpmsInstall,
    RpmsRemoveIfExists,
    RpmsUpgrade,
}

impl FeatureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Install => "install",
            Self::EnsureDirsExist => "ensure_dirs_exist",
            Self::EnsureSubdirsExist => "ensure_subdirs_exist",
            Self::Remove => "remove",
            Self::EnsureFileSymlink => "ensure_file_symlink",
            Self::EnsureDirSymlink => "ensure_dir_symlink",
            Self::Hardlink => "hardlink",
            Self::Mknod => "mknod",
            Self::LayerMount => "layer_mount",
            Self::Clone => "clone",
            Self::UserAdd => "user_add",
            Self::GroupAdd => "group_add",
            Self::UserMod => "user_mod",
            Self::Requires => "requires",
            Self::RpmsInstall => "rpms_install",
            Self::RpmsRemoveIfExists => "rpms_remove_if_exists",
            Self::RpmsUpgrade => "rpms_upgrade",
        }
    }
}

impl fmt::Display for FeatureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&FeatureSpec> for FeatureKind {
    fn from(spec: &FeatureSpec) -> Self {
        match spec {
            FeatureSpec::Install(_) => Self::Install,
            FeatureSpec::EnsureDirsExist(_) => Self::EnsureDirsExist,
            FeatureSpec::EnsureSubdirsExist(_) => Self::EnsureSubdirsExist,
            FeatureSpec::Remove(_) => Self::Remove,
            FeatureSpec::EnsureFileSymlink(_) => Self::EnsureFileSymlink,
            FeatureSpec::EnsureDirSymlink(_) => Self::EnsureDirSymlink,
            FeatureSpec::Hardlink(_) => Self::Hardlink,
            FeatureSpec::Mknod(_) => Self::Mknod,
            FeatureSpec::LayerMount(_) => Self::LayerMount,
            FeatureSpec::Clone(_) => Self::Clone,
            FeatureSpec::UserAdd(_) => Self::UserAdd,
            FeatureSpec::GroupAdd(_) => Self::GroupAdd,
            FeatureSpec::UserMod(_) => Self::UserMod,
            FeatureSpec::Requires(_) => Self::Requires,
            FeatureSpec::RpmsInstall(_) => Self::RpmsInstall,
            FeatureSpec::RpmsRemoveIfExists(_) => Self::RpmsRemoveIfExists,
            FeatureSpec::RpmsUpgrade(_) => Self::RpmsUpgrade,
        }
    }
}

/// When a feature is applied. Removals run before installs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildPhase {
    Removal,
    Install,
}

impl fmt::Display for BuildPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Removal => f.write_str("removal"),
            Self::Install => f.write_str("install"),
        }
    }
}

/// A non-path dependency.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "name", rename_all = "snake_case")]
pub enum Identity {
    User(String),
    Group(String),
    /// An auxiliary layer snapshot, by label
    Layer(String),
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User(name) => write!(f, "user:{}", name),
            Self::Group(name) => write!(f, "group:{}", name),
            Self::Layer(label) => write!(f, "layer:{}", label),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Target {
    Path(LayerPath),
    Identity(Identity),
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Path(path) => write!(f, "{}", path),
            Self::Identity(identity) => write!(f, "{}", identity),
        }
    }
}

/// Something a feature needs before it can be applied.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Requirement {
    pub target: Target,
    pub validators: Vec<Validator>,
    /// Unordered requirements are checked but add no ordering edge.
    pub ordered: bool,
    /// Whether a symlink in the final component is followed.
    pub follow_symlinks: bool,
}

impl Requirement {
    pub fn path(path: LayerPath, validators: Vec<Validator>) -> Self {
        Self {
            target: Target::Path(path),
            validators,
            ordered: true,
            follow_symlinks: true,
        }
    }

    pub fn directory(path: LayerPath) -> Self {
        Self::path(path, vec![Validator::directory()])
    }

    pub fn identity(identity: Identity) -> Self {
        Self {
            target: Target::Identity(identity),
            validators: Vec::new(),
            ordered: true,
            follow_symlinks: true,
        }
    }

    pub fn unordered(mut self) -> Self {
        self.ordered = false;
        self
    }

    pub fn nofollow(mut self) -> Self {
        self.follow_symlinks = false;
        self
    }
}

/// Something a feature makes exist (or not exist).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provide {
    /// An entry owned by this feature. `content` distinguishes features that
    /// would create identical metadata from different data.
    Entry {
        entry: FsEntry,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        content: Option<String>,
    },
    /// A directory that may already be provided by someone else.
    WeakDirectory(FsEntry),
    /// The path and everything below it is removed.
    Absence(LayerPath),
    Identity(Identity),
    /// A hardlink whose type is copied from the target's entry.
    Hardlink { link: LayerPath, target: LayerPath },
}

impl Provide {
    pub fn path(&self) -> Option<&LayerPath> {
        match self {
            Self::Entry { entry, .. } | Self::WeakDirectory(entry) => Some(&entry.path),
            Self::Absence(path) => Some(path),
            Self::Hardlink { link, .. } => Some(link),
            Self::Identity(_) => None,
        }
    }
}

/// The uniform shape every feature kind normalizes to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Normalized {
    pub description: String,
    pub provides: Vec<Provide>,
    pub requires: Vec<Requirement>,
    pub phase: BuildPhase,
}

impl Normalized {
    pub fn new(description: impl Into<String>, phase: BuildPhase) -> Self {
        Self {
            description: description.into(),
            provides: Vec::new(),
            requires: Vec::new(),
            phase,
        }
    }

    pub fn provide(mut self, provide: Provide) -> Self {
        self.provides.push(provide);
        self
    }

    pub fn require(mut self, requirement: Requirement) -> Self {
        self.requires.push(requirement);
        self
    }
}

/// A normalized feature, ready for the graph builder.
#[derive(Debug, Clone)]
pub struct Feature {
    pub id: FeatureId,
    pub kind: FeatureKind,
    pub location: Option<Location>,
    pub spec: FeatureSpec,
    pub normalized: Normalized,
}

impl Feature {
    pub fn description(&self) -> &str {
        &self.normalized.description
    }

    pub fn phase(&self) -> BuildPhase {
        self.normalized.phase
    }

    pub fn feature_ref(&self) -> FeatureRef {
        FeatureRef::new(self.normalized.description.clone(), self.location.clone())
    }
}
