//! # Feature Normalizer
//!
//! Converts each feature record into the uniform [`Normalized`] shape: the
//! entries and identities it provides, the requirements (with validators) it
//! imposes, and its build phase.
//!
//! ## Registry
//!
//! Every feature kind has exactly one [`Normalize`] implementation, selected
//! by [`normalizer`] with a plain `match` on the record's kind. Adding a kind
//! means adding a variant to [`FeatureSpec`] and an arm to that match; the
//! compiler points at every place that needs updating.
//!
//! Most kinds normalize to a single part. `ensure_dirs_exist` and
//! `ensure_subdirs_exist` produce one part per directory they may create, so
//! that each directory can be ordered independently of its siblings.

mod clone;
mod dirs;
mod install;
mod links;
mod mknod;
mod mount;
mod remove;
mod rpms;
mod usergroup;

use crate::config::{FeatureSpec, Mode};
use crate::error::{Error, FeatureRef, Location, Result};
use crate::facts::FrozenNamespace;
use crate::feature::{FeatureKind, Identity, Normalized, Requirement};
use crate::namespace::{Owner, PrincipalRef};
use crate::path::LayerPath;
use std::collections::BTreeMap;

/// Everything a normalizer may look at besides the record itself.
#[derive(Debug, Clone, Copy)]
pub struct NormalizeContext<'a> {
    pub kind: FeatureKind,
    pub location: Option<&'a Location>,
    /// Auxiliary layer snapshots by label, for `clone`
    pub layers: &'a BTreeMap<String, FrozenNamespace>,
}

impl<'a> NormalizeContext<'a> {
    pub fn new(
        kind: FeatureKind,
        location: Option<&'a Location>,
        layers: &'a BTreeMap<String, FrozenNamespace>,
    ) -> Self {
        Self {
            kind,
            location,
            layers,
        }
    }

    pub fn feature_ref(&self, description: &str) -> FeatureRef {
        FeatureRef::new(description, self.location.cloned())
    }

    pub fn invalid(&self, description: &str, message: impl Into<String>) -> Error {
        Error::InvalidFeature {
            feature: self.feature_ref(description),
            message: message.into(),
        }
    }

    /// Parse a raw path, attributing a failure to the feature.
    pub fn path(&self, description: &str, raw: &str) -> Result<LayerPath> {
        LayerPath::new(raw).map_err(|e| self.invalid(description, e.to_string()))
    }

    /// Parse a raw path that may not be `/`.
    pub fn non_root_path(&self, description: &str, raw: &str) -> Result<LayerPath> {
        let path = self.path(description, raw)?;
        if path.is_root() {
            return Err(self.invalid(description, format!("{} cannot target /", self.kind)));
        }
        Ok(path)
    }
}

/// Conversion of one feature kind to its normalized parts.
pub trait Normalize {
    fn normalize(&self, ctx: &NormalizeContext<'_>) -> Result<Vec<Normalized>>;
}

/// The normalizer for a record.
pub fn normalizer(spec: &FeatureSpec) -> &dyn Normalize {
    match spec {
        FeatureSpec::Install(s) => s,
        FeatureSpec::EnsureDirsExist(s) => s,
        FeatureSpec::EnsureSubdirsExist(s) => s,
        FeatureSpec::Remove(s) => s,
        FeatureSpec::EnsureFileSymlink(s) | FeatureSpec::EnsureDirSymlink(s) => s,
        FeatureSpec::Hardlink(s) => s,
        FeatureSpec::Mknod(s) => s,
        FeatureSpec::LayerMount(s) => s,
        FeatureSpec::Clone(s) => s,
        FeatureSpec::UserAdd(s) => s,
        FeatureSpec::GroupAdd(s) => s,
        FeatureSpec::UserMod(s) => s,
        FeatureSpec::Requires(s) => s,
        FeatureSpec::RpmsInstall(s)
        | FeatureSpec::RpmsRemoveIfExists(s)
        | FeatureSpec::RpmsUpgrade(s) => s,
    }
}

/// Normalize one record.
pub fn normalize(
    spec: &FeatureSpec,
    location: Option<&Location>,
    layers: &BTreeMap<String, FrozenNamespace>,
) -> Result<Vec<Normalized>> {
    let ctx = NormalizeContext::new(FeatureKind::from(spec), location, layers);
    normalizer(spec).normalize(&ctx)
}

/// `path` needs its containing directory.
fn parent_dir(path: &LayerPath) -> Option<Requirement> {
    path.parent().map(Requirement::directory)
}

/// Named owners must exist as identities; numeric ids need nothing.
fn owner_requirements(owner: &Owner) -> Vec<Requirement> {
    let mut requires = Vec::new();
    if let PrincipalRef::Name(user) = &owner.user {
        requires.push(Requirement::identity(Identity::User(user.clone())));
    }
    if let PrincipalRef::Name(group) = &owner.group {
        requires.push(Requirement::identity(Identity::Group(group.clone())));
    }
    requires
}

fn mode_or(mode: Option<Mode>, default: u32) -> u32 {
    mode.map(u32::from).unwrap_or(default)
}

/// Last component of a raw (possibly host) path.
fn basename(raw: &str) -> Option<&str> {
    raw.split('/').filter(|c| !c.is_empty()).last()
}

/// Resolve a destination that may end in `/` to `dst/basename(src)`.
fn dst_with_basename(
    ctx: &NormalizeContext<'_>,
    description: &str,
    dst: &str,
    src: &str,
) -> Result<LayerPath> {
    let dst_path = ctx.path(description, dst)?;
    if !crate::path::has_trailing_slash(dst) {
        return Ok(dst_path);
    }
    match basename(src) {
        Some(name) if name != "." && name != ".." => Ok(dst_path.join(name)),
        _ => Err(ctx.invalid(
            description,
            format!("cannot derive a file name from '{}'", src),
        )),
    }
}
