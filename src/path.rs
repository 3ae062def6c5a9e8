//! Canonical absolute paths and the per-build path arena

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// A normalized, absolute, POSIX-style path inside a layer.
///
/// The canonical form has no trailing slash (except for `/` itself), no
/// empty or `.` components, and `..` components folded lexically (clamped at
/// the root). Symlinks are never consulted here; see
/// [`Namespace::resolve`](crate::namespace::Namespace::resolve) for that.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct LayerPath(String);

impl LayerPath {
    /// The root directory `/`.
    pub fn root() -> Self {
        Self("/".to_string())
    }

    /// Parse and normalize a raw absolute path.
    pub fn new(raw: &str) -> Result<Self> {
        if !raw.starts_with('/') {
            return Err(Error::InvalidPath {
                path: raw.to_string(),
                message: "path must be absolute".to_string(),
            });
        }
        if raw.contains('\0') {
            return Err(Error::InvalidPath {
                path: raw.escape_default().to_string(),
                message: "path contains a NUL byte".to_string(),
            });
        }
        Ok(Self::from_components(normalize_components(raw.split('/'))))
    }

    fn from_components<'a>(components: impl IntoIterator<Item = &'a str>) -> Self {
        let mut path = String::new();
        for component in components {
            path.push('/');
            path.push_str(component);
        }
        if path.is_empty() {
            path.push('/');
        }
        Self(path)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0 == "/"
    }

    /// Iterate over the components, without the leading root.
    pub fn components(&self) -> impl Iterator<Item = &str> {
        self.0.split('/').filter(|c| !c.is_empty())
    }

    pub fn depth(&self) -> usize {
        self.components().count()
    }

    /// The containing directory, or `None` for `/`.
    pub fn parent(&self) -> Option<LayerPath> {
        if self.is_root() {
            return None;
        }
        match self.0.rfind('/') {
            Some(0) => Some(Self::root()),
            Some(idx) => Some(Self(self.0[..idx].to_string())),
            None => None,
        }
    }

    pub fn file_name(&self) -> Option<&str> {
        self.components().last()
    }

    /// Join a relative path (which may itself contain `..`) onto this one.
    ///
    /// An absolute `rel` replaces this path entirely.
    pub fn join(&self, rel: &str) -> LayerPath {
        if rel.starts_with('/') {
            return Self::from_components(normalize_components(rel.split('/')));
        }
        Self::from_components(normalize_components(
            self.components().chain(rel.split('/')),
        ))
    }

    /// True if `base` is this path or one of its ancestors.
    pub fn starts_with(&self, base: &LayerPath) -> bool {
        self.strip_prefix(base).is_some()
    }

    /// The remainder of this path below `base`, as a relative path (empty
    /// when both are equal).
    pub fn strip_prefix(&self, base: &LayerPath) -> Option<&str> {
        if base.is_root() {
            return Some(self.0.trim_start_matches('/'));
        }
        let rest = self.0.strip_prefix(base.as_str())?;
        if rest.is_empty() {
            Some("")
        } else {
            rest.strip_prefix('/')
        }
    }

    /// This path and all of its ancestors, deepest first, ending with `/`.
    pub fn ancestors(&self) -> Vec<LayerPath> {
        let mut out = vec![self.clone()];
        let mut current = self.parent();
        while let Some(p) = current {
            current = p.parent();
            out.push(p);
        }
        out
    }
}

impl fmt::Display for LayerPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for LayerPath {
    type Error = Error;

    fn try_from(raw: String) -> Result<Self> {
        Self::new(&raw)
    }
}

impl From<LayerPath> for String {
    fn from(path: LayerPath) -> Self {
        path.0
    }
}

impl AsRef<str> for LayerPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

fn normalize_components<'a>(parts: impl Iterator<Item = &'a str>) -> Vec<&'a str> {
    let mut out: Vec<&str> = Vec::new();
    for part in parts {
        match part {
            "" | "." => {}
            ".." => {
                out.pop();
            }
            other => out.push(other),
        }
    }
    out
}

/// Whether a raw path was declared with a trailing slash.
///
/// Clone uses this to decide whether the outer source directory is copied
/// and whether the destination already exists.
pub fn has_trailing_slash(raw: &str) -> bool {
    raw.len() > 1 && raw.ends_with('/')
}

/// Index handle for a path interned in a [`PathArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PathId(u32);

impl PathId {
    pub fn index(self) -> usize {
        self.0 as usize
    }

    /// Handle for the `index`-th path interned in an arena.
    pub fn from_index(index: usize) -> Self {
        Self(index as u32)
    }
}

/// Arena of canonical paths referenced by [`PathId`] handles.
///
/// One arena lives for one graph build; nothing is shared between builds.
#[derive(Debug, Clone, Default)]
pub struct PathArena {
    paths: Vec<LayerPath>,
    index: HashMap<LayerPath, PathId>,
}

impl PathArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern a path, returning the existing handle if it was seen before.
    pub fn intern(&mut self, path: &LayerPath) -> PathId {
        if let Some(id) = self.index.get(path) {
            return *id;
        }
        let id = PathId(self.paths.len() as u32);
        self.paths.push(path.clone());
        self.index.insert(path.clone(), id);
        id
    }

    pub fn lookup(&self, path: &LayerPath) -> Option<PathId> {
        self.index.get(path).copied()
    }

    pub fn get(&self, id: PathId) -> &LayerPath {
        &self.paths[id.index()]
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}
