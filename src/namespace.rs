//! # Filesystem Namespace Model
//!
//! An in-memory trie of absolute paths. Each node may hold an [`FsEntry`]
//! describing the file type, permission bits and owner of the path. Nodes
//! without an entry only exist to reach deeper entries; they are not
//! directories in their own right, because an `install` never implicitly
//! creates its parent.
//!
//! ## Symlink resolution
//!
//! [`Namespace::resolve`] walks a path one component at a time. Whenever the
//! walked prefix names a symlink, the link's target is spliced in front of the
//! remaining components: absolute targets restart from `/`, relative targets
//! continue from the directory containing the link. Each substitution counts
//! as one hop, and a chain longer than the hop bound (including any
//! self-referential loop) is reported as [`Unresolvable`].

use crate::defaults;
use crate::error::{Error, FeatureRef};
use crate::path::LayerPath;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::fmt;

/// The type of a filesystem entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FileType {
    File,
    Directory,
    Symlink {
        /// Raw target, absolute or relative to the link's directory
        target: String,
        /// Whether the link was declared as pointing at a directory
        #[serde(default)]
        is_directory_hint: bool,
    },
    CharDevice {
        major: u32,
        minor: u32,
    },
    BlockDevice {
        major: u32,
        minor: u32,
    },
}

/// Payload-free discriminant of [`FileType`], used by validators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileTypeKind {
    File,
    Directory,
    Symlink,
    CharDevice,
    BlockDevice,
}

impl fmt::Display for FileTypeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::File => "File",
            Self::Directory => "Directory",
            Self::Symlink => "Symlink",
            Self::CharDevice => "CharDevice",
            Self::BlockDevice => "BlockDevice",
        };
        f.write_str(name)
    }
}

impl FileType {
    pub fn kind(&self) -> FileTypeKind {
        match self {
            Self::File => FileTypeKind::File,
            Self::Directory => FileTypeKind::Directory,
            Self::Symlink { .. } => FileTypeKind::Symlink,
            Self::CharDevice { .. } => FileTypeKind::CharDevice,
            Self::BlockDevice { .. } => FileTypeKind::BlockDevice,
        }
    }
}

/// A user or group reference: a numeric id, or a name resolved later against
/// the identities known to the layer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PrincipalRef {
    Id(u32),
    Name(String),
}

pub type UserRef = PrincipalRef;
pub type GroupRef = PrincipalRef;

impl PrincipalRef {
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Name(name) => Some(name),
            Self::Id(_) => None,
        }
    }
}

impl From<&str> for PrincipalRef {
    fn from(name: &str) -> Self {
        Self::Name(name.to_string())
    }
}

impl fmt::Display for PrincipalRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => write!(f, "{}", id),
            Self::Name(name) => f.write_str(name),
        }
    }
}

/// Owner of an entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Owner {
    pub user: UserRef,
    pub group: GroupRef,
}

impl Owner {
    pub fn new(user: impl Into<UserRef>, group: impl Into<GroupRef>) -> Self {
        Self {
            user: user.into(),
            group: group.into(),
        }
    }

    pub fn root() -> Self {
        Self::new(defaults::ROOT_USER, defaults::ROOT_GROUP)
    }
}

impl fmt::Display for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.user, self.group)
    }
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// One path in a namespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FsEntry {
    pub path: LayerPath,
    pub file_type: FileType,
    pub mode: u32,
    pub owner: Owner,
    /// Set on mountpoints: the directory exists but its contents are not
    /// visible to this layer.
    #[serde(default, skip_serializing_if = "is_false")]
    pub opaque: bool,
}

impl FsEntry {
    pub fn new(path: LayerPath, file_type: FileType, mode: u32, owner: Owner) -> Self {
        Self {
            path,
            file_type,
            mode,
            owner,
            opaque: false,
        }
    }

    pub fn directory(path: LayerPath, mode: u32, owner: Owner) -> Self {
        Self::new(path, FileType::Directory, mode, owner)
    }

    pub fn is_dir(&self) -> bool {
        matches!(self.file_type, FileType::Directory)
    }

    pub fn is_symlink(&self) -> bool {
        matches!(self.file_type, FileType::Symlink { .. })
    }

    /// A regular file with any execute bit set.
    pub fn is_executable(&self) -> bool {
        matches!(self.file_type, FileType::File) && self.mode & 0o111 != 0
    }

    /// Human readable summary of the entry's state, used in validation errors.
    pub fn describe(&self) -> String {
        if self.opaque {
            return "opaque mountpoint".to_string();
        }
        match &self.file_type {
            FileType::File => format!("regular file (mode {:04o})", self.mode),
            FileType::Directory => format!("directory (mode {:04o})", self.mode),
            FileType::Symlink { target, .. } => format!("symlink to {}", target),
            FileType::CharDevice { major, minor } => {
                format!("character device {}:{}", major, minor)
            }
            FileType::BlockDevice { major, minor } => format!("block device {}:{}", major, minor),
        }
    }
}

/// Result of a successful resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPath {
    /// The path that was asked for
    pub requested: LayerPath,
    /// The path after every symlink substitution
    pub path: LayerPath,
    /// Symlinks traversed along the way, in order
    pub via: Vec<LayerPath>,
}

/// A symlink chain that loops or exceeds the hop bound.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unresolvable {
    pub path: LayerPath,
    pub chain: Vec<LayerPath>,
    pub max_hops: usize,
}

impl Unresolvable {
    pub fn into_error(self, required_by: Option<FeatureRef>) -> Error {
        Error::UnresolvableSymlink {
            path: self.path.to_string(),
            chain: self.chain.iter().map(|p| p.to_string()).collect(),
            max_hops: self.max_hops,
            required_by,
        }
    }
}

#[derive(Debug, Clone, Default)]
struct Node {
    entry: Option<FsEntry>,
    children: BTreeMap<String, Node>,
}

impl Node {
    fn collect<'a>(&'a self, out: &mut Vec<&'a FsEntry>) {
        if let Some(entry) = &self.entry {
            out.push(entry);
        }
        for child in self.children.values() {
            child.collect(out);
        }
    }

    fn count(&self) -> usize {
        usize::from(self.entry.is_some()) + self.children.values().map(Node::count).sum::<usize>()
    }
}

/// Trie of filesystem entries keyed by path component.
#[derive(Debug, Clone)]
pub struct Namespace {
    root: Node,
    len: usize,
    max_hops: usize,
}

impl Default for Namespace {
    fn default() -> Self {
        Self::with_max_hops(defaults::MAX_SYMLINK_HOPS)
    }
}

impl Namespace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_hops(max_hops: usize) -> Self {
        Self {
            root: Node::default(),
            len: 0,
            max_hops,
        }
    }

    pub fn max_hops(&self) -> usize {
        self.max_hops
    }

    pub fn set_max_hops(&mut self, max_hops: usize) {
        self.max_hops = max_hops;
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn node(&self, path: &LayerPath) -> Option<&Node> {
        let mut node = &self.root;
        for component in path.components() {
            node = node.children.get(component)?;
        }
        Some(node)
    }

    /// Insert or replace the entry at `entry.path`, returning the old one.
    pub fn insert(&mut self, entry: FsEntry) -> Option<FsEntry> {
        let mut node = &mut self.root;
        for component in entry.path.components() {
            node = node.children.entry(component.to_string()).or_default();
        }
        let previous = node.entry.replace(entry);
        if previous.is_none() {
            self.len += 1;
        }
        previous
    }

    /// Exact lookup, no symlink traversal.
    pub fn lookup(&self, path: &LayerPath) -> Option<&FsEntry> {
        self.node(path)?.entry.as_ref()
    }

    pub fn contains(&self, path: &LayerPath) -> bool {
        self.lookup(path).is_some()
    }

    /// Remove the entry at `path` and everything below it. Returns the number
    /// of entries removed.
    pub fn remove_subtree(&mut self, path: &LayerPath) -> usize {
        let removed = if path.is_root() {
            let count = self.root.count();
            self.root = Node::default();
            count
        } else {
            let Some(parent) = path.parent() else {
                return 0;
            };
            let Some(name) = path.file_name() else {
                return 0;
            };
            let mut node = &mut self.root;
            for component in parent.components() {
                match node.children.get_mut(component) {
                    Some(child) => node = child,
                    None => return 0,
                }
            }
            node.children.remove(name).map(|n| n.count()).unwrap_or(0)
        };
        self.len -= removed;
        removed
    }

    /// All entries, depth first in component order.
    pub fn entries(&self) -> Vec<&FsEntry> {
        let mut out = Vec::with_capacity(self.len);
        self.root.collect(&mut out);
        out
    }

    /// Entries strictly below `path`, depth first.
    pub fn descendants(&self, path: &LayerPath) -> Vec<&FsEntry> {
        let mut out = Vec::new();
        if let Some(node) = self.node(path) {
            for child in node.children.values() {
                child.collect(&mut out);
            }
        }
        out
    }

    /// Resolve `path`, following symlinks in every component including the
    /// last one.
    pub fn resolve(&self, path: &LayerPath) -> Result<ResolvedPath, Unresolvable> {
        self.walk(path, true)
    }

    /// Resolve `path`, following symlinks in the leading components only.
    pub fn resolve_nofollow(&self, path: &LayerPath) -> Result<ResolvedPath, Unresolvable> {
        self.walk(path, false)
    }

    fn walk(&self, path: &LayerPath, follow_final: bool) -> Result<ResolvedPath, Unresolvable> {
        let mut pending: VecDeque<String> = path.components().map(str::to_string).collect();
        let mut resolved: Vec<String> = Vec::new();
        let mut via: Vec<LayerPath> = Vec::new();

        while let Some(component) = pending.pop_front() {
            match component.as_str() {
                "" | "." => continue,
                ".." => {
                    resolved.pop();
                    continue;
                }
                _ => resolved.push(component),
            }
            if pending.is_empty() && !follow_final {
                break;
            }
            let current = LayerPath::root().join(&resolved.join("/"));
            let Some(FsEntry {
                file_type: FileType::Symlink { target, .. },
                ..
            }) = self.lookup(&current)
            else {
                continue;
            };

            via.push(current);
            if via.len() > self.max_hops {
                return Err(Unresolvable {
                    path: path.clone(),
                    chain: via,
                    max_hops: self.max_hops,
                });
            }
            resolved.pop();
            if target.starts_with('/') {
                resolved.clear();
            }
            for part in target.split('/').rev() {
                pending.push_front(part.to_string());
            }
        }

        Ok(ResolvedPath {
            requested: path.clone(),
            path: LayerPath::root().join(&resolved.join("/")),
            via,
        })
    }
}
