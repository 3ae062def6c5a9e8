//! # Feature Records and Parsing
//!
//! This module defines the input schema of the engine: an ordered list of
//! feature records, each an internally tagged union keyed by `kind`, plus an
//! optional source `location` used for diagnostics.
//!
//! ```json
//! [
//!   {"kind": "ensure_dirs_exist", "dir": "/usr/bin"},
//!   {"kind": "install", "src": "bash", "dst": "/usr/bin/", "mode": "0755",
//!    "location": {"file": "BUCK", "line": 12}}
//! ]
//! ```
//!
//! ## Parsing
//!
//! [`parse_json`] and [`parse_yaml`] turn text into records. [`from_file`]
//! picks the format by file extension. [`load`] additionally runs
//! [`expand_install_trees`], which is the only place that touches the host
//! filesystem: it lists directory sources of `install` records so the engine
//! itself stays pure.
//!
//! Modes may be written as integers or octal strings (`"0755"`, `"0o755"`).
//! Owners default to `root:root`.

use crate::defaults;
use crate::error::{Error, FeatureRef, Location, Result};
use crate::namespace::{GroupRef, PrincipalRef, UserRef};
use crate::suggestions;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Permission bits, deserialized from an integer or an octal string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "ModeRepr", into = "u32")]
pub struct Mode(pub u32);

#[derive(Deserialize)]
#[serde(untagged)]
enum ModeRepr {
    Bits(u32),
    Octal(String),
}

impl TryFrom<ModeRepr> for Mode {
    type Error = String;

    fn try_from(repr: ModeRepr) -> std::result::Result<Self, String> {
        let bits = match repr {
            ModeRepr::Bits(bits) => bits,
            ModeRepr::Octal(text) => {
                let digits = text.strip_prefix("0o").unwrap_or(&text);
                u32::from_str_radix(digits, 8)
                    .map_err(|_| format!("invalid octal mode '{}'", text))?
            }
        };
        if bits & !0o7777 != 0 {
            return Err(format!("mode {:o} has bits outside 0o7777", bits));
        }
        Ok(Mode(bits))
    }
}

impl From<Mode> for u32 {
    fn from(mode: Mode) -> Self {
        mode.0
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04o}", self.0)
    }
}

fn default_user() -> UserRef {
    PrincipalRef::Name(defaults::ROOT_USER.to_string())
}

fn default_group() -> GroupRef {
    PrincipalRef::Name(defaults::ROOT_GROUP.to_string())
}

fn default_true() -> bool {
    true
}

fn default_shell() -> String {
    defaults::DEFAULT_SHELL.to_string()
}

/// Type of an entry inside an installed directory tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TreeEntryType {
    File,
    Directory,
}

/// One entry below the root of a directory source.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TreeEntry {
    /// Path relative to the source directory
    pub path: String,
    #[serde(rename = "type")]
    pub entry_type: TreeEntryType,
    /// Whether the source file has an execute bit
    #[serde(default)]
    pub executable: bool,
}

/// Install a file or a directory tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InstallSpec {
    /// Source on the build host
    pub src: String,
    /// Destination; a trailing `/` installs as `dst/basename(src)`
    pub dst: String,
    /// Mode of a file source (defaults by executability)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<Mode>,
    /// Modes used inside a directory source
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir_mode: Option<Mode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exe_mode: Option<Mode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_mode: Option<Mode>,
    #[serde(default = "default_user")]
    pub user: UserRef,
    #[serde(default = "default_group")]
    pub group: GroupRef,
    /// Whether a file source is executable
    #[serde(default)]
    pub executable: bool,
    /// Listing of a directory source; `None` means the source is a file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub src_tree: Option<Vec<TreeEntry>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EnsureDirsSpec {
    /// Directory to create, together with any missing ancestors
    pub dir: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<Mode>,
    #[serde(default = "default_user")]
    pub user: UserRef,
    #[serde(default = "default_group")]
    pub group: GroupRef,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EnsureSubdirsSpec {
    /// Existing directory to create the subdirectories in
    pub into_dir: String,
    /// Relative path of the subdirectories, e.g. `a/b/c`
    pub subdirs_to_create: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<Mode>,
    #[serde(default = "default_user")]
    pub user: UserRef,
    #[serde(default = "default_group")]
    pub group: GroupRef,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RemoveSpec {
    pub path: String,
    #[serde(default = "default_true")]
    pub must_exist: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SymlinkSpec {
    /// Path of the link; a trailing `/` names it after the target
    pub link: String,
    /// Link target, absolute or relative to the link's directory
    pub target: String,
    /// Require the target to exist with the matching type
    #[serde(default)]
    pub validate_target: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HardlinkSpec {
    pub link: String,
    pub target: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceType {
    Char,
    Block,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MknodSpec {
    pub path: String,
    pub device: DeviceType,
    pub major: u32,
    pub minor: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<Mode>,
    #[serde(default = "default_user")]
    pub user: UserRef,
    #[serde(default = "default_group")]
    pub group: GroupRef,
}

/// What gets mounted at a mountpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MountSource {
    /// Another built layer, by auxiliary snapshot label
    Layer { label: String },
    /// A path on the build host
    Host {
        path: String,
        #[serde(default = "default_true")]
        is_directory: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LayerMountSpec {
    pub mountpoint: String,
    pub source: MountSource,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserGroup {
    pub user: String,
    pub group: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CloneSpec {
    /// Label of the auxiliary snapshot to copy from
    pub src_layer: String,
    /// Trailing `/` copies the contents of the directory, not the directory
    pub src_path: String,
    /// Trailing `/` means the destination directory already exists
    pub dst_path: String,
    /// Owner override for every cloned entry
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usergroup: Option<UserGroup>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserAddSpec {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<u32>,
    pub primary_group: String,
    #[serde(default)]
    pub supplementary_groups: Vec<String>,
    pub home_dir: String,
    #[serde(default = "default_shell")]
    pub shell: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GroupAddSpec {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gid: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserModSpec {
    pub username: String,
    #[serde(default)]
    pub add_supplementary_groups: Vec<String>,
}

/// Assert that files, users and groups exist without providing anything.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequiresSpec {
    #[serde(default)]
    pub files: Vec<String>,
    #[serde(default)]
    pub users: Vec<String>,
    #[serde(default)]
    pub groups: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RpmsSpec {
    pub rpms: Vec<String>,
}

/// All feature kinds understood by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FeatureSpec {
    Install(InstallSpec),
    EnsureDirsExist(EnsureDirsSpec),
    EnsureSubdirsExist(EnsureSubdirsSpec),
    Remove(RemoveSpec),
    EnsureFileSymlink(SymlinkSpec),
    EnsureDirSymlink(SymlinkSpec),
    Hardlink(HardlinkSpec),
    Mknod(MknodSpec),
    LayerMount(LayerMountSpec),
    Clone(CloneSpec),
    UserAdd(UserAddSpec),
    GroupAdd(GroupAddSpec),
    UserMod(UserModSpec),
    Requires(RequiresSpec),
    RpmsInstall(RpmsSpec),
    RpmsRemoveIfExists(RpmsSpec),
    RpmsUpgrade(RpmsSpec),
}

/// Every accepted value of the `kind` tag, in declaration order.
pub const FEATURE_KINDS: &[&str] = &[
    "install",
    "ensure_dirs_exist",
    "ensure_subdirs_exist",
    "remove",
    "ensure_file_symlink",
    "ensure_dir_symlink",
    "hardlink",
    "mknod",
    "layer_mount",
    "clone",
    "user_add",
    "group_add",
    "user_mod",
    "requires",
    "rpms_install",
    "rpms_remove_if_exists",
    "rpms_upgrade",
];

/// A feature as declared, with its source position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureRecord {
    #[serde(flatten)]
    pub spec: FeatureSpec,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
}

impl FeatureRecord {
    pub fn new(spec: FeatureSpec) -> Self {
        Self {
            spec,
            location: None,
        }
    }

    pub fn at(mut self, file: impl Into<String>, line: u32) -> Self {
        self.location = Some(Location {
            file: file.into(),
            line,
        });
        self
    }
}

fn parse_error(message: String) -> Error {
    let hint = suggestions::feature_kind_hint(&message);
    Error::ConfigParse { message, hint }
}

/// Parse a JSON array of feature records.
pub fn parse_json(content: &str) -> Result<Vec<FeatureRecord>> {
    serde_json::from_str(content).map_err(|e| parse_error(e.to_string()))
}

/// Parse a YAML sequence of feature records.
pub fn parse_yaml(content: &str) -> Result<Vec<FeatureRecord>> {
    serde_yaml::from_str(content).map_err(|e| parse_error(e.to_string()))
}

fn is_yaml(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| defaults::YAML_EXTENSIONS.contains(&ext))
}

/// Parse a feature file, choosing YAML or JSON by extension.
pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Vec<FeatureRecord>> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)?;
    let records = if is_yaml(path) {
        parse_yaml(&content)
    } else {
        parse_json(&content)
    };
    records.map_err(|e| match e {
        Error::ConfigParse { message, hint } => Error::ConfigParse {
            message: format!("{}: {}", path.display(), message),
            hint,
        },
        other => other,
    })
}

/// Parse a feature file and list the directory sources it installs.
///
/// Relative `install.src` paths are resolved against the feature file's
/// directory.
pub fn load<P: AsRef<Path>>(path: P) -> Result<Vec<FeatureRecord>> {
    let path = path.as_ref();
    let mut records = from_file(path)?;
    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
    expand_install_trees(&mut records, base_dir)?;
    Ok(records)
}

fn host_path(base_dir: &Path, src: &str) -> PathBuf {
    let src = Path::new(src);
    if src.is_absolute() {
        src.to_path_buf()
    } else {
        base_dir.join(src)
    }
}

#[cfg(unix)]
fn is_executable(metadata: &std::fs::Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o111 != 0
}

#[cfg(not(unix))]
fn is_executable(_metadata: &std::fs::Metadata) -> bool {
    false
}

/// Fill `src_tree` (directory sources) and `executable` (file sources) of
/// every `install` record whose source exists on the host and was not
/// described explicitly.
pub fn expand_install_trees(records: &mut [FeatureRecord], base_dir: &Path) -> Result<()> {
    for record in records.iter_mut() {
        let location = record.location.clone();
        let FeatureSpec::Install(install) = &mut record.spec else {
            continue;
        };
        if install.src_tree.is_some() {
            continue;
        }
        let source = host_path(base_dir, &install.src);
        let Ok(metadata) = std::fs::metadata(&source) else {
            continue;
        };
        if metadata.is_file() {
            install.executable = install.executable || is_executable(&metadata);
            continue;
        }
        if !metadata.is_dir() {
            continue;
        }

        let mut tree = Vec::new();
        for entry in WalkDir::new(&source).min_depth(1).sort_by_file_name() {
            let entry = entry.map_err(|e| Error::Io(e.into()))?;
            let relative = entry
                .path()
                .strip_prefix(&source)
                .map_err(|_| Error::InvalidFeature {
                    feature: FeatureRef::new(format!("install({})", install.dst), location.clone()),
                    message: format!("{} escapes its source tree", entry.path().display()),
                })?
                .to_string_lossy()
                .replace('\\', "/");
            let file_type = entry.file_type();
            let entry_type = if file_type.is_dir() {
                TreeEntryType::Directory
            } else if file_type.is_file() {
                TreeEntryType::File
            } else {
                return Err(Error::InvalidFeature {
                    feature: FeatureRef::new(format!("install({})", install.dst), location),
                    message: format!(
                        "{} is neither a file nor a directory",
                        entry.path().display()
                    ),
                });
            };
            let executable = entry_type == TreeEntryType::File
                && entry.metadata().map(|m| is_executable(&m)).unwrap_or(false);
            tree.push(TreeEntry {
                path: relative,
                entry_type,
                executable,
            });
        }
        log::debug!("listed {} entries under {}", tree.len(), source.display());
        install.src_tree = Some(tree);
    }
    Ok(())
}
