//! Default values for the depgraph engine.
//!
//! This module provides centralized default values used by the engine, the
//! normalizers and the CLI, ensuring consistency and avoiding duplication.

/// Maximum number of symlinks followed while resolving a single path.
///
/// Matches the `MAXSYMLINKS` bound of common kernels. Can be overridden by
/// the `--max-symlink-hops` CLI flag or the `LAYER_DEPGRAPH_MAX_SYMLINK_HOPS`
/// environment variable.
pub const MAX_SYMLINK_HOPS: usize = 40;

/// Mode of an installed file when the record does not specify one.
pub const DEFAULT_FILE_MODE: u32 = 0o444;

/// Mode of an installed file whose source is executable.
pub const DEFAULT_EXECUTABLE_MODE: u32 = 0o555;

/// Mode of a created directory when the record does not specify one.
pub const DEFAULT_DIR_MODE: u32 = 0o755;

/// Symlinks always carry full permissions.
pub const SYMLINK_MODE: u32 = 0o777;

/// Mode of a device node when the record does not specify one.
pub const DEFAULT_DEVICE_MODE: u32 = 0o600;

/// The builtin superuser and its group.
pub const ROOT_USER: &str = "root";
pub const ROOT_GROUP: &str = "root";
pub const ROOT_ID: u32 = 0;

/// Default login shell for `user_add` records without one.
pub const DEFAULT_SHELL: &str = "/sbin/nologin";

/// Feature file read by the CLI when `--features` is not given.
pub const DEFAULT_FEATURES_FILENAME: &str = "features.json";

/// File extensions treated as YAML feature files.
pub const YAML_EXTENSIONS: &[&str] = &["yaml", "yml"];
