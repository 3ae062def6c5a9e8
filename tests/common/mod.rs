//! Shared test utilities for integration and E2E tests.
//!
//! This module provides common feature lists, a temporary-directory fixture
//! and helpers that run the engine in-process.
//!
//! ## Usage
//!
//! Add `mod common;` to your test file, then use the helpers:
//!
//! ```rust,ignore
//! mod common;
//! use common::prelude::*;
//!
//! #[test]
//! fn test_example() {
//!     let fixture = TestFixture::new().with_features(features::BASE);
//!     fixture.command().arg("plan").assert().success();
//! }
//! ```

use assert_fs::prelude::*;
use layer_depgraph::config::parse_json;
use layer_depgraph::error::Error;
use layer_depgraph::facts::FrozenNamespace;
use layer_depgraph::phases::orchestrator::{build_layer, BuildOutput, EngineConfig, LayerInput};
use std::path::Path;

/// Re-export commonly used test dependencies for convenience.
pub mod prelude {
    #[allow(unused_imports)]
    pub use assert_cmd::cargo::cargo_bin_cmd;
    #[allow(unused_imports)]
    pub use assert_fs::prelude::*;
    #[allow(unused_imports)]
    pub use predicates::prelude::*;

    #[allow(unused_imports)]
    pub use super::features;
    #[allow(unused_imports)]
    pub use super::{build, build_on, descriptions, TestFixture};
}

/// Feature lists shared by several tests.
#[allow(dead_code)]
pub mod features {
    /// A small base layer: a shell, a user and the usual directories.
    pub const BASE: &str = r#"[
    {"kind": "ensure_dirs_exist", "dir": "/usr/bin"},
    {"kind": "ensure_dirs_exist", "dir": "/etc"},
    {"kind": "ensure_dir_symlink", "link": "/bin", "target": "usr/bin"},
    {"kind": "install", "src": "bash", "dst": "/usr/bin/bash", "mode": "0755"},
    {"kind": "group_add", "name": "app", "gid": 1000},
    {"kind": "user_add", "name": "app", "uid": 1000, "primary_group": "app",
     "home_dir": "/", "shell": "/bin/bash"},
    {"kind": "install", "src": "app.conf", "dst": "/etc/app.conf",
     "user": "app", "group": "app"}
]"#;

    /// Two different installs of one path.
    pub const CONFLICT: &str = r#"[
    {"kind": "ensure_dirs_exist", "dir": "/etc"},
    {"kind": "install", "src": "a", "dst": "/etc/motd"},
    {"kind": "install", "src": "b", "dst": "/etc/motd"}
]"#;

    /// A login shell owned by the user it belongs to.
    pub const CYCLE: &str = r#"[
    {"kind": "group_add", "name": "alice"},
    {"kind": "user_add", "name": "alice", "primary_group": "alice", "home_dir": "/",
     "shell": "/opt/sh"},
    {"kind": "ensure_dirs_exist", "dir": "/opt"},
    {"kind": "install", "src": "sh", "dst": "/opt/sh", "mode": "0755", "user": "alice"}
]"#;

    /// Invalid JSON for error testing.
    pub const INVALID_JSON: &str = r#"[{"kind": "install", "src": "#;
}

/// Build a layer with no parent.
#[allow(dead_code)]
pub fn build(json: &str) -> Result<BuildOutput, Error> {
    let records = parse_json(json)?;
    build_layer(&LayerInput::new(records), &EngineConfig::default())
}

/// Build a layer on top of a parent snapshot.
#[allow(dead_code)]
pub fn build_on(parent: &FrozenNamespace, json: &str) -> Result<BuildOutput, Error> {
    let records = parse_json(json)?;
    let input = LayerInput::new(records).with_parent(parent.clone());
    build_layer(&input, &EngineConfig::default())
}

/// Plan step descriptions, owned for easy comparison.
#[allow(dead_code)]
pub fn descriptions(output: &BuildOutput) -> Vec<String> {
    output
        .plan
        .descriptions()
        .into_iter()
        .map(str::to_string)
        .collect()
}

/// A test fixture that provides a temporary directory with optional feature
/// and facts files.
///
/// # Example
///
/// ```rust,ignore
/// let fixture = TestFixture::new().with_features(features::BASE);
///
/// fixture.command()
///     .arg("ls")
///     .assert()
///     .success();
/// ```
#[allow(dead_code)]
pub struct TestFixture {
    temp_dir: assert_fs::TempDir,
}

#[allow(dead_code)]
impl TestFixture {
    /// Create a new test fixture with an empty temporary directory.
    pub fn new() -> Self {
        Self {
            temp_dir: assert_fs::TempDir::new().expect("Failed to create temp directory"),
        }
    }

    /// Add a `features.json` file with the given content.
    pub fn with_features(self, content: &str) -> Self {
        self.with_file("features.json", content)
    }

    /// Add a file with the given path and content.
    pub fn with_file(self, path: &str, content: &str) -> Self {
        self.temp_dir
            .child(path)
            .write_str(content)
            .expect("Failed to write file");
        self
    }

    /// Get the path to the temporary directory.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Create a child path in the temp directory.
    pub fn child(&self, path: &str) -> assert_fs::fixture::ChildPath {
        self.temp_dir.child(path)
    }

    /// A command for the binary, running in the temp directory with no
    /// inherited configuration from the environment.
    pub fn command(&self) -> assert_cmd::Command {
        let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("layer-depgraph");
        cmd.current_dir(self.path())
            .env_remove("LAYER_DEPGRAPH_FEATURES")
            .env_remove("LAYER_DEPGRAPH_THREADS")
            .env_remove("LAYER_DEPGRAPH_MAX_SYMLINK_HOPS")
            .env_remove("RUST_LOG")
            .env("NO_COLOR", "1");
        cmd
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}
