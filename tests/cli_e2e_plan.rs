//! End-to-end tests for the `layer-depgraph plan` command.
//!
//! These tests verify the CLI behavior of the `plan` command by invoking
//! the binary directly and checking its output and the files it writes.

#[allow(dead_code)]
mod common;
use common::prelude::*;

#[test]
fn test_plan_help() {
    let mut cmd = cargo_bin_cmd!("layer-depgraph");
    cmd.arg("plan")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Compute the build plan of a layer"))
        .stdout(predicate::str::contains("--facts-out"))
        .stdout(predicate::str::contains("LAYER_DEPGRAPH_FEATURES"));
}

#[test]
fn test_plan_prints_ordered_steps() {
    let fixture = TestFixture::new().with_features(features::BASE);

    fixture
        .command()
        .arg("plan")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"steps\""))
        .stdout(predicate::str::contains("\"description\": \"user_add(app)\""))
        .stdout(predicate::str::contains("\"phase\": \"install\""));
}

#[test]
fn test_plan_missing_features_file() {
    let fixture = TestFixture::new();

    fixture
        .command()
        .arg("plan")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Features file not found"))
        .stderr(predicate::str::contains("hint:"));
}

#[test]
fn test_plan_features_from_env() {
    let fixture = TestFixture::new().with_file("layer.json", features::BASE);

    fixture
        .command()
        .env("LAYER_DEPGRAPH_FEATURES", "layer.json")
        .arg("plan")
        .assert()
        .success()
        .stdout(predicate::str::contains("install(/etc/app.conf)"));
}

#[test]
fn test_plan_yaml_features() {
    let fixture = TestFixture::new().with_file(
        "layer.yaml",
        r#"
- kind: ensure_dirs_exist
  dir: /etc
  location: {file: BUCK, line: 3}
- kind: install
  src: motd
  dst: /etc/motd
"#,
    );

    fixture
        .command()
        .args(["plan", "--features", "layer.yaml"])
        .assert()
        .success()
        .stdout(predicate::str::contains("install(/etc/motd)"))
        .stdout(predicate::str::contains("\"file\": \"BUCK\""));
}

#[test]
fn test_plan_writes_output_and_facts() {
    let fixture = TestFixture::new().with_features(features::BASE);

    fixture
        .command()
        .args(["plan", "--output", "plan.json", "--facts-out", "base.facts.json"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty());

    fixture
        .child("plan.json")
        .assert(predicate::str::contains("ensure_dir_symlink(/bin -> usr/bin)"));
    fixture
        .child("base.facts.json")
        .assert(predicate::str::contains("\"version\": 1"))
        .assert(predicate::str::contains("/etc/app.conf"));
}

#[test]
fn test_plan_on_parent_facts() {
    let fixture = TestFixture::new()
        .with_features(features::BASE)
        .with_file(
            "child.json",
            r#"[
                {"kind": "remove", "path": "/etc/app.conf"},
                {"kind": "install", "src": "app.conf", "dst": "/etc/app.conf", "mode": "0400"}
            ]"#,
        );

    fixture
        .command()
        .args(["plan", "--facts-out", "base.facts.json"])
        .assert()
        .success();

    fixture
        .command()
        .args([
            "plan",
            "--features",
            "child.json",
            "--parent",
            "base.facts.json",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("remove(/etc/app.conf)"));
}

#[test]
fn test_plan_conflict_fails_with_category() {
    let fixture = TestFixture::new().with_features(features::CONFLICT);

    fixture
        .command()
        .arg("plan")
        .assert()
        .failure()
        .stderr(predicate::str::contains("conflict: /etc/motd is provided by multiple features"))
        .stderr(predicate::str::contains("hint:"));
}

#[test]
fn test_plan_invalid_json() {
    let fixture = TestFixture::new().with_features(features::INVALID_JSON);

    fixture
        .command()
        .arg("plan")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load features"));
}

#[test]
fn test_plan_missing_parent_facts() {
    let fixture = TestFixture::new().with_features(features::BASE);

    fixture
        .command()
        .args(["plan", "--parent", "nope.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Facts snapshot not found"));
}

#[test]
fn test_plan_rejects_zero_threads() {
    let fixture = TestFixture::new().with_features(features::BASE);

    fixture
        .command()
        .args(["plan", "--threads", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("threads must be at least 1"));
}
