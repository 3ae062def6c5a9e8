//! End-to-end tests for the `layer-depgraph ls` command.

#[allow(dead_code)]
mod common;
use common::prelude::*;

#[test]
fn test_ls_lists_final_namespace() {
    let fixture = TestFixture::new().with_features(features::BASE);

    fixture
        .command()
        .arg("ls")
        .assert()
        .success()
        .stdout(predicate::str::contains("/usr/bin/bash\n"))
        .stdout(predicate::str::contains("/etc/app.conf\n"))
        .stdout(predicate::str::contains("/bin\n"));
}

#[test]
fn test_ls_pattern() {
    let fixture = TestFixture::new().with_features(features::BASE);

    fixture
        .command()
        .args(["ls", "--pattern", "/etc/*"])
        .assert()
        .success()
        .stdout("/etc/app.conf\n");
}

#[test]
fn test_ls_long() {
    let fixture = TestFixture::new().with_features(features::BASE);

    fixture
        .command()
        .args(["ls", "--long", "-p", "/[be]*"])
        .assert()
        .success()
        .stdout(predicate::str::contains("lrwxrwxrwx root:root"))
        .stdout(predicate::str::contains("/bin -> usr/bin"))
        .stdout(predicate::str::contains("-r--r--r-- app:app"));
}

#[test]
fn test_ls_count() {
    let fixture = TestFixture::new().with_features(features::BASE);

    fixture
        .command()
        .args(["ls", "--count", "--pattern", "/usr/**"])
        .assert()
        .success()
        .stdout("2\n");
}

#[test]
fn test_ls_invalid_glob() {
    let fixture = TestFixture::new().with_features(features::BASE);

    fixture
        .command()
        .args(["ls", "--pattern", "/etc/[abc"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid glob pattern"))
        .stderr(predicate::str::contains("hint:"));
}

#[test]
fn test_ls_with_auxiliary_layer() {
    let fixture = TestFixture::new()
        .with_features(features::BASE)
        .with_file(
            "child.json",
            r#"[
                {"kind": "ensure_dirs_exist", "dir": "/srv"},
                {"kind": "clone", "src_layer": "base", "src_path": "/etc/app.conf",
                 "dst_path": "/srv/app.conf"}
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
            "ls",
            "--features",
            "child.json",
            "--parent",
            "base.facts.json",
            "--layer",
            "base=base.facts.json",
            "--pattern",
            "/srv/*",
        ])
        .assert()
        .success()
        .stdout("/srv/app.conf\n");
}

#[test]
fn test_ls_malformed_layer_argument() {
    let fixture = TestFixture::new().with_features(features::BASE);

    fixture
        .command()
        .args(["ls", "--layer", "base"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid layer argument: base"));
}
