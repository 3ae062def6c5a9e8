//! Integration tests for the behavior a layer build guarantees: valid
//! orders, conflicts, missing requirements, cycles, validators, clones and
//! mounts, including builds stacked on a parent layer.

mod common;

use common::prelude::*;
use layer_depgraph::config::parse_json;
use layer_depgraph::error::{Error, ErrorCategory};
use layer_depgraph::facts::FrozenNamespace;
use layer_depgraph::feature::FeatureId;
use layer_depgraph::path::LayerPath;
use layer_depgraph::phases::orchestrator::{build_layer, BuildOutput, EngineConfig, LayerInput};
use petgraph::visit::EdgeRef;
use proptest::prelude::*;

/// Every ordering edge between two features points backwards in the plan.
fn assert_plan_respects_edges(output: &BuildOutput) {
    let graph = &output.graph;
    for edge in graph.graph.edge_references() {
        if !edge.weight().is_ordering() {
            continue;
        }
        let (Some(from), Some(to)) = (
            graph.node_feature(edge.source()),
            graph.node_feature(edge.target()),
        ) else {
            continue;
        };
        let from_pos = output.plan.position(from.id).unwrap();
        let to_pos = output.plan.position(to.id).unwrap();
        assert!(
            to_pos < from_pos,
            "{} must come after {}",
            from.description(),
            to.description()
        );
    }
}

fn parent_with_motd() -> FrozenNamespace {
    build(
        r#"[
            {"kind": "ensure_dirs_exist", "dir": "/etc"},
            {"kind": "install", "src": "motd", "dst": "/etc/motd"}
        ]"#,
    )
    .unwrap()
    .facts
}

fn build_with_layer(
    label: &str,
    layer: &FrozenNamespace,
    json: &str,
) -> Result<BuildOutput, Error> {
    let input = LayerInput::new(parse_json(json)?).with_layer(label, layer.clone());
    build_layer(&input, &EngineConfig::default())
}

#[test]
fn test_plan_respects_dependencies() {
    let output = build(features::BASE).unwrap();
    assert_eq!(output.plan.len(), output.graph.features().len());
    assert_plan_respects_edges(&output);
    assert_eq!(
        descriptions(&output)[..2],
        ["ensure_dirs_exist(/usr)".to_string(), "ensure_dirs_exist(/usr/bin)".to_string()]
    );
}

#[test]
fn test_removal_precedes_reinstall_over_parent_path() {
    let parent = parent_with_motd();
    let output = build_on(
        &parent,
        r#"[
            {"kind": "install", "src": "motd.new", "dst": "/etc/motd"},
            {"kind": "remove", "path": "/etc/motd"}
        ]"#,
    )
    .unwrap();
    assert_eq!(
        descriptions(&output),
        vec!["remove(/etc/motd)", "install(/etc/motd)"]
    );
    assert!(output
        .facts
        .namespace
        .contains(&LayerPath::new("/etc/motd").unwrap()));
}

#[test]
fn test_reinstall_over_sibling_install_is_a_conflict() {
    let err = build(
        r#"[
            {"kind": "ensure_dirs_exist", "dir": "/etc"},
            {"kind": "install", "src": "a", "dst": "/etc/motd"},
            {"kind": "remove", "path": "/etc/motd"},
            {"kind": "install", "src": "b", "dst": "/etc/motd"}
        ]"#,
    )
    .unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Conflict);
}

#[test]
fn test_three_feature_cycle_lists_every_member() {
    let err = build(
        r#"[
            {"kind": "user_add", "name": "alice", "primary_group": "alice", "home_dir": "/opt",
             "shell": "/opt/tools/sh"},
            {"kind": "install", "src": "sh", "dst": "/opt/tools/sh", "mode": "0755"},
            {"kind": "ensure_subdirs_exist", "into_dir": "/opt", "subdirs_to_create": "tools",
             "user": "alice"},
            {"kind": "ensure_dirs_exist", "dir": "/opt"},
            {"kind": "group_add", "name": "alice"}
        ]"#,
    )
    .unwrap_err();
    match err {
        Error::Cycle { features } => {
            let names: Vec<&str> = features.iter().map(|f| f.description.as_str()).collect();
            assert_eq!(
                names,
                vec![
                    "user_add(alice)",
                    "install(/opt/tools/sh)",
                    "ensure_subdirs_exist(/opt/tools)"
                ]
            );
        }
        other => panic!("Expected cycle, got {:?}", other),
    }
}

#[test]
fn test_two_feature_cycle() {
    let err = build(features::CYCLE).unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Cycle);
    let message = err.to_string();
    assert!(message.contains("user_add(alice)"));
    assert!(message.contains("install(/opt/sh)"));
}

#[test]
fn test_conflict_regardless_of_declaration_order() {
    let reversed = r#"[
        {"kind": "install", "src": "b", "dst": "/etc/motd"},
        {"kind": "install", "src": "a", "dst": "/etc/motd"},
        {"kind": "ensure_dirs_exist", "dir": "/etc"}
    ]"#;
    for json in [features::CONFLICT, reversed] {
        let err = build(json).unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Conflict, "{}", err);
        assert!(err.to_string().contains("/etc/motd"));
    }
}

#[test]
fn test_identical_features_are_deduplicated() {
    let output = build(
        r#"[
            {"kind": "ensure_dirs_exist", "dir": "/etc"},
            {"kind": "install", "src": "a", "dst": "/etc/motd"},
            {"kind": "install", "src": "a", "dst": "/etc/motd"}
        ]"#,
    )
    .unwrap();
    assert_eq!(
        descriptions(&output),
        vec!["ensure_dirs_exist(/etc)", "install(/etc/motd)"]
    );
}

fn conflicting_item(err: Error) -> String {
    match err {
        Error::Conflict { item, providers } => {
            assert_eq!(providers.len(), 2, "{:?}", providers);
            item
        }
        other => panic!("Expected conflict, got {:?}", other),
    }
}

#[test]
fn test_group_declared_with_two_gids_conflicts() {
    let err = build(
        r#"[
            {"kind": "group_add", "name": "wheel", "gid": 10},
            {"kind": "group_add", "name": "wheel", "gid": 11}
        ]"#,
    )
    .unwrap_err();
    assert_eq!(conflicting_item(err), "group:wheel");
}

#[test]
fn test_user_declared_with_two_uids_conflicts() {
    let err = build(
        r#"[
            {"kind": "group_add", "name": "app", "gid": 1000},
            {"kind": "ensure_dirs_exist", "dir": "/usr/bin"},
            {"kind": "install", "src": "bash", "dst": "/usr/bin/bash", "mode": "0755"},
            {"kind": "user_add", "name": "app", "uid": 1000, "primary_group": "app",
             "home_dir": "/", "shell": "/usr/bin/bash"},
            {"kind": "user_add", "name": "app", "uid": 2000, "primary_group": "app",
             "home_dir": "/", "shell": "/usr/bin/bash"}
        ]"#,
    )
    .unwrap_err();
    assert_eq!(conflicting_item(err), "user:app");
}

#[test]
fn test_identical_group_declarations_collapse() {
    let output = build(
        r#"[
            {"kind": "group_add", "name": "wheel", "gid": 10},
            {"kind": "group_add", "name": "wheel", "gid": 10}
        ]"#,
    )
    .unwrap();
    assert_eq!(descriptions(&output), vec!["group_add(wheel)"]);
    assert_eq!(output.facts.groups.get("wheel"), Some(&Some(10)));
}

#[test]
fn test_conflict_with_parent_entry() {
    let parent = parent_with_motd();
    let err = build_on(
        &parent,
        r#"[{"kind": "install", "src": "motd", "dst": "/etc/motd", "mode": "0600"}]"#,
    )
    .unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Conflict);
    assert!(err.to_string().contains("parent layer"));

    // Rewriting the parent entry identically is a no-op.
    build_on(&parent, r#"[{"kind": "install", "src": "motd", "dst": "/etc/motd"}]"#).unwrap();
}

#[test]
fn test_remove_of_unprovided_path() {
    let err = build(r#"[{"kind": "remove", "path": "/foo"}]"#).unwrap_err();
    match &err {
        Error::MissingRequirement { requirement, .. } => assert_eq!(requirement, "/foo"),
        other => panic!("Expected missing requirement, got {:?}", other),
    }
    assert!(err.to_string().contains("/foo"));

    build(r#"[{"kind": "remove", "path": "/foo", "must_exist": false}]"#).unwrap();
}

#[test]
fn test_ensured_ancestor_inside_installed_tree() {
    let output = build(
        r#"[
            {"kind": "ensure_dirs_exist", "dir": "/opt/tree/bin"},
            {"kind": "install", "src": "tree", "dst": "/opt/tree", "src_tree": [
                {"path": "bin", "type": "directory"},
                {"path": "bin/tool", "type": "file", "executable": true}
            ]},
            {"kind": "install", "src": "extra", "dst": "/opt/tree/bin/extra"}
        ]"#,
    )
    .unwrap();
    assert_plan_respects_edges(&output);
    let extra = output.plan.position(FeatureId::new(2, 0));
    let tree = output.plan.position(FeatureId::new(1, 0));
    assert!(tree < extra);
}

fn shell_layer(bash_mode: &str) -> String {
    format!(
        r#"[
            {{"kind": "ensure_dirs_exist", "dir": "/usr/bin"}},
            {{"kind": "ensure_dir_symlink", "link": "/bin", "target": "/usr/bin"}},
            {{"kind": "install", "src": "bash", "dst": "/usr/bin/bash", "mode": "{}"}},
            {{"kind": "ensure_file_symlink", "link": "/usr/bin/sh", "target": "bash"}},
            {{"kind": "group_add", "name": "dev"}},
            {{"kind": "user_add", "name": "dev", "primary_group": "dev", "home_dir": "/",
              "shell": "/bin/sh"}}
        ]"#,
        bash_mode
    )
}

#[test]
fn test_shell_through_symlinks_must_be_executable() {
    let err = build(&shell_layer("0644")).unwrap_err();
    match err {
        Error::Validation {
            path, predicate, ..
        } => {
            assert_eq!(path, "/usr/bin/bash");
            assert_eq!(predicate, "Executable");
        }
        other => panic!("Expected validation error, got {:?}", other),
    }

    let output = build(&shell_layer("0755")).unwrap();
    assert_plan_respects_edges(&output);
    let plan = descriptions(&output);
    let user = plan.iter().position(|d| d == "user_add(dev)").unwrap();
    let link = plan
        .iter()
        .position(|d| d == "ensure_dir_symlink(/bin -> /usr/bin)")
        .unwrap();
    assert!(link < user, "the user waits for every symlink on the shell path");
}

#[test]
fn test_clone_requires_owners_in_destination() {
    let base = build(features::BASE).unwrap().facts;
    let err = build_with_layer(
        "base",
        &base,
        r#"[
            {"kind": "ensure_dirs_exist", "dir": "/srv"},
            {"kind": "clone", "src_layer": "base", "src_path": "/etc/app.conf",
             "dst_path": "/srv/app.conf"}
        ]"#,
    )
    .unwrap_err();
    match &err {
        Error::MissingRequirement { requirement, .. } => assert_eq!(requirement, "user:app"),
        other => panic!("Expected missing requirement, got {:?}", other),
    }

    build_with_layer(
        "base",
        &base,
        r#"[
            {"kind": "ensure_dirs_exist", "dir": "/srv"},
            {"kind": "group_add", "name": "app"},
            {"kind": "user_add", "name": "app", "primary_group": "app", "home_dir": "/srv",
             "shell": "/sbin/nologin"},
            {"kind": "ensure_dirs_exist", "dir": "/sbin"},
            {"kind": "install", "src": "nologin", "dst": "/sbin/nologin", "mode": "0755"},
            {"kind": "clone", "src_layer": "base", "src_path": "/etc/app.conf",
             "dst_path": "/srv/app.conf"}
        ]"#,
    )
    .unwrap();
}

#[test]
fn test_clone_into_existing_directory_conflicts_only_on_leaves() {
    let base = build(features::BASE).unwrap().facts;
    let clone = r#"{"kind": "clone", "src_layer": "base", "src_path": "/etc/",
        "dst_path": "/etc/", "usergroup": {"user": "root", "group": "root"}}"#;

    let output = build_with_layer(
        "base",
        &base,
        &format!(
            r#"[
                {{"kind": "ensure_dirs_exist", "dir": "/etc"}},
                {{"kind": "install", "src": "other", "dst": "/etc/other.conf"}},
                {}
            ]"#,
            clone
        ),
    )
    .unwrap();
    let etc: Vec<String> = output
        .facts
        .namespace
        .entries()
        .iter()
        .map(|e| e.path.to_string())
        .filter(|p| p.starts_with("/etc"))
        .collect();
    assert_eq!(etc, vec!["/etc", "/etc/app.conf", "/etc/other.conf"]);

    let err = build_with_layer(
        "base",
        &base,
        &format!(
            r#"[
                {{"kind": "ensure_dirs_exist", "dir": "/etc"}},
                {{"kind": "install", "src": "mine", "dst": "/etc/app.conf"}},
                {}
            ]"#,
            clone
        ),
    )
    .unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Conflict);
    assert!(err.to_string().contains("/etc/app.conf"));
}

#[test]
fn test_two_mounts_on_one_mountpoint_conflict() {
    let err = build(
        r#"[
            {"kind": "layer_mount", "mountpoint": "/mnt", "source": {"type": "host", "path": "/a"}},
            {"kind": "layer_mount", "mountpoint": "/mnt", "source": {"type": "host", "path": "/b"}}
        ]"#,
    )
    .unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Conflict);
    assert!(err.to_string().contains("/mnt"));
}

#[test]
fn test_install_beneath_mount_fails_directory_validation() {
    let err = build(
        r#"[
            {"kind": "layer_mount", "mountpoint": "/mnt", "source": {"type": "host", "path": "/data"}},
            {"kind": "install", "src": "f", "dst": "/mnt/f"}
        ]"#,
    )
    .unwrap_err();
    match err {
        Error::Validation {
            path,
            predicate,
            actual,
            ..
        } => {
            assert_eq!(path, "/mnt");
            assert_eq!(predicate, "FileType(Directory)");
            assert_eq!(actual, "opaque mountpoint");
        }
        other => panic!("Expected validation error, got {:?}", other),
    }
}

#[test]
fn test_facts_round_trip_through_json() {
    let output = build(features::BASE).unwrap();
    let json = output.facts.to_json_pretty().unwrap();
    let imported = FrozenNamespace::from_json(&json).unwrap();
    assert_eq!(imported.to_facts(), output.facts.to_facts());

    let child = build_on(
        &imported,
        r#"[{"kind": "requires", "files": ["/etc/app.conf"], "users": ["app"], "groups": ["app"]}]"#,
    )
    .unwrap();
    assert_eq!(descriptions(&child), vec!["requires(/etc/app.conf, user:app, group:app)"]);
}

fn dir_chain() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec(prop::collection::vec("[abc]", 1..4), 1..8).prop_map(|dirs| {
        dirs.into_iter()
            .map(|parts| format!("/{}", parts.join("/")))
            .collect()
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Property: for directory chains declared in any order, with a file in
    /// each, the plan puts every feature after what it depends on.
    #[test]
    fn plan_respects_every_dependency(dirs in dir_chain(), reverse in any::<bool>()) {
        let mut records: Vec<String> = Vec::new();
        for dir in &dirs {
            records.push(format!(r#"{{"kind": "install", "src": "{0}/f", "dst": "{0}/f"}}"#, dir));
            records.push(format!(r#"{{"kind": "ensure_dirs_exist", "dir": "{}"}}"#, dir));
        }
        if reverse {
            records.reverse();
        }
        let json = format!("[{}]", records.join(","));
        let output = build(&json).unwrap();
        assert_plan_respects_edges(&output);
        for dir in &dirs {
            let path = LayerPath::new(&format!("{}/f", dir)).unwrap();
            prop_assert!(output.facts.namespace.contains(&path));
        }
    }
}
