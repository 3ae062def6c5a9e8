//! Phase 2: Collection
//!
//! Normalizes every feature record in declaration order and assigns each
//! normalized part its [`FeatureId`]. Parts whose kind and normalized form
//! are identical to an earlier part are collapsed into it: declaring the same
//! `install` twice, or ensuring the same directory from two records, yields
//! one feature.
//!
//! Identity declarations normalize without their numeric id, so for them the
//! whole declaration takes part in the comparison. Two `group_add` records
//! naming one group with different gids both survive and conflict later.

use crate::config::{FeatureRecord, FeatureSpec};
use crate::error::Result;
use crate::facts::FrozenNamespace;
use crate::feature::{Feature, FeatureId, FeatureKind};
use crate::normalize;
use log::{debug, info};
use std::collections::{BTreeMap, HashMap};

/// Records whose normalized form drops the declared uid or gid.
fn identity_declaration(spec: &FeatureSpec) -> Option<&FeatureSpec> {
    match spec {
        FeatureSpec::UserAdd(_) | FeatureSpec::GroupAdd(_) => Some(spec),
        _ => None,
    }
}

/// Execute Phase 2: normalize and dedupe the layer's records.
///
/// The first failing record aborts collection.
pub fn execute(
    records: &[FeatureRecord],
    layers: &BTreeMap<String, FrozenNamespace>,
) -> Result<Vec<Feature>> {
    let mut features = Vec::new();
    let mut seen: HashMap<String, FeatureId> = HashMap::new();
    let mut collapsed = 0;

    for (index, record) in records.iter().enumerate() {
        let kind = FeatureKind::from(&record.spec);
        let parts = normalize::normalize(&record.spec, record.location.as_ref(), layers)?;
        for (part, normalized) in parts.into_iter().enumerate() {
            let id = FeatureId::new(index, part);
            let declaration = identity_declaration(&record.spec);
            let key = serde_json::to_string(&(kind, &normalized, declaration))?;
            if let Some(first) = seen.get(&key) {
                debug!(
                    "Collapsed duplicate feature {} {} into {}",
                    id, normalized.description, first
                );
                collapsed += 1;
                continue;
            }
            seen.insert(key, id);
            features.push(Feature {
                id,
                kind,
                location: record.location.clone(),
                spec: record.spec.clone(),
                normalized,
            });
        }
    }

    info!(
        "Collected {} features from {} records ({} duplicates collapsed)",
        features.len(),
        records.len(),
        collapsed
    );
    Ok(features)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_json;
    use log::Level;

    fn collect(json: &str) -> Result<Vec<Feature>> {
        execute(&parse_json(json).unwrap(), &BTreeMap::new())
    }

    #[test]
    fn test_identical_declarations_collapse() {
        testing_logger::setup();
        let features = collect(
            r#"[
                {"kind": "install", "src": "motd", "dst": "/etc/motd"},
                {"kind": "install", "src": "motd", "dst": "/etc/motd", "location": {"file": "BUCK", "line": 9}}
            ]"#,
        )
        .unwrap();
        assert_eq!(features.len(), 1);
        assert_eq!(features[0].id, FeatureId::new(0, 0));
        testing_logger::validate(|logs| {
            assert!(logs.iter().any(|log| {
                log.level == Level::Debug && log.body.contains("Collapsed duplicate feature #1")
            }));
        });
    }

    #[test]
    fn test_shared_directory_parts_collapse() {
        let features = collect(
            r#"[
                {"kind": "ensure_dirs_exist", "dir": "/usr/lib"},
                {"kind": "ensure_dirs_exist", "dir": "/usr/share"}
            ]"#,
        )
        .unwrap();
        let ids: Vec<String> = features.iter().map(|f| f.id.to_string()).collect();
        assert_eq!(ids, vec!["#0", "#0.1", "#1.1"]);
    }

    #[test]
    fn test_different_content_is_kept() {
        let features = collect(
            r#"[
                {"kind": "install", "src": "a", "dst": "/etc/motd"},
                {"kind": "install", "src": "b", "dst": "/etc/motd"}
            ]"#,
        )
        .unwrap();
        assert_eq!(features.len(), 2);
    }

    #[test]
    fn test_identical_group_declarations_collapse() {
        let features = collect(
            r#"[
                {"kind": "group_add", "name": "wheel", "gid": 10},
                {"kind": "group_add", "name": "wheel", "gid": 10, "location": {"file": "BUCK", "line": 3}}
            ]"#,
        )
        .unwrap();
        assert_eq!(features.len(), 1);
    }

    #[test]
    fn test_identity_declarations_with_other_ids_are_kept() {
        let features = collect(
            r#"[
                {"kind": "group_add", "name": "wheel", "gid": 10},
                {"kind": "group_add", "name": "wheel", "gid": 11},
                {"kind": "user_add", "name": "app", "uid": 1000, "primary_group": "wheel",
                 "home_dir": "/"},
                {"kind": "user_add", "name": "app", "uid": 2000, "primary_group": "wheel",
                 "home_dir": "/"}
            ]"#,
        )
        .unwrap();
        let ids: Vec<String> = features.iter().map(|f| f.id.to_string()).collect();
        assert_eq!(ids, vec!["#0", "#1", "#2", "#3"]);
    }

    #[test]
    fn test_normalize_error_aborts() {
        assert!(collect(r#"[{"kind": "remove", "path": "relative"}]"#).is_err());
    }
}
