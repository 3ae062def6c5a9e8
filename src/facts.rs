//! Frozen namespace snapshots ("facts").
//!
//! A layer build ends by exporting its final namespace together with the
//! users and groups it knows about. The next layer imports that snapshot as
//! its parent, unmodified, and treats every entry in it as already provided.

use crate::error::{Error, Result};
use crate::namespace::{FsEntry, Namespace, PrincipalRef};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Version of the snapshot format written by [`FrozenNamespace::to_facts`].
pub const FACTS_VERSION: u32 = 1;

/// A named user or group with its numeric id, when known.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u32>,
}

/// On-disk form of a frozen namespace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Facts {
    pub version: u32,
    pub entries: Vec<FsEntry>,
    #[serde(default)]
    pub users: Vec<Principal>,
    #[serde(default)]
    pub groups: Vec<Principal>,
}

/// The read-only, fully-resolved state of a built layer.
#[derive(Debug, Clone, Default)]
pub struct FrozenNamespace {
    pub namespace: Namespace,
    pub users: BTreeMap<String, Option<u32>>,
    pub groups: BTreeMap<String, Option<u32>>,
}

fn principal_map(kind: &str, principals: Vec<Principal>) -> Result<BTreeMap<String, Option<u32>>> {
    let mut map = BTreeMap::new();
    for principal in principals {
        if map.insert(principal.name.clone(), principal.id).is_some() {
            return Err(Error::Snapshot {
                message: format!("{} '{}' is listed more than once", kind, principal.name),
            });
        }
    }
    Ok(map)
}

fn principal_list(map: &BTreeMap<String, Option<u32>>) -> Vec<Principal> {
    map.iter()
        .map(|(name, id)| Principal {
            name: name.clone(),
            id: *id,
        })
        .collect()
}

impl FrozenNamespace {
    pub fn from_facts(facts: Facts) -> Result<Self> {
        if facts.version != FACTS_VERSION {
            return Err(Error::Snapshot {
                message: format!(
                    "unsupported facts version {} (expected {})",
                    facts.version, FACTS_VERSION
                ),
            });
        }
        let mut namespace = Namespace::new();
        for entry in facts.entries {
            let path = entry.path.clone();
            if namespace.insert(entry).is_some() {
                return Err(Error::Snapshot {
                    message: format!("path '{}' is listed more than once", path),
                });
            }
        }
        Ok(Self {
            namespace,
            users: principal_map("user", facts.users)?,
            groups: principal_map("group", facts.groups)?,
        })
    }

    pub fn to_facts(&self) -> Facts {
        Facts {
            version: FACTS_VERSION,
            entries: self.namespace.entries().into_iter().cloned().collect(),
            users: principal_list(&self.users),
            groups: principal_list(&self.groups),
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Self::from_facts(serde_json::from_str(json)?)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.to_facts())?)
    }

    /// Load a snapshot file written by [`FrozenNamespace::write`].
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json).map_err(|e| match e {
            Error::Snapshot { message } => Error::Snapshot {
                message: format!("{}: {}", path.display(), message),
            },
            other => other,
        })
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_json_pretty()?)?;
        Ok(())
    }

    pub fn has_user(&self, name: &str) -> bool {
        self.users.contains_key(name)
    }

    pub fn has_group(&self, name: &str) -> bool {
        self.groups.contains_key(name)
    }

    pub fn user_name(&self, id: u32) -> Option<&str> {
        name_for_id(&self.users, id)
    }

    pub fn group_name(&self, id: u32) -> Option<&str> {
        name_for_id(&self.groups, id)
    }

    /// Name of a user reference, looking numeric ids up in this snapshot.
    pub fn user_ref_name(&self, user: &PrincipalRef) -> Option<String> {
        match user {
            PrincipalRef::Name(name) => Some(name.clone()),
            PrincipalRef::Id(id) => self.user_name(*id).map(str::to_string),
        }
    }

    pub fn group_ref_name(&self, group: &PrincipalRef) -> Option<String> {
        match group {
            PrincipalRef::Name(name) => Some(name.clone()),
            PrincipalRef::Id(id) => self.group_name(*id).map(str::to_string),
        }
    }
}

fn name_for_id(map: &BTreeMap<String, Option<u32>>, id: u32) -> Option<&str> {
    map.iter()
        .find(|(_, known)| **known == Some(id))
        .map(|(name, _)| name.as_str())
}
