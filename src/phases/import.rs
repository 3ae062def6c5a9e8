//! Phase 1: Parent Import
//!
//! Takes the parent layer's frozen snapshot (or an empty one for a base
//! layer) and seeds the items every layer has: the root directory, the
//! `root` user and the `root` group. Everything in the result is treated as
//! already provided; nothing in it is re-derived or re-validated.

use crate::defaults;
use crate::error::{Error, Result};
use crate::facts::FrozenNamespace;
use crate::namespace::{FsEntry, Owner};
use crate::path::LayerPath;
use log::debug;

/// Execute Phase 1: build the starting state of the layer.
pub fn execute(
    parent: Option<&FrozenNamespace>,
    max_symlink_hops: usize,
) -> Result<FrozenNamespace> {
    let mut imported = parent.cloned().unwrap_or_default();
    imported.namespace.set_max_hops(max_symlink_hops);

    let root = LayerPath::root();
    match imported.namespace.lookup(&root) {
        Some(entry) if !entry.is_dir() => {
            return Err(Error::Snapshot {
                message: format!("/ must be a directory, found {}", entry.describe()),
            });
        }
        Some(_) => {}
        None => {
            imported.namespace.insert(FsEntry::directory(
                root,
                defaults::DEFAULT_DIR_MODE,
                Owner::root(),
            ));
        }
    }
    imported
        .users
        .entry(defaults::ROOT_USER.to_string())
        .or_insert(Some(defaults::ROOT_ID));
    imported
        .groups
        .entry(defaults::ROOT_GROUP.to_string())
        .or_insert(Some(defaults::ROOT_ID));

    debug!(
        "Imported parent layer: {} entries, {} users, {} groups",
        imported.namespace.len(),
        imported.users.len(),
        imported.groups.len()
    );
    Ok(imported)
}
