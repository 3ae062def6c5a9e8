use super::{parent_dir, Normalize, NormalizeContext};
use crate::config::{LayerMountSpec, MountSource};
use crate::defaults;
use crate::error::Result;
use crate::feature::{BuildPhase, Identity, Normalized, Provide, Requirement};
use crate::namespace::{FileType, FsEntry, Owner};

impl Normalize for LayerMountSpec {
    fn normalize(&self, ctx: &NormalizeContext<'_>) -> Result<Vec<Normalized>> {
        let description = format!("layer_mount({})", self.mountpoint);
        let mountpoint = ctx.non_root_path(&description, &self.mountpoint)?;
        let description = format!("layer_mount({})", mountpoint);

        let mut normalized = Normalized::new(description, BuildPhase::Install);
        if let Some(parent) = parent_dir(&mountpoint) {
            normalized = normalized.require(parent);
        }
        let (file_type, content) = match &self.source {
            MountSource::Layer { label } => {
                normalized =
                    normalized.require(Requirement::identity(Identity::Layer(label.clone())));
                (FileType::Directory, format!("mount:layer:{}", label))
            }
            MountSource::Host { path, is_directory } => {
                let file_type = if *is_directory {
                    FileType::Directory
                } else {
                    FileType::File
                };
                (file_type, format!("mount:host:{}", path))
            }
        };

        let mut entry =
            FsEntry::new(mountpoint, file_type, defaults::DEFAULT_DIR_MODE, Owner::root());
        entry.opaque = true;
        Ok(vec![normalized.provide(Provide::Entry {
            entry,
            content: Some(content),
        })])
    }
}
