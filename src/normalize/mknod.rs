use super::{mode_or, owner_requirements, parent_dir, Normalize, NormalizeContext};
use crate::config::{DeviceType, MknodSpec};
use crate::defaults;
use crate::error::Result;
use crate::feature::{BuildPhase, Normalized, Provide};
use crate::namespace::{FileType, FsEntry, Owner};

impl Normalize for MknodSpec {
    fn normalize(&self, ctx: &NormalizeContext<'_>) -> Result<Vec<Normalized>> {
        let description = format!("mknod({})", self.path);
        let path = ctx.non_root_path(&description, &self.path)?;
        let description = format!("mknod({})", path);
        let owner = Owner {
            user: self.user.clone(),
            group: self.group.clone(),
        };
        let file_type = match self.device {
            DeviceType::Char => FileType::CharDevice {
                major: self.major,
                minor: self.minor,
            },
            DeviceType::Block => FileType::BlockDevice {
                major: self.major,
                minor: self.minor,
            },
        };

        let mut normalized = Normalized::new(description, BuildPhase::Install);
        if let Some(parent) = parent_dir(&path) {
            normalized = normalized.require(parent);
        }
        for requirement in owner_requirements(&owner) {
            normalized = normalized.require(requirement);
        }
        let mode = mode_or(self.mode, defaults::DEFAULT_DEVICE_MODE);
        Ok(vec![normalized.provide(Provide::Entry {
            entry: FsEntry::new(path, file_type, mode, owner),
            content: None,
        })])
    }
}
