use super::{
    dst_with_basename, mode_or, owner_requirements, parent_dir, Normalize, NormalizeContext,
};
use crate::config::{InstallSpec, TreeEntryType};
use crate::defaults;
use crate::error::Result;
use crate::feature::{BuildPhase, Normalized, Provide};
use crate::namespace::{FileType, FsEntry, Owner};

impl Normalize for InstallSpec {
    fn normalize(&self, ctx: &NormalizeContext<'_>) -> Result<Vec<Normalized>> {
        let description = format!("install({})", self.dst.trim_end_matches('/'));
        let dst = dst_with_basename(ctx, &description, &self.dst, &self.src)?;
        if dst.is_root() {
            return Err(ctx.invalid(&description, "cannot install over /"));
        }
        let description = format!("install({})", dst);
        let owner = Owner {
            user: self.user.clone(),
            group: self.group.clone(),
        };

        let mut normalized = Normalized::new(description.clone(), BuildPhase::Install);
        if let Some(parent) = parent_dir(&dst) {
            normalized = normalized.require(parent);
        }
        for requirement in owner_requirements(&owner) {
            normalized = normalized.require(requirement);
        }

        let Some(tree) = &self.src_tree else {
            if self.dir_mode.is_some() || self.exe_mode.is_some() || self.data_mode.is_some() {
                return Err(ctx.invalid(
                    &description,
                    "dir_mode, exe_mode and data_mode only apply to directory sources",
                ));
            }
            let default_mode = if self.executable {
                defaults::DEFAULT_EXECUTABLE_MODE
            } else {
                defaults::DEFAULT_FILE_MODE
            };
            let entry = FsEntry::new(dst, FileType::File, mode_or(self.mode, default_mode), owner);
            return Ok(vec![normalized.provide(Provide::Entry {
                entry,
                content: Some(self.src.clone()),
            })]);
        };

        if self.mode.is_some() {
            return Err(ctx.invalid(
                &description,
                "mode cannot be used for directory sources, use dir_mode, exe_mode or data_mode",
            ));
        }
        let dir_mode = mode_or(self.dir_mode, defaults::DEFAULT_DIR_MODE);
        let exe_mode = mode_or(self.exe_mode, defaults::DEFAULT_EXECUTABLE_MODE);
        let data_mode = mode_or(self.data_mode, defaults::DEFAULT_FILE_MODE);

        normalized = normalized.provide(Provide::Entry {
            entry: FsEntry::directory(dst.clone(), dir_mode, owner.clone()),
            content: Some(self.src.clone()),
        });
        for item in tree {
            let path = dst.join(&item.path);
            if path == dst || !path.starts_with(&dst) || item.path.starts_with('/') {
                return Err(ctx.invalid(
                    &description,
                    format!("tree entry '{}' is outside of {}", item.path, dst),
                ));
            }
            let entry = match item.entry_type {
                TreeEntryType::Directory => FsEntry::directory(path, dir_mode, owner.clone()),
                TreeEntryType::File => {
                    let mode = if item.executable { exe_mode } else { data_mode };
                    FsEntry::new(path, FileType::File, mode, owner.clone())
                }
            };
            normalized = normalized.provide(Provide::Entry {
                entry,
                content: Some(format!("{}/{}", self.src.trim_end_matches('/'), item.path)),
            });
        }
        Ok(vec![normalized])
    }
}
