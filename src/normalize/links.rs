use super::{dst_with_basename, parent_dir, Normalize, NormalizeContext};
use crate::config::{HardlinkSpec, SymlinkSpec};
use crate::defaults;
use crate::error::Result;
use crate::feature::{BuildPhase, FeatureKind, Normalized, Provide, Requirement};
use crate::namespace::{FileType, FsEntry, Owner};
use crate::validator::Validator;

impl Normalize for SymlinkSpec {
    fn normalize(&self, ctx: &NormalizeContext<'_>) -> Result<Vec<Normalized>> {
        let description = format!("{}({} -> {})", ctx.kind, self.link, self.target);
        let link = dst_with_basename(ctx, &description, &self.link, &self.target)?;
        if link.is_root() {
            return Err(ctx.invalid(&description, "cannot replace / with a symlink"));
        }
        if self.target.is_empty() {
            return Err(ctx.invalid(&description, "symlink target is empty"));
        }
        let description = format!("{}({} -> {})", ctx.kind, link, self.target);
        let is_directory = ctx.kind == FeatureKind::EnsureDirSymlink;

        let mut normalized = Normalized::new(description, BuildPhase::Install);
        if let Some(parent) = parent_dir(&link) {
            normalized = normalized.require(parent);
        }
        if self.validate_target {
            let dir = link.parent().unwrap_or_else(crate::path::LayerPath::root);
            let target = dir.join(&self.target);
            let validator = if is_directory {
                Validator::directory()
            } else {
                Validator::file()
            };
            normalized = normalized.require(Requirement::path(target, vec![validator]));
        }

        let entry = FsEntry::new(
            link,
            FileType::Symlink {
                target: self.target.clone(),
                is_directory_hint: is_directory,
            },
            defaults::SYMLINK_MODE,
            Owner::root(),
        );
        Ok(vec![normalized.provide(Provide::Entry {
            entry,
            content: None,
        })])
    }
}

impl Normalize for HardlinkSpec {
    fn normalize(&self, ctx: &NormalizeContext<'_>) -> Result<Vec<Normalized>> {
        let description = format!("hardlink({} -> {})", self.link, self.target);
        let link = ctx.non_root_path(&description, &self.link)?;
        let target = ctx.non_root_path(&description, &self.target)?;
        let description = format!("hardlink({} -> {})", link, target);

        let mut normalized = Normalized::new(description, BuildPhase::Install);
        if let Some(parent) = parent_dir(&link) {
            normalized = normalized.require(parent);
        }
        Ok(vec![normalized
            .require(Requirement::path(
                target.clone(),
                vec![Validator::non_directory()],
            ))
            .provide(Provide::Hardlink { link, target })])
    }
}
