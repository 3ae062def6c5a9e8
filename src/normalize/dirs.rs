use super::{mode_or, owner_requirements, Normalize, NormalizeContext};
use crate::config::{EnsureDirsSpec, EnsureSubdirsSpec, Mode};
use crate::defaults;
use crate::error::Result;
use crate::feature::{BuildPhase, Normalized, Provide, Requirement};
use crate::namespace::{FsEntry, GroupRef, Owner, UserRef};
use crate::path::LayerPath;

/// One weak part per directory from `base` (exclusive) down to `leaf`.
fn directory_parts(
    ctx: &NormalizeContext<'_>,
    base: &LayerPath,
    leaf: &LayerPath,
    mode: Option<Mode>,
    user: &UserRef,
    group: &GroupRef,
) -> Vec<Normalized> {
    let owner = Owner {
        user: user.clone(),
        group: group.clone(),
    };
    let mode = mode_or(mode, defaults::DEFAULT_DIR_MODE);
    let mut chain = leaf.ancestors();
    chain.retain(|dir| dir.starts_with(base) && dir != base);
    chain.reverse();

    chain
        .into_iter()
        .map(|dir| {
            let mut part = Normalized::new(format!("{}({})", ctx.kind, dir), BuildPhase::Install);
            if let Some(parent) = dir.parent() {
                part = part.require(Requirement::directory(parent));
            }
            for requirement in owner_requirements(&owner) {
                part = part.require(requirement);
            }
            part.provide(Provide::WeakDirectory(FsEntry::directory(
                dir,
                mode,
                owner.clone(),
            )))
        })
        .collect()
}

impl Normalize for EnsureDirsSpec {
    fn normalize(&self, ctx: &NormalizeContext<'_>) -> Result<Vec<Normalized>> {
        let description = format!("{}({})", ctx.kind, self.dir);
        let dir = ctx.path(&description, &self.dir)?;
        if dir.is_root() {
            return Ok(vec![Normalized::new(description, BuildPhase::Install)
                .require(Requirement::directory(dir))]);
        }
        Ok(directory_parts(
            ctx,
            &LayerPath::root(),
            &dir,
            self.mode,
            &self.user,
            &self.group,
        ))
    }
}

impl Normalize for EnsureSubdirsSpec {
    fn normalize(&self, ctx: &NormalizeContext<'_>) -> Result<Vec<Normalized>> {
        let description = format!(
            "{}({}/{})",
            ctx.kind,
            self.into_dir.trim_end_matches('/'),
            self.subdirs_to_create
        );
        let into_dir = ctx.path(&description, &self.into_dir)?;
        if self.subdirs_to_create.starts_with('/') {
            return Err(ctx.invalid(&description, "subdirs_to_create must be relative"));
        }
        let leaf = into_dir.join(&self.subdirs_to_create);
        if leaf == into_dir || !leaf.starts_with(&into_dir) {
            return Err(ctx.invalid(
                &description,
                format!("'{}' does not name a subdirectory", self.subdirs_to_create),
            ));
        }
        Ok(directory_parts(
            ctx,
            &into_dir,
            &leaf,
            self.mode,
            &self.user,
            &self.group,
        ))
    }
}
