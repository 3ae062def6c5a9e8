use super::{basename, Normalize, NormalizeContext};
use crate::config::CloneSpec;
use crate::error::{Error, Result};
use crate::feature::{BuildPhase, Identity, Normalized, Provide, Requirement};
use crate::namespace::{FsEntry, Owner, PrincipalRef};
use crate::path::{has_trailing_slash, LayerPath};
use crate::validator::Validator;
use std::collections::BTreeSet;

impl Normalize for CloneSpec {
    fn normalize(&self, ctx: &NormalizeContext<'_>) -> Result<Vec<Normalized>> {
        let description = format!(
            "clone({}:{} -> {})",
            self.src_layer, self.src_path, self.dst_path
        );
        let src = ctx.path(&description, &self.src_path)?;
        let dst = ctx.path(&description, &self.dst_path)?;
        let omit_outer_dir = src.is_root() || has_trailing_slash(&self.src_path);
        let pre_existing_dest = dst.is_root() || has_trailing_slash(&self.dst_path);
        let description = format!("clone({}:{} -> {})", self.src_layer, src, dst);

        let mut normalized = Normalized::new(description.clone(), BuildPhase::Install)
            .require(Requirement::identity(Identity::Layer(self.src_layer.clone())));
        if pre_existing_dest {
            normalized = normalized.require(Requirement::directory(dst.clone()));
        } else if let Some(parent) = dst.parent() {
            normalized = normalized.require(Requirement::directory(parent));
        }

        // Without the snapshot nothing can be listed; the layer requirement
        // reports it.
        let Some(layer) = ctx.layers.get(&self.src_layer) else {
            return Ok(vec![normalized]);
        };
        let Some(root) = layer.namespace.lookup(&src) else {
            return Err(Error::MissingRequirement {
                requirement: format!("{} in layer:{}", src, self.src_layer),
                required_by: ctx.feature_ref(&description),
            });
        };
        if omit_outer_dir && !Validator::directory().satisfied_by(root) {
            return Err(Error::Validation {
                path: format!("{} in layer:{}", src, self.src_layer),
                predicate: Validator::directory().to_string(),
                actual: root.describe(),
                required_by: ctx.feature_ref(&description),
            });
        }

        let base = if pre_existing_dest && !omit_outer_dir {
            let name = basename(src.as_str()).unwrap_or_default();
            dst.join(name)
        } else {
            dst.clone()
        };
        let mut cloned: Vec<(&FsEntry, LayerPath)> = Vec::new();
        if !omit_outer_dir || !pre_existing_dest {
            cloned.push((root, base.clone()));
        }
        for entry in layer.namespace.descendants(&src) {
            let relative = entry.path.strip_prefix(&src).unwrap_or_default();
            cloned.push((entry, base.join(relative)));
        }

        let mut users = BTreeSet::new();
        let mut groups = BTreeSet::new();
        for (source, path) in cloned {
            let owner = match &self.usergroup {
                Some(usergroup) => Owner::new(usergroup.user.as_str(), usergroup.group.as_str()),
                None => {
                    let user = layer.user_ref_name(&source.owner.user).ok_or_else(|| {
                        ctx.invalid(
                            &description,
                            format!(
                                "uid {} has no name in layer {}",
                                source.owner.user, self.src_layer
                            ),
                        )
                    })?;
                    let group = layer.group_ref_name(&source.owner.group).ok_or_else(|| {
                        ctx.invalid(
                            &description,
                            format!(
                                "gid {} has no name in layer {}",
                                source.owner.group, self.src_layer
                            ),
                        )
                    })?;
                    Owner::new(PrincipalRef::Name(user), PrincipalRef::Name(group))
                }
            };
            if let PrincipalRef::Name(user) = &owner.user {
                users.insert(user.clone());
            }
            if let PrincipalRef::Name(group) = &owner.group {
                groups.insert(group.clone());
            }

            let mut entry = FsEntry::new(path, source.file_type.clone(), source.mode, owner);
            entry.opaque = source.opaque;
            let creates_dest = entry.path == dst && !pre_existing_dest;
            let provide = if entry.is_dir() && !creates_dest {
                Provide::WeakDirectory(entry)
            } else {
                Provide::Entry {
                    entry,
                    content: Some(format!("clone:{}:{}", self.src_layer, source.path)),
                }
            };
            normalized = normalized.provide(provide);
        }

        for user in users {
            normalized = normalized.require(Requirement::identity(Identity::User(user)));
        }
        for group in groups {
            normalized = normalized.require(Requirement::identity(Identity::Group(group)));
        }
        Ok(vec![normalized])
    }
}
