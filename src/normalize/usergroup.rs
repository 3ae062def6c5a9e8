use super::{Normalize, NormalizeContext};
use crate::config::{GroupAddSpec, RequiresSpec, UserAddSpec, UserModSpec};
use crate::error::Result;
use crate::feature::{BuildPhase, Identity, Normalized, Provide, Requirement};
use crate::validator::Validator;

fn check_name(ctx: &NormalizeContext<'_>, description: &str, name: &str) -> Result<()> {
    if name.is_empty() || name.contains(':') || name.contains(char::is_whitespace) {
        return Err(ctx.invalid(description, format!("'{}' is not a valid name", name)));
    }
    Ok(())
}

impl Normalize for UserAddSpec {
    fn normalize(&self, ctx: &NormalizeContext<'_>) -> Result<Vec<Normalized>> {
        let description = format!("user_add({})", self.name);
        check_name(ctx, &description, &self.name)?;
        let home_dir = ctx.path(&description, &self.home_dir)?;
        let shell = ctx.non_root_path(&description, &self.shell)?;

        let mut normalized = Normalized::new(description, BuildPhase::Install)
            .provide(Provide::Identity(Identity::User(self.name.clone())))
            .require(Requirement::identity(Identity::Group(
                self.primary_group.clone(),
            )));
        for group in &self.supplementary_groups {
            normalized = normalized.require(Requirement::identity(Identity::Group(group.clone())));
        }
        // The home directory is often created for (and owned by) the user.
        Ok(vec![normalized
            .require(Requirement::directory(home_dir).unordered())
            .require(Requirement::path(shell, vec![Validator::Executable]))])
    }
}

impl Normalize for GroupAddSpec {
    fn normalize(&self, ctx: &NormalizeContext<'_>) -> Result<Vec<Normalized>> {
        let description = format!("group_add({})", self.name);
        check_name(ctx, &description, &self.name)?;
        Ok(vec![Normalized::new(description, BuildPhase::Install)
            .provide(Provide::Identity(Identity::Group(self.name.clone())))])
    }
}

impl Normalize for UserModSpec {
    fn normalize(&self, ctx: &NormalizeContext<'_>) -> Result<Vec<Normalized>> {
        let description = format!("user_mod({})", self.username);
        check_name(ctx, &description, &self.username)?;
        let mut normalized = Normalized::new(description, BuildPhase::Install)
            .require(Requirement::identity(Identity::User(self.username.clone())));
        for group in &self.add_supplementary_groups {
            normalized = normalized.require(Requirement::identity(Identity::Group(group.clone())));
        }
        Ok(vec![normalized])
    }
}

impl Normalize for RequiresSpec {
    fn normalize(&self, ctx: &NormalizeContext<'_>) -> Result<Vec<Normalized>> {
        let mut requires = Vec::new();
        for file in &self.files {
            let path = ctx.path("requires", file)?;
            requires.push(Requirement::path(path, vec![Validator::file()]));
        }
        for user in &self.users {
            requires.push(Requirement::identity(Identity::User(user.clone())));
        }
        for group in &self.groups {
            requires.push(Requirement::identity(Identity::Group(group.clone())));
        }

        let targets: Vec<String> = requires.iter().map(|r| r.target.to_string()).collect();
        let description = format!("requires({})", targets.join(", "));
        if requires.is_empty() {
            return Err(ctx.invalid(&description, "nothing is required"));
        }
        let mut normalized = Normalized::new(description, BuildPhase::Install);
        normalized.requires = requires;
        Ok(vec![normalized])
    }
}
