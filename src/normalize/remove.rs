use super::{Normalize, NormalizeContext};
use crate::config::RemoveSpec;
use crate::error::Result;
use crate::feature::{BuildPhase, Normalized, Provide, Requirement};
use crate::validator::Validator;

impl Normalize for RemoveSpec {
    fn normalize(&self, ctx: &NormalizeContext<'_>) -> Result<Vec<Normalized>> {
        let description = format!("remove({})", self.path);
        let path = ctx.non_root_path(&description, &self.path)?;
        let description = format!("remove({})", path);

        let mut normalized = Normalized::new(description, BuildPhase::Removal)
            .provide(Provide::Absence(path.clone()));
        if self.must_exist {
            // The link itself is removed, never its target.
            normalized =
                normalized.require(Requirement::path(path, vec![Validator::Exists]).nofollow());
        }
        Ok(vec![normalized])
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::normalize_one;
    use crate::feature::BuildPhase;

    #[test]
    fn test_remove_is_removal_phase() {
        let parts = normalize_one(r#"{"kind": "remove", "path": "/etc/motd/"}"#).unwrap();
        assert_eq!(parts[0].description, "remove(/etc/motd)");
        assert_eq!(parts[0].phase, BuildPhase::Removal);
        assert_eq!(parts[0].requires.len(), 1);
        assert!(!parts[0].requires[0].follow_symlinks);
    }

    #[test]
    fn test_remove_if_exists_requires_nothing() {
        let parts =
            normalize_one(r#"{"kind": "remove", "path": "/etc/motd", "must_exist": false}"#)
                .unwrap();
        assert!(parts[0].requires.is_empty());
    }

    #[test]
    fn test_remove_root_rejected() {
        assert!(normalize_one(r#"{"kind": "remove", "path": "/"}"#).is_err());
    }
}
