use super::{Normalize, NormalizeContext};
use crate::config::RpmsSpec;
use crate::error::Result;
use crate::feature::{BuildPhase, FeatureKind, Normalized};

/// Package operations are opaque to the graph: they are placed in a phase
/// and otherwise provide and require nothing.
impl Normalize for RpmsSpec {
    fn normalize(&self, ctx: &NormalizeContext<'_>) -> Result<Vec<Normalized>> {
        let description = format!("{}({})", ctx.kind, self.rpms.join(", "));
        if self.rpms.is_empty() {
            return Err(ctx.invalid(&description, "no packages listed"));
        }
        if let Some(bad) = self.rpms.iter().find(|r| r.trim().is_empty()) {
            return Err(ctx.invalid(&description, format!("invalid package name '{}'", bad)));
        }
        let phase = if ctx.kind == FeatureKind::RpmsRemoveIfExists {
            BuildPhase::Removal
        } else {
            BuildPhase::Install
        };
        Ok(vec![Normalized::new(description, phase)])
    }
}
