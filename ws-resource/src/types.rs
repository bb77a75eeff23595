//! Built-in resource types and the trait new ones implement.

use crate::error::{NoEnoughResources, ResourceError, Result};
use crate::resource::{Resource, UNLIMITED};
use std::fmt::Debug;

pub const RAM: &str = "RAM";
pub const WORKSPACE: &str = "limited_workspace";
pub const RUNTIME: &str = "limited_runtime";
pub const TIMEOUT: &str = "timeout";

/// Semantics of one kind of quota.
///
/// `aggregate` and `deduct` must only be called with resources of this type;
/// implementations reject anything else with
/// [`ResourceError::InvalidResourceSet`].
pub trait ResourceType: Send + Sync + Debug {
    fn id(&self) -> &str;

    fn description(&self) -> &str;

    fn default_unit(&self) -> &str;

    /// Combine two amounts, e.g. quotas granted by two different sources.
    fn aggregate(&self, a: &Resource, b: &Resource) -> Result<Resource>;

    /// Subtract `deduction` from `total`.
    ///
    /// Fails with [`ResourceError::NoEnoughResources`] when `total` cannot
    /// cover `deduction`.
    fn deduct(&self, total: &Resource, deduction: &Resource) -> Result<Resource>;

    fn check_type(&self, resource: &Resource) -> Result<()> {
        if resource.type_id != self.id() {
            return Err(ResourceError::InvalidResourceSet(format!(
                "resource of type '{}' passed to resource type '{}'",
                resource.type_id,
                self.id()
            )));
        }
        Ok(())
    }
}

/// A quota that is consumed: amounts add up and are used by subtraction.
#[derive(Debug, Clone)]
pub struct ExhaustibleResourceType {
    id: String,
    description: String,
    unit: String,
}

impl ExhaustibleResourceType {
    pub fn new(
        id: impl Into<String>,
        description: impl Into<String>,
        unit: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            unit: unit.into(),
        }
    }

    pub fn ram() -> Self {
        Self::new(RAM, "Number of megabytes which can be used by running workspaces", "mb")
    }

    pub fn workspace() -> Self {
        Self::new(WORKSPACE, "Number of workspaces which can be created", "item")
    }

    pub fn runtime() -> Self {
        Self::new(RUNTIME, "Number of workspaces which can be running at the same time", "item")
    }

    fn resource(&self, amount: i64) -> Resource {
        Resource::new(self.id.clone(), amount, self.unit.clone())
    }
}

impl ResourceType for ExhaustibleResourceType {
    fn id(&self) -> &str {
        &self.id
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn default_unit(&self) -> &str {
        &self.unit
    }

    fn aggregate(&self, a: &Resource, b: &Resource) -> Result<Resource> {
        self.check_type(a)?;
        self.check_type(b)?;

        if a.is_unlimited() || b.is_unlimited() {
            return Ok(self.resource(UNLIMITED));
        }
        let sum = a
            .amount
            .checked_add(b.amount)
            .ok_or_else(|| amount_overflow(a, b))?;
        Ok(self.resource(sum))
    }

    fn deduct(&self, total: &Resource, deduction: &Resource) -> Result<Resource> {
        exhaustible_deduct(self, total, deduction)
    }
}

/// Idle timeout granted to an account's workspaces; the largest grant wins.
#[derive(Debug, Clone)]
pub struct TimeoutResourceType;

impl TimeoutResourceType {
    fn resource(&self, amount: i64) -> Resource {
        Resource::new(TIMEOUT, amount, "minute")
    }
}

impl ResourceType for TimeoutResourceType {
    fn id(&self) -> &str {
        TIMEOUT
    }

    fn description(&self) -> &str {
        "Timeout of workspace inactivity after which it is stopped"
    }

    fn default_unit(&self) -> &str {
        "minute"
    }

    fn aggregate(&self, a: &Resource, b: &Resource) -> Result<Resource> {
        self.check_type(a)?;
        self.check_type(b)?;

        if a.is_unlimited() || b.is_unlimited() {
            return Ok(self.resource(UNLIMITED));
        }
        Ok(self.resource(a.amount.max(b.amount)))
    }

    fn deduct(&self, total: &Resource, deduction: &Resource) -> Result<Resource> {
        exhaustible_deduct(self, total, deduction)
    }
}

fn exhaustible_deduct<T: ResourceType + ?Sized>(
    ty: &T,
    total: &Resource,
    deduction: &Resource,
) -> Result<Resource> {
    ty.check_type(total)?;
    ty.check_type(deduction)?;

    let unit = ty.default_unit();
    if total.is_unlimited() {
        return Ok(Resource::new(ty.id(), UNLIMITED, unit));
    }
    if deduction.is_unlimited() {
        return Err(NoEnoughResources::new(
            vec![total.clone()],
            vec![deduction.clone()],
            vec![deduction.clone()],
        )
        .into());
    }

    let remaining = total
        .amount
        .checked_sub(deduction.amount)
        .ok_or_else(|| amount_overflow(total, deduction))?;
    if remaining < 0 {
        let missing = remaining
            .checked_neg()
            .ok_or_else(|| amount_overflow(total, deduction))?;
        return Err(NoEnoughResources::new(
            vec![total.clone()],
            vec![deduction.clone()],
            vec![Resource::new(ty.id(), missing, unit)],
        )
        .into());
    }
    Ok(Resource::new(ty.id(), remaining, unit))
}

fn amount_overflow(a: &Resource, b: &Resource) -> ResourceError {
    ResourceError::InvalidResourceSet(format!(
        "amounts {} and {} of '{}' are out of range",
        a.amount, b.amount, a.type_id
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ram(amount: i64) -> Resource {
        Resource::new(RAM, amount, "mb")
    }

    #[test]
    fn test_exhaustible_aggregate_sums() {
        let ty = ExhaustibleResourceType::ram();
        assert_eq!(ty.aggregate(&ram(512), &ram(1024)).unwrap(), ram(1536));
    }

    #[test]
    fn test_aggregate_overflow_is_invalid_set() {
        let ty = ExhaustibleResourceType::ram();
        assert!(matches!(
            ty.aggregate(&ram(i64::MAX), &ram(1)),
            Err(ResourceError::InvalidResourceSet(_))
        ));
    }

    #[test]
    fn test_unlimited_dominates_aggregation() {
        let ty = ExhaustibleResourceType::ram();
        assert_eq!(ty.aggregate(&ram(512), &ram(UNLIMITED)).unwrap(), ram(UNLIMITED));
    }

    #[test]
    fn test_deduct_from_unlimited_stays_unlimited() {
        let ty = ExhaustibleResourceType::ram();
        assert_eq!(ty.deduct(&ram(UNLIMITED), &ram(4096)).unwrap(), ram(UNLIMITED));
    }

    #[test]
    fn test_deduct_unlimited_from_finite_fails() {
        let ty = ExhaustibleResourceType::ram();
        match ty.deduct(&ram(4096), &ram(UNLIMITED)) {
            Err(ResourceError::NoEnoughResources(e)) => assert_eq!(e.missing, vec![ram(UNLIMITED)]),
            other => panic!("expected NoEnoughResources, got {other:?}"),
        }
    }

    #[test]
    fn test_deduct_reports_missing_amount() {
        let ty = ExhaustibleResourceType::ram();
        assert_eq!(ty.deduct(&ram(1000), &ram(400)).unwrap(), ram(600));
        match ty.deduct(&ram(1000), &ram(1500)) {
            Err(ResourceError::NoEnoughResources(e)) => {
                assert_eq!(e.missing, vec![ram(500)]);
                assert_eq!(e.available, vec![ram(1000)]);
                assert_eq!(e.required, vec![ram(1500)]);
            }
            other => panic!("expected NoEnoughResources, got {other:?}"),
        }
    }

    #[test]
    fn test_cross_type_invocation_is_rejected() {
        let ty = ExhaustibleResourceType::ram();
        let workspaces = Resource::new(WORKSPACE, 1, "item");
        assert!(matches!(
            ty.aggregate(&ram(1), &workspaces),
            Err(ResourceError::InvalidResourceSet(_))
        ));
        assert!(matches!(
            ty.deduct(&workspaces, &ram(1)),
            Err(ResourceError::InvalidResourceSet(_))
        ));
    }

    #[test]
    fn test_timeout_aggregates_to_maximum() {
        let ty = TimeoutResourceType;
        let t = |m| Resource::new(TIMEOUT, m, "minute");
        assert_eq!(ty.aggregate(&t(10), &t(30)).unwrap(), t(30));
        assert_eq!(ty.aggregate(&t(10), &t(UNLIMITED)).unwrap(), t(UNLIMITED));
    }
}
