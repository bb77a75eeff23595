//! List algebra over resources.
//!
//! Every operation validates all of its inputs against the registry before
//! computing anything, so an unsupported type id never yields a partial
//! result.

use crate::error::{NoEnoughResources, ResourceError, Result};
use crate::registry::ResourceTypeRegistry;
use crate::resource::Resource;
use indexmap::IndexMap;
use std::collections::HashSet;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct ResourceAggregator {
    registry: Arc<ResourceTypeRegistry>,
}

impl Default for ResourceAggregator {
    fn default() -> Self {
        Self::new(ResourceTypeRegistry::global())
    }
}

impl ResourceAggregator {
    pub fn new(registry: Arc<ResourceTypeRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ResourceTypeRegistry {
        &self.registry
    }

    /// Group resources by type, folding repeated types through the type's
    /// `aggregate`. Order follows the first occurrence of each type.
    pub fn aggregate_by_type(&self, resources: &[Resource]) -> Result<IndexMap<String, Resource>> {
        self.registry.check_supported(&[resources])?;

        let mut result: IndexMap<String, Resource> = IndexMap::with_capacity(resources.len());
        for resource in resources {
            let merged = match result.get(&resource.type_id) {
                Some(existing) => self
                    .registry
                    .require(&resource.type_id)?
                    .aggregate(existing, resource)?,
                None => resource.clone(),
            };
            result.insert(resource.type_id.clone(), merged);
        }
        Ok(result)
    }

    /// [`Self::aggregate_by_type`] flattened back into a list.
    pub fn sum(&self, resources: &[Resource]) -> Result<Vec<Resource>> {
        Ok(self.aggregate_by_type(resources)?.into_values().collect())
    }

    /// Subtract `to_subtract` from `total`, type by type.
    ///
    /// Types only present in `total` pass through unchanged. A non-zero
    /// deduction of a type `total` does not have counts as missing.
    pub fn deduct(&self, total: &[Resource], to_subtract: &[Resource]) -> Result<Vec<Resource>> {
        self.registry.check_supported(&[total, to_subtract])?;
        let mut result = to_unique_map(total)?;
        let deductions = to_unique_map(to_subtract)?;

        let mut missing = Vec::new();
        for (type_id, deduction) in &deductions {
            match result.get(type_id) {
                Some(available) => {
                    let ty = self.registry.require(type_id)?;
                    match ty.deduct(available, deduction) {
                        Ok(remaining) => {
                            result.insert(type_id.clone(), remaining);
                        }
                        Err(ResourceError::NoEnoughResources(e)) => missing.extend(e.missing),
                        Err(other) => return Err(other),
                    }
                }
                None if deduction.amount != 0 => missing.push(deduction.clone()),
                None => {}
            }
        }

        if !missing.is_empty() {
            return Err(NoEnoughResources::new(total.to_vec(), to_subtract.to_vec(), missing).into());
        }
        Ok(result.into_values().collect())
    }

    /// Amounts of `source` that exceed `to_compare`.
    ///
    /// Only types of `source` are considered. A type missing from
    /// `to_compare` is excess in full; a type that `to_compare` fully covers
    /// contributes nothing.
    pub fn excess(&self, source: &[Resource], to_compare: &[Resource]) -> Result<Vec<Resource>> {
        self.registry.check_supported(&[source, to_compare])?;
        let source = to_unique_map(source)?;
        let to_compare = to_unique_map(to_compare)?;

        let mut result = Vec::new();
        for (type_id, resource) in source {
            let Some(compare) = to_compare.get(&type_id) else {
                result.push(resource);
                continue;
            };

            let ty = self.registry.require(&type_id)?;
            match ty.deduct(&resource, compare) {
                Ok(remaining) if remaining.amount != 0 => result.push(remaining),
                Ok(_) | Err(ResourceError::NoEnoughResources(_)) => {}
                Err(other) => return Err(other),
            }
        }
        Ok(result)
    }

    /// Entries of both lists whose type occurs on both sides.
    ///
    /// Nothing is merged: entries of `a` come first, then entries of `b`, and
    /// repeated types are kept as they are.
    pub fn intersection(&self, a: &[Resource], b: &[Resource]) -> Result<Vec<Resource>> {
        self.registry.check_supported(&[a, b])?;

        let types_a: HashSet<&str> = a.iter().map(|r| r.type_id.as_str()).collect();
        let types_b: HashSet<&str> = b.iter().map(|r| r.type_id.as_str()).collect();

        Ok(a.iter()
            .filter(|r| types_b.contains(r.type_id.as_str()))
            .chain(b.iter().filter(|r| types_a.contains(r.type_id.as_str())))
            .cloned()
            .collect())
    }

    /// Smallest amount per type. Unlimited only wins when nothing finite is
    /// present for that type.
    pub fn min(&self, resources: &[Resource]) -> Result<Vec<Resource>> {
        self.registry.check_supported(&[resources])?;

        let mut result: IndexMap<String, Resource> = IndexMap::new();
        for resource in resources {
            match result.get_mut(&resource.type_id) {
                Some(current) => {
                    let replace = if current.is_unlimited() {
                        !resource.is_unlimited()
                    } else {
                        !resource.is_unlimited() && resource.amount < current.amount
                    };
                    if replace {
                        *current = resource.clone();
                    }
                }
                None => {
                    result.insert(resource.type_id.clone(), resource.clone());
                }
            }
        }
        Ok(result.into_values().collect())
    }
}

fn to_unique_map(resources: &[Resource]) -> Result<IndexMap<String, Resource>> {
    let mut map = IndexMap::with_capacity(resources.len());
    for resource in resources {
        if map
            .insert(resource.type_id.clone(), resource.clone())
            .is_some()
        {
            return Err(ResourceError::InvalidResourceSet(format!(
                "resource type '{}' is listed more than once",
                resource.type_id
            )));
        }
    }
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::UNLIMITED;
    use crate::types::{RAM, RUNTIME, TIMEOUT, WORKSPACE};

    // Short names for the four built-in types.
    fn a(amount: i64) -> Resource {
        Resource::new(RAM, amount, "mb")
    }

    fn b(amount: i64) -> Resource {
        Resource::new(WORKSPACE, amount, "item")
    }

    fn c(amount: i64) -> Resource {
        Resource::new(RUNTIME, amount, "item")
    }

    fn unsupported() -> Resource {
        Resource::new("gpu", 1, "item")
    }

    fn aggregator() -> ResourceAggregator {
        ResourceAggregator::default()
    }

    fn is_invalid<T: std::fmt::Debug>(result: Result<T>) -> bool {
        matches!(result, Err(ResourceError::InvalidResourceSet(_)))
    }

    #[test]
    fn test_every_operation_rejects_unsupported_types() {
        let agg = aggregator();
        let bad = vec![a(1), unsupported()];

        assert!(is_invalid(agg.aggregate_by_type(&bad)));
        assert!(is_invalid(agg.deduct(&bad, &[a(1)])));
        assert!(is_invalid(agg.deduct(&[a(1)], &bad)));
        assert!(is_invalid(agg.excess(&bad, &[])));
        assert!(is_invalid(agg.excess(&[a(1)], &bad)));
        assert!(is_invalid(agg.intersection(&bad, &[a(1)])));
        assert!(is_invalid(agg.intersection(&[a(1)], &bad)));
        assert!(is_invalid(agg.min(&bad)));
    }

    #[test]
    fn test_unsupported_type_wins_over_shortfall() {
        // Validation happens before any arithmetic.
        let result = aggregator().deduct(&[a(1)], &[a(100), unsupported()]);
        assert!(is_invalid(result));
    }

    #[test]
    fn test_aggregate_by_type_folds_repeated_types() {
        let result = aggregator()
            .aggregate_by_type(&[a(100), b(1), a(200), Resource::new(TIMEOUT, 5, "minute")])
            .unwrap();

        assert_eq!(result.len(), 3);
        assert_eq!(result[RAM], a(300));
        assert_eq!(result[WORKSPACE], b(1));
        assert_eq!(result.keys().next().map(String::as_str), Some(RAM));
    }

    #[test]
    fn test_aggregate_by_type_rejects_overflowing_amounts() {
        assert!(is_invalid(aggregator().aggregate_by_type(&[a(i64::MAX), a(1)])));
        assert!(is_invalid(aggregator().sum(&[a(1), b(1), a(i64::MAX)])));
    }

    #[test]
    fn test_sum_flattens_aggregation() {
        assert_eq!(aggregator().sum(&[b(2), b(3), c(1)]).unwrap(), vec![b(5), c(1)]);
    }

    #[test]
    fn test_deduct_returns_difference_and_keeps_untouched_types() {
        let result = aggregator().deduct(&[a(1000), b(3)], &[a(400)]).unwrap();
        assert_eq!(result, vec![a(600), b(3)]);
    }

    #[test]
    fn test_deduct_missing_type_raises() {
        match aggregator().deduct(&[a(1000)], &[a(100), b(1)]) {
            Err(ResourceError::NoEnoughResources(e)) => {
                assert_eq!(e.missing, vec![b(1)]);
                assert_eq!(e.available, vec![a(1000)]);
                assert_eq!(e.required, vec![a(100), b(1)]);
            }
            other => panic!("expected NoEnoughResources, got {other:?}"),
        }
    }

    #[test]
    fn test_deduct_missing_type_with_zero_amount_is_fine() {
        assert_eq!(aggregator().deduct(&[a(10)], &[b(0)]).unwrap(), vec![a(10)]);
    }

    #[test]
    fn test_deduct_collects_every_shortfall() {
        match aggregator().deduct(&[a(100), b(1)], &[a(300), b(3)]) {
            Err(ResourceError::NoEnoughResources(e)) => assert_eq!(e.missing, vec![a(200), b(2)]),
            other => panic!("expected NoEnoughResources, got {other:?}"),
        }
    }

    #[test]
    fn test_deduct_rejects_duplicate_types() {
        assert!(is_invalid(aggregator().deduct(&[a(1), a(2)], &[])));
        assert!(is_invalid(aggregator().deduct(&[a(10)], &[a(1), a(2)])));
    }

    #[test]
    fn test_deduct_from_unlimited() {
        let result = aggregator().deduct(&[a(UNLIMITED)], &[a(4096)]).unwrap();
        assert_eq!(result, vec![a(UNLIMITED)]);
    }

    #[test]
    fn test_excess() {
        let agg = aggregator();
        assert_eq!(agg.excess(&[a(5)], &[a(3)]).unwrap(), vec![a(2)]);
        assert_eq!(agg.excess(&[a(5)], &[]).unwrap(), vec![a(5)]);
        assert_eq!(agg.excess(&[], &[a(5)]).unwrap(), vec![]);
        assert_eq!(agg.excess(&[a(5)], &[a(5)]).unwrap(), vec![]);
        assert_eq!(agg.excess(&[a(5)], &[a(10)]).unwrap(), vec![]);
    }

    #[test]
    fn test_excess_is_one_directional() {
        let result = aggregator().excess(&[a(5), b(2)], &[b(1), c(7)]).unwrap();
        assert_eq!(result, vec![a(5), b(1)]);
    }

    #[test]
    fn test_intersection_keeps_both_copies() {
        let result = aggregator().intersection(&[a(1), b(2)], &[b(3), c(4)]).unwrap();
        assert_eq!(result, vec![b(2), b(3)]);
    }

    #[test]
    fn test_intersection_preserves_duplicates() {
        let result = aggregator()
            .intersection(&[b(1), b(2), a(1)], &[b(3)])
            .unwrap();
        assert_eq!(result, vec![b(1), b(2), b(3)]);
    }

    #[test]
    fn test_min_picks_smallest_per_type() {
        let result = aggregator().min(&[a(100), b(1000), b(500), b(2000)]).unwrap();
        assert_eq!(result, vec![a(100), b(500)]);
    }

    #[test]
    fn test_min_never_picks_unlimited_over_finite() {
        let result = aggregator()
            .min(&[a(UNLIMITED), b(UNLIMITED), a(250), b(500)])
            .unwrap();
        assert_eq!(result, vec![a(250), b(500)]);
    }

    #[test]
    fn test_min_of_only_unlimited_is_unlimited() {
        let result = aggregator().min(&[a(UNLIMITED), a(UNLIMITED)]).unwrap();
        assert_eq!(result, vec![a(UNLIMITED)]);
    }
}
