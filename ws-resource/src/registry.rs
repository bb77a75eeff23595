use crate::error::{ResourceError, Result};
use crate::resource::Resource;
use crate::types::{ExhaustibleResourceType, ResourceType, TimeoutResourceType};
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

static DEFAULT_REGISTRY: OnceLock<Arc<ResourceTypeRegistry>> = OnceLock::new();

/// Read-only set of supported resource types, keyed by type id.
#[derive(Debug, Clone)]
pub struct ResourceTypeRegistry {
    types: HashMap<String, Arc<dyn ResourceType>>,
}

impl ResourceTypeRegistry {
    /// Build a registry from a fixed set of types. Duplicate ids are rejected.
    pub fn new(types: Vec<Arc<dyn ResourceType>>) -> Result<Self> {
        let mut map = HashMap::with_capacity(types.len());
        for ty in types {
            let id = ty.id().to_string();
            if map.insert(id.clone(), ty).is_some() {
                return Err(ResourceError::InvalidResourceSet(format!(
                    "resource type '{id}' is registered twice"
                )));
            }
        }
        Ok(Self { types: map })
    }

    /// RAM, workspace count, runtime count and inactivity timeout.
    pub fn with_defaults() -> Self {
        let types: Vec<Arc<dyn ResourceType>> = vec![
            Arc::new(ExhaustibleResourceType::ram()),
            Arc::new(ExhaustibleResourceType::workspace()),
            Arc::new(ExhaustibleResourceType::runtime()),
            Arc::new(TimeoutResourceType),
        ];
        Self {
            types: types
                .into_iter()
                .map(|ty| (ty.id().to_string(), ty))
                .collect(),
        }
    }

    /// Process-wide registry holding the built-in types.
    pub fn global() -> Arc<ResourceTypeRegistry> {
        DEFAULT_REGISTRY
            .get_or_init(|| Arc::new(Self::with_defaults()))
            .clone()
    }

    pub fn get(&self, type_id: &str) -> Option<&Arc<dyn ResourceType>> {
        self.types.get(type_id)
    }

    pub fn require(&self, type_id: &str) -> Result<&Arc<dyn ResourceType>> {
        self.get(type_id).ok_or_else(|| {
            ResourceError::InvalidResourceSet(format!("resource type '{type_id}' is not supported"))
        })
    }

    pub fn contains(&self, type_id: &str) -> bool {
        self.types.contains_key(type_id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.types.keys().map(String::as_str)
    }

    /// Validate every resource of every list before any computation starts.
    pub fn check_supported(&self, lists: &[&[Resource]]) -> Result<()> {
        for resource in lists.iter().flat_map(|list| list.iter()) {
            self.require(&resource.type_id)?;
            if resource.amount < -1 {
                return Err(ResourceError::InvalidResourceSet(format!(
                    "resource '{}' has negative amount {}",
                    resource.type_id, resource.amount
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{RAM, TIMEOUT};

    #[test]
    fn test_defaults_contain_builtin_types() {
        let registry = ResourceTypeRegistry::global();
        assert!(registry.contains(RAM));
        assert!(registry.contains(TIMEOUT));
        assert_eq!(registry.ids().count(), 4);
    }

    #[test]
    fn test_duplicate_registration_is_rejected() {
        let result = ResourceTypeRegistry::new(vec![
            Arc::new(ExhaustibleResourceType::ram()),
            Arc::new(ExhaustibleResourceType::ram()),
        ]);
        assert!(matches!(result, Err(ResourceError::InvalidResourceSet(_))));
    }

    #[test]
    fn test_check_supported_rejects_unknown_type() {
        let registry = ResourceTypeRegistry::with_defaults();
        let ok = [Resource::new(RAM, 1, "mb")];
        let bad = [Resource::new("gpu", 1, "item")];
        assert!(registry.check_supported(&[&ok]).is_ok());
        assert!(registry.check_supported(&[&ok, &bad]).is_err());
    }

    #[test]
    fn test_check_supported_rejects_bogus_negative_amount() {
        let registry = ResourceTypeRegistry::with_defaults();
        let bad = [Resource::new(RAM, -5, "mb")];
        assert!(registry.check_supported(&[&bad]).is_err());
    }
}
