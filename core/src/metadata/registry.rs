//! Injectable, process-shareable metadata registry.

use std::sync::{Arc, PoisonError, RwLock};

use hashbrown::HashMap;

use crate::error::{EagerError, Result};
use crate::metadata::{ColumnDescriptor, EntityDescriptor, MaskingRule, NavigationDescriptor};
use crate::navigation::ResolvedNavigation;

/// Read access to entity metadata.
///
/// Only [`MetadataProvider::descriptor`] is required; the other lookups are
/// derived from it.
pub trait MetadataProvider: Send + Sync {
    fn descriptor(&self, entity: &str) -> Option<Arc<EntityDescriptor>>;

    fn columns_of(&self, entity: &str) -> Vec<ColumnDescriptor> {
        self.descriptor(entity)
            .map(|d| d.mapped_columns().cloned().collect())
            .unwrap_or_default()
    }

    fn primary_key_of(&self, entity: &str) -> Option<String> {
        self.descriptor(entity).map(|d| d.primary_key.clone())
    }

    fn navigations_of(&self, entity: &str) -> Vec<NavigationDescriptor> {
        self.descriptor(entity)
            .map(|d| d.navigations.clone())
            .unwrap_or_default()
    }

    fn masking_rule_of(&self, entity: &str, property: &str) -> Option<MaskingRule> {
        self.descriptor(entity)
            .and_then(|d| d.column(property).and_then(|c| c.masking.clone()))
    }

    fn table_name_of(&self, entity: &str) -> Option<String> {
        self.descriptor(entity).map(|d| d.table.clone())
    }

    /// Memoized navigation resolutions, when the provider keeps any.
    fn navigation_cache(&self) -> Option<&NavigationCache> {
        None
    }

    /// Looks up a descriptor, failing with a metadata error.
    fn require(&self, entity: &str) -> Result<Arc<EntityDescriptor>> {
        self.descriptor(entity)
            .ok_or_else(|| EagerError::Metadata(format!("entity `{entity}` is not registered")))
    }
}

/// Resolved navigations keyed by `(source entity, navigation name)`.
///
/// Population is pure and idempotent, so racing first lookups only do
/// redundant work.
#[derive(Debug, Default)]
pub struct NavigationCache {
    entries: RwLock<HashMap<(String, String), Arc<ResolvedNavigation>>>,
}

impl NavigationCache {
    pub fn get(&self, entity: &str, navigation: &str) -> Option<Arc<ResolvedNavigation>> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries
            .get(&(entity.to_string(), navigation.to_string()))
            .cloned()
    }

    pub fn insert(&self, entity: &str, navigation: &str, resolved: Arc<ResolvedNavigation>) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries
            .entry((entity.to_string(), navigation.to_string()))
            .or_insert(resolved);
    }

    pub fn clear(&self) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Entity descriptors registered once, shared by every query.
///
/// ```
/// use std::sync::Arc;
/// use eagerload_core::metadata::{EntityDescriptor, MetadataProvider, MetadataRegistry};
/// use eagerload_core::ScalarKind;
///
/// let registry = Arc::new(MetadataRegistry::new());
/// registry
///     .register(EntityDescriptor::builder("Tag").key("Id", ScalarKind::Integer).build().unwrap());
/// assert_eq!(registry.table_name_of("Tag").as_deref(), Some("Tag"));
/// ```
#[derive(Debug, Default)]
pub struct MetadataRegistry {
    entities: RwLock<HashMap<String, Arc<EntityDescriptor>>>,
    navigations: NavigationCache,
}

impl MetadataRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (or replaces) a descriptor. Replacing drops cached resolutions.
    pub fn register(&self, descriptor: EntityDescriptor) -> Arc<EntityDescriptor> {
        let descriptor = Arc::new(descriptor);
        let previous = self
            .entities
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(descriptor.name.clone(), Arc::clone(&descriptor));
        if previous.is_some() {
            self.navigations.clear();
        }
        descriptor
    }

    pub fn register_all(&self, descriptors: impl IntoIterator<Item = EntityDescriptor>) {
        for descriptor in descriptors {
            self.register(descriptor);
        }
    }

    pub fn contains(&self, entity: &str) -> bool {
        self.entities
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(entity)
    }

    pub fn len(&self) -> usize {
        self.entities
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops every descriptor and cached resolution.
    pub fn clear(&self) {
        self.entities
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        self.navigations.clear();
    }
}

impl MetadataProvider for MetadataRegistry {
    fn descriptor(&self, entity: &str) -> Option<Arc<EntityDescriptor>> {
        self.entities
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(entity)
            .cloned()
    }

    fn navigation_cache(&self) -> Option<&NavigationCache> {
        Some(&self.navigations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::MaskingRule;
    use eagerload_types::ScalarKind;

    fn customer() -> EntityDescriptor {
        EntityDescriptor::builder("Customer")
            .table("customers")
            .key("Id", ScalarKind::Integer)
            .column(ColumnDescriptor::new("Card", ScalarKind::Text).masked(MaskingRule::new(2, 2)))
            .collection("Orders", "Order")
            .build()
            .unwrap()
    }

    #[test]
    fn test_provider_lookups() {
        let registry = MetadataRegistry::new();
        registry.register(customer());

        assert_eq!(registry.primary_key_of("Customer").as_deref(), Some("Id"));
        assert_eq!(registry.table_name_of("Customer").as_deref(), Some("customers"));
        assert_eq!(registry.columns_of("Customer").len(), 2);
        assert_eq!(registry.navigations_of("Customer")[0].name, "Orders");
        assert_eq!(
            registry.masking_rule_of("Customer", "Card"),
            Some(MaskingRule::new(2, 2))
        );
        assert!(registry.columns_of("Missing").is_empty());
        assert!(registry.require("Missing").is_err());
    }

    #[test]
    fn test_clear_isolates_registries() {
        let registry = MetadataRegistry::new();
        registry.register(customer());
        assert!(registry.contains("Customer"));
        registry.clear();
        assert!(registry.is_empty());
        assert!(registry.descriptor("Customer").is_none());
    }
}
