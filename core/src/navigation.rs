//! Navigation resolution and SQL alias allocation.
//!
//! A navigation name on an entity resolves to a [`ResolvedNavigation`]: the
//! target entity, where the foreign key lives, and (for many-to-many
//! collections) the join-entity hop. Resolutions are pure, so they are memoized
//! in the provider's [`NavigationCache`](crate::metadata::NavigationCache)
//! when it offers one.

use std::sync::Arc;

use hashbrown::HashSet;

use crate::error::{EagerError, Result};
use crate::expr::PropertyPath;
use crate::metadata::{
    Cardinality, ColumnAttribute, EntityDescriptor, FkSide, MetadataProvider, NavigationDescriptor,
};

/// Foreign-key property and the entity that carries it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKey {
    pub property: String,
    pub side: FkSide,
}

/// The associative hop of a join-entity collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinHop {
    pub entity: String,
    /// Property on the join entity holding the source key.
    pub parent_fk: String,
    /// Property on the join entity holding the related key.
    pub related_fk: String,
    /// Name of the join entity's navigation to the related entity.
    pub related_navigation: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedNavigation {
    pub name: String,
    pub cardinality: Cardinality,
    pub source: String,
    /// For join collections, the related (non-join) entity.
    pub target: String,
    /// For join collections the key lives on the join entity (`side` is
    /// `Target`).
    pub foreign_key: ForeignKey,
    pub join: Option<JoinHop>,
    pub required: bool,
}

impl ResolvedNavigation {
    #[inline]
    pub fn is_collection(&self) -> bool {
        self.cardinality == Cardinality::Collection
    }
}

/// Resolves navigation names against a [`MetadataProvider`].
///
/// Foreign keys are found in a fixed order:
/// 1. an explicit override on the navigation descriptor, or a single property
///    tagged as a foreign key to the target,
/// 2. references: `<Target>Id`, then `<Navigation>Id`, on the source entity,
/// 3. references: `<Source>Id` on the target entity (one-to-one),
/// 4. collections: `<Source>Id` on the join entity when one is configured,
///    otherwise on the target.
pub struct NavigationResolver<'a> {
    provider: &'a dyn MetadataProvider,
}

impl<'a> NavigationResolver<'a> {
    pub fn new(provider: &'a dyn MetadataProvider) -> Self {
        Self { provider }
    }

    /// Resolves every segment of `path`, starting at `entity`.
    pub fn resolve(&self, entity: &str, path: &PropertyPath) -> Result<Vec<Arc<ResolvedNavigation>>> {
        let mut current = entity.to_string();
        let mut chain = Vec::with_capacity(path.len());
        for segment in path.segments() {
            let resolved = self.resolve_one(&current, segment)?;
            current = resolved.target.clone();
            chain.push(resolved);
        }
        Ok(chain)
    }

    pub fn resolve_one(&self, entity: &str, navigation: &str) -> Result<Arc<ResolvedNavigation>> {
        let cache = self.provider.navigation_cache();
        if let Some(hit) = cache.and_then(|c| c.get(entity, navigation)) {
            return Ok(hit);
        }

        let source = self
            .provider
            .descriptor(entity)
            .ok_or_else(|| EagerError::Resolution(format!("unknown entity `{entity}`")))?;
        let descriptor = source.navigation(navigation).ok_or_else(|| {
            EagerError::Resolution(format!("`{entity}` has no navigation `{navigation}`"))
        })?;

        let resolved = Arc::new(match descriptor.cardinality {
            Cardinality::Reference => self.resolve_reference(&source, descriptor)?,
            Cardinality::Collection => self.resolve_collection(&source, descriptor)?,
        });

        if let Some(cache) = cache {
            cache.insert(entity, navigation, Arc::clone(&resolved));
        }
        Ok(resolved)
    }

    fn resolve_reference(
        &self,
        source: &EntityDescriptor,
        descriptor: &NavigationDescriptor,
    ) -> Result<ResolvedNavigation> {
        let target = self.lookup(&descriptor.target)?;
        let foreign_key = reference_foreign_key(source, &target, descriptor)?;

        let fk_required = foreign_key.side == FkSide::Source
            && source
                .column(&foreign_key.property)
                .is_some_and(|c| !c.nullable);

        Ok(ResolvedNavigation {
            name: descriptor.name.clone(),
            cardinality: Cardinality::Reference,
            source: source.name.clone(),
            target: target.name.clone(),
            foreign_key,
            join: None,
            required: descriptor.required || fk_required,
        })
    }

    fn resolve_collection(
        &self,
        source: &EntityDescriptor,
        descriptor: &NavigationDescriptor,
    ) -> Result<ResolvedNavigation> {
        let Some(join_name) = descriptor.join_entity.as_deref() else {
            let target = self.lookup(&descriptor.target)?;
            let property = match &descriptor.foreign_key {
                Some(fk) => fk.clone(),
                None => format!("{}Id", source.name),
            };
            require_property(&target, &property, &descriptor.name)?;
            return Ok(ResolvedNavigation {
                name: descriptor.name.clone(),
                cardinality: Cardinality::Collection,
                source: source.name.clone(),
                target: target.name.clone(),
                foreign_key: ForeignKey {
                    property,
                    side: FkSide::Target,
                },
                join: None,
                required: false,
            });
        };

        let join = self.lookup(join_name)?;
        let parent_fk = match &descriptor.foreign_key {
            Some(fk) => fk.clone(),
            None => format!("{}Id", source.name),
        };
        require_property(&join, &parent_fk, &descriptor.name)?;

        let (related, related_fk, related_navigation) = self.join_related(source, &join, descriptor)?;

        Ok(ResolvedNavigation {
            name: descriptor.name.clone(),
            cardinality: Cardinality::Collection,
            source: source.name.clone(),
            target: related,
            foreign_key: ForeignKey {
                property: parent_fk.clone(),
                side: FkSide::Target,
            },
            join: Some(JoinHop {
                entity: join.name.clone(),
                parent_fk,
                related_fk,
                related_navigation,
            }),
            required: false,
        })
    }

    /// The related side of a join entity: its reference navigation that does
    /// not lead back to the source, preferring the declared target.
    fn join_related(
        &self,
        source: &EntityDescriptor,
        join: &EntityDescriptor,
        descriptor: &NavigationDescriptor,
    ) -> Result<(String, String, String)> {
        let candidates: Vec<&NavigationDescriptor> = join
            .navigations
            .iter()
            .filter(|n| !n.is_collection() && n.target != source.name)
            .collect();
        let chosen = candidates
            .iter()
            .find(|n| n.target == descriptor.target)
            .or_else(|| candidates.first());

        match chosen {
            Some(nav) => {
                let related = self.lookup(&nav.target)?;
                let fk = reference_foreign_key(join, &related, nav)?;
                if fk.side != FkSide::Source {
                    return Err(EagerError::Resolution(format!(
                        "join entity `{}` does not hold the key of `{}`",
                        join.name, related.name
                    )));
                }
                Ok((related.name.clone(), fk.property, nav.name.clone()))
            }
            None => {
                // Join entities without navigations still carry `<Target>Id`.
                let related = self.lookup(&descriptor.target)?;
                let property = format!("{}Id", related.name);
                require_property(join, &property, &descriptor.name)?;
                Ok((related.name.clone(), property, related.name.clone()))
            }
        }
    }

    fn lookup(&self, entity: &str) -> Result<Arc<EntityDescriptor>> {
        self.provider
            .descriptor(entity)
            .ok_or_else(|| EagerError::Resolution(format!("unknown entity `{entity}`")))
    }
}

fn reference_foreign_key(
    source: &EntityDescriptor,
    target: &EntityDescriptor,
    descriptor: &NavigationDescriptor,
) -> Result<ForeignKey> {
    if let Some(property) = &descriptor.foreign_key {
        let side = descriptor.fk_side.unwrap_or(FkSide::Source);
        let owner = if side == FkSide::Source { source } else { target };
        require_property(owner, property, &descriptor.name)?;
        return Ok(ForeignKey {
            property: property.clone(),
            side,
        });
    }

    let mut tagged = source.mapped_columns().filter(|c| {
        c.has(&ColumnAttribute::ForeignKey(target.name.clone()))
    });
    if let (Some(only), None) = (tagged.next(), tagged.next()) {
        return Ok(ForeignKey {
            property: only.property.clone(),
            side: FkSide::Source,
        });
    }

    for property in [format!("{}Id", target.name), format!("{}Id", descriptor.name)] {
        if source.has_property(&property) {
            return Ok(ForeignKey {
                property,
                side: FkSide::Source,
            });
        }
    }

    let property = format!("{}Id", source.name);
    if target.has_property(&property) {
        return Ok(ForeignKey {
            property,
            side: FkSide::Target,
        });
    }

    Err(EagerError::Resolution(format!(
        "no foreign key found for `{}.{}`",
        source.name, descriptor.name
    )))
}

fn require_property(entity: &EntityDescriptor, property: &str, navigation: &str) -> Result<()> {
    if entity.has_property(property) {
        Ok(())
    } else {
        Err(EagerError::Resolution(format!(
            "foreign key `{property}` of `{navigation}` is not a property of `{}`",
            entity.name
        )))
    }
}

/// Hands out SQL aliases unique within one statement build.
///
/// Table aliases are a letter taken from the path segment plus a counter
/// (`c1`, `l2`, ...). Reference column suffixes come from a separate counter,
/// so any number of nested references get distinct `<column><n>` names.
#[derive(Debug, Default)]
pub struct AliasAllocator {
    next_table: usize,
    next_reference: usize,
    used: HashSet<String>,
}

impl AliasAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Alias of the root table, `<letter>0` unless a reserved alias already
    /// holds it.
    pub fn root(&mut self, entity: &str) -> String {
        let alias = format!("{}0", alias_letter(entity));
        if self.used.insert(alias.clone()) {
            alias
        } else {
            self.table(entity)
        }
    }

    /// Marks a caller-chosen alias as taken.
    pub fn reserve(&mut self, alias: &str) {
        self.used.insert(alias.to_string());
    }

    pub fn table(&mut self, segment: &str) -> String {
        let letter = alias_letter(segment);
        loop {
            self.next_table += 1;
            let alias = format!("{letter}{}", self.next_table);
            if self.used.insert(alias.clone()) {
                return alias;
            }
        }
    }

    /// Next reference column suffix, starting at 1. `0` is reserved for the
    /// key of collection items.
    pub fn reference_index(&mut self) -> usize {
        self.next_reference += 1;
        self.next_reference
    }
}

fn alias_letter(segment: &str) -> char {
    segment
        .chars()
        .find(char::is_ascii_alphabetic)
        .map_or('t', |c| c.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{ColumnDescriptor, MetadataRegistry, NavigationDescriptor};
    use eagerload_types::ScalarKind;

    fn registry() -> MetadataRegistry {
        let registry = MetadataRegistry::new();
        registry.register_all([
            EntityDescriptor::builder("Order")
                .key("Id", ScalarKind::Integer)
                .field("CustomerId", ScalarKind::Integer)
                .optional("ShipperKey", ScalarKind::Integer)
                .reference("Customer", "Customer")
                .navigation(
                    NavigationDescriptor::reference("Shipper", "Shipper")
                        .foreign_key("ShipperKey", FkSide::Source),
                )
                .reference("Invoice", "Invoice")
                .collection("Lines", "OrderLine")
                .navigation(NavigationDescriptor::collection("Tags", "Tag").through("OrderTag"))
                .build()
                .unwrap(),
            EntityDescriptor::builder("Customer")
                .key("Id", ScalarKind::Integer)
                .field("Name", ScalarKind::Text)
                .build()
                .unwrap(),
            EntityDescriptor::builder("Shipper")
                .key("Id", ScalarKind::Integer)
                .build()
                .unwrap(),
            EntityDescriptor::builder("Invoice")
                .key("Id", ScalarKind::Integer)
                .field("OrderId", ScalarKind::Integer)
                .build()
                .unwrap(),
            EntityDescriptor::builder("OrderLine")
                .key("Id", ScalarKind::Integer)
                .field("OrderId", ScalarKind::Integer)
                .build()
                .unwrap(),
            EntityDescriptor::builder("OrderTag")
                .key("Id", ScalarKind::Integer)
                .field("OrderId", ScalarKind::Integer)
                .column(
                    ColumnDescriptor::new("Label", ScalarKind::Integer)
                        .with_attribute(ColumnAttribute::ForeignKey("Tag".into())),
                )
                .reference("Order", "Order")
                .reference("Tag", "Tag")
                .build()
                .unwrap(),
            EntityDescriptor::builder("Tag")
                .key("Id", ScalarKind::Integer)
                .build()
                .unwrap(),
        ]);
        registry
    }

    #[test]
    fn test_reference_key_priority() {
        let registry = registry();
        let resolver = NavigationResolver::new(&registry);

        let customer = resolver.resolve_one("Order", "Customer").unwrap();
        assert_eq!(customer.foreign_key.property, "CustomerId");
        assert_eq!(customer.foreign_key.side, FkSide::Source);
        assert!(customer.required);

        let shipper = resolver.resolve_one("Order", "Shipper").unwrap();
        assert_eq!(shipper.foreign_key.property, "ShipperKey");
        assert!(!shipper.required);

        let invoice = resolver.resolve_one("Order", "Invoice").unwrap();
        assert_eq!(invoice.foreign_key.property, "OrderId");
        assert_eq!(invoice.foreign_key.side, FkSide::Target);
    }

    #[test]
    fn test_collections_and_join_entities() {
        let registry = registry();
        let resolver = NavigationResolver::new(&registry);

        let lines = resolver.resolve_one("Order", "Lines").unwrap();
        assert_eq!(lines.target, "OrderLine");
        assert_eq!(lines.foreign_key.property, "OrderId");
        assert!(lines.join.is_none());

        let tags = resolver.resolve_one("Order", "Tags").unwrap();
        let hop = tags.join.as_ref().unwrap();
        assert_eq!(tags.target, "Tag");
        assert_eq!(hop.parent_fk, "OrderId");
        assert_eq!(hop.related_fk, "Label");
        assert_eq!(hop.related_navigation, "Tag");
    }

    #[test]
    fn test_unknown_navigation_is_a_resolution_error() {
        let registry = registry();
        let resolver = NavigationResolver::new(&registry);
        let err = resolver
            .resolve("Order", &PropertyPath::parse("Customer.Orders"))
            .unwrap_err();
        assert!(matches!(err, EagerError::Resolution(_)));
    }

    #[test]
    fn test_resolutions_are_cached() {
        let registry = registry();
        let resolver = NavigationResolver::new(&registry);
        let first = resolver.resolve_one("Order", "Lines").unwrap();
        let second = resolver.resolve_one("Order", "Lines").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(registry.navigation_cache().unwrap().len(), 1);
    }

    #[test]
    fn test_aliases_never_collide() {
        let mut aliases = AliasAllocator::new();
        assert_eq!(aliases.root("Order"), "o0");
        let a = aliases.table("Customer");
        let b = aliases.table("Country");
        assert_ne!(a, b);
        assert_eq!((a.as_str(), b.as_str()), ("c1", "c2"));
        let indices: Vec<usize> = (0..150).map(|_| aliases.reference_index()).collect();
        assert_eq!(indices.first(), Some(&1));
        assert_eq!(indices.last(), Some(&150));
    }

    #[test]
    fn test_root_alias_yields_to_reserved_alias() {
        let mut aliases = AliasAllocator::new();
        aliases.reserve("o0");
        aliases.reserve("o1");
        assert_eq!(aliases.root("Order"), "o2");
        assert_eq!(aliases.table("Orders"), "o3");
    }
}
