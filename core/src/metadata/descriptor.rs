//! Static entity descriptors, registered once per entity type.

use smallvec::SmallVec;

use crate::error::{EagerError, Result};
use crate::metadata::MaskingRule;
use eagerload_types::ScalarKind;

/// Per-property tags, populated at registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnAttribute {
    PrimaryKey,
    /// Holds a key of the named entity.
    ForeignKey(String),
    /// Lives on the model only; never read or written.
    NotMapped,
    /// Assigned by the database; omitted from inserts when absent.
    Generated,
    /// Mirrors the named navigation on the other side of a relationship.
    Inverse(String),
}

/// Mapping of one entity property onto a table column.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDescriptor {
    pub property: String,
    pub column: String,
    pub kind: ScalarKind,
    pub nullable: bool,
    pub masking: Option<MaskingRule>,
    pub attributes: SmallVec<[ColumnAttribute; 2]>,
}

impl ColumnDescriptor {
    /// A non-nullable column whose name equals the property name.
    pub fn new(property: impl Into<String>, kind: ScalarKind) -> Self {
        let property = property.into();
        Self {
            column: property.clone(),
            property,
            kind,
            nullable: false,
            masking: None,
            attributes: SmallVec::new(),
        }
    }

    pub fn column_name(mut self, column: impl Into<String>) -> Self {
        self.column = column.into();
        self
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn masked(mut self, rule: MaskingRule) -> Self {
        self.masking = Some(rule);
        self
    }

    pub fn with_attribute(mut self, attribute: ColumnAttribute) -> Self {
        if !self.attributes.contains(&attribute) {
            self.attributes.push(attribute);
        }
        self
    }

    pub fn generated(self) -> Self {
        self.with_attribute(ColumnAttribute::Generated)
    }

    pub fn not_mapped(self) -> Self {
        self.with_attribute(ColumnAttribute::NotMapped)
    }

    #[inline]
    pub fn has(&self, attribute: &ColumnAttribute) -> bool {
        self.attributes.contains(attribute)
    }

    #[inline]
    pub fn is_primary_key(&self) -> bool {
        self.has(&ColumnAttribute::PrimaryKey)
    }

    #[inline]
    pub fn is_mapped(&self) -> bool {
        !self.has(&ColumnAttribute::NotMapped)
    }

    #[inline]
    pub fn is_generated(&self) -> bool {
        self.has(&ColumnAttribute::Generated)
    }

    /// Target entity when the property is tagged as a foreign key.
    pub fn foreign_key_target(&self) -> Option<&str> {
        self.attributes.iter().find_map(|a| match a {
            ColumnAttribute::ForeignKey(target) => Some(target.as_str()),
            _ => None,
        })
    }
}

/// Reference (`many-to-one`/`one-to-one`) or collection (`one-to-many`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cardinality {
    Reference,
    Collection,
}

/// Which entity carries the foreign key property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FkSide {
    Source,
    Target,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationDescriptor {
    pub name: String,
    pub cardinality: Cardinality,
    pub target: String,
    pub join_entity: Option<String>,
    pub foreign_key: Option<String>,
    pub fk_side: Option<FkSide>,
    /// The foreign key is non-nullable, so the related row always exists.
    pub required: bool,
}

impl NavigationDescriptor {
    pub fn reference(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self::new(name, Cardinality::Reference, target)
    }

    pub fn collection(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self::new(name, Cardinality::Collection, target)
    }

    fn new(name: impl Into<String>, cardinality: Cardinality, target: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cardinality,
            target: target.into(),
            join_entity: None,
            foreign_key: None,
            fk_side: None,
            required: false,
        }
    }

    /// Routes a collection through an associative join entity.
    pub fn through(mut self, join_entity: impl Into<String>) -> Self {
        self.join_entity = Some(join_entity.into());
        self
    }

    /// Overrides foreign-key discovery.
    pub fn foreign_key(mut self, property: impl Into<String>, side: FkSide) -> Self {
        self.foreign_key = Some(property.into());
        self.fk_side = Some(side);
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    #[inline]
    pub fn is_collection(&self) -> bool {
        self.cardinality == Cardinality::Collection
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EntityDescriptor {
    pub name: String,
    pub table: String,
    pub primary_key: String,
    pub columns: Vec<ColumnDescriptor>,
    pub navigations: Vec<NavigationDescriptor>,
}

impl EntityDescriptor {
    pub fn builder(name: impl Into<String>) -> EntityDescriptorBuilder {
        let name = name.into();
        EntityDescriptorBuilder {
            table: name.clone(),
            name,
            primary_key: None,
            columns: Vec::new(),
            navigations: Vec::new(),
        }
    }

    pub fn column(&self, property: &str) -> Option<&ColumnDescriptor> {
        self.columns.iter().find(|c| c.property == property)
    }

    /// Columns that take part in SQL, in declaration order.
    pub fn mapped_columns(&self) -> impl Iterator<Item = &ColumnDescriptor> {
        self.columns.iter().filter(|c| c.is_mapped())
    }

    pub fn has_property(&self, property: &str) -> bool {
        self.column(property).is_some_and(ColumnDescriptor::is_mapped)
    }

    pub fn navigation(&self, name: &str) -> Option<&NavigationDescriptor> {
        self.navigations.iter().find(|n| n.name == name)
    }

    pub fn primary_key_column(&self) -> Result<&ColumnDescriptor> {
        self.column(&self.primary_key).ok_or_else(|| {
            EagerError::Metadata(format!(
                "entity `{}` has no column for key `{}`",
                self.name, self.primary_key
            ))
        })
    }
}

/// Fluent registration of an [`EntityDescriptor`].
///
/// ```
/// use eagerload_core::metadata::{EntityDescriptor, NavigationDescriptor};
/// use eagerload_core::ScalarKind;
///
/// let order = EntityDescriptor::builder("Order")
///     .table("orders")
///     .key("Id", ScalarKind::Integer)
///     .field("CustomerId", ScalarKind::Integer)
///     .field("Status", ScalarKind::Text)
///     .navigation(NavigationDescriptor::reference("Customer", "Customer").required())
///     .navigation(NavigationDescriptor::collection("Lines", "OrderLine"))
///     .build()
///     .unwrap();
/// assert_eq!(order.primary_key_column().unwrap().column, "Id");
/// ```
#[derive(Debug, Clone)]
pub struct EntityDescriptorBuilder {
    name: String,
    table: String,
    primary_key: Option<String>,
    columns: Vec<ColumnDescriptor>,
    navigations: Vec<NavigationDescriptor>,
}

impl EntityDescriptorBuilder {
    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    pub fn key(self, property: impl Into<String>, kind: ScalarKind) -> Self {
        self.key_column(ColumnDescriptor::new(property, kind))
    }

    pub fn key_column(mut self, column: ColumnDescriptor) -> Self {
        self.primary_key = Some(column.property.clone());
        self.column(column.with_attribute(ColumnAttribute::PrimaryKey))
    }

    pub fn field(self, property: impl Into<String>, kind: ScalarKind) -> Self {
        self.column(ColumnDescriptor::new(property, kind))
    }

    pub fn optional(self, property: impl Into<String>, kind: ScalarKind) -> Self {
        self.column(ColumnDescriptor::new(property, kind).nullable())
    }

    pub fn column(mut self, column: ColumnDescriptor) -> Self {
        self.columns.push(column);
        self
    }

    pub fn navigation(mut self, navigation: NavigationDescriptor) -> Self {
        self.navigations.push(navigation);
        self
    }

    pub fn reference(self, name: impl Into<String>, target: impl Into<String>) -> Self {
        self.navigation(NavigationDescriptor::reference(name, target))
    }

    pub fn collection(self, name: impl Into<String>, target: impl Into<String>) -> Self {
        self.navigation(NavigationDescriptor::collection(name, target))
    }

    pub fn build(self) -> Result<EntityDescriptor> {
        let primary_key = self.primary_key.ok_or_else(|| {
            EagerError::Metadata(format!("entity `{}` has no primary key", self.name))
        })?;
        for (i, column) in self.columns.iter().enumerate() {
            if self.columns[..i].iter().any(|c| c.property == column.property) {
                return Err(EagerError::Metadata(format!(
                    "entity `{}` maps property `{}` twice",
                    self.name, column.property
                )));
            }
        }
        for (i, nav) in self.navigations.iter().enumerate() {
            if self.navigations[..i].iter().any(|n| n.name == nav.name)
                || self.columns.iter().any(|c| c.property == nav.name)
            {
                return Err(EagerError::Metadata(format!(
                    "entity `{}` declares `{}` twice",
                    self.name, nav.name
                )));
            }
        }
        Ok(EntityDescriptor {
            name: self.name,
            table: self.table,
            primary_key,
            columns: self.columns,
            navigations: self.navigations,
        })
    }
}
