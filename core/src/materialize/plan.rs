use eagerload_types::ScalarKind;

use crate::metadata::EntityDescriptor;

/// Where one property is read from in a result row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSlot {
    pub property: String,
    /// Result column name.
    pub source: String,
    pub kind: ScalarKind,
    pub nullable: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceEdge {
    pub navigation: String,
    pub node: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionEdge {
    pub navigation: String,
    pub node: usize,
    /// Items are distinct per parent (join-entity collections carry their
    /// join row).
    pub scoped: bool,
}

/// How to build one level of the graph from a row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodePlan {
    pub id: usize,
    pub entity: String,
    /// Result column holding the primary key.
    pub key: String,
    pub columns: Vec<ColumnSlot>,
    pub references: Vec<ReferenceEdge>,
    pub collections: Vec<CollectionEdge>,
}

/// Row-to-graph mapping produced alongside the SQL. Node `0` is the root.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MaterializePlan {
    nodes: Vec<NodePlan>,
}

impl MaterializePlan {
    pub fn new() -> Self {
        Self::default()
    }

    /// Root-only plan reading every mapped column of `entity` through
    /// `source(column_name)`.
    pub fn flat(entity: &EntityDescriptor, source: impl Fn(&str) -> String) -> Self {
        let mut plan = Self::new();
        plan.add_entity(entity, &source);
        plan
    }

    /// Adds a node for `entity` whose columns are named `source(column_name)`.
    pub fn add_entity(&mut self, entity: &EntityDescriptor, source: &dyn Fn(&str) -> String) -> usize {
        let key = entity
            .column(&entity.primary_key)
            .map_or_else(|| source(&entity.primary_key), |c| source(&c.column));
        let columns = entity
            .mapped_columns()
            .map(|c| ColumnSlot {
                property: c.property.clone(),
                source: source(&c.column),
                kind: c.kind,
                nullable: c.nullable,
            })
            .collect();
        self.add_node(entity.name.clone(), key, columns)
    }

    pub fn add_node(&mut self, entity: String, key: String, columns: Vec<ColumnSlot>) -> usize {
        let id = self.nodes.len();
        self.nodes.push(NodePlan {
            id,
            entity,
            key,
            columns,
            references: Vec::new(),
            collections: Vec::new(),
        });
        id
    }

    pub fn add_reference(&mut self, parent: usize, navigation: impl Into<String>, node: usize) {
        if let Some(plan) = self.nodes.get_mut(parent) {
            plan.references.push(ReferenceEdge {
                navigation: navigation.into(),
                node,
            });
        }
    }

    pub fn add_collection(&mut self, parent: usize, navigation: impl Into<String>, node: usize, scoped: bool) {
        if let Some(plan) = self.nodes.get_mut(parent) {
            plan.collections.push(CollectionEdge {
                navigation: navigation.into(),
                node,
                scoped,
            });
        }
    }

    #[inline]
    pub fn node(&self, id: usize) -> Option<&NodePlan> {
        self.nodes.get(id)
    }

    #[inline]
    pub fn root(&self) -> Option<&NodePlan> {
        self.nodes.first()
    }

    #[inline]
    pub fn nodes(&self) -> &[NodePlan] {
        &self.nodes
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
