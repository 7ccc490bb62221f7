//! Rebuilding the object graph from flat rows.
//!
//! Rows are folded into an arena of drafts keyed by plan node and primary
//! key, so every related row becomes exactly one draft however many rows
//! repeat it. The arena is then frozen into shared [`Entity`] trees.

mod entity;
mod plan;

pub use entity::{Entity, Navigation, Record};
pub use plan::{CollectionEdge, ColumnSlot, MaterializePlan, NodePlan, ReferenceEdge};

use std::sync::Arc;

use eagerload_types::{KeyValue, Value};
use hashbrown::{HashMap, HashSet};

use crate::engine::Row;

/// Draft identity: plan node, owning draft for scoped items, key.
type Identity = (usize, Option<usize>, KeyValue);

struct Draft {
    node: usize,
    values: Record,
    references: Vec<Option<usize>>,
    collections: Vec<(Vec<usize>, HashSet<KeyValue>)>,
}

/// Folds rows into a duplicate-free graph following a [`MaterializePlan`].
pub struct ResultMaterializer<'p> {
    plan: &'p MaterializePlan,
    drafts: Vec<Draft>,
    identity: HashMap<Identity, usize>,
    roots: Vec<usize>,
}

impl<'p> ResultMaterializer<'p> {
    pub fn new(plan: &'p MaterializePlan) -> Self {
        Self {
            plan,
            drafts: Vec::new(),
            identity: HashMap::new(),
            roots: Vec::new(),
        }
    }

    /// Materializes `rows` in one go.
    ///
    /// ```
    /// use std::sync::Arc;
    /// use eagerload_core::engine::{Columns, Row};
    /// use eagerload_core::materialize::{ColumnSlot, MaterializePlan, ResultMaterializer};
    /// use eagerload_core::{ScalarKind, Value};
    ///
    /// let mut plan = MaterializePlan::new();
    /// let slot = ColumnSlot { property: "Id".into(), source: "Id".into(), kind: ScalarKind::Integer, nullable: false };
    /// plan.add_node("Tag".into(), "Id".into(), vec![slot]);
    ///
    /// let columns = Arc::new(Columns::new(vec!["Id".into()]));
    /// let rows: Vec<Row> = [1, 2, 1]
    ///     .into_iter()
    ///     .map(|id| Row::new(Arc::clone(&columns), vec![Value::Integer(id)]))
    ///     .collect();
    /// assert_eq!(ResultMaterializer::materialize(&plan, &rows).len(), 2);
    /// ```
    pub fn materialize(plan: &'p MaterializePlan, rows: &[Row]) -> Vec<Arc<Entity>> {
        crate::eager_profile_scope!("materialize", "rows");
        let mut materializer = Self::new(plan);
        for row in rows {
            materializer.push_row(row);
        }
        materializer.finish()
    }

    /// Folds one row in.
    pub fn push_row(&mut self, row: &Row) {
        if self.plan.is_empty() {
            return;
        }
        match self.visit(0, None, row) {
            Some((index, _, true)) => self.roots.push(index),
            Some(_) => {}
            None => {
                crate::eager_warn!("materialize", "row without a root key skipped");
            }
        }
    }

    /// Freezes the drafts into entities, roots in first-seen order.
    pub fn finish(self) -> Vec<Arc<Entity>> {
        let mut frozen: Vec<Option<Arc<Entity>>> = vec![None; self.drafts.len()];
        self.roots
            .iter()
            .map(|&root| freeze(self.plan, &self.drafts, &mut frozen, root))
            .collect()
    }

    /// Returns the draft index, its key and whether it was created by this row.
    fn visit(&mut self, node_id: usize, scope: Option<usize>, row: &Row) -> Option<(usize, KeyValue, bool)> {
        let plan = self.plan;
        let node = plan.node(node_id)?;
        let key = row.get(&node.key).and_then(Value::key)?;

        let identity = (node_id, scope, key.clone());
        let (index, fresh) = match self.identity.get(&identity) {
            Some(&index) => (index, false),
            None => {
                let index = self.drafts.len();
                self.drafts.push(Draft {
                    node: node_id,
                    values: read_values(node, row),
                    references: vec![None; node.references.len()],
                    collections: vec![(Vec::new(), HashSet::new()); node.collections.len()],
                });
                self.identity.insert(identity, index);
                (index, true)
            }
        };

        for (slot, edge) in node.references.iter().enumerate() {
            // Visited even when already set: nested collections may still grow.
            if let Some((child, _, _)) = self.visit(edge.node, None, row) {
                let current = &mut self.drafts[index].references[slot];
                if current.is_none() {
                    *current = Some(child);
                }
            }
        }

        for (slot, edge) in node.collections.iter().enumerate() {
            let scope = edge.scoped.then_some(index);
            if let Some((child, child_key, _)) = self.visit(edge.node, scope, row) {
                let (items, seen) = &mut self.drafts[index].collections[slot];
                if seen.insert(child_key) {
                    items.push(child);
                }
            }
        }

        Some((index, key, fresh))
    }
}

fn read_values(node: &NodePlan, row: &Row) -> Record {
    let mut values = Record::with_capacity(node.columns.len());
    for slot in &node.columns {
        let Some(raw) = row.get(&slot.source) else {
            continue;
        };
        match raw.clone().coerce(slot.kind) {
            Ok(Value::Null) if !slot.nullable => {
                crate::eager_debug!(
                    "materialize",
                    "NULL for non-nullable {}.{} left unset",
                    node.entity,
                    slot.property
                );
            }
            Ok(value) => values.set(slot.property.as_str(), value),
            Err(err) if slot.nullable => {
                crate::eager_warn!("materialize", "{}.{} set to NULL: {}", node.entity, slot.property, err);
                values.set(slot.property.as_str(), Value::Null);
            }
            Err(err) => {
                crate::eager_warn!("materialize", "{}.{} skipped: {}", node.entity, slot.property, err);
            }
        }
    }
    values
}

fn freeze(
    plan: &MaterializePlan,
    drafts: &[Draft],
    frozen: &mut Vec<Option<Arc<Entity>>>,
    index: usize,
) -> Arc<Entity> {
    if let Some(done) = &frozen[index] {
        return Arc::clone(done);
    }
    let draft = &drafts[index];
    let mut navigations = Vec::new();
    if let Some(node) = plan.node(draft.node) {
        for (edge, target) in node.references.iter().zip(&draft.references) {
            let target = target.map(|t| freeze(plan, drafts, frozen, t));
            navigations.push((edge.navigation.clone(), Navigation::Reference(target)));
        }
        for (edge, (items, _)) in node.collections.iter().zip(&draft.collections) {
            let items = items
                .iter()
                .map(|&item| freeze(plan, drafts, frozen, item))
                .collect();
            navigations.push((edge.navigation.clone(), Navigation::Collection(items)));
        }
    }
    let entity_name = plan.node(draft.node).map_or("", |n| n.entity.as_str());
    let entity = Arc::new(Entity::new(entity_name, draft.values.clone(), navigations));
    frozen[index] = Some(Arc::clone(&entity));
    entity
}
