use std::sync::Arc;

use eagerload_types::ScalarKind;

use super::{NavTree, SqlEmitter};
use crate::error::Result;
use crate::materialize::{ColumnSlot, MaterializePlan};
use crate::metadata::{ColumnDescriptor, EntityDescriptor};
use crate::translate::column_of;

/// Name of the item key column every collection derived table exports.
const ITEM_KEY: &str = "Id0";

pub(super) fn slot(column: &ColumnDescriptor, source: String) -> ColumnSlot {
    ColumnSlot {
        property: column.property.clone(),
        source,
        kind: column.kind,
        nullable: column.nullable,
    }
}

/// A collection derived table under construction.
pub(super) struct CollectionQuery {
    pub alias: String,
    /// Exported column matched against the parent key.
    pub correlation: String,
    /// Exported column names, in select order.
    pub columns: Vec<String>,
    /// Property path (from the query root) -> exported column.
    pub scope: Vec<(String, String, ScalarKind)>,
    /// Exported key columns, outermost first.
    pub ids: Vec<String>,
    select: Vec<String>,
    from: String,
}

impl CollectionQuery {
    pub fn sql(&self) -> String {
        format!("SELECT {} FROM {}", self.select.join(", "), self.from)
    }

    fn export(&mut self, expr: String, name: String, quoted: String) {
        self.select.push(format!("{expr} AS {quoted}"));
        self.columns.push(name);
    }
}

/// The entity rows are being attached to while walking a collection's
/// children.
struct Parent {
    alias: String,
    entity: Arc<EntityDescriptor>,
    plan: usize,
    inner: bool,
}

impl SqlEmitter<'_> {
    /// Builds the derived table for collection node `id`. Column names of the
    /// final statement are `outer_prefix` + this table's alias + `_` + the
    /// exported name.
    pub(super) fn collection(
        &mut self,
        tree: &NavTree,
        id: usize,
        parent_plan: usize,
        plan: &mut MaterializePlan,
        outer_prefix: &str,
    ) -> Result<CollectionQuery> {
        let node = &tree.nodes[id];
        let nav = Arc::clone(&node.nav);
        let target = self.provider.require(&nav.target)?;
        let alias = self.aliases.table(node.path.property());
        let prefix = format!("{outer_prefix}{alias}_");
        let key_column = target.primary_key_column()?.column.clone();

        let mut query = CollectionQuery {
            alias: alias.clone(),
            correlation: String::new(),
            columns: Vec::new(),
            scope: Vec::new(),
            ids: vec![ITEM_KEY.to_string()],
            select: Vec::new(),
            from: String::new(),
        };

        let correlated = nav.join.is_none().then_some(nav.foreign_key.property.as_str());
        let mut slots = Vec::new();
        for column in target.mapped_columns() {
            let raw = correlated == Some(column.property.as_str());
            query.export(
                self.project(&alias, column, raw),
                column.column.clone(),
                self.quote(&column.column),
            );
            query.scope.push((
                node.path.child(column.property.as_str()).to_string(),
                column.column.clone(),
                column.kind,
            ));
            slots.push(slot(column, format!("{prefix}{}", column.column)));
        }
        query.export(
            format!("{alias}.{}", self.quote(&key_column)),
            ITEM_KEY.to_string(),
            self.quote(ITEM_KEY),
        );

        let item = plan.add_node(target.name.clone(), format!("{prefix}{ITEM_KEY}"), slots);
        plan.add_collection(parent_plan, nav.name.clone(), item, nav.join.is_some());

        match &nav.join {
            None => {
                query.correlation = column_of(&target, &nav.foreign_key.property)?;
                query.from = format!("{} AS {alias}", self.quote(&target.table));
            }
            Some(hop) => {
                let join = self.provider.require(&hop.entity)?;
                let join_alias = self.aliases.table(&hop.entity);
                let mut join_slots = Vec::new();
                for column in join.mapped_columns() {
                    let name = format!("j_{}", column.column);
                    let raw = column.property == hop.parent_fk;
                    query.export(
                        self.project(&join_alias, column, raw),
                        name.clone(),
                        self.quote(&name),
                    );
                    join_slots.push(slot(column, format!("{prefix}{name}")));
                }
                let join_key = join.primary_key_column()?.column.clone();
                let join_node = plan.add_node(join.name.clone(), format!("{prefix}j_{join_key}"), join_slots);
                plan.add_reference(item, join.name.clone(), join_node);

                query.correlation = format!("j_{}", column_of(&join, &hop.parent_fk)?);
                query.from = format!(
                    "{} AS {join_alias} INNER JOIN {} AS {alias} ON {alias}.{} = {join_alias}.{}",
                    self.quote(&join.table),
                    self.quote(&target.table),
                    self.quote(&key_column),
                    self.quote(&column_of(&join, &hop.related_fk)?)
                );
            }
        }

        let parent = Parent {
            alias,
            entity: target,
            plan: item,
            inner: true,
        };
        self.collection_children(tree, &node.children, &parent, plan, &prefix, &mut query)?;
        Ok(query)
    }

    fn collection_children(
        &mut self,
        tree: &NavTree,
        children: &[usize],
        parent: &Parent,
        plan: &mut MaterializePlan,
        prefix: &str,
        query: &mut CollectionQuery,
    ) -> Result<()> {
        for &child in children {
            let node = &tree.nodes[child];

            if node.nav.is_collection() {
                let parent_key = format!(
                    "{}.{}",
                    parent.alias,
                    self.quote(&parent.entity.primary_key_column()?.column)
                );
                let nested = self.collection(tree, child, parent.plan, plan, prefix)?;
                let n = &nested.alias;
                query.from.push_str(&format!(
                    " LEFT JOIN ({}) AS {n} ON {n}.{} = {parent_key}",
                    nested.sql(),
                    self.quote(&nested.correlation)
                ));
                for name in &nested.columns {
                    let exported = format!("{n}_{name}");
                    let quoted = self.quote(&exported);
                    query.export(format!("{n}.{}", self.quote(name)), exported, quoted);
                }
                for (path, name, kind) in &nested.scope {
                    query.scope.push((path.clone(), format!("{n}_{name}"), *kind));
                }
                query.ids.extend(nested.ids.iter().map(|name| format!("{n}_{name}")));
                continue;
            }

            let target = self.provider.require(&node.nav.target)?;
            let alias = self.aliases.table(node.path.property());
            let k = self.aliases.reference_index();
            let inner = node.nav.required && parent.inner;
            let on = self.join_condition(&node.nav, &alias, &target, &parent.alias, &parent.entity)?;
            query.from.push_str(&format!(
                " {} {} AS {alias} ON {on}",
                if inner { "INNER JOIN" } else { "LEFT JOIN" },
                self.quote(&target.table)
            ));

            let key_column = target.primary_key_column()?.column.clone();
            let id_name = format!("Id{k}");
            let mut slots = Vec::new();
            for column in target.mapped_columns() {
                let name = if column.column == key_column {
                    id_name.clone()
                } else {
                    format!("{}{k}", column.column)
                };
                query.scope.push((
                    node.path.child(column.property.as_str()).to_string(),
                    name.clone(),
                    column.kind,
                ));
                slots.push(slot(column, format!("{prefix}{name}")));
                let quoted = self.quote(&name);
                query.export(self.project(&alias, column, false), name, quoted);
            }

            let reference = plan.add_node(target.name.clone(), format!("{prefix}{id_name}"), slots);
            plan.add_reference(parent.plan, node.nav.name.clone(), reference);

            let next = Parent {
                alias,
                entity: target,
                plan: reference,
                inner,
            };
            self.collection_children(tree, &node.children, &next, plan, prefix, query)?;
        }
        Ok(())
    }
}
