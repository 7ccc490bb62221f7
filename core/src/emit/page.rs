use std::sync::Arc;

use hashbrown::HashMap;

use super::collection::slot;
use super::{CompiledQuery, NavTree, QueryShape, SqlEmitter, PAGE_ALIAS};
use crate::error::Result;
use crate::materialize::MaterializePlan;
use crate::metadata::EntityDescriptor;
use crate::translate::ColumnScope;

/// Columns of the page subquery and their re-export from the outer select.
#[derive(Default)]
struct Projection {
    page: Vec<String>,
    outer: Vec<String>,
}

impl Projection {
    fn export(&mut self, emitter: &SqlEmitter<'_>, expr: String, name: &str) {
        let s = PAGE_ALIAS;
        self.page.push(format!("{expr} AS {}", emitter.quote(name)));
        self.outer.push(format!(
            "{s}.{} AS {}",
            emitter.quote(name),
            emitter.quote(&format!("{s}_{name}"))
        ));
    }
}

impl SqlEmitter<'_> {
    pub(super) fn graph(mut self, root: Arc<EntityDescriptor>, tree: &NavTree) -> Result<CompiledQuery> {
        let s = PAGE_ALIAS;
        let source = self.source(Arc::clone(&root), tree)?;
        let root_key = root.primary_key_column()?.column.clone();

        let mut plan = MaterializePlan::new();
        let mut projection = Projection::default();
        let mut outer = ColumnScope::new();
        outer.set_root_entity(root.name.clone());
        let mut order_keys = vec![format!("{s}.{}", self.quote(&root_key))];

        let root_plan = plan.add_entity(&root, &|column| format!("{s}_{column}"));
        for column in root.mapped_columns() {
            projection.export(&self, self.project(&source.root_alias, column, false), &column.column);
            outer.insert(
                column.property.clone(),
                format!("{s}.{}", self.quote(&column.column)),
                column.kind,
            );
        }

        // tree node -> plan node, and -> page column holding its key
        let mut plan_nodes: HashMap<usize, usize> = HashMap::new();
        let mut keys: HashMap<usize, String> = HashMap::new();

        for joined in &source.references {
            let node = &tree.nodes[joined.node];
            let k = self.aliases.reference_index();
            let key_column = joined.entity.primary_key_column()?.column.clone();
            let id_name = format!("Id{k}");

            let mut slots = Vec::new();
            for column in joined.entity.mapped_columns() {
                let name = if column.column == key_column {
                    id_name.clone()
                } else {
                    format!("{}{k}", column.column)
                };
                projection.export(&self, self.project(&joined.alias, column, false), &name);
                outer.insert(
                    node.path.child(column.property.as_str()).to_string(),
                    format!("{s}.{}", self.quote(&name)),
                    column.kind,
                );
                slots.push(slot(column, format!("{s}_{name}")));
            }
            keys.insert(joined.node, id_name.clone());

            if !node.included {
                continue;
            }
            let parent_plan = match node.parent {
                None => Some(root_plan),
                Some(parent) => plan_nodes.get(&parent).copied(),
            };
            if let Some(parent_plan) = parent_plan {
                let id = plan.add_node(joined.entity.name.clone(), format!("{s}_{id_name}"), slots);
                plan.add_reference(parent_plan, node.nav.name.clone(), id);
                plan_nodes.insert(joined.node, id);
                order_keys.push(format!("{s}.{}", self.quote(&id_name)));
            }
        }

        let from = self.render_from(&source)?;
        let mut page = format!("SELECT {} FROM {from}", projection.page.join(", "));
        if let Some(where_sql) = self.where_clause(&source.scope) {
            page.push_str(" WHERE ");
            page.push_str(&where_sql);
        }
        let spec = self.spec;
        if spec.is_paged() {
            let mut terms = self.order_terms(&spec.order_by, &source.scope);
            let key = format!("{}.{}", source.root_alias, self.quote(&root_key));
            if !terms.contains(&key) {
                terms.push(key);
            }
            page.push_str(" ORDER BY ");
            page.push_str(&terms.join(", "));
            page.push_str(&self.limit_clause());
        }
        if !spec.group_by.is_empty() {
            crate::eager_debug!("emit", "group keys are ignored by entity queries with navigations");
        }

        let mut joins = String::new();
        for (id, node) in tree.nodes.iter().enumerate() {
            if !node.nav.is_collection() || !tree.in_page(id) {
                continue;
            }
            let (parent_plan, parent_key) = match node.parent {
                None => (Some(root_plan), Some(root_key.clone())),
                Some(parent) => (plan_nodes.get(&parent).copied(), keys.get(&parent).cloned()),
            };
            let (Some(parent_plan), Some(parent_key)) = (parent_plan, parent_key) else {
                continue;
            };

            let sub = self.collection(tree, id, parent_plan, &mut plan, "")?;
            let a = &sub.alias;
            joins.push_str(&format!(
                " LEFT JOIN ({}) AS {a} ON {a}.{} = {s}.{}",
                sub.sql(),
                self.quote(&sub.correlation),
                self.quote(&parent_key)
            ));
            for name in &sub.columns {
                projection.outer.push(format!(
                    "{a}.{} AS {}",
                    self.quote(name),
                    self.quote(&format!("{a}_{name}"))
                ));
            }
            for (path, name, kind) in &sub.scope {
                outer.insert(path.clone(), format!("{a}.{}", self.quote(name)), *kind);
            }
            order_keys.extend(sub.ids.iter().map(|name| format!("{a}.{}", self.quote(name))));
        }

        let mut terms = self.order_terms(&spec.order_by, &outer);
        for key in order_keys {
            if !terms.contains(&key) {
                terms.push(key);
            }
        }

        let sql = format!(
            "{}{} FROM ({page}) AS {s}{joins} ORDER BY {}{}",
            self.select_keyword(),
            projection.outer.join(", "),
            terms.join(", "),
            self.hints.trailing
        );

        Ok(CompiledQuery {
            sql,
            params: self.params,
            plan,
            shape: QueryShape::Graph,
        })
    }
}
