//! SQL emission: one statement per [`QuerySpec`].
//!
//! Queries without navigation access compile to a flat `SELECT`. Anything
//! that includes or filters through navigations compiles to a graph statement:
//!
//! - a page subquery `s` holding the (possibly limited) root rows with their
//!   reference navigations joined in,
//! - one derived table per top-level collection, LEFT JOINed on its foreign key,
//! - an outer ORDER BY that groups the rows of each root together.
//!
//! Every statement comes with the [`MaterializePlan`] that turns its rows back
//! into an object graph.

mod collection;
mod hints;
mod page;

use std::sync::Arc;

use eagerload_types::Dialect;

use crate::error::Result;
use crate::expr::{Expr, PropertyPath};
use crate::materialize::MaterializePlan;
use crate::metadata::{ColumnDescriptor, EntityDescriptor, FkSide, MetadataProvider};
use crate::navigation::{AliasAllocator, NavigationResolver, ResolvedNavigation};
use crate::spec::{Conjunction, Direction, JoinClause, OrderSpec, QuerySpec};
use crate::translate::{column_of, ColumnScope, Parameters, PredicateTranslator};

use hints::RenderedHints;

/// Alias of the page subquery in graph statements.
pub const PAGE_ALIAS: &str = "s";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmitOptions {
    pub dialect: Dialect,
    /// Wrap masked columns in their masking expression.
    pub masking: bool,
}

impl EmitOptions {
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            masking: true,
        }
    }

    pub fn masking(mut self, enabled: bool) -> Self {
        self.masking = enabled;
        self
    }
}

/// How the rows of a [`CompiledQuery`] are read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryShape {
    /// Root columns only, read by column name.
    Flat,
    /// Page subquery plus collection derived tables.
    Graph,
    /// Caller-supplied SQL, read like [`QueryShape::Flat`].
    Raw,
    /// Scalar rows; the plan is empty.
    Projection,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompiledQuery {
    pub sql: String,
    pub params: Parameters,
    pub plan: MaterializePlan,
    pub shape: QueryShape,
}

/// Compiles `spec` into a single statement.
///
/// ```
/// use eagerload_core::emit::{compile, EmitOptions};
/// use eagerload_core::metadata::{EntityDescriptor, MetadataRegistry};
/// use eagerload_core::{col, Dialect, QuerySpec, ScalarKind};
///
/// let registry = MetadataRegistry::new();
/// registry.register(
///     EntityDescriptor::builder("Order")
///         .table("orders")
///         .key("Id", ScalarKind::Integer)
///         .field("Status", ScalarKind::Text)
///         .build()
///         .unwrap(),
/// );
///
/// let spec = QuerySpec::new("Order").where_(col("Status").eq("OPEN")).take(10);
/// let compiled = compile(&spec, &registry, EmitOptions::new(Dialect::SQLite)).unwrap();
/// assert_eq!(
///     compiled.sql,
///     r#"SELECT o0."Id" AS "Id", o0."Status" AS "Status" FROM "orders" AS o0 WHERE o0."Status" = 'OPEN' LIMIT 10"#
/// );
/// ```
pub fn compile(spec: &QuerySpec, provider: &dyn MetadataProvider, options: EmitOptions) -> Result<CompiledQuery> {
    SqlEmitter::new(spec, provider, options).compile()
}

/// Compiles a `COUNT(*)` over the rows `spec` filters.
pub fn compile_count(
    spec: &QuerySpec,
    provider: &dyn MetadataProvider,
    options: EmitOptions,
) -> Result<CompiledQuery> {
    SqlEmitter::new(spec, provider, options).compile_count()
}

/// Which role put a navigation into the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Include,
    Filter,
    Touch,
}

#[derive(Debug, Clone)]
struct NavNode {
    path: PropertyPath,
    nav: Arc<ResolvedNavigation>,
    parent: Option<usize>,
    children: Vec<usize>,
    /// Materialized into the graph.
    included: bool,
    /// Read by a filter; joined INNER.
    filtered: bool,
}

/// Navigation paths used by a query, merged by prefix. Node order is first-use
/// order, so parents precede their children.
#[derive(Debug, Clone, Default)]
struct NavTree {
    nodes: Vec<NavNode>,
    roots: Vec<usize>,
}

impl NavTree {
    fn position(&self, path: &PropertyPath) -> Option<usize> {
        self.nodes.iter().position(|n| n.path == *path)
    }

    fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Whether `node` is reached from the root through references only.
    fn in_page(&self, node: usize) -> bool {
        let mut current = self.nodes[node].parent;
        while let Some(id) = current {
            if self.nodes[id].nav.is_collection() {
                return false;
            }
            current = self.nodes[id].parent;
        }
        true
    }
}

/// A reference navigation joined into a FROM clause.
#[derive(Debug, Clone)]
struct JoinedReference {
    node: usize,
    alias: String,
    entity: Arc<EntityDescriptor>,
}

/// Root table, explicit joins and reference joins of one statement level.
struct Source {
    root: Arc<EntityDescriptor>,
    root_alias: String,
    scope: ColumnScope,
    /// Reference joins, rendered.
    reference_joins: String,
    references: Vec<JoinedReference>,
}

pub struct SqlEmitter<'a> {
    spec: &'a QuerySpec,
    provider: &'a dyn MetadataProvider,
    dialect: Dialect,
    masking: bool,
    aliases: AliasAllocator,
    params: Parameters,
    hints: RenderedHints,
}

impl<'a> SqlEmitter<'a> {
    pub fn new(spec: &'a QuerySpec, provider: &'a dyn MetadataProvider, options: EmitOptions) -> Self {
        let mut aliases = AliasAllocator::new();
        for alias in spec.join_aliases() {
            aliases.reserve(alias);
        }
        aliases.reserve(PAGE_ALIAS);
        Self {
            spec,
            provider,
            dialect: options.dialect,
            masking: options.masking && spec.masking.unwrap_or(true),
            aliases,
            params: Parameters::new(),
            hints: hints::render(&spec.hints, options.dialect),
        }
    }

    pub fn compile(self) -> Result<CompiledQuery> {
        crate::eager_profile_scope!("emit", "compile");
        self.spec.validate()?;

        if let Some(raw) = &self.spec.raw_sql {
            let root = self.provider.require(&self.spec.entity)?;
            return Ok(CompiledQuery {
                sql: raw.sql.clone(),
                params: raw.params.clone(),
                plan: MaterializePlan::flat(&root, |column| column.to_string()),
                shape: QueryShape::Raw,
            });
        }

        let root = self.provider.require(&self.spec.entity)?;
        if self.spec.is_projection() {
            if self.spec.has_includes() {
                crate::eager_debug!("emit", "includes are ignored by projections");
            }
            return self.projection(root);
        }

        let tree = self.navigation_tree(true);
        if tree.is_empty() {
            self.flat(root)
        } else {
            self.graph(root, &tree)
        }
    }

    pub fn compile_count(mut self) -> Result<CompiledQuery> {
        self.spec.validate()?;
        let q = |ident: &str| self.dialect.quote_ident(ident);

        if let Some(raw) = &self.spec.raw_sql {
            return Ok(CompiledQuery {
                sql: format!("SELECT COUNT(*) AS {} FROM ({}) AS {PAGE_ALIAS}", q("count"), raw.sql),
                params: raw.params.clone(),
                plan: MaterializePlan::new(),
                shape: QueryShape::Projection,
            });
        }

        let root = self.provider.require(&self.spec.entity)?;
        let tree = self.navigation_tree(false);
        let source = self.source(root, &tree)?;
        let from = self.render_from(&source)?;
        let mut sql = format!("SELECT COUNT(*) AS {} FROM {from}", self.dialect.quote_ident("count"));
        if let Some(where_sql) = self.where_clause(&source.scope) {
            sql.push_str(" WHERE ");
            sql.push_str(&where_sql);
        }
        Ok(CompiledQuery {
            sql,
            params: self.params,
            plan: MaterializePlan::new(),
            shape: QueryShape::Projection,
        })
    }

    fn translator(&mut self) -> PredicateTranslator<'_> {
        PredicateTranslator::new(self.provider, self.dialect, &mut self.params, &mut self.aliases)
    }

    /// Translates an optional predicate. On failure the parameters it bound
    /// are released so the statement's placeholders stay contiguous.
    fn lenient_predicate(&mut self, expr: &Expr, scope: &ColumnScope) -> Result<String> {
        let mark = self.params.len();
        let sql = self.translator().predicate(expr, scope);
        if sql.is_err() {
            self.params.truncate(mark);
        }
        sql
    }

    /// Value counterpart of [`Self::lenient_predicate`].
    fn lenient_value(&mut self, expr: &Expr, scope: &ColumnScope) -> Result<String> {
        let mark = self.params.len();
        let sql = self.translator().value(expr, scope);
        if sql.is_err() {
            self.params.truncate(mark);
        }
        sql
    }

    fn quote(&self, ident: &str) -> String {
        self.dialect.quote_ident(ident)
    }

    /// Collects navigation paths from includes (when `includes` is set),
    /// filters, order-bys, and for projections the selected and grouped
    /// expressions. Paths that fail to resolve are skipped with a warning.
    fn navigation_tree(&self, includes: bool) -> NavTree {
        let spec = self.spec;
        let mut tree = NavTree::default();

        if includes {
            for include in &spec.includes {
                self.insert_path(&mut tree, &include.full_path(), Mark::Include);
            }
        }

        let join_aliases: Vec<&str> = spec.join_aliases().collect();
        let explicit = |path: &PropertyPath| {
            path.segments()
                .first()
                .is_some_and(|s| join_aliases.contains(&s.as_str()))
        };

        for filter in &spec.filters {
            for path in filter.expr.navigation_paths() {
                if !explicit(&path) {
                    self.insert_path(&mut tree, &path, Mark::Filter);
                }
            }
        }

        let mut touched: Vec<&Expr> = spec.order_by.iter().map(|o| &o.selector).collect();
        if spec.is_projection() {
            touched.extend(spec.projection.iter().map(|s| &s.expr));
            touched.extend(spec.group_by.iter());
        }
        for expr in touched {
            for path in expr.navigation_paths() {
                if !explicit(&path) {
                    self.insert_path(&mut tree, &path, Mark::Touch);
                }
            }
        }
        tree
    }

    fn insert_path(&self, tree: &mut NavTree, path: &PropertyPath, mark: Mark) {
        let resolver = NavigationResolver::new(self.provider);
        let mut entity = self.spec.entity.clone();
        let mut parent: Option<usize> = None;

        for prefix in path.prefixes() {
            let id = match tree.position(&prefix) {
                Some(id) => id,
                None => {
                    let nav = match resolver.resolve_one(&entity, prefix.property()) {
                        Ok(nav) => nav,
                        Err(err) => {
                            crate::eager_warn!("resolve", "navigation `{path}` skipped: {err}");
                            return;
                        }
                    };
                    // only includes may widen the statement with collections
                    if nav.is_collection() && mark != Mark::Include {
                        return;
                    }
                    let id = tree.nodes.len();
                    tree.nodes.push(NavNode {
                        path: prefix.clone(),
                        nav,
                        parent,
                        children: Vec::new(),
                        included: false,
                        filtered: false,
                    });
                    match parent {
                        Some(p) => tree.nodes[p].children.push(id),
                        None => tree.roots.push(id),
                    }
                    id
                }
            };

            let node = &mut tree.nodes[id];
            if node.nav.is_collection() && mark != Mark::Include {
                return;
            }
            match mark {
                Mark::Include => node.included = true,
                Mark::Filter => node.filtered = true,
                Mark::Touch => {}
            }
            entity = node.nav.target.clone();
            parent = Some(id);
        }
    }

    /// Allocates aliases for the root and every page reference, builds the
    /// scope filters are translated in, and renders the reference joins.
    fn source(&mut self, root: Arc<EntityDescriptor>, tree: &NavTree) -> Result<Source> {
        let root_alias = self.aliases.root(&root.name);
        let mut scope = ColumnScope::for_entity(&root, &root_alias, self.dialect);

        for join in &self.spec.joins {
            if let JoinClause::Entity { entity, alias, .. } = join {
                let joined = self.provider.require(entity)?;
                scope.add_entity(Some(&PropertyPath::parse(alias)), &joined, alias, self.dialect);
            }
        }

        let mut source = Source {
            root: Arc::clone(&root),
            root_alias: root_alias.clone(),
            scope,
            reference_joins: String::new(),
            references: Vec::new(),
        };
        self.join_references(tree, &tree.roots, &root_alias, &root, true, 0, &mut source)?;
        Ok(source)
    }

    #[allow(clippy::too_many_arguments)]
    fn join_references(
        &mut self,
        tree: &NavTree,
        nodes: &[usize],
        parent_alias: &str,
        parent: &EntityDescriptor,
        parent_inner: bool,
        depth: usize,
        source: &mut Source,
    ) -> Result<()> {
        for &id in nodes {
            let node = &tree.nodes[id];
            if node.nav.is_collection() {
                continue;
            }
            let target = self.provider.require(&node.nav.target)?;
            let alias = self.aliases.table(node.path.property());
            let inner = node.filtered || (depth > 0 && node.nav.required && parent_inner);
            let on = self.join_condition(&node.nav, &alias, &target, parent_alias, parent)?;

            source.reference_joins.push_str(&format!(
                " {} {} AS {alias} ON {on}",
                if inner { "INNER JOIN" } else { "LEFT JOIN" },
                self.quote(&target.table)
            ));
            source.scope.add_entity(Some(&node.path), &target, &alias, self.dialect);
            source.references.push(JoinedReference {
                node: id,
                alias: alias.clone(),
                entity: Arc::clone(&target),
            });
            self.join_references(tree, &node.children, &alias, &target, inner, depth + 1, source)?;
        }
        Ok(())
    }

    /// `ON` condition linking `alias` (the navigation target) to its parent.
    fn join_condition(
        &self,
        nav: &ResolvedNavigation,
        alias: &str,
        target: &EntityDescriptor,
        parent_alias: &str,
        parent: &EntityDescriptor,
    ) -> Result<String> {
        let fk = &nav.foreign_key.property;
        Ok(match nav.foreign_key.side {
            FkSide::Source => format!(
                "{alias}.{} = {parent_alias}.{}",
                self.quote(&target.primary_key_column()?.column),
                self.quote(&column_of(parent, fk)?)
            ),
            FkSide::Target => format!(
                "{alias}.{} = {parent_alias}.{}",
                self.quote(&column_of(target, fk)?),
                self.quote(&parent.primary_key_column()?.column)
            ),
        })
    }

    /// Root table with its index hint, explicit joins, then reference joins.
    fn render_from(&mut self, source: &Source) -> Result<String> {
        let mut from = format!(
            "{} AS {}{}",
            self.quote(&source.root.table),
            source.root_alias,
            self.hints.table_suffix
        );
        let spec = self.spec;
        for join in &spec.joins {
            match join {
                JoinClause::Raw(raw) => {
                    from.push(' ');
                    from.push_str(raw);
                }
                JoinClause::Entity {
                    kind,
                    entity,
                    alias,
                    on,
                } => {
                    let joined = self.provider.require(entity)?;
                    let on = self.translator().predicate(on, &source.scope)?;
                    from.push_str(&format!(
                        " {} {} AS {alias} ON {on}",
                        kind.as_sql(),
                        self.quote(&joined.table)
                    ));
                }
            }
        }
        from.push_str(&source.reference_joins);
        Ok(from)
    }

    /// Combines the filters in declaration order. A filter that cannot be
    /// translated is replaced by `1=1` so the statement stays valid.
    fn where_clause(&mut self, scope: &ColumnScope) -> Option<String> {
        let spec = self.spec;
        let mut combined: Option<String> = None;
        let mut last: Option<Conjunction> = None;

        for filter in &spec.filters {
            let sql = match self.lenient_predicate(&filter.expr, scope) {
                Ok(sql) => sql,
                Err(err) => {
                    crate::eager_warn!("translate", "filter `{}` replaced by 1=1: {err}", filter.expr);
                    "1=1".to_string()
                }
            };
            combined = Some(match combined {
                None => sql,
                Some(acc) => {
                    let acc = match last {
                        Some(prev) if prev != filter.conjunction => format!("({acc})"),
                        _ => acc,
                    };
                    last = Some(filter.conjunction);
                    format!("{acc} {} {sql}", filter.conjunction.as_sql())
                }
            });
        }
        combined
    }

    /// `ORDER BY` terms for `orders` in `scope`; untranslatable keys are
    /// dropped with a warning.
    fn order_terms(&mut self, orders: &[OrderSpec], scope: &ColumnScope) -> Vec<String> {
        let mut terms = Vec::with_capacity(orders.len());
        for order in orders {
            match self.lenient_value(&order.selector, scope) {
                Ok(sql) => terms.push(order_term(sql, order.direction)),
                Err(err) => {
                    crate::eager_warn!("translate", "order key `{}` dropped: {err}", order.selector);
                }
            }
        }
        terms
    }

    fn limit_clause(&self) -> String {
        match (self.spec.take, self.spec.skip) {
            (Some(take), Some(skip)) => format!(" LIMIT {take} OFFSET {skip}"),
            (Some(take), None) => format!(" LIMIT {take}"),
            (None, Some(skip)) => match self.dialect {
                Dialect::SQLite => format!(" LIMIT -1 OFFSET {skip}"),
                Dialect::MySQL => format!(" LIMIT 18446744073709551615 OFFSET {skip}"),
                Dialect::PostgreSQL => format!(" OFFSET {skip}"),
            },
            (None, None) => String::new(),
        }
    }

    /// `alias."column"`, wrapped in the column's masking rule unless `raw`.
    fn project(&self, alias: &str, column: &ColumnDescriptor, raw: bool) -> String {
        let sql = format!("{alias}.{}", self.quote(&column.column));
        match &column.masking {
            Some(rule) if self.masking && !raw && !column.is_primary_key() => rule.to_sql(&sql, self.dialect),
            _ => sql,
        }
    }

    fn select_keyword(&self) -> String {
        format!("{}SELECT {}", self.hints.leading, self.hints.after_select)
    }

    fn flat(mut self, root: Arc<EntityDescriptor>) -> Result<CompiledQuery> {
        let source = self.source(Arc::clone(&root), &NavTree::default())?;
        let columns: Vec<String> = root
            .mapped_columns()
            .map(|c| format!("{} AS {}", self.project(&source.root_alias, c, false), self.quote(&c.column)))
            .collect();

        let from = self.render_from(&source)?;
        let mut sql = format!("{}{} FROM {from}", self.select_keyword(), columns.join(", "));
        self.push_tail(&mut sql, &source.scope);

        Ok(CompiledQuery {
            sql,
            params: self.params,
            plan: MaterializePlan::flat(&root, |column| column.to_string()),
            shape: QueryShape::Flat,
        })
    }

    fn projection(mut self, root: Arc<EntityDescriptor>) -> Result<CompiledQuery> {
        let tree = self.navigation_tree(false);
        let source = self.source(root, &tree)?;

        let spec = self.spec;
        let mut columns = Vec::with_capacity(spec.projection.len());
        for selection in &spec.projection {
            let sql = self.translator().value(&selection.expr, &source.scope)?;
            columns.push(format!("{sql} AS {}", self.quote(&selection.alias)));
        }

        let from = self.render_from(&source)?;
        let mut sql = format!("{}{} FROM {from}", self.select_keyword(), columns.join(", "));
        self.push_tail(&mut sql, &source.scope);

        Ok(CompiledQuery {
            sql,
            params: self.params,
            plan: MaterializePlan::new(),
            shape: QueryShape::Projection,
        })
    }

    /// WHERE, GROUP BY, ORDER BY, LIMIT and lock clauses of a single-level
    /// statement.
    fn push_tail(&mut self, sql: &mut String, scope: &ColumnScope) {
        if let Some(where_sql) = self.where_clause(scope) {
            sql.push_str(" WHERE ");
            sql.push_str(&where_sql);
        }

        let spec = self.spec;
        let mut groups = Vec::with_capacity(spec.group_by.len());
        for key in &spec.group_by {
            match self.lenient_value(key, scope) {
                Ok(group) => groups.push(group),
                Err(err) => {
                    crate::eager_warn!("translate", "group key `{key}` dropped: {err}");
                }
            }
        }
        if !groups.is_empty() {
            sql.push_str(" GROUP BY ");
            sql.push_str(&groups.join(", "));
        }

        let orders = self.order_terms(&spec.order_by, scope);
        if !orders.is_empty() {
            sql.push_str(" ORDER BY ");
            sql.push_str(&orders.join(", "));
        }
        sql.push_str(&self.limit_clause());
        sql.push_str(&self.hints.trailing);
    }
}

fn order_term(sql: String, direction: Direction) -> String {
    match direction {
        Direction::Asc => sql,
        Direction::Desc => format!("{sql} DESC"),
    }
}

#[cfg(test)]
mod tests;
