//! The accumulated, side-effect free description of one query.

use crate::error::{EagerError, Result};
use crate::expr::{Expr, IntoExpr, PropertyPath};
use crate::translate::Parameters;

/// How a filter combines with the filters before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Conjunction {
    #[default]
    And,
    Or,
}

impl Conjunction {
    pub const fn as_sql(&self) -> &'static str {
        match self {
            Conjunction::And => "AND",
            Conjunction::Or => "OR",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub expr: Expr,
    pub conjunction: Conjunction,
}

/// An eager-load request: a navigation path from the root plus the chain of
/// then-includes requested after it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncludePath {
    pub path: PropertyPath,
    pub then_includes: Vec<String>,
}

impl IncludePath {
    pub fn new(path: impl Into<PropertyPath>) -> Self {
        Self {
            path: path.into(),
            then_includes: Vec::new(),
        }
    }

    /// The full navigation path, then-includes appended.
    pub fn full_path(&self) -> PropertyPath {
        self.then_includes
            .iter()
            .fold(self.path.clone(), |path, next| path.join(&PropertyPath::parse(next)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

impl Direction {
    pub const fn as_sql(&self) -> &'static str {
        match self {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderSpec {
    pub selector: Expr,
    pub direction: Direction,
}

/// One projected value of a `select`.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub expr: Expr,
    pub alias: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    Left,
}

impl JoinKind {
    pub const fn as_sql(&self) -> &'static str {
        match self {
            JoinKind::Inner => "INNER JOIN",
            JoinKind::Left => "LEFT JOIN",
        }
    }
}

/// An explicit join. Columns of a joined entity are addressed as
/// `<alias>.<Property>`.
#[derive(Debug, Clone, PartialEq)]
pub enum JoinClause {
    Entity {
        kind: JoinKind,
        entity: String,
        alias: String,
        on: Expr,
    },
    /// Appended verbatim after the root table.
    Raw(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexHintKind {
    Use,
    Force,
    Ignore,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexHint {
    pub kind: IndexHintKind,
    pub index: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    Update,
    Share,
}

/// Textual hints embedded into the statement. Enforcement is up to the engine.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryHints {
    pub timeout_ms: Option<u64>,
    pub index: Option<IndexHint>,
    pub lock: Option<LockMode>,
    pub no_cache: bool,
    pub optimizer: Vec<String>,
}

impl QueryHints {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn timeout(mut self, millis: u64) -> Self {
        self.timeout_ms = Some(millis);
        self
    }

    pub fn index(mut self, kind: IndexHintKind, index: impl Into<String>) -> Self {
        self.index = Some(IndexHint {
            kind,
            index: index.into(),
        });
        self
    }

    pub fn lock(mut self, mode: LockMode) -> Self {
        self.lock = Some(mode);
        self
    }

    pub fn no_cache(mut self) -> Self {
        self.no_cache = true;
        self
    }

    pub fn optimizer(mut self, hint: impl Into<String>) -> Self {
        self.optimizer.push(hint.into());
        self
    }

    /// Fields set in `other` win.
    pub fn merge(&mut self, other: QueryHints) {
        if other.timeout_ms.is_some() {
            self.timeout_ms = other.timeout_ms;
        }
        if other.index.is_some() {
            self.index = other.index;
        }
        if other.lock.is_some() {
            self.lock = other.lock;
        }
        self.no_cache |= other.no_cache;
        self.optimizer.extend(other.optimizer);
    }
}

/// A verbatim statement replacing generation.
#[derive(Debug, Clone, PartialEq)]
pub struct RawSql {
    pub sql: String,
    pub params: Parameters,
}

/// Builder calls for one query over `entity`.
///
/// Pure data: nothing here touches metadata or the engine. Misuse that can
/// only be detected in sequence (a `then_include` with no `include` before it)
/// is recorded and reported by [`QuerySpec::validate`].
///
/// ```
/// use eagerload_core::expr::col;
/// use eagerload_core::QuerySpec;
///
/// let spec = QuerySpec::new("Order")
///     .where_(col("Status").eq("OPEN"))
///     .include("Customer")
///     .include("Lines")
///     .then_include("Product")
///     .order_by(col("Id"))
///     .take(10);
/// assert_eq!(spec.includes[1].full_path().to_string(), "Lines.Product");
/// assert!(spec.validate().is_ok());
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuerySpec {
    pub entity: String,
    pub filters: Vec<Filter>,
    pub includes: Vec<IncludePath>,
    pub order_by: Vec<OrderSpec>,
    pub skip: Option<u64>,
    pub take: Option<u64>,
    pub raw_sql: Option<RawSql>,
    /// `None` defers to the session default.
    pub tracking: Option<bool>,
    /// `None` defers to the session default.
    pub masking: Option<bool>,
    pub projection: Vec<Selection>,
    pub group_by: Vec<Expr>,
    pub joins: Vec<JoinClause>,
    pub hints: QueryHints,
    usage_error: Option<String>,
}

impl QuerySpec {
    pub fn new(entity: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            ..Self::default()
        }
    }

    /// Fails with the first recorded misuse.
    pub fn validate(&self) -> Result<()> {
        match &self.usage_error {
            Some(message) => Err(EagerError::InvalidUsage(message.clone())),
            None => Ok(()),
        }
    }

    fn misuse(&mut self, message: String) {
        self.usage_error.get_or_insert(message);
    }

    pub fn where_(mut self, predicate: impl IntoExpr) -> Self {
        self.filters.push(Filter {
            expr: predicate.into_expr(),
            conjunction: Conjunction::And,
        });
        self
    }

    pub fn or_where(mut self, predicate: impl IntoExpr) -> Self {
        self.filters.push(Filter {
            expr: predicate.into_expr(),
            conjunction: Conjunction::Or,
        });
        self
    }

    pub fn include(mut self, path: &str) -> Self {
        let path = PropertyPath::parse(path);
        if path.is_empty() {
            self.misuse("include() needs a navigation path".to_string());
        } else {
            self.includes.push(IncludePath::new(path));
        }
        self
    }

    /// Extends the most recent include by one more navigation.
    pub fn then_include(mut self, navigation: &str) -> Self {
        match self.includes.last_mut() {
            Some(include) if !navigation.trim().is_empty() => {
                include.then_includes.push(navigation.trim().to_string());
            }
            Some(_) => self.misuse("then_include() needs a navigation name".to_string()),
            None => self.misuse(format!(
                "then_include(\"{navigation}\") must follow an include()"
            )),
        }
        self
    }

    /// Replaces any previous ordering.
    pub fn order_by(mut self, selector: impl IntoExpr) -> Self {
        self.order_by.clear();
        self.then_order_by(selector)
    }

    pub fn order_by_desc(mut self, selector: impl IntoExpr) -> Self {
        self.order_by.clear();
        self.then_order_by_desc(selector)
    }

    pub fn then_order_by(mut self, selector: impl IntoExpr) -> Self {
        self.order_by.push(OrderSpec {
            selector: selector.into_expr(),
            direction: Direction::Asc,
        });
        self
    }

    pub fn then_order_by_desc(mut self, selector: impl IntoExpr) -> Self {
        self.order_by.push(OrderSpec {
            selector: selector.into_expr(),
            direction: Direction::Desc,
        });
        self
    }

    pub fn skip(mut self, count: u64) -> Self {
        self.skip = Some(count);
        self
    }

    pub fn take(mut self, count: u64) -> Self {
        self.take = Some(count);
        self
    }

    /// Projects the given expressions; properties are labelled by their path.
    pub fn select<I, E>(mut self, selectors: I) -> Self
    where
        I: IntoIterator<Item = E>,
        E: IntoExpr,
    {
        for expr in selectors {
            let expr = expr.into_expr();
            let alias = match &expr {
                Expr::Property(path) => path.to_string(),
                _ => format!("expr{}", self.projection.len()),
            };
            self.projection.push(Selection { expr, alias });
        }
        self
    }

    pub fn select_as(mut self, expr: impl IntoExpr, alias: impl Into<String>) -> Self {
        self.projection.push(Selection {
            expr: expr.into_expr(),
            alias: alias.into(),
        });
        self
    }

    pub fn group_by(mut self, key: impl IntoExpr) -> Self {
        self.group_by.push(key.into_expr());
        self
    }

    pub fn join(
        mut self,
        kind: JoinKind,
        entity: impl Into<String>,
        alias: impl Into<String>,
        on: impl IntoExpr,
    ) -> Self {
        self.joins.push(JoinClause::Entity {
            kind,
            entity: entity.into(),
            alias: alias.into(),
            on: on.into_expr(),
        });
        self
    }

    pub fn join_raw(mut self, sql: impl Into<String>) -> Self {
        self.joins.push(JoinClause::Raw(sql.into()));
        self
    }

    /// Runs `sql` verbatim; rows are read as flat roots.
    pub fn from_sql_raw(mut self, sql: impl Into<String>, params: Parameters) -> Self {
        self.raw_sql = Some(RawSql {
            sql: sql.into(),
            params,
        });
        self
    }

    pub fn as_no_tracking(mut self) -> Self {
        self.tracking = Some(false);
        self
    }

    pub fn as_tracking(mut self) -> Self {
        self.tracking = Some(true);
        self
    }

    /// Returns sensitive columns unmasked.
    pub fn disable_sensitive(mut self) -> Self {
        self.masking = Some(false);
        self
    }

    pub fn with_hints(mut self, hints: QueryHints) -> Self {
        self.hints.merge(hints);
        self
    }

    pub fn timeout(mut self, millis: u64) -> Self {
        self.hints.timeout_ms = Some(millis);
        self
    }

    pub fn use_index(self, index: impl Into<String>) -> Self {
        self.index_hint(IndexHintKind::Use, index.into())
    }

    pub fn force_index(self, index: impl Into<String>) -> Self {
        self.index_hint(IndexHintKind::Force, index.into())
    }

    pub fn ignore_index(self, index: impl Into<String>) -> Self {
        self.index_hint(IndexHintKind::Ignore, index.into())
    }

    fn index_hint(mut self, kind: IndexHintKind, index: String) -> Self {
        self.hints.index = Some(IndexHint { kind, index });
        self
    }

    pub fn with_lock(mut self, mode: LockMode) -> Self {
        self.hints.lock = Some(mode);
        self
    }

    pub fn no_cache(mut self) -> Self {
        self.hints.no_cache = true;
        self
    }

    pub fn optimizer_hint(mut self, hint: impl Into<String>) -> Self {
        self.hints.optimizer.push(hint.into());
        self
    }

    /// Whether any include was requested.
    pub fn has_includes(&self) -> bool {
        !self.includes.is_empty()
    }

    pub fn is_paged(&self) -> bool {
        self.skip.is_some() || self.take.is_some()
    }

    pub fn is_projection(&self) -> bool {
        !self.projection.is_empty()
    }

    /// Aliases introduced by explicit entity joins.
    pub fn join_aliases(&self) -> impl Iterator<Item = &str> {
        self.joins.iter().filter_map(|j| match j {
            JoinClause::Entity { alias, .. } => Some(alias.as_str()),
            JoinClause::Raw(_) => None,
        })
    }
}
