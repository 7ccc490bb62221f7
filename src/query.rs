use std::sync::Arc;

use eagerload_core::engine::{Row, SqlEngine};
use eagerload_core::expr::IntoExpr;
use eagerload_core::materialize::{Entity, ResultMaterializer};
use eagerload_core::spec::JoinKind;
use eagerload_core::{
    CompiledQuery, EagerError, LockMode, Parameters, QueryHints, QueryShape, QuerySpec, Result, Value,
};

use crate::session::Session;

/// Forwards builder calls to the wrapped [`QuerySpec`].
macro_rules! forward {
    ($($(#[$doc:meta])* fn $name:ident($($arg:ident: $ty:ty),*);)*) => { $(
        $(#[$doc])*
        pub fn $name(mut self, $($arg: $ty),*) -> Self {
            self.spec = self.spec.$name($($arg),*);
            self
        }
    )* }
}

/// A query bound to a [`Session`].
///
/// Builder calls accumulate into a [`QuerySpec`]; a terminal operation
/// compiles it to one statement, runs it and consumes the query.
#[derive(Debug)]
pub struct Query<'s, E> {
    session: &'s Session<E>,
    spec: QuerySpec,
}

impl<'s, E: SqlEngine> Query<'s, E> {
    pub(crate) fn new(session: &'s Session<E>, spec: QuerySpec) -> Self {
        Self { session, spec }
    }

    #[inline]
    pub fn spec(&self) -> &QuerySpec {
        &self.spec
    }

    pub fn into_spec(self) -> QuerySpec {
        self.spec
    }

    forward! {
        fn where_(predicate: impl IntoExpr);
        fn or_where(predicate: impl IntoExpr);
        fn include(path: &str);
        /// Must follow an [`include`](Self::include); misuse fails at execution.
        fn then_include(navigation: &str);
        fn order_by(selector: impl IntoExpr);
        fn order_by_desc(selector: impl IntoExpr);
        fn then_order_by(selector: impl IntoExpr);
        fn then_order_by_desc(selector: impl IntoExpr);
        fn skip(count: u64);
        fn take(count: u64);
        fn select_as(expr: impl IntoExpr, alias: impl Into<String>);
        fn group_by(key: impl IntoExpr);
        fn join(kind: JoinKind, entity: impl Into<String>, alias: impl Into<String>, on: impl IntoExpr);
        fn join_raw(sql: impl Into<String>);
        fn from_sql_raw(sql: impl Into<String>, params: Parameters);
        fn as_no_tracking();
        fn as_tracking();
        fn disable_sensitive();
        fn with_hints(hints: QueryHints);
        fn timeout(millis: u64);
        fn use_index(index: impl Into<String>);
        fn force_index(index: impl Into<String>);
        fn ignore_index(index: impl Into<String>);
        fn with_lock(mode: LockMode);
        fn no_cache();
        fn optimizer_hint(hint: impl Into<String>);
    }

    pub fn select<I, X>(mut self, selectors: I) -> Self
    where
        I: IntoIterator<Item = X>,
        X: IntoExpr,
    {
        self.spec = self.spec.select(selectors);
        self
    }

    /// The statement a terminal operation would run.
    pub fn to_sql(&self) -> Result<String> {
        Ok(self.session.compile(&self.spec)?.sql)
    }

    /// The statement, its parameters and the plan its rows are read with.
    pub fn compiled(&self) -> Result<CompiledQuery> {
        self.session.compile(&self.spec)
    }

    /// Materializes every root with its included navigations.
    pub fn to_list(self) -> Result<Vec<Arc<Entity>>> {
        eagerload_core::eager_profile_scope!("query", "to_list");
        let compiled = self.session.compile(&self.spec)?;
        if compiled.shape == QueryShape::Projection {
            return Err(EagerError::InvalidUsage(
                "projections return rows; use to_rows()".to_string(),
            ));
        }
        let rows = self.session.fetch(&compiled.sql, &compiled.params)?;
        let roots = ResultMaterializer::materialize(&compiled.plan, &rows);
        self.session.attach(&self.spec, &roots);
        Ok(roots)
    }

    /// Runs the statement and returns its rows unmaterialized.
    pub fn to_rows(self) -> Result<Vec<Row>> {
        let compiled = self.session.compile(&self.spec)?;
        self.session.fetch(&compiled.sql, &compiled.params)
    }

    /// The first root, failing with [`EagerError::NoResult`] when there is none.
    pub fn first(self) -> Result<Arc<Entity>> {
        self.first_or_default()?.ok_or(EagerError::NoResult)
    }

    pub fn first_or_default(mut self) -> Result<Option<Arc<Entity>>> {
        let take = self.spec.take.map_or(1, |take| take.min(1));
        self.spec = self.spec.take(take);
        Ok(self.to_list()?.into_iter().next())
    }

    /// The only root; zero or several roots are errors.
    pub fn single(self) -> Result<Arc<Entity>> {
        self.single_or_default()?.ok_or(EagerError::NoResult)
    }

    /// Like [`single`](Self::single) but `None` on zero roots.
    pub fn single_or_default(self) -> Result<Option<Arc<Entity>>> {
        let mut roots = self.to_list()?;
        match roots.len() {
            0 | 1 => Ok(roots.pop()),
            n => Err(EagerError::MultipleResults(n)),
        }
    }

    /// Number of roots (or projected rows).
    ///
    /// Plain filtered queries count with one aggregate statement; anything
    /// that pages, includes, projects or runs raw SQL counts what it returns.
    pub fn count(self) -> Result<u64> {
        let spec = &self.spec;
        if spec.is_projection() {
            return Ok(self.to_rows()?.len() as u64);
        }
        if spec.has_includes() || spec.is_paged() || spec.raw_sql.is_some() {
            return Ok(self.to_list()?.len() as u64);
        }

        let compiled = self.session.compile_count(spec)?;
        let rows = self.session.fetch(&compiled.sql, &compiled.params)?;
        let count = rows
            .first()
            .and_then(|row| row.get_index(0))
            .and_then(Value::as_i64)
            .ok_or_else(|| EagerError::Conversion("COUNT(*) returned no integer".to_string()))?;
        Ok(u64::try_from(count).unwrap_or_default())
    }

    pub fn any(self) -> Result<bool> {
        Ok(self.count()? > 0)
    }

    /// Whether every root satisfies `predicate`; true for an empty result.
    pub fn all(self, predicate: impl Fn(&Entity) -> bool) -> Result<bool> {
        Ok(self.to_list()?.iter().all(|root| predicate(root)))
    }

    /// Sum of a numeric property; NULLs are skipped and an empty result sums to 0.
    pub fn sum(self, property: &str) -> Result<f64> {
        let mut total = 0.0;
        for value in self.values_of(property)? {
            total += numeric(property, &value)?;
        }
        Ok(total)
    }

    /// Mean of the non-NULL values, `None` when there are none.
    pub fn average(self, property: &str) -> Result<Option<f64>> {
        let values = self.values_of(property)?;
        if values.is_empty() {
            return Ok(None);
        }
        let mut total = 0.0;
        for value in &values {
            total += numeric(property, value)?;
        }
        Ok(Some(total / values.len() as f64))
    }

    pub fn min(self, property: &str) -> Result<Option<Value>> {
        self.extreme(property, std::cmp::Ordering::Less)
    }

    pub fn max(self, property: &str) -> Result<Option<Value>> {
        self.extreme(property, std::cmp::Ordering::Greater)
    }

    fn extreme(self, property: &str, wanted: std::cmp::Ordering) -> Result<Option<Value>> {
        let mut best: Option<Value> = None;
        for value in self.values_of(property)? {
            match &best {
                None => best = Some(value),
                Some(current) => match value.partial_cmp(current) {
                    Some(ordering) if ordering == wanted => best = Some(value),
                    Some(_) => {}
                    None => {
                        return Err(EagerError::Conversion(format!(
                            "{property}: cannot compare {value} with {current}"
                        )));
                    }
                },
            }
        }
        Ok(best)
    }

    /// Non-NULL values of `property` across the result: a root property, or a
    /// projected column for projections.
    fn values_of(self, property: &str) -> Result<Vec<Value>> {
        let values: Vec<Value> = if self.spec.is_projection() {
            self.to_rows()?
                .iter()
                .filter_map(|row| row.get(property).cloned())
                .collect()
        } else {
            self.to_list()?
                .iter()
                .filter_map(|root| root.get(property).cloned())
                .collect()
        };
        Ok(values.into_iter().filter(|v| !v.is_null()).collect())
    }
}

fn numeric(property: &str, value: &Value) -> Result<f64> {
    value
        .as_f64()
        .ok_or_else(|| EagerError::Conversion(format!("{property} is not numeric: {value}")))
}
