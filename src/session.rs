use std::fmt;
use std::sync::Arc;

use eagerload_core::engine::{ChangeTrackingHook, Row, SqlEngine};
use eagerload_core::materialize::Entity;
use eagerload_core::{CompiledQuery, Dialect, EagerError, EmitOptions, MetadataRegistry, Parameters, QuerySpec, Result};

use crate::query::Query;

/// Defaults applied to every query of a [`Session`] unless the query
/// overrides them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOptions {
    /// Hand fresh roots to the change-tracking hook.
    pub tracking: bool,
    /// Return sensitive columns masked.
    pub masking: bool,
    /// Upper bound on rows per batch write statement.
    pub batch_size: usize,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            tracking: true,
            masking: true,
            batch_size: 500,
        }
    }
}

impl SessionOptions {
    pub fn tracking(mut self, enabled: bool) -> Self {
        self.tracking = enabled;
        self
    }

    pub fn masking(mut self, enabled: bool) -> Self {
        self.masking = enabled;
        self
    }

    pub fn batch_size(mut self, rows: usize) -> Self {
        self.batch_size = rows.max(1);
        self
    }
}

/// Entry point: an engine, the entity metadata it is queried with, and an
/// optional change-tracking hook.
///
/// The registry is shared; a session is not.
pub struct Session<E> {
    engine: E,
    registry: Arc<MetadataRegistry>,
    tracker: Option<Box<dyn ChangeTrackingHook>>,
    options: SessionOptions,
}

impl<E: fmt::Debug> fmt::Debug for Session<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("engine", &self.engine)
            .field("entities", &self.registry.len())
            .field("tracker", &self.tracker.is_some())
            .field("options", &self.options)
            .finish()
    }
}

impl<E: SqlEngine> Session<E> {
    pub fn new(engine: E, registry: Arc<MetadataRegistry>) -> Self {
        Self {
            engine,
            registry,
            tracker: None,
            options: SessionOptions::default(),
        }
    }

    pub fn with_options(mut self, options: SessionOptions) -> Self {
        self.options = options;
        self
    }

    /// Installs the hook that receives every freshly materialized root of a
    /// tracking query.
    pub fn with_tracker(mut self, tracker: impl ChangeTrackingHook + 'static) -> Self {
        self.tracker = Some(Box::new(tracker));
        self
    }

    /// Starts a query over `entity`.
    pub fn query(&self, entity: &str) -> Query<'_, E> {
        Query::new(self, QuerySpec::new(entity))
    }

    /// Wraps an already built specification.
    pub fn query_spec(&self, spec: QuerySpec) -> Query<'_, E> {
        Query::new(self, spec)
    }

    #[inline]
    pub fn engine(&self) -> &E {
        &self.engine
    }

    #[inline]
    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    #[inline]
    pub fn registry(&self) -> &Arc<MetadataRegistry> {
        &self.registry
    }

    #[inline]
    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    #[inline]
    pub fn dialect(&self) -> Dialect {
        self.engine.dialect()
    }

    pub fn into_engine(self) -> E {
        self.engine
    }

    pub(crate) fn emit_options(&self) -> EmitOptions {
        EmitOptions::new(self.dialect()).masking(self.options.masking)
    }

    pub(crate) fn compile(&self, spec: &QuerySpec) -> Result<CompiledQuery> {
        eagerload_core::compile(spec, self.registry.as_ref(), self.emit_options())
    }

    pub(crate) fn compile_count(&self, spec: &QuerySpec) -> Result<CompiledQuery> {
        eagerload_core::compile_count(spec, self.registry.as_ref(), self.emit_options())
    }

    /// Runs a row-returning statement.
    pub(crate) fn fetch(&self, sql: &str, params: &Parameters) -> Result<Vec<Row>> {
        eagerload_core::eager_trace_query!(sql, params.len());
        self.engine.query(sql, params).map_err(|err| EagerError::Execution {
            message: err.message,
            sql: sql.to_string(),
        })
    }

    /// Runs a statement and returns the affected row count.
    pub(crate) fn run(&self, sql: &str, params: &Parameters) -> Result<u64> {
        eagerload_core::eager_trace_query!(sql, params.len());
        self.engine.execute(sql, params).map_err(|err| EagerError::Execution {
            message: err.message,
            sql: sql.to_string(),
        })
    }

    pub(crate) fn attach(&self, spec: &QuerySpec, roots: &[Arc<Entity>]) {
        if !spec.tracking.unwrap_or(self.options.tracking) {
            return;
        }
        if let Some(tracker) = &self.tracker {
            for root in roots {
                tracker.attach(root);
            }
        }
    }
}
