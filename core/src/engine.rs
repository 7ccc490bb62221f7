//! Collaborator traits: the SQL engine and the change-tracking hook.

use std::sync::Arc;

use eagerload_types::{Dialect, Value};
use hashbrown::HashMap;
use thiserror::Error;

use crate::materialize::Entity;
use crate::translate::Parameters;

/// Column names of a result set, shared by all of its rows.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Columns {
    names: Vec<String>,
    index: HashMap<String, usize>,
}

impl Columns {
    /// On duplicate names the first occurrence wins.
    pub fn new(names: Vec<String>) -> Self {
        let mut index = HashMap::with_capacity(names.len());
        for (i, name) in names.iter().enumerate() {
            index.entry(name.clone()).or_insert(i);
        }
        Self { names, index }
    }

    #[inline]
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    #[inline]
    pub fn names(&self) -> &[String] {
        &self.names
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// One result row: an ordered name to value mapping.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Arc<Columns>,
    values: Vec<Value>,
}

impl Row {
    pub fn new(columns: Arc<Columns>, values: Vec<Value>) -> Self {
        Self { columns, values }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.columns
            .index_of(name)
            .and_then(|i| self.values.get(i))
    }

    #[inline]
    pub fn get_index(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    #[inline]
    pub fn columns(&self) -> &Arc<Columns> {
        &self.columns
    }

    #[inline]
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns
            .names()
            .iter()
            .map(String::as_str)
            .zip(self.values.iter())
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }
}

/// Failure reported by an engine, without the statement (the caller adds it).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct EngineError {
    pub message: String,
}

impl EngineError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Executes verbatim SQL with bound parameters.
///
/// Parameters arrive in placeholder order and carry the names used in the
/// statement, so both named and positional binding work.
pub trait SqlEngine {
    fn dialect(&self) -> Dialect;

    fn query(&self, sql: &str, params: &Parameters) -> Result<Vec<Row>, EngineError>;

    /// Returns the number of affected rows.
    fn execute(&self, sql: &str, params: &Parameters) -> Result<u64, EngineError>;
}

impl<E: SqlEngine + ?Sized> SqlEngine for &E {
    fn dialect(&self) -> Dialect {
        (**self).dialect()
    }

    fn query(&self, sql: &str, params: &Parameters) -> Result<Vec<Row>, EngineError> {
        (**self).query(sql, params)
    }

    fn execute(&self, sql: &str, params: &Parameters) -> Result<u64, EngineError> {
        (**self).execute(sql, params)
    }
}

/// Attaches tracking (or lazy-loading) behaviour to freshly materialized roots.
pub trait ChangeTrackingHook: Send + Sync {
    fn attach(&self, root: &Arc<Entity>);
}

impl<F> ChangeTrackingHook for F
where
    F: Fn(&Arc<Entity>) + Send + Sync,
{
    fn attach(&self, root: &Arc<Entity>) {
        self(root)
    }
}
