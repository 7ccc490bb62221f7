//! rusqlite-backed [`SqlEngine`].

use std::path::Path;
use std::sync::Arc;

use eagerload_core::engine::{Columns, EngineError, Row, SqlEngine};
use eagerload_core::translate::Parameters;
use eagerload_types::Dialect;
use rusqlite::{Connection, Statement};

use crate::values::{SqliteParam, from_value_ref};

/// Runs eagerload statements on a single rusqlite connection.
#[derive(Debug)]
pub struct RusqliteEngine {
    conn: Connection,
}

impl RusqliteEngine {
    pub const fn new(conn: Connection) -> Self {
        Self { conn }
    }

    pub fn open(path: impl AsRef<Path>) -> Result<Self, EngineError> {
        Connection::open(path).map(Self::new).map_err(engine_error)
    }

    pub fn open_in_memory() -> Result<Self, EngineError> {
        Connection::open_in_memory().map(Self::new).map_err(engine_error)
    }

    /// Gets a reference to the underlying connection
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    pub fn mut_conn(&mut self) -> &mut Connection {
        &mut self.conn
    }

    pub fn into_inner(self) -> Connection {
        self.conn
    }

    /// Runs several `;`-separated statements without parameters.
    pub fn execute_batch(&self, sql: &str) -> Result<(), EngineError> {
        self.conn.execute_batch(sql).map_err(engine_error)
    }

    fn prepare(&self, sql: &str, params: &Parameters) -> Result<Statement<'_>, EngineError> {
        let mut stmt = self.conn.prepare(sql).map_err(engine_error)?;
        bind(&mut stmt, params)?;
        Ok(stmt)
    }
}

impl From<Connection> for RusqliteEngine {
    fn from(conn: Connection) -> Self {
        Self::new(conn)
    }
}

impl SqlEngine for RusqliteEngine {
    fn dialect(&self) -> Dialect {
        Dialect::SQLite
    }

    fn query(&self, sql: &str, params: &Parameters) -> Result<Vec<Row>, EngineError> {
        eagerload_core::eager_profile_scope!("sqlite", "query");
        let mut stmt = self.prepare(sql, params)?;
        let columns = Arc::new(Columns::new(
            stmt.column_names().into_iter().map(String::from).collect(),
        ));
        let width = columns.len();

        let mut rows = stmt.raw_query();
        let mut out = Vec::new();
        while let Some(row) = rows.next().map_err(engine_error)? {
            let mut values = Vec::with_capacity(width);
            for index in 0..width {
                values.push(from_value_ref(row.get_ref(index).map_err(engine_error)?));
            }
            out.push(Row::new(Arc::clone(&columns), values));
        }
        eagerload_core::eager_debug!("sqlite", "{} rows x {width} columns", out.len());
        Ok(out)
    }

    fn execute(&self, sql: &str, params: &Parameters) -> Result<u64, EngineError> {
        eagerload_core::eager_profile_scope!("sqlite", "execute");
        let mut stmt = self.prepare(sql, params)?;
        let changed = stmt.raw_execute().map_err(engine_error)?;
        Ok(changed as u64)
    }
}

/// Binds each parameter to its `:name` placeholder, or to its position when
/// the statement has no such name.
fn bind(stmt: &mut Statement<'_>, params: &Parameters) -> Result<(), EngineError> {
    for (position, (name, value)) in params.iter().enumerate() {
        let index = stmt
            .parameter_index(&format!(":{name}"))
            .map_err(engine_error)?
            .unwrap_or(position + 1);
        stmt.raw_bind_parameter(index, SqliteParam(value))
            .map_err(engine_error)?;
    }
    Ok(())
}

fn engine_error(err: rusqlite::Error) -> EngineError {
    EngineError::new(err.to_string())
}
