//! SQLite engine for eagerload.
//!
//! [`RusqliteEngine`] runs compiled statements on a `rusqlite` connection.
//! Parameters bind by name (`:name`) and fall back to position for
//! statements written with `?`, so raw SQL works either way.
//!
//! ```
//! # #[cfg(feature = "rusqlite")] {
//! use eagerload_core::{Parameters, SqlEngine, Value};
//! use eagerload_sqlite::RusqliteEngine;
//!
//! let engine = RusqliteEngine::open_in_memory().unwrap();
//! engine
//!     .execute_batch("CREATE TABLE t (id INTEGER PRIMARY KEY, name TEXT); INSERT INTO t VALUES (1, 'a');")
//!     .unwrap();
//!
//! let mut params = Parameters::new();
//! params.bind("id", Value::Integer(1));
//! let rows = engine.query("SELECT name FROM t WHERE id = :id", &params).unwrap();
//! assert_eq!(rows[0].get("name"), Some(&Value::from("a")));
//! # }
//! ```

#[cfg(feature = "rusqlite")]
mod connection;
#[cfg(feature = "rusqlite")]
mod values;

#[cfg(feature = "rusqlite")]
pub use connection::RusqliteEngine;
#[cfg(feature = "rusqlite")]
pub use values::{SqliteParam, from_value_ref};

pub use eagerload_types::Dialect;
