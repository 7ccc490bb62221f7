//! # eagerload
//!
//! Loads entity graphs with a single SQL statement: filters, eager-loaded
//! reference and collection navigations (including nested then-includes),
//! ordering and paging compile into one query, and its rows are rebuilt into
//! a duplicate-free graph where a recurring related row is one shared
//! instance.
//!
//! ## Quick Start
//!
//! ```rust
//! # #[cfg(feature = "rusqlite")]
//! # fn main() -> eagerload::Result<()> {
//! use std::sync::Arc;
//! use eagerload::prelude::*;
//! use eagerload::sqlite::RusqliteEngine;
//!
//! let registry = Arc::new(MetadataRegistry::new());
//! registry.register(
//!     EntityDescriptor::builder("Author")
//!         .table("authors")
//!         .key("Id", ScalarKind::Integer)
//!         .field("Name", ScalarKind::Text)
//!         .collection("Books", "Book")
//!         .build()?,
//! );
//! registry.register(
//!     EntityDescriptor::builder("Book")
//!         .table("books")
//!         .key("Id", ScalarKind::Integer)
//!         .field("AuthorId", ScalarKind::Integer)
//!         .field("Title", ScalarKind::Text)
//!         .build()?,
//! );
//!
//! let engine = RusqliteEngine::open_in_memory()?;
//! engine.execute_batch(
//!     "CREATE TABLE authors (Id INTEGER PRIMARY KEY, Name TEXT NOT NULL);
//!      CREATE TABLE books (Id INTEGER PRIMARY KEY, AuthorId INTEGER NOT NULL, Title TEXT NOT NULL);
//!      INSERT INTO authors VALUES (1, 'Le Guin');
//!      INSERT INTO books VALUES (1, 1, 'The Dispossessed'), (2, 1, 'The Lathe of Heaven');",
//! )?;
//!
//! let session = Session::new(engine, registry);
//! let authors = session.query("Author").include("Books").to_list()?;
//! assert_eq!(authors.len(), 1);
//! assert_eq!(authors[0].collection("Books").len(), 2);
//! # Ok(())
//! # }
//! # #[cfg(not(feature = "rusqlite"))]
//! # fn main() {}
//! ```
//!
//! ## Engines
//!
//! | Database | Driver   | Feature Flag | Status |
//! |----------|----------|--------------|--------|
//! | SQLite   | rusqlite | `rusqlite`   | ✅     |
//!
//! Any other engine plugs in through [`SqlEngine`]; statements for
//! PostgreSQL and MySQL are emitted from the engine's [`Dialect`].

mod batch;
mod query;
mod session;

pub use query::Query;
pub use session::{Session, SessionOptions};

// =============================================================================
// Root-level exports
// =============================================================================

pub use eagerload_core::{
    ChangeTrackingHook, ColumnDescriptor, Columns, CompiledQuery, Conjunction, Dialect, Direction,
    EagerError, EmitOptions, EngineError, Entity, EntityDescriptor, IntoExpr, JoinKind, KeyValue,
    LockMode, MaskingRule, MetadataProvider, MetadataRegistry, Navigation, NavigationDescriptor,
    Parameters, PropertyPath, QueryHints, QueryShape, QuerySpec, Record, Result, Row, ScalarKind,
    SqlEngine, Value, and, col, lit, not, or, param,
};

/// Lower-level building blocks: metadata, expressions, emission and
/// materialization.
pub mod core {
    pub use eagerload_core::*;
}

#[cfg(feature = "rusqlite")]
pub mod sqlite {
    pub use eagerload_sqlite::*;
    pub use rusqlite;
}

pub mod prelude {
    pub use crate::{Query, Session, SessionOptions};
    pub use eagerload_core::expr::{Expr, IntoExpr, and, col, lit, not, or, param};
    pub use eagerload_core::metadata::{
        ColumnDescriptor, EntityDescriptor, FkSide, MaskingRule, MetadataRegistry, NavigationDescriptor,
    };
    pub use eagerload_core::{EagerError, Entity, JoinKind, LockMode, Parameters, QueryHints, Record, ScalarKind, Value};
}
