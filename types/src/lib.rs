//! Shared type definitions for eagerload
//!
//! This crate provides the value-level vocabulary used across every eagerload
//! crate:
//!
//! - [`Dialect`] - Database dialect enum (SQLite, PostgreSQL, MySQL)
//! - [`Value`] - Dynamic SQL value exchanged with the engine
//! - [`ScalarKind`] - Declared storage kind of a mapped property
//! - [`KeyValue`] - Hashable primary-key identity
//!
//! # Features
//!
//! - `serde` - Enable serde serialization and JSON conversion of values

mod dialect;
mod value;

pub use dialect::{Dialect, DialectParseError};
pub use value::{CoerceError, KeyValue, ScalarKind, Value};

/// Prelude module for commonly used types
pub mod prelude {
    pub use crate::{Dialect, KeyValue, ScalarKind, Value};
}
