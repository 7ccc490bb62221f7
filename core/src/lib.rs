//! Query compilation and graph materialization for eagerload.
//!
//! A [`QuerySpec`] is compiled against registered [`metadata`] into one SQL
//! statement by [`emit`], executed by a [`SqlEngine`], and its rows are folded
//! back into shared [`Entity`] graphs by [`ResultMaterializer`].

pub mod emit;
pub mod engine;
pub mod error;
pub mod expr;
pub mod materialize;
pub mod metadata;
pub mod navigation;
pub mod profiling;
pub mod spec;
mod tracing;
pub mod translate;

// Re-export key types and traits
pub use eagerload_types::{CoerceError, Dialect, KeyValue, ScalarKind, Value};
pub use emit::{CompiledQuery, EmitOptions, QueryShape, compile, compile_count};
pub use engine::{ChangeTrackingHook, Columns, EngineError, Row, SqlEngine};
pub use error::{EagerError, Result};
pub use expr::{Expr, IntoExpr, PropertyPath, and, col, lit, not, or, param};
pub use materialize::{Entity, MaterializePlan, Navigation, Record, ResultMaterializer};
pub use metadata::{
    ColumnDescriptor, EntityDescriptor, MaskingRule, MetadataProvider, MetadataRegistry,
    NavigationDescriptor,
};
pub use spec::{
    Conjunction, Direction, JoinKind, LockMode, QueryHints, QuerySpec, Selection,
};
pub use translate::Parameters;
