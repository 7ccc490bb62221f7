use thiserror::Error;

#[derive(Debug, Error)]
pub enum EagerError {
    /// A navigation path or entity type could not be resolved
    #[error("Resolution error: {0}")]
    Resolution(String),

    /// A predicate or selector could not be converted to SQL
    #[error("Translation error: {0}")]
    Translation(String),

    /// The engine rejected or failed the statement
    #[error("Execution error: {message}\n  statement: {sql}")]
    Execution { message: String, sql: String },

    /// No rows returned when exactly one was expected
    #[error("No rows found")]
    NoResult,

    /// More than one row returned when at most one was expected
    #[error("Expected a single result but found {0}")]
    MultipleResults(usize),

    /// The builder was used out of order
    #[error("Invalid usage: {0}")]
    InvalidUsage(String),

    /// A stored value could not be converted
    #[error("Conversion error: {0}")]
    Conversion(String),

    /// Entity metadata is missing or inconsistent
    #[error("Metadata error: {0}")]
    Metadata(String),
}

impl From<eagerload_types::CoerceError> for EagerError {
    fn from(err: eagerload_types::CoerceError) -> Self {
        EagerError::Conversion(err.to_string())
    }
}

/// Engine failures outside a compiled statement (opening a connection,
/// running setup SQL) carry no statement text.
impl From<crate::engine::EngineError> for EagerError {
    fn from(err: crate::engine::EngineError) -> Self {
        EagerError::Execution {
            message: err.message,
            sql: String::new(),
        }
    }
}

/// Result type for query compilation and execution
pub type Result<T> = std::result::Result<T, EagerError>;
