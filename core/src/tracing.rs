//! Tracing utilities for query compilation and execution observability.
//!
//! Enable the `tracing` feature to emit spans and events via the `tracing` crate.
//! These macros no-op when the feature is disabled, avoiding `#[cfg]` boilerplate
//! at every call site. The feature is evaluated in the calling crate, so crates
//! using them carry their own `tracing` feature.

/// Emit a debug-level tracing event with the SQL text and parameter count.
///
/// ```ignore
/// eager_trace_query!(&sql, params.len());
/// ```
#[macro_export]
macro_rules! eager_trace_query {
    ($sql:expr, $param_count:expr) => {
        #[cfg(feature = "tracing")]
        tracing::debug!(sql = %$sql, params = $param_count, "eagerload.query");
    };
}

/// Emit a warn-level event for a degraded (skipped or defaulted) step.
///
/// ```ignore
/// eager_warn!("resolve", "navigation {} skipped: {}", path, err);
/// ```
#[macro_export]
macro_rules! eager_warn {
    ($stage:literal, $($arg:tt)+) => {
        #[cfg(feature = "tracing")]
        tracing::warn!(stage = $stage, "{}", format_args!($($arg)+));
    };
}

/// Emit a debug-level diagnostic event.
#[macro_export]
macro_rules! eager_debug {
    ($stage:literal, $($arg:tt)+) => {
        #[cfg(feature = "tracing")]
        tracing::debug!(stage = $stage, "{}", format_args!($($arg)+));
    };
}
