//! Span constructors for the `tracing` feature.
//!
//! Call sites enter the returned span for the duration of the operation:
//!
//! ```ignore
//! #[cfg(feature = "tracing")]
//! let _span = tracing_helpers::relation_span("get", &self.name).entered();
//! ```

use tracing::Span;

/// Span around one relation operation (`get`, `join`, `save`, `delete`)
pub fn relation_span(operation: &'static str, relation: &str) -> Span {
    tracing::info_span!("throughway.relation", operation, relation = %relation)
}

/// Span around one executed statement
pub fn execute_query_span(sql: &str) -> Span {
    tracing::debug_span!("throughway.execute", db.statement = %sql)
}
