//! `tracing` spans for the hot paths. Compiled only with the `tracing` feature.

use tracing::Span;

/// Span around connection establishment.
pub fn connect_span() -> Span {
    tracing::debug_span!("lifeguard.connect")
}

/// Span around a single SQL round trip.
pub fn execute_query_span(query: &str) -> Span {
    tracing::debug_span!("lifeguard.execute_query", db.statement = query)
}

/// Span around one `where_related` translation (lookup query included).
pub fn where_related_span(model: &str, path: &str, negated: bool) -> Span {
    tracing::debug_span!("lifeguard.where_related", model, path, negated)
}

/// Span around one validation pass of a record.
pub fn validate_span(table: &str) -> Span {
    tracing::debug_span!("lifeguard.validate", table)
}
