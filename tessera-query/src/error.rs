//! Error types for query planning.

use tessera_core::CancelledError;
use thiserror::Error;

/// Result type alias using [`QueryError`].
pub type Result<T> = std::result::Result<T, QueryError>;

/// Query planning errors.
#[derive(Error, Debug)]
pub enum QueryError {
    /// The query is malformed (bad triple arity, text triple without a
    /// variable, missing word part, unbound ORDER BY key, ...).
    /// Fatal for this query.
    #[error("Bad query: {0}")]
    BadQuery(String),

    /// A well-formed query hit a combination the engine does not support
    /// yet (predicate variables, cyclic join graphs, ...).
    #[error("Not yet implemented: {0}")]
    NotYetImplemented(String),

    /// Cancellation observed at a suspension point.
    #[error(transparent)]
    Cancelled(#[from] CancelledError),

    /// Internal error (should not happen in normal operation).
    #[error("Internal error: {0}")]
    Internal(String),
}
