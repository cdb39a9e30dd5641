//! Error types for result export.

use tessera_core::CancelledError;
use tessera_query::QueryError;
use thiserror::Error;

/// Result type alias using [`ExportError`].
pub type Result<T> = std::result::Result<T, ExportError>;

/// Errors surfaced while exporting a query result.
#[derive(Error, Debug)]
pub enum ExportError {
    /// The requested format/query combination is refused.
    #[error("{0}")]
    Unsupported(String),

    /// Error bubbled up from the query layer.
    #[error("Query error: {0}")]
    BadQuery(#[from] QueryError),

    /// Cancellation observed at a suspension point, tagged with the
    /// operation name.
    #[error(transparent)]
    Cancelled(#[from] CancelledError),

    /// JSON serialization error.
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// A column the export must read is missing from the result table.
    #[error("Missing column: {0}")]
    MissingColumn(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_errors_convert() {
        let err: ExportError = QueryError::BadQuery("no plan".to_string()).into();
        assert!(matches!(err, ExportError::BadQuery(_)));
        assert!(err.to_string().contains("no plan"));
    }
}
