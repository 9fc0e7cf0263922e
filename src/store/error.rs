//! Table store error types
//!
//! Defines all errors that can occur talking to the table store or its
//! change feed.

use thiserror::Error;

/// Errors that can occur in the table store
#[derive(Error, Debug)]
pub enum StoreError {
    /// HTTP transport failed (connect, timeout, body)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Backend answered with a non-success status
    #[error("Backend returned {status}: {message}")]
    Status { status: u16, message: String },

    /// Row rejected (missing column, dangling reference, duplicate id)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Table name not known to the backend
    #[error("Unknown table: {0}")]
    UnknownTable(String),

    /// Filter or order clause could not be parsed
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// Serialization/deserialization failed
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Change feed failure (connect, subscribe, closed connection)
    #[error("Realtime error: {0}")]
    Realtime(String),

    /// I/O operation failed (snapshot persistence)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

/// Result type alias for store operations
pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = StoreError::UnknownTable("reports".to_string());
        assert_eq!(err.to_string(), "Unknown table: reports");

        let err = StoreError::Status {
            status: 401,
            message: "JWT expired".to_string(),
        };
        assert_eq!(err.to_string(), "Backend returned 401: JWT expired");
    }

    #[test]
    fn test_json_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: StoreError = json_err.into();
        assert!(matches!(err, StoreError::Serialization(_)));
    }
}
