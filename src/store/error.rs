//! Document store error types
//!
//! Defines all errors that can occur in the store layer.

use thiserror::Error;

/// Errors that can occur in the document store
#[derive(Error, Debug)]
pub enum StoreError {
    /// Path could not be parsed (empty, empty segment, too deep)
    #[error("Invalid path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    /// A document path was required but a collection path was given
    #[error("Not a document path: {0}")]
    NotADocument(String),

    /// A collection path was required but a document path was given
    #[error("Not a collection path: {0}")]
    NotACollection(String),

    /// Requested document does not exist
    #[error("Document not found: {0}")]
    NotFound(String),

    /// Query options are malformed (bad operator value, zero limit)
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// I/O operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Snapshot serialization/deserialization failed
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl StoreError {
    pub(crate) fn invalid_path(path: &str, reason: impl Into<String>) -> Self {
        StoreError::InvalidPath {
            path: path.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

/// Result type alias for store operations
pub type StoreResult<T> = Result<T, StoreError>;
