//! Error types for the extraction and traceability engines

use thiserror::Error;

/// Errors that can occur during extraction, scoring or traceability operations
#[derive(Error, Debug)]
pub enum TraceError {
    #[error("Embedding model unavailable: {0}")]
    EmbeddingUnavailable(String),

    #[error("Linguistic pipeline unavailable: {0}")]
    PipelineUnavailable(String),

    #[error("Vector index unavailable: {0}")]
    IndexUnavailable(String),

    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias used throughout the library API
pub type Result<T> = std::result::Result<T, TraceError>;

impl TraceError {
    /// Returns true if the error came from the vector index rather than the caller's input
    pub fn is_index_failure(&self) -> bool {
        matches!(self, TraceError::IndexUnavailable(_) | TraceError::Sqlite(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TraceError::DimensionMismatch {
            expected: 384,
            actual: 12,
        };
        assert_eq!(
            err.to_string(),
            "Embedding dimension mismatch: expected 384, got 12"
        );
    }

    #[test]
    fn test_index_failure_classification() {
        assert!(TraceError::IndexUnavailable("down".into()).is_index_failure());
        assert!(!TraceError::EmbeddingUnavailable("no model".into()).is_index_failure());
    }
}
