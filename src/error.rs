//! Error types for FeelKo

use thiserror::Error;

/// Result type for FeelKo operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for ingestion, retrieval and generation
#[derive(Error, Debug)]
pub enum Error {
    /// Record is empty or invalid
    #[error("empty document: {0}")]
    EmptyDocument(String),

    /// Embedding dimension mismatch
    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Expected dimension
        expected: usize,
        /// Actual dimension
        actual: usize,
    },

    /// Collection was built with a different embedding model
    #[error("embedding model mismatch: collection uses {expected}, got {actual}")]
    ModelMismatch {
        /// Model recorded in the collection
        expected: String,
        /// Model requested by the caller
        actual: String,
    },

    /// Persisted collection does not exist
    #[error("collection not found: {0}")]
    CollectionNotFound(String),

    /// Invalid configuration
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Required credential is not set
    #[error("missing credential: environment variable {0} is not set")]
    MissingCredential(String),

    /// Source could not be ingested
    #[error("ingestion error: {0}")]
    Ingestion(String),

    /// CSV reader error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Embedding request failed
    #[error("embedding error: {0}")]
    Embedding(String),

    /// Generative model request failed
    #[error("generation error: {0}")]
    Generation(String),

    /// Query processing error
    #[error("query error: {0}")]
    Query(String),

    /// Serialization error (serde_json)
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Config file could not be parsed
    #[error("config error: {0}")]
    Config(#[from] toml::de::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_empty_document() {
        let err = Error::EmptyDocument("슬기로운 의사생활".to_string());
        assert_eq!(err.to_string(), "empty document: 슬기로운 의사생활");
    }

    #[test]
    fn test_error_display_dimension_mismatch() {
        let err = Error::DimensionMismatch {
            expected: 768,
            actual: 384,
        };
        assert_eq!(
            err.to_string(),
            "embedding dimension mismatch: expected 768, got 384"
        );
    }

    #[test]
    fn test_error_display_model_mismatch() {
        let err = Error::ModelMismatch {
            expected: "text-embedding-004".to_string(),
            actual: "hashing-256".to_string(),
        };
        assert!(err.to_string().contains("text-embedding-004"));
        assert!(err.to_string().contains("hashing-256"));
    }

    #[test]
    fn test_error_display_missing_credential() {
        let err = Error::MissingCredential("GOOGLE_API_KEY".to_string());
        assert_eq!(
            err.to_string(),
            "missing credential: environment variable GOOGLE_API_KEY is not set"
        );
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err = Error::from(io_err);
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_error_from_json() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err = Error::from(json_err);
        assert!(err.to_string().starts_with("serialization error"));
    }

    #[test]
    fn test_result_type() {
        fn may_fail(succeed: bool) -> Result<i32> {
            if succeed {
                Ok(42)
            } else {
                Err(Error::InvalidConfig("test".to_string()))
            }
        }

        assert_eq!(may_fail(true).unwrap(), 42);
        assert!(may_fail(false).is_err());
    }
}
