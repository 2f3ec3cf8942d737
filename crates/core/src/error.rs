//! Error types for ragchat.
//!
//! A single error enum covers every failure category in the workspace:
//! configuration, I/O, language model generation, retrieval, ingestion,
//! and prompt rendering.

use std::path::PathBuf;
use thiserror::Error;

/// Unified error type for ragchat.
///
/// Only `Config` is fatal; every other variant is recoverable and is either
/// surfaced to the user as a message or degraded into a fallback.
#[derive(Error, Debug)]
pub enum AppError {
    /// Invalid or inconsistent configuration (fatal at startup)
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// LLM provider transport or protocol errors
    #[error("LLM error: {0}")]
    Llm(String),

    /// The language model could not produce an answer
    #[error("Generation unavailable: {0}")]
    GenerationUnavailable(String),

    /// Vector index and retrieval errors
    #[error("Knowledge error: {0}")]
    Knowledge(String),

    /// A similarity query ran against an index with no records
    #[error("Index is empty; ingest documents first")]
    IndexEmpty,

    /// Ingestion produced zero retrievable units
    #[error("No documents found to process in {0:?}")]
    NoDocumentsFound(PathBuf),

    /// A file type the loader cannot read
    #[error("Unsupported document type: {0}")]
    UnsupportedDocumentType(String),

    /// Prompt system errors
    #[error("Prompt error: {0}")]
    Prompt(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

impl AppError {
    /// Whether this error should abort the process.
    pub fn is_fatal(&self) -> bool {
        matches!(self, AppError::Config(_))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_config_is_fatal() {
        assert!(AppError::Config("bad".to_string()).is_fatal());
        assert!(!AppError::IndexEmpty.is_fatal());
        assert!(!AppError::GenerationUnavailable("down".to_string()).is_fatal());
        assert!(!AppError::NoDocumentsFound(PathBuf::from("data")).is_fatal());
    }

    #[test]
    fn test_yaml_error_converts_to_serialization() {
        let err: AppError = serde_yaml::from_str::<Vec<u32>>("{not: a list")
            .unwrap_err()
            .into();
        assert!(matches!(err, AppError::Serialization(_)));
    }
}
