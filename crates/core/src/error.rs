//! Error types for the medrag question-answering service.
//!
//! This module defines a unified error enum covering the pipeline taxonomy
//! (readiness, caller input, retrieval, synthesis, initialization) as well as
//! the ambient categories (configuration, I/O, LLM, prompt, serialization).

use thiserror::Error;

/// Unified error type for medrag.
///
/// All fallible functions return `Result<T, AppError>`. Errors keep their
/// kind as they propagate; nothing is downgraded to `Other` on the way up.
#[derive(Error, Debug)]
pub enum AppError {
    /// The pipeline has not finished initializing. Retry later.
    #[error("Pipeline not ready: {0}")]
    NotReady(String),

    /// A retrieval filter could not be constructed from caller input.
    #[error("Invalid filter: {0}")]
    InvalidFilter(String),

    /// A malformed argument (e.g. `k == 0`, empty query).
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The search service failed, timed out, or exhausted its retries.
    #[error("Retrieval failed: {0}")]
    RetrievalFailed(String),

    /// The completion service failed, timed out, or returned no content.
    #[error("Synthesis failed: {0}")]
    SynthesisFailed(String),

    /// A pipeline setup step failed.
    #[error("Initialization failed: {0}")]
    InitializationFailed(String),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// LLM provider errors
    #[error("LLM error: {0}")]
    Llm(String),

    /// Prompt template errors
    #[error("Prompt error: {0}")]
    Prompt(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

/// Stable, matchable classification of an [`AppError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotReady,
    InvalidFilter,
    InvalidArgument,
    RetrievalFailed,
    SynthesisFailed,
    InitializationFailed,
    Config,
    Io,
    Llm,
    Prompt,
    Serialization,
    Other,
}

impl AppError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::NotReady(_) => ErrorKind::NotReady,
            AppError::InvalidFilter(_) => ErrorKind::InvalidFilter,
            AppError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            AppError::RetrievalFailed(_) => ErrorKind::RetrievalFailed,
            AppError::SynthesisFailed(_) => ErrorKind::SynthesisFailed,
            AppError::InitializationFailed(_) => ErrorKind::InitializationFailed,
            AppError::Config(_) => ErrorKind::Config,
            AppError::Io(_) => ErrorKind::Io,
            AppError::Llm(_) => ErrorKind::Llm,
            AppError::Prompt(_) => ErrorKind::Prompt,
            AppError::Serialization(_) => ErrorKind::Serialization,
            AppError::Other(_) => ErrorKind::Other,
        }
    }

    /// Whether a caller may reasonably retry the same request later.
    pub fn is_transient(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::NotReady | ErrorKind::RetrievalFailed | ErrorKind::SynthesisFailed
        )
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
    fn test_kind_matches_variant() {
        assert_eq!(
            AppError::NotReady("booting".to_string()).kind(),
            ErrorKind::NotReady
        );
        assert_eq!(
            AppError::InvalidFilter("start > end".to_string()).kind(),
            ErrorKind::InvalidFilter
        );
        assert_eq!(
            AppError::SynthesisFailed("empty".to_string()).kind(),
            ErrorKind::SynthesisFailed
        );
    }

    #[test]
    fn test_transient_errors() {
        assert!(AppError::NotReady(String::new()).is_transient());
        assert!(AppError::RetrievalFailed(String::new()).is_transient());
        assert!(AppError::SynthesisFailed(String::new()).is_transient());
        assert!(!AppError::InvalidArgument(String::new()).is_transient());
        assert!(!AppError::InitializationFailed(String::new()).is_transient());
    }

    #[test]
    fn test_display_keeps_message() {
        let err = AppError::RetrievalFailed("search timed out after 10s".to_string());
        assert_eq!(err.to_string(), "Retrieval failed: search timed out after 10s");
    }

    #[test]
    fn test_from_serde_json() {
        let err: AppError = serde_json::from_str::<serde_json::Value>("{not json")
            .unwrap_err()
            .into();
        assert_eq!(err.kind(), ErrorKind::Serialization);
    }
}
