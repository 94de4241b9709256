//! Error taxonomy for the knowledge pipeline.
//!
//! Handlers never throw across the router boundary (spec.md §7): every
//! fallible step returns [`Result<T>`], and [`Error::operation`] surfaces
//! the stable `error.operation` tag that `JobResult` and `getPipelineStatus`
//! report to callers.

use uuid::Uuid;

/// Result type alias for knowledge pipeline operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the knowledge pipeline.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Oracle output could not be parsed or failed schema validation.
    #[error("parse error: {0}")]
    ParseError(String),

    /// Oracle call failed after retries and circuit-breaker accounting.
    #[error("ai extraction failed: {0}")]
    AiExtraction(String),

    /// Embedder call failed after retries.
    #[error("embedding generation failed: {0}")]
    EmbeddingGeneration(String),

    /// Triple/concept/link persistence failed.
    #[error("batch storage failed: {0}")]
    BatchStorage(String),

    /// Vector persistence failed.
    #[error("vector storage error: {0}")]
    VectorStorageError(String),

    /// Deduplication pass failed.
    #[error("deduplication error: {0}")]
    DeduplicationError(String),

    /// Uncaught failure inside the batch extraction handler.
    #[error("batch extraction error: {0}")]
    BatchExtraction(String),

    /// Coordinator-level failure creating a parent/child job.
    #[error("pipeline initiation error: {0}")]
    PipelineInitiation(String),

    /// Query-time failure in a single search strategy.
    #[error("search error: {0}")]
    SearchError(String),

    /// Query-time failure in the fusion layer.
    #[error("fusion search error: {0}")]
    FusionSearchError(String),

    /// Generic adapter/database failure.
    #[error("database error: {0}")]
    DatabaseError(String),

    /// A logical suspension point exceeded its network timeout.
    #[error("execution timed out")]
    ExecutionTimeout,

    /// The circuit breaker for this key is open; calls fail fast.
    #[error("circuit breaker open for {0}")]
    CircuitBreakerOpen(String),

    /// Caller-supplied input violated an invariant.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// An operation was attempted against a job/pipeline in the wrong state.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// Job or stage not found.
    #[error("not found: {0}")]
    NotFound(Uuid),

    /// Configuration is missing or inconsistent.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Serialization/deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO failure (reference store adapter, file-backed fakes).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// The stable `error.operation` tag from spec.md §7, or `None` for
    /// errors that aren't part of that taxonomy (state/validation errors
    /// that never leave the process as a `JobResult`).
    #[must_use]
    pub fn operation(&self) -> Option<&'static str> {
        match self {
            Error::ParseError(_) => Some("parse_error"),
            Error::AiExtraction(_) => Some("ai_extraction"),
            Error::EmbeddingGeneration(_) => Some("embedding_generation"),
            Error::BatchStorage(_) => Some("batch_storage"),
            Error::VectorStorageError(_) => Some("vector_storage_error"),
            Error::DeduplicationError(_) => Some("deduplication_error"),
            Error::BatchExtraction(_) => Some("batch_extraction"),
            Error::PipelineInitiation(_) => Some("pipeline_initiation"),
            Error::SearchError(_) => Some("search_error"),
            Error::FusionSearchError(_) => Some("fusion_search_error"),
            Error::DatabaseError(_) => Some("database_error"),
            Error::ExecutionTimeout
            | Error::CircuitBreakerOpen(_)
            | Error::InvalidInput(_)
            | Error::InvalidState(_)
            | Error::NotFound(_)
            | Error::Configuration(_)
            | Error::Serialization(_)
            | Error::Io(_) => None,
        }
    }

    /// Whether a failing call counts against circuit-breaker accounting
    /// (spec.md §5: only recoverable, downstream-collaborator failures do).
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::AiExtraction(_)
                | Error::EmbeddingGeneration(_)
                | Error::BatchStorage(_)
                | Error::VectorStorageError(_)
                | Error::DatabaseError(_)
                | Error::ExecutionTimeout
                | Error::Io(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operation_tags_match_spec_taxonomy() {
        assert_eq!(
            Error::ParseError("bad json".into()).operation(),
            Some("parse_error")
        );
        assert_eq!(
            Error::BatchExtraction("boom".into()).operation(),
            Some("batch_extraction")
        );
        assert_eq!(Error::InvalidState("x".into()).operation(), None);
    }

    #[test]
    fn recoverable_errors_affect_circuit_breaker() {
        assert!(Error::AiExtraction("timeout".into()).is_recoverable());
        assert!(!Error::InvalidInput("empty subject".into()).is_recoverable());
        assert!(!Error::CircuitBreakerOpen("text_extraction_doc-1".into()).is_recoverable());
    }
}
