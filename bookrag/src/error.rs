//! Error types for the `bookrag` crate.

use thiserror::Error;

/// Errors that can occur in RAG operations.
#[derive(Debug, Error)]
pub enum RagError {
    /// An embedding could not be produced (non-retryable fault or retries exhausted).
    #[error("Embedding error ({provider}): {message}")]
    EmbeddingError {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// The provider rejected the call because of a rate limit or exhausted quota.
    ///
    /// This is the only error the embedding retry loop acts on.
    #[error("Rate limited ({provider}): {message}")]
    RateLimited {
        /// The provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
        /// `true` when the provider asked to wait for a per-minute quota reset.
        quota_reset: bool,
    },

    /// An error occurred in the vector index backend.
    #[error("Vector index error ({backend}): {message}")]
    VectorIndexError {
        /// The vector index backend that produced the error.
        backend: String,
        /// A description of the failure.
        message: String,
    },

    /// The language model call failed or returned nothing usable.
    ///
    /// Never leaves [`AnswerGenerator`](crate::AnswerGenerator); it is turned into
    /// the fallback answer there.
    #[error("Generation error ({provider}): {message}")]
    GenerationError {
        /// The language model provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// A configuration validation error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// The submitted query cannot be processed (e.g. it is empty).
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// An error in the RAG pipeline orchestration.
    #[error("Pipeline error: {0}")]
    PipelineError(String),
}

impl RagError {
    /// Returns `true` for errors that [`RagPipeline::answer`](crate::RagPipeline::answer)
    /// surfaces to the caller. Generation errors never reach it; they become
    /// the fallback answer.
    pub fn fails_request(&self) -> bool {
        matches!(
            self,
            RagError::EmbeddingError { .. }
                | RagError::RateLimited { .. }
                | RagError::VectorIndexError { .. }
                | RagError::InvalidQuery(_)
        )
    }

    /// Returns `true` if this error is a retryable rate-limit signal.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, RagError::RateLimited { .. })
    }
}

/// A convenience result type for RAG operations.
pub type Result<T> = std::result::Result<T, RagError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_query_and_retrieval_errors_fail_the_request() {
        let failing = [
            RagError::EmbeddingError { provider: "e".into(), message: "m".into() },
            RagError::RateLimited { provider: "e".into(), message: "m".into(), quota_reset: false },
            RagError::VectorIndexError { backend: "q".into(), message: "m".into() },
            RagError::InvalidQuery("empty".into()),
        ];
        assert!(failing.iter().all(RagError::fails_request));

        let absorbed = [
            RagError::GenerationError { provider: "g".into(), message: "m".into() },
            RagError::ConfigError("c".into()),
            RagError::PipelineError("p".into()),
        ];
        assert!(!absorbed.iter().any(RagError::fails_request));
    }
}
