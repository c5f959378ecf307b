//! Embedding provider trait for generating vector embeddings from text.

use async_trait::async_trait;

use crate::error::Result;

/// A provider that generates vector embeddings from text input.
///
/// Implementations wrap specific embedding backends (Gemini, etc.) behind a
/// unified async interface. A provider is built once at startup and shared
/// across concurrent requests, so implementations must be `Send + Sync`.
///
/// Backends report quota exhaustion as
/// [`RagError::RateLimited`](crate::RagError::RateLimited) so that
/// [`RetryingEmbeddingProvider`](crate::RetryingEmbeddingProvider) can retry it.
///
/// # Example
///
/// ```rust,ignore
/// use bookrag::EmbeddingProvider;
///
/// let provider = MyEmbeddingProvider::new();
/// let embedding = provider.embed("hello world").await?;
/// assert_eq!(embedding.len(), provider.dimensions());
/// ```
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate an embedding vector for a single text input.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Return the dimensionality of embeddings produced by this provider.
    fn dimensions(&self) -> usize;

    /// Return the model identifier used for embedding requests.
    fn model(&self) -> &str;
}
