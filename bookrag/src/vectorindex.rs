//! Vector index traits for similarity search and knowledge-base maintenance.

use async_trait::async_trait;

use crate::document::{CollectionInfo, IndexPoint, RetrievedItem};
use crate::error::Result;

/// A searchable vector index bound to one collection.
///
/// The index owns filtering and ordering: results must already satisfy
/// `score >= score_threshold`, be sorted by descending score, and hold at most
/// `top_k` items. An empty `Vec` means "no matches" and is not an error.
///
/// # Example
///
/// ```rust,ignore
/// use bookrag::{InMemoryIndex, VectorIndex};
///
/// let index = InMemoryIndex::new("book");
/// let results = index.search(&query_embedding, 5, 0.15).await?;
/// ```
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Search for the `top_k` items most similar to `vector` scoring at least
    /// `score_threshold`.
    async fn search(
        &self,
        vector: &[f32],
        top_k: usize,
        score_threshold: f32,
    ) -> Result<Vec<RetrievedItem>>;
}

/// A [`VectorIndex`] that can also be written to and inspected.
///
/// Used by ingestion and by the knowledge-base diagnostics; the query path
/// only needs [`VectorIndex`].
#[async_trait]
pub trait KnowledgeStore: VectorIndex {
    /// Drop the collection if it exists and create it empty with the given
    /// vector size and cosine distance.
    async fn recreate_collection(&self, dimensions: usize) -> Result<()>;

    /// Insert or replace points by id.
    async fn upsert(&self, points: &[IndexPoint]) -> Result<()>;

    /// Return the collection name and point count.
    async fn collection_info(&self) -> Result<CollectionInfo>;

    /// Return up to `limit` stored items (score `0.0`) to verify the data.
    async fn sample(&self, limit: usize) -> Result<Vec<RetrievedItem>>;
}
