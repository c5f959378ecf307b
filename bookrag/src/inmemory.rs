//! In-memory vector index using cosine similarity.
//!
//! This module provides [`InMemoryIndex`], a vector index backed by a `Vec`
//! protected by a `tokio::sync::RwLock`. It is suitable for development,
//! testing, and small knowledge bases.

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::document::{CollectionInfo, IndexPoint, RetrievedItem};
use crate::error::{RagError, Result};
use crate::vectorindex::{KnowledgeStore, VectorIndex};

/// An in-memory vector index using cosine similarity for search.
///
/// Points keep their insertion order; upserting an existing id replaces the
/// point in place.
///
/// # Example
///
/// ```rust,ignore
/// use bookrag::{InMemoryIndex, KnowledgeStore};
///
/// let index = InMemoryIndex::new("book");
/// index.recreate_collection(768).await?;
/// index.upsert(&points).await?;
/// ```
#[derive(Debug)]
pub struct InMemoryIndex {
    name: String,
    points: RwLock<Vec<IndexPoint>>,
}

impl InMemoryIndex {
    /// Create a new empty index for the named collection.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), points: RwLock::new(Vec::new()) }
    }

    /// Create an index pre-populated with `points`.
    pub fn with_points(name: impl Into<String>, points: Vec<IndexPoint>) -> Self {
        Self { name: name.into(), points: RwLock::new(points) }
    }

    /// Return the number of stored points.
    pub async fn len(&self) -> usize {
        self.points.read().await.len()
    }

    /// Return `true` if no points are stored.
    pub async fn is_empty(&self) -> bool {
        self.points.read().await.is_empty()
    }
}

/// Compute cosine similarity between two vectors.
///
/// Returns 0.0 if either vector has zero magnitude.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[async_trait]
impl VectorIndex for InMemoryIndex {
    async fn search(
        &self,
        vector: &[f32],
        top_k: usize,
        score_threshold: f32,
    ) -> Result<Vec<RetrievedItem>> {
        let points = self.points.read().await;

        let mut scored: Vec<RetrievedItem> = points
            .iter()
            .map(|point| RetrievedItem {
                id: Some(point.id.to_string()),
                score: cosine_similarity(&point.vector, vector),
                payload: point.payload.clone(),
            })
            .filter(|item| item.score >= score_threshold)
            .collect();

        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(top_k);
        Ok(scored)
    }
}

#[async_trait]
impl KnowledgeStore for InMemoryIndex {
    async fn recreate_collection(&self, _dimensions: usize) -> Result<()> {
        self.points.write().await.clear();
        Ok(())
    }

    async fn upsert(&self, points: &[IndexPoint]) -> Result<()> {
        let mut stored = self.points.write().await;
        for point in points {
            if point.vector.is_empty() {
                return Err(RagError::VectorIndexError {
                    backend: "InMemory".to_string(),
                    message: format!("point {} has an empty vector", point.id),
                });
            }
            match stored.iter_mut().find(|p| p.id == point.id) {
                Some(existing) => *existing = point.clone(),
                None => stored.push(point.clone()),
            }
        }
        Ok(())
    }

    async fn collection_info(&self) -> Result<CollectionInfo> {
        let count = self.points.read().await.len() as u64;
        Ok(CollectionInfo { name: self.name.clone(), points_count: Some(count) })
    }

    async fn sample(&self, limit: usize) -> Result<Vec<RetrievedItem>> {
        let points = self.points.read().await;
        Ok(points
            .iter()
            .take(limit)
            .map(|p| RetrievedItem {
                id: Some(p.id.to_string()),
                score: 0.0,
                payload: p.payload.clone(),
            })
            .collect())
    }
}
