//! Data types for retrieved items, index points, and collection metadata.

use serde::{Deserialize, Serialize};

/// Payload stored next to each vector.
///
/// Keys keep their insertion order, which matters for the payload text fallback
/// in [`payload_text`](crate::context::payload_text).
pub type Payload = serde_json::Map<String, serde_json::Value>;

/// A stored item returned by a vector search, paired with its similarity score.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetrievedItem {
    /// Identifier of the point in the index, when the backend reports one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// The similarity score (higher is more relevant).
    pub score: f32,
    /// Payload stored with the point (text plus metadata).
    pub payload: Payload,
}

impl RetrievedItem {
    /// Create an item without a point identifier.
    pub fn new(score: f32, payload: Payload) -> Self {
        Self { id: None, score, payload }
    }

    /// Set the point identifier.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }
}

/// A vector plus payload to be written into a [`KnowledgeStore`](crate::KnowledgeStore).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexPoint {
    /// Numeric point identifier.
    pub id: u64,
    /// The embedding of the chunk text.
    pub vector: Vec<f32>,
    /// Payload stored next to the vector.
    pub payload: Payload,
}

/// Basic facts about a collection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CollectionInfo {
    /// Collection name.
    pub name: String,
    /// Number of stored points, if the backend reports it.
    pub points_count: Option<u64>,
}
