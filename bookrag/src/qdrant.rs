//! Qdrant vector index backend.
//!
//! Provides [`QdrantIndex`] which implements [`VectorIndex`] and
//! [`KnowledgeStore`] using the [qdrant-client](https://docs.rs/qdrant-client)
//! crate over gRPC.
//!
//! # Example
//!
//! ```rust,ignore
//! use bookrag::qdrant::QdrantIndex;
//!
//! let index = QdrantIndex::new("http://localhost:6334", None, "book")?;
//! let results = index.search(&query_embedding, 5, 0.15).await?;
//! ```

use async_trait::async_trait;
use qdrant_client::qdrant::point_id::PointIdOptions;
use qdrant_client::qdrant::value::Kind;
use qdrant_client::qdrant::{
    CreateCollectionBuilder, Distance, PointId, PointStruct, ScrollPointsBuilder,
    SearchPointsBuilder, UpsertPointsBuilder, Value as QdrantValue, VectorParamsBuilder,
};
use qdrant_client::{Payload as QdrantPayload, Qdrant};
use serde_json::{Number, Value};
use tracing::{debug, error};

use crate::document::{CollectionInfo, IndexPoint, Payload, RetrievedItem};
use crate::error::{RagError, Result};
use crate::vectorindex::{KnowledgeStore, VectorIndex};

/// A [`KnowledgeStore`] backed by one [Qdrant](https://qdrant.tech/) collection.
///
/// Collections use cosine distance. Payload keys come back from Qdrant
/// unordered; they are sorted alphabetically on the way out.
pub struct QdrantIndex {
    client: Qdrant,
    collection: String,
}

impl QdrantIndex {
    /// Connect to `url`, optionally authenticating with `api_key`.
    pub fn new(url: &str, api_key: Option<&str>, collection: impl Into<String>) -> Result<Self> {
        let mut config = Qdrant::from_url(url);
        if let Some(key) = api_key {
            config = config.api_key(key);
        }
        let client = config.build().map_err(Self::map_err)?;
        Ok(Self { client, collection: collection.into() })
    }

    /// Wrap an existing client.
    pub fn from_client(client: Qdrant, collection: impl Into<String>) -> Self {
        Self { client, collection: collection.into() }
    }

    /// The collection this index reads and writes.
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Names of every collection on the server.
    pub async fn list_collections(&self) -> Result<Vec<String>> {
        let response = self.client.list_collections().await.map_err(Self::map_err)?;
        Ok(response.collections.into_iter().map(|c| c.name).collect())
    }

    fn map_err(e: qdrant_client::QdrantError) -> RagError {
        RagError::VectorIndexError { backend: "qdrant".to_string(), message: e.to_string() }
    }
}

fn point_id_to_string(id: Option<&PointId>) -> Option<String> {
    id.and_then(|pid| match &pid.point_id_options {
        Some(PointIdOptions::Uuid(s)) => Some(s.clone()),
        Some(PointIdOptions::Num(n)) => Some(n.to_string()),
        None => None,
    })
}

/// Convert a Qdrant payload value to JSON.
fn to_json(value: &QdrantValue) -> Value {
    match &value.kind {
        None | Some(Kind::NullValue(_)) => Value::Null,
        Some(Kind::BoolValue(b)) => Value::Bool(*b),
        Some(Kind::IntegerValue(i)) => Value::from(*i),
        Some(Kind::DoubleValue(d)) => {
            Number::from_f64(*d).map(Value::Number).unwrap_or(Value::Null)
        }
        Some(Kind::StringValue(s)) => Value::String(s.clone()),
        Some(Kind::ListValue(list)) => Value::Array(list.values.iter().map(to_json).collect()),
        Some(Kind::StructValue(s)) => Value::Object(sorted_payload(s.fields.iter())),
    }
}

fn sorted_payload<'a>(fields: impl Iterator<Item = (&'a String, &'a QdrantValue)>) -> Payload {
    let mut entries: Vec<_> = fields.collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));
    entries.into_iter().map(|(k, v)| (k.clone(), to_json(v))).collect()
}

#[async_trait]
impl VectorIndex for QdrantIndex {
    async fn search(
        &self,
        vector: &[f32],
        top_k: usize,
        score_threshold: f32,
    ) -> Result<Vec<RetrievedItem>> {
        let response = self
            .client
            .search_points(
                SearchPointsBuilder::new(&self.collection, vector.to_vec(), top_k as u64)
                    .score_threshold(score_threshold)
                    .with_payload(true),
            )
            .await
            .map_err(|e| {
                error!(collection = %self.collection, error = %e, "qdrant search failed");
                Self::map_err(e)
            })?;

        let results: Vec<RetrievedItem> = response
            .result
            .into_iter()
            .map(|scored| RetrievedItem {
                id: point_id_to_string(scored.id.as_ref()),
                score: scored.score,
                payload: sorted_payload(scored.payload.iter()),
            })
            .collect();

        debug!(collection = %self.collection, count = results.len(), "qdrant search complete");
        Ok(results)
    }
}

#[async_trait]
impl KnowledgeStore for QdrantIndex {
    async fn recreate_collection(&self, dimensions: usize) -> Result<()> {
        let exists =
            self.client.collection_exists(&self.collection).await.map_err(Self::map_err)?;
        if exists {
            self.client.delete_collection(&self.collection).await.map_err(Self::map_err)?;
            debug!(collection = %self.collection, "deleted qdrant collection");
        }

        self.client
            .create_collection(
                CreateCollectionBuilder::new(&self.collection)
                    .vectors_config(VectorParamsBuilder::new(dimensions as u64, Distance::Cosine)),
            )
            .await
            .map_err(Self::map_err)?;

        debug!(collection = %self.collection, dimensions, "created qdrant collection");
        Ok(())
    }

    async fn upsert(&self, points: &[IndexPoint]) -> Result<()> {
        if points.is_empty() {
            return Ok(());
        }

        let structs = points
            .iter()
            .map(|point| {
                let payload = QdrantPayload::try_from(Value::Object(point.payload.clone()))
                    .map_err(Self::map_err)?;
                Ok(PointStruct::new(point.id, point.vector.clone(), payload))
            })
            .collect::<Result<Vec<_>>>()?;

        self.client
            .upsert_points(UpsertPointsBuilder::new(&self.collection, structs).wait(true))
            .await
            .map_err(|e| {
                error!(collection = %self.collection, error = %e, "qdrant upsert failed");
                Self::map_err(e)
            })?;

        debug!(collection = %self.collection, count = points.len(), "upserted points to qdrant");
        Ok(())
    }

    async fn collection_info(&self) -> Result<CollectionInfo> {
        let response =
            self.client.collection_info(&self.collection).await.map_err(Self::map_err)?;
        Ok(CollectionInfo {
            name: self.collection.clone(),
            points_count: response.result.and_then(|info| info.points_count),
        })
    }

    async fn sample(&self, limit: usize) -> Result<Vec<RetrievedItem>> {
        let response = self
            .client
            .scroll(
                ScrollPointsBuilder::new(&self.collection)
                    .limit(limit.min(u32::MAX as usize) as u32)
                    .with_payload(true),
            )
            .await
            .map_err(Self::map_err)?;

        Ok(response
            .result
            .into_iter()
            .map(|point| RetrievedItem {
                id: point_id_to_string(point.id.as_ref()),
                score: 0.0,
                payload: sorted_payload(point.payload.iter()),
            })
            .collect())
    }
}
