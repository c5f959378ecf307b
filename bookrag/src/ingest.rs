//! Batch ingestion of pre-chunked text into a [`KnowledgeStore`].
//!
//! Finding and splitting source files is left to the caller; the
//! [`Ingestor`] takes chunks, embeds them one by one and writes them in
//! batches with the payload layout the query path reads:
//! `{"content", "source", "metadata": {"type": "text"}}`.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{error, info, warn};

use crate::document::{IndexPoint, Payload};
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::vectorindex::KnowledgeStore;

/// Chunks shorter than this (in characters, after trimming) are skipped.
pub const DEFAULT_MIN_CHUNK_CHARS: usize = 50;

/// Points written per upsert call.
pub const DEFAULT_BATCH_SIZE: usize = 50;

/// One piece of source text plus where it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceChunk {
    /// The chunk text.
    pub content: String,
    /// Path of the source document, relative to the document root.
    pub source: String,
}

impl SourceChunk {
    /// Create a chunk.
    pub fn new(content: impl Into<String>, source: impl Into<String>) -> Self {
        Self { content: content.into(), source: source.into() }
    }
}

/// Outcome of an [`Ingestor::ingest`] run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestReport {
    /// Chunks embedded and written.
    pub embedded: usize,
    /// Chunks below the minimum length.
    pub skipped: usize,
    /// Chunks whose embedding failed.
    pub failed: usize,
    /// Upsert calls made.
    pub batches: usize,
}

/// Embeds chunks and upserts them into a [`KnowledgeStore`].
///
/// # Example
///
/// ```rust,ignore
/// use bookrag::{Ingestor, SourceChunk};
///
/// let ingestor = Ingestor::new(embedder, store);
/// ingestor.prepare().await?;
/// let report = ingestor
///     .ingest(&[SourceChunk::new("Robots are programmable machines ...", "intro.md")])
///     .await?;
/// ```
pub struct Ingestor {
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn KnowledgeStore>,
    min_chunk_chars: usize,
    batch_size: usize,
    first_id: u64,
}

impl Ingestor {
    /// Create an ingestor with the default chunk filter and batch size.
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, store: Arc<dyn KnowledgeStore>) -> Self {
        Self {
            embedder,
            store,
            min_chunk_chars: DEFAULT_MIN_CHUNK_CHARS,
            batch_size: DEFAULT_BATCH_SIZE,
            first_id: 0,
        }
    }

    /// Set the minimum chunk length.
    pub fn with_min_chunk_chars(mut self, min: usize) -> Self {
        self.min_chunk_chars = min;
        self
    }

    /// Set the number of points per upsert. Zero is treated as one.
    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = size.max(1);
        self
    }

    /// Set the id given to the first written point.
    pub fn with_first_id(mut self, id: u64) -> Self {
        self.first_id = id;
        self
    }

    /// Drop and recreate the collection sized for the embedding provider.
    pub async fn prepare(&self) -> Result<()> {
        let dimensions = self.embedder.dimensions();
        info!(dimensions, "recreating collection");
        self.store.recreate_collection(dimensions).await.map_err(|e| {
            error!(error = %e, "failed to recreate collection");
            e
        })
    }

    /// Embed and store `chunks`.
    ///
    /// Ids are assigned sequentially from the configured first id, counting
    /// only chunks that were written. A chunk whose embedding fails is logged
    /// and left out.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::VectorIndexError`] as soon as an upsert fails.
    pub async fn ingest(&self, chunks: &[SourceChunk]) -> Result<IngestReport> {
        let mut report = IngestReport::default();
        let mut pending: Vec<IndexPoint> = Vec::with_capacity(self.batch_size);
        let mut next_id = self.first_id;

        for chunk in chunks {
            let content = chunk.content.trim();
            if content.chars().count() < self.min_chunk_chars {
                report.skipped += 1;
                continue;
            }

            let vector = match self.embedder.embed(content).await {
                Ok(vector) => vector,
                Err(e) => {
                    warn!(source = %chunk.source, error = %e, "skipping chunk, embedding failed");
                    report.failed += 1;
                    continue;
                }
            };

            pending.push(IndexPoint {
                id: next_id,
                vector,
                payload: chunk_payload(content, &chunk.source),
            });
            next_id += 1;
            report.embedded += 1;

            if pending.len() >= self.batch_size {
                self.flush(&mut pending, &mut report).await?;
            }
        }

        if !pending.is_empty() {
            self.flush(&mut pending, &mut report).await?;
        }

        info!(
            embedded = report.embedded,
            skipped = report.skipped,
            failed = report.failed,
            batches = report.batches,
            "ingestion complete"
        );
        Ok(report)
    }

    async fn flush(&self, pending: &mut Vec<IndexPoint>, report: &mut IngestReport) -> Result<()> {
        self.store.upsert(pending).await.map_err(|e| {
            error!(count = pending.len(), error = %e, "upsert failed during ingestion");
            match e {
                RagError::VectorIndexError { .. } => e,
                other => RagError::VectorIndexError {
                    backend: "unknown".to_string(),
                    message: other.to_string(),
                },
            }
        })?;
        info!(count = pending.len(), "upserted batch");
        report.batches += 1;
        pending.clear();
        Ok(())
    }
}

/// Payload written for one chunk.
pub fn chunk_payload(content: &str, source: &str) -> Payload {
    let mut payload = Payload::new();
    payload.insert("content".to_string(), Value::String(content.to_string()));
    payload.insert("source".to_string(), Value::String(source.to_string()));
    payload.insert("metadata".to_string(), json!({"type": "text"}));
    payload
}
