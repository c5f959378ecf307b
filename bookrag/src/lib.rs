//! # bookrag
//!
//! Retrieval-augmented question answering over a book-sized knowledge base.
//!
//! ## Overview
//!
//! A question goes through four steps:
//!
//! 1. an [`EmbeddingProvider`] turns it into a vector (rate-limited calls are
//!    retried by [`RetryingEmbeddingProvider`]);
//! 2. a [`VectorIndex`] returns the closest stored chunks above a score
//!    threshold;
//! 3. [`context::build_context`] numbers their text into one context blob;
//! 4. an [`AnswerGenerator`] asks a [`LanguageModel`] to answer from that
//!    context only, falling back to the context itself if the model fails.
//!
//! [`RagPipeline`] runs the steps and returns a [`RagAnswer`] with source
//! labels. [`Ingestor`] fills a [`KnowledgeStore`] with embedded chunks.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use bookrag::{RagConfig, RagPipeline};
//!
//! let config = RagConfig::from_env()?;
//! let pipeline = RagPipeline::from_config(&config)?;
//! let reply = pipeline.answer("What is a humanoid robot?").await?;
//! println!("{}\nsources: {:?}", reply.answer, reply.sources);
//! ```
//!
//! ## Features
//!
//! | Feature | Provides |
//! |---------|----------|
//! | `gemini` | [`gemini::GeminiEmbeddingProvider`], [`gemini::GeminiLanguageModel`] |
//! | `openai` | [`openai::OpenAICompatibleModel`] (Groq by default) |
//! | `qdrant` | [`qdrant::QdrantIndex`] |

pub mod config;
pub mod context;
pub mod document;
pub mod embedding;
pub mod error;
pub mod generator;
pub mod ingest;
pub mod inmemory;
pub mod model;
pub mod pipeline;
pub mod prompt;
pub mod retry;
pub mod vectorindex;

#[cfg(feature = "gemini")]
pub mod gemini;
#[cfg(feature = "openai")]
pub mod openai;
#[cfg(feature = "qdrant")]
pub mod qdrant;

pub use config::{GeneratorBackend, RagConfig, RagConfigBuilder};
pub use document::{CollectionInfo, IndexPoint, Payload, RetrievedItem};
pub use embedding::EmbeddingProvider;
pub use error::{RagError, Result};
pub use generator::{Answer, AnswerGenerator, AnswerOrigin, GenerationRequest, LanguageModel};
pub use ingest::{IngestReport, Ingestor, SourceChunk};
pub use inmemory::InMemoryIndex;
pub use model::ModelResolver;
pub use pipeline::{QueryRequest, QueryResponse, RagAnswer, RagPipeline, RagPipelineBuilder, Stage};
pub use retry::{RetryPolicy, RetryingEmbeddingProvider};
pub use vectorindex::{KnowledgeStore, VectorIndex};
