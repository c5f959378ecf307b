//! RAG pipeline orchestrator.
//!
//! The [`RagPipeline`] answers one question per call by composing an
//! [`EmbeddingProvider`], a [`VectorIndex`] and an [`AnswerGenerator`]:
//! embed → search → build context → generate.
//!
//! # Example
//!
//! ```rust,ignore
//! use bookrag::{AnswerGenerator, InMemoryIndex, RagConfig, RagPipeline};
//!
//! let pipeline = RagPipeline::builder()
//!     .config(RagConfig::default())
//!     .embedding_provider(Arc::new(my_embedder))
//!     .vector_index(Arc::new(InMemoryIndex::new("book")))
//!     .generator(AnswerGenerator::new(Arc::new(my_model)))
//!     .build()?;
//!
//! let answer = pipeline.answer("What is a robot?").await?;
//! println!("{}", answer.answer);
//! ```

use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::config::RagConfig;
use crate::context;
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::generator::{Answer, AnswerGenerator};
use crate::vectorindex::VectorIndex;

/// Where a request currently is in the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Not started.
    Idle,
    /// Embedding the question.
    Embedding,
    /// Querying the vector index.
    Searching,
    /// Turning results into context.
    BuildingContext,
    /// Asking the language model.
    Generating,
    /// Answer ready.
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Idle => "idle",
            Stage::Embedding => "embedding",
            Stage::Searching => "searching",
            Stage::BuildingContext => "building_context",
            Stage::Generating => "generating",
            Stage::Done => "done",
        };
        f.write_str(name)
    }
}

/// An answer plus the source labels of the items it was drawn from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RagAnswer {
    /// The answer.
    pub answer: Answer,
    /// One label per retrieved item, in result order. Empty for
    /// no-information and degraded answers.
    pub sources: Vec<String>,
}

impl RagAnswer {
    fn without_sources(answer: Answer) -> Self {
        Self { answer, sources: Vec::new() }
    }
}

/// Inbound question, as received from a chat client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryRequest {
    /// The user's question.
    pub query: String,
    /// Opaque conversation id, echoed back unchanged.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

impl QueryRequest {
    /// A request without a session id.
    pub fn new(query: impl Into<String>) -> Self {
        Self { query: query.into(), session_id: None }
    }

    /// Attach a session id.
    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }
}

/// Reply to a [`QueryRequest`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryResponse {
    /// Answer text.
    pub response: String,
    /// Source labels of the retrieved items.
    pub sources: Vec<String>,
    /// The request's session id.
    #[serde(default)]
    pub session_id: Option<String>,
}

/// The RAG pipeline orchestrator.
///
/// Built once at startup and shared (it is `Send + Sync`); every call to
/// [`answer`](Self::answer) is independent. Construct one via
/// [`RagPipeline::builder()`].
pub struct RagPipeline {
    config: RagConfig,
    embedding_provider: Arc<dyn EmbeddingProvider>,
    vector_index: Arc<dyn VectorIndex>,
    generator: AnswerGenerator,
}

impl RagPipeline {
    /// Create a new [`RagPipelineBuilder`].
    pub fn builder() -> RagPipelineBuilder {
        RagPipelineBuilder::default()
    }

    /// Wire the production collaborators described by `config`.
    ///
    /// Embeddings come from Gemini behind a
    /// [`RetryingEmbeddingProvider`](crate::RetryingEmbeddingProvider), search
    /// from Qdrant, and answers from the configured generator backend.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] for a missing credential and
    /// [`RagError::VectorIndexError`] if the Qdrant client cannot be built.
    #[cfg(all(feature = "gemini", feature = "openai", feature = "qdrant"))]
    pub fn from_config(config: &RagConfig) -> Result<Self> {
        use crate::config::GeneratorBackend;
        use crate::gemini::{GeminiEmbeddingProvider, GeminiLanguageModel, TaskType};
        use crate::generator::LanguageModel;
        use crate::openai::OpenAICompatibleModel;
        use crate::qdrant::QdrantIndex;
        use crate::retry::RetryingEmbeddingProvider;

        let http = reqwest::Client::new();

        let embedder = GeminiEmbeddingProvider::new(&config.gemini_api_key)?
            .with_model(&config.embedding_model)
            .with_task_type(TaskType::RetrievalQuery)
            .with_client(http.clone());
        let embedder = RetryingEmbeddingProvider::new(Arc::new(embedder), config.retry);

        let index = QdrantIndex::new(
            &config.qdrant_url,
            config.qdrant_api_key.as_deref(),
            &config.collection,
        )?;

        let model: Arc<dyn LanguageModel> = match config.generator {
            GeneratorBackend::Groq => {
                let key = config.groq_api_key.as_deref().ok_or_else(|| {
                    RagError::ConfigError("groq_api_key is required".to_string())
                })?;
                Arc::new(
                    OpenAICompatibleModel::groq(key)?
                        .with_model(&config.groq_model)
                        .with_client(http),
                )
            }
            GeneratorBackend::Gemini => Arc::new(
                GeminiLanguageModel::new(&config.gemini_api_key)?
                    .with_model(&config.generation_model)
                    .with_client(http),
            ),
        };

        info!(
            collection = %config.collection,
            generator = ?config.generator,
            top_k = config.top_k,
            score_threshold = config.score_threshold,
            "rag pipeline initialized"
        );

        Self::builder()
            .config(config.clone())
            .embedding_provider(Arc::new(embedder))
            .vector_index(Arc::new(index))
            .generator(AnswerGenerator::new(model))
            .build()
    }

    /// Return a reference to the pipeline configuration.
    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    /// Return a reference to the embedding provider.
    pub fn embedding_provider(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.embedding_provider
    }

    /// Return a reference to the vector index.
    pub fn vector_index(&self) -> &Arc<dyn VectorIndex> {
        &self.vector_index
    }

    /// Answer `question` from the knowledge base.
    ///
    /// Nothing retrieved (or only blank text) yields the fixed no-information
    /// answer. A failing language model yields the retrieved context under the
    /// fallback header. A panic in a collaborator yields the degraded apology
    /// with no sources.
    ///
    /// # Errors
    ///
    /// - [`RagError::InvalidQuery`] if `question` is blank.
    /// - [`RagError::EmbeddingError`] / [`RagError::RateLimited`] if the
    ///   question cannot be embedded.
    /// - [`RagError::VectorIndexError`] if the search fails.
    pub async fn answer(&self, question: &str) -> Result<RagAnswer> {
        if question.trim().is_empty() {
            return Err(RagError::InvalidQuery("query must not be empty".to_string()));
        }

        // Every stage error is mapped to a request-failing variant in `run`.
        match AssertUnwindSafe(self.run(question)).catch_unwind().await {
            Ok(result) => result,
            Err(panic) => {
                error!(panic = panic_message(&*panic), "query panicked, returning degraded answer");
                Ok(RagAnswer::without_sources(Answer::degraded()))
            }
        }
    }

    /// Answer a [`QueryRequest`], echoing its session id.
    ///
    /// # Errors
    ///
    /// Same as [`answer`](Self::answer).
    pub async fn submit(&self, request: QueryRequest) -> Result<QueryResponse> {
        let RagAnswer { answer, sources } = self.answer(&request.query).await?;
        Ok(QueryResponse { response: answer.text, sources, session_id: request.session_id })
    }

    async fn run(&self, question: &str) -> Result<RagAnswer> {
        trace_stage(Stage::Idle, Stage::Embedding);
        let query_embedding = self.embedding_provider.embed(question).await.map_err(|e| {
            error!(
                model = self.embedding_provider.model(),
                error = %e,
                "embedding failed during query"
            );
            match e {
                RagError::EmbeddingError { .. } | RagError::RateLimited { .. } => e,
                other => RagError::EmbeddingError {
                    provider: self.embedding_provider.model().into(),
                    message: other.to_string(),
                },
            }
        })?;

        trace_stage(Stage::Embedding, Stage::Searching);
        let results = self
            .vector_index
            .search(&query_embedding, self.config.top_k, self.config.score_threshold)
            .await
            .map_err(|e| {
                error!(collection = %self.config.collection, error = %e, "vector search failed");
                match e {
                    RagError::VectorIndexError { .. } => e,
                    other => RagError::VectorIndexError {
                        backend: "unknown".to_string(),
                        message: other.to_string(),
                    },
                }
            })?;

        if results.is_empty() {
            info!(result_count = 0, "no matching context");
            return Ok(RagAnswer::without_sources(Answer::no_information()));
        }

        trace_stage(Stage::Searching, Stage::BuildingContext);
        let context_text = context::build_context(&results);
        if context_text.trim().is_empty() {
            info!(result_count = results.len(), "retrieved items carry no text");
            return Ok(RagAnswer::without_sources(Answer::no_information()));
        }

        trace_stage(Stage::BuildingContext, Stage::Generating);
        let answer = self.generator.generate(question, &context_text).await;

        trace_stage(Stage::Generating, Stage::Done);
        let sources = context::sources(&results);
        info!(result_count = results.len(), origin = ?answer.origin, "query completed");

        Ok(RagAnswer { answer, sources })
    }
}

fn trace_stage(from: Stage, to: Stage) {
    debug!(%from, %to, "pipeline stage");
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    panic
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("<non-string panic payload>")
}

impl fmt::Debug for RagPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RagPipeline")
            .field("config", &self.config)
            .field("embedding_model", &self.embedding_provider.model())
            .field("generator", &self.generator)
            .finish_non_exhaustive()
    }
}

/// Builder for constructing a [`RagPipeline`].
///
/// All fields are required. Call [`build()`](RagPipelineBuilder::build)
/// to validate and produce the pipeline.
#[derive(Default)]
pub struct RagPipelineBuilder {
    config: Option<RagConfig>,
    embedding_provider: Option<Arc<dyn EmbeddingProvider>>,
    vector_index: Option<Arc<dyn VectorIndex>>,
    generator: Option<AnswerGenerator>,
}

impl RagPipelineBuilder {
    /// Set the pipeline configuration.
    pub fn config(mut self, config: RagConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the embedding provider.
    pub fn embedding_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedding_provider = Some(provider);
        self
    }

    /// Set the vector index.
    pub fn vector_index(mut self, index: Arc<dyn VectorIndex>) -> Self {
        self.vector_index = Some(index);
        self
    }

    /// Set the answer generator.
    pub fn generator(mut self, generator: AnswerGenerator) -> Self {
        self.generator = Some(generator);
        self
    }

    /// Build the [`RagPipeline`], validating that all required fields are set.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if any required field is missing or
    /// the configured `top_k` is zero.
    pub fn build(self) -> Result<RagPipeline> {
        let config =
            self.config.ok_or_else(|| RagError::ConfigError("config is required".to_string()))?;
        if config.top_k == 0 {
            return Err(RagError::ConfigError("top_k must be greater than zero".to_string()));
        }
        let embedding_provider = self
            .embedding_provider
            .ok_or_else(|| RagError::ConfigError("embedding_provider is required".to_string()))?;
        let vector_index = self
            .vector_index
            .ok_or_else(|| RagError::ConfigError("vector_index is required".to_string()))?;
        let generator = self
            .generator
            .ok_or_else(|| RagError::ConfigError("generator is required".to_string()))?;

        Ok(RagPipeline { config, embedding_provider, vector_index, generator })
    }
}
