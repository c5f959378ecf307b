//! Configuration for the RAG pipeline.
//!
//! A [`RagConfig`] is resolved once at startup, either through
//! [`RagConfig::builder()`] or [`RagConfig::from_env()`], and never mutated
//! afterwards. Missing credentials are reported as [`RagError::ConfigError`]
//! so the process can refuse to start.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};
use crate::retry::RetryPolicy;

/// Default number of results fetched from the vector index.
pub const DEFAULT_TOP_K: usize = 5;

/// Default minimum similarity score for retrieved items.
pub const DEFAULT_SCORE_THRESHOLD: f32 = 0.15;

/// Default Gemini generation model.
pub const DEFAULT_GENERATION_MODEL: &str = "gemini-1.5-flash";

/// Default Gemini embedding model.
pub const DEFAULT_EMBEDDING_MODEL: &str = "models/text-embedding-004";

/// Default Groq chat model.
pub const DEFAULT_GROQ_MODEL: &str = "llama-3.1-70b-versatile";

/// Which language model backend answers questions.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum GeneratorBackend {
    /// Groq through its OpenAI-compatible chat completions API.
    #[default]
    Groq,
    /// Gemini `generateContent`.
    Gemini,
}

impl FromStr for GeneratorBackend {
    type Err = RagError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "groq" => Ok(Self::Groq),
            "gemini" => Ok(Self::Gemini),
            other => Err(RagError::ConfigError(format!(
                "unknown generator backend '{other}' (expected 'groq' or 'gemini')"
            ))),
        }
    }
}

/// Configuration parameters for the RAG pipeline.
#[derive(Clone, Serialize, Deserialize, PartialEq)]
pub struct RagConfig {
    /// Gemini API key, used for embeddings and (optionally) generation.
    pub gemini_api_key: String,
    /// Groq API key, required when `generator` is [`GeneratorBackend::Groq`].
    pub groq_api_key: Option<String>,
    /// Qdrant endpoint URL.
    pub qdrant_url: String,
    /// Qdrant API key (cloud deployments).
    pub qdrant_api_key: Option<String>,
    /// Name of the collection holding the knowledge base.
    pub collection: String,
    /// Number of top results to return from vector search.
    pub top_k: usize,
    /// Minimum similarity score for results (results below this are filtered out).
    pub score_threshold: f32,
    /// Gemini generation model identifier.
    pub generation_model: String,
    /// Gemini embedding model identifier.
    pub embedding_model: String,
    /// Groq chat model identifier.
    pub groq_model: String,
    /// Backend used to generate answers.
    pub generator: GeneratorBackend,
    /// Retry policy for rate-limited embedding calls.
    pub retry: RetryPolicy,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            gemini_api_key: String::new(),
            groq_api_key: None,
            qdrant_url: "http://localhost:6334".to_string(),
            qdrant_api_key: None,
            collection: String::new(),
            top_k: DEFAULT_TOP_K,
            score_threshold: DEFAULT_SCORE_THRESHOLD,
            generation_model: DEFAULT_GENERATION_MODEL.to_string(),
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            groq_model: DEFAULT_GROQ_MODEL.to_string(),
            generator: GeneratorBackend::default(),
            retry: RetryPolicy::default(),
        }
    }
}

impl fmt::Debug for RagConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn redact(set: bool) -> &'static str {
            if set { "<set>" } else { "<unset>" }
        }

        f.debug_struct("RagConfig")
            .field("gemini_api_key", &redact(!self.gemini_api_key.is_empty()))
            .field("groq_api_key", &redact(self.groq_api_key.is_some()))
            .field("qdrant_url", &self.qdrant_url)
            .field("qdrant_api_key", &redact(self.qdrant_api_key.is_some()))
            .field("collection", &self.collection)
            .field("top_k", &self.top_k)
            .field("score_threshold", &self.score_threshold)
            .field("generation_model", &self.generation_model)
            .field("embedding_model", &self.embedding_model)
            .field("groq_model", &self.groq_model)
            .field("generator", &self.generator)
            .field("retry", &self.retry)
            .finish()
    }
}

impl RagConfig {
    /// Create a new builder for constructing a [`RagConfig`].
    pub fn builder() -> RagConfigBuilder {
        RagConfigBuilder::default()
    }

    /// Load and validate the configuration from process environment variables.
    ///
    /// | Variable | Field |
    /// |----------|-------|
    /// | `GEMINI_API_KEY` | `gemini_api_key` (required) |
    /// | `GROQ_API_KEY` | `groq_api_key` (required for the Groq backend) |
    /// | `QDRANT_URL` or `QDRANT_ENDPOINT` | `qdrant_url` (required) |
    /// | `QDRANT_API_KEY` | `qdrant_api_key` |
    /// | `QDRANT_COLLECTION` | `collection` (required) |
    /// | `QDRANT_TOP_K` | `top_k` |
    /// | `QDRANT_SCORE_THRESHOLD` | `score_threshold` |
    /// | `GEMINI_MODEL` | `generation_model` |
    /// | `GEMINI_EMBED_MODEL` | `embedding_model` |
    /// | `GROQ_MODEL` | `groq_model` |
    /// | `RAG_GENERATOR` | `generator` (`groq` or `gemini`) |
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if a required variable is missing or a
    /// numeric variable cannot be parsed.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`from_env`](Self::from_env) but reads variables through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let require = |name: &str| {
            get(name).ok_or_else(|| {
                RagError::ConfigError(format!("missing environment variable: {name}"))
            })
        };

        let qdrant_url = get("QDRANT_URL").or_else(|| get("QDRANT_ENDPOINT")).ok_or_else(|| {
            RagError::ConfigError(
                "missing environment variable: QDRANT_URL or QDRANT_ENDPOINT".to_string(),
            )
        })?;

        let mut builder = RagConfig::builder()
            .gemini_api_key(require("GEMINI_API_KEY")?)
            .qdrant_url(qdrant_url)
            .collection(require("QDRANT_COLLECTION")?);

        if let Some(key) = get("GROQ_API_KEY") {
            builder = builder.groq_api_key(key);
        }
        if let Some(key) = get("QDRANT_API_KEY") {
            builder = builder.qdrant_api_key(key);
        }
        if let Some(top_k) = get("QDRANT_TOP_K") {
            builder = builder.top_k(parse_var("QDRANT_TOP_K", &top_k)?);
        }
        if let Some(threshold) = get("QDRANT_SCORE_THRESHOLD") {
            builder = builder.score_threshold(parse_var("QDRANT_SCORE_THRESHOLD", &threshold)?);
        }
        if let Some(model) = get("GEMINI_MODEL") {
            builder = builder.generation_model(model);
        }
        if let Some(model) = get("GEMINI_EMBED_MODEL") {
            builder = builder.embedding_model(model);
        }
        if let Some(model) = get("GROQ_MODEL") {
            builder = builder.groq_model(model);
        }
        if let Some(generator) = get("RAG_GENERATOR") {
            builder = builder.generator(generator.parse()?);
        }

        builder.build()
    }
}

fn parse_var<T: FromStr>(name: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| RagError::ConfigError(format!("invalid value for {name}: '{value}'")))
}

/// Builder for constructing a validated [`RagConfig`].
#[derive(Debug, Clone, Default)]
pub struct RagConfigBuilder {
    config: RagConfig,
}

impl RagConfigBuilder {
    /// Set the Gemini API key.
    pub fn gemini_api_key(mut self, key: impl Into<String>) -> Self {
        self.config.gemini_api_key = key.into();
        self
    }

    /// Set the Groq API key.
    pub fn groq_api_key(mut self, key: impl Into<String>) -> Self {
        self.config.groq_api_key = Some(key.into());
        self
    }

    /// Set the Qdrant endpoint URL.
    pub fn qdrant_url(mut self, url: impl Into<String>) -> Self {
        self.config.qdrant_url = url.into();
        self
    }

    /// Set the Qdrant API key.
    pub fn qdrant_api_key(mut self, key: impl Into<String>) -> Self {
        self.config.qdrant_api_key = Some(key.into());
        self
    }

    /// Set the collection name.
    pub fn collection(mut self, name: impl Into<String>) -> Self {
        self.config.collection = name.into();
        self
    }

    /// Set the number of top results to return from vector search.
    pub fn top_k(mut self, k: usize) -> Self {
        self.config.top_k = k;
        self
    }

    /// Set the minimum similarity threshold for filtering results.
    pub fn score_threshold(mut self, threshold: f32) -> Self {
        self.config.score_threshold = threshold;
        self
    }

    /// Set the Gemini generation model.
    pub fn generation_model(mut self, model: impl Into<String>) -> Self {
        self.config.generation_model = model.into();
        self
    }

    /// Set the Gemini embedding model.
    pub fn embedding_model(mut self, model: impl Into<String>) -> Self {
        self.config.embedding_model = model.into();
        self
    }

    /// Set the Groq chat model.
    pub fn groq_model(mut self, model: impl Into<String>) -> Self {
        self.config.groq_model = model.into();
        self
    }

    /// Select the answer generation backend.
    pub fn generator(mut self, generator: GeneratorBackend) -> Self {
        self.config.generator = generator;
        self
    }

    /// Set the embedding retry policy.
    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.config.retry = retry;
        self
    }

    /// Build the [`RagConfig`], validating that parameters are consistent.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if:
    /// - the Gemini API key, Qdrant URL or collection name is empty
    /// - the Groq backend is selected without a Groq API key
    /// - `top_k == 0`
    /// - `score_threshold` is not finite
    /// - the retry policy allows zero attempts
    pub fn build(self) -> Result<RagConfig> {
        let config = self.config;
        if config.gemini_api_key.trim().is_empty() {
            return Err(RagError::ConfigError("gemini_api_key is required".to_string()));
        }
        if config.qdrant_url.trim().is_empty() {
            return Err(RagError::ConfigError("qdrant_url is required".to_string()));
        }
        if config.collection.trim().is_empty() {
            return Err(RagError::ConfigError("collection is required".to_string()));
        }
        if config.generator == GeneratorBackend::Groq
            && config.groq_api_key.as_deref().is_none_or(|k| k.trim().is_empty())
        {
            return Err(RagError::ConfigError(
                "groq_api_key is required when the groq generator is selected".to_string(),
            ));
        }
        if config.top_k == 0 {
            return Err(RagError::ConfigError("top_k must be greater than zero".to_string()));
        }
        if !config.score_threshold.is_finite() {
            return Err(RagError::ConfigError(format!(
                "score_threshold must be finite, got {}",
                config.score_threshold
            )));
        }
        if config.retry.max_attempts == 0 {
            return Err(RagError::ConfigError(
                "retry.max_attempts must be greater than zero".to_string(),
            ));
        }
        Ok(config)
    }
}
