//! Gemini embedding and generation over the `v1beta` REST API.
//!
//! This module is only available when the `gemini` feature is enabled.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error};

use crate::config::{DEFAULT_EMBEDDING_MODEL, DEFAULT_GENERATION_MODEL};
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::generator::{GenerationRequest, LanguageModel};
use crate::model::ModelResolver;
use crate::prompt;

/// Base URL of the Gemini REST API.
pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/";

const PROVIDER: &str = "Gemini";

/// Output size of `text-embedding-004`.
const DEFAULT_DIMENSIONS: usize = 768;

/// What an embedding will be used for. Gemini tunes the vector accordingly.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskType {
    /// A search query.
    #[default]
    RetrievalQuery,
    /// A document to be searched.
    RetrievalDocument,
    /// Generic similarity.
    SemanticSimilarity,
}

fn api_key_from_env() -> Result<String> {
    std::env::var("GEMINI_API_KEY").map_err(|_| {
        RagError::ConfigError("GEMINI_API_KEY environment variable not set".to_string())
    })
}

fn normalize_base_url(url: impl Into<String>) -> String {
    let mut url = url.into();
    if !url.ends_with('/') {
        url.push('/');
    }
    url
}

// ── Embeddings ─────────────────────────────────────────────────────

/// An [`EmbeddingProvider`] backed by Gemini `embedContent`.
///
/// Quota and HTTP 429 responses are reported as [`RagError::RateLimited`];
/// wrap the provider in a [`RetryingEmbeddingProvider`](crate::RetryingEmbeddingProvider)
/// to retry them.
///
/// # Example
///
/// ```rust,ignore
/// use bookrag::gemini::GeminiEmbeddingProvider;
///
/// let provider = GeminiEmbeddingProvider::new("your-api-key")?;
/// let embedding = provider.embed("What is a robot?").await?;
/// ```
pub struct GeminiEmbeddingProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    task_type: TaskType,
    dimensions: usize,
}

impl GeminiEmbeddingProvider {
    /// Create a provider for `text-embedding-004` with the given API key.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(RagError::ConfigError("Gemini API key must not be empty".to_string()));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: GEMINI_BASE_URL.to_string(),
            model: embedding_resolver().resolve(DEFAULT_EMBEDDING_MODEL),
            task_type: TaskType::default(),
            dimensions: DEFAULT_DIMENSIONS,
        })
    }

    /// Create a provider using the `GEMINI_API_KEY` environment variable.
    pub fn from_env() -> Result<Self> {
        Self::new(api_key_from_env()?)
    }

    /// Set the embedding model. A missing `models/` prefix is added.
    pub fn with_model(mut self, model: impl AsRef<str>) -> Self {
        self.model = embedding_resolver().resolve(model.as_ref());
        self
    }

    /// Set the task type sent with each request.
    pub fn with_task_type(mut self, task_type: TaskType) -> Self {
        self.task_type = task_type;
        self
    }

    /// Set the dimensionality reported by [`dimensions()`](EmbeddingProvider::dimensions).
    pub fn with_dimensions(mut self, dimensions: usize) -> Self {
        self.dimensions = dimensions;
        self
    }

    /// Use a different API base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = normalize_base_url(url);
        self
    }

    /// Share an existing HTTP client.
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }
}

fn embedding_resolver() -> ModelResolver {
    ModelResolver::new().with_prefix("models/")
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EmbedContentRequest<'a> {
    model: &'a str,
    content: Content<'a>,
    task_type: TaskType,
}

#[derive(Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'a str>,
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct EmbedContentResponse {
    embedding: ContentEmbedding,
}

#[derive(Deserialize)]
struct ContentEmbedding {
    values: Vec<f32>,
}

#[async_trait]
impl EmbeddingProvider for GeminiEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        debug!(provider = PROVIDER, model = %self.model, text_len = text.len(), "embedding text");

        let body = EmbedContentRequest {
            model: &self.model,
            content: Content { role: None, parts: vec![Part { text }] },
            task_type: self.task_type,
        };

        let response = self
            .client
            .post(format!("{}{}:embedContent", self.base_url, self.model))
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                error!(provider = PROVIDER, error = %e, "embedding request failed");
                RagError::EmbeddingError {
                    provider: PROVIDER.into(),
                    message: format!("request failed: {e}"),
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let failure = ApiFailure::from_response(status.as_u16(), &body);
            error!(provider = PROVIDER, %status, rate_limited = failure.rate_limited, "API error");
            return Err(failure.into_embedding_error());
        }

        let parsed: EmbedContentResponse = response.json().await.map_err(|e| {
            error!(provider = PROVIDER, error = %e, "failed to parse embedding response");
            RagError::EmbeddingError {
                provider: PROVIDER.into(),
                message: format!("failed to parse response: {e}"),
            }
        })?;

        if parsed.embedding.values.is_empty() {
            return Err(RagError::EmbeddingError {
                provider: PROVIDER.into(),
                message: "API returned an empty embedding".into(),
            });
        }
        Ok(parsed.embedding.values)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model(&self) -> &str {
        &self.model
    }
}

// ── Generation ─────────────────────────────────────────────────────

/// A [`LanguageModel`] backed by Gemini `generateContent`.
///
/// Gemini receives one prompt: the system rules followed by the user turn.
/// Model names go through [`ModelResolver::gemini_defaults`], so retired 1.5
/// models are served by `gemini-2.0-flash`.
pub struct GeminiLanguageModel {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl GeminiLanguageModel {
    /// Create a model client for `gemini-1.5-flash` with the given API key.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(RagError::ConfigError("Gemini API key must not be empty".to_string()));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: GEMINI_BASE_URL.to_string(),
            model: ModelResolver::gemini_defaults().resolve(DEFAULT_GENERATION_MODEL),
        })
    }

    /// Create a model client using the `GEMINI_API_KEY` environment variable.
    pub fn from_env() -> Result<Self> {
        Self::new(api_key_from_env()?)
    }

    /// Set the model using the default Gemini resolver.
    pub fn with_model(self, model: impl AsRef<str>) -> Self {
        self.with_resolved_model(model, &ModelResolver::gemini_defaults())
    }

    /// Set the model using a custom resolver.
    pub fn with_resolved_model(mut self, model: impl AsRef<str>, resolver: &ModelResolver) -> Self {
        self.model = resolver.resolve(model.as_ref());
        self
    }

    /// Use a different API base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = normalize_base_url(url);
        self
    }

    /// Share an existing HTTP client.
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    /// The resolved model identifier.
    pub fn model(&self) -> &str {
        &self.model
    }
}

#[derive(Serialize)]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Deserialize, Default)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

impl GenerateContentResponse {
    fn text(&self) -> String {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|content| content.parts.iter().filter_map(|p| p.text.as_deref()).collect())
            .unwrap_or_default()
    }
}

fn generation_error(message: impl Into<String>) -> RagError {
    RagError::GenerationError { provider: PROVIDER.into(), message: message.into() }
}

#[async_trait]
impl LanguageModel for GeminiLanguageModel {
    async fn complete(&self, request: &GenerationRequest) -> Result<String> {
        let prompt = prompt::build_single_prompt(&request.system, &request.user);
        let body = GenerateContentRequest {
            contents: vec![Content { role: Some("user"), parts: vec![Part { text: &prompt }] }],
        };

        debug!(provider = PROVIDER, model = %self.model, prompt_len = prompt.len(), "generating");

        let response = self
            .client
            .post(format!("{}{}:generateContent", self.base_url, self.model))
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| generation_error(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let failure = ApiFailure::from_response(status.as_u16(), &body);
            return Err(generation_error(format!("API returned {status}: {}", failure.message)));
        }

        let parsed: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| generation_error(format!("failed to parse response: {e}")))?;

        let text = parsed.text();
        if text.trim().is_empty() {
            return Err(generation_error("response contained no text"));
        }
        Ok(text)
    }

    fn name(&self) -> &str {
        PROVIDER
    }
}

// ── Error classification ───────────────────────────────────────────

#[derive(Deserialize)]
struct GoogleErrorResponse {
    error: GoogleError,
}

#[derive(Deserialize)]
struct GoogleError {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: String,
    #[serde(default)]
    details: Vec<Value>,
}

/// A non-success API response reduced to what the retry logic needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ApiFailure {
    pub(crate) message: String,
    pub(crate) rate_limited: bool,
    pub(crate) quota_reset: bool,
}

impl ApiFailure {
    /// Classify an error response.
    ///
    /// Rate limiting is read from the HTTP status and the Google `status`
    /// field. Bodies that are not Google error JSON fall back to looking for
    /// "Quota exceeded" or "429" in the text.
    pub(crate) fn from_response(status: u16, body: &str) -> Self {
        match serde_json::from_str::<GoogleErrorResponse>(body) {
            Ok(GoogleErrorResponse { error }) => {
                let rate_limited = status == 429 || error.status == "RESOURCE_EXHAUSTED";
                let has_retry_info = error.details.iter().any(|detail| {
                    detail
                        .get("@type")
                        .and_then(Value::as_str)
                        .is_some_and(|t| t.ends_with("google.rpc.RetryInfo"))
                });
                let quota_reset = rate_limited
                    && (has_retry_info || error.message.to_lowercase().contains("retry in"));
                Self { message: error.message, rate_limited, quota_reset }
            }
            Err(_) => {
                let rate_limited =
                    status == 429 || body.contains("Quota exceeded") || body.contains("429");
                let quota_reset = rate_limited && body.to_lowercase().contains("retry in");
                Self { message: body.to_string(), rate_limited, quota_reset }
            }
        }
    }

    fn into_embedding_error(self) -> RagError {
        if self.rate_limited {
            RagError::RateLimited {
                provider: PROVIDER.into(),
                message: self.message,
                quota_reset: self.quota_reset,
            }
        } else {
            RagError::EmbeddingError { provider: PROVIDER.into(), message: self.message }
        }
    }
}
