//! OpenAI-compatible chat completions (Groq by default).
//!
//! This module is only available when the `openai` feature is enabled.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::config::DEFAULT_GROQ_MODEL;
use crate::error::{RagError, Result};
use crate::generator::{GenerationRequest, LanguageModel};

/// Groq's OpenAI-compatible API base URL.
pub const GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1";

const DEFAULT_TEMPERATURE: f32 = 0.2;
const DEFAULT_TOP_P: f32 = 0.9;

/// A [`LanguageModel`] speaking the OpenAI `/chat/completions` protocol.
///
/// # Configuration
///
/// - `base_url` – defaults to [`GROQ_BASE_URL`].
/// - `model` – defaults to `llama-3.1-70b-versatile`.
/// - `temperature` / `top_p` – default to `0.2` / `0.9`.
/// - `api_key` – from the constructor or the `GROQ_API_KEY` environment variable.
///
/// # Example
///
/// ```rust,ignore
/// use bookrag::openai::OpenAICompatibleModel;
///
/// let model = OpenAICompatibleModel::groq("gsk-...")?;
/// let generator = AnswerGenerator::new(Arc::new(model));
/// ```
pub struct OpenAICompatibleModel {
    client: reqwest::Client,
    provider: String,
    base_url: String,
    api_key: String,
    model: String,
    temperature: f32,
    top_p: f32,
}

impl OpenAICompatibleModel {
    /// Create a client for an arbitrary OpenAI-compatible endpoint.
    pub fn new(
        provider: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Result<Self> {
        let provider = provider.into();
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(RagError::ConfigError(format!("{provider} API key must not be empty")));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            provider,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            model: DEFAULT_GROQ_MODEL.into(),
            temperature: DEFAULT_TEMPERATURE,
            top_p: DEFAULT_TOP_P,
        })
    }

    /// Create a Groq client with the given API key.
    pub fn groq(api_key: impl Into<String>) -> Result<Self> {
        Self::new("Groq", GROQ_BASE_URL, api_key)
    }

    /// Create a Groq client using the `GROQ_API_KEY` environment variable.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("GROQ_API_KEY").map_err(|_| {
            RagError::ConfigError("GROQ_API_KEY environment variable not set".to_string())
        })?;
        Self::groq(api_key)
    }

    /// Set the model name.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the sampling temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Set nucleus sampling.
    pub fn with_top_p(mut self, top_p: f32) -> Self {
        self.top_p = top_p;
        self
    }

    /// Share an existing HTTP client.
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    /// The model name sent with each request.
    pub fn model(&self) -> &str {
        &self.model
    }

    fn chat_request<'a>(&'a self, request: &'a GenerationRequest) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage { role: "system", content: &request.system },
                ChatMessage { role: "user", content: &request.user },
            ],
            temperature: self.temperature,
            top_p: self.top_p,
        }
    }

    fn error(&self, message: impl Into<String>) -> RagError {
        RagError::GenerationError { provider: self.provider.clone(), message: message.into() }
    }
}

// ── Chat completions request/response types ────────────────────────

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    top_p: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

// ── LanguageModel implementation ───────────────────────────────────

#[async_trait]
impl LanguageModel for OpenAICompatibleModel {
    async fn complete(&self, request: &GenerationRequest) -> Result<String> {
        debug!(provider = %self.provider, model = %self.model, "requesting chat completion");

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&self.chat_request(request))
            .send()
            .await
            .map_err(|e| {
                error!(provider = %self.provider, error = %e, "request failed");
                self.error(format!("request failed: {e}"))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<ErrorResponse>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);

            error!(provider = %self.provider, %status, "API error");
            return Err(self.error(format!("API returned {status}: {detail}")));
        }

        let chat: ChatResponse = response.json().await.map_err(|e| {
            error!(provider = %self.provider, error = %e, "failed to parse response");
            self.error(format!("failed to parse response: {e}"))
        })?;

        chat.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| self.error("response contained no content"))
    }

    fn name(&self) -> &str {
        &self.provider
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn groq_defaults() {
        let model = OpenAICompatibleModel::groq("gsk-test").unwrap();
        assert_eq!(model.base_url, "https://api.groq.com/openai/v1");
        assert_eq!(model.model(), "llama-3.1-70b-versatile");
        assert_eq!(model.name(), "Groq");
    }

    #[test]
    fn request_carries_system_and_user_turns() {
        let model = OpenAICompatibleModel::groq("gsk-test").unwrap().with_model("mixtral");
        let request = GenerationRequest { system: "rules".into(), user: "question".into() };
        let json = serde_json::to_value(model.chat_request(&request)).unwrap();

        assert_eq!(json["model"], "mixtral");
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][0]["content"], "rules");
        assert_eq!(json["messages"][1]["role"], "user");
        assert_eq!(json["messages"][1]["content"], "question");
        assert!((json["temperature"].as_f64().unwrap() - 0.2).abs() < 1e-6);
        assert!((json["top_p"].as_f64().unwrap() - 0.9).abs() < 1e-6);
    }

    #[test]
    fn trailing_slash_is_trimmed_from_base_url() {
        let model = OpenAICompatibleModel::new("Local", "http://localhost:8000/v1/", "k").unwrap();
        assert_eq!(model.base_url, "http://localhost:8000/v1");
    }

    #[test]
    fn empty_key_is_rejected() {
        assert!(matches!(OpenAICompatibleModel::groq(""), Err(RagError::ConfigError(_))));
    }
}
