//! Grounded answer generation with a deterministic fallback.
//!
//! [`AnswerGenerator`] asks a [`LanguageModel`] to answer from the retrieved
//! context only. It never fails: when the model errors or returns nothing,
//! the caller gets the context itself under [`FALLBACK_HEADER`](crate::prompt::FALLBACK_HEADER).

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::Result;
use crate::prompt::{self, SYSTEM_PROMPT};

/// A prompt split into system rules and the user turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    /// Rules the model must follow.
    pub system: String,
    /// Context and question.
    pub user: String,
}

/// A text completion backend.
///
/// Implementations report any transport or API failure, and an empty
/// completion, as [`RagError::GenerationError`](crate::RagError::GenerationError).
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Produce a completion for `request`.
    async fn complete(&self, request: &GenerationRequest) -> Result<String>;

    /// Provider name used in logs.
    fn name(&self) -> &str;
}

/// How an [`Answer`] was produced.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AnswerOrigin {
    /// Written by the language model.
    Generated,
    /// Retrieved context shown because the model was unavailable.
    Fallback,
    /// Nothing relevant was retrieved.
    NoInformation,
    /// The pipeline failed unexpectedly.
    Degraded,
}

/// Final answer text plus how it came about.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Answer {
    /// The text shown to the user. Never empty.
    pub text: String,
    /// How the text was produced.
    pub origin: AnswerOrigin,
}

impl Answer {
    /// The fixed "not enough information" answer.
    pub fn no_information() -> Self {
        Self { text: prompt::NO_INFO_MESSAGE.to_string(), origin: AnswerOrigin::NoInformation }
    }

    /// The fixed apology used when the pipeline fails unexpectedly.
    pub fn degraded() -> Self {
        Self { text: prompt::DEGRADED_MESSAGE.to_string(), origin: AnswerOrigin::Degraded }
    }

    /// The context shown under the fallback header.
    pub fn fallback(context: &str) -> Self {
        Self { text: prompt::fallback_answer(context), origin: AnswerOrigin::Fallback }
    }
}

impl fmt::Display for Answer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Produces answers constrained to retrieved context.
#[derive(Clone)]
pub struct AnswerGenerator {
    model: Arc<dyn LanguageModel>,
}

impl AnswerGenerator {
    /// Create a generator backed by `model`.
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self { model }
    }

    /// Answer `question` from `context`.
    ///
    /// Model failures and blank completions are logged and replaced by
    /// [`Answer::fallback`]; successful text is trimmed.
    pub async fn generate(&self, question: &str, context: &str) -> Answer {
        let request = GenerationRequest {
            system: SYSTEM_PROMPT.to_string(),
            user: prompt::build_user_message(question, context),
        };

        match self.model.complete(&request).await {
            Ok(text) if !text.trim().is_empty() => {
                debug!(provider = self.model.name(), chars = text.len(), "answer generated");
                Answer { text: text.trim().to_string(), origin: AnswerOrigin::Generated }
            }
            Ok(_) => {
                warn!(
                    provider = self.model.name(),
                    "model returned an empty answer, using fallback"
                );
                Answer::fallback(context)
            }
            Err(e) => {
                warn!(
                    provider = self.model.name(),
                    error = %e,
                    "generation failed, using fallback"
                );
                Answer::fallback(context)
            }
        }
    }
}

impl fmt::Debug for AnswerGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnswerGenerator").field("model", &self.model.name()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RagError;

    struct Fixed(Result<String>);

    #[async_trait]
    impl LanguageModel for Fixed {
        async fn complete(&self, _request: &GenerationRequest) -> Result<String> {
            match &self.0 {
                Ok(text) => Ok(text.clone()),
                Err(e) => Err(RagError::GenerationError {
                    provider: "fixed".to_string(),
                    message: e.to_string(),
                }),
            }
        }

        fn name(&self) -> &str {
            "fixed"
        }
    }

    fn generator(result: Result<String>) -> AnswerGenerator {
        AnswerGenerator::new(Arc::new(Fixed(result)))
    }

    #[tokio::test]
    async fn trims_generated_text() {
        let answer = generator(Ok("  Robots are machines.\n".into())).generate("q", "c").await;
        assert_eq!(answer.text, "Robots are machines.");
        assert_eq!(answer.origin, AnswerOrigin::Generated);
    }

    #[tokio::test]
    async fn model_error_falls_back_to_context() {
        let err = RagError::GenerationError { provider: "x".into(), message: "quota".into() };
        let answer = generator(Err(err)).generate("q", "1. Robots are machines.").await;
        assert_eq!(answer.origin, AnswerOrigin::Fallback);
        assert_eq!(
            answer.text,
            "AI response unavailable. Showing best matched content from the knowledge base:\n\
             1. Robots are machines."
        );
    }

    #[tokio::test]
    async fn blank_completion_falls_back() {
        let answer = generator(Ok("   ".into())).generate("q", "1. ctx").await;
        assert_eq!(answer.origin, AnswerOrigin::Fallback);
    }
}
