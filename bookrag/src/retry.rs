//! Rate-limit aware retries for embedding calls.
//!
//! [`RetryingEmbeddingProvider`] wraps any [`EmbeddingProvider`] and retries
//! calls that fail with [`RagError::RateLimited`]. Every other error is
//! returned on the first attempt.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};

/// Bounded retry schedule for rate-limited calls.
///
/// The delay after failed attempt `n` (1-based) is `base_delay * n`, unless the
/// provider asked to wait for a per-minute quota reset, in which case it is
/// `quota_reset_delay`. No delay follows the last attempt.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first one.
    pub max_attempts: u32,
    /// Linear backoff unit.
    pub base_delay: Duration,
    /// Delay used when the provider signals a per-minute quota reset.
    pub quota_reset_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_secs(10),
            quota_reset_delay: Duration::from_secs(65),
        }
    }
}

impl RetryPolicy {
    /// Set the total number of attempts.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Set the linear backoff unit.
    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    /// Set the quota reset delay.
    pub fn with_quota_reset_delay(mut self, delay: Duration) -> Self {
        self.quota_reset_delay = delay;
        self
    }

    /// Delay to wait after failed attempt `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32, quota_reset: bool) -> Duration {
        if quota_reset { self.quota_reset_delay } else { self.base_delay * attempt }
    }
}

/// An [`EmbeddingProvider`] decorator that retries rate-limited calls.
///
/// # Example
///
/// ```rust,ignore
/// use bookrag::{RetryPolicy, RetryingEmbeddingProvider};
///
/// let embedder = RetryingEmbeddingProvider::new(Arc::new(gemini), RetryPolicy::default());
/// let vector = embedder.embed("What is a robot?").await?;
/// ```
pub struct RetryingEmbeddingProvider {
    inner: Arc<dyn EmbeddingProvider>,
    policy: RetryPolicy,
}

impl RetryingEmbeddingProvider {
    /// Wrap `inner` with the given retry policy.
    pub fn new(inner: Arc<dyn EmbeddingProvider>, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    /// Return the retry policy in use.
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }
}

#[async_trait]
impl EmbeddingProvider for RetryingEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            match self.inner.embed(text).await {
                Ok(vector) => {
                    debug!(
                        model = self.inner.model(),
                        attempt,
                        dimensions = vector.len(),
                        "embedding generated"
                    );
                    return Ok(vector);
                }
                Err(RagError::RateLimited { provider, message, quota_reset }) => {
                    if attempt >= max_attempts {
                        error!(
                            %provider,
                            attempt,
                            max_attempts,
                            %message,
                            "embedding rate limit persisted, giving up"
                        );
                        return Err(RagError::EmbeddingError {
                            provider,
                            message: "max retries exceeded".to_string(),
                        });
                    }

                    let delay = self.policy.delay_for(attempt, quota_reset);
                    warn!(
                        %provider,
                        attempt,
                        max_attempts,
                        delay_secs = delay.as_secs_f64(),
                        %message,
                        "embedding rate limited, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    error!(model = self.inner.model(), attempt, error = %e, "embedding failed");
                    return Err(e);
                }
            }
        }
    }

    fn dimensions(&self) -> usize {
        self.inner.dimensions()
    }

    fn model(&self) -> &str {
        self.inner.model()
    }
}
