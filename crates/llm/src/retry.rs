//! Retry policy for completion requests.
//!
//! Hosted models fail transiently (rate limits, cold starts). The pipeline
//! treats any error that reaches it as terminal, so retrying happens here.

use crate::client::{LlmClient, LlmRequest, LlmResponse};
use crate::types::LlmSettings;
use kolrag_core::AppResult;
use std::sync::Arc;
use std::time::Duration;

/// How many times to retry and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first failed attempt
    pub max_retries: u32,

    /// Wait before the first retry
    pub initial_wait: Duration,

    /// Multiplier applied to the wait after every retry
    pub backoff_factor: u32,
}

impl RetryPolicy {
    /// Never retry.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            initial_wait: Duration::ZERO,
            backoff_factor: 1,
        }
    }

    /// Wait before retry number `attempt` (1-based).
    pub fn wait_before(&self, attempt: u32) -> Duration {
        let factor = self
            .backoff_factor
            .max(1)
            .saturating_pow(attempt.saturating_sub(1));
        self.initial_wait.saturating_mul(factor)
    }
}

impl From<&LlmSettings> for RetryPolicy {
    fn from(settings: &LlmSettings) -> Self {
        Self {
            max_retries: settings.retries,
            initial_wait: Duration::from_secs(settings.retry_wait_secs),
            backoff_factor: settings.backoff_factor,
        }
    }
}

/// Client wrapper that retries failed completions according to a policy.
pub struct RetryingClient {
    inner: Arc<dyn LlmClient>,
    policy: RetryPolicy,
}

impl RetryingClient {
    pub fn new(inner: Arc<dyn LlmClient>, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }
}

#[async_trait::async_trait]
impl LlmClient for RetryingClient {
    fn provider_name(&self) -> &str {
        self.inner.provider_name()
    }

    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
        let mut attempt = 0;
        loop {
            match self.inner.complete(request).await {
                Ok(response) => return Ok(response),
                Err(e) if attempt < self.policy.max_retries => {
                    attempt += 1;
                    let wait = self.policy.wait_before(attempt);
                    tracing::warn!(
                        "Completion failed (attempt {}/{}): {}. Retrying in {:?}",
                        attempt,
                        self.policy.max_retries + 1,
                        e,
                        wait
                    );
                    tokio::time::sleep(wait).await;
                }
                Err(e) => {
                    tracing::error!(
                        "Completion failed after {} attempts: {}",
                        attempt + 1,
                        e
                    );
                    return Err(e);
                }
            }
        }
    }
}
