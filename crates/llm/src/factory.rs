//! LLM provider factory.
//!
//! Resolves the configured provider and wraps it in the configured retry
//! policy, so callers always receive a client with its fault handling
//! already in place.

use crate::client::LlmClient;
use crate::providers::OllamaClient;
use crate::retry::{RetryPolicy, RetryingClient};
use crate::types::{LlmSettings, ProviderType};
use kolrag_core::{AppError, AppResult};
use std::sync::Arc;

/// Create an LLM client from settings.
///
/// # Errors
/// Returns `AppError::Config` if the provider is unknown.
pub fn create_client(settings: &LlmSettings) -> AppResult<Arc<dyn LlmClient>> {
    let provider = ProviderType::parse(&settings.provider).ok_or_else(|| {
        AppError::Config(format!(
            "Unknown LLM provider: '{}'. Supported providers: ollama",
            settings.provider
        ))
    })?;

    let base: Arc<dyn LlmClient> = match provider {
        ProviderType::Ollama => match settings.endpoint.as_deref() {
            Some(endpoint) => Arc::new(OllamaClient::with_base_url(endpoint)),
            None => Arc::new(OllamaClient::new()),
        },
    };

    let policy = RetryPolicy::from(settings);
    tracing::debug!(
        "Created {} client (model: {}, retries: {})",
        provider.as_str(),
        settings.model,
        policy.max_retries
    );

    Ok(Arc::new(RetryingClient::new(base, policy)))
}
