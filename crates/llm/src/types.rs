//! LLM configuration types.

use serde::{Deserialize, Serialize};

/// Settings for the completion provider used by the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmSettings {
    /// Provider name ("ollama")
    #[serde(default = "default_provider")]
    pub provider: String,

    /// Custom endpoint URL
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Model identifier
    #[serde(default = "default_model")]
    pub model: String,

    /// Sampling temperature
    #[serde(default)]
    pub temperature: Option<f32>,

    /// Maximum tokens to generate per answer
    #[serde(default)]
    pub max_tokens: Option<u32>,

    /// Retries after the first failed attempt
    #[serde(default = "default_retries")]
    pub retries: u32,

    /// Wait before the first retry, in seconds
    #[serde(default = "default_retry_wait_secs")]
    pub retry_wait_secs: u64,

    /// Multiplier applied to the wait after every retry (1 = fixed wait)
    #[serde(default = "default_backoff_factor")]
    pub backoff_factor: u32,
}

fn default_provider() -> String {
    "ollama".to_string()
}

fn default_model() -> String {
    "llama3.2".to_string()
}

fn default_retries() -> u32 {
    2
}

// Free-tier quotas reset per minute.
fn default_retry_wait_secs() -> u64 {
    61
}

fn default_backoff_factor() -> u32 {
    1
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            endpoint: None,
            model: default_model(),
            temperature: None,
            max_tokens: None,
            retries: default_retries(),
            retry_wait_secs: default_retry_wait_secs(),
            backoff_factor: default_backoff_factor(),
        }
    }
}

/// Provider type enum for matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderType {
    Ollama,
}

impl ProviderType {
    /// Parse provider type from string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "ollama" => Some(Self::Ollama),
            _ => None,
        }
    }

    /// Get the canonical provider name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ollama => "ollama",
        }
    }
}
