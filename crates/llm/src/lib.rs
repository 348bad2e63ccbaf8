//! LLM integration crate for kolrag.
//!
//! This crate provides a provider-agnostic abstraction for prompt completion,
//! used by the answer synthesizer and by the HyDE query optimizer. Transient
//! failures are handled here, by [`RetryingClient`], before an error ever
//! reaches the pipeline.
//!
//! # Providers
//! - **Ollama**: Local LLM runtime (default)
//!
//! # Example
//! ```no_run
//! use kolrag_llm::{LlmClient, LlmRequest, providers::OllamaClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = OllamaClient::new();
//! let request = LlmRequest::new("מאיזה גיל אפשר לפרוש לפנסיה?", "llama3.2");
//! let response = client.complete(&request).await?;
//! println!("{}", response.content);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod factory;
pub mod providers;
pub mod retry;
pub mod types;

// Re-export main types
pub use client::{LlmClient, LlmRequest, LlmResponse, LlmUsage};
pub use factory::create_client;
pub use providers::OllamaClient;
pub use retry::{RetryPolicy, RetryingClient};
pub use types::{LlmSettings, ProviderType};
