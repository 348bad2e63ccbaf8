//! Hypothetical document expansion (HyDE).
//!
//! A short question shares few terms with the passage that answers it. HyDE
//! asks the model to write that passage and searches with it instead.

use kolrag_core::AppResult;
use kolrag_llm::{LlmClient, LlmRequest, LlmSettings};
use std::sync::Arc;

const DEFAULT_INSTRUCTION: &str =
    "Write a short passage in Hebrew that answers the following question.";

/// Replaces each query with a model-written answer passage.
pub struct HydeExpander {
    client: Arc<dyn LlmClient>,
    settings: LlmSettings,
    instruction: String,
}

impl HydeExpander {
    pub fn new(
        client: Arc<dyn LlmClient>,
        settings: LlmSettings,
        instruction: Option<String>,
    ) -> Self {
        Self {
            client,
            settings,
            instruction: instruction.unwrap_or_else(|| DEFAULT_INSTRUCTION.to_string()),
        }
    }

    pub fn model(&self) -> &str {
        &self.settings.model
    }

    pub fn instruction(&self) -> &str {
        &self.instruction
    }

    /// Generate the passage for one query.
    #[tracing::instrument(skip(self, query), fields(query_len = query.len()))]
    pub async fn expand(&self, query: &str) -> AppResult<String> {
        let mut request = LlmRequest::new(query, &self.settings.model)
            .with_system(self.instruction.clone());
        if let Some(temperature) = self.settings.temperature {
            request = request.with_temperature(temperature);
        }
        if let Some(max_tokens) = self.settings.max_tokens {
            request = request.with_max_tokens(max_tokens);
        }

        let response = self.client.complete(&request).await?;
        Ok(response.content.trim().to_string())
    }
}

impl std::fmt::Debug for HydeExpander {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HydeExpander")
            .field("provider", &self.client.provider_name())
            .field("model", &self.settings.model)
            .finish()
    }
}
