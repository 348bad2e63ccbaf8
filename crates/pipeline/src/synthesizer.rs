//! Final answer synthesis from retrieved sources.

use crate::config::SynthesizerConfig;
use crate::progress::ProgressReporter;
use crate::types::Query;
use handlebars::Handlebars;
use kolrag_core::{AppError, AppResult};
use kolrag_llm::{create_client, LlmClient, LlmRequest, LlmSettings};
use std::fs;
use std::sync::Arc;

const TEMPLATE_NAME: &str = "answer";

const DEFAULT_TEMPLATE: &str = "\
ענה על השאלה בעברית, על סמך המקורות בלבד. אם התשובה אינה מופיעה במקורות, כתוב שאינך יודע.

שאלה: {{query}}

מקורות:
{{answer_source}}

תשובה:";

/// Whitespace tokens a synthesis call for `query` would send.
fn count_sent_tokens(query: &Query) -> usize {
    query.query.split_whitespace().count()
        + query
            .answer_sources
            .iter()
            .map(|unit| unit.content.split_whitespace().count())
            .sum::<usize>()
}

/// Counts tokens without calling a model.
#[derive(Debug, Default)]
pub struct TokenCounter {
    sent_tokens: usize,
}

/// Answers through an LLM, one query at a time.
pub struct LlmSynthesizer {
    client: Arc<dyn LlmClient>,
    settings: LlmSettings,
    templates: Handlebars<'static>,
    sent_tokens: usize,
}

impl LlmSynthesizer {
    pub fn new(
        client: Arc<dyn LlmClient>,
        settings: LlmSettings,
        template: Option<&str>,
    ) -> AppResult<Self> {
        let mut templates = Handlebars::new();
        templates.register_escape_fn(handlebars::no_escape);
        templates
            .register_template_string(TEMPLATE_NAME, template.unwrap_or(DEFAULT_TEMPLATE))
            .map_err(|e| AppError::Config(format!("Invalid answer template: {}", e)))?;

        Ok(Self {
            client,
            settings,
            templates,
            sent_tokens: 0,
        })
    }

    /// Render the prompt for one query; sources are joined with a space.
    pub fn render_prompt(&self, query: &Query) -> AppResult<String> {
        let answer_source = query
            .answer_sources
            .iter()
            .map(|unit| unit.content.as_str())
            .collect::<Vec<_>>()
            .join(" ");

        self.templates
            .render(
                TEMPLATE_NAME,
                &serde_json::json!({
                    "query": query.query,
                    "answer_source": answer_source,
                }),
            )
            .map_err(|e| AppError::Synthesis(format!("Failed to render prompt: {}", e)))
    }

    async fn answer(&self, query: &Query) -> AppResult<String> {
        let prompt = self.render_prompt(query)?;

        let mut request = LlmRequest::new(prompt, &self.settings.model);
        if let Some(temperature) = self.settings.temperature {
            request = request.with_temperature(temperature);
        }
        if let Some(max_tokens) = self.settings.max_tokens {
            request = request.with_max_tokens(max_tokens);
        }

        let response = self
            .client
            .complete(&request)
            .await
            .map_err(|e| AppError::Synthesis(format!("query {}: {}", query.number, e)))?;
        Ok(response.content.trim().to_string())
    }
}

impl std::fmt::Debug for LlmSynthesizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmSynthesizer")
            .field("provider", &self.client.provider_name())
            .field("model", &self.settings.model)
            .field("sent_tokens", &self.sent_tokens)
            .finish()
    }
}

/// A configured answer synthesizer.
#[derive(Debug)]
pub enum AnswerSynthesizer {
    TokenCount(TokenCounter),
    Llm(LlmSynthesizer),
}

impl AnswerSynthesizer {
    pub fn from_config(config: &SynthesizerConfig, llm: &LlmSettings) -> AppResult<Self> {
        match config {
            SynthesizerConfig::TokenCount => Ok(Self::TokenCount(TokenCounter::default())),
            SynthesizerConfig::Llm { template } => {
                let template = template
                    .as_ref()
                    .map(|path| {
                        fs::read_to_string(path).map_err(|e| {
                            AppError::Config(format!(
                                "Failed to read answer template {:?}: {}",
                                path, e
                            ))
                        })
                    })
                    .transpose()?;
                let client = create_client(llm)?;
                Ok(Self::Llm(LlmSynthesizer::new(
                    client,
                    llm.clone(),
                    template.as_deref(),
                )?))
            }
        }
    }

    pub fn name(&self) -> String {
        match self {
            Self::TokenCount(_) => "token_count".to_string(),
            Self::Llm(synth) => format!("llm:{}", synth.settings.model),
        }
    }

    /// Input tokens sent so far, across every call.
    pub fn sent_tokens_counter(&self) -> usize {
        match self {
            Self::TokenCount(counter) => counter.sent_tokens,
            Self::Llm(synth) => synth.sent_tokens,
        }
    }

    /// Fill `final_answer` for every query that has retrieved sources.
    ///
    /// # Errors
    /// `AppError::Synthesis` when the model call fails after its retries.
    pub async fn retrieve_final_answers(
        &mut self,
        queries: &mut [Query],
        progress: &ProgressReporter,
    ) -> AppResult<()> {
        let name = self.name();
        let total = queries.len() as u64;

        for (i, query) in queries.iter_mut().enumerate() {
            match self {
                Self::TokenCount(counter) => {
                    counter.sent_tokens += count_sent_tokens(query);
                }
                Self::Llm(synth) => {
                    if query.answer_sources.is_empty() {
                        tracing::debug!("Query {} has no sources, skipping", query.number);
                    } else {
                        let answer = synth.answer(query).await?;
                        synth.sent_tokens += count_sent_tokens(query);
                        query.final_answer = Some(answer);
                    }
                }
            }
            progress.synthesize(i as u64 + 1, total, &name);
        }

        tracing::info!(
            "Synthesized answers with {} ({} tokens sent)",
            name,
            self.sent_tokens_counter()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TextUnit;
    use kolrag_llm::{LlmResponse, LlmUsage};
    use std::sync::Mutex;

    /// Returns canned answers and records every prompt.
    struct ScriptedClient {
        prompts: Mutex<Vec<String>>,
        fail: bool,
    }

    impl ScriptedClient {
        fn new(fail: bool) -> Arc<Self> {
            Arc::new(Self {
                prompts: Mutex::new(Vec::new()),
                fail,
            })
        }
    }

    #[async_trait::async_trait]
    impl LlmClient for ScriptedClient {
        fn provider_name(&self) -> &str {
            "scripted"
        }

        async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
            self.prompts.lock().unwrap().push(request.prompt.clone());
            if self.fail {
                return Err(AppError::Llm("quota exceeded".to_string()));
            }
            Ok(LlmResponse {
                content: "  תשובה  ".to_string(),
                model: request.model.clone(),
                usage: LlmUsage::new(1, 1),
            })
        }
    }

    fn query_with_sources(number: usize, sources: &[&str]) -> Query {
        let mut query = Query::new(number, "מה הגיל?", None);
        query.answer_sources = sources
            .iter()
            .enumerate()
            .map(|(i, text)| Arc::new(TextUnit::new(i.to_string(), "0", *text)))
            .collect();
        query
    }

    #[tokio::test]
    async fn test_token_count_counts_query_and_sources() {
        let mut synth = AnswerSynthesizer::from_config(
            &SynthesizerConfig::TokenCount,
            &LlmSettings::default(),
        )
        .unwrap();
        let mut queries = vec![
            query_with_sources(1, &["גיל פרישה 67", "לנשים 65"]),
            query_with_sources(2, &[]),
        ];

        synth
            .retrieve_final_answers(&mut queries, &ProgressReporter::noop())
            .await
            .unwrap();

        // 2 + 3 + 2, then 2 for the query without sources
        assert_eq!(synth.sent_tokens_counter(), 9);
        assert!(queries.iter().all(|q| q.final_answer.is_none()));
        assert_eq!(synth.name(), "token_count");
    }

    #[tokio::test]
    async fn test_llm_answers_and_skips_empty() {
        let client = ScriptedClient::new(false);
        let mut synth = AnswerSynthesizer::Llm(
            LlmSynthesizer::new(
                client.clone(),
                LlmSettings::default(),
                Some("Q={{query}} S={{answer_source}}"),
            )
            .unwrap(),
        );
        let mut queries = vec![
            query_with_sources(1, &["a & b", "c"]),
            query_with_sources(2, &[]),
        ];

        synth
            .retrieve_final_answers(&mut queries, &ProgressReporter::noop())
            .await
            .unwrap();

        assert_eq!(queries[0].final_answer.as_deref(), Some("תשובה"));
        assert!(queries[1].final_answer.is_none());

        let prompts = client.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert_eq!(prompts[0], "Q=מה הגיל? S=a & b c");
        assert_eq!(synth.sent_tokens_counter(), 6);
    }

    #[tokio::test]
    async fn test_llm_failure_is_synthesis_error() {
        let mut synth = AnswerSynthesizer::Llm(
            LlmSynthesizer::new(ScriptedClient::new(true), LlmSettings::default(), None).unwrap(),
        );
        let mut queries = vec![query_with_sources(1, &["x"])];

        let err = synth
            .retrieve_final_answers(&mut queries, &ProgressReporter::noop())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Synthesis(_)));
        assert!(err.to_string().contains("quota exceeded"));
    }

    #[test]
    fn test_default_template_has_placeholders() {
        let synth =
            LlmSynthesizer::new(ScriptedClient::new(false), LlmSettings::default(), None).unwrap();
        let prompt = synth.render_prompt(&query_with_sources(1, &["מקור"])).unwrap();
        assert!(prompt.contains("מה הגיל?"));
        assert!(prompt.contains("מקור"));
    }

    #[test]
    fn test_invalid_template_is_config_error() {
        let err = LlmSynthesizer::new(
            ScriptedClient::new(false),
            LlmSettings::default(),
            Some("{{#if}}"),
        )
        .unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }

    #[test]
    fn test_missing_template_file_is_config_error() {
        let config = SynthesizerConfig::Llm {
            template: Some("/nonexistent/answer.hbs".into()),
        };
        let err = AnswerSynthesizer::from_config(&config, &LlmSettings::default()).unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }
}
