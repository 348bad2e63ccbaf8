//! Ask command handler.
//!
//! Runs the pipeline for a single production question.

use super::{load_pipeline, stderr_progress};
use clap::Args;
use kolrag_core::{config::AppConfig, AppResult};
use kolrag_pipeline::results::QueryRecord;
use kolrag_pipeline::{Query, Rag};
use std::path::PathBuf;

/// Answer a single question
#[derive(Args, Debug)]
pub struct AskCommand {
    /// The question to ask
    pub question: String,

    /// Pipeline file (default: .kolrag/pipeline.yaml)
    #[arg(short, long)]
    pub pipeline: Option<PathBuf>,

    /// Do not read or write cached corpus snapshots
    #[arg(long)]
    pub no_cache: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl AskCommand {
    /// Execute the ask command.
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing ask command");
        tracing::debug!("Ask options: {:?}", self);

        let pipeline = load_pipeline(config, self.pipeline.as_deref(), self.no_cache)?;
        let mut rag = Rag::from_config(&pipeline)?.with_progress(stderr_progress());

        let mut queries = Query::numbered([(self.question.as_str(), None)]);
        let summary = rag.answer_queries(&mut queries).await?;
        let query = &queries[0];

        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&QueryRecord::from(query))?
            );
            return Ok(());
        }

        match &query.final_answer {
            Some(answer) => println!("{}\n", answer),
            None => println!(
                "No answer synthesized ({} tokens would be sent)\n",
                summary.sent_tokens
            ),
        }

        if query.answer_sources.is_empty() {
            println!("No sources found.");
        } else {
            println!("Sources:");
            for (i, unit) in query.answer_sources.iter().enumerate() {
                let title = unit.content.lines().next().unwrap_or_default();
                println!("  {}. {} {}", i + 1, unit.id(), title);
            }
        }

        Ok(())
    }
}
