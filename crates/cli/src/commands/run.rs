//! Run command handler.
//!
//! Answers a file of queries, evaluates them when gold ids are present and
//! writes the results file.

use super::{load_pipeline, stderr_progress};
use chrono::Local;
use clap::Args;
use kolrag_core::{config::AppConfig, AppError, AppResult};
use kolrag_pipeline::{load_queries, Evaluation, Rag, RagResults};
use std::path::{Path, PathBuf};

/// Answer a file of queries
#[derive(Args, Debug)]
pub struct RunCommand {
    /// Queries file (.json array, .jsonl, or one query per line)
    #[arg(short, long)]
    pub queries: PathBuf,

    /// Pipeline file (default: .kolrag/pipeline.yaml)
    #[arg(short, long)]
    pub pipeline: Option<PathBuf>,

    /// Results file (default: results/<timestamp>.json)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Skip evaluation even when gold ids are present
    #[arg(long)]
    pub no_evaluate: bool,

    /// Do not read or write cached corpus snapshots
    #[arg(long)]
    pub no_cache: bool,

    /// Print the run summary as JSON
    #[arg(long)]
    pub json: bool,
}

/// `results/<YYYY-MM-DD_HH-MM-SS>.json` under the workspace.
fn default_output(workspace: &Path) -> PathBuf {
    workspace
        .join("results")
        .join(format!("{}.json", Local::now().format("%Y-%m-%d_%H-%M-%S")))
}

impl RunCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing run command");
        tracing::debug!("Run options: {:?}", self);

        let pipeline = load_pipeline(config, self.pipeline.as_deref(), self.no_cache)?;

        let mut queries = load_queries(&self.queries)?;
        if queries.is_empty() {
            return Err(AppError::Config(format!(
                "No queries found in {:?}",
                self.queries
            )));
        }

        let mut rag = Rag::from_config(&pipeline)?.with_progress(stderr_progress());
        let summary = rag.answer_queries(&mut queries).await?;

        let has_gold = queries.iter().any(|q| q.gold_doc_id.is_some());
        let evaluation = if has_gold && !self.no_evaluate {
            Some(Evaluation::evaluate(
                &mut queries,
                &pipeline.recall_cutoffs,
                rag.top_k(),
            ))
        } else {
            None
        };

        let results = RagResults::new(&rag, &queries, evaluation.as_ref());
        let output = self
            .output
            .clone()
            .unwrap_or_else(|| default_output(&config.workspace));
        results.save(&output)?;

        if self.json {
            let recall: serde_json::Map<String, serde_json::Value> = results
                .recall
                .iter()
                .map(|(k, v)| (k.clone(), serde_json::json!(v)))
                .collect();
            let out = serde_json::json!({
                "queries": queries.len(),
                "units": summary.units,
                "warnings": summary.warnings.iter().map(|w| w.to_string()).collect::<Vec<_>>(),
                "sentTokens": summary.sent_tokens,
                "durationSecs": summary.duration_secs,
                "mrr": results.mmr,
                "recall": recall,
                "output": output,
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
        } else {
            println!(
                "Answered {} queries over {} units in {:.2}s",
                queries.len(),
                summary.units,
                summary.duration_secs
            );
            if !summary.warnings.is_empty() {
                println!("{} retrieval warnings (see log)", summary.warnings.len());
            }
            println!("Tokens sent: {}", summary.sent_tokens);
            if let Some(evaluation) = &evaluation {
                println!("MRR: {:.4}", evaluation.mrr);
                for (k, value) in &evaluation.recall {
                    println!("recall@{}: {:.4}", k, value);
                }
                println!(
                    "Gold not retrieved: {} queries",
                    evaluation.wrong_retrieved.len()
                );
            }
            println!("Results written to {}", output.display());
        }

        Ok(())
    }
}
