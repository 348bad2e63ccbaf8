//! The results artifact of an evaluation run.
//!
//! Field names are part of the file format consumed by downstream tools and
//! are kept as they are, spelling included.

use crate::metrics::Evaluation;
use crate::orchestrator::Rag;
use crate::types::{Query, TextUnit};
use kolrag_core::AppResult;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// One retrieved source as written to the results file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRecord {
    pub doc_id: String,
    pub section_id: String,
    pub text: String,
    pub indexing_optimized_text: String,
}

impl From<&TextUnit> for SourceRecord {
    fn from(unit: &TextUnit) -> Self {
        Self {
            doc_id: unit.doc_id.clone(),
            section_id: unit.section_id.clone(),
            text: unit.content.clone(),
            indexing_optimized_text: unit.optimized_content.clone(),
        }
    }
}

/// One query as written to the results file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryRecord {
    pub number: usize,
    pub gold_doc_id: Option<String>,
    pub query: String,
    pub rank: Option<usize>,
    pub indexing_optimized_query: String,
    pub final_answer: Option<String>,
    /// `null` when nothing was retrieved
    pub answer_source: Option<Vec<SourceRecord>>,
}

impl From<&Query> for QueryRecord {
    fn from(query: &Query) -> Self {
        let answer_source = if query.answer_sources.is_empty() {
            None
        } else {
            Some(
                query
                    .answer_sources
                    .iter()
                    .map(|unit| SourceRecord::from(unit.as_ref()))
                    .collect(),
            )
        };

        Self {
            number: query.number,
            gold_doc_id: query.gold_doc_id.clone(),
            query: query.query.clone(),
            rank: query.rank,
            indexing_optimized_query: query.indexing_optimized_query.clone(),
            final_answer: query.final_answer.clone(),
            answer_source,
        }
    }
}

/// The complete results file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RagResults {
    pub version: String,
    pub pre_proccessor_name: String,
    pub index_optimizer_names: Vec<String>,
    pub index_data_impl_name: Vec<String>,
    pub get_final_answers_impl_name: String,
    pub mmr: Option<f64>,
    /// `recall@<k>` per effective cutoff
    #[serde(flatten)]
    pub recall: BTreeMap<String, f64>,
    pub wrong_retrieved_queries: Vec<QueryRecord>,
    pub queries: Vec<QueryRecord>,
}

impl RagResults {
    /// Describe a finished run; `evaluation` is absent for runs without gold ids.
    pub fn new(rag: &Rag, queries: &[Query], evaluation: Option<&Evaluation>) -> Self {
        let recall = evaluation
            .map(|e| {
                e.recall
                    .iter()
                    .map(|(k, value)| (format!("recall@{}", k), *value))
                    .collect()
            })
            .unwrap_or_default();
        let wrong_retrieved_queries = evaluation
            .map(|e| {
                queries
                    .iter()
                    .filter(|q| e.wrong_retrieved.contains(&q.number))
                    .map(QueryRecord::from)
                    .collect()
            })
            .unwrap_or_default();

        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            pre_proccessor_name: rag.preprocessor_name().to_string(),
            index_optimizer_names: rag.optimizer_names(),
            index_data_impl_name: rag.indexer_names(),
            get_final_answers_impl_name: rag.synthesizer_name(),
            mmr: evaluation.map(|e| e.mrr),
            recall,
            wrong_retrieved_queries,
            queries: queries.iter().map(QueryRecord::from).collect(),
        }
    }

    /// Write pretty JSON to `path`, creating parent directories.
    pub fn save(&self, path: &Path) -> AppResult<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;

        tracing::info!("Saved results to {:?}", path);
        Ok(())
    }

    pub fn load(path: &Path) -> AppResult<Self> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}
