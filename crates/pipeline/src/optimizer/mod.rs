//! Text optimizers applied to queries and documents before indexing.
//!
//! Every stage maps a batch of strings to a batch of the same length and
//! order. Stages are a closed set of named strategies ([`OptimizerStage`])
//! with one open variant for collaborator-backed optimizers such as
//! transformer lemmatizers.

pub mod affix;
pub mod chain;
pub mod filters;
pub mod hyde;
pub mod synonyms;

pub use affix::{normalize_final_letter, AffixSplitter};
pub use chain::{OptimizerChain, TextKind};
pub use filters::{keep_hebrew, StopWordFilter};
pub use hyde::HydeExpander;
pub use synonyms::SynonymExpander;

use crate::config::OptimizerConfig;
use kolrag_core::AppResult;
use kolrag_llm::{create_client, LlmSettings};
use std::sync::Arc;

/// Optimizer implemented outside this crate.
#[async_trait::async_trait]
pub trait TextOptimizer: Send + Sync {
    /// Stage name, used in results and error messages
    fn name(&self) -> &str;

    /// Name plus every setting that changes the output. Cached optimized
    /// documents are keyed by it.
    fn fingerprint(&self) -> String {
        self.name().to_string()
    }

    async fn optimize_queries(&self, batch: &[String]) -> AppResult<Vec<String>>;

    async fn optimize_documents(&self, batch: &[String]) -> AppResult<Vec<String>>;
}

/// One stage of the optimizer chain.
pub enum OptimizerStage {
    /// Returns its input unchanged
    Identity,
    /// Drops everything but Hebrew letters and whitespace
    HebrewOnly,
    AffixSplit(AffixSplitter),
    StopWords(StopWordFilter),
    /// Query-only synonym enrichment
    Synonyms(SynonymExpander),
    /// Query-only hypothetical document expansion
    Hyde(HydeExpander),
    External(Arc<dyn TextOptimizer>),
}

impl OptimizerStage {
    /// Build a stage from its configuration.
    pub fn from_config(config: &OptimizerConfig, llm: &LlmSettings) -> AppResult<Self> {
        Ok(match config {
            OptimizerConfig::Identity => Self::Identity,
            OptimizerConfig::HebrewOnly => Self::HebrewOnly,
            OptimizerConfig::AffixSplit => Self::AffixSplit(AffixSplitter::new()),
            OptimizerConfig::StopWords { extra } => Self::StopWords(StopWordFilter::new(extra)),
            OptimizerConfig::Synonyms { path, top_k } => {
                Self::Synonyms(SynonymExpander::load(path, *top_k)?)
            }
            OptimizerConfig::Hyde { instruction } => {
                let client = create_client(llm)?;
                Self::Hyde(HydeExpander::new(client, llm.clone(), instruction.clone()))
            }
        })
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Identity => "identity",
            Self::HebrewOnly => "hebrew_only",
            Self::AffixSplit(_) => "affix_split",
            Self::StopWords(_) => "stop_words",
            Self::Synonyms(_) => "synonyms",
            Self::Hyde(_) => "hyde",
            Self::External(optimizer) => optimizer.name(),
        }
    }

    /// Name plus the settings that change this stage's output.
    pub fn fingerprint(&self) -> String {
        match self {
            Self::StopWords(filter) => format!("stop_words:{}", filter.words().join(" ")),
            Self::Synonyms(expander) => format!("synonyms:{}", expander.describe()),
            Self::Hyde(hyde) => format!("hyde:{}:{}", hyde.model(), hyde.instruction()),
            Self::External(optimizer) => optimizer.fingerprint(),
            _ => self.name().to_string(),
        }
    }

    pub async fn optimize_queries(&self, batch: &[String]) -> AppResult<Vec<String>> {
        match self {
            Self::Synonyms(expander) => Ok(batch.iter().map(|q| expander.expand(q)).collect()),
            Self::Hyde(hyde) => {
                let mut out = Vec::with_capacity(batch.len());
                for query in batch {
                    out.push(hyde.expand(query).await?);
                }
                Ok(out)
            }
            Self::External(optimizer) => optimizer.optimize_queries(batch).await,
            _ => Ok(self.apply_symmetric(batch)),
        }
    }

    pub async fn optimize_documents(&self, batch: &[String]) -> AppResult<Vec<String>> {
        match self {
            Self::Synonyms(_) | Self::Hyde(_) => Ok(batch.to_vec()),
            Self::External(optimizer) => optimizer.optimize_documents(batch).await,
            _ => Ok(self.apply_symmetric(batch)),
        }
    }

    /// Stages that treat queries and documents the same way.
    fn apply_symmetric(&self, batch: &[String]) -> Vec<String> {
        batch
            .iter()
            .map(|text| match self {
                Self::HebrewOnly => keep_hebrew(text),
                Self::AffixSplit(splitter) => splitter.split_text(text),
                Self::StopWords(filter) => filter.filter(text),
                _ => text.clone(),
            })
            .collect()
    }
}

impl std::fmt::Debug for OptimizerStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OptimizerStage({})", self.name())
    }
}
