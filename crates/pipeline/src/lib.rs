//! Hebrew retrieval-augmented question answering.
//!
//! A run loads a corpus of text units, rewrites queries and documents with an
//! optimizer chain, indexes the documents with one or more indexers, fuses
//! their rankings per query and finally synthesizes answers.
//!
//! # Example
//! ```no_run
//! use kolrag_pipeline::{PipelineConfig, Query, Rag};
//!
//! # async fn example() -> kolrag_core::AppResult<()> {
//! let config = PipelineConfig::default();
//! let mut rag = Rag::from_config(&config)?;
//! let mut queries = Query::numbered([("מאיזה גיל אפשר לפרוש לפנסיה?", None)]);
//! rag.answer_queries(&mut queries).await?;
//! for unit in &queries[0].answer_sources {
//!     println!("{}", unit.id());
//! }
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod config;
pub mod fusion;
pub mod indexer;
pub mod metrics;
pub mod optimizer;
pub mod orchestrator;
pub mod preprocess;
pub mod progress;
pub mod queries;
pub mod ranks;
pub mod results;
pub mod synthesizer;
pub mod types;

#[cfg(test)]
mod tests;

// Re-export commonly used types
pub use config::{
    DenseConfig, EmbeddingConfig, IndexerConfig, OptimizerConfig, PipelineConfig,
    SynthesizerConfig,
};
pub use fusion::{fuse, merge_round_robin, FusionWarning};
pub use indexer::{IndexBackend, Indexer, Segment};
pub use metrics::{mrr, recall_at_k, wrong_retrieved, Evaluation};
pub use optimizer::{OptimizerChain, OptimizerStage, TextKind, TextOptimizer};
pub use orchestrator::{Rag, RunSummary};
pub use preprocess::{InMemoryPreprocessor, MarkdownCorpusPreprocessor, Preprocessor};
pub use progress::{ProgressCallback, ProgressEvent, ProgressReporter};
pub use queries::load_queries;
pub use ranks::create_ranks;
pub use results::RagResults;
pub use synthesizer::AnswerSynthesizer;
pub use types::{Query, TextUnit};
