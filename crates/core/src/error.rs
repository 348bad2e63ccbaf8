//! Error types for kolrag.
//!
//! One enum covers every failure category of a pipeline run. The pipeline
//! variants (`CorpusNotFound` through `Synthesis`) are terminal for the run
//! that raised them; the orchestrator never recovers from them locally.

use std::path::PathBuf;
use thiserror::Error;

/// Unified error type for kolrag.
///
/// All fallible functions in the workspace return `Result<T, AppError>`.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Neither a raw corpus nor a cached snapshot exists at the location
    #[error("Corpus not found at {0:?} and no cached snapshot is available")]
    CorpusNotFound(PathBuf),

    /// The preprocessor could not load or build the corpus
    #[error("Corpus unavailable: {0}")]
    CorpusUnavailable(String),

    /// An optimizer stage failed during chain execution
    #[error("Optimization failed in stage '{stage}': {message}")]
    Optimization { stage: String, message: String },

    /// An indexer failed to build its index or to retrieve
    #[error("Indexing failed in '{indexer}': {message}")]
    Indexing { indexer: String, message: String },

    /// Answer generation failed after the synthesizer's own retries
    #[error("Answer synthesis failed: {0}")]
    Synthesis(String),

    /// LLM provider errors
    #[error("LLM error: {0}")]
    Llm(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

impl AppError {
    /// Build an optimization error for the named stage.
    pub fn optimization(stage: impl Into<String>, message: impl Into<String>) -> Self {
        AppError::Optimization {
            stage: stage.into(),
            message: message.into(),
        }
    }

    /// Build an indexing error for the named indexer.
    pub fn indexing(indexer: impl Into<String>, message: impl Into<String>) -> Self {
        AppError::Indexing {
            indexer: indexer.into(),
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;
