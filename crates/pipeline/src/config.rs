//! Pipeline configuration.
//!
//! Loaded from `.kolrag/pipeline.yaml` (or the file given with
//! `--pipeline`). Optimizers, indexers and the synthesizer are tagged by
//! `kind` and built once when the pipeline is assembled.

use kolrag_core::{AppError, AppResult};
use kolrag_llm::LlmSettings;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Complete pipeline configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Directory of converted markdown pages
    #[serde(default = "default_corpus")]
    pub corpus: PathBuf,

    /// Where corpus snapshots and optimized documents are cached.
    /// `None` disables caching.
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,

    /// Cache optimized document content between runs
    #[serde(default = "default_true")]
    pub cache_optimized_documents: bool,

    /// Items per optimizer call
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Units requested from each indexer per query
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Cutoffs at which recall is reported
    #[serde(default = "default_recall_cutoffs")]
    pub recall_cutoffs: Vec<usize>,

    /// Optimizer stages, applied in order
    #[serde(default)]
    pub optimizers: Vec<OptimizerConfig>,

    /// Indexers, fused in this order
    #[serde(default = "default_indexers")]
    pub indexers: Vec<IndexerConfig>,

    #[serde(default)]
    pub synthesizer: SynthesizerConfig,

    /// Model settings shared by the LLM synthesizer and HyDE
    #[serde(default)]
    pub llm: LlmSettings,
}

fn default_corpus() -> PathBuf {
    PathBuf::from("corpus")
}

fn default_true() -> bool {
    true
}

fn default_chunk_size() -> usize {
    64
}

fn default_top_k() -> usize {
    20
}

fn default_recall_cutoffs() -> Vec<usize> {
    vec![1, 5, 10, 20]
}

fn default_indexers() -> Vec<IndexerConfig> {
    vec![IndexerConfig::Bm25]
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            corpus: default_corpus(),
            cache_dir: None,
            cache_optimized_documents: true,
            chunk_size: default_chunk_size(),
            top_k: default_top_k(),
            recall_cutoffs: default_recall_cutoffs(),
            optimizers: Vec::new(),
            indexers: default_indexers(),
            synthesizer: SynthesizerConfig::default(),
            llm: LlmSettings::default(),
        }
    }
}

impl PipelineConfig {
    /// Load a pipeline file, or the defaults if it does not exist.
    pub fn load_or_default(path: &Path) -> AppResult<Self> {
        if !path.exists() {
            tracing::debug!("No pipeline file at {:?}, using defaults", path);
            return Ok(Self::default());
        }
        Self::load(path)
    }

    /// Load a pipeline file that must exist.
    pub fn load(path: &Path) -> AppResult<Self> {
        if !path.exists() {
            return Err(AppError::Config(format!(
                "Pipeline file does not exist: {:?}",
                path
            )));
        }

        let content = fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read pipeline file {:?}: {}", path, e))
        })?;
        let config: PipelineConfig = serde_yaml::from_str(&content).map_err(|e| {
            AppError::Config(format!("Failed to parse pipeline file {:?}: {}", path, e))
        })?;

        tracing::debug!("Loaded pipeline config from {:?}", path);
        Ok(config)
    }

    /// Make relative paths relative to `base`.
    pub fn resolve_paths(mut self, base: &Path) -> Self {
        let resolve = |p: &Path| {
            if p.is_absolute() {
                p.to_path_buf()
            } else {
                base.join(p)
            }
        };

        self.corpus = resolve(&self.corpus);
        self.cache_dir = self.cache_dir.as_deref().map(resolve);
        for optimizer in &mut self.optimizers {
            if let OptimizerConfig::Synonyms { path, .. } = optimizer {
                *path = resolve(path);
            }
        }
        if let SynthesizerConfig::Llm {
            template: Some(template),
        } = &mut self.synthesizer
        {
            *template = resolve(template);
        }
        self
    }

    /// Reject settings the pipeline cannot run with.
    pub fn validate(&self) -> AppResult<()> {
        if self.chunk_size == 0 {
            return Err(AppError::Config("chunk_size must be at least 1".to_string()));
        }
        if self.top_k == 0 {
            return Err(AppError::Config("top_k must be at least 1".to_string()));
        }
        if self.indexers.is_empty() {
            return Err(AppError::Config(
                "at least one indexer must be configured".to_string(),
            ));
        }
        if self.recall_cutoffs.contains(&0) {
            return Err(AppError::Config(
                "recall cutoffs must be at least 1".to_string(),
            ));
        }
        for indexer in &self.indexers {
            if let IndexerConfig::Dense(dense) = indexer {
                if dense.batch_size == 0 {
                    return Err(AppError::Config(
                        "dense indexer batch_size must be at least 1".to_string(),
                    ));
                }
            }
        }
        Ok(())
    }
}

/// Optimizer stage selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OptimizerConfig {
    Identity,
    HebrewOnly,
    AffixSplit,
    StopWords {
        #[serde(default)]
        extra: Vec<String>,
    },
    Synonyms {
        path: PathBuf,
        #[serde(default = "default_synonyms_top_k")]
        top_k: usize,
    },
    Hyde {
        /// System instruction sent with every query
        #[serde(default)]
        instruction: Option<String>,
    },
}

fn default_synonyms_top_k() -> usize {
    5
}

/// Indexer selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IndexerConfig {
    /// Lexical BM25 over the optimized content
    Bm25,
    Dense(DenseConfig),
}

/// Dense (embedding) indexer settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DenseConfig {
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Documents per embedding call
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Use the instruction prefixes of instruction-tuned embedding models
    #[serde(default)]
    pub instructor: bool,

    /// Prepended to every document before embedding
    #[serde(default)]
    pub document_prefix: Option<String>,

    /// Prepended to every query before embedding
    #[serde(default)]
    pub query_prefix: Option<String>,
}

fn default_batch_size() -> usize {
    64
}

pub const INSTRUCTOR_DOCUMENT_PREFIX: &str = "Represents the document for retrieval: ";
pub const INSTRUCTOR_QUERY_PREFIX: &str = "Represents the query for retrieval: ";

impl DenseConfig {
    /// Effective `(document, query)` prefixes.
    pub fn prefixes(&self) -> (String, String) {
        let (doc_default, query_default) = if self.instructor {
            (INSTRUCTOR_DOCUMENT_PREFIX, INSTRUCTOR_QUERY_PREFIX)
        } else {
            ("", "")
        };
        (
            self.document_prefix
                .clone()
                .unwrap_or_else(|| doc_default.to_string()),
            self.query_prefix
                .clone()
                .unwrap_or_else(|| query_default.to_string()),
        )
    }
}

impl Default for DenseConfig {
    fn default() -> Self {
        Self {
            embedding: EmbeddingConfig::default(),
            batch_size: default_batch_size(),
            instructor: false,
            document_prefix: None,
            query_prefix: None,
        }
    }
}

/// Embedding provider selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "provider", rename_all = "snake_case")]
pub enum EmbeddingConfig {
    /// Deterministic local trigram hashing
    Trigram {
        #[serde(default = "default_trigram_dimensions")]
        dimensions: usize,
    },
    Ollama {
        #[serde(default = "default_ollama_embedding_model")]
        model: String,
        #[serde(default)]
        endpoint: Option<String>,
        #[serde(default = "default_ollama_dimensions")]
        dimensions: usize,
    },
}

fn default_trigram_dimensions() -> usize {
    384
}

fn default_ollama_embedding_model() -> String {
    "nomic-embed-text".to_string()
}

fn default_ollama_dimensions() -> usize {
    768
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self::Trigram {
            dimensions: default_trigram_dimensions(),
        }
    }
}

/// Answer synthesizer selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SynthesizerConfig {
    /// Count the tokens an LLM run would send, without calling a model
    #[default]
    TokenCount,
    Llm {
        /// Prompt template file; the built-in template is used when absent
        #[serde(default)]
        template: Option<PathBuf>,
    },
}
