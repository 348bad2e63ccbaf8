//! The pipeline controller.
//!
//! Stages run strictly in order, each over the full batch:
//! load corpus, optimize queries, optimize documents, build every index,
//! fused retrieval, answer synthesis. Any stage error aborts the run.

use crate::cache::{fingerprint, CacheFile};
use crate::config::PipelineConfig;
use crate::fusion::{fuse, FusionWarning};
use crate::indexer::Indexer;
use crate::optimizer::{OptimizerChain, OptimizerStage, TextKind};
use crate::preprocess::{MarkdownCorpusPreprocessor, Preprocessor};
use crate::progress::ProgressReporter;
use crate::synthesizer::AnswerSynthesizer;
use crate::types::{Query, TextUnit};
use kolrag_core::AppResult;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::Instrument;

/// Bump when optimizer behavior changes without a stage rename.
const OPTIMIZED_CACHE_VERSION: u32 = 1;

/// Outcome of one pipeline run.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    /// Units in the corpus snapshot
    pub units: usize,
    /// Non-fatal retrieval conditions
    pub warnings: Vec<FusionWarning>,
    /// Tokens sent to the answer model so far
    pub sent_tokens: usize,
    pub duration_secs: f64,
}

/// A fully assembled RAG pipeline.
pub struct Rag {
    preprocessor: Box<dyn Preprocessor>,
    chain: OptimizerChain,
    indexers: Vec<Indexer>,
    synthesizer: AnswerSynthesizer,
    corpus: PathBuf,
    chunk_size: usize,
    top_k: usize,
    document_cache: Option<PathBuf>,
    progress: ProgressReporter,
}

impl Rag {
    pub fn new(
        preprocessor: Box<dyn Preprocessor>,
        chain: OptimizerChain,
        indexers: Vec<Indexer>,
        synthesizer: AnswerSynthesizer,
        corpus: impl Into<PathBuf>,
    ) -> Self {
        Self {
            preprocessor,
            chain,
            indexers,
            synthesizer,
            corpus: corpus.into(),
            chunk_size: 64,
            top_k: 20,
            document_cache: None,
            progress: ProgressReporter::noop(),
        }
    }

    /// Assemble the pipeline described by `config`.
    pub fn from_config(config: &PipelineConfig) -> AppResult<Self> {
        config.validate()?;

        let stages = config
            .optimizers
            .iter()
            .map(|stage| OptimizerStage::from_config(stage, &config.llm))
            .collect::<AppResult<Vec<_>>>()?;
        let indexers = config
            .indexers
            .iter()
            .map(Indexer::from_config)
            .collect::<AppResult<Vec<_>>>()?;
        let synthesizer = AnswerSynthesizer::from_config(&config.synthesizer, &config.llm)?;

        let document_cache = if config.cache_optimized_documents {
            config.cache_dir.clone()
        } else {
            None
        };

        Ok(Self::new(
            Box::new(MarkdownCorpusPreprocessor::new(config.cache_dir.clone())),
            OptimizerChain::new(stages),
            indexers,
            synthesizer,
            &config.corpus,
        )
        .with_chunk_size(config.chunk_size)
        .with_top_k(config.top_k)
        .with_document_cache(document_cache))
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    /// Cache optimized document content under `dir`.
    pub fn with_document_cache(mut self, dir: Option<PathBuf>) -> Self {
        self.document_cache = dir;
        self
    }

    pub fn with_progress(mut self, progress: ProgressReporter) -> Self {
        self.progress = progress;
        self
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    pub fn corpus(&self) -> &Path {
        &self.corpus
    }

    pub fn preprocessor_name(&self) -> &str {
        self.preprocessor.name()
    }

    pub fn optimizer_names(&self) -> Vec<String> {
        self.chain.names()
    }

    pub fn indexer_names(&self) -> Vec<String> {
        self.indexers.iter().map(Indexer::name).collect()
    }

    pub fn synthesizer_name(&self) -> String {
        self.synthesizer.name()
    }

    pub fn sent_tokens(&self) -> usize {
        self.synthesizer.sent_tokens_counter()
    }

    /// Run every stage over `queries`.
    ///
    /// On success each query carries its optimized text, fused sources and,
    /// when the synthesizer produces one, a final answer.
    pub async fn answer_queries(&mut self, queries: &mut [Query]) -> AppResult<RunSummary> {
        let start = Instant::now();
        tracing::info!(
            "Answering {} queries over {:?}",
            queries.len(),
            self.corpus
        );

        let mut units = self
            .preprocessor
            .load_or_process(&self.corpus)
            .instrument(tracing::info_span!("load", preprocessor = self.preprocessor.name()))
            .await?;
        self.progress
            .load(units.len() as u64, &self.corpus.to_string_lossy());

        self.optimize_queries(queries)
            .instrument(tracing::info_span!("optimize", kind = "queries"))
            .await?;
        self.optimize_units(&mut units)
            .instrument(tracing::info_span!("optimize", kind = "documents"))
            .await?;

        let units: Vec<Arc<TextUnit>> = units.into_iter().map(Arc::new).collect();
        self.build_indexes(&units)
            .instrument(tracing::info_span!("index", units = units.len()))
            .await?;

        let warnings = fuse(queries, &self.indexers, self.top_k)
            .instrument(tracing::info_span!("retrieve", k = self.top_k))
            .await?;
        let total = queries.len() as u64;
        self.progress
            .retrieve(total, total, &self.indexer_names().join("+"));

        self.synthesizer
            .retrieve_final_answers(queries, &self.progress)
            .instrument(tracing::info_span!("synthesize"))
            .await?;

        let summary = RunSummary {
            units: units.len(),
            warnings,
            sent_tokens: self.sent_tokens(),
            duration_secs: start.elapsed().as_secs_f64(),
        };
        tracing::info!(
            "Run completed: {} units, {} warnings, {} tokens sent in {:.2}s",
            summary.units,
            summary.warnings.len(),
            summary.sent_tokens,
            summary.duration_secs
        );
        Ok(summary)
    }

    async fn optimize_queries(&self, queries: &mut [Query]) -> AppResult<()> {
        let texts: Vec<String> = queries.iter().map(|q| q.query.clone()).collect();
        let total = texts.len() as u64;

        let optimized = self
            .chain
            .optimize_chunked(TextKind::Queries, texts, self.chunk_size, |done| {
                self.progress.optimize(done as u64, total, "queries")
            })
            .await?;

        for (query, text) in queries.iter_mut().zip(optimized) {
            query.indexing_optimized_query = text;
        }
        Ok(())
    }

    async fn optimize_units(&self, units: &mut [TextUnit]) -> AppResult<()> {
        let cache = self.document_cache.as_ref().map(|dir| {
            CacheFile::new(
                dir,
                "optimized",
                &self.corpus.to_string_lossy(),
                OPTIMIZED_CACHE_VERSION,
            )
        });
        let stages = self.chain.fingerprints();
        let key = fingerprint(
            stages
                .iter()
                .map(String::as_str)
                .chain(["|"])
                .chain(units.iter().flat_map(|u| {
                    [u.doc_id.as_str(), u.section_id.as_str(), u.content.as_str()]
                })),
        );

        if let Some(cache) = &cache {
            if let Some(cached) = cache.load::<Vec<String>>(&key)? {
                if cached.len() == units.len() {
                    tracing::info!("Using cached optimized documents from {:?}", cache.path());
                    for (unit, text) in units.iter_mut().zip(cached) {
                        unit.optimized_content = text;
                    }
                    let total = units.len() as u64;
                    self.progress.optimize(total, total, "documents");
                    return Ok(());
                }
            }
        }

        let texts: Vec<String> = units.iter().map(|u| u.content.clone()).collect();
        let total = texts.len() as u64;
        let optimized = self
            .chain
            .optimize_chunked(TextKind::Documents, texts, self.chunk_size, |done| {
                self.progress.optimize(done as u64, total, "documents")
            })
            .await?;

        if let Some(cache) = &cache {
            cache.store(&key, &optimized)?;
        }
        for (unit, text) in units.iter_mut().zip(optimized) {
            unit.optimized_content = text;
        }
        Ok(())
    }

    async fn build_indexes(&mut self, units: &[Arc<TextUnit>]) -> AppResult<()> {
        let total = self.indexers.len() as u64;
        for (i, indexer) in self.indexers.iter_mut().enumerate() {
            indexer.index_data(units).await?;
            self.progress.index(i as u64 + 1, total, &indexer.name());
        }
        Ok(())
    }
}

impl std::fmt::Debug for Rag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rag")
            .field("preprocessor", &self.preprocessor.name())
            .field("optimizers", &self.chain.names())
            .field("indexers", &self.indexers)
            .field("synthesizer", &self.synthesizer.name())
            .field("top_k", &self.top_k)
            .finish()
    }
}
