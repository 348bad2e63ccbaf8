//! Ordered, fail-fast optimizer chain.

use super::OptimizerStage;
use kolrag_core::{AppError, AppResult};

/// Which side of the retrieval problem a batch belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextKind {
    Queries,
    Documents,
}

impl TextKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queries => "queries",
            Self::Documents => "documents",
        }
    }
}

/// Feeds a batch through every stage in order.
///
/// The output of stage `n` is the input of stage `n + 1`. An empty chain is
/// the identity. Output always has the length and order of the input.
#[derive(Debug, Default)]
pub struct OptimizerChain {
    stages: Vec<OptimizerStage>,
}

impl OptimizerChain {
    pub fn new(stages: Vec<OptimizerStage>) -> Self {
        Self { stages }
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Stage names in application order.
    pub fn names(&self) -> Vec<String> {
        self.stages.iter().map(|s| s.name().to_string()).collect()
    }

    /// Per-stage fingerprints, in chain order.
    pub fn fingerprints(&self) -> Vec<String> {
        self.stages.iter().map(OptimizerStage::fingerprint).collect()
    }

    pub async fn optimize_queries(&self, batch: Vec<String>) -> AppResult<Vec<String>> {
        self.optimize(TextKind::Queries, batch).await
    }

    pub async fn optimize_documents(&self, batch: Vec<String>) -> AppResult<Vec<String>> {
        self.optimize(TextKind::Documents, batch).await
    }

    /// Run one batch through all stages.
    ///
    /// # Errors
    /// Returns `AppError::Optimization` naming the failing stage, either
    /// because the stage raised or because it changed the batch length.
    pub async fn optimize(&self, kind: TextKind, batch: Vec<String>) -> AppResult<Vec<String>> {
        let mut current = batch;
        for stage in &self.stages {
            let result = match kind {
                TextKind::Queries => stage.optimize_queries(&current).await,
                TextKind::Documents => stage.optimize_documents(&current).await,
            };

            let output = result.map_err(|e| match e {
                AppError::Optimization { .. } => e,
                other => AppError::optimization(stage.name(), other.to_string()),
            })?;

            if output.len() != current.len() {
                return Err(AppError::optimization(
                    stage.name(),
                    format!(
                        "returned {} {} for a batch of {}",
                        output.len(),
                        kind.as_str(),
                        current.len()
                    ),
                ));
            }
            current = output;
        }
        Ok(current)
    }

    /// Run `texts` through the chain `chunk_size` items at a time.
    ///
    /// Chunks are processed one after another; the result equals running the
    /// whole collection as a single batch. `on_chunk` receives the number of
    /// items done so far after each chunk.
    pub async fn optimize_chunked<F>(
        &self,
        kind: TextKind,
        texts: Vec<String>,
        chunk_size: usize,
        mut on_chunk: F,
    ) -> AppResult<Vec<String>>
    where
        F: FnMut(usize),
    {
        if self.is_empty() {
            on_chunk(texts.len());
            return Ok(texts);
        }

        let chunk_size = chunk_size.max(1);
        let mut out = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(chunk_size) {
            let optimized = self.optimize(kind, chunk.to_vec()).await?;
            out.extend(optimized);
            on_chunk(out.len());
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimizer::{AffixSplitter, StopWordFilter, TextOptimizer};
    use std::sync::Arc;

    fn batch(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    /// Drops the last item of every batch.
    struct Lossy;

    #[async_trait::async_trait]
    impl TextOptimizer for Lossy {
        fn name(&self) -> &str {
            "lossy"
        }

        async fn optimize_queries(&self, batch: &[String]) -> AppResult<Vec<String>> {
            Ok(batch[..batch.len().saturating_sub(1)].to_vec())
        }

        async fn optimize_documents(&self, batch: &[String]) -> AppResult<Vec<String>> {
            self.optimize_queries(batch).await
        }
    }

    struct Failing;

    #[async_trait::async_trait]
    impl TextOptimizer for Failing {
        fn name(&self) -> &str {
            "failing"
        }

        async fn optimize_queries(&self, _batch: &[String]) -> AppResult<Vec<String>> {
            Err(AppError::Llm("model unavailable".to_string()))
        }

        async fn optimize_documents(&self, batch: &[String]) -> AppResult<Vec<String>> {
            self.optimize_queries(batch).await
        }
    }

    #[tokio::test]
    async fn test_empty_chain_is_identity() {
        let chain = OptimizerChain::default();
        let input = batch(&["a", "", "ג"]);
        assert_eq!(chain.optimize_queries(input.clone()).await.unwrap(), input);
        assert_eq!(chain.optimize_documents(input.clone()).await.unwrap(), input);
    }

    #[tokio::test]
    async fn test_stages_apply_in_order() {
        // Stop words first: "ה" is removed before the splitter sees it.
        let chain = OptimizerChain::new(vec![
            OptimizerStage::StopWords(StopWordFilter::default()),
            OptimizerStage::AffixSplit(AffixSplitter::new()),
        ]);
        let out = chain.optimize_queries(batch(&["ה הדרכים"])).await.unwrap();
        assert_eq!(out, batch(&["הדרכים דרכים דרך הדרך"]));
        assert_eq!(chain.names(), vec!["stop_words", "affix_split"]);
    }

    #[tokio::test]
    async fn test_empty_output_keeps_its_slot() {
        let chain = OptimizerChain::new(vec![OptimizerStage::StopWords(
            StopWordFilter::default(),
        )]);
        let out = chain
            .optimize_documents(batch(&["גם אני", "ביטוח לאומי"]))
            .await
            .unwrap();
        assert_eq!(out, batch(&["", "ביטוח לאומי"]));
    }

    #[tokio::test]
    async fn test_length_change_is_an_error() {
        let chain = OptimizerChain::new(vec![OptimizerStage::External(Arc::new(Lossy))]);
        let err = chain.optimize_queries(batch(&["a", "b"])).await.unwrap_err();
        match err {
            AppError::Optimization { stage, .. } => assert_eq!(stage, "lossy"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_stage_failure_aborts_chain() {
        let chain = OptimizerChain::new(vec![
            OptimizerStage::External(Arc::new(Failing)),
            OptimizerStage::AffixSplit(AffixSplitter::new()),
        ]);
        let err = chain.optimize_queries(batch(&["a"])).await.unwrap_err();
        match err {
            AppError::Optimization { stage, message } => {
                assert_eq!(stage, "failing");
                assert!(message.contains("model unavailable"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_chunking_does_not_change_results() {
        let chain = OptimizerChain::new(vec![
            OptimizerStage::HebrewOnly,
            OptimizerStage::AffixSplit(AffixSplitter::new()),
        ]);
        let texts = batch(&[
            "הדרכים לפנסיה",
            "what?",
            "ובית",
            "",
            "מסלולים 2024",
            "לומות",
            "בה",
        ]);

        let whole = chain
            .optimize(TextKind::Documents, texts.clone())
            .await
            .unwrap();

        for chunk_size in [1, 2, 3, 64] {
            let mut progress = Vec::new();
            let chunked = chain
                .optimize_chunked(TextKind::Documents, texts.clone(), chunk_size, |done| {
                    progress.push(done)
                })
                .await
                .unwrap();
            assert_eq!(chunked, whole, "chunk size {chunk_size}");
            assert_eq!(progress.last().copied(), Some(texts.len()));
        }
    }

    #[tokio::test]
    async fn test_chunk_size_zero_is_treated_as_one() {
        let chain = OptimizerChain::new(vec![OptimizerStage::Identity]);
        let out = chain
            .optimize_chunked(TextKind::Queries, batch(&["a", "b"]), 0, |_| {})
            .await
            .unwrap();
        assert_eq!(out, batch(&["a", "b"]));
    }
}
