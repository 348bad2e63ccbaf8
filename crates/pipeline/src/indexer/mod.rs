//! Indexers: build an index over text units and rank them for queries.
//!
//! Each indexer returns, per query, a segment of up to `k` units ranked by
//! descending relevance. Segments from all indexers are merged by
//! [`crate::fusion`]; indexers never write to the queries themselves.

pub mod bm25;
pub mod dense;
pub mod embeddings;

pub use bm25::Bm25Index;
pub use dense::{cosine_similarity, DenseIndex};
pub use embeddings::{create_provider, EmbeddingProvider, OllamaEmbeddingProvider, TrigramProvider};

use crate::config::IndexerConfig;
use crate::types::{Query, TextUnit};
use kolrag_core::{AppError, AppResult};
use std::sync::Arc;

/// One indexer's ranked result for one query, best first.
pub type Segment = Vec<Arc<TextUnit>>;

/// Lexical tokens: whitespace split, punctuation trimmed from both ends,
/// lowercased.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split_whitespace()
        .map(|token| token.trim_matches(|c: char| !c.is_alphanumeric()))
        .filter(|token| !token.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Index implemented outside this crate.
#[async_trait::async_trait]
pub trait IndexBackend: Send + Sync {
    fn name(&self) -> &str;

    /// Build or replace the index.
    async fn index_data(&mut self, units: &[Arc<TextUnit>]) -> AppResult<()>;

    /// Up to `k` units per query, keyed by each query's optimized text.
    async fn retrieve(&self, queries: &[&str], k: usize) -> AppResult<Vec<Segment>>;
}

/// A configured indexer.
pub enum Indexer {
    Bm25(Bm25Index),
    Dense(DenseIndex),
    External(Box<dyn IndexBackend>),
}

impl Indexer {
    pub fn from_config(config: &IndexerConfig) -> AppResult<Self> {
        match config {
            IndexerConfig::Bm25 => Ok(Self::Bm25(Bm25Index::new())),
            IndexerConfig::Dense(dense) => {
                let provider = create_provider(&dense.embedding)?;
                let (document_prefix, query_prefix) = dense.prefixes();
                Ok(Self::Dense(DenseIndex::new(
                    provider,
                    dense.batch_size,
                    document_prefix,
                    query_prefix,
                )))
            }
        }
    }

    pub fn name(&self) -> String {
        match self {
            Self::Bm25(_) => "bm25".to_string(),
            Self::Dense(index) => format!("dense:{}", index.provider().model_name()),
            Self::External(backend) => backend.name().to_string(),
        }
    }

    /// Build the index over the units' optimized content.
    ///
    /// # Errors
    /// Any failure is reported as `AppError::Indexing` naming this indexer.
    pub async fn index_data(&mut self, units: &[Arc<TextUnit>]) -> AppResult<()> {
        let name = self.name();
        let result = match self {
            Self::Bm25(index) => index.build(units),
            Self::Dense(index) => index.build(units).await,
            Self::External(backend) => backend.index_data(units).await,
        };
        result.map_err(|e| wrap(&name, e))?;

        tracing::info!("Indexed {} units with {}", units.len(), name);
        Ok(())
    }

    /// One segment per query, in query order.
    pub async fn retrieve(&self, queries: &[Query], k: usize) -> AppResult<Vec<Segment>> {
        let keys: Vec<&str> = queries
            .iter()
            .map(|q| q.indexing_optimized_query.as_str())
            .collect();

        let result = match self {
            Self::Bm25(index) => keys.iter().map(|key| index.top_k(key, k)).collect(),
            Self::Dense(index) => index.top_k(&keys, k).await,
            Self::External(backend) => backend.retrieve(&keys, k).await,
        };
        let segments: Vec<Segment> = result.map_err(|e| wrap(&self.name(), e))?;

        if segments.len() != queries.len() {
            return Err(AppError::indexing(
                self.name(),
                format!(
                    "returned {} result lists for {} queries",
                    segments.len(),
                    queries.len()
                ),
            ));
        }
        Ok(segments)
    }
}

fn wrap(indexer: &str, error: AppError) -> AppError {
    match error {
        AppError::Indexing { .. } => error,
        other => AppError::indexing(indexer, other.to_string()),
    }
}

impl std::fmt::Debug for Indexer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Indexer({})", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DenseConfig;

    struct Broken;

    #[async_trait::async_trait]
    impl IndexBackend for Broken {
        fn name(&self) -> &str {
            "broken"
        }

        async fn index_data(&mut self, _units: &[Arc<TextUnit>]) -> AppResult<()> {
            Err(AppError::Other("disk full".to_string()))
        }

        async fn retrieve(&self, _queries: &[&str], _k: usize) -> AppResult<Vec<Segment>> {
            Ok(vec![])
        }
    }

    fn units() -> Vec<Arc<TextUnit>> {
        vec![
            Arc::new(TextUnit::new("1", "1", "This is a test document.")),
            Arc::new(TextUnit::new("2", "1", "This is another document.")),
        ]
    }

    #[test]
    fn test_tokenize() {
        assert_eq!(
            tokenize("This is a test, (document)."),
            vec!["this", "is", "a", "test", "document"]
        );
        assert_eq!(tokenize("מה?! ... גיל"), vec!["מה", "גיל"]);
        assert_eq!(tokenize("e-mail"), vec!["e-mail"]);
    }

    #[tokio::test]
    async fn test_bm25_retrieve_uses_optimized_query() {
        let mut indexer = Indexer::from_config(&IndexerConfig::Bm25).unwrap();
        indexer.index_data(&units()).await.unwrap();

        let mut query = Query::new(1, "unrelated words", None);
        query.indexing_optimized_query = "test document".to_string();

        let segments = indexer.retrieve(&[query], 1).await.unwrap();
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0][0].id(), "1_1");
    }

    #[tokio::test]
    async fn test_dense_from_config() {
        let mut indexer = Indexer::from_config(&IndexerConfig::Dense(DenseConfig::default())).unwrap();
        assert_eq!(indexer.name(), "dense:trigram-v1");
        indexer.index_data(&units()).await.unwrap();

        let segments = indexer
            .retrieve(&[Query::new(1, "test document", None)], 5)
            .await
            .unwrap();
        assert_eq!(segments[0].len(), 2);
    }

    #[tokio::test]
    async fn test_backend_errors_are_wrapped() {
        let mut indexer = Indexer::External(Box::new(Broken));
        let err = indexer.index_data(&units()).await.unwrap_err();
        match err {
            AppError::Indexing { indexer, message } => {
                assert_eq!(indexer, "broken");
                assert!(message.contains("disk full"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_segment_count_must_match_queries() {
        let indexer = Indexer::External(Box::new(Broken));
        let err = indexer
            .retrieve(&[Query::new(1, "q", None)], 3)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Indexing { .. }));
    }
}
