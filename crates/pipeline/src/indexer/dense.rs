//! Dense retrieval by cosine similarity over embeddings.

use super::embeddings::EmbeddingProvider;
use super::Segment;
use crate::types::TextUnit;
use kolrag_core::{AppError, AppResult};
use std::sync::Arc;

/// Brute-force vector index.
#[derive(Debug)]
pub struct DenseIndex {
    provider: Arc<dyn EmbeddingProvider>,
    batch_size: usize,
    document_prefix: String,
    query_prefix: String,
    units: Vec<Arc<TextUnit>>,
    vectors: Vec<Vec<f32>>,
}

impl DenseIndex {
    pub fn new(
        provider: Arc<dyn EmbeddingProvider>,
        batch_size: usize,
        document_prefix: String,
        query_prefix: String,
    ) -> Self {
        Self {
            provider,
            batch_size: batch_size.max(1),
            document_prefix,
            query_prefix,
            units: Vec::new(),
            vectors: Vec::new(),
        }
    }

    pub fn provider(&self) -> &dyn EmbeddingProvider {
        self.provider.as_ref()
    }

    /// Embed `texts` with `prefix`, `batch_size` at a time.
    async fn embed_all(&self, texts: &[&str], prefix: &str) -> AppResult<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            let inputs: Vec<String> = batch
                .iter()
                .map(|text| format!("{}{}", prefix, text))
                .collect();
            let embedded = self.provider.embed_batch(&inputs).await?;
            if embedded.len() != inputs.len() {
                return Err(AppError::Other(format!(
                    "{} returned {} embeddings for {} texts",
                    self.provider.provider_name(),
                    embedded.len(),
                    inputs.len()
                )));
            }
            vectors.extend(embedded);
            tracing::debug!("Embedded {}/{}", vectors.len(), texts.len());
        }
        Ok(vectors)
    }

    /// Replace the index with embeddings of the units' optimized content.
    pub async fn build(&mut self, units: &[Arc<TextUnit>]) -> AppResult<()> {
        let texts: Vec<&str> = units.iter().map(|u| u.optimized_content.as_str()).collect();
        let vectors = self.embed_all(&texts, &self.document_prefix).await?;

        self.units = units.to_vec();
        self.vectors = vectors;
        Ok(())
    }

    /// The `min(k, corpus)` most similar units for every query, best first.
    pub async fn top_k(&self, queries: &[&str], k: usize) -> AppResult<Vec<Segment>> {
        let query_vectors = self.embed_all(queries, &self.query_prefix).await?;

        Ok(query_vectors
            .iter()
            .map(|query| {
                let mut ranked: Vec<(usize, f32)> = self
                    .vectors
                    .iter()
                    .enumerate()
                    .map(|(i, v)| (i, cosine_similarity(query, v)))
                    .collect();
                ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
                ranked
                    .into_iter()
                    .take(k)
                    .map(|(i, _)| Arc::clone(&self.units[i]))
                    .collect()
            })
            .collect())
    }
}

/// Cosine similarity; 0.0 for mismatched or zero vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indexer::embeddings::TrigramProvider;
    use std::sync::Mutex;

    /// Records every batch it is asked to embed.
    #[derive(Debug, Default)]
    struct RecordingProvider {
        batches: Mutex<Vec<Vec<String>>>,
    }

    #[async_trait::async_trait]
    impl EmbeddingProvider for RecordingProvider {
        fn provider_name(&self) -> &str {
            "recording"
        }

        fn model_name(&self) -> &str {
            "recording"
        }

        fn dimensions(&self) -> usize {
            2
        }

        async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
            self.batches.lock().unwrap().push(texts.to_vec());
            Ok(texts.iter().map(|t| vec![t.len() as f32, 1.0]).collect())
        }
    }

    fn units(texts: &[&str]) -> Vec<Arc<TextUnit>> {
        texts
            .iter()
            .enumerate()
            .map(|(i, t)| Arc::new(TextUnit::new(i.to_string(), "0", *t)))
            .collect()
    }

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }

    #[tokio::test]
    async fn test_returns_min_of_k_and_corpus() {
        let mut index = DenseIndex::new(
            Arc::new(TrigramProvider::new(256)),
            64,
            String::new(),
            String::new(),
        );
        index
            .build(&units(&["דמי אבטלה לעובדים", "קצבת זקנה", "מענק לידה"]))
            .await
            .unwrap();

        let segments = index.top_k(&["דמי אבטלה"], 2).await.unwrap();
        assert_eq!(segments[0].len(), 2);
        assert_eq!(segments[0][0].doc_id, "0");

        let segments = index.top_k(&["דמי אבטלה"], 10).await.unwrap();
        assert_eq!(segments[0].len(), 3);
    }

    #[tokio::test]
    async fn test_batches_and_prefixes() {
        let provider = Arc::new(RecordingProvider::default());
        let mut index = DenseIndex::new(
            provider.clone(),
            2,
            "doc: ".to_string(),
            "query: ".to_string(),
        );
        index.build(&units(&["a", "b", "c"])).await.unwrap();
        index.top_k(&["q"], 1).await.unwrap();

        let batches = provider.batches.lock().unwrap();
        assert_eq!(batches.len(), 3);
        assert_eq!(batches[0], vec!["doc: a", "doc: b"]);
        assert_eq!(batches[1], vec!["doc: c"]);
        assert_eq!(batches[2], vec!["query: q"]);
    }
}
