//! Multi-indexer retrieval fusion.
//!
//! Segments are merged round-robin: depth 0 of every indexer in configured
//! order, then depth 1, and so on, down to the length of the shortest
//! segment. A unit already taken is skipped. Units that several indexers rank
//! high therefore surface early, and each indexer's own order is kept at
//! every depth.

use crate::indexer::{Indexer, Segment};
use crate::types::{Query, TextUnit};
use kolrag_core::AppResult;
use std::collections::HashSet;
use std::sync::Arc;

/// A non-fatal retrieval condition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FusionWarning {
    pub query_number: usize,
    pub indexer: String,
    pub returned: usize,
    pub requested: usize,
}

impl std::fmt::Display for FusionWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "query {}: {} returned {} of {} requested units",
            self.query_number, self.indexer, self.returned, self.requested
        )
    }
}

/// Merge one query's segments into a deduplicated ranked list.
pub fn merge_round_robin(segments: &[Segment]) -> Vec<Arc<TextUnit>> {
    let depth = segments.iter().map(Vec::len).min().unwrap_or(0);

    let mut seen: HashSet<(&str, &str)> = HashSet::new();
    let mut merged = Vec::new();
    for i in 0..depth {
        for segment in segments {
            let unit = &segment[i];
            if seen.insert(unit.key()) {
                merged.push(Arc::clone(unit));
            }
        }
    }
    merged
}

/// Query every indexer and write the fused list onto each query.
///
/// Indexers are queried one after another in configured order. A segment
/// shorter than `k` is reported as a warning, never an error.
pub async fn fuse(
    queries: &mut [Query],
    indexers: &[Indexer],
    k: usize,
) -> AppResult<Vec<FusionWarning>> {
    // per_indexer[j][q] is indexer j's segment for query q
    let mut per_indexer: Vec<Vec<Segment>> = Vec::with_capacity(indexers.len());
    for indexer in indexers {
        per_indexer.push(indexer.retrieve(queries, k).await?);
    }

    let mut warnings = Vec::new();
    for (q, query) in queries.iter_mut().enumerate() {
        let segments: Vec<Segment> = per_indexer
            .iter_mut()
            .map(|lists| std::mem::take(&mut lists[q]))
            .collect();

        for (indexer, segment) in indexers.iter().zip(&segments) {
            if segment.len() < k {
                let warning = FusionWarning {
                    query_number: query.number,
                    indexer: indexer.name(),
                    returned: segment.len(),
                    requested: k,
                };
                tracing::warn!("{}", warning);
                warnings.push(warning);
            }
        }

        query.answer_sources = merge_round_robin(&segments);
    }

    Ok(warnings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indexer::Bm25Index;

    fn unit(doc: &str, section: &str) -> Arc<TextUnit> {
        Arc::new(TextUnit::new(doc, section, format!("{doc} {section}")))
    }

    fn ids(units: &[Arc<TextUnit>]) -> Vec<String> {
        units.iter().map(|u| u.id()).collect()
    }

    #[test]
    fn test_round_robin_interleaves() {
        let a = vec![unit("1", "0"), unit("2", "0"), unit("3", "0")];
        let b = vec![unit("4", "0"), unit("5", "0"), unit("6", "0")];
        let merged = merge_round_robin(&[a, b]);
        assert_eq!(ids(&merged), vec!["1_0", "4_0", "2_0", "5_0", "3_0", "6_0"]);
    }

    #[test]
    fn test_duplicates_keep_first_position() {
        let a = vec![unit("1", "0"), unit("2", "0")];
        let b = vec![unit("2", "0"), unit("1", "0")];
        let merged = merge_round_robin(&[a, b]);
        assert_eq!(ids(&merged), vec!["1_0", "2_0"]);
    }

    #[test]
    fn test_dedup_is_by_identity_not_content() {
        let a = vec![Arc::new(TextUnit::new("1", "0", "same text"))];
        let b = vec![Arc::new(TextUnit::new("2", "0", "same text"))];
        assert_eq!(merge_round_robin(&[a, b]).len(), 2);
    }

    #[test]
    fn test_depth_is_shortest_segment() {
        let a = vec![unit("1", "0"), unit("2", "0"), unit("3", "0")];
        let b = vec![unit("4", "0")];
        assert_eq!(ids(&merge_round_robin(&[a, b])), vec!["1_0", "4_0"]);
    }

    #[test]
    fn test_empty_segment_empties_result() {
        let a = vec![unit("1", "0")];
        assert!(merge_round_robin(&[a, vec![]]).is_empty());
        assert!(merge_round_robin(&[]).is_empty());
    }

    #[test]
    fn test_merged_length_is_bounded() {
        let segments: Vec<Segment> = (0..3)
            .map(|j| (0..4).map(|i| unit(&((i + j) % 5).to_string(), "0")).collect())
            .collect();
        let merged = merge_round_robin(&segments);
        assert!(merged.len() <= 3 * 4);

        let unique: HashSet<String> = ids(&merged).into_iter().collect();
        assert_eq!(unique.len(), merged.len());
    }

    #[tokio::test]
    async fn test_fuse_warns_on_short_segments() {
        let mut index = Bm25Index::new();
        index.build(&[unit("1", "0"), unit("2", "0")]).unwrap();
        let indexers = vec![Indexer::Bm25(index)];

        let mut queries = vec![Query::new(1, "1", None), Query::new(2, "missing", None)];
        let warnings = fuse(&mut queries, &indexers, 2).await.unwrap();

        assert_eq!(ids(&queries[0].answer_sources), vec!["1_0"]);
        assert!(queries[1].answer_sources.is_empty());
        assert_eq!(warnings.len(), 2);
        assert_eq!(warnings[0].query_number, 1);
        assert_eq!(warnings[0].returned, 1);
        assert_eq!(warnings[1].returned, 0);
    }

    #[tokio::test]
    async fn test_fuse_replaces_previous_sources() {
        let mut index = Bm25Index::new();
        index.build(&[unit("1", "0")]).unwrap();
        let indexers = vec![Indexer::Bm25(index)];

        let mut queries = vec![Query::new(1, "1", None)];
        queries[0].answer_sources = vec![unit("9", "9")];
        fuse(&mut queries, &indexers, 1).await.unwrap();
        assert_eq!(ids(&queries[0].answer_sources), vec!["1_0"]);

        // Fusing again yields the same list.
        let warnings = fuse(&mut queries, &indexers, 1).await.unwrap();
        assert!(warnings.is_empty());
        assert_eq!(ids(&queries[0].answer_sources), vec!["1_0"]);
    }
}
