//! Retrieval quality metrics over processed queries.
//!
//! Only queries with a gold document id take part; a batch without any
//! scores 0.0.

use crate::types::Query;
use std::collections::BTreeMap;

fn gold(query: &Query) -> Option<&str> {
    query.gold_doc_id.as_deref()
}

/// 1-based position of the gold document within the first `k` sources.
fn gold_position(query: &Query, k: usize) -> Option<usize> {
    let gold = gold(query)?;
    query
        .answer_sources
        .iter()
        .take(k)
        .position(|unit| unit.doc_id == gold)
        .map(|i| i + 1)
}

/// Fraction of queries whose gold document is among the first `k` sources.
///
/// `k` is clamped to `requested_k`, the number of units asked of each
/// indexer.
pub fn recall_at_k(queries: &[Query], k: usize, requested_k: usize) -> f64 {
    let k = k.min(requested_k);
    let evaluated: Vec<&Query> = queries.iter().filter(|q| gold(q).is_some()).collect();
    if evaluated.is_empty() {
        return 0.0;
    }

    let hits = evaluated
        .iter()
        .filter(|q| gold_position(q, k).is_some())
        .count();
    hits as f64 / evaluated.len() as f64
}

/// Mean reciprocal rank at cutoff `k`.
///
/// Writes the found position onto each query's `rank`, or clears it when
/// the gold document is not within the cutoff.
pub fn mrr(queries: &mut [Query], k: usize) -> f64 {
    let mut total = 0.0;
    let mut evaluated = 0usize;

    for query in queries.iter_mut() {
        if gold(query).is_none() {
            query.rank = None;
            continue;
        }
        evaluated += 1;
        query.rank = gold_position(query, k);
        if let Some(rank) = query.rank {
            total += 1.0 / rank as f64;
        }
    }

    if evaluated == 0 {
        0.0
    } else {
        total / evaluated as f64
    }
}

/// Numbers of queries whose gold document was not retrieved at all.
pub fn wrong_retrieved(queries: &[Query]) -> Vec<usize> {
    queries
        .iter()
        .filter(|q| gold(q).is_some() && !q.gold_retrieved())
        .map(|q| q.number)
        .collect()
}

/// Metrics of one evaluated run.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    /// Recall keyed by effective cutoff
    pub recall: BTreeMap<usize, f64>,
    pub mrr: f64,
    pub wrong_retrieved: Vec<usize>,
}

impl Evaluation {
    /// Evaluate `queries` retrieved with `requested_k` units per indexer.
    ///
    /// MRR uses `requested_k` as its cutoff. Cutoffs that clamp to the same
    /// effective k are reported once.
    pub fn evaluate(queries: &mut [Query], cutoffs: &[usize], requested_k: usize) -> Self {
        let recall = cutoffs
            .iter()
            .map(|&k| (k.min(requested_k), recall_at_k(queries, k, requested_k)))
            .collect();
        let mrr = mrr(queries, requested_k);
        let wrong_retrieved = wrong_retrieved(queries);

        tracing::info!(
            "Evaluated {} queries: MRR {:.4}, {} without gold in results",
            queries.len(),
            mrr,
            wrong_retrieved.len()
        );

        Self {
            recall,
            mrr,
            wrong_retrieved,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TextUnit;
    use std::sync::Arc;

    fn query(number: usize, gold: Option<&str>, retrieved: &[&str]) -> Query {
        let mut query = Query::new(number, "q", gold.map(str::to_string));
        query.answer_sources = retrieved
            .iter()
            .map(|doc| Arc::new(TextUnit::new(*doc, "0", "text")))
            .collect();
        query
    }

    fn batch() -> Vec<Query> {
        vec![
            query(1, Some("a"), &["a", "b", "c"]),
            query(2, Some("b"), &["c", "b", "a"]),
            query(3, Some("z"), &["a", "b", "c"]),
            query(4, Some("c"), &["a", "b", "c"]),
        ]
    }

    #[test]
    fn test_recall_at_k() {
        let queries = batch();
        assert_eq!(recall_at_k(&queries, 1, 20), 0.25);
        assert_eq!(recall_at_k(&queries, 2, 20), 0.5);
        assert_eq!(recall_at_k(&queries, 3, 20), 0.75);
    }

    #[test]
    fn test_recall_is_monotone_in_k() {
        let queries = batch();
        let values: Vec<f64> = (1..=5).map(|k| recall_at_k(&queries, k, 20)).collect();
        assert!(values.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_recall_clamps_to_requested_k() {
        let queries = batch();
        assert_eq!(recall_at_k(&queries, 10, 1), recall_at_k(&queries, 1, 1));
    }

    #[test]
    fn test_mrr_sets_ranks() {
        let mut queries = batch();
        let value = mrr(&mut queries, 20);

        let ranks: Vec<Option<usize>> = queries.iter().map(|q| q.rank).collect();
        assert_eq!(ranks, vec![Some(1), Some(2), None, Some(3)]);
        let expected = (1.0 + 0.5 + 0.0 + 1.0 / 3.0) / 4.0;
        assert!((value - expected).abs() < 1e-12);
    }

    #[test]
    fn test_mrr_respects_cutoff() {
        let mut queries = batch();
        let value = mrr(&mut queries, 1);
        assert_eq!(queries[1].rank, None);
        assert_eq!(value, 0.25);
    }

    #[test]
    fn test_queries_without_gold_are_ignored() {
        let mut queries = vec![query(1, Some("a"), &["a"]), query(2, None, &["x"])];
        assert_eq!(recall_at_k(&queries, 1, 20), 1.0);
        assert_eq!(mrr(&mut queries, 20), 1.0);
        assert!(wrong_retrieved(&queries).is_empty());

        let mut none = vec![query(1, None, &["x"])];
        assert_eq!(recall_at_k(&none, 1, 20), 0.0);
        assert_eq!(mrr(&mut none, 20), 0.0);
    }

    #[test]
    fn test_wrong_retrieved_uses_full_list() {
        let queries = batch();
        assert_eq!(wrong_retrieved(&queries), vec![3]);
    }

    #[test]
    fn test_mrr_twice_on_same_batch() {
        let mut queries = batch();
        queries[2].rank = Some(7);

        let first = mrr(&mut queries, 20);
        let first_ranks: Vec<Option<usize>> = queries.iter().map(|q| q.rank).collect();
        let second = mrr(&mut queries, 20);
        let second_ranks: Vec<Option<usize>> = queries.iter().map(|q| q.rank).collect();

        assert_eq!(first.to_bits(), second.to_bits());
        assert_eq!(first_ranks, second_ranks);
        assert_eq!(second_ranks[2], None);
    }

    #[test]
    fn test_evaluate_is_deterministic() {
        let mut queries = batch();
        let a = Evaluation::evaluate(&mut queries, &[1, 5, 10, 20], 3);
        let b = Evaluation::evaluate(&mut queries, &[1, 5, 10, 20], 3);
        assert_eq!(a, b);

        // 5, 10 and 20 all clamp to 3
        assert_eq!(a.recall.keys().copied().collect::<Vec<_>>(), vec![1, 3]);
        assert_eq!(a.recall[&3], 0.75);
        assert_eq!(a.wrong_retrieved, vec![3]);
    }
}
