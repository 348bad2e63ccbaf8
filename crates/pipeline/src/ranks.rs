//! Ranks file for external scoring tools.
//!
//! One line per query: `<number> <rank>`, where rank is the 0-based position
//! of the gold document, capped at [`MISSING_RANK`], or [`MISSING_RANK`]
//! when it was not found.

use crate::results::RagResults;
use kolrag_core::AppResult;
use std::fs;
use std::path::Path;

pub const MISSING_RANK: usize = 1000;

/// 0-based rank for a 1-based found position.
pub fn zero_based_rank(rank: Option<usize>) -> usize {
    match rank {
        Some(rank) => rank.saturating_sub(1).min(MISSING_RANK),
        None => MISSING_RANK,
    }
}

/// Render the ranks lines of `results`.
pub fn format_ranks(results: &RagResults) -> String {
    results
        .queries
        .iter()
        .map(|q| format!("{} {}\n", q.number, zero_based_rank(q.rank)))
        .collect()
}

/// Read a results file and write its ranks file.
pub fn create_ranks(json_path: &Path, ranks_path: &Path) -> AppResult<usize> {
    let results = RagResults::load(json_path)?;
    if let Some(parent) = ranks_path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(ranks_path, format_ranks(&results))?;

    tracing::info!(
        "Wrote {} ranks from {:?} to {:?}",
        results.queries.len(),
        json_path,
        ranks_path
    );
    Ok(results.queries.len())
}
