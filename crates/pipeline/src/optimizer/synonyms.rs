//! Dictionary-based synonym enrichment for queries.

use kolrag_core::{AppError, AppResult};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

/// Appends known synonyms after each query token.
///
/// The dictionary is a YAML map of word to synonym list:
///
/// ```yaml
/// פנסיה: [קצבה, גמלה]
/// גיל: [שנים]
/// ```
#[derive(Debug, Clone, Default)]
pub struct SynonymExpander {
    dictionary: HashMap<String, Vec<String>>,
    top_k: usize,
}

impl SynonymExpander {
    pub fn new(dictionary: HashMap<String, Vec<String>>, top_k: usize) -> Self {
        Self { dictionary, top_k }
    }

    /// Load a dictionary file.
    pub fn load(path: &Path, top_k: usize) -> AppResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!(
                "Failed to read synonym dictionary at {:?}: {}",
                path, e
            ))
        })?;
        let dictionary: HashMap<String, Vec<String>> = serde_yaml::from_str(&content)?;

        tracing::debug!(
            "Loaded {} synonym entries from {:?}",
            dictionary.len(),
            path
        );
        Ok(Self::new(dictionary, top_k))
    }

    /// Stable text form of the dictionary and `top_k`.
    pub fn describe(&self) -> String {
        let mut entries: Vec<String> = self
            .dictionary
            .iter()
            .map(|(word, synonyms)| format!("{}={}", word, synonyms.join(",")))
            .collect();
        entries.sort_unstable();
        format!("top_k={};{}", self.top_k, entries.join(";"))
    }

    /// Expand a query. Every word appears once, first occurrence wins.
    pub fn expand(&self, text: &str) -> String {
        let mut seen = HashSet::new();
        let mut out = Vec::new();

        for token in text.split_whitespace() {
            if seen.insert(token) {
                out.push(token);
            }
            if let Some(synonyms) = self.dictionary.get(token) {
                for synonym in synonyms.iter().take(self.top_k) {
                    if seen.insert(synonym.as_str()) {
                        out.push(synonym.as_str());
                    }
                }
            }
        }

        out.join(" ")
    }
}
