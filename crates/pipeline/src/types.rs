//! Core data model: queries and the text units they are answered from.

use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// A section of a corpus document, the unit of indexing and retrieval.
///
/// Identity is the `(doc_id, section_id)` pair. Two units with the same pair
/// are equal regardless of their content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextUnit {
    /// Source document identifier
    pub doc_id: String,

    /// Section identifier within the document
    pub section_id: String,

    /// Raw section text
    pub content: String,

    /// Text fed to the indexers, filled in by the optimizer chain
    #[serde(default)]
    pub optimized_content: String,
}

impl TextUnit {
    /// Create a unit whose optimized content starts out as the raw content.
    pub fn new(
        doc_id: impl Into<String>,
        section_id: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        let content = content.into();
        Self {
            doc_id: doc_id.into(),
            section_id: section_id.into(),
            optimized_content: content.clone(),
            content,
        }
    }

    /// Display identity, `<doc_id>_<section_id>`.
    pub fn id(&self) -> String {
        format!("{}_{}", self.doc_id, self.section_id)
    }

    /// Identity key used for deduplication.
    pub fn key(&self) -> (&str, &str) {
        (&self.doc_id, &self.section_id)
    }
}

impl PartialEq for TextUnit {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for TextUnit {}

impl Hash for TextUnit {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

/// A question travelling through the pipeline.
///
/// Fields are filled left to right: the optimizer chain sets
/// `indexing_optimized_query`, fusion sets `answer_sources`, synthesis sets
/// `final_answer` and evaluation sets `rank`.
#[derive(Debug, Clone)]
pub struct Query {
    /// Sequence number, 1-based in input order
    pub number: usize,

    /// Raw question text
    pub query: String,

    /// Expected source document, evaluation runs only
    pub gold_doc_id: Option<String>,

    /// Search key handed to the indexers
    pub indexing_optimized_query: String,

    /// Fused retrieval result, best first
    pub answer_sources: Vec<Arc<TextUnit>>,

    /// Synthesized answer
    pub final_answer: Option<String>,

    /// 1-based position of the gold document, if found within the cutoff
    pub rank: Option<usize>,
}

impl Query {
    pub fn new(number: usize, query: impl Into<String>, gold_doc_id: Option<String>) -> Self {
        let query = query.into();
        Self {
            number,
            indexing_optimized_query: query.clone(),
            query,
            gold_doc_id,
            answer_sources: Vec::new(),
            final_answer: None,
            rank: None,
        }
    }

    /// Build a numbered batch from `(text, gold id)` pairs.
    pub fn numbered<I, S>(inputs: I) -> Vec<Query>
    where
        I: IntoIterator<Item = (S, Option<String>)>,
        S: Into<String>,
    {
        inputs
            .into_iter()
            .enumerate()
            .map(|(i, (text, gold))| Query::new(i + 1, text, gold))
            .collect()
    }

    /// Whether the gold document is anywhere in the fused result.
    pub fn gold_retrieved(&self) -> bool {
        match &self.gold_doc_id {
            Some(gold) => self.answer_sources.iter().any(|u| &u.doc_id == gold),
            None => false,
        }
    }
}
