//! BM25 over an in-RAM tantivy index.
//!
//! Content is indexed pre-tokenized with [`tokenize`] and split on
//! whitespace, so query and document terms always agree. Scoring is
//! tantivy's BM25 (k1 = 1.2, b = 0.75, idf `ln(1 + (N - n + 0.5) / (n + 0.5))`).

use super::{tokenize, Segment};
use crate::types::TextUnit;
use kolrag_core::{AppError, AppResult};
use std::sync::Arc;
use tantivy::collector::TopDocs;
use tantivy::query::{BooleanQuery, Occur, Query as TantivyQuery, TermQuery};
use tantivy::schema::{
    Field, IndexRecordOption, Schema, TextFieldIndexing, TextOptions, Value, STORED,
};
use tantivy::tokenizer::{TextAnalyzer, WhitespaceTokenizer};
use tantivy::{doc, Index, IndexReader, IndexWriter, TantivyDocument, Term};

const TOKENIZER: &str = "kolrag_tokens";
const WRITER_HEAP: usize = 50_000_000;

fn engine_error(e: impl std::fmt::Display) -> AppError {
    AppError::indexing("bm25", e.to_string())
}

#[derive(Clone)]
struct Engine {
    reader: IndexReader,
    ord: Field,
    content: Field,
}

/// BM25 index over the optimized content of a unit snapshot.
///
/// A unit matches when it shares a term with the query; matches are ranked
/// by descending score and ties keep corpus order.
#[derive(Clone, Default)]
pub struct Bm25Index {
    units: Vec<Arc<TextUnit>>,
    engine: Option<Engine>,
}

impl Bm25Index {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Replace the index with one built from `units`.
    pub fn build(&mut self, units: &[Arc<TextUnit>]) -> AppResult<()> {
        let mut schema_builder = Schema::builder();
        let ord = schema_builder.add_u64_field("ord", STORED);
        let indexing = TextFieldIndexing::default()
            .set_tokenizer(TOKENIZER)
            .set_index_option(IndexRecordOption::WithFreqs)
            .set_fieldnorms(true);
        let content = schema_builder.add_text_field(
            "content",
            TextOptions::default().set_indexing_options(indexing),
        );
        let schema = schema_builder.build();

        let index = Index::create_in_ram(schema);
        index.tokenizers().register(
            TOKENIZER,
            TextAnalyzer::builder(WhitespaceTokenizer::default()).build(),
        );

        // One thread keeps every unit in a single segment.
        let mut writer: IndexWriter = index
            .writer_with_num_threads(1, WRITER_HEAP)
            .map_err(engine_error)?;
        for (i, unit) in units.iter().enumerate() {
            writer
                .add_document(doc!(
                    ord => i as u64,
                    content => tokenize(&unit.optimized_content).join(" "),
                ))
                .map_err(engine_error)?;
        }
        writer.commit().map_err(engine_error)?;

        let reader = index.reader().map_err(engine_error)?;
        self.units = units.to_vec();
        self.engine = Some(Engine {
            reader,
            ord,
            content,
        });
        Ok(())
    }

    /// Matching units as `(corpus position, score)`, best first.
    fn ranked(&self, query: &str) -> AppResult<Vec<(usize, f32)>> {
        let Some(engine) = &self.engine else {
            return Ok(Vec::new());
        };
        let terms = tokenize(query);
        let searcher = engine.reader.searcher();
        let limit = searcher.num_docs() as usize;
        if terms.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }

        let clauses: Vec<(Occur, Box<dyn TantivyQuery>)> = terms
            .iter()
            .map(|term| {
                let term = Term::from_field_text(engine.content, term);
                let query: Box<dyn TantivyQuery> =
                    Box::new(TermQuery::new(term, IndexRecordOption::WithFreqs));
                (Occur::Should, query)
            })
            .collect();
        let query = BooleanQuery::new(clauses);

        let top_docs = searcher
            .search(&query, &TopDocs::with_limit(limit))
            .map_err(engine_error)?;

        let mut ranked = Vec::with_capacity(top_docs.len());
        for (score, address) in top_docs {
            if score <= 0.0 {
                continue;
            }
            let doc: TantivyDocument = searcher.doc(address).map_err(engine_error)?;
            let position = doc
                .get_first(engine.ord)
                .and_then(|v| v.as_u64())
                .ok_or_else(|| engine_error("indexed document has no position"))?;
            ranked.push((position as usize, score));
        }
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        Ok(ranked)
    }

    /// Up to `k` matching units, best first; ties keep corpus order.
    pub fn top_k(&self, query: &str, k: usize) -> AppResult<Segment> {
        Ok(self
            .ranked(query)?
            .into_iter()
            .take(k)
            .filter_map(|(i, _)| self.units.get(i).cloned())
            .collect())
    }
}

impl std::fmt::Debug for Bm25Index {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bm25Index")
            .field("units", &self.units.len())
            .field("built", &self.engine.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn units(texts: &[&str]) -> Vec<Arc<TextUnit>> {
        texts
            .iter()
            .enumerate()
            .map(|(i, t)| Arc::new(TextUnit::new(i.to_string(), "0", *t)))
            .collect()
    }

    fn index(texts: &[&str]) -> Bm25Index {
        let mut index = Bm25Index::new();
        index.build(&units(texts)).unwrap();
        index
    }

    fn doc_ids(segment: &Segment) -> Vec<&str> {
        segment.iter().map(|u| u.doc_id.as_str()).collect()
    }

    #[test]
    fn test_rarer_term_wins() {
        let index = index(&["This is a test document.", "This is another document."]);
        let top = index.top_k("test document", 2).unwrap();
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].id(), "0_0");
    }

    #[test]
    fn test_non_matching_units_are_dropped() {
        let index = index(&["דמי אבטלה", "קצבת זקנה", "מענק לידה"]);
        let top = index.top_k("אבטלה", 10).unwrap();
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].doc_id, "0");
        assert!(index.top_k("nothing", 10).unwrap().is_empty());
    }

    #[test]
    fn test_ties_keep_corpus_order() {
        let index = index(&["alpha beta", "gamma", "alpha beta", "alpha beta"]);
        let top = index.top_k("alpha", 10).unwrap();
        assert_eq!(doc_ids(&top), vec!["0", "2", "3"]);
    }

    #[test]
    fn test_k_limits_results() {
        let index = index(&["a x", "b x", "c x", "d x"]);
        assert_eq!(index.top_k("x", 2).unwrap().len(), 2);
    }

    #[test]
    fn test_shorter_document_scores_higher() {
        let index = index(&["pension pension age rules and more words here", "pension age"]);
        assert_eq!(doc_ids(&index.top_k("age", 2).unwrap()), vec!["1", "0"]);
    }

    #[test]
    fn test_punctuation_and_case_match_tokenizer() {
        let index = index(&["Pension, age (rules).", "e-mail address"]);
        assert_eq!(doc_ids(&index.top_k("AGE?", 5).unwrap()), vec!["0"]);
        assert_eq!(doc_ids(&index.top_k("e-mail", 5).unwrap()), vec!["1"]);
        assert!(index.top_k("mail", 5).unwrap().is_empty());
    }

    #[test]
    fn test_uses_optimized_content() {
        let mut unit = TextUnit::new("1", "0", "raw words");
        unit.optimized_content = "optimized".to_string();
        let mut index = Bm25Index::new();
        index.build(&[Arc::new(unit)]).unwrap();

        assert_eq!(index.top_k("optimized", 1).unwrap().len(), 1);
        assert!(index.top_k("raw", 1).unwrap().is_empty());
    }

    #[test]
    fn test_rebuild_replaces_units() {
        let mut index = index(&["alpha"]);
        index.build(&units(&["beta", "alpha"])).unwrap();
        assert_eq!(index.len(), 2);
        assert_eq!(doc_ids(&index.top_k("alpha", 5).unwrap()), vec!["1"]);
    }

    #[test]
    fn test_empty_index() {
        let index = index(&[]);
        assert!(index.is_empty());
        assert!(index.top_k("anything", 5).unwrap().is_empty());
        assert!(Bm25Index::new().top_k("anything", 5).unwrap().is_empty());
        assert!(index.top_k("   ", 5).unwrap().is_empty());
    }
}
