//! Query input files.
//!
//! Accepted formats, chosen by extension:
//! - `.json`: an array of `{ "query": ..., "gold_doc_id": ... }` objects
//! - `.jsonl`: one such object per line
//! - anything else: one question per non-empty line, no gold ids

use crate::types::Query;
use kolrag_core::{AppError, AppResult};
use serde::{Deserialize, Deserializer};
use std::fs;
use std::path::Path;

/// One record of a JSON or JSONL query file.
#[derive(Debug, Clone, Deserialize)]
pub struct QueryInput {
    pub query: String,

    /// Numeric ids are accepted and read as strings.
    #[serde(default, deserialize_with = "string_or_number")]
    pub gold_doc_id: Option<String>,
}

fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(serde_json::Value::Null) => None,
        Some(serde_json::Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    })
}

/// Load and number the queries in `path`.
pub fn load_queries(path: &Path) -> AppResult<Vec<Query>> {
    let content = fs::read_to_string(path).map_err(|e| {
        AppError::Config(format!("Failed to read queries from {:?}: {}", path, e))
    })?;

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    let inputs: Vec<QueryInput> = match extension.as_str() {
        "json" => serde_json::from_str(&content)?,
        "jsonl" => content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(serde_json::from_str::<QueryInput>)
            .collect::<Result<_, _>>()?,
        _ => content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(|line| QueryInput {
                query: line.to_string(),
                gold_doc_id: None,
            })
            .collect(),
    };

    tracing::info!("Loaded {} queries from {:?}", inputs.len(), path);

    Ok(Query::numbered(
        inputs.into_iter().map(|input| (input.query, input.gold_doc_id)),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_json_queries() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("queries.json");
        fs::write(
            &path,
            r#"[{"query": "מאיזה גיל אפשר לפרוש לפנסיה?", "gold_doc_id": 1042},
                {"query": "second", "gold_doc_id": "77"},
                {"query": "third"}]"#,
        )
        .unwrap();

        let queries = load_queries(&path).unwrap();
        assert_eq!(queries.len(), 3);
        assert_eq!(queries[0].gold_doc_id.as_deref(), Some("1042"));
        assert_eq!(queries[1].gold_doc_id.as_deref(), Some("77"));
        assert_eq!(queries[2].gold_doc_id, None);
        assert_eq!(queries[2].number, 3);
    }

    #[test]
    fn test_load_jsonl_queries() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("queries.jsonl");
        fs::write(
            &path,
            "{\"query\": \"a\", \"gold_doc_id\": \"1\"}\n\n{\"query\": \"b\"}\n",
        )
        .unwrap();

        let queries = load_queries(&path).unwrap();
        assert_eq!(queries.len(), 2);
        assert_eq!(queries[1].query, "b");
    }

    #[test]
    fn test_load_plain_text_queries() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("queries.txt");
        fs::write(&path, "first question\n\n  second question  \n").unwrap();

        let queries = load_queries(&path).unwrap();
        assert_eq!(queries.len(), 2);
        assert_eq!(queries[1].query, "second question");
        assert_eq!(queries[1].number, 2);
    }

    #[test]
    fn test_missing_file() {
        let result = load_queries(Path::new("/nonexistent/queries.json"));
        assert!(matches!(result, Err(AppError::Config(_))));
    }
}
