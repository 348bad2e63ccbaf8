//! Scenario tests over the assembled pipeline.


use crate::indexer::{IndexBackend, Segment};
use crate::types::TextUnit;
use kolrag_core::AppResult;
use std::sync::Arc;

pub(crate) fn unit(doc: &str, section: &str, content: &str) -> TextUnit {
    TextUnit::new(doc, section, content)
}

/// Returns at most `limit` units per query, in corpus order.
pub(crate) struct Truncating {
    pub limit: usize,
    pub units: Vec<Arc<TextUnit>>,
}

impl Truncating {
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            units: Vec::new(),
        }
    }
}

#[async_trait::async_trait]
impl IndexBackend for Truncating {
    fn name(&self) -> &str {
        "truncating"
    }

    async fn index_data(&mut self, units: &[Arc<TextUnit>]) -> AppResult<()> {
        self.units = units.to_vec();
        Ok(())
    }

    async fn retrieve(&self, queries: &[&str], k: usize) -> AppResult<Vec<Segment>> {
        Ok(queries
            .iter()
            .map(|_| self.units.iter().take(k.min(self.limit)).cloned().collect())
            .collect())
    }
}
