//! Ranks command handler.

use clap::Args;
use kolrag_core::{config::AppConfig, AppResult};
use kolrag_pipeline::create_ranks;
use std::path::PathBuf;

/// Write `<query number> <0-based rank>` lines for a results file
#[derive(Args, Debug)]
pub struct RanksCommand {
    /// Results file written by `kolrag run`
    pub results: PathBuf,

    /// Ranks file to write
    pub ranks: PathBuf,
}

impl RanksCommand {
    pub fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing ranks command");

        let resolve = |p: &PathBuf| {
            if p.is_absolute() {
                p.clone()
            } else {
                config.workspace.join(p)
            }
        };
        let ranks = resolve(&self.ranks);
        let count = create_ranks(&resolve(&self.results), &ranks)?;

        println!("Wrote {} ranks to {}", count, ranks.display());
        Ok(())
    }
}
