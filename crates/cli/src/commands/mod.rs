//! Command handlers for the kolrag CLI.
//!
//! This module organizes all CLI commands into separate submodules.

pub mod ask;
pub mod ranks;
pub mod run;

// Re-export command types for convenience
pub use ask::AskCommand;
pub use ranks::RanksCommand;
pub use run::RunCommand;

use kolrag_core::{config::AppConfig, AppResult};
use kolrag_pipeline::{PipelineConfig, ProgressReporter};
use std::path::Path;
use std::sync::Arc;

/// Load the pipeline file, resolving relative paths against the workspace.
///
/// A pipeline file named on the command line must exist; the configured
/// default falls back to the built-in pipeline. The workspace cache directory is used unless the file names one or
/// `no_cache` is set.
pub(crate) fn load_pipeline(
    config: &AppConfig,
    pipeline: Option<&Path>,
    no_cache: bool,
) -> AppResult<PipelineConfig> {
    let loaded = match pipeline {
        Some(path) => PipelineConfig::load(path)?,
        None => PipelineConfig::load_or_default(&config.resolve_pipeline_file())?,
    };

    let mut pipeline = loaded.resolve_paths(&config.workspace);
    if no_cache {
        pipeline.cache_dir = None;
    } else if pipeline.cache_dir.is_none() {
        pipeline.cache_dir = Some(config.cache_dir());
    }
    pipeline.validate()?;

    tracing::debug!("Pipeline: {:?}", pipeline);
    Ok(pipeline)
}

/// Progress lines on stderr.
pub(crate) fn stderr_progress() -> ProgressReporter {
    ProgressReporter::new(Arc::new(|event| eprintln!("{}", event.format_simple())))
}
