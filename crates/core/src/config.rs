//! Configuration management for kolrag.
//!
//! This module handles loading and merging configuration from multiple sources:
//! - Defaults
//! - Config file (.kolrag/config.yaml)
//! - Environment variables
//! - Command-line flags
//!
//! The configuration is workspace-centric, with all state stored in `.kolrag/`.
//! Pipeline composition (optimizers, indexers, synthesizer) lives in a
//! separate pipeline file that this config only points to.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult};

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the workspace root (contains .kolrag/)
    pub workspace: PathBuf,

    /// Optional config file path
    pub config_file: Option<PathBuf>,

    /// Pipeline definition file (optimizers, indexers, synthesizer)
    pub pipeline_file: Option<PathBuf>,

    /// Log level override
    pub log_level: Option<String>,

    /// Directory for daily log files; stderr only when unset
    pub log_dir: Option<PathBuf>,

    /// Verbose mode (enables debug logging)
    pub verbose: bool,

    /// Disable colored output
    pub no_color: bool,
}

/// Full configuration file structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ConfigFile {
    workspace: Option<WorkspaceConfig>,
    logging: Option<LoggingConfig>,
    pipeline: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WorkspaceConfig {
    path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LoggingConfig {
    level: Option<String>,
    color: Option<bool>,
    dir: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            workspace: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            config_file: None,
            pipeline_file: None,
            log_level: None,
            log_dir: None,
            verbose: false,
            no_color: false,
        }
    }
}

impl AppConfig {
    /// Load configuration from defaults, the config file and environment
    /// variables.
    ///
    /// `workspace` and `config_file` come from the command line and take the
    /// place of their environment variables. The config file is the one
    /// named, else `.kolrag/config.yaml` in the workspace; a named config
    /// file that does not exist is an error.
    ///
    /// Environment variables:
    /// - `KOLRAG_WORKSPACE`: Override workspace path
    /// - `KOLRAG_CONFIG`: Path to config file
    /// - `KOLRAG_PIPELINE`: Path to pipeline file
    /// - `RUST_LOG`: Log level
    /// - `NO_COLOR`: Disable colored output
    pub fn load_from(workspace: Option<PathBuf>, config_file: Option<PathBuf>) -> AppResult<Self> {
        let mut config = Self::default();

        if let Some(workspace) =
            workspace.or_else(|| std::env::var("KOLRAG_WORKSPACE").ok().map(PathBuf::from))
        {
            config.workspace = workspace;
        }

        config.config_file =
            config_file.or_else(|| std::env::var("KOLRAG_CONFIG").ok().map(PathBuf::from));

        if !config.workspace.exists() {
            return Err(AppError::Config(format!(
                "Workspace directory does not exist: {:?}",
                config.workspace
            )));
        }

        let config_path = match config.config_file {
            Some(ref cf) if !cf.exists() => {
                return Err(AppError::Config(format!(
                    "Config file does not exist: {:?}",
                    cf
                )));
            }
            Some(ref cf) => cf.clone(),
            None => config.kolrag_dir().join("config.yaml"),
        };

        if config_path.exists() {
            config = config.merge_yaml(&config_path)?;
        }

        // Environment variables override YAML config
        if let Ok(pipeline) = std::env::var("KOLRAG_PIPELINE") {
            config.pipeline_file = Some(PathBuf::from(pipeline));
        }

        if let Ok(level) = std::env::var("RUST_LOG") {
            config.log_level = Some(level);
        }

        if std::env::var("NO_COLOR").is_ok() {
            config.no_color = true;
        }

        Ok(config)
    }

    /// Merge YAML configuration file into this config.
    fn merge_yaml(&self, path: &Path) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        let config_file: ConfigFile = serde_yaml::from_str(&contents).map_err(|e| {
            AppError::Config(format!("Failed to parse config file {:?}: {}", path, e))
        })?;

        let mut result = self.clone();

        if let Some(path) = config_file.workspace.and_then(|ws| ws.path) {
            result.workspace = PathBuf::from(path);
        }

        if let Some(logging) = config_file.logging {
            if let Some(level) = logging.level {
                result.log_level = Some(level);
            }
            if let Some(color) = logging.color {
                result.no_color = !color;
            }
            if let Some(dir) = logging.dir {
                result.log_dir = Some(PathBuf::from(dir));
            }
        }

        if let Some(pipeline) = config_file.pipeline {
            result.pipeline_file = Some(PathBuf::from(pipeline));
        }

        Ok(result)
    }

    /// Apply CLI overrides to the configuration.
    ///
    /// CLI flags take precedence over environment variables and the config file.
    pub fn with_overrides(
        mut self,
        workspace: Option<PathBuf>,
        config_file: Option<PathBuf>,
        log_level: Option<String>,
        verbose: bool,
        no_color: bool,
    ) -> Self {
        if let Some(workspace) = workspace {
            self.workspace = workspace;
        }

        if let Some(config_file) = config_file {
            self.config_file = Some(config_file);
        }

        if let Some(log_level) = log_level {
            self.log_level = Some(log_level);
        }

        if verbose {
            self.verbose = true;
            // Verbose mode implies debug logging
            if self.log_level.is_none() {
                self.log_level = Some("debug".to_string());
            }
        }

        if no_color {
            self.no_color = true;
        }

        self
    }

    /// Get the path to the .kolrag directory.
    pub fn kolrag_dir(&self) -> PathBuf {
        self.workspace.join(".kolrag")
    }

    /// Ensure the .kolrag directory exists.
    pub fn ensure_kolrag_dir(&self) -> AppResult<()> {
        let dir = self.kolrag_dir();
        if !dir.exists() {
            std::fs::create_dir_all(&dir).map_err(|e| {
                AppError::Config(format!("Failed to create .kolrag directory: {}", e))
            })?;
        }
        Ok(())
    }

    /// Resolve the pipeline file, relative paths being taken from the workspace.
    pub fn resolve_pipeline_file(&self) -> PathBuf {
        match &self.pipeline_file {
            Some(path) if path.is_absolute() => path.clone(),
            Some(path) => self.workspace.join(path),
            None => self.kolrag_dir().join("pipeline.yaml"),
        }
    }

    /// Default directory for cached corpus snapshots and optimizer outputs.
    pub fn cache_dir(&self) -> PathBuf {
        self.kolrag_dir().join("cache")
    }
}
