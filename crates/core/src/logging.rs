//! Logging infrastructure for kolrag.
//!
//! This module initializes the tracing subscriber for structured logging.
//! Logs are emitted to stderr to keep stdout clean for data output, and can
//! additionally be appended to one log file per day.
//!
//! The subscriber is process-wide state with a single initialization point:
//! `init_logging` must be called once, from the binary's `main`. Library code
//! only uses the `tracing` macros and spans.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{Local, NaiveDate};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::{AppError, AppResult};

/// Initialize the tracing subscriber with stderr output.
///
/// This sets up structured logging with:
/// - Output to stderr (stdout is reserved for data)
/// - Environment-based filtering (RUST_LOG or provided level)
/// - Optional ANSI color control
/// - Optional daily log file under `log_dir` (`<YYYY-MM-DD>.log`, no ANSI)
///
/// Calling this a second time returns `AppError::Config`; the subscriber is
/// never re-created.
///
/// # Example
/// ```no_run
/// use kolrag_core::logging::init_logging;
///
/// init_logging(None, false, None).expect("Failed to initialize logging");
/// ```
pub fn init_logging(log_level: Option<&str>, no_color: bool, log_dir: Option<&Path>) -> AppResult<()> {
    let default_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    let filter_str = log_level.unwrap_or(&default_level);

    let env_filter = EnvFilter::try_new(filter_str)
        .map_err(|e| AppError::Config(format!("Invalid log filter: {}", e)))?;

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true)
        .with_ansi(!no_color && supports_color());

    let file_layer = match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir).map_err(|e| {
                AppError::Config(format!("Failed to create log directory {:?}: {}", dir, e))
            })?;
            let path = daily_log_path(dir, Local::now().date_naive());
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .map_err(|e| AppError::Config(format!("Failed to open log file {:?}: {}", path, e)))?;

            Some(
                fmt::layer()
                    .with_writer(Mutex::new(file))
                    .with_target(true)
                    .with_ansi(false),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| AppError::Config(format!("Failed to init logging: {}", e)))?;

    Ok(())
}

/// Path of the log file for a given day.
pub fn daily_log_path(log_dir: &Path, day: NaiveDate) -> PathBuf {
    log_dir.join(format!("{}.log", day.format("%Y-%m-%d")))
}

/// Check if the terminal supports color output.
fn supports_color() -> bool {
    std::env::var("NO_COLOR").is_err()
}
