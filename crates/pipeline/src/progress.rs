//! Progress reporting for pipeline runs.
//!
//! Optimizing and embedding a full corpus takes minutes; the orchestrator
//! emits one event per chunk so front ends can show where a run is.

use std::sync::Arc;
use std::time::Instant;

/// Progress event emitted during a run.
#[derive(Debug, Clone)]
pub struct ProgressEvent {
    /// Stage: "load", "optimize", "index", "retrieve", "synthesize"
    pub phase: String,

    /// Items done so far
    pub current: u64,

    /// Items expected, if known
    pub total: Option<u64>,

    /// Percentage complete (0.0 - 100.0)
    pub percentage: Option<f64>,

    pub message: String,

    /// Seconds since the reporter was created
    pub elapsed_secs: Option<f64>,
}

impl ProgressEvent {
    pub fn new(
        phase: impl Into<String>,
        current: u64,
        total: Option<u64>,
        message: impl Into<String>,
    ) -> Self {
        let percentage = total.map(|t| {
            if t > 0 {
                (current as f64 / t as f64) * 100.0
            } else {
                100.0
            }
        });

        Self {
            phase: phase.into(),
            current,
            total,
            percentage,
            message: message.into(),
            elapsed_secs: None,
        }
    }

    pub fn with_elapsed(mut self, elapsed_secs: f64) -> Self {
        self.elapsed_secs = Some(elapsed_secs);
        self
    }

    /// `[phase] current/total (pct%) - message`
    pub fn format_simple(&self) -> String {
        let progress = match self.total {
            Some(total) => format!("{}/{}", self.current, total),
            None => self.current.to_string(),
        };
        let pct = self
            .percentage
            .map(|p| format!(" ({:.0}%)", p))
            .unwrap_or_default();

        format!("[{}] {}{} - {}", self.phase, progress, pct, self.message)
    }
}

/// Callback for progress events.
pub type ProgressCallback = Arc<dyn Fn(ProgressEvent) + Send + Sync>;

/// Forwards progress events to an optional callback.
#[derive(Clone)]
pub struct ProgressReporter {
    callback: Option<ProgressCallback>,
    start_time: Instant,
}

impl ProgressReporter {
    pub fn new(callback: ProgressCallback) -> Self {
        Self {
            callback: Some(callback),
            start_time: Instant::now(),
        }
    }

    /// Reporter that drops every event.
    pub fn noop() -> Self {
        Self {
            callback: None,
            start_time: Instant::now(),
        }
    }

    pub fn emit(&self, event: ProgressEvent) {
        let Some(callback) = &self.callback else {
            return;
        };
        let elapsed = self.start_time.elapsed().as_secs_f64();
        let event = event.with_elapsed(elapsed);

        tracing::debug!(
            phase = %event.phase,
            current = event.current,
            total = ?event.total,
            message = %event.message,
            elapsed_secs = elapsed,
            "Progress event"
        );
        callback(event);
    }

    pub fn load(&self, units: u64, corpus: &str) {
        self.emit(ProgressEvent::new(
            "load",
            units,
            Some(units),
            format!("{} units from {}", units, corpus),
        ));
    }

    /// One optimizer chunk done.
    pub fn optimize(&self, current: u64, total: u64, kind: &str) {
        self.emit(ProgressEvent::new("optimize", current, Some(total), kind));
    }

    /// One indexer built.
    pub fn index(&self, current: u64, total: u64, indexer: &str) {
        self.emit(ProgressEvent::new(
            "index",
            current,
            Some(total),
            format!("built {}", indexer),
        ));
    }

    /// Queries with fused sources.
    pub fn retrieve(&self, current: u64, total: u64, indexers: &str) {
        self.emit(ProgressEvent::new(
            "retrieve",
            current,
            Some(total),
            format!("fused {}", indexers),
        ));
    }

    pub fn synthesize(&self, current: u64, total: u64, synthesizer: &str) {
        self.emit(ProgressEvent::new(
            "synthesize",
            current,
            Some(total),
            synthesizer,
        ));
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::noop()
    }
}

impl std::fmt::Debug for ProgressReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressReporter")
            .field("enabled", &self.callback.is_some())
            .finish()
    }
}
