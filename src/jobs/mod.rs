//! Batch analysis runs: phases, cancellation and the per-run report.

pub mod pipeline;


use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub use pipeline::{BatchPipeline, PipelineConfig};

/// Where a run currently is
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    /// No run yet
    #[default]
    Idle,
    /// Probing the server before touching any file
    HealthChecking,
    /// Processing files one by one
    Running,
    /// Every supported file was processed
    Completed,
    /// Stopped by the user
    Cancelled,
    /// Aborted before processing (bad address, server down)
    Failed,
}

/// Cooperative cancellation flag, polled at file boundaries
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// How a run ended
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunOutcome {
    Completed,
    Cancelled,
    Failed { error: String },
    /// Another run was active; nothing happened
    AlreadyRunning,
    /// No supported file in the candidate set
    NothingToProcess,
}

/// Summary of one run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub run_id: String,
    pub outcome: RunOutcome,
    /// Files handled (including skips and failures)
    pub processed: usize,
    /// Supported files in the run
    pub total: usize,
    pub renamed: usize,
    pub proposed: usize,
    pub failed: usize,
    /// Unsupported or already processed files rejected up front
    pub rejected: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunReport {
    pub(crate) fn start() -> Self {
        let now = Utc::now();
        Self {
            run_id: format!("run-{}", uuid::Uuid::new_v4()),
            outcome: RunOutcome::Completed,
            processed: 0,
            total: 0,
            renamed: 0,
            proposed: 0,
            failed: 0,
            rejected: 0,
            started_at: now,
            finished_at: now,
        }
    }

    pub(crate) fn finish(mut self, outcome: RunOutcome) -> Self {
        self.outcome = outcome;
        self.finished_at = Utc::now();
        self
    }

    /// Whether every processed file succeeded
    pub fn success(&self) -> bool {
        self.outcome == RunOutcome::Completed && self.failed == 0
    }
}
