//! Batch Analysis Pipeline
//!
//! ## Flow
//!
//! ```text
//! Idle → HealthChecking → Running → Completed | Cancelled | Failed
//! ```
//!
//! Files are processed strictly one at a time, in discovery order:
//! convert if needed → read → describe (one retry on HTTP 500) → sanitize →
//! rename or store the proposal → wait `request_delay` → next file.
//! A failing file is recorded and the run moves on; only the health check
//! can abort a run.

use super::{CancelToken, RunOutcome, RunPhase, RunReport};
use crate::ai::prompts::{build_describe_prompt, DEFAULT_LANGUAGE, DESCRIBE_IMAGE_PROMPT};
use crate::ai::InferenceClient;
use crate::error::{Error, Result};
use crate::execution::rename_file;
use crate::naming::{is_candidate, is_marked, proposed_base_name};
use crate::services::convert::{FormatConverter, ImageConverter};
use crate::store::StoreHandle;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Pause between two files
pub const DEFAULT_REQUEST_DELAY: Duration = Duration::from_millis(300);

/// Pause before the single retry after an HTTP 500
pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_secs(2);

/// Tunables for one pipeline
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub base_prompt: String,
    /// Appended as "Respond in <language>."
    pub language: String,
    /// Overrides the client's default model
    pub model: Option<String>,
    /// Rename right away instead of only storing proposals
    pub auto_rename: bool,
    pub request_delay: Duration,
    pub retry_backoff: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            base_prompt: DESCRIBE_IMAGE_PROMPT.to_string(),
            language: DEFAULT_LANGUAGE.to_string(),
            model: None,
            auto_rename: true,
            request_delay: DEFAULT_REQUEST_DELAY,
            retry_backoff: DEFAULT_RETRY_BACKOFF,
        }
    }
}

/// What happened to one file
#[derive(Debug, Clone, PartialEq, Eq)]
enum FileResult {
    Skipped,
    Proposed,
    Renamed,
}

/// A per-file failure, keyed by the file's latest path
struct FileFailure {
    path: PathBuf,
    error: Error,
}

/// Clears the busy flag when a run or apply ends, even on panic
struct BusyGuard<'a>(&'a AtomicBool);

impl<'a> BusyGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

pub struct BatchPipeline {
    client: Arc<dyn InferenceClient>,
    converter: Arc<dyn FormatConverter>,
    store: StoreHandle,
    config: PipelineConfig,
    busy: AtomicBool,
}

impl BatchPipeline {
    pub fn new(
        client: Arc<dyn InferenceClient>,
        store: StoreHandle,
        config: PipelineConfig,
    ) -> Self {
        Self {
            client,
            converter: Arc::new(ImageConverter),
            store,
            config,
            busy: AtomicBool::new(false),
        }
    }

    /// Replace the format-conversion collaborator
    pub fn with_converter(mut self, converter: Arc<dyn FormatConverter>) -> Self {
        self.converter = converter;
        self
    }

    pub fn store(&self) -> &StoreHandle {
        &self.store
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn is_running(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    /// Run in the background; cancel through the token
    pub fn spawn(self: &Arc<Self>, cancel: CancelToken) -> JoinHandle<RunReport> {
        let pipeline = Arc::clone(self);
        tokio::spawn(async move { pipeline.run(&cancel).await })
    }

    /// Analyse every candidate in the store. A second concurrent call is a no-op.
    pub async fn run(&self, cancel: &CancelToken) -> RunReport {
        let mut report = RunReport::start();

        let Some(_busy) = BusyGuard::acquire(&self.busy) else {
            tracing::debug!("Run requested while another is active, ignoring");
            return report.finish(RunOutcome::AlreadyRunning);
        };

        let (supported, rejected): (Vec<PathBuf>, Vec<PathBuf>) = self
            .store
            .candidates()
            .into_iter()
            .partition(|p| is_candidate(p));

        // Nothing to analyse: record the rejections and leave everything else alone
        if supported.is_empty() {
            self.record_rejections(&rejected);
            report.rejected = rejected.len();
            tracing::info!(rejected = rejected.len(), "No supported images to analyse");
            return report.finish(RunOutcome::NothingToProcess);
        }

        self.store.reset_for_run(supported.len());
        self.store.set_cancelled(false);
        report.total = supported.len();

        self.record_rejections(&rejected);
        report.rejected = rejected.len();

        tracing::info!(
            run_id = %report.run_id,
            files = supported.len(),
            rejected = rejected.len(),
            auto_rename = self.config.auto_rename,
            "Starting batch analysis"
        );

        self.store.set_phase(RunPhase::HealthChecking);
        if let Err(e) = self.client.health_check().await {
            let message = format!("Inference server unavailable: {}", e);
            tracing::error!("{}", message);
            self.store.report_run_error(&message);
            self.store.set_phase(RunPhase::Failed);
            return report.finish(RunOutcome::Failed { error: message });
        }

        if cancel.is_cancelled() {
            return self.finish_cancelled(report);
        }

        self.store.set_phase(RunPhase::Running);

        let last = supported.len() - 1;
        for (index, path) in supported.iter().enumerate() {
            if cancel.is_cancelled() {
                return self.finish_cancelled(report);
            }

            match self.process_file(path, cancel).await {
                Ok(FileResult::Skipped) => {}
                Ok(FileResult::Proposed) => report.proposed += 1,
                Ok(FileResult::Renamed) => report.renamed += 1,
                Err(FileFailure {
                    error: Error::Cancelled,
                    ..
                }) => return self.finish_cancelled(report),
                Err(FileFailure { path, error }) => {
                    tracing::warn!(file = %path.display(), "Analysis failed: {}", error);
                    self.store.record_error(&path, &error.to_string());
                    report.failed += 1;
                }
            }

            self.store.increment_processed();
            report.processed += 1;

            if index < last && !self.config.request_delay.is_zero() {
                tokio::time::sleep(self.config.request_delay).await;
            }
        }

        self.store.set_phase(RunPhase::Completed);
        tracing::info!(
            run_id = %report.run_id,
            processed = report.processed,
            renamed = report.renamed,
            proposed = report.proposed,
            failed = report.failed,
            "Batch analysis complete"
        );
        report.finish(RunOutcome::Completed)
    }

    fn record_rejections(&self, rejected: &[PathBuf]) {
        for path in rejected {
            let error = Error::UnsupportedOrAlreadyProcessed(path.clone());
            self.store.record_error(path, &error.to_string());
        }
    }

    fn finish_cancelled(&self, report: RunReport) -> RunReport {
        tracing::info!(
            run_id = %report.run_id,
            processed = report.processed,
            total = report.total,
            "Batch analysis cancelled"
        );
        self.store.set_cancelled(true);
        self.store.set_phase(RunPhase::Cancelled);
        report.finish(RunOutcome::Cancelled)
    }

    async fn process_file(
        &self,
        original: &Path,
        cancel: &CancelToken,
    ) -> std::result::Result<FileResult, FileFailure> {
        // Marked files are already rejected up front; this only guards direct callers
        if is_marked(original) {
            tracing::debug!(file = %original.display(), "Already renamed, skipping");
            return Ok(FileResult::Skipped);
        }

        let path = self.convert(original).await.map_err(|error| FileFailure {
            path: original.to_path_buf(),
            error,
        })?;
        let fail = |error: Error| FileFailure {
            path: path.clone(),
            error,
        };

        let bytes = tokio::fs::read(&path).await.map_err(|e| fail(e.into()))?;
        let prompt = build_describe_prompt(&self.config.base_prompt, &self.config.language);

        let response = self.describe_with_retry(&bytes, &prompt).await.map_err(fail)?;

        // A request in flight is not interrupted, but its result is dropped
        if cancel.is_cancelled() {
            return Err(fail(Error::Cancelled));
        }

        let base = proposed_base_name(&response);
        tracing::debug!(file = %path.display(), base = %base, "Proposed name");

        if self.config.auto_rename {
            let outcome = rename_file(path.clone(), base.clone())
                .await
                .map_err(fail)?;
            self.store.apply_rename_result(&path, &outcome.new_path, &base);
            Ok(FileResult::Renamed)
        } else {
            self.store.set_proposal(&path, &base);
            Ok(FileResult::Proposed)
        }
    }

    /// Hand the file to the converter; repoint the store if it moved
    async fn convert(&self, path: &Path) -> Result<PathBuf> {
        let converter = Arc::clone(&self.converter);
        let source = path.to_path_buf();
        let converted = tokio::task::spawn_blocking(move || converter.convert(&source))
            .await
            .map_err(|e| Error::Conversion(format!("Task failed: {}", e)))??;

        if converted != path {
            self.store.replace_reference(path, &converted);
        }
        Ok(converted)
    }

    /// One describe call, retried once after a plain HTTP 500
    async fn describe_with_retry(&self, bytes: &[u8], prompt: &str) -> Result<String> {
        let model = self.config.model.as_deref();

        match self.client.describe_image(bytes, prompt, model).await {
            Err(e) if e.is_server_error_500() => {
                tracing::warn!(
                    backoff_ms = self.config.retry_backoff.as_millis() as u64,
                    "Server returned 500, retrying once"
                );
                tokio::time::sleep(self.config.retry_backoff).await;
                self.client.describe_image(bytes, prompt, model).await
            }
            other => other,
        }
    }

    /// Rename one file from its stored proposal.
    ///
    /// Returns `Ok(None)` when the file has no proposal or is already renamed.
    pub async fn apply_proposal(&self, path: &Path) -> Result<Option<PathBuf>> {
        let _busy = BusyGuard::acquire(&self.busy).ok_or(Error::Busy)?;
        self.apply_one(path).await
    }

    /// Rename every file in the current window that has a proposal
    pub async fn apply_visible_proposals(&self) -> Result<Vec<(PathBuf, Result<PathBuf>)>> {
        let _busy = BusyGuard::acquire(&self.busy).ok_or(Error::Busy)?;

        let pending: Vec<PathBuf> = self.store.inspect(|s| {
            s.visible()
                .iter()
                .filter(|p| s.visible_proposals().contains_key(*p))
                .cloned()
                .collect()
        });

        let mut results = Vec::with_capacity(pending.len());
        for path in pending {
            match self.apply_one(&path).await {
                Ok(Some(new_path)) => results.push((path, Ok(new_path))),
                Ok(None) => {}
                Err(e) => results.push((path, Err(e))),
            }
        }
        Ok(results)
    }

    async fn apply_one(&self, path: &Path) -> Result<Option<PathBuf>> {
        if is_marked(path) {
            return Ok(None);
        }
        let Some(base) = self.store.proposal(path) else {
            return Ok(None);
        };

        match rename_file(path.to_path_buf(), base.clone()).await {
            Ok(outcome) => {
                self.store.apply_rename_result(path, &outcome.new_path, &base);
                Ok(Some(outcome.new_path))
            }
            Err(e) => {
                tracing::warn!(file = %path.display(), "Rename failed: {}", e);
                self.store.record_error(path, &e.to_string());
                Err(e)
            }
        }
    }
}
