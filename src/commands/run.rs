//! `run` command: discover, analyse, then walk the batch windows.

use super::server::resolve_server;
use super::RunArgs;
use crate::access::{AccessGuard, FolderAccess, Unrestricted};
use crate::ai::OllamaClient;
use crate::jobs::{BatchPipeline, CancelToken, PipelineConfig, RunOutcome, RunReport};
use crate::services::discover;
use crate::settings::{Settings, SettingsStore};
use crate::store::{CandidateStore, StoreEvent, StoreHandle};
use anyhow::{bail, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Fold command-line flags into the loaded settings
fn merge_flags(mut settings: Settings, args: &RunArgs) -> Settings {
    if let Some(server) = &args.server.server {
        settings.server_address = server.clone();
    }
    if let Some(model) = &args.model {
        settings.model = model.clone();
    }
    if let Some(language) = &args.language {
        settings.language = language.clone();
    }
    if let Some(batch_size) = args.batch_size {
        settings.batch_size = batch_size;
    }
    if args.dry_run {
        settings.auto_rename = false;
    }
    settings
}

fn pipeline_config(settings: &Settings, args: &RunArgs) -> PipelineConfig {
    let mut config = PipelineConfig {
        language: settings.language.clone(),
        auto_rename: settings.auto_rename,
        ..PipelineConfig::default()
    };
    if let Some(prompt) = &args.prompt {
        config.base_prompt = prompt.clone();
    }
    config
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

fn print_event(event: &StoreEvent) {
    match event {
        StoreEvent::Renamed { from, to, .. } => {
            println!("  ✔ {} → {}", file_name(from), file_name(to));
        }
        StoreEvent::Proposal { path, base } => {
            println!("  • {} → {}", file_name(path), base);
        }
        StoreEvent::FileFailed { path, reason } => {
            println!("  ✘ {}: {}", file_name(path), reason);
        }
        StoreEvent::PathReplaced { from, to } => {
            println!("  ↻ {} converted to {}", file_name(from), file_name(to));
        }
        StoreEvent::RunError { message } => {
            eprintln!("Error: {}", message);
        }
        StoreEvent::Progress { processed, total } if *processed > 0 => {
            tracing::debug!(processed, total, "Progress");
        }
        _ => {}
    }
}

fn print_window(store: &CandidateStore) {
    let (start, end) = store.window_bounds();
    println!(
        "\nBatch {} (files {}-{} of {})",
        store.window_index() + 1,
        start + 1,
        end,
        store.candidates().len()
    );
    for path in store.visible() {
        let status = if let Some(base) = store.visible_proposals().get(path) {
            format!("proposed: {}", base)
        } else if let Some(reason) = store.visible_errors().get(path) {
            format!("failed: {}", reason)
        } else {
            "unchanged".to_string()
        };
        println!("  {:<40} {}", file_name(path), status);
    }
}

fn print_report(report: &RunReport) {
    let status = match &report.outcome {
        RunOutcome::Completed => "completed".to_string(),
        RunOutcome::Cancelled => "cancelled".to_string(),
        RunOutcome::Failed { error } => format!("failed ({})", error),
        RunOutcome::AlreadyRunning => "already running".to_string(),
        RunOutcome::NothingToProcess => "nothing to process".to_string(),
    };
    let seconds = (report.finished_at - report.started_at).num_milliseconds() as f64 / 1000.0;

    println!("\nRun {}: {} in {:.1}s", report.run_id, status, seconds);
    println!(
        "  {}/{} processed, {} renamed, {} proposed, {} failed, {} rejected",
        report.processed,
        report.total,
        report.renamed,
        report.proposed,
        report.failed,
        report.rejected
    );
}

/// Candidates from the given paths, or from the authorized folder when none
/// are given. The guard keeps folder access open for the rest of the run.
fn resolve_candidates(
    settings: &Settings,
    paths: &[PathBuf],
    access: &dyn FolderAccess,
) -> Result<(Vec<PathBuf>, Option<AccessGuard>)> {
    if !paths.is_empty() {
        return Ok((discover(paths), None));
    }

    let Some(token) = settings.folder_bookmark.as_deref() else {
        bail!("No paths given and no authorized folder (see `config authorize`)");
    };
    let guard = access.begin_access(token)?;
    let found = discover(&[guard.path()]);
    Ok((found, Some(guard)))
}

/// Print every window in turn. With `apply`, each window's proposals are
/// renamed once shown. Returns the number of files renamed.
async fn walk_windows(pipeline: &BatchPipeline, apply: bool) -> Result<usize> {
    let handle = pipeline.store();
    let mut renamed = 0;

    loop {
        print_window(&handle.snapshot());
        if apply {
            let results = pipeline.apply_visible_proposals().await?;
            renamed += results.iter().filter(|(_, r)| r.is_ok()).count();
        }
        if !handle.advance_to_next_batch() {
            break;
        }
    }
    Ok(renamed)
}

pub async fn execute(store: &SettingsStore, settings: Settings, args: RunArgs) -> Result<()> {
    let settings = merge_flags(settings, &args);
    let server = resolve_server(&settings, &args.server)?;

    let (candidates, _access) = resolve_candidates(&settings, &args.paths, &Unrestricted)?;
    if candidates.is_empty() {
        println!("No images found");
        return Ok(());
    }

    let handle = StoreHandle::with_batch_size(settings.batch_size);
    handle.set_candidates(candidates);
    handle.subscribe(print_event);

    let client = Arc::new(OllamaClient::new(server.clone(), settings.model.clone()));
    let pipeline = Arc::new(BatchPipeline::new(
        client,
        handle.clone(),
        pipeline_config(&settings, &args),
    ));

    let cancel = CancelToken::new();
    let on_signal = cancel.clone();
    let signal_task = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nCancelling after the current file...");
            on_signal.cancel();
        }
    });

    println!(
        "Analysing {} file(s) with {} on {}",
        handle.candidates().len(),
        settings.model,
        server
    );
    let report = pipeline.spawn(cancel).await?;
    signal_task.abort();

    let applied = walk_windows(&pipeline, args.apply).await?;
    print_report(&report);
    if args.apply {
        println!("  {} proposal(s) applied", applied);
    }

    if args.save {
        let mut stored = store.load()?;
        stored.server_address = settings.server_address.clone();
        stored.model = settings.model.clone();
        stored.language = settings.language.clone();
        store.save(&stored)?;
        tracing::info!(path = %store.path().display(), "Saved settings");
    }

    if let RunOutcome::Failed { error } = report.outcome {
        bail!(error);
    }
    Ok(())
}
