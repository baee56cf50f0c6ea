//! Shared, observable access to the [`CandidateStore`].
//!
//! The pipeline task is the only writer. Observers take snapshots and
//! subscribe to [`StoreEvent`]s; listeners run after the write lock is
//! released so they may read the store themselves.

use super::candidates::CandidateStore;
use crate::jobs::RunPhase;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Change notifications published to observers
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum StoreEvent {
    CandidatesChanged { total: usize },
    #[serde(rename_all = "camelCase")]
    WindowChanged { index: usize, start: usize, end: usize },
    PhaseChanged { phase: RunPhase },
    Progress { processed: usize, total: usize },
    Proposal { path: PathBuf, base: String },
    Renamed { from: PathBuf, to: PathBuf, base: String },
    PathReplaced { from: PathBuf, to: PathBuf },
    FileFailed { path: PathBuf, reason: String },
    RunError { message: String },
}

pub type StoreListener = Arc<dyn Fn(&StoreEvent) + Send + Sync>;

/// Cloneable handle shared by the pipeline and its observers
#[derive(Clone)]
pub struct StoreHandle {
    inner: Arc<RwLock<CandidateStore>>,
    listeners: Arc<RwLock<Vec<StoreListener>>>,
}

impl Default for StoreHandle {
    fn default() -> Self {
        Self::new(CandidateStore::default())
    }
}

impl StoreHandle {
    pub fn new(store: CandidateStore) -> Self {
        Self {
            inner: Arc::new(RwLock::new(store)),
            listeners: Arc::new(RwLock::new(Vec::new())),
        }
    }

    pub fn with_batch_size(batch_size: usize) -> Self {
        Self::new(CandidateStore::new(batch_size))
    }

    fn read(&self) -> RwLockReadGuard<'_, CandidateStore> {
        self.inner.read().unwrap_or_else(|poisoned| {
            tracing::warn!("Candidate store lock was poisoned, recovering...");
            poisoned.into_inner()
        })
    }

    fn write(&self) -> RwLockWriteGuard<'_, CandidateStore> {
        self.inner.write().unwrap_or_else(|poisoned| {
            tracing::warn!("Candidate store lock was poisoned, recovering...");
            poisoned.into_inner()
        })
    }

    /// Read-only copy of the current state
    pub fn snapshot(&self) -> CandidateStore {
        self.read().clone()
    }

    /// Run a closure against the current state without cloning it
    pub fn inspect<R>(&self, f: impl FnOnce(&CandidateStore) -> R) -> R {
        f(&self.read())
    }

    /// Register an observer
    pub fn subscribe(&self, listener: impl Fn(&StoreEvent) + Send + Sync + 'static) {
        let mut listeners = self.listeners.write().unwrap_or_else(|p| p.into_inner());
        listeners.push(Arc::new(listener));
    }

    fn emit(&self, events: Vec<StoreEvent>) {
        let listeners: Vec<StoreListener> = self
            .listeners
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .clone();
        for event in &events {
            for listener in &listeners {
                listener(event);
            }
        }
    }

    fn window_event(store: &CandidateStore) -> StoreEvent {
        let (start, end) = store.window_bounds();
        StoreEvent::WindowChanged {
            index: store.window_index(),
            start,
            end,
        }
    }

    // --- Mutations, each followed by its notifications ---

    pub fn set_candidates(&self, candidates: Vec<PathBuf>) {
        let events = {
            let mut store = self.write();
            store.set_candidates(candidates);
            vec![
                StoreEvent::CandidatesChanged {
                    total: store.candidates().len(),
                },
                Self::window_event(&store),
            ]
        };
        self.emit(events);
    }

    pub fn advance_to_next_batch(&self) -> bool {
        let (advanced, events) = {
            let mut store = self.write();
            let advanced = store.advance_to_next_batch();
            let events = if advanced {
                vec![Self::window_event(&store)]
            } else {
                Vec::new()
            };
            (advanced, events)
        };
        self.emit(events);
        advanced
    }

    pub fn set_proposal(&self, path: &Path, base: &str) {
        self.write().set_proposal(path, base);
        self.emit(vec![StoreEvent::Proposal {
            path: path.to_path_buf(),
            base: base.to_string(),
        }]);
    }

    pub fn apply_rename_result(&self, old: &Path, new: &Path, base: &str) {
        self.write().apply_rename_result(old, new, base);
        self.emit(vec![StoreEvent::Renamed {
            from: old.to_path_buf(),
            to: new.to_path_buf(),
            base: base.to_string(),
        }]);
    }

    pub fn replace_reference(&self, old: &Path, new: &Path) {
        self.write().replace_reference(old, new);
        self.emit(vec![StoreEvent::PathReplaced {
            from: old.to_path_buf(),
            to: new.to_path_buf(),
        }]);
    }

    pub fn record_error(&self, path: &Path, reason: &str) {
        self.write().record_error(path, reason);
        self.emit(vec![StoreEvent::FileFailed {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        }]);
    }

    /// Top-level failure (bad address, health check)
    pub fn report_run_error(&self, message: &str) {
        self.write().set_last_error(Some(message.to_string()));
        self.emit(vec![StoreEvent::RunError {
            message: message.to_string(),
        }]);
    }

    pub fn set_phase(&self, phase: RunPhase) {
        self.write().set_phase(phase);
        self.emit(vec![StoreEvent::PhaseChanged { phase }]);
    }

    pub fn set_cancelled(&self, cancelled: bool) {
        self.write().set_cancelled(cancelled);
    }

    /// Clear results and counters, then set the new total
    pub fn reset_for_run(&self, total: usize) {
        {
            let mut store = self.write();
            store.reset_for_run();
            store.set_total(total);
        }
        self.emit(vec![StoreEvent::Progress { processed: 0, total }]);
    }

    pub fn set_total(&self, total: usize) {
        let processed = {
            let mut store = self.write();
            store.set_total(total);
            store.processed()
        };
        self.emit(vec![StoreEvent::Progress { processed, total }]);
    }

    pub fn increment_processed(&self) {
        let (processed, total) = {
            let mut store = self.write();
            store.increment_processed();
            (store.processed(), store.total())
        };
        self.emit(vec![StoreEvent::Progress { processed, total }]);
    }

    // --- Convenience reads ---

    pub fn candidates(&self) -> Vec<PathBuf> {
        self.read().candidates().to_vec()
    }

    pub fn visible(&self) -> Vec<PathBuf> {
        self.read().visible().to_vec()
    }

    pub fn phase(&self) -> RunPhase {
        self.read().phase()
    }

    pub fn proposal(&self, path: &Path) -> Option<String> {
        self.read().proposal(path).map(str::to_string)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn recorder(handle: &StoreHandle) -> Arc<Mutex<Vec<StoreEvent>>> {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        handle.subscribe(move |e| sink.lock().unwrap().push(e.clone()));
        events
    }

    #[test]
    fn test_set_candidates_notifies() {
        let handle = StoreHandle::with_batch_size(2);
        let events = recorder(&handle);

        handle.set_candidates(vec![
            PathBuf::from("/a.jpg"),
            PathBuf::from("/b.jpg"),
            PathBuf::from("/c.jpg"),
        ]);

        let events = events.lock().unwrap();
        assert_eq!(events[0], StoreEvent::CandidatesChanged { total: 3 });
        assert_eq!(
            events[1],
            StoreEvent::WindowChanged { index: 0, start: 0, end: 2 }
        );
    }

    #[test]
    fn test_advance_past_end_is_silent() {
        let handle = StoreHandle::with_batch_size(2);
        handle.set_candidates(vec![PathBuf::from("/a.jpg")]);
        let events = recorder(&handle);

        assert!(!handle.advance_to_next_batch());
        assert!(events.lock().unwrap().is_empty());
    }

    #[test]
    fn test_listener_can_read_store() {
        let handle = StoreHandle::default();
        let reader = handle.clone();
        let seen = Arc::new(Mutex::new(None));
        let sink = seen.clone();
        handle.subscribe(move |e| {
            if let StoreEvent::Proposal { path, .. } = e {
                *sink.lock().unwrap() = reader.proposal(path);
            }
        });

        handle.set_candidates(vec![PathBuf::from("/a.jpg")]);
        handle.set_proposal(Path::new("/a.jpg"), "cat");

        assert_eq!(seen.lock().unwrap().as_deref(), Some("cat"));
    }

    #[test]
    fn test_snapshot_is_detached() {
        let handle = StoreHandle::default();
        handle.set_candidates(vec![PathBuf::from("/a.jpg")]);
        let snapshot = handle.snapshot();
        handle.set_candidates(Vec::new());
        assert_eq!(snapshot.candidates().len(), 1);
        assert!(handle.candidates().is_empty());
    }

    #[test]
    fn test_event_serializes_camel_case() {
        let event = StoreEvent::WindowChanged {
            index: 1,
            start: 20,
            end: 40,
        };
        let json = serde_json::to_value(event).unwrap();
        assert_eq!(json["type"], "windowChanged");
        assert_eq!(json["end"], 40);
    }
}
