//! Candidate Store
//!
//! Owns the discovered file set, the current batch window and everything the
//! pipeline learns about each file. All mutation goes through methods here so
//! the window and the proposal/error maps never drift apart.

use crate::jobs::RunPhase;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Files shown per batch window
pub const DEFAULT_BATCH_SIZE: usize = 20;

#[derive(Debug, Clone)]
pub struct CandidateStore {
    candidates: Vec<PathBuf>,
    batch_size: usize,
    window_index: usize,
    visible: Vec<PathBuf>,

    /// Proposals for files in the current window
    visible_proposals: HashMap<PathBuf, String>,
    /// Proposals for every processed file, survives window changes
    global_proposals: HashMap<PathBuf, String>,

    /// Errors for files in the current window
    visible_errors: HashMap<PathBuf, String>,
    /// Every error recorded during the current run
    error_log: HashMap<PathBuf, String>,

    /// Top-level message (health check failure, bad address)
    last_error: Option<String>,

    phase: RunPhase,
    processed: usize,
    total: usize,
    cancelled: bool,
}

impl Default for CandidateStore {
    fn default() -> Self {
        Self::new(DEFAULT_BATCH_SIZE)
    }
}

impl CandidateStore {
    pub fn new(batch_size: usize) -> Self {
        Self {
            candidates: Vec::new(),
            batch_size: batch_size.max(1),
            window_index: 0,
            visible: Vec::new(),
            visible_proposals: HashMap::new(),
            global_proposals: HashMap::new(),
            visible_errors: HashMap::new(),
            error_log: HashMap::new(),
            last_error: None,
            phase: RunPhase::Idle,
            processed: 0,
            total: 0,
            cancelled: false,
        }
    }

    // --- Candidates and windows ---

    /// Replace the whole candidate set and show the first window
    pub fn set_candidates(&mut self, candidates: Vec<PathBuf>) {
        self.candidates = candidates;
        self.window_index = 0;
        self.refresh_visible();
    }

    /// Move to the next window. Returns false (and changes nothing) past the end.
    pub fn advance_to_next_batch(&mut self) -> bool {
        let next_start = (self.window_index + 1) * self.batch_size;
        if next_start >= self.candidates.len() {
            return false;
        }

        self.window_index += 1;
        self.refresh_visible();
        self.visible_errors.clear();
        self.visible_proposals = self
            .visible
            .iter()
            .filter_map(|p| self.global_proposals.get(p).map(|b| (p.clone(), b.clone())))
            .collect();
        self.last_error = None;
        true
    }

    /// `[index*size, min((index+1)*size, total))`
    pub fn window_bounds(&self) -> (usize, usize) {
        let total = self.candidates.len();
        let start = (self.window_index * self.batch_size).min(total);
        let end = ((self.window_index + 1) * self.batch_size).min(total);
        (start, end)
    }

    fn refresh_visible(&mut self) {
        let (start, end) = self.window_bounds();
        self.visible = self.candidates[start..end].to_vec();
    }

    pub fn is_visible(&self, path: &Path) -> bool {
        self.visible.iter().any(|p| p == path)
    }

    /// Point every reference to `old` at `new` (candidate list, window, maps)
    pub fn replace_reference(&mut self, old: &Path, new: &Path) {
        for slot in self.candidates.iter_mut().chain(self.visible.iter_mut()) {
            if slot == old {
                *slot = new.to_path_buf();
            }
        }
        for map in [
            &mut self.visible_proposals,
            &mut self.global_proposals,
            &mut self.visible_errors,
            &mut self.error_log,
        ] {
            if let Some(value) = map.remove(old) {
                map.insert(new.to_path_buf(), value);
            }
        }
    }

    // --- Results ---

    /// Store a proposal without renaming; clears any error for the file
    pub fn set_proposal(&mut self, path: &Path, base: &str) {
        self.visible_errors.remove(path);
        self.error_log.remove(path);
        self.global_proposals.insert(path.to_path_buf(), base.to_string());
        if self.is_visible(path) {
            self.visible_proposals.insert(path.to_path_buf(), base.to_string());
        }
    }

    /// Record a rename: `old` is replaced by `new` everywhere, proposal kept
    pub fn apply_rename_result(&mut self, old: &Path, new: &Path, base: &str) {
        self.replace_reference(old, new);
        self.visible_errors.remove(new);
        self.error_log.remove(new);
        self.global_proposals.insert(new.to_path_buf(), base.to_string());
        if self.is_visible(new) {
            self.visible_proposals.insert(new.to_path_buf(), base.to_string());
        }
    }

    /// Record a per-file failure; replaces any proposal for the file
    pub fn record_error(&mut self, path: &Path, reason: &str) {
        self.visible_proposals.remove(path);
        self.global_proposals.remove(path);
        self.error_log.insert(path.to_path_buf(), reason.to_string());
        if self.is_visible(path) {
            self.visible_errors.insert(path.to_path_buf(), reason.to_string());
        }
    }

    pub fn set_last_error(&mut self, message: Option<String>) {
        self.last_error = message;
    }

    // --- Processing state ---

    /// Fresh run: counters to zero, all proposals and errors dropped
    pub fn reset_for_run(&mut self) {
        self.visible_proposals.clear();
        self.global_proposals.clear();
        self.visible_errors.clear();
        self.error_log.clear();
        self.last_error = None;
        self.processed = 0;
        self.total = 0;
        self.cancelled = false;
    }

    pub fn set_total(&mut self, total: usize) {
        self.total = total;
    }

    /// Bump progress, never past `total`
    pub fn increment_processed(&mut self) {
        if self.processed < self.total {
            self.processed += 1;
        }
    }

    pub fn set_phase(&mut self, phase: RunPhase) {
        self.phase = phase;
    }

    pub fn set_cancelled(&mut self, cancelled: bool) {
        self.cancelled = cancelled;
    }

    // --- Read access ---

    pub fn candidates(&self) -> &[PathBuf] {
        &self.candidates
    }

    pub fn visible(&self) -> &[PathBuf] {
        &self.visible
    }

    pub fn window_index(&self) -> usize {
        self.window_index
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn visible_proposals(&self) -> &HashMap<PathBuf, String> {
        &self.visible_proposals
    }

    pub fn global_proposals(&self) -> &HashMap<PathBuf, String> {
        &self.global_proposals
    }

    pub fn proposal(&self, path: &Path) -> Option<&str> {
        self.global_proposals.get(path).map(String::as_str)
    }

    pub fn visible_errors(&self) -> &HashMap<PathBuf, String> {
        &self.visible_errors
    }

    pub fn error_log(&self) -> &HashMap<PathBuf, String> {
        &self.error_log
    }

    pub fn error(&self, path: &Path) -> Option<&str> {
        self.error_log.get(path).map(String::as_str)
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    pub fn is_processing(&self) -> bool {
        matches!(self.phase, RunPhase::HealthChecking | RunPhase::Running)
    }

    pub fn processed(&self) -> usize {
        self.processed
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paths(n: usize) -> Vec<PathBuf> {
        (0..n).map(|i| PathBuf::from(format!("/photos/img_{:03}.jpg", i))).collect()
    }

    #[test]
    fn test_set_candidates_shows_first_window() {
        let mut store = CandidateStore::new(20);
        store.set_candidates(paths(45));

        assert_eq!(store.window_index(), 0);
        assert_eq!(store.window_bounds(), (0, 20));
        assert_eq!(store.visible().len(), 20);
        assert_eq!(store.visible()[0], PathBuf::from("/photos/img_000.jpg"));
    }

    #[test]
    fn test_windows_advance_until_exhausted() {
        let mut store = CandidateStore::new(20);
        store.set_candidates(paths(45));

        assert!(store.advance_to_next_batch());
        assert_eq!(store.window_bounds(), (20, 40));
        assert_eq!(store.visible()[0], PathBuf::from("/photos/img_020.jpg"));

        assert!(store.advance_to_next_batch());
        assert_eq!(store.window_bounds(), (40, 45));
        assert_eq!(store.visible().len(), 5);

        assert!(!store.advance_to_next_batch());
        assert_eq!(store.window_index(), 2);
        assert_eq!(store.window_bounds(), (40, 45));
    }

    #[test]
    fn test_empty_store_never_advances() {
        let mut store = CandidateStore::new(20);
        store.set_candidates(Vec::new());
        assert_eq!(store.window_bounds(), (0, 0));
        assert!(!store.advance_to_next_batch());
    }

    #[test]
    fn test_set_candidates_resets_window() {
        let mut store = CandidateStore::new(2);
        store.set_candidates(paths(5));
        store.advance_to_next_batch();
        store.set_candidates(paths(3));
        assert_eq!(store.window_index(), 0);
        assert_eq!(store.visible().len(), 2);
    }

    #[test]
    fn test_advance_repopulates_visible_proposals_from_global() {
        let mut store = CandidateStore::new(2);
        let all = paths(4);
        store.set_candidates(all.clone());

        store.set_proposal(&all[0], "first");
        store.set_proposal(&all[3], "fourth");
        store.record_error(&all[1], "boom");
        store.set_last_error(Some("server down".into()));

        assert_eq!(store.visible_proposals().len(), 1);
        assert_eq!(store.visible_errors().len(), 1);

        assert!(store.advance_to_next_batch());
        assert_eq!(store.visible_proposals().len(), 1);
        assert_eq!(store.visible_proposals().get(&all[3]).unwrap(), "fourth");
        assert!(store.visible_errors().is_empty());
        assert!(store.last_error().is_none());
        assert_eq!(store.global_proposals().len(), 2);
        assert_eq!(store.error(&all[1]), Some("boom"));
    }

    #[test]
    fn test_apply_rename_result_rekeys_everything() {
        let mut store = CandidateStore::new(2);
        let all = paths(3);
        store.set_candidates(all.clone());
        let renamed = PathBuf::from("/photos/cat__IR__.jpg");

        store.apply_rename_result(&all[1], &renamed, "cat");

        assert_eq!(store.candidates()[1], renamed);
        assert_eq!(store.visible()[1], renamed);
        assert_eq!(store.proposal(&renamed), Some("cat"));
        assert_eq!(store.visible_proposals().get(&renamed).unwrap(), "cat");
        assert!(store.proposal(&all[1]).is_none());
    }

    #[test]
    fn test_rename_outside_window_only_touches_global() {
        let mut store = CandidateStore::new(2);
        let all = paths(3);
        store.set_candidates(all.clone());
        let renamed = PathBuf::from("/photos/dog__IR__.jpg");

        store.apply_rename_result(&all[2], &renamed, "dog");

        assert!(store.visible_proposals().is_empty());
        assert_eq!(store.proposal(&renamed), Some("dog"));

        store.advance_to_next_batch();
        assert_eq!(store.visible(), &[renamed.clone()]);
        assert_eq!(store.visible_proposals().get(&renamed).unwrap(), "dog");
    }

    #[test]
    fn test_renamed_proposal_replaced_existing_proposal_key() {
        let mut store = CandidateStore::new(5);
        let all = paths(1);
        store.set_candidates(all.clone());
        store.set_proposal(&all[0], "cat");
        let renamed = PathBuf::from("/photos/cat__IR__.jpg");

        store.apply_rename_result(&all[0], &renamed, "cat");

        assert_eq!(store.global_proposals().len(), 1);
        assert_eq!(store.visible_proposals().len(), 1);
    }

    #[test]
    fn test_error_and_proposal_are_exclusive() {
        let mut store = CandidateStore::new(5);
        let all = paths(1);
        store.set_candidates(all.clone());

        store.set_proposal(&all[0], "cat");
        store.record_error(&all[0], "timeout");
        assert!(store.proposal(&all[0]).is_none());
        assert!(store.visible_proposals().is_empty());

        store.set_proposal(&all[0], "cat");
        assert!(store.error(&all[0]).is_none());
        assert!(store.visible_errors().is_empty());
    }

    #[test]
    fn test_processed_never_exceeds_total() {
        let mut store = CandidateStore::default();
        store.set_total(2);
        store.increment_processed();
        store.increment_processed();
        store.increment_processed();
        assert_eq!(store.processed(), 2);

        store.reset_for_run();
        assert_eq!(store.processed(), 0);
    }

    #[test]
    fn test_replace_reference_keeps_position() {
        let mut store = CandidateStore::new(5);
        let all = vec![PathBuf::from("/a.webp"), PathBuf::from("/b.jpg")];
        store.set_candidates(all.clone());
        store.record_error(&all[0], "old error");

        store.replace_reference(&all[0], Path::new("/a.jpg"));

        assert_eq!(store.candidates()[0], PathBuf::from("/a.jpg"));
        assert_eq!(store.visible()[0], PathBuf::from("/a.jpg"));
        assert_eq!(store.error(Path::new("/a.jpg")), Some("old error"));
    }
}
