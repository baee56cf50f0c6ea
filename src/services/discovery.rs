//! Candidate discovery.
//!
//! Expands user-selected paths into the list of images worth sending to the
//! model: supported extension, no rename marker yet. Directories are read
//! one level deep; hidden entries are skipped.

use crate::naming::is_candidate;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Expand files and directories into eligible candidates, in selection order.
///
/// Entries inside one directory are ordered by file name.
pub fn discover<P: AsRef<Path>>(paths: &[P]) -> Vec<PathBuf> {
    let mut seen = HashSet::new();
    let mut candidates = Vec::new();

    for selected in paths {
        let selected = selected.as_ref();

        if selected.is_dir() {
            for path in list_directory(selected) {
                if seen.insert(path.clone()) {
                    candidates.push(path);
                }
            }
        } else if selected.is_file() {
            if is_candidate(selected) && seen.insert(selected.to_path_buf()) {
                candidates.push(selected.to_path_buf());
            }
        } else {
            tracing::warn!(path = %selected.display(), "Selected path does not exist");
        }
    }

    tracing::info!(count = candidates.len(), "Discovered candidate images");
    candidates
}

fn list_directory(dir: &Path) -> Vec<PathBuf> {
    WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                // Skip entries we can't read (permission denied, etc.)
                tracing::warn!("Cannot read entry in {:?}: {}", dir, e);
                None
            }
        })
        .filter(|entry| !is_hidden(entry.path()))
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| is_candidate(path))
        .collect()
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .map(|n| n.to_string_lossy().starts_with('.'))
        .unwrap_or(false)
}
