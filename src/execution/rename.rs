//! Rename Engine
//!
//! Moves one image to a marker-tagged name next to it, picking a numeric
//! suffix when the name is taken. The move is a single `rename(2)`; on
//! failure the source file is untouched.

use crate::error::{Error, Result};
use crate::naming::mark;
use std::fs;
use std::path::{Path, PathBuf};

/// Result of a successful rename
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenameOutcome {
    pub new_path: PathBuf,
    /// Base name actually used on disk (marker included, suffix excluded)
    pub marked_base: String,
}

/// Rename `path` to `<proposed_base><marker>[-N].<ext>` in the same directory.
pub fn rename_with_marker(path: &Path, proposed_base: &str) -> Result<RenameOutcome> {
    let original_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string());

    let parent = path.parent().unwrap_or(Path::new("."));
    let marked_base = mark(proposed_base);
    let ext = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy().to_lowercase()))
        .unwrap_or_default();

    let target = free_target(parent, path, &marked_base, &ext);

    fs::rename(path, &target).map_err(|cause| Error::RenameFailed {
        name: original_name.clone(),
        cause,
    })?;

    tracing::debug!(from = %original_name, to = %target.display(), "Renamed file");

    Ok(RenameOutcome {
        new_path: target,
        marked_base,
    })
}

/// First of `base.ext`, `base-1.ext`, `base-2.ext`, ... that does not exist.
///
/// The source itself counts as free so a file is never bumped off its own name.
fn free_target(parent: &Path, source: &Path, base: &str, ext: &str) -> PathBuf {
    let first = parent.join(format!("{}{}", base, ext));
    if first == source || !first.exists() {
        return first;
    }

    let mut counter: u64 = 1;
    loop {
        let candidate = parent.join(format!("{}-{}{}", base, counter, ext));
        if candidate == source || !candidate.exists() {
            return candidate;
        }
        counter += 1;
    }
}

/// Async wrapper running the rename on the blocking pool
pub async fn rename_file(path: PathBuf, proposed_base: String) -> Result<RenameOutcome> {
    tokio::task::spawn_blocking(move || rename_with_marker(&path, &proposed_base))
        .await
        .map_err(|e| Error::Io(std::io::Error::other(format!("Task failed: {}", e))))?
}
