//! Folder access capability.
//!
//! Sandboxed platforms need an explicit grant before touching a folder the
//! user picked in an earlier session. The pipeline only talks to
//! [`FolderAccess`]; platforms without such sandboxing use [`Unrestricted`],
//! whose token is simply the canonical folder path.

use crate::error::Result;
use std::path::{Path, PathBuf};

/// Keeps access open while alive
pub struct AccessGuard {
    path: PathBuf,
    on_release: Option<Box<dyn FnOnce() + Send>>,
}

impl AccessGuard {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            on_release: None,
        }
    }

    /// Guard that runs `release` when dropped
    pub fn with_release(path: PathBuf, release: impl FnOnce() + Send + 'static) -> Self {
        Self {
            path,
            on_release: Some(Box::new(release)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for AccessGuard {
    fn drop(&mut self) {
        if let Some(release) = self.on_release.take() {
            release();
        }
    }
}

pub trait FolderAccess: Send + Sync {
    /// Ask for access to `folder`; returns a token worth persisting
    fn authorize(&self, folder: &Path) -> Result<String>;

    /// Reopen access from a persisted token
    fn begin_access(&self, token: &str) -> Result<AccessGuard>;
}

/// Run `body` while access to the folder behind `token` is held
pub fn with_access<A, R>(access: &A, token: &str, body: impl FnOnce(&Path) -> R) -> Result<R>
where
    A: FolderAccess + ?Sized,
{
    let guard = access.begin_access(token)?;
    Ok(body(guard.path()))
}

/// No sandbox: every readable folder is accessible
#[derive(Debug, Default, Clone, Copy)]
pub struct Unrestricted;

impl FolderAccess for Unrestricted {
    fn authorize(&self, folder: &Path) -> Result<String> {
        let canonical = folder.canonicalize()?;
        Ok(canonical.to_string_lossy().to_string())
    }

    fn begin_access(&self, token: &str) -> Result<AccessGuard> {
        let path = PathBuf::from(token);
        // Fails early if the folder is gone
        std::fs::metadata(&path)?;
        Ok(AccessGuard::new(path))
    }
}
