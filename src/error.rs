//! Error types shared by every stage of the rename pipeline.

use std::path::PathBuf;

/// Errors surfaced by the inference adapter, the rename engine and the pipeline.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Server address could not be parsed (empty, bad scheme, no host)
    #[error("Invalid server address: {0}")]
    InvalidServerAddress(String),

    /// Request never produced an HTTP response (connection refused, timeout, reset)
    #[error("Server unreachable: {0}")]
    ServerUnreachable(String),

    /// Server answered with a non-2xx status
    #[error("HTTP {code}: {body}")]
    HttpStatus { code: u16, body: String },

    /// Response body did not match the expected shape
    #[error("Failed to decode response ({reason}): {body}")]
    DecodingFailed { body: String, reason: String },

    /// Filesystem move failed; the source file is left in place
    #[error("Failed to rename {name}: {cause}")]
    RenameFailed {
        name: String,
        #[source]
        cause: std::io::Error,
    },

    /// File has an unsupported extension or already carries the rename marker
    #[error("Unsupported or already processed: {}", .0.display())]
    UnsupportedOrAlreadyProcessed(PathBuf),

    #[error("Cancelled")]
    Cancelled,

    /// A batch run already owns the store
    #[error("A batch run is already in progress")]
    Busy,

    #[error("Format conversion failed: {0}")]
    Conversion(String),

    #[error("Settings error: {0}")]
    Settings(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Only a plain 500 is retried; timeouts, resets and other 5xx are not.
    pub fn is_server_error_500(&self) -> bool {
        matches!(self, Error::HttpStatus { code: 500, .. })
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::ServerUnreachable(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_500_is_retryable() {
        let e500 = Error::HttpStatus { code: 500, body: String::new() };
        let e502 = Error::HttpStatus { code: 502, body: String::new() };
        assert!(e500.is_server_error_500());
        assert!(!e502.is_server_error_500());
        assert!(!Error::ServerUnreachable("timeout".into()).is_server_error_500());
    }

    #[test]
    fn test_rename_error_mentions_original_name() {
        let err = Error::RenameFailed {
            name: "IMG_0001.jpg".to_string(),
            cause: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        let msg = err.to_string();
        assert!(msg.contains("IMG_0001.jpg"));
        assert!(msg.contains("denied"));
    }
}
