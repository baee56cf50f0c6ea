//! Inference server address handling.
//!
//! Users type anything from `localhost` to `https://gpu-box:8443/ollama`.
//! Normalization fills in the scheme (`http`) and port (`11434`) when they
//! are missing, and rejects input that has no usable host.

use crate::error::{Error, Result};
use reqwest::Url;
use std::fmt;

pub const DEFAULT_SCHEME: &str = "http";
pub const DEFAULT_PORT: u16 = 11434;
pub const DEFAULT_SERVER: &str = "http://127.0.0.1:11434";

/// A normalized base address, without trailing slash
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerAddress(String);

impl ServerAddress {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Absolute URL for an API path such as `/api/tags`
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.0, path)
    }
}

impl Default for ServerAddress {
    fn default() -> Self {
        Self(DEFAULT_SERVER.to_string())
    }
}

impl fmt::Display for ServerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Accepts `host`, `host:port` or a full URL.
pub fn normalize_server_address(raw: &str) -> Result<ServerAddress> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidServerAddress("address is empty".to_string()));
    }

    let with_scheme = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("{}://{}", DEFAULT_SCHEME, trimmed)
    };

    let url = Url::parse(&with_scheme)
        .map_err(|e| Error::InvalidServerAddress(format!("{}: {}", trimmed, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(Error::InvalidServerAddress(format!(
            "{}: unsupported scheme '{}'",
            trimmed,
            url.scheme()
        )));
    }

    let host = match url.host_str() {
        Some(h) if !h.is_empty() => h,
        _ => {
            return Err(Error::InvalidServerAddress(format!("{}: missing host", trimmed)));
        }
    };

    // Url drops ports equal to the scheme default, so look at what was typed
    let port = if has_explicit_port(&with_scheme) {
        url.port_or_known_default().unwrap_or(DEFAULT_PORT)
    } else {
        DEFAULT_PORT
    };

    let path = url.path().trim_end_matches('/');

    Ok(ServerAddress(format!(
        "{}://{}:{}{}",
        url.scheme(),
        host,
        port,
        path
    )))
}

fn has_explicit_port(with_scheme: &str) -> bool {
    let after_scheme = with_scheme
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(with_scheme);
    let authority = after_scheme
        .split(['/', '?', '#'])
        .next()
        .unwrap_or_default();
    let host_port = authority.rsplit('@').next().unwrap_or(authority);

    if host_port.starts_with('[') {
        // IPv6 literal: [::1]:11434
        host_port.contains("]:")
    } else {
        host_port.contains(':')
    }
}
