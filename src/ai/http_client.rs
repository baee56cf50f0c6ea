//! Shared HTTP Client Module
//!
//! Provides a global, lazy-initialized HTTP client for the inference server.
//! Connection reuse matters here: a batch issues one request per image to the
//! same host, sequentially.

use once_cell::sync::Lazy;
use reqwest::Client;
use std::time::Duration;

/// Global HTTP client for generate requests
///
/// Configuration tuned for local vision models:
/// - 300s timeout, since a cold model load plus a large image can be slow
/// - a handful of idle connections, requests are sequential
/// - 90s idle timeout to keep the connection warm between images
pub static INFERENCE_CLIENT: Lazy<Client> = Lazy::new(|| {
    Client::builder()
        .timeout(Duration::from_secs(300))
        .connect_timeout(Duration::from_secs(10))
        .pool_max_idle_per_host(4)
        .pool_idle_timeout(Duration::from_secs(90))
        .tcp_keepalive(Duration::from_secs(60))
        .tcp_nodelay(true)
        .build()
        .unwrap_or_else(|e| {
            tracing::error!("Failed to build tuned HTTP client: {}. Using defaults.", e);
            Client::new()
        })
});

/// Global HTTP client for short probes (health check, model listing)
pub static PROBE_CLIENT: Lazy<Client> = Lazy::new(|| {
    Client::builder()
        .timeout(Duration::from_secs(10))
        .pool_max_idle_per_host(2)
        .pool_idle_timeout(Duration::from_secs(30))
        .build()
        .unwrap_or_else(|e| {
            tracing::error!("Failed to build probe HTTP client: {}. Using defaults.", e);
            Client::new()
        })
});

/// Get the global inference HTTP client
#[inline]
pub fn inference_client() -> &'static Client {
    &INFERENCE_CLIENT
}

/// Get the global probe HTTP client
#[inline]
pub fn probe_client() -> &'static Client {
    &PROBE_CLIENT
}
