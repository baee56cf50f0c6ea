pub mod access;
pub mod ai;
pub mod commands;
pub mod error;
pub mod execution;
pub mod jobs;
pub mod naming;
pub mod services;
pub mod settings;
pub mod store;

pub use error::{Error, Result};
pub use jobs::{BatchPipeline, CancelToken, PipelineConfig, RunOutcome, RunPhase, RunReport};
pub use settings::{Settings, SettingsStore};
pub use store::{CandidateStore, StoreEvent, StoreHandle};

use tracing_subscriber::EnvFilter;

/// Load `.env` from the working directory, falling back to its parent
pub fn load_env() {
    if dotenvy::dotenv().is_err() {
        let _ = dotenvy::from_path("../.env");
    }
}

/// Initialize tracing with the RUST_LOG env filter
///
/// Default: warn for dependencies, info for this crate (run summaries
/// visible). Use RUST_LOG=debug for per-file logs.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("warn,image_namer=info")),
        )
        .with_writer(std::io::stderr)
        .init();
}
