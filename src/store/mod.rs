//! Candidate store and its observable handle.

pub mod candidates;
pub mod handle;

pub use candidates::{CandidateStore, DEFAULT_BATCH_SIZE};
pub use handle::{StoreEvent, StoreHandle, StoreListener};
