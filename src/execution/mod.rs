//! Execution Module
//!
//! Filesystem side of the pipeline: collision-safe, marker-tagged renames.

pub mod rename;

pub use rename::{rename_file, rename_with_marker, RenameOutcome};
