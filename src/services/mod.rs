//! Collaborators around the pipeline: finding candidates and normalising formats.

pub mod convert;
pub mod discovery;

pub use convert::{FormatConverter, ImageConverter};
pub use discovery::discover;
