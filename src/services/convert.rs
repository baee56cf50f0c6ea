//! Format conversion for images the inference server cannot read directly.
//!
//! JPEG and PNG pass through untouched. Anything else the `image` crate can
//! decode is re-encoded as JPEG next to the original, and the original is
//! removed once the new file is on disk.

use crate::error::{Error, Result};
use image::ImageFormat;
use std::fs;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

/// Formats sent to the server as-is
const STANDARD_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

/// Given a file, return a path the inference server can read.
pub trait FormatConverter: Send + Sync {
    /// Returns the input unchanged for standard formats, otherwise the path
    /// of a freshly converted file (the original is gone afterwards).
    fn convert(&self, path: &Path) -> Result<PathBuf>;
}

/// Converter backed by the `image` crate
#[derive(Debug, Default, Clone, Copy)]
pub struct ImageConverter;

impl FormatConverter for ImageConverter {
    fn convert(&self, path: &Path) -> Result<PathBuf> {
        if is_standard_format(path) {
            return Ok(path.to_path_buf());
        }

        let img = image::open(path)
            .map_err(|e| Error::Conversion(format!("{}: {}", path.display(), e)))?;

        let target = unique_sibling(path, "jpg");
        let file = fs::File::create(&target)?;
        let mut writer = BufWriter::new(file);

        // JPEG has no alpha channel
        if let Err(e) = img.to_rgb8().write_to(&mut writer, ImageFormat::Jpeg) {
            drop(writer);
            let _ = fs::remove_file(&target);
            return Err(Error::Conversion(format!("{}: {}", path.display(), e)));
        }
        drop(writer);

        retire_original(path, &target, fs::remove_file(path))?;

        tracing::debug!(
            from = %path.display(),
            to = %target.display(),
            "Converted image to JPEG"
        );
        Ok(target)
    }
}

/// Settle the outcome of removing the original. If it is still there, the
/// converted copy is deleted so only one version of the image remains.
fn retire_original(original: &Path, target: &Path, removal: std::io::Result<()>) -> Result<()> {
    if let Err(e) = removal {
        let _ = fs::remove_file(target);
        return Err(Error::Conversion(format!(
            "{}: could not remove original: {}",
            original.display(),
            e
        )));
    }
    Ok(())
}

/// Whether the server accepts this file without conversion
pub fn is_standard_format(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| STANDARD_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// `stem.ext`, then `stem-1.ext`, `stem-2.ext`, ... in the source directory
fn unique_sibling(original: &Path, ext: &str) -> PathBuf {
    let parent = original.parent().unwrap_or(Path::new("."));
    let stem = original
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "image".to_string());

    let first = parent.join(format!("{}.{}", stem, ext));
    if !first.exists() {
        return first;
    }

    let mut counter = 1;
    loop {
        let candidate = parent.join(format!("{}-{}.{}", stem, counter, ext));
        if !candidate.exists() {
            return candidate;
        }
        counter += 1;
    }
}
