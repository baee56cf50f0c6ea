//! Filename helpers: sanitizing model output and the rename marker.
//!
//! Every name this tool produces carries [`RENAME_MARKER`], which is how
//! already-processed files are recognised on later runs.

use std::path::Path;

/// Sentinel embedded in every generated filename
pub const RENAME_MARKER: &str = "__IR__";

/// Characters of raw model output considered before sanitizing
pub const RAW_RESPONSE_LIMIT: usize = 120;

/// Characters kept after sanitizing
pub const BASE_NAME_LIMIT: usize = 60;

/// Returned when sanitizing leaves nothing behind
const FALLBACK_NAME: &str = "image";

const IMAGE_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "heic", "heif", "webp", "gif", "bmp", "tif", "tiff",
];

/// Turn arbitrary text into a lowercase, hyphen-separated filename fragment.
///
/// Anything that is not alphanumeric becomes a word break. Runs of
/// whitespace collapse to a single hyphen and the ends are trimmed. The
/// result is never empty.
pub fn sanitize(text: &str) -> String {
    let lowered = text.to_lowercase();

    // Hyphens and underscores are separators too, so they collapse with spaces
    let spaced: String = lowered
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();

    let joined = spaced.split_whitespace().collect::<Vec<_>>().join("-");

    if joined.is_empty() {
        FALLBACK_NAME.to_string()
    } else {
        joined
    }
}

/// Keep at most `limit` characters (not bytes)
pub fn truncate_chars(text: &str, limit: usize) -> String {
    text.chars().take(limit).collect()
}

/// Model response → proposed base name (no extension, no marker)
pub fn proposed_base_name(response: &str) -> String {
    let raw = truncate_chars(response, RAW_RESPONSE_LIMIT);
    truncate_chars(&sanitize(&raw), BASE_NAME_LIMIT)
}

/// Append the marker unless the base already carries it
pub fn mark(base: &str) -> String {
    if base.contains(RENAME_MARKER) {
        base.to_string()
    } else {
        format!("{}{}", base, RENAME_MARKER)
    }
}

/// Whether a file's name already carries the marker
pub fn is_marked(path: &Path) -> bool {
    path.file_stem()
        .map(|s| s.to_string_lossy().contains(RENAME_MARKER))
        .unwrap_or(false)
}

/// Check if a file extension is an image type we can send for analysis
pub fn is_image_extension(ext: Option<&str>) -> bool {
    match ext {
        Some(e) => IMAGE_EXTENSIONS.contains(&e.to_lowercase().as_str()),
        None => false,
    }
}

/// Supported extension and not yet processed
pub fn is_candidate(path: &Path) -> bool {
    is_image_extension(path.extension().and_then(|e| e.to_str())) && !is_marked(path)
}
