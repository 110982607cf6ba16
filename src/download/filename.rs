//! Filename generation and sanitization for archived images.
//!
//! Names are derived from the URL's last path segment and prefixed with a
//! zero-padded sequence number, so two resources that normalize to the same
//! base name still land in distinct archive entries.

use url::Url;

/// Extension used when the content type gives no better hint.
const DEFAULT_EXTENSION: &str = ".jpg";

/// Longest suffix after the last dot still treated as an extension.
const MAX_EXTENSION_LEN: usize = 5;

/// Builds the archive filename for the `sequence`-th resource of a batch.
///
/// `https://cdn.example.com/img/photo%201.png?w=200` with sequence 7 becomes
/// `007_photo_201.png`. A URL without a usable last segment falls back to
/// `image_007.<ext>`.
#[must_use]
pub fn generate_filename(url: &str, content_type: Option<&str>, sequence: usize) -> String {
    let extension = content_type.map_or(DEFAULT_EXTENSION, extension_from_content_type);

    let Some(segment) = last_path_segment(url) else {
        return format!("image_{sequence:03}{extension}");
    };

    let mut base = sanitize_filename(&segment);
    if !has_extension(&base) {
        base.push_str(extension);
    }
    format!("{sequence:03}_{base}")
}

/// Replaces every character outside `[A-Za-z0-9.-]` with `_`.
#[must_use]
pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Maps an image content type to a file extension, defaulting to `.jpg`.
#[must_use]
pub fn extension_from_content_type(content_type: &str) -> &'static str {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();

    match mime.as_str() {
        "image/png" => ".png",
        "image/gif" => ".gif",
        "image/webp" => ".webp",
        "image/svg+xml" => ".svg",
        "image/bmp" | "image/x-ms-bmp" => ".bmp",
        // jpeg, jpg, pjpeg, and anything unrecognised
        _ => DEFAULT_EXTENSION,
    }
}

/// Returns the final, non-empty path segment of `url` with the query dropped.
fn last_path_segment(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let segment = parsed.path_segments()?.next_back()?;
    (!segment.is_empty()).then(|| segment.to_string())
}

fn has_extension(name: &str) -> bool {
    let Some(dot) = name.rfind('.') else {
        return false;
    };
    let ext = &name[dot + 1..];
    dot > 0
        && !ext.is_empty()
        && ext.len() <= MAX_EXTENSION_LEN
        && ext.chars().all(|c| c.is_ascii_alphanumeric())
}

/// True when `name` contains only characters produced by [`sanitize_filename`].
#[must_use]
pub fn is_safe_filename(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
}
