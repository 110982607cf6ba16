//! A fetched and validated image, ready for archiving.

use super::filename::sanitize_filename;

/// Bytes of one successfully fetched image plus its provenance.
///
/// The filename is sanitized on construction and cannot be changed afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedItem {
    filename: String,
    bytes: Vec<u8>,
    original_url: String,
    source_url: String,
    alt: Option<String>,
}

impl FetchedItem {
    /// Creates an item, sanitizing `filename` into `[A-Za-z0-9._-]`.
    #[must_use]
    pub fn new(
        filename: &str,
        bytes: Vec<u8>,
        original_url: String,
        source_url: String,
        alt: Option<String>,
    ) -> Self {
        let mut filename = sanitize_filename(filename);
        if filename.is_empty() || filename.chars().all(|c| c == '.') {
            filename = filename.replace('.', "_");
            filename.insert_str(0, "image");
        }
        Self {
            filename,
            bytes,
            original_url,
            source_url,
            alt,
        }
    }

    /// Archive entry name.
    #[must_use]
    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// Payload.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Payload size in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// True for an empty payload.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// URL the image was fetched from.
    #[must_use]
    pub fn original_url(&self) -> &str {
        &self.original_url
    }

    /// Page the image was discovered on.
    #[must_use]
    pub fn source_url(&self) -> &str {
        &self.source_url
    }

    /// Alt text from discovery.
    #[must_use]
    pub fn alt(&self) -> Option<&str> {
        self.alt.as_deref()
    }
}
