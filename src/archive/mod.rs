//! Zip packaging of fetched images plus a JSON manifest.
//!
//! Output is deterministic: entries are written in item order, every entry
//! carries the fixed zip epoch as its modification time, and the only
//! timestamp in the archive is the manifest's declared generation time.
//!
//! # Example
//!
//! ```no_run
//! use harvester_core::archive::ArchiveBuilder;
//! use harvester_core::download::FetchedItem;
//!
//! # fn example(items: Vec<FetchedItem>) -> Result<(), Box<dyn std::error::Error>> {
//! let bytes = ArchiveBuilder::now().build(&items)?;
//! std::fs::write("images.zip", bytes)?;
//! # Ok(())
//! # }
//! ```

mod manifest;

use std::collections::HashSet;
use std::io::{Cursor, Write};

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, instrument};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::download::FetchedItem;

pub use manifest::{ArchiveManifest, MANIFEST_NAME, ManifestEntry};

/// Deflate level used for every entry.
pub const COMPRESSION_LEVEL: i64 = 6;

/// Errors that can occur while assembling an archive.
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// Two entries share a name.
    #[error("duplicate archive entry '{name}'")]
    DuplicateEntry {
        /// The repeated name.
        name: String,
    },

    /// The zip writer failed.
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// Writing entry bytes failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The manifest could not be serialized.
    #[error("failed to serialize manifest: {0}")]
    Manifest(#[from] serde_json::Error),
}

/// Builds one archive for one download run.
#[derive(Debug, Clone, Copy)]
pub struct ArchiveBuilder {
    generated_at: DateTime<Utc>,
}

impl ArchiveBuilder {
    /// Creates a builder whose manifest declares `generated_at`.
    #[must_use]
    pub fn new(generated_at: DateTime<Utc>) -> Self {
        Self { generated_at }
    }

    /// Creates a builder stamped with the current time.
    #[must_use]
    pub fn now() -> Self {
        Self::new(Utc::now())
    }

    /// Packages `items` and their manifest into a zip blob.
    ///
    /// # Errors
    ///
    /// Returns [`ArchiveError`] on duplicate names (including a clash with the
    /// manifest entry) or if the zip writer fails.
    #[instrument(level = "debug", skip(self, items), fields(items = items.len()))]
    pub fn build(&self, items: &[FetchedItem]) -> Result<Vec<u8>, ArchiveError> {
        let options = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .compression_level(Some(COMPRESSION_LEVEL))
            .last_modified_time(zip::DateTime::default())
            .unix_permissions(0o644);

        let mut names: HashSet<&str> = HashSet::with_capacity(items.len() + 1);
        names.insert(MANIFEST_NAME);

        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        for item in items {
            if !names.insert(item.filename()) {
                return Err(ArchiveError::DuplicateEntry {
                    name: item.filename().to_string(),
                });
            }
            writer.start_file(item.filename(), options)?;
            writer.write_all(item.bytes())?;
        }

        let manifest = ArchiveManifest::from_items(items, self.generated_at);
        writer.start_file(MANIFEST_NAME, options)?;
        writer.write_all(&serde_json::to_vec_pretty(&manifest)?)?;

        let bytes = writer.finish()?.into_inner();
        debug!(bytes = bytes.len(), "archive built");
        Ok(bytes)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::io::Read;

    use chrono::TimeZone;
    use zip::ZipArchive;

    use super::*;

    fn item(name: &str, bytes: &[u8]) -> FetchedItem {
        FetchedItem::new(
            name,
            bytes.to_vec(),
            format!("https://example.com/{name}"),
            "https://example.com/gallery".to_string(),
            Some(format!("alt for {name}")),
        )
    }

    fn fixed_builder() -> ArchiveBuilder {
        ArchiveBuilder::new(Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap())
    }

    #[test]
    fn test_build_contains_items_and_manifest() {
        let items = vec![item("001_a.png", b"aaaa"), item("002_b.jpg", b"bbbbbb")];
        let bytes = fixed_builder().build(&items).unwrap();

        let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        assert_eq!(archive.len(), 3);

        let mut content = Vec::new();
        archive
            .by_name("002_b.jpg")
            .unwrap()
            .read_to_end(&mut content)
            .unwrap();
        assert_eq!(content, b"bbbbbb");

        let mut raw = String::new();
        archive
            .by_name(MANIFEST_NAME)
            .unwrap()
            .read_to_string(&mut raw)
            .unwrap();
        let manifest: ArchiveManifest = serde_json::from_str(&raw).unwrap();
        assert_eq!(manifest.item_count, 2);
        assert_eq!(manifest.items[0].filename, "001_a.png");
        assert_eq!(manifest.items[1].original_url, "https://example.com/002_b.jpg");
        assert_eq!(manifest.items[1].alt.as_deref(), Some("alt for 002_b.jpg"));
    }

    #[test]
    fn test_manifest_uses_camel_case_keys() {
        let items = vec![item("001_a.png", b"a")];
        let bytes = fixed_builder().build(&items).unwrap();
        let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        let mut raw = String::new();
        archive
            .by_name(MANIFEST_NAME)
            .unwrap()
            .read_to_string(&mut raw)
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["itemCount"], 1);
        assert_eq!(value["generatedAt"], "2026-01-02T03:04:05Z");
        assert_eq!(value["items"][0]["sourceUrl"], "https://example.com/gallery");
    }

    #[test]
    fn test_build_is_deterministic() {
        let items = vec![item("001_a.png", b"aaaa"), item("002_b.jpg", b"bbbbbb")];
        let first = fixed_builder().build(&items).unwrap();
        let second = fixed_builder().build(&items).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_build_empty_has_only_manifest() {
        let bytes = fixed_builder().build(&[]).unwrap();
        let archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        assert_eq!(archive.len(), 1);
        assert_eq!(archive.file_names().next(), Some(MANIFEST_NAME));
    }

    #[test]
    fn test_build_rejects_duplicate_names() {
        let items = vec![item("001_a.png", b"a"), item("001_a.png", b"b")];
        let err = fixed_builder().build(&items).unwrap_err();
        assert!(matches!(err, ArchiveError::DuplicateEntry { ref name } if name == "001_a.png"));
    }

    #[test]
    fn test_build_rejects_manifest_name_clash() {
        let items = vec![item(MANIFEST_NAME, b"{}")];
        assert!(matches!(
            fixed_builder().build(&items),
            Err(ArchiveError::DuplicateEntry { .. })
        ));
    }
}
