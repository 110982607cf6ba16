//! Manifest describing the contents of an archive.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::download::FetchedItem;

/// Archive entry name of the serialized manifest.
pub const MANIFEST_NAME: &str = "manifest.json";

/// Metadata for every image in an archive, in archive order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveManifest {
    /// When the archive was generated.
    pub generated_at: DateTime<Utc>,
    /// Number of images in the archive (the manifest itself excluded).
    pub item_count: usize,
    /// One entry per image.
    pub items: Vec<ManifestEntry>,
}

/// Provenance of one archived image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestEntry {
    /// Entry name inside the archive.
    pub filename: String,
    /// URL the image was fetched from.
    pub original_url: String,
    /// Page the image was discovered on.
    pub source_url: String,
    /// Alt text, if the tag had one.
    pub alt: Option<String>,
}

impl ArchiveManifest {
    /// Derives the manifest from the final item list.
    #[must_use]
    pub fn from_items(items: &[FetchedItem], generated_at: DateTime<Utc>) -> Self {
        let items: Vec<ManifestEntry> = items
            .iter()
            .map(|item| ManifestEntry {
                filename: item.filename().to_string(),
                original_url: item.original_url().to_string(),
                source_url: item.source_url().to_string(),
                alt: item.alt().map(str::to_string),
            })
            .collect();
        Self {
            generated_at,
            item_count: items.len(),
            items,
        }
    }
}
