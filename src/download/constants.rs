//! Contractual limits and timeouts for the download and discovery pipelines.

use std::time::Duration;

/// Bytes in one mebibyte.
pub const MIB: u64 = 1024 * 1024;

/// Maximum number of resources accepted in one download batch.
pub const MAX_BATCH_ITEMS: usize = 100;

/// Maximum number of fetches in flight at once.
pub const DEFAULT_CONCURRENCY: usize = 3;

/// Per-file size cap (50 MiB).
pub const MAX_FILE_BYTES: u64 = 50 * MIB;

/// Aggregate size cap for one batch (500 MiB).
pub const MAX_TOTAL_BYTES: u64 = 500 * MIB;

/// Timeout for one image fetch, body included.
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Timeout for a robots.txt fetch.
pub const POLICY_TIMEOUT: Duration = Duration::from_secs(5);

/// Timeout for fetching an HTML page during discovery.
pub const PAGE_TIMEOUT: Duration = Duration::from_secs(15);

/// HTTP connect timeout shared by every request.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Largest HTML page read during discovery (10 MiB).
pub const MAX_PAGE_BYTES: u64 = 10 * MIB;

/// Largest robots.txt body read (512 KiB).
pub const MAX_ROBOTS_BYTES: u64 = 512 * 1024;

/// Content-type markers accepted for image downloads (case-insensitive substring).
pub const IMAGE_MIME_MARKERS: &[&str] = &["jpeg", "jpg", "png", "gif", "webp", "svg+xml", "bmp"];
