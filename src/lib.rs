//! Harvester Core Library
//!
//! This library provides the core functionality for the harvester tool, which
//! discovers images on a web page and bundles a chosen set of them into a
//! single zip archive with a provenance manifest.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`discovery`] - Depth-1 crawler that finds image references on a site
//! - [`policy`] - robots.txt policy consulted before every page fetch
//! - [`download`] - Bounded-concurrency bulk downloader with size and time budgets
//! - [`limiter`] - FIFO bounded-admission primitive used by the downloader
//! - [`archive`] - Deterministic zip packaging with `manifest.json`
//!
//! Discovery and download are independent pipelines: a caller discovers
//! [`ResourceDescriptor`]s, selects a subset, and hands it to the downloader.

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod archive;
pub mod discovery;
pub mod download;
pub mod error;
pub mod limiter;
pub mod policy;
pub mod resource;
mod user_agent;

// Re-export commonly used types
pub use archive::{ArchiveBuilder, ArchiveError, ArchiveManifest};
pub use discovery::{CrawlConfig, DiscoveryEngine, DiscoveryError, DiscoveryReport};
pub use download::{
    BulkDownloader, CancelHandle, DownloadError, DownloadEvent, DownloadLimits, DownloadOutcome,
    DownloadRun, FetchedItem, HttpClient,
};
pub use error::ErrorKind;
pub use limiter::{ConcurrencyLimiter, LimiterError};
pub use policy::{AllowAllPolicy, PolicyFetcher, RobotsPolicy};
pub use resource::{DescriptorError, ResourceDescriptor};
