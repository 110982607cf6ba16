//! Bounded-concurrency bulk download of image resources.
//!
//! This module fetches a batch of [`ResourceDescriptor`](crate::ResourceDescriptor)s
//! under per-file, per-batch, and per-fetch limits, validates every response,
//! and packages the survivors into one archive.
//!
//! # Features
//!
//! - At most 3 fetches in flight (FIFO admission)
//! - Content-type allowlist and declared plus streamed size checks
//! - Aggregate byte budget that can never be overshot
//! - Typed progress events and cooperative cancellation
//! - Deterministic, collision-free archive entry names
//!
//! # Example
//!
//! ```no_run
//! use harvester_core::download::{BulkDownloader, DownloadEvent, DownloadLimits, HttpClient};
//! use harvester_core::ResourceDescriptor;
//!
//! # async fn example(resources: Vec<ResourceDescriptor>) -> Result<(), Box<dyn std::error::Error>> {
//! let downloader = BulkDownloader::new(HttpClient::new(), DownloadLimits::default())?;
//! let mut run = downloader.download(resources, "req-42");
//! while let Some(event) = run.next_event().await {
//!     if let DownloadEvent::Progress(p) = &event {
//!         println!("{}% {}", p.percentage, p.message);
//!     }
//! }
//! # Ok(())
//! # }
//! ```

mod budget;
pub(crate) mod client;
pub mod constants;
mod engine;
mod error;
mod events;
mod filename;
mod item;

pub use budget::{BudgetOverflow, DownloadBudget};
pub use client::{HtmlPage, HttpClient};
pub use constants::{DEFAULT_CONCURRENCY, MAX_BATCH_ITEMS};
pub use engine::{BulkDownloader, CancelHandle, DownloadLimits, DownloadRun, EngineError};
pub use error::DownloadError;
pub use events::{Completion, DownloadEvent, DownloadOutcome, Failure, Progress};
pub use filename::{extension_from_content_type, generate_filename, is_safe_filename, sanitize_filename};
pub use item::FetchedItem;
