//! Image discovery from a seed page.
//!
//! The crawler fetches the seed, extracts image references and same-host
//! links, then follows at most 10 of those links one level deep. Every page
//! fetch is gated by a [`PolicyFetcher`](crate::policy::PolicyFetcher), and
//! the crawl stops expanding once its resource-count or time budget is spent.
//!
//! # Example
//!
//! ```no_run
//! use harvester_core::discovery::{CrawlConfig, DiscoveryEngine};
//! use harvester_core::download::HttpClient;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let engine = DiscoveryEngine::new(HttpClient::new(), CrawlConfig::default());
//! let report = engine.discover("https://example.com/gallery", "req-7").await;
//! if let Some(error) = &report.error {
//!     eprintln!("discovery stopped: {error}");
//! }
//! println!("{}", serde_json::to_string_pretty(&report.resources)?);
//! # Ok(())
//! # }
//! ```

mod budget;
mod crawler;
mod error;
mod extract;

pub use budget::{CrawlBudget, VisitedSet};
pub use crawler::{
    CrawlConfig, DEFAULT_MAX_ELAPSED, DEFAULT_MAX_RESOURCES, DiscoveryEngine, DiscoveryReport,
    MAX_DEPTH, MAX_LINKS_PER_PAGE, normalize_seed,
};
pub use error::DiscoveryError;
pub use extract::{ImageRef, MIN_DIMENSION, PageExtraction, TRACKING_KEYWORDS, extract_page};
