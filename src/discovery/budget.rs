//! Per-crawl budget and visited set.

use std::collections::HashSet;
use std::time::Duration;

use tokio::time::Instant;
use url::Url;

/// Resource-count and wall-clock limits of one crawl.
///
/// Consulted before every expansion step; once exceeded, the crawl stops
/// expanding but keeps what it already found.
#[derive(Debug)]
pub struct CrawlBudget {
    started_at: Instant,
    found_count: usize,
    max_resources: usize,
    max_elapsed: Duration,
}

impl CrawlBudget {
    /// Starts the clock.
    #[must_use]
    pub fn new(max_resources: usize, max_elapsed: Duration) -> Self {
        Self {
            started_at: Instant::now(),
            found_count: 0,
            max_resources,
            max_elapsed,
        }
    }

    /// Records one accepted resource.
    pub fn record_found(&mut self) {
        self.found_count += 1;
    }

    /// Resources accepted so far.
    #[must_use]
    pub fn found_count(&self) -> usize {
        self.found_count
    }

    /// True once the resource count has reached its cap.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.found_count >= self.max_resources
    }

    /// Time since the crawl started.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// True once either the count or the time limit is reached.
    #[must_use]
    pub fn is_exceeded(&self) -> bool {
        self.is_full() || self.elapsed() >= self.max_elapsed
    }
}

/// Page URLs already fetched in one crawl, compared without fragments.
#[derive(Debug, Default)]
pub struct VisitedSet {
    urls: HashSet<String>,
}

impl VisitedSet {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks `url` as visited; false if it already was.
    pub fn insert(&mut self, url: &Url) -> bool {
        self.urls.insert(normalize(url))
    }

    /// True if `url` (ignoring its fragment) was visited.
    #[must_use]
    pub fn contains(&self, url: &Url) -> bool {
        self.urls.contains(&normalize(url))
    }

    /// Number of visited pages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.urls.len()
    }

    /// True if nothing was visited yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }
}

fn normalize(url: &Url) -> String {
    let mut url = url.clone();
    url.set_fragment(None);
    url.into()
}
