//! Depth-bounded crawl from a seed page.

use std::collections::HashSet;
use std::time::Duration;

use tracing::{debug, info, instrument, warn};
use url::Url;

use super::budget::{CrawlBudget, VisitedSet};
use super::error::DiscoveryError;
use super::extract::{ImageRef, extract_page};
use crate::download::HttpClient;
use crate::download::constants::{PAGE_TIMEOUT, POLICY_TIMEOUT};
use crate::policy::{AllowAllPolicy, PolicyFetcher, RobotsPolicy};
use crate::resource::{ResourceDescriptor, is_http_scheme};

/// Maximum resources accepted in one crawl.
pub const DEFAULT_MAX_RESOURCES: usize = 500;

/// Wall-clock limit of one crawl.
pub const DEFAULT_MAX_ELAPSED: Duration = Duration::from_secs(60);

/// Links followed from the seed page.
pub const MAX_LINKS_PER_PAGE: usize = 10;

/// Crawl depth; the seed is depth 0. Fixed.
pub const MAX_DEPTH: usize = 1;

/// Tunable limits of a crawl.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrawlConfig {
    /// Stop accepting resources at this count.
    pub max_resources: usize,
    /// Stop expanding after this much wall-clock time.
    pub max_elapsed: Duration,
    /// Timeout for each page fetch.
    pub page_timeout: Duration,
    /// Timeout for each robots.txt fetch.
    pub policy_timeout: Duration,
    /// Links followed from the seed page.
    pub max_links_per_page: usize,
    /// Consult robots.txt before fetching pages.
    pub check_robots: bool,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            max_resources: DEFAULT_MAX_RESOURCES,
            max_elapsed: DEFAULT_MAX_ELAPSED,
            page_timeout: PAGE_TIMEOUT,
            policy_timeout: POLICY_TIMEOUT,
            max_links_per_page: MAX_LINKS_PER_PAGE,
            check_robots: true,
        }
    }
}

/// Result of one crawl.
///
/// `resources` holds everything accepted before the crawl ended, even when
/// `error` is set or the budget ran out.
#[derive(Debug, Default)]
pub struct DiscoveryReport {
    /// Accepted image descriptors, in discovery order.
    pub resources: Vec<ResourceDescriptor>,
    /// Why the crawl stopped early, if it did.
    pub error: Option<DiscoveryError>,
    /// Pages fetched successfully, seed included.
    pub pages_fetched: usize,
    /// True if the count or time budget cut the crawl short.
    pub budget_exhausted: bool,
}

impl DiscoveryReport {
    fn failed(error: DiscoveryError) -> Self {
        Self {
            error: Some(error),
            ..Self::default()
        }
    }

    /// True if the crawl ran without a run-level error.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Crawls a seed page and its same-host links for images.
///
/// # Example
///
/// ```no_run
/// use harvester_core::discovery::{CrawlConfig, DiscoveryEngine};
/// use harvester_core::download::HttpClient;
///
/// # async fn example() {
/// let engine = DiscoveryEngine::new(HttpClient::new(), CrawlConfig::default());
/// let report = engine.discover("example.com", "req-1").await;
/// println!("{} images", report.resources.len());
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct DiscoveryEngine {
    client: HttpClient,
    config: CrawlConfig,
}

impl DiscoveryEngine {
    /// Creates an engine.
    #[must_use]
    pub fn new(client: HttpClient, config: CrawlConfig) -> Self {
        Self { client, config }
    }

    /// Returns the crawl limits.
    #[must_use]
    pub fn config(&self) -> &CrawlConfig {
        &self.config
    }

    /// Crawls `seed` with a fresh robots policy (or none, if disabled).
    pub async fn discover(&self, seed: &str, request_id: &str) -> DiscoveryReport {
        if self.config.check_robots {
            let policy =
                RobotsPolicy::new(self.client.clone()).with_timeout(self.config.policy_timeout);
            let report = self.discover_with_policy(seed, request_id, &policy).await;
            debug!(origins = policy.cached_origins(), "robots.txt rules consulted");
            report
        } else {
            self.discover_with_policy(seed, request_id, &AllowAllPolicy)
                .await
        }
    }

    /// Crawls `seed`, consulting `policy` before every page fetch.
    #[instrument(skip(self, policy), fields(request_id = %request_id, seed = %seed))]
    pub async fn discover_with_policy(
        &self,
        seed: &str,
        request_id: &str,
        policy: &dyn PolicyFetcher,
    ) -> DiscoveryReport {
        let seed_url = match normalize_seed(seed) {
            Ok(url) => url,
            Err(e) => {
                warn!(error = %e, "rejecting seed");
                return DiscoveryReport::failed(e);
            }
        };

        if !policy.is_allowed(&seed_url).await {
            info!(url = %seed_url, "seed disallowed by policy");
            return DiscoveryReport::failed(DiscoveryError::PolicyBlocked {
                url: seed_url.to_string(),
            });
        }

        let mut crawl = Crawl::new(&self.config);
        crawl.visited.insert(&seed_url);

        let seed_page = match self
            .client
            .fetch_html(seed_url.as_str(), self.config.page_timeout)
            .await
        {
            Ok(page) => page,
            Err(source) => {
                warn!(url = %seed_url, error = %source, "seed page unreachable");
                return DiscoveryReport::failed(DiscoveryError::SeedUnreachable {
                    url: seed_url.to_string(),
                    source,
                });
            }
        };
        crawl.pages_fetched += 1;
        crawl.visited.insert(&seed_page.url);

        // Links are same-host relative to where the seed landed after redirects.
        let seed_host = seed_page.url.host_str().unwrap_or_default().to_string();
        let page = extract_page(&seed_page.body, &seed_page.url, Some(&seed_host));
        crawl.accept_images(page.images, &seed_page.url);

        let links: Vec<Url> = page
            .links
            .into_iter()
            .filter(|link| !crawl.visited.contains(link))
            .take(self.config.max_links_per_page)
            .collect();
        debug!(links = links.len(), "following links at depth {MAX_DEPTH}");

        for link in links {
            if crawl.budget.is_exceeded() {
                crawl.budget_exhausted = true;
                debug!(found = crawl.budget.found_count(), "crawl budget exceeded, stopping expansion");
                break;
            }
            if !crawl.visited.insert(&link) {
                continue;
            }
            if !policy.is_allowed(&link).await {
                debug!(url = %link, "link disallowed by policy");
                continue;
            }
            match self
                .client
                .fetch_html(link.as_str(), self.config.page_timeout)
                .await
            {
                Ok(served) => {
                    crawl.pages_fetched += 1;
                    if served.url != link && !crawl.visited.insert(&served.url) {
                        debug!(url = %link, served = %served.url, "redirected to a visited page");
                        continue;
                    }
                    let page = extract_page(&served.body, &served.url, None);
                    crawl.accept_images(page.images, &served.url);
                }
                Err(e) => {
                    warn!(url = %link, error = %e, "skipping linked page");
                }
            }
        }

        if crawl.budget.is_full() {
            crawl.budget_exhausted = true;
        }

        let report = crawl.into_report();
        info!(
            resources = report.resources.len(),
            pages = report.pages_fetched,
            budget_exhausted = report.budget_exhausted,
            "discovery complete"
        );
        report
    }
}

/// Mutable state of one crawl invocation.
struct Crawl {
    budget: CrawlBudget,
    visited: VisitedSet,
    found: HashSet<String>,
    resources: Vec<ResourceDescriptor>,
    pages_fetched: usize,
    budget_exhausted: bool,
}

impl Crawl {
    fn new(config: &CrawlConfig) -> Self {
        Self {
            budget: CrawlBudget::new(config.max_resources, config.max_elapsed),
            visited: VisitedSet::new(),
            found: HashSet::new(),
            resources: Vec::new(),
            pages_fetched: 0,
            budget_exhausted: false,
        }
    }

    fn accept_images(&mut self, images: Vec<ImageRef>, page_url: &Url) {
        for image in images {
            if self.budget.is_full() {
                self.budget_exhausted = true;
                return;
            }
            if !self.found.insert(image.url.to_string()) {
                continue;
            }
            match ResourceDescriptor::from_urls(&image.url, page_url, image.alt) {
                Ok(descriptor) => {
                    self.resources.push(descriptor);
                    self.budget.record_found();
                }
                Err(e) => debug!(url = %image.url, error = %e, "skipping image"),
            }
        }
    }

    fn into_report(self) -> DiscoveryReport {
        DiscoveryReport {
            resources: self.resources,
            error: None,
            pages_fetched: self.pages_fetched,
            budget_exhausted: self.budget_exhausted,
        }
    }
}

/// Turns user input into an absolute http(s) URL, defaulting to `https://`.
///
/// # Errors
///
/// Returns [`DiscoveryError::InvalidSeed`] for empty, unparsable, host-less,
/// or non-http(s) input.
pub fn normalize_seed(seed: &str) -> Result<Url, DiscoveryError> {
    let trimmed = seed.trim();
    if trimmed.is_empty() {
        return Err(DiscoveryError::invalid_seed(seed, "empty URL"));
    }
    let candidate = if has_scheme(trimmed) {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    };
    let url = Url::parse(&candidate).map_err(|e| DiscoveryError::invalid_seed(seed, e.to_string()))?;
    if !is_http_scheme(&url) {
        return Err(DiscoveryError::invalid_seed(
            seed,
            format!("unsupported scheme '{}'", url.scheme()),
        ));
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err(DiscoveryError::invalid_seed(seed, "missing host"));
    }
    Ok(url)
}

/// True if `input` starts with `scheme://`. A `://` later in the path or
/// query does not count.
fn has_scheme(input: &str) -> bool {
    let Some((scheme, _)) = input.split_once("://") else {
        return false;
    };
    let mut chars = scheme.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}
