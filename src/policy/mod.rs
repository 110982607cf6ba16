//! Crawl policy decisions for discovery.
//!
//! - [`PolicyFetcher`] - Async trait consulted before every page fetch
//! - [`RobotsPolicy`] - robots.txt based policy with a per-origin rule cache
//! - [`AllowAllPolicy`] - Permits everything (robots checking disabled)
//! - [`RobotsRules`] - Parsed robots.txt, usable on its own

mod robots;

pub use robots::{RobotsPolicy, RobotsRules, origin_for_robots};

use async_trait::async_trait;
use url::Url;

/// Decides whether a URL may be fetched.
///
/// # Object Safety
///
/// This trait uses `async_trait` so the discovery engine can take
/// `&dyn PolicyFetcher`.
#[async_trait]
pub trait PolicyFetcher: Send + Sync {
    /// Returns true if `url` may be fetched. Implementations fail open.
    async fn is_allowed(&self, url: &Url) -> bool;
}

/// A policy that allows every URL.
#[derive(Debug, Default, Clone, Copy)]
pub struct AllowAllPolicy;

#[async_trait]
impl PolicyFetcher for AllowAllPolicy {
    async fn is_allowed(&self, _url: &Url) -> bool {
        true
    }
}
