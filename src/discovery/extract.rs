//! HTML extraction of image references and same-host links.
//!
//! Everything here is synchronous: `scraper::Html` is not `Send`, so a page
//! is parsed and reduced to plain URLs before the crawler awaits again.

use std::collections::HashSet;
use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};
use tracing::trace;
use url::Url;

use crate::resource::is_http_scheme;

/// Images smaller than this on either declared axis are skipped.
pub const MIN_DIMENSION: u32 = 50;

/// Case-insensitive URL substrings that mark tracking images.
pub const TRACKING_KEYWORDS: &[&str] = &["tracking", "analytics", "beacon"];

#[allow(clippy::expect_used)]
static IMG_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("img[src]").expect("img selector is valid")); // Static selector, safe to panic

#[allow(clippy::expect_used)]
static LINK_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").expect("link selector is valid")); // Static selector, safe to panic

/// An `<img>` that passed the heuristic filters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRef {
    /// Absolute image URL.
    pub url: Url,
    /// Alt text as written in the tag.
    pub alt: Option<String>,
}

/// What one page yielded, in document order.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PageExtraction {
    /// Candidate images.
    pub images: Vec<ImageRef>,
    /// Followable same-host links, fragment stripped, without duplicates.
    pub links: Vec<Url>,
}

/// Extracts images from `html`, and links on `link_host` when it is given.
#[must_use]
pub fn extract_page(html: &str, page_url: &Url, link_host: Option<&str>) -> PageExtraction {
    let document = Html::parse_document(html);
    let images = document
        .select(&IMG_SELECTOR)
        .filter_map(|img| image_from_element(img, page_url))
        .collect();
    let links = link_host
        .map(|host| extract_links(&document, page_url, host))
        .unwrap_or_default();
    PageExtraction { images, links }
}

fn image_from_element(img: ElementRef<'_>, page_url: &Url) -> Option<ImageRef> {
    let element = img.value();
    let src = element.attr("src")?.trim();
    if src.is_empty() {
        return None;
    }
    let url = page_url.join(src).ok()?;
    if !is_http_scheme(&url) {
        trace!(src, "skipping non-http image source");
        return None;
    }

    if let (Some(width), Some(height)) = (
        element.attr("width").and_then(parse_dimension),
        element.attr("height").and_then(parse_dimension),
    ) && (width < MIN_DIMENSION || height < MIN_DIMENSION)
    {
        trace!(%url, width, height, "skipping small image");
        return None;
    }

    let alt = element.attr("alt").map(str::to_string);
    if alt
        .as_deref()
        .is_some_and(|alt| alt.to_ascii_lowercase().contains("pixel"))
    {
        trace!(%url, "skipping pixel image");
        return None;
    }
    if is_tracking_url(&url) {
        trace!(%url, "skipping tracking image");
        return None;
    }

    Some(ImageRef { url, alt })
}

fn extract_links(document: &Html, page_url: &Url, host: &str) -> Vec<Url> {
    let mut seen = HashSet::new();
    let mut links = Vec::new();
    for anchor in document.select(&LINK_SELECTOR) {
        let element = anchor.value();
        if element
            .attr("rel")
            .is_some_and(|rel| rel.split_ascii_whitespace().any(|t| t.eq_ignore_ascii_case("nofollow")))
        {
            continue;
        }
        let Some(href) = element.attr("href").map(str::trim) else {
            continue;
        };
        let Ok(mut url) = page_url.join(href) else {
            continue;
        };
        if !is_http_scheme(&url) || url.host_str() != Some(host) {
            continue;
        }
        url.set_fragment(None);
        if seen.insert(url.to_string()) {
            links.push(url);
        }
    }
    links
}

/// Reads a pixel dimension the way browsers read legacy attributes: leading
/// digits count, anything after them is ignored.
fn parse_dimension(value: &str) -> Option<u32> {
    let value = value.trim_start();
    let end = value
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(value.len());
    value[..end].parse().ok()
}

fn is_tracking_url(url: &Url) -> bool {
    let lowered = url.as_str().to_ascii_lowercase();
    TRACKING_KEYWORDS
        .iter()
        .any(|keyword| lowered.contains(keyword))
}
