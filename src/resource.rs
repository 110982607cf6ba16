//! Discovered image references.
//!
//! A [`ResourceDescriptor`] is produced by the discovery engine and consumed by
//! the bulk downloader. Its `url` is always an absolute HTTP/HTTPS URI; both the
//! constructors and deserialization enforce this, so a descriptor read back from
//! JSON carries the same guarantee as one built by a crawl.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

/// Errors raised when a descriptor would violate its URL invariants.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DescriptorError {
    /// The value is not an absolute URL.
    #[error("not an absolute URL: {url}")]
    InvalidUrl {
        /// The rejected value.
        url: String,
    },

    /// The resource URL uses a scheme other than http/https.
    #[error("unsupported scheme '{scheme}' in {url}")]
    UnsupportedScheme {
        /// The rejected URL.
        url: String,
        /// Its scheme.
        scheme: String,
    },
}

/// A candidate image reference found on a page, not yet fetched.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawDescriptor", rename_all = "camelCase")]
pub struct ResourceDescriptor {
    url: String,
    source_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    alt_text: Option<String>,
}

impl ResourceDescriptor {
    /// Builds a descriptor from string URLs.
    ///
    /// # Errors
    ///
    /// Returns [`DescriptorError`] if either URL is not absolute or the
    /// resource URL is not http/https.
    pub fn new(
        url: &str,
        source_url: &str,
        alt_text: Option<String>,
    ) -> Result<Self, DescriptorError> {
        let url = parse_absolute(url)?;
        let source_url = parse_absolute(source_url)?;
        Self::from_urls(&url, &source_url, alt_text)
    }

    /// Builds a descriptor from already-resolved URLs.
    ///
    /// # Errors
    ///
    /// Returns [`DescriptorError::UnsupportedScheme`] if `url` is not http/https.
    pub fn from_urls(
        url: &Url,
        source_url: &Url,
        alt_text: Option<String>,
    ) -> Result<Self, DescriptorError> {
        if !is_http_scheme(url) {
            return Err(DescriptorError::UnsupportedScheme {
                url: url.to_string(),
                scheme: url.scheme().to_string(),
            });
        }
        let alt_text = alt_text
            .map(|alt| alt.trim().to_string())
            .filter(|alt| !alt.is_empty());
        Ok(Self {
            url: url.to_string(),
            source_url: source_url.to_string(),
            alt_text,
        })
    }

    /// Absolute URL of the image.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Absolute URL of the page the image was found on.
    #[must_use]
    pub fn source_url(&self) -> &str {
        &self.source_url
    }

    /// Alt text from the image tag, if any.
    #[must_use]
    pub fn alt_text(&self) -> Option<&str> {
        self.alt_text.as_deref()
    }
}

/// Returns true for `http` and `https` URLs.
#[must_use]
pub fn is_http_scheme(url: &Url) -> bool {
    matches!(url.scheme(), "http" | "https")
}

fn parse_absolute(value: &str) -> Result<Url, DescriptorError> {
    Url::parse(value.trim()).map_err(|_| DescriptorError::InvalidUrl {
        url: value.to_string(),
    })
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawDescriptor {
    url: String,
    source_url: String,
    #[serde(default)]
    alt_text: Option<String>,
}

impl TryFrom<RawDescriptor> for ResourceDescriptor {
    type Error = DescriptorError;

    fn try_from(raw: RawDescriptor) -> Result<Self, Self::Error> {
        Self::new(&raw.url, &raw.source_url, raw.alt_text)
    }
}
