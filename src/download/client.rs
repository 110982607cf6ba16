//! HTTP client wrapper shared by discovery and downloads.
//!
//! This module provides the `HttpClient` struct which issues GET requests with
//! per-request timeouts, maps failures into [`DownloadError`], and reads bodies
//! under a hard byte cap.

use std::time::Duration;

use futures_util::StreamExt;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE};
use reqwest::{Client, Response};
use tracing::{debug, instrument};
use url::Url;

use super::constants::{CONNECT_TIMEOUT, MAX_PAGE_BYTES};
use super::error::DownloadError;
use crate::user_agent;

/// HTTP client for page and image fetches.
///
/// Create once and clone freely; clones share one connection pool.
///
/// # Example
///
/// ```no_run
/// use std::time::Duration;
/// use harvester_core::download::HttpClient;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = HttpClient::new();
/// let page = client
///     .fetch_html("https://example.com/", Duration::from_secs(15))
///     .await?;
/// println!("{} bytes of HTML from {}", page.body.len(), page.url);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
}

/// An HTML page and the URL it was served from, after redirects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HtmlPage {
    /// Final URL; relative references on the page resolve against it.
    pub url: Url,
    /// Page text, lossily decoded as UTF-8.
    pub body: String,
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpClient {
    /// Creates a new HTTP client with the default connect timeout and the
    /// tool's identifying User-Agent.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client builder fails to build with the static
    /// configuration. This should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn new() -> Self {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .gzip(true)
            .user_agent(user_agent::default_user_agent())
            .build()
            .expect("failed to build HTTP client with static configuration");
        Self { client }
    }

    /// Issues a GET and fails on any non-2xx status.
    ///
    /// The timeout covers the whole exchange, including reading the body.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::Timeout`], [`DownloadError::Network`], or
    /// [`DownloadError::HttpStatus`].
    #[instrument(level = "debug", skip(self), fields(url = %url))]
    pub async fn get(&self, url: &str, timeout: Duration) -> Result<Response, DownloadError> {
        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| DownloadError::from_reqwest(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::http_status(url, status.as_u16()));
        }
        Ok(response)
    }

    /// Fetches an HTML page as text.
    ///
    /// A declared content type that is not HTML is rejected; a missing one is
    /// tolerated. Bodies over 10 MiB are rejected. Redirects are followed and
    /// the returned page carries the URL that actually served it.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`get`](Self::get), plus content-type and size errors.
    pub async fn fetch_html(&self, url: &str, timeout: Duration) -> Result<HtmlPage, DownloadError> {
        let response = self.get(url, timeout).await?;
        let final_url = response.url().clone();
        if final_url.as_str() != url {
            debug!(requested = url, served = %final_url, "page redirected");
        }

        if let Some(content_type) = content_type(&response)
            && !content_type.to_ascii_lowercase().contains("html")
        {
            return Err(DownloadError::unsupported_content_type(url, content_type));
        }

        let body = read_body_limited(response, url, MAX_PAGE_BYTES).await?;
        Ok(HtmlPage {
            url: final_url,
            body: String::from_utf8_lossy(&body).into_owned(),
        })
    }
}

/// Declared Content-Type, if present and readable.
pub(crate) fn content_type(response: &Response) -> Option<String> {
    response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Declared Content-Length header, if present and numeric.
pub(crate) fn declared_content_length(response: &Response) -> Option<u64> {
    response
        .headers()
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
}

/// Streams the body into memory, stopping as soon as it passes `limit` bytes.
///
/// The body is never truncated: an oversized body is an error.
pub(crate) async fn read_body_limited(
    response: Response,
    url: &str,
    limit: u64,
) -> Result<Vec<u8>, DownloadError> {
    let mut stream = response.bytes_stream();
    let mut body: Vec<u8> = Vec::new();

    while let Some(chunk_result) = stream.next().await {
        let chunk = chunk_result.map_err(|e| DownloadError::from_reqwest(url, e))?;
        let received = (body.len() + chunk.len()) as u64;
        if received > limit {
            debug!(url, received, limit, "body exceeded size cap");
            return Err(DownloadError::BodyTooLarge {
                url: url.to_string(),
                received,
                max: limit,
            });
        }
        body.extend_from_slice(&chunk);
    }

    Ok(body)
}
