//! Error types for the download module.
//!
//! Every per-item failure of a batch is one of these variants. They are
//! logged and excluded from the batch result; only the structural variants
//! (`EmptyBatch`, `BatchTooLarge`) and archive failures end a run.

use thiserror::Error;

use crate::archive::ArchiveError;
use crate::error::ErrorKind;

/// Errors that can occur while fetching and validating resources.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// The batch contained no resources.
    #[error("no resources to download")]
    EmptyBatch,

    /// The batch exceeds the per-batch item limit.
    #[error("batch of {count} resources exceeds the limit of {max}")]
    BatchTooLarge {
        /// Number of resources submitted.
        count: usize,
        /// Configured maximum.
        max: usize,
    },

    /// The provided URL is malformed or invalid.
    #[error("invalid URL: {url}")]
    InvalidUrl {
        /// The invalid URL string.
        url: String,
    },

    /// The URL parsed but its scheme is not http/https.
    #[error("unsupported scheme '{scheme}' in {url}")]
    UnsupportedScheme {
        /// The rejected URL.
        url: String,
        /// Its scheme.
        scheme: String,
    },

    /// Network-level error (DNS resolution, connection refused, TLS errors, etc.)
    #[error("network error fetching {url}: {source}")]
    Network {
        /// The URL that failed.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// Request timed out before the body was fully received.
    #[error("timeout fetching {url}")]
    Timeout {
        /// The URL that timed out.
        url: String,
    },

    /// Non-2xx response.
    #[error("HTTP {status} fetching {url}")]
    HttpStatus {
        /// The URL that returned an error status.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// Response carried no Content-Type header.
    #[error("missing content type for {url}")]
    MissingContentType {
        /// The offending URL.
        url: String,
    },

    /// Content-Type outside the accepted set.
    #[error("unsupported content type '{content_type}' for {url}")]
    UnsupportedContentType {
        /// The offending URL.
        url: String,
        /// The declared content type.
        content_type: String,
    },

    /// Declared Content-Length is over the per-file cap; the body was not read.
    #[error("{url} declares {declared} bytes, over the {max} byte limit")]
    DeclaredTooLarge {
        /// The offending URL.
        url: String,
        /// Declared size in bytes.
        declared: u64,
        /// Per-file cap.
        max: u64,
    },

    /// The received body grew past the per-file cap.
    #[error("{url} sent at least {received} bytes, over the {max} byte limit")]
    BodyTooLarge {
        /// The offending URL.
        url: String,
        /// Bytes received when the fetch was stopped.
        received: u64,
        /// Per-file cap.
        max: u64,
    },

    /// Accepting this resource would push the batch past its aggregate cap.
    #[error("download budget exhausted at {used} of {max} bytes, skipping {url}")]
    BudgetExceeded {
        /// The skipped URL.
        url: String,
        /// Bytes already accepted.
        used: u64,
        /// Aggregate cap.
        max: u64,
    },

    /// The run was cancelled while this fetch was pending or in flight.
    #[error("fetch of {url} cancelled")]
    Cancelled {
        /// The URL whose fetch was abandoned.
        url: String,
    },

    /// Building the archive failed.
    #[error("failed to build archive: {0}")]
    Archive(#[from] ArchiveError),
}

impl DownloadError {
    /// Creates a network or timeout error from a reqwest error.
    pub fn from_reqwest(url: impl Into<String>, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            Self::timeout(url)
        } else {
            Self::Network {
                url: url.into(),
                source,
            }
        }
    }

    /// Creates an HTTP status error.
    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
        }
    }

    /// Creates a timeout error.
    pub fn timeout(url: impl Into<String>) -> Self {
        Self::Timeout { url: url.into() }
    }

    /// Creates an invalid URL error.
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }

    /// Creates an unsupported content type error.
    pub fn unsupported_content_type(
        url: impl Into<String>,
        content_type: impl Into<String>,
    ) -> Self {
        Self::UnsupportedContentType {
            url: url.into(),
            content_type: content_type.into(),
        }
    }

    /// Creates a cancellation error.
    pub fn cancelled(url: impl Into<String>) -> Self {
        Self::Cancelled { url: url.into() }
    }

    /// Coarse classification used for reporting.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::EmptyBatch
            | Self::BatchTooLarge { .. }
            | Self::InvalidUrl { .. }
            | Self::UnsupportedScheme { .. } => ErrorKind::Validation,
            Self::Network { .. } | Self::Timeout { .. } | Self::HttpStatus { .. } => {
                ErrorKind::Fetch
            }
            Self::MissingContentType { .. }
            | Self::UnsupportedContentType { .. }
            | Self::DeclaredTooLarge { .. }
            | Self::BodyTooLarge { .. } => ErrorKind::ContentValidation,
            Self::BudgetExceeded { .. } => ErrorKind::BudgetExceeded,
            Self::Cancelled { .. } => ErrorKind::Cancelled,
            Self::Archive(_) => ErrorKind::Archive,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_status_display() {
        let error = DownloadError::http_status("https://example.com/a.png", 404);
        let msg = error.to_string();
        assert!(msg.contains("404"), "Expected '404' in: {msg}");
        assert!(msg.contains("https://example.com/a.png"), "Expected URL in: {msg}");
        assert_eq!(error.kind(), ErrorKind::Fetch);
    }

    #[test]
    fn test_timeout_is_fetch_kind() {
        let error = DownloadError::timeout("https://example.com/a.png");
        assert!(error.to_string().contains("timeout"));
        assert_eq!(error.kind(), ErrorKind::Fetch);
    }

    #[test]
    fn test_structural_errors_are_validation_kind() {
        assert_eq!(DownloadError::EmptyBatch.kind(), ErrorKind::Validation);
        let too_large = DownloadError::BatchTooLarge { count: 101, max: 100 };
        assert_eq!(too_large.kind(), ErrorKind::Validation);
        assert!(too_large.to_string().contains("101"));
        assert_eq!(
            DownloadError::invalid_url("nope").kind(),
            ErrorKind::Validation
        );
    }

    #[test]
    fn test_size_errors_are_content_validation_kind() {
        let declared = DownloadError::DeclaredTooLarge {
            url: "https://example.com/big.png".to_string(),
            declared: 60,
            max: 50,
        };
        assert_eq!(declared.kind(), ErrorKind::ContentValidation);
        let body = DownloadError::BodyTooLarge {
            url: "https://example.com/big.png".to_string(),
            received: 60,
            max: 50,
        };
        assert_eq!(body.kind(), ErrorKind::ContentValidation);
        assert_eq!(
            DownloadError::unsupported_content_type("https://example.com/", "text/html").kind(),
            ErrorKind::ContentValidation
        );
    }

    #[test]
    fn test_budget_and_cancel_kinds() {
        let budget = DownloadError::BudgetExceeded {
            url: "https://example.com/a.png".to_string(),
            used: 10,
            max: 10,
        };
        assert_eq!(budget.kind(), ErrorKind::BudgetExceeded);
        assert_eq!(
            DownloadError::cancelled("https://example.com/a.png").kind(),
            ErrorKind::Cancelled
        );
    }
}
