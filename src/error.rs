//! Error classification shared by the discovery and download pipelines.
//!
//! Each module keeps its own `thiserror` enum with context-rich variants;
//! [`ErrorKind`] is the coarse, stable label those errors map onto when they
//! are reported to a caller (for example as the `error_kind` of a failure event).

use std::fmt;

use serde::Serialize;

/// Stable classification of a pipeline error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Bad input shape, oversized batch, or a URL with an unsupported scheme.
    Validation,
    /// The host's exclusion policy disallows crawling the URL.
    PolicyBlocked,
    /// Timeout, non-2xx status, or network failure.
    Fetch,
    /// Wrong MIME type or oversized payload.
    ContentValidation,
    /// A per-invocation size, time, or count budget was hit.
    BudgetExceeded,
    /// The caller cancelled the run.
    Cancelled,
    /// The archive could not be assembled.
    Archive,
    /// A background task ended without reporting an outcome.
    Internal,
}

impl ErrorKind {
    /// Returns the stable string label for this kind.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::PolicyBlocked => "policy_blocked",
            Self::Fetch => "fetch",
            Self::ContentValidation => "content_validation",
            Self::BudgetExceeded => "budget_exceeded",
            Self::Cancelled => "cancelled",
            Self::Archive => "archive",
            Self::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
