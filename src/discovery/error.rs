//! Error types for the discovery module.

use thiserror::Error;

use crate::download::DownloadError;
use crate::error::ErrorKind;

/// Errors that end a discovery run early.
///
/// Failures of individual linked pages are not errors of the run; they are
/// logged and skipped.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// The seed could not be turned into an absolute http(s) URL.
    #[error("invalid seed URL '{input}': {reason}")]
    InvalidSeed {
        /// The seed as given.
        input: String,
        /// Why it was rejected.
        reason: String,
    },

    /// The seed's robots policy disallows crawling it.
    #[error("policy blocked crawling {url}")]
    PolicyBlocked {
        /// The blocked seed URL.
        url: String,
    },

    /// The seed page could not be fetched.
    #[error("failed to fetch seed page {url}: {source}")]
    SeedUnreachable {
        /// The seed URL.
        url: String,
        /// What went wrong.
        #[source]
        source: DownloadError,
    },
}

impl DiscoveryError {
    /// Creates an invalid seed error.
    pub fn invalid_seed(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidSeed {
            input: input.into(),
            reason: reason.into(),
        }
    }

    /// Coarse classification used for reporting.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidSeed { .. } => ErrorKind::Validation,
            Self::PolicyBlocked { .. } => ErrorKind::PolicyBlocked,
            Self::SeedUnreachable { source, .. } => source.kind(),
        }
    }
}
