//! Typed events streamed by a download run.

use serde::Serialize;

use crate::error::ErrorKind;

/// Progress through a batch; emitted once at start and after each success.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Progress {
    /// Items fetched successfully so far.
    pub current: usize,
    /// Items in the batch.
    pub total: usize,
    /// `current / total * 100`, rounded, in `0..=100`.
    pub percentage: u8,
    /// Human-readable status line.
    pub message: String,
}

impl Progress {
    /// Builds a progress event, computing the rounded percentage.
    #[must_use]
    pub fn new(current: usize, total: usize, message: impl Into<String>) -> Self {
        Self {
            current,
            total,
            percentage: rounded_percentage(current, total),
            message: message.into(),
        }
    }
}

/// Terminal event of a batch whose items all settled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    /// Zip archive holding the fetched images and `manifest.json`.
    pub archive: Vec<u8>,
    /// Items that made it into the archive.
    pub succeeded_count: usize,
    /// Items submitted.
    pub total_count: usize,
    /// Items excluded after a per-item failure.
    pub failed_count: usize,
    /// Payload bytes accepted against the download budget.
    pub total_bytes: u64,
}

/// Terminal event of a batch rejected as a whole.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Failure {
    /// Classification of the error.
    pub error_kind: ErrorKind,
    /// Error description.
    pub message: String,
}

/// One event of a download run. Exactly one terminal event ends every run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadEvent {
    /// Intermediate progress.
    Progress(Progress),
    /// All items settled and the archive was built.
    Completed(Completion),
    /// The batch was rejected or the archive could not be built.
    Failed(Failure),
    /// The caller cancelled the run; no archive is produced.
    Cancelled {
        /// Items that had completed before cancellation (discarded).
        succeeded_count: usize,
        /// Items submitted.
        total_count: usize,
    },
}

impl DownloadEvent {
    /// True for `Completed`, `Failed`, and `Cancelled`.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Progress(_))
    }
}

/// How a download run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadOutcome {
    /// See [`DownloadEvent::Completed`].
    Completed(Completion),
    /// See [`DownloadEvent::Failed`].
    Failed(Failure),
    /// See [`DownloadEvent::Cancelled`].
    Cancelled {
        /// Items that had completed before cancellation (discarded).
        succeeded_count: usize,
        /// Items submitted.
        total_count: usize,
    },
}

impl DownloadOutcome {
    /// Converts a terminal event; `None` for progress events.
    #[must_use]
    pub fn from_event(event: DownloadEvent) -> Option<Self> {
        match event {
            DownloadEvent::Progress(_) => None,
            DownloadEvent::Completed(completion) => Some(Self::Completed(completion)),
            DownloadEvent::Failed(failure) => Some(Self::Failed(failure)),
            DownloadEvent::Cancelled {
                succeeded_count,
                total_count,
            } => Some(Self::Cancelled {
                succeeded_count,
                total_count,
            }),
        }
    }
}

fn rounded_percentage(current: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    let rounded = (current.min(total) * 100 + total / 2) / total;
    u8::try_from(rounded).unwrap_or(100)
}
