//! Bulk downloader: fetches a batch of image resources and archives them.
//!
//! This module provides [`BulkDownloader`], which fetches every resource of a
//! batch through a [`ConcurrencyLimiter`], validates each response on its own,
//! and streams [`DownloadEvent`]s back to the caller through a [`DownloadRun`].
//!
//! # Overview
//!
//! - Every run gets its own limiter, byte budget, and cancellation token
//! - Per-item failures are logged and excluded; they never abort siblings
//! - Progress is reported in completion order
//! - Succeeded items are archived in batch order once every item has settled
//!
//! # Example
//!
//! ```no_run
//! use harvester_core::download::{BulkDownloader, DownloadLimits, DownloadOutcome, HttpClient};
//! use harvester_core::ResourceDescriptor;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let downloader = BulkDownloader::new(HttpClient::new(), DownloadLimits::default())?;
//! let resources = vec![ResourceDescriptor::new(
//!     "https://example.com/a.png",
//!     "https://example.com/",
//!     None,
//! )?];
//! let run = downloader.download(resources, "req-1");
//! if let DownloadOutcome::Completed(done) = run.finish().await {
//!     std::fs::write("images.zip", &done.archive)?;
//! }
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use futures_util::stream::FuturesUnordered;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, info_span, instrument, warn};
use url::Url;

use super::budget::DownloadBudget;
use super::client::{content_type, declared_content_length, read_body_limited};
use super::constants::{
    DEFAULT_CONCURRENCY, FETCH_TIMEOUT, IMAGE_MIME_MARKERS, MAX_BATCH_ITEMS, MAX_FILE_BYTES,
    MAX_TOTAL_BYTES,
};
use super::events::{Completion, DownloadEvent, DownloadOutcome, Failure, Progress};
use super::filename::generate_filename;
use super::item::FetchedItem;
use super::{DownloadError, HttpClient};
use crate::archive::ArchiveBuilder;
use crate::error::ErrorKind;
use crate::limiter::{ConcurrencyLimiter, LimiterError, MAX_CAPACITY, MIN_CAPACITY};
use crate::resource::{ResourceDescriptor, is_http_scheme};

/// Buffered events per run; a full batch plus its start and terminal events fit.
const EVENT_BUFFER: usize = 128;

/// Error type for bulk downloader construction.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Invalid concurrency value provided.
    #[error(
        "invalid concurrency value {value}: must be between {MIN_CAPACITY} and {MAX_CAPACITY}"
    )]
    InvalidConcurrency {
        /// The invalid value that was provided.
        value: usize,
    },

    /// A size, count, or time limit is zero or above its hard ceiling.
    #[error("invalid {name}: {reason}")]
    InvalidLimit {
        /// Name of the offending limit.
        name: &'static str,
        /// Why it was rejected.
        reason: String,
    },
}

/// Limits applied to one download run.
///
/// The defaults are the contractual limits: 100 items, 3 concurrent fetches,
/// 50 MiB per file, 500 MiB per batch, and 30 seconds per fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownloadLimits {
    /// Largest accepted batch.
    pub max_items: usize,
    /// Fetches in flight at once.
    pub concurrency: usize,
    /// Per-file size cap in bytes.
    pub max_file_bytes: u64,
    /// Aggregate size cap in bytes.
    pub max_total_bytes: u64,
    /// Timeout for one fetch, body included.
    pub fetch_timeout: Duration,
}

impl Default for DownloadLimits {
    fn default() -> Self {
        Self {
            max_items: MAX_BATCH_ITEMS,
            concurrency: DEFAULT_CONCURRENCY,
            max_file_bytes: MAX_FILE_BYTES,
            max_total_bytes: MAX_TOTAL_BYTES,
            fetch_timeout: FETCH_TIMEOUT,
        }
    }
}

impl DownloadLimits {
    /// Checks every limit against its valid range.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] naming the first invalid limit.
    pub fn validate(&self) -> Result<(), EngineError> {
        if !(MIN_CAPACITY..=MAX_CAPACITY).contains(&self.concurrency) {
            return Err(EngineError::InvalidConcurrency {
                value: self.concurrency,
            });
        }
        if !(1..=MAX_BATCH_ITEMS).contains(&self.max_items) {
            return Err(EngineError::InvalidLimit {
                name: "max_items",
                reason: format!("{} is outside 1..={MAX_BATCH_ITEMS}", self.max_items),
            });
        }
        if self.max_file_bytes == 0 {
            return Err(zero_limit("max_file_bytes"));
        }
        if self.max_total_bytes == 0 {
            return Err(zero_limit("max_total_bytes"));
        }
        if self.fetch_timeout.is_zero() {
            return Err(zero_limit("fetch_timeout"));
        }
        Ok(())
    }
}

fn zero_limit(name: &'static str) -> EngineError {
    EngineError::InvalidLimit {
        name,
        reason: "must be greater than zero".to_string(),
    }
}

/// Fetches batches of image resources into a single archive.
///
/// The downloader itself is stateless between runs: every call to
/// [`download`](Self::download) builds its own limiter, budget, and
/// cancellation token, so concurrent runs never share quota.
#[derive(Debug, Clone)]
pub struct BulkDownloader {
    client: HttpClient,
    limits: DownloadLimits,
}

impl BulkDownloader {
    /// Creates a downloader with the given limits.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] if any limit is out of range.
    ///
    /// # Example
    ///
    /// ```
    /// use harvester_core::download::{BulkDownloader, DownloadLimits, HttpClient};
    ///
    /// let downloader = BulkDownloader::new(HttpClient::new(), DownloadLimits::default()).unwrap();
    /// assert_eq!(downloader.limits().concurrency, 3);
    /// ```
    #[instrument(level = "debug", skip(client))]
    pub fn new(client: HttpClient, limits: DownloadLimits) -> Result<Self, EngineError> {
        limits.validate()?;
        debug!(
            concurrency = limits.concurrency,
            max_items = limits.max_items,
            max_file_bytes = limits.max_file_bytes,
            max_total_bytes = limits.max_total_bytes,
            "creating bulk downloader"
        );
        Ok(Self { client, limits })
    }

    /// Returns the configured limits.
    #[must_use]
    pub fn limits(&self) -> &DownloadLimits {
        &self.limits
    }

    /// Starts downloading `resources` in the background.
    ///
    /// The returned [`DownloadRun`] yields progress events followed by exactly
    /// one terminal event. Batch-level validation failures (empty batch, too
    /// many items) are reported as a terminal `Failed` event, not as an error
    /// here.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn download(&self, resources: Vec<ResourceDescriptor>, request_id: &str) -> DownloadRun {
        let (events, receiver) = mpsc::channel(EVENT_BUFFER);
        let cancel = CancellationToken::new();
        let span = info_span!("download_run", request_id = %request_id, items = resources.len());

        let batch = Batch {
            client: self.client.clone(),
            limits: self.limits,
            cancel: cancel.clone(),
            events,
        };
        tokio::spawn(batch.run(resources).instrument(span));

        DownloadRun {
            events: receiver,
            cancel,
            finished: false,
        }
    }
}

/// Handle on one in-progress download run.
///
/// Dropping the run before its terminal event cancels it.
#[derive(Debug)]
pub struct DownloadRun {
    events: mpsc::Receiver<DownloadEvent>,
    cancel: CancellationToken,
    finished: bool,
}

impl DownloadRun {
    /// Waits for the next event; `None` once the terminal event was delivered.
    ///
    /// If the background task stops without a terminal event, a synthetic
    /// `Failed` event with kind `internal` is returned instead.
    pub async fn next_event(&mut self) -> Option<DownloadEvent> {
        if self.finished {
            return None;
        }
        let event = self.events.recv().await.unwrap_or_else(|| {
            DownloadEvent::Failed(Failure {
                error_kind: ErrorKind::Internal,
                message: "download run stopped without reporting an outcome".to_string(),
            })
        });
        if event.is_terminal() {
            self.finished = true;
        }
        Some(event)
    }

    /// Returns a cloneable handle that cancels this run.
    #[must_use]
    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            token: self.cancel.clone(),
        }
    }

    /// Cancels the run. In-flight fetches are aborted and no archive is built.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Drains the run and returns how it ended.
    pub async fn finish(self) -> DownloadOutcome {
        self.finish_with(|_| {}).await
    }

    /// Drains the run, passing each progress event to `on_progress`.
    pub async fn finish_with<F>(mut self, mut on_progress: F) -> DownloadOutcome
    where
        F: FnMut(&Progress),
    {
        while let Some(event) = self.next_event().await {
            match event {
                DownloadEvent::Progress(progress) => on_progress(&progress),
                terminal => {
                    if let Some(outcome) = DownloadOutcome::from_event(terminal) {
                        return outcome;
                    }
                }
            }
        }
        DownloadOutcome::Failed(Failure {
            error_kind: ErrorKind::Internal,
            message: "download run already finished".to_string(),
        })
    }
}

impl Drop for DownloadRun {
    fn drop(&mut self) {
        if !self.finished {
            self.cancel.cancel();
        }
    }
}

/// Cancels a [`DownloadRun`] from anywhere, e.g. a Ctrl-C handler.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    token: CancellationToken,
}

impl CancelHandle {
    /// Requests cancellation of the run.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// True once cancellation was requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// Checks the batch shape before any network call.
fn validate_batch(count: usize, max_items: usize) -> Result<(), DownloadError> {
    if count == 0 {
        return Err(DownloadError::EmptyBatch);
    }
    if count > max_items {
        return Err(DownloadError::BatchTooLarge {
            count,
            max: max_items,
        });
    }
    Ok(())
}

/// State owned by the background task of one run.
struct Batch {
    client: HttpClient,
    limits: DownloadLimits,
    cancel: CancellationToken,
    events: mpsc::Sender<DownloadEvent>,
}

impl Batch {
    async fn emit(&self, event: DownloadEvent) {
        // The caller may have dropped the run; nothing left to report to.
        let _ = self.events.send(event).await;
    }

    async fn fail(&self, error_kind: ErrorKind, message: String) {
        warn!(%error_kind, %message, "download run failed");
        self.emit(DownloadEvent::Failed(Failure {
            error_kind,
            message,
        }))
        .await;
    }

    async fn run(self, resources: Vec<ResourceDescriptor>) {
        let total = resources.len();
        if let Err(e) = validate_batch(total, self.limits.max_items) {
            self.fail(e.kind(), e.to_string()).await;
            return;
        }

        let limiter = match ConcurrencyLimiter::new(self.limits.concurrency) {
            Ok(limiter) => limiter,
            Err(e) => {
                self.fail(ErrorKind::Internal, e.to_string()).await;
                return;
            }
        };
        let budget = Arc::new(DownloadBudget::new(self.limits.max_total_bytes));

        info!(total, concurrency = self.limits.concurrency, "starting download run");
        self.emit(DownloadEvent::Progress(Progress::new(
            0,
            total,
            format!("Downloading {total} images"),
        )))
        .await;

        let mut pending = FuturesUnordered::new();
        let mut failed = 0usize;
        for (index, resource) in resources.into_iter().enumerate() {
            let url = resource.url().to_string();
            let job = FetchJob {
                client: self.client.clone(),
                limits: self.limits,
                budget: Arc::clone(&budget),
                cancel: self.cancel.clone(),
                resource,
                sequence: index + 1,
            };
            match limiter.submit(move || job.run()) {
                Ok(submission) => pending.push(async move { (index, url, submission.await) }),
                Err(e) => {
                    warn!(url = %url, error = %e, "could not queue fetch");
                    failed += 1;
                }
            }
        }

        let mut succeeded: Vec<(usize, FetchedItem)> = Vec::with_capacity(total);
        loop {
            tokio::select! {
                biased;
                () = self.cancel.cancelled() => {
                    info!(succeeded = succeeded.len(), total, "download run cancelled");
                    self.emit(DownloadEvent::Cancelled {
                        succeeded_count: succeeded.len(),
                        total_count: total,
                    })
                    .await;
                    return;
                }
                next = pending.next() => {
                    let Some((index, url, result)) = next else {
                        break;
                    };
                    match flatten(result) {
                        Ok(item) => {
                            debug!(url = %url, filename = item.filename(), bytes = item.len(), "fetch succeeded");
                            succeeded.push((index, item));
                            let current = succeeded.len();
                            self.emit(DownloadEvent::Progress(Progress::new(
                                current,
                                total,
                                format!("Downloaded {current} of {total}"),
                            )))
                            .await;
                        }
                        Err(e) => {
                            warn!(url = %url, error = %e, kind = %e.kind(), "fetch failed, excluding item");
                            failed += 1;
                        }
                    }
                }
            }
        }

        succeeded.sort_by_key(|(index, _)| *index);
        let items: Vec<FetchedItem> = succeeded.into_iter().map(|(_, item)| item).collect();
        let succeeded_count = items.len();
        let total_bytes = budget.total_bytes();

        let built = tokio::task::spawn_blocking(move || ArchiveBuilder::now().build(&items)).await;
        match built {
            Ok(Ok(archive)) => {
                info!(
                    succeeded = succeeded_count,
                    failed,
                    total,
                    total_bytes,
                    archive_bytes = archive.len(),
                    "download run complete"
                );
                self.emit(DownloadEvent::Completed(Completion {
                    archive,
                    succeeded_count,
                    total_count: total,
                    failed_count: failed,
                    total_bytes,
                }))
                .await;
            }
            Ok(Err(e)) => {
                let error = DownloadError::from(e);
                self.fail(error.kind(), error.to_string()).await;
            }
            Err(e) => {
                self.fail(ErrorKind::Internal, format!("archive task failed: {e}"))
                    .await;
            }
        }
    }
}

/// Collapses a limiter failure into the per-item error type.
fn flatten(
    result: Result<Result<FetchedItem, DownloadError>, LimiterError>,
) -> Result<FetchedItem, LimiterOrDownload> {
    match result {
        Ok(Ok(item)) => Ok(item),
        Ok(Err(e)) => Err(LimiterOrDownload::Download(e)),
        Err(e) => Err(LimiterOrDownload::Limiter(e)),
    }
}

/// Per-item failure as seen by the collector.
#[derive(Debug, thiserror::Error)]
enum LimiterOrDownload {
    #[error(transparent)]
    Download(DownloadError),
    #[error(transparent)]
    Limiter(LimiterError),
}

impl LimiterOrDownload {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::Download(e) => e.kind(),
            Self::Limiter(_) => ErrorKind::Internal,
        }
    }
}

/// Everything one fetch needs, moved into its limited task.
struct FetchJob {
    client: HttpClient,
    limits: DownloadLimits,
    budget: Arc<DownloadBudget>,
    cancel: CancellationToken,
    resource: ResourceDescriptor,
    sequence: usize,
}

impl FetchJob {
    async fn run(self) -> Result<FetchedItem, DownloadError> {
        if self.cancel.is_cancelled() {
            return Err(DownloadError::cancelled(self.resource.url()));
        }
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(DownloadError::cancelled(self.resource.url())),
            result = self.fetch() => result,
        }
    }

    #[instrument(level = "debug", skip(self), fields(url = %self.resource.url(), sequence = self.sequence))]
    async fn fetch(&self) -> Result<FetchedItem, DownloadError> {
        let url = self.resource.url();
        let parsed = Url::parse(url).map_err(|_| DownloadError::invalid_url(url))?;
        if !is_http_scheme(&parsed) {
            return Err(DownloadError::UnsupportedScheme {
                url: url.to_string(),
                scheme: parsed.scheme().to_string(),
            });
        }

        if self.budget.is_exhausted() {
            return Err(DownloadError::BudgetExceeded {
                url: url.to_string(),
                used: self.budget.total_bytes(),
                max: self.budget.max_total_bytes(),
            });
        }

        let response = self.client.get(url, self.limits.fetch_timeout).await?;

        let Some(content_type) = content_type(&response) else {
            return Err(DownloadError::MissingContentType {
                url: url.to_string(),
            });
        };
        if !is_image_content_type(&content_type) {
            return Err(DownloadError::unsupported_content_type(url, content_type));
        }

        if let Some(declared) = declared_content_length(&response)
            && declared > self.limits.max_file_bytes
        {
            return Err(DownloadError::DeclaredTooLarge {
                url: url.to_string(),
                declared,
                max: self.limits.max_file_bytes,
            });
        }

        let bytes = read_body_limited(response, url, self.limits.max_file_bytes).await?;
        let len = bytes.len() as u64;
        let used = self
            .budget
            .try_reserve(len)
            .map_err(|overflow| DownloadError::BudgetExceeded {
                url: url.to_string(),
                used: overflow.used,
                max: overflow.max,
            })?;
        debug!(bytes = len, budget_used = used, "accepted payload");

        let filename = generate_filename(url, Some(&content_type), self.sequence);
        Ok(FetchedItem::new(
            &filename,
            bytes,
            url.to_string(),
            self.resource.source_url().to_string(),
            self.resource.alt_text().map(str::to_string),
        ))
    }
}

/// True if the declared type names one of the accepted image formats.
fn is_image_content_type(content_type: &str) -> bool {
    let lowered = content_type.to_ascii_lowercase();
    IMAGE_MIME_MARKERS
        .iter()
        .any(|marker| lowered.contains(marker))
}
