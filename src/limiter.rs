//! Bounded admission for asynchronous tasks.
//!
//! [`ConcurrencyLimiter`] admits at most `capacity` tasks at a time from an
//! unbounded submission queue. Submissions are enqueued immediately and a
//! single dispatcher admits them strictly in submission order as permits free
//! up; completion order still depends on how long each task runs. Every
//! submitted task runs exactly once and its output is delivered back through
//! the [`Submission`] returned to the submitter.
//!
//! # Example
//!
//! ```no_run
//! use harvester_core::limiter::ConcurrencyLimiter;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let limiter = ConcurrencyLimiter::new(3)?;
//! let pending: Vec<_> = (0..10)
//!     .map(|i| limiter.submit(move || async move { i * 2 }))
//!     .collect::<Result<_, _>>()?;
//! for submission in pending {
//!     println!("{}", submission.await?);
//! }
//! # Ok(())
//! # }
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::task::{Context, Poll};

use tokio::sync::{OwnedSemaphorePermit, Semaphore, mpsc, oneshot};
use tracing::{debug, trace};

/// Minimum allowed capacity.
pub const MIN_CAPACITY: usize = 1;

/// Maximum allowed capacity.
pub const MAX_CAPACITY: usize = 64;

type BoxedJob = Box<dyn FnOnce(OwnedSemaphorePermit) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send>;

/// Errors from the concurrency limiter.
#[derive(Debug, thiserror::Error)]
pub enum LimiterError {
    /// Invalid capacity value provided.
    #[error("invalid limiter capacity {value}: must be between {MIN_CAPACITY} and {MAX_CAPACITY}")]
    InvalidCapacity {
        /// The invalid value that was provided.
        value: usize,
    },

    /// The dispatcher is gone, so the task could not be queued.
    #[error("limiter dispatcher stopped before the task was queued")]
    Closed,

    /// The task was admitted but never produced an output (it panicked or was aborted).
    #[error("limited task ended without producing a result")]
    TaskLost,
}

#[derive(Debug, Default)]
struct Counters {
    in_flight: AtomicUsize,
    waiting: AtomicUsize,
}

/// Bounded-admission primitive over a FIFO submission queue.
///
/// Cloning is cheap; clones share the same capacity, queue, and counters.
/// The dispatcher stops once every clone is dropped and the queue has drained,
/// so no submitted task is ever discarded.
#[derive(Clone)]
pub struct ConcurrencyLimiter {
    queue: mpsc::UnboundedSender<BoxedJob>,
    counters: Arc<Counters>,
    capacity: usize,
}

impl std::fmt::Debug for ConcurrencyLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConcurrencyLimiter")
            .field("capacity", &self.capacity)
            .field("in_flight", &self.in_flight())
            .field("waiting", &self.waiting())
            .finish()
    }
}

impl ConcurrencyLimiter {
    /// Creates a limiter admitting at most `capacity` concurrent tasks.
    ///
    /// # Errors
    ///
    /// Returns [`LimiterError::InvalidCapacity`] if `capacity` is outside
    /// `MIN_CAPACITY..=MAX_CAPACITY`.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime (the dispatcher is spawned here).
    pub fn new(capacity: usize) -> Result<Self, LimiterError> {
        if !(MIN_CAPACITY..=MAX_CAPACITY).contains(&capacity) {
            return Err(LimiterError::InvalidCapacity { value: capacity });
        }

        let (queue, jobs) = mpsc::unbounded_channel();
        let semaphore = Arc::new(Semaphore::new(capacity));
        tokio::spawn(dispatch(jobs, semaphore));
        debug!(capacity, "concurrency limiter started");

        Ok(Self {
            queue,
            counters: Arc::new(Counters::default()),
            capacity,
        })
    }

    /// Returns the configured capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of tasks currently running.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.counters.in_flight.load(Ordering::SeqCst)
    }

    /// Number of tasks queued but not yet admitted.
    #[must_use]
    pub fn waiting(&self) -> usize {
        self.counters.waiting.load(Ordering::SeqCst)
    }

    /// Enqueues `task` and returns a handle resolving to its output.
    ///
    /// The task is a zero-argument closure producing the future to run; it is
    /// not invoked until the task is admitted.
    ///
    /// # Errors
    ///
    /// Returns [`LimiterError::Closed`] if the dispatcher is no longer running.
    pub fn submit<F, Fut, T>(&self, task: F) -> Result<Submission<T>, LimiterError>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let counters = Arc::clone(&self.counters);

        let job: BoxedJob = Box::new(move |permit| {
            Box::pin(async move {
                let _permit = permit;
                let _slot = InFlightSlot::enter(&counters);
                let output = task().await;
                // Submitter may have stopped listening; the task still ran to completion.
                let _ = tx.send(output);
            })
        });

        self.counters.waiting.fetch_add(1, Ordering::SeqCst);
        if self.queue.send(job).is_err() {
            self.counters.waiting.fetch_sub(1, Ordering::SeqCst);
            return Err(LimiterError::Closed);
        }
        trace!(waiting = self.waiting(), "task queued");
        Ok(Submission { rx })
    }

    /// Submits `task` and waits for its output.
    ///
    /// # Errors
    ///
    /// Returns [`LimiterError::Closed`] if the task could not be queued and
    /// [`LimiterError::TaskLost`] if it panicked.
    pub async fn run<F, Fut, T>(&self, task: F) -> Result<T, LimiterError>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        self.submit(task)?.await
    }
}

/// Pending output of a submitted task.
#[derive(Debug)]
#[must_use = "a submission does nothing useful unless awaited"]
pub struct Submission<T> {
    rx: oneshot::Receiver<T>,
}

impl<T> Future for Submission<T> {
    type Output = Result<T, LimiterError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|result| result.map_err(|_| LimiterError::TaskLost))
    }
}

/// Tracks one running task; released on completion, failure, or panic.
struct InFlightSlot<'a> {
    counters: &'a Counters,
}

impl<'a> InFlightSlot<'a> {
    fn enter(counters: &'a Counters) -> Self {
        counters.waiting.fetch_sub(1, Ordering::SeqCst);
        counters.in_flight.fetch_add(1, Ordering::SeqCst);
        Self { counters }
    }
}

impl Drop for InFlightSlot<'_> {
    fn drop(&mut self) {
        self.counters.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Admits queued jobs in order, one permit each.
async fn dispatch(mut jobs: mpsc::UnboundedReceiver<BoxedJob>, semaphore: Arc<Semaphore>) {
    while let Some(job) = jobs.recv().await {
        let Ok(permit) = Arc::clone(&semaphore).acquire_owned().await else {
            break;
        };
        tokio::spawn(job(permit));
    }
    debug!("concurrency limiter dispatcher stopped");
}
