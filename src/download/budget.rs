//! Aggregate byte budget for one download run.

use std::sync::atomic::{AtomicU64, Ordering};

/// Running byte total for one batch, capped at `max_total_bytes`.
///
/// Reservations use compare-and-swap, so concurrent fetches can never push the
/// total past the cap: a reservation that would overflow is refused and the
/// total is left untouched.
#[derive(Debug)]
pub struct DownloadBudget {
    max_total_bytes: u64,
    total_bytes: AtomicU64,
}

/// A reservation was refused because it would overflow the budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BudgetOverflow {
    /// Bytes already accepted when the reservation was refused.
    pub used: u64,
    /// The budget's cap.
    pub max: u64,
}

impl DownloadBudget {
    /// Creates an empty budget.
    #[must_use]
    pub fn new(max_total_bytes: u64) -> Self {
        Self {
            max_total_bytes,
            total_bytes: AtomicU64::new(0),
        }
    }

    /// The aggregate cap.
    #[must_use]
    pub fn max_total_bytes(&self) -> u64 {
        self.max_total_bytes
    }

    /// Bytes accepted so far.
    #[must_use]
    pub fn total_bytes(&self) -> u64 {
        self.total_bytes.load(Ordering::SeqCst)
    }

    /// True once nothing more can be accepted.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.total_bytes() >= self.max_total_bytes
    }

    /// Adds `bytes` to the total if it fits, returning the new total.
    ///
    /// # Errors
    ///
    /// Returns [`BudgetOverflow`] if the total would exceed the cap.
    pub fn try_reserve(&self, bytes: u64) -> Result<u64, BudgetOverflow> {
        let max = self.max_total_bytes;
        self.total_bytes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |used| {
                used.checked_add(bytes).filter(|next| *next <= max)
            })
            .map(|previous| previous + bytes)
            .map_err(|used| BudgetOverflow { used, max })
    }
}
