//! Submission gate: at most one provider submission in flight.
//!
//! Backed by `tokio::sync::Mutex`, which hands the lock to waiters in the
//! order they called `lock()`. The guard is dropped on every exit path of
//! the body, including errors and cancellation of the calling future.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::Mutex;
use tracing::debug;

/// FIFO mutual-exclusion gate around a single downstream resource.
#[derive(Debug, Default)]
pub struct SubmissionGate {
    lock: Mutex<()>,
    tickets: AtomicU64,
}

impl SubmissionGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `body` while holding the gate. Callers are served in call order.
    pub async fn with_exclusive_access<F, Fut, T>(&self, body: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let ticket = self.tickets.fetch_add(1, Ordering::Relaxed);
        debug!(ticket, "Waiting for submission gate");
        let _guard = self.lock.lock().await;
        debug!(ticket, "Submission gate acquired");
        body().await
    }

    /// Number of acquisitions requested so far.
    #[cfg(test)]
    pub(crate) fn tickets_issued(&self) -> u64 {
        self.tickets.load(Ordering::Relaxed)
    }
}
