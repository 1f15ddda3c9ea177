//! Task poller: drives a submitted song task to a terminal state.
//!
//! Fixed-interval polling with an overall deadline. Time is read from
//! `tokio::time`, so tests can run under a paused clock.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info};

use super::{AudioProvider, SongTask};
use crate::error::{Error, JobError};

/// Polling cadence and deadline.
#[derive(Debug, Clone, Copy)]
pub struct PollOptions {
    /// Delay between status queries.
    pub interval: Duration,
    /// Give up once this much time has passed without a terminal status.
    pub max_wait: Duration,
}

impl Default for PollOptions {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(7),
            max_wait: Duration::from_secs(10 * 60),
        }
    }
}

/// Polls an `AudioProvider` until a task finishes.
pub struct TaskPoller {
    provider: Arc<dyn AudioProvider>,
    options: PollOptions,
}

impl TaskPoller {
    pub fn new(provider: Arc<dyn AudioProvider>, options: PollOptions) -> Self {
        Self { provider, options }
    }

    pub fn options(&self) -> PollOptions {
        self.options
    }

    /// Poll `task_id` until it succeeds, fails, or the deadline passes.
    ///
    /// `on_progress` is awaited with every non-terminal snapshot before the
    /// next sleep.
    pub async fn poll<F, Fut>(&self, task_id: &str, mut on_progress: F) -> Result<SongTask, Error>
    where
        F: FnMut(SongTask) -> Fut,
        Fut: Future<Output = ()>,
    {
        let started = Instant::now();
        let mut ticks: u32 = 0;

        loop {
            let waited = started.elapsed();
            if waited >= self.options.max_wait {
                return Err(JobError::Timeout {
                    task_id: task_id.to_string(),
                    waited,
                }
                .into());
            }

            let task = self.provider.query(task_id).await?;
            ticks += 1;

            if task.status.is_terminal() {
                if task.status.is_success() {
                    info!(
                        task_id,
                        ticks,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "Song task succeeded"
                    );
                    return Ok(task);
                }
                return Err(JobError::RemoteTask {
                    task_id: task_id.to_string(),
                    status: task.status,
                    reason: task
                        .failed_reason
                        .clone()
                        .unwrap_or_else(|| "Unknown".to_string()),
                }
                .into());
            }

            debug!(task_id, status = %task.status, ticks, "Song task still in progress");
            on_progress(task).await;
            tokio::time::sleep(self.options.interval).await;
        }
    }
}
