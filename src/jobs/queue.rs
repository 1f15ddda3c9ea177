//! Job queue: in-process FIFO queue with a single drain loop.
//!
//! `enqueue` pushes a job and, if nothing is draining, spawns the drain
//! loop. The loop runs jobs one at a time to completion and exits once the
//! queue is empty. Pending jobs and the `draining` flag share one lock, so
//! a push can never observe a loop that is about to exit.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::{Mutex, Notify};
use tracing::{debug, error, info};
use uuid::Uuid;

use super::model::{Job, JobKind};
use crate::error::{Error, JobError};

/// Runs a single dequeued job.
#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn handle(&self, job: &Job) -> Result<(), Error>;
}

/// Point-in-time view of the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    pub pending: usize,
    pub draining: bool,
    pub completed: u64,
    pub failed: u64,
}

#[derive(Default)]
struct QueueState {
    pending: VecDeque<Job>,
    draining: bool,
    completed: u64,
    failed: u64,
}

/// Sequential background job queue.
pub struct JobQueue {
    handler: Arc<dyn JobHandler>,
    state: Mutex<QueueState>,
    idle: Notify,
}

impl JobQueue {
    pub fn new(handler: Arc<dyn JobHandler>) -> Arc<Self> {
        Arc::new(Self {
            handler,
            state: Mutex::new(QueueState::default()),
            idle: Notify::new(),
        })
    }

    /// Add a job and start draining if idle. Returns the job id.
    pub async fn enqueue(self: &Arc<Self>, kind: JobKind) -> Uuid {
        let job = Job::new(kind);
        let job_id = job.id;
        info!(
            job_id = %job_id,
            job_type = job.kind.type_name(),
            battle_id = %job.kind.battle_id(),
            "Job added"
        );

        let start = {
            let mut state = self.state.lock().await;
            state.pending.push_back(job);
            !std::mem::replace(&mut state.draining, true)
        };

        if start {
            let queue = Arc::clone(self);
            tokio::spawn(async move { queue.drain().await });
        }
        job_id
    }

    /// Add a job described by a string tag and an untyped JSON payload.
    ///
    /// Unknown tags and malformed payloads are rejected before anything is
    /// queued.
    pub async fn enqueue_raw(
        self: &Arc<Self>,
        job_type: &str,
        payload: serde_json::Value,
    ) -> Result<Uuid, JobError> {
        match JobKind::from_raw(job_type, payload) {
            Ok(kind) => Ok(self.enqueue(kind).await),
            Err(e) => {
                error!(job_type, error = %e, "Rejected job");
                Err(e)
            }
        }
    }

    pub async fn stats(&self) -> QueueStats {
        let state = self.state.lock().await;
        QueueStats {
            pending: state.pending.len(),
            draining: state.draining,
            completed: state.completed,
            failed: state.failed,
        }
    }

    /// Resolve once the queue is empty and no drain loop is running.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            {
                let state = self.state.lock().await;
                if !state.draining && state.pending.is_empty() {
                    return;
                }
            }
            notified.await;
        }
    }

    async fn drain(self: Arc<Self>) {
        debug!("Drain loop started");
        loop {
            let job = {
                let mut state = self.state.lock().await;
                match state.pending.pop_front() {
                    Some(job) => job,
                    None => {
                        state.draining = false;
                        break;
                    }
                }
            };

            let job_id = job.id;
            let job_type = job.kind.type_name();

            // A panicking handler must not take the drain loop down with it.
            let handler = Arc::clone(&self.handler);
            let outcome = tokio::spawn(async move { handler.handle(&job).await }).await;

            let mut state = self.state.lock().await;
            match outcome {
                Ok(Ok(())) => {
                    state.completed += 1;
                    info!(job_id = %job_id, job_type, "Job completed");
                }
                Ok(Err(e)) => {
                    state.failed += 1;
                    error!(job_id = %job_id, job_type, error = %e, "Job failed");
                }
                Err(e) => {
                    state.failed += 1;
                    error!(job_id = %job_id, job_type, error = %e, "Job panicked");
                }
            }
        }
        debug!("Drain loop finished");
        self.idle.notify_waiters();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Records every job it sees. Jobs for `fail_battle` error out after
    /// writing their side effect.
    #[derive(Default)]
    struct RecordingHandler {
        seen: StdMutex<Vec<Uuid>>,
        side_effects: StdMutex<Vec<Uuid>>,
        fail_battle: Option<Uuid>,
        panic_battle: Option<Uuid>,
        active: AtomicUsize,
        max_active: AtomicUsize,
        work: Duration,
    }

    #[async_trait]
    impl JobHandler for RecordingHandler {
        async fn handle(&self, job: &Job) -> Result<(), Error> {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_active.fetch_max(now, Ordering::SeqCst);

            let battle_id = job.kind.battle_id();
            self.seen.lock().unwrap().push(battle_id);
            tokio::time::sleep(self.work).await;
            self.side_effects.lock().unwrap().push(battle_id);
            self.active.fetch_sub(1, Ordering::SeqCst);

            if Some(battle_id) == self.panic_battle {
                panic!("handler blew up");
            }
            if Some(battle_id) == self.fail_battle {
                return Err(JobError::BattleNotFound { id: battle_id }.into());
            }
            Ok(())
        }
    }

    fn battle_job(id: Uuid) -> JobKind {
        JobKind::OrchestrateBattle { battle_id: id }
    }

    #[tokio::test(start_paused = true)]
    async fn failing_job_does_not_stop_the_queue() {
        let (j1, j2, j3) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let handler = Arc::new(RecordingHandler {
            fail_battle: Some(j2),
            work: Duration::from_millis(10),
            ..Default::default()
        });
        let queue = JobQueue::new(handler.clone());

        queue.enqueue(battle_job(j1)).await;
        queue.enqueue(battle_job(j2)).await;
        queue.enqueue(battle_job(j3)).await;
        queue.wait_idle().await;

        assert_eq!(*handler.seen.lock().unwrap(), vec![j1, j2, j3]);
        // J2's partial work is kept even though it failed.
        assert_eq!(*handler.side_effects.lock().unwrap(), vec![j1, j2, j3]);

        let stats = queue.stats().await;
        assert_eq!(stats.completed, 2);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.pending, 0);
        assert!(!stats.draining);
    }

    #[tokio::test(start_paused = true)]
    async fn jobs_never_overlap() {
        let handler = Arc::new(RecordingHandler {
            work: Duration::from_secs(1),
            ..Default::default()
        });
        let queue = JobQueue::new(handler.clone());

        for _ in 0..3 {
            queue.enqueue(battle_job(Uuid::new_v4())).await;
        }
        // Enqueue more while the first job is still running.
        tokio::time::sleep(Duration::from_millis(500)).await;
        for _ in 0..2 {
            queue.enqueue(battle_job(Uuid::new_v4())).await;
        }
        queue.wait_idle().await;

        assert_eq!(handler.seen.lock().unwrap().len(), 5);
        assert_eq!(handler.max_active.load(Ordering::SeqCst), 1);
        assert_eq!(queue.stats().await.completed, 5);
    }

    #[tokio::test(start_paused = true)]
    async fn queue_restarts_after_going_idle() {
        let handler = Arc::new(RecordingHandler::default());
        let queue = JobQueue::new(handler.clone());

        queue.enqueue(battle_job(Uuid::new_v4())).await;
        queue.wait_idle().await;
        assert!(!queue.stats().await.draining);

        queue.enqueue(battle_job(Uuid::new_v4())).await;
        queue.wait_idle().await;
        assert_eq!(queue.stats().await.completed, 2);
    }

    #[tokio::test]
    async fn wait_idle_returns_immediately_when_empty() {
        let queue = JobQueue::new(Arc::new(RecordingHandler::default()));
        queue.wait_idle().await;
        assert_eq!(
            queue.stats().await,
            QueueStats {
                pending: 0,
                draining: false,
                completed: 0,
                failed: 0
            }
        );
    }

    #[tokio::test]
    async fn unknown_raw_job_is_not_enqueued() {
        let handler = Arc::new(RecordingHandler::default());
        let queue = JobQueue::new(handler.clone());

        let err = queue
            .enqueue_raw("renderVideo", serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, JobError::UnknownJobType { .. }));

        queue.wait_idle().await;
        assert!(handler.seen.lock().unwrap().is_empty());
        assert_eq!(queue.stats().await.pending, 0);
    }

    #[tokio::test]
    async fn raw_job_runs_like_typed_job() {
        let handler = Arc::new(RecordingHandler::default());
        let queue = JobQueue::new(handler.clone());
        let battle_id = Uuid::new_v4();

        queue
            .enqueue_raw("generateBattle", serde_json::json!({ "battleId": battle_id }))
            .await
            .unwrap();
        queue.wait_idle().await;

        assert_eq!(*handler.seen.lock().unwrap(), vec![battle_id]);
    }

    #[tokio::test]
    async fn panicking_job_is_counted_as_failed() {
        let (j1, j2) = (Uuid::new_v4(), Uuid::new_v4());
        let handler = Arc::new(RecordingHandler {
            panic_battle: Some(j1),
            ..Default::default()
        });
        let queue = JobQueue::new(handler.clone());

        queue.enqueue(battle_job(j1)).await;
        queue.enqueue(battle_job(j2)).await;
        queue.wait_idle().await;

        let stats = queue.stats().await;
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.completed, 1);
    }
}
