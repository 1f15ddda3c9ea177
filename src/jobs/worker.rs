//! `JobHandler` that routes queued jobs to the orchestrator or executor.

use std::sync::Arc;

use async_trait::async_trait;

use super::executor::VerseExecutor;
use super::model::{Job, JobKind};
use super::orchestrator::BattleOrchestrator;
use super::queue::JobHandler;
use crate::audio::{AudioProvider, SubmissionGate};
use crate::config::PipelineConfig;
use crate::error::Error;
use crate::lyrics::LyricsGenerator;
use crate::store::BattleStore;

/// Runs battle jobs against one store and one set of providers.
pub struct BattleWorker {
    orchestrator: BattleOrchestrator,
    executor: Arc<VerseExecutor>,
}

impl BattleWorker {
    /// Wire up an executor and orchestrator sharing a fresh submission gate.
    pub fn new(
        store: Arc<dyn BattleStore>,
        lyrics: Arc<dyn LyricsGenerator>,
        provider: Arc<dyn AudioProvider>,
        config: PipelineConfig,
    ) -> Self {
        let executor = Arc::new(VerseExecutor::new(
            Arc::clone(&store),
            lyrics,
            provider,
            Arc::new(SubmissionGate::new()),
            config,
        ));
        Self {
            orchestrator: BattleOrchestrator::new(store, Arc::clone(&executor)),
            executor,
        }
    }

    pub fn orchestrator(&self) -> &BattleOrchestrator {
        &self.orchestrator
    }
}

#[async_trait]
impl JobHandler for BattleWorker {
    async fn handle(&self, job: &Job) -> Result<(), Error> {
        match &job.kind {
            JobKind::OrchestrateBattle { battle_id } => {
                self.orchestrator.orchestrate(*battle_id).await
            }
            JobKind::GenerateVerse(verse_job) => {
                self.executor.generate_verse(verse_job).await.map(|_| ())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::battle::BattleStatus;
    use crate::jobs::JobQueue;
    use crate::jobs::model::VerseJob;
    use crate::jobs::testing::{FakeAudio, StubLyrics, alpha_beta, memory_store, test_config};

    #[tokio::test(start_paused = true)]
    async fn queued_battles_run_to_completion() {
        let store = memory_store().await;
        let audio = FakeAudio::new();
        let worker = Arc::new(BattleWorker::new(
            store.clone(),
            Arc::new(StubLyrics::default()),
            audio.clone(),
            test_config(),
        ));
        let queue = JobQueue::new(worker);

        let first = alpha_beta(store.as_ref(), 2).await;
        let second = alpha_beta(store.as_ref(), 1).await;
        queue
            .enqueue(JobKind::OrchestrateBattle { battle_id: first.id })
            .await;
        queue
            .enqueue(JobKind::OrchestrateBattle { battle_id: second.id })
            .await;
        queue.wait_idle().await;

        for (id, rounds) in [(first.id, 2), (second.id, 1)] {
            let done = store.get_battle_with_verses(id).await.unwrap().unwrap();
            assert_eq!(done.battle.status, BattleStatus::Completed);
            assert_eq!(done.verses.len(), rounds * 2);
        }
        assert_eq!(audio.submissions(), 6);
        assert_eq!(queue.stats().await.completed, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn single_verse_job_is_routed_to_executor() {
        let store = memory_store().await;
        let worker = Arc::new(BattleWorker::new(
            store.clone(),
            Arc::new(StubLyrics::default()),
            FakeAudio::new(),
            test_config(),
        ));
        let queue = JobQueue::new(worker);
        let battle = alpha_beta(store.as_ref(), 1).await;

        queue
            .enqueue(JobKind::GenerateVerse(VerseJob {
                battle_id: battle.id,
                round: 1,
                author: "Beta".into(),
                prior_verses: Vec::new(),
            }))
            .await;
        queue.wait_idle().await;

        let after = store.get_battle_with_verses(battle.id).await.unwrap().unwrap();
        assert_eq!(after.verses.len(), 1);
        assert_eq!(after.verses[0].position, 1);
        // A lone verse job never touches battle status.
        assert_eq!(after.battle.status, BattleStatus::Pending);
    }

    #[tokio::test(start_paused = true)]
    async fn recover_interrupted_requeues_generating_battles() {
        let store = memory_store().await;
        let worker = Arc::new(BattleWorker::new(
            store.clone(),
            Arc::new(StubLyrics::default()),
            FakeAudio::new(),
            test_config(),
        ));
        let queue = JobQueue::new(worker.clone());

        let stuck = alpha_beta(store.as_ref(), 1).await;
        let untouched = alpha_beta(store.as_ref(), 1).await;
        store
            .update_battle_status(stuck.id, BattleStatus::Generating)
            .await
            .unwrap();

        let recovered = worker
            .orchestrator()
            .recover_interrupted(&queue)
            .await
            .unwrap();
        assert_eq!(recovered, vec![stuck.id]);
        queue.wait_idle().await;

        let stuck = store.get_battle(stuck.id).await.unwrap().unwrap();
        assert_eq!(stuck.status, BattleStatus::Completed);
        let untouched = store.get_battle(untouched.id).await.unwrap().unwrap();
        assert_eq!(untouched.status, BattleStatus::Pending);
    }
}
