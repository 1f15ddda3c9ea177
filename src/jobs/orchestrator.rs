//! Battle orchestrator: drives a battle through all of its rounds.
//!
//! Status flow: `pending -> generating -> completed | failed`. Verses are
//! generated strictly in position order and the first failure stops the
//! run. Whatever was persisted before the failure stays.

use std::sync::Arc;

use tracing::{error, info, warn};
use uuid::Uuid;

use super::executor::VerseExecutor;
use super::model::{JobKind, VerseJob};
use super::queue::JobQueue;
use crate::battle::{Battle, BattleStatus};
use crate::error::{Error, JobError};
use crate::store::BattleStore;

pub struct BattleOrchestrator {
    store: Arc<dyn BattleStore>,
    executor: Arc<VerseExecutor>,
}

impl BattleOrchestrator {
    pub fn new(store: Arc<dyn BattleStore>, executor: Arc<VerseExecutor>) -> Self {
        Self { store, executor }
    }

    /// Generate every verse of a battle and record the final status.
    pub async fn orchestrate(&self, battle_id: Uuid) -> Result<(), Error> {
        let battle = self
            .store
            .get_battle(battle_id)
            .await?
            .ok_or(JobError::BattleNotFound { id: battle_id })?;

        if !battle.status.can_transition_to(BattleStatus::Generating) {
            return Err(JobError::InvalidTransition {
                id: battle_id,
                state: battle.status.to_string(),
                target: BattleStatus::Generating.to_string(),
            }
            .into());
        }

        self.store
            .update_battle_status(battle_id, BattleStatus::Generating)
            .await?;
        info!(
            battle_id = %battle_id,
            rounds = battle.total_rounds,
            resumed = battle.status == BattleStatus::Generating,
            "Starting battle generation"
        );

        match self.run_rounds(&battle).await {
            Ok(()) => {
                self.store
                    .update_battle_status(battle_id, BattleStatus::Completed)
                    .await?;
                info!(battle_id = %battle_id, "Battle generation completed");
                Ok(())
            }
            Err(e) => {
                error!(battle_id = %battle_id, error = %e, "Battle generation failed");
                if let Err(db_err) = self
                    .store
                    .update_battle_status(battle_id, BattleStatus::Failed)
                    .await
                {
                    warn!(battle_id = %battle_id, error = %db_err, "Failed to mark battle failed");
                }
                Err(e)
            }
        }
    }

    async fn run_rounds(&self, battle: &Battle) -> Result<(), Error> {
        for round in 1..=battle.total_rounds {
            let (leader, follower) = battle.turn_order(round);
            info!(battle_id = %battle.id, round, total = battle.total_rounds, leader, "Generating round");

            self.executor
                .generate_verse(&VerseJob {
                    battle_id: battle.id,
                    round,
                    author: leader.to_string(),
                    prior_verses: self.prior_verses(battle.id).await?,
                })
                .await?;
            self.store
                .update_battle_current_round(battle.id, round)
                .await?;

            self.executor
                .generate_verse(&VerseJob {
                    battle_id: battle.id,
                    round,
                    author: follower.to_string(),
                    prior_verses: self.prior_verses(battle.id).await?,
                })
                .await?;
        }
        Ok(())
    }

    /// Lyrics of every verse stored so far, in position order.
    async fn prior_verses(&self, battle_id: Uuid) -> Result<Vec<String>, Error> {
        let battle = self
            .store
            .get_battle_with_verses(battle_id)
            .await?
            .ok_or(JobError::BattleNotFound { id: battle_id })?;
        Ok(battle.prior_lyrics())
    }

    /// Re-enqueue battles left in `generating` by an interrupted process.
    ///
    /// Returns the ids that were re-enqueued.
    pub async fn recover_interrupted(&self, queue: &Arc<JobQueue>) -> Result<Vec<Uuid>, Error> {
        let stuck = self
            .store
            .list_battles_by_status(BattleStatus::Generating)
            .await?;

        let mut recovered = Vec::with_capacity(stuck.len());
        for battle in stuck {
            info!(battle_id = %battle.id, current_round = battle.current_round, "Re-enqueueing interrupted battle");
            queue
                .enqueue(JobKind::OrchestrateBattle {
                    battle_id: battle.id,
                })
                .await;
            recovered.push(battle.id);
        }
        Ok(recovered)
    }
}
