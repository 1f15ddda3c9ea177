//! Verse executor: lyrics, gated audio submission, polling, persistence.
//!
//! Every step writes through to the store as soon as it happens, so a
//! crashed run can pick up from whatever was recorded: an existing verse
//! keeps its lyrics, an existing remote task is polled rather than
//! resubmitted, and a finished verse is left alone.

use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;

use super::model::VerseJob;
use crate::audio::{AudioProvider, SongTask, SubmissionGate, TaskPoller};
use crate::battle::{NewVerse, Verse, VerseUpdate};
use crate::config::PipelineConfig;
use crate::error::{DatabaseError, Error, JobError};
use crate::lyrics::{LyricsGenerator, VerseRequest};
use crate::store::BattleStore;

/// Generates and renders single verses.
pub struct VerseExecutor {
    store: Arc<dyn BattleStore>,
    lyrics: Arc<dyn LyricsGenerator>,
    provider: Arc<dyn AudioProvider>,
    gate: Arc<SubmissionGate>,
    poller: TaskPoller,
    config: PipelineConfig,
}

impl VerseExecutor {
    pub fn new(
        store: Arc<dyn BattleStore>,
        lyrics: Arc<dyn LyricsGenerator>,
        provider: Arc<dyn AudioProvider>,
        gate: Arc<SubmissionGate>,
        config: PipelineConfig,
    ) -> Self {
        let poller = TaskPoller::new(Arc::clone(&provider), config.poll);
        Self {
            store,
            lyrics,
            provider,
            gate,
            poller,
            config,
        }
    }

    /// Produce one verse end to end and return it as stored.
    pub async fn generate_verse(&self, job: &VerseJob) -> Result<Verse, Error> {
        let battle = self
            .store
            .get_battle_with_verses(job.battle_id)
            .await?
            .ok_or(JobError::BattleNotFound { id: job.battle_id })?;

        if job.round < 1 || job.round > battle.battle.total_rounds {
            return Err(JobError::InvalidPayload {
                reason: format!(
                    "round {} outside 1..={} for battle {}",
                    job.round, battle.battle.total_rounds, job.battle_id
                ),
            }
            .into());
        }
        let position = battle
            .battle
            .position_for(job.round, &job.author)
            .ok_or_else(|| JobError::InvalidPayload {
                reason: format!(
                    "{} is not a participant in battle {}",
                    job.author, job.battle_id
                ),
            })?;

        let verse = match battle.verse_at(position) {
            Some(existing) => {
                info!(
                    battle_id = %job.battle_id,
                    round = job.round,
                    author = %job.author,
                    position,
                    "Resuming existing verse"
                );
                existing.clone()
            }
            None => {
                info!(
                    battle_id = %job.battle_id,
                    round = job.round,
                    author = %job.author,
                    position,
                    "Generating lyrics"
                );
                let request = VerseRequest {
                    ai_one: battle.battle.ai_one.clone(),
                    ai_two: battle.battle.ai_two.clone(),
                    author: job.author.clone(),
                    prior_verses: job.prior_verses.clone(),
                    genre: self.config.genre,
                };
                let lyrics = self.lyrics.generate_verse(&request).await?;
                self.store
                    .create_verse(&NewVerse {
                        battle_id: job.battle_id,
                        position,
                        author: job.author.clone(),
                        lyrics,
                    })
                    .await?
            }
        };

        if verse.is_complete() {
            debug!(verse_id = %verse.id, "Verse already rendered");
            return Ok(verse);
        }

        match self.render_audio(&verse).await {
            Ok(done) => Ok(done),
            Err(e) => {
                warn!(verse_id = %verse.id, error = %e, "Audio generation failed");
                if let Err(db_err) = self
                    .store
                    .update_verse(verse.id, &VerseUpdate::status("failed"))
                    .await
                {
                    warn!(verse_id = %verse.id, error = %db_err, "Failed to record verse failure");
                }
                Err(e)
            }
        }
    }

    /// Submit (unless already submitted), poll to completion, store the result.
    async fn render_audio(&self, verse: &Verse) -> Result<Verse, Error> {
        let task_id = match &verse.remote_task_id {
            Some(task_id) => {
                info!(verse_id = %verse.id, task_id = %task_id, "Polling previously submitted task");
                task_id.clone()
            }
            None => {
                let task = self.submit_with_retry(&verse.lyrics).await?;
                self.store
                    .update_verse(
                        verse.id,
                        &VerseUpdate {
                            remote_task_id: Some(task.id.clone()),
                            remote_status: Some(task.status.as_str().to_string()),
                            ..Default::default()
                        },
                    )
                    .await
                    .map_err(|e| unit_missing(verse.id, e))?;
                info!(verse_id = %verse.id, task_id = %task.id, "Song task submitted");
                task.id
            }
        };

        let options = self.poller.options();
        debug!(
            verse_id = %verse.id,
            task_id = %task_id,
            interval_ms = options.interval.as_millis() as u64,
            max_wait_secs = options.max_wait.as_secs(),
            "Polling song task"
        );
        let store = &self.store;
        let verse_id = verse.id;
        let finished = self
            .poller
            .poll(&task_id, |snapshot| async move {
                if let Err(e) = store
                    .update_verse(verse_id, &VerseUpdate::status(snapshot.status.as_str()))
                    .await
                {
                    warn!(verse_id = %verse_id, error = %e, "Failed to record poll progress");
                }
            })
            .await?;

        let update = completed_update(&finished)?;
        let stored = self
            .store
            .update_verse(verse.id, &update)
            .await
            .map_err(|e| unit_missing(verse.id, e))?;
        info!(
            verse_id = %stored.id,
            position = stored.position,
            duration_ms = stored.duration_ms,
            "Verse audio ready"
        );
        Ok(stored)
    }

    /// Submit through the gate, backing off on rate limits.
    ///
    /// The n-th rate-limited attempt sleeps `n * backoff_base` outside the
    /// gate; any other error is returned as is.
    async fn submit_with_retry(&self, lyrics: &str) -> Result<SongTask, Error> {
        let policy = self.config.submit;
        let genre = self.config.genre;
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            let result = self
                .gate
                .with_exclusive_access(|| self.provider.submit(lyrics, genre))
                .await;

            match result {
                Ok(task) => return Ok(task),
                Err(e) if e.is_rate_limited() => {
                    if attempt >= policy.max_attempts {
                        return Err(JobError::Submission {
                            attempts: attempt,
                            reason: e.to_string(),
                        }
                        .into());
                    }
                    let delay = policy.backoff_base * attempt;
                    warn!(
                        provider = self.provider.name(),
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "Rate limited, backing off"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

/// Fields to write once a task has succeeded.
///
/// A success without an audio url is still a success: the status, duration
/// and timing are kept and the url stays empty.
fn completed_update(task: &SongTask) -> Result<VerseUpdate, Error> {
    let choice = task.primary_choice();
    let audio_url = choice.and_then(|c| c.url.clone());
    if audio_url.is_none() {
        warn!(task_id = %task.id, "Song task succeeded without an audio url");
    }

    let timing_json = match choice.and_then(|c| c.lyrics_sections.as_ref()) {
        Some(sections) => Some(
            serde_json::to_string(sections)
                .map_err(|e| DatabaseError::Serialization(format!("lyrics sections: {e}")))?,
        ),
        None => None,
    };

    Ok(VerseUpdate {
        remote_task_id: None,
        remote_status: Some(task.status.as_str().to_string()),
        audio_url,
        duration_ms: choice.and_then(|c| c.duration),
        timing_json,
    })
}

/// A verse that vanished mid-run is a missing unit of work, not a storage fault.
fn unit_missing(verse_id: Uuid, err: DatabaseError) -> Error {
    match err {
        DatabaseError::NotFound { ref entity, .. } if entity == "verse" => {
            JobError::UnitNotFound { id: verse_id }.into()
        }
        other => other.into(),
    }
}
