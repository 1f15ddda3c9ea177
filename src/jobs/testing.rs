//! Hand-written collaborators shared by the job tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use crate::audio::{
    AudioProvider, Genre, LyricLine, LyricsSection, PollOptions, SongChoice, SongTask, TaskStatus,
};
use crate::battle::{Battle, NewBattle};
use crate::config::PipelineConfig;
use crate::error::{AudioError, LlmError};
use crate::lyrics::{LyricsGenerator, VerseRequest};
use crate::store::{BattleStore, LibSqlBackend};

/// Writes `"<author> bars #<n>"` and records every request.
#[derive(Default)]
pub(crate) struct StubLyrics {
    pub requests: Mutex<Vec<VerseRequest>>,
}

#[async_trait]
impl LyricsGenerator for StubLyrics {
    async fn generate_verse(&self, request: &VerseRequest) -> Result<String, LlmError> {
        let mut requests = self.requests.lock().unwrap();
        requests.push(request.clone());
        Ok(format!("{} bars #{}", request.author, requests.len()))
    }
}

/// Always fails, as if the model endpoint were down.
pub(crate) struct FailingLyrics;

#[async_trait]
impl LyricsGenerator for FailingLyrics {
    async fn generate_verse(&self, _request: &VerseRequest) -> Result<String, LlmError> {
        Err(LlmError::RequestFailed {
            provider: "stub".into(),
            reason: "model endpoint unavailable".into(),
        })
    }
}

/// Audio provider with scripted submissions and a fixed number of
/// in-progress polls per task.
pub(crate) struct FakeAudio {
    /// Outcome of each submission in order; once empty, submissions succeed.
    submit_script: Mutex<VecDeque<Option<AudioError>>>,
    pub submit_times: Mutex<Vec<Instant>>,
    queries: Mutex<HashMap<String, u32>>,
    polls_before_done: u32,
    final_status: TaskStatus,
    /// Succeed with duration and timing but no audio url.
    omit_url: bool,
}

impl FakeAudio {
    pub fn new() -> Arc<Self> {
        Self::scripted(Vec::new())
    }

    pub fn scripted(script: Vec<Option<AudioError>>) -> Arc<Self> {
        Self::build(script, TaskStatus::Succeeded)
    }

    pub fn ending_with(status: TaskStatus) -> Arc<Self> {
        Self::build(Vec::new(), status)
    }

    pub fn without_audio_url() -> Arc<Self> {
        Arc::new(Self {
            omit_url: true,
            ..Self::unshared(Vec::new(), TaskStatus::Succeeded)
        })
    }

    fn build(script: Vec<Option<AudioError>>, final_status: TaskStatus) -> Arc<Self> {
        Arc::new(Self::unshared(script, final_status))
    }

    fn unshared(script: Vec<Option<AudioError>>, final_status: TaskStatus) -> Self {
        Self {
            submit_script: Mutex::new(script.into()),
            submit_times: Mutex::new(Vec::new()),
            queries: Mutex::new(HashMap::new()),
            polls_before_done: 1,
            final_status,
            omit_url: false,
        }
    }

    pub fn submissions(&self) -> usize {
        self.submit_times.lock().unwrap().len()
    }

    pub fn queries_for(&self, task_id: &str) -> u32 {
        self.queries.lock().unwrap().get(task_id).copied().unwrap_or(0)
    }

    pub fn total_queries(&self) -> u32 {
        self.queries.lock().unwrap().values().sum()
    }
}

pub(crate) fn rate_limited() -> Option<AudioError> {
    Some(AudioError::RateLimited {
        provider: "fake".into(),
        body: "slow down".into(),
    })
}

pub(crate) fn server_error() -> Option<AudioError> {
    Some(AudioError::Http {
        provider: "fake".into(),
        status: 500,
        body: "boom".into(),
    })
}

fn task(id: &str, status: TaskStatus) -> SongTask {
    SongTask {
        id: id.to_string(),
        created_at: 0,
        finished_at: None,
        model: "fake".into(),
        status,
        failed_reason: None,
        choices: Vec::new(),
    }
}

#[async_trait]
impl AudioProvider for FakeAudio {
    fn name(&self) -> &str {
        "fake"
    }

    async fn submit(&self, _lyrics: &str, _genre: Genre) -> Result<SongTask, AudioError> {
        let n = {
            let mut times = self.submit_times.lock().unwrap();
            times.push(Instant::now());
            times.len()
        };
        if let Some(Some(err)) = self.submit_script.lock().unwrap().pop_front() {
            return Err(err);
        }
        Ok(task(&format!("task-{n}"), TaskStatus::Preparing))
    }

    async fn query(&self, task_id: &str) -> Result<SongTask, AudioError> {
        let count = {
            let mut queries = self.queries.lock().unwrap();
            let count = queries.entry(task_id.to_string()).or_insert(0);
            *count += 1;
            *count
        };
        if count <= self.polls_before_done {
            return Ok(task(task_id, TaskStatus::Running));
        }

        let mut done = task(task_id, self.final_status);
        if self.final_status == TaskStatus::Succeeded {
            done.choices = vec![SongChoice {
                url: (!self.omit_url).then(|| format!("https://cdn.test/{task_id}.mp3")),
                duration: Some(30_000),
                lyrics_sections: Some(vec![LyricsSection {
                    section_type: "verse".into(),
                    start: 0,
                    end: 30_000,
                    lines: vec![LyricLine {
                        start: 0,
                        end: 3_000,
                        text: "first line".into(),
                        words: Vec::new(),
                    }],
                }]),
            }];
        } else {
            done.failed_reason = Some("content rejected".into());
        }
        Ok(done)
    }
}

/// Pipeline settings with a short poll cadence.
pub(crate) fn test_config() -> PipelineConfig {
    PipelineConfig {
        poll: PollOptions {
            interval: Duration::from_secs(1),
            max_wait: Duration::from_secs(60),
        },
        ..Default::default()
    }
}

pub(crate) async fn memory_store() -> Arc<LibSqlBackend> {
    Arc::new(LibSqlBackend::new_memory().await.unwrap())
}

pub(crate) async fn alpha_beta(store: &dyn BattleStore, rounds: u32) -> Battle {
    store
        .create_battle(&NewBattle::new("Alpha", "Beta", rounds))
        .await
        .unwrap()
}
