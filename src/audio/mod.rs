//! Audio synthesis: provider trait, submission gate, and task poller.
//!
//! Only one submission may be in flight against the provider at a time
//! (`SubmissionGate`). Once submitted, a song task is driven to a terminal
//! state by `TaskPoller`, which is not gated.

pub mod gate;
pub mod mureka;
pub mod poller;
pub mod types;

pub use gate::SubmissionGate;
pub use mureka::{MurekaClient, MurekaConfig};
pub use poller::{PollOptions, TaskPoller};
pub use types::{Genre, LyricLine, LyricWord, LyricsSection, SongChoice, SongTask, TaskStatus};

use async_trait::async_trait;

use crate::error::AudioError;

/// A remote song-generation service.
#[async_trait]
pub trait AudioProvider: Send + Sync {
    /// Provider name for logs and errors.
    fn name(&self) -> &str;

    /// Start generating a song from lyrics. Returns the task with its
    /// initial status.
    async fn submit(&self, lyrics: &str, genre: Genre) -> Result<SongTask, AudioError>;

    /// Fetch the current state of a previously submitted task.
    async fn query(&self, task_id: &str) -> Result<SongTask, AudioError>;
}
