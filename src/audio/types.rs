//! Wire types for song generation tasks.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Music genre hint passed to the provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Genre {
    #[default]
    Rap,
    Rock,
    Country,
}

impl Genre {
    /// Style prompt sent alongside the lyrics.
    pub fn style_prompt(&self) -> &'static str {
        match self {
            Genre::Rap => "hip-hop, rap, urban, strong beat, rhythmic, modern, male vocal",
            Genre::Rock => {
                "rock, alternative, electric guitar, powerful drums, energetic, anthemic, male vocal"
            }
            Genre::Country => {
                "country, acoustic guitar, storytelling, heartfelt, melodic, warm, male vocal"
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Genre::Rap => "rap",
            Genre::Rock => "rock",
            Genre::Country => "country",
        }
    }
}

impl FromStr for Genre {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "rap" => Ok(Genre::Rap),
            "rock" => Ok(Genre::Rock),
            "country" => Ok(Genre::Country),
            other => Err(format!("unknown genre: {other}")),
        }
    }
}

/// Status of a remote song task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Preparing,
    Queued,
    Running,
    Succeeded,
    Failed,
    Timeouted,
    Cancelled,
    /// Anything the provider reports that we don't recognise. Non-terminal.
    #[serde(other)]
    Unknown,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Preparing => "preparing",
            TaskStatus::Queued => "queued",
            TaskStatus::Running => "running",
            TaskStatus::Succeeded => "succeeded",
            TaskStatus::Failed => "failed",
            TaskStatus::Timeouted => "timeouted",
            TaskStatus::Cancelled => "cancelled",
            TaskStatus::Unknown => "unknown",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, TaskStatus::Succeeded)
    }

    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            TaskStatus::Failed | TaskStatus::Timeouted | TaskStatus::Cancelled
        )
    }

    pub fn is_terminal(&self) -> bool {
        self.is_success() || self.is_failure()
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of a remote song task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SongTask {
    pub id: String,
    #[serde(default)]
    pub created_at: i64,
    #[serde(default)]
    pub finished_at: Option<i64>,
    #[serde(default)]
    pub model: String,
    pub status: TaskStatus,
    #[serde(default)]
    pub failed_reason: Option<String>,
    #[serde(default)]
    pub choices: Vec<SongChoice>,
}

impl SongTask {
    /// The first rendered choice, which is the one we keep.
    pub fn primary_choice(&self) -> Option<&SongChoice> {
        self.choices.first()
    }
}

/// One rendered song in a finished task.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SongChoice {
    #[serde(default)]
    pub url: Option<String>,
    /// Length in milliseconds.
    #[serde(default)]
    pub duration: Option<u64>,
    #[serde(default)]
    pub lyrics_sections: Option<Vec<LyricsSection>>,
}

/// A lyric section (verse, chorus, ...) with line and word timing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LyricsSection {
    pub section_type: String,
    pub start: u64,
    pub end: u64,
    #[serde(default)]
    pub lines: Vec<LyricLine>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LyricLine {
    pub start: u64,
    pub end: u64,
    pub text: String,
    #[serde(default)]
    pub words: Vec<LyricWord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LyricWord {
    pub start: u64,
    pub end: u64,
    pub text: String,
}
