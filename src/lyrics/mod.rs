//! Lyric generation for battle verses.
//!
//! The job pipeline only depends on the `LyricsGenerator` trait; the
//! rig-core backed implementation lives in `rig_generator`.

mod rig_generator;

pub use rig_generator::{LyricsConfig, RigLyricsGenerator};

use async_trait::async_trait;

use crate::audio::Genre;
use crate::error::LlmError;

/// Everything needed to write one verse.
#[derive(Debug, Clone)]
pub struct VerseRequest {
    pub ai_one: String,
    pub ai_two: String,
    /// Participant writing this verse.
    pub author: String,
    /// Earlier verses of the battle, oldest first.
    pub prior_verses: Vec<String>,
    pub genre: Genre,
}

impl VerseRequest {
    /// System prompt describing the persona and the verse constraints.
    pub fn system_prompt(&self) -> String {
        format!(
            "This is a {genre} battle between {one} and {two}. You are {me}. \
             Write a fierce, clever verse that:\n\
             - Showcases {me}'s personality and strengths\n\
             - Responds to previous verses if any\n\
             - Uses wordplay, metaphors, and rhymes\n\
             - Is around 8-12 lines long\n\
             - Maintains appropriate content (no explicit profanity)\n\n\
             Output only the verse lines, no titles or commentary.",
            genre = self.genre.as_str(),
            one = self.ai_one,
            two = self.ai_two,
            me = self.author,
        )
    }

    /// User prompt carrying the battle so far.
    pub fn user_prompt(&self) -> String {
        if self.prior_verses.is_empty() {
            format!("Open the battle as {}.", self.author)
        } else {
            format!(
                "Previous verses in this battle:\n{}\n\nNow respond as {}.",
                self.prior_verses.join("\n---\n"),
                self.author
            )
        }
    }
}

/// Produces verse lyrics for a participant.
#[async_trait]
pub trait LyricsGenerator: Send + Sync {
    async fn generate_verse(&self, request: &VerseRequest) -> Result<String, LlmError>;
}

/// Strip surrounding whitespace and any code fences a model wraps the verse in.
pub(crate) fn clean_verse(raw: &str) -> String {
    raw.trim()
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim()
        .to_string()
}
