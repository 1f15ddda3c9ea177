//! Battle and verse data model.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Maximum length of a participant name.
const MAX_NAME_LEN: usize = 100;

/// Lifecycle status of a battle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BattleStatus {
    Pending,
    Generating,
    Completed,
    Failed,
}

impl BattleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BattleStatus::Pending => "pending",
            BattleStatus::Generating => "generating",
            BattleStatus::Completed => "completed",
            BattleStatus::Failed => "failed",
        }
    }

    /// Completed and failed are absorbing.
    pub fn is_terminal(&self) -> bool {
        matches!(self, BattleStatus::Completed | BattleStatus::Failed)
    }

    /// `generating -> generating` is allowed so an interrupted run can resume.
    pub fn can_transition_to(&self, next: BattleStatus) -> bool {
        match (self, next) {
            (BattleStatus::Pending, BattleStatus::Generating) => true,
            (BattleStatus::Generating, BattleStatus::Generating)
            | (BattleStatus::Generating, BattleStatus::Completed)
            | (BattleStatus::Generating, BattleStatus::Failed) => true,
            _ => false,
        }
    }
}

impl fmt::Display for BattleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BattleStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(BattleStatus::Pending),
            "generating" => Ok(BattleStatus::Generating),
            "completed" => Ok(BattleStatus::Completed),
            "failed" => Ok(BattleStatus::Failed),
            other => Err(format!("unknown battle status: {other}")),
        }
    }
}

/// A battle between two named participants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Battle {
    pub id: Uuid,
    pub ai_one: String,
    pub ai_two: String,
    pub total_rounds: u32,
    pub current_round: u32,
    pub status: BattleStatus,
    pub winner: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Battle {
    /// Leader and follower for the given round.
    pub fn turn_order(&self, round: u32) -> (&str, &str) {
        if leader_for_round(round) == 0 {
            (&self.ai_one, &self.ai_two)
        } else {
            (&self.ai_two, &self.ai_one)
        }
    }

    /// Position of a verse by `author` in `round`, or `None` if the author
    /// is not a participant.
    pub fn position_for(&self, round: u32, author: &str) -> Option<u32> {
        let (leader, follower) = self.turn_order(round);
        if author == leader {
            Some(verse_position(round, true))
        } else if author == follower {
            Some(verse_position(round, false))
        } else {
            None
        }
    }
}

/// Index of the participant leading `round` (0 = ai_one, 1 = ai_two).
///
/// Odd rounds are led by ai_one, even rounds by ai_two.
pub fn leader_for_round(round: u32) -> usize {
    if round % 2 == 1 { 0 } else { 1 }
}

/// Zero-based position of a verse: two per round, leader first.
pub fn verse_position(round: u32, is_leader: bool) -> u32 {
    debug_assert!(round >= 1, "rounds are 1-based");
    (round - 1) * 2 + if is_leader { 0 } else { 1 }
}

/// A battle along with its verses in position order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BattleWithVerses {
    #[serde(flatten)]
    pub battle: Battle,
    pub verses: Vec<Verse>,
}

impl BattleWithVerses {
    /// Lyrics of all non-empty verses so far, in position order.
    pub fn prior_lyrics(&self) -> Vec<String> {
        self.verses
            .iter()
            .filter(|v| !v.lyrics.trim().is_empty())
            .map(|v| v.lyrics.clone())
            .collect()
    }

    pub fn verse_at(&self, position: u32) -> Option<&Verse> {
        self.verses.iter().find(|v| v.position == position)
    }
}

/// Input for creating a battle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewBattle {
    pub ai_one: String,
    pub ai_two: String,
    pub total_rounds: u32,
}

impl NewBattle {
    pub fn new(ai_one: impl Into<String>, ai_two: impl Into<String>, total_rounds: u32) -> Self {
        Self {
            ai_one: ai_one.into(),
            ai_two: ai_two.into(),
            total_rounds,
        }
    }

    /// Check names and round count against the configured ceiling.
    pub fn validate(&self, max_rounds: u32) -> Result<(), String> {
        for (field, name) in [("ai_one", &self.ai_one), ("ai_two", &self.ai_two)] {
            let trimmed = name.trim();
            if trimmed.is_empty() {
                return Err(format!("{field} must not be empty"));
            }
            if trimmed.chars().count() > MAX_NAME_LEN {
                return Err(format!("{field} exceeds {MAX_NAME_LEN} characters"));
            }
        }
        if self.ai_one.trim() == self.ai_two.trim() {
            return Err("participants must have distinct names".into());
        }
        if self.total_rounds < 1 || self.total_rounds > max_rounds {
            return Err(format!(
                "total_rounds must be between 1 and {max_rounds}, got {}",
                self.total_rounds
            ));
        }
        Ok(())
    }
}

/// A single generated verse (lyrics + audio) in a battle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Verse {
    pub id: Uuid,
    pub battle_id: Uuid,
    pub position: u32,
    pub author: String,
    pub lyrics: String,
    pub remote_task_id: Option<String>,
    pub remote_status: Option<String>,
    pub audio_url: Option<String>,
    pub duration_ms: Option<u64>,
    pub timing_json: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Verse {
    /// The remote task succeeded and its result is stored. The audio url may
    /// still be empty if the provider returned none.
    pub fn is_complete(&self) -> bool {
        self.remote_status.as_deref() == Some("succeeded")
    }
}

/// Input for creating a verse.
#[derive(Debug, Clone)]
pub struct NewVerse {
    pub battle_id: Uuid,
    pub position: u32,
    pub author: String,
    pub lyrics: String,
}

/// Partial update of a verse. `None` fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct VerseUpdate {
    pub remote_task_id: Option<String>,
    pub remote_status: Option<String>,
    pub audio_url: Option<String>,
    pub duration_ms: Option<u64>,
    pub timing_json: Option<String>,
}

impl VerseUpdate {
    pub fn status(status: impl Into<String>) -> Self {
        Self {
            remote_status: Some(status.into()),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn battle(rounds: u32) -> Battle {
        Battle {
            id: Uuid::new_v4(),
            ai_one: "Alpha".into(),
            ai_two: "Beta".into(),
            total_rounds: rounds,
            current_round: 0,
            status: BattleStatus::Pending,
            winner: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn odd_rounds_led_by_first_participant() {
        let b = battle(4);
        for round in 1..=4 {
            let (leader, follower) = b.turn_order(round);
            if round % 2 == 1 {
                assert_eq!((leader, follower), ("Alpha", "Beta"));
            } else {
                assert_eq!((leader, follower), ("Beta", "Alpha"));
            }
        }
    }

    #[test]
    fn positions_are_dense_and_zero_based() {
        let b = battle(3);
        let mut positions = Vec::new();
        for round in 1..=3 {
            let (leader, follower) = b.turn_order(round);
            positions.push(b.position_for(round, leader).unwrap());
            positions.push(b.position_for(round, follower).unwrap());
        }
        assert_eq!(positions, vec![0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn position_for_stranger_is_none() {
        assert!(battle(1).position_for(1, "Gamma").is_none());
    }

    #[test]
    fn status_transitions() {
        use BattleStatus::*;
        assert!(Pending.can_transition_to(Generating));
        assert!(Generating.can_transition_to(Generating));
        assert!(Generating.can_transition_to(Completed));
        assert!(Generating.can_transition_to(Failed));
        assert!(!Pending.can_transition_to(Completed));
        assert!(!Completed.can_transition_to(Generating));
        assert!(!Failed.can_transition_to(Generating));
        assert!(Completed.is_terminal() && Failed.is_terminal());
    }

    #[test]
    fn status_round_trips_through_str() {
        for s in ["pending", "generating", "completed", "failed"] {
            assert_eq!(s.parse::<BattleStatus>().unwrap().as_str(), s);
        }
        assert!("bogus".parse::<BattleStatus>().is_err());
    }

    #[test]
    fn new_battle_validation() {
        assert!(NewBattle::new("Alpha", "Beta", 1).validate(2).is_ok());
        assert!(NewBattle::new("Alpha", "Beta", 2).validate(2).is_ok());
        assert!(NewBattle::new("Alpha", "Beta", 3).validate(2).is_err());
        assert!(NewBattle::new("Alpha", "Beta", 0).validate(2).is_err());
        assert!(NewBattle::new("  ", "Beta", 1).validate(2).is_err());
        assert!(NewBattle::new("Alpha", "Alpha", 1).validate(2).is_err());
        assert!(NewBattle::new("x".repeat(101), "Beta", 1).validate(2).is_err());
        assert!(NewBattle::new("Alpha", "Beta", 5).validate(5).is_ok());
    }
}
