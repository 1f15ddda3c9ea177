//! Job data model: what the queue carries between producers and the handler.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::JobError;

/// Wire tag for `JobKind::OrchestrateBattle`.
pub const ORCHESTRATE_BATTLE: &str = "generateBattle";
/// Wire tag for `JobKind::GenerateVerse`.
pub const GENERATE_VERSE: &str = "generateVerse";

/// One verse of one round, written by `author`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerseJob {
    pub battle_id: Uuid,
    pub round: u32,
    pub author: String,
    /// Lyrics of earlier verses, oldest first.
    #[serde(default)]
    pub prior_verses: Vec<String>,
}

/// Work a job asks for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum JobKind {
    /// Generate every verse of a battle, round by round.
    #[serde(rename = "generateBattle", rename_all = "camelCase")]
    OrchestrateBattle { battle_id: Uuid },

    /// Generate a single verse.
    #[serde(rename = "generateVerse")]
    GenerateVerse(VerseJob),
}

impl JobKind {
    /// Wire tag of this kind.
    pub fn type_name(&self) -> &'static str {
        match self {
            JobKind::OrchestrateBattle { .. } => ORCHESTRATE_BATTLE,
            JobKind::GenerateVerse(_) => GENERATE_VERSE,
        }
    }

    pub fn battle_id(&self) -> Uuid {
        match self {
            JobKind::OrchestrateBattle { battle_id } => *battle_id,
            JobKind::GenerateVerse(job) => job.battle_id,
        }
    }

    /// Build a kind from a string tag and an untyped payload.
    pub fn from_raw(job_type: &str, payload: serde_json::Value) -> Result<Self, JobError> {
        if job_type != ORCHESTRATE_BATTLE && job_type != GENERATE_VERSE {
            return Err(JobError::UnknownJobType {
                job_type: job_type.to_string(),
            });
        }
        serde_json::from_value(serde_json::json!({ "type": job_type, "payload": payload }))
            .map_err(|e| JobError::InvalidPayload {
                reason: format!("{job_type}: {e}"),
            })
    }
}

/// A queued unit of work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub kind: JobKind,
    pub enqueued_at: DateTime<Utc>,
}

impl Job {
    pub fn new(kind: JobKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            enqueued_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_battle_job_parses() {
        let id = Uuid::new_v4();
        let kind = JobKind::from_raw(ORCHESTRATE_BATTLE, serde_json::json!({ "battleId": id }))
            .unwrap();
        assert_eq!(kind, JobKind::OrchestrateBattle { battle_id: id });
        assert_eq!(kind.type_name(), "generateBattle");
    }

    #[test]
    fn raw_verse_job_defaults_prior_verses() {
        let id = Uuid::new_v4();
        let kind = JobKind::from_raw(
            GENERATE_VERSE,
            serde_json::json!({ "battleId": id, "round": 2, "author": "Beta" }),
        )
        .unwrap();
        match kind {
            JobKind::GenerateVerse(job) => {
                assert_eq!(job.round, 2);
                assert_eq!(job.author, "Beta");
                assert!(job.prior_verses.is_empty());
            }
            other => panic!("unexpected kind: {other:?}"),
        }
    }

    #[test]
    fn unknown_tag_is_rejected() {
        let err = JobKind::from_raw("renderVideo", serde_json::json!({})).unwrap_err();
        assert!(matches!(err, JobError::UnknownJobType { ref job_type } if job_type == "renderVideo"));
    }

    #[test]
    fn bad_payload_is_invalid() {
        let err = JobKind::from_raw(ORCHESTRATE_BATTLE, serde_json::json!({ "battleId": 7 }))
            .unwrap_err();
        assert!(matches!(err, JobError::InvalidPayload { .. }));
    }

    #[test]
    fn kind_serializes_with_tag_and_payload() {
        let id = Uuid::new_v4();
        let value = serde_json::to_value(JobKind::OrchestrateBattle { battle_id: id }).unwrap();
        assert_eq!(value["type"], "generateBattle");
        assert_eq!(value["payload"]["battleId"], id.to_string());
    }
}
