//! Error types for the battle job system.

use std::time::Duration;

use uuid::Uuid;

use crate::audio::TaskStatus;

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Audio provider error: {0}")]
    Audio(#[from] AudioError),

    #[error("Job error: {0}")]
    Job(#[from] JobError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Database-related errors.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Constraint violation: {0}")]
    Constraint(String),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Lyric generation (LLM provider) errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },
}

/// Audio synthesis provider errors.
#[derive(Debug, thiserror::Error)]
pub enum AudioError {
    #[error("Provider {provider} rate limited: {body}")]
    RateLimited { provider: String, body: String },

    #[error("Provider {provider} returned HTTP {status}: {body}")]
    Http {
        provider: String,
        status: u16,
        body: String,
    },

    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },
}

impl AudioError {
    /// Whether this error is a rate-limit rejection worth retrying.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, AudioError::RateLimited { .. })
    }
}

/// Job pipeline errors.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("Battle {id} not found")]
    BattleNotFound { id: Uuid },

    #[error("Verse {id} not found")]
    UnitNotFound { id: Uuid },

    #[error("Audio submission failed after {attempts} attempts: {reason}")]
    Submission { attempts: u32, reason: String },

    #[error("Remote task {task_id} ended with status {status}: {reason}")]
    RemoteTask {
        task_id: String,
        status: TaskStatus,
        reason: String,
    },

    #[error("Remote task {task_id} timed out after {waited:?}")]
    Timeout { task_id: String, waited: Duration },

    #[error("Unknown job type: {job_type}")]
    UnknownJobType { job_type: String },

    #[error("Battle {id} is {state}, cannot transition to {target}")]
    InvalidTransition {
        id: Uuid,
        state: String,
        target: String,
    },

    #[error("Invalid job payload: {reason}")]
    InvalidPayload { reason: String },
}

/// Result type alias for the crate.
pub type Result<T> = std::result::Result<T, Error>;
