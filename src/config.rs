//! Worker configuration.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;

use crate::audio::{Genre, MurekaConfig, PollOptions};
use crate::error::ConfigError;
use crate::lyrics::LyricsConfig;

/// Retry policy for the rate-limited audio submission.
#[derive(Debug, Clone, Copy)]
pub struct SubmitPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Backoff after the n-th rate-limited attempt is `n * backoff_base`.
    pub backoff_base: Duration,
}

impl Default for SubmitPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_base: Duration::from_secs(5),
        }
    }
}

/// Settings for the generation pipeline itself (no credentials).
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Upper bound on `total_rounds` accepted for a new battle.
    pub max_rounds: u32,
    /// Genre hint for lyrics and audio.
    pub genre: Genre,
    pub poll: PollOptions,
    pub submit: SubmitPolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_rounds: 2,
            genre: Genre::Rap,
            poll: PollOptions::default(),
            submit: SubmitPolicy::default(),
        }
    }
}

/// Full worker configuration, loaded from the environment by the binary.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub db_path: PathBuf,
    pub log_dir: Option<PathBuf>,
    pub pipeline: PipelineConfig,
    pub mureka: MurekaConfig,
    pub lyrics: LyricsConfig,
}

impl WorkerConfig {
    /// Build config from environment variables.
    ///
    /// `MUREKA_API_KEY` and `OPENAI_API_KEY` are required; everything else
    /// has a default.
    pub fn from_env() -> Result<Self, ConfigError> {
        let db_path = std::env::var("BATTLE_DB_PATH")
            .unwrap_or_else(|_| "./data/battles.db".to_string())
            .into();
        let log_dir = std::env::var("BATTLE_LOG_DIR").ok().map(PathBuf::from);

        let defaults = PipelineConfig::default();
        let pipeline = PipelineConfig {
            max_rounds: env_parse("BATTLE_MAX_ROUNDS", defaults.max_rounds)?,
            genre: env_parse("BATTLE_GENRE", defaults.genre)?,
            poll: PollOptions {
                interval: Duration::from_secs(env_parse(
                    "BATTLE_POLL_INTERVAL_SECS",
                    defaults.poll.interval.as_secs(),
                )?),
                max_wait: Duration::from_secs(env_parse(
                    "BATTLE_POLL_MAX_WAIT_SECS",
                    defaults.poll.max_wait.as_secs(),
                )?),
            },
            submit: SubmitPolicy {
                max_attempts: env_parse("BATTLE_SUBMIT_MAX_ATTEMPTS", defaults.submit.max_attempts)?,
                backoff_base: Duration::from_secs(env_parse(
                    "BATTLE_SUBMIT_BACKOFF_SECS",
                    defaults.submit.backoff_base.as_secs(),
                )?),
            },
        };
        if pipeline.max_rounds == 0 {
            return Err(ConfigError::InvalidValue {
                key: "BATTLE_MAX_ROUNDS".into(),
                message: "must be at least 1".into(),
            });
        }
        if pipeline.submit.max_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                key: "BATTLE_SUBMIT_MAX_ATTEMPTS".into(),
                message: "must be at least 1".into(),
            });
        }

        let mut mureka = MurekaConfig::new(required_secret("MUREKA_API_KEY")?);
        if let Ok(base_url) = std::env::var("MUREKA_BASE_URL") {
            mureka.base_url = base_url;
        }
        if let Ok(model) = std::env::var("MUREKA_MODEL") {
            mureka.model = model;
        }

        let mut lyrics = LyricsConfig::new(required_secret("OPENAI_API_KEY")?);
        if let Ok(model) = std::env::var("OPENAI_MODEL") {
            lyrics.model = model;
        }
        lyrics.max_tokens = env_parse("OPENAI_MAX_TOKENS", lyrics.max_tokens)?;
        lyrics.temperature = env_parse("OPENAI_TEMPERATURE", lyrics.temperature)?;

        Ok(Self {
            db_path,
            log_dir,
            pipeline,
            mureka,
            lyrics,
        })
    }
}

fn required_secret(key: &str) -> Result<SecretString, ConfigError> {
    std::env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .map(SecretString::from)
        .ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
}

/// Parse an optional env var, falling back to `default` when unset.
fn env_parse<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        }),
        Err(_) => Ok(default),
    }
}
