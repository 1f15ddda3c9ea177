//! Mureka song API client.
//!
//! `POST /v1/song/generate` starts a task, `GET /v1/song/query/{id}` reports
//! its state. A 429 is surfaced as `AudioError::RateLimited` so the caller
//! can back off; everything else non-2xx is `AudioError::Http`.

use async_trait::async_trait;
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, info};

use super::{AudioProvider, Genre, SongTask};
use crate::error::AudioError;

const PROVIDER: &str = "mureka";

/// Default API endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.mureka.ai";

/// Connection settings for the Mureka API.
#[derive(Debug, Clone)]
pub struct MurekaConfig {
    pub api_key: SecretString,
    pub base_url: String,
    /// Model name sent with each request.
    pub model: String,
}

impl MurekaConfig {
    pub fn new(api_key: SecretString) -> Self {
        Self {
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: "auto".to_string(),
        }
    }
}

/// HTTP client for the Mureka song API.
pub struct MurekaClient {
    config: MurekaConfig,
    client: reqwest::Client,
}

impl MurekaClient {
    pub fn new(config: MurekaConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}{path}", self.config.base_url.trim_end_matches('/'))
    }

    async fn decode(resp: reqwest::Response) -> Result<SongTask, AudioError> {
        let status = resp.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let body = resp.text().await.unwrap_or_default();
            return Err(AudioError::RateLimited {
                provider: PROVIDER.into(),
                body,
            });
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(AudioError::Http {
                provider: PROVIDER.into(),
                status: status.as_u16(),
                body,
            });
        }

        resp.json::<SongTask>()
            .await
            .map_err(|e| AudioError::InvalidResponse {
                provider: PROVIDER.into(),
                reason: e.to_string(),
            })
    }
}

#[async_trait]
impl AudioProvider for MurekaClient {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn submit(&self, lyrics: &str, genre: Genre) -> Result<SongTask, AudioError> {
        debug!(
            genre = genre.as_str(),
            lyrics_len = lyrics.len(),
            model = %self.config.model,
            "Submitting song generation"
        );

        let body = serde_json::json!({
            "lyrics": lyrics,
            "model": self.config.model,
            "prompt": genre.style_prompt(),
        });

        let resp = self
            .client
            .post(self.api_url("/v1/song/generate"))
            .bearer_auth(self.config.api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|e| AudioError::RequestFailed {
                provider: PROVIDER.into(),
                reason: e.to_string(),
            })?;

        let task = Self::decode(resp).await?;
        info!(task_id = %task.id, status = %task.status, "Song generation started");
        Ok(task)
    }

    async fn query(&self, task_id: &str) -> Result<SongTask, AudioError> {
        let resp = self
            .client
            .get(self.api_url(&format!("/v1/song/query/{task_id}")))
            .bearer_auth(self.config.api_key.expose_secret())
            .send()
            .await
            .map_err(|e| AudioError::RequestFailed {
                provider: PROVIDER.into(),
                reason: e.to_string(),
            })?;

        Self::decode(resp).await
    }
}
