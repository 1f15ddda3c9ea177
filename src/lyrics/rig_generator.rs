//! rig-core backed lyric generator (OpenAI).

use async_trait::async_trait;
use rig::client::CompletionClient;
use rig::completion::Prompt;
use rig::providers::openai;
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, info};

use super::{LyricsGenerator, VerseRequest, clean_verse};
use crate::error::LlmError;

const PROVIDER: &str = "openai";

/// Configuration for the lyric model.
#[derive(Debug, Clone)]
pub struct LyricsConfig {
    pub api_key: SecretString,
    pub model: String,
    pub max_tokens: u64,
    pub temperature: f64,
}

impl LyricsConfig {
    pub fn new(api_key: SecretString) -> Self {
        Self {
            api_key,
            model: "gpt-4o".to_string(),
            max_tokens: 400,
            temperature: 0.9,
        }
    }
}

/// Writes verses through an OpenAI chat model via rig-core.
pub struct RigLyricsGenerator {
    client: rig::client::Client<openai::client::OpenAIResponsesExt>,
    config: LyricsConfig,
}

impl RigLyricsGenerator {
    pub fn new(config: LyricsConfig) -> Result<Self, LlmError> {
        let client: rig::client::Client<openai::client::OpenAIResponsesExt> =
            openai::Client::new(config.api_key.expose_secret()).map_err(|e| {
                LlmError::RequestFailed {
                    provider: PROVIDER.to_string(),
                    reason: format!("Failed to create OpenAI client: {}", e),
                }
            })?;

        info!("Using OpenAI for lyrics (model: {})", config.model);
        Ok(Self { client, config })
    }

    pub fn model_name(&self) -> &str {
        &self.config.model
    }
}

#[async_trait]
impl LyricsGenerator for RigLyricsGenerator {
    async fn generate_verse(&self, request: &VerseRequest) -> Result<String, LlmError> {
        let system = request.system_prompt();
        let agent = self
            .client
            .agent(&self.config.model)
            .preamble(&system)
            .temperature(self.config.temperature)
            .max_tokens(self.config.max_tokens)
            .build();

        debug!(
            author = %request.author,
            prior = request.prior_verses.len(),
            "Requesting verse from model"
        );

        let raw = agent
            .prompt(request.user_prompt())
            .await
            .map_err(|e| LlmError::RequestFailed {
                provider: PROVIDER.to_string(),
                reason: e.to_string(),
            })?;

        let verse = clean_verse(&raw);
        if verse.is_empty() {
            return Err(LlmError::InvalidResponse {
                provider: PROVIDER.to_string(),
                reason: "model returned an empty verse".to_string(),
            });
        }
        Ok(verse)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructs_without_network() {
        // rig-core clients accept any string as API key at construction time.
        let generator = RigLyricsGenerator::new(LyricsConfig::new(SecretString::from("sk-test")));
        assert!(generator.is_ok());
        assert_eq!(generator.unwrap().model_name(), "gpt-4o");
    }
}
