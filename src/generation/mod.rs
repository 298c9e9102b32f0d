//! Answer generation: one `Generator` per LLM provider, chosen once from
//! configuration.

pub mod anthropic;
pub mod openai;
pub mod prompt;
pub mod template;

pub use anthropic::AnthropicGenerator;
pub use openai::OpenAIGenerator;
pub use prompt::{build_prompt, Prompt};
pub use template::TemplateGenerator;

use async_trait::async_trait;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{require_api_key, GenerationConfig, GenerationProvider};
use crate::context::ContextBundle;
use crate::error::{KgragError, Result};

/// Turns a context bundle into answer text. The returned text is not
/// inspected.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, bundle: &ContextBundle) -> Result<String>;

    /// Provider/model label for reports.
    fn describe(&self) -> String;
}

/// Sampling and transport settings shared by the HTTP providers.
#[derive(Debug, Clone)]
pub struct GenerationParams {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub max_retries: usize,
}

impl From<&GenerationConfig> for GenerationParams {
    fn from(config: &GenerationConfig) -> Self {
        Self {
            model: config.model(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            max_retries: config.max_retries,
        }
    }
}

pub fn build_generator(config: &GenerationConfig) -> Result<Arc<dyn Generator>> {
    let generator: Arc<dyn Generator> = match config.provider {
        GenerationProvider::Template => Arc::new(TemplateGenerator),
        GenerationProvider::OpenAI => {
            let api_key = require_api_key(&config.api_key_env())?;
            Arc::new(OpenAIGenerator::new(
                http_client(config.timeout_secs)?,
                api_key,
                config.base_url.clone(),
                GenerationParams::from(config),
            ))
        }
        GenerationProvider::Anthropic => {
            let api_key = require_api_key(&config.api_key_env())?;
            Arc::new(AnthropicGenerator::new(
                http_client(config.timeout_secs)?,
                api_key,
                config.base_url.clone(),
                GenerationParams::from(config),
            ))
        }
    };
    log::info!("Using generator: {}", generator.describe());
    Ok(generator)
}

fn http_client(timeout_secs: u64) -> Result<Client> {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs.max(1)))
        .build()
        .map_err(|e| KgragError::Generation(format!("Failed to build HTTP client: {}", e)))
}

/// Read a non-success response into a `Generation` error carrying the status.
async fn status_error(provider: &str, response: reqwest::Response) -> KgragError {
    let status = response.status();
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Unable to read error response".to_string());
    KgragError::Generation(format!("{} API error {}: {}", provider, status, body))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_template_generator() {
        let generator = build_generator(&GenerationConfig::default()).unwrap();
        assert_eq!(generator.describe(), "template");
    }

    #[test]
    fn test_build_networked_generator_requires_key() {
        for provider in [GenerationProvider::OpenAI, GenerationProvider::Anthropic] {
            let config = GenerationConfig {
                provider,
                api_key_env: Some("KGRAG_TEST_MISSING_LLM_KEY".to_string()),
                ..GenerationConfig::default()
            };
            let err = build_generator(&config).err().unwrap();
            assert!(matches!(err, KgragError::Config(_)));
            assert!(err.to_string().contains("KGRAG_TEST_MISSING_LLM_KEY"));
        }
    }

    #[test]
    fn test_params_use_provider_default_model() {
        let config = GenerationConfig {
            provider: GenerationProvider::OpenAI,
            ..GenerationConfig::default()
        };
        let params = GenerationParams::from(&config);
        assert_eq!(params.model, "gpt-3.5-turbo");
        assert_eq!(params.max_tokens, 500);
        assert!((params.temperature - 0.7).abs() < 1e-6);
    }
}
