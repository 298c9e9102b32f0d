use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{build_prompt, status_error, GenerationParams, Generator};
use crate::context::ContextBundle;
use crate::error::{KgragError, Result};
use crate::retry::with_backoff;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

/// OpenAI chat completions client
pub struct OpenAIGenerator {
    client: Client,
    api_key: String,
    base_url: String,
    params: GenerationParams,
}

impl OpenAIGenerator {
    /// `base_url` overrides the API root (e.g. an OpenAI-compatible proxy)
    pub fn new(client: Client, api_key: String, base_url: Option<String>, params: GenerationParams) -> Self {
        let base_url = base_url
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();
        Self {
            client,
            api_key,
            base_url,
            params,
        }
    }

    async fn complete(&self, system: &str, user: &str) -> Result<String> {
        let request = ChatRequest {
            model: &self.params.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            temperature: self.params.temperature,
            max_tokens: self.params.max_tokens,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| KgragError::Generation(format!("Network error: {}", e)))?;

        if !response.status().is_success() {
            return Err(status_error("OpenAI", response).await);
        }

        let result: ChatResponse = response
            .json()
            .await
            .map_err(|e| KgragError::Generation(format!("Failed to parse response: {}", e)))?;

        result
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| KgragError::Generation("Empty response from OpenAI API".to_string()))
    }
}

#[async_trait]
impl Generator for OpenAIGenerator {
    async fn generate(&self, bundle: &ContextBundle) -> Result<String> {
        let prompt = build_prompt(bundle);
        with_backoff(
            "OpenAI completion",
            self.params.max_retries,
            Duration::from_secs(1),
            || self.complete(prompt.system, &prompt.user),
        )
        .await
    }

    fn describe(&self) -> String {
        format!("openai/{}", self.params.model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> GenerationParams {
        GenerationParams {
            model: "gpt-3.5-turbo".to_string(),
            temperature: 0.7,
            max_tokens: 500,
            max_retries: 0,
        }
    }

    #[test]
    fn test_request_body_shape() {
        let body = serde_json::to_value(ChatRequest {
            model: "gpt-3.5-turbo",
            messages: vec![ChatMessage {
                role: "user",
                content: "hi",
            }],
            temperature: 0.5,
            max_tokens: 500,
        })
        .unwrap();
        assert_eq!(body["model"], "gpt-3.5-turbo");
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["max_tokens"], 500);
    }

    #[test]
    fn test_response_parsing() {
        let raw = r#"{"choices":[{"message":{"role":"assistant","content":"Use MFA."}}]}"#;
        let parsed: ChatResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.choices[0].message.content.as_deref(), Some("Use MFA."));
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let generator = OpenAIGenerator::new(
            Client::new(),
            "k".to_string(),
            Some("http://localhost:8080/v1/".to_string()),
            params(),
        );
        assert_eq!(generator.base_url, "http://localhost:8080/v1");
        assert_eq!(generator.describe(), "openai/gpt-3.5-turbo");
    }
}
