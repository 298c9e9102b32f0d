use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{build_prompt, status_error, GenerationParams, Generator};
use crate::context::ContextBundle;
use crate::error::{KgragError, Result};
use crate::retry::with_backoff;

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const API_VERSION: &str = "2023-06-01";

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    system: &'a str,
    messages: Vec<Message<'a>>,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

/// Anthropic messages API client
pub struct AnthropicGenerator {
    client: Client,
    api_key: String,
    base_url: String,
    params: GenerationParams,
}

impl AnthropicGenerator {
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
        let request = MessagesRequest {
            model: &self.params.model,
            max_tokens: self.params.max_tokens,
            temperature: self.params.temperature.min(1.0),
            system,
            messages: vec![Message {
                role: "user",
                content: user,
            }],
        };

        let response = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&request)
            .send()
            .await
            .map_err(|e| KgragError::Generation(format!("Network error: {}", e)))?;

        if !response.status().is_success() {
            return Err(status_error("Anthropic", response).await);
        }

        let result: MessagesResponse = response
            .json()
            .await
            .map_err(|e| KgragError::Generation(format!("Failed to parse response: {}", e)))?;

        first_text(result)
    }
}

fn first_text(response: MessagesResponse) -> Result<String> {
    response
        .content
        .into_iter()
        .find(|block| block.kind == "text")
        .map(|block| block.text)
        .ok_or_else(|| KgragError::Generation("Empty response from Anthropic API".to_string()))
}

#[async_trait]
impl Generator for AnthropicGenerator {
    async fn generate(&self, bundle: &ContextBundle) -> Result<String> {
        let prompt = build_prompt(bundle);
        with_backoff(
            "Anthropic completion",
            self.params.max_retries,
            Duration::from_secs(1),
            || self.complete(prompt.system, &prompt.user),
        )
        .await
    }

    fn describe(&self) -> String {
        format!("anthropic/{}", self.params.model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_body_carries_system_separately() {
        let body = serde_json::to_value(MessagesRequest {
            model: "claude-3-haiku-20240307",
            max_tokens: 500,
            temperature: 0.7,
            system: "sys",
            messages: vec![Message {
                role: "user",
                content: "hi",
            }],
        })
        .unwrap();
        assert_eq!(body["system"], "sys");
        assert_eq!(body["messages"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_first_text_block() {
        let raw = r#"{"content":[{"type":"tool_use","id":"x"},{"type":"text","text":"Patch often."}]}"#;
        let parsed: MessagesResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(first_text(parsed).unwrap(), "Patch often.");

        let empty: MessagesResponse = serde_json::from_str(r#"{"content":[]}"#).unwrap();
        assert!(first_text(empty).is_err());
    }
}
