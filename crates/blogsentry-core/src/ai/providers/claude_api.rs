use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{AiProvider, Completion};
use crate::{Error, Result};

const ANTHROPIC_MESSAGES_URL: &str = "https://api.anthropic.com/v1/messages";

#[derive(Serialize)]
struct ClaudeRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    system: &'a str,
    messages: Vec<ClaudeMessage<'a>>,
}

#[derive(Serialize)]
struct ClaudeMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ClaudeResponse {
    content: Option<Vec<ClaudeContent>>,
    error: Option<ClaudeError>,
}

#[derive(Deserialize)]
struct ClaudeContent {
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
struct ClaudeError {
    message: String,
}

/// Claude/Anthropic Messages API provider
pub struct ClaudeApiProvider {
    client: Client,
    api_key: String,
    model: String,
    endpoint: String,
}

impl ClaudeApiProvider {
    pub fn new(api_key: &str, model: &str, timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| Error::AiProvider(format!("Failed to build Claude HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key: api_key.to_string(),
            model: model.to_string(),
            endpoint: ANTHROPIC_MESSAGES_URL.to_string(),
        })
    }
}

#[async_trait::async_trait]
impl AiProvider for ClaudeApiProvider {
    fn name(&self) -> &str {
        "claude_api"
    }

    async fn complete(&self, request: Completion<'_>) -> Result<String> {
        let body = ClaudeRequest {
            model: &self.model,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            system: request.system,
            messages: vec![ClaudeMessage {
                role: "user",
                content: request.prompt,
            }],
        };

        let response = self
            .client
            .post(&self.endpoint)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::AiProvider(format!("Claude API request failed: {}", e)))?;

        let status = response.status();
        let claude_response: ClaudeResponse = response.json().await.map_err(|e| {
            Error::AiProvider(format!("Failed to parse Claude response (HTTP {}): {}", status, e))
        })?;

        if let Some(error) = claude_response.error {
            return Err(Error::AiProvider(format!(
                "Claude API error (HTTP {}): {}",
                status.as_u16(),
                error.message
            )));
        }

        let text: String = claude_response
            .content
            .unwrap_or_default()
            .into_iter()
            .map(|c| c.text)
            .collect();

        if text.trim().is_empty() {
            return Err(Error::AiProvider("Claude API returned an empty reply".to_string()));
        }

        Ok(text)
    }
}
