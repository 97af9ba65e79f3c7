
use anyhow::{Context, Result, anyhow, bail};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

use super::ChatMessage;
use crate::config::{ApiKey, LlmConfig};

/// Longest slice of an error body echoed back in messages
const MAX_ERROR_BODY_CHARS: usize = 300;

/// Blocking client for Mistral's chat-completion endpoint
#[derive(Debug, Clone)]
pub struct MistralClient {
    endpoint: Url,
    model: String,
    temperature: f32,
    api_key: ApiKey,
    agent: ureq::Agent,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: &'a [ChatMessage],
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    #[serde(default)]
    content: Option<String>,
}

impl MistralClient {
    #[inline]
    pub fn new(config: &LlmConfig, api_key: ApiKey) -> Result<Self> {
        let endpoint = config
            .chat_completions_url()
            .context("Invalid LLM API base URL")?;

        // Error statuses are read as normal responses so the body can be reported
        let agent = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(config.timeout_seconds)))
            .http_status_as_error(false)
            .build()
            .into();

        Ok(Self {
            endpoint,
            model: config.model.clone(),
            temperature: config.temperature,
            api_key,
            agent,
        })
    }

    #[inline]
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Send one chat-completion request and return the assistant's reply
    #[inline]
    pub fn chat(&self, messages: &[ChatMessage]) -> Result<String> {
        let request = ChatRequest {
            model: &self.model,
            temperature: self.temperature,
            messages,
        };
        let request_json =
            serde_json::to_string(&request).context("Failed to serialize chat request")?;

        debug!(
            "Sending {} messages to {} with model {}",
            messages.len(),
            self.endpoint,
            self.model
        );

        let mut response = self
            .agent
            .post(self.endpoint.as_str())
            .header("Authorization", &format!("Bearer {}", self.api_key.expose()))
            .header("Content-Type", "application/json")
            .header("Accept", "application/json")
            .send(&request_json)
            .map_err(|e| anyhow!("Failed to reach {}: {}", self.endpoint, e))?;

        let status = response.status();
        let body = response
            .body_mut()
            .read_to_string()
            .context("Failed to read chat completion response")?;

        if !status.is_success() {
            let excerpt: String = body.trim().chars().take(MAX_ERROR_BODY_CHARS).collect();
            bail!("Mistral API returned HTTP {}: {}", status.as_u16(), excerpt);
        }

        let parsed: ChatResponse =
            serde_json::from_str(&body).context("Malformed chat completion response")?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("Malformed chat completion response: no choices returned"))?
            .message
            .content
            .unwrap_or_default();

        if content.trim().is_empty() {
            bail!("Malformed chat completion response: empty message content");
        }

        info!(
            "Received {} chars from model {}",
            content.chars().count(),
            self.model
        );
        Ok(content)
    }
}
