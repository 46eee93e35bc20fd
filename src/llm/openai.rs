//! OpenAI-compatible `chat/completions` client.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{ChatMessage, ChatModel, supports_system_message};
use crate::config::LlmConfig;
use crate::errors::LlmError;

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

pub struct OpenAiClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    temperature: Option<f32>,
}

impl OpenAiClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
            temperature: None,
        }
    }

    pub fn with_temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }

    /// Build from config; the API key comes from the environment.
    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        let api_key = config.api_key()?;
        Ok(Self::new(&config.base_url, api_key, &config.model)
            .with_temperature(config.temperature))
    }

    fn request<'a>(&'a self, messages: &'a [ChatMessage]) -> ChatRequest<'a> {
        // o1-style models reject a custom temperature as well as system messages
        let temperature = if supports_system_message(&self.model) {
            self.temperature
        } else {
            None
        };
        ChatRequest {
            model: &self.model,
            messages,
            temperature,
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl ChatModel for OpenAiClient {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, LlmError> {
        let request = self.request(messages);
        debug!(model = %self.model, messages = messages.len(), "chat completion request");

        let resp = self
            .http
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(LlmError::Request)?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(LlmError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatResponse = resp
            .json()
            .await
            .map_err(|e| LlmError::Decode(e.to_string()))?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(LlmError::EmptyResponse)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
