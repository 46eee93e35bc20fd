//! Chat-completion boundary.

pub mod openai;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::LlmError;

pub use openai::OpenAiClient;

/// Models that reject a `system` role message and a custom temperature.
const NO_SYSTEM_ROLE_MODELS: &[&str] = &["o1-mini", "o1-preview"];

pub fn supports_system_message(model: &str) -> bool {
    !NO_SYSTEM_ROLE_MODELS
        .iter()
        .any(|prefix| model.starts_with(prefix))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// A model that turns a message list into one reply.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, LlmError>;

    fn model_name(&self) -> &str;
}
