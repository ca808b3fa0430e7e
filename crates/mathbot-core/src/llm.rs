//! Chat-completion seam shared by the hosted (OpenAI-compatible) and local (Ollama) backends.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::ollama::OllamaError;
use crate::openai::OpenAiError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One turn of a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: Role::System, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }
}

#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Model identifier sent with each request.
    fn model_id(&self) -> &str;

    /// Send the whole history and return the generated reply text.
    async fn complete(&self, messages: &[Message]) -> Result<String, LlmError>;
}

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error(transparent)]
    OpenAi(#[from] OpenAiError),
    #[error(transparent)]
    Ollama(#[from] OllamaError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roles_serialize_lowercase() {
        let m = Message::assistant("2x");
        let json = serde_json::to_string(&m).unwrap();
        assert_eq!(json, r#"{"role":"assistant","content":"2x"}"#);
    }
}
