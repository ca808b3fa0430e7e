//! Client for hosted OpenAI-compatible chat completions (`POST {base_url}/chat/completions`).
//!
//! Works with api.openai.com and any server speaking the same wire format. The request
//! carries no timeout: a stalled provider stalls the interaction.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::llm::{ChatModel, LlmError, Message};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_CHAT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_API_KEY_ENV: &str = "OPENAI_API_KEY";

const CHAT_PATH: &str = "/chat/completions";

pub struct OpenAiClient {
    base_url: String,
    api_key: String,
    model: String,
    client: reqwest::Client,
}

impl OpenAiClient {
    pub fn new(base_url: &str, api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
            client: reqwest::Client::new(),
        }
    }

    /// Reads the API key from `key_env`. Missing key is an error only when a request is made.
    pub fn from_env(base_url: &str, key_env: &str, model: impl Into<String>) -> Self {
        Self::new(base_url, std::env::var(key_env).unwrap_or_default(), model)
    }

    fn endpoint(&self) -> String {
        format!("{}{}", self.base_url, CHAT_PATH)
    }

    /// Send a conversation and return the first choice's content.
    pub async fn chat(&self, messages: &[Message]) -> Result<String, OpenAiError> {
        if self.api_key.is_empty() {
            return Err(OpenAiError::ApiKeyMissing);
        }
        let body = json!({
            "model": self.model,
            "messages": messages,
        });
        let resp = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(OpenAiError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        let parsed: ChatCompletionResponse = resp.json().await?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or(OpenAiError::EmptyResponse)
    }
}

impl std::fmt::Debug for OpenAiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiClient")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[async_trait]
impl ChatModel for OpenAiClient {
    fn model_id(&self) -> &str {
        &self.model
    }

    async fn complete(&self, messages: &[Message]) -> Result<String, LlmError> {
        Ok(self.chat(messages).await?)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum OpenAiError {
    #[error("API key missing; set it in the environment")]
    ApiKeyMissing,
    #[error("chat request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("chat API returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("chat API returned no choices")]
    EmptyResponse,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_joins_without_double_slash() {
        let c = OpenAiClient::new("https://api.example.com/v1/", "k", "m");
        assert_eq!(c.endpoint(), "https://api.example.com/v1/chat/completions");
    }

    #[test]
    fn parses_first_choice() {
        let raw = r#"{"id":"x","choices":[{"index":0,"message":{"role":"assistant","content":"2x"}}]}"#;
        let parsed: ChatCompletionResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.choices[0].message.content.as_deref(), Some("2x"));
    }

    #[test]
    fn debug_hides_the_key() {
        let c = OpenAiClient::new(DEFAULT_BASE_URL, "sk-secret", DEFAULT_CHAT_MODEL);
        assert!(!format!("{c:?}").contains("sk-secret"));
    }

    #[tokio::test]
    async fn missing_key_fails_before_any_request() {
        let c = OpenAiClient::new("http://127.0.0.1:9", "", DEFAULT_CHAT_MODEL);
        let err = c.chat(&[Message::user("hi")]).await.unwrap_err();
        assert!(matches!(err, OpenAiError::ApiKeyMissing));
    }
}
