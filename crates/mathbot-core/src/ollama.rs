//! Ollama client for embeddings and chat. Wraps ollama-rs with a simple API.

use async_trait::async_trait;
use ollama_rs::generation::chat::request::ChatMessageRequest;
use ollama_rs::generation::chat::ChatMessage;
use ollama_rs::generation::embeddings::request::{EmbeddingsInput, GenerateEmbeddingsRequest};
use ollama_rs::Ollama;
use thiserror::Error;

use crate::embed::{EmbedError, Embedder};
use crate::llm::{ChatModel, LlmError, Message, Role};

/// Ollama's build of sentence-transformers `all-MiniLM-L6-v2`.
pub const DEFAULT_EMBED_MODEL: &str = "all-minilm";
pub const DEFAULT_CHAT_MODEL: &str = "llama3.2";
pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";

/// Thin wrapper around Ollama for embedding and completion.
#[derive(Debug, Clone)]
pub struct OllamaClient {
    inner: Ollama,
    embed_model: String,
    chat_model: String,
}

impl OllamaClient {
    /// Create from URL string, e.g. `http://localhost:11434`.
    pub fn from_url(url: &str) -> Result<Self, OllamaError> {
        let inner = Ollama::try_new(url).map_err(OllamaError::ParseUrl)?;
        Ok(Self {
            inner,
            embed_model: DEFAULT_EMBED_MODEL.to_string(),
            chat_model: DEFAULT_CHAT_MODEL.to_string(),
        })
    }

    /// Set the embedding model (e.g. `all-minilm`, `nomic-embed-text`).
    pub fn with_embed_model(mut self, model: impl Into<String>) -> Self {
        self.embed_model = model.into();
        self
    }

    /// Set the chat model (e.g. `llama3.2`, `qwen2.5-math`).
    pub fn with_chat_model(mut self, model: impl Into<String>) -> Self {
        self.chat_model = model.into();
        self
    }

    /// Embed multiple strings in one call. Returns one embedding per input.
    pub async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, OllamaError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let req = GenerateEmbeddingsRequest::new(
            self.embed_model.clone(),
            EmbeddingsInput::Multiple(texts.to_vec()),
        );
        let res = self
            .inner
            .generate_embeddings(req)
            .await
            .map_err(OllamaError::Request)?;
        Ok(res.embeddings)
    }

    /// Send a conversation to the chat model and return the reply text.
    pub async fn chat(&self, messages: &[Message]) -> Result<String, OllamaError> {
        let history = messages.iter().map(to_ollama_message).collect();
        let req = ChatMessageRequest::new(self.chat_model.clone(), history);
        let res = self
            .inner
            .send_chat_messages(req)
            .await
            .map_err(OllamaError::Request)?;
        Ok(res.message.content)
    }
}

fn to_ollama_message(m: &Message) -> ChatMessage {
    match m.role {
        Role::System => ChatMessage::system(m.content.clone()),
        Role::User => ChatMessage::user(m.content.clone()),
        Role::Assistant => ChatMessage::assistant(m.content.clone()),
    }
}

#[async_trait]
impl Embedder for OllamaClient {
    fn model_id(&self) -> &str {
        &self.embed_model
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        let out = self.embed_texts(texts).await?;
        if out.len() != texts.len() {
            return Err(EmbedError::CountMismatch {
                expected: texts.len(),
                actual: out.len(),
            });
        }
        Ok(out)
    }
}

#[async_trait]
impl ChatModel for OllamaClient {
    fn model_id(&self) -> &str {
        &self.chat_model
    }

    async fn complete(&self, messages: &[Message]) -> Result<String, LlmError> {
        Ok(self.chat(messages).await?)
    }
}

#[derive(Debug, Error)]
pub enum OllamaError {
    #[error("invalid Ollama URL: {0}")]
    ParseUrl(#[from] url::ParseError),
    #[error("Ollama request failed: {0}")]
    Request(#[from] ollama_rs::error::OllamaError),
}
