//! The long-lived pieces (embedder, chat model, vector store) built once from [Config] by the
//! process entry point and lent to ingestion, retrieval and chat.

use std::path::Path;

use crate::chat::ChatSession;
use crate::chunks::{ChunkingError, ChunkingOptions};
use crate::config::{ChatProvider, Config, ConfigError, EmbeddingProvider};
use crate::embed::{Embedder, HashEmbedder};
use crate::ingest::{ingest_folder, IngestError, IngestReport};
use crate::llm::ChatModel;
use crate::ollama::{OllamaClient, OllamaError};
use crate::openai::OpenAiClient;
use crate::retriever::Retriever;
use crate::store::{StoreError, VectorStore};

pub struct Services {
    pub embedder: Box<dyn Embedder>,
    pub chat_model: Box<dyn ChatModel>,
    pub store: VectorStore,
    pub chunking: ChunkingOptions,
    pub top_k: usize,
}

impl Services {
    /// Builds every service from config, opening the on-disk index.
    pub fn from_config(config: &Config) -> Result<Self, ServicesError> {
        let store = VectorStore::open(&config.index_path()?, &config.collection)?;
        Self::with_store(config, store)
    }

    /// Like [Services::from_config] but with a caller-supplied store.
    pub fn with_store(config: &Config, store: VectorStore) -> Result<Self, ServicesError> {
        Ok(Self {
            embedder: build_embedder(config)?,
            chat_model: build_chat_model(config)?,
            store,
            chunking: config.chunking_options()?,
            top_k: config.retrieval.top_k,
        })
    }

    /// Assembles services from parts already built; used by tests and embedders of the library.
    pub fn from_parts(
        embedder: Box<dyn Embedder>,
        chat_model: Box<dyn ChatModel>,
        store: VectorStore,
        chunking: ChunkingOptions,
        top_k: usize,
    ) -> Self {
        Self {
            embedder,
            chat_model,
            store,
            chunking,
            top_k,
        }
    }

    pub fn retriever(&self) -> Retriever<'_> {
        Retriever::new(self.embedder.as_ref(), &self.store)
    }

    /// A fresh chat session retrieving `top_k` chunks per question.
    pub fn session(&self, top_k: usize) -> ChatSession<'_> {
        ChatSession::new(self.retriever(), self.chat_model.as_ref(), top_k)
    }

    pub async fn ingest(&mut self, dir: &Path) -> Result<IngestReport, IngestError> {
        ingest_folder(dir, self.embedder.as_ref(), &mut self.store, &self.chunking).await
    }
}

fn build_embedder(config: &Config) -> Result<Box<dyn Embedder>, ServicesError> {
    let e = &config.embedding;
    Ok(match e.provider {
        EmbeddingProvider::Ollama => Box::new(
            OllamaClient::from_url(&e.base_url)?.with_embed_model(e.model.clone()),
        ),
        EmbeddingProvider::Hash => Box::new(HashEmbedder::new(e.dimensions)),
    })
}

fn build_chat_model(config: &Config) -> Result<Box<dyn ChatModel>, ServicesError> {
    let c = &config.chat;
    Ok(match c.provider {
        ChatProvider::OpenAi => Box::new(OpenAiClient::from_env(
            &c.base_url,
            &c.api_key_env,
            c.model.clone(),
        )),
        ChatProvider::Ollama => {
            Box::new(OllamaClient::from_url(&c.base_url)?.with_chat_model(c.model.clone()))
        }
    })
}

#[derive(Debug, thiserror::Error)]
pub enum ServicesError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Chunking(#[from] ChunkingError),
    #[error("could not open index: {0}")]
    Store(#[from] StoreError),
    #[error(transparent)]
    Ollama(#[from] OllamaError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EmbeddingConfig;

    #[test]
    fn builds_hash_embedder_from_config() {
        let config = Config {
            embedding: EmbeddingConfig {
                provider: EmbeddingProvider::Hash,
                dimensions: 48,
                ..EmbeddingConfig::default()
            },
            ..Config::default()
        };
        let store = VectorStore::open_in_memory(&config.collection).unwrap();
        let services = Services::with_store(&config, store).unwrap();
        assert_eq!(services.embedder.model_id(), "hash");
        assert_eq!(services.chat_model.model_id(), crate::openai::DEFAULT_CHAT_MODEL);
        assert_eq!(services.top_k, config.retrieval.top_k);
    }

    #[test]
    fn bad_chunking_config_is_reported() {
        let mut config = Config::default();
        config.chunking.overlap = 5000;
        let store = VectorStore::open_in_memory("t").unwrap();
        assert!(matches!(
            Services::with_store(&config, store),
            Err(ServicesError::Chunking(_))
        ));
    }
}
