//! Persisted config (PDF folder, index location, model choices) in the app data directory.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::app_data;
use crate::chunks::{ChunkingError, ChunkingOptions, DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE};

const CONFIG_FILENAME: &str = "config.toml";

pub const DEFAULT_PDF_DIR: &str = "pdfs";
pub const DEFAULT_COLLECTION: &str = "math_books";
pub const DEFAULT_TOP_K: usize = 3;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Folder holding the PDF textbooks (chosen by the user).
    pub pdf_dir: String,
    /// Vector index file. Defaults to `index.sqlite3` in the app data directory.
    pub db_path: Option<String>,
    /// Collection inside the index that ingestion writes to and queries read from.
    pub collection: String,
    pub chunking: ChunkingConfig,
    pub retrieval: RetrievalConfig,
    pub embedding: EmbeddingConfig,
    pub chat: ChatConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            pdf_dir: DEFAULT_PDF_DIR.to_string(),
            db_path: None,
            collection: DEFAULT_COLLECTION.to_string(),
            chunking: ChunkingConfig::default(),
            retrieval: RetrievalConfig::default(),
            embedding: EmbeddingConfig::default(),
            chat: ChatConfig::default(),
        }
    }
}

impl Config {
    /// Resolved path of the vector index.
    pub fn index_path(&self) -> Result<PathBuf, ConfigError> {
        match self.db_path.as_deref().filter(|s| !s.is_empty()) {
            Some(p) => Ok(PathBuf::from(p)),
            None => app_data::default_index_path().ok_or(ConfigError::NoDataDir),
        }
    }

    /// Validated chunker settings.
    pub fn chunking_options(&self) -> Result<ChunkingOptions, ChunkingError> {
        ChunkingOptions::new(self.chunking.size, self.chunking.overlap)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Window length in characters.
    pub size: usize,
    /// Characters shared by consecutive windows.
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            size: DEFAULT_CHUNK_SIZE,
            overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    Ollama,
    /// Offline token-hashing embedder; no model download, lexical matches only.
    Hash,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub provider: EmbeddingProvider,
    pub model: String,
    pub base_url: String,
    /// Vector length for the hash embedder. Ollama models decide their own.
    pub dimensions: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProvider::Ollama,
            model: crate::ollama::DEFAULT_EMBED_MODEL.to_string(),
            base_url: crate::ollama::DEFAULT_BASE_URL.to_string(),
            dimensions: crate::embed::DEFAULT_HASH_DIMENSIONS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatProvider {
    /// Any OpenAI-compatible `/chat/completions` endpoint.
    OpenAi,
    Ollama,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    pub provider: ChatProvider,
    pub model: String,
    pub base_url: String,
    /// Name of the environment variable holding the API key. The key itself is never persisted.
    pub api_key_env: String,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            provider: ChatProvider::OpenAi,
            model: crate::openai::DEFAULT_CHAT_MODEL.to_string(),
            base_url: crate::openai::DEFAULT_BASE_URL.to_string(),
            api_key_env: crate::openai::DEFAULT_API_KEY_ENV.to_string(),
        }
    }
}

/// Load config from the app data directory. Returns default config if missing or invalid.
pub fn load_config() -> Config {
    let Some(data_dir) = app_data::app_data_dir() else {
        return Config::default();
    };
    let path = data_dir.join(CONFIG_FILENAME);
    let Ok(s) = std::fs::read_to_string(&path) else {
        return Config::default();
    };
    toml::from_str(&s).unwrap_or_default()
}

/// Load config from an explicit file. Unlike [load_config], errors are reported.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let s = std::fs::read_to_string(path).map_err(|e| ConfigError::Read(path.to_path_buf(), e))?;
    toml::from_str(&s).map_err(ConfigError::Parse)
}

/// Save config to the app data directory.
pub fn save_config(config: &Config) -> Result<(), ConfigError> {
    let data_dir = app_data::app_data_dir().ok_or(ConfigError::NoDataDir)?;
    save_config_to(config, &data_dir.join(CONFIG_FILENAME))
}

/// Save config to an explicit file.
pub fn save_config_to(config: &Config, path: &Path) -> Result<(), ConfigError> {
    std::fs::write(path, config.to_toml()?).map_err(ConfigError::Write)
}

/// Set and persist the PDF folder, in `config_file` when given, else in the app data directory.
/// Returns the canonical folder that was stored.
pub fn set_pdf_dir(path: &Path, config_file: Option<&Path>) -> Result<PathBuf, ConfigError> {
    let path = path.canonicalize().map_err(ConfigError::Canonicalize)?;
    if !path.is_dir() {
        return Err(ConfigError::NotADirectory(path));
    }
    let mut config = match config_file {
        Some(file) => load_config_from(file)?,
        None => load_config(),
    };
    config.pdf_dir = path.to_string_lossy().into_owned();
    match config_file {
        Some(file) => save_config_to(&config, file)?,
        None => save_config(&config)?,
    }
    Ok(path)
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not determine app data directory")]
    NoDataDir,
    #[error("failed to read config {0}: {1}")]
    Read(PathBuf, std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(toml::de::Error),
    #[error("failed to serialize config: {0}")]
    Serialize(toml::ser::Error),
    #[error("failed to write config: {0}")]
    Write(std::io::Error),
    #[error("failed to resolve path: {0}")]
    Canonicalize(std::io::Error),
    #[error("not a directory: {0}")]
    NotADirectory(PathBuf),
}
