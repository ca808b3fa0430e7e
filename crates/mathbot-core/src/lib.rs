//! All backend logic independent of how the app is run.
//!
//! PDF textbooks live in a folder the user chooses. MathBot stores only its config and the
//! vector index in its own app data directory (see [app_data]).

pub mod app_data;
pub mod chat;
pub mod chunks;
pub mod config;
pub mod embed;
pub mod ingest;
pub mod llm;
pub mod ollama;
pub mod openai;
pub mod pdf;
pub mod prompt;
pub mod retriever;
pub mod services;
pub mod store;

pub use app_data::{app_data_dir, default_index_path};
pub use chat::{AskOutcome, ChatError, ChatSession, Conversation};
pub use chunks::{
    chunk_pages, normalize_whitespace, split_into_chunks, Chunk, ChunkingError, ChunkingOptions,
};
pub use config::{
    load_config, load_config_from, save_config, save_config_to, set_pdf_dir, Config, ConfigError,
};
pub use embed::{EmbedError, Embedder, HashEmbedder};
pub use ingest::{ingest_document, ingest_folder, FileOutcome, FileReport, IngestError, IngestReport};
pub use llm::{ChatModel, LlmError, Message, Role};
pub use ollama::{OllamaClient, OllamaError};
pub use openai::{OpenAiClient, OpenAiError};
pub use pdf::{extract_pages, page_count, scan_pdfs, PageText, PdfError, ScanError};
pub use prompt::{build_prompt, SYSTEM_PROMPT};
pub use retriever::{RetrievalError, RetrievedChunk, Retriever};
pub use services::{Services, ServicesError};
pub use store::{ChunkMetadata, QueryResult, StoreError, StoreStats, VectorStore};

/// Returns a short status string. Used to verify the backend is wired up.
pub fn status() -> &'static str {
    "mathbot-core ready"
}
