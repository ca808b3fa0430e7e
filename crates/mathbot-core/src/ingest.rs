//! Ingestion pipeline: scan → extract pages → chunk → embed → store.
//!
//! Each PDF is handled independently: its chunks are embedded in one batch and written in one
//! transaction that replaces whatever the store held for that file. A file that fails is
//! reported and skipped; the rest of the folder is still ingested.

use std::path::Path;

use serde::Serialize;

use crate::chunks::{chunk_pages, ChunkingOptions};
use crate::embed::{EmbedError, Embedder};
use crate::pdf::{extract_pages, scan_pdfs, source_name, PageText, PdfError, ScanError};
use crate::store::{StoreError, VectorStore};

/// What happened to one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum FileOutcome {
    Ingested {
        pages: usize,
        /// Pages that yielded no text (scans, figures) and were left out.
        pages_skipped: usize,
        chunks: usize,
    },
    Failed {
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileReport {
    pub source: String,
    pub outcome: FileOutcome,
}

/// Per-file results of one ingestion run, in scan order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub files: Vec<FileReport>,
}

impl IngestReport {
    pub fn ingested_files(&self) -> usize {
        self.files
            .iter()
            .filter(|f| matches!(f.outcome, FileOutcome::Ingested { .. }))
            .count()
    }

    pub fn failed(&self) -> impl Iterator<Item = &FileReport> {
        self.files
            .iter()
            .filter(|f| matches!(f.outcome, FileOutcome::Failed { .. }))
    }

    pub fn total_chunks(&self) -> usize {
        self.files
            .iter()
            .map(|f| match f.outcome {
                FileOutcome::Ingested { chunks, .. } => chunks,
                FileOutcome::Failed { .. } => 0,
            })
            .sum()
    }

    pub fn is_complete(&self) -> bool {
        self.failed().next().is_none()
    }
}

/// Ingest every PDF directly inside `dir`. Only a missing or unreadable folder is an error;
/// per-file failures land in the report.
pub async fn ingest_folder(
    dir: &Path,
    embedder: &dyn Embedder,
    store: &mut VectorStore,
    opts: &ChunkingOptions,
) -> Result<IngestReport, IngestError> {
    let pdfs = scan_pdfs(dir)?;
    if pdfs.is_empty() {
        tracing::info!(dir = %dir.display(), "no PDF files found");
    }
    let mut report = IngestReport::default();
    for (i, path) in pdfs.iter().enumerate() {
        let source = source_name(path);
        tracing::info!("processing file {}/{}: {}", i + 1, pdfs.len(), source);
        let outcome = match ingest_pdf(path, &source, embedder, store, opts).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::warn!(source = %source, error = %e, "file not ingested");
                FileOutcome::Failed {
                    reason: e.to_string(),
                }
            }
        };
        report.files.push(FileReport { source, outcome });
    }
    tracing::info!(
        files = report.ingested_files(),
        chunks = report.total_chunks(),
        failed = report.failed().count(),
        "ingestion complete"
    );
    Ok(report)
}

async fn ingest_pdf(
    path: &Path,
    source: &str,
    embedder: &dyn Embedder,
    store: &mut VectorStore,
    opts: &ChunkingOptions,
) -> Result<FileOutcome, IngestError> {
    let pages = extract_pages(path)?;
    ingest_document(source, &pages, embedder, store, opts).await
}

/// Chunk, embed and store the pages of one document under `source`, replacing any
/// records previously stored for it.
pub async fn ingest_document(
    source: &str,
    pages: &[PageText],
    embedder: &dyn Embedder,
    store: &mut VectorStore,
    opts: &ChunkingOptions,
) -> Result<FileOutcome, IngestError> {
    let (with_text, blank): (Vec<PageText>, Vec<PageText>) =
        pages.iter().cloned().partition(|p| !p.is_blank());
    for p in &blank {
        tracing::debug!(source, page = p.number, "skipping page without text");
    }

    let chunks = chunk_pages(source, &with_text, opts);
    let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
    let embeddings = if texts.is_empty() {
        Vec::new()
    } else {
        embedder.embed_batch(&texts).await?
    };
    store.replace_source(source, &chunks, &embeddings, embedder.model_id())?;

    Ok(FileOutcome::Ingested {
        pages: pages.len(),
        pages_skipped: blank.len(),
        chunks: chunks.len(),
    })
}

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("scan error: {0}")]
    Scan(#[from] ScanError),
    #[error("{0}")]
    Pdf(#[from] PdfError),
    #[error("embedding error: {0}")]
    Embed(#[from] EmbedError),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embed::HashEmbedder;

    fn page(number: u32, text: &str) -> PageText {
        PageText {
            number,
            text: text.to_string(),
        }
    }

    #[tokio::test]
    async fn blank_pages_are_skipped_and_counted() {
        let mut store = VectorStore::open_in_memory("t").unwrap();
        let pages = vec![page(1, "Limits."), page(2, "  \n"), page(3, "Series.")];
        let outcome = ingest_document(
            "calc.pdf",
            &pages,
            &HashEmbedder::new(32),
            &mut store,
            &ChunkingOptions::default(),
        )
        .await
        .unwrap();
        assert_eq!(
            outcome,
            FileOutcome::Ingested {
                pages: 3,
                pages_skipped: 1,
                chunks: 2
            }
        );
        let stored = store.chunks_for_source("calc.pdf").unwrap();
        assert_eq!(stored[1].metadata.page, 3);
        assert_eq!(stored[1].metadata.chunk_index, 1);
    }

    #[tokio::test]
    async fn document_without_text_clears_previous_rows() {
        let mut store = VectorStore::open_in_memory("t").unwrap();
        let e = HashEmbedder::new(16);
        let opts = ChunkingOptions::default();
        ingest_document("a.pdf", &[page(1, "text")], &e, &mut store, &opts)
            .await
            .unwrap();
        ingest_document("a.pdf", &[page(1, "")], &e, &mut store, &opts)
            .await
            .unwrap();
        assert_eq!(store.count().unwrap(), 0);
    }

    #[test]
    fn report_totals() {
        let report = IngestReport {
            files: vec![
                FileReport {
                    source: "a.pdf".into(),
                    outcome: FileOutcome::Ingested {
                        pages: 2,
                        pages_skipped: 0,
                        chunks: 5,
                    },
                },
                FileReport {
                    source: "b.pdf".into(),
                    outcome: FileOutcome::Failed {
                        reason: "bad xref".into(),
                    },
                },
            ],
        };
        assert_eq!(report.ingested_files(), 1);
        assert_eq!(report.total_chunks(), 5);
        assert!(!report.is_complete());
        assert_eq!(report.failed().next().unwrap().source, "b.pdf");
    }
}
