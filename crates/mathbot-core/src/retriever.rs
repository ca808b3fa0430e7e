//! Question → nearest chunks. The question is embedded with the same [Embedder] used at
//! ingestion time and matched against the vector store.

use crate::chunks::normalize_whitespace;
use crate::embed::{EmbedError, Embedder};
use crate::store::{QueryResult, StoreError, VectorStore};

/// A retrieved chunk, with its document text whitespace-collapsed.
pub type RetrievedChunk = QueryResult;

pub struct Retriever<'a> {
    embedder: &'a dyn Embedder,
    store: &'a VectorStore,
}

impl<'a> Retriever<'a> {
    pub fn new(embedder: &'a dyn Embedder, store: &'a VectorStore) -> Self {
        Self { embedder, store }
    }

    /// Up to `k` chunks closest to `question`, most similar first.
    ///
    /// `Ok(vec![])` means the store had nothing to offer; any failure along the way is an `Err`,
    /// logged here so callers only decide how to present it.
    pub async fn retrieve(
        &self,
        question: &str,
        k: usize,
    ) -> Result<Vec<RetrievedChunk>, RetrievalError> {
        if k == 0 {
            return Ok(Vec::new());
        }
        match self.try_retrieve(question, k).await {
            Ok(hits) => {
                tracing::debug!(k, hits = hits.len(), "retrieved context");
                Ok(hits)
            }
            Err(e) => {
                tracing::warn!(error = %e, "query failed");
                Err(e)
            }
        }
    }

    async fn try_retrieve(
        &self,
        question: &str,
        k: usize,
    ) -> Result<Vec<RetrievedChunk>, RetrievalError> {
        if let Some(stored) = self.store.embedding_model()? {
            if stored != self.embedder.model_id() {
                tracing::warn!(
                    stored = %stored,
                    current = %self.embedder.model_id(),
                    "index was built with a different embedding model"
                );
            }
        }
        let q = self.embedder.embed(question).await?;
        let mut hits = self.store.query(&q, k)?;
        hits.truncate(k);
        for h in &mut hits {
            h.document = normalize_whitespace(&h.document);
        }
        Ok(hits)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RetrievalError {
    #[error("could not embed question: {0}")]
    Embed(#[from] EmbedError),
    #[error("vector store query failed: {0}")]
    Store(#[from] StoreError),
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::chunks::Chunk;
    use crate::embed::HashEmbedder;

    fn chunk(i: usize, text: &str) -> Chunk {
        Chunk {
            id: format!("b.pdf___{i}"),
            text: text.to_string(),
            source: "b.pdf".into(),
            chunk_index: i,
            page: 1,
        }
    }

    async fn filled(embedder: &HashEmbedder, texts: &[&str]) -> VectorStore {
        let mut store = VectorStore::open_in_memory("t").unwrap();
        let chunks: Vec<_> = texts.iter().enumerate().map(|(i, t)| chunk(i, t)).collect();
        let owned: Vec<String> = texts.iter().map(|t| t.to_string()).collect();
        let embs = embedder.embed_batch(&owned).await.unwrap();
        store.upsert(&chunks, &embs, embedder.model_id()).unwrap();
        store
    }

    #[tokio::test]
    async fn returns_at_most_k_sorted_results() {
        let e = HashEmbedder::new(4096);
        let store = filled(
            &e,
            &[
                "integration by parts",
                "the derivative of a polynomial",
                "matrix determinant",
                "derivative rules and the derivative of sine",
            ],
        )
        .await;
        let r = Retriever::new(&e, &store);
        let hits = r.retrieve("derivative", 2).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert!(hits[0].distance <= hits[1].distance);
        assert!(hits.iter().all(|h| h.document.contains("derivative")));
    }

    #[tokio::test]
    async fn collapses_whitespace_in_documents() {
        let e = HashEmbedder::new(32);
        let mut store = VectorStore::open_in_memory("t").unwrap();
        let c = chunk(0, "line one\n\n   line   two");
        let emb = e.embed(&c.text).await.unwrap();
        store.upsert(&[c], &[emb], "hash").unwrap();
        let hits = Retriever::new(&e, &store).retrieve("line", 1).await.unwrap();
        assert_eq!(hits[0].document, "line one line two");
    }

    #[tokio::test]
    async fn empty_store_is_ok_and_empty() {
        let e = HashEmbedder::new(32);
        let store = VectorStore::open_in_memory("t").unwrap();
        let hits = Retriever::new(&e, &store).retrieve("anything", 3).await.unwrap();
        assert!(hits.is_empty());
    }

    struct Broken;

    #[async_trait]
    impl Embedder for Broken {
        fn model_id(&self) -> &str {
            "broken"
        }

        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
            Err(EmbedError::CountMismatch {
                expected: texts.len(),
                actual: 0,
            })
        }
    }

    #[tokio::test]
    async fn failures_are_distinct_from_no_matches() {
        let store = VectorStore::open_in_memory("t").unwrap();
        let err = Retriever::new(&Broken, &store).retrieve("q", 3).await.unwrap_err();
        assert!(matches!(err, RetrievalError::Embed(_)));

        let e = HashEmbedder::new(8);
        let store = filled(&e, &["a b c"]).await;
        let wrong_dim = HashEmbedder::new(16);
        let err = Retriever::new(&wrong_dim, &store).retrieve("a", 1).await.unwrap_err();
        assert!(matches!(err, RetrievalError::Store(StoreError::DimensionMismatch { .. })));
    }
}
