//! Persistent vector store for chunk embeddings, backed by a single SQLite file.
//!
//! Rows are partitioned into named collections. Each collection remembers the dimension of the
//! first vectors written to it, which later writes and queries must match, and the model of the
//! latest write.
//! Search is an exact scan scored by cosine distance (`1 - cos`), so lower means more similar.

use std::path::{Path, PathBuf};

use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

use crate::chunks::Chunk;

/// Where a stored chunk came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub source: String,
    pub chunk_index: usize,
    pub page: u32,
}

/// A chunk as it sits in the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredChunk {
    pub id: String,
    pub document: String,
    pub metadata: ChunkMetadata,
}

/// One nearest-neighbour hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub id: String,
    pub document: String,
    pub metadata: ChunkMetadata,
    pub distance: f32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub collection: String,
    pub chunks: usize,
    pub sources: usize,
    pub dimensions: Option<usize>,
    pub model: Option<String>,
}

pub struct VectorStore {
    conn: Connection,
    collection: String,
    path: Option<PathBuf>,
}

impl VectorStore {
    /// Open (or create) the store at `path` and select `collection`.
    pub fn open(path: &Path, collection: &str) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        Self::init(conn, collection, Some(path.to_path_buf()))
    }

    /// Store that lives only as long as the value.
    pub fn open_in_memory(collection: &str) -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?, collection, None)
    }

    fn init(conn: Connection, collection: &str, path: Option<PathBuf>) -> Result<Self, StoreError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS collections (
                name TEXT PRIMARY KEY,
                dimensions INTEGER NOT NULL,
                model TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS chunks (
                collection TEXT NOT NULL,
                id TEXT NOT NULL,
                source TEXT NOT NULL,
                chunk_index INTEGER NOT NULL,
                page INTEGER NOT NULL,
                document TEXT NOT NULL,
                -- unit-length f32 vector, little-endian
                embedding BLOB NOT NULL,
                PRIMARY KEY (collection, id)
            );

            CREATE INDEX IF NOT EXISTS idx_chunks_source ON chunks(collection, source);
            "#,
        )?;
        Ok(Self {
            conn,
            collection: collection.to_string(),
            path,
        })
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// File backing the store; `None` for in-memory stores.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Vector dimension fixed for this collection, once anything has been written.
    pub fn dimensions(&self) -> Result<Option<usize>, StoreError> {
        Ok(self.collection_info()?.map(|(dim, _)| dim))
    }

    /// Embedding model recorded for this collection.
    pub fn embedding_model(&self) -> Result<Option<String>, StoreError> {
        Ok(self.collection_info()?.map(|(_, model)| model))
    }

    fn collection_info(&self) -> Result<Option<(usize, String)>, StoreError> {
        let row = self
            .conn
            .query_row(
                "SELECT dimensions, model FROM collections WHERE name = ?1",
                params![self.collection],
                |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)),
            )
            .optional()?;
        Ok(row.map(|(dim, model)| (dim as usize, model)))
    }

    /// Insert or overwrite records by id. Other records are left alone.
    pub fn upsert(
        &mut self,
        chunks: &[Chunk],
        embeddings: &[Vec<f32>],
        model: &str,
    ) -> Result<(), StoreError> {
        self.write(None, chunks, embeddings, model)
    }

    /// Atomically replace every record of `source` with `chunks`. Re-running with the
    /// same input leaves the store unchanged.
    pub fn replace_source(
        &mut self,
        source: &str,
        chunks: &[Chunk],
        embeddings: &[Vec<f32>],
        model: &str,
    ) -> Result<(), StoreError> {
        self.write(Some(source), chunks, embeddings, model)
    }

    fn write(
        &mut self,
        replace: Option<&str>,
        chunks: &[Chunk],
        embeddings: &[Vec<f32>],
        model: &str,
    ) -> Result<(), StoreError> {
        if chunks.len() != embeddings.len() {
            return Err(StoreError::LengthMismatch {
                chunks: chunks.len(),
                embeddings: embeddings.len(),
            });
        }
        let expected = match self.dimensions()? {
            Some(dim) => Some(dim),
            None => embeddings.first().map(Vec::len),
        };
        if let Some(expected) = expected {
            if let Some(bad) = embeddings.iter().find(|e| e.len() != expected) {
                return Err(StoreError::DimensionMismatch {
                    expected,
                    actual: bad.len(),
                });
            }
        }

        if let Some(stored) = self.embedding_model()?.filter(|m| m != model) {
            tracing::warn!(
                collection = %self.collection,
                stored = %stored,
                current = %model,
                "embedding model changed; run a rebuild if older vectors remain"
            );
        }

        let tx = self.conn.transaction()?;
        if let Some(dim) = expected {
            tx.execute(
                "INSERT INTO collections (name, dimensions, model) VALUES (?1, ?2, ?3)
                 ON CONFLICT(name) DO UPDATE SET model = excluded.model",
                params![self.collection, dim as i64, model],
            )?;
        }
        if let Some(source) = replace {
            tx.execute(
                "DELETE FROM chunks WHERE collection = ?1 AND source = ?2",
                params![self.collection, source],
            )?;
        }
        {
            let mut stmt = tx.prepare(
                "INSERT OR REPLACE INTO chunks (collection, id, source, chunk_index, page, document, embedding)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )?;
            for (chunk, embedding) in chunks.iter().zip(embeddings) {
                stmt.execute(params![
                    self.collection,
                    chunk.id,
                    chunk.source,
                    chunk.chunk_index as i64,
                    chunk.page,
                    chunk.text,
                    serialize_embedding(&normalize(embedding)),
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Drop every record in this collection and forget its dimension and model.
    pub fn clear(&mut self) -> Result<(), StoreError> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM chunks WHERE collection = ?1", params![self.collection])?;
        tx.execute("DELETE FROM collections WHERE name = ?1", params![self.collection])?;
        tx.commit()?;
        Ok(())
    }

    /// Number of records in this collection.
    pub fn count(&self) -> Result<usize, StoreError> {
        let n: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM chunks WHERE collection = ?1",
            params![self.collection],
            |row| row.get(0),
        )?;
        Ok(n as usize)
    }

    pub fn stats(&self) -> Result<StoreStats, StoreError> {
        let sources: i64 = self.conn.query_row(
            "SELECT COUNT(DISTINCT source) FROM chunks WHERE collection = ?1",
            params![self.collection],
            |row| row.get(0),
        )?;
        let info = self.collection_info()?;
        Ok(StoreStats {
            collection: self.collection.clone(),
            chunks: self.count()?,
            sources: sources as usize,
            dimensions: info.as_ref().map(|(d, _)| *d),
            model: info.map(|(_, m)| m),
        })
    }

    /// Records of one source, in chunk order.
    pub fn chunks_for_source(&self, source: &str) -> Result<Vec<StoredChunk>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, source, chunk_index, page, document FROM chunks
             WHERE collection = ?1 AND source = ?2 ORDER BY chunk_index",
        )?;
        let rows = stmt
            .query_map(params![self.collection, source], |row| {
                Ok(StoredChunk {
                    id: row.get(0)?,
                    metadata: ChunkMetadata {
                        source: row.get(1)?,
                        chunk_index: row.get::<_, i64>(2)? as usize,
                        page: row.get(3)?,
                    },
                    document: row.get(4)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// The `k` records nearest to `query_embedding`, closest first. Ties are broken by id.
    pub fn query(&self, query_embedding: &[f32], k: usize) -> Result<Vec<QueryResult>, StoreError> {
        let mut out = self.query_batch(&[query_embedding.to_vec()], k)?;
        Ok(out.pop().unwrap_or_default())
    }

    /// One result list per query vector, in the same order as `query_embeddings`.
    pub fn query_batch(
        &self,
        query_embeddings: &[Vec<f32>],
        k: usize,
    ) -> Result<Vec<Vec<QueryResult>>, StoreError> {
        let Some(dim) = self.dimensions()? else {
            return Ok(vec![Vec::new(); query_embeddings.len()]);
        };
        if let Some(bad) = query_embeddings.iter().find(|q| q.len() != dim) {
            return Err(StoreError::DimensionMismatch {
                expected: dim,
                actual: bad.len(),
            });
        }
        if k == 0 || query_embeddings.is_empty() {
            return Ok(vec![Vec::new(); query_embeddings.len()]);
        }

        let rows = self.load_rows()?;
        let results = query_embeddings
            .iter()
            .map(|q| {
                let q_norm = normalize(q);
                let mut scored: Vec<(f32, &Row)> = rows
                    .iter()
                    .map(|r| (1.0 - dot(&q_norm, &r.embedding), r))
                    .collect();
                scored.sort_by(|a, b| a.0.total_cmp(&b.0).then_with(|| a.1.id.cmp(&b.1.id)));
                scored
                    .into_iter()
                    .take(k)
                    .map(|(distance, r)| QueryResult {
                        id: r.id.clone(),
                        document: r.document.clone(),
                        metadata: r.metadata.clone(),
                        distance,
                    })
                    .collect()
            })
            .collect();
        Ok(results)
    }

    fn load_rows(&self) -> Result<Vec<Row>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, source, chunk_index, page, document, embedding FROM chunks WHERE collection = ?1",
        )?;
        let rows = stmt
            .query_map(params![self.collection], |row| {
                Ok(Row {
                    id: row.get(0)?,
                    metadata: ChunkMetadata {
                        source: row.get(1)?,
                        chunk_index: row.get::<_, i64>(2)? as usize,
                        page: row.get(3)?,
                    },
                    document: row.get(4)?,
                    embedding: deserialize_embedding(&row.get::<_, Vec<u8>>(5)?),
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }
}

impl std::fmt::Debug for VectorStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorStore")
            .field("collection", &self.collection)
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

struct Row {
    id: String,
    metadata: ChunkMetadata,
    document: String,
    embedding: Vec<f32>,
}

fn normalize(v: &[f32]) -> Vec<f32> {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm <= 0.0 {
        return v.to_vec();
    }
    v.iter().map(|x| x / norm).collect()
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn serialize_embedding(v: &[f32]) -> Vec<u8> {
    v.iter().flat_map(|f| f.to_le_bytes()).collect()
}

fn deserialize_embedding(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("{chunks} chunks but {embeddings} embeddings")]
    LengthMismatch { chunks: usize, embeddings: usize },
}
