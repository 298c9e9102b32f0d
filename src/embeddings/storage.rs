use super::Embedder;
use crate::error::{KgragError, Result};
use rusqlite::{params, Connection, OptionalExtension};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tokio::task;

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS embeddings (
    text_hash TEXT NOT NULL,
    model TEXT NOT NULL,
    dimensions INTEGER NOT NULL,
    embedding BLOB NOT NULL,
    created_at TEXT NOT NULL,
    PRIMARY KEY (text_hash, model)
)";

/// SQLite-backed document embedding store
///
/// Vectors are keyed by `(sha256(text), model)` so re-running an experiment
/// over the same corpus skips the embedding API entirely. A stored vector is
/// only reused when its dimension count matches the request.
pub struct EmbeddingStore {
    path: PathBuf,
}

impl EmbeddingStore {
    /// Open (and create if needed) the store at `path`
    pub async fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let store = Self {
            path: path.as_ref().to_path_buf(),
        };
        store
            .with_connection(|conn| {
                conn.execute(SCHEMA, [])?;
                Ok(())
            })
            .await?;
        log::debug!("Embedding store ready at {}", store.path.display());
        Ok(store)
    }

    /// Execute a closure with a database connection in a blocking task
    async fn with_connection<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let path = self.path.clone();
        task::spawn_blocking(move || {
            let mut conn = Connection::open(&path)?;
            conn.execute_batch(
                "PRAGMA journal_mode = WAL; \
                 PRAGMA synchronous = NORMAL;",
            )?;
            f(&mut conn)
        })
        .await
        .map_err(|e| KgragError::Embedding(format!("Embedding store task failed: {}", e)))?
    }

    /// Look up stored vectors of `dimensions` length, one slot per input text
    pub async fn get_many(
        &self,
        model: &str,
        dimensions: usize,
        texts: &[String],
    ) -> Result<Vec<Option<Vec<f32>>>> {
        let model = model.to_string();
        let dimensions = dimensions as i64;
        let hashes: Vec<String> = texts.iter().map(|t| text_hash(t)).collect();

        self.with_connection(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT embedding FROM embeddings \
                 WHERE text_hash = ? AND model = ? AND dimensions = ?",
            )?;
            let mut found = Vec::with_capacity(hashes.len());
            for hash in &hashes {
                let blob: Option<Vec<u8>> = stmt
                    .query_row(params![hash, model, dimensions], |row| row.get(0))
                    .optional()?;
                found.push(blob.map(|b| blob_to_vector(&b)).transpose()?);
            }
            Ok(found)
        })
        .await
    }

    /// Store vectors in a single transaction; existing keys are replaced
    pub async fn put_many(&self, model: &str, items: Vec<(String, Vec<f32>)>) -> Result<usize> {
        if items.is_empty() {
            return Ok(0);
        }
        let model = model.to_string();
        let created_at = chrono::Utc::now().to_rfc3339();

        self.with_connection(move |conn| {
            let tx = conn.transaction()?;
            let mut count = 0;
            {
                let mut stmt = tx.prepare(
                    "INSERT OR REPLACE INTO embeddings \
                     (text_hash, model, dimensions, embedding, created_at) \
                     VALUES (?, ?, ?, ?, ?)",
                )?;
                for (text, vector) in &items {
                    stmt.execute(params![
                        text_hash(text),
                        model,
                        vector.len() as i64,
                        vector_to_blob(vector),
                        created_at
                    ])?;
                    count += 1;
                }
            }
            tx.commit()?;
            Ok(count)
        })
        .await
    }

    /// Number of stored vectors for `model`
    pub async fn count(&self, model: &str) -> Result<usize> {
        let model = model.to_string();
        self.with_connection(move |conn| {
            let n: i64 = conn.query_row(
                "SELECT COUNT(*) FROM embeddings WHERE model = ?",
                params![model],
                |row| row.get(0),
            )?;
            Ok(n as usize)
        })
        .await
    }

    /// Embed `texts`, reusing stored vectors and persisting the new ones
    pub async fn embed_missing(
        &self,
        embedder: &dyn Embedder,
        texts: &[String],
    ) -> Result<Vec<Vec<f32>>> {
        let stored = self
            .get_many(embedder.model(), embedder.dimensions(), texts)
            .await?;
        let missing: Vec<String> = texts
            .iter()
            .zip(&stored)
            .filter(|(_, s)| s.is_none())
            .map(|(t, _)| t.clone())
            .collect();

        log::info!(
            "Embedding store: {} cached, {} to embed",
            texts.len() - missing.len(),
            missing.len()
        );

        let fresh = embedder.embed_batch(missing.clone()).await?;
        if fresh.len() != missing.len() {
            return Err(KgragError::Embedding(format!(
                "Expected {} embeddings, got {}",
                missing.len(),
                fresh.len()
            )));
        }
        let new_items: Vec<(String, Vec<f32>)> = missing.into_iter().zip(fresh).collect();
        self.put_many(embedder.model(), new_items.clone()).await?;

        let mut new_vectors = new_items.into_iter().map(|(_, v)| v);
        Ok(stored
            .into_iter()
            .map(|s| s.or_else(|| new_vectors.next()).unwrap_or_default())
            .collect())
    }
}

/// Hex sha256 of the text, the storage key
pub fn text_hash(text: &str) -> String {
    let digest = Sha256::digest(text.as_bytes());
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Convert Vec<f32> to BLOB (raw bytes, little-endian)
fn vector_to_blob(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|f| f.to_le_bytes()).collect()
}

fn blob_to_vector(blob: &[u8]) -> Result<Vec<f32>> {
    blob.chunks(4)
        .map(|bytes| {
            let arr: [u8; 4] = bytes.try_into().map_err(|_| {
                KgragError::Embedding("Invalid embedding BLOB length".to_string())
            })?;
            Ok(f32::from_le_bytes(arr))
        })
        .collect()
}
