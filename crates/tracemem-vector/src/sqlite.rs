use std::path::PathBuf;
use std::sync::Arc;

use rusqlite::{params, Connection, OptionalExtension};
use tokio::sync::Mutex;
use tracing::debug;
use tracemem_types::{format_timestamp, now, parse_timestamp};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::rerank::{RankedHit, Reranker};
use crate::{VectorSearchResult, VectorStore};

// Candidate pool multiplier: each side of the hybrid query over-fetches so
// the reranker has enough overlap to fuse meaningfully.
const POOL_FACTOR: usize = 2;

/// Embedded SQLite implementation of `VectorStore`.
///
/// Dense vectors live as little-endian f32 blobs and are scanned with a
/// cosine ranking; the lexical side is an external-content FTS5 table over
/// `text`, synced on every write and delete. The embedding dimension is
/// pinned in a `meta` row at creation and enforced on every reconnect.
pub struct SqliteVectorStore {
    path: Option<PathBuf>,
    dimensions: usize,
    reranker: Arc<dyn Reranker>,
    conn: Mutex<Option<Connection>>,
}

impl SqliteVectorStore {
    /// Store backed by `<dir>/vectors.db`. The directory is created on
    /// connect.
    pub fn new(dir: impl Into<PathBuf>, dimensions: usize, reranker: Arc<dyn Reranker>) -> Self {
        Self {
            path: Some(dir.into()),
            dimensions,
            reranker,
            conn: Mutex::new(None),
        }
    }

    /// In-memory store for tests and scratch use.
    pub fn in_memory(dimensions: usize, reranker: Arc<dyn Reranker>) -> Self {
        Self {
            path: None,
            dimensions,
            reranker,
            conn: Mutex::new(None),
        }
    }

    fn check_dimensions(&self, vector: &[f32]) -> Result<()> {
        if vector.len() != self.dimensions {
            return Err(Error::Dimension {
                expected: self.dimensions,
                got: vector.len(),
            });
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl VectorStore for SqliteVectorStore {
    async fn connect(&self) -> Result<()> {
        let mut guard = self.conn.lock().await;
        if guard.is_some() {
            return Ok(());
        }
        let conn = match &self.path {
            Some(dir) => {
                std::fs::create_dir_all(dir)?;
                Connection::open(dir.join("vectors.db"))?
            }
            None => Connection::open_in_memory()?,
        };

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS user_texts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                node_id TEXT NOT NULL UNIQUE,
                text TEXT NOT NULL,
                vector BLOB NOT NULL,
                conversation_id TEXT NOT NULL,
                created_at TEXT NOT NULL,
                last_accessed TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_user_texts_conversation
                ON user_texts(conversation_id);

            CREATE VIRTUAL TABLE IF NOT EXISTS user_texts_fts
                USING fts5(text, content='user_texts', content_rowid='id');

            CREATE TABLE IF NOT EXISTS meta (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            "#,
        )?;

        // The embedding dimension is a property of the database, fixed at
        // creation; reconnecting with a different one is a configuration
        // mistake we refuse early.
        let stored: Option<String> = conn
            .query_row(
                "SELECT value FROM meta WHERE key = 'dimensions'",
                [],
                |row| row.get(0),
            )
            .optional()?;
        match stored {
            Some(raw) => {
                let pinned: usize = raw
                    .parse()
                    .map_err(|_| Error::Decode(format!("bad pinned dimension: {raw:?}")))?;
                if pinned != self.dimensions {
                    return Err(Error::Dimension {
                        expected: pinned,
                        got: self.dimensions,
                    });
                }
            }
            None => {
                conn.execute(
                    "INSERT INTO meta (key, value) VALUES ('dimensions', ?1)",
                    params![self.dimensions.to_string()],
                )?;
            }
        }

        *guard = Some(conn);
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        let mut guard = self.conn.lock().await;
        *guard = None;
        Ok(())
    }

    async fn add(
        &self,
        node_id: Uuid,
        text: &str,
        vector: &[f32],
        conversation_id: &str,
    ) -> Result<()> {
        self.check_dimensions(vector)?;
        let guard = self.conn.lock().await;
        let conn = guard.as_ref().ok_or(Error::NotConnected)?;

        let ts = format_timestamp(now());
        conn.execute(
            "INSERT INTO user_texts (node_id, text, vector, conversation_id, created_at, last_accessed) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                node_id.to_string(),
                text,
                encode_vector(vector),
                conversation_id,
                ts,
                ts,
            ],
        )?;
        let rowid = conn.last_insert_rowid();
        conn.execute(
            "INSERT INTO user_texts_fts (rowid, text) VALUES (?1, ?2)",
            params![rowid, text],
        )?;
        Ok(())
    }

    async fn search(
        &self,
        query_vector: &[f32],
        query_text: &str,
        limit: usize,
        exclude_conversation_id: Option<&str>,
        vector_weight: f32,
    ) -> Result<Vec<VectorSearchResult>> {
        self.check_dimensions(query_vector)?;
        let guard = self.conn.lock().await;
        let conn = guard.as_ref().ok_or(Error::NotConnected)?;

        let pool = limit.max(1) * POOL_FACTOR;
        let dense = dense_candidates(conn, query_vector, pool, exclude_conversation_id)?;
        let lexical = lexical_candidates(conn, query_text, pool, exclude_conversation_id)?;

        let mut fused = self.reranker.fuse(&dense, &lexical, vector_weight);
        fused.truncate(limit);

        let mut stmt = conn.prepare(
            "SELECT text, conversation_id, created_at, last_accessed \
             FROM user_texts WHERE node_id = ?1",
        )?;
        let mut results = Vec::with_capacity(fused.len());
        for hit in fused {
            let row = stmt
                .query_row(params![hit.node_id.to_string()], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                    ))
                })
                .optional()?;
            let Some((text, conversation_id, created_at, last_accessed)) = row else {
                continue;
            };
            results.push(VectorSearchResult {
                node_id: hit.node_id,
                text,
                conversation_id,
                created_at: parse_timestamp(&created_at)
                    .ok_or_else(|| Error::Decode(format!("bad timestamp {created_at:?}")))?,
                last_accessed: parse_timestamp(&last_accessed)
                    .ok_or_else(|| Error::Decode(format!("bad timestamp {last_accessed:?}")))?,
                score: hit.score,
            });
        }

        debug!(
            query = query_text,
            limit,
            vector_weight,
            results = results.len(),
            "hybrid search"
        );
        Ok(results)
    }

    async fn update_last_accessed(&self, node_id: Uuid) -> Result<()> {
        let guard = self.conn.lock().await;
        let conn = guard.as_ref().ok_or(Error::NotConnected)?;
        conn.execute(
            "UPDATE user_texts SET last_accessed = ?1 WHERE node_id = ?2",
            params![format_timestamp(now()), node_id.to_string()],
        )?;
        Ok(())
    }

    async fn delete_by_conversation(&self, conversation_id: &str) -> Result<usize> {
        let guard = self.conn.lock().await;
        let conn = guard.as_ref().ok_or(Error::NotConnected)?;

        let mut stmt =
            conn.prepare("SELECT id, text FROM user_texts WHERE conversation_id = ?1")?;
        let rows = stmt
            .query_map(params![conversation_id], |row| {
                Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        // External-content FTS5 requires explicit delete commands with the
        // old row values before the base rows go away.
        for (rowid, text) in &rows {
            conn.execute(
                "INSERT INTO user_texts_fts (user_texts_fts, rowid, text) VALUES ('delete', ?1, ?2)",
                params![rowid, text],
            )?;
        }
        conn.execute(
            "DELETE FROM user_texts WHERE conversation_id = ?1",
            params![conversation_id],
        )?;

        debug!(conversation_id, deleted = rows.len(), "delete_by_conversation");
        Ok(rows.len())
    }
}

fn dense_candidates(
    conn: &Connection,
    query_vector: &[f32],
    pool: usize,
    exclude: Option<&str>,
) -> Result<Vec<RankedHit>> {
    let mut hits = match exclude {
        Some(exclude) => {
            let mut stmt = conn.prepare(
                "SELECT node_id, vector FROM user_texts WHERE conversation_id <> ?1",
            )?;
            let rows = stmt
                .query_map(params![exclude], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, Vec<u8>>(1)?))
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            score_rows(rows, query_vector)?
        }
        None => {
            let mut stmt = conn.prepare("SELECT node_id, vector FROM user_texts")?;
            let rows = stmt
                .query_map([], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, Vec<u8>>(1)?))
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            score_rows(rows, query_vector)?
        }
    };

    hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    hits.truncate(pool);
    Ok(hits)
}

fn score_rows(rows: Vec<(String, Vec<u8>)>, query_vector: &[f32]) -> Result<Vec<RankedHit>> {
    let mut hits = Vec::with_capacity(rows.len());
    for (node_id, blob) in rows {
        let node_id = Uuid::parse_str(&node_id)
            .map_err(|err| Error::Decode(format!("bad node id {node_id:?}: {err}")))?;
        let vector = decode_vector(&blob);
        hits.push(RankedHit {
            node_id,
            score: cosine_similarity(query_vector, &vector),
        });
    }
    Ok(hits)
}

fn lexical_candidates(
    conn: &Connection,
    query_text: &str,
    pool: usize,
    exclude: Option<&str>,
) -> Result<Vec<RankedHit>> {
    let Some(match_expr) = fts_match_expression(query_text) else {
        return Ok(Vec::new());
    };

    // bm25() is smaller-is-better; negate so higher means more relevant
    // like the dense side.
    let base = "SELECT t.node_id, -bm25(user_texts_fts) AS score \
                FROM user_texts_fts \
                JOIN user_texts t ON t.id = user_texts_fts.rowid \
                WHERE user_texts_fts MATCH ?1";

    let map_row = |row: &rusqlite::Row<'_>| {
        Ok((row.get::<_, String>(0)?, row.get::<_, f64>(1)?))
    };
    let rows = match exclude {
        Some(exclude) => {
            let sql = format!(
                "{base} AND t.conversation_id <> ?2 ORDER BY bm25(user_texts_fts) ASC LIMIT {pool}"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params![match_expr, exclude], map_row)?;
            rows.collect::<std::result::Result<Vec<_>, _>>()?
        }
        None => {
            let sql = format!("{base} ORDER BY bm25(user_texts_fts) ASC LIMIT {pool}");
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params![match_expr], map_row)?;
            rows.collect::<std::result::Result<Vec<_>, _>>()?
        }
    };

    let mut hits = Vec::with_capacity(rows.len());
    for (node_id, score) in rows {
        let node_id = Uuid::parse_str(&node_id)
            .map_err(|err| Error::Decode(format!("bad node id {node_id:?}: {err}")))?;
        hits.push(RankedHit {
            node_id,
            score: score as f32,
        });
    }
    Ok(hits)
}

/// Turn free-form query text into an FTS5 MATCH expression: alphanumeric
/// tokens, quoted, OR-joined. `None` when nothing searchable remains.
fn fts_match_expression(query_text: &str) -> Option<String> {
    let tokens: Vec<String> = query_text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| format!("\"{t}\""))
        .collect();
    if tokens.is_empty() {
        None
    } else {
        Some(tokens.join(" OR "))
    }
}

fn encode_vector(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|v| v.to_le_bytes()).collect()
}

fn decode_vector(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rerank::RrfReranker;

    fn reranker() -> Arc<dyn Reranker> {
        Arc::new(RrfReranker::default())
    }

    async fn open_store() -> SqliteVectorStore {
        let store = SqliteVectorStore::in_memory(4, reranker());
        store.connect().await.unwrap();
        store
    }

    #[test]
    fn test_vector_blob_round_trip() {
        let vector = vec![0.25_f32, -1.5, 3.0, 0.0];
        assert_eq!(decode_vector(&encode_vector(&vector)), vector);
    }

    #[test]
    fn test_cosine_similarity_basics() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn test_fts_match_expression_sanitizes() {
        assert_eq!(
            fts_match_expression("fix auth-bug!").as_deref(),
            Some("\"fix\" OR \"auth\" OR \"bug\"")
        );
        assert!(fts_match_expression("  --  ").is_none());
    }

    #[tokio::test]
    async fn test_add_rejects_wrong_dimension() {
        let store = open_store().await;
        let err = store
            .add(Uuid::new_v4(), "x", &[1.0, 2.0], "conv-1")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Dimension { expected: 4, got: 2 }));
    }

    #[tokio::test]
    async fn test_dimension_pin_survives_reconnect() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteVectorStore::new(dir.path(), 4, reranker());
        store.connect().await.unwrap();
        store.close().await.unwrap();

        let other = SqliteVectorStore::new(dir.path(), 8, reranker());
        let err = other.connect().await.unwrap_err();
        assert!(matches!(err, Error::Dimension { expected: 4, got: 8 }));
    }

    #[tokio::test]
    async fn test_dense_search_orders_by_similarity() {
        let store = open_store().await;
        let close = Uuid::new_v4();
        let far = Uuid::new_v4();
        store
            .add(close, "close text", &[1.0, 0.0, 0.0, 0.0], "conv-1")
            .await
            .unwrap();
        store
            .add(far, "far text", &[0.0, 1.0, 0.0, 0.0], "conv-2")
            .await
            .unwrap();

        let results = store
            .search(&[0.9, 0.1, 0.0, 0.0], "unrelated", 2, None, 1.0)
            .await
            .unwrap();
        assert_eq!(results[0].node_id, close);
        assert_eq!(results.len(), 2);
    }

    #[tokio::test]
    async fn test_lexical_search_matches_text() {
        let store = open_store().await;
        let auth = Uuid::new_v4();
        let cooking = Uuid::new_v4();
        store
            .add(auth, "debugging the authentication flow", &[1.0, 0.0, 0.0, 0.0], "conv-1")
            .await
            .unwrap();
        store
            .add(cooking, "favourite pasta recipes", &[1.0, 0.0, 0.0, 0.0], "conv-2")
            .await
            .unwrap();

        let results = store
            .search(&[0.0, 0.0, 0.0, 1.0], "authentication", 2, None, 0.0)
            .await
            .unwrap();
        assert_eq!(results[0].node_id, auth);
    }

    #[tokio::test]
    async fn test_search_excludes_conversation() {
        let store = open_store().await;
        for (conv, text) in [("conv-a", "alpha"), ("conv-b", "beta")] {
            store
                .add(Uuid::new_v4(), text, &[1.0, 0.0, 0.0, 0.0], conv)
                .await
                .unwrap();
        }

        let results = store
            .search(&[1.0, 0.0, 0.0, 0.0], "alpha beta", 10, Some("conv-a"), 0.5)
            .await
            .unwrap();
        assert!(!results.is_empty());
        assert!(results.iter().all(|r| r.conversation_id != "conv-a"));
    }

    #[tokio::test]
    async fn test_delete_by_conversation_counts_and_clears() {
        let store = open_store().await;
        for _ in 0..3 {
            store
                .add(Uuid::new_v4(), "target text", &[1.0, 0.0, 0.0, 0.0], "conv-a")
                .await
                .unwrap();
        }
        store
            .add(Uuid::new_v4(), "other text", &[1.0, 0.0, 0.0, 0.0], "conv-b")
            .await
            .unwrap();

        assert_eq!(store.delete_by_conversation("conv-a").await.unwrap(), 3);
        assert_eq!(store.delete_by_conversation("conv-a").await.unwrap(), 0);

        // Lexical index no longer returns the deleted rows.
        let results = store
            .search(&[1.0, 0.0, 0.0, 0.0], "target", 10, None, 0.0)
            .await
            .unwrap();
        assert!(results.iter().all(|r| r.conversation_id == "conv-b"));
    }

    #[tokio::test]
    async fn test_update_last_accessed_moves_timestamp() {
        let store = open_store().await;
        let node_id = Uuid::new_v4();
        store
            .add(node_id, "text", &[1.0, 0.0, 0.0, 0.0], "conv-1")
            .await
            .unwrap();
        let before = store
            .search(&[1.0, 0.0, 0.0, 0.0], "text", 1, None, 1.0)
            .await
            .unwrap()[0]
            .last_accessed;

        std::thread::sleep(std::time::Duration::from_millis(2));
        store.update_last_accessed(node_id).await.unwrap();
        let after = store
            .search(&[1.0, 0.0, 0.0, 0.0], "text", 1, None, 1.0)
            .await
            .unwrap()[0]
            .last_accessed;
        assert!(after > before);
    }
}
