// Vector storage for user-turn embeddings.
//
// One row per `UserText` node: the raw text, its dense embedding, and the
// owning conversation. Hybrid search blends a dense cosine scan with a
// BM25 lexical query through a pluggable reranker.

mod error;
mod rerank;
mod sqlite;

pub use error::{Error, Result};
pub use rerank::{LinearCombinationReranker, RankedHit, Reranker, RerankerRegistry, RrfReranker};
pub use sqlite::SqliteVectorStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// One row returned by hybrid search, scored by the active reranker.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorSearchResult {
    pub node_id: Uuid,
    pub text: String,
    pub conversation_id: String,
    pub created_at: DateTime<Utc>,
    pub last_accessed: DateTime<Utc>,
    pub score: f32,
}

/// Row-oriented store keyed by node id, with hybrid ranked search.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Open the underlying database. Idempotent.
    async fn connect(&self) -> Result<()>;

    /// Release the underlying database handle.
    async fn close(&self) -> Result<()>;

    /// Insert one embedding row.
    async fn add(
        &self,
        node_id: Uuid,
        text: &str,
        vector: &[f32],
        conversation_id: &str,
    ) -> Result<()>;

    /// Hybrid dense + lexical search.
    ///
    /// `vector_weight` selects the blend: 0.0 is pure lexical, 1.0 is pure
    /// dense, intermediate values are fused by the store's reranker.
    async fn search(
        &self,
        query_vector: &[f32],
        query_text: &str,
        limit: usize,
        exclude_conversation_id: Option<&str>,
        vector_weight: f32,
    ) -> Result<Vec<VectorSearchResult>>;

    /// Touch the `last_accessed` timestamp of one row.
    async fn update_last_accessed(&self, node_id: Uuid) -> Result<()>;

    /// Delete every row of a conversation; returns the number removed.
    async fn delete_by_conversation(&self, conversation_id: &str) -> Result<usize>;
}
