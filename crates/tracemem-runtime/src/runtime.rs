use std::sync::Arc;

use tracing::debug;
use tracemem_engine::{CreatedNodes, Embedder, Ingestor, Retriever};
use tracemem_extract::{DefaultResourceExtractor, ResourceExtractor};
use tracemem_graph::{GraphStore, SqliteGraphStore};
use tracemem_types::{
    ContextResult, ConversationReference, Message, RetrievalConfig, RetrievalResult,
    TrajectoryResult,
};
use tracemem_vector::{Reranker, RerankerRegistry, SqliteVectorStore, VectorStore};
use uuid::Uuid;

use crate::config::{Config, GraphBackend, Mode};
use crate::error::{Error, Result};

/// Knowledge-graph memory for AI agents.
///
/// `TraceMem` records conversation turns, tool invocations and resource
/// versions as a typed graph, indexes user turns for hybrid search, and
/// answers the four retrieval calls.
///
/// Ingestion takes `&mut self`: callers serialize ingest per conversation
/// (ordering across concurrent writers to the same conversation is
/// undefined). A tool result must be supplied before the assistant
/// message that references it, or within the same `import_trace`.
pub struct TraceMem {
    graph: Arc<dyn GraphStore>,
    vector: Arc<dyn VectorStore>,
    ingestor: Ingestor,
    retriever: Retriever,
    default_retrieval: RetrievalConfig,
}

/// Builder for custom extractor or reranker wiring.
pub struct TraceMemBuilder {
    config: Config,
    embedder: Arc<dyn Embedder>,
    extractor: Option<Arc<dyn ResourceExtractor>>,
    reranker: Option<Arc<dyn Reranker>>,
    registry: RerankerRegistry,
}

impl TraceMemBuilder {
    /// Override the resource extractor (the default recognizes common
    /// file-path and URL argument patterns).
    pub fn extractor(mut self, extractor: Arc<dyn ResourceExtractor>) -> Self {
        self.extractor = Some(extractor);
        self
    }

    /// Use a reranker instance directly, bypassing the named registry.
    pub fn reranker(mut self, reranker: Arc<dyn Reranker>) -> Self {
        self.reranker = Some(reranker);
        self
    }

    /// Extend the reranker registry before the configured name resolves.
    pub fn register_reranker(mut self, name: impl Into<String>, reranker: Arc<dyn Reranker>) -> Self {
        self.registry.register(name, reranker);
        self
    }

    /// Open both stores and assemble the engines. Fails fast on an
    /// unknown reranker name or an invalid dimension.
    pub async fn open(self) -> Result<TraceMem> {
        let config = self.config;

        if config.embedding_dimensions == 0 {
            return Err(Error::Config(
                "embedding_dimensions must be at least 1".to_string(),
            ));
        }
        if self.embedder.dimensions() != config.embedding_dimensions {
            return Err(Error::Config(format!(
                "embedder produces {} dimensions but the database is configured for {}",
                self.embedder.dimensions(),
                config.embedding_dimensions
            )));
        }

        let reranker = match self.reranker {
            Some(reranker) => reranker,
            None => self
                .registry
                .get(&config.reranker)
                .map_err(|err| Error::Config(err.to_string()))?,
        };

        let graph: Arc<dyn GraphStore> = match config.graph_backend {
            GraphBackend::Sqlite => Arc::new(SqliteGraphStore::new(config.graph_path())),
        };
        let vector: Arc<dyn VectorStore> = Arc::new(SqliteVectorStore::new(
            config.vector_path(),
            config.embedding_dimensions,
            reranker,
        ));

        graph.connect().await?;
        graph.initialize_schema().await?;
        vector.connect().await?;

        let extractor = match self.extractor {
            Some(extractor) => extractor,
            None => match config.mode {
                Mode::Global => Arc::new(DefaultResourceExtractor::global()),
                Mode::Local => Arc::new(DefaultResourceExtractor::local(&config.home())),
            },
        };

        let ingestor = Ingestor::new(
            graph.clone(),
            vector.clone(),
            self.embedder.clone(),
            extractor,
            config.canonical_root(),
        );
        let retriever = Retriever::new(graph.clone(), vector.clone(), self.embedder);

        debug!(home = %config.home().display(), "tracemem opened");
        Ok(TraceMem {
            graph,
            vector,
            ingestor,
            retriever,
            default_retrieval: config.default_retrieval,
        })
    }
}

impl TraceMem {
    /// Builder entry point for custom wiring.
    pub fn builder(config: Config, embedder: Arc<dyn Embedder>) -> TraceMemBuilder {
        TraceMemBuilder {
            config,
            embedder,
            extractor: None,
            reranker: None,
            registry: RerankerRegistry::default(),
        }
    }

    /// Open with the default extractor and the configured reranker.
    pub async fn open(config: Config, embedder: Arc<dyn Embedder>) -> Result<Self> {
        Self::builder(config, embedder).open().await
    }

    /// Close both stores. Dropping the handle releases them too; an
    /// explicit close surfaces flush errors.
    pub async fn close(self) -> Result<()> {
        self.graph.close().await?;
        self.vector.close().await?;
        Ok(())
    }

    /// Add a single message to the knowledge graph. Not idempotent.
    pub async fn add_message(
        &mut self,
        conversation_id: &str,
        message: &Message,
    ) -> Result<CreatedNodes> {
        Ok(self.ingestor.add_message(conversation_id, message).await?)
    }

    /// Import a conversation trace; tool results are collected before any
    /// assistant message is processed.
    pub async fn import_trace(
        &mut self,
        conversation_id: &str,
        messages: &[Message],
    ) -> Result<CreatedNodes> {
        Ok(self.ingestor.import_trace(conversation_id, messages).await?)
    }

    /// Hybrid search over past user turns.
    pub async fn search(
        &self,
        query: &str,
        config: Option<&RetrievalConfig>,
    ) -> Result<Vec<RetrievalResult>> {
        let cfg = config.unwrap_or(&self.default_retrieval);
        Ok(self.retriever.search(query, cfg).await?)
    }

    /// Full context for one `UserText` node.
    pub async fn get_context(&self, node_id: Uuid) -> Result<ContextResult> {
        Ok(self.retriever.get_context(node_id).await?)
    }

    /// Conversations whose turns touched the resource at `uri`.
    pub async fn get_conversations_for_resource(
        &self,
        uri: &str,
        config: Option<&RetrievalConfig>,
    ) -> Result<Vec<ConversationReference>> {
        let cfg = config.unwrap_or(&self.default_retrieval);
        Ok(self
            .retriever
            .get_conversations_for_resource(uri, cfg)
            .await?)
    }

    /// Trajectory from one `UserText` up to and including the user's
    /// follow-up.
    pub async fn get_trajectory(
        &self,
        node_id: Uuid,
        config: Option<&RetrievalConfig>,
    ) -> Result<TrajectoryResult> {
        let cfg = config.unwrap_or(&self.default_retrieval);
        Ok(self.retriever.get_trajectory(node_id, cfg).await?)
    }

    /// Drop a conversation from similarity search. The graph keeps its
    /// history by design; only vector rows are deleted. Returns the number
    /// of rows removed.
    pub async fn forget_conversation(&self, conversation_id: &str) -> Result<usize> {
        Ok(self.vector.delete_by_conversation(conversation_id).await?)
    }
}
