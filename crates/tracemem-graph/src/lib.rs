// Graph storage for the conversation knowledge graph.
//
// The `GraphStore` trait is the narrow contract the ingestion and retrieval
// engines program against; `SqliteGraphStore` is the embedded reference
// backend. Alternate backends (e.g. a client-server graph database) are
// acceptable as long as they satisfy the contract, including MERGE-on-URI
// semantics for `Resource` nodes.

mod error;
mod sqlite;

pub use error::{Error, Result};
pub use sqlite::{SqliteGraphStore, MAX_TRAJECTORY_DEPTH, RESOURCE_PATH_DEPTH};

use async_trait::async_trait;
use tracemem_types::{
    AgentText, ContextResult, ConversationReference, Edge, MessageNode, Node, Resource,
    ResourceVersion, SortBy, SortOrder, TrajectoryNode, UserText,
};
use uuid::Uuid;

/// Options for the resource → conversations traversal.
#[derive(Debug, Clone)]
pub struct ResourceQuery {
    pub limit: usize,
    pub sort_by: SortBy,
    pub sort_order: SortOrder,
    pub exclude_conversation_id: Option<String>,
}

impl Default for ResourceQuery {
    fn default() -> Self {
        Self {
            limit: 10,
            sort_by: SortBy::CreatedAt,
            sort_order: SortOrder::Desc,
            exclude_conversation_id: None,
        }
    }
}

/// Typed node/edge storage with indexed lookups and a bounded
/// variable-length traversal primitive.
///
/// All operations are asynchronous; complex retrieval shaping beyond these
/// queries belongs in the retrieval engine.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Open the underlying database. Idempotent.
    async fn connect(&self) -> Result<()>;

    /// Release the underlying database handle.
    async fn close(&self) -> Result<()>;

    /// Create tables, constraints and indexes. Idempotent.
    async fn initialize_schema(&self) -> Result<()>;

    /// Create a node, dispatching on its variant.
    ///
    /// `Resource` nodes have MERGE semantics on their URI: when a resource
    /// with the same URI already exists it is returned unchanged.
    async fn create_node(&self, node: &Node) -> Result<Node>;

    /// Create an edge, dispatching on its variant.
    async fn create_edge(&self, edge: &Edge) -> Result<()>;

    /// Get a `UserText` node by id.
    async fn get_user_text(&self, node_id: Uuid) -> Result<Option<UserText>>;

    /// Most recent `UserText` in a conversation.
    async fn get_last_user_text(&self, conversation_id: &str) -> Result<Option<UserText>>;

    /// Most recent `AgentText` in a conversation.
    async fn get_last_agent_text(&self, conversation_id: &str) -> Result<Option<AgentText>>;

    /// Most recent message node of either kind in a conversation.
    async fn get_last_message_node(&self, conversation_id: &str) -> Result<Option<MessageNode>>;

    /// Most recent message node within one turn.
    async fn get_last_node_in_turn(
        &self,
        conversation_id: &str,
        turn_index: i64,
    ) -> Result<Option<MessageNode>>;

    /// Resource hypernode by canonical URI.
    async fn get_resource_by_uri(&self, uri: &str) -> Result<Option<Resource>>;

    /// Resource version by its `(uri, content_hash)` natural key.
    async fn get_resource_version_by_hash(
        &self,
        uri: &str,
        content_hash: &str,
    ) -> Result<Option<ResourceVersion>>;

    /// Maximum turn index in a conversation; -1 when the conversation is
    /// empty (the first user message becomes turn 0).
    async fn get_max_turn_index(&self, conversation_id: &str) -> Result<i64>;

    /// Set the current content hash of a resource.
    async fn update_resource_hash(&self, uri: &str, content_hash: &str) -> Result<()>;

    /// Touch `last_accessed_at` on the given nodes.
    async fn update_last_accessed(&self, node_ids: &[Uuid]) -> Result<()>;

    /// User text, paired agent text, and tool uses for one `UserText`.
    /// Missing ids yield an empty result, not an error.
    async fn get_node_context(&self, node_id: Uuid) -> Result<ContextResult>;

    /// Distinct conversations whose turns touched the resource at `uri`,
    /// found through the bounded inbound MESSAGE traversal.
    async fn get_resource_conversations(
        &self,
        uri: &str,
        query: &ResourceQuery,
    ) -> Result<Vec<ConversationReference>>;

    /// Raw nodes reachable from a `UserText` via MESSAGE edges within the
    /// same conversation, ordered by creation time and deduplicated.
    async fn get_trajectory_nodes(
        &self,
        node_id: Uuid,
        max_depth: u32,
    ) -> Result<Vec<TrajectoryNode>>;
}
