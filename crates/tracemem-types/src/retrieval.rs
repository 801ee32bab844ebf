use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::models::NodeLabel;

/// Field resource-conversation queries sort by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortBy {
    #[default]
    CreatedAt,
    LastAccessedAt,
}

/// Sort direction for resource-conversation queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

/// Per-call retrieval settings.
///
/// Out-of-range values are clamped at the point of use rather than
/// rejected: `limit` to 1..=100, `vector_weight` to 0.0..=1.0,
/// `trajectory_max_depth` to 1..=500.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Maximum number of results to return.
    pub limit: usize,
    /// Expand search results with full graph context.
    pub include_context: bool,
    /// Dense/lexical blend: 0.0 = pure lexical, 1.0 = pure dense.
    pub vector_weight: f32,
    /// Include tool invocations in context expansion.
    pub expand_tool_uses: bool,
    /// Include resource info in context expansion.
    pub expand_resources: bool,
    pub sort_by: SortBy,
    pub sort_order: SortOrder,
    /// Exclude a specific conversation from results.
    pub exclude_conversation_id: Option<String>,
    /// Keep only the best-scored result per conversation.
    pub unique_conversations: bool,
    /// Traversal bound for trajectory reconstruction.
    pub trajectory_max_depth: u32,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            limit: 10,
            include_context: true,
            vector_weight: 0.5,
            expand_tool_uses: true,
            expand_resources: true,
            sort_by: SortBy::default(),
            sort_order: SortOrder::default(),
            exclude_conversation_id: None,
            unique_conversations: false,
            trajectory_max_depth: 100,
        }
    }
}

impl RetrievalConfig {
    /// Copy with every field forced into its documented range.
    pub fn clamped(&self) -> Self {
        let mut cfg = self.clone();
        cfg.limit = cfg.limit.clamp(1, 100);
        cfg.vector_weight = cfg.vector_weight.clamp(0.0, 1.0);
        cfg.trajectory_max_depth = cfg.trajectory_max_depth.clamp(1, 500);
        cfg
    }
}

/// Resource identity attached to a tool use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceInfo {
    pub id: Uuid,
    pub uri: String,
}

/// Resource-version snapshot attached to a tool use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceVersionInfo {
    pub id: Uuid,
    pub uri: String,
    pub content_hash: String,
}

/// A tool invocation surfaced by retrieval, with its resource joins.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ToolUse {
    pub tool_name: String,
    #[serde(default)]
    pub properties: Map<String, Value>,
    pub resource_version: Option<ResourceVersionInfo>,
    pub resource: Option<ResourceInfo>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserTextInfo {
    pub id: Uuid,
    pub text: String,
    pub conversation_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentTextInfo {
    pub id: Uuid,
    pub text: String,
}

/// Full context for one user turn: the user message, its paired agent
/// response, and any tool invocations with their resources.
///
/// All fields absent when the node does not exist; the lookup itself never
/// fails on a missing id.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ContextResult {
    pub user_text: Option<UserTextInfo>,
    pub agent_text: Option<AgentTextInfo>,
    #[serde(default)]
    pub tool_uses: Vec<ToolUse>,
}

/// A single hybrid-search hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalResult {
    pub node_id: Uuid,
    pub text: String,
    pub conversation_id: String,
    pub score: f32,
    pub created_at: Option<DateTime<Utc>>,
    pub context: Option<ContextResult>,
}

/// Reference to a conversation that touched a resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationReference {
    pub conversation_id: String,
    pub user_text_id: Uuid,
    pub user_text: String,
    pub agent_text: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

/// Node kind appearing in a trajectory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeType {
    UserText,
    AgentText,
}

/// One step of a conversation trajectory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryStep {
    pub node_id: Uuid,
    pub node_type: NodeType,
    pub text: String,
    pub conversation_id: String,
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub tool_uses: Vec<ToolUse>,
}

/// Ordered steps from one `UserText` up to and including the next one.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TrajectoryResult {
    pub steps: Vec<TrajectoryStep>,
}

/// Raw node row returned by the graph backend's trajectory traversal,
/// before the retrieval engine shapes it into steps.
#[derive(Debug, Clone, PartialEq)]
pub struct TrajectoryNode {
    pub id: Uuid,
    pub label: NodeLabel,
    pub text: String,
    pub conversation_id: String,
    pub turn_index: i64,
    pub created_at: Option<DateTime<Utc>>,
    /// JSON-encoded `ToolUseRecord` list for `AgentText` rows.
    pub tool_uses: Option<String>,
}
