use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::time::now;

/// Label of a graph node, matching the stored `label` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeLabel {
    UserText,
    AgentText,
    ResourceVersion,
    Resource,
}

impl NodeLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeLabel::UserText => "UserText",
            NodeLabel::AgentText => "AgentText",
            NodeLabel::ResourceVersion => "ResourceVersion",
            NodeLabel::Resource => "Resource",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "UserText" => Some(NodeLabel::UserText),
            "AgentText" => Some(NodeLabel::AgentText),
            "ResourceVersion" => Some(NodeLabel::ResourceVersion),
            "Resource" => Some(NodeLabel::Resource),
            _ => None,
        }
    }
}

/// User message node. The only node type indexed in the vector store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserText {
    pub id: Uuid,
    pub conversation_id: String,
    pub text: String,
    pub turn_index: i64,
    pub created_at: DateTime<Utc>,
    pub last_accessed_at: DateTime<Utc>,
}

impl UserText {
    pub fn new(conversation_id: impl Into<String>, text: impl Into<String>, turn_index: i64) -> Self {
        let ts = now();
        Self {
            id: Uuid::new_v4(),
            conversation_id: conversation_id.into(),
            text: text.into(),
            turn_index,
            created_at: ts,
            last_accessed_at: ts,
        }
    }
}

/// Record of a tool invocation embedded on an `AgentText` node.
///
/// Captures every tool call from an assistant message, including ones that
/// never touch a resource (shell commands, searches, etc).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolUseRecord {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub args: Map<String, Value>,
}

/// Agent response node. Reached via graph traversal from a `UserText`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentText {
    pub id: Uuid,
    pub conversation_id: String,
    pub text: String,
    pub turn_index: i64,
    pub tool_uses: Vec<ToolUseRecord>,
    pub created_at: DateTime<Utc>,
    pub last_accessed_at: DateTime<Utc>,
}

impl AgentText {
    pub fn new(
        conversation_id: impl Into<String>,
        text: impl Into<String>,
        turn_index: i64,
        tool_uses: Vec<ToolUseRecord>,
    ) -> Self {
        let ts = now();
        Self {
            id: Uuid::new_v4(),
            conversation_id: conversation_id.into(),
            text: text.into(),
            turn_index,
            tool_uses,
            created_at: ts,
            last_accessed_at: ts,
        }
    }
}

/// Immutable snapshot of a resource at a specific content hash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceVersion {
    pub id: Uuid,
    pub uri: String,
    pub content_hash: String,
    pub conversation_id: String,
    pub created_at: DateTime<Utc>,
    pub last_accessed_at: DateTime<Utc>,
}

impl ResourceVersion {
    pub fn new(
        uri: impl Into<String>,
        content_hash: impl Into<String>,
        conversation_id: impl Into<String>,
    ) -> Self {
        let ts = now();
        Self {
            id: Uuid::new_v4(),
            uri: uri.into(),
            content_hash: content_hash.into(),
            conversation_id: conversation_id.into(),
            created_at: ts,
            last_accessed_at: ts,
        }
    }
}

/// Hypernode giving a URI a stable identity across versions and
/// conversations. `conversation_id` records the first writer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub id: Uuid,
    pub uri: String,
    pub current_content_hash: Option<String>,
    pub conversation_id: String,
    pub created_at: DateTime<Utc>,
    pub last_accessed_at: DateTime<Utc>,
}

impl Resource {
    pub fn new(
        uri: impl Into<String>,
        current_content_hash: Option<String>,
        conversation_id: impl Into<String>,
    ) -> Self {
        let ts = now();
        Self {
            id: Uuid::new_v4(),
            uri: uri.into(),
            current_content_hash,
            conversation_id: conversation_id.into(),
            created_at: ts,
            last_accessed_at: ts,
        }
    }
}

/// Tagged union over the node set. The graph backend matches exhaustively.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "label")]
pub enum Node {
    UserText(UserText),
    AgentText(AgentText),
    ResourceVersion(ResourceVersion),
    Resource(Resource),
}

impl Node {
    pub fn id(&self) -> Uuid {
        match self {
            Node::UserText(n) => n.id,
            Node::AgentText(n) => n.id,
            Node::ResourceVersion(n) => n.id,
            Node::Resource(n) => n.id,
        }
    }

    pub fn label(&self) -> NodeLabel {
        match self {
            Node::UserText(_) => NodeLabel::UserText,
            Node::AgentText(_) => NodeLabel::AgentText,
            Node::ResourceVersion(_) => NodeLabel::ResourceVersion,
            Node::Resource(_) => NodeLabel::Resource,
        }
    }
}

/// Either kind of turn-internal message node. Used by the "latest node"
/// lookups where the caller does not know the label in advance.
#[derive(Debug, Clone, PartialEq)]
pub enum MessageNode {
    User(UserText),
    Agent(AgentText),
}

impl MessageNode {
    pub fn id(&self) -> Uuid {
        match self {
            MessageNode::User(n) => n.id,
            MessageNode::Agent(n) => n.id,
        }
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        match self {
            MessageNode::User(n) => n.created_at,
            MessageNode::Agent(n) => n.created_at,
        }
    }
}

/// Ordered link between two turn-internal message nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageEdge {
    pub id: Uuid,
    pub source_id: Uuid,
    pub target_id: Uuid,
    pub conversation_id: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub properties: Map<String, Value>,
}

impl MessageEdge {
    pub fn new(source_id: Uuid, target_id: Uuid, conversation_id: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            source_id,
            target_id,
            conversation_id: conversation_id.into(),
            created_at: now(),
            properties: Map::new(),
        }
    }
}

/// Link from an `AgentText` to a `ResourceVersion` it touched.
///
/// `tool_name` is the normalized tool name; `properties` preserves the
/// tool's argument map verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolUseEdge {
    pub id: Uuid,
    pub source_id: Uuid,
    pub target_id: Uuid,
    pub tool_name: String,
    pub conversation_id: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub properties: Map<String, Value>,
}

impl ToolUseEdge {
    pub fn new(
        source_id: Uuid,
        target_id: Uuid,
        tool_name: &str,
        conversation_id: impl Into<String>,
        properties: Map<String, Value>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            source_id,
            target_id,
            tool_name: normalize_tool_name(tool_name),
            conversation_id: conversation_id.into(),
            created_at: now(),
            properties,
        }
    }
}

/// Link from a `ResourceVersion` to its owning `Resource` hypernode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionOfEdge {
    pub id: Uuid,
    pub version_id: Uuid,
    pub resource_id: Uuid,
    pub created_at: DateTime<Utc>,
}

impl VersionOfEdge {
    pub fn new(version_id: Uuid, resource_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            version_id,
            resource_id,
            created_at: now(),
        }
    }
}

/// Tagged union over the edge set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "label")]
pub enum Edge {
    Message(MessageEdge),
    ToolUse(ToolUseEdge),
    VersionOf(VersionOfEdge),
}

/// Normalize a tool name for storage on a `ToolUseEdge`: uppercased, with
/// whitespace mapped to underscores.
pub fn normalize_tool_name(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_whitespace() { '_' } else { c.to_ascii_uppercase() })
        .collect()
}
