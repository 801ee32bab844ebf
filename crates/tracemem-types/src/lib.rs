// Core domain types shared by every tracemem crate.
// Schemas only: storage and engine logic live in the other crates.

mod message;
mod models;
mod retrieval;
mod time;

pub use message::{canonical_tool_content, Message, ToolCall};
pub use models::{
    normalize_tool_name, AgentText, Edge, MessageEdge, MessageNode, Node, NodeLabel, Resource,
    ResourceVersion, ToolUseEdge, ToolUseRecord, UserText, VersionOfEdge,
};
pub use retrieval::{
    AgentTextInfo, ContextResult, ConversationReference, NodeType, ResourceInfo,
    ResourceVersionInfo, RetrievalConfig, RetrievalResult, SortBy, SortOrder, ToolUse,
    TrajectoryNode, TrajectoryResult, TrajectoryStep, UserTextInfo,
};
pub use time::{format_timestamp, now, parse_timestamp};
