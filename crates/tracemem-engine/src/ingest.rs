use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use sha2::{Digest, Sha256};
use tracing::debug;
use tracemem_extract::{canonicalize, ResourceExtractor};
use tracemem_graph::GraphStore;
use tracemem_types::{
    AgentText, Edge, Message, MessageEdge, Node, Resource, ResourceVersion, ToolCall,
    ToolUseEdge, ToolUseRecord, UserText, VersionOfEdge,
};
use tracemem_vector::VectorStore;
use uuid::Uuid;

use crate::embed::Embedder;
use crate::error::{Error, Result};

/// Map of created node kinds to their ids. Keys are `user_text`,
/// `agent_text`, `resource_<uri>` and `resource_version_<uri>`.
pub type CreatedNodes = HashMap<String, Uuid>;

/// SHA-256 hex digest of a tool result's canonical string form.
pub fn content_hash(content: &str) -> String {
    format!("{:x}", Sha256::digest(content.as_bytes()))
}

/// Ingestion state machine: maps role-tagged messages onto graph and
/// vector mutations.
///
/// The scratch map from `tool_call_id` to tool-result text lives here and
/// is never persisted. Tool results must be supplied before (or within the
/// same `import_trace` as) the assistant message that references them; a
/// tool call whose result is unknown produces no resource mutation.
pub struct Ingestor {
    graph: Arc<dyn GraphStore>,
    vector: Arc<dyn VectorStore>,
    embedder: Arc<dyn Embedder>,
    extractor: Arc<dyn ResourceExtractor>,
    canonical_root: Option<PathBuf>,
    tool_results: HashMap<String, String>,
}

impl Ingestor {
    pub fn new(
        graph: Arc<dyn GraphStore>,
        vector: Arc<dyn VectorStore>,
        embedder: Arc<dyn Embedder>,
        extractor: Arc<dyn ResourceExtractor>,
        canonical_root: Option<PathBuf>,
    ) -> Self {
        Self {
            graph,
            vector,
            embedder,
            extractor,
            canonical_root,
            tool_results: HashMap::new(),
        }
    }

    /// Import a conversation trace.
    ///
    /// Tool results are collected in a first pass so an assistant message
    /// may reference a result that appears later in the same trace.
    pub async fn import_trace(
        &mut self,
        conversation_id: &str,
        messages: &[Message],
    ) -> Result<CreatedNodes> {
        self.tool_results.clear();
        for message in messages {
            if let Message::Tool {
                content,
                tool_call_id: Some(id),
            } = message
            {
                self.tool_results.insert(id.clone(), content.clone());
            }
        }

        let mut created = CreatedNodes::new();
        for message in messages {
            created.extend(self.add_message(conversation_id, message).await?);
        }

        debug!(conversation_id, messages = messages.len(), "import_trace");
        Ok(created)
    }

    /// Add a single message to the knowledge graph.
    ///
    /// Not idempotent; callers deduplicate upstream and serialize calls per
    /// conversation.
    pub async fn add_message(
        &mut self,
        conversation_id: &str,
        message: &Message,
    ) -> Result<CreatedNodes> {
        let mut created = CreatedNodes::new();

        match message {
            Message::User { content } => {
                let user = self.add_user_message(conversation_id, content).await?;
                created.insert("user_text".to_string(), user.id);
            }
            Message::Assistant {
                content,
                tool_calls,
            } => {
                let (agent, resource_ids) = self
                    .add_assistant_message(conversation_id, content, tool_calls)
                    .await?;
                created.insert("agent_text".to_string(), agent.id);
                created.extend(resource_ids);
            }
            Message::Tool {
                content,
                tool_call_id,
            } => {
                // Remember the result for the assistant message that
                // references it. No graph mutation on its own.
                if let Some(id) = tool_call_id {
                    self.tool_results.insert(id.clone(), content.clone());
                }
            }
            Message::System { .. } => {}
        }

        Ok(created)
    }

    /// A user message opens a new turn and is the only embedded node kind.
    async fn add_user_message(&self, conversation_id: &str, content: &str) -> Result<UserText> {
        let max_turn = self.graph.get_max_turn_index(conversation_id).await?;
        let turn_index = max_turn + 1;

        let last_agent = self.graph.get_last_agent_text(conversation_id).await?;

        let user = UserText::new(conversation_id, content, turn_index);
        self.graph.create_node(&Node::UserText(user.clone())).await?;

        // Chain from the previous turn's last agent, crossing the turn
        // boundary.
        if let Some(last_agent) = last_agent {
            let edge = MessageEdge::new(last_agent.id, user.id, conversation_id);
            self.graph.create_edge(&Edge::Message(edge)).await?;
        }

        let vector = self.embed(&user.text).await?;
        self.vector
            .add(user.id, &user.text, &vector, conversation_id)
            .await?;

        debug!(conversation_id, turn_index, node_id = %user.id, "added user message");
        Ok(user)
    }

    /// An assistant message stays in the current turn and chains from the
    /// turn's most recent node.
    async fn add_assistant_message(
        &mut self,
        conversation_id: &str,
        content: &str,
        tool_calls: &[ToolCall],
    ) -> Result<(AgentText, CreatedNodes)> {
        let mut created = CreatedNodes::new();

        let max_turn = self.graph.get_max_turn_index(conversation_id).await?;
        // An assistant-first conversation lands in turn 0.
        let turn_index = max_turn.max(0);

        let last_node = self
            .graph
            .get_last_node_in_turn(conversation_id, turn_index)
            .await?;

        let tool_uses: Vec<ToolUseRecord> = tool_calls
            .iter()
            .map(|call| ToolUseRecord {
                id: call.id.clone(),
                name: call.name.clone(),
                args: call.args.clone(),
            })
            .collect();

        let agent = AgentText::new(conversation_id, content, turn_index, tool_uses);
        self.graph.create_node(&Node::AgentText(agent.clone())).await?;

        if let Some(last_node) = last_node {
            let edge = MessageEdge::new(last_node.id(), agent.id, conversation_id);
            self.graph.create_edge(&Edge::Message(edge)).await?;
        }

        for tool_call in tool_calls {
            let resource_ids = self
                .process_tool_call(agent.id, conversation_id, tool_call)
                .await?;
            created.extend(resource_ids);
        }

        debug!(
            conversation_id,
            turn_index,
            node_id = %agent.id,
            tool_calls = tool_calls.len(),
            "added assistant message"
        );
        Ok((agent, created))
    }

    /// Resource-versioning procedure: MERGE the hypernode by URI, dedup
    /// versions by content hash, and always record the tool use.
    async fn process_tool_call(
        &self,
        agent_id: Uuid,
        conversation_id: &str,
        tool_call: &ToolCall,
    ) -> Result<CreatedNodes> {
        let mut created = CreatedNodes::new();

        let Some(uri) = self.extractor.extract(&tool_call.name, &tool_call.args) else {
            return Ok(created);
        };

        // The tool result is what defines content; without it there is
        // nothing to hash.
        let Some(content) = self.tool_results.get(&tool_call.id) else {
            return Ok(created);
        };

        // Extractors already canonicalize; run the canonicalizer once more
        // so a custom extractor cannot leak raw URIs into the graph.
        let uri = canonicalize(&uri, self.canonical_root.as_deref());
        let hash = content_hash(content);

        match self.graph.get_resource_by_uri(&uri).await? {
            None => {
                let resource = Resource::new(&uri, Some(hash.clone()), conversation_id);
                let stored = self.graph.create_node(&Node::Resource(resource)).await?;
                let resource_id = stored.id();
                created.insert(format!("resource_{uri}"), resource_id);

                let version = ResourceVersion::new(&uri, &hash, conversation_id);
                self.graph
                    .create_node(&Node::ResourceVersion(version.clone()))
                    .await?;
                created.insert(format!("resource_version_{uri}"), version.id);

                self.graph
                    .create_edge(&Edge::VersionOf(VersionOfEdge::new(version.id, resource_id)))
                    .await?;
                self.create_tool_edge(agent_id, version.id, conversation_id, tool_call)
                    .await?;
            }
            Some(resource) if resource.current_content_hash.as_deref() == Some(hash.as_str()) => {
                // Unchanged content: no new version, but the access itself
                // is still recorded.
                if let Some(version) = self
                    .graph
                    .get_resource_version_by_hash(&uri, &hash)
                    .await?
                {
                    self.create_tool_edge(agent_id, version.id, conversation_id, tool_call)
                        .await?;
                }
            }
            Some(resource) => {
                let version = ResourceVersion::new(&uri, &hash, conversation_id);
                self.graph
                    .create_node(&Node::ResourceVersion(version.clone()))
                    .await?;
                created.insert(format!("resource_version_{uri}"), version.id);

                self.graph.update_resource_hash(&uri, &hash).await?;
                self.graph
                    .create_edge(&Edge::VersionOf(VersionOfEdge::new(version.id, resource.id)))
                    .await?;
                self.create_tool_edge(agent_id, version.id, conversation_id, tool_call)
                    .await?;
            }
        }

        Ok(created)
    }

    async fn create_tool_edge(
        &self,
        agent_id: Uuid,
        version_id: Uuid,
        conversation_id: &str,
        tool_call: &ToolCall,
    ) -> Result<()> {
        let edge = ToolUseEdge::new(
            agent_id,
            version_id,
            &tool_call.name,
            conversation_id,
            tool_call.args.clone(),
        );
        self.graph.create_edge(&Edge::ToolUse(edge)).await?;
        Ok(())
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let vector = self
            .embedder
            .embed(text)
            .await
            .map_err(|err| Error::Embed(err.to_string()))?;
        if vector.len() != self.embedder.dimensions() {
            return Err(Error::Embed(format!(
                "embedder returned {} dimensions, expected {}",
                vector.len(),
                self.embedder.dimensions()
            )));
        }
        Ok(vector)
    }
}
