use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, warn};
use tracemem_graph::{GraphStore, ResourceQuery};
use tracemem_types::{
    ContextResult, ConversationReference, NodeLabel, NodeType, RetrievalConfig, RetrievalResult,
    ToolUse, ToolUseRecord, TrajectoryNode, TrajectoryResult, TrajectoryStep,
};
use tracemem_vector::{VectorSearchResult, VectorStore};
use uuid::Uuid;

use crate::embed::Embedder;
use crate::error::{Error, Result};

/// Hybrid retrieval engine: vector search for relevance, graph traversal
/// for structure.
pub struct Retriever {
    graph: Arc<dyn GraphStore>,
    vector: Arc<dyn VectorStore>,
    embedder: Arc<dyn Embedder>,
}

impl Retriever {
    pub fn new(
        graph: Arc<dyn GraphStore>,
        vector: Arc<dyn VectorStore>,
        embedder: Arc<dyn Embedder>,
    ) -> Self {
        Self {
            graph,
            vector,
            embedder,
        }
    }

    /// Hybrid nearest-neighbor search over past user turns.
    pub async fn search(
        &self,
        query: &str,
        config: &RetrievalConfig,
    ) -> Result<Vec<RetrievalResult>> {
        let cfg = config.clamped();
        debug!(query, limit = cfg.limit, include_context = cfg.include_context, "search");

        let query_vector = self
            .embedder
            .embed(query)
            .await
            .map_err(|err| Error::Embed(err.to_string()))?;

        // Over-fetch when deduplicating so enough distinct conversations
        // survive the fold.
        let fetch_limit = if cfg.unique_conversations {
            cfg.limit * 3
        } else {
            cfg.limit
        };

        let rows = self
            .vector
            .search(
                &query_vector,
                query,
                fetch_limit,
                cfg.exclude_conversation_id.as_deref(),
                cfg.vector_weight,
            )
            .await?;

        let rows = if cfg.unique_conversations {
            fold_unique_conversations(rows, cfg.limit)
        } else {
            rows
        };

        let mut results = Vec::with_capacity(rows.len());
        for row in rows {
            let context = if cfg.include_context {
                Some(self.graph.get_node_context(row.node_id).await?)
            } else {
                None
            };
            results.push(RetrievalResult {
                node_id: row.node_id,
                text: row.text,
                conversation_id: row.conversation_id,
                score: row.score,
                created_at: Some(row.created_at),
                context,
            });
        }

        let ids: Vec<Uuid> = results.iter().map(|r| r.node_id).collect();
        self.touch(&ids).await;

        debug!(query, results = results.len(), "search done");
        Ok(results)
    }

    /// Full context for a single `UserText` node. Unknown ids succeed with
    /// every field absent.
    pub async fn get_context(&self, node_id: Uuid) -> Result<ContextResult> {
        let context = self.graph.get_node_context(node_id).await?;

        let mut ids = Vec::new();
        if let Some(user) = &context.user_text {
            ids.push(user.id);
        }
        if let Some(agent) = &context.agent_text {
            ids.push(agent.id);
        }
        self.touch(&ids).await;

        Ok(context)
    }

    /// Conversations whose turns touched the resource at `uri`.
    pub async fn get_conversations_for_resource(
        &self,
        uri: &str,
        config: &RetrievalConfig,
    ) -> Result<Vec<ConversationReference>> {
        let cfg = config.clamped();
        let references = self
            .graph
            .get_resource_conversations(
                uri,
                &ResourceQuery {
                    limit: cfg.limit,
                    sort_by: cfg.sort_by,
                    sort_order: cfg.sort_order,
                    exclude_conversation_id: cfg.exclude_conversation_id.clone(),
                },
            )
            .await?;

        let ids: Vec<Uuid> = references.iter().map(|r| r.user_text_id).collect();
        self.touch(&ids).await;

        Ok(references)
    }

    /// Trajectory from one `UserText` up to and including the next one in
    /// the conversation.
    pub async fn get_trajectory(
        &self,
        node_id: Uuid,
        config: &RetrievalConfig,
    ) -> Result<TrajectoryResult> {
        let cfg = config.clamped();
        let nodes = self
            .graph
            .get_trajectory_nodes(node_id, cfg.trajectory_max_depth)
            .await?;
        let trajectory = parse_trajectory(node_id, &nodes)?;

        let ids: Vec<Uuid> = trajectory.steps.iter().map(|s| s.node_id).collect();
        self.touch(&ids).await;

        debug!(node_id = %node_id, steps = trajectory.steps.len(), "get_trajectory");
        Ok(trajectory)
    }

    /// Best-effort freshness accounting on both stores. A failed touch
    /// never fails the query.
    async fn touch(&self, node_ids: &[Uuid]) {
        if node_ids.is_empty() {
            return;
        }
        if let Err(err) = self.graph.update_last_accessed(node_ids).await {
            warn!(error = %err, "failed to update graph last_accessed");
        }
        for node_id in node_ids {
            if let Err(err) = self.vector.update_last_accessed(*node_id).await {
                warn!(error = %err, node_id = %node_id, "failed to update vector last_accessed");
            }
        }
    }
}

/// Keep the best-scored row per conversation, preserving the order of
/// first appearance, then cap at `limit`.
fn fold_unique_conversations(
    rows: Vec<VectorSearchResult>,
    limit: usize,
) -> Vec<VectorSearchResult> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut deduped: Vec<VectorSearchResult> = Vec::new();
    for row in rows {
        match seen.get(&row.conversation_id) {
            None => {
                seen.insert(row.conversation_id.clone(), deduped.len());
                deduped.push(row);
            }
            Some(&index) => {
                if row.score > deduped[index].score {
                    deduped[index] = row;
                }
            }
        }
    }
    deduped.truncate(limit);
    deduped
}

/// Shape raw traversal rows into trajectory steps: skip until the start
/// node, emit inclusively, and stop after the first subsequent `UserText`.
fn parse_trajectory(start_id: Uuid, nodes: &[TrajectoryNode]) -> Result<TrajectoryResult> {
    let mut result = TrajectoryResult::default();
    let mut found_start = false;

    for node in nodes {
        let node_type = match node.label {
            NodeLabel::UserText => NodeType::UserText,
            NodeLabel::AgentText => NodeType::AgentText,
            _ => continue,
        };

        if node_type == NodeType::UserText && node.id == start_id {
            found_start = true;
        } else if node_type == NodeType::UserText && found_start {
            // The follow-up user message closes the trajectory, inclusively.
            result.steps.push(TrajectoryStep {
                node_id: node.id,
                node_type,
                text: node.text.clone(),
                conversation_id: node.conversation_id.clone(),
                created_at: node.created_at,
                tool_uses: Vec::new(),
            });
            break;
        }

        if !found_start {
            continue;
        }

        result.steps.push(TrajectoryStep {
            node_id: node.id,
            node_type,
            text: node.text.clone(),
            conversation_id: node.conversation_id.clone(),
            created_at: node.created_at,
            tool_uses: parse_tool_uses(node.tool_uses.as_deref())?,
        });
    }

    Ok(result)
}

fn parse_tool_uses(raw: Option<&str>) -> Result<Vec<ToolUse>> {
    let Some(raw) = raw else {
        return Ok(Vec::new());
    };
    if raw.is_empty() {
        return Ok(Vec::new());
    }
    let records: Vec<ToolUseRecord> = serde_json::from_str(raw)
        .map_err(|err| Error::Decode(format!("bad tool_uses payload: {err}")))?;
    Ok(records
        .into_iter()
        .map(|record| ToolUse {
            tool_name: record.name,
            properties: record.args,
            resource_version: None,
            resource: None,
        })
        .collect())
}
