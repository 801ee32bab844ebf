use std::path::PathBuf;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use tokio::sync::Mutex;
use tracing::debug;
use tracemem_types::{
    format_timestamp, now, parse_timestamp, AgentText, AgentTextInfo, ContextResult,
    ConversationReference, Edge, MessageNode, Node, NodeLabel, Resource, ResourceInfo,
    ResourceVersion, ResourceVersionInfo, SortBy, SortOrder, ToolUse, ToolUseRecord,
    TrajectoryNode, UserText, UserTextInfo,
};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::{GraphStore, ResourceQuery};

/// Hop cap for the inbound MESSAGE traversal behind
/// `get_resource_conversations`.
pub const RESOURCE_PATH_DEPTH: u32 = 30;

/// Deepest MESSAGE walk `get_trajectory_nodes` will perform regardless of
/// the requested depth.
pub const MAX_TRAJECTORY_DEPTH: u32 = 500;

const NODE_COLUMNS: &str = "id, label, conversation_id, text, turn_index, tool_uses, \
     uri, content_hash, current_content_hash, created_at, last_accessed_at";

// NOTE: Property-graph-on-SQLite layout
//
// One `nodes` table carries the union of node attributes with a `label`
// discriminator; one `edges` table carries all edge kinds the same way.
// Variable-length MESSAGE traversals are recursive CTEs over `edges`.
// The partial unique index on Resource URIs is what backs MERGE-on-URI:
// INSERT OR IGNORE + SELECT is atomic under SQLite's connection locking.
// Latest-node lookups order by (created_at, rowid) so that writes landing
// in the same microsecond still resolve in insertion order.

/// Embedded SQLite implementation of `GraphStore`.
pub struct SqliteGraphStore {
    path: Option<PathBuf>,
    conn: Mutex<Option<Connection>>,
}

impl SqliteGraphStore {
    /// Store backed by `<dir>/graph.db`. The directory is created on
    /// connect.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(dir.into()),
            conn: Mutex::new(None),
        }
    }

    /// In-memory store for tests and scratch use.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            conn: Mutex::new(None),
        }
    }
}

#[async_trait::async_trait]
impl GraphStore for SqliteGraphStore {
    async fn connect(&self) -> Result<()> {
        let mut guard = self.conn.lock().await;
        if guard.is_some() {
            return Ok(());
        }
        let conn = match &self.path {
            Some(dir) => {
                std::fs::create_dir_all(dir)?;
                Connection::open(dir.join("graph.db"))?
            }
            None => Connection::open_in_memory()?,
        };
        *guard = Some(conn);
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        let mut guard = self.conn.lock().await;
        *guard = None;
        Ok(())
    }

    async fn initialize_schema(&self) -> Result<()> {
        let guard = self.conn.lock().await;
        let conn = guard.as_ref().ok_or(Error::NotConnected)?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS nodes (
                id TEXT PRIMARY KEY,
                label TEXT NOT NULL,
                conversation_id TEXT,
                text TEXT,
                turn_index INTEGER,
                tool_uses TEXT,
                uri TEXT,
                content_hash TEXT,
                current_content_hash TEXT,
                created_at TEXT NOT NULL,
                last_accessed_at TEXT NOT NULL
            );

            CREATE UNIQUE INDEX IF NOT EXISTS idx_nodes_resource_uri
                ON nodes(uri) WHERE label = 'Resource';
            CREATE INDEX IF NOT EXISTS idx_nodes_conv_label
                ON nodes(conversation_id, label, created_at);
            CREATE INDEX IF NOT EXISTS idx_nodes_conv_turn
                ON nodes(conversation_id, turn_index);
            CREATE INDEX IF NOT EXISTS idx_nodes_version_hash
                ON nodes(uri, content_hash);

            CREATE TABLE IF NOT EXISTS edges (
                id TEXT PRIMARY KEY,
                label TEXT NOT NULL,
                source_id TEXT NOT NULL,
                target_id TEXT NOT NULL,
                tool_name TEXT,
                conversation_id TEXT,
                properties TEXT,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_edges_source ON edges(source_id, label);
            CREATE INDEX IF NOT EXISTS idx_edges_target ON edges(target_id, label);
            "#,
        )?;
        Ok(())
    }

    async fn create_node(&self, node: &Node) -> Result<Node> {
        let guard = self.conn.lock().await;
        let conn = guard.as_ref().ok_or(Error::NotConnected)?;

        match node {
            Node::UserText(n) => {
                conn.execute(
                    "INSERT INTO nodes (id, label, conversation_id, text, turn_index, created_at, last_accessed_at) \
                     VALUES (?1, 'UserText', ?2, ?3, ?4, ?5, ?6)",
                    params![
                        n.id.to_string(),
                        n.conversation_id,
                        n.text,
                        n.turn_index,
                        format_timestamp(n.created_at),
                        format_timestamp(n.last_accessed_at),
                    ],
                )?;
                Ok(node.clone())
            }
            Node::AgentText(n) => {
                let tool_uses = serde_json::to_string(&n.tool_uses)?;
                conn.execute(
                    "INSERT INTO nodes (id, label, conversation_id, text, turn_index, tool_uses, created_at, last_accessed_at) \
                     VALUES (?1, 'AgentText', ?2, ?3, ?4, ?5, ?6, ?7)",
                    params![
                        n.id.to_string(),
                        n.conversation_id,
                        n.text,
                        n.turn_index,
                        tool_uses,
                        format_timestamp(n.created_at),
                        format_timestamp(n.last_accessed_at),
                    ],
                )?;
                Ok(node.clone())
            }
            Node::ResourceVersion(n) => {
                conn.execute(
                    "INSERT INTO nodes (id, label, conversation_id, uri, content_hash, created_at, last_accessed_at) \
                     VALUES (?1, 'ResourceVersion', ?2, ?3, ?4, ?5, ?6)",
                    params![
                        n.id.to_string(),
                        n.conversation_id,
                        n.uri,
                        n.content_hash,
                        format_timestamp(n.created_at),
                        format_timestamp(n.last_accessed_at),
                    ],
                )?;
                Ok(node.clone())
            }
            Node::Resource(n) => {
                // MERGE on the URI constraint: the partial unique index
                // makes INSERT OR IGNORE atomic, the SELECT returns
                // whichever row won.
                conn.execute(
                    "INSERT OR IGNORE INTO nodes (id, label, conversation_id, uri, current_content_hash, created_at, last_accessed_at) \
                     VALUES (?1, 'Resource', ?2, ?3, ?4, ?5, ?6)",
                    params![
                        n.id.to_string(),
                        n.conversation_id,
                        n.uri,
                        n.current_content_hash,
                        format_timestamp(n.created_at),
                        format_timestamp(n.last_accessed_at),
                    ],
                )?;
                let stored = get_resource_by_uri(conn, &n.uri)?
                    .ok_or_else(|| Error::Decode(format!("resource vanished after merge: {}", n.uri)))?;
                Ok(Node::Resource(stored))
            }
        }
    }

    async fn create_edge(&self, edge: &Edge) -> Result<()> {
        let guard = self.conn.lock().await;
        let conn = guard.as_ref().ok_or(Error::NotConnected)?;

        match edge {
            Edge::Message(e) => {
                let properties = serde_json::to_string(&e.properties)?;
                conn.execute(
                    "INSERT INTO edges (id, label, source_id, target_id, conversation_id, properties, created_at) \
                     VALUES (?1, 'MESSAGE', ?2, ?3, ?4, ?5, ?6)",
                    params![
                        e.id.to_string(),
                        e.source_id.to_string(),
                        e.target_id.to_string(),
                        e.conversation_id,
                        properties,
                        format_timestamp(e.created_at),
                    ],
                )?;
            }
            Edge::ToolUse(e) => {
                let properties = serde_json::to_string(&e.properties)?;
                conn.execute(
                    "INSERT INTO edges (id, label, source_id, target_id, tool_name, conversation_id, properties, created_at) \
                     VALUES (?1, 'TOOL_USE', ?2, ?3, ?4, ?5, ?6, ?7)",
                    params![
                        e.id.to_string(),
                        e.source_id.to_string(),
                        e.target_id.to_string(),
                        e.tool_name,
                        e.conversation_id,
                        properties,
                        format_timestamp(e.created_at),
                    ],
                )?;
            }
            Edge::VersionOf(e) => {
                conn.execute(
                    "INSERT INTO edges (id, label, source_id, target_id, created_at) \
                     VALUES (?1, 'VERSION_OF', ?2, ?3, ?4)",
                    params![
                        e.id.to_string(),
                        e.version_id.to_string(),
                        e.resource_id.to_string(),
                        format_timestamp(e.created_at),
                    ],
                )?;
            }
        }
        Ok(())
    }

    async fn get_user_text(&self, node_id: Uuid) -> Result<Option<UserText>> {
        let guard = self.conn.lock().await;
        let conn = guard.as_ref().ok_or(Error::NotConnected)?;
        let row = conn
            .query_row(
                &format!(
                    "SELECT {NODE_COLUMNS} FROM nodes WHERE id = ?1 AND label = 'UserText'"
                ),
                params![node_id.to_string()],
                NodeRow::from_row,
            )
            .optional()?;
        row.map(NodeRow::into_user_text).transpose()
    }

    async fn get_last_user_text(&self, conversation_id: &str) -> Result<Option<UserText>> {
        let guard = self.conn.lock().await;
        let conn = guard.as_ref().ok_or(Error::NotConnected)?;
        let row = conn
            .query_row(
                &format!(
                    "SELECT {NODE_COLUMNS} FROM nodes \
                     WHERE conversation_id = ?1 AND label = 'UserText' \
                     ORDER BY created_at DESC, rowid DESC LIMIT 1"
                ),
                params![conversation_id],
                NodeRow::from_row,
            )
            .optional()?;
        row.map(NodeRow::into_user_text).transpose()
    }

    async fn get_last_agent_text(&self, conversation_id: &str) -> Result<Option<AgentText>> {
        let guard = self.conn.lock().await;
        let conn = guard.as_ref().ok_or(Error::NotConnected)?;
        let row = conn
            .query_row(
                &format!(
                    "SELECT {NODE_COLUMNS} FROM nodes \
                     WHERE conversation_id = ?1 AND label = 'AgentText' \
                     ORDER BY created_at DESC, rowid DESC LIMIT 1"
                ),
                params![conversation_id],
                NodeRow::from_row,
            )
            .optional()?;
        row.map(NodeRow::into_agent_text).transpose()
    }

    async fn get_last_message_node(&self, conversation_id: &str) -> Result<Option<MessageNode>> {
        let guard = self.conn.lock().await;
        let conn = guard.as_ref().ok_or(Error::NotConnected)?;
        let row = conn
            .query_row(
                &format!(
                    "SELECT {NODE_COLUMNS} FROM nodes \
                     WHERE conversation_id = ?1 AND label IN ('UserText', 'AgentText') \
                     ORDER BY created_at DESC, rowid DESC LIMIT 1"
                ),
                params![conversation_id],
                NodeRow::from_row,
            )
            .optional()?;
        row.map(NodeRow::into_message_node).transpose()
    }

    async fn get_last_node_in_turn(
        &self,
        conversation_id: &str,
        turn_index: i64,
    ) -> Result<Option<MessageNode>> {
        let guard = self.conn.lock().await;
        let conn = guard.as_ref().ok_or(Error::NotConnected)?;
        let row = conn
            .query_row(
                &format!(
                    "SELECT {NODE_COLUMNS} FROM nodes \
                     WHERE conversation_id = ?1 AND turn_index = ?2 \
                       AND label IN ('UserText', 'AgentText') \
                     ORDER BY created_at DESC, rowid DESC LIMIT 1"
                ),
                params![conversation_id, turn_index],
                NodeRow::from_row,
            )
            .optional()?;
        row.map(NodeRow::into_message_node).transpose()
    }

    async fn get_resource_by_uri(&self, uri: &str) -> Result<Option<Resource>> {
        let guard = self.conn.lock().await;
        let conn = guard.as_ref().ok_or(Error::NotConnected)?;
        get_resource_by_uri(conn, uri)
    }

    async fn get_resource_version_by_hash(
        &self,
        uri: &str,
        content_hash: &str,
    ) -> Result<Option<ResourceVersion>> {
        let guard = self.conn.lock().await;
        let conn = guard.as_ref().ok_or(Error::NotConnected)?;
        let row = conn
            .query_row(
                &format!(
                    "SELECT {NODE_COLUMNS} FROM nodes \
                     WHERE label = 'ResourceVersion' AND uri = ?1 AND content_hash = ?2 \
                     LIMIT 1"
                ),
                params![uri, content_hash],
                NodeRow::from_row,
            )
            .optional()?;
        row.map(NodeRow::into_resource_version).transpose()
    }

    async fn get_max_turn_index(&self, conversation_id: &str) -> Result<i64> {
        let guard = self.conn.lock().await;
        let conn = guard.as_ref().ok_or(Error::NotConnected)?;
        let max: Option<i64> = conn.query_row(
            "SELECT MAX(turn_index) FROM nodes \
             WHERE conversation_id = ?1 AND label IN ('UserText', 'AgentText')",
            params![conversation_id],
            |row| row.get(0),
        )?;
        Ok(max.unwrap_or(-1))
    }

    async fn update_resource_hash(&self, uri: &str, content_hash: &str) -> Result<()> {
        let guard = self.conn.lock().await;
        let conn = guard.as_ref().ok_or(Error::NotConnected)?;
        conn.execute(
            "UPDATE nodes SET current_content_hash = ?2, last_accessed_at = ?3 \
             WHERE label = 'Resource' AND uri = ?1",
            params![uri, content_hash, format_timestamp(now())],
        )?;
        Ok(())
    }

    async fn update_last_accessed(&self, node_ids: &[Uuid]) -> Result<()> {
        if node_ids.is_empty() {
            return Ok(());
        }
        let guard = self.conn.lock().await;
        let conn = guard.as_ref().ok_or(Error::NotConnected)?;
        let ts = format_timestamp(now());
        let mut stmt =
            conn.prepare("UPDATE nodes SET last_accessed_at = ?1 WHERE id = ?2")?;
        for node_id in node_ids {
            stmt.execute(params![ts, node_id.to_string()])?;
        }
        Ok(())
    }

    async fn get_node_context(&self, node_id: Uuid) -> Result<ContextResult> {
        let guard = self.conn.lock().await;
        let conn = guard.as_ref().ok_or(Error::NotConnected)?;

        let mut context = ContextResult::default();

        let head = conn
            .query_row(
                "SELECT u.id, u.text, u.conversation_id, a.id, a.text \
                 FROM nodes u \
                 LEFT JOIN edges e ON e.source_id = u.id AND e.label = 'MESSAGE' \
                 LEFT JOIN nodes a ON a.id = e.target_id AND a.label = 'AgentText' \
                 WHERE u.id = ?1 AND u.label = 'UserText' \
                 ORDER BY a.created_at ASC LIMIT 1",
                params![node_id.to_string()],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, Option<String>>(3)?,
                        row.get::<_, Option<String>>(4)?,
                    ))
                },
            )
            .optional()?;

        let Some((user_id, user_text, conversation_id, agent_id, agent_text)) = head else {
            return Ok(context);
        };

        context.user_text = Some(UserTextInfo {
            id: parse_id(&user_id)?,
            text: user_text,
            conversation_id,
        });

        let Some(agent_id) = agent_id else {
            return Ok(context);
        };
        let agent_uuid = parse_id(&agent_id)?;
        context.agent_text = Some(AgentTextInfo {
            id: agent_uuid,
            text: agent_text.unwrap_or_default(),
        });

        let mut stmt = conn.prepare(
            "SELECT tu.tool_name, tu.properties, v.id, v.uri, v.content_hash, r.id, r.uri \
             FROM edges tu \
             JOIN nodes v ON v.id = tu.target_id AND v.label = 'ResourceVersion' \
             LEFT JOIN edges vo ON vo.source_id = v.id AND vo.label = 'VERSION_OF' \
             LEFT JOIN nodes r ON r.id = vo.target_id AND r.label = 'Resource' \
             WHERE tu.source_id = ?1 AND tu.label = 'TOOL_USE' \
             ORDER BY tu.rowid ASC",
        )?;
        let rows = stmt
            .query_map(params![agent_id], |row| {
                Ok((
                    row.get::<_, Option<String>>(0)?,
                    row.get::<_, Option<String>>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, Option<String>>(5)?,
                    row.get::<_, Option<String>>(6)?,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        for (tool_name, properties, v_id, v_uri, v_hash, r_id, r_uri) in rows {
            let mut tool_use = ToolUse {
                tool_name: tool_name.unwrap_or_default(),
                properties: decode_properties(properties.as_deref())?,
                resource_version: Some(ResourceVersionInfo {
                    id: parse_id(&v_id)?,
                    uri: v_uri,
                    content_hash: v_hash,
                }),
                resource: None,
            };
            if let (Some(r_id), Some(r_uri)) = (r_id, r_uri) {
                tool_use.resource = Some(ResourceInfo {
                    id: parse_id(&r_id)?,
                    uri: r_uri,
                });
            }
            context.tool_uses.push(tool_use);
        }

        debug!(
            node_id = %node_id,
            tool_uses = context.tool_uses.len(),
            "get_node_context"
        );
        Ok(context)
    }

    async fn get_resource_conversations(
        &self,
        uri: &str,
        query: &ResourceQuery,
    ) -> Result<Vec<ConversationReference>> {
        let guard = self.conn.lock().await;
        let conn = guard.as_ref().ok_or(Error::NotConnected)?;

        let sort_col = match query.sort_by {
            SortBy::CreatedAt => "u.created_at",
            SortBy::LastAccessedAt => "u.last_accessed_at",
        };
        let sort_dir = match query.sort_order {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        };
        let exclude_clause = if query.exclude_conversation_id.is_some() {
            "WHERE u.conversation_id <> ?2"
        } else {
            ""
        };

        let sql = format!(
            "WITH RECURSIVE matched_agents(id) AS ( \
                 SELECT DISTINCT tu.source_id \
                 FROM nodes r \
                 JOIN edges vo ON vo.target_id = r.id AND vo.label = 'VERSION_OF' \
                 JOIN edges tu ON tu.target_id = vo.source_id AND tu.label = 'TOOL_USE' \
                 WHERE r.label = 'Resource' AND r.uri = ?1 \
             ), \
             walk(node_id, agent_id, depth) AS ( \
                 SELECT id, id, 0 FROM matched_agents \
                 UNION \
                 SELECT e.source_id, walk.agent_id, walk.depth + 1 \
                 FROM walk \
                 JOIN edges e ON e.target_id = walk.node_id AND e.label = 'MESSAGE' \
                 WHERE walk.depth < {depth} \
             ) \
             SELECT DISTINCT u.conversation_id, u.id, u.text, a.text, \
                    u.created_at, u.last_accessed_at \
             FROM walk \
             JOIN nodes u ON u.id = walk.node_id AND u.label = 'UserText' \
             JOIN nodes a ON a.id = walk.agent_id \
             {exclude_clause} \
             ORDER BY {sort_col} {sort_dir} \
             LIMIT {limit}",
            depth = RESOURCE_PATH_DEPTH,
            limit = query.limit,
        );

        let map_row = |row: &Row<'_>| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, Option<String>>(3)?,
                row.get::<_, String>(4)?,
            ))
        };

        let mut stmt = conn.prepare(&sql)?;
        let rows = match &query.exclude_conversation_id {
            Some(exclude) => stmt
                .query_map(params![uri, exclude], map_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?,
            None => stmt
                .query_map(params![uri], map_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?,
        };

        let mut references = Vec::with_capacity(rows.len());
        for (conversation_id, user_id, user_text, agent_text, created_at) in rows {
            references.push(ConversationReference {
                conversation_id,
                user_text_id: parse_id(&user_id)?,
                user_text,
                agent_text,
                created_at: parse_timestamp(&created_at),
            });
        }

        debug!(uri, results = references.len(), "get_resource_conversations");
        Ok(references)
    }

    async fn get_trajectory_nodes(
        &self,
        node_id: Uuid,
        max_depth: u32,
    ) -> Result<Vec<TrajectoryNode>> {
        let guard = self.conn.lock().await;
        let conn = guard.as_ref().ok_or(Error::NotConnected)?;

        // Only UserText nodes anchor a trajectory.
        let start = conn
            .query_row(
                "SELECT conversation_id FROM nodes WHERE id = ?1 AND label = 'UserText'",
                params![node_id.to_string()],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        let Some(conversation_id) = start else {
            return Ok(Vec::new());
        };

        let depth = max_depth.min(MAX_TRAJECTORY_DEPTH);
        let mut stmt = conn.prepare(
            "WITH RECURSIVE walk(node_id, depth) AS ( \
                 SELECT ?1, 0 \
                 UNION \
                 SELECT e.target_id, walk.depth + 1 \
                 FROM walk \
                 JOIN edges e ON e.source_id = walk.node_id AND e.label = 'MESSAGE' \
                 WHERE walk.depth < ?2 \
             ) \
             SELECT n.id, n.label, n.text, n.conversation_id, n.turn_index, \
                    n.created_at, n.tool_uses \
             FROM (SELECT DISTINCT node_id FROM walk) w \
             JOIN nodes n ON n.id = w.node_id \
             WHERE n.conversation_id = ?3 \
             ORDER BY n.created_at ASC, n.rowid ASC",
        )?;
        let rows = stmt
            .query_map(
                params![node_id.to_string(), depth, conversation_id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, Option<String>>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, Option<i64>>(4)?,
                        row.get::<_, String>(5)?,
                        row.get::<_, Option<String>>(6)?,
                    ))
                },
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut nodes = Vec::with_capacity(rows.len());
        for (id, label, text, conversation_id, turn_index, created_at, tool_uses) in rows {
            let label = NodeLabel::parse(&label)
                .ok_or_else(|| Error::Decode(format!("unknown node label: {label}")))?;
            nodes.push(TrajectoryNode {
                id: parse_id(&id)?,
                label,
                text: text.unwrap_or_default(),
                conversation_id,
                turn_index: turn_index.unwrap_or(0),
                created_at: parse_timestamp(&created_at),
                tool_uses,
            });
        }

        debug!(node_id = %node_id, results = nodes.len(), "get_trajectory_nodes");
        Ok(nodes)
    }
}

fn get_resource_by_uri(conn: &Connection, uri: &str) -> Result<Option<Resource>> {
    let row = conn
        .query_row(
            &format!("SELECT {NODE_COLUMNS} FROM nodes WHERE label = 'Resource' AND uri = ?1"),
            params![uri],
            NodeRow::from_row,
        )
        .optional()?;
    row.map(NodeRow::into_resource).transpose()
}

fn parse_id(raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw).map_err(|err| Error::Decode(format!("bad node id {raw:?}: {err}")))
}

fn parse_ts(raw: &str) -> Result<DateTime<Utc>> {
    parse_timestamp(raw).ok_or_else(|| Error::Decode(format!("bad timestamp {raw:?}")))
}

/// Raw `nodes` row, decoded into typed models per label.
struct NodeRow {
    id: String,
    label: String,
    conversation_id: Option<String>,
    text: Option<String>,
    turn_index: Option<i64>,
    tool_uses: Option<String>,
    uri: Option<String>,
    content_hash: Option<String>,
    current_content_hash: Option<String>,
    created_at: String,
    last_accessed_at: String,
}

impl NodeRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            label: row.get(1)?,
            conversation_id: row.get(2)?,
            text: row.get(3)?,
            turn_index: row.get(4)?,
            tool_uses: row.get(5)?,
            uri: row.get(6)?,
            content_hash: row.get(7)?,
            current_content_hash: row.get(8)?,
            created_at: row.get(9)?,
            last_accessed_at: row.get(10)?,
        })
    }

    fn into_user_text(self) -> Result<UserText> {
        Ok(UserText {
            id: parse_id(&self.id)?,
            conversation_id: self.conversation_id.unwrap_or_default(),
            text: self.text.unwrap_or_default(),
            turn_index: self.turn_index.unwrap_or(0),
            created_at: parse_ts(&self.created_at)?,
            last_accessed_at: parse_ts(&self.last_accessed_at)?,
        })
    }

    fn into_agent_text(self) -> Result<AgentText> {
        let tool_uses: Vec<ToolUseRecord> = match self.tool_uses.as_deref() {
            Some(raw) if !raw.is_empty() => serde_json::from_str(raw)?,
            _ => Vec::new(),
        };
        Ok(AgentText {
            id: parse_id(&self.id)?,
            conversation_id: self.conversation_id.unwrap_or_default(),
            text: self.text.unwrap_or_default(),
            turn_index: self.turn_index.unwrap_or(0),
            tool_uses,
            created_at: parse_ts(&self.created_at)?,
            last_accessed_at: parse_ts(&self.last_accessed_at)?,
        })
    }

    fn into_resource(self) -> Result<Resource> {
        let created_at = parse_ts(&self.created_at)?;
        let last_accessed_at = parse_ts(&self.last_accessed_at)?;
        Ok(Resource {
            id: parse_id(&self.id)?,
            uri: self.uri.unwrap_or_default(),
            current_content_hash: self.current_content_hash,
            conversation_id: self.conversation_id.unwrap_or_default(),
            created_at,
            last_accessed_at,
        })
    }

    fn into_resource_version(self) -> Result<ResourceVersion> {
        Ok(ResourceVersion {
            id: parse_id(&self.id)?,
            uri: self.uri.unwrap_or_default(),
            content_hash: self.content_hash.unwrap_or_default(),
            conversation_id: self.conversation_id.unwrap_or_default(),
            created_at: parse_ts(&self.created_at)?,
            last_accessed_at: parse_ts(&self.last_accessed_at)?,
        })
    }

    fn into_message_node(self) -> Result<MessageNode> {
        match self.label.as_str() {
            "UserText" => Ok(MessageNode::User(self.into_user_text()?)),
            "AgentText" => Ok(MessageNode::Agent(self.into_agent_text()?)),
            other => Err(Error::Decode(format!("unexpected message node label: {other}"))),
        }
    }
}

fn decode_properties(raw: Option<&str>) -> Result<serde_json::Map<String, serde_json::Value>> {
    match raw {
        Some(raw) if !raw.is_empty() => Ok(serde_json::from_str(raw)?),
        _ => Ok(serde_json::Map::new()),
    }
}
