use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use serde_json::{json, Value};
use tempfile::TempDir;
use tracemem_runtime::{Config, TraceMem};
use tracemem_types::{Message, ToolCall};

use crate::embedder::HashEmbedder;

/// Embedding dimension used by every test fixture.
pub const EMBED_DIMENSIONS: usize = 64;

/// A `TraceMem` over a temporary home directory. The directory lives as
/// long as the struct, so store files can be inspected after ingestion.
pub struct TestMem {
    pub mem: TraceMem,
    pub home: TempDir,
}

impl TestMem {
    pub fn home_path(&self) -> &Path {
        self.home.path()
    }
}

/// Open a tempdir-backed `TraceMem` with the deterministic hash embedder.
pub async fn open_test_mem() -> Result<TestMem> {
    let home = TempDir::new()?;
    let config = Config {
        home: Some(home.path().to_path_buf()),
        embedding_dimensions: EMBED_DIMENSIONS,
        ..Default::default()
    };
    let mem = TraceMem::open(config, Arc::new(HashEmbedder::new(EMBED_DIMENSIONS))).await?;
    Ok(TestMem { mem, home })
}

pub fn user(content: &str) -> Message {
    Message::user(content)
}

pub fn assistant(content: &str) -> Message {
    Message::assistant(content)
}

pub fn tool_result(tool_call_id: &str, content: &str) -> Message {
    Message::tool(tool_call_id, content)
}

/// Tool call with arbitrary JSON arguments (must be an object).
pub fn tool_call(id: &str, name: &str, args: Value) -> ToolCall {
    let args = match args {
        Value::Object(map) => map,
        other => panic!("tool args must be a JSON object, got {other}"),
    };
    ToolCall {
        id: id.to_string(),
        name: name.to_string(),
        args,
    }
}

/// The most common fixture: a file read.
pub fn read_file_call(id: &str, path: &str) -> ToolCall {
    tool_call(id, "read_file", json!({ "path": path }))
}
