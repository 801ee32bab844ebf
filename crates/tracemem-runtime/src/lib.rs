//! tracemem: knowledge-graph memory for AI agents.
//!
//! Every conversation turn (user prompts, assistant replies, tool
//! invocations and tool results) is recorded as a typed, ordered graph
//! with content-addressed resource versioning, and made retrievable by
//! semantic similarity, by resource, and by conversation trajectory.
//!
//! # Quickstart
//!
//! ```no_run
//! use std::sync::Arc;
//! use tracemem_runtime::{Config, Message, TraceMem};
//! # struct MyEmbedder;
//! # #[async_trait::async_trait]
//! # impl tracemem_runtime::Embedder for MyEmbedder {
//! #     fn dimensions(&self) -> usize { 1536 }
//! #     async fn embed(&self, _: &str) -> Result<Vec<f32>, tracemem_runtime::BoxError> {
//! #         Ok(vec![0.0; 1536])
//! #     }
//! # }
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let embedder = Arc::new(MyEmbedder);
//! let mut mem = TraceMem::open(Config::default(), embedder).await?;
//!
//! mem.add_message("conv-1", &Message::user("Read auth.rs")).await?;
//! let hits = mem.search("authentication", None).await?;
//! for hit in hits {
//!     println!("{} ({:.3})", hit.text, hit.score);
//! }
//!
//! mem.close().await?;
//! # Ok(())
//! # }
//! ```

mod config;
mod error;
mod runtime;

pub use config::{Config, GraphBackend, Mode};
pub use error::{Error, Result};
pub use runtime::{TraceMem, TraceMemBuilder};

// Re-export the surface callers program against.
pub use tracemem_engine::{content_hash, BoxError, CreatedNodes, Embedder};
pub use tracemem_extract::{canonicalize, DefaultResourceExtractor, ResourceExtractor};
pub use tracemem_types::{
    canonical_tool_content, ContextResult, ConversationReference, Message, RetrievalConfig,
    RetrievalResult, SortBy, SortOrder, ToolCall, ToolUse, TrajectoryResult, TrajectoryStep,
};
pub use tracemem_vector::{RankedHit, Reranker, RerankerRegistry};
