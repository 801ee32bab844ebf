// Shared fixtures for tracemem tests: a deterministic embedder and
// message builders, plus a tempdir-backed TraceMem.

mod embedder;
mod fixtures;

pub use embedder::HashEmbedder;
pub use fixtures::{
    assistant, open_test_mem, read_file_call, tool_call, tool_result, user, TestMem,
    EMBED_DIMENSIONS,
};
