// Ingestion and retrieval engines.
//
// `Ingestor` turns role-tagged messages into graph and vector mutations;
// `Retriever` answers the four retrieval calls on top of the two stores.
// Both are written against the storage traits, never a concrete backend.

mod embed;
mod error;
mod ingest;
mod retrieve;

pub use embed::{BoxError, Embedder};
pub use error::{Error, Result};
pub use ingest::{content_hash, CreatedNodes, Ingestor};
pub use retrieve::Retriever;
