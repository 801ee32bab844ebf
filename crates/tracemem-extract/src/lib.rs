// Resource identity for the knowledge graph.
//
// Canonical URIs are the cross-conversation key for resources; extractors
// map tool-call arguments to those URIs.

mod canonical;
mod extractor;

pub use canonical::canonicalize;
pub use extractor::{DefaultResourceExtractor, ResourceExtractor};
