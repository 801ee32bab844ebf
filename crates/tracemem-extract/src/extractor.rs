use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

use crate::canonical::canonicalize;

/// Extracts the canonical URI of the resource a tool call operates on.
///
/// Implementations can be registered per toolset; the ingestion engine
/// calls one pluggable instance. Returning `None` means the call touches no
/// trackable resource.
pub trait ResourceExtractor: Send + Sync {
    fn extract(&self, tool_name: &str, args: &Map<String, Value>) -> Option<String>;
}

// Argument keys checked in priority order.
const FILE_ARGS: [&str; 5] = ["path", "file_path", "filepath", "file", "filename"];
const URL_ARGS: [&str; 3] = ["url", "uri", "endpoint"];

/// Default extractor for common file-path and URL argument patterns.
///
/// In local mode file URIs are made relative to the project root (the
/// parent of the tracemem home directory); global mode keeps absolute URIs.
pub struct DefaultResourceExtractor {
    root: Option<PathBuf>,
}

impl DefaultResourceExtractor {
    /// Global mode: absolute file URIs everywhere.
    pub fn global() -> Self {
        Self { root: None }
    }

    /// Local mode: file URIs relative to the parent of `home`.
    pub fn local(home: &Path) -> Self {
        Self {
            root: home.parent().map(Path::to_path_buf),
        }
    }

    pub fn with_root(root: Option<PathBuf>) -> Self {
        Self { root }
    }

    /// The canonicalization root, if any. The ingestion engine reuses it
    /// for its defensive re-canonicalization pass.
    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    fn extract_raw(&self, args: &Map<String, Value>) -> Option<String> {
        for key in FILE_ARGS {
            if let Some(Value::String(path)) = args.get(key)
                && !path.is_empty()
            {
                return Some(if path.starts_with("file://") {
                    path.clone()
                } else {
                    format!("file://{path}")
                });
            }
        }

        for key in URL_ARGS {
            if let Some(Value::String(url)) = args.get(key)
                && !url.is_empty()
            {
                return Some(url.clone());
            }
        }

        None
    }
}

impl ResourceExtractor for DefaultResourceExtractor {
    fn extract(&self, _tool_name: &str, args: &Map<String, Value>) -> Option<String> {
        self.extract_raw(args)
            .map(|uri| canonicalize(&uri, self.root.as_deref()))
    }
}
