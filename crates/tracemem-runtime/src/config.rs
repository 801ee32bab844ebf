use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracemem_types::RetrievalConfig;

use crate::error::Result;

/// Concrete graph backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GraphBackend {
    /// Embedded SQLite property graph (the reference backend).
    #[default]
    Sqlite,
}

/// URI canonicalization mode.
///
/// Must stay stable for the lifetime of a database: switching modes
/// produces URIs that no longer match previously stored ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Absolute file URIs everywhere.
    #[default]
    Global,
    /// File URIs relative to the project root (the parent of the home
    /// directory) for intra-project files, absolute for others.
    Local,
}

/// TraceMem configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Storage root. Falls back to `TRACEMEM_HOME`, then `~/.tracemem`.
    pub home: Option<PathBuf>,
    pub graph_backend: GraphBackend,
    /// Identifier handed to the embedding provider.
    pub embedding_model: String,
    /// Dimension of all vectors; immutable after the first write.
    pub embedding_dimensions: usize,
    /// Optional tenant tag, honored by backends that implement it.
    pub namespace: Option<String>,
    /// Named entry in the reranker registry.
    pub reranker: String,
    pub mode: Mode,
    /// Defaults used when a retrieval call omits its own config.
    pub default_retrieval: RetrievalConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            home: None,
            graph_backend: GraphBackend::default(),
            embedding_model: "text-embedding-3-small".to_string(),
            embedding_dimensions: 1536,
            namespace: None,
            reranker: "rrf".to_string(),
            mode: Mode::default(),
            default_retrieval: RetrievalConfig::default(),
        }
    }
}

impl Config {
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Resolve the storage root: explicit setting, then the
    /// `TRACEMEM_HOME` environment variable, then `~/.tracemem`.
    pub fn home(&self) -> PathBuf {
        if let Some(home) = &self.home {
            return home.clone();
        }
        if let Ok(env_home) = std::env::var("TRACEMEM_HOME") {
            return PathBuf::from(env_home);
        }
        match dirs::home_dir() {
            Some(home) => home.join(".tracemem"),
            None => PathBuf::from(".tracemem"),
        }
    }

    pub fn graph_path(&self) -> PathBuf {
        self.home().join("graph")
    }

    pub fn vector_path(&self) -> PathBuf {
        self.home().join("vectors")
    }

    /// Root for URI canonicalization: one directory above the home in
    /// local mode, none in global mode.
    pub fn canonical_root(&self) -> Option<PathBuf> {
        match self.mode {
            Mode::Global => None,
            Mode::Local => self.home().parent().map(Path::to_path_buf),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.graph_backend, GraphBackend::Sqlite);
        assert_eq!(config.embedding_model, "text-embedding-3-small");
        assert_eq!(config.embedding_dimensions, 1536);
        assert_eq!(config.reranker, "rrf");
        assert_eq!(config.mode, Mode::Global);
        assert!(config.canonical_root().is_none());
    }

    #[test]
    fn test_storage_paths_under_home() {
        let config = Config {
            home: Some(PathBuf::from("/data/mem")),
            ..Default::default()
        };
        assert_eq!(config.graph_path(), PathBuf::from("/data/mem/graph"));
        assert_eq!(config.vector_path(), PathBuf::from("/data/mem/vectors"));
    }

    #[test]
    fn test_local_mode_root_is_parent_of_home() {
        let config = Config {
            home: Some(PathBuf::from("/proj/.tracemem")),
            mode: Mode::Local,
            ..Default::default()
        };
        assert_eq!(config.canonical_root(), Some(PathBuf::from("/proj")));
    }

    #[test]
    fn test_toml_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let config = Config {
            home: Some(PathBuf::from("/data/mem")),
            embedding_dimensions: 64,
            reranker: "linear".to_string(),
            mode: Mode::Local,
            ..Default::default()
        };
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_missing_config_file_yields_defaults() {
        let loaded = Config::load_from(Path::new("/nonexistent/config.toml")).unwrap();
        assert_eq!(loaded, Config::default());
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "embedding_dimensions = 256\nmode = \"local\"\n").unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.embedding_dimensions, 256);
        assert_eq!(loaded.mode, Mode::Local);
        assert_eq!(loaded.reranker, "rrf");
    }
}
