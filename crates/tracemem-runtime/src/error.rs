use std::fmt;

/// Result type for tracemem-runtime operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur at the control surface
#[derive(Debug)]
pub enum Error {
    /// Ingestion/retrieval engine error
    Engine(tracemem_engine::Error),

    /// Graph storage layer error
    Graph(tracemem_graph::Error),

    /// Vector storage layer error
    Vector(tracemem_vector::Error),

    /// Configuration error (unknown backend, unknown reranker, invalid
    /// dimension, unreadable config file)
    Config(String),

    /// IO operation failed
    Io(std::io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Engine(err) => write!(f, "{}", err),
            Error::Graph(err) => write!(f, "Graph store error: {}", err),
            Error::Vector(err) => write!(f, "Vector store error: {}", err),
            Error::Config(msg) => write!(f, "Configuration error: {}", msg),
            Error::Io(err) => write!(f, "IO error: {}", err),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Engine(err) => Some(err),
            Error::Graph(err) => Some(err),
            Error::Vector(err) => Some(err),
            Error::Config(_) => None,
            Error::Io(err) => Some(err),
        }
    }
}

impl From<tracemem_engine::Error> for Error {
    fn from(err: tracemem_engine::Error) -> Self {
        Error::Engine(err)
    }
}

impl From<tracemem_graph::Error> for Error {
    fn from(err: tracemem_graph::Error) -> Self {
        Error::Graph(err)
    }
}

impl From<tracemem_vector::Error> for Error {
    fn from(err: tracemem_vector::Error) -> Self {
        Error::Vector(err)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for Error {
    fn from(err: toml::ser::Error) -> Self {
        Error::Config(err.to_string())
    }
}
