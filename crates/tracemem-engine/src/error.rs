use std::fmt;

/// Result type for tracemem-engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur in the ingestion/retrieval engine
#[derive(Debug)]
pub enum Error {
    /// Graph storage layer error
    Graph(tracemem_graph::Error),

    /// Vector storage layer error
    Vector(tracemem_vector::Error),

    /// The embedder failed or returned a wrong-dimension vector
    Embed(String),

    /// The resource extractor was handed impossible inputs
    Extraction(String),

    /// Stored data could not be decoded into retrieval shapes
    Decode(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Graph(err) => write!(f, "Graph store error: {}", err),
            Error::Vector(err) => write!(f, "Vector store error: {}", err),
            Error::Embed(msg) => write!(f, "Embedding error: {}", msg),
            Error::Extraction(msg) => write!(f, "Extraction error: {}", msg),
            Error::Decode(msg) => write!(f, "Decode error: {}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Graph(err) => Some(err),
            Error::Vector(err) => Some(err),
            Error::Embed(_) | Error::Extraction(_) | Error::Decode(_) => None,
        }
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
