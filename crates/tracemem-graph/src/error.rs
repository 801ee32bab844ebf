use std::fmt;

/// Result type for tracemem-graph operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur in the graph storage layer
#[derive(Debug)]
pub enum Error {
    /// Database operation failed
    Database(rusqlite::Error),

    /// JSON encoding/decoding of embedded records failed
    Serialization(serde_json::Error),

    /// IO operation failed
    Io(std::io::Error),

    /// Operation attempted before `connect` (or after `close`)
    NotConnected,

    /// Stored row could not be decoded into a model
    Decode(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Database(err) => write!(f, "Database error: {}", err),
            Error::Serialization(err) => write!(f, "Serialization error: {}", err),
            Error::Io(err) => write!(f, "IO error: {}", err),
            Error::NotConnected => write!(f, "Graph store is not connected"),
            Error::Decode(msg) => write!(f, "Decode error: {}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Database(err) => Some(err),
            Error::Serialization(err) => Some(err),
            Error::Io(err) => Some(err),
            Error::NotConnected | Error::Decode(_) => None,
        }
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Database(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}
