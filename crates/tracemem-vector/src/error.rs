use std::fmt;

/// Result type for tracemem-vector operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur in the vector storage layer
#[derive(Debug)]
pub enum Error {
    /// Database operation failed
    Database(rusqlite::Error),

    /// IO operation failed
    Io(std::io::Error),

    /// Operation attempted before `connect` (or after `close`)
    NotConnected,

    /// Vector dimension does not match the database's fixed dimension
    Dimension { expected: usize, got: usize },

    /// Reranker key not present in the registry
    UnknownReranker(String),

    /// Stored row could not be decoded
    Decode(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Database(err) => write!(f, "Database error: {}", err),
            Error::Io(err) => write!(f, "IO error: {}", err),
            Error::NotConnected => write!(f, "Vector store is not connected"),
            Error::Dimension { expected, got } => {
                write!(f, "Vector dimension mismatch: expected {}, got {}", expected, got)
            }
            Error::UnknownReranker(name) => write!(f, "Unknown reranker: {}", name),
            Error::Decode(msg) => write!(f, "Decode error: {}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Database(err) => Some(err),
            Error::Io(err) => Some(err),
            Error::NotConnected
            | Error::Dimension { .. }
            | Error::UnknownReranker(_)
            | Error::Decode(_) => None,
        }
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Database(err)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}
