//! Error types
//!
//! Defines the error taxonomy shared by every storage backend.

use std::fmt;
use std::io;

/// Storage errors
#[derive(Debug)]
pub enum StorageError {
    /// Construction-time precondition failed (root missing, bucket missing, relay unreachable)
    Initialization(String),
    /// Operation invoked on a backend whose initialization failed
    NotReady,
    /// Containment violation, malformed path or empty file path
    Path(String),
    /// Target, source or required parent does not exist
    NotFound(String),
    /// Destination collision
    AlreadyExists(String),
    /// Underlying filesystem or network call failed
    Transport(String),
    /// Operation not available on this backend
    Unsupported(&'static str),
    /// Value encoding or decoding failed
    Serialization(String),
    /// Configuration could not be loaded or is invalid
    Config(String),
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::Initialization(m) => write!(f, "Initialization failed: {}", m),
            StorageError::NotReady => write!(f, "Storage not initialized"),
            StorageError::Path(p) => write!(f, "Invalid path: {}", p),
            StorageError::NotFound(p) => write!(f, "Not found: {}", p),
            StorageError::AlreadyExists(p) => write!(f, "Already exists: {}", p),
            StorageError::Transport(m) => write!(f, "Transport error: {}", m),
            StorageError::Unsupported(op) => write!(f, "Unsupported operation: {}", op),
            StorageError::Serialization(m) => write!(f, "Serialization error: {}", m),
            StorageError::Config(m) => write!(f, "Configuration error: {}", m),
        }
    }
}

impl std::error::Error for StorageError {}

impl StorageError {
    /// True for the "already exists" family of failures.
    pub fn is_already_exists(&self) -> bool {
        matches!(self, StorageError::AlreadyExists(_))
    }

    /// True for the "not found" family of failures.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound(_))
    }
}

impl From<io::Error> for StorageError {
    fn from(error: io::Error) -> Self {
        match error.kind() {
            io::ErrorKind::NotFound => StorageError::NotFound(error.to_string()),
            io::ErrorKind::AlreadyExists => StorageError::AlreadyExists(error.to_string()),
            _ => StorageError::Transport(error.to_string()),
        }
    }
}

impl From<postcard::Error> for StorageError {
    fn from(error: postcard::Error) -> Self {
        StorageError::Serialization(error.to_string())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(error: serde_json::Error) -> Self {
        StorageError::Transport(format!("malformed relay response: {}", error))
    }
}

impl From<opendal::Error> for StorageError {
    fn from(error: opendal::Error) -> Self {
        match error.kind() {
            opendal::ErrorKind::NotFound => StorageError::NotFound(error.to_string()),
            opendal::ErrorKind::AlreadyExists => StorageError::AlreadyExists(error.to_string()),
            _ => StorageError::Transport(error.to_string()),
        }
    }
}

impl From<reqwest::Error> for StorageError {
    fn from(error: reqwest::Error) -> Self {
        StorageError::Transport(error.to_string())
    }
}

impl From<config::ConfigError> for StorageError {
    fn from(error: config::ConfigError) -> Self {
        StorageError::Config(error.to_string())
    }
}
