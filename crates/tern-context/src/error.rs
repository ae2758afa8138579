//! Error types for tern-context

use thiserror::Error;

/// Result type alias using tern-context Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while persisting or restoring the edit history
#[derive(Error, Debug)]
pub enum Error {
    /// Reading or writing the history file failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The decoded history had an impossible shape
    #[error("malformed history: {0}")]
    MalformedHistory(String),
}
