//! Error types for drift-core

use thiserror::Error;

/// Result type alias using drift-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in drift-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Referenced rule, property, or run does not exist (or does not
    /// belong to the addressed parent)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Structural precondition violated, e.g. running a rule that has no
    /// properties defined
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Stored data violates a lifecycle or ordering invariant. This is a
    /// bug, not an operator mistake.
    #[error("Integrity error: {0}")]
    Integrity(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
