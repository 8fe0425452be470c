//! Error types for the search domain model.

use thiserror::Error;

/// Errors raised while building or parsing domain values.
#[derive(Debug, Error)]
pub enum ModelError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Malformed object identifier
    #[error("Invalid GUID: {0}")]
    InvalidGuid(String),

    /// Type parsing rule, indexing rule or transform violates its invariants
    #[error("Invalid rule: {0}")]
    InvalidRule(String),

    /// Malformed object path
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// Invalid input error
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
