//! Error types for the correlation layer
//!
//! Decoding and store failures are values returned to the immediate caller.
//! Nothing in this crate terminates the process on a bad inbound message.

use thiserror::Error;

/// Failures raised while ingesting or claiming correlated messages.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CorrelationError {
    #[error("Malformed identifier '{raw}': {segments} segment(s), need at least 3 with a non-empty middle")]
    MalformedIdentifier { raw: String, segments: usize },

    #[error("Message of kind '{kind}' carries no Identifier field")]
    MissingIdentifier { kind: String },

    #[error("Correlation store lock poisoned: {0}")]
    LockPoisoned(String),
}

/// Failures from the persistent property store.
#[derive(Error, Debug)]
pub enum PropertyError {
    #[error("Property not found: {0}")]
    NotFound(String),

    #[error("Property '{key}' is not an integer: '{value}'")]
    NotAnInteger { key: String, value: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = CorrelationError> = std::result::Result<T, E>;
