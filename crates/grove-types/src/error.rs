use thiserror::Error;

/// Errors produced by type construction and parsing.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid hex string: {0}")]
    InvalidHex(String),

    #[error("invalid byte length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("invalid tag name: {name}: {reason}")]
    InvalidTagName { name: String, reason: String },
}
