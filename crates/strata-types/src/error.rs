use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid hex string: {0}")]
    InvalidHex(String),

    #[error("invalid byte length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("malformed guid: {0:?}")]
    InvalidGuid(String),

    #[error("invalid hash prefix: {0:?}")]
    InvalidPrefix(String),

    #[error("invalid relid: {0:?}")]
    InvalidRelid(String),
}
