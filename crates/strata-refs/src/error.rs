//! Error types for branch operations.

use strata_types::ObjectId;
use thiserror::Error;

/// Errors that can occur during branch operations.
#[derive(Debug, Error)]
pub enum RefError {
    /// The branch name is invalid.
    #[error("invalid branch name: {name}: {reason}")]
    InvalidBranchName { name: String, reason: String },

    /// The compare-and-swap precondition failed: the branch no longer holds
    /// the hash the writer assumed.
    #[error("branch {name} conflict: expected {}, found {}", display_head(.expected), display_head(.actual))]
    Conflict {
        name: String,
        expected: Option<ObjectId>,
        actual: Option<ObjectId>,
    },

    /// A branch cannot point at the null object.
    #[error("branch {name} cannot point at the null object")]
    NullTarget { name: String },

    /// Internal lock failure.
    #[error("lock poisoned: {0}")]
    Lock(String),
}

fn display_head(head: &Option<ObjectId>) -> String {
    match head {
        Some(id) => id.short_hex(),
        None => "(none)".to_string(),
    }
}

/// Convenience type alias for branch operations.
pub type Result<T> = std::result::Result<T, RefError>;
