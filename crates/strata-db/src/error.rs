use strata_refs::RefError;
use strata_store::StoreError;
use strata_types::{ObjectId, TypeError};
use thiserror::Error;

/// Errors surfaced by database and project operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// A handle is not in a usable state, or an argument is malformed.
    #[error("validation error: {0}")]
    Validation(String),

    /// The requested object, project or branch does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// A hash prefix matched more than one stored object.
    #[error("ambiguous hash prefix {prefix:?}: {count} objects match")]
    AmbiguousPrefix { prefix: String, count: usize },

    /// A branch compare-and-swap failed because the head moved.
    #[error("branch {branch} was advanced concurrently (expected {}, found {})", head(.expected), head(.actual))]
    Conflict {
        branch: String,
        expected: Option<ObjectId>,
        actual: Option<ObjectId>,
    },

    /// The supplied credential was rejected.
    #[error("authentication failed for {0}")]
    AuthFailed(String),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("ref error: {0}")]
    Ref(RefError),

    #[error("snapshot error: {0}")]
    Snapshot(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn head(hash: &Option<ObjectId>) -> String {
    hash.map(|h| h.short_hex()).unwrap_or_else(|| "(none)".into())
}

impl From<RefError> for StorageError {
    fn from(err: RefError) -> Self {
        match err {
            RefError::Conflict {
                name,
                expected,
                actual,
            } => Self::Conflict {
                branch: name,
                expected,
                actual,
            },
            RefError::InvalidBranchName { .. } | RefError::NullTarget { .. } => {
                Self::Validation(err.to_string())
            }
            other => Self::Ref(other),
        }
    }
}

impl From<TypeError> for StorageError {
    fn from(err: TypeError) -> Self {
        Self::Validation(err.to_string())
    }
}

pub type StorageResult<T> = Result<T, StorageError>;
