use strata_db::StorageError;
use strata_store::StoreError;
use strata_types::TypeError;
use thiserror::Error;

use crate::node::Node;

/// Errors raised by the node layers.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The handle does not refer to a live node, or refers to one whose
    /// base has not been resolved.
    #[error("invalid node handle {0:?}")]
    InvalidNode(Node),

    #[error("validation error: {0}")]
    Validation(String),

    /// Malformed guid, relid or hash text.
    #[error("invalid value: {0}")]
    InvalidValue(#[from] TypeError),

    #[error("node {path:?} has no relative guid")]
    MissingGuid { path: String },

    #[error("base chain of node {path:?} is cyclic")]
    BaseCycle { path: String },

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("record error: {0}")]
    Record(#[from] StoreError),
}

impl CoreError {
    /// `true` for the validation family: bad handles, malformed input and
    /// rejected structural edits.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::InvalidNode(_) | Self::Validation(_) | Self::InvalidValue(_) | Self::BaseCycle { .. }
        )
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
