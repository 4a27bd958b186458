use strata_types::ObjectId;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// An object was offered under an id its content does not hash to.
    #[error("object {id} does not match its content (hashes to {computed})")]
    HashMismatch { id: ObjectId, computed: ObjectId },

    #[error("refusing to store an object under the null id")]
    NullObjectId,

    #[error("cannot encode record: {0}")]
    Serialization(String),

    /// Stored bytes that do not decode as the expected record kind.
    #[error("object {id} is not a valid record: {reason}")]
    CorruptObject { id: ObjectId, reason: String },
}

pub type StoreResult<T> = Result<T, StoreError>;
