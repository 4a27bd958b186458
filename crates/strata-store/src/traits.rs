use strata_types::ObjectId;

use crate::error::StoreResult;
use crate::object::{ObjectKind, StoredObject};

/// Content-addressed object store.
///
/// An id maps to at most one content: writes whose declared id does not
/// hash from the data are rejected, and rewriting a present object is a
/// no-op. Implementations do not look inside `data`.
pub trait ObjectStore: Send + Sync {
    /// `Ok(None)` if absent.
    fn read(&self, id: &ObjectId) -> StoreResult<Option<StoredObject>>;

    /// Write an object under its declared ID and return that ID.
    fn write(&self, object: &StoredObject) -> StoreResult<ObjectId>;

    fn exists(&self, id: &ObjectId) -> StoreResult<bool>;

    /// IDs whose hex form starts with the normalized `prefix`, sorted.
    fn find_by_prefix(&self, prefix: &str) -> StoreResult<Vec<ObjectId>>;

    /// Every stored object, sorted by ID.
    fn list(&self) -> StoreResult<Vec<StoredObject>>;

    /// Every stored object of one kind, sorted by ID.
    fn list_kind(&self, kind: ObjectKind) -> StoreResult<Vec<StoredObject>> {
        Ok(self
            .list()?
            .into_iter()
            .filter(|obj| obj.kind == kind)
            .collect())
    }

    /// Write several objects; stops at the first failure.
    fn write_batch(&self, objects: &[StoredObject]) -> StoreResult<Vec<ObjectId>> {
        objects.iter().map(|obj| self.write(obj)).collect()
    }
}
