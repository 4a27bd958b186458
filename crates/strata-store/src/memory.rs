use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard};

use strata_types::ObjectId;
use tracing::trace;

use crate::error::{StoreError, StoreResult};
use crate::object::StoredObject;
use crate::traits::ObjectStore;

/// Object store kept entirely in memory.
///
/// Backs every project of the in-memory database. Reads clone the object
/// out of the map.
#[derive(Default)]
pub struct InMemoryObjectStore {
    objects: RwLock<HashMap<ObjectId, StoredObject>>,
}

impl InMemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn objects(&self) -> RwLockReadGuard<'_, HashMap<ObjectId, StoredObject>> {
        self.objects.read().expect("lock poisoned")
    }

    pub fn len(&self) -> usize {
        self.objects().len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects().is_empty()
    }
}

impl ObjectStore for InMemoryObjectStore {
    fn read(&self, id: &ObjectId) -> StoreResult<Option<StoredObject>> {
        Ok(self.objects().get(id).cloned())
    }

    fn write(&self, object: &StoredObject) -> StoreResult<ObjectId> {
        if object.id.is_null() {
            return Err(StoreError::NullObjectId);
        }
        if !object.verify() {
            return Err(StoreError::HashMismatch {
                id: object.id,
                computed: object.compute_id(),
            });
        }
        let mut objects = self.objects.write().expect("lock poisoned");
        // Equal ids mean equal content; keep the first copy.
        if !objects.contains_key(&object.id) {
            trace!(id = %object.id.short_hex(), kind = %object.kind, bytes = object.size(), "object inserted");
            objects.insert(object.id, object.clone());
        }
        Ok(object.id)
    }

    fn exists(&self, id: &ObjectId) -> StoreResult<bool> {
        Ok(self.objects().contains_key(id))
    }

    fn find_by_prefix(&self, prefix: &str) -> StoreResult<Vec<ObjectId>> {
        let mut ids: Vec<ObjectId> = self
            .objects()
            .keys()
            .copied()
            .filter(|id| id.matches_prefix(prefix))
            .collect();
        ids.sort();
        Ok(ids)
    }

    fn list(&self) -> StoreResult<Vec<StoredObject>> {
        let mut objects: Vec<StoredObject> = self.objects().values().cloned().collect();
        objects.sort_by_key(|object| object.id);
        Ok(objects)
    }
}

impl std::fmt::Debug for InMemoryObjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryObjectStore")
            .field("objects", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::*;
    use serde_json::json;

    fn make_node(name: &str) -> StoredObject {
        let mut record = NodeRecord::new();
        record.attributes.insert("name".into(), json!(name));
        record.to_stored_object().unwrap()
    }

    fn make_commit(root: ObjectId, message: &str) -> StoredObject {
        CommitRecord::new(vec![], root, message, 1_000)
            .to_stored_object()
            .unwrap()
    }

    #[test]
    fn write_and_read_node() {
        let store = InMemoryObjectStore::new();
        let obj = make_node("root");
        let id = store.write(&obj).unwrap();
        assert_eq!(id, obj.id);

        let read_back = store.read(&id).unwrap().expect("should exist");
        assert_eq!(read_back, obj);
        let record = NodeRecord::from_stored_object(&read_back).unwrap();
        assert_eq!(record.attributes["name"], json!("root"));
    }

    #[test]
    fn read_missing_object_returns_none() {
        let store = InMemoryObjectStore::new();
        assert!(store.read(&ObjectId::from_bytes(b"missing")).unwrap().is_none());
        assert!(!store.exists(&ObjectId::from_bytes(b"missing")).unwrap());
    }

    #[test]
    fn write_is_idempotent() {
        let store = InMemoryObjectStore::new();
        let obj = make_node("same");
        let id1 = store.write(&obj).unwrap();
        let id2 = store.write(&make_node("same")).unwrap();
        assert_eq!(id1, id2);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn write_rejects_mismatched_declared_id() {
        let store = InMemoryObjectStore::new();
        let honest = make_node("a");
        let forged = StoredObject::with_declared_id(
            make_node("b").id,
            honest.kind,
            honest.data.clone(),
        );
        let err = store.write(&forged).unwrap_err();
        assert!(matches!(err, StoreError::HashMismatch { .. }));
        assert!(store.is_empty());
    }

    #[test]
    fn write_rejects_null_id() {
        let store = InMemoryObjectStore::new();
        let obj = StoredObject::with_declared_id(ObjectId::null(), ObjectKind::Node, b"{}".to_vec());
        assert!(matches!(store.write(&obj), Err(StoreError::NullObjectId)));
    }

    #[test]
    fn find_by_prefix_returns_sorted_matches() {
        let store = InMemoryObjectStore::new();
        let ids: Vec<ObjectId> = (0..16)
            .map(|i| store.write(&make_node(&format!("n{i}"))).unwrap())
            .collect();

        let target = ids[3];
        let hex = target.to_hex();
        assert_eq!(store.find_by_prefix(&hex).unwrap(), vec![target]);

        let all = store.find_by_prefix("").unwrap();
        assert_eq!(all.len(), 16);
        for w in all.windows(2) {
            assert!(w[0] < w[1]);
        }
    }

    #[test]
    fn list_kind_filters() {
        let store = InMemoryObjectStore::new();
        let root = store.write(&make_node("root")).unwrap();
        store.write(&make_commit(root, "init")).unwrap();
        store.write(&make_commit(root, "again")).unwrap();

        assert_eq!(store.list().unwrap().len(), 3);
        assert_eq!(store.list_kind(ObjectKind::Commit).unwrap().len(), 2);
        assert_eq!(store.list_kind(ObjectKind::Node).unwrap().len(), 1);
    }

    #[test]
    fn write_batch_stores_all() {
        let store = InMemoryObjectStore::new();
        let objects = vec![make_node("a"), make_node("b"), make_node("c")];
        let ids = store.write_batch(&objects).unwrap();
        assert_eq!(ids.len(), 3);
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn concurrent_reads_are_safe() {
        use std::sync::Arc;
        use std::thread;

        let store = Arc::new(InMemoryObjectStore::new());
        let id = store.write(&make_node("shared")).unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    let obj = store.read(&id).unwrap().expect("present");
                    assert_eq!(obj.compute_id(), id);
                })
            })
            .collect();

        for h in handles {
            h.join().expect("thread should not panic");
        }
    }

    #[test]
    fn debug_format() {
        let store = InMemoryObjectStore::default();
        store.write(&make_node("x")).unwrap();
        let debug = format!("{store:?}");
        assert!(debug.contains("InMemoryObjectStore"));
        assert!(debug.contains("object_count"));
    }
}
