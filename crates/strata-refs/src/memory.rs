//! In-memory branch store.
//!
//! [`InMemoryBranchStore`] keeps all heads in a `HashMap` protected by a
//! `RwLock`. The compare and the swap happen under one write lock, which is
//! what makes the update atomic.

use std::collections::HashMap;
use std::sync::RwLock;

use strata_types::ObjectId;
use tokio::sync::watch;
use tracing::debug;

use crate::error::{RefError, Result};
use crate::names::validate_branch_name;
use crate::traits::BranchStore;

/// An in-memory implementation of [`BranchStore`].
#[derive(Debug)]
pub struct InMemoryBranchStore {
    heads: RwLock<HashMap<String, ObjectId>>,
    version: watch::Sender<u64>,
}

impl InMemoryBranchStore {
    /// Create a new empty branch store.
    pub fn new() -> Self {
        let (version, _) = watch::channel(0);
        Self {
            heads: RwLock::new(HashMap::new()),
            version,
        }
    }

    /// Create a store pre-populated with heads (used when reloading a
    /// snapshot). Names are validated.
    pub fn with_heads<I>(heads: I) -> Result<Self>
    where
        I: IntoIterator<Item = (String, ObjectId)>,
    {
        let mut map = HashMap::new();
        for (name, hash) in heads {
            validate_branch_name(&name)?;
            map.insert(name, hash);
        }
        let (version, _) = watch::channel(0);
        Ok(Self {
            heads: RwLock::new(map),
            version,
        })
    }
}

impl Default for InMemoryBranchStore {
    fn default() -> Self {
        Self::new()
    }
}

impl BranchStore for InMemoryBranchStore {
    fn get(&self, name: &str) -> Result<Option<ObjectId>> {
        let heads = self
            .heads
            .read()
            .map_err(|e| RefError::Lock(e.to_string()))?;
        Ok(heads.get(name).copied())
    }

    fn compare_and_swap(
        &self,
        name: &str,
        expected: Option<ObjectId>,
        new: ObjectId,
    ) -> Result<()> {
        validate_branch_name(name)?;
        if new.is_null() {
            return Err(RefError::NullTarget {
                name: name.to_string(),
            });
        }

        {
            let mut heads = self
                .heads
                .write()
                .map_err(|e| RefError::Lock(e.to_string()))?;
            let actual = heads.get(name).copied();
            if actual != expected {
                return Err(RefError::Conflict {
                    name: name.to_string(),
                    expected,
                    actual,
                });
            }
            heads.insert(name.to_string(), new);
        }

        debug!(branch = name, head = %new.short_hex(), "branch advanced");
        self.version.send_modify(|v| *v += 1);
        Ok(())
    }

    fn list(&self) -> Result<Vec<(String, ObjectId)>> {
        let heads = self
            .heads
            .read()
            .map_err(|e| RefError::Lock(e.to_string()))?;
        let mut result: Vec<(String, ObjectId)> =
            heads.iter().map(|(k, v)| (k.clone(), *v)).collect();
        result.sort_by(|(a, _), (b, _)| a.cmp(b));
        Ok(result)
    }

    fn subscribe(&self) -> watch::Receiver<u64> {
        self.version.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn h(byte: u8) -> ObjectId {
        ObjectId::from_hash([byte; 32])
    }

    #[test]
    fn create_branch_with_no_expected_head() {
        let store = InMemoryBranchStore::new();
        store.compare_and_swap("master", None, h(1)).unwrap();
        assert_eq!(store.get("master").unwrap(), Some(h(1)));
    }

    #[test]
    fn creating_existing_branch_conflicts() {
        let store = InMemoryBranchStore::new();
        store.compare_and_swap("master", None, h(1)).unwrap();
        let err = store.compare_and_swap("master", None, h(2)).unwrap_err();
        assert!(matches!(
            err,
            RefError::Conflict { expected: None, actual: Some(a), .. } if a == h(1)
        ));
    }

    #[test]
    fn second_writer_with_stale_head_conflicts() {
        let store = InMemoryBranchStore::new();
        store.compare_and_swap("master", None, h(1)).unwrap();

        // Client A advances from H1.
        store.compare_and_swap("master", Some(h(1)), h(2)).unwrap();
        // Client B still assumes H1.
        let err = store.compare_and_swap("master", Some(h(1)), h(3)).unwrap_err();
        assert!(matches!(err, RefError::Conflict { .. }));
        assert_eq!(store.get("master").unwrap(), Some(h(2)));
    }

    #[test]
    fn swap_on_missing_branch_with_expected_head_conflicts() {
        let store = InMemoryBranchStore::new();
        let err = store.compare_and_swap("dev", Some(h(1)), h(2)).unwrap_err();
        assert!(matches!(err, RefError::Conflict { actual: None, .. }));
        assert!(store.get("dev").unwrap().is_none());
    }

    #[test]
    fn rejects_null_target_and_bad_names() {
        let store = InMemoryBranchStore::new();
        assert!(matches!(
            store.compare_and_swap("master", None, ObjectId::null()),
            Err(RefError::NullTarget { .. })
        ));
        assert!(matches!(
            store.compare_and_swap("bad name", None, h(1)),
            Err(RefError::InvalidBranchName { .. })
        ));
    }

    #[test]
    fn head_reports_fork() {
        let store = InMemoryBranchStore::new();
        store.compare_and_swap("master", None, h(1)).unwrap();

        let same = store.head("master", Some(h(1))).unwrap();
        assert_eq!(same.hash, Some(h(1)));
        assert!(!same.forked);

        let stale = store.head("master", Some(h(9))).unwrap();
        assert!(stale.forked);

        let missing = store.head("nope", None).unwrap();
        assert_eq!(missing.hash, None);
        assert!(!missing.forked);
    }

    #[test]
    fn list_is_sorted() {
        let store = InMemoryBranchStore::new();
        store.compare_and_swap("zeta", None, h(1)).unwrap();
        store.compare_and_swap("alpha", None, h(2)).unwrap();
        assert_eq!(store.names().unwrap(), vec!["alpha", "zeta"]);
    }

    #[test]
    fn successful_swap_notifies_subscribers() {
        let store = InMemoryBranchStore::new();
        let mut rx = store.subscribe();
        assert!(!rx.has_changed().unwrap());
        store.compare_and_swap("master", None, h(1)).unwrap();
        assert!(rx.has_changed().unwrap());
        rx.borrow_and_update();

        let _ = store.compare_and_swap("master", None, h(2));
        assert!(!rx.has_changed().unwrap());
    }

    #[test]
    fn with_heads_prepopulates() {
        let store = InMemoryBranchStore::with_heads(vec![("master".to_string(), h(4))]).unwrap();
        assert_eq!(store.get("master").unwrap(), Some(h(4)));
        assert!(InMemoryBranchStore::with_heads(vec![("".to_string(), h(4))]).is_err());
    }

    #[test]
    fn concurrent_writers_only_one_wins() {
        use std::sync::Arc;
        use std::thread;

        let store = Arc::new(InMemoryBranchStore::new());
        store.compare_and_swap("master", None, h(1)).unwrap();

        let handles: Vec<_> = (2..10u8)
            .map(|b| {
                let store = Arc::clone(&store);
                thread::spawn(move || store.compare_and_swap("master", Some(h(1)), h(b)).is_ok())
            })
            .collect();
        let winners = handles
            .into_iter()
            .map(|t| t.join().expect("thread should not panic"))
            .filter(|ok| *ok)
            .count();
        assert_eq!(winners, 1);
    }
}
