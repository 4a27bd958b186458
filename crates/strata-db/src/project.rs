//! The [`Project`] trait: objects, commits and branches of one project.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use strata_refs::BranchHead;
use strata_store::{CommitRecord, NodeRecord, StoredObject};
use strata_types::ObjectId;

use crate::error::StorageResult;

/// Lifecycle of a project handle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectState {
    Unopened,
    Open,
    Closed,
}

/// Position in the commit history, used to page through
/// [`Project::get_commits`]. Orders by time, then by id.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CommitMarker {
    pub time: i64,
    pub id: ObjectId,
}

/// A commit together with its identity.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    pub id: ObjectId,
    #[serde(flatten)]
    pub record: CommitRecord,
}

impl Commit {
    pub fn marker(&self) -> CommitMarker {
        CommitMarker {
            time: self.record.time,
            id: self.id,
        }
    }
}

/// Handle to one project.
///
/// Data operations are valid only while the handle is
/// [`ProjectState::Open`]; otherwise they fail with a validation error.
/// Branch heads are the only state with concurrency control.
#[async_trait]
pub trait Project: Send + Sync {
    fn name(&self) -> &str;

    fn state(&self) -> ProjectState;

    /// Flush the owning database.
    async fn fsync(&self) -> StorageResult<()>;

    /// Move the handle to `Closed`. Closing twice is a no-op.
    async fn close(&self) -> StorageResult<()>;

    /// Store `object` under its declared id. Identical re-inserts are
    /// no-ops; a declared id that does not match the content is rejected.
    async fn insert_object(&self, object: &StoredObject) -> StorageResult<ObjectId>;

    async fn load_object(&self, hash: ObjectId) -> StorageResult<StoredObject>;

    /// Resolve a hash prefix (`^[#0-9a-zA-Z_]*$`) to the unique stored id.
    async fn find_hash(&self, prefix: &str) -> StorageResult<ObjectId>;

    /// Every stored object, sorted by id.
    async fn dump_objects(&self) -> StorageResult<Vec<StoredObject>>;

    /// Build and insert a commit; returns its hash.
    async fn make_commit(
        &self,
        parents: &[ObjectId],
        root: ObjectId,
        message: &str,
    ) -> StorageResult<ObjectId>;

    /// Up to `count` commits strictly older than `before` (all commits when
    /// `None`), most recent first.
    async fn get_commits(
        &self,
        before: Option<CommitMarker>,
        count: usize,
    ) -> StorageResult<Vec<Commit>>;

    /// Branch names, sorted.
    async fn branch_names(&self) -> StorageResult<Vec<String>>;

    async fn get_branch_hash(
        &self,
        branch: &str,
        assumed: Option<ObjectId>,
    ) -> StorageResult<BranchHead>;

    /// Like [`Project::get_branch_hash`] but waits up to `timeout` for the
    /// head to move away from `assumed`.
    async fn wait_branch_hash(
        &self,
        branch: &str,
        assumed: Option<ObjectId>,
        timeout: Duration,
    ) -> StorageResult<BranchHead>;

    /// Compare-and-swap the branch head from `old` to `new`. `old = None`
    /// creates the branch.
    async fn set_branch_hash(
        &self,
        branch: &str,
        old: Option<ObjectId>,
        new: ObjectId,
    ) -> StorageResult<()>;

    async fn load_node(&self, hash: ObjectId) -> StorageResult<NodeRecord> {
        let object = self.load_object(hash).await?;
        Ok(NodeRecord::from_stored_object(&object)?)
    }

    async fn load_commit(&self, hash: ObjectId) -> StorageResult<Commit> {
        let object = self.load_object(hash).await?;
        Ok(Commit {
            id: hash,
            record: CommitRecord::from_stored_object(&object)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn markers_order_by_time_then_id() {
        let a = CommitMarker {
            time: 10,
            id: ObjectId::from_hash([9; 32]),
        };
        let b = CommitMarker {
            time: 11,
            id: ObjectId::from_hash([1; 32]),
        };
        let c = CommitMarker {
            time: 11,
            id: ObjectId::from_hash([2; 32]),
        };
        assert!(a < b);
        assert!(b < c);
    }

    #[test]
    fn commit_serializes_flat() {
        let commit = Commit {
            id: ObjectId::from_hash([1; 32]),
            record: CommitRecord::new(vec![], ObjectId::from_hash([2; 32]), "init", 5),
        };
        let value = serde_json::to_value(&commit).unwrap();
        assert_eq!(value["message"], "init");
        assert_eq!(value["time"], 5);
        assert_eq!(value["id"], commit.id.to_hex());
    }
}
