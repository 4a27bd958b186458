//! Tracing decorators for [`Database`] and [`Project`].
//!
//! Every call is logged at DEBUG on entry together with its outcome;
//! failures are logged at WARN.

use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use strata_refs::BranchHead;
use strata_store::StoredObject;
use strata_types::ObjectId;
use tracing::{debug, warn};

use crate::auth::Identity;
use crate::database::{Database, DatabaseStatus};
use crate::error::StorageResult;
use crate::project::{Commit, CommitMarker, Project, ProjectState};

fn traced<T: Debug>(scope: &str, op: &str, result: StorageResult<T>) -> StorageResult<T> {
    match &result {
        Ok(value) => debug!(scope, op, result = ?value, "storage call finished"),
        Err(e) => warn!(scope, op, error = %e, "storage call failed"),
    }
    result
}

/// Wraps a [`Database`] and logs every call.
#[derive(Debug, Clone)]
pub struct LoggingDatabase<D> {
    inner: D,
}

impl<D: Database> LoggingDatabase<D> {
    pub fn new(inner: D) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &D {
        &self.inner
    }
}

#[async_trait]
impl<D: Database> Database for LoggingDatabase<D> {
    async fn open(&self) -> StorageResult<()> {
        debug!("open");
        traced("database", "open", self.inner.open().await)
    }

    async fn close(&self) -> StorageResult<()> {
        debug!("close");
        traced("database", "close", self.inner.close().await)
    }

    async fn fsync(&self) -> StorageResult<()> {
        debug!("fsync");
        traced("database", "fsync", self.inner.fsync().await)
    }

    async fn project_names(&self) -> StorageResult<Vec<String>> {
        debug!("project_names");
        traced("database", "project_names", self.inner.project_names().await)
    }

    async fn delete_project(&self, name: &str) -> StorageResult<()> {
        debug!(name, "delete_project");
        traced("database", "delete_project", self.inner.delete_project(name).await)
    }

    async fn status(
        &self,
        previous: Option<DatabaseStatus>,
        timeout: Duration,
    ) -> StorageResult<DatabaseStatus> {
        debug!(?previous, ?timeout, "status");
        traced("database", "status", self.inner.status(previous, timeout).await)
    }

    async fn authenticate(&self, principal: &str, credential: &str) -> StorageResult<Identity> {
        debug!(principal, "authenticate");
        traced(
            "database",
            "authenticate",
            self.inner.authenticate(principal, credential).await,
        )
    }

    async fn open_project(&self, name: &str) -> StorageResult<Arc<dyn Project>> {
        debug!(name, "open_project");
        match self.inner.open_project(name).await {
            Ok(project) => {
                debug!(name, state = ?project.state(), "project opened");
                Ok(Arc::new(LoggingProject::new(project)))
            }
            Err(e) => {
                warn!(name, error = %e, "open_project failed");
                Err(e)
            }
        }
    }
}

/// Wraps a [`Project`] handle and logs every call.
pub struct LoggingProject {
    inner: Arc<dyn Project>,
}

impl LoggingProject {
    pub fn new(inner: Arc<dyn Project>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl Project for LoggingProject {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn state(&self) -> ProjectState {
        self.inner.state()
    }

    async fn fsync(&self) -> StorageResult<()> {
        debug!(project = self.name(), "fsync");
        traced(self.name(), "fsync", self.inner.fsync().await)
    }

    async fn close(&self) -> StorageResult<()> {
        debug!(project = self.name(), "close");
        traced(self.name(), "close", self.inner.close().await)
    }

    async fn insert_object(&self, object: &StoredObject) -> StorageResult<ObjectId> {
        debug!(project = self.name(), id = %object.id.short_hex(), kind = %object.kind, "insert_object");
        traced(self.name(), "insert_object", self.inner.insert_object(object).await)
    }

    async fn load_object(&self, hash: ObjectId) -> StorageResult<StoredObject> {
        debug!(project = self.name(), hash = %hash.short_hex(), "load_object");
        let result = self.inner.load_object(hash).await;
        // Payloads stay out of the log.
        match &result {
            Ok(object) => debug!(project = self.name(), kind = %object.kind, size = object.size(), "load_object finished"),
            Err(e) => warn!(project = self.name(), error = %e, "load_object failed"),
        }
        result
    }

    async fn find_hash(&self, prefix: &str) -> StorageResult<ObjectId> {
        debug!(project = self.name(), prefix, "find_hash");
        traced(self.name(), "find_hash", self.inner.find_hash(prefix).await)
    }

    async fn dump_objects(&self) -> StorageResult<Vec<StoredObject>> {
        debug!(project = self.name(), "dump_objects");
        let result = self.inner.dump_objects().await;
        match &result {
            Ok(objects) => debug!(project = self.name(), count = objects.len(), "dump_objects finished"),
            Err(e) => warn!(project = self.name(), error = %e, "dump_objects failed"),
        }
        result
    }

    async fn make_commit(
        &self,
        parents: &[ObjectId],
        root: ObjectId,
        message: &str,
    ) -> StorageResult<ObjectId> {
        debug!(project = self.name(), ?parents, %root, message, "make_commit");
        traced(
            self.name(),
            "make_commit",
            self.inner.make_commit(parents, root, message).await,
        )
    }

    async fn get_commits(
        &self,
        before: Option<CommitMarker>,
        count: usize,
    ) -> StorageResult<Vec<Commit>> {
        debug!(project = self.name(), ?before, count, "get_commits");
        let result = self.inner.get_commits(before, count).await;
        match &result {
            Ok(commits) => debug!(project = self.name(), returned = commits.len(), "get_commits finished"),
            Err(e) => warn!(project = self.name(), error = %e, "get_commits failed"),
        }
        result
    }

    async fn branch_names(&self) -> StorageResult<Vec<String>> {
        debug!(project = self.name(), "branch_names");
        traced(self.name(), "branch_names", self.inner.branch_names().await)
    }

    async fn get_branch_hash(
        &self,
        branch: &str,
        assumed: Option<ObjectId>,
    ) -> StorageResult<BranchHead> {
        debug!(project = self.name(), branch, ?assumed, "get_branch_hash");
        traced(
            self.name(),
            "get_branch_hash",
            self.inner.get_branch_hash(branch, assumed).await,
        )
    }

    async fn wait_branch_hash(
        &self,
        branch: &str,
        assumed: Option<ObjectId>,
        timeout: Duration,
    ) -> StorageResult<BranchHead> {
        debug!(project = self.name(), branch, ?assumed, ?timeout, "wait_branch_hash");
        traced(
            self.name(),
            "wait_branch_hash",
            self.inner.wait_branch_hash(branch, assumed, timeout).await,
        )
    }

    async fn set_branch_hash(
        &self,
        branch: &str,
        old: Option<ObjectId>,
        new: ObjectId,
    ) -> StorageResult<()> {
        debug!(project = self.name(), branch, ?old, %new, "set_branch_hash");
        traced(
            self.name(),
            "set_branch_hash",
            self.inner.set_branch_hash(branch, old, new).await,
        )
    }
}
