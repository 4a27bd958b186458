//! In-memory database backend.
//!
//! Each project owns an [`InMemoryObjectStore`] and an
//! [`InMemoryBranchStore`]. When a snapshot path is configured, `fsync`
//! and `close` write every project to a JSON [`Snapshot`] and `open`
//! reloads it, so the database survives process restarts.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use strata_refs::{validate_branch_name, BranchHead, BranchStore, InMemoryBranchStore};
use strata_store::{CommitRecord, InMemoryObjectStore, ObjectKind, ObjectStore, StoredObject};
use strata_types::{normalize_prefix, ObjectId};
use tokio::sync::watch;
use tracing::{debug, info};

use crate::auth::{CredentialTable, Identity};
use crate::config::DatabaseConfig;
use crate::database::{validate_project_name, Database, DatabaseStatus};
use crate::error::{StorageError, StorageResult};
use crate::project::{Commit, CommitMarker, Project, ProjectState};
use crate::snapshot::{ObjectEntry, ProjectSnapshot, Snapshot};

struct ProjectData {
    objects: InMemoryObjectStore,
    branches: InMemoryBranchStore,
    deleted: AtomicBool,
}

impl ProjectData {
    fn new() -> Self {
        Self {
            objects: InMemoryObjectStore::new(),
            branches: InMemoryBranchStore::new(),
            deleted: AtomicBool::new(false),
        }
    }

    fn from_snapshot(snapshot: &ProjectSnapshot) -> StorageResult<Self> {
        let objects = InMemoryObjectStore::new();
        let stored = snapshot
            .objects
            .iter()
            .map(ObjectEntry::to_stored_object)
            .collect::<StorageResult<Vec<_>>>()?;
        objects.write_batch(&stored)?;
        let branches = InMemoryBranchStore::with_heads(
            snapshot.branches.iter().map(|(name, hash)| (name.clone(), *hash)),
        )?;
        Ok(Self {
            objects,
            branches,
            deleted: AtomicBool::new(false),
        })
    }

    fn to_snapshot(&self) -> StorageResult<ProjectSnapshot> {
        Ok(ProjectSnapshot {
            objects: self.objects.list()?.iter().map(ObjectEntry::from).collect(),
            branches: self.branches.list()?.into_iter().collect(),
        })
    }
}

struct Shared {
    config: DatabaseConfig,
    credentials: CredentialTable,
    status: watch::Sender<DatabaseStatus>,
    projects: RwLock<HashMap<String, Arc<ProjectData>>>,
}

impl Shared {
    fn ensure_connected(&self) -> StorageResult<()> {
        if *self.status.borrow() != DatabaseStatus::Connected {
            return Err(StorageError::Validation("database is not open".into()));
        }
        Ok(())
    }

    fn snapshot(&self) -> StorageResult<Snapshot> {
        let projects = self.projects.read().expect("lock poisoned");
        let mut snapshot = Snapshot::new();
        for (name, data) in projects.iter() {
            snapshot.projects.insert(name.clone(), data.to_snapshot()?);
        }
        Ok(snapshot)
    }

    async fn fsync(&self) -> StorageResult<()> {
        self.ensure_connected()?;
        if let Some(path) = &self.config.snapshot_path {
            let snapshot = self.snapshot()?;
            snapshot.write(path).await?;
        }
        Ok(())
    }
}

/// A [`Database`] held in memory, optionally persisted to a snapshot file.
#[derive(Clone)]
pub struct InMemoryDatabase {
    shared: Arc<Shared>,
}

impl InMemoryDatabase {
    pub fn new(config: DatabaseConfig) -> Self {
        let (status, _) = watch::channel(DatabaseStatus::Disconnected);
        Self {
            shared: Arc::new(Shared {
                credentials: CredentialTable::new(config.credentials.clone()),
                config,
                status,
                projects: RwLock::new(HashMap::new()),
            }),
        }
    }

    pub fn config(&self) -> &DatabaseConfig {
        &self.shared.config
    }
}

impl Default for InMemoryDatabase {
    fn default() -> Self {
        Self::new(DatabaseConfig::default())
    }
}

impl std::fmt::Debug for InMemoryDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryDatabase")
            .field("status", &*self.shared.status.borrow())
            .field("snapshot_path", &self.shared.config.snapshot_path)
            .finish()
    }
}

#[async_trait]
impl Database for InMemoryDatabase {
    async fn open(&self) -> StorageResult<()> {
        if *self.shared.status.borrow() == DatabaseStatus::Connected {
            return Ok(());
        }
        if let Some(path) = &self.shared.config.snapshot_path {
            if let Some(snapshot) = Snapshot::read(path).await? {
                let mut loaded = HashMap::new();
                for (name, project) in &snapshot.projects {
                    validate_project_name(name)?;
                    loaded.insert(name.clone(), Arc::new(ProjectData::from_snapshot(project)?));
                }
                *self.shared.projects.write().expect("lock poisoned") = loaded;
            }
        }
        self.shared.status.send_replace(DatabaseStatus::Connected);
        info!(snapshot = ?self.shared.config.snapshot_path, "database opened");
        Ok(())
    }

    async fn close(&self) -> StorageResult<()> {
        if *self.shared.status.borrow() == DatabaseStatus::Disconnected {
            return Ok(());
        }
        self.shared.fsync().await?;
        self.shared.status.send_replace(DatabaseStatus::Disconnected);
        info!("database closed");
        Ok(())
    }

    async fn fsync(&self) -> StorageResult<()> {
        self.shared.fsync().await
    }

    async fn project_names(&self) -> StorageResult<Vec<String>> {
        self.shared.ensure_connected()?;
        let projects = self.shared.projects.read().expect("lock poisoned");
        let mut names: Vec<String> = projects.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn delete_project(&self, name: &str) -> StorageResult<()> {
        self.shared.ensure_connected()?;
        let removed = self
            .shared
            .projects
            .write()
            .expect("lock poisoned")
            .remove(name);
        match removed {
            Some(data) => {
                data.deleted.store(true, Ordering::SeqCst);
                info!(project = name, "project deleted");
                Ok(())
            }
            None => Err(StorageError::NotFound(format!("project {name}"))),
        }
    }

    async fn status(
        &self,
        previous: Option<DatabaseStatus>,
        timeout: Duration,
    ) -> StorageResult<DatabaseStatus> {
        let mut rx = self.shared.status.subscribe();
        let current = *rx.borrow_and_update();
        if previous != Some(current) {
            return Ok(current);
        }
        // Timing out just reports the unchanged status.
        let _ = tokio::time::timeout(timeout, rx.changed()).await;
        let status = *rx.borrow();
        Ok(status)
    }

    async fn authenticate(&self, principal: &str, credential: &str) -> StorageResult<Identity> {
        self.shared.credentials.authenticate(principal, credential)
    }

    async fn open_project(&self, name: &str) -> StorageResult<Arc<dyn Project>> {
        self.shared.ensure_connected()?;
        validate_project_name(name)?;
        let data = {
            let mut projects = self.shared.projects.write().expect("lock poisoned");
            projects
                .entry(name.to_string())
                .or_insert_with(|| {
                    info!(project = name, "project created");
                    Arc::new(ProjectData::new())
                })
                .clone()
        };
        let project = InMemoryProject {
            name: name.to_string(),
            shared: Arc::clone(&self.shared),
            data,
            state: Mutex::new(ProjectState::Unopened),
        };
        project.mark_open();
        Ok(Arc::new(project))
    }
}

/// Project handle returned by [`InMemoryDatabase::open_project`].
pub struct InMemoryProject {
    name: String,
    shared: Arc<Shared>,
    data: Arc<ProjectData>,
    state: Mutex<ProjectState>,
}

impl InMemoryProject {
    fn mark_open(&self) {
        let mut state = self.state.lock().expect("lock poisoned");
        if *state == ProjectState::Unopened {
            *state = ProjectState::Open;
        }
    }

    fn ensure_open(&self) -> StorageResult<()> {
        let state = self.state();
        if state != ProjectState::Open {
            return Err(StorageError::Validation(format!(
                "project {} is not open ({state:?})",
                self.name
            )));
        }
        self.shared.ensure_connected()?;
        if self.data.deleted.load(Ordering::SeqCst) {
            return Err(StorageError::NotFound(format!("project {}", self.name)));
        }
        Ok(())
    }

    fn read_object(&self, hash: &ObjectId) -> StorageResult<StoredObject> {
        self.data
            .objects
            .read(hash)?
            .ok_or_else(|| StorageError::NotFound(format!("object {hash}")))
    }
}

impl std::fmt::Debug for InMemoryProject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryProject")
            .field("name", &self.name)
            .field("state", &self.state())
            .finish()
    }
}

#[async_trait]
impl Project for InMemoryProject {
    fn name(&self) -> &str {
        &self.name
    }

    fn state(&self) -> ProjectState {
        *self.state.lock().expect("lock poisoned")
    }

    async fn fsync(&self) -> StorageResult<()> {
        self.ensure_open()?;
        self.shared.fsync().await
    }

    async fn close(&self) -> StorageResult<()> {
        *self.state.lock().expect("lock poisoned") = ProjectState::Closed;
        Ok(())
    }

    async fn insert_object(&self, object: &StoredObject) -> StorageResult<ObjectId> {
        self.ensure_open()?;
        Ok(self.data.objects.write(object)?)
    }

    async fn load_object(&self, hash: ObjectId) -> StorageResult<StoredObject> {
        self.ensure_open()?;
        self.read_object(&hash)
    }

    async fn find_hash(&self, prefix: &str) -> StorageResult<ObjectId> {
        self.ensure_open()?;
        let normalized = normalize_prefix(prefix)?;
        let matches = self.data.objects.find_by_prefix(&normalized)?;
        match matches.as_slice() {
            [] => Err(StorageError::NotFound(format!("no object matches {prefix:?}"))),
            [single] => Ok(*single),
            many => Err(StorageError::AmbiguousPrefix {
                prefix: prefix.to_string(),
                count: many.len(),
            }),
        }
    }

    async fn dump_objects(&self) -> StorageResult<Vec<StoredObject>> {
        self.ensure_open()?;
        Ok(self.data.objects.list()?)
    }

    async fn make_commit(
        &self,
        parents: &[ObjectId],
        root: ObjectId,
        message: &str,
    ) -> StorageResult<ObjectId> {
        self.ensure_open()?;
        if !self.data.objects.exists(&root)? {
            return Err(StorageError::NotFound(format!("root object {root}")));
        }
        for parent in parents {
            let object = self.read_object(parent)?;
            CommitRecord::from_stored_object(&object)?;
        }
        let time = chrono::Utc::now().timestamp_millis();
        let record = CommitRecord::new(parents.to_vec(), root, message, time);
        let id = self.data.objects.write(&record.to_stored_object()?)?;
        debug!(project = %self.name, commit = %id.short_hex(), root = %root.short_hex(), "commit created");
        Ok(id)
    }

    async fn get_commits(
        &self,
        before: Option<CommitMarker>,
        count: usize,
    ) -> StorageResult<Vec<Commit>> {
        self.ensure_open()?;
        let mut commits = self
            .data
            .objects
            .list_kind(ObjectKind::Commit)?
            .iter()
            .map(|object| -> StorageResult<Commit> {
                Ok(Commit {
                    id: object.id,
                    record: CommitRecord::from_stored_object(object)?,
                })
            })
            .collect::<StorageResult<Vec<_>>>()?;
        commits.sort_by(|a, b| b.marker().cmp(&a.marker()));
        Ok(commits
            .into_iter()
            .filter(|commit| before.map_or(true, |marker| commit.marker() < marker))
            .take(count)
            .collect())
    }

    async fn branch_names(&self) -> StorageResult<Vec<String>> {
        self.ensure_open()?;
        Ok(self.data.branches.names()?)
    }

    async fn get_branch_hash(
        &self,
        branch: &str,
        assumed: Option<ObjectId>,
    ) -> StorageResult<BranchHead> {
        self.ensure_open()?;
        validate_branch_name(branch)?;
        Ok(self.data.branches.head(branch, assumed)?)
    }

    async fn wait_branch_hash(
        &self,
        branch: &str,
        assumed: Option<ObjectId>,
        timeout: Duration,
    ) -> StorageResult<BranchHead> {
        self.ensure_open()?;
        validate_branch_name(branch)?;
        // Subscribe before the first read so no update slips in between.
        let mut rx = self.data.branches.subscribe();
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let head = self.data.branches.head(branch, assumed)?;
            if head.forked {
                return Ok(head);
            }
            match tokio::time::timeout_at(deadline, rx.changed()).await {
                Ok(Ok(())) => continue,
                Ok(Err(_)) | Err(_) => return Ok(head),
            }
        }
    }

    async fn set_branch_hash(
        &self,
        branch: &str,
        old: Option<ObjectId>,
        new: ObjectId,
    ) -> StorageResult<()> {
        self.ensure_open()?;
        self.data.branches.compare_and_swap(branch, old, new)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use strata_store::NodeRecord;

    async fn open_db() -> InMemoryDatabase {
        let db = InMemoryDatabase::default();
        db.open().await.unwrap();
        db
    }

    fn node(name: &str) -> StoredObject {
        let mut record = NodeRecord::new();
        record
            .attributes
            .insert("name".into(), serde_json::Value::String(name.into()));
        record.to_stored_object().unwrap()
    }

    #[tokio::test]
    async fn operations_require_open_database() {
        let db = InMemoryDatabase::default();
        assert!(matches!(db.project_names().await, Err(StorageError::Validation(_))));
        assert!(matches!(db.open_project("demo").await, Err(StorageError::Validation(_))));
        db.open().await.unwrap();
        assert!(db.project_names().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn project_handle_lifecycle() {
        let db = open_db().await;
        let project = db.open_project("demo").await.unwrap();
        assert_eq!(project.name(), "demo");
        assert_eq!(project.state(), ProjectState::Open);
        project.insert_object(&node("a")).await.unwrap();

        project.close().await.unwrap();
        assert_eq!(project.state(), ProjectState::Closed);
        assert!(matches!(
            project.dump_objects().await,
            Err(StorageError::Validation(_))
        ));
        project.close().await.unwrap();

        let again = db.open_project("demo").await.unwrap();
        assert_eq!(again.dump_objects().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn closing_database_invalidates_handles() {
        let db = open_db().await;
        let project = db.open_project("demo").await.unwrap();
        db.close().await.unwrap();
        assert!(matches!(
            project.branch_names().await,
            Err(StorageError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn deleted_project_is_not_found() {
        let db = open_db().await;
        let project = db.open_project("demo").await.unwrap();
        db.open_project("other").await.unwrap();
        assert_eq!(db.project_names().await.unwrap(), vec!["demo", "other"]);

        db.delete_project("demo").await.unwrap();
        assert_eq!(db.project_names().await.unwrap(), vec!["other"]);
        assert!(matches!(
            project.dump_objects().await,
            Err(StorageError::NotFound(_))
        ));
        assert!(matches!(
            db.delete_project("demo").await,
            Err(StorageError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn invalid_project_name_is_rejected() {
        let db = open_db().await;
        assert!(matches!(
            db.open_project("a/b").await,
            Err(StorageError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn insert_and_load_objects() {
        let db = open_db().await;
        let project = db.open_project("demo").await.unwrap();
        let object = node("root");
        let id = project.insert_object(&object).await.unwrap();
        assert_eq!(id, object.id);
        // Re-inserting identical content is a no-op.
        project.insert_object(&object).await.unwrap();
        assert_eq!(project.dump_objects().await.unwrap().len(), 1);

        assert_eq!(project.load_object(id).await.unwrap(), object);
        let record = project.load_node(id).await.unwrap();
        assert_eq!(record.attributes["name"], "root");

        let missing = ObjectId::from_hash([7; 32]);
        assert!(matches!(
            project.load_object(missing).await,
            Err(StorageError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn mismatched_declared_id_is_rejected() {
        let db = open_db().await;
        let project = db.open_project("demo").await.unwrap();
        let forged = StoredObject::with_declared_id(
            ObjectId::from_hash([1; 32]),
            ObjectKind::Node,
            b"{}".to_vec(),
        );
        assert!(matches!(
            project.insert_object(&forged).await,
            Err(StorageError::Store(_))
        ));
    }

    #[tokio::test]
    async fn find_hash_resolves_unique_prefix() {
        let db = open_db().await;
        let project = db.open_project("demo").await.unwrap();
        let id = project.insert_object(&node("only")).await.unwrap();
        let hex = id.to_hex();

        assert_eq!(project.find_hash(&hex[..6]).await.unwrap(), id);
        assert_eq!(project.find_hash(&format!("#{}", &hex[..6])).await.unwrap(), id);
        assert_eq!(
            project.find_hash(&hex[..6].to_ascii_uppercase()).await.unwrap(),
            id
        );
        assert!(matches!(
            project.find_hash("zz").await,
            Err(StorageError::NotFound(_))
        ));
        assert!(matches!(
            project.find_hash("ab/cd").await,
            Err(StorageError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn find_hash_reports_ambiguous_prefix() {
        let db = open_db().await;
        let project = db.open_project("demo").await.unwrap();
        // 17 objects over 16 leading hex digits: at least two collide.
        let mut by_first: BTreeMap<char, usize> = BTreeMap::new();
        for i in 0..17 {
            let id = project.insert_object(&node(&format!("n{i}"))).await.unwrap();
            let first = id.to_hex().chars().next().unwrap();
            *by_first.entry(first).or_default() += 1;
        }
        let (shared, count) = by_first.into_iter().find(|(_, n)| *n > 1).unwrap();
        match project.find_hash(&shared.to_string()).await {
            Err(StorageError::AmbiguousPrefix { count: c, .. }) => assert_eq!(c, count),
            other => panic!("expected ambiguous prefix, got {other:?}"),
        }
        // The empty prefix matches everything.
        assert!(matches!(
            project.find_hash("").await,
            Err(StorageError::AmbiguousPrefix { count: 17, .. })
        ));
    }

    #[tokio::test]
    async fn concurrent_branch_writers_conflict() {
        let db = open_db().await;
        let project = db.open_project("demo").await.unwrap();
        let root = project.insert_object(&node("root")).await.unwrap();
        let h1 = project.make_commit(&[], root, "h1").await.unwrap();
        let h2 = project.make_commit(&[h1], root, "h2").await.unwrap();
        let h3 = project.make_commit(&[h1], root, "h3").await.unwrap();
        project.set_branch_hash("master", None, h1).await.unwrap();

        // Client A advances the branch first.
        project.set_branch_hash("master", Some(h1), h2).await.unwrap();
        // Client B still assumes h1.
        match project.set_branch_hash("master", Some(h1), h3).await {
            Err(StorageError::Conflict {
                branch,
                expected,
                actual,
            }) => {
                assert_eq!(branch, "master");
                assert_eq!(expected, Some(h1));
                assert_eq!(actual, Some(h2));
            }
            other => panic!("expected conflict, got {other:?}"),
        }

        let head = project.get_branch_hash("master", Some(h1)).await.unwrap();
        assert_eq!(head.hash, Some(h2));
        assert!(head.forked);
        let head = project.get_branch_hash("master", Some(h2)).await.unwrap();
        assert!(!head.forked);
    }

    #[tokio::test]
    async fn creating_an_existing_branch_conflicts() {
        let db = open_db().await;
        let project = db.open_project("demo").await.unwrap();
        let root = project.insert_object(&node("root")).await.unwrap();
        let c = project.make_commit(&[], root, "init").await.unwrap();
        project.set_branch_hash("master", None, c).await.unwrap();
        assert!(matches!(
            project.set_branch_hash("master", None, c).await,
            Err(StorageError::Conflict { .. })
        ));
        assert!(matches!(
            project.set_branch_hash("", None, c).await,
            Err(StorageError::Validation(_))
        ));
        assert_eq!(project.branch_names().await.unwrap(), vec!["master"]);

        let missing = project.get_branch_hash("nope", None).await.unwrap();
        assert_eq!(missing.hash, None);
        assert!(!missing.forked);
    }

    #[tokio::test]
    async fn make_commit_requires_existing_objects() {
        let db = open_db().await;
        let project = db.open_project("demo").await.unwrap();
        let missing = ObjectId::from_hash([3; 32]);
        assert!(matches!(
            project.make_commit(&[], missing, "x").await,
            Err(StorageError::NotFound(_))
        ));
        let root = project.insert_object(&node("root")).await.unwrap();
        assert!(matches!(
            project.make_commit(&[missing], root, "x").await,
            Err(StorageError::NotFound(_))
        ));
        // A node is not a valid parent.
        assert!(matches!(
            project.make_commit(&[root], root, "x").await,
            Err(StorageError::Store(_))
        ));

        let id = project.make_commit(&[], root, "init").await.unwrap();
        let commit = project.load_commit(id).await.unwrap();
        assert_eq!(commit.record.root, root);
        assert_eq!(commit.record.message, "init");
        assert!(commit.record.is_initial());
    }

    #[tokio::test]
    async fn get_commits_paginates_most_recent_first() {
        let db = open_db().await;
        let project = db.open_project("demo").await.unwrap();
        let root = project.insert_object(&node("root")).await.unwrap();
        let mut parent = Vec::new();
        for i in 0..5 {
            let id = project
                .make_commit(&parent, root, &format!("c{i}"))
                .await
                .unwrap();
            parent = vec![id];
        }

        let all = project.get_commits(None, 100).await.unwrap();
        assert_eq!(all.len(), 5);
        assert!(all.windows(2).all(|w| w[0].marker() > w[1].marker()));

        let mut seen = Vec::new();
        let mut before = None;
        loop {
            let page = project.get_commits(before, 2).await.unwrap();
            if page.is_empty() {
                break;
            }
            assert!(page.len() <= 2);
            before = page.last().map(Commit::marker);
            seen.extend(page.into_iter().map(|c| c.id));
        }
        assert_eq!(seen, all.iter().map(|c| c.id).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn wait_branch_hash_wakes_on_update() {
        let db = open_db().await;
        let project = db.open_project("demo").await.unwrap();
        let root = project.insert_object(&node("root")).await.unwrap();
        let c1 = project.make_commit(&[], root, "c1").await.unwrap();
        let c2 = project.make_commit(&[c1], root, "c2").await.unwrap();
        project.set_branch_hash("master", None, c1).await.unwrap();

        let writer = Arc::clone(&project);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            writer.set_branch_hash("master", Some(c1), c2).await.unwrap();
        });

        let head = project
            .wait_branch_hash("master", Some(c1), Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(head.hash, Some(c2));
        assert!(head.forked);
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn wait_branch_hash_times_out_unchanged() {
        let db = open_db().await;
        let project = db.open_project("demo").await.unwrap();
        let head = project
            .wait_branch_hash("master", None, Duration::from_millis(10))
            .await
            .unwrap();
        assert_eq!(head.hash, None);
        assert!(!head.forked);
    }

    #[tokio::test]
    async fn status_long_poll() {
        let db = InMemoryDatabase::default();
        assert_eq!(
            db.status(None, Duration::from_millis(10)).await.unwrap(),
            DatabaseStatus::Disconnected
        );
        db.open().await.unwrap();
        assert_eq!(
            db.status(Some(DatabaseStatus::Connected), Duration::from_millis(10))
                .await
                .unwrap(),
            DatabaseStatus::Connected
        );

        let closer = db.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            closer.close().await.unwrap();
        });
        assert_eq!(
            db.status(Some(DatabaseStatus::Connected), Duration::from_secs(5))
                .await
                .unwrap(),
            DatabaseStatus::Disconnected
        );
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn authenticate_uses_credential_table() {
        let config = DatabaseConfig {
            credentials: BTreeMap::from([("alice".into(), "secret".into())]),
            ..DatabaseConfig::default()
        };
        let db = InMemoryDatabase::new(config);
        assert_eq!(
            db.authenticate("alice", "secret").await.unwrap(),
            Identity::user("alice")
        );
        assert!(matches!(
            db.authenticate("alice", "guess").await,
            Err(StorageError::AuthFailed(_))
        ));
    }

    #[tokio::test]
    async fn snapshot_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let config = DatabaseConfig::default().with_snapshot_path(dir.path().join("db.json"));

        let db = InMemoryDatabase::new(config.clone());
        db.open().await.unwrap();
        let project = db.open_project("demo").await.unwrap();
        let root = project.insert_object(&node("root")).await.unwrap();
        let commit = project.make_commit(&[], root, "init").await.unwrap();
        project.set_branch_hash("master", None, commit).await.unwrap();
        project.fsync().await.unwrap();
        db.close().await.unwrap();

        let reopened = InMemoryDatabase::new(config);
        reopened.open().await.unwrap();
        assert_eq!(reopened.project_names().await.unwrap(), vec!["demo"]);
        let project = reopened.open_project("demo").await.unwrap();
        assert_eq!(project.load_node(root).await.unwrap().attributes["name"], "root");
        let head = project.get_branch_hash("master", None).await.unwrap();
        assert_eq!(head.hash, Some(commit));
        assert_eq!(project.get_commits(None, 10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn close_flushes_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db.json");
        let db = InMemoryDatabase::new(DatabaseConfig::default().with_snapshot_path(&path));
        db.open().await.unwrap();
        db.open_project("demo").await.unwrap();
        assert!(!path.exists());
        db.close().await.unwrap();
        assert!(path.exists());
    }
}
