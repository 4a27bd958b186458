//! On-disk JSON snapshot of an in-memory database.
//!
//! Object data is hex-encoded so the stored bytes (and therefore their
//! hashes) survive the round trip unchanged. Writes go to a temporary file
//! next to the target, which is synced to disk and then renamed over it.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use strata_store::{ObjectKind, StoredObject};
use strata_types::ObjectId;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::error::{StorageError, StorageResult};

pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: u32,
    pub projects: BTreeMap<String, ProjectSnapshot>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectSnapshot {
    pub objects: Vec<ObjectEntry>,
    pub branches: BTreeMap<String, ObjectId>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectEntry {
    pub id: ObjectId,
    pub kind: ObjectKind,
    pub data: String,
}

impl From<&StoredObject> for ObjectEntry {
    fn from(object: &StoredObject) -> Self {
        Self {
            id: object.id,
            kind: object.kind,
            data: hex::encode(&object.data),
        }
    }
}

impl ObjectEntry {
    pub fn to_stored_object(&self) -> StorageResult<StoredObject> {
        let data = hex::decode(&self.data)
            .map_err(|e| StorageError::Snapshot(format!("object {}: {e}", self.id)))?;
        Ok(StoredObject::with_declared_id(self.id, self.kind, data))
    }
}

impl Snapshot {
    pub fn new() -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            projects: BTreeMap::new(),
        }
    }

    /// Read a snapshot. A missing file yields `Ok(None)`.
    pub async fn read(path: &Path) -> StorageResult<Option<Self>> {
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let snapshot: Snapshot = serde_json::from_slice(&bytes)
            .map_err(|e| StorageError::Snapshot(format!("{}: {e}", path.display())))?;
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(StorageError::Snapshot(format!(
                "{}: unsupported version {}",
                path.display(),
                snapshot.version
            )));
        }
        debug!(path = %path.display(), projects = snapshot.projects.len(), "snapshot read");
        Ok(Some(snapshot))
    }

    /// Write the snapshot atomically.
    pub async fn write(&self, path: &Path) -> StorageResult<()> {
        let bytes =
            serde_json::to_vec_pretty(self).map_err(|e| StorageError::Snapshot(e.to_string()))?;
        let tmp = temp_path(path);
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(&bytes).await?;
        file.flush().await?;
        file.sync_all().await?;
        drop(file);
        tokio::fs::rename(&tmp, path).await?;
        sync_parent(path).await?;
        debug!(path = %path.display(), bytes = bytes.len(), "snapshot written");
        Ok(())
    }
}

/// Make the rename durable by syncing the directory entry.
#[cfg(unix)]
async fn sync_parent(path: &Path) -> StorageResult<()> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    tokio::fs::File::open(dir).await?.sync_all().await?;
    Ok(())
}

#[cfg(not(unix))]
async fn sync_parent(_path: &Path) -> StorageResult<()> {
    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
