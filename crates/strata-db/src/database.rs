//! The [`Database`] trait: lifecycle and project management.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::auth::Identity;
use crate::error::{StorageError, StorageResult};
use crate::project::Project;

/// Connection status of a database.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseStatus {
    Connected,
    Disconnected,
}

impl std::fmt::Display for DatabaseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Connected => write!(f, "connected"),
            Self::Disconnected => write!(f, "disconnected"),
        }
    }
}

/// A collection of named projects.
///
/// A database starts `Disconnected`; `open` connects it and every other
/// operation except `status` and `authenticate` requires a connected
/// database.
#[async_trait]
pub trait Database: Send + Sync {
    async fn open(&self) -> StorageResult<()>;

    /// Flush and disconnect. Project handles opened earlier stop working.
    async fn close(&self) -> StorageResult<()>;

    /// Durability barrier: returns once everything written so far is
    /// persisted by the backend.
    async fn fsync(&self) -> StorageResult<()>;

    /// Names of all projects, sorted.
    async fn project_names(&self) -> StorageResult<Vec<String>>;

    async fn delete_project(&self, name: &str) -> StorageResult<()>;

    /// Return the current status right away if it differs from `previous`,
    /// otherwise wait up to `timeout` for it to change.
    async fn status(
        &self,
        previous: Option<DatabaseStatus>,
        timeout: Duration,
    ) -> StorageResult<DatabaseStatus>;

    async fn authenticate(&self, principal: &str, credential: &str) -> StorageResult<Identity>;

    /// Open (creating on first use) the named project. The returned handle
    /// is in the `Open` state.
    async fn open_project(&self, name: &str) -> StorageResult<Arc<dyn Project>>;
}

/// Validate a project name: non-empty, ASCII letters, digits, `_`, `-`
/// and `.`, not starting with `.`.
pub fn validate_project_name(name: &str) -> StorageResult<()> {
    let invalid = |reason: &str| StorageError::Validation(format!("invalid project name {name:?}: {reason}"));
    if name.is_empty() {
        return Err(invalid("empty"));
    }
    if name.starts_with('.') {
        return Err(invalid("starts with '.'"));
    }
    if let Some(c) = name
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.')))
    {
        return Err(invalid(&format!("contains {c:?}")));
    }
    Ok(())
}
