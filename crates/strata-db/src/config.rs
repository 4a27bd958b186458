use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{StorageError, StorageResult};

/// Database settings, usually read from a TOML file.
///
/// ```toml
/// snapshot_path = "strata.json"
/// status_timeout_ms = 30000
/// branch_wait_timeout_ms = 30000
///
/// [credentials]
/// alice = "secret"
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Where `fsync` writes the database snapshot. `None` keeps the
    /// database purely in memory.
    pub snapshot_path: Option<PathBuf>,
    /// Upper bound for one `status` long-poll.
    pub status_timeout_ms: u64,
    /// Default upper bound for one `wait_branch_hash` long-poll.
    pub branch_wait_timeout_ms: u64,
    /// Principal -> credential. An empty table admits everybody.
    pub credentials: BTreeMap<String, String>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            snapshot_path: None,
            status_timeout_ms: 30_000,
            branch_wait_timeout_ms: 30_000,
            credentials: BTreeMap::new(),
        }
    }
}

impl DatabaseConfig {
    pub fn from_toml_str(text: &str) -> StorageResult<Self> {
        toml::from_str(text).map_err(|e| StorageError::Config(e.to_string()))
    }

    /// Read and parse a TOML configuration file.
    pub fn load(path: &Path) -> StorageResult<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| StorageError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    pub fn with_snapshot_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.snapshot_path = Some(path.into());
        self
    }

    pub fn status_timeout(&self) -> Duration {
        Duration::from_millis(self.status_timeout_ms)
    }

    pub fn branch_wait_timeout(&self) -> Duration {
        Duration::from_millis(self.branch_wait_timeout_ms)
    }
}
