//! Database and project API for Strata.
//!
//! A [`Database`] holds named projects. Opening a project yields a
//! [`Project`] handle that exposes the content-addressed object store, the
//! commit history and the branch heads of that project. All operations are
//! asynchronous; branch updates are the only ones with concurrency control
//! (compare-and-swap on the head).
//!
//! Backends and decorators compose statically:
//!
//! - [`InMemoryDatabase`] -- in-memory backend with optional JSON snapshot
//! - [`LoggingDatabase`] -- wraps any backend and traces every call

pub mod auth;
pub mod config;
pub mod database;
pub mod error;
pub mod logging;
pub mod memory;
pub mod project;
pub mod snapshot;

pub use auth::{CredentialTable, Identity};
pub use config::DatabaseConfig;
pub use database::{validate_project_name, Database, DatabaseStatus};
pub use error::{StorageError, StorageResult};
pub use logging::{LoggingDatabase, LoggingProject};
pub use memory::{InMemoryDatabase, InMemoryProject};
pub use project::{Commit, CommitMarker, Project, ProjectState};
pub use strata_refs::BranchHead;
