//! Content-addressed object storage for Strata.
//!
//! Every persisted piece of a model (node records and commits) is stored
//! as an immutable object identified by its BLAKE3 hash, domain-separated
//! by object kind.
//!
//! # Object Types
//!
//! - [`NodeRecord`] -- one node of a tree: attributes, registry, pointers,
//!   inverse pointers and child hashes
//! - [`CommitRecord`] -- parent commits, root hash, time and message
//!
//! [`ObjectStore`] is the backend seam; [`InMemoryObjectStore`] is the
//! only backend.
//!
//! Writes check that the declared id matches the content, and writing an
//! object that is already present changes nothing.

pub mod error;
pub mod memory;
pub mod object;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use memory::InMemoryObjectStore;
pub use object::{CommitRecord, NodeRecord, ObjectKind, PointerRecord, StoredObject};
pub use traits::ObjectStore;
