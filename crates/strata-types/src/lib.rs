//! Foundation types for Strata.
//!
//! This crate provides the identifier and addressing types shared by the
//! object store, the branch store and the node layers. Every other Strata
//! crate depends on `strata-types`.
//!
//! # Key Types
//!
//! - [`ObjectId`] - Content-addressed identifier (BLAKE3 hash)
//! - [`Guid`] - Fixed-width node identifier with XOR composition
//! - [`NodePath`] - Relid path from a tree root to a node

pub mod error;
pub mod guid;
pub mod object;
pub mod path;

pub use error::TypeError;
pub use guid::Guid;
pub use object::{normalize_prefix, ObjectId};
pub use path::{validate_relid, NodePath};
