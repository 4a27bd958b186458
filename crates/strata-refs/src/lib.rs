//! Branch management for Strata projects.
//!
//! A branch is a named, mutable pointer to one commit. Branches are the
//! single piece of project state with concurrency control: every update is
//! a compare-and-swap against the head the writer last saw, so two clients
//! advancing history from the same head cannot both succeed.
//!
//! # Modules
//!
//! - [`error`] - Error types for branch operations
//! - [`traits`] - The [`BranchStore`] trait and [`BranchHead`]
//! - [`names`] - Branch name validation
//! - [`memory`] - In-memory [`InMemoryBranchStore`]

pub mod error;
pub mod memory;
pub mod names;
pub mod traits;

pub use error::{RefError, Result};
pub use memory::InMemoryBranchStore;
pub use names::validate_branch_name;
pub use traits::{BranchHead, BranchStore};
