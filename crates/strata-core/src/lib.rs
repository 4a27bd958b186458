//! Layered node API for Strata models.
//!
//! A model is a tree of nodes stored in a [`Project`]. The node API is
//! assembled from four layers, each wrapping the one below it:
//!
//! 1. [`TreeCore`] -- loads, edits and persists trees of node records
//! 2. [`TypeCore`] -- prototype inheritance through the `base` pointer
//! 3. [`GuidCore`] -- stable absolute guids from XOR-relative fragments
//! 4. [`NullPointerCore`] -- `None` pointers backed by a sentinel child
//!
//! [`build_core`] returns the full stack. Every layer implements [`Core`];
//! the inheritance and identity operations are reachable through the
//! [`Inheritance`] and [`Identity`] traits on any layer above the one that
//! introduces them.

pub mod error;
pub mod guid;
pub mod node;
pub mod nullptr;
pub mod traits;
pub mod tree;
pub mod typed;

#[cfg(test)]
pub(crate) mod testing;

use std::sync::Arc;

use strata_db::Project;

pub use error::{CoreError, CoreResult};
pub use guid::{GuidCore, RELGUID_ATTRIBUTE};
pub use node::{Node, NodeParams};
pub use nullptr::{NullPointerCore, NULLPTR_NAME, NULLPTR_RELID};
pub use traits::{Core, Identity, Inheritance};
pub use tree::TreeCore;
pub use typed::{TypeCore, BASE_POINTER};

/// The full layer stack.
pub type ModelCore = NullPointerCore<GuidCore<TypeCore<TreeCore>>>;

/// Build the full layer stack over `project`.
pub fn build_core(project: Arc<dyn Project>) -> ModelCore {
    NullPointerCore::new(GuidCore::new(TypeCore::new(TreeCore::new(project))))
}
