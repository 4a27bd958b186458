//! The operation sets shared by every layer.
//!
//! [`Core`] is the full node API. Each layer wraps an inner `Core`,
//! forwards what it does not change and overrides the rest. Operations a
//! layer adds live in their own traits ([`Inheritance`], [`Identity`]) and
//! are forwarded by outer layers.

use async_trait::async_trait;
use serde_json::Value;
use strata_types::{Guid, NodePath, ObjectId};

use crate::error::CoreResult;
use crate::node::{Node, NodeParams};

/// Node operations.
///
/// Loading and structural edits are asynchronous because they may reach
/// the project store; reads of already loaded state are synchronous.
#[async_trait]
pub trait Core: Send + Sync {
    /// `true` if `node` can be used with this layer. Never fails; problems
    /// are logged.
    fn is_valid_node(&self, node: Node) -> bool;

    // ----- navigation

    /// Load the tree whose root record is stored under `hash`.
    async fn load_root(&self, hash: ObjectId) -> CoreResult<Node>;

    /// Load a child by relid. `None` if there is no such child.
    async fn load_child(&self, node: Node, relid: &str) -> CoreResult<Option<Node>>;

    /// Follow `path` (relative to `node`) one relid at a time.
    async fn load_by_path(&self, node: Node, path: &NodePath) -> CoreResult<Option<Node>>;

    async fn load_children(&self, node: Node) -> CoreResult<Vec<Node>>;

    /// Load the target of pointer `name`. `None` if the pointer is unset or
    /// its target no longer exists.
    async fn load_pointer(&self, node: Node, name: &str) -> CoreResult<Option<Node>>;

    /// Load every node whose pointer `name` targets `node`.
    async fn load_collection(&self, node: Node, name: &str) -> CoreResult<Vec<Node>>;

    fn get_parent(&self, node: Node) -> CoreResult<Option<Node>>;

    fn get_relid(&self, node: Node) -> CoreResult<Option<String>>;

    fn get_root(&self, node: Node) -> CoreResult<Node>;

    /// Path from the root to `node`.
    fn get_path(&self, node: Node) -> CoreResult<NodePath>;

    /// Relids of all children, loaded or not, sorted.
    fn get_child_relids(&self, node: Node) -> CoreResult<Vec<String>>;

    // ----- structure

    async fn create_node(&self, params: NodeParams) -> CoreResult<Node>;

    /// Re-parent `node`. The handle stays the same.
    async fn move_node(&self, node: Node, parent: Node) -> CoreResult<Node>;

    /// Deep-copy `node` under `parent` and return the copy.
    async fn copy_node(&self, node: Node, parent: Node) -> CoreResult<Node>;

    async fn delete_node(&self, node: Node) -> CoreResult<()>;

    // ----- properties

    fn get_attribute_names(&self, node: Node) -> CoreResult<Vec<String>>;
    fn get_attribute(&self, node: Node, name: &str) -> CoreResult<Option<Value>>;
    /// The value stored on `node` itself, ignoring anything it inherits.
    fn get_own_attribute(&self, node: Node, name: &str) -> CoreResult<Option<Value>> {
        self.get_attribute(node, name)
    }
    fn set_attribute(&self, node: Node, name: &str, value: Value) -> CoreResult<()>;
    fn del_attribute(&self, node: Node, name: &str) -> CoreResult<()>;

    fn get_registry_names(&self, node: Node) -> CoreResult<Vec<String>>;
    fn get_registry(&self, node: Node, name: &str) -> CoreResult<Option<Value>>;
    fn set_registry(&self, node: Node, name: &str, value: Value) -> CoreResult<()>;
    fn del_registry(&self, node: Node, name: &str) -> CoreResult<()>;

    // ----- pointers

    fn get_pointer_names(&self, node: Node) -> CoreResult<Vec<String>>;

    /// Target path of pointer `name`, or `None` if it is unset or null.
    fn get_pointer_path(&self, node: Node, name: &str) -> CoreResult<Option<NodePath>>;

    /// Point `name` at `target`; `None` is a null pointer.
    async fn set_pointer(&self, node: Node, name: &str, target: Option<Node>) -> CoreResult<()>;

    async fn delete_pointer(&self, node: Node, name: &str) -> CoreResult<()>;

    fn get_collection_names(&self, node: Node) -> CoreResult<Vec<String>>;

    /// Paths of the nodes whose pointer `name` targets `node`.
    fn get_collection_paths(&self, node: Node, name: &str) -> CoreResult<Vec<NodePath>>;

    // ----- persistence

    /// Store the subtree under `node` and return the hash of its record.
    async fn persist(&self, node: Node) -> CoreResult<ObjectId>;
}

/// Base (prototype) navigation.
pub trait Inheritance: Core {
    /// The node `node` inherits from. Fails for nodes whose base has not
    /// been resolved.
    fn get_base(&self, node: Node) -> CoreResult<Option<Node>>;
}

/// Stable node identity.
#[async_trait]
pub trait Identity: Core {
    /// Absolute guid of `node`.
    fn get_guid(&self, node: Node) -> CoreResult<Guid>;

    /// Give `node` a new absolute guid without changing the guid of any
    /// descendant. `guid` must be in canonical form.
    async fn set_guid(&self, node: Node, guid: &str) -> CoreResult<()>;
}
