//! The null-pointer layer.
//!
//! A pointer set to `None` is stored as a pointer to a reserved child of
//! the owning node, created on first use and shared by all of that node's
//! null pointers. Reads report such pointers as `None`, so callers only
//! ever see `Option`. Keeping the sentinel in storage keeps the records
//! readable by existing tools.

use async_trait::async_trait;
use serde_json::Value;
use strata_types::{Guid, NodePath, ObjectId};
use tracing::trace;

use crate::error::CoreResult;
use crate::node::{Node, NodeParams};
use crate::traits::{Core, Identity, Inheritance};
use crate::typed::BASE_POINTER;

/// Relid of the sentinel child.
pub const NULLPTR_RELID: &str = "_nullptr";
/// Value of the sentinel's `name` attribute.
pub const NULLPTR_NAME: &str = "_null_pointer";

/// Null-pointer layer.
pub struct NullPointerCore<C> {
    inner: C,
}

impl<C: Core> NullPointerCore<C> {
    pub fn new(inner: C) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }

    /// The sentinel child of `node`, created if missing.
    async fn sentinel(&self, node: Node) -> CoreResult<Node> {
        if let Some(existing) = self.inner.load_child(node, NULLPTR_RELID).await? {
            return Ok(existing);
        }
        let sentinel = self
            .inner
            .create_node(NodeParams::child_of(node).relid(NULLPTR_RELID))
            .await?;
        self.inner
            .set_attribute(sentinel, "name", Value::String(NULLPTR_NAME.into()))?;
        trace!(?node, ?sentinel, "created null pointer target");
        Ok(sentinel)
    }
}

impl<C: Core + Inheritance> Inheritance for NullPointerCore<C> {
    fn get_base(&self, node: Node) -> CoreResult<Option<Node>> {
        self.inner.get_base(node)
    }
}

#[async_trait]
impl<C: Core + Identity> Identity for NullPointerCore<C> {
    fn get_guid(&self, node: Node) -> CoreResult<Guid> {
        self.inner.get_guid(node)
    }

    async fn set_guid(&self, node: Node, guid: &str) -> CoreResult<()> {
        self.inner.set_guid(node, guid).await
    }
}

#[async_trait]
impl<C: Core> Core for NullPointerCore<C> {
    fn is_valid_node(&self, node: Node) -> bool {
        self.inner.is_valid_node(node)
    }

    async fn load_root(&self, hash: ObjectId) -> CoreResult<Node> {
        self.inner.load_root(hash).await
    }

    async fn load_child(&self, node: Node, relid: &str) -> CoreResult<Option<Node>> {
        self.inner.load_child(node, relid).await
    }

    async fn load_by_path(&self, node: Node, path: &NodePath) -> CoreResult<Option<Node>> {
        self.inner.load_by_path(node, path).await
    }

    async fn load_children(&self, node: Node) -> CoreResult<Vec<Node>> {
        self.inner.load_children(node).await
    }

    async fn load_pointer(&self, node: Node, name: &str) -> CoreResult<Option<Node>> {
        if self.get_pointer_path(node, name)?.is_none() {
            return Ok(None);
        }
        self.inner.load_pointer(node, name).await
    }

    async fn load_collection(&self, node: Node, name: &str) -> CoreResult<Vec<Node>> {
        self.inner.load_collection(node, name).await
    }

    fn get_parent(&self, node: Node) -> CoreResult<Option<Node>> {
        self.inner.get_parent(node)
    }

    fn get_relid(&self, node: Node) -> CoreResult<Option<String>> {
        self.inner.get_relid(node)
    }

    fn get_root(&self, node: Node) -> CoreResult<Node> {
        self.inner.get_root(node)
    }

    fn get_path(&self, node: Node) -> CoreResult<NodePath> {
        self.inner.get_path(node)
    }

    fn get_child_relids(&self, node: Node) -> CoreResult<Vec<String>> {
        self.inner.get_child_relids(node)
    }

    async fn create_node(&self, params: NodeParams) -> CoreResult<Node> {
        self.inner.create_node(params).await
    }

    async fn move_node(&self, node: Node, parent: Node) -> CoreResult<Node> {
        self.inner.move_node(node, parent).await
    }

    async fn copy_node(&self, node: Node, parent: Node) -> CoreResult<Node> {
        self.inner.copy_node(node, parent).await
    }

    async fn delete_node(&self, node: Node) -> CoreResult<()> {
        self.inner.delete_node(node).await
    }

    fn get_attribute_names(&self, node: Node) -> CoreResult<Vec<String>> {
        self.inner.get_attribute_names(node)
    }

    fn get_attribute(&self, node: Node, name: &str) -> CoreResult<Option<Value>> {
        self.inner.get_attribute(node, name)
    }

    fn get_own_attribute(&self, node: Node, name: &str) -> CoreResult<Option<Value>> {
        self.inner.get_own_attribute(node, name)
    }

    fn set_attribute(&self, node: Node, name: &str, value: Value) -> CoreResult<()> {
        self.inner.set_attribute(node, name, value)
    }

    fn del_attribute(&self, node: Node, name: &str) -> CoreResult<()> {
        self.inner.del_attribute(node, name)
    }

    fn get_registry_names(&self, node: Node) -> CoreResult<Vec<String>> {
        self.inner.get_registry_names(node)
    }

    fn get_registry(&self, node: Node, name: &str) -> CoreResult<Option<Value>> {
        self.inner.get_registry(node, name)
    }

    fn set_registry(&self, node: Node, name: &str, value: Value) -> CoreResult<()> {
        self.inner.set_registry(node, name, value)
    }

    fn del_registry(&self, node: Node, name: &str) -> CoreResult<()> {
        self.inner.del_registry(node, name)
    }

    fn get_pointer_names(&self, node: Node) -> CoreResult<Vec<String>> {
        self.inner.get_pointer_names(node)
    }

    fn get_pointer_path(&self, node: Node, name: &str) -> CoreResult<Option<NodePath>> {
        Ok(self
            .inner
            .get_pointer_path(node, name)?
            .filter(|path| !path.passes_through(NULLPTR_RELID)))
    }

    async fn set_pointer(&self, node: Node, name: &str, target: Option<Node>) -> CoreResult<()> {
        match target {
            Some(target) => self.inner.set_pointer(node, name, Some(target)).await,
            // A null base is no base.
            None if name == BASE_POINTER => self.inner.delete_pointer(node, name).await,
            None => {
                let sentinel = self.sentinel(node).await?;
                self.inner.set_pointer(node, name, Some(sentinel)).await
            }
        }
    }

    async fn delete_pointer(&self, node: Node, name: &str) -> CoreResult<()> {
        self.inner.delete_pointer(node, name).await
    }

    fn get_collection_names(&self, node: Node) -> CoreResult<Vec<String>> {
        self.inner.get_collection_names(node)
    }

    fn get_collection_paths(&self, node: Node, name: &str) -> CoreResult<Vec<NodePath>> {
        self.inner.get_collection_paths(node, name)
    }

    async fn persist(&self, node: Node) -> CoreResult<ObjectId> {
        self.inner.persist(node).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build_core;
    use crate::testing::project;
    use serde_json::json;

    #[tokio::test]
    async fn null_pointer_reads_as_none() {
        let core = build_core(project().await);
        let root = core.create_node(NodeParams::root()).await.unwrap();
        let node = core.create_node(NodeParams::child_of(root)).await.unwrap();

        core.set_pointer(node, "x", None).await.unwrap();
        assert_eq!(core.get_pointer_path(node, "x").unwrap(), None);
        assert_eq!(core.load_pointer(node, "x").await.unwrap(), None);
        // The pointer itself exists.
        assert_eq!(core.get_pointer_names(node).unwrap(), vec!["x"]);
    }

    #[tokio::test]
    async fn sentinel_is_shared_per_node() {
        let core = build_core(project().await);
        let root = core.create_node(NodeParams::root()).await.unwrap();
        let node = core.create_node(NodeParams::child_of(root)).await.unwrap();
        core.set_pointer(node, "x", None).await.unwrap();
        core.set_pointer(node, "y", None).await.unwrap();

        assert_eq!(core.get_child_relids(node).unwrap(), vec![NULLPTR_RELID]);
        let sentinel = core.load_child(node, NULLPTR_RELID).await.unwrap().unwrap();
        assert_eq!(core.get_attribute(sentinel, "name").unwrap(), Some(json!(NULLPTR_NAME)));
        let mut users = core.get_collection_names(sentinel).unwrap();
        users.sort();
        assert_eq!(users, vec!["x", "y"]);

        // Another node gets its own sentinel.
        core.set_pointer(root, "z", None).await.unwrap();
        assert!(core.get_child_relids(root).unwrap().contains(&NULLPTR_RELID.to_string()));
    }

    #[tokio::test]
    async fn real_targets_pass_through() {
        let core = build_core(project().await);
        let root = core.create_node(NodeParams::root()).await.unwrap();
        let a = core.create_node(NodeParams::child_of(root).relid("a")).await.unwrap();
        let b = core.create_node(NodeParams::child_of(root).relid("b")).await.unwrap();

        core.set_pointer(a, "x", None).await.unwrap();
        core.set_pointer(a, "x", Some(b)).await.unwrap();
        assert_eq!(core.get_pointer_path(a, "x").unwrap().unwrap().to_string(), "/b");
        assert_eq!(core.load_pointer(a, "x").await.unwrap(), Some(b));
    }

    #[tokio::test]
    async fn null_base_removes_inheritance() {
        let core = build_core(project().await);
        let root = core.create_node(NodeParams::root()).await.unwrap();
        core.set_attribute(root, "color", json!("blue")).unwrap();
        let s = core.create_node(NodeParams::child_of(root).base(root)).await.unwrap();
        core.set_pointer(s, BASE_POINTER, None).await.unwrap();
        assert_eq!(core.get_base(s).unwrap(), None);
        assert!(core.get_child_relids(s).unwrap().is_empty());
    }

    #[tokio::test]
    async fn null_pointers_survive_persistence() {
        let core = build_core(project().await);
        let root = core.create_node(NodeParams::root()).await.unwrap();
        let node = core.create_node(NodeParams::child_of(root).relid("n")).await.unwrap();
        core.set_pointer(node, "x", None).await.unwrap();
        let hash = core.persist(root).await.unwrap();

        let reloaded = core.load_root(hash).await.unwrap();
        let node = core.load_child(reloaded, "n").await.unwrap().unwrap();
        assert_eq!(core.get_pointer_path(node, "x").unwrap(), None);
        assert_eq!(core.load_pointer(node, "x").await.unwrap(), None);
    }
}
