//! The identity layer.
//!
//! Every node stores a relative guid in the hidden `_relguid` attribute.
//! The absolute guid of a node is the XOR of the relative guids on its
//! path up to the root, so changing one node's absolute guid only touches
//! its own and its children's relative values.

use async_trait::async_trait;
use serde_json::Value;
use strata_types::{Guid, NodePath, ObjectId};

use crate::error::{CoreError, CoreResult};
use crate::node::{Node, NodeParams};
use crate::traits::{Core, Identity, Inheritance};

/// Attribute holding the relative guid in internal (32 hex digit) form.
pub const RELGUID_ATTRIBUTE: &str = "_relguid";

/// Identity layer.
pub struct GuidCore<C> {
    inner: C,
}

impl<C: Core> GuidCore<C> {
    pub fn new(inner: C) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }

    fn relative_guid(&self, node: Node) -> CoreResult<Guid> {
        match self.inner.get_own_attribute(node, RELGUID_ATTRIBUTE)? {
            Some(Value::String(internal)) => Ok(Guid::from_internal(&internal)?),
            _ => Err(CoreError::MissingGuid {
                path: self.inner.get_path(node)?.to_string(),
            }),
        }
    }

    fn set_relative_guid(&self, node: Node, guid: Guid) -> CoreResult<()> {
        self.inner
            .set_attribute(node, RELGUID_ATTRIBUTE, Value::String(guid.to_internal()))
    }

    /// Absolute guid of `parent`, or nil for "no parent" so that XOR with it
    /// is the identity.
    fn parent_guid(&self, parent: Option<Node>) -> CoreResult<Guid> {
        match parent {
            Some(parent) => self.get_guid(parent),
            None => Ok(Guid::nil()),
        }
    }
}

#[async_trait]
impl<C: Core> Identity for GuidCore<C> {
    fn get_guid(&self, node: Node) -> CoreResult<Guid> {
        let mut guid = self.relative_guid(node)?;
        let mut current = self.inner.get_parent(node)?;
        while let Some(ancestor) = current {
            guid = guid ^ self.relative_guid(ancestor)?;
            current = self.inner.get_parent(ancestor)?;
        }
        Ok(guid)
    }

    async fn set_guid(&self, node: Node, guid: &str) -> CoreResult<()> {
        let guid = Guid::parse(guid)?;
        let children = self.inner.load_children(node).await?;
        let mut preserved = Vec::with_capacity(children.len());
        for child in children {
            preserved.push((child, self.get_guid(child)?));
        }
        let parent = self.parent_guid(self.inner.get_parent(node)?)?;
        for (child, absolute) in preserved {
            self.set_relative_guid(child, absolute ^ guid)?;
        }
        self.set_relative_guid(node, guid ^ parent)
    }
}

impl<C: Core + Inheritance> Inheritance for GuidCore<C> {
    fn get_base(&self, node: Node) -> CoreResult<Option<Node>> {
        self.inner.get_base(node)
    }
}

#[async_trait]
impl<C: Core> Core for GuidCore<C> {
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

    async fn create_node(&self, mut params: NodeParams) -> CoreResult<Node> {
        let guid = match params.guid.take() {
            Some(text) => Guid::parse(&text)?,
            None => Guid::random(),
        };
        let parent = self.parent_guid(params.parent)?;
        let node = self.inner.create_node(params).await?;
        self.set_relative_guid(node, guid ^ parent)?;
        Ok(node)
    }

    async fn move_node(&self, node: Node, parent: Node) -> CoreResult<Node> {
        let absolute = self.get_guid(node)?;
        let moved = self.inner.move_node(node, parent).await?;
        let parent = self.parent_guid(self.inner.get_parent(moved)?)?;
        self.set_relative_guid(moved, absolute ^ parent)?;
        Ok(moved)
    }

    async fn copy_node(&self, node: Node, parent: Node) -> CoreResult<Node> {
        let copy = self.inner.copy_node(node, parent).await?;
        let parent = self.parent_guid(self.inner.get_parent(copy)?)?;
        self.set_relative_guid(copy, Guid::random() ^ parent)?;
        Ok(copy)
    }

    async fn delete_node(&self, node: Node) -> CoreResult<()> {
        self.inner.delete_node(node).await
    }

    fn get_attribute_names(&self, node: Node) -> CoreResult<Vec<String>> {
        let mut names = self.inner.get_attribute_names(node)?;
        names.retain(|name| name != RELGUID_ATTRIBUTE);
        Ok(names)
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
        self.inner.get_pointer_path(node, name)
    }

    async fn set_pointer(&self, node: Node, name: &str, target: Option<Node>) -> CoreResult<()> {
        self.inner.set_pointer(node, name, target).await
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
