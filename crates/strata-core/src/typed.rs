//! The inheritance layer.
//!
//! Inheritance is encoded as an ordinary pointer named `base`. Whenever a
//! node comes out of the inner layer, [`TypeCore`] resolves that pointer
//! (and the base's own base, up the chain) once and memoizes the result.
//! Property reads then walk the memoized chain: the first node defining a
//! name wins, and name listings are the union over the chain.
//!
//! The memo is only refreshed when `base` is set or deleted through this
//! layer. A base that is moved afterwards is still reported by its old
//! handle. Deleting a node prunes the memo: entries of the dead subtree
//! are dropped and inheritors of it fall back to having no base.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use serde_json::Value;
use strata_types::{NodePath, ObjectId};
use tracing::warn;

use crate::error::{CoreError, CoreResult};
use crate::node::{Node, NodeParams};
use crate::traits::{Core, Inheritance};

/// Name of the pointer that carries inheritance.
pub const BASE_POINTER: &str = "base";

/// Inheritance layer. See the module docs.
pub struct TypeCore<C> {
    inner: C,
    /// Resolved bases. A node is absent until resolved; `None` means it
    /// has no base.
    bases: Mutex<HashMap<Node, Option<Node>>>,
}

impl<C: Core> TypeCore<C> {
    pub fn new(inner: C) -> Self {
        Self {
            inner,
            bases: Mutex::new(HashMap::new()),
        }
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }

    fn bases(&self) -> MutexGuard<'_, HashMap<Node, Option<Node>>> {
        self.bases.lock().expect("lock poisoned")
    }

    fn resolved(&self, node: Node) -> Option<Option<Node>> {
        self.bases().get(&node).copied()
    }

    fn check(&self, node: Node) -> CoreResult<()> {
        if self.is_valid_node(node) {
            Ok(())
        } else {
            Err(CoreError::InvalidNode(node))
        }
    }

    /// `node` followed by its bases, nearest first.
    fn chain(&self, node: Node) -> CoreResult<Vec<Node>> {
        self.check(node)?;
        let bases = self.bases();
        let mut chain = vec![node];
        let mut current = node;
        while let Some(Some(base)) = bases.get(&current) {
            if chain.contains(base) {
                break;
            }
            chain.push(*base);
            current = *base;
        }
        Ok(chain)
    }

    /// Resolve the base chain of `node` and memoize every link.
    async fn resolve(&self, node: Node) -> CoreResult<Node> {
        let mut pending: Vec<(Node, Option<Node>)> = Vec::new();
        let mut current = node;
        while self.resolved(current).is_none() {
            let base = self.inner.load_pointer(current, BASE_POINTER).await?;
            pending.push((current, base));
            match base {
                Some(base) if pending.iter().any(|(n, _)| *n == base) => {
                    return Err(CoreError::BaseCycle {
                        path: self.inner.get_path(node)?.to_string(),
                    });
                }
                Some(base) => current = base,
                None => break,
            }
        }
        self.bases().extend(pending);
        Ok(node)
    }

    async fn resolve_all(&self, nodes: Vec<Node>) -> CoreResult<Vec<Node>> {
        let mut resolved = Vec::with_capacity(nodes.len());
        for node in nodes {
            resolved.push(self.resolve(node).await?);
        }
        Ok(resolved)
    }

    async fn resolve_opt(&self, node: Option<Node>) -> CoreResult<Option<Node>> {
        match node {
            Some(node) => Ok(Some(self.resolve(node).await?)),
            None => Ok(None),
        }
    }

    fn merged_names(
        &self,
        node: Node,
        names: impl Fn(Node) -> CoreResult<Vec<String>>,
    ) -> CoreResult<Vec<String>> {
        let mut merged = BTreeSet::new();
        for n in self.chain(node)? {
            merged.extend(names(n)?);
        }
        Ok(merged.into_iter().collect())
    }

    fn inherited<T>(
        &self,
        node: Node,
        get: impl Fn(Node) -> CoreResult<Option<T>>,
    ) -> CoreResult<Option<T>> {
        for n in self.chain(node)? {
            if let Some(value) = get(n)? {
                return Ok(Some(value));
            }
        }
        Ok(None)
    }
}

impl<C: Core> Inheritance for TypeCore<C> {
    fn get_base(&self, node: Node) -> CoreResult<Option<Node>> {
        self.check(node)?;
        self.resolved(node).ok_or(CoreError::InvalidNode(node))
    }
}

#[async_trait]
impl<C: Core> Core for TypeCore<C> {
    fn is_valid_node(&self, node: Node) -> bool {
        if !self.inner.is_valid_node(node) {
            warn!(?node, "invalid node: unknown to the tree layer");
            return false;
        }
        if self.resolved(node).is_none() {
            warn!(?node, "invalid node: base not resolved");
            return false;
        }
        true
    }

    async fn load_root(&self, hash: ObjectId) -> CoreResult<Node> {
        let node = self.inner.load_root(hash).await?;
        // A root never inherits.
        self.bases().insert(node, None);
        Ok(node)
    }

    async fn load_child(&self, node: Node, relid: &str) -> CoreResult<Option<Node>> {
        self.check(node)?;
        let child = self.inner.load_child(node, relid).await?;
        self.resolve_opt(child).await
    }

    async fn load_by_path(&self, node: Node, path: &NodePath) -> CoreResult<Option<Node>> {
        self.check(node)?;
        let target = self.inner.load_by_path(node, path).await?;
        self.resolve_opt(target).await
    }

    async fn load_children(&self, node: Node) -> CoreResult<Vec<Node>> {
        self.check(node)?;
        let children = self.inner.load_children(node).await?;
        self.resolve_all(children).await
    }

    async fn load_pointer(&self, node: Node, name: &str) -> CoreResult<Option<Node>> {
        // Load from the nearest node on the chain that defines the pointer.
        let mut owner = None;
        for n in self.chain(node)? {
            if self.inner.get_pointer_path(n, name)?.is_some() {
                owner = Some(n);
                break;
            }
        }
        match owner {
            Some(owner) => {
                let target = self.inner.load_pointer(owner, name).await?;
                self.resolve_opt(target).await
            }
            None => Ok(None),
        }
    }

    async fn load_collection(&self, node: Node, name: &str) -> CoreResult<Vec<Node>> {
        self.check(node)?;
        let sources = self.inner.load_collection(node, name).await?;
        self.resolve_all(sources).await
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
        if let Some(parent) = params.parent {
            self.check(parent)?;
        }
        if let Some(base) = params.base {
            self.check(base)?;
        }
        let base = params.base;
        let node = self
            .inner
            .create_node(NodeParams {
                base: None,
                ..params
            })
            .await?;
        match base {
            Some(base) => self.set_pointer(node, BASE_POINTER, Some(base)).await?,
            None => {
                self.bases().insert(node, None);
            }
        }
        Ok(node)
    }

    async fn move_node(&self, node: Node, parent: Node) -> CoreResult<Node> {
        self.check(node)?;
        self.check(parent)?;
        self.inner.move_node(node, parent).await
    }

    async fn copy_node(&self, node: Node, parent: Node) -> CoreResult<Node> {
        self.check(node)?;
        self.check(parent)?;
        let copy = self.inner.copy_node(node, parent).await?;
        self.resolve(copy).await
    }

    async fn delete_node(&self, node: Node) -> CoreResult<()> {
        self.check(node)?;
        self.inner.delete_node(node).await?;
        // The tree layer already dropped `base` pointers into the deleted
        // subtree; bring the memo in line with it.
        let mut bases = self.bases();
        bases.retain(|n, _| self.inner.is_valid_node(*n));
        for base in bases.values_mut() {
            if base.is_some_and(|b| !self.inner.is_valid_node(b)) {
                *base = None;
            }
        }
        Ok(())
    }

    fn get_attribute_names(&self, node: Node) -> CoreResult<Vec<String>> {
        self.merged_names(node, |n| self.inner.get_attribute_names(n))
    }

    fn get_attribute(&self, node: Node, name: &str) -> CoreResult<Option<Value>> {
        self.inherited(node, |n| self.inner.get_attribute(n, name))
    }

    fn get_own_attribute(&self, node: Node, name: &str) -> CoreResult<Option<Value>> {
        self.check(node)?;
        self.inner.get_own_attribute(node, name)
    }

    fn set_attribute(&self, node: Node, name: &str, value: Value) -> CoreResult<()> {
        self.inner.set_attribute(node, name, value)
    }

    fn del_attribute(&self, node: Node, name: &str) -> CoreResult<()> {
        self.inner.del_attribute(node, name)
    }

    fn get_registry_names(&self, node: Node) -> CoreResult<Vec<String>> {
        self.merged_names(node, |n| self.inner.get_registry_names(n))
    }

    fn get_registry(&self, node: Node, name: &str) -> CoreResult<Option<Value>> {
        self.inherited(node, |n| self.inner.get_registry(n, name))
    }

    fn set_registry(&self, node: Node, name: &str, value: Value) -> CoreResult<()> {
        self.inner.set_registry(node, name, value)
    }

    fn del_registry(&self, node: Node, name: &str) -> CoreResult<()> {
        self.inner.del_registry(node, name)
    }

    fn get_pointer_names(&self, node: Node) -> CoreResult<Vec<String>> {
        self.merged_names(node, |n| self.inner.get_pointer_names(n))
    }

    fn get_pointer_path(&self, node: Node, name: &str) -> CoreResult<Option<NodePath>> {
        self.inherited(node, |n| self.inner.get_pointer_path(n, name))
    }

    async fn set_pointer(&self, node: Node, name: &str, target: Option<Node>) -> CoreResult<()> {
        if name != BASE_POINTER {
            return self.inner.set_pointer(node, name, target).await;
        }
        if let Some(base) = target {
            self.check(base)?;
            if self.chain(base)?.contains(&node) {
                return Err(CoreError::BaseCycle {
                    path: self.inner.get_path(node)?.to_string(),
                });
            }
        }
        self.inner.set_pointer(node, name, target).await?;
        self.bases().insert(node, target);
        Ok(())
    }

    async fn delete_pointer(&self, node: Node, name: &str) -> CoreResult<()> {
        self.inner.delete_pointer(node, name).await?;
        if name == BASE_POINTER {
            self.bases().insert(node, None);
        }
        Ok(())
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
    use crate::testing::project;
    use crate::tree::TreeCore;
    use serde_json::json;

    async fn core() -> TypeCore<TreeCore> {
        TypeCore::new(TreeCore::new(project().await))
    }

    #[tokio::test]
    async fn attribute_is_inherited_from_base() {
        let core = core().await;
        let root = core.create_node(NodeParams::root()).await.unwrap();
        core.set_attribute(root, "color", json!("blue")).unwrap();
        let s = core
            .create_node(NodeParams::child_of(root).base(root))
            .await
            .unwrap();

        assert_eq!(core.get_base(s).unwrap(), Some(root));
        assert_eq!(core.get_base(root).unwrap(), None);
        assert_eq!(core.get_attribute(s, "color").unwrap(), Some(json!("blue")));
        assert_eq!(core.get_attribute(s, "size").unwrap(), None);

        core.set_attribute(s, "color", json!("red")).unwrap();
        assert_eq!(core.get_attribute(s, "color").unwrap(), Some(json!("red")));
        assert_eq!(core.get_attribute(root, "color").unwrap(), Some(json!("blue")));
    }

    #[tokio::test]
    async fn names_are_merged_along_the_chain() {
        let core = core().await;
        let root = core.create_node(NodeParams::root()).await.unwrap();
        let a = core.create_node(NodeParams::child_of(root)).await.unwrap();
        let b = core.create_node(NodeParams::child_of(root).base(a)).await.unwrap();
        let c = core.create_node(NodeParams::child_of(root).base(b)).await.unwrap();
        core.set_attribute(a, "x", json!(1)).unwrap();
        core.set_attribute(b, "y", json!(2)).unwrap();
        core.set_attribute(c, "x", json!(3)).unwrap();
        core.set_registry(a, "pos", json!([0, 0])).unwrap();

        assert_eq!(core.get_attribute_names(c).unwrap(), vec!["x", "y"]);
        assert_eq!(core.get_attribute(c, "x").unwrap(), Some(json!(3)));
        assert_eq!(core.get_attribute(c, "y").unwrap(), Some(json!(2)));
        assert_eq!(core.get_registry_names(c).unwrap(), vec!["pos"]);
        assert_eq!(core.get_registry(c, "pos").unwrap(), Some(json!([0, 0])));
        assert_eq!(core.get_pointer_names(c).unwrap(), vec!["base"]);
    }

    #[tokio::test]
    async fn pointers_are_inherited() {
        let core = core().await;
        let root = core.create_node(NodeParams::root()).await.unwrap();
        let target = core.create_node(NodeParams::child_of(root).relid("t")).await.unwrap();
        let proto = core.create_node(NodeParams::child_of(root)).await.unwrap();
        core.set_pointer(proto, "ref", Some(target)).await.unwrap();
        let instance = core
            .create_node(NodeParams::child_of(root).base(proto))
            .await
            .unwrap();

        assert_eq!(
            core.get_pointer_path(instance, "ref").unwrap().unwrap().to_string(),
            "/t"
        );
        assert_eq!(core.load_pointer(instance, "ref").await.unwrap(), Some(target));
        assert_eq!(core.load_pointer(instance, "none").await.unwrap(), None);
    }

    #[tokio::test]
    async fn bases_resolve_after_reload() {
        let core = core().await;
        let root = core.create_node(NodeParams::root()).await.unwrap();
        let proto = core.create_node(NodeParams::child_of(root).relid("p")).await.unwrap();
        core.set_attribute(proto, "color", json!("blue")).unwrap();
        core.create_node(NodeParams::child_of(root).relid("i").base(proto))
            .await
            .unwrap();
        let hash = core.persist(root).await.unwrap();

        let root = core.load_root(hash).await.unwrap();
        let instance = core.load_child(root, "i").await.unwrap().unwrap();
        let base = core.get_base(instance).unwrap().unwrap();
        assert_eq!(core.get_path(base).unwrap().to_string(), "/p");
        assert_eq!(core.get_attribute(instance, "color").unwrap(), Some(json!("blue")));
        assert_eq!(core.load_children(root).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn base_cycles_are_rejected() {
        let core = core().await;
        let root = core.create_node(NodeParams::root()).await.unwrap();
        let a = core.create_node(NodeParams::child_of(root)).await.unwrap();
        let b = core.create_node(NodeParams::child_of(root).base(a)).await.unwrap();
        let err = core.set_pointer(a, BASE_POINTER, Some(b)).await.unwrap_err();
        assert!(matches!(err, CoreError::BaseCycle { .. }));
        let err = core.set_pointer(a, BASE_POINTER, Some(a)).await.unwrap_err();
        assert!(matches!(err, CoreError::BaseCycle { .. }));
    }

    #[tokio::test]
    async fn deleting_base_pointer_stops_inheritance() {
        let core = core().await;
        let root = core.create_node(NodeParams::root()).await.unwrap();
        core.set_attribute(root, "color", json!("blue")).unwrap();
        let s = core.create_node(NodeParams::child_of(root).base(root)).await.unwrap();
        core.delete_pointer(s, BASE_POINTER).await.unwrap();
        assert_eq!(core.get_base(s).unwrap(), None);
        assert_eq!(core.get_attribute(s, "color").unwrap(), None);
    }

    #[tokio::test]
    async fn unresolved_nodes_are_invalid() {
        let core = core().await;
        let root = core.create_node(NodeParams::root()).await.unwrap();
        // Created behind the layer's back, so its base was never resolved.
        let raw = core
            .inner()
            .create_node(NodeParams::child_of(root))
            .await
            .unwrap();
        assert!(!core.is_valid_node(raw));
        assert!(matches!(core.get_base(raw), Err(CoreError::InvalidNode(_))));
        assert!(matches!(
            core.get_attribute(raw, "x"),
            Err(CoreError::InvalidNode(_))
        ));
        // Loading it through the layer resolves it.
        let relid = core.get_relid(raw).unwrap().unwrap();
        let loaded = core.load_child(root, &relid).await.unwrap().unwrap();
        assert_eq!(loaded, raw);
        assert!(core.is_valid_node(raw));
    }

    #[tokio::test]
    async fn copies_keep_their_base() {
        let core = core().await;
        let root = core.create_node(NodeParams::root()).await.unwrap();
        let proto = core.create_node(NodeParams::child_of(root)).await.unwrap();
        let folder = core.create_node(NodeParams::child_of(root)).await.unwrap();
        let instance = core
            .create_node(NodeParams::child_of(folder).base(proto))
            .await
            .unwrap();
        let copy = core.copy_node(instance, root).await.unwrap();
        assert_eq!(core.get_base(copy).unwrap(), Some(proto));

        core.delete_node(instance).await.unwrap();
        assert!(!core.is_valid_node(instance));
    }

    #[tokio::test]
    async fn deleting_a_base_detaches_its_inheritors() {
        let core = core().await;
        let root = core.create_node(NodeParams::root()).await.unwrap();
        let proto = core.create_node(NodeParams::child_of(root)).await.unwrap();
        core.set_attribute(proto, "color", json!("red")).unwrap();
        let instance = core
            .create_node(NodeParams::child_of(root).base(proto))
            .await
            .unwrap();
        assert_eq!(core.get_attribute(instance, "color").unwrap(), Some(json!("red")));

        core.delete_node(proto).await.unwrap();
        assert!(core.is_valid_node(instance));
        assert_eq!(core.get_base(instance).unwrap(), None);
        let names = core.get_attribute_names(instance).unwrap();
        assert!(!names.iter().any(|n| n == "color"));
        assert_eq!(core.get_attribute(instance, "color").unwrap(), None);
        assert!(core.get_pointer_names(instance).is_ok());
        assert!(core.bases().get(&proto).is_none());
    }
}
