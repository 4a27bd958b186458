//! The primitive tree layer.
//!
//! [`TreeCore`] keeps every loaded node in an arena. Children are loaded
//! lazily from the project: until a child is needed its parent only knows
//! the child's record hash. `persist` walks the loaded part of a tree
//! bottom-up and stores one [`NodeRecord`] per node, so unchanged subtrees
//! keep their hash and are shared between commits.
//!
//! Pointers are stored as paths from the tree root; the target keeps the
//! inverse relation in its collections. Moving a node does not rewrite
//! paths held by other nodes.
//!
//! The arena only grows. Handles are never reused: deleting a node flags
//! its entries dead, and every `load_root` adds a fresh set of entries.
//! Drop the core and build a new one to release a long session's nodes.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use rand::Rng;
use serde_json::Value;
use strata_db::Project;
use strata_store::{NodeRecord, PointerRecord, StoredObject};
use strata_types::{validate_relid, NodePath, ObjectId};
use tracing::{debug, trace};

use crate::error::{CoreError, CoreResult};
use crate::node::{Node, NodeParams};
use crate::traits::Core;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Child {
    Stored(ObjectId),
    Loaded(Node),
}

#[derive(Clone, Debug)]
struct Entry {
    parent: Option<Node>,
    relid: Option<String>,
    live: bool,
    attributes: BTreeMap<String, Value>,
    registry: BTreeMap<String, Value>,
    pointers: BTreeMap<String, NodePath>,
    collections: BTreeMap<String, BTreeSet<NodePath>>,
    children: BTreeMap<String, Child>,
}

impl Entry {
    fn new(parent: Option<Node>, relid: Option<String>) -> Self {
        Self {
            parent,
            relid,
            live: true,
            attributes: BTreeMap::new(),
            registry: BTreeMap::new(),
            pointers: BTreeMap::new(),
            collections: BTreeMap::new(),
            children: BTreeMap::new(),
        }
    }

    fn from_record(parent: Option<Node>, relid: Option<String>, record: NodeRecord) -> Self {
        Self {
            attributes: record.attributes,
            registry: record.registry,
            pointers: record
                .pointers
                .into_iter()
                .map(|(name, pointer)| (name, pointer.to))
                .collect(),
            collections: record.collections,
            children: record
                .children
                .into_iter()
                .map(|(relid, hash)| (relid, Child::Stored(hash)))
                .collect(),
            ..Self::new(parent, relid)
        }
    }

    fn to_record(&self, children: BTreeMap<String, ObjectId>) -> NodeRecord {
        NodeRecord {
            attributes: self.attributes.clone(),
            registry: self.registry.clone(),
            pointers: self
                .pointers
                .iter()
                .map(|(name, to)| (name.clone(), PointerRecord { to: to.clone() }))
                .collect(),
            collections: self.collections.clone(),
            children,
        }
    }
}

#[derive(Default)]
struct Arena {
    entries: Vec<Entry>,
}

impl Arena {
    fn get(&self, node: Node) -> CoreResult<&Entry> {
        self.entries
            .get(node.0)
            .filter(|entry| entry.live)
            .ok_or(CoreError::InvalidNode(node))
    }

    fn get_mut(&mut self, node: Node) -> CoreResult<&mut Entry> {
        self.entries
            .get_mut(node.0)
            .filter(|entry| entry.live)
            .ok_or(CoreError::InvalidNode(node))
    }

    fn insert(&mut self, entry: Entry) -> Node {
        self.entries.push(entry);
        Node(self.entries.len() - 1)
    }

    fn root(&self, node: Node) -> CoreResult<Node> {
        let mut current = node;
        while let Some(parent) = self.get(current)?.parent {
            current = parent;
        }
        Ok(current)
    }

    fn path(&self, node: Node) -> CoreResult<NodePath> {
        let mut relids = Vec::new();
        let mut current = node;
        loop {
            let entry = self.get(current)?;
            match (entry.parent, &entry.relid) {
                (Some(parent), Some(relid)) => {
                    relids.push(relid.clone());
                    current = parent;
                }
                _ => break,
            }
        }
        relids.reverse();
        Ok(NodePath::from_relids(relids)?)
    }

    /// `true` if `ancestor` is `node` or one of its ancestors.
    fn is_ancestor(&self, ancestor: Node, node: Node) -> CoreResult<bool> {
        let mut current = Some(node);
        while let Some(n) = current {
            if n == ancestor {
                return Ok(true);
            }
            current = self.get(n)?.parent;
        }
        Ok(false)
    }

    fn fresh_relid(&self, parent: Node) -> CoreResult<String> {
        let children = &self.get(parent)?.children;
        let mut rng = rand::thread_rng();
        loop {
            let relid = rng.gen_range(1..=u32::MAX).to_string();
            if !children.contains_key(&relid) {
                return Ok(relid);
            }
        }
    }

    /// Mark `node` and its loaded descendants dead.
    fn kill(&mut self, node: Node) {
        let mut stack = vec![node];
        while let Some(n) = stack.pop() {
            if let Some(entry) = self.entries.get_mut(n.0) {
                entry.live = false;
                stack.extend(entry.children.values().filter_map(|child| match child {
                    Child::Loaded(c) => Some(*c),
                    Child::Stored(_) => None,
                }));
            }
        }
    }

    /// Encode the subtree under `node`, children first. Returns the hash of
    /// `node`'s record.
    fn encode(&self, node: Node, out: &mut Vec<StoredObject>) -> CoreResult<ObjectId> {
        let entry = self.get(node)?;
        let mut children = BTreeMap::new();
        for (relid, child) in &entry.children {
            let hash = match child {
                Child::Stored(hash) => *hash,
                Child::Loaded(child) => self.encode(*child, out)?,
            };
            children.insert(relid.clone(), hash);
        }
        let object = entry.to_record(children).to_stored_object()?;
        let id = object.id;
        out.push(object);
        Ok(id)
    }
}

/// One pointer edge: `source` points at `target` through `name`.
struct Edge {
    source: NodePath,
    name: String,
    target: NodePath,
}

/// Primitive node layer over a [`Project`].
pub struct TreeCore {
    project: Arc<dyn Project>,
    arena: Mutex<Arena>,
}

impl TreeCore {
    pub fn new(project: Arc<dyn Project>) -> Self {
        Self {
            project,
            arena: Mutex::new(Arena::default()),
        }
    }

    pub fn project(&self) -> &Arc<dyn Project> {
        &self.project
    }

    fn arena(&self) -> MutexGuard<'_, Arena> {
        self.arena.lock().expect("lock poisoned")
    }

    fn read<T>(&self, node: Node, f: impl FnOnce(&Entry) -> T) -> CoreResult<T> {
        Ok(f(self.arena().get(node)?))
    }

    fn write<T>(&self, node: Node, f: impl FnOnce(&mut Entry) -> T) -> CoreResult<T> {
        Ok(f(self.arena().get_mut(node)?))
    }

    /// Load every descendant of `node`. Returns the subtree in pre-order.
    async fn load_subtree(&self, node: Node) -> CoreResult<Vec<Node>> {
        let mut order = Vec::new();
        let mut stack = vec![node];
        while let Some(current) = stack.pop() {
            order.push(current);
            for relid in self.get_child_relids(current)? {
                if let Some(child) = self.load_child(current, &relid).await? {
                    stack.push(child);
                }
            }
        }
        Ok(order)
    }

    /// Drop `edge.source` from the collection of `edge.target`, if the
    /// target still exists.
    async fn unlink(&self, root: Node, edge: &Edge) -> CoreResult<()> {
        if let Some(target) = self.load_by_path(root, &edge.target).await? {
            self.write(target, |entry| {
                if let Some(sources) = entry.collections.get_mut(&edge.name) {
                    sources.remove(&edge.source);
                    if sources.is_empty() {
                        entry.collections.remove(&edge.name);
                    }
                }
            })?;
        }
        Ok(())
    }

    async fn link(&self, root: Node, edge: Edge) -> CoreResult<()> {
        if let Some(target) = self.load_by_path(root, &edge.target).await? {
            self.write(target, |entry| {
                entry
                    .collections
                    .entry(edge.name)
                    .or_default()
                    .insert(edge.source);
            })?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for TreeCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TreeCore")
            .field("project", &self.project.name())
            .field("nodes", &self.arena().entries.len())
            .finish()
    }
}

#[async_trait]
impl Core for TreeCore {
    fn is_valid_node(&self, node: Node) -> bool {
        self.arena().get(node).is_ok()
    }

    async fn load_root(&self, hash: ObjectId) -> CoreResult<Node> {
        let record = self.project.load_node(hash).await?;
        let node = self.arena().insert(Entry::from_record(None, None, record));
        debug!(root = %hash.short_hex(), ?node, "loaded root");
        Ok(node)
    }

    async fn load_child(&self, node: Node, relid: &str) -> CoreResult<Option<Node>> {
        loop {
            let hash = match self.read(node, |entry| entry.children.get(relid).copied())? {
                None => return Ok(None),
                Some(Child::Loaded(child)) => return Ok(Some(child)),
                Some(Child::Stored(hash)) => hash,
            };
            let record = self.project.load_node(hash).await?;
            {
                let mut arena = self.arena();
                // Another load may have finished first; converge on its handle.
                if arena.get(node)?.children.get(relid) == Some(&Child::Stored(hash)) {
                    let child =
                        arena.insert(Entry::from_record(Some(node), Some(relid.to_string()), record));
                    arena
                        .get_mut(node)?
                        .children
                        .insert(relid.to_string(), Child::Loaded(child));
                    trace!(?node, relid, ?child, "loaded child");
                    return Ok(Some(child));
                }
            }
        }
    }

    async fn load_by_path(&self, node: Node, path: &NodePath) -> CoreResult<Option<Node>> {
        self.read(node, |_| ())?;
        let mut current = node;
        for relid in path.segments() {
            match self.load_child(current, relid).await? {
                Some(child) => current = child,
                None => return Ok(None),
            }
        }
        Ok(Some(current))
    }

    async fn load_children(&self, node: Node) -> CoreResult<Vec<Node>> {
        let mut children = Vec::new();
        for relid in self.get_child_relids(node)? {
            if let Some(child) = self.load_child(node, &relid).await? {
                children.push(child);
            }
        }
        Ok(children)
    }

    async fn load_pointer(&self, node: Node, name: &str) -> CoreResult<Option<Node>> {
        let (root, path) = {
            let arena = self.arena();
            (arena.root(node)?, arena.get(node)?.pointers.get(name).cloned())
        };
        match path {
            Some(path) => self.load_by_path(root, &path).await,
            None => Ok(None),
        }
    }

    async fn load_collection(&self, node: Node, name: &str) -> CoreResult<Vec<Node>> {
        let root = self.get_root(node)?;
        let mut sources = Vec::new();
        for path in self.get_collection_paths(node, name)? {
            if let Some(source) = self.load_by_path(root, &path).await? {
                sources.push(source);
            }
        }
        Ok(sources)
    }

    fn get_parent(&self, node: Node) -> CoreResult<Option<Node>> {
        self.read(node, |entry| entry.parent)
    }

    fn get_relid(&self, node: Node) -> CoreResult<Option<String>> {
        self.read(node, |entry| entry.relid.clone())
    }

    fn get_root(&self, node: Node) -> CoreResult<Node> {
        self.arena().root(node)
    }

    fn get_path(&self, node: Node) -> CoreResult<NodePath> {
        self.arena().path(node)
    }

    fn get_child_relids(&self, node: Node) -> CoreResult<Vec<String>> {
        self.read(node, |entry| entry.children.keys().cloned().collect())
    }

    async fn create_node(&self, params: NodeParams) -> CoreResult<Node> {
        let mut arena = self.arena();
        let Some(parent) = params.parent else {
            let node = arena.insert(Entry::new(None, None));
            debug!(?node, "created root");
            return Ok(node);
        };
        let relid = match params.relid {
            Some(relid) => {
                validate_relid(&relid)?;
                if arena.get(parent)?.children.contains_key(&relid) {
                    return Err(CoreError::Validation(format!(
                        "relid {relid:?} is already taken under {}",
                        arena.path(parent)?
                    )));
                }
                relid
            }
            None => arena.fresh_relid(parent)?,
        };
        let node = arena.insert(Entry::new(Some(parent), Some(relid.clone())));
        arena
            .get_mut(parent)?
            .children
            .insert(relid.clone(), Child::Loaded(node));
        trace!(?parent, relid, ?node, "created node");
        Ok(node)
    }

    async fn move_node(&self, node: Node, parent: Node) -> CoreResult<Node> {
        let mut arena = self.arena();
        let (old_parent, relid) = match arena.get(node)? {
            Entry {
                parent: Some(old_parent),
                relid: Some(relid),
                ..
            } => (*old_parent, relid.clone()),
            _ => return Err(CoreError::Validation("cannot move a root node".into())),
        };
        arena.get(parent)?;
        if arena.root(node)? != arena.root(parent)? {
            return Err(CoreError::Validation("cannot move a node into another tree".into()));
        }
        if arena.is_ancestor(node, parent)? {
            return Err(CoreError::Validation("cannot move a node under itself".into()));
        }
        if old_parent == parent {
            return Ok(node);
        }
        let new_relid = if arena.get(parent)?.children.contains_key(&relid) {
            arena.fresh_relid(parent)?
        } else {
            relid.clone()
        };
        arena.get_mut(old_parent)?.children.remove(&relid);
        arena
            .get_mut(parent)?
            .children
            .insert(new_relid.clone(), Child::Loaded(node));
        let entry = arena.get_mut(node)?;
        entry.parent = Some(parent);
        entry.relid = Some(new_relid);
        debug!(?node, ?parent, "moved node");
        Ok(node)
    }

    async fn copy_node(&self, node: Node, parent: Node) -> CoreResult<Node> {
        {
            let arena = self.arena();
            arena.get(parent)?;
            if arena.root(node)? != arena.root(parent)? {
                return Err(CoreError::Validation("cannot copy a node into another tree".into()));
            }
        }
        let order = self.load_subtree(node).await?;
        let (root, copy, edges) = {
            let mut arena = self.arena();
            let source_path = arena.path(node)?;
            let mut mapping: HashMap<Node, Node> = HashMap::new();
            for &old in &order {
                let mut entry = arena.get(old)?.clone();
                let (new_parent, relid) = if old == node {
                    (parent, arena.fresh_relid(parent)?)
                } else {
                    let new_parent = entry
                        .parent
                        .and_then(|p| mapping.get(&p).copied())
                        .ok_or(CoreError::InvalidNode(old))?;
                    (new_parent, entry.relid.clone().ok_or(CoreError::InvalidNode(old))?)
                };
                entry.parent = Some(new_parent);
                entry.relid = Some(relid.clone());
                entry.children.clear();
                entry.collections.clear();
                let new = arena.insert(entry);
                arena
                    .get_mut(new_parent)?
                    .children
                    .insert(relid, Child::Loaded(new));
                mapping.insert(old, new);
            }

            let copy = mapping[&node];
            let copy_path = arena.path(copy)?;
            let mut edges = Vec::new();
            for &new in mapping.values() {
                let source = arena.path(new)?;
                for (name, target) in arena.get_mut(new)?.pointers.iter_mut() {
                    // Pointers inside the copied subtree follow the copy.
                    if let Some(rebased) = target.rebase(&source_path, &copy_path) {
                        *target = rebased;
                    }
                    edges.push(Edge {
                        source: source.clone(),
                        name: name.clone(),
                        target: target.clone(),
                    });
                }
            }
            (arena.root(copy)?, copy, edges)
        };
        for edge in edges {
            self.link(root, edge).await?;
        }
        debug!(?node, ?parent, ?copy, nodes = order.len(), "copied node");
        Ok(copy)
    }

    async fn delete_node(&self, node: Node) -> CoreResult<()> {
        if self.get_parent(node)?.is_none() {
            return Err(CoreError::Validation("cannot delete a root node".into()));
        }
        let order = self.load_subtree(node).await?;
        let (root, deleted, outgoing, incoming) = {
            let mut arena = self.arena();
            let deleted = arena.path(node)?;
            let mut outgoing = Vec::new();
            let mut incoming = Vec::new();
            for &n in &order {
                let path = arena.path(n)?;
                let entry = arena.get(n)?;
                for (name, target) in &entry.pointers {
                    outgoing.push(Edge {
                        source: path.clone(),
                        name: name.clone(),
                        target: target.clone(),
                    });
                }
                for (name, sources) in &entry.collections {
                    for source in sources {
                        incoming.push(Edge {
                            source: source.clone(),
                            name: name.clone(),
                            target: path.clone(),
                        });
                    }
                }
            }
            let root = arena.root(node)?;
            let entry = arena.get(node)?;
            if let (Some(parent), Some(relid)) = (entry.parent, entry.relid.clone()) {
                arena.get_mut(parent)?.children.remove(&relid);
            }
            arena.kill(node);
            (root, deleted, outgoing, incoming)
        };

        for edge in outgoing.iter().filter(|e| !e.target.starts_with(&deleted)) {
            self.unlink(root, edge).await?;
        }
        // Pointers into the deleted subtree are removed from their sources.
        for edge in incoming.iter().filter(|e| !e.source.starts_with(&deleted)) {
            if let Some(source) = self.load_by_path(root, &edge.source).await? {
                self.write(source, |entry| {
                    if entry.pointers.get(&edge.name) == Some(&edge.target) {
                        entry.pointers.remove(&edge.name);
                    }
                })?;
            }
        }
        debug!(?node, path = %deleted, nodes = order.len(), "deleted node");
        Ok(())
    }

    fn get_attribute_names(&self, node: Node) -> CoreResult<Vec<String>> {
        self.read(node, |entry| entry.attributes.keys().cloned().collect())
    }

    fn get_attribute(&self, node: Node, name: &str) -> CoreResult<Option<Value>> {
        self.read(node, |entry| entry.attributes.get(name).cloned())
    }

    fn set_attribute(&self, node: Node, name: &str, value: Value) -> CoreResult<()> {
        self.write(node, |entry| {
            entry.attributes.insert(name.to_string(), value);
        })
    }

    fn del_attribute(&self, node: Node, name: &str) -> CoreResult<()> {
        self.write(node, |entry| {
            entry.attributes.remove(name);
        })
    }

    fn get_registry_names(&self, node: Node) -> CoreResult<Vec<String>> {
        self.read(node, |entry| entry.registry.keys().cloned().collect())
    }

    fn get_registry(&self, node: Node, name: &str) -> CoreResult<Option<Value>> {
        self.read(node, |entry| entry.registry.get(name).cloned())
    }

    fn set_registry(&self, node: Node, name: &str, value: Value) -> CoreResult<()> {
        self.write(node, |entry| {
            entry.registry.insert(name.to_string(), value);
        })
    }

    fn del_registry(&self, node: Node, name: &str) -> CoreResult<()> {
        self.write(node, |entry| {
            entry.registry.remove(name);
        })
    }

    fn get_pointer_names(&self, node: Node) -> CoreResult<Vec<String>> {
        self.read(node, |entry| entry.pointers.keys().cloned().collect())
    }

    fn get_pointer_path(&self, node: Node, name: &str) -> CoreResult<Option<NodePath>> {
        self.read(node, |entry| entry.pointers.get(name).cloned())
    }

    async fn set_pointer(&self, node: Node, name: &str, target: Option<Node>) -> CoreResult<()> {
        let target = target.ok_or_else(|| {
            CoreError::Validation(format!("pointer {name:?}: null targets are not supported by the tree layer"))
        })?;
        let (root, source, target_path, old) = {
            let arena = self.arena();
            let root = arena.root(node)?;
            if arena.root(target)? != root {
                return Err(CoreError::Validation(format!(
                    "pointer {name:?} must target a node of the same tree"
                )));
            }
            (
                root,
                arena.path(node)?,
                arena.path(target)?,
                arena.get(node)?.pointers.get(name).cloned(),
            )
        };
        if let Some(old) = old {
            self.unlink(
                root,
                &Edge {
                    source: source.clone(),
                    name: name.to_string(),
                    target: old,
                },
            )
            .await?;
        }
        let mut arena = self.arena();
        arena
            .get_mut(node)?
            .pointers
            .insert(name.to_string(), target_path);
        arena
            .get_mut(target)?
            .collections
            .entry(name.to_string())
            .or_default()
            .insert(source);
        Ok(())
    }

    async fn delete_pointer(&self, node: Node, name: &str) -> CoreResult<()> {
        let (root, source, old) = {
            let mut arena = self.arena();
            let root = arena.root(node)?;
            let source = arena.path(node)?;
            (root, source, arena.get_mut(node)?.pointers.remove(name))
        };
        if let Some(target) = old {
            self.unlink(
                root,
                &Edge {
                    source,
                    name: name.to_string(),
                    target,
                },
            )
            .await?;
        }
        Ok(())
    }

    fn get_collection_names(&self, node: Node) -> CoreResult<Vec<String>> {
        self.read(node, |entry| entry.collections.keys().cloned().collect())
    }

    fn get_collection_paths(&self, node: Node, name: &str) -> CoreResult<Vec<NodePath>> {
        self.read(node, |entry| {
            entry
                .collections
                .get(name)
                .map(|sources| sources.iter().cloned().collect())
                .unwrap_or_default()
        })
    }

    async fn persist(&self, node: Node) -> CoreResult<ObjectId> {
        let (id, objects) = {
            let arena = self.arena();
            let mut objects = Vec::new();
            let id = arena.encode(node, &mut objects)?;
            (id, objects)
        };
        for object in &objects {
            self.project.insert_object(object).await?;
        }
        debug!(?node, hash = %id.short_hex(), objects = objects.len(), "persisted subtree");
        Ok(id)
    }
}
