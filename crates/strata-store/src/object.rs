use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use strata_crypto::ContentHasher;
use strata_types::{NodePath, ObjectId};

use crate::error::{StoreError, StoreResult};

/// The kind of object stored.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectKind {
    /// One node of a model tree.
    Node,
    /// A commit in a project's history.
    Commit,
}

impl ObjectKind {
    fn hasher(self) -> &'static ContentHasher {
        match self {
            Self::Node => &ContentHasher::NODE,
            Self::Commit => &ContentHasher::COMMIT,
        }
    }
}

impl std::fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Node => write!(f, "node"),
            Self::Commit => write!(f, "commit"),
        }
    }
}

/// A stored object: declared identity, kind tag and serialized data.
///
/// `StoredObject` is the unit of storage. The identity is declared by the
/// producer; stores verify it against the content before accepting it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredObject {
    /// The content-addressed identity this object is stored under.
    pub id: ObjectId,
    /// The type of this object.
    pub kind: ObjectKind,
    /// The serialized bytes of the object (JSON).
    pub data: Vec<u8>,
}

impl StoredObject {
    /// Create a stored object whose identity is computed from its content.
    pub fn new(kind: ObjectKind, data: Vec<u8>) -> Self {
        let id = kind.hasher().hash(&data);
        Self { id, kind, data }
    }

    /// Create a stored object under a caller-declared identity.
    ///
    /// The identity is not checked here; [`StoredObject::verify`] or a
    /// store write does that.
    pub fn with_declared_id(id: ObjectId, kind: ObjectKind, data: Vec<u8>) -> Self {
        Self { id, kind, data }
    }

    /// Compute the content-addressed ID for this object.
    pub fn compute_id(&self) -> ObjectId {
        self.kind.hasher().hash(&self.data)
    }

    /// Returns `true` if the declared ID matches the content.
    pub fn verify(&self) -> bool {
        self.kind.hasher().verify(&self.data, &self.id)
    }

    /// Size of the serialized data in bytes.
    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }

    /// Decode the data as a generic JSON value (for dumps and diagnostics).
    pub fn to_json(&self) -> StoreResult<Value> {
        serde_json::from_slice(&self.data).map_err(|e| StoreError::CorruptObject {
            id: self.id,
            reason: e.to_string(),
        })
    }

    fn decode<T: serde::de::DeserializeOwned>(&self, expected: ObjectKind) -> StoreResult<T> {
        if self.kind != expected {
            return Err(StoreError::CorruptObject {
                id: self.id,
                reason: format!("expected {expected}, got {}", self.kind),
            });
        }
        serde_json::from_slice(&self.data).map_err(|e| StoreError::CorruptObject {
            id: self.id,
            reason: e.to_string(),
        })
    }
}

fn encode<T: Serialize>(kind: ObjectKind, value: &T) -> StoreResult<StoredObject> {
    let data = serde_json::to_vec(value).map_err(|e| StoreError::Serialization(e.to_string()))?;
    Ok(StoredObject::new(kind, data))
}

// ---------------------------------------------------------------------------
// NodeRecord
// ---------------------------------------------------------------------------

/// Target of a persisted pointer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointerRecord {
    /// Absolute path of the target, taken from the tree root.
    pub to: NodePath,
}

/// Persisted form of one node.
///
/// Children are referenced by hash, so unchanged subtrees are shared
/// between commits. All maps are ordered, which makes the serialized bytes
/// (and therefore the hash) deterministic.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRecord {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub registry: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub pointers: BTreeMap<String, PointerRecord>,
    /// Inverse pointers: pointer name -> paths of the nodes pointing here.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub collections: BTreeMap<String, BTreeSet<NodePath>>,
    /// Child relid -> hash of the child's record.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub children: BTreeMap<String, ObjectId>,
}

impl NodeRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Convert into a `StoredObject` for storage.
    pub fn to_stored_object(&self) -> StoreResult<StoredObject> {
        encode(ObjectKind::Node, self)
    }

    /// Decode from a `StoredObject`.
    pub fn from_stored_object(obj: &StoredObject) -> StoreResult<Self> {
        obj.decode(ObjectKind::Node)
    }
}

// ---------------------------------------------------------------------------
// CommitRecord
// ---------------------------------------------------------------------------

/// An immutable commit: parents, root snapshot hash, time and message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitRecord {
    pub parents: Vec<ObjectId>,
    pub root: ObjectId,
    /// Milliseconds since the UNIX epoch.
    pub time: i64,
    pub message: String,
}

impl CommitRecord {
    pub fn new(parents: Vec<ObjectId>, root: ObjectId, message: impl Into<String>, time: i64) -> Self {
        Self {
            parents,
            root,
            time,
            message: message.into(),
        }
    }

    /// Returns `true` if this commit has no parents.
    pub fn is_initial(&self) -> bool {
        self.parents.is_empty()
    }

    /// Convert into a `StoredObject` for storage.
    pub fn to_stored_object(&self) -> StoreResult<StoredObject> {
        encode(ObjectKind::Commit, self)
    }

    /// Decode from a `StoredObject`.
    pub fn from_stored_object(obj: &StoredObject) -> StoreResult<Self> {
        obj.decode(ObjectKind::Commit)
    }
}
