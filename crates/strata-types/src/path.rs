use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::TypeError;

/// Validate a relid (the name of a child under its parent).
///
/// A relid must be non-empty and must not contain `/`.
pub fn validate_relid(relid: &str) -> Result<(), TypeError> {
    if relid.is_empty() || relid.contains('/') {
        return Err(TypeError::InvalidRelid(relid.to_string()));
    }
    Ok(())
}

/// Path from a tree root to a node, as a sequence of relids.
///
/// The root's path is empty and prints as `""`; every other path prints
/// as `/relid/relid/...`. Pointers are persisted as paths, so a path is
/// only meaningful relative to the root it was taken from.
#[derive(Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodePath(Vec<String>);

impl NodePath {
    /// The root path.
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// Build a path from relids, validating each one.
    pub fn from_relids<I, S>(relids: I) -> Result<Self, TypeError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut segments = Vec::new();
        for relid in relids {
            let relid = relid.into();
            validate_relid(&relid)?;
            segments.push(relid);
        }
        Ok(Self(segments))
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The last relid, or `None` for the root path.
    pub fn relid(&self) -> Option<&str> {
        self.0.last().map(String::as_str)
    }

    /// The parent path, or `None` for the root path.
    pub fn parent(&self) -> Option<NodePath> {
        if self.0.is_empty() {
            None
        } else {
            Some(Self(self.0[..self.0.len() - 1].to_vec()))
        }
    }

    /// This path extended by one relid.
    pub fn child(&self, relid: impl Into<String>) -> NodePath {
        let mut segments = self.0.clone();
        segments.push(relid.into());
        Self(segments)
    }

    /// Returns `true` if `self` equals `prefix` or lies underneath it.
    pub fn starts_with(&self, prefix: &NodePath) -> bool {
        self.0.starts_with(&prefix.0)
    }

    /// Returns `true` if any segment of the path equals `relid`.
    pub fn passes_through(&self, relid: &str) -> bool {
        self.0.iter().any(|s| s == relid)
    }

    /// Replace the leading `from` prefix with `to`. Returns `None` if the
    /// path does not start with `from`.
    pub fn rebase(&self, from: &NodePath, to: &NodePath) -> Option<NodePath> {
        if !self.starts_with(from) {
            return None;
        }
        let mut segments = to.0.clone();
        segments.extend_from_slice(&self.0[from.0.len()..]);
        Some(Self(segments))
    }
}

impl fmt::Debug for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodePath({self})")
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for segment in &self.0 {
            write!(f, "/{segment}")?;
        }
        Ok(())
    }
}

impl FromStr for NodePath {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_relids(s.split('/').filter(|seg| !seg.is_empty()))
    }
}

impl Serialize for NodePath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for NodePath {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
