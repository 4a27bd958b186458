use std::fmt;

/// Handle to one loaded node.
///
/// Handles are indices into the arena of the core that produced them and
/// are never reused, so a handle to a deleted node stays invalid instead of
/// aliasing a newer node.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Node(pub(crate) usize);

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Node#{}", self.0)
    }
}

/// Arguments of `create_node`. Each layer consumes the fields it knows:
/// the tree uses `parent` and `relid`, inheritance uses `base`, identity
/// uses `guid`.
#[derive(Clone, Debug, Default)]
pub struct NodeParams {
    /// `None` creates a new, empty root.
    pub parent: Option<Node>,
    pub base: Option<Node>,
    /// Requested relid; a random unused one is chosen when omitted.
    pub relid: Option<String>,
    /// Canonical guid text; a random guid is generated when omitted.
    pub guid: Option<String>,
}

impl NodeParams {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn child_of(parent: Node) -> Self {
        Self {
            parent: Some(parent),
            ..Self::default()
        }
    }

    pub fn base(mut self, base: Node) -> Self {
        self.base = Some(base);
        self
    }

    pub fn relid(mut self, relid: impl Into<String>) -> Self {
        self.relid = Some(relid.into());
        self
    }

    pub fn guid(mut self, guid: impl Into<String>) -> Self {
        self.guid = Some(guid.into());
        self
    }
}
