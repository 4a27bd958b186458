//! The [`BranchStore`] trait defining the branch storage interface.

use strata_types::ObjectId;
use tokio::sync::watch;

use crate::error::Result;

/// Head of a branch as observed by a reader, relative to the head the
/// reader assumed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BranchHead {
    /// Current commit, or `None` if the branch does not exist.
    pub hash: Option<ObjectId>,
    /// `true` if `hash` differs from the head the reader assumed, i.e.
    /// someone else advanced (or created) the branch.
    pub forked: bool,
}

/// Storage backend for branch heads.
///
/// Implementations must be thread-safe (`Send + Sync`). Every write is a
/// compare-and-swap: it succeeds only if the stored head still equals the
/// expected value at the moment of the write.
pub trait BranchStore: Send + Sync {
    /// Read the head of a branch. Returns `Ok(None)` if it does not exist.
    fn get(&self, name: &str) -> Result<Option<ObjectId>>;

    /// Atomically replace the head of `name` with `new` if it currently
    /// equals `expected`. `expected = None` means the branch must not exist
    /// yet; a successful swap then creates it.
    fn compare_and_swap(&self, name: &str, expected: Option<ObjectId>, new: ObjectId)
        -> Result<()>;

    /// All branches and their heads, sorted by name.
    fn list(&self) -> Result<Vec<(String, ObjectId)>>;

    /// Subscribe to head changes. The value is a counter bumped on every
    /// successful swap; receivers use it only as a wake-up signal.
    fn subscribe(&self) -> watch::Receiver<u64>;

    /// All branch names, sorted.
    fn names(&self) -> Result<Vec<String>> {
        Ok(self.list()?.into_iter().map(|(name, _)| name).collect())
    }

    /// Read the head of `name` and compare it with the head the caller
    /// assumed.
    fn head(&self, name: &str, assumed: Option<ObjectId>) -> Result<BranchHead> {
        let hash = self.get(name)?;
        Ok(BranchHead {
            hash,
            forked: hash != assumed,
        })
    }
}
