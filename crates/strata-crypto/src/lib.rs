//! Content hashing for Strata.
//!
//! Every stored object is keyed by a BLAKE3 hash of its serialized record,
//! derived under a context string specific to the record kind.

pub mod hasher;

pub use hasher::ContentHasher;
