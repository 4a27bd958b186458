use strata_types::ObjectId;

/// BLAKE3 in key-derivation mode, one context string per record kind.
///
/// A node record and a commit record with identical bytes therefore never
/// share an id.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ContentHasher {
    context: &'static str,
}

impl ContentHasher {
    pub const NODE: Self = Self {
        context: "strata model node record v1",
    };
    pub const COMMIT: Self = Self {
        context: "strata model commit record v1",
    };

    pub fn hash(&self, data: &[u8]) -> ObjectId {
        let mut hasher = blake3::Hasher::new_derive_key(self.context);
        hasher.update(data);
        ObjectId::from_hash(*hasher.finalize().as_bytes())
    }

    /// `true` if `data` hashes to `expected` in this context.
    pub fn verify(&self, data: &[u8], expected: &ObjectId) -> bool {
        self.hash(data) == *expected
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_bytes_same_id() {
        let data = br#"{"attributes":{}}"#;
        assert_eq!(ContentHasher::NODE.hash(data), ContentHasher::NODE.hash(data));
    }

    #[test]
    fn record_kinds_are_separated() {
        let data = b"same content";
        assert_ne!(ContentHasher::NODE.hash(data), ContentHasher::COMMIT.hash(data));
    }

    #[test]
    fn context_is_not_plain_blake3() {
        let data = b"payload";
        let plain = ObjectId::from_hash(*blake3::hash(data).as_bytes());
        assert_ne!(ContentHasher::NODE.hash(data), plain);
    }

    #[test]
    fn verify_rejects_other_content() {
        let id = ContentHasher::COMMIT.hash(b"first");
        assert!(ContentHasher::COMMIT.verify(b"first", &id));
        assert!(!ContentHasher::COMMIT.verify(b"second", &id));
        assert!(!ContentHasher::NODE.verify(b"first", &id));
    }
}
