use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::TypeError;

/// Identity of a stored object: the BLAKE3 hash of its record.
///
/// Printed as 64 lowercase hex digits. Stored data from older tools writes
/// hashes as `#` followed by the hex digits; both forms parse.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId([u8; 32]);

impl ObjectId {
    /// Plain BLAKE3 of `data`, without a record context. Mostly for tests.
    pub fn from_bytes(data: &[u8]) -> Self {
        Self(*blake3::hash(data).as_bytes())
    }

    pub fn from_hash(hash: [u8; 32]) -> Self {
        Self(hash)
    }

    /// All zeros; never the id of a real object.
    pub const fn null() -> Self {
        Self([0u8; 32])
    }

    pub fn is_null(&self) -> bool {
        self.0.iter().all(|b| *b == 0)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// First 8 hex digits, for logs and listings.
    pub fn short_hex(&self) -> String {
        hex::encode(&self.0[..4])
    }

    pub fn from_hex(s: &str) -> Result<Self, TypeError> {
        decode_hex(s.strip_prefix('#').unwrap_or(s)).map(Self)
    }

    /// `prefix` must already be normalized with [`normalize_prefix`].
    pub fn matches_prefix(&self, prefix: &str) -> bool {
        self.to_hex().starts_with(prefix)
    }
}

/// Decode exactly `N` bytes of hex.
pub(crate) fn decode_hex<const N: usize>(s: &str) -> Result<[u8; N], TypeError> {
    let bytes = hex::decode(s).map_err(|e| TypeError::InvalidHex(e.to_string()))?;
    let actual = bytes.len();
    bytes.try_into().map_err(|_| TypeError::InvalidLength {
        expected: N,
        actual,
    })
}

/// Validate and normalize a hash-prefix query.
///
/// Accepts any string matching `^[#0-9a-zA-Z_]*$`. The leading `#` is
/// stripped and the remainder lowercased so it can be compared against
/// [`ObjectId::to_hex`].
pub fn normalize_prefix(prefix: &str) -> Result<String, TypeError> {
    if !prefix
        .chars()
        .all(|c| c == '#' || c == '_' || c.is_ascii_alphanumeric())
    {
        return Err(TypeError::InvalidPrefix(prefix.to_string()));
    }
    Ok(prefix.trim_start_matches('#').to_ascii_lowercase())
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectId({})", self.short_hex())
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for ObjectId {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl Serialize for ObjectId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ObjectId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}
