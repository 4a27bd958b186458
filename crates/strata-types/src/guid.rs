use std::fmt;
use std::ops::BitXor;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::TypeError;
use crate::object::decode_hex;

const GUID_LEN: usize = 16;
const CANONICAL_LEN: usize = 36;
const DASH_POSITIONS: [usize; 4] = [8, 13, 18, 23];

/// Globally unique node identifier.
///
/// A `Guid` is 128 bits held as a fixed-width byte array. Node identity is
/// stored relative to the parent: a node's absolute guid is the XOR of its
/// own relative guid with every ancestor's relative guid up to the root.
/// XOR is self-inverse, so re-rooting a node only touches its own and its
/// direct children's relative values.
///
/// Two textual forms exist:
/// - canonical: 36 characters, `xxxxxxxx-xxxx-xxxx-xxxx-xxxxxxxxxxxx`
/// - internal: 32 hex characters without dashes (the `_relguid` attribute)
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Guid([u8; GUID_LEN]);

impl Guid {
    /// A fresh random guid.
    pub fn random() -> Self {
        Self(*uuid::Uuid::new_v4().as_bytes())
    }

    /// The all-zero guid, the XOR identity.
    pub const fn nil() -> Self {
        Self([0u8; GUID_LEN])
    }

    pub const fn from_bytes(bytes: [u8; GUID_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; GUID_LEN] {
        &self.0
    }

    /// Returns `true` if `s` is a well-formed canonical guid.
    pub fn is_canonical(s: &str) -> bool {
        s.len() == CANONICAL_LEN
            && s.char_indices().all(|(i, c)| {
                if DASH_POSITIONS.contains(&i) {
                    c == '-'
                } else {
                    c.is_ascii_hexdigit()
                }
            })
    }

    /// Parse the canonical dashed form. Hex digits may be in either case.
    pub fn parse(s: &str) -> Result<Self, TypeError> {
        if !Self::is_canonical(s) {
            return Err(TypeError::InvalidGuid(s.to_string()));
        }
        Self::from_internal(&s.replace('-', ""))
            .map_err(|_| TypeError::InvalidGuid(s.to_string()))
    }

    /// Parse the internal 32-hex-digit form.
    pub fn from_internal(s: &str) -> Result<Self, TypeError> {
        decode_hex::<GUID_LEN>(s).map(Self)
    }

    /// The internal form: 32 lowercase hex digits.
    pub fn to_internal(&self) -> String {
        hex::encode(self.0)
    }

    /// The canonical dashed form.
    pub fn to_canonical(&self) -> String {
        uuid::Uuid::from_bytes(self.0).hyphenated().to_string()
    }
}

impl BitXor for Guid {
    type Output = Guid;

    fn bitxor(self, rhs: Guid) -> Guid {
        let mut out = [0u8; GUID_LEN];
        for (o, (a, b)) in out.iter_mut().zip(self.0.iter().zip(rhs.0.iter())) {
            *o = a ^ b;
        }
        Guid(out)
    }
}

impl fmt::Debug for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Guid({})", self.to_canonical())
    }
}

impl fmt::Display for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_canonical())
    }
}

impl FromStr for Guid {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for Guid {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_canonical())
    }
}

impl<'de> Deserialize<'de> for Guid {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}
