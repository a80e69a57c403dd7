use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Digest width of a key, in bytes.
pub const KEY_LEN: usize = 32;

/// The identity of a stored value.
///
/// Keys are never assigned, they are computed: BLAKE3 over a value's
/// bytes. Two parties holding the same bytes therefore agree on the name
/// without coordinating, which is what the rest of the system leans on —
/// the value store deduplicates by key, sync compares histories by key,
/// and the wire codec canonicalizes sets using the bytewise total order
/// defined here.
///
/// Formatting goes through [`Display`]: the full lowercase hex digest,
/// with `{:.8}`-style precision yielding the shortened form used in log
/// lines. Parsing is the reverse, via [`FromStr`].
///
/// [`Display`]: std::fmt::Display
/// [`FromStr`]: std::str::FromStr
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Key([u8; KEY_LEN]);

impl Key {
    /// Name a value by hashing its bytes.
    pub fn of_bytes(data: &[u8]) -> Self {
        Self(*blake3::hash(data).as_bytes())
    }

    /// Adopt an already-computed digest.
    pub const fn from_hash(digest: [u8; KEY_LEN]) -> Self {
        Self(digest)
    }

    /// The raw digest.
    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }

    /// The first eight hex digits, the form log lines use.
    pub fn short_hex(&self) -> String {
        format!("{self:.8}")
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // pad() honors width and precision, so "{key:.8}" prints a prefix.
        f.pad(&hex::encode(self.0))
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Key({self:.8}..)")
    }
}

impl FromStr for Key {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, TypeError> {
        if s.len() != KEY_LEN * 2 {
            return Err(TypeError::InvalidLength {
                expected: KEY_LEN * 2,
                actual: s.len(),
            });
        }
        let mut digest = [0u8; KEY_LEN];
        hex::decode_to_slice(s, &mut digest).map_err(|e| TypeError::InvalidHex(e.to_string()))?;
        Ok(Self(digest))
    }
}
