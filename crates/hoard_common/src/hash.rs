//! Content hashing for cache keys and target fingerprints.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

/// A 256-bit content hash computed using SHA-256.
///
/// Two inputs with the same `ContentHash` are assumed to be identical. Used as
/// the fingerprint of every cacheable target and as the directory name of its
/// artifacts in the local cache, so the textual form (64 lowercase hex
/// characters) is part of the on-disk contract.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ContentHash([u8; 32]);

/// Error returned when parsing a [`ContentHash`] from its hex form fails.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid content hash '{input}': expected 64 hex characters")]
pub struct ParseContentHashError {
    /// The rejected input.
    pub input: String,
}

impl ContentHash {
    /// Length of the hex representation.
    pub const HEX_LEN: usize = 64;

    /// Computes a content hash from a byte slice.
    pub fn from_bytes(data: &[u8]) -> Self {
        Self(Sha256::digest(data).into())
    }

    /// Computes a content hash of a UTF-8 string.
    pub fn from_str_content(data: &str) -> Self {
        Self::from_bytes(data.as_bytes())
    }

    /// Returns the raw digest bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Returns the lowercase hex form.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl FromStr for ContentHash {
    type Err = ParseContentHashError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseContentHashError {
            input: s.to_string(),
        };
        if s.len() != Self::HEX_LEN {
            return Err(err());
        }
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(s, &mut bytes).map_err(|_| err())?;
        Ok(Self(bytes))
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ContentHash({:02x}{:02x}{:02x}{:02x}..)",
            self.0[0], self.0[1], self.0[2], self.0[3]
        )
    }
}

impl Serialize for ContentHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ContentHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
