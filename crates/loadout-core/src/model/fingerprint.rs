//! Content identity

use loadout_fs::ContentDigest;
use loadout_fs::checksum::parse_prefixed_hex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// SHA-256 hash of a file's content.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ContentHash([u8; 32]);

impl ContentHash {
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Lowercase hex without the `sha256:` prefix.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse `sha256:<hex>` (prefix optional).
    pub fn parse(value: &str) -> Option<Self> {
        parse_prefixed_hex(value).map(Self)
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", loadout_fs::checksum::PREFIX, self.to_hex())
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Twelve digits are plenty to tell hashes apart in logs
        write!(f, "ContentHash({})", &self.to_hex()[..12])
    }
}

impl Serialize for ContentHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for ContentHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid content hash `{raw}`")))
    }
}

/// Identity of a file's content: hash plus size.
///
/// Two fingerprints are equal iff both fields match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Fingerprint {
    pub hash: ContentHash,
    pub size: u64,
}

impl Fingerprint {
    pub fn new(hash: ContentHash, size: u64) -> Self {
        Self { hash, size }
    }

    /// Fingerprint of in-memory content.
    pub fn of(content: &[u8]) -> Self {
        loadout_fs::digest_bytes(content).into()
    }
}

impl From<ContentDigest> for Fingerprint {
    fn from(digest: ContentDigest) -> Self {
        Self {
            hash: ContentHash(digest.hash),
            size: digest.size,
        }
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} bytes)", self.hash, self.size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_content_equal_fingerprint() {
        assert_eq!(Fingerprint::of(b"abc"), Fingerprint::of(b"abc"));
        assert_ne!(Fingerprint::of(b"abc"), Fingerprint::of(b"abd"));
    }

    #[test]
    fn same_hash_different_size_differs() {
        let base = Fingerprint::of(b"abc");
        let resized = Fingerprint::new(base.hash, base.size + 1);
        assert_ne!(base, resized);
    }

    #[test]
    fn hash_serializes_with_prefix() {
        let fingerprint = Fingerprint::of(b"hello world");
        let json = serde_json::to_string(&fingerprint).unwrap();
        assert!(json.contains("sha256:b94d27b9934d3e08"));

        let back: Fingerprint = serde_json::from_str(&json).unwrap();
        assert_eq!(back, fingerprint);
    }
}
