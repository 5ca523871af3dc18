//! SHA-256 content digests
//!
//! Provides a single canonical checksum format (`sha256:<hex>`) used throughout
//! the workspace for content identity and integrity verification.

use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::{Error, Result};

/// Prefix for all checksums produced by this module
pub const PREFIX: &str = "sha256:";

/// Digest and length of a piece of content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentDigest {
    pub hash: [u8; 32],
    pub size: u64,
}

impl ContentDigest {
    /// Render the hash in the canonical `sha256:<hex>` format.
    pub fn to_prefixed_hex(&self) -> String {
        format!("{}{}", PREFIX, hex::encode(self.hash))
    }
}

/// Parse a `sha256:<hex>` string (the prefix is optional) into raw hash bytes.
pub fn parse_prefixed_hex(value: &str) -> Option<[u8; 32]> {
    let digits = value.strip_prefix(PREFIX).unwrap_or(value);
    let mut out = [0u8; 32];
    hex::decode_to_slice(digits, &mut out).ok()?;
    Some(out)
}

/// Compute the digest of in-memory content.
pub fn digest_bytes(content: &[u8]) -> ContentDigest {
    let mut hasher = Sha256::new();
    hasher.update(content);
    ContentDigest {
        hash: finish(hasher),
        size: content.len() as u64,
    }
}

/// Compute the digest of a file's contents without loading it whole.
///
/// # Errors
///
/// Returns an error if the file cannot be opened or read.
pub fn digest_file(path: &Path) -> Result<ContentDigest> {
    let file = File::open(path).map_err(|e| Error::io(path, e))?;
    let mut reader = BufReader::new(file);
    let mut hasher = Sha256::new();
    let size = std::io::copy(&mut reader, &mut hasher).map_err(|e| Error::io(path, e))?;
    Ok(ContentDigest {
        hash: finish(hasher),
        size,
    })
}

fn finish(hasher: Sha256) -> [u8; 32] {
    let mut hash = [0u8; 32];
    hash.copy_from_slice(&hasher.finalize());
    hash
}
