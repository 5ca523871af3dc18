//! Content-addressed archive on the local filesystem
//!
//! Blobs live at `<root>/<first two hex digits>/<full hex>`. Every read is
//! verified against the fingerprint it was requested under; a blob that no
//! longer matches is reported the same way as a missing one.

use loadout_fs::{NormalizedPath, io};
use std::fs;
use std::path::Path;

use crate::model::Fingerprint;
use crate::providers::ContentArchive;
use crate::{Error, Result};

/// A directory of blobs keyed by content hash.
#[derive(Debug, Clone)]
pub struct FsArchive {
    root: NormalizedPath,
}

impl FsArchive {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: NormalizedPath::new(root),
        }
    }

    pub fn root(&self) -> &NormalizedPath {
        &self.root
    }

    /// Where the blob for `fingerprint` is (or would be) stored.
    pub fn blob_path(&self, fingerprint: &Fingerprint) -> NormalizedPath {
        let hex = fingerprint.hash.to_hex();
        self.root.join(&hex[..2]).join(&hex)
    }
}

impl ContentArchive for FsArchive {
    fn have_file(&self, fingerprint: &Fingerprint) -> Result<bool> {
        let blob = self.blob_path(fingerprint);
        match fs::metadata(blob.to_native()) {
            Ok(metadata) => Ok(metadata.is_file() && metadata.len() == fingerprint.size),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(loadout_fs::Error::io(blob.to_native(), e).into()),
        }
    }

    fn read(&self, fingerprint: &Fingerprint) -> Result<Vec<u8>> {
        let blob = self.blob_path(fingerprint);
        let content = io::read_bytes(&blob).map_err(|e| Error::ArchiveMissing {
            fingerprint: *fingerprint,
            message: e.to_string(),
        })?;

        let actual = Fingerprint::of(&content);
        if actual != *fingerprint {
            return Err(Error::ArchiveMissing {
                fingerprint: *fingerprint,
                message: format!("stored blob hashes to {actual}"),
            });
        }
        Ok(content)
    }

    fn write(&self, fingerprint: &Fingerprint, content: &[u8]) -> Result<()> {
        if self.have_file(fingerprint)? {
            tracing::debug!(fingerprint = %fingerprint, "Archive already holds content");
            return Ok(());
        }
        io::write_atomic(&self.blob_path(fingerprint), content)?;
        tracing::debug!(fingerprint = %fingerprint, "Archived content");
        Ok(())
    }
}
