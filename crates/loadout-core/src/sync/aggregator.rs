//! Gathers the three channels for a path

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use crate::model::{Fingerprint, GamePath};
use crate::providers::{ContentArchive, FingerprintSource, LoadoutProvider};
use crate::{Error, Result};

use super::node::SyncNode;

/// Looks a path up in every provider and the archive.
///
/// Pure lookups: a path missing from a provider is `None`, not an error.
/// Archive answers are memoized for the lifetime of the aggregator since
/// many paths share content.
pub struct StateAggregator<'a> {
    disk: &'a dyn FingerprintSource,
    previous: &'a dyn FingerprintSource,
    loadout: &'a dyn LoadoutProvider,
    archive: &'a dyn ContentArchive,
    archived: Mutex<HashMap<Fingerprint, bool>>,
}

impl<'a> StateAggregator<'a> {
    pub fn new(
        disk: &'a dyn FingerprintSource,
        previous: &'a dyn FingerprintSource,
        loadout: &'a dyn LoadoutProvider,
        archive: &'a dyn ContentArchive,
    ) -> Self {
        Self {
            disk,
            previous,
            loadout,
            archive,
            archived: Mutex::new(HashMap::new()),
        }
    }

    /// Every path known to any of the three channels, deduplicated and sorted.
    pub fn paths(&self) -> Result<Vec<GamePath>> {
        let mut paths = self.disk.paths().map_err(provider("disk"))?;
        paths.extend(self.previous.paths().map_err(provider("previous"))?);
        paths.extend(self.loadout.paths().map_err(provider("loadout"))?);
        paths.sort();
        paths.dedup();
        Ok(paths)
    }

    pub fn aggregate(&self, path: &GamePath) -> Result<SyncNode> {
        let disk = self.disk.fingerprint(path).map_err(provider("disk"))?;
        let previous = self.previous.fingerprint(path).map_err(provider("previous"))?;
        let loadout = self
            .loadout
            .entry(path)
            .map_err(provider("loadout"))?
            .and_then(|entry| entry.fingerprint());
        let ignored = self.loadout.is_ignored(path).map_err(provider("loadout"))?;

        let archived = [
            self.is_archived(disk.as_ref())?,
            self.is_archived(previous.as_ref())?,
            self.is_archived(loadout.as_ref())?,
        ];

        Ok(SyncNode::new(path.clone(), disk, previous, loadout, archived, ignored))
    }

    fn is_archived(&self, fingerprint: Option<&Fingerprint>) -> Result<bool> {
        let Some(fingerprint) = fingerprint else {
            return Ok(false);
        };
        if let Some(known) = self
            .archived
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(fingerprint)
        {
            return Ok(*known);
        }

        let have = self.archive.have_file(fingerprint).map_err(provider("archive"))?;
        self.archived
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(*fingerprint, have);
        Ok(have)
    }
}

fn provider(source_name: &'static str) -> impl Fn(Error) -> Error {
    move |e| match e {
        // Already attributed
        Error::Provider { .. } => e,
        other => Error::Provider {
            source_name,
            message: other.to_string(),
        },
    }
}
