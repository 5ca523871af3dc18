//! The action bit-set produced by the resolver

use serde::{Serialize, Serializer};
use std::fmt;
use std::ops::{BitOr, BitOrAssign};

/// A set of synchronization actions for one path.
///
/// Flags are declared in execution order: when a node carries several, the
/// executor runs them lowest bit first.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Actions(u16);

impl Actions {
    pub const NONE: Self = Self(0);
    /// The path is already synchronized.
    pub const DO_NOTHING: Self = Self(1 << 0);
    /// Copy the current disk content into the archive.
    pub const BACKUP_FILE: Self = Self(1 << 1);
    /// Adopt the disk content into the loadout.
    pub const INGEST_FROM_DISK: Self = Self(1 << 2);
    /// Remove the file from disk.
    pub const DELETE_FROM_DISK: Self = Self(1 << 3);
    /// Materialize the loadout's content from the archive.
    pub const EXTRACT_TO_DISK: Self = Self(1 << 4);
    /// Record an explicit tombstone in the loadout.
    pub const ADD_REIFIED_DELETE: Self = Self(1 << 5);
    /// The loadout wants content the archive does not hold.
    pub const WARN_OF_UNABLE_TO_EXTRACT: Self = Self(1 << 6);
    /// Disk and loadout changed independently.
    pub const WARN_OF_CONFLICT: Self = Self(1 << 7);

    const NAMED: [(Actions, &'static str); 8] = [
        (Self::DO_NOTHING, "DoNothing"),
        (Self::BACKUP_FILE, "BackupFile"),
        (Self::INGEST_FROM_DISK, "IngestFromDisk"),
        (Self::DELETE_FROM_DISK, "DeleteFromDisk"),
        (Self::EXTRACT_TO_DISK, "ExtractToDisk"),
        (Self::ADD_REIFIED_DELETE, "AddReifiedDelete"),
        (Self::WARN_OF_UNABLE_TO_EXTRACT, "WarnOfUnableToExtract"),
        (Self::WARN_OF_CONFLICT, "WarnOfConflict"),
    ];

    pub const fn bits(self) -> u16 {
        self.0
    }

    /// The single flag at bit position `bit`, if one is defined there.
    pub fn from_bit(bit: usize) -> Option<Self> {
        Self::NAMED.get(bit).map(|(flag, _)| *flag)
    }

    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Outcomes that must never be combined with any other flag.
    pub const fn is_singleton_outcome(self) -> bool {
        self.0 == Self::DO_NOTHING.0
            || self.0 == Self::WARN_OF_CONFLICT.0
            || self.0 == Self::WARN_OF_UNABLE_TO_EXTRACT.0
    }

    /// Whether the set only asks for a warning to be surfaced.
    pub const fn is_warning(self) -> bool {
        self.0 == Self::WARN_OF_CONFLICT.0 || self.0 == Self::WARN_OF_UNABLE_TO_EXTRACT.0
    }

    /// Whether the set changes disk, archive or loadout.
    pub const fn mutates(self) -> bool {
        self.intersects(
            Self::BACKUP_FILE
                .union(Self::INGEST_FROM_DISK)
                .union(Self::DELETE_FROM_DISK)
                .union(Self::EXTRACT_TO_DISK)
                .union(Self::ADD_REIFIED_DELETE),
        )
    }

    /// The individual flags in execution order.
    pub fn iter(self) -> impl Iterator<Item = Actions> {
        Self::NAMED
            .into_iter()
            .map(|(flag, _)| flag)
            .filter(move |flag| self.contains(*flag))
    }

    /// Name of a single flag; `None` for empty or combined sets.
    pub fn name(self) -> Option<&'static str> {
        Self::NAMED
            .iter()
            .find(|(flag, _)| *flag == self)
            .map(|(_, name)| *name)
    }
}

impl BitOr for Actions {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

impl BitOrAssign for Actions {
    fn bitor_assign(&mut self, rhs: Self) {
        *self = self.union(rhs);
    }
}

impl fmt::Display for Actions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("(none)");
        }
        let mut first = true;
        for (flag, name) in Self::NAMED {
            if self.contains(flag) {
                if !first {
                    f.write_str(" | ")?;
                }
                f.write_str(name)?;
                first = false;
            }
        }
        Ok(())
    }
}

impl fmt::Debug for Actions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Actions({})", self)
    }
}

impl Serialize for Actions {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.iter().filter_map(Actions::name))
    }
}
