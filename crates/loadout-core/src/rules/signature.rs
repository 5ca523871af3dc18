//! Canonical, hash-free classification of a path's three-way state
//!
//! A signature records which of the Disk, Previous and Loadout channels hold
//! a value, which of those values are equal to each other, which are
//! retrievable from the archive, and whether the path is ignored. Hash
//! values themselves never make it in: the resolver only cares about
//! equality relationships.
//!
//! The shorthand form is `DPL_dpl_i`:
//!
//! - `DPL` are the Disk, Previous and Loadout slots. `x` means the channel
//!   has no value, `A`, `B`, `C` name distinct values in first-seen order,
//!   so `AAB` means disk and previous agree and the loadout differs.
//! - `dpl` are the archive flags for the same channels, `X` when the
//!   channel's content is archived.
//! - `i` is `I` when the path is ignored.

use serde::{Serialize, Serializer};
use std::fmt;

/// One channel's value class within a signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Slot {
    Absent = 0,
    A = 1,
    B = 2,
    C = 3,
}

impl Slot {
    const SYMBOLS: [Slot; 3] = [Slot::A, Slot::B, Slot::C];

    pub const fn is_present(self) -> bool {
        !matches!(self, Slot::Absent)
    }

    const fn symbol(self) -> char {
        match self {
            Slot::Absent => 'x',
            Slot::A => 'A',
            Slot::B => 'B',
            Slot::C => 'C',
        }
    }

    const fn from_symbol(symbol: u8) -> Slot {
        match symbol {
            b'x' => Slot::Absent,
            b'A' => Slot::A,
            b'B' => Slot::B,
            b'C' => Slot::C,
            _ => panic!("signature slot must be one of x, A, B, C"),
        }
    }
}

/// The canonical classification of a sync node.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Signature {
    disk: Slot,
    previous: Slot,
    loadout: Slot,
    disk_archived: bool,
    previous_archived: bool,
    loadout_archived: bool,
    ignored: bool,
}

impl Signature {
    /// Number of distinct keys produced by [`Signature::key`].
    pub const KEY_SPACE: usize = 1 << 10;

    /// Classify three optional values.
    ///
    /// `archived[i]` is only honoured when slot `i` holds a value. Values are
    /// compared with `==` only; nothing about them leaks into the result.
    pub fn classify<T: PartialEq>(values: [Option<&T>; 3], archived: [bool; 3], ignored: bool) -> Self {
        let mut seen: Vec<&T> = Vec::with_capacity(3);
        let mut slots = [Slot::Absent; 3];

        for (slot, value) in slots.iter_mut().zip(values) {
            let Some(value) = value else { continue };
            let index = match seen.iter().position(|known| *known == value) {
                Some(index) => index,
                None => {
                    seen.push(value);
                    seen.len() - 1
                }
            };
            *slot = Slot::SYMBOLS[index];
        }

        Self {
            disk: slots[0],
            previous: slots[1],
            loadout: slots[2],
            disk_archived: slots[0].is_present() && archived[0],
            previous_archived: slots[1].is_present() && archived[1],
            loadout_archived: slots[2].is_present() && archived[2],
            ignored,
        }
    }

    /// Parse the `DPL_dpl_i` shorthand.
    ///
    /// Usable in const context, where a malformed or unreachable shorthand
    /// fails compilation.
    pub const fn from_shorthand(shorthand: &str) -> Self {
        let bytes = shorthand.as_bytes();
        if bytes.len() != 9 || bytes[3] != b'_' || bytes[7] != b'_' {
            panic!("signature shorthand must look like `AxB_XxX_i`");
        }

        let disk = Slot::from_symbol(bytes[0]);
        let previous = Slot::from_symbol(bytes[1]);
        let loadout = Slot::from_symbol(bytes[2]);

        let mut archived = [false; 3];
        let mut i = 0;
        while i < 3 {
            archived[i] = match bytes[4 + i] {
                b'X' => true,
                b'x' => false,
                _ => panic!("signature archive flag must be x or X"),
            };
            i += 1;
        }

        let ignored = match bytes[8] {
            b'I' => true,
            b'i' => false,
            _ => panic!("signature ignore flag must be i or I"),
        };

        let signature = Self {
            disk,
            previous,
            loadout,
            disk_archived: archived[0],
            previous_archived: archived[1],
            loadout_archived: archived[2],
            ignored,
        };
        if !signature.is_canonical() {
            panic!("signature shorthand is not reachable by classification");
        }
        signature
    }

    /// Whether classification can produce this signature.
    ///
    /// At least one slot is present, symbols appear in first-seen order,
    /// absent slots are never archived and equal slots agree on their
    /// archive flag.
    pub const fn is_canonical(&self) -> bool {
        let slots = [self.disk, self.previous, self.loadout];
        let archived = [self.disk_archived, self.previous_archived, self.loadout_archived];

        let mut distinct = 0u8;
        let mut any_present = false;
        let mut i = 0;
        while i < 3 {
            let slot = slots[i] as u8;
            if slot == 0 {
                if archived[i] {
                    return false;
                }
            } else {
                any_present = true;
                if slot > distinct + 1 {
                    return false;
                }
                if slot == distinct + 1 {
                    distinct += 1;
                }
                let mut j = 0;
                while j < i {
                    if slots[j] as u8 == slot && archived[j] != archived[i] {
                        return false;
                    }
                    j += 1;
                }
            }
            i += 1;
        }
        any_present
    }

    /// Dense lookup key in `0..KEY_SPACE`.
    pub const fn key(&self) -> usize {
        (self.disk as usize)
            | (self.previous as usize) << 2
            | (self.loadout as usize) << 4
            | (self.disk_archived as usize) << 6
            | (self.previous_archived as usize) << 7
            | (self.loadout_archived as usize) << 8
            | (self.ignored as usize) << 9
    }

    /// Every signature classification can produce, ordered by key.
    pub fn all() -> Vec<Signature> {
        let slots = [Slot::Absent, Slot::A, Slot::B, Slot::C];
        let mut out = Vec::new();

        for disk in slots {
            for previous in slots {
                for loadout in slots {
                    for flags in 0u8..16 {
                        let candidate = Self {
                            disk,
                            previous,
                            loadout,
                            disk_archived: flags & 1 != 0,
                            previous_archived: flags & 2 != 0,
                            loadout_archived: flags & 4 != 0,
                            ignored: flags & 8 != 0,
                        };
                        if candidate.is_canonical() {
                            out.push(candidate);
                        }
                    }
                }
            }
        }

        out.sort_by_key(Signature::key);
        out
    }

    pub fn disk(&self) -> Slot {
        self.disk
    }

    pub fn previous(&self) -> Slot {
        self.previous
    }

    pub fn loadout(&self) -> Slot {
        self.loadout
    }

    pub fn disk_archived(&self) -> bool {
        self.disk_archived
    }

    pub fn previous_archived(&self) -> bool {
        self.previous_archived
    }

    pub fn loadout_archived(&self) -> bool {
        self.loadout_archived
    }

    pub fn ignored(&self) -> bool {
        self.ignored
    }

    /// No channel holds content, e.g. a tombstone for a file already gone.
    pub fn is_vacant(&self) -> bool {
        !self.disk.is_present() && !self.previous.is_present() && !self.loadout.is_present()
    }

    /// Disk, Previous and Loadout all present and equal.
    pub const fn is_fixpoint(&self) -> bool {
        matches!(
            (self.disk, self.previous, self.loadout),
            (Slot::A, Slot::A, Slot::A)
        )
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let flag = |set: bool| if set { 'X' } else { 'x' };
        write!(
            f,
            "{}{}{}_{}{}{}_{}",
            self.disk.symbol(),
            self.previous.symbol(),
            self.loadout.symbol(),
            flag(self.disk_archived),
            flag(self.previous_archived),
            flag(self.loadout_archived),
            if self.ignored { 'I' } else { 'i' }
        )
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({})", self)
    }
}

impl Serialize for Signature {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
