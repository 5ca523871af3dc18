//! Identity types shared by every stage of a reconciliation pass

mod fingerprint;

pub use fingerprint::{ContentHash, Fingerprint};

use loadout_fs::{NormalizedPath, validate_relative_path};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{Error, Result};

/// A managed location category, e.g. `game` or `saves`.
///
/// Identifiers are short ASCII names (letters, digits, `-`, `_`) so they can
/// double as directory names and config keys.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct LocationId(String);

impl LocationId {
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        let valid = !id.is_empty()
            && id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(Error::InvalidLocation { id });
        }
        Ok(Self(id))
    }

    /// The primary game installation directory.
    pub fn game() -> Self {
        Self("game".to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for LocationId {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<LocationId> for String {
    fn from(id: LocationId) -> Self {
        id.0
    }
}

impl fmt::Display for LocationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identity of a managed file: a location plus a clean path relative to it.
///
/// Ordered by location, then path, which is what keeps sync trees
/// deterministic.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "GamePathRepr", into = "GamePathRepr")]
pub struct GamePath {
    location: LocationId,
    path: NormalizedPath,
}

impl GamePath {
    /// Build a path, rejecting anything that could escape the location root.
    pub fn new(location: LocationId, path: &str) -> Result<Self> {
        let path = validate_relative_path(path)?;
        Ok(Self { location, path })
    }

    /// Shorthand for a path under [`LocationId::game`].
    pub fn game(path: &str) -> Result<Self> {
        Self::new(LocationId::game(), path)
    }

    pub fn location(&self) -> &LocationId {
        &self.location
    }

    pub fn relative(&self) -> &NormalizedPath {
        &self.path
    }

    pub fn file_name(&self) -> Option<&str> {
        self.path.file_name()
    }

    /// The containing directory, relative to the location root.
    ///
    /// `None` for files that sit directly in the root.
    pub fn parent_dir(&self) -> Option<NormalizedPath> {
        self.path.parent()
    }
}

impl fmt::Display for GamePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{}}}/{}", self.location, self.path)
    }
}

#[derive(Serialize, Deserialize)]
struct GamePathRepr {
    location: String,
    path: String,
}

impl TryFrom<GamePathRepr> for GamePath {
    type Error = Error;

    fn try_from(repr: GamePathRepr) -> Result<Self> {
        GamePath::new(LocationId::new(repr.location)?, &repr.path)
    }
}

impl From<GamePath> for GamePathRepr {
    fn from(path: GamePath) -> Self {
        Self {
            location: path.location.0,
            path: path.path.as_str().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn location_ids_are_validated() {
        assert!(LocationId::new("saves").is_ok());
        assert!(LocationId::new("app-data_2").is_ok());
        assert!(LocationId::new("").is_err());
        assert!(LocationId::new("../x").is_err());
    }

    #[test]
    fn game_paths_reject_traversal() {
        assert!(GamePath::game("Data/plugin.esp").is_ok());
        assert!(GamePath::game("../plugin.esp").is_err());
        assert!(GamePath::game("/Data/plugin.esp").is_err());
    }

    #[test]
    fn ordering_is_location_then_path() {
        let saves = GamePath::new(LocationId::new("saves").unwrap(), "a.sav").unwrap();
        let game_b = GamePath::game("b.esp").unwrap();
        let game_a = GamePath::game("a.esp").unwrap();

        let mut paths = vec![saves.clone(), game_b.clone(), game_a.clone()];
        paths.sort();

        assert_eq!(paths, vec![game_a, game_b, saves]);
    }

    #[test]
    fn display_and_serde() {
        let path = GamePath::game("Data/x.esp").unwrap();
        assert_eq!(path.to_string(), "{game}/Data/x.esp");

        let json = serde_json::to_string(&path).unwrap();
        let back: GamePath = serde_json::from_str(&json).unwrap();
        assert_eq!(back, path);

        let bad: std::result::Result<GamePath, _> =
            serde_json::from_str(r#"{"location":"game","path":"../x"}"#);
        assert!(bad.is_err());
    }
}
