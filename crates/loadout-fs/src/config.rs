//! Serde-backed persistence for configuration and state files
//!
//! The synchronizer's config, snapshot and loadout manifest all go through
//! [`ConfigStore`]; the on-disk format follows the file extension. Loads
//! hold a shared [`io::FileLock`] and saves an exclusive one, so a reader
//! never interleaves with a writer of the same file.

use crate::{Error, NormalizedPath, Result, io};
use serde::{Serialize, de::DeserializeOwned};
use std::fmt;

/// A supported file format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateFormat {
    Toml,
    Json,
    Yaml,
}

impl StateFormat {
    /// Pick the format from `path`'s extension, case-insensitively.
    pub fn from_path(path: &NormalizedPath) -> Result<Self> {
        let extension = path.extension().unwrap_or("");
        match extension.to_ascii_lowercase().as_str() {
            "toml" => Ok(Self::Toml),
            "json" => Ok(Self::Json),
            "yaml" | "yml" => Ok(Self::Yaml),
            _ => Err(Error::UnsupportedFormat {
                extension: extension.to_string(),
            }),
        }
    }

    fn decode<T: DeserializeOwned>(self, content: &str) -> std::result::Result<T, String> {
        match self {
            Self::Toml => toml::from_str(content).map_err(|e| e.to_string()),
            Self::Json => serde_json::from_str(content).map_err(|e| e.to_string()),
            Self::Yaml => serde_yaml::from_str(content).map_err(|e| e.to_string()),
        }
    }

    fn encode<T: Serialize>(self, value: &T) -> std::result::Result<String, String> {
        match self {
            Self::Toml => toml::to_string_pretty(value).map_err(|e| e.to_string()),
            Self::Json => serde_json::to_string_pretty(value)
                .map(|mut text| {
                    text.push('\n');
                    text
                })
                .map_err(|e| e.to_string()),
            Self::Yaml => serde_yaml::to_string(value).map_err(|e| e.to_string()),
        }
    }
}

impl fmt::Display for StateFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Toml => "TOML",
            Self::Json => "JSON",
            Self::Yaml => "YAML",
        })
    }
}

/// Reads and atomically writes serde values in the format named by the
/// file extension.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConfigStore {
    robustness: io::RobustnessConfig,
}

impl ConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that retries contended locks per `robustness`.
    pub fn with_robustness(robustness: io::RobustnessConfig) -> Self {
        Self { robustness }
    }

    /// Read and decode the file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedFormat`] for an unknown extension,
    /// [`Error::Io`] if the file cannot be read and [`Error::ConfigParse`]
    /// if it does not decode.
    pub fn load<T: DeserializeOwned>(&self, path: &NormalizedPath) -> Result<T> {
        let format = StateFormat::from_path(path)?;
        let _lock = io::FileLock::shared(path, self.robustness)?;
        let content = io::read_text(path)?;
        format.decode(&content).map_err(|message| Error::ConfigParse {
            path: path.to_native(),
            format: format.to_string(),
            message,
        })
    }

    /// Encode `value` and write it atomically to `path` under the
    /// exclusive lock.
    pub fn save<T: Serialize>(&self, path: &NormalizedPath, value: &T) -> Result<()> {
        let format = StateFormat::from_path(path)?;
        let content = format.encode(value).map_err(|message| Error::ConfigSerialize {
            path: path.to_native(),
            format: format.to_string(),
            message,
        })?;
        let _lock = io::FileLock::exclusive(path, self.robustness)?;
        io::write_atomic(path, content.as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_follows_extension() {
        assert_eq!(
            StateFormat::from_path(&NormalizedPath::new("a/snapshot.TOML")).unwrap(),
            StateFormat::Toml
        );
        assert_eq!(
            StateFormat::from_path(&NormalizedPath::new("loadout.yml")).unwrap(),
            StateFormat::Yaml
        );
        assert!(StateFormat::from_path(&NormalizedPath::new("notes")).is_err());
    }
}
