//! Normalized path handling for cross-platform compatibility

use std::path::{Path, PathBuf};

/// A path normalized to use forward slashes internally.
///
/// Provides consistent path handling across platforms by normalizing
/// all paths to forward slashes internally and converting to
/// platform-native format only at I/O boundaries. `.` and empty
/// components are dropped and `..` pops the previous component; a `..`
/// that would climb above the start of the path is discarded.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NormalizedPath {
    /// Internal representation always uses forward slashes
    inner: String,
}

impl NormalizedPath {
    /// Create a new NormalizedPath from any path-like input.
    pub fn new(path: impl AsRef<Path>) -> Self {
        let path_str = path.as_ref().to_string_lossy();
        Self {
            inner: clean(&path_str.replace('\\', "/")),
        }
    }

    /// Get the internal normalized string representation.
    pub fn as_str(&self) -> &str {
        &self.inner
    }

    /// Convert to a platform-native PathBuf for I/O operations.
    pub fn to_native(&self) -> PathBuf {
        PathBuf::from(&self.inner)
    }

    /// Join this path with a segment.
    pub fn join(&self, segment: &str) -> Self {
        let segment_normalized = segment.replace('\\', "/");
        let joined = if self.inner.is_empty() {
            segment_normalized
        } else if self.inner.ends_with('/') {
            format!("{}{}", self.inner, segment_normalized)
        } else {
            format!("{}/{}", self.inner, segment_normalized)
        };
        Self {
            inner: clean(&joined),
        }
    }

    /// Get the parent directory.
    pub fn parent(&self) -> Option<Self> {
        let trimmed = self.inner.trim_end_matches('/');
        match trimmed.rfind('/') {
            Some(idx) if idx > 0 => Some(Self {
                inner: trimmed[..idx].to_string(),
            }),
            Some(0) if trimmed.len() > 1 => Some(Self {
                inner: "/".to_string(),
            }),
            _ => None,
        }
    }

    /// Get the file name component.
    pub fn file_name(&self) -> Option<&str> {
        let trimmed = self.inner.trim_end_matches('/');
        trimmed.rsplit('/').next().filter(|name| !name.is_empty())
    }

    /// Get the extension if present.
    pub fn extension(&self) -> Option<&str> {
        self.file_name().and_then(|name| {
            let idx = name.rfind('.')?;
            if idx == 0 {
                None
            } else {
                Some(&name[idx + 1..])
            }
        })
    }

    /// Whether the path starts at a filesystem root.
    pub fn is_absolute(&self) -> bool {
        self.inner.starts_with('/') || self.to_native().is_absolute()
    }

    /// Check if this path exists on the filesystem.
    pub fn exists(&self) -> bool {
        self.to_native().exists()
    }

    /// Check if this is a directory.
    pub fn is_dir(&self) -> bool {
        self.to_native().is_dir()
    }

    /// Check if this is a file.
    pub fn is_file(&self) -> bool {
        self.to_native().is_file()
    }
}

fn clean(raw: &str) -> String {
    let network = raw.starts_with("//") && !raw.starts_with("///");
    let absolute = raw.starts_with('/');

    let mut parts: Vec<&str> = Vec::new();
    for component in raw.split('/') {
        match component {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }

    let body = parts.join("/");
    if network {
        format!("//{}", body)
    } else if absolute {
        format!("/{}", body)
    } else {
        body
    }
}

/// Validate a path meant to live *inside* a managed location.
///
/// Unlike [`NormalizedPath::new`], which silently resolves traversal, this
/// rejects anything that is not already a clean relative path: absolute
/// paths, `..` or `.` components, empty components and drive prefixes.
pub fn validate_relative_path(path: &str) -> crate::Result<NormalizedPath> {
    let reject = |reason: &str| crate::Error::InvalidPath {
        path: path.to_string(),
        reason: reason.to_string(),
    };

    let unified = path.replace('\\', "/");
    if unified.is_empty() {
        return Err(reject("path is empty"));
    }
    if unified.starts_with('/') {
        return Err(reject("path must be relative"));
    }
    if unified.len() >= 2 && unified.as_bytes()[1] == b':' {
        return Err(reject("path must not carry a drive prefix"));
    }
    for component in unified.split('/') {
        match component {
            "" => return Err(reject("path contains an empty component")),
            "." | ".." => return Err(reject("path contains a traversal component")),
            _ => {}
        }
    }

    Ok(NormalizedPath { inner: unified })
}

impl AsRef<Path> for NormalizedPath {
    fn as_ref(&self) -> &Path {
        Path::new(&self.inner)
    }
}

impl std::fmt::Display for NormalizedPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.inner)
    }
}

impl From<&str> for NormalizedPath {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for NormalizedPath {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<PathBuf> for NormalizedPath {
    fn from(p: PathBuf) -> Self {
        Self::new(p)
    }
}

impl From<&Path> for NormalizedPath {
    fn from(p: &Path) -> Self {
        Self::new(p)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parent_of_root_child_is_root() {
        let path = NormalizedPath::new("/a");
        assert_eq!(path.parent().unwrap().as_str(), "/");
        assert!(NormalizedPath::new("/").parent().is_none());
    }

    #[test]
    fn join_onto_empty_path() {
        let path = NormalizedPath::new("").join("mods/a.esp");
        assert_eq!(path.as_str(), "mods/a.esp");
    }

    #[test]
    fn extension_ignores_dotfiles() {
        assert_eq!(NormalizedPath::new("dir/.hidden").extension(), None);
        assert_eq!(NormalizedPath::new("dir/plugin.esp").extension(), Some("esp"));
    }

    #[test]
    fn validate_relative_accepts_clean_paths() {
        let path = validate_relative_path("Data\\textures/sky.dds").unwrap();
        assert_eq!(path.as_str(), "Data/textures/sky.dds");
    }

    #[test]
    fn validate_relative_rejects_escape() {
        assert!(validate_relative_path("../outside").is_err());
        assert!(validate_relative_path("/etc/passwd").is_err());
        assert!(validate_relative_path("C:/Windows").is_err());
        assert!(validate_relative_path("a//b").is_err());
        assert!(validate_relative_path("").is_err());
    }
}
