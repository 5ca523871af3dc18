//! Atomic I/O operations with file locking

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use backoff::ExponentialBackoffBuilder;
use fs2::FileExt;
use serde::{Deserialize, Serialize};

use crate::{Error, NormalizedPath, Result};

/// Suffix of the temporary files created by [`write_atomic`].
///
/// Scanners skip files carrying it: they only exist if a writer died
/// between creating the temp file and renaming it into place.
pub const TEMP_SUFFIX: &str = ".loadout-tmp";

/// Suffix of the sidecar file [`FileLock`] locks for a state file.
pub const LOCK_SUFFIX: &str = ".lock";

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Retry policy for lock contention on state files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RobustnessConfig {
    /// Whether to retry lock acquisition at all.
    pub retry_locks: bool,
    /// Upper bound on time spent retrying a contended lock, in milliseconds.
    pub max_lock_wait_ms: u64,
}

impl Default for RobustnessConfig {
    fn default() -> Self {
        Self {
            retry_locks: true,
            max_lock_wait_ms: 2_000,
        }
    }
}

/// An advisory lock on the `<file>.lock` sidecar of a state file.
///
/// The sidecar keeps one inode for the life of the state file, so readers
/// and writers contend on it even though [`write_atomic`] replaces the
/// state file itself by rename. Released on drop.
#[derive(Debug)]
pub struct FileLock {
    file: File,
    path: PathBuf,
}

impl FileLock {
    /// Take the exclusive lock guarding writes to `path`.
    ///
    /// Creates the parent directory if needed.
    pub fn exclusive(path: &NormalizedPath, robustness: RobustnessConfig) -> Result<Self> {
        if let Some(parent) = path.to_native().parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
        }
        Self::acquire(path, robustness, <File as FileExt>::try_lock_exclusive)
    }

    /// Take a shared lock guarding reads of `path`.
    ///
    /// Fails with a `NotFound` I/O error when the parent directory is missing.
    pub fn shared(path: &NormalizedPath, robustness: RobustnessConfig) -> Result<Self> {
        Self::acquire(path, robustness, <File as FileExt>::try_lock_shared)
    }

    /// The sidecar this lock holds.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn acquire(
        target: &NormalizedPath,
        robustness: RobustnessConfig,
        try_lock: fn(&File) -> std::io::Result<()>,
    ) -> Result<Self> {
        let path = lock_path(&target.to_native());
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| Error::io(&path, e))?;

        lock_with_retry(&file, robustness, try_lock).map_err(|_| Error::LockFailed {
            path: target.to_native(),
        })?;
        Ok(Self { file, path })
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

/// The sidecar lock file of `path`.
pub fn lock_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(LOCK_SUFFIX);
    path.with_file_name(name)
}

/// Write content atomically to a file.
///
/// Uses write-to-temp-then-rename strategy to prevent partial writes. The
/// temp file is synced before the rename so the content is durable once
/// this returns. Callers that need mutual exclusion on top hold a
/// [`FileLock`].
pub fn write_atomic(path: &NormalizedPath, content: &[u8]) -> Result<()> {
    let native_path = path.to_native();

    // Ensure parent directory exists
    if let Some(parent) = native_path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
    }

    // Temp file lives in the same directory so the rename stays on one filesystem.
    // Unique per writer: concurrent writers must never share (and truncate) one temp file.
    let temp_name = format!(
        ".{}.{}.{}{}",
        native_path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_default(),
        std::process::id(),
        TEMP_COUNTER.fetch_add(1, Ordering::Relaxed),
        TEMP_SUFFIX
    );
    let temp_path = native_path.with_file_name(&temp_name);

    let mut temp_file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(&temp_path)
        .map_err(|e| Error::io(&temp_path, e))?;

    let written = temp_file
        .write_all(content)
        .and_then(|_| temp_file.sync_all())
        .map_err(|e| Error::io(&temp_path, e));
    drop(temp_file);
    if let Err(e) = written {
        let _ = fs::remove_file(&temp_path);
        return Err(e);
    }

    fs::rename(&temp_path, &native_path).map_err(|e| {
        let _ = fs::remove_file(&temp_path);
        Error::io(&native_path, e)
    })?;

    Ok(())
}

fn lock_with_retry(
    file: &File,
    robustness: RobustnessConfig,
    try_lock: fn(&File) -> std::io::Result<()>,
) -> std::io::Result<()> {
    if !robustness.retry_locks {
        return try_lock(file);
    }

    let policy = ExponentialBackoffBuilder::new()
        .with_initial_interval(Duration::from_millis(10))
        .with_max_elapsed_time(Some(Duration::from_millis(robustness.max_lock_wait_ms)))
        .build();

    backoff::retry(policy, || {
        try_lock(file).map_err(|e| {
            tracing::debug!(error = %e, "lock contended, retrying");
            backoff::Error::transient(e)
        })
    })
    .map_err(|e| match e {
        backoff::Error::Permanent(err) => err,
        backoff::Error::Transient { err, .. } => err,
    })
}

/// Read raw bytes from a file.
pub fn read_bytes(path: &NormalizedPath) -> Result<Vec<u8>> {
    let native_path = path.to_native();
    fs::read(&native_path).map_err(|e| Error::io(&native_path, e))
}

/// Read text content from a file.
pub fn read_text(path: &NormalizedPath) -> Result<String> {
    let native_path = path.to_native();
    fs::read_to_string(&native_path).map_err(|e| Error::io(&native_path, e))
}

/// Remove a file. A file that is already gone is not an error.
///
/// Returns whether a file was actually removed.
pub fn remove_file(path: &NormalizedPath) -> Result<bool> {
    let native_path = path.to_native();
    match fs::remove_file(&native_path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(Error::io(&native_path, e)),
    }
}

/// Remove `dir` and its ancestors while they are empty, stopping at `root`.
///
/// `root` itself is never removed. Returns the number of directories removed.
pub fn remove_empty_dirs(dir: &NormalizedPath, root: &NormalizedPath) -> Result<usize> {
    let mut removed = 0;
    let mut current = Some(dir.clone());

    while let Some(candidate) = current {
        if candidate == *root || !candidate.as_str().starts_with(root.as_str()) {
            break;
        }
        let native = candidate.to_native();
        let is_empty = match fs::read_dir(&native) {
            Ok(mut entries) => entries.next().is_none(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                current = candidate.parent();
                continue;
            }
            Err(e) => return Err(Error::io(&native, e)),
        };
        if !is_empty {
            break;
        }
        fs::remove_dir(&native).map_err(|e| Error::io(&native, e))?;
        removed += 1;
        current = candidate.parent();
    }

    Ok(removed)
}

/// Extensions that get the executable bit when materialized on Unix.
const EXECUTABLE_EXTENSIONS: &[&str] = &["sh", "bin", "run", "py", "pl", "php", "rb", "out", "elf"];

/// Whether a file with this name should be marked executable after extraction.
pub fn wants_executable_bit(path: &NormalizedPath) -> bool {
    match path.extension() {
        None => true,
        Some(ext) => EXECUTABLE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()),
    }
}

/// Add user/group/other execute permission, mirroring `chmod +x`.
#[cfg(unix)]
pub fn mark_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let metadata = fs::metadata(path).map_err(|e| Error::io(path, e))?;
    let mut permissions = metadata.permissions();
    permissions.set_mode(permissions.mode() | 0o111);
    fs::set_permissions(path, permissions).map_err(|e| Error::io(path, e))
}

#[cfg(not(unix))]
pub fn mark_executable(_path: &Path) -> Result<()> {
    Ok(())
}
