//! [`TestGame`] builder for file-backed synchronization scenarios.

use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use loadout_core::sync::CancellationFlag;
use loadout_core::{
    ApplyReport, ContentArchive, Fingerprint, LoadoutEntry, SyncConfig, SyncTree, Workspace,
};

use crate::fixture::path;

/// A temporary directory laid out like a real installation:
///
/// ```text
/// <root>/config.toml
/// <root>/game/          managed `game` location
/// <root>/archive/
/// <root>/loadout.toml
/// <root>/snapshot.toml
/// ```
///
/// # Example
///
/// ```rust,no_run
/// use loadout_test_utils::TestGame;
///
/// let game = TestGame::new();
/// game.want("Data/mod.esp", b"mod");
/// game.sync();
/// game.assert_file_contains("Data/mod.esp", "mod");
/// ```
pub struct TestGame {
    temp_dir: TempDir,
}

impl Default for TestGame {
    fn default() -> Self {
        Self::new()
    }
}

impl TestGame {
    /// Create the directory layout and a config pointing at it.
    pub fn new() -> Self {
        let temp_dir = TempDir::new().unwrap();
        fs::create_dir_all(temp_dir.path().join("game")).unwrap();
        fs::write(
            temp_dir.path().join("config.toml"),
            "io_concurrency = 2\n\n[locations]\ngame = \"game\"\n",
        )
        .unwrap();
        Self { temp_dir }
    }

    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn config_path(&self) -> PathBuf {
        self.root().join("config.toml")
    }

    pub fn game_dir(&self) -> PathBuf {
        self.root().join("game")
    }

    /// Load the config and open every collaborator it names.
    pub fn open(&self) -> Workspace {
        let config = SyncConfig::load(self.config_path()).unwrap();
        Workspace::open(config).unwrap()
    }

    /// Write `content` directly into the game directory.
    pub fn write_file(&self, relative: &str, content: &[u8]) {
        let full_path = self.game_dir().join(relative);
        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(full_path, content).unwrap();
    }

    pub fn read_file(&self, relative: &str) -> Option<Vec<u8>> {
        fs::read(self.game_dir().join(relative)).ok()
    }

    pub fn remove_file(&self, relative: &str) {
        fs::remove_file(self.game_dir().join(relative)).unwrap();
    }

    /// Archive `content` and add it to the loadout at `relative`.
    pub fn want(&self, relative: &str, content: &[u8]) {
        let workspace = self.open();
        let fingerprint = Fingerprint::of(content);
        workspace.archive().write(&fingerprint, content).unwrap();

        let mut manifest = workspace.loadout().manifest();
        manifest.insert(path(relative), LoadoutEntry::File { fingerprint });
        workspace.loadout().replace(manifest).unwrap();
    }

    /// Record an explicit deletion of `relative` in the loadout.
    pub fn tombstone(&self, relative: &str) {
        let workspace = self.open();
        let mut manifest = workspace.loadout().manifest();
        manifest.insert(path(relative), LoadoutEntry::Tombstone);
        workspace.loadout().replace(manifest).unwrap();
    }

    /// Scan and plan without applying.
    pub fn plan(&self) -> SyncTree {
        let workspace = self.open();
        let disk = workspace.scan().unwrap();
        workspace.synchronizer().plan(&disk).unwrap()
    }

    /// Scan and run one full pass.
    pub fn sync(&self) -> ApplyReport {
        let workspace = self.open();
        let disk = workspace.scan().unwrap();
        workspace
            .synchronizer()
            .sync(&disk, &CancellationFlag::new())
            .unwrap()
    }

    /// Assert that `relative` exists in the game directory.
    ///
    /// # Panics
    /// Panics with a descriptive message if the file does not exist.
    pub fn assert_file_exists(&self, relative: &str) {
        let full_path = self.game_dir().join(relative);
        assert!(
            full_path.exists(),
            "Expected file to exist: {}",
            full_path.display()
        );
    }

    /// Assert that `relative` does **not** exist in the game directory.
    ///
    /// # Panics
    /// Panics with a descriptive message if the file exists.
    pub fn assert_file_not_exists(&self, relative: &str) {
        let full_path = self.game_dir().join(relative);
        assert!(
            !full_path.exists(),
            "Expected file NOT to exist: {}",
            full_path.display()
        );
    }

    /// Assert that the game file at `relative` contains `content`.
    ///
    /// # Panics
    /// Panics if the file cannot be read or does not contain `content`.
    pub fn assert_file_contains(&self, relative: &str, content: &str) {
        let full_path = self.game_dir().join(relative);
        let file_content = fs::read_to_string(&full_path)
            .unwrap_or_else(|_| panic!("Could not read file: {}", full_path.display()));
        assert!(
            file_content.contains(content),
            "File {} does not contain expected content.\nExpected: {}\nActual: {}",
            full_path.display(),
            content,
            file_content
        );
    }
}
