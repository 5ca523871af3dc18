//! Planning and applying passes against in-memory collaborators

use loadout_core::rules::{Actions, InstrumentedResolver, TableResolver};
use loadout_core::sync::{CancellationFlag, ChangeKind, DiagnosticKind, SyncTreeBuilder};
use loadout_core::{
    DiskState, Fingerprint, FingerprintSource, GamePath, LoadoutEntry, Manifest, Result,
    Snapshot,
};
use loadout_test_utils::{Fixture, path};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use rstest::rstest;

// ============================================================================
// Concrete scenarios
// ============================================================================

#[test]
fn all_channels_agree_does_nothing() {
    let fixture = Fixture::new();
    fixture
        .disk("Data/a.esp", b"same")
        .previous("Data/a.esp", b"same")
        .loadout_unarchived("Data/a.esp", b"same");

    let node = fixture.node("Data/a.esp");
    assert_eq!(node.signature.to_string(), "AAA_xxx_i");
    assert_eq!(node.actions, Actions::DO_NOTHING);

    let report = fixture.sync();
    assert!(report.is_clean());
    assert_eq!(report.completed, 1);
    assert_eq!(fixture.previous_of("Data/a.esp"), Some(Fingerprint::of(b"same")));
}

#[test]
fn untracked_disk_file_is_backed_up_and_ingested() {
    let fixture = Fixture::new();
    fixture.disk("Data/new.esp", b"user file");

    assert_eq!(
        fixture.node("Data/new.esp").actions,
        Actions::BACKUP_FILE | Actions::INGEST_FROM_DISK
    );

    let report = fixture.sync();
    assert_eq!(report.backed_up, 1);
    assert_eq!(report.backup_bytes, 9);
    assert_eq!(report.ingested, 1);
    assert!(report.loadout_committed);

    let content = Fingerprint::of(b"user file");
    assert!(fixture.archive.contains(&content));
    assert_eq!(
        fixture.loadout_of("Data/new.esp"),
        Some(LoadoutEntry::File { fingerprint: content })
    );
    assert_eq!(fixture.previous_of("Data/new.esp"), Some(content));
    assert!(!fixture.plan().needs_apply());
}

#[test]
fn file_removed_from_configuration_is_backed_up_and_deleted() {
    let fixture = Fixture::new();
    fixture
        .disk("Data/old.esp", b"old")
        .previous("Data/old.esp", b"old");

    assert_eq!(
        fixture.node("Data/old.esp").actions,
        Actions::BACKUP_FILE | Actions::DELETE_FROM_DISK
    );

    let report = fixture.sync();
    assert_eq!(report.deleted, 1);
    assert!(fixture.archive.contains(&Fingerprint::of(b"old")));
    assert_eq!(fixture.disk_content("Data/old.esp"), None);
    assert_eq!(fixture.previous_of("Data/old.esp"), None);
    assert!(fixture.plan().is_empty());
}

#[test]
fn archived_loadout_file_is_extracted() {
    let fixture = Fixture::new();
    fixture.loadout("Data/mod.esp", b"mod content");

    assert_eq!(fixture.node("Data/mod.esp").actions, Actions::EXTRACT_TO_DISK);

    let report = fixture.sync();
    assert_eq!(report.extracted, 1);
    assert_eq!(fixture.disk_content("Data/mod.esp"), Some(b"mod content".to_vec()));
    assert_eq!(
        fixture.previous_of("Data/mod.esp"),
        Some(Fingerprint::of(b"mod content"))
    );
}

#[test]
fn independent_changes_are_a_conflict() {
    let fixture = Fixture::new();
    fixture
        .disk("Data/a.esp", b"disk")
        .previous("Data/a.esp", b"previous")
        .loadout_unarchived("Data/a.esp", b"loadout");

    assert_eq!(fixture.node("Data/a.esp").actions, Actions::WARN_OF_CONFLICT);

    let report = fixture.sync();
    assert_eq!(report.diagnostics.len(), 1);
    assert_eq!(report.diagnostics[0].kind, DiagnosticKind::Conflict);
    assert_eq!(report.diagnostics[0].signature.to_string(), "ABC_xxx_i");
    // Nothing moves, and the old Previous is kept for the next pass
    assert_eq!(fixture.disk_content("Data/a.esp"), Some(b"disk".to_vec()));
    assert_eq!(fixture.previous_of("Data/a.esp"), Some(Fingerprint::of(b"previous")));
    assert_eq!(fixture.node("Data/a.esp").actions, Actions::WARN_OF_CONFLICT);
}

// ============================================================================
// Further behaviour
// ============================================================================

#[test]
fn deleted_file_becomes_tombstone() {
    let fixture = Fixture::new();
    fixture
        .archived(b"kept")
        .previous("Data/a.esp", b"kept")
        .loadout("Data/a.esp", b"kept");

    assert_eq!(fixture.node("Data/a.esp").actions, Actions::ADD_REIFIED_DELETE);

    let report = fixture.sync();
    assert_eq!(report.tombstoned, 1);
    assert_eq!(fixture.loadout_of("Data/a.esp"), Some(LoadoutEntry::Tombstone));
    assert_eq!(fixture.previous_of("Data/a.esp"), None);

    // The tombstone alone needs nothing further
    let node = fixture.node("Data/a.esp");
    assert_eq!(node.actions, Actions::DO_NOTHING);
    assert!(!fixture.plan().needs_apply());
}

#[test]
fn ignored_paths_follow_the_loadout() {
    let fixture = Fixture::new();
    fixture
        .ignore("Data/Textures")
        .disk("Data/Textures/sky.dds", b"disk")
        .previous("Data/Textures/sky.dds", b"previous")
        .loadout("Data/Textures/sky.dds", b"loadout");

    let node = fixture.node("Data/Textures/sky.dds");
    assert!(node.ignored);
    assert_eq!(node.signature.to_string(), "ABC_xxX_I");

    fixture.sync();
    assert_eq!(
        fixture.disk_content("Data/Textures/sky.dds"),
        Some(b"loadout".to_vec())
    );
    assert!(fixture.archive.contains(&Fingerprint::of(b"disk")));
}

#[test]
fn replace_never_leaves_path_absent() {
    let fixture = Fixture::new();
    fixture
        .disk("Data/a.esp", b"v1")
        .previous("Data/a.esp", b"v1")
        .loadout("Data/a.esp", b"v2");

    let report = fixture.sync();
    assert_eq!(report.extracted, 1);
    // Overwritten in place, never deleted first
    assert_eq!(report.deleted, 0);
    assert_eq!(fixture.disk_content("Data/a.esp"), Some(b"v2".to_vec()));
    assert!(fixture.archive.contains(&Fingerprint::of(b"v1")));
}

#[test]
fn archived_disk_content_is_replaced_without_backup() {
    let fixture = Fixture::new();
    fixture
        .archived(b"old")
        .disk("Data/a.esp", b"old")
        .previous("Data/a.esp", b"old")
        .loadout("Data/a.esp", b"new");

    assert_eq!(
        fixture.node("Data/a.esp").actions,
        Actions::DELETE_FROM_DISK | Actions::EXTRACT_TO_DISK
    );
    let report = fixture.sync();
    assert_eq!(report.backed_up, 0);
    assert_eq!(report.extracted, 1);
}

#[test]
fn shared_content_is_backed_up_once() {
    let fixture = Fixture::new();
    fixture.disk("a.txt", b"shared").disk("b.txt", b"shared");

    let report = fixture.sync();
    assert_eq!(report.backed_up, 1);
    assert_eq!(report.backups_skipped, 1);
    assert_eq!(fixture.archive.len(), 1);
}

#[test]
fn diff_previews_disk_changes() {
    let fixture = Fixture::new();
    fixture
        .loadout("added.esp", b"added")
        .disk("modified.esp", b"v1")
        .previous("modified.esp", b"v1")
        .loadout("modified.esp", b"v2")
        .disk("removed.esp", b"gone")
        .previous("removed.esp", b"gone")
        .disk("same.esp", b"same")
        .previous("same.esp", b"same")
        .loadout("same.esp", b"same");

    let diff: Vec<_> = fixture
        .synchronizer()
        .diff(&fixture.disk.state())
        .unwrap()
        .into_iter()
        .map(|entry| (entry.path, entry.change))
        .collect();

    assert_eq!(
        diff,
        vec![
            (path("added.esp"), ChangeKind::Added),
            (path("modified.esp"), ChangeKind::Modified),
            (path("removed.esp"), ChangeKind::Removed),
            (path("same.esp"), ChangeKind::None),
        ]
    );
}

#[test]
fn diff_rows_render_with_location_prefix() {
    let fixture = Fixture::new();
    fixture.loadout("Data/added.esp", b"added");

    let rendered: Vec<String> = fixture
        .synchronizer()
        .diff(&fixture.disk.state())
        .unwrap()
        .iter()
        .map(|entry| entry.path.to_string())
        .collect();

    assert_eq!(rendered, vec!["{game}/Data/added.esp".to_string()]);
}

#[test]
fn unextractable_loadout_leaves_disk_unchanged_in_diff() {
    let fixture = Fixture::new();
    fixture
        .disk("Data/a.esp", b"old")
        .previous("Data/a.esp", b"old")
        .loadout_unarchived("Data/a.esp", b"new");

    let node = fixture.node("Data/a.esp");
    assert_eq!(node.signature.to_string(), "AAB_xxx_i");
    assert_eq!(node.actions, Actions::WARN_OF_UNABLE_TO_EXTRACT);

    let diff = fixture.synchronizer().diff(&fixture.disk.state()).unwrap();
    assert_eq!(diff.len(), 1);
    assert_eq!(diff[0].change, ChangeKind::None);
    assert_eq!(diff[0].fingerprint, Some(Fingerprint::of(b"old")));

    fixture.sync();
    assert_eq!(fixture.disk_content("Data/a.esp"), Some(b"old".to_vec()));
}

#[test]
fn needs_sync_reflects_pending_work() {
    let fixture = Fixture::new();
    fixture.loadout("a.esp", b"a");
    let synchronizer = fixture.synchronizer();
    assert!(synchronizer.needs_sync(&fixture.disk.state()).unwrap());

    fixture.sync();
    assert!(!fixture.synchronizer().needs_sync(&fixture.disk.state()).unwrap());
}

#[test]
fn reset_forces_disk_to_baseline() {
    let fixture = Fixture::new();
    fixture
        .disk("a.esp", b"edited")
        .disk("stray.txt", b"stray")
        // The regular loadout disagrees with the baseline and must be left alone
        .loadout("a.esp", b"current");

    let mut baseline = Manifest::new();
    let wanted = fixture.archive.insert(b"baseline");
    baseline.insert(path("a.esp"), LoadoutEntry::File { fingerprint: wanted });
    let restored = fixture.archive.insert(b"restored");
    baseline.insert(path("missing.esp"), LoadoutEntry::File { fingerprint: restored });

    let report = fixture
        .synchronizer()
        .reset(&fixture.disk.state(), &baseline, &CancellationFlag::new())
        .unwrap();

    assert!(report.diagnostics.is_empty());
    assert_eq!(fixture.disk_content("a.esp"), Some(b"baseline".to_vec()));
    assert_eq!(fixture.disk_content("missing.esp"), Some(b"restored".to_vec()));
    assert_eq!(fixture.disk_content("stray.txt"), None);
    assert!(fixture.archive.contains(&Fingerprint::of(b"edited")));
    assert!(fixture.archive.contains(&Fingerprint::of(b"stray")));
    assert!(fixture.loadout.commits().is_empty());
    assert_eq!(fixture.previous_of("a.esp"), Some(wanted));
    assert_eq!(fixture.previous_of("stray.txt"), None);
}

#[test]
fn instrumented_resolver_counts_resolutions() {
    let fixture = Fixture::new();
    fixture
        .disk("a.esp", b"a")
        .loadout("b.esp", b"b")
        .disk("c.esp", b"c")
        .previous("c.esp", b"c")
        .loadout("c.esp", b"c");

    let resolver = InstrumentedResolver::new(TableResolver);
    fixture
        .synchronizer()
        .with_resolver(&resolver)
        .plan(&fixture.disk.state())
        .unwrap();

    let stats = resolver.stats();
    assert_eq!(stats.resolved, 3);
    assert_eq!(stats.unmapped, 0);
    assert_eq!(stats.by_flag.get("ExtractToDisk"), Some(&1));
    assert_eq!(stats.by_flag.get("BackupFile"), Some(&1));
    assert_eq!(stats.by_flag.get("DoNothing"), Some(&1));
}

#[test]
fn vacant_paths_bypass_the_resolver() {
    let fixture = Fixture::new();
    fixture.tombstone("gone.esp");

    let resolver = InstrumentedResolver::new(TableResolver);
    let tree = fixture
        .synchronizer()
        .with_resolver(&resolver)
        .plan(&fixture.disk.state())
        .unwrap();

    let node = tree.get(&path("gone.esp")).unwrap();
    assert!(node.signature.is_vacant());
    assert_eq!(node.actions, Actions::DO_NOTHING);
    assert_eq!(resolver.stats().resolved, 0);
}

// ============================================================================
// Determinism
// ============================================================================

/// Reports paths in reverse order.
struct Reversed(DiskState);

impl FingerprintSource for Reversed {
    fn paths(&self) -> Result<Vec<GamePath>> {
        let mut paths = self.0.paths()?;
        paths.reverse();
        Ok(paths)
    }

    fn fingerprint(&self, path: &GamePath) -> Result<Option<Fingerprint>> {
        self.0.fingerprint(path)
    }
}

#[test]
fn tree_does_not_depend_on_enumeration_order() {
    let fixture = Fixture::new();
    for i in 0..40 {
        let name = format!("Data/file{i:02}.esp");
        match i % 4 {
            0 => fixture.disk(&name, name.as_bytes()),
            1 => fixture.loadout(&name, name.as_bytes()),
            2 => fixture.disk(&name, b"x").previous(&name, b"x"),
            _ => fixture.disk(&name, b"y").previous(&name, b"z").loadout(&name, b"w"),
        };
    }

    let disk = fixture.disk.state();
    let previous: Snapshot = fixture.snapshots.snapshot();
    let forward = SyncTreeBuilder::new(&disk, &previous, &fixture.loadout, &fixture.archive)
        .with_workers(1)
        .build()
        .unwrap();

    let reversed = Reversed(fixture.disk.state());
    let backward = SyncTreeBuilder::new(&reversed, &previous, &fixture.loadout, &fixture.archive)
        .with_workers(7)
        .build()
        .unwrap();

    assert_eq!(forward, backward);
    assert_eq!(forward.len(), 40);
}

#[rstest]
#[case(1)]
#[case(3)]
#[case(16)]
fn worker_count_does_not_change_outcome(#[case] workers: usize) {
    let fixture = Fixture::new().with_workers(workers);
    for i in 0..12 {
        fixture.loadout(&format!("f{i}.esp"), format!("content {i}").as_bytes());
    }
    let report = fixture.sync();
    assert_eq!(report.extracted, 12);
    assert!(report.is_clean());
    assert_eq!(fixture.snapshots.snapshot().len(), 12);
}

// ============================================================================
// Idempotence
// ============================================================================

const CONTENTS: [&[u8]; 3] = [b"one", b"two", b"three"];

fn content() -> impl Strategy<Value = Option<usize>> {
    prop_oneof![Just(None), (0..CONTENTS.len()).prop_map(Some)]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn passes_converge_to_a_fixpoint(
        states in prop::collection::vec(
            (content(), content(), content(), any::<bool>(), any::<bool>()),
            1..6,
        ),
        archived in any::<[bool; 3]>(),
    ) {
        let fixture = Fixture::new();
        for (index, archive) in archived.iter().enumerate() {
            if *archive {
                fixture.archived(CONTENTS[index]);
            }
        }
        for (i, (disk, previous, loadout, tombstone, ignored)) in states.iter().enumerate() {
            let name = format!("p{i}");
            if let Some(c) = disk {
                fixture.disk(&name, CONTENTS[*c]);
            }
            if let Some(c) = previous {
                fixture.previous(&name, CONTENTS[*c]);
            }
            match loadout {
                Some(c) => {
                    fixture.loadout_unarchived(&name, CONTENTS[*c]);
                }
                None if *tombstone => {
                    fixture.tombstone(&name);
                }
                None => {}
            }
            if *ignored {
                fixture.ignore(&name);
            }
        }

        // Backups feed the archive, which can unlock other paths on the
        // next pass
        let mut passes = 0;
        while fixture.plan().nodes().any(|node| !settled(node.actions)) {
            prop_assert!(passes < 10, "no fixpoint after {} passes", passes);
            let report = fixture.sync();
            prop_assert!(report.failures.is_empty(), "{:?}", report.failures);
            passes += 1;
        }

        // Once settled, passes only refresh Previous
        fixture.sync();
        let settled_tree = fixture.plan();
        fixture.sync();
        prop_assert_eq!(fixture.plan(), settled_tree);
    }
}

fn settled(actions: Actions) -> bool {
    actions == Actions::DO_NOTHING || actions.is_warning()
}
