//! Atomic writes racing on the same and on different files

use loadout_fs::{NormalizedPath, io};
use std::sync::Barrier;
use std::thread;
use tempfile::tempdir;

const WRITERS: usize = 8;

/// Content long enough that a torn write would be visible.
fn payload(writer: usize) -> Vec<u8> {
    format!("writer-{writer}|").repeat(512).into_bytes()
}

#[test]
fn racing_writers_leave_one_whole_payload() {
    let dir = tempdir().unwrap();
    let target = NormalizedPath::new(dir.path().join("Data/plugin.esp"));
    let barrier = Barrier::new(WRITERS);

    thread::scope(|scope| {
        for writer in 0..WRITERS {
            let (target, barrier) = (&target, &barrier);
            scope.spawn(move || {
                barrier.wait();
                for _ in 0..5 {
                    io::write_atomic(target, &payload(writer)).unwrap();
                }
            });
        }
    });

    let content = std::fs::read(target.to_native()).unwrap();
    assert!(
        (0..WRITERS).any(|writer| content == payload(writer)),
        "final content is not any single writer's payload"
    );
}

#[test]
fn racing_writers_leave_no_temp_files() {
    let dir = tempdir().unwrap();
    let barrier = Barrier::new(WRITERS);

    thread::scope(|scope| {
        for writer in 0..WRITERS {
            let (root, barrier) = (dir.path(), &barrier);
            scope.spawn(move || {
                barrier.wait();
                let target = NormalizedPath::new(root.join(format!("shard/{writer:02}.blob")));
                io::write_atomic(&target, &payload(writer)).unwrap();
            });
        }
    });

    let names: Vec<String> = std::fs::read_dir(dir.path().join("shard"))
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names.len(), WRITERS);
    assert!(names.iter().all(|name| !name.ends_with(io::TEMP_SUFFIX)));
}
