//! # Concurrent Access Tests
//!
//! `RecordsStorage` takes no locks on the record path: every field is an
//! independent atomic word. These tests check what that buys and what it does
//! not:
//!
//! 1. **No lost updates per field**: writers of different fields of the same
//!    record never overwrite each other
//! 2. **Unique allocation**: concurrent `allocate_record` calls never hand out
//!    the same id twice
//! 3. **Safe page creation**: threads racing to touch new pages all see the
//!    same mapping
//! 4. **No multi-field atomicity**: `fill_record` readers may observe a mix
//!    of old and new field values
//!
//! ## Usage
//!
//! ```sh
//! cargo test --test concurrent_access --release
//! ```

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

use fsrecords::config::MIN_PAGE_SIZE;
use fsrecords::RecordsStorage;
use tempfile::{tempdir, TempDir};

const THREADS: usize = 8;

fn open_storage() -> (TempDir, RecordsStorage) {
    let dir = tempdir().unwrap();
    let storage = RecordsStorage::builder()
        .page_size(MIN_PAGE_SIZE)
        .open(dir.path().join("records.dat"))
        .unwrap();
    (dir, storage)
}

#[test]
fn writers_of_different_fields_do_not_lose_updates() {
    let (_dir, storage) = open_storage();
    let id = storage.allocate_record().unwrap();
    let iterations = 10_000;
    let barrier = Barrier::new(2);

    thread::scope(|scope| {
        scope.spawn(|| {
            barrier.wait();
            for value in 1..=iterations {
                assert!(storage.set_flags(id, value).unwrap());
            }
        });
        scope.spawn(|| {
            barrier.wait();
            for value in 1..=iterations {
                assert!(storage.set_record_length(id, value as i64).unwrap());
            }
        });
    });

    assert_eq!(storage.flags(id).unwrap(), iterations);
    assert_eq!(storage.record_length(id).unwrap(), iterations as i64);
    assert_eq!(storage.global_mod_count(), 2 * iterations);

    let mod_count = storage.mod_count(id).unwrap();
    assert!(mod_count > 0 && mod_count <= 2 * iterations);
}

#[test]
fn concurrent_allocation_hands_out_unique_ids() {
    let (_dir, storage) = open_storage();
    let storage = Arc::new(storage);
    let per_thread = 2_000;
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let storage = Arc::clone(&storage);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                (0..per_thread)
                    .map(|_| storage.allocate_record().unwrap())
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let mut ids: Vec<i32> = handles
        .into_iter()
        .flat_map(|h| h.join().unwrap())
        .collect();
    ids.sort_unstable();

    let total = (THREADS * per_thread) as i32;
    assert_eq!(ids, (0..total).collect::<Vec<_>>());
    assert_eq!(storage.records_count(), total);
}

#[test]
fn concurrent_writers_across_new_pages_see_their_own_records() {
    let (_dir, storage) = open_storage();
    let per_thread = 1_000;
    let total = (THREADS * per_thread) as i32;
    for _ in 0..total {
        storage.allocate_record().unwrap();
    }
    let barrier = Barrier::new(THREADS);

    thread::scope(|scope| {
        for t in 0..THREADS as i32 {
            let storage = &storage;
            let barrier = &barrier;
            scope.spawn(move || {
                barrier.wait();
                // interleave so that every thread touches every page
                for id in (t..total).step_by(THREADS) {
                    storage
                        .fill_record(id, id as i64, -(id as i64), t, id + 1, 0, true)
                        .unwrap();
                }
            });
        }
    });

    for id in 0..total {
        let record = storage.read_record(id, |r| r.snapshot()).unwrap();
        assert_eq!(record.flags, id % THREADS as i32);
        assert_eq!(record.name_id, id + 1);
        assert_eq!(record.timestamp, id as i64);
        assert_eq!(record.length, -(id as i64));
    }

    let stamps: HashSet<i32> = (0..total)
        .map(|id| storage.mod_count(id).unwrap())
        .collect();
    assert_eq!(stamps.len(), total as usize, "every write gets a unique stamp");
    assert_eq!(storage.global_mod_count(), total);
}

#[test]
fn force_during_writes_never_loses_the_dirty_state() {
    let (_dir, storage) = open_storage();
    let id = storage.allocate_record().unwrap();
    let done = AtomicBool::new(false);

    thread::scope(|scope| {
        scope.spawn(|| {
            for value in 1..=5_000 {
                storage.set_flags(id, value).unwrap();
            }
            done.store(true, Ordering::Release);
        });
        scope.spawn(|| {
            while !done.load(Ordering::Acquire) {
                storage.force().unwrap();
            }
        });
    });

    storage.force().unwrap();
    let persisted = storage
        .read_header(|h| h.persisted_global_mod_count())
        .unwrap();
    assert_eq!(persisted, storage.global_mod_count());
    assert!(!storage.is_dirty());
}

/// `fill_record` is a sequence of independent stores. A reader racing with it
/// may see fields from different fills. This is a known relaxation: the test
/// only checks that every field individually holds a value some writer wrote.
#[test]
fn fill_record_readers_may_observe_partial_updates() {
    let (_dir, storage) = open_storage();
    let id = storage.allocate_record().unwrap();
    let fills = 20_000;
    let done = AtomicBool::new(false);

    let torn_reads = thread::scope(|scope| {
        scope.spawn(|| {
            for v in 1..=fills {
                storage
                    .fill_record(id, v as i64, v as i64, v, v, v, true)
                    .unwrap();
            }
            done.store(true, Ordering::Release);
        });

        let reader = scope.spawn(|| {
            let mut torn = 0usize;
            while !done.load(Ordering::Acquire) {
                let record = storage.read_record(id, |r| r.snapshot()).unwrap();
                let fields = [
                    record.parent_id as i64,
                    record.name_id as i64,
                    record.flags as i64,
                    record.timestamp,
                    record.length,
                ];
                assert!(fields.iter().all(|f| (0..=fills as i64).contains(f)));
                if fields.iter().any(|f| *f != fields[0]) {
                    torn += 1;
                }
            }
            torn
        });

        reader.join().unwrap()
    });

    let record = storage.read_record(id, |r| r.snapshot()).unwrap();
    assert_eq!(record.parent_id, fills);
    assert_eq!(record.length, fills as i64);
    assert_eq!(record.mod_count, fills);

    // not asserted: the window is small and may never be hit
    println!("observed {} torn reads", torn_reads);
}

#[test]
fn storage_is_send_and_sync() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<RecordsStorage>();
}
