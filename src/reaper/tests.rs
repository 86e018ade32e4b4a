//! Tests for sweep batches and the reaper loop.

use super::*;
use crate::error::HookError;
use crate::record::{self, Record};
use crate::store::SessionStore;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

const NOW: i64 = 1_700_000_000;

fn open_store(tmp: &TempDir) -> SessionStore {
    SessionStore::open_path(tmp.path().join("reaper.redb")).unwrap()
}

fn put(store: &SessionStore, key: &str, max_age: i64) {
    store
        .save_record(key.as_bytes(), &Record::new_at(key.as_bytes().to_vec(), max_age, NOW))
        .unwrap();
}

fn keys(store: &SessionStore) -> BTreeSet<String> {
    ["k1", "k2", "k3", "k4", "k5", "live", "forever", "bad"]
        .into_iter()
        .filter(|k| raw_exists(store, k))
        .map(str::to_string)
        .collect()
}

/// Presence check that bypasses load-time expiry.
fn raw_exists(store: &SessionStore, key: &str) -> bool {
    use redb::ReadableDatabase;
    let db = store.database();
    let txn = db.begin_read().unwrap();
    let table = txn
        .open_table(crate::store::namespace_table(store.namespace()))
        .unwrap();
    table.get(key.as_bytes()).unwrap().is_some()
}

#[test]
fn test_empty_namespace_is_a_noop() {
    let tmp = TempDir::new().unwrap();
    let store = open_store(&tmp);
    let mut sweeper = Sweeper::for_store(&store, ReaperOptions::new());

    let report = sweeper.sweep_at(NOW).unwrap();
    assert_eq!(report.examined, 0);
    assert!(report.pass_complete);
    assert!(sweeper.resume_key().is_none());
}

#[test]
fn test_missing_namespace_is_a_noop() {
    let tmp = TempDir::new().unwrap();
    let store = open_store(&tmp);
    let mut sweeper = Sweeper::new(
        store.database(),
        ReaperOptions::new().with_namespace("never-created"),
    );

    let report = sweeper.sweep_at(NOW).unwrap();
    assert_eq!(report, BatchReport {
        pass_complete: true,
        ..BatchReport::default()
    });
}

#[test]
fn test_removes_only_expired_records() {
    let tmp = TempDir::new().unwrap();
    let store = open_store(&tmp);
    put(&store, "k1", -10);
    put(&store, "k2", -1);
    put(&store, "live", 3600);
    put(&store, "forever", 0);

    let mut sweeper = Sweeper::for_store(&store, ReaperOptions::new());
    let report = sweeper.sweep_at(NOW).unwrap();

    assert_eq!(report.examined, 4);
    assert_eq!(report.expired, 2);
    assert_eq!(report.deleted, 2);
    assert!(report.pass_complete);
    assert_eq!(
        keys(&store),
        BTreeSet::from(["live".to_string(), "forever".to_string()])
    );
}

#[test]
fn test_expiration_boundary_is_inclusive() {
    let tmp = TempDir::new().unwrap();
    let store = open_store(&tmp);
    store
        .save_record(b"k1", &Record {
            payload: Vec::new(),
            expires_at: Some(NOW),
        })
        .unwrap();
    store
        .save_record(b"k2", &Record {
            payload: Vec::new(),
            expires_at: Some(NOW + 1),
        })
        .unwrap();

    let mut sweeper = Sweeper::for_store(&store, ReaperOptions::new());
    assert_eq!(sweeper.sweep_at(NOW).unwrap().deleted, 1);
    assert!(!raw_exists(&store, "k1"));
    assert!(raw_exists(&store, "k2"));
}

#[test]
fn test_batches_resume_after_last_key() {
    let tmp = TempDir::new().unwrap();
    let store = open_store(&tmp);
    for key in ["k1", "k2", "k3", "k4", "k5"] {
        put(&store, key, -1);
    }

    let mut sweeper = Sweeper::for_store(&store, ReaperOptions::new().with_batch_size(2));

    let first = sweeper.sweep_at(NOW).unwrap();
    assert_eq!((first.examined, first.deleted, first.pass_complete), (2, 2, false));
    assert_eq!(sweeper.resume_key(), Some(&b"k2"[..]));

    let second = sweeper.sweep_at(NOW).unwrap();
    assert_eq!((second.examined, second.deleted, second.pass_complete), (2, 2, false));
    assert_eq!(sweeper.resume_key(), Some(&b"k4"[..]));

    let third = sweeper.sweep_at(NOW).unwrap();
    assert_eq!((third.examined, third.deleted, third.pass_complete), (1, 1, true));
    assert!(sweeper.resume_key().is_none());

    assert!(store.is_empty().unwrap());
}

#[test]
fn test_each_entry_visited_once_per_pass() {
    let tmp = TempDir::new().unwrap();
    let store = open_store(&tmp);
    for i in 0..23 {
        put(&store, &format!("key-{i:03}"), 3600);
    }

    for batch_size in [1, 2, 5, 7, 22, 23, 24, 100] {
        let mut sweeper =
            Sweeper::for_store(&store, ReaperOptions::new().with_batch_size(batch_size));
        let mut examined = 0;
        let mut ticks = 0;
        loop {
            let report = sweeper.sweep_at(NOW).unwrap();
            assert!(report.examined <= batch_size);
            examined += report.examined;
            ticks += 1;
            if report.pass_complete {
                break;
            }
        }
        assert_eq!(examined, 23, "batch size {batch_size}");
        assert_eq!(ticks, 23 / batch_size + 1, "batch size {batch_size}");
    }
    assert_eq!(store.len().unwrap(), 23);
}

#[test]
fn test_resume_key_deleted_between_batches() {
    let tmp = TempDir::new().unwrap();
    let store = open_store(&tmp);
    for key in ["k1", "k2", "k3", "k4"] {
        put(&store, key, 3600);
    }

    let mut sweeper = Sweeper::for_store(&store, ReaperOptions::new().with_batch_size(2));
    sweeper.sweep_at(NOW).unwrap();
    assert_eq!(sweeper.resume_key(), Some(&b"k2"[..]));

    store.delete(b"k2").unwrap();
    let report = sweeper.sweep_at(NOW).unwrap();
    assert_eq!(report.examined, 2);
    assert_eq!(sweeper.resume_key(), Some(&b"k4"[..]));
}

#[test]
fn test_malformed_values_are_removed() {
    let tmp = TempDir::new().unwrap();
    let store = open_store(&tmp);
    store.put_raw(b"bad", b"\x00\x01\x02").unwrap();
    put(&store, "live", 3600);

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let options = ReaperOptions::new().with_pre_delete(move |key: &[u8], payload: Option<&[u8]>| -> Result<(), HookError> {
        sink.lock().unwrap().push((key.to_vec(), payload.map(<[u8]>::to_vec)));
        Ok(())
    });
    let mut sweeper = Sweeper::for_store(&store, options);

    let report = sweeper.sweep_at(NOW).unwrap();
    assert_eq!(report.malformed, 1);
    assert_eq!(report.deleted, 1);
    assert!(!raw_exists(&store, "bad"));
    assert!(raw_exists(&store, "live"));
    assert_eq!(*seen.lock().unwrap(), vec![(b"bad".to_vec(), None)]);
}

#[test]
fn test_hook_failure_keeps_only_that_record() {
    let tmp = TempDir::new().unwrap();
    let store = open_store(&tmp);
    for key in ["k1", "k2", "k3"] {
        put(&store, key, -1);
    }

    let options = ReaperOptions::new().with_pre_delete(|key: &[u8], payload: Option<&[u8]>| -> Result<(), HookError> {
        // Payload is the record's payload, which the helper sets to the key.
        assert_eq!(payload, Some(key));
        if key == b"k2" {
            Err(HookError::new("still in use"))
        } else {
            Ok(())
        }
    });
    let mut sweeper = Sweeper::for_store(&store, options);

    let report = sweeper.sweep_at(NOW).unwrap();
    assert_eq!(report.expired, 3);
    assert_eq!(report.deleted, 2);
    assert_eq!(report.skipped, 1);
    assert_eq!(keys(&store), BTreeSet::from(["k2".to_string()]));
}

#[test]
fn test_json_hook_sees_decoded_values() {
    let tmp = TempDir::new().unwrap();
    let store = open_store(&tmp);
    store
        .save_record(b"k1", &Record::new_at(br#"{"user":"ada"}"#.to_vec(), -1, NOW))
        .unwrap();

    let users = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&users);
    let hook = JsonHook::new(
        move |_key: &[u8], values: Option<std::collections::HashMap<String, String>>| {
            sink.lock().unwrap().extend(values.and_then(|mut v| v.remove("user")));
            Ok(())
        },
    );
    let mut sweeper = Sweeper::for_store(&store, ReaperOptions::new().with_pre_delete(hook));

    assert_eq!(sweeper.sweep_at(NOW).unwrap().deleted, 1);
    assert_eq!(*users.lock().unwrap(), vec!["ada".to_string()]);
}

#[test]
fn test_full_pass_aggregates_batches() {
    let tmp = TempDir::new().unwrap();
    let store = open_store(&tmp);
    for i in 0..10 {
        store.save(format!("old-{i}").as_bytes(), b"", -1).unwrap();
        store.save(format!("new-{i}").as_bytes(), b"", 3600).unwrap();
    }

    let mut sweeper = Sweeper::for_store(&store, ReaperOptions::new().with_batch_size(3));
    let total = sweeper.sweep_full_pass().unwrap();
    assert_eq!(total.examined, 20);
    assert_eq!(total.deleted, 10);
    assert!(total.pass_complete);
    assert_eq!(store.len().unwrap(), 10);
}

#[test]
fn test_racing_delete_is_harmless() {
    let tmp = TempDir::new().unwrap();
    let store = open_store(&tmp);
    put(&store, "k1", -1);

    // A load removes the record after the scan would have seen it.
    assert!(store.load(b"k1").unwrap().is_none());
    let mut sweeper = Sweeper::for_store(&store, ReaperOptions::new());
    let report = sweeper.sweep_at(record::unix_now()).unwrap();
    assert_eq!(report.deleted, 0);
    assert!(!store.delete(b"k1").unwrap());
}

/// In-memory storage whose writes can be switched to fail.
#[derive(Debug)]
struct FailingBackend {
    inner: redb::backends::InMemoryBackend,
    fail_writes: Arc<AtomicBool>,
}

impl FailingBackend {
    fn check(&self) -> std::io::Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            Err(std::io::Error::other("disk full"))
        } else {
            Ok(())
        }
    }
}

impl redb::StorageBackend for FailingBackend {
    fn len(&self) -> std::io::Result<u64> {
        redb::StorageBackend::len(&self.inner)
    }

    fn read(&self, offset: u64, out: &mut [u8]) -> std::io::Result<()> {
        redb::StorageBackend::read(&self.inner, offset, out)
    }

    fn set_len(&self, len: u64) -> std::io::Result<()> {
        self.check()?;
        redb::StorageBackend::set_len(&self.inner, len)
    }

    fn sync_data(&self) -> std::io::Result<()> {
        self.check()?;
        redb::StorageBackend::sync_data(&self.inner)
    }

    fn write(&self, offset: u64, data: &[u8]) -> std::io::Result<()> {
        self.check()?;
        redb::StorageBackend::write(&self.inner, offset, data)
    }
}

#[test]
fn test_failed_batch_keeps_resume_key() {
    let fail_writes = Arc::new(AtomicBool::new(false));
    let backend = FailingBackend {
        inner: redb::backends::InMemoryBackend::new(),
        fail_writes: Arc::clone(&fail_writes),
    };
    let db = Arc::new(redb::Database::builder().create_with_backend(backend).unwrap());
    let store = SessionStore::with_database(Arc::clone(&db), "sessions").unwrap();
    for key in ["k1", "k2", "k3", "k4", "k5"] {
        put(&store, key, -1);
    }

    let mut sweeper = Sweeper::new(db, ReaperOptions::new().with_batch_size(2));
    assert_eq!(sweeper.sweep_at(NOW).unwrap().deleted, 2);
    assert_eq!(sweeper.resume_key(), Some(&b"k2"[..]));

    // The scan of k3 and k4 succeeds; removing them cannot be committed.
    fail_writes.store(true, Ordering::SeqCst);
    assert!(sweeper.sweep_at(NOW).is_err());
    assert_eq!(sweeper.resume_key(), Some(&b"k2"[..]));
}

// =============================================================================
// Reaper loop
// =============================================================================

async fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    for _ in 0..200 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}

#[tokio::test]
async fn test_reaper_removes_expired_records() {
    let tmp = TempDir::new().unwrap();
    let store = open_store(&tmp);
    store.save(b"k1", b"old", -1).unwrap();
    store.save(b"k2", b"new", 3600).unwrap();

    let reaper = ReaperHandle::start(
        &store,
        ReaperOptions::new().with_check_interval(Duration::from_millis(20)),
    );

    assert!(wait_until(|| store.len().unwrap() == 1).await);
    reaper.stop().await;
    assert!(store.load(b"k2").unwrap().is_some());
}

#[tokio::test]
async fn test_quit_waits_for_loop_exit() {
    let tmp = TempDir::new().unwrap();
    let store = open_store(&tmp);

    let (quit_tx, done_rx) = run(
        store.database(),
        ReaperOptions::new().with_check_interval(Duration::from_millis(5)),
    );
    tokio::time::sleep(Duration::from_millis(30)).await;

    tokio::time::timeout(Duration::from_secs(5), quit(quit_tx, done_rx))
        .await
        .expect("reaper did not stop");
}

#[tokio::test]
async fn test_dropping_quit_sender_stops_loop() {
    let tmp = TempDir::new().unwrap();
    let store = open_store(&tmp);

    let (quit_tx, done_rx) = ReaperHandle::start(&store, ReaperOptions::new()).into_parts();
    drop(quit_tx);

    tokio::time::timeout(Duration::from_secs(5), done_rx)
        .await
        .expect("reaper did not stop")
        .unwrap();
}

#[tokio::test]
async fn test_stop_before_first_tick_runs_no_batch() {
    let tmp = TempDir::new().unwrap();
    let store = open_store(&tmp);
    store.save(b"k1", b"old", -1).unwrap();

    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let options = ReaperOptions::new()
        .with_check_interval(Duration::from_secs(3600))
        .with_pre_delete(move |_: &[u8], _: Option<&[u8]>| -> Result<(), HookError> {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

    ReaperHandle::start(&store, options).stop().await;
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(store.len().unwrap(), 1);
}

#[tokio::test]
async fn test_panicking_hook_does_not_kill_reaper() {
    let tmp = TempDir::new().unwrap();
    let store = open_store(&tmp);
    store.save(b"boom", b"", -1).unwrap();

    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let options = ReaperOptions::new()
        .with_check_interval(Duration::from_millis(10))
        .with_pre_delete(move |key: &[u8], _: Option<&[u8]>| -> Result<(), HookError> {
            // Panic on the first attempt only.
            assert!(counter.fetch_add(1, Ordering::SeqCst) > 0 || key != b"boom", "hook exploded");
            Ok(())
        });
    let reaper = ReaperHandle::start(&store, options);

    assert!(wait_until(|| store.is_empty().unwrap()).await);
    assert!(calls.load(Ordering::SeqCst) >= 2);
    reaper.stop().await;
}
