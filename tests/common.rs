//! Shared helpers for integration tests.

#![allow(dead_code)]

use redb::{ReadableDatabase, TableDefinition};
use sessreap::store::SessionStore;
use std::time::Duration;
use tempfile::TempDir;

/// A session store on a temporary database file.
pub struct TestDb {
    pub store: SessionStore,
    _dir: TempDir,
}

impl TestDb {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let store = SessionStore::open_path(dir.path().join("sessions.redb")).unwrap();
        Self { store, _dir: dir }
    }

    fn table(&self) -> TableDefinition<'_, &'static [u8], &'static [u8]> {
        TableDefinition::new(self.store.namespace())
    }

    /// Writes raw bytes, bypassing the record codec.
    pub fn put_raw(&self, key: &[u8], value: &[u8]) {
        let db = self.store.database();
        let txn = db.begin_write().unwrap();
        {
            let mut table = txn.open_table(self.table()).unwrap();
            table.insert(key, value).unwrap();
        }
        txn.commit().unwrap();
    }

    /// Presence check that does not trigger load-time expiry.
    pub fn raw_exists(&self, key: &[u8]) -> bool {
        let db = self.store.database();
        let txn = db.begin_read().unwrap();
        let table = txn.open_table(self.table()).unwrap();
        table.get(key).unwrap().is_some()
    }
}

/// Polls `condition` every 10ms for up to 5 seconds.
pub async fn wait_for(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}
