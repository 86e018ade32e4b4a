//! Core `SessionStore` implementation with synchronous operations.

use redb::{Database, ReadableDatabase, ReadableTable, ReadableTableMetadata};
use std::path::Path;
use std::sync::Arc;

use super::{namespace_table, read_stored};
use crate::config::StoreConfig;
use crate::error::{Error, Result, StorageContext};
use crate::record::{self, Record};

/// Record counts of a namespace at a point in time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    /// Records that are readable and not expired.
    pub live: usize,
    /// Records past their expiration.
    pub expired: usize,
    /// Values that could not be decoded.
    pub malformed: usize,
}

impl StoreStats {
    /// Total number of stored values.
    pub const fn total(&self) -> usize {
        self.live + self.expired + self.malformed
    }
}

/// Session store wrapping a redb database.
///
/// # Thread Safety
///
/// `SessionStore` is `Clone` and can be shared across threads. Concurrency
/// control is left entirely to redb's transactions: snapshot readers and a
/// single serialized writer.
#[derive(Clone)]
pub struct SessionStore {
    db: Arc<Database>,
    namespace: Arc<str>,
    default_max_age_secs: i64,
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("namespace", &self.namespace)
            .field("default_max_age_secs", &self.default_max_age_secs)
            .finish_non_exhaustive()
    }
}

impl SessionStore {
    /// Opens or creates the database file and its namespace.
    ///
    /// Creates parent directories if needed. Fails if the namespace cannot
    /// be created; such a store must not serve requests.
    pub fn open(config: &StoreConfig) -> Result<Self> {
        let path = config.path.as_path();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::io(format!("create {}", parent.display()), e))?;
        }

        let db = Database::create(path)
            .map_err(|e| Error::storage(format!("open database {}", path.display()), e))?;

        let mut store = Self::with_database(Arc::new(db), &config.namespace)?;
        store.default_max_age_secs = config.default_max_age_secs;

        tracing::debug!(
            path = %path.display(),
            namespace = %store.namespace,
            "Session store opened"
        );
        Ok(store)
    }

    /// Opens a database file with default store settings.
    pub fn open_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open(&StoreConfig::at(path.as_ref()))
    }

    /// Builds a store over an already open database.
    ///
    /// The namespace is created if missing.
    pub fn with_database(db: Arc<Database>, namespace: &str) -> Result<Self> {
        if namespace.is_empty() {
            return Err(Error::Config("namespace cannot be empty".to_string()));
        }

        let store = Self {
            db,
            namespace: Arc::from(namespace),
            default_max_age_secs: crate::constants::DEFAULT_MAX_AGE_SECS,
        };
        store.ensure_namespace()?;
        Ok(store)
    }

    /// Creates the namespace if it does not exist yet. Idempotent.
    pub fn ensure_namespace(&self) -> Result<()> {
        let write_txn = self
            .db
            .begin_write()
            .storage_context("begin initialization transaction")?;
        {
            let _table = write_txn
                .open_table(namespace_table(&self.namespace))
                .storage_context("create namespace")?;
        }
        write_txn
            .commit()
            .storage_context("commit initialization transaction")
    }

    /// The shared database handle.
    pub fn database(&self) -> Arc<Database> {
        Arc::clone(&self.db)
    }

    /// The namespace this store reads and writes.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Lifetime applied by [`SessionStore::save_default`].
    pub const fn default_max_age_secs(&self) -> i64 {
        self.default_max_age_secs
    }

    /// Loads a record.
    ///
    /// Returns `None` if the key is absent or the record has expired; an
    /// expired record is deleted before returning. A value that cannot be
    /// decoded is reported as [`Error::Decode`].
    pub fn load(&self, key: &[u8]) -> Result<Option<Record>> {
        let record = {
            let read_txn = self
                .db
                .begin_read()
                .storage_context("begin read transaction")?;
            let table = read_txn
                .open_table(namespace_table(&self.namespace))
                .storage_context("open namespace")?;

            let value = table.get(key).storage_context("read record")?;
            match value {
                Some(guard) => record::decode(guard.value())?,
                None => return Ok(None),
            }
        };

        let now = record::unix_now();
        if record.is_expired_at(now) {
            // The read transaction is closed at this point.
            if self.delete_if_expired(key, now)? {
                tracing::debug!(namespace = %self.namespace, "Removed expired record on load");
            }
            return Ok(None);
        }

        Ok(Some(record))
    }

    /// Stores `payload` under `key` for `max_age_secs`, replacing any
    /// existing record.
    pub fn save(&self, key: &[u8], payload: &[u8], max_age_secs: i64) -> Result<()> {
        self.save_record(key, &Record::new(payload.to_vec(), max_age_secs))
    }

    /// Stores `payload` with the configured default lifetime.
    pub fn save_default(&self, key: &[u8], payload: &[u8]) -> Result<()> {
        self.save(key, payload, self.default_max_age_secs)
    }

    /// Stores a prepared record, replacing any existing one.
    pub fn save_record(&self, key: &[u8], record: &Record) -> Result<()> {
        let value = record::encode(record)?;

        let write_txn = self
            .db
            .begin_write()
            .storage_context("begin write transaction")?;
        {
            let mut table = write_txn
                .open_table(namespace_table(&self.namespace))
                .storage_context("open namespace")?;
            table
                .insert(key, value.as_slice())
                .storage_context("insert record")?;
        }
        write_txn.commit().storage_context("commit save transaction")
    }

    /// Deletes a record.
    ///
    /// Returns `Ok(true)` if the key existed, `Ok(false)` otherwise.
    /// Idempotent - safe to race with the reaper.
    pub fn delete(&self, key: &[u8]) -> Result<bool> {
        let write_txn = self
            .db
            .begin_write()
            .storage_context("begin write transaction")?;
        let removed = {
            let mut table = write_txn
                .open_table(namespace_table(&self.namespace))
                .storage_context("open namespace")?;
            table.remove(key).storage_context("remove record")?.is_some()
        };
        write_txn
            .commit()
            .storage_context("commit delete transaction")?;
        Ok(removed)
    }

    /// Deletes `key` only if its current value is expired at `now` or
    /// cannot be decoded. Returns whether something was removed.
    pub(crate) fn delete_if_expired(&self, key: &[u8], now: i64) -> Result<bool> {
        let write_txn = self
            .db
            .begin_write()
            .storage_context("begin write transaction")?;
        let removed = {
            let mut table = write_txn
                .open_table(namespace_table(&self.namespace))
                .storage_context("open namespace")?;
            if read_stored(&table, key, now)?.is_reapable() {
                table.remove(key).storage_context("remove record")?.is_some()
            } else {
                false
            }
        };
        write_txn
            .commit()
            .storage_context("commit delete transaction")?;
        Ok(removed)
    }

    /// Number of stored values, expired and malformed ones included.
    pub fn len(&self) -> Result<u64> {
        let read_txn = self
            .db
            .begin_read()
            .storage_context("begin read transaction")?;
        let table = read_txn
            .open_table(namespace_table(&self.namespace))
            .storage_context("open namespace")?;
        table.len().storage_context("count records")
    }

    /// Whether the namespace holds no values.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Classifies every stored value at `now`.
    ///
    /// Scans the whole namespace in one read transaction; meant for
    /// diagnostics, not for request paths.
    pub fn stats_at(&self, now: i64) -> Result<StoreStats> {
        let read_txn = self
            .db
            .begin_read()
            .storage_context("begin read transaction")?;
        let table = read_txn
            .open_table(namespace_table(&self.namespace))
            .storage_context("open namespace")?;

        let mut stats = StoreStats::default();
        for entry in table.iter().storage_context("iterate namespace")? {
            let (_key, value) = entry.storage_context("read record")?;
            match record::decode(value.value()) {
                Ok(record) if record.is_expired_at(now) => stats.expired += 1,
                Ok(_) => stats.live += 1,
                Err(_) => stats.malformed += 1,
            }
        }
        Ok(stats)
    }

    /// Writes a raw value, bypassing the codec.
    #[cfg(test)]
    pub(crate) fn put_raw(&self, key: &[u8], value: &[u8]) -> Result<()> {
        let write_txn = self
            .db
            .begin_write()
            .storage_context("begin write transaction")?;
        {
            let mut table = write_txn
                .open_table(namespace_table(&self.namespace))
                .storage_context("open namespace")?;
            table.insert(key, value).storage_context("insert raw value")?;
        }
        write_txn.commit().storage_context("commit raw write")
    }
}
