//! Session record store backed by redb.
//!
//! Records live in one namespace (a redb table keyed by raw bytes). Reads
//! detect expiration and remove the stale record in a separate write
//! transaction once the read transaction is gone; redb never nests the two.
//!
//! # Async Usage
//!
//! All database operations are blocking. When using from async contexts,
//! use the async methods (`load_async`, `save_async`, ...) which wrap the
//! operation in `spawn_blocking`.

mod async_ops;
mod session;


use redb::{ReadableTable, TableDefinition};

pub use session::{SessionStore, StoreStats};

use crate::error::{Result, StorageContext};
use crate::record::{self, Record};

/// Table definition for a namespace of raw byte keys and encoded records.
pub(crate) const fn namespace_table(name: &str) -> TableDefinition<'_, &'static [u8], &'static [u8]> {
    TableDefinition::new(name)
}

/// What a key holds when looked up inside a write transaction.
pub(crate) enum Stored {
    Missing,
    Live,
    Expired(Record),
    Malformed,
}

impl Stored {
    /// Whether the value may be removed.
    pub(crate) const fn is_reapable(&self) -> bool {
        matches!(self, Self::Expired(_) | Self::Malformed)
    }
}

/// Reads and classifies the current value of `key` at `now`.
///
/// Deletions decided in an earlier read transaction go through this first,
/// so a record renewed in the meantime is left alone.
pub(crate) fn read_stored<T>(table: &T, key: &[u8], now: i64) -> Result<Stored>
where
    T: ReadableTable<&'static [u8], &'static [u8]>,
{
    let value = table.get(key).storage_context("re-read record")?;
    let stored = match value {
        None => Stored::Missing,
        Some(guard) => match record::decode(guard.value()) {
            Ok(record) if record.is_expired_at(now) => Stored::Expired(record),
            Ok(_) => Stored::Live,
            Err(_) => Stored::Malformed,
        },
    };
    Ok(stored)
}
