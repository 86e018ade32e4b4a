//! One bounded sweep batch over a namespace.
//!
//! A batch scans at most `batch_size` records in a single read transaction,
//! starting right after the key where the previous batch stopped. Expired
//! and undecodable records are collected and then removed in one write
//! transaction. The resume key only advances when both transactions
//! succeeded, so a failed batch is retried from the same position.

use redb::{Database, ReadableDatabase, TableError};
use std::ops::Bound;
use std::sync::Arc;
use std::time::Instant;

use super::options::ReaperOptions;
use crate::error::{Error, Result, StorageContext};
use crate::metrics;
use crate::record;
use crate::store::{SessionStore, Stored, namespace_table, read_stored};

/// Outcome of one or more sweep batches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchReport {
    /// Records looked at.
    pub examined: usize,
    /// Records found expired, malformed ones included.
    pub expired: usize,
    /// Records whose value could not be decoded.
    pub malformed: usize,
    /// Records actually removed.
    pub deleted: usize,
    /// Expired records kept because the pre-delete hook failed.
    pub skipped: usize,
    /// The scan reached the end of the namespace; the next batch starts over.
    pub pass_complete: bool,
}

impl BatchReport {
    /// Adds the counts of a later batch.
    pub fn absorb(&mut self, later: &Self) {
        self.examined += later.examined;
        self.expired += later.expired;
        self.malformed += later.malformed;
        self.deleted += later.deleted;
        self.skipped += later.skipped;
        self.pass_complete = later.pass_complete;
    }
}

/// Result of the read half of a batch. Keys are owned copies; redb guards
/// do not outlive the read transaction.
#[derive(Default)]
struct Scan {
    examined: usize,
    malformed: usize,
    expired: Vec<Vec<u8>>,
    next_resume: Option<Vec<u8>>,
}

/// Executes sweep batches and owns the resume position between them.
///
/// The resume key is plain owned state: only the sweeper's owner (the
/// reaper task) ever touches it.
pub struct Sweeper {
    db: Arc<Database>,
    options: ReaperOptions,
    resume_key: Option<Vec<u8>>,
}

impl Sweeper {
    /// Creates a sweeper positioned at the start of the namespace.
    pub fn new(db: Arc<Database>, options: ReaperOptions) -> Self {
        Self {
            db,
            options: options.normalized(),
            resume_key: None,
        }
    }

    /// Creates a sweeper over a store's database and namespace.
    pub fn for_store(store: &SessionStore, options: ReaperOptions) -> Self {
        Self::new(store.database(), options.with_namespace(store.namespace()))
    }

    pub const fn options(&self) -> &ReaperOptions {
        &self.options
    }

    /// Last key examined by the previous batch, `None` at the start of a pass.
    pub fn resume_key(&self) -> Option<&[u8]> {
        self.resume_key.as_deref()
    }

    /// Forgets the resume position; the next batch starts a new pass.
    pub fn reset(&mut self) {
        self.resume_key = None;
    }

    /// A sweeper with the same database and options, at the start of a pass.
    pub(crate) fn restarted(&self) -> Self {
        Self {
            db: Arc::clone(&self.db),
            options: self.options.clone(),
            resume_key: None,
        }
    }

    /// Runs one batch against the current time.
    pub fn sweep(&mut self) -> Result<BatchReport> {
        self.sweep_at(record::unix_now())
    }

    /// Runs one batch, judging expiration against `now`.
    pub fn sweep_at(&mut self, now: i64) -> Result<BatchReport> {
        let started = Instant::now();
        let namespace = self.options.namespace();

        let scan = self.scan(now).inspect_err(|e| {
            metrics::record_batch_error(namespace, "scan");
            tracing::error!(namespace = %namespace, error = %e, "Failed to scan for expired records");
        })?;

        let mut report = BatchReport {
            examined: scan.examined,
            expired: scan.expired.len(),
            malformed: scan.malformed,
            pass_complete: scan.next_resume.is_none(),
            ..BatchReport::default()
        };

        if !scan.expired.is_empty() {
            let (deleted, skipped) = self.purge(&scan.expired, now).inspect_err(|e| {
                metrics::record_batch_error(namespace, "purge");
                tracing::error!(namespace = %namespace, error = %e, "Failed to remove expired records");
            })?;
            report.deleted = deleted;
            report.skipped = skipped;
        }

        let elapsed = started.elapsed();
        metrics::record_batch(namespace, report.deleted, report.skipped, report.malformed, elapsed);

        if report.deleted > 0 || report.skipped > 0 {
            tracing::info!(
                namespace = %namespace,
                examined = report.examined,
                deleted = report.deleted,
                skipped = report.skipped,
                malformed = report.malformed,
                pass_complete = report.pass_complete,
                elapsed_ms = elapsed.as_millis() as u64,
                "Reaped expired sessions"
            );
        } else {
            tracing::debug!(
                namespace = %namespace,
                examined = report.examined,
                pass_complete = report.pass_complete,
                "Sweep batch found nothing to reap"
            );
        }

        self.resume_key = scan.next_resume;
        Ok(report)
    }

    /// Sweeps a whole pass from the start of the namespace.
    ///
    /// Keys inserted behind the cursor during the pass are left for the
    /// next one.
    pub fn sweep_full_pass(&mut self) -> Result<BatchReport> {
        self.reset();
        let mut total = BatchReport::default();
        loop {
            let report = self.sweep()?;
            total.absorb(&report);
            if report.pass_complete {
                return Ok(total);
            }
        }
    }

    fn scan(&self, now: i64) -> Result<Scan> {
        let batch_size = self.options.batch_size();
        let read_txn = self
            .db
            .begin_read()
            .storage_context("begin read transaction")?;

        let table = match read_txn.open_table(namespace_table(self.options.namespace())) {
            Ok(table) => table,
            // Nothing stored yet
            Err(TableError::TableDoesNotExist(_)) => return Ok(Scan::default()),
            Err(e) => return Err(Error::storage("open namespace", e)),
        };

        // Continue strictly after the last examined key. If that key has been
        // deleted meanwhile the range starts at its successor all the same.
        let range = match self.resume_key.as_deref() {
            Some(last) => table.range::<&[u8]>((Bound::Excluded(last), Bound::Unbounded)),
            None => table.range::<&[u8]>(..),
        }
        .storage_context("position cursor")?;

        let mut scan = Scan::default();
        for entry in range {
            let (key, value) = entry.storage_context("read record")?;
            let key = key.value();
            scan.examined += 1;

            match record::decode(value.value()) {
                Ok(record) if record.is_expired_at(now) => scan.expired.push(key.to_vec()),
                Ok(_) => {},
                Err(e) => {
                    tracing::warn!(
                        namespace = %self.options.namespace(),
                        error = %e,
                        "Removing session with invalid value"
                    );
                    scan.malformed += 1;
                    scan.expired.push(key.to_vec());
                },
            }

            if scan.examined == batch_size {
                scan.next_resume = Some(key.to_vec());
                break;
            }
        }

        Ok(scan)
    }

    /// Removes the scanned keys in one write transaction.
    ///
    /// Each key is looked up again first: a record renewed or deleted since
    /// the scan counts as neither deleted nor skipped.
    fn purge(&self, keys: &[Vec<u8>], now: i64) -> Result<(usize, usize)> {
        let hook = self.options.pre_delete();
        let mut deleted = 0;
        let mut skipped = 0;

        let write_txn = self
            .db
            .begin_write()
            .storage_context("begin write transaction")?;
        {
            let mut table = write_txn
                .open_table(namespace_table(self.options.namespace()))
                .storage_context("open namespace")?;

            for key in keys {
                let payload = match read_stored(&table, key, now)? {
                    Stored::Expired(record) => Some(record.payload),
                    Stored::Malformed => None,
                    Stored::Live | Stored::Missing => {
                        tracing::debug!(
                            namespace = %self.options.namespace(),
                            "Session changed since the scan, leaving it"
                        );
                        continue;
                    },
                };

                if let Some(hook) = hook
                    && let Err(e) = hook.before_delete(key, payload.as_deref())
                {
                    tracing::warn!(
                        namespace = %self.options.namespace(),
                        error = %e,
                        "Pre-delete hook failed, keeping session"
                    );
                    skipped += 1;
                    continue;
                }

                if table
                    .remove(key.as_slice())
                    .storage_context("remove expired record")?
                    .is_some()
                {
                    deleted += 1;
                }
            }
        }
        write_txn
            .commit()
            .storage_context("commit reap transaction")?;

        Ok((deleted, skipped))
    }
}
