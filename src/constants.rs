//! Centralized defaults for the session store and the reaper.
//!
//! Every tunable that has a fallback value lives here so the store, the
//! reaper options and the TOML configuration agree on the same numbers.

use std::time::Duration;

// =============================================================================
// Store Defaults
// =============================================================================

/// Default namespace (redb table) holding session records.
pub const DEFAULT_NAMESPACE: &str = "sessions";

/// Default database file, relative to the working directory.
pub const DEFAULT_DB_PATH: &str = "./sessions.db";

/// Default record lifetime used by `save_default` (30 days).
pub const DEFAULT_MAX_AGE_SECS: i64 = 30 * 24 * 60 * 60;

// =============================================================================
// Reaper Defaults
// =============================================================================

/// Maximum number of records examined per sweep batch.
/// Bounds the lifetime of each read transaction on large namespaces.
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Interval between two sweep batches (10 seconds).
pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_secs(10);

/// Batch size of the first-generation reaper.
pub const LEGACY_BATCH_SIZE: usize = 10;

/// Check interval of the first-generation reaper (1 second).
pub const LEGACY_CHECK_INTERVAL: Duration = Duration::from_secs(1);
