// =============================================================================
// Lint Configuration
// =============================================================================

#![deny(unsafe_code)]
#![deny(unused_must_use)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(rust_2018_idioms)]
#![warn(unreachable_pub)]

// Allowed with documented reasons
#![allow(clippy::missing_errors_doc)] // Error returns self-documenting via type
#![allow(clippy::module_name_repetitions)] // e.g., reaper::ReaperOptions is clearer
#![allow(clippy::doc_markdown)] // Too many false positives in code docs
#![allow(clippy::must_use_candidate)] // Not all returned values need annotation
#![allow(clippy::cast_possible_truncation)] // Millisecond counters in log fields

//! Expiring session records on redb, with a batched background reaper.
//!
//! - [`store::SessionStore`] - load/save/delete records; expired records are
//!   removed when read
//! - [`reaper`] - background task that sweeps a namespace in bounded batches
//!   and deletes expired or undecodable records
//! - [`record`] - the stored value format
//!
//! # Example
//!
//! ```
//! use sessreap::store::SessionStore;
//!
//! # fn main() -> sessreap::Result<()> {
//! let dir = tempfile::tempdir().unwrap();
//! let store = SessionStore::open_path(dir.path().join("sessions.db"))?;
//!
//! store.save(b"session-id", b"opaque payload", 3600)?;
//! let record = store.load(b"session-id")?.expect("live record");
//! assert_eq!(record.payload, b"opaque payload");
//!
//! // A negative lifetime stores an already expired record.
//! store.save(b"gone", b"", -1)?;
//! assert!(store.load(b"gone")?.is_none());
//! # Ok(())
//! # }
//! ```

/// Defaults shared by the store, the reaper and the configuration.
pub mod constants;

/// TOML configuration for the store, the reaper and logging.
pub mod config;

pub mod error;

/// Structured logging setup over `tracing-subscriber`.
pub mod logging;

/// Reaper metrics over the `metrics` facade.
pub mod metrics;

pub mod reaper;
pub mod record;
pub mod store;

pub use error::{Error, HookError, Result};
pub use reaper::{ReaperHandle, ReaperOptions};
pub use record::Record;
pub use store::SessionStore;
