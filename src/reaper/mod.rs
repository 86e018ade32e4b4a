//! Background removal of expired session records.
//!
//! The reaper wakes up every `check_interval`, examines at most `batch_size`
//! records and deletes the expired ones, then goes back to sleep. Progress is
//! kept as the last examined key, so a large namespace is covered over
//! several ticks without holding a long transaction.
//!
//! Records that cannot be decoded are treated as expired and removed.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use sessreap::reaper::{ReaperHandle, ReaperOptions};
//! use sessreap::store::SessionStore;
//!
//! # async fn example() -> sessreap::Result<()> {
//! let store = SessionStore::open_path("./sessions.db")?;
//! let reaper = ReaperHandle::start(
//!     &store,
//!     ReaperOptions::new().with_check_interval(Duration::from_secs(30)),
//! );
//!
//! // ... serve requests ...
//!
//! reaper.stop().await;
//! # Ok(())
//! # }
//! ```

mod hook;
mod options;
mod sweep;
mod task;

#[cfg(test)]
mod tests;

pub use hook::{JsonHook, PreDeleteHook};
pub use options::ReaperOptions;
pub use sweep::{BatchReport, Sweeper};
pub use task::{DoneReceiver, QuitSender, ReaperHandle, quit, run};
