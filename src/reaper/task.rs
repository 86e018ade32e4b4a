//! The background reaper loop and its start/stop handles.

use redb::Database;
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::time::{Instant, MissedTickBehavior};

use super::options::ReaperOptions;
use super::sweep::Sweeper;
use crate::store::SessionStore;

/// Sends the shutdown signal to a running reaper.
pub type QuitSender = oneshot::Sender<()>;

/// Resolves once the reaper loop has terminated.
pub type DoneReceiver = oneshot::Receiver<()>;

/// Spawns the reaper loop on the current tokio runtime.
///
/// The first batch runs one `check_interval` after the call. Dropping the
/// returned [`QuitSender`] also stops the loop.
///
/// # Panics
///
/// Panics if called outside a tokio runtime.
pub fn run(db: Arc<Database>, options: ReaperOptions) -> (QuitSender, DoneReceiver) {
    let sweeper = Sweeper::new(db, options);
    let (quit_tx, quit_rx) = oneshot::channel();
    let (done_tx, done_rx) = oneshot::channel();
    tokio::spawn(reap(sweeper, quit_rx, done_tx));
    (quit_tx, done_rx)
}

/// Signals the reaper to stop and waits until its loop has exited.
///
/// A batch in progress is finished first; this can take up to one batch.
pub async fn quit(quit_tx: QuitSender, done_rx: DoneReceiver) {
    // The loop may already be gone; then there is nobody to tell.
    let _ = quit_tx.send(());
    let _ = done_rx.await;
}

/// Owned handle to a running reaper.
#[must_use = "dropping the handle stops the reaper without waiting for it"]
pub struct ReaperHandle {
    quit_tx: QuitSender,
    done_rx: DoneReceiver,
}

impl ReaperHandle {
    /// Starts a reaper over the store's database and namespace.
    pub fn start(store: &SessionStore, options: ReaperOptions) -> Self {
        let (quit_tx, done_rx) = run(
            store.database(),
            options.with_namespace(store.namespace()),
        );
        Self { quit_tx, done_rx }
    }

    /// Stops the reaper and waits for the loop to exit.
    pub async fn stop(self) {
        quit(self.quit_tx, self.done_rx).await;
    }

    /// Splits into the raw quit sender and done receiver.
    pub fn into_parts(self) -> (QuitSender, DoneReceiver) {
        (self.quit_tx, self.done_rx)
    }
}

async fn reap(
    mut sweeper: Sweeper,
    mut quit_rx: oneshot::Receiver<()>,
    done_tx: oneshot::Sender<()>,
) {
    let period = sweeper.options().check_interval();
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    tracing::info!(
        namespace = %sweeper.options().namespace(),
        batch_size = sweeper.options().batch_size(),
        interval_ms = period.as_millis() as u64,
        "Session reaper started"
    );

    loop {
        tokio::select! {
            biased;
            // Fires on an explicit quit and when the sender is dropped.
            _ = &mut quit_rx => break,
            _ = ticker.tick() => {
                // Shutdown is only observed between batches.
                sweeper = run_batch(sweeper).await;
            }
        }
    }

    tracing::info!(namespace = %sweeper.options().namespace(), "Session reaper stopped");
    let _ = done_tx.send(());
}

/// Runs one batch on the blocking pool and hands the sweeper back.
async fn run_batch(sweeper: Sweeper) -> Sweeper {
    let fallback = sweeper.restarted();

    let outcome = tokio::task::spawn_blocking(move || {
        let mut sweeper = sweeper;
        let result = sweeper.sweep();
        (sweeper, result)
    })
    .await;

    match outcome {
        // Batch errors are already logged by the sweeper; retry next tick.
        Ok((sweeper, _)) => sweeper,
        Err(e) => {
            tracing::error!(
                namespace = %fallback.options().namespace(),
                error = %e,
                "Sweep batch panicked, restarting from the beginning"
            );
            fallback
        },
    }
}
