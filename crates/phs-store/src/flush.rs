//! Background flush loop.
//!
//! Periodically persists the store's pending batch. The first flush runs
//! after an initial delay, then one per interval. Shutdown stops the timer
//! and performs a final flush so accepted headers are not lost on a clean
//! exit.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use phs_core::error::StoreError;

use crate::config::StoreConfig;
use crate::store::ProvenHeaderStore;

const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// When the flush loop fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlushSchedule {
    pub initial_delay: Duration,
    pub interval: Duration,
}

impl From<&StoreConfig> for FlushSchedule {
    fn from(config: &StoreConfig) -> Self {
        Self {
            initial_delay: config.flush_initial_delay(),
            interval: config.flush_interval(),
        }
    }
}

/// Handle to a running flush loop.
pub struct FlushLoop {
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl FlushLoop {
    /// Spawn the loop on the current tokio runtime.
    pub fn spawn(store: Arc<ProvenHeaderStore>, schedule: FlushSchedule) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(flush_loop(store, schedule, shutdown_rx));
        Self { shutdown_tx, task }
    }

    /// Stop the timer, run the final flush, and wait for the task to exit.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        if let Err(e) = self.task.await {
            error!("flush loop task failed: {e}");
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

async fn flush_loop(
    store: Arc<ProvenHeaderStore>,
    schedule: FlushSchedule,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    // `interval_at` panics on a zero period.
    let period = schedule.interval.max(MIN_INTERVAL);
    let mut ticker = time::interval_at(Instant::now() + schedule.initial_delay, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    debug!(
        initial_delay_secs = schedule.initial_delay.as_secs(),
        interval_ms = period.as_millis() as u64,
        "proven header flush loop started"
    );

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                run_flush(&store);
            }
            changed = shutdown_rx.changed() => {
                // A dropped sender also means shutdown.
                if changed.is_err() || *shutdown_rx.borrow() {
                    break;
                }
            }
        }
    }

    info!(pending = store.pending_count(), "flush loop stopping, flushing remaining headers");
    // Drain everything; one flush is bounded by the single flush limit.
    while store.pending_count() > 0 {
        match run_flush(&store) {
            Some(outcome) if outcome > 0 => {}
            _ => break,
        }
    }
}

/// Run one flush and log the result. Returns the number of headers flushed.
fn run_flush(store: &ProvenHeaderStore) -> Option<usize> {
    match store.flush() {
        Ok(outcome) => {
            if !outcome.is_empty() {
                debug!(flushed = outcome.flushed, "periodic flush complete");
            }
            Some(outcome.flushed)
        }
        Err(e @ StoreError::InvalidSequence { .. }) => {
            error!(pending = store.pending_count(), "{e}");
            None
        }
        Err(e) => {
            warn!("periodic flush failed, will retry: {e}");
            None
        }
    }
}
