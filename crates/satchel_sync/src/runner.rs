//! Async driver for the sync engine.
//!
//! Owns the periodic sync timer and wires debounced connectivity
//! transitions into the engine. The engine itself stays synchronous;
//! the runner is the only place that touches the tokio clock.

use crate::engine::{CycleOutcome, SyncEngine};
use crate::error::{SyncError, SyncResult};
use crate::remote::SyncRemote;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Configuration for the sync runner.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// How often a periodic drain cycle is triggered while online.
    pub interval: Duration,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
        }
    }
}

type ForceRequest = oneshot::Sender<SyncResult<CycleOutcome>>;

/// Handle to a spawned [`SyncRunner`] task.
///
/// Dropping the handle stops the runner.
#[derive(Debug)]
pub struct RunnerHandle {
    force_tx: mpsc::Sender<ForceRequest>,
    task: JoinHandle<()>,
}

impl RunnerHandle {
    /// Asks the runner to trigger a drain cycle now and waits for the
    /// outcome.
    pub async fn force(&self) -> SyncResult<CycleOutcome> {
        let (tx, rx) = oneshot::channel();
        self.force_tx
            .send(tx)
            .await
            .map_err(|_| SyncError::RunnerStopped)?;
        rx.await.map_err(|_| SyncError::RunnerStopped)?
    }
}

impl Drop for RunnerHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Spawns the background task that drives a [`SyncEngine`].
pub struct SyncRunner;

impl SyncRunner {
    /// Spawns the runner. Must be called from within a tokio runtime.
    ///
    /// `online_rx` carries debounced connectivity state, typically from
    /// a [`crate::NetworkMonitor`]. The engine's connectivity belief is
    /// seeded from the receiver's current value.
    pub fn spawn<R: SyncRemote + 'static>(
        engine: Arc<SyncEngine<R>>,
        mut online_rx: watch::Receiver<bool>,
        config: RunnerConfig,
    ) -> RunnerHandle {
        let (force_tx, mut force_rx) = mpsc::channel::<ForceRequest>(8);

        engine.set_online(*online_rx.borrow_and_update());

        let task = tokio::spawn(async move {
            let mut ticker =
                tokio::time::interval_at(tokio::time::Instant::now() + config.interval, config.interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if engine.is_online() {
                            if let Err(e) = engine.force_sync() {
                                warn!(error = %e, "periodic sync failed");
                            }
                        }
                    }
                    changed = online_rx.changed() => {
                        if changed.is_err() {
                            debug!("connectivity channel closed; runner stopping");
                            break;
                        }
                        let online = *online_rx.borrow_and_update();
                        engine.set_online(online);
                        if online {
                            // Drain immediately on reconnect instead of
                            // waiting out the timer.
                            if let Err(e) = engine.force_sync() {
                                warn!(error = %e, "post-reconnect sync failed");
                            }
                        }
                    }
                    request = force_rx.recv() => {
                        let Some(reply) = request else {
                            break;
                        };
                        let _ = reply.send(engine.force_sync());
                    }
                }
            }
        });

        RunnerHandle { force_tx, task }
    }
}
