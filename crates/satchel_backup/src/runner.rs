//! Async driver for scheduled backups.

use crate::engine::{BackupEngine, BackupSource};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::warn;

/// Configuration for the backup runner.
#[derive(Debug, Clone)]
pub struct BackupRunnerConfig {
    /// How often the schedule is checked.
    pub poll_interval: Duration,
}

impl Default for BackupRunnerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5 * 60),
        }
    }
}

/// Handle to a spawned backup runner task.
///
/// Dropping the handle stops the runner.
#[derive(Debug)]
pub struct BackupRunnerHandle {
    task: JoinHandle<()>,
}

impl Drop for BackupRunnerHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Spawns the background task that runs scheduled backups.
pub struct BackupRunner;

impl BackupRunner {
    /// Spawns the runner. Must be called from within a tokio runtime.
    ///
    /// Each poll retries any queued uploads, then runs a backup from
    /// `source` if the schedule says one is due. A backup failure is
    /// logged and retried on the next poll; it never kills the runner.
    pub fn spawn(
        engine: Arc<BackupEngine>,
        source: Arc<dyn BackupSource>,
        config: BackupRunnerConfig,
    ) -> BackupRunnerHandle {
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(
                tokio::time::Instant::now() + config.poll_interval,
                config.poll_interval,
            );
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // One due-event per due period, not one per poll.
            let mut announced = false;

            loop {
                ticker.tick().await;

                if let Err(e) = engine.process_pending() {
                    warn!(error = %e, "queued upload retry failed");
                }

                if !engine.is_due() {
                    announced = false;
                    continue;
                }
                if !announced {
                    engine.emit_due();
                    announced = true;
                }
                match engine.backup_from(source.as_ref()) {
                    Ok(id) => {
                        tracing::debug!(%id, "scheduled backup created");
                        announced = false;
                    }
                    Err(e) => warn!(error = %e, "scheduled backup failed"),
                }
            }
        });

        BackupRunnerHandle { task }
    }
}
