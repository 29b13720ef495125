//! Debounced network connectivity monitoring.
//!
//! Platform connectivity is flappy: radios toggle, captive portals come
//! and go. The monitor polls a [`ConnectivityProbe`] and only publishes
//! a transition once the new state has held for a stable window, so the
//! sync engine is never thrashed by rapid online/offline edges.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// A source of raw connectivity state, typically backed by platform
/// APIs. Implementations must be cheap to poll.
pub trait ConnectivityProbe: Send + Sync {
    /// Returns the current raw connectivity state.
    fn is_online(&self) -> bool;
}

/// A probe whose state is set by hand. Used in tests and by host code
/// that receives connectivity callbacks from the platform.
#[derive(Debug)]
pub struct ManualProbe {
    online: AtomicBool,
}

impl ManualProbe {
    /// Creates a probe with the given initial state.
    #[must_use]
    pub fn new(online: bool) -> Self {
        Self {
            online: AtomicBool::new(online),
        }
    }

    /// Sets the raw connectivity state.
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }
}

impl ConnectivityProbe for ManualProbe {
    fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }
}

/// Configuration for the network monitor.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// How often the probe is polled.
    pub poll_interval: Duration,
    /// How long a raw state change must hold before it is published.
    pub debounce: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(500),
            debounce: Duration::from_secs(2),
        }
    }
}

/// Polls a probe and publishes debounced transitions on a watch channel.
///
/// The initial state is published once at startup (as the channel's
/// initial value) before any transition fires. At most one transition
/// is published per stable debounce window.
#[derive(Debug)]
pub struct NetworkMonitor {
    rx: watch::Receiver<bool>,
    task: JoinHandle<()>,
}

impl NetworkMonitor {
    /// Spawns the polling task. Must be called from within a tokio
    /// runtime.
    pub fn spawn(probe: Arc<dyn ConnectivityProbe>, config: MonitorConfig) -> Self {
        let initial = probe.is_online();
        let (tx, rx) = watch::channel(initial);

        let task = tokio::spawn(async move {
            // A raw flip only becomes a transition after it holds for
            // the full debounce window.
            let mut pending: Option<(bool, Instant)> = None;
            loop {
                tokio::time::sleep(config.poll_interval).await;

                let raw = probe.is_online();
                let published = *tx.borrow();

                if raw == published {
                    pending = None;
                    continue;
                }

                match pending {
                    Some((state, since)) if state == raw => {
                        if since.elapsed() >= config.debounce {
                            tracing::debug!(online = raw, "connectivity transition");
                            let _ = tx.send(raw);
                            pending = None;
                        }
                    }
                    _ => pending = Some((raw, Instant::now())),
                }
            }
        });

        Self { rx, task }
    }

    /// Returns a receiver of debounced connectivity state.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.rx.clone()
    }

    /// Returns the last published connectivity state.
    #[must_use]
    pub fn is_online(&self) -> bool {
        *self.rx.borrow()
    }
}

impl Drop for NetworkMonitor {
    fn drop(&mut self) {
        self.task.abort();
    }
}
