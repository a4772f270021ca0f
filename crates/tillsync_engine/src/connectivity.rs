//! Connectivity monitor.

use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::watch;
use tracing::info;

/// Tracks the platform connectivity signal and the sticky offline flag.
///
/// `is_online` mirrors the platform signal with no debouncing.
/// `was_offline` is set the instant an offline transition is observed
/// (or when the monitor is constructed offline) and stays set until the
/// orchestrator clears it after a reconnect run completes — success or
/// failure. The flag exists to trigger a sync attempt, not to track its
/// outcome, so it survives rapid offline/online flaps.
#[derive(Debug)]
pub struct ConnectivityMonitor {
    online: AtomicBool,
    was_offline: AtomicBool,
    tx: watch::Sender<bool>,
}

impl ConnectivityMonitor {
    /// Creates a monitor with the given initial signal.
    #[must_use]
    pub fn new(online: bool) -> Self {
        let (tx, _rx) = watch::channel(online);
        Self {
            online: AtomicBool::new(online),
            was_offline: AtomicBool::new(!online),
            tx,
        }
    }

    /// Feeds a platform connectivity signal into the monitor.
    ///
    /// Repeated signals with the same value are ignored.
    pub fn set_online(&self, online: bool) {
        let previous = self.online.swap(online, Ordering::SeqCst);
        if previous == online {
            return;
        }
        if online {
            info!("connectivity restored");
        } else {
            self.was_offline.store(true, Ordering::SeqCst);
            info!("connectivity lost");
        }
        self.tx.send_replace(online);
    }

    /// Current platform connectivity.
    #[must_use]
    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    /// True if an offline period has been observed and not yet handled.
    #[must_use]
    pub fn was_offline(&self) -> bool {
        self.was_offline.load(Ordering::SeqCst)
    }

    /// Clears the sticky offline flag.
    ///
    /// Called by the orchestrator once a reconnect run has completed;
    /// nothing else should clear it.
    pub fn clear_was_offline(&self) {
        self.was_offline.store(false, Ordering::SeqCst);
    }

    /// Subscribes to connectivity transitions.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

impl Default for ConnectivityMonitor {
    fn default() -> Self {
        Self::new(true)
    }
}
