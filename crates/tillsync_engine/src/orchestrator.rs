//! Sync orchestrator state machine.

use crate::connectivity::ConnectivityMonitor;
use crate::error::{EngineError, EngineResult};
use crate::pull::{PullReport, PullSynchronizer};
use crate::push::{PushReport, PushSynchronizer};
use crate::queue::SyncQueue;
use crate::remote::RemoteStore;
use parking_lot::RwLock;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// The orchestrator's observable state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatus {
    /// No run in progress.
    Idle,
    /// Draining the queue (push phase).
    Syncing,
    /// Refreshing the cache (pull phase).
    Pulling,
    /// The last run completed cleanly; settling before idle.
    Success,
    /// The last run had failures; settling before idle.
    Error,
}

impl SyncStatus {
    /// True while a run is actively syncing or pulling.
    #[must_use]
    pub fn is_active(&self) -> bool {
        matches!(self, SyncStatus::Syncing | SyncStatus::Pulling)
    }

    /// True for the settle states a finished run passes through.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, SyncStatus::Success | SyncStatus::Error)
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SyncStatus::Idle => "idle",
            SyncStatus::Syncing => "syncing",
            SyncStatus::Pulling => "pulling",
            SyncStatus::Success => "success",
            SyncStatus::Error => "error",
        })
    }
}

/// Push-phase progress published for the UI.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncProgress {
    /// Operations pending when the run started.
    pub total: usize,
    /// Operations confirmed so far.
    pub completed: usize,
    /// Operations that failed so far.
    pub failed: usize,
}

/// Outcome of one full orchestration run.
#[derive(Debug, Clone)]
pub struct SyncSummary {
    /// Queue drain outcome.
    pub push: PushReport,
    /// Cache refresh outcome.
    pub pull: PullReport,
    /// True only if the pull succeeded overall and the push had zero
    /// failures.
    pub success: bool,
    /// Wall-clock duration of the run, excluding the settle delay.
    pub duration: Duration,
}

/// Coordinates push then pull and exposes progress to the UI.
///
/// Pull always runs after push — even after push failures — so
/// remotely-confirmed state and other clients' changes are reflected
/// locally. Only one run may be active at a time; a trigger received
/// while a run is in flight is ignored rather than queued, because the
/// in-flight run re-reads queue and remote state itself.
pub struct Orchestrator<R: RemoteStore> {
    push: PushSynchronizer<R>,
    pull: PullSynchronizer<R>,
    queue: SyncQueue,
    monitor: Arc<ConnectivityMonitor>,
    settle_delay: Duration,
    status: RwLock<SyncStatus>,
    progress: RwLock<SyncProgress>,
    in_flight: AtomicBool,
    cancelled: AtomicBool,
}

impl<R: RemoteStore> Orchestrator<R> {
    /// Creates an orchestrator over the engine's components.
    #[must_use]
    pub fn new(
        push: PushSynchronizer<R>,
        pull: PullSynchronizer<R>,
        queue: SyncQueue,
        monitor: Arc<ConnectivityMonitor>,
        settle_delay: Duration,
    ) -> Self {
        Self {
            push,
            pull,
            queue,
            monitor,
            settle_delay,
            status: RwLock::new(SyncStatus::Idle),
            progress: RwLock::new(SyncProgress::default()),
            in_flight: AtomicBool::new(false),
            cancelled: AtomicBool::new(false),
        }
    }

    /// Current status.
    #[must_use]
    pub fn status(&self) -> SyncStatus {
        *self.status.read()
    }

    /// Progress of the current or last push phase.
    #[must_use]
    pub fn progress(&self) -> SyncProgress {
        *self.progress.read()
    }

    /// Requests cancellation of the in-flight run.
    ///
    /// Checked between phases; the current remote call still completes.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    fn check_cancelled(&self) -> EngineResult<()> {
        if self.cancelled.load(Ordering::SeqCst) {
            Err(EngineError::Cancelled)
        } else {
            Ok(())
        }
    }

    fn set_status(&self, status: SyncStatus) {
        *self.status.write() = status;
        debug!(%status, "sync status changed");
    }

    /// Runs a full push-then-pull cycle.
    ///
    /// Returns `Ok(None)` if a run was already in flight. Whatever the
    /// outcome, the orchestrator settles back to idle and clears the
    /// sticky offline flag — the flag triggers attempts, it does not
    /// track their outcome.
    pub async fn sync(&self) -> EngineResult<Option<SyncSummary>> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("sync trigger ignored; a run is already in flight");
            return Ok(None);
        }
        self.cancelled.store(false, Ordering::SeqCst);

        let outcome = self.run_cycle().await;
        let terminal = match &outcome {
            Ok(summary) if summary.success => SyncStatus::Success,
            _ => SyncStatus::Error,
        };
        self.set_status(terminal);

        self.settle_to_idle().await;
        self.monitor.clear_was_offline();
        self.in_flight.store(false, Ordering::SeqCst);

        outcome.map(Some)
    }

    async fn run_cycle(&self) -> EngineResult<SyncSummary> {
        let start = Instant::now();
        self.set_status(SyncStatus::Syncing);

        let total = self.queue.pending_count(None)?;
        *self.progress.write() = SyncProgress {
            total,
            completed: 0,
            failed: 0,
        };

        let push = self.push.push_all().await?;
        *self.progress.write() = SyncProgress {
            total,
            completed: push.completed,
            failed: push.failed,
        };

        self.check_cancelled()?;

        self.set_status(SyncStatus::Pulling);
        let pull = self.pull.pull_all().await?;

        let success = pull.success && push.failed == 0;
        let summary = SyncSummary {
            push,
            pull,
            success,
            duration: start.elapsed(),
        };
        info!(
            success,
            pushed = summary.push.completed,
            push_failures = summary.push.failed,
            fetched = summary.pull.fetched_total(),
            "sync run finished"
        );
        Ok(summary)
    }

    /// Runs the pull phase alone, under the same single-flight guard.
    ///
    /// Does not clear the sticky offline flag: a pull refreshes the
    /// cache but leaves queued work undrained, so a pending reconnect
    /// sync must still fire.
    pub async fn pull_only(&self) -> EngineResult<Option<PullReport>> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("pull trigger ignored; a run is already in flight");
            return Ok(None);
        }

        self.set_status(SyncStatus::Pulling);
        let outcome = self.pull.pull_all().await;
        let terminal = match &outcome {
            Ok(report) if report.success => SyncStatus::Success,
            _ => SyncStatus::Error,
        };
        self.set_status(terminal);

        self.settle_to_idle().await;
        self.in_flight.store(false, Ordering::SeqCst);

        outcome.map(Some)
    }

    /// Starts a sync if the monitor shows a reconnect edge.
    ///
    /// The edge is `is_online && was_offline`; anything else is a no-op.
    pub async fn sync_on_reconnect(&self) -> EngineResult<Option<SyncSummary>> {
        if self.monitor.is_online() && self.monitor.was_offline() {
            info!("reconnect detected; starting sync run");
            self.sync().await
        } else {
            Ok(None)
        }
    }

    /// Drives reconnect syncs from the monitor's transition stream.
    ///
    /// Intended to be awaited by an application task for the life of
    /// the process; returns when the monitor is dropped.
    pub async fn run(&self) {
        let mut rx = self.monitor.subscribe();
        while rx.changed().await.is_ok() {
            if let Err(error) = self.sync_on_reconnect().await {
                warn!(%error, "reconnect sync failed");
            }
        }
    }

    async fn settle_to_idle(&self) {
        if !self.settle_delay.is_zero() {
            tokio::time::sleep(self.settle_delay).await;
        }
        self.set_status(SyncStatus::Idle);
        *self.progress.write() = SyncProgress::default();
    }
}
