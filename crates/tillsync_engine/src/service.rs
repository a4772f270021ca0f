//! The engine facade exposed to UI screens.

use crate::config::EngineConfig;
use crate::connectivity::ConnectivityMonitor;
use crate::error::{EngineError, EngineResult};
use crate::orchestrator::{Orchestrator, SyncProgress, SyncStatus, SyncSummary};
use crate::pull::{PullReport, PullSynchronizer};
use crate::push::{push_payload, PushSynchronizer};
use crate::queue::SyncQueue;
use crate::remote::RemoteStore;
use std::sync::Arc;
use std::time::Duration;
use tillsync_model::{cache_schema, Collection, MetaEntry, OpPayload, LAST_PULL_SYNC};
use tillsync_store::{Document, StorageBackend, Store};
use tracing::warn;

/// What happened to a mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationOutcome {
    /// Applied locally and confirmed on the remote.
    Applied,
    /// Applied locally and queued for remote replay.
    Queued,
}

/// Snapshot of the engine's observable state for the UI.
#[derive(Debug, Clone)]
pub struct EngineState {
    /// Orchestrator status.
    pub status: SyncStatus,
    /// Push-phase progress of the current or last run.
    pub progress: SyncProgress,
    /// Timestamp of the last successful pull, unix millis.
    pub last_sync_time: Option<u64>,
    /// Current platform connectivity.
    pub is_online: bool,
    /// Whether an offline period is awaiting a reconnect sync.
    pub was_offline: bool,
    /// Pending operations across all collections.
    pub pending: usize,
}

/// The offline-first sync service.
///
/// Owns the store, queue, connectivity monitor, and orchestrator, and
/// exposes the small API UI screens call: read cached data, queue
/// mutations, trigger syncs, observe state. Constructed once by the
/// application root and shared by reference.
pub struct SyncService<R: RemoteStore> {
    store: Arc<Store>,
    monitor: Arc<ConnectivityMonitor>,
    queue: SyncQueue,
    orchestrator: Orchestrator<R>,
    remote: Arc<R>,
    request_timeout: Duration,
}

impl<R: RemoteStore> SyncService<R> {
    /// Opens the service over a storage backend and a remote client.
    ///
    /// # Errors
    ///
    /// Returns an error if the local store cannot be opened.
    pub fn open(
        config: EngineConfig,
        backend: Box<dyn StorageBackend>,
        remote: R,
    ) -> EngineResult<Self> {
        let store = Arc::new(Store::open(cache_schema(), backend)?);
        let remote = Arc::new(remote);
        let monitor = Arc::new(ConnectivityMonitor::new(config.start_online));
        let queue = SyncQueue::new(Arc::clone(&store));
        let push = PushSynchronizer::new(
            queue.clone(),
            Arc::clone(&remote),
            config.request_timeout,
        );
        let pull = PullSynchronizer::new(
            Arc::clone(&store),
            Arc::clone(&remote),
            config.request_timeout,
        );
        let orchestrator = Orchestrator::new(
            push,
            pull,
            queue.clone(),
            Arc::clone(&monitor),
            config.settle_delay,
        );

        Ok(Self {
            store,
            monitor,
            queue,
            orchestrator,
            remote,
            request_timeout: config.request_timeout,
        })
    }

    /// The shared local store.
    #[must_use]
    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    /// The connectivity monitor.
    #[must_use]
    pub fn monitor(&self) -> &ConnectivityMonitor {
        &self.monitor
    }

    /// The orchestrator, for status observation and manual control.
    #[must_use]
    pub fn orchestrator(&self) -> &Orchestrator<R> {
        &self.orchestrator
    }

    /// Reads every cached record of a collection.
    pub fn read_all<D: Document>(&self) -> EngineResult<Vec<D>> {
        Ok(self.store.get_all()?)
    }

    /// Reads cached records matching an indexed field value.
    pub fn read_where<D: Document>(&self, index: &str, value: &str) -> EngineResult<Vec<D>> {
        Ok(self.store.get_by_index(index, value)?)
    }

    /// Applies a mutation through the cache.
    ///
    /// The local cache is always updated first, so reads reflect the
    /// user's intent immediately. When online the remote is written
    /// directly; a failed remote write falls back to the queue so the
    /// mutation is never dropped. When offline the mutation is queued.
    pub async fn mutate(&self, payload: OpPayload) -> EngineResult<MutationOutcome> {
        if !self.monitor.is_online() {
            self.queue.enqueue(payload)?;
            return Ok(MutationOutcome::Queued);
        }

        self.queue.apply_local(&payload)?;
        match push_payload(self.remote.as_ref(), self.request_timeout, &payload).await {
            Ok(()) => Ok(MutationOutcome::Applied),
            Err(EngineError::Authentication(message)) => {
                self.queue.record_pending(payload)?;
                Err(EngineError::Authentication(message))
            }
            Err(error) => {
                warn!(%error, "direct remote write failed; queueing for replay");
                self.queue.record_pending(payload)?;
                Ok(MutationOutcome::Queued)
            }
        }
    }

    /// Triggers a full push-then-pull sync run.
    ///
    /// Returns `None` if a run was already in flight.
    pub async fn sync(&self) -> EngineResult<Option<SyncSummary>> {
        self.orchestrator.sync().await
    }

    /// Triggers a pull-only cache refresh.
    pub async fn pull_only(&self) -> EngineResult<Option<PullReport>> {
        self.orchestrator.pull_only().await
    }

    /// Feeds a platform connectivity signal without triggering a sync.
    pub fn set_online(&self, online: bool) {
        self.monitor.set_online(online);
    }

    /// Feeds a platform connectivity signal and runs a reconnect sync
    /// if the monitor shows the reconnect edge.
    pub async fn handle_connectivity(&self, online: bool) -> EngineResult<Option<SyncSummary>> {
        self.monitor.set_online(online);
        self.orchestrator.sync_on_reconnect().await
    }

    /// Number of pending operations, optionally for one collection.
    pub fn pending_count(&self, collection: Option<Collection>) -> EngineResult<usize> {
        self.queue.pending_count(collection)
    }

    /// Snapshot of the observable engine state.
    pub fn state(&self) -> EngineResult<EngineState> {
        Ok(EngineState {
            status: self.orchestrator.status(),
            progress: self.orchestrator.progress(),
            last_sync_time: self
                .store
                .get::<MetaEntry>(LAST_PULL_SYNC)?
                .map(|meta| meta.value),
            is_online: self.monitor.is_online(),
            was_offline: self.monitor.was_offline(),
            pending: self.queue.pending_count(None)?,
        })
    }
}
