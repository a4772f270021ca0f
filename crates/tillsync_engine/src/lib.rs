//! # Tillsync Engine
//!
//! Offline-first synchronization engine for the tillsync cache.
//!
//! This crate provides:
//! - Connectivity monitor with a sticky reconnect flag
//! - Durable FIFO queue of pending mutations over the local store
//! - Pull synchronizer (concurrent per-collection cache refresh)
//! - Push synchronizer (FIFO queue drain against the remote)
//! - Orchestrator state machine (idle → syncing → pulling → terminal)
//! - [`SyncService`], the facade UI screens call
//!
//! ## Architecture
//!
//! The engine implements a **push-then-pull** reconciliation model:
//! 1. Drain the queue of local mutations (push)
//! 2. Refresh the cache from the remote snapshot (pull)
//!
//! Pull always follows push so remotely-confirmed state and other
//! clients' changes land in the cache before the UI re-reads it. The
//! result is last-writer-wins: no merge function exists, by design.
//!
//! ## Key Invariants
//!
//! - A mutation is applied locally and queued as one durable unit
//! - Queue entries are removed only after remote confirmation
//! - Operations replay in enqueue order; a failed operation never
//!   blocks the rest of the drain
//! - One collection's failed pull never blocks the others
//! - Only one orchestration run is active at a time
//! - The sticky offline flag survives connectivity flaps until a
//!   reconnect run completes

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod connectivity;
mod error;
mod orchestrator;
mod pull;
mod push;
mod queue;
mod remote;
mod service;

pub use config::EngineConfig;
pub use connectivity::ConnectivityMonitor;
pub use error::{EngineError, EngineResult};
pub use orchestrator::{Orchestrator, SyncProgress, SyncStatus, SyncSummary};
pub use pull::{CollectionPull, PullReport, PullSynchronizer};
pub use push::{PushReport, PushSynchronizer};
pub use queue::SyncQueue;
pub use remote::{Filter, MockRemote, RemoteError, RemoteResult, RemoteStore};
pub use service::{EngineState, MutationOutcome, SyncService};

/// Current wall-clock time as unix milliseconds.
pub(crate) fn unix_millis() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
