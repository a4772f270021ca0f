//! Storage backend trait and in-memory implementation.

use crate::error::{StoreError, StoreResult};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// A storage backend holds the store's durable snapshot.
///
/// The store serializes its entire state into a single snapshot and
/// replaces it on every committed transaction. Backends only need to
/// load and durably replace that snapshot; they never interpret it.
pub trait StorageBackend: Send + Sync {
    /// Loads the last persisted snapshot, or `None` if nothing was
    /// persisted yet.
    fn load(&self) -> StoreResult<Option<Vec<u8>>>;

    /// Durably replaces the snapshot.
    ///
    /// Must be atomic: after a crash, `load` returns either the previous
    /// snapshot or this one, never a torn mix.
    fn persist(&self, snapshot: &[u8]) -> StoreResult<()>;
}

impl<B: StorageBackend + ?Sized> StorageBackend for Arc<B> {
    fn load(&self) -> StoreResult<Option<Vec<u8>>> {
        (**self).load()
    }

    fn persist(&self, snapshot: &[u8]) -> StoreResult<()> {
        (**self).persist(snapshot)
    }
}

/// An in-memory storage backend.
///
/// Suitable for unit tests, integration tests, and ephemeral caches that
/// do not need to survive a restart. Supports write-failure injection so
/// tests can exercise the store's failed-persist path.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    snapshot: RwLock<Option<Vec<u8>>>,
    fail_writes: AtomicBool,
    persist_calls: AtomicU64,
}

impl MemoryBackend {
    /// Creates a new empty in-memory backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a backend pre-loaded with a snapshot.
    ///
    /// Useful for simulating a process restart: open a second store with
    /// the snapshot taken from the first.
    #[must_use]
    pub fn with_snapshot(snapshot: Vec<u8>) -> Self {
        Self {
            snapshot: RwLock::new(Some(snapshot)),
            ..Self::default()
        }
    }

    /// Returns a copy of the current snapshot, if any.
    #[must_use]
    pub fn snapshot(&self) -> Option<Vec<u8>> {
        self.snapshot.read().clone()
    }

    /// Makes every subsequent `persist` fail until cleared.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Returns the number of `persist` calls observed.
    #[must_use]
    pub fn persist_calls(&self) -> u64 {
        self.persist_calls.load(Ordering::SeqCst)
    }
}

impl StorageBackend for MemoryBackend {
    fn load(&self) -> StoreResult<Option<Vec<u8>>> {
        Ok(self.snapshot.read().clone())
    }

    fn persist(&self, snapshot: &[u8]) -> StoreResult<()> {
        self.persist_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "injected write failure",
            )));
        }
        *self.snapshot.write() = Some(snapshot.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_starts_empty() {
        let backend = MemoryBackend::new();
        assert!(backend.load().unwrap().is_none());
    }

    #[test]
    fn memory_persist_then_load() {
        let backend = MemoryBackend::new();
        backend.persist(b"snapshot").unwrap();
        assert_eq!(backend.load().unwrap(), Some(b"snapshot".to_vec()));
        assert_eq!(backend.persist_calls(), 1);
    }

    #[test]
    fn memory_with_snapshot() {
        let backend = MemoryBackend::with_snapshot(b"seeded".to_vec());
        assert_eq!(backend.load().unwrap(), Some(b"seeded".to_vec()));
    }

    #[test]
    fn memory_fail_writes() {
        let backend = MemoryBackend::new();
        backend.persist(b"first").unwrap();

        backend.set_fail_writes(true);
        assert!(backend.persist(b"second").is_err());
        // Failed persist leaves the previous snapshot in place.
        assert_eq!(backend.load().unwrap(), Some(b"first".to_vec()));

        backend.set_fail_writes(false);
        backend.persist(b"third").unwrap();
        assert_eq!(backend.load().unwrap(), Some(b"third".to_vec()));
    }

    #[test]
    fn arc_backend_forwards() {
        let backend = Arc::new(MemoryBackend::new());
        let shared: Arc<MemoryBackend> = Arc::clone(&backend);
        shared.persist(b"via arc").unwrap();
        assert_eq!(backend.load().unwrap(), Some(b"via arc".to_vec()));
    }
}
