//! Remote datastore abstraction.
//!
//! The engine never talks to the network directly; it consumes this
//! trait, which the application implements over its remote client. A
//! configurable in-memory implementation is provided for testing.

use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, HashSet};
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use thiserror::Error;
use tillsync_model::{Collection, RecordPatch, RemoteRow};
use uuid::Uuid;

/// Result type for remote operations.
pub type RemoteResult<T> = Result<T, RemoteError>;

/// Errors reported by the remote datastore.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    /// The remote could not be reached or answered with a transient
    /// failure.
    #[error("remote unavailable: {0}")]
    Unavailable(String),

    /// Credentials are missing or expired.
    #[error("authentication rejected: {0}")]
    Authentication(String),

    /// The targeted row does not exist.
    #[error("row {key} not found in {collection}")]
    NotFound {
        /// The collection that was targeted.
        collection: Collection,
        /// The missing row's key.
        key: Uuid,
    },

    /// The remote rejected the write outright.
    #[error("write rejected: {0}")]
    Rejected(String),
}

impl RemoteError {
    /// Returns true if retrying the same request later could succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, RemoteError::Unavailable(_))
    }
}

/// An equality filter on an indexed field, e.g. inventory by location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    /// The indexed field to match.
    pub field: String,
    /// The value rows must carry.
    pub value: String,
}

impl Filter {
    /// Creates a filter.
    #[must_use]
    pub fn new(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
        }
    }
}

/// The remote datastore collaborator.
///
/// One implementation per deployment; the engine drives it through the
/// four row operations and nothing else. Change-notification
/// subscriptions are a UI concern and stay outside this trait.
pub trait RemoteStore: Send + Sync {
    /// Fetches rows for a collection, optionally narrowed by an equality
    /// filter on an indexed field.
    fn select(
        &self,
        collection: Collection,
        filter: Option<&Filter>,
    ) -> impl Future<Output = RemoteResult<Vec<RemoteRow>>> + Send;

    /// Inserts a row, returning the stored row (including any
    /// server-assigned fields).
    fn insert(&self, row: RemoteRow) -> impl Future<Output = RemoteResult<RemoteRow>> + Send;

    /// Applies a field-level patch to an existing row.
    fn update(
        &self,
        collection: Collection,
        key: Uuid,
        patch: RecordPatch,
    ) -> impl Future<Output = RemoteResult<()>> + Send;

    /// Deletes a row by key. Deleting a missing row is not an error.
    fn delete(
        &self,
        collection: Collection,
        key: Uuid,
    ) -> impl Future<Output = RemoteResult<()>> + Send;
}

impl<R: RemoteStore + ?Sized> RemoteStore for std::sync::Arc<R> {
    fn select(
        &self,
        collection: Collection,
        filter: Option<&Filter>,
    ) -> impl Future<Output = RemoteResult<Vec<RemoteRow>>> + Send {
        (**self).select(collection, filter)
    }

    fn insert(&self, row: RemoteRow) -> impl Future<Output = RemoteResult<RemoteRow>> + Send {
        (**self).insert(row)
    }

    fn update(
        &self,
        collection: Collection,
        key: Uuid,
        patch: RecordPatch,
    ) -> impl Future<Output = RemoteResult<()>> + Send {
        (**self).update(collection, key, patch)
    }

    fn delete(
        &self,
        collection: Collection,
        key: Uuid,
    ) -> impl Future<Output = RemoteResult<()>> + Send {
        (**self).delete(collection, key)
    }
}

/// An in-memory remote datastore for testing.
///
/// Supports failure injection per collection (selects) and per key
/// (writes), a global authentication failure, and call counters so
/// tests can assert the engine's remote traffic.
#[derive(Debug, Default)]
pub struct MockRemote {
    rows: RwLock<BTreeMap<(Collection, Uuid), RemoteRow>>,
    fail_selects: Mutex<HashSet<Collection>>,
    fail_write_keys: Mutex<HashSet<Uuid>>,
    auth_rejected: AtomicBool,
    select_calls: AtomicU64,
    write_calls: AtomicU64,
}

impl MockRemote {
    /// Creates an empty mock remote.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a row without touching the call counters.
    pub fn seed(&self, row: RemoteRow) {
        self.rows
            .write()
            .insert((row.collection(), row.key()), row);
    }

    /// Returns all rows currently stored for a collection.
    #[must_use]
    pub fn rows(&self, collection: Collection) -> Vec<RemoteRow> {
        self.rows
            .read()
            .iter()
            .filter(|((c, _), _)| *c == collection)
            .map(|(_, row)| row.clone())
            .collect()
    }

    /// Returns one row by key, if present.
    #[must_use]
    pub fn row(&self, collection: Collection, key: Uuid) -> Option<RemoteRow> {
        self.rows.read().get(&(collection, key)).cloned()
    }

    /// Makes every `select` for the collection fail until cleared.
    pub fn fail_select(&self, collection: Collection) {
        self.fail_selects.lock().insert(collection);
    }

    /// Makes every write touching the key fail until cleared.
    pub fn fail_writes_for(&self, key: Uuid) {
        self.fail_write_keys.lock().insert(key);
    }

    /// Rejects or accepts all requests as unauthenticated.
    pub fn reject_auth(&self, rejected: bool) {
        self.auth_rejected.store(rejected, Ordering::SeqCst);
    }

    /// Clears all injected failures.
    pub fn clear_failures(&self) {
        self.fail_selects.lock().clear();
        self.fail_write_keys.lock().clear();
        self.auth_rejected.store(false, Ordering::SeqCst);
    }

    /// Number of `select` calls observed.
    #[must_use]
    pub fn select_calls(&self) -> u64 {
        self.select_calls.load(Ordering::SeqCst)
    }

    /// Number of write calls (insert, update, delete) observed.
    #[must_use]
    pub fn write_calls(&self) -> u64 {
        self.write_calls.load(Ordering::SeqCst)
    }

    fn check_auth(&self) -> RemoteResult<()> {
        if self.auth_rejected.load(Ordering::SeqCst) {
            Err(RemoteError::Authentication("credentials expired".into()))
        } else {
            Ok(())
        }
    }

    fn check_write_key(&self, key: Uuid) -> RemoteResult<()> {
        if self.fail_write_keys.lock().contains(&key) {
            Err(RemoteError::Unavailable(format!(
                "injected write failure for {key}"
            )))
        } else {
            Ok(())
        }
    }
}

impl RemoteStore for MockRemote {
    async fn select(
        &self,
        collection: Collection,
        filter: Option<&Filter>,
    ) -> RemoteResult<Vec<RemoteRow>> {
        self.select_calls.fetch_add(1, Ordering::SeqCst);
        self.check_auth()?;
        if self.fail_selects.lock().contains(&collection) {
            return Err(RemoteError::Unavailable(format!(
                "injected select failure for {collection}"
            )));
        }

        Ok(self
            .rows
            .read()
            .iter()
            .filter(|((c, _), _)| *c == collection)
            .map(|(_, row)| row.clone())
            .filter(|row| match filter {
                Some(f) => row.field(&f.field).as_deref() == Some(f.value.as_str()),
                None => true,
            })
            .collect())
    }

    async fn insert(&self, row: RemoteRow) -> RemoteResult<RemoteRow> {
        self.write_calls.fetch_add(1, Ordering::SeqCst);
        self.check_auth()?;
        self.check_write_key(row.key())?;

        self.rows
            .write()
            .insert((row.collection(), row.key()), row.clone());
        Ok(row)
    }

    async fn update(
        &self,
        collection: Collection,
        key: Uuid,
        patch: RecordPatch,
    ) -> RemoteResult<()> {
        self.write_calls.fetch_add(1, Ordering::SeqCst);
        self.check_auth()?;
        self.check_write_key(key)?;

        let mut rows = self.rows.write();
        match rows.get_mut(&(collection, key)) {
            Some(row) => {
                if patch.apply_to(row) {
                    Ok(())
                } else {
                    Err(RemoteError::Rejected(format!(
                        "patch collection does not match {collection}"
                    )))
                }
            }
            None => Err(RemoteError::NotFound { collection, key }),
        }
    }

    async fn delete(&self, collection: Collection, key: Uuid) -> RemoteResult<()> {
        self.write_calls.fetch_add(1, Ordering::SeqCst);
        self.check_auth()?;
        self.check_write_key(key)?;

        self.rows.write().remove(&(collection, key));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tillsync_model::{InventoryItem, InventoryPatch};

    fn item(location: &str) -> InventoryItem {
        InventoryItem::new("Beans", 5, 300, location)
    }

    #[tokio::test]
    async fn insert_then_select() {
        let remote = MockRemote::new();
        remote
            .insert(RemoteRow::Inventory(item("main")))
            .await
            .unwrap();

        let rows = remote.select(Collection::Inventory, None).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(remote.select_calls(), 1);
        assert_eq!(remote.write_calls(), 1);
    }

    #[tokio::test]
    async fn select_with_filter() {
        let remote = MockRemote::new();
        remote.seed(RemoteRow::Inventory(item("main")));
        remote.seed(RemoteRow::Inventory(item("annex")));

        let filter = Filter::new("location", "annex");
        let rows = remote
            .select(Collection::Inventory, Some(&filter))
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].field("location"), Some("annex".into()));
    }

    #[tokio::test]
    async fn injected_select_failure() {
        let remote = MockRemote::new();
        remote.fail_select(Collection::Expenses);

        let result = remote.select(Collection::Expenses, None).await;
        assert!(matches!(result, Err(RemoteError::Unavailable(_))));

        // Other collections are unaffected.
        assert!(remote.select(Collection::Sales, None).await.is_ok());

        remote.clear_failures();
        assert!(remote.select(Collection::Expenses, None).await.is_ok());
    }

    #[tokio::test]
    async fn update_missing_row_is_not_found() {
        let remote = MockRemote::new();
        let key = Uuid::new_v4();

        let result = remote
            .update(
                Collection::Inventory,
                key,
                RecordPatch::Inventory(InventoryPatch::default()),
            )
            .await;
        assert!(matches!(result, Err(RemoteError::NotFound { .. })));
    }

    #[tokio::test]
    async fn update_applies_patch() {
        let remote = MockRemote::new();
        let item = item("main");
        let key = item.id;
        remote.seed(RemoteRow::Inventory(item));

        let patch = RecordPatch::Inventory(InventoryPatch {
            quantity: Some(42),
            ..InventoryPatch::default()
        });
        remote.update(Collection::Inventory, key, patch).await.unwrap();

        match remote.row(Collection::Inventory, key).unwrap() {
            RemoteRow::Inventory(stored) => assert_eq!(stored.quantity, 42),
            other => panic!("unexpected row: {other:?}"),
        }
    }

    #[tokio::test]
    async fn delete_missing_row_is_ok() {
        let remote = MockRemote::new();
        remote
            .delete(Collection::Sales, Uuid::new_v4())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn auth_rejection_covers_all_calls() {
        let remote = MockRemote::new();
        remote.reject_auth(true);

        let select = remote.select(Collection::Inventory, None).await;
        assert!(matches!(select, Err(RemoteError::Authentication(_))));

        let insert = remote.insert(RemoteRow::Inventory(item("main"))).await;
        assert!(matches!(insert, Err(RemoteError::Authentication(_))));
    }

    #[test]
    fn retryability() {
        assert!(RemoteError::Unavailable("x".into()).is_retryable());
        assert!(!RemoteError::Authentication("x".into()).is_retryable());
        assert!(!RemoteError::Rejected("x".into()).is_retryable());
    }
}
