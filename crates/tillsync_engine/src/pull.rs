//! Pull synchronizer: refreshes the local cache from the remote.

use crate::error::{EngineError, EngineResult};
use crate::remote::{Filter, RemoteStore};
use crate::unix_millis;
use std::sync::Arc;
use std::time::Duration;
use tillsync_model::{
    Collection, ExpenseRecord, InventoryItem, MetaEntry, RemoteRow, SaleRecord, LAST_PULL_SYNC,
};
use tillsync_store::{Store, StoreResult, Txn};
use tracing::{debug, info, warn};

/// Outcome of one collection's pull.
#[derive(Debug, Clone)]
pub struct CollectionPull {
    /// The collection that was pulled.
    pub collection: Collection,
    /// Rows fetched and written to the cache.
    pub fetched: usize,
    /// Error detail if the pull failed.
    pub error: Option<String>,
}

impl CollectionPull {
    /// True if this collection's pull succeeded.
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Aggregate outcome of a pull cycle.
#[derive(Debug, Clone)]
pub struct PullReport {
    /// Per-collection outcomes, in pull order.
    pub collections: Vec<CollectionPull>,
    /// True only if every collection pulled successfully.
    pub success: bool,
}

impl PullReport {
    /// Total rows fetched across all collections.
    #[must_use]
    pub fn fetched_total(&self) -> usize {
        self.collections.iter().map(|c| c.fetched).sum()
    }

    /// Looks up one collection's outcome.
    #[must_use]
    pub fn collection(&self, collection: Collection) -> Option<&CollectionPull> {
        self.collections.iter().find(|c| c.collection == collection)
    }
}

/// Replaces or merges local cache contents with the remote snapshot.
pub struct PullSynchronizer<R> {
    store: Arc<Store>,
    remote: Arc<R>,
    request_timeout: Duration,
}

impl<R: RemoteStore> PullSynchronizer<R> {
    /// Creates a pull synchronizer.
    #[must_use]
    pub fn new(store: Arc<Store>, remote: Arc<R>, request_timeout: Duration) -> Self {
        Self {
            store,
            remote,
            request_timeout,
        }
    }

    /// Pulls all three collections concurrently and joins the results.
    ///
    /// A failed pull for one collection never blocks the others; the
    /// report carries each outcome separately. `last_pull_sync` meta is
    /// updated whenever at least one collection succeeded.
    pub async fn pull_all(&self) -> EngineResult<PullReport> {
        let (inventory, sales, expenses) = tokio::join!(
            self.pull_collection(Collection::Inventory, None),
            self.pull_collection(Collection::Sales, None),
            self.pull_collection(Collection::Expenses, None),
        );

        let collections = vec![
            summarize(Collection::Inventory, inventory),
            summarize(Collection::Sales, sales),
            summarize(Collection::Expenses, expenses),
        ];
        let success = collections.iter().all(CollectionPull::succeeded);

        if collections.iter().any(CollectionPull::succeeded) {
            self.store
                .put(&MetaEntry::new(LAST_PULL_SYNC, unix_millis()))?;
        }

        info!(
            success,
            fetched = collections.iter().map(|c| c.fetched).sum::<usize>(),
            "pull cycle finished"
        );
        Ok(PullReport {
            collections,
            success,
        })
    }

    /// Pulls one collection, returning the number of rows cached.
    ///
    /// Without a filter this is a full, consistent replacement: the
    /// collection is cleared and repopulated in one transaction. With a
    /// filter only matching rows are overwritten, leaving the rest of
    /// the cache untouched.
    pub async fn pull_collection(
        &self,
        collection: Collection,
        filter: Option<&Filter>,
    ) -> EngineResult<usize> {
        let select = self.remote.select(collection, filter);
        let rows = match tokio::time::timeout(self.request_timeout, select).await {
            Ok(Ok(rows)) => rows,
            Ok(Err(error)) => return Err(EngineError::remote_read(collection, error)),
            Err(_) => return Err(EngineError::Timeout),
        };

        let fetched = rows.len();
        self.store.transaction(|txn| {
            if filter.is_none() {
                clear_collection(txn, collection)?;
            }
            for row in &rows {
                put_row(txn, row)?;
            }
            Ok(())
        })?;

        debug!(%collection, fetched, full = filter.is_none(), "cache refreshed from remote");
        Ok(fetched)
    }
}

fn summarize(collection: Collection, result: EngineResult<usize>) -> CollectionPull {
    match result {
        Ok(fetched) => CollectionPull {
            collection,
            fetched,
            error: None,
        },
        Err(error) => {
            warn!(%collection, %error, "pull failed; cached data kept");
            CollectionPull {
                collection,
                fetched: 0,
                error: Some(error.to_string()),
            }
        }
    }
}

fn clear_collection(txn: &mut Txn<'_>, collection: Collection) -> StoreResult<()> {
    match collection {
        Collection::Inventory => txn.clear::<InventoryItem>(),
        Collection::Sales => txn.clear::<SaleRecord>(),
        Collection::Expenses => txn.clear::<ExpenseRecord>(),
    }
}

fn put_row(txn: &mut Txn<'_>, row: &RemoteRow) -> StoreResult<()> {
    match row {
        RemoteRow::Inventory(item) => txn.put(item),
        RemoteRow::Sale(sale) => txn.put(sale),
        RemoteRow::Expense(expense) => txn.put(expense),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::MockRemote;
    use tillsync_model::cache_schema;
    use tillsync_store::MemoryBackend;

    fn synchronizer(remote: MockRemote) -> (PullSynchronizer<MockRemote>, Arc<Store>) {
        let store = Arc::new(
            Store::open(cache_schema(), Box::new(MemoryBackend::new())).unwrap(),
        );
        let sync = PullSynchronizer::new(
            Arc::clone(&store),
            Arc::new(remote),
            Duration::from_secs(5),
        );
        (sync, store)
    }

    fn seed_inventory(remote: &MockRemote, name: &str, location: &str) -> InventoryItem {
        let item = InventoryItem::new(name, 10, 100, location);
        remote.seed(RemoteRow::Inventory(item.clone()));
        item
    }

    #[tokio::test]
    async fn full_pull_replaces_collection() {
        let remote = MockRemote::new();
        seed_inventory(&remote, "Beans", "main");
        let (sync, store) = synchronizer(remote);

        // A stale cached row the remote no longer has.
        let stale = InventoryItem::new("Ghost", 1, 1, "main");
        store.put(&stale).unwrap();

        let report = sync.pull_all().await.unwrap();

        assert!(report.success);
        assert_eq!(report.fetched_total(), 1);
        let cached = store.get_all::<InventoryItem>().unwrap();
        assert_eq!(cached.len(), 1);
        assert_eq!(cached[0].name, "Beans");
    }

    #[tokio::test]
    async fn filtered_pull_leaves_other_rows() {
        let remote = MockRemote::new();
        let annex = seed_inventory(&remote, "Annex beans", "annex");
        let (sync, store) = synchronizer(remote);

        let main_item = InventoryItem::new("Main beans", 3, 100, "main");
        store.put(&main_item).unwrap();

        let filter = Filter::new("location", "annex");
        let fetched = sync
            .pull_collection(Collection::Inventory, Some(&filter))
            .await
            .unwrap();

        assert_eq!(fetched, 1);
        // Both the filtered-in row and the untouched cached row remain.
        assert_eq!(store.count::<InventoryItem>(), 2);
        assert!(store
            .get::<InventoryItem>(&annex.id.to_string())
            .unwrap()
            .is_some());
        assert!(store
            .get::<InventoryItem>(&main_item.id.to_string())
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn failed_collection_does_not_block_others() {
        let remote = MockRemote::new();
        seed_inventory(&remote, "Beans", "main");
        remote.seed(RemoteRow::Sale(SaleRecord::new(
            uuid::Uuid::new_v4(),
            1,
            500,
            "2024-06-01",
        )));
        remote.fail_select(Collection::Expenses);
        let (sync, store) = synchronizer(remote);

        let report = sync.pull_all().await.unwrap();

        assert!(!report.success);
        assert_eq!(report.collection(Collection::Inventory).unwrap().fetched, 1);
        assert_eq!(report.collection(Collection::Sales).unwrap().fetched, 1);
        assert!(report
            .collection(Collection::Expenses)
            .unwrap()
            .error
            .is_some());

        assert_eq!(store.count::<InventoryItem>(), 1);
        assert_eq!(store.count::<SaleRecord>(), 1);
        assert_eq!(store.count::<ExpenseRecord>(), 0);
    }

    #[tokio::test]
    async fn partial_success_still_stamps_meta() {
        let remote = MockRemote::new();
        remote.fail_select(Collection::Expenses);
        let (sync, store) = synchronizer(remote);

        assert!(store.get::<MetaEntry>(LAST_PULL_SYNC).unwrap().is_none());
        let report = sync.pull_all().await.unwrap();
        assert!(!report.success);

        let meta = store.get::<MetaEntry>(LAST_PULL_SYNC).unwrap().unwrap();
        assert!(meta.value > 0);
    }

    #[tokio::test]
    async fn total_failure_does_not_stamp_meta() {
        let remote = MockRemote::new();
        for collection in Collection::ALL {
            remote.fail_select(collection);
        }
        let (sync, store) = synchronizer(remote);

        let report = sync.pull_all().await.unwrap();
        assert!(!report.success);
        assert!(store.get::<MetaEntry>(LAST_PULL_SYNC).unwrap().is_none());
    }

    #[tokio::test]
    async fn auth_failure_is_reported_per_collection() {
        let remote = MockRemote::new();
        remote.reject_auth(true);
        let (sync, _) = synchronizer(remote);

        let report = sync.pull_all().await.unwrap();
        assert!(!report.success);
        for pull in &report.collections {
            assert!(pull.error.as_deref().unwrap().contains("authentication"));
        }
    }
}
