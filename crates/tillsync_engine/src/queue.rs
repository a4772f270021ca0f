//! Durable FIFO queue of pending mutations.

use crate::error::EngineResult;
use crate::unix_millis;
use std::sync::Arc;
use tillsync_model::{
    queue_key, Collection, ExpenseOp, ExpenseRecord, InventoryItem, InventoryOp, OpPayload,
    QueuedOp, SaleRecord, SalesOp,
};
use tillsync_store::{Store, StoreResult, Txn};
use tracing::debug;

/// Name of the id sequence backing queue entry ids.
const QUEUE_SEQUENCE: &str = "sync_queue";

/// The durable log of local mutations not yet confirmed remotely.
///
/// Backed by the store's `sync_queue` table; entry ids are monotonic, so
/// id order is enqueue order and the push synchronizer replays them
/// FIFO. Entries are removed only after the remote confirms the
/// corresponding write.
#[derive(Clone)]
pub struct SyncQueue {
    store: Arc<Store>,
}

impl SyncQueue {
    /// Creates a queue over the shared store.
    #[must_use]
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    /// Applies a mutation to the local cache and records it as pending,
    /// as one durable transaction.
    ///
    /// If the durable write fails, the mutation is neither applied nor
    /// queued.
    pub fn enqueue(&self, payload: OpPayload) -> EngineResult<QueuedOp> {
        let enqueued_at_ms = unix_millis();
        let op = self.store.transaction(|txn| {
            apply_payload(txn, &payload)?;
            let id = txn.next_id(QUEUE_SEQUENCE);
            let op = QueuedOp {
                id,
                payload: payload.clone(),
                enqueued_at_ms,
                retry_count: 0,
            };
            txn.put(&op)?;
            Ok(op)
        })?;
        debug!(
            id = op.id,
            collection = %op.payload.collection(),
            kind = %op.payload.kind(),
            "mutation queued for remote replay"
        );
        Ok(op)
    }

    /// Applies a mutation to the local cache without queueing it.
    ///
    /// Used for the online path, where the remote write happens
    /// directly.
    pub fn apply_local(&self, payload: &OpPayload) -> EngineResult<()> {
        self.store.transaction(|txn| apply_payload(txn, payload))?;
        Ok(())
    }

    /// Records a mutation as pending without re-applying it locally.
    ///
    /// Used when a direct online write fails after the local apply
    /// already happened.
    pub fn record_pending(&self, payload: OpPayload) -> EngineResult<QueuedOp> {
        let enqueued_at_ms = unix_millis();
        let op = self.store.transaction(|txn| {
            let id = txn.next_id(QUEUE_SEQUENCE);
            let op = QueuedOp {
                id,
                payload: payload.clone(),
                enqueued_at_ms,
                retry_count: 0,
            };
            txn.put(&op)?;
            Ok(op)
        })?;
        Ok(op)
    }

    /// Returns all pending operations, oldest first.
    pub fn list(&self) -> EngineResult<Vec<QueuedOp>> {
        let mut ops = self.store.get_all::<QueuedOp>()?;
        ops.sort_by_key(|op| op.id);
        Ok(ops)
    }

    /// Removes one operation after its remote write was confirmed.
    pub fn remove(&self, id: u64) -> EngineResult<()> {
        self.store.delete_by_key::<QueuedOp>(&queue_key(id))?;
        Ok(())
    }

    /// Increments an operation's retry count after a failed push.
    pub fn record_retry(&self, id: u64) -> EngineResult<()> {
        self.store.transaction(|txn| {
            if let Some(mut op) = txn.get::<QueuedOp>(&queue_key(id))? {
                op.retry_count += 1;
                txn.put(&op)?;
            }
            Ok(())
        })?;
        Ok(())
    }

    /// Number of pending operations, optionally for one collection.
    pub fn pending_count(&self, collection: Option<Collection>) -> EngineResult<usize> {
        match collection {
            None => Ok(self.store.count::<QueuedOp>()),
            Some(c) => Ok(self
                .list()?
                .iter()
                .filter(|op| op.payload.collection() == c)
                .count()),
        }
    }
}

/// Applies one mutation to the cache within a store transaction.
///
/// An update whose target is not cached applies nothing locally — the
/// remote row may still exist, so the operation is queued regardless.
fn apply_payload(txn: &mut Txn<'_>, payload: &OpPayload) -> StoreResult<()> {
    match payload {
        OpPayload::Inventory(op) => match op {
            InventoryOp::Create(item) => txn.put(item),
            InventoryOp::Update { id, patch } => {
                if let Some(mut item) = txn.get::<InventoryItem>(&id.to_string())? {
                    patch.apply(&mut item);
                    txn.put(&item)?;
                }
                Ok(())
            }
            InventoryOp::Delete { id } => txn.delete::<InventoryItem>(&id.to_string()),
        },
        OpPayload::Sales(op) => match op {
            SalesOp::Create(sale) => txn.put(sale),
            SalesOp::Update { id, patch } => {
                if let Some(mut sale) = txn.get::<SaleRecord>(&id.to_string())? {
                    patch.apply(&mut sale);
                    txn.put(&sale)?;
                }
                Ok(())
            }
            SalesOp::Delete { id } => txn.delete::<SaleRecord>(&id.to_string()),
        },
        OpPayload::Expenses(op) => match op {
            ExpenseOp::Create(expense) => txn.put(expense),
            ExpenseOp::Update { id, patch } => {
                if let Some(mut expense) = txn.get::<ExpenseRecord>(&id.to_string())? {
                    patch.apply(&mut expense);
                    txn.put(&expense)?;
                }
                Ok(())
            }
            ExpenseOp::Delete { id } => txn.delete::<ExpenseRecord>(&id.to_string()),
        },
    }
}
