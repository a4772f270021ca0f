//! Push synchronizer: drains the queue against the remote.

use crate::error::{EngineError, EngineResult};
use crate::queue::SyncQueue;
use crate::remote::RemoteStore;
use std::sync::Arc;
use std::time::Duration;
use tillsync_model::{
    ExpenseOp, InventoryOp, OpPayload, RecordPatch, RemoteRow, SalesOp,
};
use tracing::{info, warn};

/// Outcome of a queue drain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PushReport {
    /// Operations confirmed remotely and removed from the queue.
    pub completed: usize,
    /// Operations that failed and remain queued.
    pub failed: usize,
}

/// Replays queued mutations against the remote datastore, oldest first.
pub struct PushSynchronizer<R> {
    queue: SyncQueue,
    remote: Arc<R>,
    request_timeout: Duration,
}

impl<R: RemoteStore> PushSynchronizer<R> {
    /// Creates a push synchronizer.
    #[must_use]
    pub fn new(queue: SyncQueue, remote: Arc<R>, request_timeout: Duration) -> Self {
        Self {
            queue,
            remote,
            request_timeout,
        }
    }

    /// Drains the queue in enqueue order.
    ///
    /// Each operation is removed only after the remote confirms it; a
    /// failed operation stays queued with its retry count incremented
    /// and the drain continues, so one poisoned operation never blocks
    /// the rest. Only a queue-read failure is an error; an empty queue
    /// returns zeros without contacting the remote.
    pub async fn push_all(&self) -> EngineResult<PushReport> {
        let pending = self.queue.list()?;
        if pending.is_empty() {
            return Ok(PushReport::default());
        }

        let mut report = PushReport::default();
        for op in pending {
            match push_payload(self.remote.as_ref(), self.request_timeout, &op.payload).await {
                Ok(()) => {
                    self.queue.remove(op.id)?;
                    report.completed += 1;
                }
                Err(error) => {
                    warn!(
                        id = op.id,
                        collection = %op.payload.collection(),
                        kind = %op.payload.kind(),
                        retries = op.retry_count + 1,
                        %error,
                        "push failed; operation retained for retry"
                    );
                    self.queue.record_retry(op.id)?;
                    report.failed += 1;
                }
            }
        }

        info!(
            completed = report.completed,
            failed = report.failed,
            "queue drain finished"
        );
        Ok(report)
    }
}

/// Translates one payload into the corresponding remote write, bounded
/// by the request timeout.
pub(crate) async fn push_payload<R: RemoteStore>(
    remote: &R,
    request_timeout: Duration,
    payload: &OpPayload,
) -> EngineResult<()> {
    let collection = payload.collection();
    let kind = payload.kind();

    let write = async {
        match payload.clone() {
            OpPayload::Inventory(InventoryOp::Create(item)) => {
                remote.insert(RemoteRow::Inventory(item)).await.map(|_| ())
            }
            OpPayload::Inventory(InventoryOp::Update { id, patch }) => {
                remote
                    .update(collection, id, RecordPatch::Inventory(patch))
                    .await
            }
            OpPayload::Inventory(InventoryOp::Delete { id }) => {
                remote.delete(collection, id).await
            }
            OpPayload::Sales(SalesOp::Create(sale)) => {
                remote.insert(RemoteRow::Sale(sale)).await.map(|_| ())
            }
            OpPayload::Sales(SalesOp::Update { id, patch }) => {
                remote.update(collection, id, RecordPatch::Sale(patch)).await
            }
            OpPayload::Sales(SalesOp::Delete { id }) => remote.delete(collection, id).await,
            OpPayload::Expenses(ExpenseOp::Create(expense)) => {
                remote.insert(RemoteRow::Expense(expense)).await.map(|_| ())
            }
            OpPayload::Expenses(ExpenseOp::Update { id, patch }) => {
                remote
                    .update(collection, id, RecordPatch::Expense(patch))
                    .await
            }
            OpPayload::Expenses(ExpenseOp::Delete { id }) => remote.delete(collection, id).await,
        }
    };

    match tokio::time::timeout(request_timeout, write).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(error)) => Err(EngineError::remote_write(collection, kind, error)),
        Err(_) => Err(EngineError::Timeout),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::MockRemote;
    use std::sync::Arc;
    use tillsync_model::{cache_schema, Collection, InventoryItem, InventoryPatch};
    use tillsync_store::{MemoryBackend, Store};

    fn setup(remote: MockRemote) -> (PushSynchronizer<MockRemote>, SyncQueue, Arc<MockRemote>) {
        let store = Arc::new(
            Store::open(cache_schema(), Box::new(MemoryBackend::new())).unwrap(),
        );
        let queue = SyncQueue::new(store);
        let remote = Arc::new(remote);
        let push = PushSynchronizer::new(
            queue.clone(),
            Arc::clone(&remote),
            Duration::from_secs(5),
        );
        (push, queue, remote)
    }

    fn create_op(name: &str) -> (OpPayload, InventoryItem) {
        let item = InventoryItem::new(name, 5, 300, "main");
        (
            OpPayload::Inventory(InventoryOp::Create(item.clone())),
            item,
        )
    }

    #[tokio::test]
    async fn empty_queue_skips_the_remote() {
        let (push, _, remote) = setup(MockRemote::new());

        let report = push.push_all().await.unwrap();

        assert_eq!(report, PushReport::default());
        assert_eq!(remote.write_calls(), 0);
    }

    #[tokio::test]
    async fn completed_operations_are_removed() {
        let (push, queue, remote) = setup(MockRemote::new());
        let (payload, item) = create_op("Beans");
        queue.enqueue(payload).unwrap();

        let report = push.push_all().await.unwrap();

        assert_eq!(report.completed, 1);
        assert_eq!(report.failed, 0);
        assert_eq!(queue.pending_count(None).unwrap(), 0);
        assert!(remote.row(Collection::Inventory, item.id).is_some());
    }

    #[tokio::test]
    async fn fifo_replay_ends_with_deletion() {
        let (push, queue, remote) = setup(MockRemote::new());
        let (create, item) = create_op("Beans");

        queue.enqueue(create).unwrap();
        queue
            .enqueue(OpPayload::Inventory(InventoryOp::Update {
                id: item.id,
                patch: InventoryPatch {
                    quantity: Some(1),
                    ..InventoryPatch::default()
                },
            }))
            .unwrap();
        queue
            .enqueue(OpPayload::Inventory(InventoryOp::Delete { id: item.id }))
            .unwrap();

        let report = push.push_all().await.unwrap();

        assert_eq!(report.completed, 3);
        assert_eq!(report.failed, 0);
        // Replayed in enqueue order, the remote ends with no row, not
        // the intermediate update.
        assert!(remote.row(Collection::Inventory, item.id).is_none());
        assert_eq!(queue.pending_count(None).unwrap(), 0);
    }

    #[tokio::test]
    async fn poisoned_operation_does_not_block_the_rest() {
        let (push, queue, remote) = setup(MockRemote::new());
        let (first, first_item) = create_op("First");
        let (second, second_item) = create_op("Second");
        let (third, third_item) = create_op("Third");

        queue.enqueue(first).unwrap();
        queue.enqueue(second).unwrap();
        queue.enqueue(third).unwrap();
        remote.fail_writes_for(second_item.id);

        let report = push.push_all().await.unwrap();

        assert_eq!(report.completed, 2);
        assert_eq!(report.failed, 1);
        assert!(remote.row(Collection::Inventory, first_item.id).is_some());
        assert!(remote.row(Collection::Inventory, second_item.id).is_none());
        assert!(remote.row(Collection::Inventory, third_item.id).is_some());

        let remaining = queue.list().unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].payload.key(), second_item.id);
        assert_eq!(remaining[0].retry_count, 1);
    }

    #[tokio::test]
    async fn retry_count_accumulates_across_drains() {
        let (push, queue, remote) = setup(MockRemote::new());
        let (payload, item) = create_op("Beans");
        queue.enqueue(payload).unwrap();
        remote.fail_writes_for(item.id);

        push.push_all().await.unwrap();
        push.push_all().await.unwrap();

        assert_eq!(queue.list().unwrap()[0].retry_count, 2);

        // Once the remote recovers the operation drains normally.
        remote.clear_failures();
        let report = push.push_all().await.unwrap();
        assert_eq!(report.completed, 1);
        assert_eq!(queue.pending_count(None).unwrap(), 0);
    }

    #[tokio::test]
    async fn auth_failure_keeps_operation_queued() {
        let (push, queue, remote) = setup(MockRemote::new());
        queue.enqueue(create_op("Beans").0).unwrap();
        remote.reject_auth(true);

        let report = push.push_all().await.unwrap();

        assert_eq!(report.completed, 0);
        assert_eq!(report.failed, 1);
        assert_eq!(queue.pending_count(None).unwrap(), 1);
    }
}
