//! # Tillsync Model
//!
//! Typed records, operation payloads, and the cache schema shared by the
//! tillsync store and engine.
//!
//! This crate provides:
//! - The fixed set of synchronized [`Collection`]s
//! - The three cached record types with their field-level patches
//! - The tagged [`OpPayload`] union for queued mutations
//! - Queue and meta bookkeeping documents
//! - [`cache_schema`], the store schema every component opens with

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod collection;
mod op;
mod record;

pub use collection::Collection;
pub use op::{
    queue_key, ExpenseOp, InventoryOp, MetaEntry, OpKind, OpPayload, QueuedOp, SalesOp,
    LAST_PULL_SYNC,
};
pub use record::{
    ExpensePatch, ExpenseRecord, InventoryItem, InventoryPatch, RecordPatch, RemoteRow,
    SalePatch, SaleRecord,
};

use tillsync_store::{Document, Schema};

/// The fixed store schema: the three synchronized collections with their
/// secondary indexes, plus the queue and meta tables.
#[must_use]
pub fn cache_schema() -> Schema {
    Schema::builder()
        .collection(Collection::Inventory.name(), &["location"])
        .collection(Collection::Sales.name(), &["item_id", "date"])
        .collection(Collection::Expenses.name(), &["date", "location"])
        .collection(QueuedOp::COLLECTION, &[])
        .collection(MetaEntry::COLLECTION, &[])
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_declares_all_tables() {
        let schema = cache_schema();

        for collection in Collection::ALL {
            assert!(schema.collection(collection.name()).is_some());
        }
        assert!(schema.collection("sync_queue").is_some());
        assert!(schema.collection("sync_meta").is_some());

        let sales = schema.collection("sales").unwrap();
        assert!(sales.has_index("item_id"));
        assert!(sales.has_index("date"));
    }
}
