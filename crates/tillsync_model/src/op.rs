//! Queued operations and engine bookkeeping documents.

use crate::collection::Collection;
use crate::record::{
    ExpensePatch, ExpenseRecord, InventoryItem, InventoryPatch, SalePatch, SaleRecord,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use tillsync_store::Document;
use uuid::Uuid;

/// The kind of a pending mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OpKind {
    /// A new record.
    Create,
    /// A field-level change to an existing record.
    Update,
    /// Removal of a record.
    Delete,
}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OpKind::Create => "create",
            OpKind::Update => "update",
            OpKind::Delete => "delete",
        })
    }
}

/// A pending mutation against the inventory collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InventoryOp {
    /// Insert a new item.
    Create(InventoryItem),
    /// Patch an existing item.
    Update {
        /// The item to patch.
        id: Uuid,
        /// The changed fields.
        patch: InventoryPatch,
    },
    /// Remove an item.
    Delete {
        /// The item to remove.
        id: Uuid,
    },
}

impl InventoryOp {
    /// The mutation kind.
    #[must_use]
    pub fn kind(&self) -> OpKind {
        match self {
            InventoryOp::Create(_) => OpKind::Create,
            InventoryOp::Update { .. } => OpKind::Update,
            InventoryOp::Delete { .. } => OpKind::Delete,
        }
    }

    /// The record the mutation targets.
    #[must_use]
    pub fn key(&self) -> Uuid {
        match self {
            InventoryOp::Create(item) => item.id,
            InventoryOp::Update { id, .. } | InventoryOp::Delete { id } => *id,
        }
    }
}

/// A pending mutation against the sales collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SalesOp {
    /// Insert a new sale.
    Create(SaleRecord),
    /// Patch an existing sale.
    Update {
        /// The sale to patch.
        id: Uuid,
        /// The changed fields.
        patch: SalePatch,
    },
    /// Remove a sale.
    Delete {
        /// The sale to remove.
        id: Uuid,
    },
}

impl SalesOp {
    /// The mutation kind.
    #[must_use]
    pub fn kind(&self) -> OpKind {
        match self {
            SalesOp::Create(_) => OpKind::Create,
            SalesOp::Update { .. } => OpKind::Update,
            SalesOp::Delete { .. } => OpKind::Delete,
        }
    }

    /// The record the mutation targets.
    #[must_use]
    pub fn key(&self) -> Uuid {
        match self {
            SalesOp::Create(sale) => sale.id,
            SalesOp::Update { id, .. } | SalesOp::Delete { id } => *id,
        }
    }
}

/// A pending mutation against the expenses collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExpenseOp {
    /// Insert a new expense.
    Create(ExpenseRecord),
    /// Patch an existing expense.
    Update {
        /// The expense to patch.
        id: Uuid,
        /// The changed fields.
        patch: ExpensePatch,
    },
    /// Remove an expense.
    Delete {
        /// The expense to remove.
        id: Uuid,
    },
}

impl ExpenseOp {
    /// The mutation kind.
    #[must_use]
    pub fn kind(&self) -> OpKind {
        match self {
            ExpenseOp::Create(_) => OpKind::Create,
            ExpenseOp::Update { .. } => OpKind::Update,
            ExpenseOp::Delete { .. } => OpKind::Delete,
        }
    }

    /// The record the mutation targets.
    #[must_use]
    pub fn key(&self) -> Uuid {
        match self {
            ExpenseOp::Create(expense) => expense.id,
            ExpenseOp::Update { id, .. } | ExpenseOp::Delete { id } => *id,
        }
    }
}

/// A pending mutation, tagged by collection.
///
/// Payloads are fully typed per collection; there is no untyped blob
/// form, so a queued operation always carries enough key information to
/// locate its remote row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OpPayload {
    /// A mutation to the inventory collection.
    Inventory(InventoryOp),
    /// A mutation to the sales collection.
    Sales(SalesOp),
    /// A mutation to the expenses collection.
    Expenses(ExpenseOp),
}

impl OpPayload {
    /// The collection the mutation targets.
    #[must_use]
    pub fn collection(&self) -> Collection {
        match self {
            OpPayload::Inventory(_) => Collection::Inventory,
            OpPayload::Sales(_) => Collection::Sales,
            OpPayload::Expenses(_) => Collection::Expenses,
        }
    }

    /// The mutation kind.
    #[must_use]
    pub fn kind(&self) -> OpKind {
        match self {
            OpPayload::Inventory(op) => op.kind(),
            OpPayload::Sales(op) => op.kind(),
            OpPayload::Expenses(op) => op.kind(),
        }
    }

    /// The record the mutation targets.
    #[must_use]
    pub fn key(&self) -> Uuid {
        match self {
            OpPayload::Inventory(op) => op.key(),
            OpPayload::Sales(op) => op.key(),
            OpPayload::Expenses(op) => op.key(),
        }
    }
}

/// Storage key for a queue entry.
///
/// Zero-padded so lexicographic row order matches enqueue order.
#[must_use]
pub fn queue_key(id: u64) -> String {
    format!("{id:020}")
}

/// A durable queue entry: one local mutation not yet confirmed remotely.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueuedOp {
    /// Monotonic id assigned by the store; enqueue order equals id order.
    pub id: u64,
    /// The mutation itself.
    pub payload: OpPayload,
    /// When the mutation was queued, unix millis.
    pub enqueued_at_ms: u64,
    /// How many push attempts have failed so far.
    pub retry_count: u32,
}

impl Document for QueuedOp {
    const COLLECTION: &'static str = "sync_queue";

    fn primary_key(&self) -> String {
        queue_key(self.id)
    }
}

/// An engine bookkeeping entry in the meta table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetaEntry {
    /// Meta key.
    pub key: String,
    /// Meta value, unix millis for timestamp entries.
    pub value: u64,
}

impl MetaEntry {
    /// Creates a meta entry.
    #[must_use]
    pub fn new(key: impl Into<String>, value: u64) -> Self {
        Self {
            key: key.into(),
            value,
        }
    }
}

impl Document for MetaEntry {
    const COLLECTION: &'static str = "sync_meta";

    fn primary_key(&self) -> String {
        self.key.clone()
    }
}

/// Meta key holding the timestamp of the last successful pull.
pub const LAST_PULL_SYNC: &str = "last_pull_sync";
