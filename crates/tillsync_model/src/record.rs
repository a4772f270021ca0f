//! Cached record types and their field-level patches.

use crate::collection::Collection;
use serde::{Deserialize, Serialize};
use tillsync_store::Document;
use uuid::Uuid;

/// A stocked item.
///
/// Monetary amounts are integer cents throughout; dates are ISO
/// `YYYY-MM-DD` strings indexed as opaque equality keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryItem {
    /// Client-assigned identity, stable before the remote sees the row.
    pub id: Uuid,
    /// Item name.
    pub name: String,
    /// Units on hand.
    pub quantity: i64,
    /// Price per unit, in cents.
    pub unit_price_cents: i64,
    /// Stocking location.
    pub location: String,
}

impl InventoryItem {
    /// Creates an item with a fresh id.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        quantity: i64,
        unit_price_cents: i64,
        location: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            quantity,
            unit_price_cents,
            location: location.into(),
        }
    }
}

impl Document for InventoryItem {
    const COLLECTION: &'static str = Collection::Inventory.name();

    fn primary_key(&self) -> String {
        self.id.to_string()
    }

    fn index_value(&self, index: &str) -> Option<String> {
        match index {
            "location" => Some(self.location.clone()),
            _ => None,
        }
    }
}

/// A completed sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleRecord {
    /// Client-assigned identity.
    pub id: Uuid,
    /// The inventory item sold.
    pub item_id: Uuid,
    /// Units sold.
    pub quantity: i64,
    /// Sale total, in cents.
    pub total_cents: i64,
    /// Sale date, ISO `YYYY-MM-DD`.
    pub date: String,
}

impl SaleRecord {
    /// Creates a sale with a fresh id.
    #[must_use]
    pub fn new(item_id: Uuid, quantity: i64, total_cents: i64, date: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            item_id,
            quantity,
            total_cents,
            date: date.into(),
        }
    }
}

impl Document for SaleRecord {
    const COLLECTION: &'static str = Collection::Sales.name();

    fn primary_key(&self) -> String {
        self.id.to_string()
    }

    fn index_value(&self, index: &str) -> Option<String> {
        match index {
            "item_id" => Some(self.item_id.to_string()),
            "date" => Some(self.date.clone()),
            _ => None,
        }
    }
}

/// A recorded expense.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpenseRecord {
    /// Client-assigned identity.
    pub id: Uuid,
    /// What the expense was for.
    pub description: String,
    /// Amount, in cents.
    pub amount_cents: i64,
    /// Expense date, ISO `YYYY-MM-DD`.
    pub date: String,
    /// Location the expense applies to.
    pub location: String,
}

impl ExpenseRecord {
    /// Creates an expense with a fresh id.
    #[must_use]
    pub fn new(
        description: impl Into<String>,
        amount_cents: i64,
        date: impl Into<String>,
        location: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            description: description.into(),
            amount_cents,
            date: date.into(),
            location: location.into(),
        }
    }
}

impl Document for ExpenseRecord {
    const COLLECTION: &'static str = Collection::Expenses.name();

    fn primary_key(&self) -> String {
        self.id.to_string()
    }

    fn index_value(&self, index: &str) -> Option<String> {
        match index {
            "date" => Some(self.date.clone()),
            "location" => Some(self.location.clone()),
            _ => None,
        }
    }
}

/// Field-level patch for an [`InventoryItem`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryPatch {
    /// New name, if changed.
    pub name: Option<String>,
    /// New quantity, if changed.
    pub quantity: Option<i64>,
    /// New unit price, if changed.
    pub unit_price_cents: Option<i64>,
    /// New location, if changed.
    pub location: Option<String>,
}

impl InventoryPatch {
    /// Applies the changed fields to an item.
    pub fn apply(&self, item: &mut InventoryItem) {
        if let Some(name) = &self.name {
            item.name = name.clone();
        }
        if let Some(quantity) = self.quantity {
            item.quantity = quantity;
        }
        if let Some(unit_price_cents) = self.unit_price_cents {
            item.unit_price_cents = unit_price_cents;
        }
        if let Some(location) = &self.location {
            item.location = location.clone();
        }
    }

    /// Returns true if no field is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.quantity.is_none()
            && self.unit_price_cents.is_none()
            && self.location.is_none()
    }
}

/// Field-level patch for a [`SaleRecord`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalePatch {
    /// New item reference, if changed.
    pub item_id: Option<Uuid>,
    /// New quantity, if changed.
    pub quantity: Option<i64>,
    /// New total, if changed.
    pub total_cents: Option<i64>,
    /// New date, if changed.
    pub date: Option<String>,
}

impl SalePatch {
    /// Applies the changed fields to a sale.
    pub fn apply(&self, sale: &mut SaleRecord) {
        if let Some(item_id) = self.item_id {
            sale.item_id = item_id;
        }
        if let Some(quantity) = self.quantity {
            sale.quantity = quantity;
        }
        if let Some(total_cents) = self.total_cents {
            sale.total_cents = total_cents;
        }
        if let Some(date) = &self.date {
            sale.date = date.clone();
        }
    }

    /// Returns true if no field is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.item_id.is_none()
            && self.quantity.is_none()
            && self.total_cents.is_none()
            && self.date.is_none()
    }
}

/// Field-level patch for an [`ExpenseRecord`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpensePatch {
    /// New description, if changed.
    pub description: Option<String>,
    /// New amount, if changed.
    pub amount_cents: Option<i64>,
    /// New date, if changed.
    pub date: Option<String>,
    /// New location, if changed.
    pub location: Option<String>,
}

impl ExpensePatch {
    /// Applies the changed fields to an expense.
    pub fn apply(&self, expense: &mut ExpenseRecord) {
        if let Some(description) = &self.description {
            expense.description = description.clone();
        }
        if let Some(amount_cents) = self.amount_cents {
            expense.amount_cents = amount_cents;
        }
        if let Some(date) = &self.date {
            expense.date = date.clone();
        }
        if let Some(location) = &self.location {
            expense.location = location.clone();
        }
    }

    /// Returns true if no field is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.description.is_none()
            && self.amount_cents.is_none()
            && self.date.is_none()
            && self.location.is_none()
    }
}

/// A row as exchanged with the remote datastore, tagged by collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RemoteRow {
    /// An inventory row.
    Inventory(InventoryItem),
    /// A sales row.
    Sale(SaleRecord),
    /// An expenses row.
    Expense(ExpenseRecord),
}

impl RemoteRow {
    /// The collection this row belongs to.
    #[must_use]
    pub fn collection(&self) -> Collection {
        match self {
            RemoteRow::Inventory(_) => Collection::Inventory,
            RemoteRow::Sale(_) => Collection::Sales,
            RemoteRow::Expense(_) => Collection::Expenses,
        }
    }

    /// The row's primary key.
    #[must_use]
    pub fn key(&self) -> Uuid {
        match self {
            RemoteRow::Inventory(item) => item.id,
            RemoteRow::Sale(sale) => sale.id,
            RemoteRow::Expense(expense) => expense.id,
        }
    }

    /// The row's value for an indexed field, used by equality filters.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<String> {
        match self {
            RemoteRow::Inventory(item) => item.index_value(name),
            RemoteRow::Sale(sale) => sale.index_value(name),
            RemoteRow::Expense(expense) => expense.index_value(name),
        }
    }
}

/// A field-level patch as sent to the remote datastore, tagged by
/// collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordPatch {
    /// Patch for an inventory row.
    Inventory(InventoryPatch),
    /// Patch for a sales row.
    Sale(SalePatch),
    /// Patch for an expenses row.
    Expense(ExpensePatch),
}

impl RecordPatch {
    /// The collection this patch targets.
    #[must_use]
    pub fn collection(&self) -> Collection {
        match self {
            RecordPatch::Inventory(_) => Collection::Inventory,
            RecordPatch::Sale(_) => Collection::Sales,
            RecordPatch::Expense(_) => Collection::Expenses,
        }
    }

    /// Applies the patch to a row of the matching collection.
    ///
    /// Returns false (and changes nothing) if the collections differ.
    pub fn apply_to(&self, row: &mut RemoteRow) -> bool {
        match (self, row) {
            (RecordPatch::Inventory(patch), RemoteRow::Inventory(item)) => {
                patch.apply(item);
                true
            }
            (RecordPatch::Sale(patch), RemoteRow::Sale(sale)) => {
                patch.apply(sale);
                true
            }
            (RecordPatch::Expense(patch), RemoteRow::Expense(expense)) => {
                patch.apply(expense);
                true
            }
            _ => false,
        }
    }
}
