//! The fixed set of synchronized collections.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A synchronized collection.
///
/// The engine caches and reconciles exactly these three collections;
/// the queue and meta tables are engine bookkeeping, not collections in
/// this sense.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Collection {
    /// Stock on hand, indexed by location.
    Inventory,
    /// Completed sales, indexed by item reference and date.
    Sales,
    /// Recorded expenses, indexed by date and location.
    Expenses,
}

impl Collection {
    /// All synchronized collections, in pull order.
    pub const ALL: [Collection; 3] = [Collection::Inventory, Collection::Sales, Collection::Expenses];

    /// The collection's stable storage name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Collection::Inventory => "inventory",
            Collection::Sales => "sales",
            Collection::Expenses => "expenses",
        }
    }

    /// Resolves a storage name back to a collection.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "inventory" => Some(Collection::Inventory),
            "sales" => Some(Collection::Sales),
            "expenses" => Some(Collection::Expenses),
            _ => None,
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
