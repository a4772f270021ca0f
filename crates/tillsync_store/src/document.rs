//! Typed access to stored rows.

use serde::de::DeserializeOwned;
use serde::Serialize;

/// A typed document stored in one collection.
///
/// Documents are encoded to CBOR rows keyed by their primary key. The
/// store consults `index_value` when maintaining secondary indexes, so
/// a document only needs to answer for the indexes its collection
/// declares.
pub trait Document: Serialize + DeserializeOwned {
    /// The collection this document type is stored in.
    const COLLECTION: &'static str;

    /// The primary key identifying this document within its collection.
    fn primary_key(&self) -> String;

    /// The document's value for the named secondary index, if any.
    fn index_value(&self, index: &str) -> Option<String> {
        let _ = index;
        None
    }
}
