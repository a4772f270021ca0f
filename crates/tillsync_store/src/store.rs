//! The durable collection store.

use crate::backend::StorageBackend;
use crate::document::Document;
use crate::error::{StoreError, StoreResult};
use crate::schema::Schema;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// One collection's rows and secondary indexes.
///
/// Rows are CBOR-encoded documents keyed by primary key. Each index maps
/// an indexed value to the set of primary keys carrying it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Table {
    rows: BTreeMap<String, Vec<u8>>,
    indexes: BTreeMap<String, BTreeMap<String, BTreeSet<String>>>,
}

/// The full persisted state: every table plus named id sequences.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StoreState {
    tables: BTreeMap<String, Table>,
    sequences: BTreeMap<String, u64>,
}

fn encode_state(state: &StoreState) -> StoreResult<Vec<u8>> {
    let mut buf = Vec::new();
    ciborium::ser::into_writer(state, &mut buf).map_err(StoreError::codec)?;
    Ok(buf)
}

fn decode_state(bytes: &[u8]) -> StoreResult<StoreState> {
    ciborium::de::from_reader(bytes).map_err(|e| StoreError::corrupted(e.to_string()))
}

fn encode_row<D: Document>(doc: &D) -> StoreResult<Vec<u8>> {
    let mut buf = Vec::new();
    ciborium::ser::into_writer(doc, &mut buf).map_err(StoreError::codec)?;
    Ok(buf)
}

fn decode_row<D: Document>(bytes: &[u8]) -> StoreResult<D> {
    ciborium::de::from_reader(bytes).map_err(StoreError::codec)
}

/// A durable, collection-scoped key-value store.
///
/// The store is opened once with a fixed [`Schema`] and shared by
/// reference; it holds its state in memory and persists a full snapshot
/// through its [`StorageBackend`] on every committed transaction.
/// Constructed explicitly and passed to its consumers — there is no
/// process-wide singleton.
///
/// # Atomicity
///
/// All mutations run inside [`Store::transaction`]: they apply to a
/// working copy of the state, the snapshot is persisted, and only then
/// does the in-memory state swap. A failed persist therefore leaves both
/// the in-memory state and the durable snapshot unchanged.
pub struct Store {
    schema: Schema,
    backend: Box<dyn StorageBackend>,
    state: RwLock<StoreState>,
}

impl Store {
    /// Opens a store, loading the backend's snapshot if one exists.
    ///
    /// Tables for every declared collection are created on first open;
    /// reopening with the same schema reuses them.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot cannot be loaded or decoded.
    pub fn open(schema: Schema, backend: Box<dyn StorageBackend>) -> StoreResult<Self> {
        let mut state = match backend.load()? {
            Some(bytes) => decode_state(&bytes)?,
            None => StoreState::default(),
        };

        for def in schema.collections() {
            let table = state.tables.entry(def.name().to_string()).or_default();
            for index in def.indexes() {
                table.indexes.entry(index.clone()).or_default();
            }
        }

        Ok(Self {
            schema,
            backend,
            state: RwLock::new(state),
        })
    }

    /// Returns the schema the store was opened with.
    #[must_use]
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Gets a document by primary key.
    ///
    /// # Errors
    ///
    /// Returns an error if the stored row cannot be decoded.
    pub fn get<D: Document>(&self, key: &str) -> StoreResult<Option<D>> {
        let state = self.state.read();
        match state.tables.get(D::COLLECTION).and_then(|t| t.rows.get(key)) {
            Some(bytes) => Ok(Some(decode_row(bytes)?)),
            None => Ok(None),
        }
    }

    /// Returns every document in the collection, in primary-key order.
    ///
    /// A missing or undeclared collection yields an empty vector, never
    /// an error.
    pub fn get_all<D: Document>(&self) -> StoreResult<Vec<D>> {
        let state = self.state.read();
        let Some(table) = state.tables.get(D::COLLECTION) else {
            return Ok(Vec::new());
        };
        table.rows.values().map(|bytes| decode_row(bytes)).collect()
    }

    /// Equality lookup on a declared secondary index.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::UnknownIndex`] if the index is not declared
    /// for the collection.
    pub fn get_by_index<D: Document>(&self, index: &str, value: &str) -> StoreResult<Vec<D>> {
        let def = self
            .schema
            .collection(D::COLLECTION)
            .ok_or_else(|| StoreError::UnknownCollection(D::COLLECTION.to_string()))?;
        if !def.has_index(index) {
            return Err(StoreError::UnknownIndex {
                collection: D::COLLECTION.to_string(),
                index: index.to_string(),
            });
        }

        let state = self.state.read();
        let Some(table) = state.tables.get(D::COLLECTION) else {
            return Ok(Vec::new());
        };
        let Some(keys) = table.indexes.get(index).and_then(|m| m.get(value)) else {
            return Ok(Vec::new());
        };
        keys.iter()
            .filter_map(|key| table.rows.get(key))
            .map(|bytes| decode_row(bytes))
            .collect()
    }

    /// Returns the number of rows in the collection.
    #[must_use]
    pub fn count<D: Document>(&self) -> usize {
        self.state
            .read()
            .tables
            .get(D::COLLECTION)
            .map(|t| t.rows.len())
            .unwrap_or(0)
    }

    /// Inserts or replaces a document, keyed by its primary key.
    ///
    /// Replaying the same `put` is a no-op after the first.
    pub fn put<D: Document>(&self, doc: &D) -> StoreResult<()> {
        self.transaction(|txn| txn.put(doc))
    }

    /// Inserts or replaces a batch of documents as one transaction.
    pub fn put_many<D: Document>(&self, docs: &[D]) -> StoreResult<()> {
        self.transaction(|txn| {
            for doc in docs {
                txn.put(doc)?;
            }
            Ok(())
        })
    }

    /// Removes a document by primary key. Removing a missing key is not
    /// an error.
    pub fn delete_by_key<D: Document>(&self, key: &str) -> StoreResult<()> {
        self.transaction(|txn| txn.delete::<D>(key))
    }

    /// Removes every row in the collection.
    pub fn clear<D: Document>(&self) -> StoreResult<()> {
        self.transaction(|txn| txn.clear::<D>())
    }

    /// Allocates the next id from a named monotonic sequence.
    pub fn next_id(&self, sequence: &str) -> StoreResult<u64> {
        self.transaction(|txn| Ok(txn.next_id(sequence)))
    }

    /// Runs `f` against a working copy of the state and commits the
    /// result as one durable snapshot.
    ///
    /// If `f` fails or the persist fails, nothing changes.
    pub fn transaction<F, T>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&mut Txn<'_>) -> StoreResult<T>,
    {
        let mut state = self.state.write();
        let mut working = state.clone();
        let out = f(&mut Txn {
            schema: &self.schema,
            state: &mut working,
        })?;
        let bytes = encode_state(&working)?;
        self.backend.persist(&bytes)?;
        *state = working;
        Ok(out)
    }
}

/// An in-flight transaction over a working copy of the store state.
pub struct Txn<'a> {
    schema: &'a Schema,
    state: &'a mut StoreState,
}

impl Txn<'_> {
    /// Gets a document by primary key, seeing earlier writes in this
    /// transaction.
    pub fn get<D: Document>(&self, key: &str) -> StoreResult<Option<D>> {
        match self
            .state
            .tables
            .get(D::COLLECTION)
            .and_then(|t| t.rows.get(key))
        {
            Some(bytes) => Ok(Some(decode_row(bytes)?)),
            None => Ok(None),
        }
    }

    /// Inserts or replaces a document and refreshes its index entries.
    pub fn put<D: Document>(&mut self, doc: &D) -> StoreResult<()> {
        let def = self
            .schema
            .collection(D::COLLECTION)
            .ok_or_else(|| StoreError::UnknownCollection(D::COLLECTION.to_string()))?;

        let key = doc.primary_key();
        let bytes = encode_row(doc)?;
        let table = self
            .state
            .tables
            .entry(D::COLLECTION.to_string())
            .or_default();

        // Drop stale index entries for this key before re-adding.
        for entries in table.indexes.values_mut() {
            for keys in entries.values_mut() {
                keys.remove(&key);
            }
            entries.retain(|_, keys| !keys.is_empty());
        }
        for index in def.indexes() {
            if let Some(value) = doc.index_value(index) {
                table
                    .indexes
                    .entry(index.clone())
                    .or_default()
                    .entry(value)
                    .or_default()
                    .insert(key.clone());
            }
        }

        table.rows.insert(key, bytes);
        Ok(())
    }

    /// Removes a document by primary key; a missing key is a no-op.
    pub fn delete<D: Document>(&mut self, key: &str) -> StoreResult<()> {
        let Some(table) = self.state.tables.get_mut(D::COLLECTION) else {
            return Ok(());
        };
        table.rows.remove(key);
        for entries in table.indexes.values_mut() {
            for keys in entries.values_mut() {
                keys.remove(key);
            }
            entries.retain(|_, keys| !keys.is_empty());
        }
        Ok(())
    }

    /// Removes every row and index entry in the collection.
    pub fn clear<D: Document>(&mut self) -> StoreResult<()> {
        if let Some(table) = self.state.tables.get_mut(D::COLLECTION) {
            table.rows.clear();
            for entries in table.indexes.values_mut() {
                entries.clear();
            }
        }
        Ok(())
    }

    /// Allocates the next id from a named monotonic sequence.
    pub fn next_id(&mut self, sequence: &str) -> u64 {
        let next = self.state.sequences.entry(sequence.to_string()).or_insert(0);
        *next += 1;
        *next
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use crate::file::FileBackend;
    use proptest::prelude::*;
    use std::sync::Arc;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Widget {
        id: String,
        shade: String,
        size: i64,
    }

    impl Document for Widget {
        const COLLECTION: &'static str = "widgets";

        fn primary_key(&self) -> String {
            self.id.clone()
        }

        fn index_value(&self, index: &str) -> Option<String> {
            match index {
                "shade" => Some(self.shade.clone()),
                _ => None,
            }
        }
    }

    fn widget(id: &str, shade: &str, size: i64) -> Widget {
        Widget {
            id: id.into(),
            shade: shade.into(),
            size,
        }
    }

    fn test_schema() -> Schema {
        Schema::builder().collection("widgets", &["shade"]).build()
    }

    fn open_store() -> Store {
        Store::open(test_schema(), Box::new(MemoryBackend::new())).unwrap()
    }

    #[test]
    fn put_then_get() {
        let store = open_store();
        store.put(&widget("w1", "red", 3)).unwrap();

        let found: Widget = store.get("w1").unwrap().unwrap();
        assert_eq!(found, widget("w1", "red", 3));
        assert!(store.get::<Widget>("w2").unwrap().is_none());
    }

    #[test]
    fn get_all_on_empty_collection() {
        let store = open_store();
        assert!(store.get_all::<Widget>().unwrap().is_empty());
    }

    #[test]
    fn put_is_idempotent() {
        let store = open_store();
        let w = widget("w1", "red", 3);

        store.put(&w).unwrap();
        let once = store.get_all::<Widget>().unwrap();
        store.put(&w).unwrap();
        let twice = store.get_all::<Widget>().unwrap();

        assert_eq!(once, twice);
        assert_eq!(store.count::<Widget>(), 1);
    }

    #[test]
    fn put_replaces_and_reindexes() {
        let store = open_store();
        store.put(&widget("w1", "red", 3)).unwrap();
        store.put(&widget("w1", "blue", 4)).unwrap();

        assert!(store.get_by_index::<Widget>("shade", "red").unwrap().is_empty());
        let blues = store.get_by_index::<Widget>("shade", "blue").unwrap();
        assert_eq!(blues, vec![widget("w1", "blue", 4)]);
    }

    #[test]
    fn get_by_index_groups_keys() {
        let store = open_store();
        store.put(&widget("w1", "red", 1)).unwrap();
        store.put(&widget("w2", "red", 2)).unwrap();
        store.put(&widget("w3", "blue", 3)).unwrap();

        let reds = store.get_by_index::<Widget>("shade", "red").unwrap();
        assert_eq!(reds.len(), 2);
    }

    #[test]
    fn unknown_index_is_an_error() {
        let store = open_store();
        let result = store.get_by_index::<Widget>("size", "3");
        assert!(matches!(result, Err(StoreError::UnknownIndex { .. })));
    }

    #[test]
    fn delete_is_idempotent() {
        let store = open_store();
        store.put(&widget("w1", "red", 3)).unwrap();

        store.delete_by_key::<Widget>("w1").unwrap();
        store.delete_by_key::<Widget>("w1").unwrap();
        store.delete_by_key::<Widget>("never-existed").unwrap();

        assert_eq!(store.count::<Widget>(), 0);
        assert!(store.get_by_index::<Widget>("shade", "red").unwrap().is_empty());
    }

    #[test]
    fn clear_empties_rows_and_indexes() {
        let store = open_store();
        store.put(&widget("w1", "red", 1)).unwrap();
        store.put(&widget("w2", "blue", 2)).unwrap();

        store.clear::<Widget>().unwrap();

        assert_eq!(store.count::<Widget>(), 0);
        assert!(store.get_by_index::<Widget>("shade", "red").unwrap().is_empty());
    }

    #[test]
    fn put_many_commits_one_snapshot() {
        let backend = Arc::new(MemoryBackend::new());
        let store = Store::open(test_schema(), Box::new(Arc::clone(&backend))).unwrap();

        store
            .put_many(&[widget("w1", "red", 1), widget("w2", "blue", 2)])
            .unwrap();

        assert_eq!(backend.persist_calls(), 1);
        assert_eq!(store.count::<Widget>(), 2);
    }

    #[test]
    fn put_to_undeclared_collection_fails() {
        #[derive(Debug, Clone, Serialize, Deserialize)]
        struct Ghost {
            id: String,
        }
        impl Document for Ghost {
            const COLLECTION: &'static str = "ghosts";
            fn primary_key(&self) -> String {
                self.id.clone()
            }
        }

        let store = open_store();
        let result = store.put(&Ghost { id: "g1".into() });
        assert!(matches!(result, Err(StoreError::UnknownCollection(_))));
        // Reads on undeclared collections still never fail.
        assert!(store.get_all::<Ghost>().unwrap().is_empty());
    }

    #[test]
    fn failed_persist_leaves_state_unchanged() {
        let backend = Arc::new(MemoryBackend::new());
        let store = Store::open(test_schema(), Box::new(Arc::clone(&backend))).unwrap();
        store.put(&widget("w1", "red", 1)).unwrap();

        backend.set_fail_writes(true);
        let result = store.put(&widget("w2", "blue", 2));
        assert!(result.is_err());

        assert_eq!(store.count::<Widget>(), 1);
        assert!(store.get::<Widget>("w2").unwrap().is_none());
    }

    #[test]
    fn failed_transaction_closure_does_not_persist() {
        let backend = Arc::new(MemoryBackend::new());
        let store = Store::open(test_schema(), Box::new(Arc::clone(&backend))).unwrap();
        let calls_before = backend.persist_calls();

        let result: StoreResult<()> = store.transaction(|txn| {
            txn.put(&widget("w1", "red", 1))?;
            Err(StoreError::corrupted("abort"))
        });

        assert!(result.is_err());
        assert_eq!(backend.persist_calls(), calls_before);
        assert_eq!(store.count::<Widget>(), 0);
    }

    #[test]
    fn transaction_reads_its_own_writes() {
        let store = open_store();
        store
            .transaction(|txn| {
                txn.put(&widget("w1", "red", 1))?;
                let seen: Option<Widget> = txn.get("w1")?;
                assert_eq!(seen, Some(widget("w1", "red", 1)));
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn sequences_are_monotonic() {
        let store = open_store();
        assert_eq!(store.next_id("ops").unwrap(), 1);
        assert_eq!(store.next_id("ops").unwrap(), 2);
        assert_eq!(store.next_id("other").unwrap(), 1);
    }

    #[test]
    fn reopen_preserves_rows_indexes_and_sequences() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.tillsync");

        {
            let store =
                Store::open(test_schema(), Box::new(FileBackend::open(&path))).unwrap();
            store.put(&widget("w1", "red", 7)).unwrap();
            store.next_id("ops").unwrap();
            store.next_id("ops").unwrap();
        }

        let store = Store::open(test_schema(), Box::new(FileBackend::open(&path))).unwrap();
        let found: Widget = store.get("w1").unwrap().unwrap();
        assert_eq!(found.size, 7);
        assert_eq!(
            store.get_by_index::<Widget>("shade", "red").unwrap().len(),
            1
        );
        assert_eq!(store.next_id("ops").unwrap(), 3);
    }

    #[test]
    fn corrupt_snapshot_is_reported() {
        let backend = MemoryBackend::with_snapshot(b"not cbor at all".to_vec());
        let result = Store::open(test_schema(), Box::new(backend));
        assert!(matches!(result, Err(StoreError::Corrupted(_))));
    }

    proptest! {
        #[test]
        fn replayed_put_is_idempotent(
            id in "[a-z]{1,8}",
            shade in "[a-z]{1,6}",
            size in any::<i64>(),
        ) {
            let store = open_store();
            let w = Widget { id, shade, size };

            store.put(&w).unwrap();
            let once = store.get_all::<Widget>().unwrap();
            store.put(&w).unwrap();
            let twice = store.get_all::<Widget>().unwrap();

            prop_assert_eq!(once, twice);
        }

        #[test]
        fn deleting_missing_keys_never_fails(key in "[a-z0-9-]{1,16}") {
            let store = open_store();
            prop_assert!(store.delete_by_key::<Widget>(&key).is_ok());
            prop_assert_eq!(store.count::<Widget>(), 0);
        }
    }
}
