//! # Tillsync Store
//!
//! Durable, collection-scoped key-value storage for the tillsync offline
//! cache.
//!
//! This crate provides:
//! - A fixed, declared schema of named collections with secondary indexes
//! - Typed row access through the [`Document`] trait (CBOR-encoded rows)
//! - A closure-based [`Store::transaction`] API committing one durable
//!   snapshot per transaction
//! - Pluggable [`StorageBackend`]s: in-memory for tests, atomic-rename
//!   file snapshots for persistence
//!
//! ## Key Invariants
//!
//! - Replaying the same `put` is a no-op after the first
//! - Deletes and clears of missing rows/collections never fail
//! - A failed persist leaves the in-memory state and the durable
//!   snapshot unchanged
//! - `put_many` and `transaction` commit as a single snapshot

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod document;
mod error;
mod file;
mod schema;
mod store;

pub use backend::{MemoryBackend, StorageBackend};
pub use document::Document;
pub use error::{StoreError, StoreResult};
pub use file::FileBackend;
pub use schema::{CollectionDef, Schema, SchemaBuilder};
pub use store::{Store, Txn};
