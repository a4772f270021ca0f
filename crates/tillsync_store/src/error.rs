//! Error types for store operations.

use std::io;
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur during store operations.
///
/// Storage failures are never swallowed by the store: a failed persist
/// leaves the in-memory state untouched and surfaces the error to the
/// caller.
#[derive(Debug, Error)]
pub enum StoreError {
    /// An I/O error occurred while loading or persisting the snapshot.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A document failed to encode or decode.
    #[error("codec error: {0}")]
    Codec(String),

    /// The persisted snapshot could not be decoded.
    #[error("snapshot corrupted: {0}")]
    Corrupted(String),

    /// A write targeted a collection the schema does not declare.
    #[error("collection not declared: {0}")]
    UnknownCollection(String),

    /// A lookup targeted an index the schema does not declare.
    #[error("unknown index {index} on collection {collection}")]
    UnknownIndex {
        /// The collection that was queried.
        collection: String,
        /// The index that is not declared.
        index: String,
    },
}

impl StoreError {
    /// Creates a codec error from any displayable source.
    pub fn codec(source: impl std::fmt::Display) -> Self {
        Self::Codec(source.to_string())
    }

    /// Creates a corrupted-snapshot error.
    pub fn corrupted(message: impl Into<String>) -> Self {
        Self::Corrupted(message.into())
    }
}
