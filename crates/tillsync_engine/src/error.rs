//! Error types for the sync engine.

use crate::remote::RemoteError;
use thiserror::Error;
use tillsync_model::{Collection, OpKind};
use tillsync_store::StoreError;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors that can occur during engine operations.
///
/// The taxonomy matters for recovery:
/// - `Storage` is fatal to the current operation and never retried
///   automatically.
/// - `RemoteWrite` is recoverable: the operation stays queued and is
///   retried on the next sync trigger.
/// - `RemoteRead` is recoverable and isolated per collection; stale
///   cached data is preferred over no data.
/// - `Authentication` is surfaced and not retried by this engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The local durable store failed.
    #[error("storage error: {0}")]
    Storage(#[from] StoreError),

    /// A pull failed for one collection.
    #[error("remote read failed for {collection}: {message}")]
    RemoteRead {
        /// The collection whose pull failed.
        collection: Collection,
        /// Error detail from the remote client.
        message: String,
    },

    /// A single push operation failed.
    #[error("remote write failed for {collection} {kind}: {message}")]
    RemoteWrite {
        /// The collection the write targeted.
        collection: Collection,
        /// The mutation kind that failed.
        kind: OpKind,
        /// Error detail from the remote client.
        message: String,
    },

    /// The remote rejected our credentials.
    #[error("authentication rejected: {0}")]
    Authentication(String),

    /// A remote request exceeded the configured timeout.
    #[error("remote request timed out")]
    Timeout,

    /// An orchestration run was cancelled between phases.
    #[error("sync cancelled")]
    Cancelled,
}

impl EngineError {
    /// Wraps a remote error from a pull, lifting authentication failures
    /// to their own variant.
    pub fn remote_read(collection: Collection, error: RemoteError) -> Self {
        match error {
            RemoteError::Authentication(message) => Self::Authentication(message),
            other => Self::RemoteRead {
                collection,
                message: other.to_string(),
            },
        }
    }

    /// Wraps a remote error from a push, lifting authentication failures
    /// to their own variant.
    pub fn remote_write(collection: Collection, kind: OpKind, error: RemoteError) -> Self {
        match error {
            RemoteError::Authentication(message) => Self::Authentication(message),
            other => Self::RemoteWrite {
                collection,
                kind,
                message: other.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_errors_are_lifted() {
        let err = EngineError::remote_read(
            Collection::Expenses,
            RemoteError::Authentication("token expired".into()),
        );
        assert!(matches!(err, EngineError::Authentication(_)));

        let err = EngineError::remote_write(
            Collection::Sales,
            OpKind::Create,
            RemoteError::Authentication("token expired".into()),
        );
        assert!(matches!(err, EngineError::Authentication(_)));
    }

    #[test]
    fn error_display() {
        let err = EngineError::remote_read(
            Collection::Inventory,
            RemoteError::Unavailable("connection refused".into()),
        );
        assert!(err.to_string().contains("inventory"));
        assert!(err.to_string().contains("connection refused"));

        assert_eq!(EngineError::Timeout.to_string(), "remote request timed out");
    }
}
