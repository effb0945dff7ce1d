//! Error types for the sync engine.

use crate::remote::RemoteError;
use thiserror::Error;
use tillsync_core::{EntityKind, QueueItemId};
use tillsync_store::StoreError;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur during sync operations.
///
/// The taxonomy separates the three failure classes the engine treats
/// differently: remote failures (retried through the queue, or
/// aborting a pass when connectivity is gone), local storage failures
/// (not queue-retryable, surfaced for manual intervention), and
/// caller mistakes.
#[derive(Debug, Error)]
pub enum SyncError {
    /// A remote operation failed.
    #[error(transparent)]
    Remote(#[from] RemoteError),

    /// Local storage failed. Not retryable through the queue; the
    /// drain surfaces it as an error-type log entry.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// A retry operation referenced an unknown queue item.
    #[error("queue item not found: {0}")]
    QueueItemNotFound(QueueItemId),

    /// An automatic retry was refused because the item is at or over
    /// the retry ceiling. Use a forced retry to override.
    #[error("queue item {id} is at the retry ceiling ({retries}/{max_retries})")]
    RetryCeiling {
        /// The queue item.
        id: QueueItemId,
        /// Its failed attempt count.
        retries: u32,
        /// The configured ceiling.
        max_retries: u32,
    },

    /// Sync is disabled for this entity kind by configuration.
    #[error("sync disabled for entity kind: {0}")]
    KindDisabled(EntityKind),
}

impl SyncError {
    /// Returns true if this error class is worth retrying later.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Remote(e) => e.is_retryable(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_retryability_passes_through() {
        assert!(SyncError::from(RemoteError::Transient("flaky".into())).is_retryable());
        assert!(SyncError::from(RemoteError::Unreachable("down".into())).is_retryable());
        assert!(!SyncError::from(RemoteError::Rejected("bad name".into())).is_retryable());
    }

    #[test]
    fn store_errors_are_not_retryable() {
        let err = SyncError::Store(StoreError::Codec("torn snapshot".into()));
        assert!(!err.is_retryable());
    }

    #[test]
    fn ceiling_error_display() {
        let id = QueueItemId::new();
        let err = SyncError::RetryCeiling {
            id,
            retries: 5,
            max_retries: 5,
        };
        assert!(err.to_string().contains("5/5"));
    }
}
