//! Error types for store operations.

use std::io;
use thiserror::Error;
use tillsync_core::QueueItemId;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A snapshot file could not be encoded or decoded.
    #[error("codec error: {0}")]
    Codec(String),

    /// An update referenced a queue item that does not exist.
    #[error("queue item not found: {0}")]
    QueueItemNotFound(QueueItemId),
}
