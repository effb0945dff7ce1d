//! Error types for the core data model.

use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in the core data model.
#[derive(Debug, Error)]
pub enum CoreError {
    /// An entity kind name was not recognized.
    #[error("unknown entity kind: {0}")]
    UnknownEntityKind(String),

    /// A payload of the wrong kind was supplied.
    #[error("entity kind mismatch: expected {expected}, got {actual}")]
    KindMismatch {
        /// The expected kind.
        expected: crate::entity::EntityKind,
        /// The kind actually supplied.
        actual: crate::entity::EntityKind,
    },
}
