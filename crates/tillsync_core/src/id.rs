//! Local and server id spaces.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Locally generated identifier for a record.
///
/// Local ids are 128-bit UUIDs minted on the device that created the
/// record. They are:
/// - Unique within a device without coordination
/// - Immutable once assigned
/// - Never reused, even after the record is deleted
///
/// A local id says nothing about whether the server knows the record;
/// that is tracked separately by [`SyncIdentity`].
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LocalId(Uuid);

impl LocalId {
    /// Creates a new random local id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a local id from a UUID.
    #[must_use]
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Converts to a UUID.
    #[must_use]
    pub fn to_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for LocalId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for LocalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LocalId({})", self.0)
    }
}

impl fmt::Display for LocalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for LocalId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// Canonical server-issued identifier.
///
/// Server ids are opaque strings minted by the remote server when it
/// first accepts a record. The client never fabricates one.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ServerId(String);

impl ServerId {
    /// Wraps a server-issued id string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the raw id string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ServerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ServerId({})", self.0)
    }
}

impl fmt::Display for ServerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ServerId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

/// Where a record stands relative to the server's id space.
///
/// The original behavior of sniffing "does this id look server-shaped"
/// is replaced by an explicit tri-state that is transitioned by method
/// calls, never inferred from string shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncIdentity {
    /// Never uploaded; the server has no id for this record.
    Local,
    /// An upload was attempted but no server id has been confirmed.
    Pending,
    /// The server accepted the record and issued this id.
    Confirmed(ServerId),
}

impl SyncIdentity {
    /// Returns the confirmed server id, if any.
    #[must_use]
    pub fn server_id(&self) -> Option<&ServerId> {
        match self {
            SyncIdentity::Confirmed(id) => Some(id),
            _ => None,
        }
    }

    /// Returns true once the server has issued an id.
    #[must_use]
    pub fn is_confirmed(&self) -> bool {
        matches!(self, SyncIdentity::Confirmed(_))
    }

    /// Marks an upload attempt in flight.
    ///
    /// A confirmed identity is never demoted.
    pub fn mark_pending(&mut self) {
        if !self.is_confirmed() {
            *self = SyncIdentity::Pending;
        }
    }

    /// Adopts a server-issued id.
    pub fn confirm(&mut self, id: ServerId) {
        *self = SyncIdentity::Confirmed(id);
    }
}
