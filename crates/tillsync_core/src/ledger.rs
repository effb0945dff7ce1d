//! Deleted-item ledger entries (tombstones).

use crate::entity::{EntityKind, NaturalKey};
use crate::id::{LocalId, SyncIdentity};
use crate::record::Record;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A retained record of a deletion.
///
/// Captured before the subject record leaves the local store, so the
/// remote delete can be retried after the record itself is gone, and
/// so other surfaces can still display "X was deleted".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tombstone {
    /// Local id of the deleted record.
    pub entity_id: LocalId,
    /// Entity kind of the deleted record.
    pub kind: EntityKind,
    /// Identity snapshot at deletion time; carries the server id when
    /// the record had been confirmed remotely.
    pub identity: SyncIdentity,
    /// Natural key at deletion time.
    pub natural_key: NaturalKey,
    /// Display label for "X was deleted" surfaces.
    pub label: String,
    /// Deletion time.
    pub deleted_at: DateTime<Utc>,
}

impl Tombstone {
    /// Captures a tombstone from a record about to be removed.
    #[must_use]
    pub fn capture(record: &Record) -> Self {
        Self {
            entity_id: record.local_id,
            kind: record.kind(),
            identity: record.identity.clone(),
            natural_key: record.natural_key(),
            label: record.payload.display_label(),
            deleted_at: Utc::now(),
        }
    }
}
