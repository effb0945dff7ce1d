//! Record envelope shared by all entity kinds.

use crate::entity::{EntityKind, EntityPayload, NaturalKey};
use crate::id::{LocalId, ServerId, SyncIdentity};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Whether a record's current fields have reached the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncStatus {
    /// Local edits not yet confirmed remotely.
    Local,
    /// Fields match the last confirmed server state.
    Synced,
}

/// A business record in the local store.
///
/// The envelope carries sync bookkeeping; the payload carries the
/// entity fields. Two copies of the same business entity may exist
/// transiently (created on separate devices, or created locally and
/// then downloaded); the reconciliation engine collapses them by
/// natural key so that at most one authoritative copy per key remains
/// after a completed pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Locally generated id; never changes.
    pub local_id: LocalId,
    /// Standing relative to the server id space.
    pub identity: SyncIdentity,
    /// Last local modification time; drives last-write-wins among
    /// local duplicates.
    pub updated_at: DateTime<Utc>,
    /// Whether the current fields are confirmed remotely.
    pub sync_status: SyncStatus,
    /// Entity fields.
    pub payload: EntityPayload,
}

impl Record {
    /// Creates a freshly minted local record.
    #[must_use]
    pub fn new_local(payload: EntityPayload) -> Self {
        Self {
            local_id: LocalId::new(),
            identity: SyncIdentity::Local,
            updated_at: Utc::now(),
            sync_status: SyncStatus::Local,
            payload,
        }
    }

    /// Returns the entity kind.
    #[must_use]
    pub fn kind(&self) -> EntityKind {
        self.payload.kind()
    }

    /// Derives the natural key from the payload.
    #[must_use]
    pub fn natural_key(&self) -> NaturalKey {
        self.payload.natural_key()
    }

    /// Returns the confirmed server id, if any.
    #[must_use]
    pub fn server_id(&self) -> Option<&ServerId> {
        self.identity.server_id()
    }

    /// Adopts a server-issued id and marks the record synced.
    pub fn adopt_server_id(&mut self, server_id: ServerId) {
        self.identity.confirm(server_id);
        self.sync_status = SyncStatus::Synced;
    }

    /// Applies a local edit: new payload, fresh timestamp, back to
    /// unsynced.
    pub fn apply_local_edit(&mut self, payload: EntityPayload) {
        self.payload = payload;
        self.updated_at = Utc::now();
        self.sync_status = SyncStatus::Local;
    }
}

/// A record as the server represents it.
///
/// Remote records live entirely in the server id space; the local id
/// is assigned only when one is merged into the local store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteRecord {
    /// Canonical server id.
    pub server_id: ServerId,
    /// Server-side modification time.
    pub updated_at: DateTime<Utc>,
    /// Entity fields.
    pub payload: EntityPayload,
}

impl RemoteRecord {
    /// Returns the entity kind.
    #[must_use]
    pub fn kind(&self) -> EntityKind {
        self.payload.kind()
    }

    /// Derives the natural key from the payload.
    #[must_use]
    pub fn natural_key(&self) -> NaturalKey {
        self.payload.natural_key()
    }

    /// Converts into a fresh local record that is already synced.
    ///
    /// Used when a download finds no local match for the natural key.
    #[must_use]
    pub fn into_local(self) -> Record {
        Record {
            local_id: LocalId::new(),
            identity: SyncIdentity::Confirmed(self.server_id),
            updated_at: self.updated_at,
            sync_status: SyncStatus::Synced,
            payload: self.payload,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::SellerFields;

    fn seller_record(name: &str) -> Record {
        Record::new_local(EntityPayload::Seller(SellerFields {
            name: name.into(),
            branch: "downtown".into(),
            phone: None,
            active: true,
        }))
    }

    #[test]
    fn new_local_record_is_unsynced() {
        let record = seller_record("alice");
        assert_eq!(record.sync_status, SyncStatus::Local);
        assert_eq!(record.identity, SyncIdentity::Local);
        assert!(record.server_id().is_none());
        assert_eq!(record.kind(), EntityKind::Seller);
    }

    #[test]
    fn adopt_server_id_confirms_and_syncs() {
        let mut record = seller_record("alice");
        record.adopt_server_id(ServerId::new("srv-1"));
        assert_eq!(record.sync_status, SyncStatus::Synced);
        assert_eq!(record.server_id().map(ServerId::as_str), Some("srv-1"));
    }

    #[test]
    fn local_edit_resets_sync_status() {
        let mut record = seller_record("alice");
        record.adopt_server_id(ServerId::new("srv-1"));
        let before = record.updated_at;

        record.apply_local_edit(EntityPayload::Seller(SellerFields {
            name: "alice".into(),
            branch: "downtown".into(),
            phone: Some("555-1234".into()),
            active: true,
        }));

        assert_eq!(record.sync_status, SyncStatus::Local);
        assert!(record.updated_at >= before);
        // Identity survives the edit; only the field state is dirty.
        assert!(record.identity.is_confirmed());
    }

    #[test]
    fn remote_record_into_local() {
        let remote = RemoteRecord {
            server_id: ServerId::new("srv-7"),
            updated_at: Utc::now(),
            payload: seller_record("bea").payload,
        };
        let key = remote.natural_key();

        let local = remote.into_local();
        assert_eq!(local.sync_status, SyncStatus::Synced);
        assert_eq!(local.server_id().map(ServerId::as_str), Some("srv-7"));
        assert_eq!(local.natural_key(), key);
    }
}
