//! Store traits.
//!
//! The local store is split into four concerns: business records, the
//! change queue, the deleted-item ledger, and the sync log. A backend
//! implements all four; engine code bounds on [`LocalStore`] or on the
//! narrowest trait it needs.

use crate::error::StoreResult;
use tillsync_core::{
    EntityKind, LocalId, NaturalKey, QueueItem, QueueStatus, Record, SyncLogEntry, Tombstone,
};

/// Keyed storage for business records, per entity kind.
///
/// Mutated only by the reconciliation engine and ordinary CRUD
/// callers; sync bookkeeping never bypasses these methods.
pub trait RecordStore: Send + Sync {
    /// Returns all records of a kind.
    fn records(&self, kind: EntityKind) -> StoreResult<Vec<Record>>;

    /// Looks up one record by local id.
    fn record(&self, kind: EntityKind, id: &LocalId) -> StoreResult<Option<Record>>;

    /// Inserts or replaces a record, keyed by its local id.
    fn put_record(&self, record: Record) -> StoreResult<()>;

    /// Removes a record, returning it if it existed.
    fn remove_record(&self, kind: EntityKind, id: &LocalId) -> StoreResult<Option<Record>>;

    /// Returns every record of a kind sharing the given natural key.
    fn find_by_natural_key(&self, kind: EntityKind, key: &NaturalKey)
        -> StoreResult<Vec<Record>>;
}

/// Append-only storage for change queue items.
///
/// Mutated only via the engine's enqueue/drain paths; callers never
/// transition item status directly.
pub trait QueueStore: Send + Sync {
    /// Appends a queue item.
    fn append_queue_item(&self, item: QueueItem) -> StoreResult<()>;

    /// Persists updated bookkeeping for an existing item.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::QueueItemNotFound`] if no item with the
    /// same id exists.
    ///
    /// [`StoreError::QueueItemNotFound`]: crate::StoreError::QueueItemNotFound
    fn update_queue_item(&self, item: &QueueItem) -> StoreResult<()>;

    /// Returns all queue items in creation order.
    fn queue_items(&self) -> StoreResult<Vec<QueueItem>>;

    /// Removes all items with the given status, returning the count.
    fn purge_queue(&self, status: QueueStatus) -> StoreResult<usize>;
}

/// Storage for tombstones.
pub trait LedgerStore: Send + Sync {
    /// Appends a tombstone.
    fn append_tombstone(&self, tombstone: Tombstone) -> StoreResult<()>;

    /// Returns all tombstones.
    fn tombstones(&self) -> StoreResult<Vec<Tombstone>>;

    /// Removes the tombstone for an entity, returning it if present.
    fn remove_tombstone(
        &self,
        kind: EntityKind,
        entity_id: &LocalId,
    ) -> StoreResult<Option<Tombstone>>;
}

/// Append-only storage for sync log entries.
pub trait LogStore: Send + Sync {
    /// Appends a log entry.
    fn append_log(&self, entry: SyncLogEntry) -> StoreResult<()>;

    /// Returns all log entries in append order.
    fn logs(&self) -> StoreResult<Vec<SyncLogEntry>>;
}

/// A complete local store: all four concerns behind one backend.
pub trait LocalStore: RecordStore + QueueStore + LedgerStore + LogStore {}

impl<T: RecordStore + QueueStore + LedgerStore + LogStore> LocalStore for T {}
