//! In-memory store backend.

use crate::error::{StoreError, StoreResult};
use crate::store::{LedgerStore, LogStore, QueueStore, RecordStore};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use tillsync_core::{
    EntityKind, LocalId, NaturalKey, QueueItem, QueueStatus, Record, SyncLogEntry, Tombstone,
};

/// An in-memory store backend.
///
/// Used for testing and as the cache image behind [`FileStore`]. All
/// tables live behind `parking_lot` locks, so the backend can be
/// shared across threads, though the engine's cooperative model only
/// ever has one writer active.
///
/// [`FileStore`]: crate::FileStore
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<EntityKind, BTreeMap<LocalId, Record>>>,
    queue: RwLock<Vec<QueueItem>>,
    ledger: RwLock<Vec<Tombstone>>,
    logs: RwLock<Vec<SyncLogEntry>>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the record table with the given rows.
    pub fn replace_records(&self, rows: Vec<Record>) {
        let mut records = self.records.write();
        records.clear();
        for record in rows {
            records
                .entry(record.kind())
                .or_default()
                .insert(record.local_id, record);
        }
    }

    /// Replaces the queue table with the given rows.
    pub fn replace_queue(&self, rows: Vec<QueueItem>) {
        *self.queue.write() = rows;
    }

    /// Replaces the ledger table with the given rows.
    pub fn replace_ledger(&self, rows: Vec<Tombstone>) {
        *self.ledger.write() = rows;
    }

    /// Replaces the log table with the given rows.
    pub fn replace_logs(&self, rows: Vec<SyncLogEntry>) {
        *self.logs.write() = rows;
    }

    /// Returns every record across all kinds.
    #[must_use]
    pub fn dump_records(&self) -> Vec<Record> {
        self.records
            .read()
            .values()
            .flat_map(|table| table.values().cloned())
            .collect()
    }
}

impl RecordStore for MemoryStore {
    fn records(&self, kind: EntityKind) -> StoreResult<Vec<Record>> {
        Ok(self
            .records
            .read()
            .get(&kind)
            .map(|table| table.values().cloned().collect())
            .unwrap_or_default())
    }

    fn record(&self, kind: EntityKind, id: &LocalId) -> StoreResult<Option<Record>> {
        Ok(self
            .records
            .read()
            .get(&kind)
            .and_then(|table| table.get(id).cloned()))
    }

    fn put_record(&self, record: Record) -> StoreResult<()> {
        self.records
            .write()
            .entry(record.kind())
            .or_default()
            .insert(record.local_id, record);
        Ok(())
    }

    fn remove_record(&self, kind: EntityKind, id: &LocalId) -> StoreResult<Option<Record>> {
        Ok(self
            .records
            .write()
            .get_mut(&kind)
            .and_then(|table| table.remove(id)))
    }

    fn find_by_natural_key(
        &self,
        kind: EntityKind,
        key: &NaturalKey,
    ) -> StoreResult<Vec<Record>> {
        Ok(self
            .records
            .read()
            .get(&kind)
            .map(|table| {
                table
                    .values()
                    .filter(|r| r.natural_key() == *key)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}

impl QueueStore for MemoryStore {
    fn append_queue_item(&self, item: QueueItem) -> StoreResult<()> {
        self.queue.write().push(item);
        Ok(())
    }

    fn update_queue_item(&self, item: &QueueItem) -> StoreResult<()> {
        let mut queue = self.queue.write();
        match queue.iter_mut().find(|existing| existing.id == item.id) {
            Some(existing) => {
                *existing = item.clone();
                Ok(())
            }
            None => Err(StoreError::QueueItemNotFound(item.id)),
        }
    }

    fn queue_items(&self) -> StoreResult<Vec<QueueItem>> {
        Ok(self.queue.read().clone())
    }

    fn purge_queue(&self, status: QueueStatus) -> StoreResult<usize> {
        let mut queue = self.queue.write();
        let before = queue.len();
        queue.retain(|item| item.status != status);
        Ok(before - queue.len())
    }
}

impl LedgerStore for MemoryStore {
    fn append_tombstone(&self, tombstone: Tombstone) -> StoreResult<()> {
        self.ledger.write().push(tombstone);
        Ok(())
    }

    fn tombstones(&self) -> StoreResult<Vec<Tombstone>> {
        Ok(self.ledger.read().clone())
    }

    fn remove_tombstone(
        &self,
        kind: EntityKind,
        entity_id: &LocalId,
    ) -> StoreResult<Option<Tombstone>> {
        let mut ledger = self.ledger.write();
        let position = ledger
            .iter()
            .position(|t| t.kind == kind && t.entity_id == *entity_id);
        Ok(position.map(|i| ledger.remove(i)))
    }
}

impl LogStore for MemoryStore {
    fn append_log(&self, entry: SyncLogEntry) -> StoreResult<()> {
        self.logs.write().push(entry);
        Ok(())
    }

    fn logs(&self) -> StoreResult<Vec<SyncLogEntry>> {
        Ok(self.logs.read().clone())
    }
}
