//! File-backed store backend.

use crate::error::{StoreError, StoreResult};
use crate::memory::MemoryStore;
use crate::store::{LedgerStore, LogStore, QueueStore, RecordStore};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tillsync_core::{
    EntityKind, LocalId, NaturalKey, QueueItem, QueueStatus, Record, SyncLogEntry, Tombstone,
};

const RECORDS_FILE: &str = "records.cbor";
const QUEUE_FILE: &str = "queue.cbor";
const LEDGER_FILE: &str = "ledger.cbor";
const LOGS_FILE: &str = "logs.cbor";

/// A durable store backend.
///
/// Each table is persisted as one CBOR snapshot file under a data
/// directory. Snapshots are loaded eagerly at open into an in-memory
/// image; every mutation rewrites the affected table via a temp file
/// and an atomic rename, then syncs the file, so a crash leaves either
/// the old snapshot or the new one, never a torn file.
///
/// # Example
///
/// ```no_run
/// use tillsync_store::{FileStore, RecordStore};
/// use std::path::Path;
///
/// let store = FileStore::open(Path::new("/var/lib/tillsync")).unwrap();
/// for kind in tillsync_core::EntityKind::ALL {
///     println!("{kind}: {} records", store.records(kind).unwrap().len());
/// }
/// ```
#[derive(Debug)]
pub struct FileStore {
    dir: PathBuf,
    cache: MemoryStore,
}

impl FileStore {
    /// Opens a store at the given directory, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or an
    /// existing snapshot cannot be read or decoded.
    pub fn open(dir: &Path) -> StoreResult<Self> {
        fs::create_dir_all(dir)?;
        let cache = MemoryStore::new();

        cache.replace_records(load_table::<Record>(&dir.join(RECORDS_FILE))?);
        cache.replace_queue(load_table::<QueueItem>(&dir.join(QUEUE_FILE))?);
        cache.replace_ledger(load_table::<Tombstone>(&dir.join(LEDGER_FILE))?);
        cache.replace_logs(load_table::<SyncLogEntry>(&dir.join(LOGS_FILE))?);

        Ok(Self {
            dir: dir.to_path_buf(),
            cache,
        })
    }

    /// Returns the data directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn persist<T: Serialize>(&self, name: &str, rows: &[T]) -> StoreResult<()> {
        let path = self.dir.join(name);
        let tmp = self.dir.join(format!("{name}.tmp"));

        let file = File::create(&tmp)?;
        ciborium::ser::into_writer(&rows, &file)
            .map_err(|e| StoreError::Codec(e.to_string()))?;
        file.sync_all()?;

        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn persist_records(&self) -> StoreResult<()> {
        self.persist(RECORDS_FILE, &self.cache.dump_records())
    }

    fn persist_queue(&self) -> StoreResult<()> {
        self.persist(QUEUE_FILE, &self.cache.queue_items()?)
    }

    fn persist_ledger(&self) -> StoreResult<()> {
        self.persist(LEDGER_FILE, &self.cache.tombstones()?)
    }

    fn persist_logs(&self) -> StoreResult<()> {
        self.persist(LOGS_FILE, &self.cache.logs()?)
    }
}

fn load_table<T: DeserializeOwned>(path: &Path) -> StoreResult<Vec<T>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let file = File::open(path)?;
    ciborium::de::from_reader(BufReader::new(file)).map_err(|e| StoreError::Codec(e.to_string()))
}

impl RecordStore for FileStore {
    fn records(&self, kind: EntityKind) -> StoreResult<Vec<Record>> {
        self.cache.records(kind)
    }

    fn record(&self, kind: EntityKind, id: &LocalId) -> StoreResult<Option<Record>> {
        self.cache.record(kind, id)
    }

    fn put_record(&self, record: Record) -> StoreResult<()> {
        self.cache.put_record(record)?;
        self.persist_records()
    }

    fn remove_record(&self, kind: EntityKind, id: &LocalId) -> StoreResult<Option<Record>> {
        let removed = self.cache.remove_record(kind, id)?;
        if removed.is_some() {
            self.persist_records()?;
        }
        Ok(removed)
    }

    fn find_by_natural_key(
        &self,
        kind: EntityKind,
        key: &NaturalKey,
    ) -> StoreResult<Vec<Record>> {
        self.cache.find_by_natural_key(kind, key)
    }
}

impl QueueStore for FileStore {
    fn append_queue_item(&self, item: QueueItem) -> StoreResult<()> {
        self.cache.append_queue_item(item)?;
        self.persist_queue()
    }

    fn update_queue_item(&self, item: &QueueItem) -> StoreResult<()> {
        self.cache.update_queue_item(item)?;
        self.persist_queue()
    }

    fn queue_items(&self) -> StoreResult<Vec<QueueItem>> {
        self.cache.queue_items()
    }

    fn purge_queue(&self, status: QueueStatus) -> StoreResult<usize> {
        let purged = self.cache.purge_queue(status)?;
        if purged > 0 {
            self.persist_queue()?;
        }
        Ok(purged)
    }
}

impl LedgerStore for FileStore {
    fn append_tombstone(&self, tombstone: Tombstone) -> StoreResult<()> {
        self.cache.append_tombstone(tombstone)?;
        self.persist_ledger()
    }

    fn tombstones(&self) -> StoreResult<Vec<Tombstone>> {
        self.cache.tombstones()
    }

    fn remove_tombstone(
        &self,
        kind: EntityKind,
        entity_id: &LocalId,
    ) -> StoreResult<Option<Tombstone>> {
        let removed = self.cache.remove_tombstone(kind, entity_id)?;
        if removed.is_some() {
            self.persist_ledger()?;
        }
        Ok(removed)
    }
}

impl LogStore for FileStore {
    fn append_log(&self, entry: SyncLogEntry) -> StoreResult<()> {
        self.cache.append_log(entry)?;
        self.persist_logs()
    }

    fn logs(&self) -> StoreResult<Vec<SyncLogEntry>> {
        self.cache.logs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tillsync_core::{ChangeAction, EntityPayload, SellerFields, ServerId};

    fn seller(name: &str) -> Record {
        Record::new_local(EntityPayload::Seller(SellerFields {
            name: name.into(),
            branch: "downtown".into(),
            phone: None,
            active: true,
        }))
    }

    #[test]
    fn records_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let mut record = seller("alice");
        record.adopt_server_id(ServerId::new("srv-1"));
        let id = record.local_id;

        {
            let store = FileStore::open(dir.path()).unwrap();
            store.put_record(record.clone()).unwrap();
        }

        let store = FileStore::open(dir.path()).unwrap();
        let loaded = store.record(EntityKind::Seller, &id).unwrap().unwrap();
        assert_eq!(loaded, record);
    }

    #[test]
    fn queue_and_ledger_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let record = seller("alice");
        let item = QueueItem::new(EntityKind::Seller, record.local_id, ChangeAction::Delete);
        let tombstone = Tombstone::capture(&record);

        {
            let store = FileStore::open(dir.path()).unwrap();
            store.append_queue_item(item.clone()).unwrap();
            store.append_tombstone(tombstone.clone()).unwrap();
            store.append_log(SyncLogEntry::info("queued delete")).unwrap();
        }

        let store = FileStore::open(dir.path()).unwrap();
        assert_eq!(store.queue_items().unwrap(), vec![item]);
        assert_eq!(store.tombstones().unwrap(), vec![tombstone]);
        assert_eq!(store.logs().unwrap().len(), 1);
    }

    #[test]
    fn open_on_empty_dir_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        assert!(store.queue_items().unwrap().is_empty());
        assert!(store.records(EntityKind::Seller).unwrap().is_empty());
    }

    #[test]
    fn purge_persists() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = FileStore::open(dir.path()).unwrap();
            let mut item =
                QueueItem::new(EntityKind::Seller, LocalId::new(), ChangeAction::Upsert);
            item.record_success(chrono::Utc::now());
            store.append_queue_item(item).unwrap();
            assert_eq!(store.purge_queue(QueueStatus::Synced).unwrap(), 1);
        }

        let store = FileStore::open(dir.path()).unwrap();
        assert!(store.queue_items().unwrap().is_empty());
    }
}
