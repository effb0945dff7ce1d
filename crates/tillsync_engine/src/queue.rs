//! Change queue management.

use crate::error::{SyncError, SyncResult};
use std::sync::Arc;
use tillsync_core::{ChangeAction, EntityKind, LocalId, QueueItem, QueueItemId, QueueStatus};
use tillsync_store::QueueStore;

/// Live queue counters: `{pending, synced, failed, total}`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStatusCounts {
    /// Items waiting for a drain.
    pub pending: u32,
    /// Items confirmed remotely.
    pub synced: u32,
    /// Items at the retry ceiling.
    pub failed: u32,
    /// All items.
    pub total: u32,
}

/// The change queue: pending mutations awaiting upload.
///
/// All status transitions go through this type (driven by the engine's
/// enqueue/drain/retry paths); callers never flip item status in the
/// store directly.
pub struct ChangeQueue<S> {
    store: Arc<S>,
}

impl<S: QueueStore> ChangeQueue<S> {
    /// Creates a queue over the given store.
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Appends a pending mutation.
    ///
    /// Re-enqueueing a mutation identical to one already pending is a
    /// no-op and returns `None`; a drain will pick up the existing
    /// item anyway, and suppressing the duplicate avoids a second
    /// remote call for the same change.
    pub fn enqueue(
        &self,
        kind: EntityKind,
        entity_id: LocalId,
        action: ChangeAction,
    ) -> SyncResult<Option<QueueItemId>> {
        let already_pending = self
            .store
            .queue_items()?
            .iter()
            .any(|item| item.same_pending_mutation(kind, &entity_id, action));
        if already_pending {
            return Ok(None);
        }

        let item = QueueItem::new(kind, entity_id, action);
        let id = item.id;
        self.store.append_queue_item(item)?;
        Ok(Some(id))
    }

    /// Returns pending items in creation order.
    pub fn pending(&self) -> SyncResult<Vec<QueueItem>> {
        let mut items: Vec<QueueItem> = self
            .store
            .queue_items()?
            .into_iter()
            .filter(|item| item.status == QueueStatus::Pending)
            .collect();
        items.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(items)
    }

    /// Returns items with the given status.
    pub fn with_status(&self, status: QueueStatus) -> SyncResult<Vec<QueueItem>> {
        Ok(self
            .store
            .queue_items()?
            .into_iter()
            .filter(|item| item.status == status)
            .collect())
    }

    /// Looks up one item by id.
    pub fn get(&self, id: QueueItemId) -> SyncResult<Option<QueueItem>> {
        Ok(self
            .store
            .queue_items()?
            .into_iter()
            .find(|item| item.id == id))
    }

    /// Returns live status counters.
    pub fn counts(&self) -> SyncResult<QueueStatusCounts> {
        let mut counts = QueueStatusCounts::default();
        for item in self.store.queue_items()? {
            counts.total += 1;
            match item.status {
                QueueStatus::Pending => counts.pending += 1,
                QueueStatus::Synced => counts.synced += 1,
                QueueStatus::Failed => counts.failed += 1,
            }
        }
        Ok(counts)
    }

    /// Ceiling-enforced retry of a failed item.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::RetryCeiling`] if the item's retries have
    /// reached `max_retries`; [`SyncError::QueueItemNotFound`] if the
    /// id is unknown. A non-failed item is returned unchanged.
    pub fn auto_retry(&self, id: QueueItemId, max_retries: u32) -> SyncResult<QueueItem> {
        let mut item = self
            .get(id)?
            .ok_or(SyncError::QueueItemNotFound(id))?;
        if item.status != QueueStatus::Failed {
            return Ok(item);
        }
        if !item.auto_retry(max_retries) {
            return Err(SyncError::RetryCeiling {
                id,
                retries: item.retries,
                max_retries,
            });
        }
        self.save(&item)?;
        Ok(item)
    }

    /// Manual retry of a failed item, bypassing the ceiling.
    ///
    /// The override is deliberate: the retry count keeps increasing so
    /// the item's history shows how many attempts it has consumed.
    pub fn force_retry(&self, id: QueueItemId) -> SyncResult<QueueItem> {
        let mut item = self
            .get(id)?
            .ok_or(SyncError::QueueItemNotFound(id))?;
        if item.force_retry() {
            self.save(&item)?;
        }
        Ok(item)
    }

    /// Purges all items with the given status, returning the count.
    pub fn clear(&self, status: QueueStatus) -> SyncResult<usize> {
        Ok(self.store.purge_queue(status)?)
    }

    /// Persists updated bookkeeping for an item.
    pub(crate) fn save(&self, item: &QueueItem) -> SyncResult<()> {
        Ok(self.store.update_queue_item(item)?)
    }
}
