//! Change queue items.

use crate::entity::EntityKind;
use crate::id::LocalId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identifier for a queue item.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct QueueItemId(Uuid);

impl QueueItemId {
    /// Creates a new random queue item id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for QueueItemId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for QueueItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "QueueItemId({})", self.0)
    }
}

impl fmt::Display for QueueItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The mutation a queue item asks the server to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChangeAction {
    /// Create-or-update by natural key.
    Upsert,
    /// Remote delete, driven by the tombstone ledger.
    Delete,
}

/// Queue item lifecycle state.
///
/// The legal path is pending → synced, or pending → failed →
/// pending (manual retry) → synced. Synced items are terminal until an
/// explicit purge; a successful sync never auto-deletes them, which
/// preserves auditability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QueueStatus {
    /// Waiting for the next drain.
    Pending,
    /// Remote operation confirmed.
    Synced,
    /// Retry ceiling reached; only a retry operation revives it.
    Failed,
}

/// A pending mutation awaiting upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueItem {
    /// Queue item id.
    pub id: QueueItemId,
    /// Entity kind of the subject record.
    pub kind: EntityKind,
    /// Local id of the subject record.
    pub entity_id: LocalId,
    /// Requested mutation.
    pub action: ChangeAction,
    /// Lifecycle state.
    pub status: QueueStatus,
    /// Failed attempt count. Increases only on failed attempts, plus
    /// the deliberate increment on a forced manual retry.
    pub retries: u32,
    /// Time of the most recent attempt.
    pub last_attempt: Option<DateTime<Utc>>,
    /// Error string from the most recent failed attempt.
    pub error: Option<String>,
    /// Enqueue time; drains process items in this order.
    pub created_at: DateTime<Utc>,
}

impl QueueItem {
    /// Creates a new pending item.
    #[must_use]
    pub fn new(kind: EntityKind, entity_id: LocalId, action: ChangeAction) -> Self {
        Self {
            id: QueueItemId::new(),
            kind,
            entity_id,
            action,
            status: QueueStatus::Pending,
            retries: 0,
            last_attempt: None,
            error: None,
            created_at: Utc::now(),
        }
    }

    /// Records a successful attempt.
    pub fn record_success(&mut self, now: DateTime<Utc>) {
        self.status = QueueStatus::Synced;
        self.last_attempt = Some(now);
        self.error = None;
    }

    /// Records a failed attempt; crosses to `Failed` at the ceiling.
    pub fn record_failure(&mut self, now: DateTime<Utc>, error: &str, max_retries: u32) {
        self.retries += 1;
        self.last_attempt = Some(now);
        self.error = Some(error.to_owned());
        if self.retries >= max_retries {
            self.status = QueueStatus::Failed;
        }
    }

    /// Ceiling-enforced retry: revives a failed item only while it is
    /// still under the ceiling. Returns whether the item was revived.
    pub fn auto_retry(&mut self, max_retries: u32) -> bool {
        if self.status != QueueStatus::Failed || self.retries >= max_retries {
            return false;
        }
        self.status = QueueStatus::Pending;
        self.error = None;
        true
    }

    /// Manual retry: revives a failed item unconditionally, bypassing
    /// the ceiling. The extra increment marks the override in the
    /// item's history.
    pub fn force_retry(&mut self) -> bool {
        if self.status != QueueStatus::Failed {
            return false;
        }
        self.status = QueueStatus::Pending;
        self.retries += 1;
        self.error = None;
        true
    }

    /// Returns true if this item represents the same pending mutation.
    #[must_use]
    pub fn same_pending_mutation(&self, kind: EntityKind, entity_id: &LocalId, action: ChangeAction) -> bool {
        self.status == QueueStatus::Pending
            && self.kind == kind
            && self.entity_id == *entity_id
            && self.action == action
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item() -> QueueItem {
        QueueItem::new(EntityKind::Seller, LocalId::new(), ChangeAction::Upsert)
    }

    #[test]
    fn new_item_is_pending() {
        let item = item();
        assert_eq!(item.status, QueueStatus::Pending);
        assert_eq!(item.retries, 0);
        assert!(item.last_attempt.is_none());
        assert!(item.error.is_none());
    }

    #[test]
    fn success_is_terminal_and_keeps_retries() {
        let mut item = item();
        item.record_failure(Utc::now(), "timeout", 5);
        item.record_success(Utc::now());
        assert_eq!(item.status, QueueStatus::Synced);
        assert_eq!(item.retries, 1);
        assert!(item.error.is_none());
    }

    #[test]
    fn failure_crosses_to_failed_at_ceiling() {
        let mut item = item();
        for _ in 0..4 {
            item.record_failure(Utc::now(), "timeout", 5);
        }
        assert_eq!(item.status, QueueStatus::Pending);
        assert_eq!(item.retries, 4);

        item.record_failure(Utc::now(), "timeout", 5);
        assert_eq!(item.status, QueueStatus::Failed);
        assert_eq!(item.retries, 5);
    }

    #[test]
    fn auto_retry_respects_ceiling() {
        let mut item = item();
        for _ in 0..5 {
            item.record_failure(Utc::now(), "timeout", 5);
        }
        assert!(!item.auto_retry(5));
        assert_eq!(item.status, QueueStatus::Failed);
    }

    #[test]
    fn force_retry_bypasses_ceiling() {
        let mut item = item();
        for _ in 0..5 {
            item.record_failure(Utc::now(), "timeout", 5);
        }
        assert!(item.force_retry());
        assert_eq!(item.status, QueueStatus::Pending);
        assert_eq!(item.retries, 6);
        assert!(item.error.is_none());
    }

    #[test]
    fn retry_operations_ignore_non_failed_items() {
        let mut pending = item();
        assert!(!pending.auto_retry(5));
        assert!(!pending.force_retry());

        let mut synced = item();
        synced.record_success(Utc::now());
        assert!(!synced.force_retry());
        assert_eq!(synced.status, QueueStatus::Synced);
    }
}
