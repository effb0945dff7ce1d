//! Sync run log entries.

use crate::entity::EntityKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Classification of a sync log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogKind {
    /// A drain pass completed with no failures.
    Success,
    /// A drain pass hit failures or aborted, or local storage failed.
    Error,
    /// Informational event (drain skipped, connectivity change, etc.).
    Info,
}

/// One entry in the durable sync log.
///
/// Entries are append-only and immutable: the analytics projections
/// read them but nothing in the engine ever consults them to drive
/// control flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncLogEntry {
    /// When the entry was recorded.
    pub created_at: DateTime<Utc>,
    /// Entry classification.
    pub kind: LogKind,
    /// Free-text summary.
    pub message: String,
    /// Items confirmed synced during the pass.
    pub items_synced: u32,
    /// Items that failed during the pass.
    pub items_failed: u32,
    /// Wall-clock duration of the pass in milliseconds.
    pub duration_ms: u64,
    /// Items processed per entity kind.
    pub processed_by_kind: BTreeMap<EntityKind, u32>,
}

impl SyncLogEntry {
    /// Creates an entry with the given classification.
    #[must_use]
    pub fn new(kind: LogKind, message: impl Into<String>) -> Self {
        Self {
            created_at: Utc::now(),
            kind,
            message: message.into(),
            items_synced: 0,
            items_failed: 0,
            duration_ms: 0,
            processed_by_kind: BTreeMap::new(),
        }
    }

    /// Creates a success entry.
    #[must_use]
    pub fn success(message: impl Into<String>) -> Self {
        Self::new(LogKind::Success, message)
    }

    /// Creates an error entry.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self::new(LogKind::Error, message)
    }

    /// Creates an info entry.
    #[must_use]
    pub fn info(message: impl Into<String>) -> Self {
        Self::new(LogKind::Info, message)
    }

    /// Sets the item counters.
    #[must_use]
    pub fn with_items(mut self, synced: u32, failed: u32) -> Self {
        self.items_synced = synced;
        self.items_failed = failed;
        self
    }

    /// Sets the pass duration.
    #[must_use]
    pub fn with_duration_ms(mut self, duration_ms: u64) -> Self {
        self.duration_ms = duration_ms;
        self
    }

    /// Sets the per-kind processed counters.
    #[must_use]
    pub fn with_processed_by_kind(mut self, counts: BTreeMap<EntityKind, u32>) -> Self {
        self.processed_by_kind = counts;
        self
    }

    /// Returns true if the entry matches the given search criteria.
    ///
    /// `kind` filters by classification; `text` is a case-insensitive
    /// substring match on the message. `None` matches everything.
    #[must_use]
    pub fn matches(&self, kind: Option<LogKind>, text: Option<&str>) -> bool {
        if let Some(kind) = kind {
            if self.kind != kind {
                return false;
            }
        }
        if let Some(text) = text {
            if !self
                .message
                .to_lowercase()
                .contains(&text.to_lowercase())
            {
                return false;
            }
        }
        true
    }
}
