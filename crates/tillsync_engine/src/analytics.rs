//! Sync analytics: durable run log plus pure read-side projections.
//!
//! The recorder appends one log entry per drain pass and never touches
//! queue state. Every projection is recomputed from the log on read;
//! nothing here feeds back into control flow.

use crate::error::SyncResult;
use crate::queue::QueueStatusCounts;
use chrono::{Duration, NaiveDate};
use std::collections::BTreeMap;
use std::sync::Arc;
use tillsync_core::{EntityKind, LogKind, SyncLogEntry};
use tillsync_store::LogStore;

/// Default width of the daily activity window.
pub const DAILY_WINDOW_DAYS: u32 = 30;

/// Aggregate statistics over all recorded passes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AdvancedStats {
    /// Live queue counters.
    pub counts: QueueStatusCounts,
    /// `synced / (synced + failed)` over queue items; `0.0` when no
    /// item has finished either way.
    pub success_rate: f64,
    /// Drain passes recorded (success and error entries; info entries
    /// are not passes).
    pub passes: u32,
    /// Average items synced per pass.
    pub avg_items_per_pass: f64,
    /// Average pass duration in milliseconds.
    pub avg_duration_ms: f64,
    /// Shortest pass duration in milliseconds.
    pub min_duration_ms: u64,
    /// Longest pass duration in milliseconds.
    pub max_duration_ms: u64,
    /// Items processed per entity kind, summed over all passes.
    pub processed_by_kind: BTreeMap<EntityKind, u64>,
}

/// Activity on one calendar day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailyActivity {
    /// The day.
    pub day: NaiveDate,
    /// Drain passes that day.
    pub passes: u32,
    /// Items synced that day.
    pub items: u32,
    /// Error entries that day.
    pub errors: u32,
}

/// Fixed-window daily time series.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Analytics {
    /// Window width in days.
    pub window_days: u32,
    /// One point per day, oldest first; days without activity are
    /// present with zero counts.
    pub daily: Vec<DailyActivity>,
}

/// Records drain passes and serves projections over them.
pub struct Recorder<S> {
    store: Arc<S>,
}

impl<S: LogStore> Recorder<S> {
    /// Creates a recorder over the given store.
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Appends a log entry.
    pub fn record(&self, entry: SyncLogEntry) -> SyncResult<()> {
        Ok(self.store.append_log(entry)?)
    }

    /// Returns entries matching the search criteria, newest first.
    pub fn search(
        &self,
        kind: Option<LogKind>,
        text: Option<&str>,
    ) -> SyncResult<Vec<SyncLogEntry>> {
        let mut entries: Vec<SyncLogEntry> = self
            .store
            .logs()?
            .into_iter()
            .filter(|e| e.matches(kind, text))
            .collect();
        entries.reverse();
        Ok(entries)
    }

    /// Computes aggregate statistics from the log and live queue
    /// counters. Safe to call on every read.
    pub fn advanced_stats(&self, counts: QueueStatusCounts) -> SyncResult<AdvancedStats> {
        let passes: Vec<SyncLogEntry> = self
            .store
            .logs()?
            .into_iter()
            .filter(|e| e.kind != LogKind::Info)
            .collect();

        let mut stats = AdvancedStats {
            counts,
            passes: passes.len() as u32,
            ..AdvancedStats::default()
        };

        let finished = counts.synced + counts.failed;
        if finished > 0 {
            stats.success_rate = f64::from(counts.synced) / f64::from(finished);
        }

        if passes.is_empty() {
            return Ok(stats);
        }

        let total_items: u64 = passes.iter().map(|e| u64::from(e.items_synced)).sum();
        let total_duration: u64 = passes.iter().map(|e| e.duration_ms).sum();
        stats.avg_items_per_pass = total_items as f64 / passes.len() as f64;
        stats.avg_duration_ms = total_duration as f64 / passes.len() as f64;
        stats.min_duration_ms = passes.iter().map(|e| e.duration_ms).min().unwrap_or(0);
        stats.max_duration_ms = passes.iter().map(|e| e.duration_ms).max().unwrap_or(0);

        for entry in &passes {
            for (kind, count) in &entry.processed_by_kind {
                *stats.processed_by_kind.entry(*kind).or_default() += u64::from(*count);
            }
        }

        Ok(stats)
    }

    /// Computes the daily time series for the window ending at
    /// `today`, inclusive.
    pub fn daily_series(&self, today: NaiveDate, window_days: u32) -> SyncResult<Analytics> {
        let entries = self.store.logs()?;
        let mut daily = Vec::with_capacity(window_days as usize);

        for back in (0..window_days).rev() {
            let day = today - Duration::days(i64::from(back));
            let mut point = DailyActivity {
                day,
                passes: 0,
                items: 0,
                errors: 0,
            };
            for entry in entries
                .iter()
                .filter(|e| e.created_at.date_naive() == day)
            {
                match entry.kind {
                    LogKind::Success | LogKind::Error => {
                        point.passes += 1;
                        point.items += entry.items_synced;
                    }
                    LogKind::Info => {}
                }
                if entry.kind == LogKind::Error {
                    point.errors += 1;
                }
            }
            daily.push(point);
        }

        Ok(Analytics { window_days, daily })
    }
}
