//! The sync engine facade.
//!
//! Owns the change queue, the scheduler, and the analytics recorder,
//! and drives drains against the remote client. One drain runs at a
//! time: the host execution model is single-threaded cooperative, so
//! an in-progress flag is enough to coalesce overlapping timer and
//! manual triggers.

use crate::analytics::{AdvancedStats, Analytics, Recorder, DAILY_WINDOW_DAYS};
use crate::config::EngineConfig;
use crate::error::{SyncError, SyncResult};
use crate::queue::{ChangeQueue, QueueStatusCounts};
use crate::reconcile::{ReconcileOutcome, Reconciler};
use crate::remote::{ListFilter, RemoteClient, RemoteError};
use crate::scheduler::Scheduler;
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tillsync_core::{
    ChangeAction, EntityKind, LocalId, LogKind, QueueItem, QueueItemId, QueueStatus, SyncLogEntry,
    Tombstone,
};
use tillsync_store::LocalStore;
use tracing::{debug, info, warn};

/// What the engine is doing right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// No drain in progress.
    Idle,
    /// A drain is in progress.
    Draining,
}

/// Engine state as an explicit value, returned by [`SyncEngine::status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineStatus {
    /// Current activity.
    pub state: EngineState,
    /// Believed connectivity.
    pub online: bool,
    /// Whether scheduled drains are paused.
    pub paused: bool,
    /// Live queue counters.
    pub queue: QueueStatusCounts,
}

/// Result of one drain.
#[derive(Debug, Clone, Default)]
pub struct DrainOutcome {
    /// Items attempted.
    pub processed: u32,
    /// Items confirmed synced.
    pub synced: u32,
    /// Items that failed.
    pub failed: u32,
    /// Items skipped because their kind is disabled.
    pub skipped: u32,
    /// Whether the drain stopped early (offline, or connectivity lost
    /// mid-drain).
    pub aborted: bool,
    /// Whether this request was coalesced into a drain already in
    /// progress and did nothing itself.
    pub coalesced: bool,
    /// Wall-clock duration.
    pub duration: Duration,
}

impl DrainOutcome {
    fn coalesced() -> Self {
        Self {
            coalesced: true,
            ..Self::default()
        }
    }

    /// True when every attempted item synced and nothing aborted.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        !self.aborted && self.failed == 0
    }
}

/// The offline-first sync engine.
///
/// Generic over the local store and the remote client, mirroring the
/// two id spaces it reconciles. All methods take `&self`; interior
/// state is the in-progress flag, the pause/online flags, and the
/// scheduler.
pub struct SyncEngine<S, R> {
    store: Arc<S>,
    remote: Arc<R>,
    config: EngineConfig,
    queue: ChangeQueue<S>,
    recorder: Recorder<S>,
    scheduler: Mutex<Scheduler>,
    draining: AtomicBool,
    online: AtomicBool,
    paused: AtomicBool,
}

impl<S: LocalStore, R: RemoteClient> SyncEngine<S, R> {
    /// Creates an engine. Starts online, unpaused, idle.
    pub fn new(config: EngineConfig, store: Arc<S>, remote: Arc<R>) -> Self {
        let scheduler = Scheduler::new(
            config.auto_sync_interval.duration(),
            config.backoff.clone(),
        );
        Self {
            queue: ChangeQueue::new(Arc::clone(&store)),
            recorder: Recorder::new(Arc::clone(&store)),
            store,
            remote,
            config,
            scheduler: Mutex::new(scheduler),
            draining: AtomicBool::new(false),
            online: AtomicBool::new(true),
            paused: AtomicBool::new(false),
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Returns the local store.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Queues a mutation for upload. Returns `None` if an identical
    /// mutation is already pending.
    pub fn enqueue(
        &self,
        kind: EntityKind,
        entity_id: LocalId,
        action: ChangeAction,
    ) -> SyncResult<Option<QueueItemId>> {
        self.queue.enqueue(kind, entity_id, action)
    }

    /// Deletes a record: captures a tombstone, removes the record,
    /// then queues the remote delete. Returns `false` if the record
    /// does not exist.
    pub fn delete_record(&self, kind: EntityKind, id: &LocalId) -> SyncResult<bool> {
        let Some(record) = self.store.record(kind, id)? else {
            return Ok(false);
        };
        // Tombstone first: once the record is gone, the ledger entry is
        // all a retried remote delete has to work with.
        self.store.append_tombstone(Tombstone::capture(&record))?;
        self.store.remove_record(kind, id)?;
        self.queue.enqueue(kind, *id, ChangeAction::Delete)?;
        Ok(true)
    }

    /// Runs a drain immediately, regardless of the schedule or pause
    /// state. Coalesces into a drain already in progress.
    pub fn drain_now(&self) -> SyncResult<DrainOutcome> {
        self.drain("manual")
    }

    /// Cooperative timer hook: runs a scheduled drain if one is due.
    ///
    /// Pausing stops scheduled drains only; `drain_now` still works.
    pub fn tick(&self, now: Instant) -> SyncResult<Option<DrainOutcome>> {
        if self.paused.load(Ordering::SeqCst) || !self.online.load(Ordering::SeqCst) {
            return Ok(None);
        }
        if !self.scheduler.lock().is_due(now) {
            return Ok(None);
        }
        self.drain("scheduled").map(Some)
    }

    /// Runs a full reconciliation pass for one entity kind.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::KindDisabled`] when the kind is disabled
    /// by configuration; local storage failures propagate. Remote
    /// trouble never errors: the outcome carries the local snapshot.
    pub fn reconcile(
        &self,
        kind: EntityKind,
        filter: &ListFilter,
    ) -> SyncResult<ReconcileOutcome> {
        if !self.config.kind_enabled(kind) {
            return Err(SyncError::KindDisabled(kind));
        }
        let outcome = self.reconciler().reconcile(kind, filter)?;
        if !outcome.completed {
            self.set_online(false);
        }
        Ok(outcome)
    }

    /// Pauses scheduled drains.
    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    /// Resumes scheduled drains.
    pub fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
    }

    /// Updates believed connectivity. Coming back online kicks the
    /// scheduler so the next tick drains without waiting out the
    /// interval.
    pub fn set_online(&self, online: bool) {
        let was_online = self.online.swap(online, Ordering::SeqCst);
        if online && !was_online {
            info!("connectivity restored");
            self.scheduler.lock().connectivity_restored();
        }
    }

    /// Returns the engine state and live queue counters.
    pub fn status(&self) -> SyncResult<EngineStatus> {
        let state = if self.draining.load(Ordering::SeqCst) {
            EngineState::Draining
        } else {
            EngineState::Idle
        };
        Ok(EngineStatus {
            state,
            online: self.online.load(Ordering::SeqCst),
            paused: self.paused.load(Ordering::SeqCst),
            queue: self.queue.counts()?,
        })
    }

    /// Returns aggregate statistics over all recorded passes.
    pub fn advanced_stats(&self) -> SyncResult<AdvancedStats> {
        self.recorder.advanced_stats(self.queue.counts()?)
    }

    /// Returns the 30-day daily activity series ending today.
    pub fn analytics(&self) -> SyncResult<Analytics> {
        self.recorder
            .daily_series(Utc::now().date_naive(), DAILY_WINDOW_DAYS)
    }

    /// Searches the sync log by entry kind and free text.
    pub fn search_logs(
        &self,
        kind: Option<LogKind>,
        text: Option<&str>,
    ) -> SyncResult<Vec<SyncLogEntry>> {
        self.recorder.search(kind, text)
    }

    /// Purges synced queue items.
    pub fn clear_synced(&self) -> SyncResult<usize> {
        self.queue.clear(QueueStatus::Synced)
    }

    /// Purges pending queue items.
    pub fn clear_pending(&self) -> SyncResult<usize> {
        self.queue.clear(QueueStatus::Pending)
    }

    /// Purges failed queue items.
    pub fn clear_failed(&self) -> SyncResult<usize> {
        self.queue.clear(QueueStatus::Failed)
    }

    /// Ceiling-enforced retry of a failed queue item.
    pub fn auto_retry(&self, id: QueueItemId) -> SyncResult<QueueItem> {
        self.queue.auto_retry(id, self.config.max_retries)
    }

    /// Manual retry of a failed queue item, bypassing the ceiling.
    pub fn force_retry(&self, id: QueueItemId) -> SyncResult<QueueItem> {
        self.queue.force_retry(id)
    }

    fn reconciler(&self) -> Reconciler<S, R> {
        Reconciler::new(Arc::clone(&self.store), Arc::clone(&self.remote))
    }

    fn drain(&self, trigger: &str) -> SyncResult<DrainOutcome> {
        if self.draining.swap(true, Ordering::SeqCst) {
            debug!(trigger, "drain request coalesced");
            return Ok(DrainOutcome::coalesced());
        }

        let result = self.drain_inner(trigger);
        self.draining.store(false, Ordering::SeqCst);

        let success = matches!(&result, Ok(outcome) if outcome.is_clean());
        self.scheduler
            .lock()
            .record_outcome(Instant::now(), success);

        if let Err(error) = &result {
            // Local-storage-class failure: not queue-retryable, surface
            // it in the log for manual intervention.
            let _ = self
                .recorder
                .record(SyncLogEntry::error(format!("drain failed: {error}")));
            if self.config.notify_on_error {
                warn!(trigger, %error, "drain failed");
            }
        }

        result
    }

    fn drain_inner(&self, trigger: &str) -> SyncResult<DrainOutcome> {
        let start = Instant::now();
        let mut outcome = DrainOutcome::default();

        if !self.online.load(Ordering::SeqCst) {
            outcome.aborted = true;
            self.recorder
                .record(SyncLogEntry::info(format!("{trigger} drain skipped: offline")))?;
            return Ok(outcome);
        }

        if self.config.retry_failed_automatically {
            // Standing override: treat every failed item as manually
            // retried at the start of the pass.
            for item in self.queue.with_status(QueueStatus::Failed)? {
                self.queue.force_retry(item.id)?;
            }
        }

        let mut pending = self.queue.pending()?;
        pending.truncate(self.config.batch_size as usize);

        let mut by_kind: BTreeMap<EntityKind, u32> = BTreeMap::new();
        for mut item in pending {
            if !self.config.kind_enabled(item.kind) {
                outcome.skipped += 1;
                continue;
            }

            outcome.processed += 1;
            *by_kind.entry(item.kind).or_default() += 1;
            let now = Utc::now();

            match self.attempt(&item) {
                Ok(()) => {
                    item.record_success(now);
                    self.queue.save(&item)?;
                    outcome.synced += 1;
                }
                Err(SyncError::Remote(error)) => {
                    item.record_failure(now, &error.to_string(), self.config.max_retries);
                    self.queue.save(&item)?;
                    outcome.failed += 1;
                    debug!(item = %item.id, %error, "queue item attempt failed");
                    if error.is_connectivity() {
                        // The rest of the queue would hit the same wall.
                        outcome.aborted = true;
                        self.online.store(false, Ordering::SeqCst);
                        break;
                    }
                }
                Err(error) => return Err(error),
            }
        }

        outcome.duration = start.elapsed();

        let message = format!(
            "{trigger} drain: {} synced, {} failed, {} skipped",
            outcome.synced, outcome.failed, outcome.skipped
        );
        let entry = if outcome.is_clean() {
            SyncLogEntry::success(message)
        } else {
            SyncLogEntry::error(message)
        };
        let entry = entry
            .with_items(outcome.synced, outcome.failed)
            .with_duration_ms(outcome.duration.as_millis() as u64)
            .with_processed_by_kind(by_kind);
        let notify = entry.kind == LogKind::Error && self.config.notify_on_error;
        self.recorder.record(entry)?;
        if notify {
            warn!(
                trigger,
                failed = outcome.failed,
                aborted = outcome.aborted,
                "drain finished with errors"
            );
        }

        Ok(outcome)
    }

    /// Performs the remote operation implied by one queue item.
    fn attempt(&self, item: &QueueItem) -> SyncResult<()> {
        match item.action {
            ChangeAction::Upsert => {
                let Some(record) = self.store.record(item.kind, &item.entity_id)? else {
                    // Deleted since it was enqueued; nothing to upload.
                    return Ok(());
                };
                self.reconciler().push_record(record)?;
                Ok(())
            }
            ChangeAction::Delete => self.attempt_delete(item),
        }
    }

    /// Retries a remote delete from the tombstone alone; the record
    /// itself is already gone from the store.
    fn attempt_delete(&self, item: &QueueItem) -> SyncResult<()> {
        let tombstone = self
            .store
            .tombstones()?
            .into_iter()
            .find(|t| t.kind == item.kind && t.entity_id == item.entity_id);

        let Some(tombstone) = tombstone else {
            // Ledger entry already purged by an earlier confirmation.
            return Ok(());
        };

        match tombstone.identity.server_id() {
            // Never reached the server: the delete completes locally.
            None => {
                self.store.remove_tombstone(item.kind, &item.entity_id)?;
                Ok(())
            }
            Some(server_id) => match self.remote.delete(item.kind, server_id) {
                Ok(()) => {
                    self.store.remove_tombstone(item.kind, &item.entity_id)?;
                    Ok(())
                }
                // Already gone remotely counts as confirmed.
                Err(RemoteError::NotFound(_)) => {
                    self.store.remove_tombstone(item.kind, &item.entity_id)?;
                    Ok(())
                }
                Err(error) => Err(error.into()),
            },
        }
    }
}
