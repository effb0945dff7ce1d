//! Reconciliation passes: upload, download, post-merge dedup.
//!
//! One pass covers one entity kind and runs three ordered phases:
//!
//! 1. **Upload** — local records without a confirmed server id are
//!    grouped by natural key, collapsed to the newest copy per key,
//!    and pushed; the issued server id is propagated to every local
//!    copy of the key.
//! 2. **Download** — the remote collection is fetched and merged by
//!    natural key. The server wins unconditionally here; the
//!    `updated_at` rule only ever collapses local duplicates.
//! 3. **Post-merge dedup** — the full local set is regrouped by
//!    natural key and collapsed to one record per key, guarding
//!    against duplicates written concurrently before this pass ran.
//!
//! A connectivity-class error aborts the pass early and the caller
//! gets the last known local snapshot, so a usable result is always
//! returned. Per-record upload failures are counted, never propagated.

use crate::error::{SyncError, SyncResult};
use crate::remote::{ListFilter, RemoteClient};
use std::collections::HashMap;
use std::sync::Arc;
use tillsync_core::{EntityKind, NaturalKey, Record, ServerId};
use tillsync_store::RecordStore;
use tracing::{debug, warn};

/// Result of one reconciliation pass.
#[derive(Debug, Clone, Default)]
pub struct ReconcileOutcome {
    /// Local records visible under the caller's filter after the pass.
    pub records: Vec<Record>,
    /// Whether all three phases ran to completion. `false` means the
    /// pass aborted on a connectivity error and `records` is the last
    /// known local snapshot.
    pub completed: bool,
    /// Natural-key groups uploaded in phase 1.
    pub uploaded: u32,
    /// Remote records inserted locally in phase 2.
    pub downloaded: u32,
    /// Remote records merged over existing local copies in phase 2.
    pub merged: u32,
    /// Local duplicates removed in phase 3.
    pub deduped: u32,
    /// Per-record upload failures in phase 1.
    pub failures: u32,
}

/// Runs reconciliation passes against a store and a remote client.
pub struct Reconciler<S, R> {
    store: Arc<S>,
    remote: Arc<R>,
}

impl<S: RecordStore, R: RemoteClient> Reconciler<S, R> {
    /// Creates a reconciler.
    pub fn new(store: Arc<S>, remote: Arc<R>) -> Self {
        Self { store, remote }
    }

    /// Runs a full pass for one entity kind.
    ///
    /// # Errors
    ///
    /// Local storage failures propagate. Remote failures never do:
    /// connectivity loss yields an uncompleted outcome carrying the
    /// local snapshot, and per-record failures are counted in
    /// `failures`.
    pub fn reconcile(&self, kind: EntityKind, filter: &ListFilter) -> SyncResult<ReconcileOutcome> {
        let mut outcome = ReconcileOutcome::default();

        // Phase 1: upload local-only records, one representative per key.
        let unconfirmed: Vec<Record> = self
            .store
            .records(kind)?
            .into_iter()
            .filter(|r| r.server_id().is_none())
            .collect();

        for (key, group) in group_by_key(unconfirmed) {
            match self.upload_group(kind, &key, group) {
                Ok(_) => outcome.uploaded += 1,
                Err(SyncError::Remote(e)) if e.is_connectivity() => {
                    warn!(kind = %kind, error = %e, "upload aborted, falling back to local snapshot");
                    return self.abort_to_snapshot(kind, filter, outcome);
                }
                Err(SyncError::Remote(e)) => {
                    debug!(kind = %kind, key = %key, error = %e, "record upload failed");
                    outcome.failures += 1;
                }
                Err(e) => return Err(e),
            }
        }

        // Phase 2: download the remote collection and merge by key.
        let remote_rows = match self.remote.list(kind, filter) {
            Ok(rows) => rows,
            Err(e) => {
                warn!(kind = %kind, error = %e, "download aborted, falling back to local snapshot");
                if !e.is_connectivity() {
                    outcome.failures += 1;
                }
                return self.abort_to_snapshot(kind, filter, outcome);
            }
        };

        for remote in remote_rows {
            let matches = self.store.find_by_natural_key(kind, &remote.natural_key())?;
            if matches.is_empty() {
                self.store.put_record(remote.into_local())?;
                outcome.downloaded += 1;
            } else {
                // Server wins: overwrite fields unconditionally.
                for mut local in matches {
                    local.payload = remote.payload.clone();
                    local.updated_at = remote.updated_at;
                    local.adopt_server_id(remote.server_id.clone());
                    self.store.put_record(local)?;
                }
                outcome.merged += 1;
            }
        }

        // Phase 3: collapse any remaining duplicates per key.
        outcome.deduped = self.dedup(kind)?;

        outcome.completed = true;
        outcome.records = self.snapshot(kind, filter)?;
        Ok(outcome)
    }

    /// Uploads one record, reusing the natural-key matching rules.
    ///
    /// Called by the drain for upsert queue items: a record with a
    /// confirmed server id goes straight to update, anything else goes
    /// through the query-by-key create-or-update path.
    pub(crate) fn push_record(&self, record: Record) -> SyncResult<ServerId> {
        if let Some(server_id) = record.server_id().cloned() {
            self.remote.update(&server_id, &record)?;
            let mut synced = record;
            synced.adopt_server_id(server_id.clone());
            self.store.put_record(synced)?;
            return Ok(server_id);
        }
        let kind = record.kind();
        let key = record.natural_key();
        self.upload_group(kind, &key, vec![record])
    }

    /// Uploads the newest representative of one natural-key group and
    /// propagates the issued server id to every local copy of the key.
    fn upload_group(
        &self,
        kind: EntityKind,
        key: &NaturalKey,
        group: Vec<Record>,
    ) -> SyncResult<ServerId> {
        let Some(mut representative) = group
            .into_iter()
            .max_by(|a, b| a.updated_at.cmp(&b.updated_at))
        else {
            return Err(SyncError::Remote(crate::remote::RemoteError::Rejected(
                "empty upload group".into(),
            )));
        };

        // Persist the pending transition before touching the wire, so a
        // crash mid-upload leaves the attempt visible.
        representative.identity.mark_pending();
        self.store.put_record(representative.clone())?;

        let existing = self
            .remote
            .list(kind, &ListFilter::by_natural_key(key.clone()))?;
        let confirmed = match existing.into_iter().next() {
            Some(remote) => self.remote.update(&remote.server_id, &representative)?,
            None => self.remote.create(&representative)?,
        };

        for mut copy in self.store.find_by_natural_key(kind, key)? {
            copy.adopt_server_id(confirmed.server_id.clone());
            self.store.put_record(copy)?;
        }

        Ok(confirmed.server_id)
    }

    /// Collapses duplicate records per natural key. Precedence:
    /// has-server-id over lacks-server-id, then newest `updated_at`.
    fn dedup(&self, kind: EntityKind) -> SyncResult<u32> {
        let mut removed = 0;
        for (_, mut group) in group_by_key(self.store.records(kind)?) {
            if group.len() < 2 {
                continue;
            }
            group.sort_by(|a, b| {
                b.server_id()
                    .is_some()
                    .cmp(&a.server_id().is_some())
                    .then(b.updated_at.cmp(&a.updated_at))
            });
            for loser in &group[1..] {
                self.store.remove_record(kind, &loser.local_id)?;
                removed += 1;
            }
        }
        Ok(removed)
    }

    fn abort_to_snapshot(
        &self,
        kind: EntityKind,
        filter: &ListFilter,
        mut outcome: ReconcileOutcome,
    ) -> SyncResult<ReconcileOutcome> {
        outcome.completed = false;
        outcome.records = self.snapshot(kind, filter)?;
        Ok(outcome)
    }

    /// The local records visible under the caller's filter.
    fn snapshot(&self, kind: EntityKind, filter: &ListFilter) -> SyncResult<Vec<Record>> {
        Ok(self
            .store
            .records(kind)?
            .into_iter()
            .filter(|r| filter.matches_record(r))
            .collect())
    }
}

fn group_by_key(records: Vec<Record>) -> HashMap<NaturalKey, Vec<Record>> {
    let mut groups: HashMap<NaturalKey, Vec<Record>> = HashMap::new();
    for record in records {
        groups.entry(record.natural_key()).or_default().push(record);
    }
    groups
}
