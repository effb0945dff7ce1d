//! Remote client abstraction for canonical server operations.
//!
//! The trait is transport-independent; HTTP, gRPC, or an in-process
//! loopback all fit behind it. Failures are classified here, at the
//! boundary, rather than inferred downstream from error strings.

use chrono::{DateTime, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;
use thiserror::Error;
use tillsync_core::{EntityKind, NaturalKey, Record, RemoteRecord, ServerId};

/// Result type for remote operations.
pub type RemoteResult<T> = Result<T, RemoteError>;

/// Errors surfaced by a remote client.
#[derive(Debug, Clone, Error)]
pub enum RemoteError {
    /// The server cannot be reached at all. Aborts a whole pass; the
    /// engine falls back to the last known local snapshot.
    #[error("remote unreachable: {0}")]
    Unreachable(String),

    /// A transient per-request failure (timeout, 5xx, rate limit).
    #[error("transient remote error: {0}")]
    Transient(String),

    /// The server rejected the request permanently (validation,
    /// conflict). Still counted toward the retry ceiling, but callers
    /// and logs can tell it apart from network trouble.
    #[error("remote rejected request: {0}")]
    Rejected(String),

    /// The server has no record with this id.
    #[error("remote record not found: {0}")]
    NotFound(ServerId),
}

impl RemoteError {
    /// Returns true for connectivity-class errors that abort a pass.
    pub fn is_connectivity(&self) -> bool {
        matches!(self, RemoteError::Unreachable(_))
    }

    /// Returns true if a later attempt could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, RemoteError::Unreachable(_) | RemoteError::Transient(_))
    }
}

/// Caller scope for listing remote records.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListFilter {
    /// Restrict to one branch. Kinds without a branch (customers) are
    /// not excluded by a branch filter.
    pub branch: Option<String>,
    /// Restrict to one natural key.
    pub natural_key: Option<NaturalKey>,
    /// Restrict to records updated at or after this time.
    pub updated_since: Option<DateTime<Utc>>,
}

impl ListFilter {
    /// A filter that matches everything.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// A filter for a single natural key.
    #[must_use]
    pub fn by_natural_key(key: NaturalKey) -> Self {
        Self {
            natural_key: Some(key),
            ..Self::default()
        }
    }

    /// A filter scoped to one branch.
    #[must_use]
    pub fn for_branch(branch: impl Into<String>) -> Self {
        Self {
            branch: Some(branch.into()),
            ..Self::default()
        }
    }

    /// Returns true if a local record falls inside this scope.
    #[must_use]
    pub fn matches_record(&self, record: &Record) -> bool {
        self.matches(record.payload.branch(), &record.natural_key(), record.updated_at)
    }

    /// Returns true if a remote record falls inside this scope.
    #[must_use]
    pub fn matches_remote(&self, record: &RemoteRecord) -> bool {
        self.matches(record.payload.branch(), &record.natural_key(), record.updated_at)
    }

    fn matches(&self, branch: Option<&str>, key: &NaturalKey, updated_at: DateTime<Utc>) -> bool {
        if let (Some(want), Some(have)) = (self.branch.as_deref(), branch) {
            if want != have {
                return false;
            }
        }
        if let Some(want) = &self.natural_key {
            if want != key {
                return false;
            }
        }
        if let Some(since) = self.updated_since {
            if updated_at < since {
                return false;
            }
        }
        true
    }
}

/// Canonical server operations, per entity kind.
pub trait RemoteClient: Send + Sync {
    /// Lists remote records within the filter scope.
    fn list(&self, kind: EntityKind, filter: &ListFilter) -> RemoteResult<Vec<RemoteRecord>>;

    /// Creates a record remotely, returning the server's copy with its
    /// issued id.
    fn create(&self, record: &Record) -> RemoteResult<RemoteRecord>;

    /// Updates an existing remote record, returning the server's copy.
    fn update(&self, server_id: &ServerId, record: &Record) -> RemoteResult<RemoteRecord>;

    /// Deletes a remote record by server id.
    fn delete(&self, kind: EntityKind, server_id: &ServerId) -> RemoteResult<()>;
}

/// Snapshot of how many remote calls a [`MockRemote`] has served.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    /// Number of list calls.
    pub list: u64,
    /// Number of create calls.
    pub create: u64,
    /// Number of update calls.
    pub update: u64,
    /// Number of delete calls.
    pub delete: u64,
}

impl CallCounts {
    /// Total calls across all operations.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.list + self.create + self.update + self.delete
    }

    /// Upload calls (create + update).
    #[must_use]
    pub fn uploads(&self) -> u64 {
        self.create + self.update
    }
}

/// An in-memory remote server for testing.
///
/// Serves a per-kind collection, mints sequential server ids, counts
/// every call, and can be scripted to fail: injected failures are
/// consumed one per call, and an offline flag makes every call return
/// [`RemoteError::Unreachable`].
#[derive(Debug, Default)]
pub struct MockRemote {
    collections: Mutex<HashMap<EntityKind, Vec<RemoteRecord>>>,
    scripted_failures: Mutex<VecDeque<RemoteError>>,
    offline: AtomicBool,
    next_id: AtomicU64,
    list_calls: AtomicU64,
    create_calls: AtomicU64,
    update_calls: AtomicU64,
    delete_calls: AtomicU64,
}

impl MockRemote {
    /// Creates an empty mock remote.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a record into the remote collection.
    pub fn seed(&self, record: RemoteRecord) {
        self.collections
            .lock()
            .unwrap()
            .entry(record.kind())
            .or_default()
            .push(record);
    }

    /// Mints the next server id.
    pub fn mint_id(&self) -> ServerId {
        let n = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        ServerId::new(format!("srv-{n}"))
    }

    /// Queues a failure to be returned by the next call.
    pub fn inject_failure(&self, error: RemoteError) {
        self.scripted_failures.lock().unwrap().push_back(error);
    }

    /// Sets the offline flag; while set, every call is unreachable.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Returns the remote collection for a kind.
    #[must_use]
    pub fn records(&self, kind: EntityKind) -> Vec<RemoteRecord> {
        self.collections
            .lock()
            .unwrap()
            .get(&kind)
            .cloned()
            .unwrap_or_default()
    }

    /// Returns a snapshot of the call counters.
    #[must_use]
    pub fn call_counts(&self) -> CallCounts {
        CallCounts {
            list: self.list_calls.load(Ordering::SeqCst),
            create: self.create_calls.load(Ordering::SeqCst),
            update: self.update_calls.load(Ordering::SeqCst),
            delete: self.delete_calls.load(Ordering::SeqCst),
        }
    }

    fn gate(&self, counter: &AtomicU64) -> RemoteResult<()> {
        counter.fetch_add(1, Ordering::SeqCst);
        if self.offline.load(Ordering::SeqCst) {
            return Err(RemoteError::Unreachable("mock remote offline".into()));
        }
        if let Some(error) = self.scripted_failures.lock().unwrap().pop_front() {
            return Err(error);
        }
        Ok(())
    }
}

impl RemoteClient for MockRemote {
    fn list(&self, kind: EntityKind, filter: &ListFilter) -> RemoteResult<Vec<RemoteRecord>> {
        self.gate(&self.list_calls)?;
        Ok(self
            .records(kind)
            .into_iter()
            .filter(|r| filter.matches_remote(r))
            .collect())
    }

    fn create(&self, record: &Record) -> RemoteResult<RemoteRecord> {
        self.gate(&self.create_calls)?;
        let remote = RemoteRecord {
            server_id: self.mint_id(),
            updated_at: record.updated_at,
            payload: record.payload.clone(),
        };
        self.seed(remote.clone());
        Ok(remote)
    }

    fn update(&self, server_id: &ServerId, record: &Record) -> RemoteResult<RemoteRecord> {
        self.gate(&self.update_calls)?;
        let mut collections = self.collections.lock().unwrap();
        let table = collections.entry(record.kind()).or_default();
        match table.iter_mut().find(|r| r.server_id == *server_id) {
            Some(existing) => {
                existing.payload = record.payload.clone();
                existing.updated_at = record.updated_at;
                Ok(existing.clone())
            }
            None => Err(RemoteError::NotFound(server_id.clone())),
        }
    }

    fn delete(&self, kind: EntityKind, server_id: &ServerId) -> RemoteResult<()> {
        self.gate(&self.delete_calls)?;
        let mut collections = self.collections.lock().unwrap();
        let table = collections.entry(kind).or_default();
        match table.iter().position(|r| r.server_id == *server_id) {
            Some(i) => {
                table.remove(i);
                Ok(())
            }
            None => Err(RemoteError::NotFound(server_id.clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tillsync_core::{EntityPayload, SellerFields};

    fn seller_record(name: &str, branch: &str) -> Record {
        Record::new_local(EntityPayload::Seller(SellerFields {
            name: name.into(),
            branch: branch.into(),
            phone: None,
            active: true,
        }))
    }

    #[test]
    fn create_mints_sequential_ids() {
        let remote = MockRemote::new();
        let a = remote.create(&seller_record("alice", "downtown")).unwrap();
        let b = remote.create(&seller_record("bea", "downtown")).unwrap();
        assert_eq!(a.server_id.as_str(), "srv-1");
        assert_eq!(b.server_id.as_str(), "srv-2");
        assert_eq!(remote.records(EntityKind::Seller).len(), 2);
    }

    #[test]
    fn list_applies_filter() {
        let remote = MockRemote::new();
        remote.create(&seller_record("alice", "downtown")).unwrap();
        remote.create(&seller_record("bea", "uptown")).unwrap();

        let all = remote.list(EntityKind::Seller, &ListFilter::all()).unwrap();
        assert_eq!(all.len(), 2);

        let downtown = remote
            .list(EntityKind::Seller, &ListFilter::for_branch("downtown"))
            .unwrap();
        assert_eq!(downtown.len(), 1);

        let key = seller_record("bea", "uptown").natural_key();
        let by_key = remote
            .list(EntityKind::Seller, &ListFilter::by_natural_key(key))
            .unwrap();
        assert_eq!(by_key.len(), 1);
    }

    #[test]
    fn update_missing_record_is_not_found() {
        let remote = MockRemote::new();
        let err = remote
            .update(&ServerId::new("srv-99"), &seller_record("alice", "downtown"))
            .unwrap_err();
        assert!(matches!(err, RemoteError::NotFound(_)));
    }

    #[test]
    fn delete_removes_record() {
        let remote = MockRemote::new();
        let created = remote.create(&seller_record("alice", "downtown")).unwrap();
        remote.delete(EntityKind::Seller, &created.server_id).unwrap();
        assert!(remote.records(EntityKind::Seller).is_empty());
    }

    #[test]
    fn offline_makes_every_call_unreachable() {
        let remote = MockRemote::new();
        remote.set_offline(true);
        let err = remote
            .list(EntityKind::Seller, &ListFilter::all())
            .unwrap_err();
        assert!(err.is_connectivity());
    }

    #[test]
    fn injected_failures_are_consumed_in_order() {
        let remote = MockRemote::new();
        remote.inject_failure(RemoteError::Transient("hiccup".into()));

        let err = remote
            .list(EntityKind::Seller, &ListFilter::all())
            .unwrap_err();
        assert!(matches!(err, RemoteError::Transient(_)));

        // Next call succeeds.
        assert!(remote.list(EntityKind::Seller, &ListFilter::all()).is_ok());
    }

    #[test]
    fn call_counts_track_everything() {
        let remote = MockRemote::new();
        let created = remote.create(&seller_record("alice", "downtown")).unwrap();
        remote.update(&created.server_id, &seller_record("alice", "downtown")).unwrap();
        remote.list(EntityKind::Seller, &ListFilter::all()).unwrap();
        remote.delete(EntityKind::Seller, &created.server_id).unwrap();

        let counts = remote.call_counts();
        assert_eq!(counts, CallCounts { list: 1, create: 1, update: 1, delete: 1 });
        assert_eq!(counts.total(), 4);
        assert_eq!(counts.uploads(), 2);
    }

    #[test]
    fn branch_filter_does_not_exclude_unbranched_kinds() {
        use tillsync_core::CustomerFields;
        let remote = MockRemote::new();
        remote
            .create(&Record::new_local(EntityPayload::Customer(CustomerFields {
                name: "carol".into(),
                phone: "555-1234".into(),
                loyalty_points: 0,
            })))
            .unwrap();

        let rows = remote
            .list(EntityKind::Customer, &ListFilter::for_branch("downtown"))
            .unwrap();
        assert_eq!(rows.len(), 1);
    }
}
