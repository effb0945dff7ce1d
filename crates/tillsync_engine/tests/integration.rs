//! Integration tests for the sync engine.
//!
//! Each test wires a real store (memory or file-backed) to the mock
//! remote and exercises a whole workflow: queue, drain, reconcile,
//! delete, retry, recovery.

use proptest::prelude::*;
use std::sync::Arc;
use std::time::Instant;
use tillsync_core::{
    ChangeAction, EntityKind, EntityPayload, ProductFields, QueueStatus, Record, SellerFields,
    ServerId,
};
use tillsync_engine::{
    AutoSyncInterval, EngineConfig, ListFilter, MockRemote, Reconciler, RemoteClient, RemoteError,
    SyncEngine, SyncError,
};
use tillsync_store::{FileStore, LedgerStore, MemoryStore, RecordStore};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn seller(name: &str, branch: &str) -> Record {
    Record::new_local(EntityPayload::Seller(SellerFields {
        name: name.into(),
        branch: branch.into(),
        phone: None,
        active: true,
    }))
}

fn product(name: &str, branch: &str, price_cents: i64, stock: i64) -> Record {
    Record::new_local(EntityPayload::Product(ProductFields {
        name: name.into(),
        branch: branch.into(),
        price_cents,
        stock,
    }))
}

fn engine_over(
    store: Arc<MemoryStore>,
    remote: Arc<MockRemote>,
) -> SyncEngine<MemoryStore, MockRemote> {
    init_tracing();
    SyncEngine::new(EngineConfig::new(), store, remote)
}

/// A sale recorded offline reaches the server on the next drain, and a
/// second device downloads it field for field.
#[test]
fn offline_change_round_trips_through_the_server() {
    let store = Arc::new(MemoryStore::new());
    let remote = Arc::new(MockRemote::new());
    let engine = engine_over(Arc::clone(&store), Arc::clone(&remote));

    let record = product("espresso beans", "downtown", 1450, 12);
    let payload = record.payload.clone();
    let id = record.local_id;
    store.put_record(record).unwrap();
    engine
        .enqueue(EntityKind::Product, id, ChangeAction::Upsert)
        .unwrap();

    let outcome = engine.drain_now().unwrap();
    assert_eq!(outcome.synced, 1);

    // A second device with an empty store pulls the same entity.
    let other_store = Arc::new(MemoryStore::new());
    let reconciler = Reconciler::new(Arc::clone(&other_store), Arc::clone(&remote));
    let outcome = reconciler
        .reconcile(EntityKind::Product, &ListFilter::all())
        .unwrap();

    assert!(outcome.completed);
    assert_eq!(outcome.downloaded, 1);
    assert_eq!(outcome.records.len(), 1);
    let downloaded = &outcome.records[0];
    assert_eq!(downloaded.payload, payload);
    assert!(downloaded.server_id().is_some());
    // The download minted a fresh local id; it never reuses device A's.
    assert_ne!(downloaded.local_id, id);
}

/// Two devices create the same seller while offline. After both sync,
/// exactly one copy per device remains and both agree on the server id.
#[test]
fn concurrent_creation_on_two_devices_converges() {
    let remote = Arc::new(MockRemote::new());

    let store_a = Arc::new(MemoryStore::new());
    let newer = seller("alice", "downtown");
    store_a.put_record(newer).unwrap();
    Reconciler::new(Arc::clone(&store_a), Arc::clone(&remote))
        .reconcile(EntityKind::Seller, &ListFilter::all())
        .unwrap();

    let store_b = Arc::new(MemoryStore::new());
    store_b.put_record(seller("alice", "downtown")).unwrap();
    let outcome = Reconciler::new(Arc::clone(&store_b), Arc::clone(&remote))
        .reconcile(EntityKind::Seller, &ListFilter::all())
        .unwrap();

    assert!(outcome.completed);
    assert_eq!(outcome.records.len(), 1, "duplicates collapsed");
    assert_eq!(remote.records(EntityKind::Seller).len(), 1, "no remote duplicate");

    let id_a = store_a.records(EntityKind::Seller).unwrap()[0]
        .server_id()
        .cloned()
        .unwrap();
    let id_b = store_b.records(EntityKind::Seller).unwrap()[0]
        .server_id()
        .cloned()
        .unwrap();
    assert_eq!(id_a, id_b);
}

/// For records the server already owns, a download overwrites local
/// fields unconditionally.
#[test]
fn server_state_wins_for_confirmed_records() {
    let store = Arc::new(MemoryStore::new());
    let remote = Arc::new(MockRemote::new());

    // The server holds the canonical copy with a phone number set.
    let mut canonical = seller("alice", "downtown");
    if let EntityPayload::Seller(fields) = &mut canonical.payload {
        fields.phone = Some("555-9000".into());
    }
    let uploaded = remote.create(&canonical).unwrap();

    // The local copy is stale but confirmed under the same key.
    let mut stale = seller("alice", "downtown");
    stale.adopt_server_id(uploaded.server_id.clone());
    let stale_id = stale.local_id;
    store.put_record(stale).unwrap();

    let outcome = Reconciler::new(Arc::clone(&store), Arc::clone(&remote))
        .reconcile(EntityKind::Seller, &ListFilter::all())
        .unwrap();

    assert_eq!(outcome.merged, 1);
    let local = store.record(EntityKind::Seller, &stale_id).unwrap().unwrap();
    match &local.payload {
        EntityPayload::Seller(fields) => {
            assert_eq!(fields.phone.as_deref(), Some("555-9000"))
        }
        other => panic!("unexpected payload: {other:?}"),
    }
}

/// A queue item fails to the ceiling, the ceiling-enforced retry
/// refuses it, and the manual override revives it with the extra
/// increment on record.
#[test]
fn retry_ceiling_and_manual_override() {
    let store = Arc::new(MemoryStore::new());
    let remote = Arc::new(MockRemote::new());
    let engine = engine_over(Arc::clone(&store), Arc::clone(&remote));

    let record = seller("alice", "downtown");
    let id = record.local_id;
    store.put_record(record).unwrap();
    let item_id = engine
        .enqueue(EntityKind::Seller, id, ChangeAction::Upsert)
        .unwrap()
        .unwrap();

    for _ in 0..5 {
        remote.inject_failure(RemoteError::Transient("server hiccup".into()));
        engine.drain_now().unwrap();
    }
    assert_eq!(engine.status().unwrap().queue.failed, 1);

    let err = engine.auto_retry(item_id).unwrap_err();
    assert!(matches!(err, SyncError::RetryCeiling { retries: 5, .. }));

    let revived = engine.force_retry(item_id).unwrap();
    assert_eq!(revived.status, QueueStatus::Pending);
    assert_eq!(revived.retries, 6);

    let outcome = engine.drain_now().unwrap();
    assert_eq!(outcome.synced, 1);
    assert_eq!(remote.records(EntityKind::Seller).len(), 1);
}

/// Full delete lifecycle: upload, delete locally, drain confirms the
/// remote delete and purges the tombstone.
#[test]
fn delete_lifecycle_end_to_end() {
    let store = Arc::new(MemoryStore::new());
    let remote = Arc::new(MockRemote::new());
    let engine = engine_over(Arc::clone(&store), Arc::clone(&remote));

    let record = seller("alice", "downtown");
    let id = record.local_id;
    store.put_record(record).unwrap();
    engine
        .enqueue(EntityKind::Seller, id, ChangeAction::Upsert)
        .unwrap();
    engine.drain_now().unwrap();
    assert_eq!(remote.records(EntityKind::Seller).len(), 1);

    assert!(engine.delete_record(EntityKind::Seller, &id).unwrap());
    let tombstones = store.tombstones().unwrap();
    assert_eq!(tombstones.len(), 1);
    assert_eq!(tombstones[0].label, "alice");

    let outcome = engine.drain_now().unwrap();
    assert_eq!(outcome.synced, 1);
    assert!(remote.records(EntityKind::Seller).is_empty());
    assert!(store.tombstones().unwrap().is_empty());
    assert_eq!(engine.status().unwrap().queue.synced, 2);
}

/// Losing the connection mid-pass leaves a usable local snapshot, and
/// restored connectivity drains on the very next tick.
#[test]
fn connectivity_loss_and_recovery() {
    let store = Arc::new(MemoryStore::new());
    let remote = Arc::new(MockRemote::new());
    let engine = SyncEngine::new(
        EngineConfig::new().with_auto_sync_interval(AutoSyncInterval::FifteenMinutes),
        Arc::clone(&store),
        Arc::clone(&remote),
    );

    let record = seller("alice", "downtown");
    store.put_record(record.clone()).unwrap();
    engine
        .enqueue(EntityKind::Seller, record.local_id, ChangeAction::Upsert)
        .unwrap();

    // First tick fires, but the server is gone.
    remote.set_offline(true);
    let outcome = engine
        .tick(Instant::now())
        .unwrap()
        .expect("first tick is due");
    assert!(outcome.aborted);
    assert!(!engine.status().unwrap().online);

    // Offline reconcile still answers with the local snapshot.
    let snapshot = Reconciler::new(Arc::clone(&store), Arc::clone(&remote))
        .reconcile(EntityKind::Seller, &ListFilter::all())
        .unwrap();
    assert!(!snapshot.completed);
    assert_eq!(snapshot.records.len(), 1);

    // While offline, ticks do nothing.
    assert!(engine.tick(Instant::now()).unwrap().is_none());

    // Connectivity returns; the kick bypasses the interval.
    remote.set_offline(false);
    engine.set_online(true);
    let outcome = engine
        .tick(Instant::now())
        .unwrap()
        .expect("kicked tick fires immediately");
    assert_eq!(outcome.synced, 1);
    assert_eq!(remote.records(EntityKind::Seller).len(), 1);
}

/// Draining an empty queue touches neither the remote nor the records,
/// and every pass still leaves its log entry.
#[test]
fn empty_drains_are_idempotent() {
    let store = Arc::new(MemoryStore::new());
    let remote = Arc::new(MockRemote::new());
    let engine = engine_over(Arc::clone(&store), Arc::clone(&remote));

    engine.drain_now().unwrap();
    engine.drain_now().unwrap();

    assert_eq!(remote.call_counts().total(), 0);
    assert_eq!(engine.search_logs(None, None).unwrap().len(), 2);

    let stats = engine.advanced_stats().unwrap();
    assert_eq!(stats.passes, 2);
    assert_eq!(stats.counts.total, 0);
}

/// The engine over the file-backed store: drained state survives a
/// store reopen.
#[test]
fn drained_state_survives_file_store_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let remote = Arc::new(MockRemote::new());

    let local_id = {
        let store = Arc::new(FileStore::open(dir.path()).unwrap());
        let engine = SyncEngine::new(EngineConfig::new(), Arc::clone(&store), Arc::clone(&remote));

        let record = seller("alice", "downtown");
        let id = record.local_id;
        store.put_record(record).unwrap();
        engine
            .enqueue(EntityKind::Seller, id, ChangeAction::Upsert)
            .unwrap();
        let outcome = engine.drain_now().unwrap();
        assert_eq!(outcome.synced, 1);
        id
    };

    let reopened = Arc::new(FileStore::open(dir.path()).unwrap());
    let record = reopened
        .record(EntityKind::Seller, &local_id)
        .unwrap()
        .expect("record persisted");
    assert!(record.server_id().is_some());

    let engine = SyncEngine::new(EngineConfig::new(), Arc::clone(&reopened), remote);
    let status = engine.status().unwrap();
    assert_eq!(status.queue.synced, 1);
    assert_eq!(status.queue.pending, 0);
    assert_eq!(engine.search_logs(None, None).unwrap().len(), 1);
}

/// A remote delete whose target the server never heard of still
/// completes, so a dangling server id cannot wedge the queue.
#[test]
fn delete_of_unknown_server_id_completes() {
    let store = Arc::new(MemoryStore::new());
    let remote = Arc::new(MockRemote::new());
    let engine = engine_over(Arc::clone(&store), Arc::clone(&remote));

    let mut record = seller("alice", "downtown");
    record.adopt_server_id(ServerId::new("srv-gone"));
    let id = record.local_id;
    store.put_record(record).unwrap();

    engine.delete_record(EntityKind::Seller, &id).unwrap();
    let outcome = engine.drain_now().unwrap();

    assert_eq!(outcome.synced, 1);
    assert_eq!(engine.status().unwrap().queue.failed, 0);
    assert!(store.tombstones().unwrap().is_empty());
}

proptest! {
    /// However many duplicate copies exist locally, a completed pass
    /// leaves at most one record per natural key.
    #[test]
    fn completed_pass_leaves_unique_natural_keys(
        names in prop::collection::vec(prop::sample::select(vec!["alice", "bea", "carol", "dave"]), 1..12),
        confirmed_mask in prop::collection::vec(any::<bool>(), 12),
    ) {
        let store = Arc::new(MemoryStore::new());
        let remote = Arc::new(MockRemote::new());

        for (i, name) in names.iter().enumerate() {
            let mut record = seller(name, "downtown");
            if confirmed_mask[i] {
                let created = remote.create(&record).unwrap();
                record.adopt_server_id(created.server_id);
            }
            store.put_record(record).unwrap();
        }

        let outcome = Reconciler::new(Arc::clone(&store), Arc::clone(&remote))
            .reconcile(EntityKind::Seller, &ListFilter::all())
            .unwrap();
        prop_assert!(outcome.completed);

        let records = store.records(EntityKind::Seller).unwrap();
        let keys: std::collections::HashSet<_> =
            records.iter().map(Record::natural_key).collect();
        prop_assert_eq!(keys.len(), records.len(), "duplicate natural keys survived");

        // Everything left is confirmed against the server.
        prop_assert!(records.iter().all(|r| r.server_id().is_some()));
    }
}
