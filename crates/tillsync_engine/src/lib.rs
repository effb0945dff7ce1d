//! # TillSync Engine
//!
//! Offline-first bidirectional sync engine for TillSync.
//!
//! This crate provides:
//! - Change queue with retry ceiling and manual override
//! - Natural-key reconciliation (dedup, last-write-wins, server-wins)
//! - Tombstone-driven remote deletes
//! - Cooperative drain scheduling with bounded backoff
//! - Sync log recording and read-side analytics
//! - Transport-independent remote client abstraction
//!
//! ## Architecture
//!
//! The engine implements an **upload-then-download** reconciliation
//! model per entity kind:
//! 1. Upload unconfirmed local records, collapsing duplicates by
//!    natural key before anything touches the wire
//! 2. Download the canonical server collection (server is
//!    authoritative for confirmed records)
//! 3. Merge and dedup so at most one record per natural key remains
//!
//! Everyday mutations go through the **change queue** instead: the
//! host enqueues upserts and deletes as they happen, and a drain
//! uploads them in order, batched, whenever the scheduler or the
//! caller asks.
//!
//! ## Key Invariants
//!
//! - Local ids never change; server ids are adopted, not substituted
//! - A completed reconciliation leaves at most one record per natural
//!   key
//! - Tombstones are captured before the record is removed
//! - Connectivity loss aborts a pass; the local snapshot stands
//! - One log entry per drain pass

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod analytics;
mod config;
mod engine;
mod error;
mod queue;
mod reconcile;
mod remote;
mod scheduler;

pub use analytics::{AdvancedStats, Analytics, DailyActivity, Recorder, DAILY_WINDOW_DAYS};
pub use config::{
    AutoSyncInterval, EngineConfig, BATCH_SIZE_RANGE, MAX_RETRIES_RANGE, TIMEOUT_SECS_RANGE,
};
pub use engine::{DrainOutcome, EngineState, EngineStatus, SyncEngine};
pub use error::{SyncError, SyncResult};
pub use queue::{ChangeQueue, QueueStatusCounts};
pub use reconcile::{ReconcileOutcome, Reconciler};
pub use remote::{CallCounts, ListFilter, MockRemote, RemoteClient, RemoteError, RemoteResult};
pub use scheduler::{BackoffConfig, Scheduler};
