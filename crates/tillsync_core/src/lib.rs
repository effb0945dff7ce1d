//! # TillSync Core
//!
//! Shared data model for the TillSync offline-first sync engine.
//!
//! This crate provides:
//! - Local and server id spaces, with an explicit tri-state
//!   [`SyncIdentity`] instead of id-shape sniffing
//! - The [`Record`] envelope and typed [`EntityPayload`] union with
//!   pure per-kind natural-key derivation
//! - Change queue items with their retry lifecycle
//! - Tombstones (deleted-item ledger entries)
//! - Sync log entries
//!
//! ## Key Invariants
//!
//! - Local ids are immutable and never reused
//! - A confirmed server id is never demoted
//! - `retries` on a queue item only increases
//! - Natural-key derivation is pure: the same payload yields the same
//!   key on every device

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod entity;
mod error;
mod id;
mod ledger;
mod log;
mod queue;
mod record;

pub use entity::{
    CustomerFields, EntityKind, EntityPayload, NaturalKey, ProductFields, SaleFields, SellerFields,
};
pub use error::{CoreError, CoreResult};
pub use id::{LocalId, ServerId, SyncIdentity};
pub use ledger::Tombstone;
pub use log::{LogKind, SyncLogEntry};
pub use queue::{ChangeAction, QueueItem, QueueItemId, QueueStatus};
pub use record::{Record, RemoteRecord, SyncStatus};
