//! # TillSync Store
//!
//! Local store traits and backends for TillSync.
//!
//! This crate provides the durable local side of the sync engine:
//! business records keyed per entity kind with natural-key lookup, the
//! change queue, the deleted-item ledger, and the sync log.
//!
//! ## Design Principles
//!
//! - Storage is split into four trait concerns ([`RecordStore`],
//!   [`QueueStore`], [`LedgerStore`], [`LogStore`]); [`LocalStore`]
//!   unifies them for engine code
//! - Backends must be `Send + Sync`
//! - The engine owns all sync semantics; backends only store
//!
//! ## Available Backends
//!
//! - [`MemoryStore`] - For testing and ephemeral storage
//! - [`FileStore`] - Durable CBOR snapshots with atomic replacement

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod file;
mod memory;
mod store;

pub use error::{StoreError, StoreResult};
pub use file::FileStore;
pub use memory::MemoryStore;
pub use store::{LedgerStore, LocalStore, LogStore, QueueStore, RecordStore};
