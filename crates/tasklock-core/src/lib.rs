//! Tasklock Core: advisory record locking primitives
//!
//! This crate defines the pieces shared by the hub (server side) and the
//! client proxy:
//! - Lock store: a concurrent, generic key-value store injected by the owner
//! - Lock manager: idempotent lock/unlock of record identifiers on top of the store
//! - Protocol: the messages exchanged over the real-time channel
//! - Transport: the contract a real-time channel implementation must satisfy
//! - Records: the record repository contract used by the surrounding CRUD flow
//!
//! Locks are advisory and live for the lifetime of the process that owns the
//! store. Any client may unlock any record, and locks are never expired.

pub mod config;
pub mod error;
pub mod lock_manager;
pub mod observe;
pub mod protocol;
pub mod records;
pub mod store;
pub mod transport;
pub mod types;

pub use config::{ClientConfig, HubConfig, TasklockConfig};
pub use error::{Result, TasklockError};
pub use lock_manager::{LockManager, LockOutcome};
pub use protocol::{ClientMessage, LockEvent, RequestId, ServerMessage};
pub use records::{
    MemoryRecordRepository, Page, Priority, RecordRepository, RecordService, TaskRecord,
};
pub use store::{KeyValueStore, MemoryStore};
pub use transport::{HubTransport, Link, LinkSignal};
pub use types::{LockEntry, RecordId};
