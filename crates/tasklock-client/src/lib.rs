//! # Tasklock Client
//!
//! Client side of the real-time lock channel.
//!
//! - [`ClientLockProxy`] sends begin/cancel edit requests and republishes the
//!   hub's lock events to local observers
//! - [`ConnectionStateTracker`] follows the transport lifecycle so callers can
//!   disable editing while the connection is down and reload after a fresh
//!   connect
//!
//! The proxy holds no lock state. Consumers build their view from the
//! snapshot received on connect plus the `TaskLocked`/`TaskUnlocked` events
//! that follow it.

pub mod connection;
pub mod error;
pub mod proxy;

pub use connection::{ConnectionState, ConnectionStateTracker, StateChange};
pub use error::{ClientError, Result};
pub use proxy::ClientLockProxy;
