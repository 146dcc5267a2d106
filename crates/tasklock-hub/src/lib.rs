//! # Tasklock Hub
//!
//! Real-time broadcast of advisory record locks.
//!
//! The hub provides:
//! - A subscriber registry with per-subscriber delivery isolation
//! - Lock/unlock requests that broadcast `TaskLocked`/`TaskUnlocked` to every subscriber
//! - A one-time lock snapshot pushed to each newly connected subscriber
//! - A per-connection session loop and an in-process transport
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tasklock_core::{HubConfig, HubTransport};
//! use tasklock_hub::{BroadcastHub, LocalTransport};
//!
//! # async fn example() -> tasklock_core::Result<()> {
//! let hub = Arc::new(BroadcastHub::in_memory(&HubConfig::default()));
//! let transport = LocalTransport::new(hub.clone());
//!
//! // Each link is a new subscriber; its first message is the lock snapshot
//! let mut link = transport.open().await?;
//! let snapshot = link.messages.recv().await;
//! println!("{:?}", snapshot);
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod hub;
pub mod registry;
pub mod session;
pub mod stripes;
pub mod transport;

pub use error::{DeliveryError, HubError, Result};
pub use hub::BroadcastHub;
pub use registry::{BroadcastReport, SubscriberId, SubscriberRegistry, SubscriberSink};
pub use session::serve_connection;
pub use stripes::StripeGate;
pub use transport::LocalTransport;
