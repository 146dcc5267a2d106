//! Contract for the real-time channel between a client and the hub.
//!
//! The channel is treated as a reliable, ordered message bus. Framing,
//! handshakes and authentication belong to the implementation; the client
//! only sees a [`Link`]: a request sender, an ordered stream of server
//! messages and a stream of lifecycle signals.

use crate::error::Result;
use crate::protocol::{ClientMessage, ServerMessage};
use async_trait::async_trait;
use tokio::sync::mpsc;

/// Lifecycle notifications raised by a transport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkSignal {
    /// A connection attempt started
    Connecting,
    /// The connection is established and the hub has registered the client
    Connected,
    /// The connection dropped and the transport is trying to resume it
    Interrupted,
    /// An interrupted connection was resumed without creating a new session
    Resumed,
    /// The connection is gone for good
    Closed,
}

/// An open session with the hub.
pub struct Link {
    /// Outbound requests. Dropping the sender ends the session.
    pub requests: mpsc::UnboundedSender<ClientMessage>,

    /// Inbound replies and events, in the order the hub sent them
    pub messages: mpsc::UnboundedReceiver<ServerMessage>,

    /// Lifecycle signals raised after the link was opened
    pub signals: mpsc::UnboundedReceiver<LinkSignal>,
}

/// A way to open sessions with the hub.
#[async_trait]
pub trait HubTransport: Send + Sync {
    /// Open a new session.
    ///
    /// Each successful call creates a new subscriber on the hub, which pushes
    /// the current lock snapshot as the first event on
    /// [`Link::messages`].
    async fn open(&self) -> Result<Link>;
}
