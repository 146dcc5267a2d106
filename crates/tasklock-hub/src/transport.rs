//! In-process transport connecting clients to a hub in the same process.

use crate::hub::BroadcastHub;
use crate::session::serve_connection;
use async_trait::async_trait;
use std::sync::Arc;
use tasklock_core::{HubTransport, Link, LinkSignal, Result};
use tokio::sync::mpsc;

/// Opens sessions by spawning a [`serve_connection`] task per link.
///
/// Must be used from within a tokio runtime. Channels are unbounded and
/// ordered, so the link is reliable; it closes when either side drops it.
#[derive(Clone)]
pub struct LocalTransport {
    hub: Arc<BroadcastHub>,
}

impl LocalTransport {
    pub fn new(hub: Arc<BroadcastHub>) -> Self {
        Self { hub }
    }

    pub fn hub(&self) -> &Arc<BroadcastHub> {
        &self.hub
    }
}

#[async_trait]
impl HubTransport for LocalTransport {
    async fn open(&self) -> Result<Link> {
        let (request_tx, request_rx) = mpsc::unbounded_channel();
        let (message_tx, message_rx) = mpsc::unbounded_channel();
        let (signal_tx, signal_rx) = mpsc::unbounded_channel();

        let hub = Arc::clone(&self.hub);
        tokio::spawn(async move {
            serve_connection(hub, request_rx, message_tx).await;
            let _ = signal_tx.send(LinkSignal::Closed);
        });

        Ok(Link {
            requests: request_tx,
            messages: message_rx,
            signals: signal_rx,
        })
    }
}
