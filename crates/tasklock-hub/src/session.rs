//! Per-connection request loop.

use crate::hub::BroadcastHub;
use crate::registry::SubscriberSink;
use std::sync::Arc;
use tasklock_core::{ClientMessage, ServerMessage};
use tokio::sync::mpsc;

/// Reply text sent to a client whose request failed on the server.
pub const REJECTED_MESSAGE: &str = "The request could not be processed. Please try again.";

/// Serve one client connection until its request stream closes.
///
/// The connection becomes a subscriber for its whole lifetime: it is
/// registered (and sent the lock snapshot) before the first request is read,
/// and deregistered when the stream ends. Every request is answered with
/// `Ack` or a generic `Rejected`; the detailed error is only logged.
///
/// Registration and lock requests may wait up to the hub's gate timeout for
/// stripes, so they run on the blocking pool via `spawn_blocking`.
pub async fn serve_connection(
    hub: Arc<BroadcastHub>,
    mut requests: mpsc::UnboundedReceiver<ClientMessage>,
    outbound: mpsc::UnboundedSender<ServerMessage>,
) {
    let sink: Arc<dyn SubscriberSink> = Arc::new(outbound.clone());
    let registering = Arc::clone(&hub);
    let subscriber =
        match tokio::task::spawn_blocking(move || registering.on_subscriber_connected(sink)).await
        {
            Ok(Ok(id)) => id,
            Ok(Err(e)) => {
                tracing::error!("Rejecting connection: {}", e);
                return;
            }
            Err(e) => {
                tracing::error!("Registration task failed: {}", e);
                return;
            }
        };

    while let Some(request) = requests.recv().await {
        let request_id = request.request_id();
        let record_id = request.record_id();

        let worker = Arc::clone(&hub);
        let result = tokio::task::spawn_blocking(move || match request {
            ClientMessage::BeginUpdate { .. } => worker.request_lock(subscriber, record_id),
            ClientMessage::CancelUpdate { .. } => worker.request_unlock(subscriber, record_id),
        })
        .await;

        let failure = match result {
            Ok(Ok(_)) => None,
            Ok(Err(e)) => Some(e.to_string()),
            Err(e) => Some(e.to_string()),
        };

        let reply = match failure {
            None => ServerMessage::Ack { request_id },
            Some(reason) => {
                tracing::error!(
                    "Request {} from subscriber {} on record {} failed: {}",
                    request_id,
                    subscriber,
                    record_id,
                    reason
                );
                ServerMessage::Rejected {
                    request_id,
                    message: REJECTED_MESSAGE.to_string(),
                }
            }
        };

        if outbound.send(reply).is_err() {
            tracing::debug!("Subscriber {} stopped reading replies", subscriber);
            break;
        }
    }

    hub.on_subscriber_disconnected(subscriber);
}
