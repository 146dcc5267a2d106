use crate::connection::ConnectionState;
use tasklock_core::{RecordId, RequestId, TasklockError};
use thiserror::Error;

/// Errors surfaced to callers of the client proxy.
///
/// None of these mean "lock denied": whether a lock was granted is learned
/// from the broadcast events.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Not connected to the hub (connection is {0:?})")]
    NotConnected(ConnectionState),

    #[error("Transport error during {op} of record {record_id}: {reason}")]
    Transport {
        op: &'static str,
        record_id: RecordId,
        reason: String,
    },

    #[error("Could not connect to the hub: {0}")]
    Connect(#[source] TasklockError),

    #[error("Request {request_id} timed out after {timeout_ms}ms")]
    Timeout {
        request_id: RequestId,
        timeout_ms: u64,
    },

    #[error("Request rejected by the hub: {0}")]
    Rejected(String),
}

pub type Result<T> = std::result::Result<T, ClientError>;
