use crate::registry::SubscriberId;
use tasklock_core::{RecordId, TasklockError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum HubError {
    #[error(transparent)]
    Tasklock(#[from] TasklockError),

    #[error("Timed out after {timeout_ms}ms waiting to {op} record {record_id}")]
    RecordBusy {
        op: &'static str,
        record_id: RecordId,
        timeout_ms: u64,
    },

    #[error("Timed out after {timeout_ms}ms waiting to snapshot locks")]
    SnapshotBusy { timeout_ms: u64 },
}

pub type Result<T> = std::result::Result<T, HubError>;

/// Failure to hand a message to one subscriber's channel
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    #[error("Subscriber channel is closed")]
    Closed,

    #[error("Subscriber {0} is not registered")]
    UnknownSubscriber(SubscriberId),
}
