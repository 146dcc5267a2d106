use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the client lock proxy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// How long a request waits for the hub's acknowledgement, and a connect
    /// for the lock snapshot
    /// Default: 10000ms
    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: default_request_timeout(),
        }
    }
}

impl ClientConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Set the request timeout
    pub fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.request_timeout_ms = timeout_ms;
        self
    }
}

fn default_request_timeout() -> u64 {
    10_000
}
