use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the broadcast hub
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HubConfig {
    /// Number of stripes used to serialize state changes per record
    /// Default: 256
    #[serde(default = "default_stripe_count")]
    pub stripe_count: usize,

    /// How long a request waits for its record's stripe before failing
    /// Default: 5000ms
    #[serde(default = "default_gate_timeout")]
    pub gate_timeout_ms: u64,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            stripe_count: default_stripe_count(),
            gate_timeout_ms: default_gate_timeout(),
        }
    }
}

impl HubConfig {
    pub fn gate_timeout(&self) -> Duration {
        Duration::from_millis(self.gate_timeout_ms)
    }

    pub fn with_stripes(mut self, stripe_count: usize) -> Self {
        self.stripe_count = stripe_count;
        self
    }

    pub fn with_gate_timeout(mut self, gate_timeout_ms: u64) -> Self {
        self.gate_timeout_ms = gate_timeout_ms;
        self
    }
}

fn default_stripe_count() -> usize {
    256
}

fn default_gate_timeout() -> u64 {
    5000
}
