//! Optional metrics instrumentation for tasklock.
//!
//! When the `observe` feature is enabled, lock changes and broadcasts emit
//! counters and gauges via the [`metrics`] crate. A downstream application
//! must install a metrics recorder to collect the data.
//!
//! When the feature is **not** enabled every function in this module is a
//! zero-cost no-op.

/// Record a lock request.
///
/// - `tasklock.lock.requests_total` – counter with `outcome` label (`applied` / `redundant`)
#[inline]
pub fn record_lock(applied: bool) {
    #[cfg(feature = "observe")]
    {
        let outcome = if applied { "applied" } else { "redundant" };
        metrics::counter!("tasklock.lock.requests_total", "outcome" => outcome).increment(1);
    }
    #[cfg(not(feature = "observe"))]
    {
        let _ = applied;
    }
}

/// Record an unlock request.
///
/// - `tasklock.unlock.requests_total` – counter with `outcome` label
#[inline]
pub fn record_unlock(applied: bool) {
    #[cfg(feature = "observe")]
    {
        let outcome = if applied { "applied" } else { "redundant" };
        metrics::counter!("tasklock.unlock.requests_total", "outcome" => outcome).increment(1);
    }
    #[cfg(not(feature = "observe"))]
    {
        let _ = applied;
    }
}

/// Record the result of one broadcast.
///
/// - `tasklock.broadcast.delivered_total` – counter
/// - `tasklock.broadcast.failed_total` – counter
#[inline]
pub fn record_broadcast(delivered: usize, failed: usize) {
    #[cfg(feature = "observe")]
    {
        metrics::counter!("tasklock.broadcast.delivered_total").increment(delivered as u64);
        metrics::counter!("tasklock.broadcast.failed_total").increment(failed as u64);
    }
    #[cfg(not(feature = "observe"))]
    {
        let _ = (delivered, failed);
    }
}

/// Set the connected subscriber gauge.
///
/// - `tasklock.hub.subscribers` – gauge
#[inline]
pub fn set_subscriber_count(count: usize) {
    #[cfg(feature = "observe")]
    {
        metrics::gauge!("tasklock.hub.subscribers").set(count as f64);
    }
    #[cfg(not(feature = "observe"))]
    {
        let _ = count;
    }
}
