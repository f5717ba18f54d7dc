//! Exponentially-weighted latency tracking for RPC calls.
//!
//! Used by `sync_core::rpc::domain::DomainRpcClient` to time every transport
//! round trip. The moving average itself is kept behind a lock
//! (`watermill`'s `EWMA` isn't `Sync`), but the latest computed value is
//! published to an atomic so readers never contend with writers.

use portable_atomic::AtomicF64;
use std::sync::atomic::Ordering;
use std::sync::Mutex;
use std::time::Duration;
use watermill::ewma::EWMA;

/// Smoothing factor. Lower = smoother/slower to react; matches the default a
/// lot of streaming dashboards use for per-minute request latency.
const DEFAULT_ALPHA: f64 = 0.2;

/// Tracks a moving average latency in seconds, safe to share across tasks.
pub struct PeriodicLatency {
    ewma: Mutex<EWMA>,
    latest_seconds: AtomicF64,
}

impl PeriodicLatency {
    pub fn new() -> Self {
        Self::new_with_alpha(DEFAULT_ALPHA)
    }

    pub fn new_with_alpha(alpha: f64) -> Self {
        Self {
            ewma: Mutex::new(EWMA::new(alpha)),
            latest_seconds: AtomicF64::new(0.0),
        }
    }

    /// Record one completed call's duration.
    pub fn record(&self, duration: Duration) {
        let seconds = duration.as_secs_f64();

        let mean = {
            let mut ewma = self.ewma.lock().expect("ewma lock poisoned");
            ewma.update(seconds)
        };

        self.latest_seconds.store(mean, Ordering::Relaxed);
    }

    /// Current moving average, in seconds. Zero until the first sample.
    pub fn seconds(&self) -> f64 {
        self.latest_seconds.load(Ordering::Relaxed)
    }

    pub fn as_duration(&self) -> Duration {
        Duration::from_secs_f64(self.seconds().max(0.0))
    }
}

impl Default for PeriodicLatency {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_and_smooths() {
        let latency = PeriodicLatency::new_with_alpha(0.5);

        assert_eq!(latency.seconds(), 0.0);

        latency.record(Duration::from_millis(100));
        let first = latency.seconds();
        assert!(first > 0.0);

        latency.record(Duration::from_millis(100));
        let second = latency.seconds();

        // converges toward 0.1s as more samples of the same value arrive
        assert!((second - 0.1).abs() < (first - 0.1).abs());
    }
}
