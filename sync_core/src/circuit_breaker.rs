//! Per (tenant, module) circuit breaking: once a module's consecutive
//! failures against one tenant's ERP cross the threshold, stop dispatching
//! new jobs for it until a cooldown elapses, then allow exactly one trial
//! call through (half-open) before deciding to close or reopen.
//!
//! State is kept behind `ArcSwap` rather than a lock held across the whole
//! read-modify-write: the mutex only ever guards the *map itself* (creating
//! a new key), never the decision of whether a call is currently allowed.

use arc_swap::ArcSwap;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Clone, Copy, Debug)]
enum BreakerState {
    Closed { consecutive_failures: u32 },
    Open { opened_at: Instant },
}

pub struct CircuitBreaker {
    threshold: u32,
    cooldown: Duration,
    states: Mutex<HashMap<String, Arc<ArcSwap<BreakerState>>>>,
}

impl CircuitBreaker {
    pub fn new(threshold: u32, cooldown: Duration) -> Self {
        Self {
            threshold,
            cooldown,
            states: Mutex::new(HashMap::new()),
        }
    }

    fn entry(&self, key: &str) -> Arc<ArcSwap<BreakerState>> {
        self.states
            .lock()
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(ArcSwap::from_pointee(BreakerState::Closed { consecutive_failures: 0 })))
            .clone()
    }

    /// Whether a caller should attempt a call for this key right now. An
    /// open breaker still returns `true` once the cooldown has elapsed —
    /// that single trial call is the half-open probe.
    pub fn allow(&self, key: &str) -> bool {
        match *self.entry(key).load().as_ref() {
            BreakerState::Closed { .. } => true,
            BreakerState::Open { opened_at } => opened_at.elapsed() >= self.cooldown,
        }
    }

    pub fn is_open(&self, key: &str) -> bool {
        matches!(*self.entry(key).load().as_ref(), BreakerState::Open { .. })
    }

    pub fn record_success(&self, key: &str) {
        self.entry(key)
            .store(Arc::new(BreakerState::Closed { consecutive_failures: 0 }));
    }

    pub fn record_failure(&self, key: &str) {
        let slot = self.entry(key);
        let next = match *slot.load().as_ref() {
            BreakerState::Closed { consecutive_failures } => {
                let failures = consecutive_failures + 1;
                if failures >= self.threshold {
                    BreakerState::Open { opened_at: Instant::now() }
                } else {
                    BreakerState::Closed { consecutive_failures: failures }
                }
            }
            // A half-open probe that failed: reopen and restart the cooldown.
            BreakerState::Open { .. } => BreakerState::Open { opened_at: Instant::now() },
        };

        slot.store(Arc::new(next));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opens_after_threshold_consecutive_failures() {
        let breaker = CircuitBreaker::new(3, Duration::from_secs(60));
        let key = "acme:contacts";

        assert!(breaker.allow(key));
        breaker.record_failure(key);
        breaker.record_failure(key);
        assert!(breaker.allow(key));
        breaker.record_failure(key);

        assert!(breaker.is_open(key));
        assert!(!breaker.allow(key));
    }

    #[test]
    fn success_resets_the_failure_count() {
        let breaker = CircuitBreaker::new(3, Duration::from_secs(60));
        let key = "acme:orders";

        breaker.record_failure(key);
        breaker.record_failure(key);
        breaker.record_success(key);
        breaker.record_failure(key);
        breaker.record_failure(key);

        assert!(!breaker.is_open(key));
    }

    #[test]
    fn keys_are_independent() {
        let breaker = CircuitBreaker::new(1, Duration::from_secs(60));

        breaker.record_failure("acme:contacts");
        assert!(breaker.is_open("acme:contacts"));
        assert!(!breaker.is_open("acme:orders"));
    }
}
