//! Fixed-window, per-key request counters.
//!
//! Used by `sync_core::webhook` for the per-source-IP rate limit: at most
//! 100 requests per 60-second window per client IP, backed by per-process
//! atomic counters keyed by client IP and window bucket. The window is a
//! fixed bucket keyed by `elapsed / window_secs`, not a sliding log — cheap,
//! and it means a request just after the bucket rolls over is accepted even
//! if the previous bucket was saturated.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

struct Bucket {
    index: u64,
    count: AtomicU32,
}

/// A per-key fixed-window counter. Cheap to clone (`Arc` inside), safe to
/// share across every request-handling task.
pub struct RateCounter<K> {
    limit: u32,
    window: Duration,
    started_at: Instant,
    buckets: Mutex<HashMap<K, Bucket>>,
}

impl<K> RateCounter<K>
where
    K: Eq + Hash + Clone,
{
    pub fn new(limit: u32, window: Duration) -> Arc<Self> {
        Arc::new(Self {
            limit,
            window,
            started_at: Instant::now(),
            buckets: Mutex::new(HashMap::new()),
        })
    }

    fn current_bucket_index(&self) -> u64 {
        let window_secs = self.window.as_secs().max(1);
        self.started_at.elapsed().as_secs() / window_secs
    }

    /// Returns `true` if `key` is still under the limit for the current
    /// window (and counts this call toward it), `false` if it is over.
    pub fn try_acquire(&self, key: &K) -> bool {
        let bucket_index = self.current_bucket_index();

        let mut buckets = self.buckets.lock().expect("rate counter lock poisoned");

        let bucket = buckets.entry(key.clone()).or_insert_with(|| Bucket {
            index: bucket_index,
            count: AtomicU32::new(0),
        });

        if bucket.index != bucket_index {
            bucket.index = bucket_index;
            bucket.count.store(0, Ordering::Relaxed);
        }

        let prior = bucket.count.fetch_add(1, Ordering::Relaxed);

        prior < self.limit
    }

    /// Drop buckets that are more than one window stale, so long-lived
    /// processes don't accumulate an entry per distinct client IP forever.
    pub fn sweep(&self) {
        let bucket_index = self.current_bucket_index();
        let mut buckets = self.buckets.lock().expect("rate counter lock poisoned");
        buckets.retain(|_, bucket| bucket_index.saturating_sub(bucket.index) <= 1);
    }

    /// Spawn a background task that calls `sweep` every `window`, stopping
    /// when `stop` fires. Mirrors the config-watcher-thread shape in the
    /// example pack's CLI bootstrap: a long-lived loop selecting between
    /// "do periodic work" and "someone asked us to stop".
    pub fn spawn_sweeper(self: &Arc<Self>, stop: flume::Receiver<()>) -> tokio::task::JoinHandle<()>
    where
        K: Send + Sync + 'static,
    {
        let this = Arc::clone(self);
        let window = this.window;

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(window);

            loop {
                tokio::select! {
                    _ = interval.tick() => this.sweep(),
                    _ = stop.recv_async() => break,
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn limits_within_a_window_and_resets_on_rollover() {
        let counter = RateCounter::<&'static str>::new(100, Duration::from_secs(60));

        for _ in 0..100 {
            assert!(counter.try_acquire(&"1.2.3.4"));
        }

        // 101st request in the same window is rejected.
        assert!(!counter.try_acquire(&"1.2.3.4"));

        tokio::time::advance(Duration::from_secs(61)).await;

        // new window, fresh budget
        assert!(counter.try_acquire(&"1.2.3.4"));
    }

    #[tokio::test(start_paused = true)]
    async fn keys_are_independent() {
        let counter = RateCounter::<&'static str>::new(1, Duration::from_secs(60));

        assert!(counter.try_acquire(&"1.1.1.1"));
        assert!(counter.try_acquire(&"2.2.2.2"));
        assert!(!counter.try_acquire(&"1.1.1.1"));
    }
}
