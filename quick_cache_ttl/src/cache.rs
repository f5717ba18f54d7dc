use quick_cache::sync::Cache;
use std::hash::Hash;
use std::time::Duration;
use tokio::time::Instant;

/// A cache wrapping `quick_cache` with a fixed TTL applied to every entry.
///
/// Expiry is checked lazily on `get` rather than swept in the background —
/// entries past their TTL are simply treated as absent and silently
/// overwritten on the next `insert`. This trades a little memory for
/// simplicity; our only caller (SSRF DNS-resolution caching) has a small,
/// bounded key space so that's the right tradeoff.
pub struct CacheWithTTL<Key, Val> {
    inner: Cache<Key, (Instant, Val)>,
    ttl: Duration,
}

impl<Key, Val> CacheWithTTL<Key, Val>
where
    Key: Eq + Hash + Clone,
    Val: Clone,
{
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            inner: Cache::new(capacity),
            ttl,
        }
    }

    pub fn get(&self, key: &Key) -> Option<Val> {
        let (expires_at, val) = self.inner.get(key)?;

        if Instant::now() >= expires_at {
            self.inner.remove(key);
            return None;
        }

        Some(val)
    }

    pub fn insert(&self, key: Key, val: Val) {
        self.inner.insert(key, (Instant::now() + self.ttl, val));
    }

    pub fn remove(&self, key: &Key) {
        self.inner.remove(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn entries_expire() {
        let cache: CacheWithTTL<String, bool> = CacheWithTTL::new(16, Duration::from_secs(5));

        cache.insert("example.com".to_string(), true);
        assert_eq!(cache.get(&"example.com".to_string()), Some(true));

        tokio::time::advance(Duration::from_secs(6)).await;

        assert_eq!(cache.get(&"example.com".to_string()), None);
    }
}
