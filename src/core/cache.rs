//! Best-effort key-value cache with per-entry TTL.
//!
//! Nothing correctness-relevant reads through this cache: a miss just means
//! the caller recomputes.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::trace;

#[derive(Debug, Clone)]
struct Entry<V> {
    value: V,
    expires_at: Instant,
}

/// Shared TTL cache. Clones share storage.
#[derive(Debug, Clone)]
pub struct KvCache<K, V> {
    entries: Arc<RwLock<HashMap<K, Entry<V>>>>,
    max_entries: usize,
}

impl<K, V> KvCache<K, V>
where
    K: Eq + Hash + Clone + std::fmt::Debug,
    V: Clone,
{
    #[must_use]
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            max_entries,
        }
    }

    /// Returns the cached value if present and not expired.
    pub async fn get(&self, key: &K) -> Option<V> {
        let entries = self.entries.read().await;
        entries
            .get(key)
            .filter(|entry| entry.expires_at > Instant::now())
            .map(|entry| entry.value.clone())
    }

    /// Stores a value for `ttl`. When full, expired entries are purged first
    /// and the write is skipped if that frees nothing.
    pub async fn set(&self, key: K, value: V, ttl: Duration) {
        let mut entries = self.entries.write().await;
        if entries.len() >= self.max_entries && !entries.contains_key(&key) {
            let now = Instant::now();
            entries.retain(|_, entry| entry.expires_at > now);
            if entries.len() >= self.max_entries {
                trace!(?key, "Cache full, skipping write");
                return;
            }
        }
        entries.insert(
            key,
            Entry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_get_after_set() {
        let cache = KvCache::new(8);
        cache.set("k".to_string(), 7, Duration::from_secs(60)).await;
        assert_eq!(cache.get(&"k".to_string()).await, Some(7));
        assert_eq!(cache.get(&"missing".to_string()).await, None);
    }

    #[tokio::test]
    async fn test_expired_entries_miss() {
        let cache = KvCache::new(8);
        cache.set(1_u8, "v", Duration::ZERO).await;
        assert_eq!(cache.get(&1).await, None);
    }

    #[tokio::test]
    async fn test_full_cache_skips_write() {
        let cache = KvCache::new(1);
        cache.set(1_u8, 1, Duration::from_secs(60)).await;
        cache.set(2_u8, 2, Duration::from_secs(60)).await;
        assert_eq!(cache.len().await, 1);
        assert_eq!(cache.get(&2).await, None);
    }
}
