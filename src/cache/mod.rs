//! Bounded LRU cache with optional TTL expiry.
//!
//! Shared across tasks: readers and writers go through an internal `RwLock`,
//! so callers hold no locks of their own. Recency is tracked with a
//! monotonic counter rather than wall-clock time so eviction order is
//! deterministic under rapid access.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::{Duration, Instant};

struct Entry<V> {
    value: V,
    created_at: Instant,
    last_used: u64,
}

/// Aggregate cache statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// LRU cache bounded by entry count, with optional per-entry TTL.
pub struct LruCache<K, V> {
    entries: RwLock<HashMap<K, Entry<V>>>,
    capacity: usize,
    ttl: Option<Duration>,
    clock: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<K, V> LruCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Create a cache holding at most `capacity` entries (clamped to 1).
    pub fn new(capacity: usize, ttl: Option<Duration>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            capacity: capacity.max(1),
            ttl,
            clock: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Look up a value, bumping its recency. Expired entries are removed.
    pub fn get(&self, key: &K) -> Option<V> {
        let mut entries = self.entries.write().expect("cache lock poisoned");
        let expired = entries
            .get(key)
            .map(|e| self.is_expired(e))
            .unwrap_or(false);
        if expired {
            entries.remove(key);
        }
        match entries.get_mut(key) {
            Some(entry) => {
                entry.last_used = self.clock.fetch_add(1, Ordering::Relaxed);
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(entry.value.clone())
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Insert or replace a value, evicting the least-recently-used entry
    /// when at capacity.
    pub fn put(&self, key: K, value: V) {
        let mut entries = self.entries.write().expect("cache lock poisoned");
        if let Some(ttl) = self.ttl {
            entries.retain(|_, e| e.created_at.elapsed() <= ttl);
        }
        while entries.len() >= self.capacity && !entries.contains_key(&key) {
            let lru = entries
                .iter()
                .min_by_key(|(_, e)| e.last_used)
                .map(|(k, _)| k.clone());
            match lru {
                Some(k) => {
                    entries.remove(&k);
                }
                None => break,
            }
        }
        entries.insert(
            key,
            Entry {
                value,
                created_at: Instant::now(),
                last_used: self.clock.fetch_add(1, Ordering::Relaxed),
            },
        );
    }

    /// Remove a key. No-op when absent.
    pub fn remove(&self, key: &K) {
        self.entries
            .write()
            .expect("cache lock poisoned")
            .remove(key);
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.entries.write().expect("cache lock poisoned").clear();
    }

    pub fn len(&self) -> usize {
        self.entries.read().expect("cache lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    fn is_expired(&self, entry: &Entry<V>) -> bool {
        match self.ttl {
            Some(ttl) => entry.created_at.elapsed() > ttl,
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_and_miss() {
        let cache: LruCache<String, i32> = LruCache::new(4, None);
        assert!(cache.get(&"k".to_string()).is_none());
        cache.put("k".to_string(), 42);
        assert_eq!(cache.get(&"k".to_string()), Some(42));
        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
    }

    #[test]
    fn test_lru_eviction_order() {
        let cache: LruCache<&str, i32> = LruCache::new(3, None);
        cache.put("a", 1);
        cache.put("b", 2);
        cache.put("c", 3);
        // Touch "a" so "b" is now the least recently used
        let _ = cache.get(&"a");
        cache.put("d", 4);
        assert!(cache.get(&"a").is_some(), "recently used entry survives");
        assert!(cache.get(&"b").is_none(), "LRU entry evicted");
        assert_eq!(cache.len(), 3);
    }

    #[test]
    fn test_replace_does_not_evict() {
        let cache: LruCache<&str, i32> = LruCache::new(2, None);
        cache.put("a", 1);
        cache.put("b", 2);
        cache.put("a", 10);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(&"a"), Some(10));
        assert_eq!(cache.get(&"b"), Some(2));
    }

    #[test]
    fn test_ttl_expiry() {
        let cache: LruCache<&str, i32> = LruCache::new(4, Some(Duration::from_millis(0)));
        cache.put("k", 1);
        std::thread::sleep(Duration::from_millis(5));
        assert!(cache.get(&"k").is_none(), "expired entry must not be served");
    }

    #[test]
    fn test_zero_capacity_clamped() {
        let cache: LruCache<&str, i32> = LruCache::new(0, None);
        cache.put("k", 1);
        assert_eq!(cache.get(&"k"), Some(1));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_clear_and_remove() {
        let cache: LruCache<&str, i32> = LruCache::new(4, None);
        cache.put("a", 1);
        cache.put("b", 2);
        cache.remove(&"a");
        assert!(cache.get(&"a").is_none());
        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_hit_rate() {
        let cache: LruCache<&str, i32> = LruCache::new(4, None);
        cache.put("a", 1);
        let _ = cache.get(&"a");
        let _ = cache.get(&"a");
        let _ = cache.get(&"zzz");
        let stats = cache.stats();
        assert!((stats.hit_rate() - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_concurrent_access() {
        use std::sync::Arc;
        let cache: Arc<LruCache<u32, u32>> = Arc::new(LruCache::new(64, None));
        let mut handles = Vec::new();
        for t in 0..4u32 {
            let c = Arc::clone(&cache);
            handles.push(std::thread::spawn(move || {
                for i in 0..100u32 {
                    c.put(t * 1000 + i, i);
                    let _ = c.get(&(t * 1000 + i));
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        assert!(cache.len() <= 64);
    }
}
