//! Size-bounded LRU store shared by the identity and binding caches
//!
//! Lookups run under the shared side of a reader/writer lock so concurrent
//! readers never wait on each other. A hit promotes the entry with a
//! non-blocking exclusive attempt; when writers or other readers hold the lock
//! the promotion is skipped rather than waited for. Mutations take the
//! exclusive lock.

use std::hash::Hash;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};

use lru::LruCache;
use serde::Serialize;

use crate::{Error, Result};

/// Point-in-time cache counters
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CacheStats {
    pub len: usize,
    pub capacity: usize,
    pub hits: u64,
    pub misses: u64,
    pub hit_ratio: f64,
}

/// Thread-safe bounded LRU map with hit-ratio accounting
pub struct LruStore<K: Hash + Eq, V: Clone> {
    inner: RwLock<LruCache<K, V>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<K: Hash + Eq, V: Clone> std::fmt::Debug for LruStore<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LruStore").field("stats", &self.stats()).finish()
    }
}

impl<K: Hash + Eq, V: Clone> LruStore<K, V> {
    /// Create a store holding at most `capacity` entries
    ///
    /// # Errors
    ///
    /// Returns `InvalidParam` if capacity is zero
    pub fn new(capacity: usize) -> Result<Self> {
        let capacity = NonZeroUsize::new(capacity)
            .ok_or_else(|| Error::InvalidParam("cache capacity must be non-zero".to_string()))?;
        Ok(Self {
            inner: RwLock::new(LruCache::new(capacity)),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        })
    }

    /// Look up an entry, counting the hit or miss
    pub fn get(&self, key: &K) -> Option<V> {
        let found = {
            let cache = self.inner.read().unwrap_or_else(PoisonError::into_inner);
            cache.peek(key).cloned()
        };

        if found.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
            if let Ok(mut cache) = self.inner.try_write() {
                cache.promote(key);
            }
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }

        found
    }

    /// Insert or overwrite an entry, evicting the least recently used on overflow
    pub fn set(&self, key: K, value: V) {
        let mut cache = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        cache.put(key, value);
    }

    /// Remove an entry; missing keys are ignored
    pub fn delete(&self, key: &K) {
        let mut cache = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        cache.pop(key);
    }

    /// Drop every entry and reset the hit counters
    pub fn clear(&self) {
        let mut cache = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        cache.clear();
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }

    /// Number of cached entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether the cache holds no entries
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum number of entries
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .cap()
            .get()
    }

    /// Cumulative hits over lookups since creation or the last clear
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn hit_ratio(&self) -> f64 {
        let hits = self.hits.load(Ordering::Relaxed);
        let total = hits + self.misses.load(Ordering::Relaxed);
        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        }
    }

    /// Snapshot of size and hit counters
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            len: self.len(),
            capacity: self.capacity(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            hit_ratio: self.hit_ratio(),
        }
    }
}
