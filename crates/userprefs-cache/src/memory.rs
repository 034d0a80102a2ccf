//! In-memory cache backing store.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use tracing::trace;

use crate::error::Result;
use crate::store::CacheStore;

struct Shared<V> {
    entries: RwLock<HashMap<String, V>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

/// Process-wide in-memory cache.
///
/// Cloning yields another handle onto the same entries, so one instance can
/// be shared by every preference store in the process.
pub struct MemoryCache<V> {
    shared: Arc<Shared<V>>,
}

impl<V> MemoryCache<V> {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                entries: RwLock::new(HashMap::new()),
                hits: AtomicU64::new(0),
                misses: AtomicU64::new(0),
            }),
        }
    }

    /// Get the current number of cached entries.
    pub fn len(&self) -> usize {
        self.shared.entries.read().len()
    }

    /// Check if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.shared.entries.read().is_empty()
    }

    /// Check if a key is cached (does not count as a hit or miss).
    pub fn contains(&self, key: &str) -> bool {
        self.shared.entries.read().contains_key(key)
    }

    /// Get cache statistics.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.len(),
            hits: self.shared.hits.load(Ordering::Relaxed),
            misses: self.shared.misses.load(Ordering::Relaxed),
        }
    }
}

impl<V> Default for MemoryCache<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> Clone for MemoryCache<V> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<V> std::fmt::Debug for MemoryCache<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryCache")
            .field("stats", &self.stats())
            .finish()
    }
}

impl<V: Clone + Send + Sync + 'static> CacheStore for MemoryCache<V> {
    type Value = V;

    fn get(&self, key: &str) -> Result<Option<V>> {
        let value = self.shared.entries.read().get(key).cloned();
        let counter = if value.is_some() {
            &self.shared.hits
        } else {
            &self.shared.misses
        };
        counter.fetch_add(1, Ordering::Relaxed);
        Ok(value)
    }

    fn put(&self, key: &str, value: V) -> Result<()> {
        let mut entries = self.shared.entries.write();
        entries.insert(key.to_string(), value);
        trace!(key = %key, cache_size = entries.len(), "Cache entry stored");
        Ok(())
    }

    fn forget(&self, key: &str) -> Result<bool> {
        let removed = self.shared.entries.write().remove(key).is_some();
        if removed {
            trace!(key = %key, "Cache entry forgotten");
        }
        Ok(removed)
    }

    fn flush(&self) -> Result<()> {
        self.shared.entries.write().clear();
        Ok(())
    }
}

/// Cache statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    /// Current number of cached entries.
    pub entries: usize,

    /// Lookups that found an entry.
    pub hits: u64,

    /// Lookups that found nothing.
    pub misses: u64,
}
