//! The cache contract.

use tracing::{debug, trace};

use crate::error::{CacheError, Result};

/// Trait for process cache backends.
///
/// The associated `Value` type determines what the cache holds. The
/// preference store caches the raw durable query result, so a miss and a
/// cached "no row" are distinguishable.
pub trait CacheStore: Send + Sync {
    /// The value type stored in the cache.
    type Value: Clone + Send + Sync + 'static;

    /// Look up a key. `Ok(None)` is a miss.
    fn get(&self, key: &str) -> Result<Option<Self::Value>>;

    /// Store a value with no expiry.
    fn put(&self, key: &str, value: Self::Value) -> Result<()>;

    /// Remove a key. Returns whether an entry was present.
    fn forget(&self, key: &str) -> Result<bool>;

    /// Remove every entry.
    fn flush(&self) -> Result<()>;

    /// Cache-aside read with no expiry.
    ///
    /// Returns the cached value on a hit. On a miss, calls `loader`, stores
    /// its result permanently and returns it. A loader error is returned
    /// unchanged and nothing is cached.
    fn remember_forever<F, E>(&self, key: &str, loader: F) -> std::result::Result<Self::Value, E>
    where
        Self: Sized,
        F: FnOnce() -> std::result::Result<Self::Value, E>,
        E: From<CacheError>,
    {
        if let Some(value) = self.get(key)? {
            trace!(key = %key, "Cache hit");
            return Ok(value);
        }

        debug!(key = %key, "Cache miss, loading");
        let value = loader()?;
        self.put(key, value.clone())?;
        Ok(value)
    }
}
