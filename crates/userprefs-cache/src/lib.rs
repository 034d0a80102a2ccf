//! Process cache for user preference records.
//!
//! This crate provides the cache collaborator used by the preference store:
//! - [`CacheStore`]: a key/value contract with `get`, `put`, `forget` and
//!   cache-aside [`remember_forever`](CacheStore::remember_forever)
//! - [`MemoryCache`]: a process-wide in-memory implementation
//!
//! Entries never expire on their own. The only way out is an explicit
//! [`forget`](CacheStore::forget) or [`flush`](CacheStore::flush).
//!
//! # Example
//!
//! ```rust,ignore
//! use userprefs_cache::{CacheStore, MemoryCache};
//!
//! let cache: MemoryCache<String> = MemoryCache::new();
//! let value = cache.remember_forever("user-1-preferences", || load_row())?;
//! cache.forget("user-1-preferences")?;
//! ```

mod error;
mod memory;
mod store;

pub use error::{CacheError, Result};
pub use memory::{CacheStats, MemoryCache};
pub use store::CacheStore;
