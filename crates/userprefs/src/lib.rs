//! Per-user preference storage.
//!
//! Preferences are read from a durable record store, cached for repeated
//! access, and invalidated on every write so later reads observe fresh data.
//!
//! - [`PreferenceStore`]: the load/merge/validate/save core, addressed by
//!   explicit [`UserId`]
//! - [`UserPreferences`]: facade acting on the current user supplied by a
//!   [`CurrentUser`] resolver, with `*_for_user` variants
//! - [`DefaultsTable`]: the static fallback values from configuration
//! - [`BlobCodec`]: the JSON blob format, optionally exploding delimited keys
//!
//! # Example
//!
//! ```rust,ignore
//! use userprefs::{PreferencesConfig, SessionUser, UserPreferences};
//!
//! let config = PreferencesConfig::from_toml(r#"
//! [defaults]
//! theme = "light"
//! "#)?;
//! let session = std::sync::Arc::new(SessionUser::new());
//! let prefs = UserPreferences::sqlite(&config, "app.db", session.clone())?;
//!
//! session.login(42_i64);
//! assert_eq!(prefs.get("theme")?, "light".into());
//! prefs.set("theme", "dark")?;
//! ```

mod codec;
mod defaults;
mod error;
mod facade;
mod store;

pub use codec::{BlobCodec, MalformedData};
pub use defaults::DefaultsTable;
pub use error::{PreferenceError, Result};
pub use facade::{CurrentUser, RecordCache, SessionUser, UserPreferences};
pub use store::PreferenceStore;

pub use userprefs_cache::{CacheError, CacheStore, MemoryCache};
pub use userprefs_config::PreferencesConfig;
pub use userprefs_store::{ColumnTarget, RecordStore, SqliteRecordStore, StoreError, StoredRow};
pub use userprefs_types::{PreferenceSet, PreferenceValue, UserId, ValueType};
