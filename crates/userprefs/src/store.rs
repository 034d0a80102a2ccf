//! The preference cache-and-sync core.
//!
//! Per user, state moves `UNLOADED -> LOADED` on first access and back to
//! `UNLOADED` after every write: a mutation is serialized, written to the
//! record store, and the process cache entry for that user is forgotten, so
//! the next access reloads through the durable store.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, trace, warn};
use userprefs_cache::CacheStore;
use userprefs_config::{CacheKeyConfig, PreferencesConfig};
use userprefs_store::{ColumnTarget, RecordStore, StoredRow};
use userprefs_types::{PreferenceSet, PreferenceValue, UserId};

use crate::codec::BlobCodec;
use crate::defaults::DefaultsTable;
use crate::error::{PreferenceError, Result};

/// In-process state for one user. `None` means not loaded.
#[derive(Debug, Default)]
struct UserSlot {
    preferences: Option<PreferenceSet>,
    /// Whether `preferences` was decoded from a stored record rather than
    /// started empty by the load fallback.
    stored: bool,
}

/// Per-user preference store over a durable record store and a process cache.
///
/// Every operation addresses an explicit user. Operations on the same user
/// are serialized by a per-user lock held across load, mutation, save and
/// invalidation; different users proceed independently.
pub struct PreferenceStore<R, C> {
    records: R,
    cache: C,
    defaults: DefaultsTable,
    target: ColumnTarget,
    cache_keys: CacheKeyConfig,
    codec: BlobCodec,
    /// One slot per addressed user. Idle slots are dropped by `unload` and
    /// `unload_all`.
    users: Mutex<HashMap<UserId, Arc<Mutex<UserSlot>>>>,
}

impl<R, C> PreferenceStore<R, C>
where
    R: RecordStore,
    C: CacheStore<Value = Option<StoredRow>>,
{
    /// Create a store from configuration and its two collaborators.
    pub fn new(config: &PreferencesConfig, records: R, cache: C) -> Result<Self> {
        config.validate()?;

        let database = config.database();
        Ok(Self {
            records,
            cache,
            defaults: DefaultsTable::new(config.defaults.clone()),
            target: ColumnTarget::new(database.table, database.column, database.primary_key),
            cache_keys: config.cache(),
            codec: BlobCodec::from_config(&config.serialization()),
            users: Mutex::new(HashMap::new()),
        })
    }

    pub fn defaults(&self) -> &DefaultsTable {
        &self.defaults
    }

    pub fn records(&self) -> &R {
        &self.records
    }

    pub fn cache(&self) -> &C {
        &self.cache
    }

    pub fn codec(&self) -> &BlobCodec {
        &self.codec
    }

    /// The process cache key holding `user`'s raw record.
    pub fn cache_key(&self, user: &UserId) -> String {
        self.cache_keys.key_for(user.as_str())
    }

    // ── Reads ───────────────────────────────────────────────────────

    /// The stored value for `key`, else its default, else `Null`.
    ///
    /// Presence decides: a stored `false`, `0` or `null` is returned as is.
    pub fn get(&self, user: &UserId, key: &str) -> Result<PreferenceValue> {
        let slot = self.slot(user);
        let mut slot = slot.lock();
        let preferences = self.ensure_loaded(user, &mut slot)?;

        Ok(preferences
            .get(key)
            .or_else(|| self.defaults.get(key))
            .cloned()
            .unwrap_or_default())
    }

    /// Whether `key` is present in the user's set. Defaults don't count.
    pub fn has(&self, user: &UserId, key: &str) -> Result<bool> {
        let slot = self.slot(user);
        let mut slot = slot.lock();
        Ok(self.ensure_loaded(user, &mut slot)?.contains_key(key))
    }

    /// The user's full preference set, without defaults merged in.
    pub fn all(&self, user: &UserId) -> Result<PreferenceSet> {
        let slot = self.slot(user);
        let mut slot = slot.lock();
        Ok(self.ensure_loaded(user, &mut slot)?.clone())
    }

    // ── Writes ──────────────────────────────────────────────────────

    /// Set `key` to `value` and persist.
    ///
    /// When the key has a non-null default, `value` must have the same type;
    /// otherwise [`PreferenceError::TypeMismatch`] is returned and nothing
    /// changes.
    pub fn set(
        &self,
        user: &UserId,
        key: impl Into<String>,
        value: impl Into<PreferenceValue>,
    ) -> Result<()> {
        let key = key.into();
        let value = value.into();

        let slot = self.slot(user);
        let mut slot = slot.lock();
        let preferences = self.ensure_loaded(user, &mut slot)?;

        if let Some(expected) = self.defaults.expected_type(&key) {
            let actual = value.value_type();
            if actual != expected {
                debug!(user_id = %user, key = %key, %expected, %actual, "Rejected preference write");
                return Err(PreferenceError::TypeMismatch {
                    key,
                    expected,
                    actual,
                });
            }
        }

        if let PreferenceValue::Float(f) = value
            && !f.is_finite()
        {
            debug!(user_id = %user, key = %key, value = f, "Rejected non-finite preference");
            return Err(PreferenceError::InvalidValue {
                key,
                reason: "floats must be finite",
            });
        }

        trace!(user_id = %user, key = %key, "Setting preference");
        preferences.insert(key, value);
        self.save(user, &mut slot)
    }

    /// Restore `key` to its default and persist.
    ///
    /// Returns `true` when a truthy default was restored. Otherwise the key
    /// is removed from the user's set (a no-op if absent), the set is still
    /// persisted, and `false` is returned.
    pub fn reset(&self, user: &UserId, key: &str) -> Result<bool> {
        let slot = self.slot(user);
        let mut slot = slot.lock();
        let preferences = self.ensure_loaded(user, &mut slot)?;

        let restored = match self.defaults.restorable(key) {
            Some(default) => {
                preferences.insert(key.to_string(), default.clone());
                true
            }
            None => {
                preferences.remove(key);
                false
            }
        };

        trace!(user_id = %user, key = %key, restored, "Resetting preference");
        self.save(user, &mut slot)?;
        Ok(restored)
    }

    /// Persist the user's current set as is.
    ///
    /// A user whose set came from the load fallback (no row, no blob, or an
    /// unreadable blob) is written as the defaults table, giving the user a
    /// durable row. A set decoded from storage is written back unchanged.
    pub fn set_default_preferences(&self, user: &UserId) -> Result<()> {
        let slot = self.slot(user);
        let mut slot = slot.lock();
        self.ensure_loaded(user, &mut slot)?;

        let UserSlot { preferences, stored } = &mut *slot;
        if !*stored
            && let Some(preferences) = preferences
        {
            self.defaults.fill_missing(preferences);
        }
        self.save(user, &mut slot)
    }

    // ── In-process state ────────────────────────────────────────────

    /// Whether `user`'s set is held in memory.
    pub fn is_loaded(&self, user: &UserId) -> bool {
        let slot = self.users.lock().get(user).cloned();
        slot.is_some_and(|slot| slot.lock().preferences.is_some())
    }

    /// Drop `user`'s in-memory set without touching either store.
    pub fn unload(&self, user: &UserId) {
        let slot = {
            let mut users = self.users.lock();
            match users.get(user) {
                // Nobody else holds the slot, so it can go entirely.
                Some(slot) if Arc::strong_count(slot) == 1 => {
                    users.remove(user);
                    None
                }
                Some(slot) => Some(Arc::clone(slot)),
                None => None,
            }
        };
        if let Some(slot) = slot {
            slot.lock().preferences = None;
        }
    }

    /// Drop every in-memory set without touching either store.
    pub fn unload_all(&self) {
        let slots: Vec<_> = {
            let mut users = self.users.lock();
            users.retain(|_, slot| Arc::strong_count(slot) > 1);
            users.values().cloned().collect()
        };
        for slot in slots {
            slot.lock().preferences = None;
        }
    }

    // ── Internals ───────────────────────────────────────────────────

    fn slot(&self, user: &UserId) -> Arc<Mutex<UserSlot>> {
        Arc::clone(self.users.lock().entry(user.clone()).or_default())
    }

    fn ensure_loaded<'s>(
        &self,
        user: &UserId,
        slot: &'s mut UserSlot,
    ) -> Result<&'s mut PreferenceSet> {
        if slot.preferences.is_none() {
            let (preferences, stored) = self.load(user)?;
            slot.stored = stored;
            slot.preferences = Some(preferences);
        }
        Ok(slot.preferences.get_or_insert_default())
    }

    /// Read through the process cache, returning the set and whether it was
    /// decoded from a stored record.
    ///
    /// A missing, empty or unreadable record yields an empty set, so every
    /// read falls through to the defaults. A later `set` on such a user
    /// persists only the keys written at runtime, not the whole defaults
    /// table.
    fn load(&self, user: &UserId) -> Result<(PreferenceSet, bool)> {
        let key = self.cache_key(user);
        let row = self.cache.remember_forever(&key, || {
            self.records
                .fetch_column(&self.target, user.as_str())
                .map_err(PreferenceError::from)
        })?;

        let stored = row
            .and_then(|row| row.value)
            .and_then(|blob| match self.codec.decode(&blob) {
                Ok(preferences) => Some(preferences),
                Err(e) => {
                    warn!(user_id = %user, error = %e, "Stored preferences unreadable, using defaults");
                    None
                }
            });

        let (preferences, from_storage) = match stored {
            Some(preferences) => (preferences, true),
            None => {
                debug!(user_id = %user, "No stored preferences, using defaults");
                (PreferenceSet::new(), false)
            }
        };

        debug!(user_id = %user, keys = preferences.len(), "Preferences loaded");
        Ok((preferences, from_storage))
    }

    /// Write the set, then forget the cached record and unload the user.
    ///
    /// Invalidation happens whether or not the write succeeded; a write
    /// failure is still returned.
    fn save(&self, user: &UserId, slot: &mut UserSlot) -> Result<()> {
        let preferences = slot.preferences.take().unwrap_or_default();

        let written = self
            .codec
            .encode(&preferences)
            .map_err(PreferenceError::from)
            .and_then(|blob| {
                self.records
                    .update(&self.target, user.as_str(), &blob)
                    .map_err(PreferenceError::from)
            });
        let forgotten = self.cache.forget(&self.cache_key(user));

        match &written {
            Ok(()) => debug!(user_id = %user, keys = preferences.len(), "Preferences saved"),
            Err(e) => warn!(user_id = %user, error = %e, "Failed to save preferences"),
        }

        written?;
        forgotten?;
        Ok(())
    }
}

impl<R, C> std::fmt::Debug for PreferenceStore<R, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreferenceStore")
            .field("target", &self.target)
            .field("cache_keys", &self.cache_keys)
            .field("codec", &self.codec)
            .field("defaults", &self.defaults.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use userprefs_cache::MemoryCache;
    use userprefs_store::SqliteRecordStore;
    use userprefs_types::ValueType;

    use super::*;

    type TestStore = PreferenceStore<Arc<SqliteRecordStore>, MemoryCache<Option<StoredRow>>>;

    fn records() -> Arc<SqliteRecordStore> {
        let records = SqliteRecordStore::open_in_memory().unwrap();
        records
            .execute_batch(
                "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT, preferences TEXT);
                 INSERT INTO users (id, name) VALUES (1, 'ada'), (2, 'grace');",
            )
            .unwrap();
        Arc::new(records)
    }

    fn store_with(config: PreferencesConfig) -> TestStore {
        PreferenceStore::new(&config, records(), MemoryCache::new()).unwrap()
    }

    fn store() -> TestStore {
        store_with(
            PreferencesConfig::new()
                .with_default("theme", "light")
                .with_default("retries", 3),
        )
    }

    fn stored_blob(store: &TestStore, user: &UserId) -> Option<String> {
        store
            .records()
            .fetch_column(&ColumnTarget::default(), user.as_str())
            .unwrap()
            .and_then(|row| row.value)
    }

    #[test]
    fn test_new_user_sees_defaults() {
        let store = store();
        let user = UserId::from(1_i64);

        assert_eq!(store.get(&user, "theme").unwrap(), "light".into());
        assert_eq!(store.get(&user, "retries").unwrap(), 3.into());
        assert_eq!(store.get(&user, "missing").unwrap(), PreferenceValue::Null);
    }

    #[test]
    fn test_theme_scenario() {
        let store = store();
        let user = UserId::from(1_i64);

        assert_eq!(store.get(&user, "theme").unwrap(), "light".into());
        store.set(&user, "theme", "dark").unwrap();
        assert_eq!(store.get(&user, "theme").unwrap(), "dark".into());
        assert!(store.reset(&user, "theme").unwrap());
        assert_eq!(store.get(&user, "theme").unwrap(), "light".into());
    }

    #[test]
    fn test_type_mismatch_rejected_without_effect() {
        let store = store();
        let user = UserId::from(1_i64);
        store.set(&user, "retries", 5).unwrap();

        let err = store.set(&user, "retries", "five").unwrap_err();
        match err {
            PreferenceError::TypeMismatch {
                key,
                expected,
                actual,
            } => {
                assert_eq!(key, "retries");
                assert_eq!(expected, ValueType::Integer);
                assert_eq!(actual, ValueType::String);
            }
            other => panic!("expected TypeMismatch, got {other:?}"),
        }

        assert_eq!(store.get(&user, "retries").unwrap(), 5.into());
        assert_eq!(stored_blob(&store, &user).as_deref(), Some(r#"{"retries":5}"#));
    }

    #[test]
    fn test_type_mismatch_message() {
        let store = store_with(PreferencesConfig::new().with_default("label", "default_string"));
        let err = store.set(&UserId::from(1_i64), "label", 123).unwrap_err();
        assert_eq!(
            err.to_string(),
            "The expected type is \"string\"! \"integer\" was given."
        );
    }

    #[test]
    fn test_falsy_default_still_enforces_type() {
        let store = store_with(
            PreferencesConfig::new()
                .with_default("beta", false)
                .with_default("nothing", PreferenceValue::Null),
        );
        let user = UserId::from(1_i64);

        assert!(matches!(
            store.set(&user, "beta", "yes"),
            Err(PreferenceError::TypeMismatch { .. })
        ));
        store.set(&user, "beta", true).unwrap();
        store.set(&user, "nothing", "anything").unwrap();
        assert_eq!(store.get(&user, "nothing").unwrap(), "anything".into());
    }

    #[test]
    fn test_integer_default_rejects_float() {
        let store = store();
        assert!(matches!(
            store.set(&UserId::from(1_i64), "retries", 3.5),
            Err(PreferenceError::TypeMismatch {
                expected: ValueType::Integer,
                actual: ValueType::Float,
                ..
            })
        ));
    }

    #[test]
    fn test_key_without_default_accepts_any_type() {
        let store = store();
        let user = UserId::from(1_i64);

        assert!(!store.has(&user, "nickname").unwrap());
        store.set(&user, "nickname", "Bob").unwrap();
        assert!(store.has(&user, "nickname").unwrap());
        store.set(&user, "nickname", 7).unwrap();
        assert_eq!(store.get(&user, "nickname").unwrap(), 7.into());

        assert!(!store.reset(&user, "nickname").unwrap());
        assert!(!store.has(&user, "nickname").unwrap());
    }

    #[test]
    fn test_reset_is_idempotent() {
        let store = store();
        let user = UserId::from(1_i64);
        store.set(&user, "theme", "dark").unwrap();
        store.set(&user, "extra", true).unwrap();

        assert!(store.reset(&user, "theme").unwrap());
        assert!(store.reset(&user, "theme").unwrap());
        assert_eq!(store.get(&user, "theme").unwrap(), "light".into());

        assert!(!store.reset(&user, "extra").unwrap());
        let after_first = store.all(&user).unwrap();
        assert!(!store.reset(&user, "extra").unwrap());
        assert_eq!(store.all(&user).unwrap(), after_first);
    }

    #[test]
    fn test_reset_with_falsy_default_removes_key() {
        let store = store_with(PreferencesConfig::new().with_default("beta", false));
        let user = UserId::from(1_i64);
        store.set(&user, "beta", true).unwrap();

        assert!(!store.reset(&user, "beta").unwrap());
        assert!(!store.has(&user, "beta").unwrap());
        assert_eq!(store.get(&user, "beta").unwrap(), false.into());
    }

    #[test]
    fn test_has_ignores_defaults() {
        let store = store();
        let user = UserId::from(1_i64);

        assert!(!store.has(&user, "theme").unwrap());
        assert!(store.all(&user).unwrap().is_empty());

        store.set(&user, "other", "x").unwrap();
        assert!(store.has(&user, "other").unwrap());
        assert!(!store.has(&user, "theme").unwrap());
        assert!(!store.has(&user, "never").unwrap());
    }

    #[test]
    fn test_presence_beats_falsy_value() {
        let store = store();
        let user = UserId::from(1_i64);
        store.set(&user, "muted", PreferenceValue::Null).unwrap();
        store.set(&user, "count", 0).unwrap();

        assert!(store.has(&user, "muted").unwrap());
        assert_eq!(store.get(&user, "muted").unwrap(), PreferenceValue::Null);
        assert_eq!(store.get(&user, "count").unwrap(), 0.into());
    }

    #[test]
    fn test_all_returns_set_without_untouched_defaults() {
        let store = store();
        let user = UserId::from(2_i64);
        store
            .records()
            .update(&ColumnTarget::default(), "2", r#"{"theme":"dark"}"#)
            .unwrap();

        let all = store.all(&user).unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all["theme"], "dark".into());
        assert_eq!(store.get(&user, "retries").unwrap(), 3.into());
    }

    #[test]
    fn test_write_unloads_and_forgets_cache() {
        let store = store();
        let user = UserId::from(1_i64);
        let key = store.cache_key(&user);

        store.get(&user, "theme").unwrap();
        assert!(store.is_loaded(&user));
        assert!(store.cache().contains(&key));

        store.set(&user, "theme", "dark").unwrap();
        assert!(!store.is_loaded(&user));
        assert!(!store.cache().contains(&key));

        store.get(&user, "theme").unwrap();
        assert!(store.is_loaded(&user));
        assert!(store.cache().contains(&key));
    }

    #[test]
    fn test_loaded_user_does_no_io() {
        let store = store();
        let user = UserId::from(1_i64);
        store.get(&user, "theme").unwrap();
        let before = store.cache().stats();

        store.get(&user, "theme").unwrap();
        store.has(&user, "theme").unwrap();
        store.all(&user).unwrap();

        assert_eq!(store.cache().stats(), before);
    }

    #[test]
    fn test_malformed_blob_falls_back_to_defaults() {
        let store = store();
        let user = UserId::from(1_i64);
        for blob in ["", "not json", "null", "[1,2]", r#"{"a":{"b":1}}"#] {
            store
                .records()
                .update(&ColumnTarget::default(), "1", blob)
                .unwrap();
            store.cache().flush().unwrap();
            store.unload(&user);

            assert_eq!(store.get(&user, "theme").unwrap(), "light".into());
            assert!(store.all(&user).unwrap().is_empty());
        }
    }

    #[test]
    fn test_set_default_preferences_materializes_row() {
        let store = store();
        let user = UserId::from(9_i64);
        assert_eq!(stored_blob(&store, &user), None);

        store.set_default_preferences(&user).unwrap();

        assert_eq!(
            stored_blob(&store, &user).as_deref(),
            Some(r#"{"retries":3,"theme":"light"}"#)
        );
        assert!(store.has(&user, "theme").unwrap());
    }

    #[test]
    fn test_set_default_preferences_writes_stored_set_unchanged() {
        let store = store();
        let user = UserId::from(1_i64);
        store
            .records()
            .update(&ColumnTarget::default(), "1", r#"{"theme":"dark"}"#)
            .unwrap();

        store.set_default_preferences(&user).unwrap();

        assert_eq!(stored_blob(&store, &user).as_deref(), Some(r#"{"theme":"dark"}"#));
        assert!(!store.has(&user, "retries").unwrap());
        assert_eq!(store.all(&user).unwrap().len(), 1);
        assert_eq!(store.get(&user, "retries").unwrap(), 3.into());
    }

    #[test]
    fn test_set_default_preferences_replaces_unreadable_blob() {
        let store = store();
        let user = UserId::from(2_i64);
        store
            .records()
            .update(&ColumnTarget::default(), "2", "not json")
            .unwrap();

        store.set_default_preferences(&user).unwrap();

        assert_eq!(
            stored_blob(&store, &user).as_deref(),
            Some(r#"{"retries":3,"theme":"light"}"#)
        );
    }

    #[test]
    fn test_non_finite_float_rejected_without_effect() {
        let store = store_with(PreferencesConfig::new().with_default("ratio", 0.5));
        let user = UserId::from(2_i64);

        for value in [f64::INFINITY, f64::NEG_INFINITY, f64::NAN] {
            assert!(matches!(
                store.set(&user, "ratio", value),
                Err(PreferenceError::InvalidValue { .. })
            ));
            assert!(matches!(
                store.set(&user, "free", value),
                Err(PreferenceError::InvalidValue { .. })
            ));
        }

        assert!(!store.has(&user, "ratio").unwrap());
        assert_eq!(store.get(&user, "ratio").unwrap(), 0.5.into());
        assert_eq!(stored_blob(&store, &user), None);

        store.set(&user, "ratio", 0.25).unwrap();
        assert_eq!(store.get(&user, "ratio").unwrap(), 0.25.into());
    }

    #[test]
    fn test_unload_drops_idle_slots() {
        let store = store();
        for id in 1..=3_i64 {
            store.get(&UserId::from(id), "theme").unwrap();
        }
        assert_eq!(store.users.lock().len(), 3);

        store.unload(&UserId::from(1_i64));
        assert_eq!(store.users.lock().len(), 2);

        store.unload_all();
        assert!(store.users.lock().is_empty());
        assert!(!store.is_loaded(&UserId::from(2_i64)));

        assert_eq!(store.get(&UserId::from(2_i64), "theme").unwrap(), "light".into());
        assert!(store.is_loaded(&UserId::from(2_i64)));
    }

    #[test]
    fn test_users_are_isolated() {
        let store = store();
        let ada = UserId::from(1_i64);
        let grace = UserId::from(2_i64);

        store.set(&ada, "theme", "dark").unwrap();
        store.set(&grace, "theme", "solarized").unwrap();

        assert_eq!(store.get(&ada, "theme").unwrap(), "dark".into());
        assert_eq!(store.get(&grace, "theme").unwrap(), "solarized".into());
        assert_ne!(store.cache_key(&ada), store.cache_key(&grace));
    }

    #[test]
    fn test_exploded_keys_stay_flat_logically() {
        let store = store_with(
            PreferencesConfig::new()
                .with_default("notification.email", "daily")
                .with_serialization(userprefs_config::SerializationConfig::exploded(".")),
        );
        let user = UserId::from(1_i64);

        store.set(&user, "notification.sms", false).unwrap();

        assert_eq!(
            stored_blob(&store, &user).as_deref(),
            Some(r#"{"notification":{"sms":false}}"#)
        );
        assert!(store.has(&user, "notification.sms").unwrap());
        assert_eq!(store.get(&user, "notification.email").unwrap(), "daily".into());
    }

    #[test]
    fn test_custom_cache_key_shape() {
        let store = store_with(PreferencesConfig::new().with_cache(CacheKeyConfig {
            prefix: "prefs:".to_string(),
            suffix: String::new(),
        }));
        assert_eq!(store.cache_key(&UserId::from("abc")), "prefs:abc");
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = PreferencesConfig::new().with_database(userprefs_config::DatabaseConfig {
            table: "users; --".to_string(),
            ..Default::default()
        });
        let result = PreferenceStore::new(&config, records(), MemoryCache::new());
        assert!(matches!(result, Err(PreferenceError::Config(_))));
    }
}
