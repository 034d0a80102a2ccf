//! Current-user facade and bootstrap wiring.

use std::path::Path;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::info;
use userprefs_cache::{CacheStore, MemoryCache};
use userprefs_config::PreferencesConfig;
use userprefs_store::{RecordStore, SqliteRecordStore, StoredRow};
use userprefs_types::{PreferenceSet, PreferenceValue, UserId};

use crate::error::{PreferenceError, Result};
use crate::store::PreferenceStore;

/// Process cache holding raw preference records.
pub type RecordCache = MemoryCache<Option<StoredRow>>;

/// Supplies the user the caller is acting as, if any.
pub trait CurrentUser: Send + Sync {
    fn current_user(&self) -> Option<UserId>;
}

impl<F> CurrentUser for F
where
    F: Fn() -> Option<UserId> + Send + Sync,
{
    fn current_user(&self) -> Option<UserId> {
        self()
    }
}

/// A signed-in user slot for hosts without their own session mechanism.
#[derive(Debug, Default)]
pub struct SessionUser {
    user: RwLock<Option<UserId>>,
}

impl SessionUser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn login(&self, user: impl Into<UserId>) {
        *self.user.write() = Some(user.into());
    }

    pub fn logout(&self) {
        *self.user.write() = None;
    }
}

impl CurrentUser for SessionUser {
    fn current_user(&self) -> Option<UserId> {
        self.user.read().clone()
    }
}

/// Preference access for the current user, with explicit-user variants.
///
/// The `*_for_user` methods address the given user and never consult or
/// change the current user.
pub struct UserPreferences<R = SqliteRecordStore, C = RecordCache> {
    store: PreferenceStore<R, C>,
    current: Arc<dyn CurrentUser>,
}

impl UserPreferences<SqliteRecordStore, RecordCache> {
    /// Wire a SQLite database at `path` and a fresh in-memory process cache.
    pub fn sqlite(
        config: &PreferencesConfig,
        path: impl AsRef<Path>,
        current: Arc<dyn CurrentUser>,
    ) -> Result<Self> {
        let records = SqliteRecordStore::open(path)?;
        let store = PreferenceStore::new(config, records, RecordCache::new())?;
        info!(defaults = store.defaults().len(), "User preferences ready");
        Ok(Self::new(store, current))
    }
}

impl<R, C> UserPreferences<R, C>
where
    R: RecordStore,
    C: CacheStore<Value = Option<StoredRow>>,
{
    pub fn new(store: PreferenceStore<R, C>, current: Arc<dyn CurrentUser>) -> Self {
        Self { store, current }
    }

    pub fn store(&self) -> &PreferenceStore<R, C> {
        &self.store
    }

    fn current_user(&self) -> Result<UserId> {
        self.current
            .current_user()
            .ok_or(PreferenceError::NoCurrentUser)
    }

    pub fn get(&self, key: &str) -> Result<PreferenceValue> {
        self.store.get(&self.current_user()?, key)
    }

    pub fn set(&self, key: impl Into<String>, value: impl Into<PreferenceValue>) -> Result<()> {
        self.store.set(&self.current_user()?, key, value)
    }

    pub fn reset(&self, key: &str) -> Result<bool> {
        self.store.reset(&self.current_user()?, key)
    }

    pub fn has(&self, key: &str) -> Result<bool> {
        self.store.has(&self.current_user()?, key)
    }

    pub fn all(&self) -> Result<PreferenceSet> {
        self.store.all(&self.current_user()?)
    }

    pub fn set_default_preferences(&self) -> Result<()> {
        self.store.set_default_preferences(&self.current_user()?)
    }

    pub fn get_for_user(&self, key: &str, user: &UserId) -> Result<PreferenceValue> {
        self.store.get(user, key)
    }

    pub fn set_for_user(
        &self,
        key: impl Into<String>,
        value: impl Into<PreferenceValue>,
        user: &UserId,
    ) -> Result<()> {
        self.store.set(user, key, value)
    }

    pub fn reset_for_user(&self, key: &str, user: &UserId) -> Result<bool> {
        self.store.reset(user, key)
    }

    pub fn has_for_user(&self, key: &str, user: &UserId) -> Result<bool> {
        self.store.has(user, key)
    }

    pub fn all_for_user(&self, user: &UserId) -> Result<PreferenceSet> {
        self.store.all(user)
    }

    pub fn set_default_preferences_for_user(&self, user: &UserId) -> Result<()> {
        self.store.set_default_preferences(user)
    }
}

impl<R, C> std::fmt::Debug for UserPreferences<R, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserPreferences")
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}
