//! The static defaults table.

use std::sync::Arc;

use userprefs_types::{PreferenceSet, PreferenceValue, ValueType};

/// Process-wide fallback values, read once from configuration.
///
/// Immutable after construction; clones share the same table.
#[derive(Debug, Clone, Default)]
pub struct DefaultsTable {
    values: Arc<PreferenceSet>,
}

impl DefaultsTable {
    pub fn new(values: PreferenceSet) -> Self {
        Self {
            values: Arc::new(values),
        }
    }

    pub fn get(&self, key: &str) -> Option<&PreferenceValue> {
        self.values.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &PreferenceValue)> {
        self.values.iter()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Copy every default whose key is absent from `preferences`.
    pub fn fill_missing(&self, preferences: &mut PreferenceSet) {
        for (key, value) in self.values.iter() {
            preferences
                .entry(key.clone())
                .or_insert_with(|| value.clone());
        }
    }

    /// The type a write to `key` must have, if one is enforced.
    ///
    /// Every non-null default pins its key's type, including `false`, `0`
    /// and `""`.
    pub fn expected_type(&self, key: &str) -> Option<ValueType> {
        self.get(key)
            .filter(|value| !value.is_null())
            .map(PreferenceValue::value_type)
    }

    /// The value `reset` restores, if any. Only truthy defaults qualify.
    pub fn restorable(&self, key: &str) -> Option<&PreferenceValue> {
        self.get(key).filter(|value| value.is_truthy())
    }
}

impl From<PreferenceSet> for DefaultsTable {
    fn from(values: PreferenceSet) -> Self {
        Self::new(values)
    }
}

impl<K: Into<String>, V: Into<PreferenceValue>> FromIterator<(K, V)> for DefaultsTable {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self::new(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}
