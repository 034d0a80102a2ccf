//! Configuration types mapping to the TOML schema.
//!
//! ```toml
//! [database]          # where preference blobs live
//! [cache]             # process cache key shape
//! [serialization]     # blob shape
//! [defaults]          # static fallback values
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use userprefs_types::{PreferenceSet, PreferenceValue};

use crate::{ConfigError, Result};

// ─────────────────────────────────────────────────────────────────────────────
// Top-level Config
// ─────────────────────────────────────────────────────────────────────────────

/// Root configuration structure.
///
/// All sections are optional so that partial configs (e.g., project-local
/// overrides) can be loaded and merged. Accessors fall back to the section
/// defaults when a section is absent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PreferencesConfig {
    /// Durable store naming.
    pub database: Option<DatabaseConfig>,

    /// Process cache key shape.
    pub cache: Option<CacheKeyConfig>,

    /// Blob serialization options.
    pub serialization: Option<SerializationConfig>,

    /// Default preference values.
    pub defaults: PreferenceSet,
}

impl PreferencesConfig {
    /// Create an empty config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and validate a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let raw: RawConfig = toml::from_str(toml_str)?;
        let config = Self::try_from(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to a TOML string.
    ///
    /// `null` defaults have no TOML representation and are omitted.
    pub fn to_toml(&self) -> Result<String> {
        let raw: RawConfig = self.clone().into();
        Ok(toml::to_string_pretty(&raw)?)
    }

    /// Merge another config on top of this one (other takes priority).
    ///
    /// Sections are replaced wholesale; defaults merge key by key.
    pub fn merge(&mut self, other: PreferencesConfig) {
        if other.database.is_some() {
            self.database = other.database;
        }

        if other.cache.is_some() {
            self.cache = other.cache;
        }

        if other.serialization.is_some() {
            self.serialization = other.serialization;
        }

        self.defaults.extend(other.defaults);
    }

    /// Check names and options that would only fail later at use.
    pub fn validate(&self) -> Result<()> {
        self.database().validate()?;
        self.serialization().validate()?;

        for (key, value) in &self.defaults {
            if let PreferenceValue::Float(f) = value
                && !f.is_finite()
            {
                return Err(ConfigError::InvalidDefault {
                    key: key.clone(),
                    kind: "non-finite float",
                });
            }
        }
        Ok(())
    }

    /// Builder: add a default preference.
    pub fn with_default(mut self, key: impl Into<String>, value: impl Into<PreferenceValue>) -> Self {
        self.defaults.insert(key.into(), value.into());
        self
    }

    /// Builder: set the database section.
    pub fn with_database(mut self, database: DatabaseConfig) -> Self {
        self.database = Some(database);
        self
    }

    /// Builder: set the cache section.
    pub fn with_cache(mut self, cache: CacheKeyConfig) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Builder: set the serialization section.
    pub fn with_serialization(mut self, serialization: SerializationConfig) -> Self {
        self.serialization = Some(serialization);
        self
    }

    pub fn database(&self) -> DatabaseConfig {
        self.database.clone().unwrap_or_default()
    }

    pub fn cache(&self) -> CacheKeyConfig {
        self.cache.clone().unwrap_or_default()
    }

    pub fn serialization(&self) -> SerializationConfig {
        self.serialization.clone().unwrap_or_default()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Sections
// ─────────────────────────────────────────────────────────────────────────────

/// Where preference blobs are stored.
///
/// ```toml
/// [database]
/// table = "users"
/// column = "preferences"
/// primary_key = "id"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Table holding one row per user.
    pub table: String,
    /// Column holding the serialized preference blob.
    pub column: String,
    /// Column identifying the user.
    pub primary_key: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            table: "users".to_string(),
            column: "preferences".to_string(),
            primary_key: "id".to_string(),
        }
    }
}

impl DatabaseConfig {
    /// Reject names that are not plain SQL identifiers.
    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("database.table", &self.table),
            ("database.column", &self.column),
            ("database.primary_key", &self.primary_key),
        ] {
            if !is_identifier(value) {
                return Err(ConfigError::InvalidIdentifier {
                    field,
                    value: value.clone(),
                });
            }
        }
        Ok(())
    }
}

/// Shape of the process cache key: `{prefix}{user_id}{suffix}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheKeyConfig {
    pub prefix: String,
    pub suffix: String,
}

impl Default for CacheKeyConfig {
    fn default() -> Self {
        Self {
            prefix: "user-".to_string(),
            suffix: "-preferences".to_string(),
        }
    }
}

impl CacheKeyConfig {
    /// The cache key for a user's raw preference record.
    pub fn key_for(&self, user_id: &str) -> String {
        format!("{}{}{}", self.prefix, user_id, self.suffix)
    }
}

/// How the preference set is laid out in the stored blob.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerializationConfig {
    /// Expand `a.b` keys into nested objects when saving.
    pub explode_keys: bool,
    /// Delimiter used for exploding.
    pub delimiter: String,
}

impl Default for SerializationConfig {
    fn default() -> Self {
        Self {
            explode_keys: false,
            delimiter: ".".to_string(),
        }
    }
}

impl SerializationConfig {
    pub fn exploded(delimiter: impl Into<String>) -> Self {
        Self {
            explode_keys: true,
            delimiter: delimiter.into(),
        }
    }

    /// The active delimiter, if exploding is enabled.
    pub fn explode_delimiter(&self) -> Option<&str> {
        self.explode_keys.then_some(self.delimiter.as_str())
    }

    pub fn validate(&self) -> Result<()> {
        if self.explode_keys && self.delimiter.is_empty() {
            return Err(ConfigError::EmptyDelimiter);
        }
        Ok(())
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

// ─────────────────────────────────────────────────────────────────────────────
// Raw TOML representation
// ─────────────────────────────────────────────────────────────────────────────

/// On-disk shape: defaults stay as raw TOML until checked for scalars.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct RawConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    database: Option<DatabaseConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    cache: Option<CacheKeyConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    serialization: Option<SerializationConfig>,
    defaults: BTreeMap<String, toml::Value>,
}

impl TryFrom<RawConfig> for PreferencesConfig {
    type Error = ConfigError;

    fn try_from(raw: RawConfig) -> Result<Self> {
        let mut defaults = PreferenceSet::new();
        for (key, value) in raw.defaults {
            let value = match value {
                toml::Value::String(s) => PreferenceValue::String(s),
                toml::Value::Integer(i) => PreferenceValue::Integer(i),
                toml::Value::Float(f) => PreferenceValue::Float(f),
                toml::Value::Boolean(b) => PreferenceValue::Bool(b),
                other => {
                    return Err(ConfigError::InvalidDefault {
                        key,
                        kind: other.type_str(),
                    });
                }
            };
            defaults.insert(key, value);
        }

        Ok(Self {
            database: raw.database,
            cache: raw.cache,
            serialization: raw.serialization,
            defaults,
        })
    }
}

impl From<PreferencesConfig> for RawConfig {
    fn from(config: PreferencesConfig) -> Self {
        let defaults = config
            .defaults
            .into_iter()
            .filter_map(|(key, value)| {
                let value = match value {
                    PreferenceValue::Null => return None,
                    PreferenceValue::Bool(b) => toml::Value::Boolean(b),
                    PreferenceValue::Integer(i) => toml::Value::Integer(i),
                    PreferenceValue::Float(f) => toml::Value::Float(f),
                    PreferenceValue::String(s) => toml::Value::String(s),
                };
                Some((key, value))
            })
            .collect();

        Self {
            database: config.database,
            cache: config.cache,
            serialization: config.serialization,
            defaults,
        }
    }
}
