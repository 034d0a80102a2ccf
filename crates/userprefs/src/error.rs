//! Error types for preference operations.

use thiserror::Error;
use userprefs_types::ValueType;

/// Errors surfaced by preference operations.
///
/// Malformed stored data is not here: it never reaches the caller and falls
/// back to the defaults table instead.
#[derive(Debug, Error)]
pub enum PreferenceError {
    /// The value's type differs from the configured default's type.
    /// Nothing was written.
    #[error("The expected type is \"{expected}\"! \"{actual}\" was given.")]
    TypeMismatch {
        key: String,
        expected: ValueType,
        actual: ValueType,
    },

    /// The value cannot be stored and read back as given. Nothing was
    /// written.
    #[error("Invalid value for \"{key}\": {reason}")]
    InvalidValue { key: String, reason: &'static str },

    /// A current-user operation was called with nobody signed in.
    #[error("No current user to read or write preferences for")]
    NoCurrentUser,

    /// Durable record store failure, carried verbatim.
    #[error(transparent)]
    Store(#[from] userprefs_store::StoreError),

    /// Process cache failure, carried verbatim.
    #[error(transparent)]
    Cache(#[from] userprefs_cache::CacheError),

    /// The preference set could not be serialized.
    #[error("Serialization error: {0}")]
    Encode(#[from] serde_json::Error),

    /// The configuration handed to the store is unusable.
    #[error(transparent)]
    Config(#[from] userprefs_config::ConfigError),
}

/// Result type alias for preference operations.
pub type Result<T> = std::result::Result<T, PreferenceError>;
