//! Configuration error types.

/// Result type alias for config operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Errors that can occur during configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read a config file.
    #[error("failed to read config file '{path}': {source}")]
    ReadFile {
        path: String,
        source: std::io::Error,
    },

    /// Failed to parse TOML.
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// Failed to serialize config.
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// A `[defaults]` entry is not a scalar.
    #[error("default preference '{key}' must be a string, number or boolean, got {kind}")]
    InvalidDefault { key: String, kind: &'static str },

    /// Key exploding is enabled with an empty delimiter.
    #[error("serialization.delimiter must not be empty when explode_keys is enabled")]
    EmptyDelimiter,

    /// A database name is not a plain SQL identifier.
    #[error("invalid {field} '{value}': expected letters, digits and underscores")]
    InvalidIdentifier { field: &'static str, value: String },
}
