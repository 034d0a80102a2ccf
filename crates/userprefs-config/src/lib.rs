//! Configuration for user preference storage.
//!
//! Provides TOML-based configuration with:
//! - Durable store naming (`[database]`: table, column, primary key)
//! - Process cache key shape (`[cache]`: prefix and suffix around the user id)
//! - Blob shape (`[serialization]`: optional key exploding on a delimiter)
//! - The static defaults table (`[defaults]`)
//! - Config file layering (user config dir + project-local overrides)

pub mod discovery;
pub mod error;
pub mod types;

pub use discovery::{
    ConfigSource, LoadedConfig, load_config, load_config_file, load_config_with_options,
    user_config_path,
};
pub use error::{ConfigError, Result};
pub use types::*;
