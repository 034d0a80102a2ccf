//! Shared types for user preference storage.
//!
//! Preferences are a flat, string-keyed mapping of scalar values. The types
//! here are used by every layer: configuration (the defaults table), the
//! durable blob codec, and the preference store itself.

mod user;
mod value;

pub use user::UserId;
pub use value::{PreferenceValue, ValueError, ValueType};

/// One user's preferences: key to scalar value.
///
/// Ordered so the serialized blob is deterministic.
pub type PreferenceSet = std::collections::BTreeMap<String, PreferenceValue>;
