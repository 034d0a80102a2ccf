//! The stored blob format.
//!
//! A preference set is stored as a JSON object of scalars. With key
//! exploding enabled, `"notification.email": "daily"` is written as
//! `{"notification": {"email": "daily"}}` and flattened back on read. The
//! logical key space seen by the store is always flat.

use serde_json::{Map, Value};
use userprefs_config::SerializationConfig;
use userprefs_types::{PreferenceSet, PreferenceValue};

/// Why a stored blob could not be turned into a preference set.
#[derive(Debug, thiserror::Error)]
pub enum MalformedData {
    #[error("blob is empty")]
    Empty,

    #[error("blob is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("blob is not a JSON object")]
    NotObject,

    #[error("value for '{0}' is not a scalar")]
    NotScalar(String),

    #[error("key '{0}' appears more than once after flattening")]
    DuplicateKey(String),
}

/// Encodes and decodes preference blobs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlobCodec {
    delimiter: Option<String>,
}

impl BlobCodec {
    /// Keys are stored exactly as given.
    pub fn flat() -> Self {
        Self { delimiter: None }
    }

    /// Keys are exploded into nested objects on `delimiter`.
    pub fn exploded(delimiter: impl Into<String>) -> Self {
        Self {
            delimiter: Some(delimiter.into()).filter(|d| !d.is_empty()),
        }
    }

    pub fn from_config(config: &SerializationConfig) -> Self {
        match config.explode_delimiter() {
            Some(delimiter) => Self::exploded(delimiter),
            None => Self::flat(),
        }
    }

    pub fn delimiter(&self) -> Option<&str> {
        self.delimiter.as_deref()
    }

    pub fn encode(&self, preferences: &PreferenceSet) -> serde_json::Result<String> {
        match &self.delimiter {
            None => serde_json::to_string(preferences),
            Some(delimiter) => serde_json::to_string(&explode(preferences, delimiter)),
        }
    }

    pub fn decode(&self, blob: &str) -> Result<PreferenceSet, MalformedData> {
        if blob.trim().is_empty() {
            return Err(MalformedData::Empty);
        }

        let Value::Object(object) = serde_json::from_str::<Value>(blob)? else {
            return Err(MalformedData::NotObject);
        };

        let mut preferences = PreferenceSet::new();
        match &self.delimiter {
            None => {
                for (key, value) in object {
                    let value = PreferenceValue::try_from(value)
                        .map_err(|_| MalformedData::NotScalar(key.clone()))?;
                    preferences.insert(key, value);
                }
            }
            Some(delimiter) => flatten_into(&mut preferences, object, None, delimiter)?,
        }
        Ok(preferences)
    }
}

fn explode(preferences: &PreferenceSet, delimiter: &str) -> Map<String, Value> {
    let mut root = Map::new();
    let mut flat = Vec::new();

    for (key, value) in preferences {
        let mut segments: Vec<&str> = key.split(delimiter).collect();
        let leaf = segments.pop().unwrap_or_default();

        if let Err(value) = insert_path(&mut root, &segments, leaf, Value::from(value.clone())) {
            flat.push((key.clone(), value));
        }
    }

    // A path already taken by a scalar (or an object) keeps the key flat.
    for (key, value) in flat {
        root.insert(key, value);
    }
    root
}

/// Place `value` at `segments/leaf`, handing it back if the path is taken.
fn insert_path(
    node: &mut Map<String, Value>,
    segments: &[&str],
    leaf: &str,
    value: Value,
) -> Result<(), Value> {
    match segments.split_first() {
        None if node.contains_key(leaf) => Err(value),
        None => {
            node.insert(leaf.to_string(), value);
            Ok(())
        }
        Some((first, rest)) => match node
            .entry(first.to_string())
            .or_insert_with(|| Value::Object(Map::new()))
        {
            Value::Object(child) => insert_path(child, rest, leaf, value),
            _ => Err(value),
        },
    }
}

fn flatten_into(
    preferences: &mut PreferenceSet,
    object: Map<String, Value>,
    prefix: Option<&str>,
    delimiter: &str,
) -> Result<(), MalformedData> {
    for (segment, value) in object {
        let key = match prefix {
            Some(prefix) => format!("{prefix}{delimiter}{segment}"),
            None => segment,
        };

        match value {
            Value::Object(child) => flatten_into(preferences, child, Some(&key), delimiter)?,
            Value::Array(_) => return Err(MalformedData::NotScalar(key)),
            scalar => {
                let value = PreferenceValue::try_from(scalar)
                    .map_err(|_| MalformedData::NotScalar(key.clone()))?;
                if preferences.insert(key.clone(), value).is_some() {
                    return Err(MalformedData::DuplicateKey(key));
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use serde_json::json;

    use super::*;

    fn set(pairs: &[(&str, PreferenceValue)]) -> PreferenceSet {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_flat_encode() {
        let prefs = set(&[
            ("theme", "dark".into()),
            ("retries", 3.into()),
            ("notification.email", true.into()),
        ]);
        let blob = BlobCodec::flat().encode(&prefs).unwrap();
        let value: Value = serde_json::from_str(&blob).unwrap();
        assert_eq!(
            value,
            json!({"theme": "dark", "retries": 3, "notification.email": true})
        );
    }

    #[test]
    fn test_exploded_encode() {
        let prefs = set(&[
            ("notification.email", "daily".into()),
            ("notification.sms", false.into()),
            ("theme", "dark".into()),
        ]);
        let blob = BlobCodec::exploded(".").encode(&prefs).unwrap();
        let value: Value = serde_json::from_str(&blob).unwrap();
        assert_eq!(
            value,
            json!({
                "notification": {"email": "daily", "sms": false},
                "theme": "dark"
            })
        );
    }

    #[test]
    fn test_exploded_decode_flattens() {
        let codec = BlobCodec::exploded(".");
        let prefs = codec
            .decode(r#"{"notification": {"email": "daily", "push": {"enabled": true}}, "theme": "dark"}"#)
            .unwrap();

        assert_eq!(prefs.len(), 3);
        assert_eq!(prefs["notification.email"], PreferenceValue::from("daily"));
        assert_eq!(prefs["notification.push.enabled"], PreferenceValue::from(true));
        assert_eq!(prefs["theme"], PreferenceValue::from("dark"));
    }

    #[test]
    fn test_colliding_key_stays_flat() {
        let codec = BlobCodec::exploded(".");
        let prefs = set(&[("a", 1.into()), ("a.b", 2.into())]);

        let blob = codec.encode(&prefs).unwrap();
        let value: Value = serde_json::from_str(&blob).unwrap();
        assert_eq!(value, json!({"a": 1, "a.b": 2}));

        assert_eq!(codec.decode(&blob).unwrap(), prefs);
    }

    #[test]
    fn test_malformed_blobs() {
        let codec = BlobCodec::flat();
        assert!(matches!(codec.decode(""), Err(MalformedData::Empty)));
        assert!(matches!(codec.decode("  "), Err(MalformedData::Empty)));
        assert!(matches!(codec.decode("{not json"), Err(MalformedData::Json(_))));
        assert!(matches!(codec.decode("null"), Err(MalformedData::NotObject)));
        assert!(matches!(codec.decode("[1, 2]"), Err(MalformedData::NotObject)));
        assert!(matches!(codec.decode("\"text\""), Err(MalformedData::NotObject)));
        assert!(matches!(
            codec.decode(r#"{"tags": ["a"]}"#),
            Err(MalformedData::NotScalar(key)) if key == "tags"
        ));
        assert!(matches!(
            codec.decode(r#"{"nested": {"a": 1}}"#),
            Err(MalformedData::NotScalar(key)) if key == "nested"
        ));
    }

    #[test]
    fn test_exploded_duplicate_after_flatten() {
        let codec = BlobCodec::exploded(".");
        let result = codec.decode(r#"{"a": {"b": 1}, "a.b": 2}"#);
        assert!(matches!(result, Err(MalformedData::DuplicateKey(key)) if key == "a.b"));
    }

    #[test]
    fn test_empty_delimiter_means_flat() {
        assert_eq!(BlobCodec::exploded("").delimiter(), None);
        assert_eq!(
            BlobCodec::from_config(&SerializationConfig::exploded("/")).delimiter(),
            Some("/")
        );
        assert_eq!(
            BlobCodec::from_config(&SerializationConfig::default()).delimiter(),
            None
        );
    }

    fn scalar() -> impl Strategy<Value = PreferenceValue> {
        prop_oneof![
            Just(PreferenceValue::Null),
            any::<bool>().prop_map(PreferenceValue::Bool),
            any::<i64>().prop_map(PreferenceValue::Integer),
            "[a-z ]{0,8}".prop_map(PreferenceValue::String),
        ]
    }

    proptest! {
        #[test]
        fn exploded_blob_reads_back_the_same_keys(
            prefs in prop::collection::btree_map("[a-c]{1,2}(\\.[a-c]{1,2}){0,2}", scalar(), 0..12)
        ) {
            let codec = BlobCodec::exploded(".");
            let blob = codec.encode(&prefs).unwrap();
            prop_assert_eq!(codec.decode(&blob).unwrap(), prefs);
        }
    }
}
