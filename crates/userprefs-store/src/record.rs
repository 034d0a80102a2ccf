use std::sync::Arc;

use crate::{Result, StoreError};

/// Names addressing the preference column of a user's row.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ColumnTarget {
    pub table: String,
    pub column: String,
    pub primary_key: String,
}

impl ColumnTarget {
    pub fn new(
        table: impl Into<String>,
        column: impl Into<String>,
        primary_key: impl Into<String>,
    ) -> Self {
        Self {
            table: table.into(),
            column: column.into(),
            primary_key: primary_key.into(),
        }
    }

    /// Reject names that cannot be safely quoted as SQL identifiers.
    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("table", &self.table),
            ("column", &self.column),
            ("primary key", &self.primary_key),
        ] {
            let mut chars = value.chars();
            let valid = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
            if !valid {
                return Err(StoreError::InvalidIdentifier {
                    field,
                    value: value.clone(),
                });
            }
        }
        Ok(())
    }
}

impl Default for ColumnTarget {
    fn default() -> Self {
        Self::new("users", "preferences", "id")
    }
}

/// Raw result of fetching the preference column for one user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRow {
    pub user_id: String,
    /// Column content; `None` when the column is NULL.
    pub value: Option<String>,
}

/// Durable store holding one preference blob per user.
pub trait RecordStore: Send + Sync {
    /// Fetch the target column for `user_id`. `Ok(None)` when no row exists.
    fn fetch_column(&self, target: &ColumnTarget, user_id: &str) -> Result<Option<StoredRow>>;

    /// Write `blob` into the target column of `user_id`'s row.
    fn update(&self, target: &ColumnTarget, user_id: &str, blob: &str) -> Result<()>;
}

impl<T: RecordStore + ?Sized> RecordStore for Arc<T> {
    fn fetch_column(&self, target: &ColumnTarget, user_id: &str) -> Result<Option<StoredRow>> {
        (**self).fetch_column(target, user_id)
    }

    fn update(&self, target: &ColumnTarget, user_id: &str, blob: &str) -> Result<()> {
        (**self).update(target, user_id, blob)
    }
}
