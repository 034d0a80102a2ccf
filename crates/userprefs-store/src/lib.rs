//! Durable record storage for user preference blobs.
//!
//! The preference store only needs two operations from its durable
//! collaborator: fetch one column of one user's row, and write that column
//! back. [`RecordStore`] captures that contract; [`SqliteRecordStore`] is the
//! bundled backend.
//!
//! Table, column and primary-key names are supplied by the caller through a
//! [`ColumnTarget`] and are treated as opaque configuration.

mod error;
mod record;
mod sqlite;

pub use error::{Result, StoreError};
pub use record::{ColumnTarget, RecordStore, StoredRow};
pub use sqlite::SqliteRecordStore;
