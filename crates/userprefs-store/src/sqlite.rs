use std::path::Path;

use parking_lot::{Mutex, MutexGuard};
use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags, OptionalExtension, params};
use tracing::{debug, info, trace};

use crate::{ColumnTarget, RecordStore, Result, StoredRow};

/// Record store backed by SQLite.
///
/// The schema belongs to the host application: this store only reads and
/// writes the configured column. Thread-safe via internal `Mutex<Connection>`.
pub struct SqliteRecordStore {
    conn: Mutex<Connection>,
}

impl SqliteRecordStore {
    /// Open (or create) the database at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_FULL_MUTEX,
        )?;
        conn.pragma_update(None, "journal_mode", "WAL")?;

        info!(path = %path.display(), "Record store opened");
        Ok(Self::from_connection(conn))
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self::from_connection(conn))
    }

    /// Wrap an existing connection.
    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    /// Run raw SQL, e.g. to create the host's user table.
    pub fn execute_batch(&self, sql: &str) -> Result<()> {
        self.conn().execute_batch(sql)?;
        Ok(())
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock()
    }
}

impl std::fmt::Debug for SqliteRecordStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteRecordStore").finish_non_exhaustive()
    }
}

impl RecordStore for SqliteRecordStore {
    fn fetch_column(&self, target: &ColumnTarget, user_id: &str) -> Result<Option<StoredRow>> {
        target.validate()?;

        let sql = format!(
            "SELECT \"{}\" FROM \"{}\" WHERE \"{}\" = ?1 LIMIT 1",
            target.column, target.table, target.primary_key
        );

        let conn = self.conn();
        let value = conn
            .query_row(&sql, params![user_id], |row| {
                Ok(match row.get_ref(0)? {
                    ValueRef::Null => None,
                    ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
                        Some(String::from_utf8_lossy(bytes).into_owned())
                    }
                    ValueRef::Integer(i) => Some(i.to_string()),
                    ValueRef::Real(f) => Some(f.to_string()),
                })
            })
            .optional()?;

        trace!(user_id = %user_id, found = value.is_some(), "Fetched preference column");

        Ok(value.map(|value| StoredRow {
            user_id: user_id.to_string(),
            value,
        }))
    }

    fn update(&self, target: &ColumnTarget, user_id: &str, blob: &str) -> Result<()> {
        target.validate()?;

        let conn = self.conn();
        let changed = conn.execute(
            &format!(
                "UPDATE \"{}\" SET \"{}\" = ?1 WHERE \"{}\" = ?2",
                target.table, target.column, target.primary_key
            ),
            params![blob, user_id],
        )?;

        if changed == 0 {
            conn.execute(
                &format!(
                    "INSERT INTO \"{}\" (\"{}\", \"{}\") VALUES (?1, ?2)",
                    target.table, target.primary_key, target.column
                ),
                params![user_id, blob],
            )?;
            debug!(user_id = %user_id, "Inserted preference row");
        } else {
            trace!(user_id = %user_id, "Updated preference row");
        }

        Ok(())
    }
}
