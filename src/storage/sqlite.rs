use std::{path::Path, sync::Arc};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};
use serde_json::Value;

use super::{
    error::{StorageError, StorageResult},
    traits::{Collection, Record, RecordStore},
};

const DB_SCHEMA_VERSION: i64 = 1;

/// SQLite-backed record store holding one long-lived connection.
///
/// Every write is stamped from a per-store clock that never repeats a value,
/// so `updated_at` ordering follows the order in which writes were applied.
#[derive(Clone)]
pub struct SqliteStorage {
    pub path: String,
    inner: Arc<Mutex<Option<Inner>>>,
}

struct Inner {
    conn: Connection,
    last_stamp: i64,
}

impl Inner {
    fn next_stamp(&mut self) -> i64 {
        let now = Utc::now().timestamp_micros();
        self.last_stamp = now.max(self.last_stamp + 1);
        self.last_stamp
    }
}

struct RawRow {
    id: String,
    data: String,
    created_at: i64,
    updated_at: i64,
}

impl RawRow {
    fn into_record(self) -> StorageResult<Record> {
        Ok(Record {
            document: serde_json::from_str(&self.data)?,
            id: self.id,
            created_at: micros_to_datetime(self.created_at),
            updated_at: micros_to_datetime(self.updated_at),
        })
    }
}

fn micros_to_datetime(micros: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_micros(micros).unwrap_or_default()
}

fn map_raw_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawRow> {
    Ok(RawRow {
        id: row.get(0)?,
        data: row.get(1)?,
        created_at: row.get(2)?,
        updated_at: row.get(3)?,
    })
}

fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::ConstraintViolation
    )
}

fn db_list(conn: &Connection, collection: Collection) -> rusqlite::Result<Vec<RawRow>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT id, data, created_at, updated_at FROM {} ORDER BY updated_at DESC, created_at DESC",
        collection.table()
    ))?;
    let rows = stmt
        .query_map([], map_raw_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

fn db_get(conn: &Connection, collection: Collection, id: &str) -> rusqlite::Result<Option<RawRow>> {
    conn.query_row(
        &format!(
            "SELECT id, data, created_at, updated_at FROM {} WHERE id = ?1",
            collection.table()
        ),
        params![id],
        map_raw_row,
    )
    .optional()
}

fn db_insert(
    conn: &Connection,
    collection: Collection,
    id: &str,
    data: &str,
    stamp: i64,
) -> rusqlite::Result<()> {
    conn.execute(
        &format!(
            "INSERT INTO {} (id, data, created_at, updated_at) VALUES (?1, ?2, ?3, ?3)",
            collection.table()
        ),
        params![id, data, stamp],
    )?;
    Ok(())
}

/// Returns the row's `created_at` when a row was updated.
fn db_replace(
    conn: &Connection,
    collection: Collection,
    id: &str,
    data: &str,
    stamp: i64,
) -> rusqlite::Result<Option<i64>> {
    conn.query_row(
        &format!(
            "UPDATE {} SET data = ?1, updated_at = ?2 WHERE id = ?3 RETURNING created_at",
            collection.table()
        ),
        params![data, stamp, id],
        |row| row.get(0),
    )
    .optional()
}

fn db_remove(conn: &Connection, collection: Collection, id: &str) -> rusqlite::Result<usize> {
    conn.execute(
        &format!("DELETE FROM {} WHERE id = ?1", collection.table()),
        params![id],
    )
}

fn db_max_stamp(conn: &Connection) -> rusqlite::Result<i64> {
    let mut max = 0i64;
    for collection in Collection::ALL {
        let stamp: Option<i64> = conn.query_row(
            &format!("SELECT MAX(updated_at) FROM {}", collection.table()),
            [],
            |row| row.get(0),
        )?;
        max = max.max(stamp.unwrap_or(0));
    }
    Ok(max)
}

impl SqliteStorage {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_string_lossy().to_string(),
            inner: Arc::new(Mutex::new(None)),
        }
    }

    /// Deletes the database file. Must run before `init`.
    pub fn reset_all(&self) -> anyhow::Result<()> {
        for suffix in ["", "-wal", "-shm"] {
            let path = format!("{}{}", self.path, suffix);
            if Path::new(&path).exists() {
                std::fs::remove_file(&path)?;
            }
        }
        Ok(())
    }

    /// Opens (or creates) the database file and makes sure every collection
    /// table exists. Calling it on an open store is a no-op.
    pub fn init(&self) -> StorageResult<()> {
        let mut guard = self.inner.lock();
        if guard.is_some() {
            return Ok(());
        }

        let conn = Connection::open(&self.path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.busy_timeout(std::time::Duration::from_millis(500))?;

        Self::migrate(&conn)?;
        let last_stamp = db_max_stamp(&conn)?;

        *guard = Some(Inner { conn, last_stamp });
        Ok(())
    }

    fn with_inner<F, T>(&self, f: F) -> StorageResult<T>
    where
        F: FnOnce(&mut Inner) -> StorageResult<T>,
    {
        let mut guard = self.inner.lock();
        let inner = guard.as_mut().ok_or(StorageError::Closed)?;
        f(inner)
    }

    fn migrate(conn: &Connection) -> rusqlite::Result<()> {
        let version: i64 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;

        if version > DB_SCHEMA_VERSION {
            return Err(rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error::new(rusqlite::ffi::ErrorCode::SchemaChanged as i32),
                Some(
                    "database schema version mismatch; please run with --reset option".to_string(),
                ),
            ));
        }

        for collection in Collection::ALL {
            conn.execute_batch(&format!(
                r#"
            CREATE TABLE IF NOT EXISTS {table} (
                id TEXT PRIMARY KEY,
                data TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS {table}_updated_at_idx
                ON {table}(updated_at);
            "#,
                table = collection.table()
            ))?;
        }

        if version != DB_SCHEMA_VERSION {
            log::info!(
                "SQLite schema migration: {} -> {}",
                version,
                DB_SCHEMA_VERSION
            );
            conn.pragma_update(None, "user_version", DB_SCHEMA_VERSION)?;
        }
        Ok(())
    }
}

impl RecordStore for SqliteStorage {
    fn list(&self, collection: Collection) -> StorageResult<Vec<Record>> {
        let rows = self.with_inner(|inner| Ok(db_list(&inner.conn, collection)?))?;
        rows.into_iter().map(RawRow::into_record).collect()
    }

    fn get(&self, collection: Collection, id: &str) -> StorageResult<Record> {
        let row = self.with_inner(|inner| Ok(db_get(&inner.conn, collection, id)?))?;
        match row {
            Some(row) => row.into_record(),
            None => Err(StorageError::NotFound {
                collection,
                id: id.to_string(),
            }),
        }
    }

    fn insert(&self, collection: Collection, id: &str, document: &Value) -> StorageResult<Record> {
        let data = serde_json::to_string(document)?;
        let stamp = self.with_inner(|inner| {
            let stamp = inner.next_stamp();
            match db_insert(&inner.conn, collection, id, &data, stamp) {
                Ok(()) => Ok(stamp),
                Err(err) if is_constraint_violation(&err) => Err(StorageError::DuplicateId {
                    collection,
                    id: id.to_string(),
                }),
                Err(err) => Err(err.into()),
            }
        })?;

        Ok(Record {
            id: id.to_string(),
            document: document.clone(),
            created_at: micros_to_datetime(stamp),
            updated_at: micros_to_datetime(stamp),
        })
    }

    fn replace(
        &self,
        collection: Collection,
        id: &str,
        document: &Value,
    ) -> StorageResult<Record> {
        let data = serde_json::to_string(document)?;
        let (created_at, stamp) = self.with_inner(|inner| {
            let stamp = inner.next_stamp();
            match db_replace(&inner.conn, collection, id, &data, stamp)? {
                Some(created_at) => Ok((created_at, stamp)),
                None => Err(StorageError::NotFound {
                    collection,
                    id: id.to_string(),
                }),
            }
        })?;

        Ok(Record {
            id: id.to_string(),
            document: document.clone(),
            created_at: micros_to_datetime(created_at),
            updated_at: micros_to_datetime(stamp),
        })
    }

    fn remove(&self, collection: Collection, id: &str) -> StorageResult<()> {
        let removed = self.with_inner(|inner| Ok(db_remove(&inner.conn, collection, id)?))?;
        if removed == 0 {
            return Err(StorageError::NotFound {
                collection,
                id: id.to_string(),
            });
        }
        Ok(())
    }

    fn close(&self) -> StorageResult<()> {
        let Some(inner) = self.inner.lock().take() else {
            return Ok(());
        };
        inner
            .conn
            .close()
            .map_err(|(_conn, err)| StorageError::StorageUnavailable(err))
    }
}
