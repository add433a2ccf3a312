//! Durable local cache: records, per-scope pagination cursors and change
//! notifications.

pub mod schema;

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::{params, Connection, OptionalExtension, Transaction};
use tokio::sync::broadcast;

use crate::error::{Result, SyncError};
use crate::types::Record;

/// Pagination cursor for one query scope. `next_page == None` means the
/// last remote page is already cached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageCursor {
    pub scope_key: String,
    pub prev_page: Option<u32>,
    pub next_page: Option<u32>,
}

impl PageCursor {
    /// Cursor after `page` has been stored.
    pub fn after_page(scope_key: impl Into<String>, page: u32, end_reached: bool) -> Self {
        Self {
            scope_key: scope_key.into(),
            prev_page: if page <= 1 { None } else { Some(page - 1) },
            next_page: if end_reached { None } else { Some(page + 1) },
        }
    }

    pub fn end_reached(&self) -> bool {
        self.next_page.is_none()
    }
}

/// Committed cache writes, for observers of a scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheChange {
    Scope(String),
    Cleared,
}

const CHANGE_CAPACITY: usize = 64;

/// SQLite-backed cache store.
///
/// Every multi-row write runs in one transaction, and the connection mutex
/// keeps readers from interleaving with a write in progress.
pub struct CacheStore {
    conn: Mutex<Connection>,
    changes: broadcast::Sender<CacheChange>,
}

impl CacheStore {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        Self::initialize(conn, true)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::initialize(Connection::open_in_memory()?, false)
    }

    fn initialize(mut conn: Connection, file_backed: bool) -> Result<Self> {
        schema::apply_pragmas(&conn, file_backed)?;
        schema::migrate(&mut conn)?;
        let (changes, _) = broadcast::channel(CHANGE_CAPACITY);
        Ok(Self {
            conn: Mutex::new(conn),
            changes,
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CacheChange> {
        self.changes.subscribe()
    }

    /// Records of a scope, newest first.
    pub fn records(&self, scope_key: &str, offset: usize, limit: usize) -> Result<Vec<Record>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare_cached(
            "SELECT r.id, r.timestamp, r.classification, r.measurement
             FROM cache_rows r
             JOIN scope_rows s ON s.record_id = r.id
             WHERE s.scope_key = ?1
             ORDER BY r.sort_key DESC, r.id DESC
             LIMIT ?2 OFFSET ?3",
        )?;
        let rows = stmt.query_map(
            params![scope_key, limit as i64, offset as i64],
            row_to_record,
        )?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn record_count(&self, scope_key: &str) -> Result<usize> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM scope_rows WHERE scope_key = ?1",
            [scope_key],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    /// Rows across all scopes.
    pub fn total_records(&self) -> Result<usize> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM cache_rows", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    pub fn record(&self, id: i64) -> Result<Option<Record>> {
        let conn = self.lock()?;
        Ok(conn
            .query_row(
                "SELECT id, timestamp, classification, measurement FROM cache_rows WHERE id = ?1",
                [id],
                row_to_record,
            )
            .optional()?)
    }

    pub fn cursor(&self, scope_key: &str) -> Result<Option<PageCursor>> {
        let conn = self.lock()?;
        Ok(conn
            .query_row(
                "SELECT scope_key, prev_page, next_page FROM remote_keys WHERE scope_key = ?1",
                [scope_key],
                |row| {
                    Ok(PageCursor {
                        scope_key: row.get(0)?,
                        prev_page: row.get(1)?,
                        next_page: row.get(2)?,
                    })
                },
            )
            .optional()?)
    }

    /// Swap a scope's records and cursor for a fresh first page, as one unit.
    pub fn replace_scope(&self, cursor: &PageCursor, records: &[Record]) -> Result<()> {
        let scope = cursor.scope_key.as_str();
        self.write(scope, |tx| {
            tx.execute("DELETE FROM scope_rows WHERE scope_key = ?1", [scope])?;
            tx.execute("DELETE FROM remote_keys WHERE scope_key = ?1", [scope])?;
            insert_records(tx, scope, records)?;
            put_cursor(tx, cursor)?;
            prune_orphans(tx)
        })?;
        tracing::debug!(scope_key = scope, rows = records.len(), "cache scope replaced");
        Ok(())
    }

    /// Add the next page to a scope and advance its cursor, as one unit.
    pub fn append_page(&self, cursor: &PageCursor, records: &[Record]) -> Result<()> {
        let scope = cursor.scope_key.as_str();
        self.write(scope, |tx| {
            insert_records(tx, scope, records)?;
            put_cursor(tx, cursor)
        })?;
        tracing::debug!(scope_key = scope, rows = records.len(), "cache page appended");
        Ok(())
    }

    pub fn clear_scope(&self, scope_key: &str) -> Result<()> {
        self.write(scope_key, |tx| {
            tx.execute("DELETE FROM scope_rows WHERE scope_key = ?1", [scope_key])?;
            tx.execute("DELETE FROM remote_keys WHERE scope_key = ?1", [scope_key])?;
            prune_orphans(tx)
        })
    }

    /// Drop every record and cursor.
    pub fn clear_all(&self) -> Result<()> {
        {
            let mut conn = self.lock()?;
            let tx = conn.transaction()?;
            tx.execute_batch(
                "DELETE FROM scope_rows; DELETE FROM remote_keys; DELETE FROM cache_rows;",
            )?;
            tx.commit()?;
        }
        tracing::info!("cache cleared");
        let _ = self.changes.send(CacheChange::Cleared);
        Ok(())
    }

    fn write<F>(&self, scope_key: &str, apply: F) -> Result<()>
    where
        F: FnOnce(&Transaction<'_>) -> rusqlite::Result<()>,
    {
        {
            let mut conn = self.lock()?;
            let tx = conn.transaction()?;
            if let Err(err) = apply(&tx) {
                tracing::error!(scope_key, error = %err, "cache write rolled back");
                return Err(err.into());
            }
            tx.commit()?;
        }
        let _ = self.changes.send(CacheChange::Scope(scope_key.to_string()));
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| SyncError::Cache("cache connection lock poisoned".into()))
    }
}

impl std::fmt::Debug for CacheStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheStore").finish_non_exhaustive()
    }
}

fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<Record> {
    Ok(Record {
        id: row.get(0)?,
        timestamp: row.get(1)?,
        classification: row.get(2)?,
        measurement: row.get(3)?,
    })
}

/// Upsert rows (an existing id is overwritten, never duplicated) and record
/// their membership in `scope_key`.
fn insert_records(tx: &Transaction<'_>, scope_key: &str, records: &[Record]) -> rusqlite::Result<()> {
    let mut upsert = tx.prepare_cached(
        "INSERT INTO cache_rows (id, timestamp, classification, measurement, sort_key)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT (id) DO UPDATE SET
             timestamp = excluded.timestamp,
             classification = excluded.classification,
             measurement = excluded.measurement,
             sort_key = excluded.sort_key",
    )?;
    let mut member = tx.prepare_cached(
        "INSERT OR IGNORE INTO scope_rows (scope_key, record_id) VALUES (?1, ?2)",
    )?;
    for record in records {
        upsert.execute(params![
            record.id,
            record.timestamp,
            record.classification,
            record.measurement,
            record.sort_key()
        ])?;
        member.execute(params![scope_key, record.id])?;
    }
    Ok(())
}

fn put_cursor(tx: &Transaction<'_>, cursor: &PageCursor) -> rusqlite::Result<()> {
    tx.execute(
        "INSERT INTO remote_keys (scope_key, prev_page, next_page) VALUES (?1, ?2, ?3)
         ON CONFLICT (scope_key) DO UPDATE SET
             prev_page = excluded.prev_page,
             next_page = excluded.next_page",
        params![cursor.scope_key, cursor.prev_page, cursor.next_page],
    )?;
    Ok(())
}

fn prune_orphans(tx: &Transaction<'_>) -> rusqlite::Result<()> {
    tx.execute(
        "DELETE FROM cache_rows WHERE id NOT IN (SELECT record_id FROM scope_rows)",
        [],
    )?;
    Ok(())
}
