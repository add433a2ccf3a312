//! Schema migrations, tracked with `PRAGMA user_version`.

use rusqlite::Connection;

/// Ordered migrations; entry `n` moves the schema from version `n` to `n + 1`.
const MIGRATIONS: &[&str] = &[
    // v1: records, per-scope cursors and scope membership.
    "
    CREATE TABLE IF NOT EXISTS cache_rows (
        id INTEGER PRIMARY KEY,
        timestamp TEXT NOT NULL,
        classification TEXT NOT NULL,
        measurement REAL
    );
    CREATE INDEX IF NOT EXISTS idx_cache_rows_order
        ON cache_rows (timestamp DESC, id DESC);

    CREATE TABLE IF NOT EXISTS remote_keys (
        scope_key TEXT PRIMARY KEY,
        prev_page INTEGER,
        next_page INTEGER
    );

    CREATE TABLE IF NOT EXISTS scope_rows (
        scope_key TEXT NOT NULL,
        record_id INTEGER NOT NULL REFERENCES cache_rows (id) ON DELETE CASCADE,
        PRIMARY KEY (scope_key, record_id)
    );
    CREATE INDEX IF NOT EXISTS idx_scope_rows_record ON scope_rows (record_id);
    ",
    // v2: order by UTC instant. Older rows carry no key, so the cache is
    // emptied and refills from the service.
    "
    DELETE FROM scope_rows;
    DELETE FROM remote_keys;
    DELETE FROM cache_rows;
    ALTER TABLE cache_rows ADD COLUMN sort_key INTEGER NOT NULL DEFAULT 0;
    DROP INDEX IF EXISTS idx_cache_rows_order;
    CREATE INDEX idx_cache_rows_sort ON cache_rows (sort_key DESC, id DESC);
    ",
];

pub const SCHEMA_VERSION: u32 = MIGRATIONS.len() as u32;

/// Connection settings for every cache connection.
pub fn apply_pragmas(conn: &Connection, file_backed: bool) -> rusqlite::Result<()> {
    if file_backed {
        let mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        tracing::debug!(journal_mode = %mode, "cache journal mode");
        conn.pragma_update(None, "synchronous", "NORMAL")?;
    }
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.busy_timeout(std::time::Duration::from_secs(5))?;
    Ok(())
}

pub fn current_version(conn: &Connection) -> rusqlite::Result<u32> {
    conn.pragma_query_value(None, "user_version", |row| row.get(0))
}

/// Bring the schema up to [`SCHEMA_VERSION`]. Each step commits with its
/// version bump.
pub fn migrate(conn: &mut Connection) -> rusqlite::Result<()> {
    let mut version = current_version(conn)?;
    while (version as usize) < MIGRATIONS.len() {
        let tx = conn.transaction()?;
        tx.execute_batch(MIGRATIONS[version as usize])?;
        tx.pragma_update(None, "user_version", version + 1)?;
        tx.commit()?;
        version += 1;
        tracing::info!(version, "cache schema migrated");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrate_is_idempotent() {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate(&mut conn).unwrap();
        migrate(&mut conn).unwrap();
        assert_eq!(current_version(&conn).unwrap(), SCHEMA_VERSION);

        let tables: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table'
                 AND name IN ('cache_rows', 'remote_keys', 'scope_rows')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(tables, 3);
    }

    #[test]
    fn v1_cache_is_emptied_on_upgrade() {
        let mut conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(MIGRATIONS[0]).unwrap();
        conn.pragma_update(None, "user_version", 1).unwrap();
        conn.execute(
            "INSERT INTO cache_rows (id, timestamp, classification) VALUES (1, '2024-05-01T10:00:00Z', 'Normal')",
            [],
        )
        .unwrap();

        migrate(&mut conn).unwrap();

        let rows: i64 = conn
            .query_row("SELECT COUNT(*) FROM cache_rows", [], |row| row.get(0))
            .unwrap();
        assert_eq!(rows, 0);
        conn.execute(
            "INSERT INTO cache_rows (id, timestamp, classification, sort_key) VALUES (1, 't', 'Normal', 7)",
            [],
        )
        .unwrap();
    }
}
