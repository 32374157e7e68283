//! SQL schema migrations and connection setup for the SQLite backend.
//!
//! Uses `rusqlite_migration` to manage schema migrations via SQLite's
//! `user_version` pragma. Migrations are embedded at compile time via
//! `include_str!`.
//!
//! IDs are stored as 16-byte BLOBs, which SQLite compares with `memcmp`: the
//! same byte-lexicographic order `LinkId` uses. Timestamps are stored as
//! microseconds since the Unix epoch.

use std::path::Path;
use std::time::Duration;

use rusqlite::Connection;
use rusqlite_migration::{Migrations, M};
use tracing::info;

use crate::error::StorageError;

/// All schema migrations, applied in order via `user_version` tracking.
fn migrations() -> Migrations<'static> {
    Migrations::new(vec![
        M::up(include_str!("migrations/001_initial_schema.sql")),
        // Future migrations added here as new M::up(...) entries.
    ])
}

/// Opens (or creates) the database at `path` with WAL mode, foreign keys,
/// and all pending migrations applied. This is the writer connection.
pub fn open_database(path: &Path, busy_timeout: Duration) -> Result<Connection, StorageError> {
    let mut conn =
        Connection::open(path).map_err(|e| StorageError::io("open database", e))?;
    configure(&conn, busy_timeout).map_err(|e| StorageError::io("configure database", e))?;

    // Apply pending migrations.
    migrations()
        .to_latest(&mut conn)
        .map_err(|e| StorageError::io("migrate schema", e.to_string()))?;

    info!(path = %path.display(), "opened link graph database");
    Ok(conn)
}

/// Opens an additional read-only connection to an already migrated database.
///
/// Range cursors each own one of these so they can hold a read transaction
/// without blocking the writer.
pub fn open_reader(path: &Path, busy_timeout: Duration) -> Result<Connection, StorageError> {
    let conn = Connection::open(path).map_err(|e| StorageError::io("open reader", e))?;
    conn.busy_timeout(busy_timeout)
        .map_err(|e| StorageError::io("configure reader", e))?;
    conn.pragma_update(None, "query_only", "ON")
        .map_err(|e| StorageError::io("configure reader", e))?;
    Ok(conn)
}

/// Configures pragmas on the writer connection.
fn configure(conn: &Connection, busy_timeout: Duration) -> rusqlite::Result<()> {
    // WAL lets cursor readers keep a snapshot while the writer commits.
    conn.pragma_update(None, "journal_mode", "WAL")?;
    // NORMAL synchronous is safe with WAL mode and provides better performance.
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    // Enable foreign key enforcement (off by default in SQLite).
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.busy_timeout(busy_timeout)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_are_valid() {
        assert!(migrations().validate().is_ok());
    }

    #[test]
    fn open_database_creates_tables() {
        let dir = tempfile::tempdir().unwrap();
        let conn = open_database(&dir.path().join("graph.db"), Duration::from_secs(1)).unwrap();

        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert!(tables.contains(&"links".to_string()));
        assert!(tables.contains(&"edges".to_string()));

        let fk: i64 = conn
            .pragma_query_value(None, "foreign_keys", |row| row.get(0))
            .unwrap();
        assert_eq!(fk, 1);
    }

    #[test]
    fn reopening_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("graph.db");
        drop(open_database(&path, Duration::from_secs(1)).unwrap());
        assert!(open_database(&path, Duration::from_secs(1)).is_ok());
    }

    #[test]
    fn reader_rejects_writes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("graph.db");
        let _writer = open_database(&path, Duration::from_secs(1)).unwrap();
        let reader = open_reader(&path, Duration::from_secs(1)).unwrap();
        let res = reader.execute("DELETE FROM links", []);
        assert!(res.is_err());
    }
}
