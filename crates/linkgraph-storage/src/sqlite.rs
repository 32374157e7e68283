//! SQLite implementation of [`GraphStore`].
//!
//! [`SqliteGraph`] persists the link graph in a SQLite database with WAL mode,
//! foreign keys, and automatic schema migrations. Every contract operation
//! is a single statement, so a failed call leaves no partial state behind.
//!
//! Point operations share one writer connection behind a `Mutex`. Range
//! cursors open their own reader connection, pin a snapshot with a read
//! transaction, and pull rows lazily in keyset-paginated batches.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use linkgraph_core::{time, Edge, EdgeId, Link, LinkId};

use crate::cursor::{Cursor, EdgeIterator, LinkIterator};
use crate::error::StorageError;
use crate::schema;
use crate::traits::GraphStore;

const UPSERT_LINK: &str = "
INSERT INTO links (id, url, retrieved_at) VALUES (?1, ?2, ?3)
ON CONFLICT (url) DO UPDATE SET retrieved_at = MAX(links.retrieved_at, excluded.retrieved_at)
RETURNING id, retrieved_at";

const FIND_LINK: &str = "SELECT url, retrieved_at FROM links WHERE id = ?1";

const UPSERT_EDGE: &str = "
INSERT INTO edges (id, src, dst, updated_at) VALUES (?1, ?2, ?3, ?4)
ON CONFLICT (src, dst) DO UPDATE SET updated_at = MAX(edges.updated_at, excluded.updated_at)
RETURNING id, updated_at";

const REMOVE_STALE_EDGES: &str = "DELETE FROM edges WHERE src = ?1 AND updated_at < ?2";

/// Tuning knobs for [`SqliteGraph`].
#[derive(Debug, Clone)]
pub struct SqliteOptions {
    /// How long a connection waits on a locked database before failing.
    pub busy_timeout: Duration,
    /// Rows fetched per round trip by range cursors.
    pub cursor_batch_size: usize,
}

impl Default for SqliteOptions {
    fn default() -> Self {
        SqliteOptions {
            busy_timeout: Duration::from_secs(5),
            cursor_batch_size: 256,
        }
    }
}

/// SQLite-backed implementation of [`GraphStore`].
///
/// The database must be file-backed: each range cursor opens its own
/// connection to the same file.
pub struct SqliteGraph {
    conn: Mutex<Connection>,
    path: PathBuf,
    options: SqliteOptions,
}

impl SqliteGraph {
    /// Opens (or creates) a SQLite database at `path` with default options.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        SqliteGraph::open_with(path, SqliteOptions::default())
    }

    /// Opens (or creates) a SQLite database at `path`.
    ///
    /// Fails for `:memory:`, the empty path, and `file:` URIs: range cursors
    /// reopen the database by path, which only works for a plain file.
    pub fn open_with(path: impl AsRef<Path>, options: SqliteOptions) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();
        if !is_plain_file_path(&path) {
            return Err(StorageError::io(
                "open database",
                format!("{} is not a database file path", path.display()),
            ));
        }
        let conn = schema::open_database(&path, options.busy_timeout)?;
        Ok(SqliteGraph {
            conn: Mutex::new(conn),
            path,
            options,
        })
    }

    /// Path of the backing database file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Locks the writer connection, recovering from poisoning.
    ///
    /// Every statement is its own implicit transaction, so a panic while the
    /// lock was held can't leave uncommitted work on the connection.
    fn writer(&self) -> MutexGuard<'_, Connection> {
        match self.conn.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("sqlite writer mutex was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn reader(&self) -> Result<Connection, StorageError> {
        schema::open_reader(&self.path, self.options.busy_timeout)
    }
}

/// Whether `path` names an ordinary database file rather than an in-memory
/// or URI database.
fn is_plain_file_path(path: &Path) -> bool {
    match path.to_str() {
        Some(s) => !s.is_empty() && s != ":memory:" && !s.starts_with("file:"),
        None => !path.as_os_str().is_empty(),
    }
}

// ---------------------------------------------------------------------------
// Error translation
// ---------------------------------------------------------------------------

/// The contract operation a driver error came from.
#[derive(Debug, Clone, Copy)]
enum Op {
    UpsertLink,
    FindLink(LinkId),
    UpsertEdge { src: LinkId, dst: LinkId },
    RemoveStaleEdges,
    Links,
    Edges,
}

impl Op {
    fn name(self) -> &'static str {
        match self {
            Op::UpsertLink => "upsert link",
            Op::FindLink(_) => "find link",
            Op::UpsertEdge { .. } => "upsert edge",
            Op::RemoveStaleEdges => "remove stale edges",
            Op::Links => "links",
            Op::Edges => "edges",
        }
    }
}

/// Maps a driver error onto the storage error taxonomy.
///
/// This is the only place SQLite result codes are inspected.
fn translate(op: Op, err: rusqlite::Error) -> StorageError {
    match op {
        Op::FindLink(id) if matches!(err, rusqlite::Error::QueryReturnedNoRows) => {
            StorageError::NotFound { id }
        }
        Op::UpsertEdge { src, dst } if is_foreign_key_violation(&err) => {
            StorageError::UnknownEdgeLinks { src, dst }
        }
        _ => StorageError::io(op.name(), err),
    }
}

fn is_foreign_key_violation(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(e, _) => {
            e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY
        }
        _ => false,
    }
}

// ---------------------------------------------------------------------------
// Row mapping
// ---------------------------------------------------------------------------

/// Reads a microsecond timestamp column.
fn get_time(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let micros: i64 = row.get(idx)?;
    time::from_micros(micros).ok_or(rusqlite::Error::IntegralValueOutOfRange(idx, micros))
}

/// A row type a range cursor can page through.
trait RangeRow: Clone + Send + Sized + 'static {
    /// Parameters: `?1` lower bound, `?2` upper bound, `?3` time threshold,
    /// `?4` last row ID seen, `?5` batch size.
    const RANGE_SQL: &'static str;
    const OP: Op;

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self>;

    /// The keyset pagination key.
    fn key(&self) -> Uuid;
}

impl RangeRow for Link {
    const RANGE_SQL: &'static str = "
SELECT id, url, retrieved_at FROM links
WHERE id >= ?1 AND id < ?2 AND retrieved_at < ?3 AND id > ?4
ORDER BY id LIMIT ?5";
    const OP: Op = Op::Links;

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Link {
            id: LinkId(row.get(0)?),
            url: row.get(1)?,
            retrieved_at: get_time(row, 2)?,
        })
    }

    fn key(&self) -> Uuid {
        self.id.0
    }
}

impl RangeRow for Edge {
    const RANGE_SQL: &'static str = "
SELECT id, src, dst, updated_at FROM edges
WHERE src >= ?1 AND src < ?2 AND updated_at < ?3 AND id > ?4
ORDER BY id LIMIT ?5";
    const OP: Op = Op::Edges;

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Edge {
            id: EdgeId(row.get(0)?),
            src: LinkId(row.get(1)?),
            dst: LinkId(row.get(2)?),
            updated_at: get_time(row, 3)?,
        })
    }

    fn key(&self) -> Uuid {
        self.id.0
    }
}

// ---------------------------------------------------------------------------
// Range cursor
// ---------------------------------------------------------------------------

/// Lazily pages through a range query on a dedicated reader connection.
///
/// The reader holds a read transaction from creation until close, so every
/// batch sees the same snapshot even while the writer commits.
struct RowCursor<T> {
    conn: Option<Connection>,
    from: Uuid,
    to: Uuid,
    before: i64,
    last: Uuid,
    batch_size: usize,
    buffer: VecDeque<T>,
    drained: bool,
    current: Option<T>,
    finished: bool,
    err: Option<StorageError>,
}

impl<T: RangeRow> RowCursor<T> {
    fn open(
        conn: Connection,
        from: LinkId,
        to: LinkId,
        before: DateTime<Utc>,
        batch_size: usize,
    ) -> Result<Self, StorageError> {
        conn.execute_batch("BEGIN").map_err(|e| translate(T::OP, e))?;

        let mut cursor = RowCursor {
            conn: Some(conn),
            from: from.0,
            to: to.0,
            before: time::to_micros(time::normalize(before)),
            last: Uuid::nil(),
            batch_size: batch_size.max(1),
            buffer: VecDeque::new(),
            drained: false,
            current: None,
            finished: false,
            err: None,
        };
        // The first read pins the snapshot.
        cursor.fill()?;
        Ok(cursor)
    }

    /// Fetches the next batch into the buffer.
    fn fill(&mut self) -> Result<(), StorageError> {
        let Some(conn) = self.conn.as_ref() else {
            self.drained = true;
            return Ok(());
        };

        let batch: Vec<T> = conn
            .prepare_cached(T::RANGE_SQL)
            .and_then(|mut stmt| {
                let rows = stmt.query_map(
                    params![
                        self.from,
                        self.to,
                        self.before,
                        self.last,
                        self.batch_size as i64
                    ],
                    T::from_row,
                )?;
                rows.collect::<rusqlite::Result<Vec<T>>>()
            })
            .map_err(|e| translate(T::OP, e))?;

        if batch.len() < self.batch_size {
            self.drained = true;
        }
        if let Some(last) = batch.last() {
            self.last = last.key();
        }
        self.buffer.extend(batch);
        Ok(())
    }

    fn release(&mut self) -> Result<(), StorageError> {
        self.finished = true;
        self.current = None;
        self.buffer.clear();
        match self.conn.take() {
            Some(conn) => conn
                .execute_batch("COMMIT")
                .map_err(|e| translate(T::OP, e)),
            None => Ok(()),
        }
    }
}

impl<T: RangeRow> Cursor for RowCursor<T> {
    type Item = T;

    fn advance(&mut self) -> bool {
        if self.finished {
            return false;
        }
        if self.buffer.is_empty() && !self.drained {
            if let Err(e) = self.fill() {
                self.err = Some(e);
                self.current = None;
                self.finished = true;
                return false;
            }
        }
        match self.buffer.pop_front() {
            Some(item) => {
                self.current = Some(item);
                true
            }
            None => {
                self.current = None;
                self.finished = true;
                false
            }
        }
    }

    fn error(&self) -> Option<&StorageError> {
        self.err.as_ref()
    }

    fn take_error(&mut self) -> Option<StorageError> {
        self.err.take()
    }

    fn current(&self) -> Option<T> {
        self.current.clone()
    }

    fn close(&mut self) -> Result<(), StorageError> {
        self.release()
    }
}

impl<T> Drop for RowCursor<T> {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            if let Err(e) = conn.execute_batch("COMMIT") {
                debug!(error = %e, "closing abandoned cursor");
            }
        }
    }
}

// ---------------------------------------------------------------------------
// GraphStore implementation
// ---------------------------------------------------------------------------

impl GraphStore for SqliteGraph {
    #[instrument(skip(self, link), fields(url = %link.url))]
    fn upsert_link(&self, link: &mut Link) -> Result<(), StorageError> {
        let retrieved_at = time::to_micros(time::normalize(link.retrieved_at));
        let (id, retrieved_at) = self
            .writer()
            .prepare_cached(UPSERT_LINK)
            .and_then(|mut stmt| {
                stmt.query_row(params![Uuid::new_v4(), link.url, retrieved_at], |row| {
                    Ok((LinkId(row.get(0)?), get_time(row, 1)?))
                })
            })
            .map_err(|e| translate(Op::UpsertLink, e))?;

        link.id = id;
        link.retrieved_at = retrieved_at;
        debug!(id = %link.id, "upserted link");
        Ok(())
    }

    #[instrument(skip(self))]
    fn find_link(&self, id: LinkId) -> Result<Link, StorageError> {
        self.writer()
            .prepare_cached(FIND_LINK)
            .and_then(|mut stmt| {
                stmt.query_row(params![id.0], |row| {
                    Ok(Link {
                        id,
                        url: row.get(0)?,
                        retrieved_at: get_time(row, 1)?,
                    })
                })
            })
            .map_err(|e| translate(Op::FindLink(id), e))
    }

    #[instrument(skip(self, edge), fields(src = %edge.src, dst = %edge.dst))]
    fn upsert_edge(&self, edge: &mut Edge) -> Result<(), StorageError> {
        let op = Op::UpsertEdge {
            src: edge.src,
            dst: edge.dst,
        };
        let now = time::to_micros(time::now());
        let (id, updated_at) = self
            .writer()
            .prepare_cached(UPSERT_EDGE)
            .and_then(|mut stmt| {
                stmt.query_row(params![Uuid::new_v4(), edge.src.0, edge.dst.0, now], |row| {
                    Ok((EdgeId(row.get(0)?), get_time(row, 1)?))
                })
            })
            .map_err(|e| translate(op, e))?;

        edge.id = id;
        edge.updated_at = updated_at;
        debug!(id = %edge.id, "upserted edge");
        Ok(())
    }

    #[instrument(skip(self))]
    fn remove_stale_edges(
        &self,
        from: LinkId,
        updated_before: DateTime<Utc>,
    ) -> Result<usize, StorageError> {
        let before = time::to_micros(time::normalize(updated_before));
        let removed = self
            .writer()
            .execute(REMOVE_STALE_EDGES, params![from.0, before])
            .map_err(|e| translate(Op::RemoveStaleEdges, e))?;
        debug!(removed, "removed stale edges");
        Ok(removed)
    }

    #[instrument(skip(self))]
    fn links(
        &self,
        from: LinkId,
        to: LinkId,
        retrieved_before: DateTime<Utc>,
    ) -> Result<LinkIterator, StorageError> {
        let cursor = RowCursor::<Link>::open(
            self.reader()?,
            from,
            to,
            retrieved_before,
            self.options.cursor_batch_size,
        )?;
        Ok(Box::new(cursor))
    }

    #[instrument(skip(self))]
    fn edges(
        &self,
        from: LinkId,
        to: LinkId,
        updated_before: DateTime<Utc>,
    ) -> Result<EdgeIterator, StorageError> {
        let cursor = RowCursor::<Edge>::open(
            self.reader()?,
            from,
            to,
            updated_before,
            self.options.cursor_batch_size,
        )?;
        Ok(Box::new(cursor))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cursor::CursorExt;
    use crate::error::ErrorKind;
    use chrono::Duration as TimeDelta;
    use tempfile::TempDir;

    fn open_graph(batch: usize) -> (SqliteGraph, TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let options = SqliteOptions {
            cursor_batch_size: batch,
            ..SqliteOptions::default()
        };
        let graph = SqliteGraph::open_with(dir.path().join("graph.db"), options).unwrap();
        (graph, dir)
    }

    fn add_link(graph: &SqliteGraph, url: &str) -> Link {
        let mut link = Link::new(url, Utc::now() - TimeDelta::hours(1));
        graph.upsert_link(&mut link).unwrap();
        link
    }

    #[test]
    fn test_translate_missing_row_is_not_found() {
        let id = LinkId::new_v4();
        let err = translate(Op::FindLink(id), rusqlite::Error::QueryReturnedNoRows);
        assert!(matches!(err, StorageError::NotFound { id: got } if got == id));

        // Only lookups turn a missing row into NotFound.
        let err = translate(Op::UpsertLink, rusqlite::Error::QueryReturnedNoRows);
        assert_eq!(err.kind(), ErrorKind::Io);
    }

    #[test]
    fn test_foreign_key_violation_is_unknown_edge_links() {
        let (graph, _dir) = open_graph(16);
        let a = add_link(&graph, "https://a.example");

        let mut edge = Edge::new(a.id, LinkId::new_v4());
        let err = graph.upsert_edge(&mut edge).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownEdgeLinks);

        let count: i64 = graph
            .writer()
            .query_row("SELECT COUNT(*) FROM edges", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn test_data_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("graph.db");

        let id = {
            let graph = SqliteGraph::open(&path).unwrap();
            add_link(&graph, "https://a.example").id
        };

        let graph = SqliteGraph::open(&path).unwrap();
        let found = graph.find_link(id).unwrap();
        assert_eq!(found.url, "https://a.example");
    }

    #[test]
    fn test_cursor_pages_through_small_batches() {
        let (graph, _dir) = open_graph(2);
        let mut ids: Vec<LinkId> = (0..7)
            .map(|i| add_link(&graph, &format!("https://{i}.example")).id)
            .collect();
        ids.sort();

        let got: Vec<LinkId> = graph
            .links(LinkId::NIL, LinkId::MAX, Utc::now())
            .unwrap()
            .collect_items()
            .unwrap()
            .into_iter()
            .map(|l| l.id)
            .collect();
        assert_eq!(got, ids);
    }

    #[test]
    fn test_cursor_snapshot_spans_batches() {
        let (graph, _dir) = open_graph(1);
        for i in 0..3 {
            add_link(&graph, &format!("https://{i}.example"));
        }

        let mut cursor = graph.links(LinkId::NIL, LinkId::MAX, Utc::now()).unwrap();
        assert!(cursor.advance());

        // Writes after the cursor opened are invisible to it, even though
        // later batches are fetched after the writes commit.
        for i in 3..6 {
            add_link(&graph, &format!("https://{i}.example"));
        }

        let mut seen = 1;
        while cursor.advance() {
            seen += 1;
        }
        assert!(cursor.error().is_none());
        assert_eq!(seen, 3);
        cursor.close().unwrap();
    }

    #[test]
    fn test_abandoned_cursor_does_not_block_writer() {
        let (graph, _dir) = open_graph(1);
        add_link(&graph, "https://a.example");
        add_link(&graph, "https://b.example");

        {
            let mut cursor = graph.links(LinkId::NIL, LinkId::MAX, Utc::now()).unwrap();
            assert!(cursor.advance());
            // dropped without close
        }

        add_link(&graph, "https://c.example");
        let all = graph
            .links(LinkId::NIL, LinkId::MAX, Utc::now())
            .unwrap()
            .collect_items()
            .unwrap();
        assert_eq!(all.len(), 3);
    }

    #[test]
    fn test_open_in_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let res = SqliteGraph::open(dir.path().join("missing").join("graph.db"));
        assert_eq!(res.err().map(|e| e.kind()), Some(ErrorKind::Io));
    }

    #[test]
    fn test_non_file_paths_are_rejected() {
        for path in [":memory:", "", "file:graph.db?mode=memory"] {
            let res = SqliteGraph::open(path);
            assert_eq!(res.err().map(|e| e.kind()), Some(ErrorKind::Io), "{path:?}");
        }
    }

    #[test]
    fn test_fetch_failure_mid_iteration_is_reported() {
        let (graph, dir) = open_graph(1);
        for i in 0..3 {
            add_link(&graph, &format!("https://{i}.example"));
        }

        // A writable connection, so the table can vanish between batches.
        let path = dir.path().join("graph.db");
        let conn = schema::open_database(&path, Duration::from_secs(1)).unwrap();
        let mut cursor =
            RowCursor::<Link>::open(conn, LinkId::NIL, LinkId::MAX, Utc::now(), 1).unwrap();
        assert!(cursor.advance());
        assert!(cursor.error().is_none());

        cursor
            .conn
            .as_ref()
            .unwrap()
            .execute_batch("DROP TABLE links")
            .unwrap();

        assert!(!cursor.advance());
        assert_eq!(cursor.error().map(|e| e.kind()), Some(ErrorKind::Io));
        assert!(cursor.current().is_none());
        assert!(!cursor.advance());
        assert!(cursor.error().is_some());
    }
}
