//! Runs the shared conformance cases against every backend.

use linkgraph_storage::graphtest::run_suite;
use linkgraph_storage::{Backend, GraphConfig, InMemoryGraph, SqliteGraph, SqliteOptions};
use tempfile::TempDir;

fn sqlite_with(options: SqliteOptions) -> (SqliteGraph, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let store = SqliteGraph::open_with(dir.path().join("graph.db"), options).unwrap();
    (store, dir)
}

#[test]
fn in_memory_backend() {
    run_suite(|| (InMemoryGraph::new(), ()));
}

#[test]
fn sqlite_backend() {
    run_suite(|| sqlite_with(SqliteOptions::default()));
}

#[test]
fn sqlite_backend_single_row_batches() {
    run_suite(|| {
        sqlite_with(SqliteOptions {
            cursor_batch_size: 1,
            ..SqliteOptions::default()
        })
    });
}

#[test]
fn configured_backends() {
    run_suite(|| (GraphConfig::default().open().unwrap(), ()));

    run_suite(|| {
        let dir = tempfile::tempdir().unwrap();
        let config = GraphConfig {
            backend: Backend::Sqlite {
                path: dir.path().join("graph.db"),
            },
            cursor_batch_size: 2,
            ..GraphConfig::default()
        };
        (config.open().unwrap(), dir)
    });
}
