//! Storage abstraction for the link graph.
//!
//! Provides the [`GraphStore`] trait defining the storage contract that all
//! backends implement, plus [`InMemoryGraph`] and [`SqliteGraph`] as
//! first-class backends. Callers depend only on the trait; [`GraphConfig`]
//! picks the backend at construction time.
//!
//! # Modules
//!
//! - [`error`]: StorageError and the backend-agnostic error kinds
//! - [`cursor`]: the forward-only cursor protocol used by range queries
//! - [`traits`]: GraphStore trait definition
//! - [`memory`]: InMemoryGraph implementation
//! - [`schema`]: SQL migrations and connection setup for the SQLite backend
//! - [`sqlite`]: SqliteGraph implementation
//! - [`config`]: backend selection
//! - [`graphtest`]: conformance cases every backend must pass

pub mod config;
pub mod cursor;
pub mod error;
pub mod graphtest;
pub mod memory;
pub mod schema;
pub mod sqlite;
pub mod traits;

// Re-export key types for ergonomic use.
pub use config::{Backend, GraphConfig};
pub use cursor::{Cursor, CursorExt, EdgeIterator, LinkIterator, SnapshotCursor};
pub use error::{ErrorKind, StorageError};
pub use memory::InMemoryGraph;
pub use sqlite::{SqliteGraph, SqliteOptions};
pub use traits::GraphStore;
