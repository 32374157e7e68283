//! Text-indexing collaborator for the link graph.
//!
//! Documents derived from crawled links are indexed for full-text search and
//! ranked by a score the link-analysis side pushes back with
//! [`Indexer::update_score`]. The graph store never depends on this crate;
//! only the [`Indexer`] contract is shared with callers.
//!
//! # Modules
//!
//! - [`error`]: IndexError
//! - [`document`]: Document, Query, QueryType
//! - [`traits`]: Indexer trait and the search-result cursor
//! - [`memory`]: InMemoryIndex implementation

pub mod document;
pub mod error;
pub mod memory;
pub mod traits;

pub use document::{Document, Query, QueryType};
pub use error::IndexError;
pub use memory::InMemoryIndex;
pub use traits::{DocIterator, Indexer, SearchCursor};
