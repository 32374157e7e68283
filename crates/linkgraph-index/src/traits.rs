//! The [`Indexer`] contract and its search-result cursor.

use linkgraph_core::LinkId;

use crate::document::{Document, Query};
use crate::error::IndexError;

/// Full-text indexer for link documents.
///
/// Like the graph store, one instance is shared by concurrent callers and
/// brings its own synchronization.
pub trait Indexer: Send + Sync {
    /// Inserts or replaces a document, keyed by its link ID.
    ///
    /// Sets `doc.indexed_at`. An existing `page_rank` survives re-indexing
    /// and is copied back into `doc`. Fails with `MissingLinkId` when the
    /// document has a nil link ID.
    fn index(&self, doc: &mut Document) -> Result<(), IndexError>;

    /// Looks up a document by link ID. Fails with `NotFound` when absent.
    fn find_by_id(&self, id: LinkId) -> Result<Document, IndexError>;

    /// Runs a query, returning a cursor over the ranked results.
    fn search(&self, query: &Query) -> Result<DocIterator, IndexError>;

    /// Sets the `page_rank` of a document.
    ///
    /// When no document exists yet a placeholder carrying only the ID and
    /// score is created; a later `index` call fills it in.
    fn update_score(&self, id: LinkId, score: f64) -> Result<(), IndexError>;
}

/// A forward-only cursor over search results.
///
/// Follows the same protocol as the graph store cursors: `advance` returns
/// `false` once exhausted or failed, `error` tells the two apart, and
/// `close` is idempotent.
pub trait SearchCursor: Send {
    /// Moves to the next document. Returns `false` when exhausted or on error.
    fn advance(&mut self) -> bool;

    /// The error that stopped iteration, if any.
    fn error(&self) -> Option<&IndexError>;

    /// A copy of the current document.
    fn document(&self) -> Option<Document>;

    /// Number of matching documents, ignoring the query offset.
    fn total_count(&self) -> u64;

    /// Releases backend resources. Safe to call repeatedly.
    fn close(&mut self) -> Result<(), IndexError>;
}

/// Cursor returned by [`Indexer::search`].
pub type DocIterator = Box<dyn SearchCursor>;
