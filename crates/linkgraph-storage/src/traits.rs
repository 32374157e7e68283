//! The [`GraphStore`] trait defining the storage contract for the link graph.
//!
//! All backends (InMemoryGraph, SqliteGraph, etc.) implement this trait and
//! must pass the [`graphtest`](crate::graphtest) cases unmodified, so they
//! are fully swappable without changing caller logic.
//!
//! The trait takes `&self` everywhere and requires `Send + Sync`: one store
//! instance is shared by many concurrent callers, and each backend brings
//! its own synchronization.

use chrono::{DateTime, Utc};

use linkgraph_core::{Edge, Link, LinkId};

use crate::cursor::{EdgeIterator, LinkIterator};
use crate::error::StorageError;

/// The storage contract for the link graph.
///
/// The store is the sole authority for ID assignment and timestamp
/// normalization. It never retries internally; retry policy belongs to the
/// caller.
pub trait GraphStore: Send + Sync {
    // -------------------------------------------------------------------
    // Links
    // -------------------------------------------------------------------

    /// Inserts a link, or merges it into the existing link with the same URL.
    ///
    /// On a merge the stored `retrieved_at` becomes the later of the stored
    /// and incoming values. On success `link` carries the assigned ID and the
    /// stored, normalized `retrieved_at`.
    fn upsert_link(&self, link: &mut Link) -> Result<(), StorageError>;

    /// Looks up a link by ID. Fails with `NotFound` when absent.
    fn find_link(&self, id: LinkId) -> Result<Link, StorageError>;

    // -------------------------------------------------------------------
    // Edges
    // -------------------------------------------------------------------

    /// Inserts an edge, or refreshes the existing edge with the same
    /// `(src, dst)` pair.
    ///
    /// `updated_at` is set to the current time and the edge ID is preserved on
    /// refresh. Fails with `UnknownEdgeLinks` when either endpoint is missing;
    /// no edge is created in that case.
    fn upsert_edge(&self, edge: &mut Edge) -> Result<(), StorageError>;

    /// Deletes every edge whose source is `from` and whose `updated_at` is
    /// strictly before `updated_before`, atomically.
    ///
    /// Returns the number of edges removed; zero is not an error.
    fn remove_stale_edges(
        &self,
        from: LinkId,
        updated_before: DateTime<Utc>,
    ) -> Result<usize, StorageError>;

    // -------------------------------------------------------------------
    // Range queries
    // -------------------------------------------------------------------

    /// Streams links with ID in `[from, to)` and `retrieved_at` strictly
    /// before `retrieved_before`, in ascending ID order.
    fn links(
        &self,
        from: LinkId,
        to: LinkId,
        retrieved_before: DateTime<Utc>,
    ) -> Result<LinkIterator, StorageError>;

    /// Streams edges whose source ID is in `[from, to)` and whose
    /// `updated_at` is strictly before `updated_before`, in ascending edge ID
    /// order.
    fn edges(
        &self,
        from: LinkId,
        to: LinkId,
        updated_before: DateTime<Utc>,
    ) -> Result<EdgeIterator, StorageError>;
}

impl<G: GraphStore + ?Sized> GraphStore for Box<G> {
    fn upsert_link(&self, link: &mut Link) -> Result<(), StorageError> {
        (**self).upsert_link(link)
    }

    fn find_link(&self, id: LinkId) -> Result<Link, StorageError> {
        (**self).find_link(id)
    }

    fn upsert_edge(&self, edge: &mut Edge) -> Result<(), StorageError> {
        (**self).upsert_edge(edge)
    }

    fn remove_stale_edges(
        &self,
        from: LinkId,
        updated_before: DateTime<Utc>,
    ) -> Result<usize, StorageError> {
        (**self).remove_stale_edges(from, updated_before)
    }

    fn links(
        &self,
        from: LinkId,
        to: LinkId,
        retrieved_before: DateTime<Utc>,
    ) -> Result<LinkIterator, StorageError> {
        (**self).links(from, to, retrieved_before)
    }

    fn edges(
        &self,
        from: LinkId,
        to: LinkId,
        updated_before: DateTime<Utc>,
    ) -> Result<EdgeIterator, StorageError> {
        (**self).edges(from, to, updated_before)
    }
}
