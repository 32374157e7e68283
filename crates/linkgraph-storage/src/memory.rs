//! In-memory implementation of [`GraphStore`].
//!
//! [`InMemoryGraph`] is a first-class backend for tests, short-lived crawls,
//! and anywhere persistence isn't needed. It has identical observable
//! semantics to the SQLite backend.
//!
//! One `RwLock` guards both maps and both secondary indexes. Mutations take
//! the write lock; lookups and cursor construction take the read lock. Range
//! cursors copy their matches out under the read lock, so no lock is held
//! while a caller iterates.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use linkgraph_core::{time, Edge, EdgeId, Link, LinkId};

use crate::cursor::{EdgeIterator, LinkIterator, SnapshotCursor};
use crate::error::StorageError;
use crate::traits::GraphStore;

/// Everything guarded by the store lock.
#[derive(Debug, Default)]
struct GraphState {
    /// Links indexed by LinkId, kept in ID order for range scans
    links: BTreeMap<LinkId, Link>,
    /// Edges indexed by EdgeId
    edges: BTreeMap<EdgeId, Edge>,
    /// URL -> LinkId (enforces URL uniqueness)
    url_index: HashMap<String, LinkId>,
    /// (src, dst) -> EdgeId (enforces pair uniqueness)
    pair_index: HashMap<(LinkId, LinkId), EdgeId>,
    /// (src, EdgeId), ordered by source for range scans and pruning
    source_index: BTreeSet<(LinkId, EdgeId)>,
}

impl GraphState {
    fn fresh_link_id(&self) -> LinkId {
        let mut id = LinkId::new_v4();
        while self.links.contains_key(&id) {
            id = LinkId::new_v4();
        }
        id
    }

    fn fresh_edge_id(&self) -> EdgeId {
        let mut id = EdgeId::new_v4();
        while self.edges.contains_key(&id) {
            id = EdgeId::new_v4();
        }
        id
    }
}

/// In-memory graph store.
///
/// Data lives in `BTreeMap`s keyed by ID, plus hash indexes from URL and
/// from `(src, dst)` that make both uniqueness checks O(1).
#[derive(Debug, Default)]
pub struct InMemoryGraph {
    state: RwLock<GraphState>,
}

impl InMemoryGraph {
    /// Creates a new, empty in-memory store.
    pub fn new() -> Self {
        InMemoryGraph::default()
    }

    /// Number of stored links.
    pub fn link_count(&self) -> usize {
        self.read().links.len()
    }

    /// Number of stored edges.
    pub fn edge_count(&self) -> usize {
        self.read().edges.len()
    }

    // -----------------------------------------------------------------------
    // Lock helpers
    // -----------------------------------------------------------------------

    // A panic can't leave the maps half-updated (every mutation is a handful
    // of infallible inserts), so a poisoned lock is safe to reuse.

    fn read(&self) -> RwLockReadGuard<'_, GraphState> {
        match self.state.read() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("in-memory graph lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, GraphState> {
        match self.state.write() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("in-memory graph lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }
}

impl GraphStore for InMemoryGraph {
    // -------------------------------------------------------------------
    // Links
    // -------------------------------------------------------------------

    fn upsert_link(&self, link: &mut Link) -> Result<(), StorageError> {
        let retrieved_at = time::normalize(link.retrieved_at);
        let mut guard = self.write();
        let state = &mut *guard;

        let existing = state.url_index.get(&link.url).copied();
        if let Some(stored) = existing.and_then(|id| state.links.get_mut(&id)) {
            if retrieved_at > stored.retrieved_at {
                stored.retrieved_at = retrieved_at;
            }
            *link = stored.clone();
            debug!(id = %link.id, url = %link.url, "merged link");
            return Ok(());
        }

        let id = state.fresh_link_id();
        let stored = Link {
            id,
            url: link.url.clone(),
            retrieved_at,
        };
        state.url_index.insert(stored.url.clone(), id);
        state.links.insert(id, stored.clone());
        *link = stored;
        debug!(id = %link.id, url = %link.url, "inserted link");
        Ok(())
    }

    fn find_link(&self, id: LinkId) -> Result<Link, StorageError> {
        self.read()
            .links
            .get(&id)
            .cloned()
            .ok_or(StorageError::NotFound { id })
    }

    // -------------------------------------------------------------------
    // Edges
    // -------------------------------------------------------------------

    fn upsert_edge(&self, edge: &mut Edge) -> Result<(), StorageError> {
        let mut guard = self.write();
        let state = &mut *guard;

        if !state.links.contains_key(&edge.src) || !state.links.contains_key(&edge.dst) {
            return Err(StorageError::UnknownEdgeLinks {
                src: edge.src,
                dst: edge.dst,
            });
        }

        let now = time::now();
        let existing = state.pair_index.get(&(edge.src, edge.dst)).copied();
        if let Some(stored) = existing.and_then(|id| state.edges.get_mut(&id)) {
            if now > stored.updated_at {
                stored.updated_at = now;
            }
            *edge = stored.clone();
            debug!(id = %edge.id, src = %edge.src, dst = %edge.dst, "refreshed edge");
            return Ok(());
        }

        let id = state.fresh_edge_id();
        let stored = Edge {
            id,
            src: edge.src,
            dst: edge.dst,
            updated_at: now,
        };
        state.pair_index.insert((stored.src, stored.dst), id);
        state.source_index.insert((stored.src, id));
        state.edges.insert(id, stored.clone());
        *edge = stored;
        debug!(id = %edge.id, src = %edge.src, dst = %edge.dst, "inserted edge");
        Ok(())
    }

    fn remove_stale_edges(
        &self,
        from: LinkId,
        updated_before: DateTime<Utc>,
    ) -> Result<usize, StorageError> {
        let updated_before = time::normalize(updated_before);
        let mut guard = self.write();
        let state = &mut *guard;

        let stale: Vec<EdgeId> = state
            .source_index
            .range((from, EdgeId::NIL)..)
            .take_while(|(src, _)| *src == from)
            .filter_map(|(_, id)| state.edges.get(id))
            .filter(|e| e.updated_at < updated_before)
            .map(|e| e.id)
            .collect();

        for id in &stale {
            if let Some(edge) = state.edges.remove(id) {
                state.pair_index.remove(&(edge.src, edge.dst));
                state.source_index.remove(&(edge.src, edge.id));
            }
        }

        debug!(src = %from, removed = stale.len(), "removed stale edges");
        Ok(stale.len())
    }

    // -------------------------------------------------------------------
    // Range queries
    // -------------------------------------------------------------------

    fn links(
        &self,
        from: LinkId,
        to: LinkId,
        retrieved_before: DateTime<Utc>,
    ) -> Result<LinkIterator, StorageError> {
        if from >= to {
            return Ok(Box::new(SnapshotCursor::new(Vec::new())));
        }

        let retrieved_before = time::normalize(retrieved_before);
        let snapshot: Vec<Link> = self
            .read()
            .links
            .range(from..to)
            .map(|(_, link)| link)
            .filter(|link| link.retrieved_at < retrieved_before)
            .cloned()
            .collect();
        Ok(Box::new(SnapshotCursor::new(snapshot)))
    }

    fn edges(
        &self,
        from: LinkId,
        to: LinkId,
        updated_before: DateTime<Utc>,
    ) -> Result<EdgeIterator, StorageError> {
        if from >= to {
            return Ok(Box::new(SnapshotCursor::new(Vec::new())));
        }

        let updated_before = time::normalize(updated_before);
        let state = self.read();
        let mut snapshot: Vec<Edge> = state
            .source_index
            .range((from, EdgeId::NIL)..(to, EdgeId::NIL))
            .filter_map(|(_, id)| state.edges.get(id))
            .filter(|e| e.updated_at < updated_before)
            .cloned()
            .collect();
        drop(state);
        // Sources are walked in order; results are yielded by edge ID.
        snapshot.sort_unstable_by_key(|e| e.id);
        Ok(Box::new(SnapshotCursor::new(snapshot)))
    }
}
