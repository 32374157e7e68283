//! Conformance cases every [`GraphStore`] backend must pass unmodified.
//!
//! Each [`Case`] is a plain function over an injected store, so cases share
//! no state and can run against any backend. [`run_suite`] hands every case
//! a fresh store and reports all failures at once.
//!
//! ```ignore
//! linkgraph_storage::graphtest::run_suite(|| (InMemoryGraph::new(), ()));
//! ```

use std::collections::BTreeSet;
use std::panic::{self, AssertUnwindSafe};
use std::thread;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, error};
use uuid::Uuid;

use linkgraph_core::{time, Edge, EdgeId, Link, LinkId};

use crate::cursor::{Cursor, CursorExt};
use crate::error::ErrorKind;
use crate::traits::GraphStore;

/// A named conformance case.
#[derive(Clone, Copy)]
pub struct Case {
    pub name: &'static str,
    pub run: fn(&dyn GraphStore),
}

impl std::fmt::Debug for Case {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Case").field("name", &self.name).finish()
    }
}

static CASES: &[Case] = &[
    Case {
        name: "upsert_link_assigns_id",
        run: upsert_link_assigns_id,
    },
    Case {
        name: "upsert_link_keeps_latest_retrieval",
        run: upsert_link_keeps_latest_retrieval,
    },
    Case {
        name: "find_link_missing_is_not_found",
        run: find_link_missing_is_not_found,
    },
    Case {
        name: "upsert_edge_keeps_identity",
        run: upsert_edge_keeps_identity,
    },
    Case {
        name: "upsert_edge_rejects_unknown_links",
        run: upsert_edge_rejects_unknown_links,
    },
    Case {
        name: "remove_stale_edges_boundary",
        run: remove_stale_edges_boundary,
    },
    Case {
        name: "remove_stale_edges_scoped_to_source",
        run: remove_stale_edges_scoped_to_source,
    },
    Case {
        name: "links_range_is_half_open",
        run: links_range_is_half_open,
    },
    Case {
        name: "links_shards_cover_id_space",
        run: links_shards_cover_id_space,
    },
    Case {
        name: "links_filter_by_retrieval_time",
        run: links_filter_by_retrieval_time,
    },
    Case {
        name: "edges_filter_by_source_and_time",
        run: edges_filter_by_source_and_time,
    },
    Case {
        name: "cursor_exhaustion_is_sticky",
        run: cursor_exhaustion_is_sticky,
    },
    Case {
        name: "cursor_current_is_a_copy",
        run: cursor_current_is_a_copy,
    },
    Case {
        name: "concurrent_upserts_converge",
        run: concurrent_upserts_converge,
    },
    Case {
        name: "iteration_ignores_later_writes",
        run: iteration_ignores_later_writes,
    },
];

/// All conformance cases.
pub fn cases() -> &'static [Case] {
    CASES
}

/// Runs every case against a fresh store produced by `fresh`.
///
/// `fresh` returns the store plus a keep-alive value (a temp directory, for
/// instance) dropped after the store. Panics listing every failed case.
pub fn run_suite<G, K, F>(mut fresh: F)
where
    G: GraphStore,
    F: FnMut() -> (G, K),
{
    let mut failed = Vec::new();
    for case in cases() {
        let (store, keep_alive) = fresh();
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| (case.run)(&store)));
        drop(store);
        drop(keep_alive);

        match outcome {
            Ok(()) => debug!(case = case.name, "conformance case passed"),
            Err(_) => {
                error!(case = case.name, "conformance case failed");
                failed.push(case.name);
            }
        }
    }
    assert!(failed.is_empty(), "failed conformance cases: {failed:?}");
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn far_future() -> DateTime<Utc> {
    Utc::now() + Duration::days(1)
}

fn put_link(store: &dyn GraphStore, url: &str, retrieved_at: DateTime<Utc>) -> Link {
    let mut link = Link::new(url, retrieved_at);
    store.upsert_link(&mut link).expect("upsert link");
    link
}

fn put_edge(store: &dyn GraphStore, src: LinkId, dst: LinkId) -> Edge {
    let mut edge = Edge::new(src, dst);
    store.upsert_edge(&mut edge).expect("upsert edge");
    edge
}

fn link_ids(
    store: &dyn GraphStore,
    from: LinkId,
    to: LinkId,
    before: DateTime<Utc>,
) -> Vec<LinkId> {
    store
        .links(from, to, before)
        .expect("open link cursor")
        .collect_items()
        .expect("drain link cursor")
        .into_iter()
        .map(|l| l.id)
        .collect()
}

fn edge_ids(
    store: &dyn GraphStore,
    from: LinkId,
    to: LinkId,
    before: DateTime<Utc>,
) -> Vec<EdgeId> {
    store
        .edges(from, to, before)
        .expect("open edge cursor")
        .collect_items()
        .expect("drain edge cursor")
        .into_iter()
        .map(|e| e.id)
        .collect()
}

fn sorted_links(store: &dyn GraphStore, count: usize) -> Vec<LinkId> {
    let hour_ago = Utc::now() - Duration::hours(1);
    let mut ids: Vec<LinkId> = (0..count)
        .map(|i| put_link(store, &format!("https://example.com/{i}"), hour_ago).id)
        .collect();
    ids.sort();
    ids
}

// A few milliseconds is well above the stored microsecond resolution.
fn tick() {
    thread::sleep(StdDuration::from_millis(5));
}

// ---------------------------------------------------------------------------
// Links
// ---------------------------------------------------------------------------

fn upsert_link_assigns_id(store: &dyn GraphStore) {
    let now = Utc::now();
    let a = put_link(store, "https://example.com/a", now);
    let b = put_link(store, "https://example.com/b", now);

    assert!(!a.id.is_nil());
    assert!(!b.id.is_nil());
    assert_ne!(a.id, b.id);
    assert_eq!(a.retrieved_at, time::normalize(now));

    let found = store.find_link(a.id).expect("find link");
    assert_eq!(found, a);
}

fn upsert_link_keeps_latest_retrieval(store: &dyn GraphStore) {
    let base = Utc::now() - Duration::hours(2);
    let first = put_link(store, "https://example.com", base);

    // An older retrieval never moves the timestamp back.
    let older = put_link(store, "https://example.com", base - Duration::minutes(30));
    assert_eq!(older.id, first.id);
    assert_eq!(older.retrieved_at, time::normalize(base));

    // A newer one wins.
    let later = base + Duration::minutes(30);
    let newer = put_link(store, "https://example.com", later);
    assert_eq!(newer.id, first.id);
    assert_eq!(newer.retrieved_at, time::normalize(later));

    let found = store.find_link(first.id).expect("find link");
    assert_eq!(found.retrieved_at, time::normalize(later));
}

fn find_link_missing_is_not_found(store: &dyn GraphStore) {
    put_link(store, "https://example.com", Utc::now());
    let err = store
        .find_link(LinkId::new_v4())
        .expect_err("lookup of unknown id must fail");
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

// ---------------------------------------------------------------------------
// Edges
// ---------------------------------------------------------------------------

fn upsert_edge_keeps_identity(store: &dyn GraphStore) {
    let now = Utc::now();
    let a = put_link(store, "https://example.com/a", now);
    let b = put_link(store, "https://example.com/b", now);

    let first = put_edge(store, a.id, b.id);
    assert!(!first.id.is_nil());
    tick();
    let second = put_edge(store, a.id, b.id);

    assert_eq!(second.id, first.id);
    assert!(second.updated_at >= first.updated_at);
    assert_eq!(edge_ids(store, LinkId::NIL, LinkId::MAX, far_future()), vec![first.id]);
}

fn upsert_edge_rejects_unknown_links(store: &dyn GraphStore) {
    let known = put_link(store, "https://example.com", Utc::now());
    let unknown = LinkId::new_v4();

    for (src, dst) in [(unknown, known.id), (known.id, unknown)] {
        let mut edge = Edge::new(src, dst);
        let err = store
            .upsert_edge(&mut edge)
            .expect_err("edge to unknown link must fail");
        assert_eq!(err.kind(), ErrorKind::UnknownEdgeLinks);
    }

    assert!(edge_ids(store, LinkId::NIL, LinkId::MAX, far_future()).is_empty());
}

fn remove_stale_edges_boundary(store: &dyn GraphStore) {
    let now = Utc::now();
    let src = put_link(store, "https://example.com/src", now);
    let dsts: Vec<Link> = (0..3)
        .map(|i| put_link(store, &format!("https://example.com/dst/{i}"), now))
        .collect();

    let oldest = put_edge(store, src.id, dsts[0].id);
    tick();
    let middle = put_edge(store, src.id, dsts[1].id);
    tick();
    let newest = put_edge(store, src.id, dsts[2].id);
    assert!(oldest.updated_at < middle.updated_at);
    assert!(middle.updated_at < newest.updated_at);

    let removed = store
        .remove_stale_edges(src.id, middle.updated_at)
        .expect("remove stale edges");
    assert_eq!(removed, 1);

    let remaining: BTreeSet<EdgeId> = edge_ids(store, LinkId::NIL, LinkId::MAX, far_future())
        .into_iter()
        .collect();
    assert_eq!(remaining, BTreeSet::from([middle.id, newest.id]));
}

fn remove_stale_edges_scoped_to_source(store: &dyn GraphStore) {
    let now = Utc::now();
    let a = put_link(store, "https://example.com/a", now);
    let b = put_link(store, "https://example.com/b", now);

    put_edge(store, a.id, b.id);
    let kept = put_edge(store, b.id, a.id);

    let removed = store
        .remove_stale_edges(a.id, far_future())
        .expect("remove stale edges");
    assert_eq!(removed, 1);
    assert_eq!(edge_ids(store, LinkId::NIL, LinkId::MAX, far_future()), vec![kept.id]);

    // Nothing left to prune is not an error.
    assert_eq!(store.remove_stale_edges(a.id, far_future()).expect("no-op"), 0);
    assert_eq!(
        store.remove_stale_edges(LinkId::new_v4(), far_future()).expect("unknown source"),
        0
    );
}

// ---------------------------------------------------------------------------
// Range queries
// ---------------------------------------------------------------------------

fn links_range_is_half_open(store: &dyn GraphStore) {
    let ids = sorted_links(store, 5);

    assert_eq!(link_ids(store, ids[1], ids[3], Utc::now()), vec![ids[1], ids[2]]);
    assert_eq!(link_ids(store, LinkId::NIL, LinkId::MAX, Utc::now()), ids);
    assert!(link_ids(store, ids[2], ids[2], Utc::now()).is_empty());
}

fn links_shards_cover_id_space(store: &dyn GraphStore) {
    let ids = sorted_links(store, 20);

    let mut bounds = vec![LinkId::NIL];
    bounds.extend([0x40u8, 0x80, 0xc0].map(|b| {
        let mut bytes = [0u8; 16];
        bytes[0] = b;
        LinkId::from(Uuid::from_bytes(bytes))
    }));
    bounds.push(LinkId::MAX);

    let mut seen = Vec::new();
    for shard in bounds.windows(2) {
        let part = link_ids(store, shard[0], shard[1], Utc::now());
        assert!(part.iter().all(|id| *id >= shard[0] && *id < shard[1]));
        seen.extend(part);
    }
    // Shards arrive in ascending order, so concatenation must equal the full scan.
    assert_eq!(seen, ids);
}

fn links_filter_by_retrieval_time(store: &dyn GraphStore) {
    let now = Utc::now();
    let old = put_link(store, "https://example.com/old", now - Duration::hours(2));
    let recent = put_link(store, "https://example.com/recent", now - Duration::minutes(1));

    assert_eq!(link_ids(store, LinkId::NIL, LinkId::MAX, now - Duration::hours(1)), vec![old.id]);
    // The threshold is exclusive.
    assert!(link_ids(store, LinkId::NIL, LinkId::MAX, old.retrieved_at).is_empty());

    let both: BTreeSet<LinkId> = link_ids(store, LinkId::NIL, LinkId::MAX, now)
        .into_iter()
        .collect();
    assert_eq!(both, BTreeSet::from([old.id, recent.id]));
}

fn edges_filter_by_source_and_time(store: &dyn GraphStore) {
    let ids = sorted_links(store, 3);
    let before_edges = time::now();
    tick();

    let from_first = put_edge(store, ids[0], ids[1]);
    let from_second = put_edge(store, ids[1], ids[2]);
    let from_third = put_edge(store, ids[2], ids[0]);

    assert_eq!(edge_ids(store, ids[0], ids[1], far_future()), vec![from_first.id]);
    assert_eq!(edge_ids(store, ids[1], LinkId::MAX, far_future()).len(), 2);
    assert!(edge_ids(store, LinkId::NIL, LinkId::MAX, before_edges).is_empty());

    let mut all = vec![from_first.id, from_second.id, from_third.id];
    all.sort();
    assert_eq!(edge_ids(store, LinkId::NIL, LinkId::MAX, far_future()), all);
}

// ---------------------------------------------------------------------------
// Cursors
// ---------------------------------------------------------------------------

fn cursor_exhaustion_is_sticky(store: &dyn GraphStore) {
    sorted_links(store, 3);

    let mut cursor = store
        .links(LinkId::NIL, LinkId::MAX, Utc::now())
        .expect("open link cursor");
    assert!(cursor.current().is_none());

    let mut count = 0;
    while cursor.advance() {
        assert!(cursor.current().is_some());
        count += 1;
    }
    assert_eq!(count, 3);
    assert!(cursor.error().is_none());
    assert!(!cursor.advance());
    assert!(cursor.error().is_none());
    assert!(cursor.current().is_none());

    cursor.close().expect("close");
    cursor.close().expect("second close");

    let mut inverted = store
        .links(LinkId::MAX, LinkId::NIL, Utc::now())
        .expect("open inverted cursor");
    assert!(!inverted.advance());
    assert!(inverted.error().is_none());
    inverted.close().expect("close inverted");
}

fn cursor_current_is_a_copy(store: &dyn GraphStore) {
    let original = put_link(store, "https://example.com", Utc::now() - Duration::minutes(1));

    let mut cursor = store
        .links(LinkId::NIL, LinkId::MAX, Utc::now())
        .expect("open link cursor");
    assert!(cursor.advance());

    let mut copy = cursor.current().expect("current link");
    copy.url.push_str("/changed");
    copy.retrieved_at = far_future();

    assert_eq!(cursor.current().expect("current link"), original);
    cursor.close().expect("close");
    assert_eq!(store.find_link(original.id).expect("find link"), original);
}

// ---------------------------------------------------------------------------
// Concurrency
// ---------------------------------------------------------------------------

fn concurrent_upserts_converge(store: &dyn GraphStore) {
    let base = Utc::now() - Duration::hours(1);
    let results: Vec<Link> = thread::scope(|scope| {
        let handles: Vec<_> = (0..8i64)
            .map(|i| {
                let retrieved_at = base + Duration::seconds(i);
                scope.spawn(move || put_link(store, "https://example.com", retrieved_at))
            })
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().expect("upsert thread"))
            .collect()
    });

    let id = results[0].id;
    assert!(results.iter().all(|l| l.id == id));

    let stored = store.find_link(id).expect("find link");
    assert_eq!(stored.retrieved_at, time::normalize(base + Duration::seconds(7)));
    assert_eq!(link_ids(store, LinkId::NIL, LinkId::MAX, Utc::now()), vec![id]);
}

fn iteration_ignores_later_writes(store: &dyn GraphStore) {
    let ids = sorted_links(store, 3);
    let threshold = Utc::now();

    let mut cursor = store
        .links(LinkId::NIL, LinkId::MAX, threshold)
        .expect("open link cursor");
    assert!(cursor.advance());
    let mut seen = vec![cursor.current().expect("current link").id];

    for i in 0..4 {
        put_link(store, &format!("https://example.com/late/{i}"), threshold - Duration::minutes(1));
    }

    while cursor.advance() {
        seen.push(cursor.current().expect("current link").id);
    }
    assert!(cursor.error().is_none());
    cursor.close().expect("close");

    assert_eq!(seen, ids);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn case_names_are_unique() {
        let names: BTreeSet<&str> = cases().iter().map(|c| c.name).collect();
        assert_eq!(names.len(), cases().len());
    }

    #[test]
    fn in_memory_graph_passes() {
        run_suite(|| (crate::memory::InMemoryGraph::new(), ()));
    }
}
