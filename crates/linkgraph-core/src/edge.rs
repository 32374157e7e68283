//! Edge type -- a directed relationship between two links.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::id::{EdgeId, LinkId};

/// A directed edge from `src` to `dst`.
///
/// The `(src, dst)` pair is unique. Both endpoints must name links already in
/// the store when the edge is upserted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    /// Assigned by the store on first insert; nil until then.
    pub id: EdgeId,
    /// Source link.
    pub src: LinkId,
    /// Destination link.
    pub dst: LinkId,
    /// Time of the last upsert, set by the store.
    pub updated_at: DateTime<Utc>,
}

impl Edge {
    /// Creates an unsaved edge between two existing links.
    pub fn new(src: LinkId, dst: LinkId) -> Self {
        Edge {
            id: EdgeId::NIL,
            src,
            dst,
            updated_at: DateTime::<Utc>::UNIX_EPOCH,
        }
    }
}
