//! Link type -- a web resource known to the graph.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::id::LinkId;

/// A stored web resource reference.
///
/// `url` is the natural key: no two links share one. Upserting an existing
/// URL keeps its `id` and moves `retrieved_at` to the later of the stored and
/// incoming values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    /// Assigned by the store on first insert; nil until then.
    pub id: LinkId,
    /// Unique natural key.
    pub url: String,
    /// Time of the last successful retrieval.
    pub retrieved_at: DateTime<Utc>,
}

impl Link {
    /// Creates an unsaved link. The store assigns the ID on upsert.
    pub fn new(url: impl Into<String>, retrieved_at: DateTime<Utc>) -> Self {
        Link {
            id: LinkId::NIL,
            url: url.into(),
            retrieved_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_link_is_unassigned() {
        let link = Link::new("https://example.com", Utc::now());
        assert!(link.id.is_nil());
        assert_eq!(link.url, "https://example.com");
    }
}
