//! Indexed documents and search queries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use linkgraph_core::LinkId;

/// A searchable document derived from a crawled link.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// The link this document was derived from. Required.
    pub link_id: LinkId,
    pub url: String,
    pub title: String,
    pub content: String,
    /// Set by the indexer on every [`index`](crate::Indexer::index) call.
    pub indexed_at: DateTime<Utc>,
    /// Link-analysis score. Owned by [`update_score`](crate::Indexer::update_score);
    /// re-indexing a document never resets it.
    pub page_rank: f64,
}

/// How a query expression is interpreted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryType {
    /// Documents containing any expression term.
    #[default]
    Match,
    /// Documents containing the expression's terms as a contiguous sequence.
    Phrase,
}

/// A search request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Query {
    pub query_type: QueryType,
    pub expression: String,
    /// Number of leading results to skip.
    pub offset: u64,
}

impl Query {
    /// A term query.
    pub fn matching(expression: impl Into<String>) -> Self {
        Query {
            query_type: QueryType::Match,
            expression: expression.into(),
            offset: 0,
        }
    }

    /// An exact phrase query.
    pub fn phrase(expression: impl Into<String>) -> Self {
        Query {
            query_type: QueryType::Phrase,
            expression: expression.into(),
            offset: 0,
        }
    }

    /// The same query starting `offset` results in.
    pub fn with_offset(mut self, offset: u64) -> Self {
        self.offset = offset;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_deserializes_with_defaults() {
        let query: Query =
            serde_json::from_str(r#"{"query_type": "phrase", "expression": "a b"}"#).unwrap();
        assert_eq!(query, Query::phrase("a b"));
    }

    #[test]
    fn default_document_is_unassigned() {
        let doc = Document::default();
        assert!(doc.link_id.is_nil());
        assert_eq!(doc.page_rank, 0.0);
    }
}
