//! Error types for linkgraph-index.

use linkgraph_core::LinkId;
use thiserror::Error;

/// Boxed source error carried by [`IndexError::Io`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors produced by indexer operations.
#[derive(Debug, Error)]
pub enum IndexError {
    /// No document is indexed under the requested link ID.
    #[error("document not found: {id}")]
    NotFound { id: LinkId },

    /// A document was submitted without a link ID.
    #[error("document does not have a link id")]
    MissingLinkId,

    /// Any other backend failure.
    #[error("{op}: {source}")]
    Io {
        op: &'static str,
        #[source]
        source: BoxError,
    },
}

impl IndexError {
    /// Wraps a backend failure that occurred while performing `op`.
    pub fn io(op: &'static str, source: impl Into<BoxError>) -> Self {
        IndexError::Io {
            op,
            source: source.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_document() {
        let id = LinkId::new_v4();
        assert_eq!(
            IndexError::NotFound { id }.to_string(),
            format!("document not found: {id}")
        );
        assert_eq!(IndexError::io("search", "closed").to_string(), "search: closed");
    }
}
