//! Storage error types for linkgraph-storage.
//!
//! [`StorageError`] is the only error type that crosses the [`GraphStore`]
//! boundary. Backends translate their driver errors into it; no driver type
//! appears in its public shape.
//!
//! [`GraphStore`]: crate::traits::GraphStore

use linkgraph_core::LinkId;
use thiserror::Error;

/// Boxed source error carried by [`StorageError::Io`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors produced by storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// No link has the requested ID.
    #[error("link not found: {id}")]
    NotFound { id: LinkId },

    /// An edge endpoint does not reference a stored link.
    #[error("unknown edge links: src={src}, dst={dst}")]
    UnknownEdgeLinks { src: LinkId, dst: LinkId },

    /// Any other backend failure.
    #[error("{op}: {source}")]
    Io {
        op: &'static str,
        #[source]
        source: BoxError,
    },
}

/// The error taxonomy callers match on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Lookup found nothing. Callers usually treat it as absent.
    NotFound,
    /// Edge upsert referenced a missing link. Callers may upsert the link and retry.
    UnknownEdgeLinks,
    /// Generic backend failure.
    Io,
}

impl StorageError {
    /// Wraps a backend failure that occurred while performing `op`.
    pub fn io(op: &'static str, source: impl Into<BoxError>) -> Self {
        StorageError::Io {
            op,
            source: source.into(),
        }
    }

    /// Returns the taxonomy kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            StorageError::NotFound { .. } => ErrorKind::NotFound,
            StorageError::UnknownEdgeLinks { .. } => ErrorKind::UnknownEdgeLinks,
            StorageError::Io { .. } => ErrorKind::Io,
        }
    }
}
