//! The cursor protocol for streaming range-query results.
//!
//! A [`Cursor`] is single-use and forward-only:
//! - [`advance`](Cursor::advance) moves to the next element and returns
//!   `false` once the results are exhausted or a retrieval error occurred.
//!   After the first `false` it keeps returning `false`.
//! - [`error`](Cursor::error) tells the two `false` cases apart, and
//!   [`take_error`](Cursor::take_error) hands the error over by value.
//! - [`current`](Cursor::current) returns a copy of the current element, or
//!   `None` before the first successful advance and after exhaustion.
//! - [`close`](Cursor::close) releases backend resources. It may be called any
//!   number of times, and dropping a cursor releases the same resources.

use linkgraph_core::{Edge, Link};

use crate::error::StorageError;

/// A forward-only cursor over a lazily produced result set.
pub trait Cursor: Send {
    /// The element type yielded by this cursor.
    type Item;

    /// Moves to the next element. Returns `false` when exhausted or on error.
    fn advance(&mut self) -> bool;

    /// The first error met while advancing, if any.
    fn error(&self) -> Option<&StorageError>;

    /// Moves the recorded error out of the cursor.
    fn take_error(&mut self) -> Option<StorageError>;

    /// A copy of the current element. Mutating it never affects the store.
    fn current(&self) -> Option<Self::Item>;

    /// Releases backend resources. Safe to call repeatedly.
    fn close(&mut self) -> Result<(), StorageError>;
}

/// Cursor over links returned by [`GraphStore::links`](crate::GraphStore::links).
pub type LinkIterator = Box<dyn Cursor<Item = Link>>;

/// Cursor over edges returned by [`GraphStore::edges`](crate::GraphStore::edges).
pub type EdgeIterator = Box<dyn Cursor<Item = Edge>>;

impl<C: Cursor + ?Sized> Cursor for Box<C> {
    type Item = C::Item;

    fn advance(&mut self) -> bool {
        (**self).advance()
    }

    fn error(&self) -> Option<&StorageError> {
        (**self).error()
    }

    fn take_error(&mut self) -> Option<StorageError> {
        (**self).take_error()
    }

    fn current(&self) -> Option<Self::Item> {
        (**self).current()
    }

    fn close(&mut self) -> Result<(), StorageError> {
        (**self).close()
    }
}

/// Convenience methods available on every cursor.
pub trait CursorExt: Cursor {
    /// Drains the cursor into a `Vec`, then closes it.
    ///
    /// Returns the retrieval error that stopped the iteration early, if any,
    /// in preference to a failure while closing.
    fn collect_items(mut self) -> Result<Vec<Self::Item>, StorageError>
    where
        Self: Sized,
    {
        let mut items = Vec::new();
        while self.advance() {
            if let Some(item) = self.current() {
                items.push(item);
            }
        }
        let failed = self.take_error();
        let closed = self.close();
        match failed {
            Some(err) => Err(err),
            None => closed.map(|()| items),
        }
    }
}

impl<C: Cursor + ?Sized> CursorExt for C {}

/// A cursor over a result set copied out at creation time.
///
/// Later mutations of the source never reach the snapshot, and no lock is
/// held while the caller iterates.
#[derive(Debug)]
pub struct SnapshotCursor<T> {
    items: Vec<T>,
    next: usize,
    current: Option<usize>,
    closed: bool,
}

impl<T> SnapshotCursor<T> {
    /// Wraps an already materialized result set.
    pub fn new(items: Vec<T>) -> Self {
        SnapshotCursor {
            items,
            next: 0,
            current: None,
            closed: false,
        }
    }

    /// Number of elements not yet yielded.
    pub fn remaining(&self) -> usize {
        self.items.len().saturating_sub(self.next)
    }
}

impl<T: Clone + Send> Cursor for SnapshotCursor<T> {
    type Item = T;

    fn advance(&mut self) -> bool {
        if self.closed || self.next >= self.items.len() {
            self.current = None;
            self.next = self.items.len();
            return false;
        }
        self.current = Some(self.next);
        self.next += 1;
        true
    }

    fn error(&self) -> Option<&StorageError> {
        None
    }

    fn take_error(&mut self) -> Option<StorageError> {
        None
    }

    fn current(&self) -> Option<T> {
        self.current.and_then(|i| self.items.get(i)).cloned()
    }

    fn close(&mut self) -> Result<(), StorageError> {
        self.closed = true;
        self.current = None;
        self.next = 0;
        self.items = Vec::new();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn current_is_none_before_first_advance() {
        let cursor = SnapshotCursor::new(vec![1, 2]);
        assert_eq!(cursor.current(), None);
    }

    #[test]
    fn yields_in_order_then_stays_exhausted() {
        let mut cursor = SnapshotCursor::new(vec!["a", "b"]);
        assert!(cursor.advance());
        assert_eq!(cursor.current(), Some("a"));
        assert!(cursor.advance());
        assert_eq!(cursor.current(), Some("b"));
        assert!(!cursor.advance());
        assert_eq!(cursor.current(), None);
        assert!(!cursor.advance());
        assert!(cursor.error().is_none());
    }

    #[test]
    fn close_is_idempotent_and_stops_iteration() {
        let mut cursor = SnapshotCursor::new(vec![1, 2, 3]);
        assert!(cursor.advance());
        cursor.close().unwrap();
        cursor.close().unwrap();
        assert!(!cursor.advance());
        assert_eq!(cursor.remaining(), 0);
    }

    #[test]
    fn collect_items_drains_boxed_cursor() {
        let boxed: Box<dyn Cursor<Item = u32>> = Box::new(SnapshotCursor::new(vec![4, 5, 6]));
        assert_eq!(boxed.collect_items().unwrap(), vec![4, 5, 6]);
    }

    /// Yields `ok` items, then fails with a not-found error.
    struct FailingCursor {
        ok: u32,
        current: Option<u32>,
        err: Option<StorageError>,
        closed: bool,
    }

    impl Cursor for FailingCursor {
        type Item = u32;

        fn advance(&mut self) -> bool {
            if self.ok == 0 || self.closed {
                self.current = None;
                self.err.get_or_insert(StorageError::NotFound {
                    id: linkgraph_core::LinkId::NIL,
                });
                return false;
            }
            self.ok -= 1;
            self.current = Some(self.ok);
            true
        }

        fn error(&self) -> Option<&StorageError> {
            self.err.as_ref()
        }

        fn take_error(&mut self) -> Option<StorageError> {
            self.err.take()
        }

        fn current(&self) -> Option<u32> {
            self.current
        }

        fn close(&mut self) -> Result<(), StorageError> {
            self.closed = true;
            Ok(())
        }
    }

    #[test]
    fn collect_items_returns_the_cursor_error_itself() {
        let cursor = FailingCursor {
            ok: 2,
            current: None,
            err: None,
            closed: false,
        };
        let err = cursor.collect_items().unwrap_err();
        assert!(matches!(err, StorageError::NotFound { .. }));
    }
}
