//! Stable ID newtypes for graph entities.
//!
//! Both IDs are distinct newtype wrappers over a UUID, so a `LinkId` cannot be
//! accidentally used where an `EdgeId` is expected.
//!
//! # Ordering
//!
//! IDs are totally ordered by the 16 raw UUID bytes compared
//! lexicographically. That is the same order as the lowercase hyphenated
//! string form and as a `memcmp` over a BLOB column, so a range
//! `[from, to)` selects the same set in every backend. Batch callers rely on
//! this to split the ID space into contiguous shards.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable link identifier, assigned by the store on first insert.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct LinkId(pub Uuid);

/// Stable edge identifier, assigned by the store on first insert.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct EdgeId(pub Uuid);

impl LinkId {
    /// The unassigned ID. Also the lowest value in the ID order.
    pub const NIL: LinkId = LinkId(Uuid::nil());

    /// The highest value in the ID order.
    ///
    /// Range queries are half-open, so `[NIL, MAX)` covers every ID the store
    /// can hand out except `MAX` itself, which v4 generation never produces.
    pub const MAX: LinkId = LinkId(Uuid::from_bytes([0xff; 16]));

    /// Generates a fresh random identifier.
    pub fn new_v4() -> Self {
        LinkId(Uuid::new_v4())
    }

    /// Returns `true` if no identifier has been assigned yet.
    pub fn is_nil(&self) -> bool {
        self.0.is_nil()
    }
}

impl EdgeId {
    /// The unassigned ID.
    pub const NIL: EdgeId = EdgeId(Uuid::nil());

    /// Generates a fresh random identifier.
    pub fn new_v4() -> Self {
        EdgeId(Uuid::new_v4())
    }

    /// Returns `true` if no identifier has been assigned yet.
    pub fn is_nil(&self) -> bool {
        self.0.is_nil()
    }
}

// Display implementations -- hyphenated lowercase UUID.

impl fmt::Display for LinkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for LinkId {
    fn from(id: Uuid) -> Self {
        LinkId(id)
    }
}

impl From<Uuid> for EdgeId {
    fn from(id: Uuid) -> Self {
        EdgeId(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn nil_is_unassigned() {
        assert!(LinkId::NIL.is_nil());
        assert!(EdgeId::default().is_nil());
        assert!(!LinkId::new_v4().is_nil());
    }

    #[test]
    fn bounds_enclose_generated_ids() {
        for _ in 0..64 {
            let id = LinkId::new_v4();
            assert!(LinkId::NIL < id);
            assert!(id < LinkId::MAX);
        }
    }

    #[test]
    fn link_id_display() {
        let id = LinkId(Uuid::from_bytes([0xab; 16]));
        assert_eq!(format!("{id}"), "abababab-abab-abab-abab-abababababab");
    }

    #[test]
    fn serde_is_transparent() {
        let id = EdgeId::new_v4();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", id.0));
    }

    proptest! {
        #[test]
        fn order_matches_string_order(a in any::<[u8; 16]>(), b in any::<[u8; 16]>()) {
            let (x, y) = (LinkId(Uuid::from_bytes(a)), LinkId(Uuid::from_bytes(b)));
            prop_assert_eq!(x.cmp(&y), x.to_string().cmp(&y.to_string()));
        }

        #[test]
        fn order_matches_byte_order(a in any::<[u8; 16]>(), b in any::<[u8; 16]>()) {
            let (x, y) = (LinkId(Uuid::from_bytes(a)), LinkId(Uuid::from_bytes(b)));
            prop_assert_eq!(x.cmp(&y), a.cmp(&b));
        }
    }
}
