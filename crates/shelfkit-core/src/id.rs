#![forbid(unsafe_code)]

//! Stable integer identifiers for shelf entities.
//!
//! The persisted backend keys shelves, segments, placements, and products by
//! integer id; these newtypes keep the four spaces from being mixed up.

use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl $name {
            /// Create a new id from a raw value.
            #[must_use]
            pub const fn new(id: u64) -> Self {
                Self(id)
            }

            /// Get the raw id value.
            #[must_use]
            pub const fn raw(self) -> u64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "#{}"), self.0)
            }
        }

        impl From<u64> for $name {
            fn from(raw: u64) -> Self {
                Self(raw)
            }
        }
    };
}

entity_id!(
    /// Identifier of a shelf (the top-level container).
    ShelfId,
    "shelf"
);
entity_id!(
    /// Identifier of one horizontal shelf level.
    SegmentId,
    "segment"
);
entity_id!(
    /// Identifier of one product placement on a segment.
    PlacementId,
    "placement"
);
entity_id!(
    /// Identifier of a catalog product.
    ProductId,
    "product"
);
