#![forbid(unsafe_code)]

//! Core: identifiers, shelf geometry, grid snapping, and input events.
//!
//! # Role in shelfkit
//! `shelfkit-core` is the leaf crate. It owns the coordinate system shared by
//! every other layer: continuous centimetre positions on a shelf, the
//! view-to-model transform applied to pointer input, the snap grid, and the
//! half-open interval arithmetic that the layout model builds its overlap
//! checks on. Nothing in here holds state.
//!
//! # How it fits in the system
//! `shelfkit-layout` builds the shelf model on top of these primitives, and
//! `shelfkit-runtime` feeds [`event`] values through its interaction
//! controllers after transforming them with [`geometry::ViewTransform`].

pub mod event;
pub mod geometry;
pub mod id;
#[cfg(feature = "logging")]
pub mod logging;

pub use event::{EditorShortcut, KeyCode, Modifiers, PointerButton, PointerId};
pub use geometry::{
    DEFAULT_GRID_SIZE, GeometryError, GridSnap, Point, VerticalSpan, ViewTransform, ZoomFactor,
    intervals_overlap, segment_index_at, snap, transform_pointer_to_model,
};
pub use id::{PlacementId, ProductId, SegmentId, ShelfId};
