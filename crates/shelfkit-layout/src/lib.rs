#![forbid(unsafe_code)]

//! Shelf layout model and the rules that keep it valid.
//!
//! # Role in shelfkit
//! `shelfkit-layout` is the single source of truth for one shelf-editing
//! session: segments stacked by level, each holding placements ordered
//! left-to-right. Every mutation is validated first and fails atomically
//! with the complete list of violated invariants; the render side is a
//! one-way projection of this model and is never read back.
//!
//! # Modules
//! - [`model`]: [`LayoutModel`] with its queries and validated mutations.
//! - [`validation`]: stateless [`ValidationEngine`] producing
//!   [`ValidationReport`]s for pre-flight and live feedback.
//! - [`stats`]: on-demand utilization and face-count statistics.
//! - [`presets`]: segment height presets and height optimization.

pub mod model;
pub mod presets;
pub mod stats;
pub mod validation;

pub use model::{
    FaceLimits, LayoutConfig, LayoutError, LayoutModel, ModelError, Placement, PlacementState,
    ProductSpec, Segment, SegmentSnapshot, Shelf, ShelfSnapshot, Violation, placement_top_offset,
};
pub use presets::{HeightPreset, optimize_heights, preset_heights};
pub use stats::{SegmentHeightSummary, SegmentUtilization, ShelfStatistics};
pub use validation::{PlacementProposal, ValidationEngine, ValidationReport};
