#![forbid(unsafe_code)]

//! Geometric primitives for shelf editing.
//!
//! All model coordinates are continuous centimetres with the origin at the
//! top-left of the shelf canvas: `x` grows to the right along a segment and
//! `y` grows downward through the stacked segments. Pointer input arrives in
//! view units (scrolled and zoomed) and is mapped back with [`ViewTransform`].
//!
//! # Invariants
//!
//! - [`snap`] is idempotent: `snap(snap(x, g), g) == snap(x, g)`.
//! - [`intervals_overlap`] treats intervals as half-open, so abutting
//!   placements (`a.end == b.start`) never overlap.
//! - Spans handed to [`segment_index_at`] are hit-tested as
//!   `[top, bottom + margin)`, which makes consecutive spans contiguous.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default snap grid in centimetres.
pub const DEFAULT_GRID_SIZE: f64 = 5.0;

/// Invalid geometry parameters.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum GeometryError {
    #[error("zoom factor must be finite and > 0 (got {0})")]
    InvalidZoom(f64),
    #[error("grid size must be finite and > 0 (got {0})")]
    InvalidGridSize(f64),
}

/// A position in either view or model space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    /// The origin.
    pub const ZERO: Self = Self { x: 0.0, y: 0.0 };

    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Component-wise difference `self - other`.
    #[must_use]
    pub fn delta_from(self, other: Point) -> Point {
        Point::new(self.x - other.x, self.y - other.y)
    }

    /// Euclidean distance to another point.
    #[must_use]
    pub fn distance(self, other: Point) -> f64 {
        let d = self.delta_from(other);
        d.x.hypot(d.y)
    }
}

/// Validated view zoom (scale from model centimetres to view units).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct ZoomFactor(f64);

impl ZoomFactor {
    /// Identity zoom.
    pub const ONE: Self = Self(1.0);

    pub fn new(factor: f64) -> Result<Self, GeometryError> {
        if !factor.is_finite() || factor <= 0.0 {
            return Err(GeometryError::InvalidZoom(factor));
        }
        Ok(Self(factor))
    }

    #[must_use]
    pub const fn get(self) -> f64 {
        self.0
    }
}

impl Default for ZoomFactor {
    fn default() -> Self {
        Self::ONE
    }
}

impl TryFrom<f64> for ZoomFactor {
    type Error = GeometryError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ZoomFactor> for f64 {
    fn from(value: ZoomFactor) -> Self {
        value.0
    }
}

/// Map a pointer position to model coordinates.
///
/// `x = ((pointer.x - view_origin.x) - drag_offset.x) / zoom`, and the same
/// for `y`. `drag_offset` is the pointer's offset from the dragged item's
/// origin in view units, or [`Point::ZERO`] when nothing is grabbed.
#[must_use]
pub fn transform_pointer_to_model(
    pointer: Point,
    view_origin: Point,
    drag_offset: Point,
    zoom: ZoomFactor,
) -> Point {
    let z = zoom.get();
    Point::new(
        ((pointer.x - view_origin.x) - drag_offset.x) / z,
        ((pointer.y - view_origin.y) - drag_offset.y) / z,
    )
}

/// Scroll offset and zoom of the shelf canvas at the time of an input event.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ViewTransform {
    /// Canvas origin in view units (e.g. the canvas bounding rect top-left).
    pub origin: Point,
    pub zoom: ZoomFactor,
}

impl ViewTransform {
    #[must_use]
    pub const fn new(origin: Point, zoom: ZoomFactor) -> Self {
        Self { origin, zoom }
    }

    /// Pointer → model, applying a grab offset.
    #[must_use]
    pub fn to_model(&self, pointer: Point, drag_offset: Point) -> Point {
        transform_pointer_to_model(pointer, self.origin, drag_offset, self.zoom)
    }

    /// Model → view.
    #[must_use]
    pub fn to_view(&self, model: Point) -> Point {
        let z = self.zoom.get();
        Point::new(self.origin.x + model.x * z, self.origin.y + model.y * z)
    }

    /// Grab offset of `pointer` relative to an item anchored at `anchor`
    /// (model coordinates). Feeding the same pointer back through
    /// [`Self::to_model`] with this offset yields `anchor`.
    #[must_use]
    pub fn drag_offset(&self, pointer: Point, anchor: Point) -> Point {
        pointer.delta_from(self.to_view(anchor))
    }
}

/// Round `x` to the nearest multiple of `grid_size`.
#[must_use]
pub fn snap(x: f64, grid_size: f64) -> f64 {
    (x / grid_size).round() * grid_size
}

/// Grid snapping policy: a validated grid unit plus the "no-snap" switch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridSnap {
    size: f64,
    enabled: bool,
}

impl GridSnap {
    pub fn new(size: f64, enabled: bool) -> Result<Self, GeometryError> {
        if !size.is_finite() || size <= 0.0 {
            return Err(GeometryError::InvalidGridSize(size));
        }
        Ok(Self { size, enabled })
    }

    /// Snapping disabled; [`Self::apply`] returns its input unchanged.
    #[must_use]
    pub const fn disabled() -> Self {
        Self {
            size: DEFAULT_GRID_SIZE,
            enabled: false,
        }
    }

    #[must_use]
    pub const fn size(self) -> f64 {
        self.size
    }

    #[must_use]
    pub const fn is_enabled(self) -> bool {
        self.enabled
    }

    /// Toggle snapping without touching the grid unit.
    #[must_use]
    pub const fn with_enabled(self, enabled: bool) -> Self {
        Self {
            size: self.size,
            enabled,
        }
    }

    #[must_use]
    pub fn apply(self, x: f64) -> f64 {
        if self.enabled { snap(x, self.size) } else { x }
    }
}

impl Default for GridSnap {
    fn default() -> Self {
        Self {
            size: DEFAULT_GRID_SIZE,
            enabled: true,
        }
    }
}

/// Half-open interval overlap: `[a_start, a_end)` vs `[b_start, b_end)`.
#[inline]
#[must_use]
pub fn intervals_overlap(a_start: f64, a_end: f64, b_start: f64, b_end: f64) -> bool {
    a_start < b_end && b_start < a_end
}

/// Vertical extent of one segment's placement area in model coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct VerticalSpan {
    pub top: f64,
    pub bottom: f64,
}

impl VerticalSpan {
    #[must_use]
    pub const fn new(top: f64, height: f64) -> Self {
        Self {
            top,
            bottom: top + height,
        }
    }

    #[must_use]
    pub fn height(&self) -> f64 {
        self.bottom - self.top
    }

    /// Hit test against `[top, bottom + margin)`.
    #[must_use]
    pub fn hit(&self, y: f64, margin: f64) -> bool {
        y >= self.top && y < self.bottom + margin
    }
}

/// Index of the span whose hit band contains `y`.
#[must_use]
pub fn segment_index_at(y: f64, spans: &[VerticalSpan], margin: f64) -> Option<usize> {
    spans.iter().position(|span| span.hit(y, margin))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zoom(z: f64) -> ZoomFactor {
        ZoomFactor::new(z).unwrap()
    }

    #[test]
    fn transform_applies_origin_offset_and_zoom() {
        let p = transform_pointer_to_model(
            Point::new(250.0, 130.0),
            Point::new(50.0, 30.0),
            Point::new(10.0, 20.0),
            zoom(2.0),
        );
        assert_eq!(p, Point::new(95.0, 40.0));
    }

    #[test]
    fn drag_offset_round_trips_to_anchor() {
        let view = ViewTransform::new(Point::new(12.0, 40.0), zoom(1.5));
        let anchor = Point::new(35.0, 64.0);
        let pointer = Point::new(90.0, 150.0);
        let offset = view.drag_offset(pointer, anchor);
        let back = view.to_model(pointer, offset);
        assert!((back.x - anchor.x).abs() < 1e-9);
        assert!((back.y - anchor.y).abs() < 1e-9);
    }

    #[test]
    fn zoom_rejects_non_positive_and_nan() {
        assert!(ZoomFactor::new(0.0).is_err());
        assert!(ZoomFactor::new(-1.0).is_err());
        assert!(ZoomFactor::new(f64::NAN).is_err());
        assert!(ZoomFactor::new(0.25).is_ok());
    }

    #[test]
    fn snap_rounds_to_nearest_multiple() {
        assert_eq!(snap(12.4, 5.0), 10.0);
        assert_eq!(snap(12.5, 5.0), 15.0);
        assert_eq!(snap(-3.0, 5.0), -5.0);
        assert_eq!(snap(0.0, 5.0), 0.0);
    }

    #[test]
    fn disabled_grid_passes_through() {
        assert_eq!(GridSnap::disabled().apply(12.34), 12.34);
        let grid = GridSnap::default().with_enabled(false);
        assert_eq!(grid.apply(7.7), 7.7);
        assert_eq!(grid.with_enabled(true).apply(7.7), 10.0);
    }

    #[test]
    fn grid_rejects_bad_size() {
        assert_eq!(
            GridSnap::new(0.0, true),
            Err(GeometryError::InvalidGridSize(0.0))
        );
        assert!(GridSnap::new(f64::INFINITY, true).is_err());
    }

    #[test]
    fn abutting_intervals_do_not_overlap() {
        assert!(!intervals_overlap(0.0, 20.0, 20.0, 40.0));
        assert!(intervals_overlap(0.0, 20.0, 15.0, 35.0));
        assert!(intervals_overlap(5.0, 6.0, 0.0, 20.0));
        assert!(!intervals_overlap(30.0, 40.0, 0.0, 20.0));
    }

    #[test]
    fn segment_lookup_uses_contiguous_bands() {
        let spans = [VerticalSpan::new(0.0, 30.0), VerticalSpan::new(32.0, 40.0)];
        assert_eq!(segment_index_at(0.0, &spans, 2.0), Some(0));
        assert_eq!(segment_index_at(31.0, &spans, 2.0), Some(0));
        assert_eq!(segment_index_at(32.0, &spans, 2.0), Some(1));
        assert_eq!(segment_index_at(73.9, &spans, 2.0), Some(1));
        assert_eq!(segment_index_at(74.0, &spans, 2.0), None);
        assert_eq!(segment_index_at(-0.5, &spans, 2.0), None);
    }
}
