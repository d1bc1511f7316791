#![forbid(unsafe_code)]

//! In-memory shelf layout model.
//!
//! A [`LayoutModel`] owns one shelf: its segments ordered by `level` and, per
//! segment, the placements ordered by `x_position`. Vertical segment spans
//! are derived (cumulative heights plus a fixed margin) and recomputed by
//! [`LayoutModel::recalculate_positions`] after every height change.
//!
//! # Invariants
//!
//! 1. Segment levels and ids are unique; segments are sorted by level.
//! 2. Every segment height is within `[min_segment_height, max_segment_height]`.
//! 3. Within a segment no two `[x, x + occupied_width)` intervals overlap.
//! 4. `x >= 0` and `x + occupied_width <= shelf.width` for every placement.
//! 5. Every placement's product height is `<=` its segment's height.
//! 6. Placements inside a segment are sorted by `x_position`.
//!
//! # Failure Modes
//!
//! - **Constraint violation**: a proposed mutation breaks 2–5. The mutation is
//!   not applied and [`LayoutError::Rejected`] carries every violated check,
//!   not just the first one.
//! - **Model inconsistency**: an id does not resolve, or a level/id is reused.
//!   Reported as [`LayoutError::Model`]; the model is left unchanged.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use shelfkit_core::geometry::{VerticalSpan, intervals_overlap, segment_index_at};
use shelfkit_core::id::{PlacementId, ProductId, SegmentId, ShelfId};
use thiserror::Error;

/// Fixed vertical gap between stacked segments (cm).
pub const DEFAULT_SEGMENT_MARGIN: f64 = 2.0;

/// Padding applied to bottom-anchored placement tops (cm).
pub const DEFAULT_PLACEMENT_PADDING: f64 = 2.0;

/// Lowest permitted segment height (cm).
pub const MIN_SEGMENT_HEIGHT: f64 = 10.0;

/// Highest permitted segment height (cm).
pub const MAX_SEGMENT_HEIGHT: f64 = 100.0;

/// Slack for float comparisons against shelf width and heights.
const EPSILON: f64 = 1e-9;

// ============================================================================
// Configuration
// ============================================================================

/// Geometry constants of a layout session.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    pub segment_margin: f64,
    pub placement_padding: f64,
    pub min_segment_height: f64,
    pub max_segment_height: f64,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            segment_margin: DEFAULT_SEGMENT_MARGIN,
            placement_padding: DEFAULT_PLACEMENT_PADDING,
            min_segment_height: MIN_SEGMENT_HEIGHT,
            max_segment_height: MAX_SEGMENT_HEIGHT,
        }
    }
}

impl LayoutConfig {
    /// Returns one message per invalid field; empty means valid.
    #[must_use]
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if !self.segment_margin.is_finite() || self.segment_margin < 0.0 {
            errors.push(format!(
                "layout.segment_margin must be >= 0, got {}",
                self.segment_margin
            ));
        }
        if !self.placement_padding.is_finite() || self.placement_padding < 0.0 {
            errors.push(format!(
                "layout.placement_padding must be >= 0, got {}",
                self.placement_padding
            ));
        }
        if !self.min_segment_height.is_finite() || self.min_segment_height <= 0.0 {
            errors.push(format!(
                "layout.min_segment_height must be > 0, got {}",
                self.min_segment_height
            ));
        }
        if !(self.max_segment_height >= self.min_segment_height) {
            errors.push(format!(
                "layout.max_segment_height ({}) must be >= min_segment_height ({})",
                self.max_segment_height, self.min_segment_height
            ));
        }
        errors
    }
}

// ============================================================================
// Entities
// ============================================================================

/// The shelf being edited.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shelf {
    pub id: ShelfId,
    #[serde(default)]
    pub name: String,
    /// Usable width of every segment (cm).
    pub width: f64,
    pub depth: f64,
}

impl Shelf {
    #[must_use]
    pub fn new(id: ShelfId, width: f64, depth: f64) -> Self {
        Self {
            id,
            name: String::new(),
            width,
            depth,
        }
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

/// Permitted face-count range of a product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaceLimits {
    pub min: u32,
    pub max: u32,
}

impl FaceLimits {
    /// Any count `>= 1`.
    pub const ANY: Self = Self {
        min: 1,
        max: u32::MAX,
    };

    #[must_use]
    pub const fn new(min: u32, max: u32) -> Self {
        Self { min, max }
    }

    /// Effective lower bound; a placement always has at least one face.
    #[must_use]
    pub fn floor(self) -> u32 {
        self.min.max(1)
    }

    #[must_use]
    pub fn contains(self, face_count: u32) -> bool {
        face_count >= self.floor() && face_count <= self.max
    }
}

impl Default for FaceLimits {
    fn default() -> Self {
        Self::ANY
    }
}

/// Product dimensions denormalized onto a placement so validation never
/// needs a catalog lookup.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProductSpec {
    pub id: ProductId,
    /// Width of one facing (cm).
    pub width: f64,
    pub height: f64,
    /// Own-company product (vs. competitor).
    #[serde(default)]
    pub is_own: bool,
    #[serde(default)]
    pub faces: FaceLimits,
}

impl ProductSpec {
    #[must_use]
    pub fn new(id: ProductId, width: f64, height: f64) -> Self {
        Self {
            id,
            width,
            height,
            is_own: false,
            faces: FaceLimits::ANY,
        }
    }

    #[must_use]
    pub fn own(mut self, is_own: bool) -> Self {
        self.is_own = is_own;
        self
    }

    #[must_use]
    pub fn with_faces(mut self, limits: FaceLimits) -> Self {
        self.faces = limits;
        self
    }

    /// Width occupied by `face_count` side-by-side facings.
    #[must_use]
    pub fn occupied_width(&self, face_count: u32) -> f64 {
        self.width * f64::from(face_count)
    }

    fn is_valid(&self) -> bool {
        self.width.is_finite() && self.width > 0.0 && self.height.is_finite() && self.height > 0.0
    }
}

/// One product's slot on a segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Placement {
    pub id: PlacementId,
    pub segment_id: SegmentId,
    pub product: ProductSpec,
    pub x_position: f64,
    pub face_count: u32,
}

impl Placement {
    #[must_use]
    pub fn new(
        id: PlacementId,
        segment_id: SegmentId,
        product: ProductSpec,
        x_position: f64,
        face_count: u32,
    ) -> Self {
        Self {
            id,
            segment_id,
            product,
            x_position,
            face_count,
        }
    }

    /// `product.width * face_count`.
    #[must_use]
    pub fn occupied_width(&self) -> f64 {
        self.product.occupied_width(self.face_count)
    }

    /// Exclusive right edge.
    #[must_use]
    pub fn end_position(&self) -> f64 {
        self.x_position + self.occupied_width()
    }

    /// Position/face snapshot used by history entries.
    #[must_use]
    pub fn state(&self) -> PlacementState {
        PlacementState {
            id: self.id,
            segment_id: self.segment_id,
            x_position: self.x_position,
            face_count: self.face_count,
        }
    }
}

/// The mutable part of a placement, captured by value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlacementState {
    pub id: PlacementId,
    pub segment_id: SegmentId,
    pub x_position: f64,
    pub face_count: u32,
}

/// One horizontal shelf level.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub id: SegmentId,
    pub level: i32,
    pub height: f64,
    span: VerticalSpan,
    placements: Vec<Placement>,
}

impl Segment {
    fn new(id: SegmentId, level: i32, height: f64) -> Self {
        Self {
            id,
            level,
            height,
            span: VerticalSpan::default(),
            placements: Vec::new(),
        }
    }

    /// Derived vertical span; valid after `recalculate_positions`.
    #[must_use]
    pub fn span(&self) -> VerticalSpan {
        self.span
    }

    /// Placements ordered by `x_position`.
    #[must_use]
    pub fn placements(&self) -> &[Placement] {
        &self.placements
    }

    /// Sum of occupied widths.
    #[must_use]
    pub fn used_width(&self) -> f64 {
        self.placements.iter().map(Placement::occupied_width).sum()
    }

    /// Tallest placed product, if any.
    #[must_use]
    pub fn max_product_height(&self) -> Option<f64> {
        self.placements
            .iter()
            .map(|p| p.product.height)
            .fold(None, |acc, h| Some(acc.map_or(h, |m: f64| m.max(h))))
    }

    fn insert_sorted(&mut self, placement: Placement) {
        let at = self
            .placements
            .partition_point(|p| p.x_position <= placement.x_position);
        self.placements.insert(at, placement);
    }
}

/// Bottom-anchored vertical offset of a product inside its segment.
///
/// `max(padding, segment_height - product_height + padding)`.
#[must_use]
pub fn placement_top_offset(segment_height: f64, product_height: f64, padding: f64) -> f64 {
    (segment_height - product_height + padding).max(padding)
}

// ============================================================================
// Snapshots
// ============================================================================

/// Persisted shape of one segment (mirrors the backend record).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentSnapshot {
    pub id: SegmentId,
    pub level: i32,
    pub height: f64,
    #[serde(default)]
    pub placements: Vec<Placement>,
}

/// Persisted shape of a shelf: Shelf → Segments → Placements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShelfSnapshot {
    pub shelf: Shelf,
    #[serde(default)]
    pub segments: Vec<SegmentSnapshot>,
}

// ============================================================================
// Errors
// ============================================================================

/// One violated layout invariant. `Display` is the human-readable reason.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Violation {
    #[error("{field} must be a finite number")]
    NonFinite { field: &'static str },
    #[error("x position {x} cm is left of the shelf edge")]
    NegativePosition { x: f64 },
    #[error("placement ends at {end} cm, beyond the shelf width of {shelf_width} cm")]
    ExceedsShelfWidth { end: f64, shelf_width: f64 },
    #[error("overlaps {other} occupying [{start}, {end}) cm")]
    Overlap {
        other: PlacementId,
        start: f64,
        end: f64,
    },
    #[error("product height ({product_height} cm) exceeds the segment height ({segment_height} cm)")]
    ProductTooTall {
        product_height: f64,
        segment_height: f64,
    },
    #[error("face count {face_count} is outside the allowed range {min}..={max}")]
    FaceCountOutOfRange { face_count: u32, min: u32, max: u32 },
    #[error("product dimensions must be > 0 (width {width} cm, height {height} cm)")]
    InvalidProduct { width: f64, height: f64 },
    #[error("segment height {height} cm must be between {min} and {max} cm")]
    HeightOutOfBounds { height: f64, min: f64, max: f64 },
    #[error(
        "{placement} product height ({product_height} cm) exceeds the new segment height ({height} cm)"
    )]
    HeightBelowProduct {
        placement: PlacementId,
        product_height: f64,
        height: f64,
    },
    #[error("{segment} still holds {count} placement(s)")]
    SegmentNotEmpty { segment: SegmentId, count: usize },
}

/// Model inconsistency: ids that do not resolve or collide.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelError {
    #[error("{0} not found")]
    UnknownSegment(SegmentId),
    #[error("{0} not found")]
    UnknownPlacement(PlacementId),
    #[error("{0} already exists")]
    DuplicateSegment(SegmentId),
    #[error("level {level} is already used by {existing}")]
    DuplicateLevel { level: i32, existing: SegmentId },
    #[error("{0} already exists")]
    DuplicatePlacement(PlacementId),
    #[error("shelf dimensions must be finite and > 0 (width {width}, depth {depth})")]
    InvalidShelf { width: f64, depth: f64 },
}

/// Failure of a layout query or mutation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LayoutError {
    /// Expected, non-fatal: every violated invariant.
    #[error("{}", join_violations(.0))]
    Rejected(Vec<Violation>),
    /// Infrastructure failure.
    #[error(transparent)]
    Model(#[from] ModelError),
}

impl LayoutError {
    /// Violations carried by a rejection; empty for model errors.
    #[must_use]
    pub fn violations(&self) -> &[Violation] {
        match self {
            Self::Rejected(violations) => violations,
            Self::Model(_) => &[],
        }
    }

    /// One human-readable message per violation (or the model error).
    #[must_use]
    pub fn messages(&self) -> Vec<String> {
        match self {
            Self::Rejected(violations) => violations.iter().map(ToString::to_string).collect(),
            Self::Model(err) => vec![err.to_string()],
        }
    }
}

fn join_violations(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

fn reject_if_any(violations: Vec<Violation>) -> Result<(), LayoutError> {
    if violations.is_empty() {
        Ok(())
    } else {
        Err(LayoutError::Rejected(violations))
    }
}

// ============================================================================
// LayoutModel
// ============================================================================

/// Geometric model of one shelf.
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutModel {
    shelf: Shelf,
    segments: Vec<Segment>,
    config: LayoutConfig,
}

impl LayoutModel {
    /// Empty shelf without segments.
    pub fn new(shelf: Shelf, config: LayoutConfig) -> Result<Self, ModelError> {
        if !(shelf.width.is_finite() && shelf.width > 0.0)
            || !(shelf.depth.is_finite() && shelf.depth > 0.0)
        {
            return Err(ModelError::InvalidShelf {
                width: shelf.width,
                depth: shelf.depth,
            });
        }
        Ok(Self {
            shelf,
            segments: Vec::new(),
            config,
        })
    }

    /// Load a persisted shelf, validating every invariant on the way in.
    pub fn from_snapshot(snapshot: ShelfSnapshot, config: LayoutConfig) -> Result<Self, LayoutError> {
        let mut model = Self::new(snapshot.shelf, config)?;
        for segment in &snapshot.segments {
            model.insert_segment(segment.id, segment.level, segment.height)?;
        }
        for segment in snapshot.segments {
            for mut placement in segment.placements {
                placement.segment_id = segment.id;
                model.insert_placement(placement)?;
            }
        }
        Ok(model)
    }

    /// Current state in persisted shape.
    #[must_use]
    pub fn snapshot(&self) -> ShelfSnapshot {
        ShelfSnapshot {
            shelf: self.shelf.clone(),
            segments: self
                .segments
                .iter()
                .map(|s| SegmentSnapshot {
                    id: s.id,
                    level: s.level,
                    height: s.height,
                    placements: s.placements.clone(),
                })
                .collect(),
        }
    }

    // ========================================================================
    // Queries
    // ========================================================================

    #[must_use]
    pub fn shelf(&self) -> &Shelf {
        &self.shelf
    }

    #[must_use]
    pub fn config(&self) -> &LayoutConfig {
        &self.config
    }

    /// Segments ordered by level.
    #[must_use]
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    #[must_use]
    pub fn segment(&self, id: SegmentId) -> Option<&Segment> {
        self.segments.iter().find(|s| s.id == id)
    }

    /// All placements, segment by segment.
    pub fn placements(&self) -> impl Iterator<Item = &Placement> + '_ {
        self.segments.iter().flat_map(|s| s.placements.iter())
    }

    #[must_use]
    pub fn placement(&self, id: PlacementId) -> Option<&Placement> {
        self.locate(id)
            .map(|(si, pi)| &self.segments[si].placements[pi])
    }

    #[must_use]
    pub fn placement_count(&self) -> usize {
        self.segments.iter().map(|s| s.placements.len()).sum()
    }

    /// Segment whose hit band `[top, bottom + margin)` contains `y`.
    #[must_use]
    pub fn segment_at(&self, y: f64) -> Option<&Segment> {
        let spans: Vec<VerticalSpan> = self.segments.iter().map(|s| s.span).collect();
        segment_index_at(y, &spans, self.config.segment_margin).map(|i| &self.segments[i])
    }

    /// `shelf.width - Σ occupied widths`.
    pub fn available_width(&self, segment_id: SegmentId) -> Result<f64, ModelError> {
        let segment = self
            .segment(segment_id)
            .ok_or(ModelError::UnknownSegment(segment_id))?;
        Ok(self.shelf.width - segment.used_width())
    }

    /// Total canvas height: `Σ (height + margin)`.
    #[must_use]
    pub fn canvas_height(&self) -> f64 {
        self.segments
            .iter()
            .map(|s| s.height + self.config.segment_margin)
            .sum()
    }

    /// Absolute model-space top of a placement's product box.
    #[must_use]
    pub fn placement_top(&self, id: PlacementId) -> Option<f64> {
        let (si, pi) = self.locate(id)?;
        let segment = &self.segments[si];
        let placement = &segment.placements[pi];
        Some(
            segment.span.top
                + placement_top_offset(
                    segment.height,
                    placement.product.height,
                    self.config.placement_padding,
                ),
        )
    }

    /// Spans computed with some heights replaced, without touching the model.
    #[must_use]
    pub fn spans_with_overrides(
        &self,
        overrides: &BTreeMap<SegmentId, f64>,
    ) -> Vec<(SegmentId, VerticalSpan)> {
        let mut top = 0.0;
        self.segments
            .iter()
            .map(|s| {
                let height = overrides.get(&s.id).copied().unwrap_or(s.height);
                let span = VerticalSpan::new(top, height);
                top += height + self.config.segment_margin;
                (s.id, span)
            })
            .collect()
    }

    /// Product-box tops for every placement, with some heights replaced.
    ///
    /// Placements in the overridden segment re-anchor to the new bottom edge;
    /// those in later segments shift with their span.
    #[must_use]
    pub fn placement_tops_with_overrides(
        &self,
        overrides: &BTreeMap<SegmentId, f64>,
    ) -> Vec<(PlacementId, f64)> {
        let padding = self.config.placement_padding;
        self.segments
            .iter()
            .zip(self.spans_with_overrides(overrides))
            .flat_map(|(segment, (_, span))| {
                segment.placements.iter().map(move |p| {
                    (
                        p.id,
                        span.top + placement_top_offset(span.height(), p.product.height, padding),
                    )
                })
            })
            .collect()
    }

    // ========================================================================
    // Validation
    // ========================================================================

    /// Geometric placement check: position, width, overlap, and height.
    ///
    /// Every violated check is reported.
    pub fn can_place(
        &self,
        segment_id: SegmentId,
        x_position: f64,
        occupied_width: f64,
        product_height: f64,
        exclude: Option<PlacementId>,
    ) -> Result<(), LayoutError> {
        let si = self.segment_index(segment_id)?;
        reject_if_any(self.geometry_violations(
            si,
            x_position,
            occupied_width,
            product_height,
            exclude,
        ))
    }

    /// Full placement check including product validity and face limits.
    pub fn check_placement(
        &self,
        segment_id: SegmentId,
        x_position: f64,
        product: &ProductSpec,
        face_count: u32,
        exclude: Option<PlacementId>,
    ) -> Result<Vec<Violation>, ModelError> {
        let si = self.segment_index(segment_id)?;
        if !product.is_valid() {
            return Ok(vec![Violation::InvalidProduct {
                width: product.width,
                height: product.height,
            }]);
        }
        let mut violations = self.geometry_violations(
            si,
            x_position,
            product.occupied_width(face_count),
            product.height,
            exclude,
        );
        if !product.faces.contains(face_count) {
            violations.push(Violation::FaceCountOutOfRange {
                face_count,
                min: product.faces.floor(),
                max: product.faces.max,
            });
        }
        Ok(violations)
    }

    /// Height change check: bounds plus every placement that would no longer fit.
    pub fn can_resize_segment(&self, segment_id: SegmentId, height: f64) -> Result<(), LayoutError> {
        let si = self.segment_index(segment_id)?;
        reject_if_any(self.height_violations(&self.segments[si], height))
    }

    /// Height violations without the segment lookup error path.
    pub fn check_segment_height(
        &self,
        segment_id: SegmentId,
        height: f64,
    ) -> Result<Vec<Violation>, ModelError> {
        let si = self.segment_index(segment_id)?;
        Ok(self.height_violations(&self.segments[si], height))
    }

    fn geometry_violations(
        &self,
        si: usize,
        x: f64,
        occupied_width: f64,
        product_height: f64,
        exclude: Option<PlacementId>,
    ) -> Vec<Violation> {
        let segment = &self.segments[si];
        let mut violations = Vec::new();
        if !x.is_finite() {
            violations.push(Violation::NonFinite {
                field: "x_position",
            });
            return violations;
        }
        if x < 0.0 {
            violations.push(Violation::NegativePosition { x });
        }
        let end = x + occupied_width;
        if end > self.shelf.width + EPSILON {
            violations.push(Violation::ExceedsShelfWidth {
                end,
                shelf_width: self.shelf.width,
            });
        }
        for other in segment
            .placements
            .iter()
            .filter(|p| Some(p.id) != exclude)
        {
            if intervals_overlap(x, end, other.x_position, other.end_position()) {
                violations.push(Violation::Overlap {
                    other: other.id,
                    start: other.x_position,
                    end: other.end_position(),
                });
            }
        }
        if product_height > segment.height + EPSILON {
            violations.push(Violation::ProductTooTall {
                product_height,
                segment_height: segment.height,
            });
        }
        violations
    }

    fn height_violations(&self, segment: &Segment, height: f64) -> Vec<Violation> {
        let mut violations = Vec::new();
        if let Some(v) = self.height_bounds_violation(height) {
            violations.push(v);
        }
        for placement in &segment.placements {
            if placement.product.height > height + EPSILON {
                violations.push(Violation::HeightBelowProduct {
                    placement: placement.id,
                    product_height: placement.product.height,
                    height,
                });
            }
        }
        violations
    }

    fn height_bounds_violation(&self, height: f64) -> Option<Violation> {
        let (min, max) = (self.config.min_segment_height, self.config.max_segment_height);
        if !height.is_finite() || height < min - EPSILON || height > max + EPSILON {
            return Some(Violation::HeightOutOfBounds { height, min, max });
        }
        None
    }

    // ========================================================================
    // Placement mutations
    // ========================================================================

    /// Insert a placement after validating it against its segment.
    pub fn insert_placement(&mut self, placement: Placement) -> Result<(), LayoutError> {
        if self.locate(placement.id).is_some() {
            return Err(ModelError::DuplicatePlacement(placement.id).into());
        }
        let violations = self.check_placement(
            placement.segment_id,
            placement.x_position,
            &placement.product,
            placement.face_count,
            None,
        )?;
        reject_if_any(violations)?;
        let si = self.segment_index(placement.segment_id)?;
        tracing::debug!(
            target: "shelfkit.layout",
            placement = placement.id.raw(),
            segment = placement.segment_id.raw(),
            x = placement.x_position,
            faces = placement.face_count,
            "placement inserted"
        );
        self.segments[si].insert_sorted(placement);
        Ok(())
    }

    /// Move a placement to `(segment, x)`. Returns the prior state.
    pub fn move_placement(
        &mut self,
        id: PlacementId,
        segment_id: SegmentId,
        x_position: f64,
    ) -> Result<PlacementState, LayoutError> {
        let current = self.require_placement(id)?;
        self.relocate(PlacementState {
            id,
            segment_id,
            x_position,
            face_count: current.face_count,
        })
    }

    /// Change the face count in place. Returns the prior state.
    pub fn resize_placement_faces(
        &mut self,
        id: PlacementId,
        face_count: u32,
    ) -> Result<PlacementState, LayoutError> {
        let current = self.require_placement(id)?;
        self.relocate(PlacementState {
            face_count,
            ..current.state()
        })
    }

    /// Apply a full position/face state atomically. Returns the prior state.
    pub fn apply_placement_state(
        &mut self,
        state: PlacementState,
    ) -> Result<PlacementState, LayoutError> {
        self.relocate(state)
    }

    /// Adopt a state without constraint checks.
    ///
    /// Only for reconciling with an authoritative remote record; ids must
    /// still resolve.
    pub fn force_placement_state(
        &mut self,
        state: PlacementState,
    ) -> Result<PlacementState, ModelError> {
        let (si, pi) = self
            .locate(state.id)
            .ok_or(ModelError::UnknownPlacement(state.id))?;
        let target = self.segment_index(state.segment_id)?;
        let mut placement = self.segments[si].placements.remove(pi);
        let previous = placement.state();
        placement.segment_id = state.segment_id;
        placement.x_position = state.x_position;
        placement.face_count = state.face_count;
        tracing::warn!(
            target: "shelfkit.layout",
            placement = state.id.raw(),
            segment = state.segment_id.raw(),
            x = state.x_position,
            faces = state.face_count,
            "placement state adopted without local validation"
        );
        self.segments[target].insert_sorted(placement);
        Ok(previous)
    }

    /// Insert a placement without constraint checks.
    ///
    /// Counterpart of [`Self::force_placement_state`] for remotely created
    /// records; ids must still be unique and resolve.
    pub fn adopt_placement(&mut self, placement: Placement) -> Result<(), ModelError> {
        if self.locate(placement.id).is_some() {
            return Err(ModelError::DuplicatePlacement(placement.id));
        }
        let si = self.segment_index(placement.segment_id)?;
        tracing::warn!(
            target: "shelfkit.layout",
            placement = placement.id.raw(),
            segment = placement.segment_id.raw(),
            x = placement.x_position,
            "placement adopted without local validation"
        );
        self.segments[si].insert_sorted(placement);
        Ok(())
    }

    /// Remove a placement, returning it by value.
    pub fn remove_placement(&mut self, id: PlacementId) -> Result<Placement, LayoutError> {
        let (si, pi) = self.locate(id).ok_or(ModelError::UnknownPlacement(id))?;
        let removed = self.segments[si].placements.remove(pi);
        tracing::debug!(
            target: "shelfkit.layout",
            placement = id.raw(),
            segment = removed.segment_id.raw(),
            "placement removed"
        );
        Ok(removed)
    }

    fn relocate(&mut self, state: PlacementState) -> Result<PlacementState, LayoutError> {
        let current = self.require_placement(state.id)?;
        let product = current.product;
        let violations = self.check_placement(
            state.segment_id,
            state.x_position,
            &product,
            state.face_count,
            Some(state.id),
        )?;
        reject_if_any(violations)?;

        let (si, pi) = self
            .locate(state.id)
            .ok_or(ModelError::UnknownPlacement(state.id))?;
        let target = self.segment_index(state.segment_id)?;
        let mut placement = self.segments[si].placements.remove(pi);
        let previous = placement.state();
        placement.segment_id = state.segment_id;
        placement.x_position = state.x_position;
        placement.face_count = state.face_count;
        tracing::debug!(
            target: "shelfkit.layout",
            placement = state.id.raw(),
            from_segment = previous.segment_id.raw(),
            to_segment = state.segment_id.raw(),
            x = state.x_position,
            faces = state.face_count,
            "placement updated"
        );
        self.segments[target].insert_sorted(placement);
        Ok(previous)
    }

    // ========================================================================
    // Segment mutations
    // ========================================================================

    /// Walk segments in level order assigning `top = Σ (height + margin)`.
    pub fn recalculate_positions(&mut self) {
        let margin = self.config.segment_margin;
        let mut top = 0.0;
        for segment in &mut self.segments {
            segment.span = VerticalSpan::new(top, segment.height);
            top += segment.height + margin;
        }
    }

    /// Apply a validated height change. Returns the prior height.
    pub fn resize_segment(&mut self, id: SegmentId, height: f64) -> Result<f64, LayoutError> {
        self.can_resize_segment(id, height)?;
        let si = self.segment_index(id)?;
        let previous = std::mem::replace(&mut self.segments[si].height, height);
        self.recalculate_positions();
        tracing::debug!(
            target: "shelfkit.layout",
            segment = id.raw(),
            from = previous,
            to = height,
            "segment resized"
        );
        Ok(previous)
    }

    /// Set a height without constraint checks, for authoritative remote
    /// records. Returns the prior height.
    pub fn force_segment_height(&mut self, id: SegmentId, height: f64) -> Result<f64, ModelError> {
        let si = self.segment_index(id)?;
        let previous = std::mem::replace(&mut self.segments[si].height, height);
        self.recalculate_positions();
        tracing::warn!(
            target: "shelfkit.layout",
            segment = id.raw(),
            from = previous,
            to = height,
            "segment height adopted without local validation"
        );
        Ok(previous)
    }

    /// Add an empty segment at a free level.
    pub fn insert_segment(
        &mut self,
        id: SegmentId,
        level: i32,
        height: f64,
    ) -> Result<(), LayoutError> {
        if self.segment(id).is_some() {
            return Err(ModelError::DuplicateSegment(id).into());
        }
        if let Some(existing) = self.segments.iter().find(|s| s.level == level) {
            return Err(ModelError::DuplicateLevel {
                level,
                existing: existing.id,
            }
            .into());
        }
        if let Some(v) = self.height_bounds_violation(height) {
            return Err(LayoutError::Rejected(vec![v]));
        }
        let at = self.segments.partition_point(|s| s.level < level);
        self.segments.insert(at, Segment::new(id, level, height));
        self.recalculate_positions();
        tracing::debug!(
            target: "shelfkit.layout",
            segment = id.raw(),
            level,
            height,
            "segment inserted"
        );
        Ok(())
    }

    /// Remove an empty segment, returning it.
    pub fn remove_segment(&mut self, id: SegmentId) -> Result<Segment, LayoutError> {
        let si = self.segment_index(id)?;
        let count = self.segments[si].placements.len();
        if count > 0 {
            return Err(LayoutError::Rejected(vec![Violation::SegmentNotEmpty {
                segment: id,
                count,
            }]));
        }
        let removed = self.segments.remove(si);
        self.recalculate_positions();
        tracing::debug!(target: "shelfkit.layout", segment = id.raw(), "segment removed");
        Ok(removed)
    }

    /// Next free level above the current top segment.
    #[must_use]
    pub fn next_level(&self) -> i32 {
        self.segments.last().map_or(1, |s| s.level + 1)
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn segment_index(&self, id: SegmentId) -> Result<usize, ModelError> {
        self.segments
            .iter()
            .position(|s| s.id == id)
            .ok_or(ModelError::UnknownSegment(id))
    }

    fn locate(&self, id: PlacementId) -> Option<(usize, usize)> {
        self.segments.iter().enumerate().find_map(|(si, s)| {
            s.placements
                .iter()
                .position(|p| p.id == id)
                .map(|pi| (si, pi))
        })
    }

    fn require_placement(&self, id: PlacementId) -> Result<&Placement, ModelError> {
        self.placement(id).ok_or(ModelError::UnknownPlacement(id))
    }

    /// Ids of every placement, used by consistency checks in tests.
    #[must_use]
    pub fn placement_ids(&self) -> BTreeSet<PlacementId> {
        self.placements().map(|p| p.id).collect()
    }
}
