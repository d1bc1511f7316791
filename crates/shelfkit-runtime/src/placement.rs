#![forbid(unsafe_code)]

//! Placement interaction controller: selection, drag-move, and face resize.
//!
//! ```text
//! Idle -> Selecting -> Dragging -> Idle
//!   \         \------> Idle (released below the drag threshold)
//!    \------> Resizing -> Idle
//! ```
//!
//! The controller never mutates the model. It reads the model for hit tests
//! and live validation, and emits a [`PlacementEffect`] per input. A commit
//! effect hands a request to the session, which runs the remote pipeline and
//! reports back through [`PlacementController::finish_commit`]. Until then
//! the placement is in flight and new gestures on it are refused.

use std::collections::BTreeSet;

use shelfkit_core::event::PointerId;
use shelfkit_core::geometry::{GridSnap, Point, ViewTransform};
use shelfkit_core::id::{PlacementId, SegmentId};
use shelfkit_layout::{
    LayoutModel, PlacementProposal, PlacementState, ValidationEngine, ValidationReport,
};
use thiserror::Error;

use crate::ports::DropFeedback;

/// Default view-space distance before a press turns into a drag.
pub const DEFAULT_DRAG_THRESHOLD: f64 = 3.0;

/// Where a drag would land.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DropTarget {
    pub segment_id: SegmentId,
    pub x_position: f64,
    pub valid: bool,
}

/// Lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PlacementInteractionState {
    Idle,
    Selecting {
        placement: PlacementId,
        pointer: PointerId,
        /// Press position in view units.
        origin: Point,
        /// Press offset from the placement origin in view units.
        drag_offset: Point,
    },
    Dragging {
        placement: PlacementId,
        pointer: PointerId,
        drag_offset: Point,
        /// Committed state to revert to.
        from: PlacementState,
        preview: Option<DropTarget>,
    },
    Resizing {
        placement: PlacementId,
        from: PlacementState,
        face_count: u32,
        valid: bool,
    },
}

/// Input accepted by [`PlacementController::apply_event`]. Positions are in
/// view units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PlacementInput {
    PointerDown { pointer: PointerId, position: Point },
    PointerMove { pointer: PointerId, position: Point },
    PointerUp { pointer: PointerId, position: Point },
    /// Start a face-count resize of the selected or given placement.
    BeginResize { placement: PlacementId },
    /// Preview a face count while resizing.
    ResizeTo { face_count: u32 },
    /// Finish the resize.
    EndResize,
    /// Abandon the current gesture.
    Cancel,
}

/// Why a gesture ended without a commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbandonReason {
    /// Released outside every segment.
    NoDropTarget,
    /// Released on a target that failed local validation.
    Invalid(Vec<String>),
    /// Released where it started.
    Unchanged,
    Canceled,
    /// The placement disappeared from the model mid-gesture.
    TargetMissing,
}

/// Requested move, produced on a valid drop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MoveRequest {
    pub placement: PlacementId,
    pub from: PlacementState,
    pub to: PlacementState,
}

/// Explicit no-op diagnostics for inputs that are safely ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlacementNoopReason {
    IdleWithoutActiveGesture,
    GestureInProgress,
    PointerMismatch,
    ThresholdNotReached,
    CommitInFlight,
    UnknownPlacement,
    NotResizing,
}

/// Effect emitted by one lifecycle step.
#[derive(Debug, Clone, PartialEq)]
pub enum PlacementEffect {
    Selected {
        placement: PlacementId,
        previous: Option<PlacementId>,
    },
    Deselected {
        previous: PlacementId,
    },
    /// Released without crossing the drag threshold; selection stays.
    Released {
        placement: PlacementId,
    },
    /// Threshold crossed; `preview` is the drop feedback at that position.
    DragStarted {
        placement: PlacementId,
        drag_offset: Point,
        preview: DropFeedback,
    },
    Preview(DropFeedback),
    CommitMove(MoveRequest),
    ResizeStarted {
        placement: PlacementId,
        face_count: u32,
    },
    CommitResize(MoveRequest),
    Abandoned {
        placement: PlacementId,
        from: PlacementState,
        reason: AbandonReason,
    },
    Noop {
        reason: PlacementNoopReason,
    },
}

/// One state-machine transition.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacementTransition {
    pub transition_id: u64,
    pub from: PlacementInteractionState,
    pub to: PlacementInteractionState,
    pub effect: PlacementEffect,
}

#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum PlacementControllerError {
    #[error("drag threshold must be finite and >= 0, got {0}")]
    InvalidDragThreshold(f64),
}

/// Drives placement gestures against a read-only [`LayoutModel`].
#[derive(Debug, Clone)]
pub struct PlacementController {
    state: PlacementInteractionState,
    selected: Option<PlacementId>,
    in_flight: BTreeSet<PlacementId>,
    view: ViewTransform,
    grid: GridSnap,
    drag_threshold: f64,
    validator: ValidationEngine,
    transition_counter: u64,
}

impl Default for PlacementController {
    fn default() -> Self {
        Self {
            state: PlacementInteractionState::Idle,
            selected: None,
            in_flight: BTreeSet::new(),
            view: ViewTransform::default(),
            grid: GridSnap::default(),
            drag_threshold: DEFAULT_DRAG_THRESHOLD,
            validator: ValidationEngine::new(),
            transition_counter: 0,
        }
    }
}

impl PlacementController {
    pub fn new(grid: GridSnap, drag_threshold: f64) -> Result<Self, PlacementControllerError> {
        if !drag_threshold.is_finite() || drag_threshold < 0.0 {
            return Err(PlacementControllerError::InvalidDragThreshold(drag_threshold));
        }
        Ok(Self {
            grid,
            drag_threshold,
            ..Self::default()
        })
    }

    #[must_use]
    pub const fn state(&self) -> PlacementInteractionState {
        self.state
    }

    /// Whether a gesture is under way.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        !matches!(self.state, PlacementInteractionState::Idle)
    }

    #[must_use]
    pub const fn selected(&self) -> Option<PlacementId> {
        self.selected
    }

    #[must_use]
    pub fn view(&self) -> ViewTransform {
        self.view
    }

    /// Update scroll offset/zoom before feeding pointer input.
    pub fn set_view(&mut self, view: ViewTransform) {
        self.view = view;
    }

    #[must_use]
    pub fn grid(&self) -> GridSnap {
        self.grid
    }

    pub fn set_grid(&mut self, grid: GridSnap) {
        self.grid = grid;
    }

    #[must_use]
    pub fn is_in_flight(&self, id: PlacementId) -> bool {
        self.in_flight.contains(&id)
    }

    /// Guard `id` against new gestures until [`Self::finish_commit`].
    pub fn begin_commit(&mut self, id: PlacementId) -> bool {
        self.in_flight.insert(id)
    }

    /// Release the in-flight guard after a commit resolved either way.
    pub fn finish_commit(&mut self, id: PlacementId) {
        self.in_flight.remove(&id);
    }

    /// Snap a model-space x with the current grid.
    #[must_use]
    pub fn snap_x(&self, x: f64) -> f64 {
        self.grid.apply(x)
    }

    /// Select programmatically (side panel, catalog). Single-valued.
    pub fn select(&mut self, id: PlacementId) -> PlacementTransition {
        let from = self.state;
        let previous = self.selected.replace(id);
        self.emit(from, PlacementEffect::Selected {
            placement: id,
            previous,
        })
    }

    /// Clear the selection. `None` when nothing was selected.
    pub fn deselect(&mut self) -> Option<PlacementTransition> {
        let previous = self.selected.take()?;
        let from = self.state;
        Some(self.emit(from, PlacementEffect::Deselected { previous }))
    }

    /// Drop the selection if it points at a placement that no longer exists.
    pub fn prune_selection(&mut self, model: &LayoutModel) -> Option<PlacementTransition> {
        match self.selected {
            Some(id) if model.placement(id).is_none() => self.deselect(),
            _ => None,
        }
    }

    /// Unconditionally return to Idle. `None` if already idle.
    pub fn force_cancel(&mut self) -> Option<PlacementTransition> {
        let from = self.state;
        let (placement, state) = match from {
            PlacementInteractionState::Idle => return None,
            PlacementInteractionState::Selecting { placement, .. } => {
                self.state = PlacementInteractionState::Idle;
                return Some(self.emit(from, PlacementEffect::Released { placement }));
            }
            PlacementInteractionState::Dragging {
                placement, from, ..
            }
            | PlacementInteractionState::Resizing {
                placement, from, ..
            } => (placement, from),
        };
        self.state = PlacementInteractionState::Idle;
        Some(self.emit(from, PlacementEffect::Abandoned {
            placement,
            from: state,
            reason: AbandonReason::Canceled,
        }))
    }

    /// Placement under a view-space point, if any.
    #[must_use]
    pub fn hit_test(&self, model: &LayoutModel, position: Point) -> Option<PlacementId> {
        let point = self.view.to_model(position, Point::ZERO);
        let segment = model.segment_at(point.y)?;
        segment
            .placements()
            .iter()
            .find(|p| point.x >= p.x_position && point.x < p.end_position())
            .map(|p| p.id)
    }

    /// Apply one input and report the transition.
    pub fn apply_event(&mut self, model: &LayoutModel, input: &PlacementInput) -> PlacementTransition {
        let from = self.state;
        let effect = match (self.state, *input) {
            (PlacementInteractionState::Idle, PlacementInput::PointerDown { pointer, position }) => {
                self.on_press(model, pointer, position)
            }
            (PlacementInteractionState::Idle, PlacementInput::BeginResize { placement }) => {
                self.on_begin_resize(model, placement)
            }
            (PlacementInteractionState::Idle, PlacementInput::ResizeTo { .. })
            | (PlacementInteractionState::Idle, PlacementInput::EndResize) => noop(PlacementNoopReason::NotResizing),
            (PlacementInteractionState::Idle, _) => noop(PlacementNoopReason::IdleWithoutActiveGesture),

            (
                PlacementInteractionState::Selecting {
                    placement,
                    pointer,
                    origin,
                    drag_offset,
                },
                PlacementInput::PointerMove {
                    pointer: incoming,
                    position,
                },
            ) => {
                if incoming != pointer {
                    noop(PlacementNoopReason::PointerMismatch)
                } else if !crossed_drag_threshold(origin, position, self.drag_threshold) {
                    noop(PlacementNoopReason::ThresholdNotReached)
                } else {
                    match model.placement(placement) {
                        None => self.abandon_missing(placement),
                        Some(p) => {
                            let committed = p.state();
                            self.state = PlacementInteractionState::Dragging {
                                placement,
                                pointer,
                                drag_offset,
                                from: committed,
                                preview: None,
                            };
                            tracing::debug!(
                                target: "shelfkit.placement",
                                placement = placement.raw(),
                                "drag started"
                            );
                            // The first frame of a drag already previews.
                            match self.preview_drag(model, position) {
                                PlacementEffect::Preview(preview) => PlacementEffect::DragStarted {
                                    placement,
                                    drag_offset,
                                    preview,
                                },
                                other => other,
                            }
                        }
                    }
                }
            }
            (
                PlacementInteractionState::Selecting {
                    placement, pointer, ..
                },
                PlacementInput::PointerUp {
                    pointer: incoming, ..
                },
            ) => {
                if incoming != pointer {
                    noop(PlacementNoopReason::PointerMismatch)
                } else {
                    self.state = PlacementInteractionState::Idle;
                    PlacementEffect::Released { placement }
                }
            }
            (PlacementInteractionState::Selecting { placement, .. }, PlacementInput::Cancel) => {
                self.state = PlacementInteractionState::Idle;
                PlacementEffect::Released { placement }
            }
            (PlacementInteractionState::Selecting { .. }, _) => {
                noop(PlacementNoopReason::GestureInProgress)
            }

            (
                PlacementInteractionState::Dragging { pointer, .. },
                PlacementInput::PointerMove {
                    pointer: incoming,
                    position,
                },
            ) => {
                if incoming != pointer {
                    noop(PlacementNoopReason::PointerMismatch)
                } else {
                    self.preview_drag(model, position)
                }
            }
            (
                PlacementInteractionState::Dragging { pointer, .. },
                PlacementInput::PointerUp {
                    pointer: incoming,
                    position,
                },
            ) => {
                if incoming != pointer {
                    noop(PlacementNoopReason::PointerMismatch)
                } else {
                    // Re-preview at the release position so the drop matches it.
                    let feedback = self.preview_drag(model, position);
                    self.on_drop(feedback)
                }
            }
            (
                PlacementInteractionState::Dragging {
                    placement, from, ..
                },
                PlacementInput::Cancel,
            ) => {
                self.state = PlacementInteractionState::Idle;
                PlacementEffect::Abandoned {
                    placement,
                    from,
                    reason: AbandonReason::Canceled,
                }
            }
            (PlacementInteractionState::Dragging { .. }, _) => {
                noop(PlacementNoopReason::GestureInProgress)
            }

            (
                PlacementInteractionState::Resizing {
                    placement, from, ..
                },
                PlacementInput::ResizeTo { face_count },
            ) => self.preview_resize(model, placement, from, face_count),
            (
                PlacementInteractionState::Resizing {
                    placement,
                    from,
                    face_count,
                    valid,
                },
                PlacementInput::EndResize,
            ) => {
                self.state = PlacementInteractionState::Idle;
                if face_count == from.face_count {
                    PlacementEffect::Abandoned {
                        placement,
                        from,
                        reason: AbandonReason::Unchanged,
                    }
                } else if !valid {
                    let errors = self.resize_errors(model, from, face_count);
                    PlacementEffect::Abandoned {
                        placement,
                        from,
                        reason: AbandonReason::Invalid(errors),
                    }
                } else {
                    self.in_flight.insert(placement);
                    PlacementEffect::CommitResize(MoveRequest {
                        placement,
                        from,
                        to: PlacementState { face_count, ..from },
                    })
                }
            }
            (
                PlacementInteractionState::Resizing {
                    placement, from, ..
                },
                PlacementInput::Cancel,
            ) => {
                self.state = PlacementInteractionState::Idle;
                PlacementEffect::Abandoned {
                    placement,
                    from,
                    reason: AbandonReason::Canceled,
                }
            }
            (PlacementInteractionState::Resizing { .. }, _) => {
                noop(PlacementNoopReason::GestureInProgress)
            }
        };
        self.emit(from, effect)
    }

    /// Live validation for a placement that does not exist yet (catalog drop).
    pub fn preview_create(
        &self,
        model: &LayoutModel,
        proposal: &PlacementProposal,
    ) -> DropFeedback {
        let proposal = PlacementProposal {
            x_position: self.snap_x(proposal.x_position),
            ..*proposal
        };
        let report = self
            .validator
            .validate_placement(model, &proposal)
            .unwrap_or_else(|e| ValidationReport {
                valid: false,
                errors: vec![e.to_string()],
                violations: Vec::new(),
            });
        DropFeedback {
            placement_id: None,
            segment_id: Some(proposal.segment_id),
            x_position: proposal.x_position,
            face_count: proposal.face_count,
            valid: report.valid,
            errors: report.errors,
        }
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn emit(&mut self, from: PlacementInteractionState, effect: PlacementEffect) -> PlacementTransition {
        self.transition_counter = self.transition_counter.saturating_add(1);
        PlacementTransition {
            transition_id: self.transition_counter,
            from,
            to: self.state,
            effect,
        }
    }

    fn on_press(&mut self, model: &LayoutModel, pointer: PointerId, position: Point) -> PlacementEffect {
        let Some(placement) = self.hit_test(model, position) else {
            // Empty canvas clears the selection.
            return match self.selected.take() {
                Some(previous) => PlacementEffect::Deselected { previous },
                None => noop(PlacementNoopReason::IdleWithoutActiveGesture),
            };
        };
        if self.in_flight.contains(&placement) {
            return noop(PlacementNoopReason::CommitInFlight);
        }
        let Some(p) = model.placement(placement) else {
            return noop(PlacementNoopReason::UnknownPlacement);
        };
        let anchor = Point::new(p.x_position, model.placement_top(placement).unwrap_or(0.0));
        let drag_offset = self.view.drag_offset(position, anchor);
        self.state = PlacementInteractionState::Selecting {
            placement,
            pointer,
            origin: position,
            drag_offset,
        };
        let previous = self.selected.replace(placement);
        PlacementEffect::Selected {
            placement,
            previous,
        }
    }

    fn on_begin_resize(&mut self, model: &LayoutModel, placement: PlacementId) -> PlacementEffect {
        if self.in_flight.contains(&placement) {
            return noop(PlacementNoopReason::CommitInFlight);
        }
        let Some(p) = model.placement(placement) else {
            return noop(PlacementNoopReason::UnknownPlacement);
        };
        let from = p.state();
        self.state = PlacementInteractionState::Resizing {
            placement,
            from,
            face_count: from.face_count,
            valid: true,
        };
        PlacementEffect::ResizeStarted {
            placement,
            face_count: from.face_count,
        }
    }

    fn preview_drag(&mut self, model: &LayoutModel, position: Point) -> PlacementEffect {
        let PlacementInteractionState::Dragging {
            placement,
            pointer,
            drag_offset,
            from,
            ..
        } = self.state
        else {
            return noop(PlacementNoopReason::IdleWithoutActiveGesture);
        };
        let Some(p) = model.placement(placement) else {
            return self.abandon_missing(placement);
        };

        let origin = self.view.to_model(position, drag_offset);
        let pointer_y = self.view.to_model(position, Point::ZERO).y;
        let x_position = self.snap_x(origin.x);
        let Some(segment) = model.segment_at(pointer_y) else {
            self.state = PlacementInteractionState::Dragging {
                placement,
                pointer,
                drag_offset,
                from,
                preview: None,
            };
            return PlacementEffect::Preview(DropFeedback {
                placement_id: Some(placement),
                segment_id: None,
                x_position,
                face_count: p.face_count,
                valid: false,
                errors: vec!["not over a segment".to_string()],
            });
        };

        let errors = model
            .can_place(
                segment.id,
                x_position,
                p.occupied_width(),
                p.product.height,
                Some(placement),
            )
            .err()
            .map(|e| e.messages())
            .unwrap_or_default();
        let valid = errors.is_empty();
        self.state = PlacementInteractionState::Dragging {
            placement,
            pointer,
            drag_offset,
            from,
            preview: Some(DropTarget {
                segment_id: segment.id,
                x_position,
                valid,
            }),
        };
        PlacementEffect::Preview(DropFeedback {
            placement_id: Some(placement),
            segment_id: Some(segment.id),
            x_position,
            face_count: p.face_count,
            valid,
            errors,
        })
    }

    fn on_drop(&mut self, feedback: PlacementEffect) -> PlacementEffect {
        let PlacementInteractionState::Dragging {
            placement,
            from,
            preview,
            ..
        } = self.state
        else {
            // preview_drag already abandoned (target missing).
            return feedback;
        };
        self.state = PlacementInteractionState::Idle;
        let reason = match (preview, feedback) {
            (None, _) => AbandonReason::NoDropTarget,
            (Some(target), PlacementEffect::Preview(fb)) if !target.valid => {
                AbandonReason::Invalid(fb.errors)
            }
            (Some(target), _) if !target.valid => AbandonReason::Invalid(Vec::new()),
            (Some(target), _)
                if target.segment_id == from.segment_id && target.x_position == from.x_position =>
            {
                AbandonReason::Unchanged
            }
            (Some(target), _) => {
                self.in_flight.insert(placement);
                tracing::debug!(
                    target: "shelfkit.placement",
                    placement = placement.raw(),
                    segment = target.segment_id.raw(),
                    x = target.x_position,
                    "drop accepted locally"
                );
                return PlacementEffect::CommitMove(MoveRequest {
                    placement,
                    from,
                    to: PlacementState {
                        segment_id: target.segment_id,
                        x_position: target.x_position,
                        ..from
                    },
                });
            }
        };
        tracing::debug!(
            target: "shelfkit.placement",
            placement = placement.raw(),
            ?reason,
            "drag abandoned"
        );
        PlacementEffect::Abandoned {
            placement,
            from,
            reason,
        }
    }

    fn preview_resize(
        &mut self,
        model: &LayoutModel,
        placement: PlacementId,
        from: PlacementState,
        face_count: u32,
    ) -> PlacementEffect {
        if model.placement(placement).is_none() {
            return self.abandon_missing(placement);
        }
        let errors = self.resize_errors(model, from, face_count);
        let valid = errors.is_empty();
        self.state = PlacementInteractionState::Resizing {
            placement,
            from,
            face_count,
            valid,
        };
        PlacementEffect::Preview(DropFeedback {
            placement_id: Some(placement),
            segment_id: Some(from.segment_id),
            x_position: from.x_position,
            face_count,
            valid,
            errors,
        })
    }

    fn resize_errors(&self, model: &LayoutModel, from: PlacementState, face_count: u32) -> Vec<String> {
        let Some(p) = model.placement(from.id) else {
            return vec![format!("{} not found", from.id)];
        };
        let proposal = PlacementProposal::new(from.segment_id, p.product, from.x_position, face_count)
            .excluding(from.id);
        match self.validator.validate_placement(model, &proposal) {
            Ok(report) => report.errors,
            Err(e) => vec![e.to_string()],
        }
    }

    fn abandon_missing(&mut self, placement: PlacementId) -> PlacementEffect {
        let from = match self.state {
            PlacementInteractionState::Dragging { from, .. }
            | PlacementInteractionState::Resizing { from, .. } => from,
            _ => PlacementState {
                id: placement,
                segment_id: SegmentId::new(0),
                x_position: 0.0,
                face_count: 0,
            },
        };
        self.state = PlacementInteractionState::Idle;
        if self.selected == Some(placement) {
            self.selected = None;
        }
        tracing::debug!(
            target: "shelfkit.placement",
            placement = placement.raw(),
            "gesture target disappeared"
        );
        PlacementEffect::Abandoned {
            placement,
            from,
            reason: AbandonReason::TargetMissing,
        }
    }
}

fn noop(reason: PlacementNoopReason) -> PlacementEffect {
    PlacementEffect::Noop { reason }
}

fn crossed_drag_threshold(origin: Point, current: Point, threshold: f64) -> bool {
    origin.distance(current) >= threshold
}

#[cfg(test)]
mod tests {
    use super::*;
    use shelfkit_core::geometry::ZoomFactor;
    use shelfkit_core::id::{ProductId, ShelfId};
    use shelfkit_layout::{LayoutConfig, Placement, ProductSpec, Shelf};

    const P: PointerId = PointerId(1);

    /// Two segments: level 1 spans y 0..30, level 2 spans y 32..72.
    fn model() -> LayoutModel {
        let mut model =
            LayoutModel::new(Shelf::new(ShelfId::new(1), 90.0, 40.0), LayoutConfig::default())
                .unwrap();
        model.insert_segment(SegmentId::new(1), 1, 30.0).unwrap();
        model.insert_segment(SegmentId::new(2), 2, 40.0).unwrap();
        for (id, x) in [(1, 0.0), (2, 40.0)] {
            model
                .insert_placement(Placement::new(
                    PlacementId::new(id),
                    SegmentId::new(1),
                    ProductSpec::new(ProductId::new(id), 20.0, 20.0)
                        .with_faces(shelfkit_layout::FaceLimits::new(1, 3)),
                    x,
                    1,
                ))
                .unwrap();
        }
        model
    }

    fn down(x: f64, y: f64) -> PlacementInput {
        PlacementInput::PointerDown {
            pointer: P,
            position: Point::new(x, y),
        }
    }

    fn mv(x: f64, y: f64) -> PlacementInput {
        PlacementInput::PointerMove {
            pointer: P,
            position: Point::new(x, y),
        }
    }

    fn up(x: f64, y: f64) -> PlacementInput {
        PlacementInput::PointerUp {
            pointer: P,
            position: Point::new(x, y),
        }
    }

    #[test]
    fn press_selects_and_release_keeps_selection() {
        let model = model();
        let mut ctl = PlacementController::default();
        let t = ctl.apply_event(&model, &down(5.0, 20.0));
        assert_eq!(
            t.effect,
            PlacementEffect::Selected {
                placement: PlacementId::new(1),
                previous: None
            }
        );
        assert!(matches!(t.to, PlacementInteractionState::Selecting { .. }));

        let t = ctl.apply_event(&model, &mv(6.0, 20.0));
        assert_eq!(
            t.effect,
            PlacementEffect::Noop {
                reason: PlacementNoopReason::ThresholdNotReached
            }
        );

        let t = ctl.apply_event(&model, &up(6.0, 20.0));
        assert!(matches!(t.effect, PlacementEffect::Released { .. }));
        assert_eq!(ctl.selected(), Some(PlacementId::new(1)));
        assert!(!ctl.is_active());
    }

    #[test]
    fn selection_is_single_valued_and_empty_click_clears() {
        let model = model();
        let mut ctl = PlacementController::default();
        ctl.apply_event(&model, &down(5.0, 20.0));
        ctl.apply_event(&model, &up(5.0, 20.0));
        let t = ctl.apply_event(&model, &down(45.0, 20.0));
        assert_eq!(
            t.effect,
            PlacementEffect::Selected {
                placement: PlacementId::new(2),
                previous: Some(PlacementId::new(1))
            }
        );
        ctl.apply_event(&model, &up(45.0, 20.0));
        let t = ctl.apply_event(&model, &down(80.0, 20.0));
        assert_eq!(
            t.effect,
            PlacementEffect::Deselected {
                previous: PlacementId::new(2)
            }
        );
        assert_eq!(ctl.selected(), None);
    }

    #[test]
    fn drag_previews_and_commits_snapped_move() {
        let model = model();
        let mut ctl = PlacementController::default();
        // Grab placement 1 at 5 cm from its left edge.
        ctl.apply_event(&model, &down(5.0, 20.0));
        let t = ctl.apply_event(&model, &mv(15.0, 20.0));
        match t.effect {
            PlacementEffect::DragStarted { placement, preview, .. } => {
                assert_eq!(placement, PlacementId::new(1));
                assert_eq!(preview.placement_id, Some(PlacementId::new(1)));
                assert_eq!(preview.x_position, 10.0);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(t.to, PlacementInteractionState::Dragging { .. }));

        // Origin lands at 22 and snaps to 20, ending flush against placement 2.
        let t = ctl.apply_event(&model, &mv(27.0, 20.0));
        match t.effect {
            PlacementEffect::Preview(fb) => {
                assert_eq!(fb.x_position, 20.0);
                assert!(fb.valid, "{:?}", fb.errors);
            }
            other => panic!("unexpected {other:?}"),
        }

        // Origin 33 snaps to 35 and overlaps placement 2.
        let t = ctl.apply_event(&model, &mv(38.0, 20.0));
        match t.effect {
            PlacementEffect::Preview(fb) => {
                assert!(!fb.valid);
                assert!(fb.errors[0].contains("placement#2"));
            }
            other => panic!("unexpected {other:?}"),
        }

        // Release over level 2 with origin 62, snapped to 60.
        let t = ctl.apply_event(&model, &up(67.0, 50.0));
        match t.effect {
            PlacementEffect::CommitMove(req) => {
                assert_eq!(req.to.segment_id, SegmentId::new(2));
                assert_eq!(req.to.x_position, 60.0);
                assert_eq!(req.from.x_position, 0.0);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(ctl.is_in_flight(PlacementId::new(1)));
    }

    #[test]
    fn in_flight_placement_refuses_new_gesture() {
        let model = model();
        let mut ctl = PlacementController::default();
        ctl.begin_commit(PlacementId::new(1));
        let t = ctl.apply_event(&model, &down(5.0, 20.0));
        assert_eq!(
            t.effect,
            PlacementEffect::Noop {
                reason: PlacementNoopReason::CommitInFlight
            }
        );
        ctl.finish_commit(PlacementId::new(1));
        let t = ctl.apply_event(&model, &down(5.0, 20.0));
        assert!(matches!(t.effect, PlacementEffect::Selected { .. }));
    }

    #[test]
    fn invalid_or_outside_drop_abandons_without_commit() {
        let model = model();
        let mut ctl = PlacementController::default();
        ctl.apply_event(&model, &down(5.0, 20.0));
        ctl.apply_event(&model, &mv(20.0, 20.0));
        let t = ctl.apply_event(&model, &up(45.0, 20.0));
        assert!(matches!(
            t.effect,
            PlacementEffect::Abandoned {
                reason: AbandonReason::Invalid(_),
                ..
            }
        ));
        assert!(!ctl.is_in_flight(PlacementId::new(1)));

        ctl.apply_event(&model, &down(5.0, 20.0));
        ctl.apply_event(&model, &mv(20.0, 20.0));
        let t = ctl.apply_event(&model, &up(20.0, 500.0));
        assert!(matches!(
            t.effect,
            PlacementEffect::Abandoned {
                reason: AbandonReason::NoDropTarget,
                ..
            }
        ));
    }

    #[test]
    fn drop_at_origin_is_unchanged() {
        let model = model();
        let mut ctl = PlacementController::default();
        ctl.apply_event(&model, &down(5.0, 20.0));
        ctl.apply_event(&model, &mv(20.0, 20.0));
        let t = ctl.apply_event(&model, &up(6.0, 20.0));
        assert!(matches!(
            t.effect,
            PlacementEffect::Abandoned {
                reason: AbandonReason::Unchanged,
                ..
            }
        ));
    }

    #[test]
    fn zoom_and_scroll_are_applied() {
        let model = model();
        let mut ctl = PlacementController::default();
        ctl.set_view(ViewTransform::new(
            Point::new(100.0, 50.0),
            ZoomFactor::new(2.0).unwrap(),
        ));
        // Model (5, 20) is view (110, 90).
        let t = ctl.apply_event(&model, &down(110.0, 90.0));
        assert!(matches!(t.effect, PlacementEffect::Selected { .. }));
        ctl.apply_event(&model, &mv(150.0, 90.0));
        let t = ctl.apply_event(&model, &up(150.0, 90.0));
        match t.effect {
            PlacementEffect::CommitMove(req) => assert_eq!(req.to.x_position, 20.0),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn resize_previews_face_limits() {
        let model = model();
        let mut ctl = PlacementController::default();
        let t = ctl.apply_event(
            &model,
            &PlacementInput::BeginResize {
                placement: PlacementId::new(1),
            },
        );
        assert!(matches!(t.effect, PlacementEffect::ResizeStarted { face_count: 1, .. }));

        // 3 faces = 60 cm, overlaps placement 2 at 40.
        let t = ctl.apply_event(&model, &PlacementInput::ResizeTo { face_count: 3 });
        assert!(matches!(t.effect, PlacementEffect::Preview(ref fb) if !fb.valid));

        let t = ctl.apply_event(&model, &PlacementInput::ResizeTo { face_count: 2 });
        assert!(matches!(t.effect, PlacementEffect::Preview(ref fb) if fb.valid));

        let t = ctl.apply_event(&model, &PlacementInput::EndResize);
        match t.effect {
            PlacementEffect::CommitResize(req) => {
                assert_eq!(req.to.face_count, 2);
                assert_eq!(req.to.x_position, 0.0);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn cancel_returns_to_idle_with_revert() {
        let model = model();
        let mut ctl = PlacementController::default();
        ctl.apply_event(&model, &down(5.0, 20.0));
        ctl.apply_event(&model, &mv(20.0, 20.0));
        let t = ctl.apply_event(&model, &PlacementInput::Cancel);
        assert!(matches!(
            t.effect,
            PlacementEffect::Abandoned {
                reason: AbandonReason::Canceled,
                ..
            }
        ));
        assert_eq!(ctl.state(), PlacementInteractionState::Idle);
        assert!(ctl.force_cancel().is_none());
    }

    #[test]
    fn vanished_target_is_a_guarded_noop() {
        let mut model = model();
        let mut ctl = PlacementController::default();
        ctl.apply_event(&model, &down(5.0, 20.0));
        ctl.apply_event(&model, &mv(20.0, 20.0));
        model.remove_placement(PlacementId::new(1)).unwrap();
        let t = ctl.apply_event(&model, &mv(25.0, 20.0));
        assert!(matches!(
            t.effect,
            PlacementEffect::Abandoned {
                reason: AbandonReason::TargetMissing,
                ..
            }
        ));
        assert_eq!(ctl.selected(), None);
    }

    #[test]
    fn transition_ids_increase() {
        let model = model();
        let mut ctl = PlacementController::default();
        let a = ctl.apply_event(&model, &mv(0.0, 0.0));
        let b = ctl.apply_event(&model, &mv(0.0, 0.0));
        assert_eq!(b.transition_id, a.transition_id + 1);
    }

    #[test]
    fn rejects_bad_threshold() {
        assert!(PlacementController::new(GridSnap::default(), -1.0).is_err());
        assert!(PlacementController::new(GridSnap::default(), f64::NAN).is_err());
    }
}
