#![forbid(unsafe_code)]

//! Segment height editing: live preview, commit, and staged bulk changes.
//!
//! A height edit starts from one of three controls (slider, numeric input,
//! or the drag handle under a segment), previews by recomputing vertical
//! spans with the uncommitted height, and ends in either a
//! [`HeightChange`] commit request or a revert to the committed height.
//! Changes within the tolerance of the committed height are treated as
//! unchanged.
//!
//! Staged changes (presets, optimization, several slider edits) are held
//! outside the model until the session applies them as one batch.

use std::collections::{BTreeMap, BTreeSet};

use shelfkit_core::event::PointerId;
use shelfkit_core::geometry::{Point, VerticalSpan, ViewTransform};
use shelfkit_core::id::{PlacementId, SegmentId};
use shelfkit_layout::{
    HeightPreset, LayoutModel, ModelError, ValidationEngine, ValidationReport, optimize_heights,
    preset_heights,
};
use thiserror::Error;

/// Smallest height difference that counts as a change.
pub const DEFAULT_CHANGE_TOLERANCE: f64 = 0.1;

/// Control driving a height preview.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HeightControl {
    Slider,
    Input,
    /// Drag handle; `origin_y` is the press position in view units.
    DragHandle { pointer: PointerId, origin_y: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SegmentInteractionState {
    Idle,
    Previewing {
        segment: SegmentId,
        committed: f64,
        preview: f64,
        valid: bool,
        control: HeightControl,
    },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SegmentInput {
    /// Slider or input gained focus on `segment`.
    Begin { segment: SegmentId, control: HeightControl },
    /// Slider/input value changed.
    Change { height: f64 },
    HandleDown {
        segment: SegmentId,
        pointer: PointerId,
        position: Point,
    },
    HandleMove { pointer: PointerId, position: Point },
    HandleUp { pointer: PointerId, position: Point },
    /// Slider released or input confirmed.
    Commit,
    Cancel,
}

/// Height change accepted locally and handed to the session.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeightChange {
    pub segment: SegmentId,
    pub from: f64,
    pub to: f64,
}

/// Preview frame for the render side.
#[derive(Debug, Clone, PartialEq)]
pub struct HeightPreview {
    pub segment: SegmentId,
    pub height: f64,
    pub spans: Vec<(SegmentId, VerticalSpan)>,
    /// Product-box tops of every placement at the preview height.
    pub placement_tops: Vec<(PlacementId, f64)>,
    pub valid: bool,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RevertReason {
    Canceled,
    Unchanged,
    Invalid(Vec<String>),
    TargetMissing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentNoopReason {
    IdleWithoutActiveGesture,
    GestureInProgress,
    PointerMismatch,
    CommitInFlight,
    UnknownSegment,
    NonFiniteHeight,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SegmentEffect {
    PreviewStarted { segment: SegmentId, height: f64 },
    PreviewUpdated(HeightPreview),
    CommitRequested(HeightChange),
    Reverted {
        segment: SegmentId,
        height: f64,
        reason: RevertReason,
    },
    Noop { reason: SegmentNoopReason },
}

#[derive(Debug, Clone, PartialEq)]
pub struct SegmentTransition {
    pub transition_id: u64,
    pub from: SegmentInteractionState,
    pub to: SegmentInteractionState,
    pub effect: SegmentEffect,
}

#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum SegmentControllerError {
    #[error("change tolerance must be finite and >= 0, got {0}")]
    InvalidTolerance(f64),
}

#[derive(Debug, Clone)]
pub struct SegmentController {
    state: SegmentInteractionState,
    view: ViewTransform,
    tolerance: f64,
    in_flight: BTreeSet<SegmentId>,
    staged: BTreeMap<SegmentId, f64>,
    validator: ValidationEngine,
    transition_counter: u64,
}

impl Default for SegmentController {
    fn default() -> Self {
        Self {
            state: SegmentInteractionState::Idle,
            view: ViewTransform::default(),
            tolerance: DEFAULT_CHANGE_TOLERANCE,
            in_flight: BTreeSet::new(),
            staged: BTreeMap::new(),
            validator: ValidationEngine::new(),
            transition_counter: 0,
        }
    }
}

impl SegmentController {
    pub fn new(tolerance: f64) -> Result<Self, SegmentControllerError> {
        if !tolerance.is_finite() || tolerance < 0.0 {
            return Err(SegmentControllerError::InvalidTolerance(tolerance));
        }
        Ok(Self {
            tolerance,
            ..Self::default()
        })
    }

    #[must_use]
    pub const fn state(&self) -> SegmentInteractionState {
        self.state
    }

    #[must_use]
    pub const fn is_active(&self) -> bool {
        !matches!(self.state, SegmentInteractionState::Idle)
    }

    #[must_use]
    pub const fn tolerance(&self) -> f64 {
        self.tolerance
    }

    pub fn set_view(&mut self, view: ViewTransform) {
        self.view = view;
    }

    /// Whether `a` and `b` differ by more than the tolerance.
    #[must_use]
    pub fn is_change(&self, a: f64, b: f64) -> bool {
        (a - b).abs() > self.tolerance
    }

    #[must_use]
    pub fn is_in_flight(&self, id: SegmentId) -> bool {
        self.in_flight.contains(&id)
    }

    pub fn begin_commit(&mut self, id: SegmentId) -> bool {
        self.in_flight.insert(id)
    }

    pub fn finish_commit(&mut self, id: SegmentId) {
        self.in_flight.remove(&id);
    }

    /// Abandon any preview. `None` when idle.
    pub fn force_cancel(&mut self) -> Option<SegmentTransition> {
        let from = self.state;
        let SegmentInteractionState::Previewing {
            segment, committed, ..
        } = from
        else {
            return None;
        };
        self.state = SegmentInteractionState::Idle;
        Some(self.emit(from, SegmentEffect::Reverted {
            segment,
            height: committed,
            reason: RevertReason::Canceled,
        }))
    }

    pub fn apply_event(&mut self, model: &LayoutModel, input: &SegmentInput) -> SegmentTransition {
        let from = self.state;
        let effect = match (self.state, *input) {
            (SegmentInteractionState::Idle, SegmentInput::Begin { segment, control }) => {
                self.start(model, segment, control)
            }
            (
                SegmentInteractionState::Idle,
                SegmentInput::HandleDown {
                    segment,
                    pointer,
                    position,
                },
            ) => self.start(model, segment, HeightControl::DragHandle {
                pointer,
                origin_y: position.y,
            }),
            (SegmentInteractionState::Idle, _) => noop(SegmentNoopReason::IdleWithoutActiveGesture),

            (
                SegmentInteractionState::Previewing {
                    control: HeightControl::Slider | HeightControl::Input,
                    ..
                },
                SegmentInput::Change { height },
            ) => self.preview(model, height),
            (
                SegmentInteractionState::Previewing {
                    control: HeightControl::Slider | HeightControl::Input,
                    ..
                },
                SegmentInput::Commit,
            ) => self.commit(model),

            (
                SegmentInteractionState::Previewing {
                    committed,
                    control: HeightControl::DragHandle { pointer, origin_y },
                    ..
                },
                SegmentInput::HandleMove {
                    pointer: incoming,
                    position,
                },
            ) => {
                if incoming != pointer {
                    noop(SegmentNoopReason::PointerMismatch)
                } else {
                    let height = self.drag_height(model, committed, origin_y, position.y);
                    self.preview(model, height)
                }
            }
            (
                SegmentInteractionState::Previewing {
                    committed,
                    control: HeightControl::DragHandle { pointer, origin_y },
                    ..
                },
                SegmentInput::HandleUp {
                    pointer: incoming,
                    position,
                },
            ) => {
                if incoming != pointer {
                    noop(SegmentNoopReason::PointerMismatch)
                } else {
                    let height = self.drag_height(model, committed, origin_y, position.y);
                    match self.preview(model, height) {
                        SegmentEffect::PreviewUpdated(_) => self.commit(model),
                        other => other,
                    }
                }
            }

            (SegmentInteractionState::Previewing { .. }, SegmentInput::Cancel) => {
                self.revert(RevertReason::Canceled)
            }
            (SegmentInteractionState::Previewing { .. }, _) => {
                noop(SegmentNoopReason::GestureInProgress)
            }
        };
        self.emit(from, effect)
    }

    // ========================================================================
    // Staged changes
    // ========================================================================

    /// Stage a height for `segment` without touching the model.
    pub fn stage(
        &mut self,
        model: &LayoutModel,
        segment: SegmentId,
        height: f64,
    ) -> Result<(), ModelError> {
        if model.segment(segment).is_none() {
            return Err(ModelError::UnknownSegment(segment));
        }
        self.staged.insert(segment, height);
        Ok(())
    }

    /// Stage every segment's height from a preset.
    pub fn stage_preset(&mut self, model: &LayoutModel, preset: HeightPreset) {
        self.staged.extend(preset_heights(model, preset));
        tracing::debug!(
            target: "shelfkit.segment",
            preset = preset.label(),
            staged = self.staged.len(),
            "preset staged"
        );
    }

    /// Stage the tallest-product-plus-headroom height for each segment.
    pub fn stage_optimized(&mut self, model: &LayoutModel, headroom: f64, floor: f64) {
        self.staged.extend(optimize_heights(model, headroom, floor));
    }

    pub fn unstage(&mut self, segment: SegmentId) -> Option<f64> {
        self.staged.remove(&segment)
    }

    pub fn clear_staged(&mut self) {
        self.staged.clear();
    }

    #[must_use]
    pub fn staged(&self) -> &BTreeMap<SegmentId, f64> {
        &self.staged
    }

    /// Staged heights that differ from the model by more than the tolerance.
    #[must_use]
    pub fn pending_changes(&self, model: &LayoutModel) -> Vec<HeightChange> {
        self.staged
            .iter()
            .filter_map(|(&segment, &to)| {
                let from = model.segment(segment)?.height;
                self.is_change(from, to).then_some(HeightChange { segment, from, to })
            })
            .collect()
    }

    /// Validate every pending change against the current model.
    pub fn validate_staged(&self, model: &LayoutModel) -> Result<ValidationReport, ModelError> {
        let changes: Vec<(SegmentId, f64)> = self
            .pending_changes(model)
            .iter()
            .map(|c| (c.segment, c.to))
            .collect();
        self.validator.validate_height_changes(model, &changes)
    }

    /// Spans as they would be with every staged height applied.
    #[must_use]
    pub fn staged_spans(&self, model: &LayoutModel) -> Vec<(SegmentId, VerticalSpan)> {
        model.spans_with_overrides(&self.staged)
    }

    /// Placement tops as they would be with every staged height applied.
    #[must_use]
    pub fn staged_placement_tops(&self, model: &LayoutModel) -> Vec<(PlacementId, f64)> {
        model.placement_tops_with_overrides(&self.staged)
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn emit(&mut self, from: SegmentInteractionState, effect: SegmentEffect) -> SegmentTransition {
        self.transition_counter = self.transition_counter.saturating_add(1);
        SegmentTransition {
            transition_id: self.transition_counter,
            from,
            to: self.state,
            effect,
        }
    }

    fn start(&mut self, model: &LayoutModel, segment: SegmentId, control: HeightControl) -> SegmentEffect {
        if self.in_flight.contains(&segment) {
            return noop(SegmentNoopReason::CommitInFlight);
        }
        let Some(s) = model.segment(segment) else {
            return noop(SegmentNoopReason::UnknownSegment);
        };
        self.state = SegmentInteractionState::Previewing {
            segment,
            committed: s.height,
            preview: s.height,
            valid: true,
            control,
        };
        SegmentEffect::PreviewStarted {
            segment,
            height: s.height,
        }
    }

    /// `committed + Δy / zoom`, held inside the configured height bounds.
    fn drag_height(&self, model: &LayoutModel, committed: f64, origin_y: f64, y: f64) -> f64 {
        let config = model.config();
        let delta = (y - origin_y) / self.view.zoom.get();
        (committed + delta)
            .max(config.min_segment_height)
            .min(config.max_segment_height)
    }

    fn preview(&mut self, model: &LayoutModel, height: f64) -> SegmentEffect {
        let SegmentInteractionState::Previewing {
            segment,
            committed,
            control,
            ..
        } = self.state
        else {
            return noop(SegmentNoopReason::IdleWithoutActiveGesture);
        };
        if !height.is_finite() {
            return noop(SegmentNoopReason::NonFiniteHeight);
        }
        let errors = match self.validator.validate_segment_height(model, segment, height) {
            Ok(report) => report.errors,
            Err(_) => return self.revert(RevertReason::TargetMissing),
        };
        let valid = errors.is_empty();
        self.state = SegmentInteractionState::Previewing {
            segment,
            committed,
            preview: height,
            valid,
            control,
        };
        let overrides = BTreeMap::from([(segment, height)]);
        SegmentEffect::PreviewUpdated(HeightPreview {
            segment,
            height,
            spans: model.spans_with_overrides(&overrides),
            placement_tops: model.placement_tops_with_overrides(&overrides),
            valid,
            errors,
        })
    }

    fn commit(&mut self, model: &LayoutModel) -> SegmentEffect {
        let SegmentInteractionState::Previewing {
            segment,
            committed,
            preview,
            valid,
            ..
        } = self.state
        else {
            return noop(SegmentNoopReason::IdleWithoutActiveGesture);
        };
        if !self.is_change(committed, preview) {
            return self.revert(RevertReason::Unchanged);
        }
        if !valid {
            let errors = self
                .validator
                .validate_segment_height(model, segment, preview)
                .map(|r| r.errors)
                .unwrap_or_default();
            return self.revert(RevertReason::Invalid(errors));
        }
        self.state = SegmentInteractionState::Idle;
        self.in_flight.insert(segment);
        tracing::debug!(
            target: "shelfkit.segment",
            segment = segment.raw(),
            from = committed,
            to = preview,
            "height commit requested"
        );
        SegmentEffect::CommitRequested(HeightChange {
            segment,
            from: committed,
            to: preview,
        })
    }

    fn revert(&mut self, reason: RevertReason) -> SegmentEffect {
        let SegmentInteractionState::Previewing {
            segment, committed, ..
        } = self.state
        else {
            return noop(SegmentNoopReason::IdleWithoutActiveGesture);
        };
        self.state = SegmentInteractionState::Idle;
        SegmentEffect::Reverted {
            segment,
            height: committed,
            reason,
        }
    }
}

fn noop(reason: SegmentNoopReason) -> SegmentEffect {
    SegmentEffect::Noop { reason }
}
