#![forbid(unsafe_code)]

//! Editing session: the composition root of one shelf editor.
//!
//! [`EditorSession`] owns the [`LayoutModel`], the undo history, and both
//! interaction controllers, and holds the four collaborator ports. It is the
//! only place the model is mutated. Every commit runs the same pipeline:
//!
//! ```text
//! local validation ─► remote validation ─► remote write ─► apply + record
//!        │                   │                  │
//!        └───────────────────┴──────────────────┴─► revert preview + notify
//! ```
//!
//! A commit never leaves the model half-changed: it ends either with the
//! mutation applied and recorded, or with the preview reverted and an error
//! notification. Undo and redo act on the local model only.

use std::collections::BTreeMap;

use shelfkit_core::event::{EditorShortcut, KeyCode, Modifiers};
use shelfkit_core::geometry::{GeometryError, ViewTransform};
use shelfkit_core::id::{PlacementId, SegmentId};
use shelfkit_layout::{
    HeightPreset, LayoutError, LayoutModel, ModelError, Placement, PlacementProposal,
    PlacementState, ProductSpec, SegmentHeightSummary, ShelfSnapshot, ShelfStatistics,
    ValidationEngine, Violation,
};
use thiserror::Error;
use tracing::Instrument;

use crate::config::{ConfigError, EditorConfig};
use crate::placement::{
    AbandonReason, PlacementController, PlacementControllerError, PlacementEffect, PlacementInput,
    PlacementTransition,
};
use crate::ports::{
    ConfirmRequest, ConfirmationPrompt, DropFeedback, FixedConfirmation, ModelChange, NewPlacement,
    Notification, NotificationSink, NullRenderAdapter, PlacementUpdate, RemoteOutcome,
    RemoteSyncGateway, RenderAdapter, SelectionDetails, TracingNotificationSink, TransportError,
    ValidationRequest,
};
use crate::segment::{
    HeightChange, RevertReason, SegmentController, SegmentControllerError, SegmentEffect,
    SegmentInput, SegmentTransition,
};
use crate::undo::{CommandBatch, CommandError, CommandSource, HistoryManager, ShelfCommand};

/// Shown when a failure carries no structured reasons.
const GENERIC_FAILURE: &str = "Could not save changes. Please try again.";

/// Why a session could not be built.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Geometry(#[from] GeometryError),
    #[error("failed to load shelf: {0}")]
    Load(#[from] LayoutError),
    #[error(transparent)]
    Placement(#[from] PlacementControllerError),
    #[error(transparent)]
    Segment(#[from] SegmentControllerError),
}

/// Resolved failure of a commit pipeline, undo, or redo.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CommitError {
    #[error("rejected: {}", .0.join("; "))]
    LocalRejected(Vec<String>),
    #[error("rejected by server: {}", .0.join("; "))]
    RemoteRejected(Vec<String>),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("canceled")]
    Canceled,
    #[error("a commit for this item is already in flight")]
    InFlight,
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error(transparent)]
    History(#[from] CommandError),
}

impl CommitError {
    fn rejected(err: LayoutError) -> Self {
        match err {
            LayoutError::Model(model) => Self::Model(model),
            rejected @ LayoutError::Rejected(_) => Self::LocalRejected(rejected.messages()),
        }
    }

    /// Message for the notification sink; `None` for user cancellation.
    #[must_use]
    pub fn user_message(&self) -> Option<String> {
        match self {
            Self::Canceled => None,
            Self::LocalRejected(errors) | Self::RemoteRejected(errors) if !errors.is_empty() => {
                Some(errors.join("; "))
            }
            Self::LocalRejected(_) | Self::RemoteRejected(_) | Self::Transport(_) => {
                Some(GENERIC_FAILURE.to_string())
            }
            other => Some(other.to_string()),
        }
    }
}

fn remote_rejection(errors: Vec<String>) -> CommitError {
    CommitError::RemoteRejected(errors)
}

/// Builder for [`EditorSession`].
pub struct EditorSessionBuilder<G> {
    snapshot: ShelfSnapshot,
    gateway: G,
    config: EditorConfig,
    render: Box<dyn RenderAdapter>,
    confirmation: Box<dyn ConfirmationPrompt>,
    notifications: Box<dyn NotificationSink>,
}

impl<G: RemoteSyncGateway> EditorSessionBuilder<G> {
    #[must_use]
    pub fn config(mut self, config: EditorConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn render(mut self, render: impl RenderAdapter + 'static) -> Self {
        self.render = Box::new(render);
        self
    }

    #[must_use]
    pub fn confirmation(mut self, prompt: impl ConfirmationPrompt + 'static) -> Self {
        self.confirmation = Box::new(prompt);
        self
    }

    #[must_use]
    pub fn notifications(mut self, sink: impl NotificationSink + 'static) -> Self {
        self.notifications = Box::new(sink);
        self
    }

    pub fn build(self) -> Result<EditorSession<G>, SessionError> {
        let config = self.config.validated()?;
        let model = LayoutModel::from_snapshot(self.snapshot, config.layout)?;
        let placements =
            PlacementController::new(config.grid.grid_snap()?, config.interaction.drag_threshold)?;
        let segments = SegmentController::new(config.segments.change_tolerance)?;
        tracing::info!(
            target: "shelfkit.session",
            shelf = model.shelf().id.raw(),
            segments = model.segments().len(),
            placements = model.placement_count(),
            "editor session started"
        );
        let mut session = EditorSession {
            history: HistoryManager::new(config.history),
            model,
            placements,
            segments,
            validator: ValidationEngine::new(),
            gateway: self.gateway,
            render: self.render,
            confirmation: self.confirmation,
            notifications: self.notifications,
            config,
            next_batch_id: 1,
        };
        session.render_layout();
        session.render_statistics();
        Ok(session)
    }
}

/// One shelf open for editing.
pub struct EditorSession<G> {
    model: LayoutModel,
    history: HistoryManager<LayoutModel>,
    placements: PlacementController,
    segments: SegmentController,
    validator: ValidationEngine,
    gateway: G,
    render: Box<dyn RenderAdapter>,
    confirmation: Box<dyn ConfirmationPrompt>,
    notifications: Box<dyn NotificationSink>,
    config: EditorConfig,
    next_batch_id: u64,
}

impl<G: RemoteSyncGateway> EditorSession<G> {
    /// Start building a session over a loaded shelf.
    ///
    /// Defaults: [`EditorConfig::default`], a render adapter that drops every
    /// change, a prompt that declines every destructive operation, and
    /// notifications forwarded to `tracing`.
    pub fn builder(snapshot: ShelfSnapshot, gateway: G) -> EditorSessionBuilder<G> {
        EditorSessionBuilder {
            snapshot,
            gateway,
            config: EditorConfig::default(),
            render: Box::new(NullRenderAdapter),
            confirmation: Box::new(FixedConfirmation(false)),
            notifications: Box::new(TracingNotificationSink),
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    #[must_use]
    pub fn model(&self) -> &LayoutModel {
        &self.model
    }

    #[must_use]
    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    #[must_use]
    pub fn history(&self) -> &HistoryManager<LayoutModel> {
        &self.history
    }

    #[must_use]
    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    #[must_use]
    pub fn placement_controller(&self) -> &PlacementController {
        &self.placements
    }

    #[must_use]
    pub fn segment_controller(&self) -> &SegmentController {
        &self.segments
    }

    #[must_use]
    pub fn selected(&self) -> Option<PlacementId> {
        self.placements.selected()
    }

    #[must_use]
    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    #[must_use]
    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    #[must_use]
    pub fn statistics(&self) -> ShelfStatistics {
        ShelfStatistics::compute(&self.model)
    }

    #[must_use]
    pub fn segment_summary(&self) -> SegmentHeightSummary {
        SegmentHeightSummary::compute(&self.model)
    }

    /// Scroll offset and zoom for subsequent pointer input.
    pub fn set_view(&mut self, view: ViewTransform) {
        self.placements.set_view(view);
        self.segments.set_view(view);
    }

    /// Toggle grid snapping ("no-snap" mode when `false`).
    pub fn set_snap_enabled(&mut self, enabled: bool) {
        let grid = self.placements.grid().with_enabled(enabled);
        self.placements.set_grid(grid);
    }

    // ========================================================================
    // Selection
    // ========================================================================

    /// Select a placement. Returns `false` if it does not exist.
    pub fn select(&mut self, id: PlacementId) -> bool {
        let Some(details) = self.model.placement(id).map(SelectionDetails::from) else {
            return false;
        };
        self.placements.select(id);
        self.render.apply(ModelChange::SelectionChanged(Some(details)));
        true
    }

    pub fn deselect(&mut self) {
        if self.placements.deselect().is_some() {
            self.render.apply(ModelChange::SelectionChanged(None));
        }
    }

    // ========================================================================
    // Pointer and keyboard input
    // ========================================================================

    /// Feed placement input and run any commit it produces.
    ///
    /// `Err` only when a drop or resize reached the commit pipeline and
    /// failed; the preview has already been reverted and reported.
    pub async fn dispatch_placement_input(
        &mut self,
        input: &PlacementInput,
    ) -> Result<PlacementTransition, CommitError> {
        let transition = self.placements.apply_event(&self.model, input);
        match &transition.effect {
            PlacementEffect::Selected { placement, .. } => {
                let details = self.model.placement(*placement).map(SelectionDetails::from);
                self.render.apply(ModelChange::SelectionChanged(details));
            }
            PlacementEffect::Deselected { .. } => {
                self.render.apply(ModelChange::SelectionChanged(None));
            }
            PlacementEffect::Preview(feedback)
            | PlacementEffect::DragStarted {
                preview: feedback, ..
            } => {
                self.render
                    .apply(ModelChange::DropTargetHighlighted(feedback.clone()));
            }
            PlacementEffect::Abandoned {
                placement,
                from,
                reason,
            } => {
                self.render.apply(ModelChange::DropTargetCleared);
                if self.model.placement(*placement).is_some() {
                    self.render.apply(ModelChange::PlacementReverted(*from));
                } else {
                    self.render.apply(ModelChange::SelectionChanged(None));
                }
                if let AbandonReason::Invalid(errors) = reason {
                    let message = if errors.is_empty() {
                        GENERIC_FAILURE.to_string()
                    } else {
                        errors.join("; ")
                    };
                    self.notifications.notify(Notification::error(message));
                }
            }
            PlacementEffect::CommitMove(request) | PlacementEffect::CommitResize(request) => {
                let (from, to) = (request.from, request.to);
                self.render.apply(ModelChange::DropTargetCleared);
                let result = self.guarded_placement_update(from, to).await;
                return result.map(|_| transition);
            }
            PlacementEffect::Noop { reason } => {
                tracing::trace!(target: "shelfkit.placement", ?reason, "input ignored");
            }
            PlacementEffect::Released { .. } | PlacementEffect::ResizeStarted { .. } => {}
        }
        Ok(transition)
    }

    /// Feed segment-height input and run any commit it produces.
    pub async fn dispatch_segment_input(
        &mut self,
        input: &SegmentInput,
    ) -> Result<SegmentTransition, CommitError> {
        let transition = self.segments.apply_event(&self.model, input);
        match &transition.effect {
            SegmentEffect::PreviewUpdated(preview) => {
                self.render
                    .apply(ModelChange::LayoutRecalculated(preview.spans.clone()));
                self.render.apply(ModelChange::PlacementsRepositioned(
                    preview.placement_tops.clone(),
                ));
            }
            SegmentEffect::Reverted { reason, .. } => {
                self.render_layout();
                if let RevertReason::Invalid(errors) = reason {
                    let message = if errors.is_empty() {
                        GENERIC_FAILURE.to_string()
                    } else {
                        errors.join("; ")
                    };
                    self.notifications.notify(Notification::error(message));
                }
            }
            SegmentEffect::CommitRequested(change) => {
                let change = *change;
                let result = self.guarded_height_commit(change).await;
                return result.map(|_| transition);
            }
            SegmentEffect::Noop { reason } => {
                tracing::trace!(target: "shelfkit.segment", ?reason, "input ignored");
            }
            SegmentEffect::PreviewStarted { .. } => {}
        }
        Ok(transition)
    }

    /// Handle an editor keyboard shortcut. Returns the shortcut recognized.
    pub async fn handle_key(
        &mut self,
        key: KeyCode,
        modifiers: Modifiers,
    ) -> Result<Option<EditorShortcut>, CommitError> {
        let Some(shortcut) = EditorShortcut::from_key(key, modifiers) else {
            return Ok(None);
        };
        match shortcut {
            EditorShortcut::Undo => {
                self.undo()?;
            }
            EditorShortcut::Redo => {
                self.redo()?;
            }
            EditorShortcut::Save => {
                self.notifications
                    .notify(Notification::info("Changes are saved automatically"));
            }
            EditorShortcut::DeleteSelection => {
                if let Some(id) = self.placements.selected() {
                    self.delete_placement(id).await?;
                }
            }
        }
        Ok(Some(shortcut))
    }

    // ========================================================================
    // Placement commits
    // ========================================================================

    /// Live feedback for a catalog item hovering over the shelf.
    pub fn preview_create(&mut self, proposal: &PlacementProposal) -> DropFeedback {
        let feedback = self.placements.preview_create(&self.model, proposal);
        self.render
            .apply(ModelChange::DropTargetHighlighted(feedback.clone()));
        feedback
    }

    pub fn clear_drop_target(&mut self) {
        self.render.apply(ModelChange::DropTargetCleared);
    }

    /// Create a placement from a catalog drop. `x_position` is snapped.
    pub async fn create_placement(
        &mut self,
        segment_id: SegmentId,
        product: ProductSpec,
        x_position: f64,
        face_count: u32,
    ) -> Result<PlacementId, CommitError> {
        let x_position = self.placements.snap_x(x_position);
        let span = tracing::debug_span!(
            "shelf.commit",
            kind = "create",
            segment = segment_id.raw(),
            product = product.id.raw()
        );
        let result = self
            .run_create(segment_id, product, x_position, face_count)
            .instrument(span)
            .await;
        self.render.apply(ModelChange::DropTargetCleared);
        match result {
            Ok(placement) => {
                let id = placement.id;
                self.render.apply(ModelChange::PlacementAdded(placement));
                self.after_commit(Notification::success("Product added"));
                Ok(id)
            }
            Err(err) => Err(self.report_failure(err)),
        }
    }

    /// Edit position and/or face count from the side panel.
    pub async fn edit_placement(
        &mut self,
        id: PlacementId,
        x_position: Option<f64>,
        face_count: Option<u32>,
    ) -> Result<PlacementState, CommitError> {
        let from = self
            .model
            .placement(id)
            .map(Placement::state)
            .ok_or(ModelError::UnknownPlacement(id))?;
        let to = PlacementState {
            x_position: x_position.unwrap_or(from.x_position),
            face_count: face_count.unwrap_or(from.face_count),
            ..from
        };
        if to == from {
            return Ok(from);
        }
        if !self.placements.begin_commit(id) {
            return Err(CommitError::InFlight);
        }
        self.guarded_placement_update(from, to).await
    }

    /// Delete a placement after confirmation.
    pub async fn delete_placement(&mut self, id: PlacementId) -> Result<(), CommitError> {
        let product_id = self
            .model
            .placement(id)
            .map(|p| p.product.id)
            .ok_or(ModelError::UnknownPlacement(id))?;
        if self.placements.is_in_flight(id) {
            return Err(CommitError::InFlight);
        }
        let request = ConfirmRequest::DeletePlacement {
            placement_id: id,
            product_id,
        };
        if !self.confirmation.confirm(&request) {
            tracing::debug!(target: "shelfkit.session", placement = id.raw(), "delete declined");
            return Err(CommitError::Canceled);
        }

        self.placements.begin_commit(id);
        let span = tracing::debug_span!("shelf.commit", kind = "delete", placement = id.raw());
        let result = self.run_delete(id).instrument(span).await;
        self.placements.finish_commit(id);
        match result {
            Ok(()) => {
                if self.placements.selected() == Some(id) {
                    self.deselect();
                }
                self.render.apply(ModelChange::PlacementRemoved(id));
                self.after_commit(Notification::success("Product removed"));
                Ok(())
            }
            Err(err) => Err(self.report_failure(err)),
        }
    }

    // ========================================================================
    // Segment commits
    // ========================================================================

    /// Commit a height for one segment through the remote pipeline.
    ///
    /// Returns the height now in the model. A value within the change
    /// tolerance of the current height is a no-op.
    pub async fn commit_segment_height(
        &mut self,
        segment_id: SegmentId,
        height: f64,
    ) -> Result<f64, CommitError> {
        let from = self
            .model
            .segment(segment_id)
            .map(|s| s.height)
            .ok_or(ModelError::UnknownSegment(segment_id))?;
        if !self.segments.is_change(from, height) {
            return Ok(from);
        }
        if !self.segments.begin_commit(segment_id) {
            return Err(CommitError::InFlight);
        }
        self.guarded_height_commit(HeightChange {
            segment: segment_id,
            from,
            to: height,
        })
        .await
    }

    /// Stage a height without committing; the layout preview includes it.
    pub fn stage_height(&mut self, segment_id: SegmentId, height: f64) -> Result<(), CommitError> {
        self.segments.stage(&self.model, segment_id, height)?;
        self.render_staged();
        Ok(())
    }

    pub fn stage_preset(&mut self, preset: HeightPreset) {
        self.segments.stage_preset(&self.model, preset);
        self.render_staged();
    }

    /// Stage content-fitted heights using the configured headroom and floor.
    pub fn stage_optimized(&mut self) {
        let segments = self.config.segments;
        self.segments
            .stage_optimized(&self.model, segments.optimize_headroom, segments.optimize_floor);
        self.render_staged();
    }

    pub fn discard_staged(&mut self) {
        self.segments.clear_staged();
        self.render_layout();
    }

    /// Persist every staged height as one all-or-nothing change.
    ///
    /// All changes are validated before any is sent. If a remote write
    /// fails, segments already updated are restored locally and a
    /// compensating write is sent for each. Returns the number of segments
    /// changed.
    pub async fn apply_staged_heights(&mut self) -> Result<usize, CommitError> {
        let changes = self.segments.pending_changes(&self.model);
        if changes.is_empty() {
            self.segments.clear_staged();
            self.render_layout();
            self.notifications
                .notify(Notification::info("No height changes to apply"));
            return Ok(0);
        }
        let report = self.segments.validate_staged(&self.model)?;
        if !report.valid {
            return Err(self.report_failure(CommitError::LocalRejected(report.errors)));
        }
        if changes.iter().any(|c| self.segments.is_in_flight(c.segment)) {
            return Err(CommitError::InFlight);
        }
        for change in &changes {
            self.segments.begin_commit(change.segment);
        }

        let batch_id = self.next_batch_id;
        self.next_batch_id += 1;
        let span = tracing::debug_span!(
            "shelf.commit",
            kind = "bulk_height",
            batch = batch_id,
            count = changes.len()
        );
        let result = self
            .run_bulk_heights(&changes, batch_id)
            .instrument(span)
            .await;
        for change in &changes {
            self.segments.finish_commit(change.segment);
        }
        match result {
            Ok(batch) => {
                let count = batch.len();
                self.history.push(Box::new(batch));
                self.segments.clear_staged();
                for segment in self.model.segments() {
                    if changes.iter().any(|c| c.segment == segment.id) {
                        self.render.apply(ModelChange::SegmentResized {
                            segment_id: segment.id,
                            height: segment.height,
                        });
                    }
                }
                self.render_layout();
                self.after_commit(Notification::success(format!(
                    "Updated {count} segment height(s)"
                )));
                Ok(count)
            }
            Err(err) => Err(self.report_failure(err)),
        }
    }

    /// Add an empty segment above the current top level.
    pub fn add_segment(&mut self, id: SegmentId, height: f64) -> Result<SegmentId, CommitError> {
        let level = self.model.next_level();
        if let Err(err) = self.model.insert_segment(id, level, height) {
            return Err(self.report_failure(CommitError::rejected(err)));
        }
        self.history
            .push(Box::new(ShelfCommand::create_segment(id, level, height)));
        self.render.apply(ModelChange::SegmentAdded {
            segment_id: id,
            level,
            height,
        });
        self.render_layout();
        self.after_commit(Notification::success("Segment added"));
        Ok(id)
    }

    /// Remove an empty segment after confirmation.
    pub fn remove_segment(&mut self, id: SegmentId) -> Result<(), CommitError> {
        let (level, height, count) = self
            .model
            .segment(id)
            .map(|s| (s.level, s.height, s.placements().len()))
            .ok_or(ModelError::UnknownSegment(id))?;
        if count > 0 {
            let violation = Violation::SegmentNotEmpty { segment: id, count };
            return Err(self.report_failure(CommitError::LocalRejected(vec![violation.to_string()])));
        }
        let request = ConfirmRequest::DeleteSegment {
            segment_id: id,
            level,
        };
        if !self.confirmation.confirm(&request) {
            return Err(CommitError::Canceled);
        }
        if let Err(err) = self.model.remove_segment(id) {
            return Err(self.report_failure(CommitError::rejected(err)));
        }
        self.segments.unstage(id);
        self.history
            .push(Box::new(ShelfCommand::delete_segment(id, level, height)));
        self.render.apply(ModelChange::SegmentRemoved(id));
        self.render_layout();
        self.after_commit(Notification::success("Segment removed"));
        Ok(())
    }

    // ========================================================================
    // History
    // ========================================================================

    /// Undo the most recent edit locally. `Ok(None)` when there is nothing
    /// to undo.
    pub fn undo(&mut self) -> Result<Option<String>, CommitError> {
        self.cancel_gestures();
        let outcome = self.history.undo(&mut self.model);
        self.after_history(outcome, "Undone")
    }

    /// Redo the most recently undone edit locally.
    pub fn redo(&mut self) -> Result<Option<String>, CommitError> {
        self.cancel_gestures();
        let outcome = self.history.redo(&mut self.model);
        self.after_history(outcome, "Redone")
    }

    #[must_use]
    pub fn next_undo_description(&self) -> Option<&str> {
        self.history.next_undo_description()
    }

    #[must_use]
    pub fn next_redo_description(&self) -> Option<&str> {
        self.history.next_redo_description()
    }

    // ========================================================================
    // Pipelines
    // ========================================================================

    /// Run an update whose in-flight guard is already held, then release it.
    async fn guarded_placement_update(
        &mut self,
        from: PlacementState,
        to: PlacementState,
    ) -> Result<PlacementState, CommitError> {
        let span = tracing::debug_span!(
            "shelf.commit",
            kind = "update",
            placement = from.id.raw(),
            segment = to.segment_id.raw()
        );
        let result = self.run_update(from, to).instrument(span).await;
        self.placements.finish_commit(from.id);
        match result {
            Ok(applied) => {
                self.render.apply(ModelChange::PlacementUpdated(applied));
                self.refresh_selection();
                let message = if applied.face_count != from.face_count
                    && applied.segment_id == from.segment_id
                    && applied.x_position == from.x_position
                {
                    "Faces updated"
                } else {
                    "Product moved"
                };
                self.after_commit(Notification::success(message));
                Ok(applied)
            }
            Err(err) => {
                if self.model.placement(from.id).is_some() {
                    self.render.apply(ModelChange::PlacementReverted(from));
                }
                Err(self.report_failure(err))
            }
        }
    }

    async fn run_update(
        &mut self,
        from: PlacementState,
        to: PlacementState,
    ) -> Result<PlacementState, CommitError> {
        let product = self
            .model
            .placement(from.id)
            .map(|p| p.product)
            .ok_or(ModelError::UnknownPlacement(from.id))?;
        let proposal = PlacementProposal::new(to.segment_id, product, to.x_position, to.face_count)
            .excluding(from.id);
        let report = self.validator.validate_placement(&self.model, &proposal)?;
        if !report.valid {
            tracing::info!(target: "shelfkit.session", errors = ?report.errors, "update rejected locally");
            return Err(CommitError::LocalRejected(report.errors));
        }

        self.remote_validate(ValidationRequest {
            segment_id: to.segment_id,
            product_id: product.id,
            x_position: to.x_position,
            face_count: to.face_count,
            exclude_placement_id: Some(from.id),
        })
        .await?;

        let record = match self
            .gateway
            .update_placement(from.id, &PlacementUpdate::from(to))
            .await
            .map_err(log_transport)?
        {
            RemoteOutcome::Accepted(record) => record,
            RemoteOutcome::Rejected(errors) => {
                tracing::info!(target: "shelfkit.session", ?errors, "update rejected by server");
                return Err(remote_rejection(errors));
            }
        };

        let applied = PlacementState {
            id: from.id,
            ..record.state()
        };
        match self.model.apply_placement_state(applied) {
            Ok(_) => {}
            Err(LayoutError::Rejected(_)) => {
                self.model.force_placement_state(applied)?;
            }
            Err(LayoutError::Model(err)) => return Err(err.into()),
        }
        self.history
            .push(Box::new(ShelfCommand::update_placement(from, applied)));
        tracing::debug!(target: "shelfkit.session", placement = from.id.raw(), "update committed");
        Ok(applied)
    }

    async fn run_create(
        &mut self,
        segment_id: SegmentId,
        product: ProductSpec,
        x_position: f64,
        face_count: u32,
    ) -> Result<Placement, CommitError> {
        let proposal = PlacementProposal::new(segment_id, product, x_position, face_count);
        let report = self.validator.validate_placement(&self.model, &proposal)?;
        if !report.valid {
            tracing::info!(target: "shelfkit.session", errors = ?report.errors, "create rejected locally");
            return Err(CommitError::LocalRejected(report.errors));
        }

        self.remote_validate(ValidationRequest {
            segment_id,
            product_id: product.id,
            x_position,
            face_count,
            exclude_placement_id: None,
        })
        .await?;

        let fields = NewPlacement {
            segment_id,
            product_id: product.id,
            x_position,
            face_count,
        };
        let record = match self
            .gateway
            .create_placement(&fields)
            .await
            .map_err(log_transport)?
        {
            RemoteOutcome::Accepted(record) => record,
            RemoteOutcome::Rejected(errors) => {
                tracing::info!(target: "shelfkit.session", ?errors, "create rejected by server");
                return Err(remote_rejection(errors));
            }
        };

        let placement = Placement::new(
            record.id,
            record.segment_id,
            product,
            record.x_position,
            record.face_count,
        );
        match self.model.insert_placement(placement.clone()) {
            Ok(()) => {}
            Err(LayoutError::Rejected(_)) => self.model.adopt_placement(placement.clone())?,
            Err(LayoutError::Model(err)) => return Err(err.into()),
        }
        self.history
            .push(Box::new(ShelfCommand::create_placement(placement.clone())));
        tracing::debug!(target: "shelfkit.session", placement = record.id.raw(), "create committed");
        Ok(placement)
    }

    async fn run_delete(&mut self, id: PlacementId) -> Result<(), CommitError> {
        match self
            .gateway
            .delete_placement(id)
            .await
            .map_err(log_transport)?
        {
            RemoteOutcome::Accepted(()) => {}
            RemoteOutcome::Rejected(errors) => {
                tracing::info!(target: "shelfkit.session", ?errors, "delete rejected by server");
                return Err(remote_rejection(errors));
            }
        }
        let removed = self.model.remove_placement(id).map_err(CommitError::rejected)?;
        self.history
            .push(Box::new(ShelfCommand::delete_placement(removed)));
        tracing::debug!(target: "shelfkit.session", placement = id.raw(), "delete committed");
        Ok(())
    }

    async fn guarded_height_commit(&mut self, change: HeightChange) -> Result<f64, CommitError> {
        let span = tracing::debug_span!(
            "shelf.commit",
            kind = "height",
            segment = change.segment.raw(),
            to = change.to
        );
        let result = self.run_height(change).instrument(span).await;
        self.segments.finish_commit(change.segment);
        match result {
            Ok(height) => {
                self.segments.unstage(change.segment);
                self.render.apply(ModelChange::SegmentResized {
                    segment_id: change.segment,
                    height,
                });
                self.render_layout();
                self.after_commit(Notification::success("Segment height updated"));
                Ok(height)
            }
            Err(err) => {
                self.render_layout();
                Err(self.report_failure(err))
            }
        }
    }

    async fn run_height(&mut self, change: HeightChange) -> Result<f64, CommitError> {
        let report =
            self.validator
                .validate_segment_height(&self.model, change.segment, change.to)?;
        if !report.valid {
            tracing::info!(target: "shelfkit.session", errors = ?report.errors, "height rejected locally");
            return Err(CommitError::LocalRejected(report.errors));
        }
        let applied = self.write_height(change.segment, change.to).await?;
        self.history.push(Box::new(ShelfCommand::resize_segment(
            change.segment,
            change.from,
            applied,
        )));
        Ok(applied)
    }

    /// Remote height write followed by the local apply. Returns the height
    /// the backend stored.
    async fn write_height(&mut self, segment: SegmentId, height: f64) -> Result<f64, CommitError> {
        let record = match self
            .gateway
            .update_segment_height(segment, height)
            .await
            .map_err(log_transport)?
        {
            RemoteOutcome::Accepted(record) => record,
            RemoteOutcome::Rejected(errors) => {
                tracing::info!(target: "shelfkit.session", ?errors, "height rejected by server");
                return Err(remote_rejection(errors));
            }
        };
        match self.model.resize_segment(segment, record.height) {
            Ok(_) => {}
            Err(LayoutError::Rejected(_)) => {
                self.model.force_segment_height(segment, record.height)?;
            }
            Err(LayoutError::Model(err)) => return Err(err.into()),
        }
        Ok(record.height)
    }

    async fn run_bulk_heights(
        &mut self,
        changes: &[HeightChange],
        batch_id: u64,
    ) -> Result<CommandBatch<LayoutModel>, CommitError> {
        let mut batch =
            CommandBatch::new("Apply segment heights").with_source(CommandSource::Programmatic);
        let mut applied: Vec<HeightChange> = Vec::with_capacity(changes.len());
        for change in changes {
            match self.write_height(change.segment, change.to).await {
                Ok(height) => {
                    batch.push_executed(Box::new(
                        ShelfCommand::resize_segment(change.segment, change.from, height)
                            .with_source(CommandSource::Programmatic)
                            .with_batch(batch_id),
                    ));
                    applied.push(*change);
                }
                Err(err) => {
                    tracing::warn!(
                        target: "shelfkit.session",
                        segment = change.segment.raw(),
                        applied = applied.len(),
                        error = %err,
                        "bulk height apply failed, reverting"
                    );
                    self.revert_heights(&applied).await;
                    return Err(err);
                }
            }
        }
        Ok(batch)
    }

    /// Restore prior heights locally and ask the backend to do the same.
    async fn revert_heights(&mut self, applied: &[HeightChange]) {
        for change in applied.iter().rev() {
            if let Err(err) = self.model.force_segment_height(change.segment, change.from) {
                tracing::warn!(target: "shelfkit.session", segment = change.segment.raw(), error = %err, "local revert failed");
            }
            match self
                .gateway
                .update_segment_height(change.segment, change.from)
                .await
            {
                Ok(RemoteOutcome::Accepted(_)) => {}
                Ok(RemoteOutcome::Rejected(errors)) => {
                    tracing::warn!(target: "shelfkit.session", segment = change.segment.raw(), ?errors, "compensating write rejected");
                }
                Err(err) => {
                    tracing::warn!(target: "shelfkit.session", segment = change.segment.raw(), error = %err, "compensating write failed");
                }
            }
        }
    }

    async fn remote_validate(&self, request: ValidationRequest) -> Result<(), CommitError> {
        let verdict = self
            .gateway
            .validate_placement(&request)
            .await
            .map_err(log_transport)?;
        if verdict.valid {
            Ok(())
        } else {
            tracing::info!(target: "shelfkit.session", errors = ?verdict.errors, "server validation failed");
            Err(remote_rejection(verdict.errors))
        }
    }

    // ========================================================================
    // Render/notify helpers
    // ========================================================================

    fn after_commit(&mut self, notification: Notification) {
        self.render_statistics();
        self.render_history();
        self.notifications.notify(notification);
    }

    fn report_failure(&mut self, err: CommitError) -> CommitError {
        if let Some(message) = err.user_message() {
            self.notifications.notify(Notification::error(message));
        }
        err
    }

    fn after_history(
        &mut self,
        outcome: Option<Result<String, CommandError>>,
        verb: &str,
    ) -> Result<Option<String>, CommitError> {
        match outcome {
            None => Ok(None),
            Some(Ok(description)) => {
                self.render.apply(ModelChange::ModelRestored);
                self.render_layout();
                if self.placements.prune_selection(&self.model).is_some() {
                    self.render.apply(ModelChange::SelectionChanged(None));
                } else {
                    self.refresh_selection();
                }
                self.after_commit(Notification::info(format!("{verb}: {description}")));
                Ok(Some(description))
            }
            Some(Err(err)) => Err(self.report_failure(err.into())),
        }
    }

    fn cancel_gestures(&mut self) {
        if let Some(PlacementEffect::Abandoned { from, .. }) =
            self.placements.force_cancel().map(|t| t.effect)
        {
            self.render.apply(ModelChange::DropTargetCleared);
            self.render.apply(ModelChange::PlacementReverted(from));
        }
        if self.segments.force_cancel().is_some() {
            self.render_layout();
        }
    }

    fn refresh_selection(&mut self) {
        if let Some(id) = self.placements.selected() {
            let details = self.model.placement(id).map(SelectionDetails::from);
            self.render.apply(ModelChange::SelectionChanged(details));
        }
    }

    /// Committed spans and placement tops.
    fn render_layout(&mut self) {
        let committed = BTreeMap::new();
        let spans = self.model.spans_with_overrides(&committed);
        let tops = self.model.placement_tops_with_overrides(&committed);
        self.render.apply(ModelChange::LayoutRecalculated(spans));
        self.render.apply(ModelChange::PlacementsRepositioned(tops));
    }

    fn render_staged(&mut self) {
        let spans = self.segments.staged_spans(&self.model);
        let tops = self.segments.staged_placement_tops(&self.model);
        self.render.apply(ModelChange::LayoutRecalculated(spans));
        self.render.apply(ModelChange::PlacementsRepositioned(tops));
    }

    fn render_statistics(&mut self) {
        let statistics = self.statistics();
        self.render.apply(ModelChange::StatisticsUpdated(statistics));
    }

    fn render_history(&mut self) {
        self.render.apply(ModelChange::HistoryChanged {
            can_undo: self.history.can_undo(),
            can_redo: self.history.can_redo(),
        });
    }
}

fn log_transport(err: TransportError) -> CommitError {
    tracing::warn!(target: "shelfkit.session", error = %err, "transport failure");
    CommitError::Transport(err)
}

impl<G> std::fmt::Debug for EditorSession<G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EditorSession")
            .field("shelf", &self.model.shelf().id)
            .field("segments", &self.model.segments().len())
            .field("placements", &self.model.placement_count())
            .field("undo_depth", &self.history.undo_depth())
            .field("selected", &self.placements.selected())
            .finish_non_exhaustive()
    }
}
