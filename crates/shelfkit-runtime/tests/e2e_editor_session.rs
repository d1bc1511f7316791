//! End-to-end editing sessions against scripted collaborators.
//!
//! Every async pipeline is driven with `pollster::block_on`; the gateway
//! double answers immediately, so each await resolves on first poll.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;
use std::sync::{Arc, Mutex};

use shelfkit_core::event::{KeyCode, Modifiers, PointerId};
use shelfkit_core::geometry::Point;
use shelfkit_core::id::{PlacementId, ProductId, SegmentId, ShelfId};
use shelfkit_layout::{
    FaceLimits, HeightPreset, Placement, ProductSpec, SegmentSnapshot, Shelf, ShelfSnapshot,
};
use shelfkit_runtime::{
    CommitError, ConfirmRequest, ConfirmationPrompt, EditorConfig, EditorSession, HeightChange,
    HeightControl, ModelChange, NewPlacement, Notification, NotificationLevel, NotificationSink,
    PlacementEffect, PlacementInput, PlacementRecord, PlacementUpdate, RemoteOutcome,
    RemoteSyncGateway, RemoteValidation, RenderAdapter, SegmentEffect, SegmentInput,
    SegmentRecord, TransportError, ValidationRequest,
};

// ============================================================================
// Doubles
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
enum Call {
    Validate(ValidationRequest),
    Create(NewPlacement),
    Update(PlacementId, PlacementUpdate),
    Delete(PlacementId),
    Height(SegmentId, f64),
}

/// Failure injected into the next remote write.
#[derive(Debug, Clone)]
enum Fault {
    Reject(Vec<String>),
    Transport(TransportError),
}

#[derive(Debug, Default)]
struct ScriptedGateway {
    calls: RefCell<Vec<Call>>,
    next_id: Cell<u64>,
    validation_errors: RefCell<Option<Vec<String>>>,
    faults: RefCell<VecDeque<Option<Fault>>>,
    stored_height: Cell<Option<f64>>,
}

impl ScriptedGateway {
    fn new() -> Self {
        Self {
            next_id: Cell::new(100),
            ..Self::default()
        }
    }

    /// Queue outcomes for upcoming writes; `None` accepts.
    fn script(&self, outcomes: impl IntoIterator<Item = Option<Fault>>) {
        self.faults.borrow_mut().extend(outcomes);
    }

    fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    fn writes(&self) -> usize {
        self.calls
            .borrow()
            .iter()
            .filter(|c| !matches!(c, Call::Validate(_)))
            .count()
    }

    fn outcome<T>(&self, accepted: T) -> Result<RemoteOutcome<T>, TransportError> {
        match self.faults.borrow_mut().pop_front().flatten() {
            None => Ok(RemoteOutcome::Accepted(accepted)),
            Some(Fault::Reject(errors)) => Ok(RemoteOutcome::Rejected(errors)),
            Some(Fault::Transport(err)) => Err(err),
        }
    }
}

impl RemoteSyncGateway for ScriptedGateway {
    async fn validate_placement(
        &self,
        request: &ValidationRequest,
    ) -> Result<RemoteValidation, TransportError> {
        self.calls.borrow_mut().push(Call::Validate(*request));
        Ok(match self.validation_errors.borrow().clone() {
            Some(errors) => RemoteValidation {
                valid: false,
                errors,
            },
            None => RemoteValidation {
                valid: true,
                errors: Vec::new(),
            },
        })
    }

    async fn create_placement(
        &self,
        fields: &NewPlacement,
    ) -> Result<RemoteOutcome<PlacementRecord>, TransportError> {
        self.calls.borrow_mut().push(Call::Create(*fields));
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        self.outcome(PlacementRecord {
            id: PlacementId::new(id),
            segment_id: fields.segment_id,
            product_id: fields.product_id,
            x_position: fields.x_position,
            face_count: fields.face_count,
        })
    }

    async fn update_placement(
        &self,
        id: PlacementId,
        fields: &PlacementUpdate,
    ) -> Result<RemoteOutcome<PlacementRecord>, TransportError> {
        self.calls.borrow_mut().push(Call::Update(id, *fields));
        self.outcome(PlacementRecord {
            id,
            segment_id: fields.segment_id,
            product_id: ProductId::new(0),
            x_position: fields.x_position,
            face_count: fields.face_count,
        })
    }

    async fn delete_placement(&self, id: PlacementId) -> Result<RemoteOutcome<()>, TransportError> {
        self.calls.borrow_mut().push(Call::Delete(id));
        self.outcome(())
    }

    async fn update_segment_height(
        &self,
        id: SegmentId,
        height: f64,
    ) -> Result<RemoteOutcome<SegmentRecord>, TransportError> {
        self.calls.borrow_mut().push(Call::Height(id, height));
        let height = self.stored_height.take().unwrap_or(height);
        self.outcome(SegmentRecord { id, height })
    }
}

#[derive(Clone, Default)]
struct RenderLog(Rc<RefCell<Vec<ModelChange>>>);

impl RenderAdapter for RenderLog {
    fn apply(&mut self, change: ModelChange) {
        self.0.borrow_mut().push(change);
    }
}

impl RenderLog {
    fn take(&self) -> Vec<ModelChange> {
        std::mem::take(&mut *self.0.borrow_mut())
    }
}

#[derive(Clone, Default)]
struct NotificationLog(Rc<RefCell<Vec<Notification>>>);

impl NotificationSink for NotificationLog {
    fn notify(&mut self, notification: Notification) {
        self.0.borrow_mut().push(notification);
    }
}

impl NotificationLog {
    fn last(&self) -> Option<Notification> {
        self.0.borrow().last().cloned()
    }

    fn count(&self) -> usize {
        self.0.borrow().len()
    }
}

#[derive(Clone, Default)]
struct ScriptedConfirm {
    answers: Rc<RefCell<VecDeque<bool>>>,
    asked: Rc<RefCell<Vec<ConfirmRequest>>>,
}

impl ConfirmationPrompt for ScriptedConfirm {
    fn confirm(&mut self, request: &ConfirmRequest) -> bool {
        self.asked.borrow_mut().push(*request);
        self.answers.borrow_mut().pop_front().unwrap_or(false)
    }
}

// ============================================================================
// Fixtures
// ============================================================================

const P: PointerId = PointerId(1);
const S1: SegmentId = SegmentId(1);
const S2: SegmentId = SegmentId(2);
const S3: SegmentId = SegmentId(3);

fn product(id: u64, width: f64, height: f64) -> ProductSpec {
    ProductSpec::new(ProductId::new(id), width, height).with_faces(FaceLimits::new(1, 4))
}

fn segment(id: SegmentId, level: i32, height: f64, placements: Vec<Placement>) -> SegmentSnapshot {
    SegmentSnapshot {
        id,
        level,
        height,
        placements,
    }
}

fn shelf(segments: Vec<SegmentSnapshot>) -> ShelfSnapshot {
    ShelfSnapshot {
        shelf: Shelf::new(ShelfId::new(1), 90.0, 40.0),
        segments,
    }
}

/// One 40 cm segment holding product 1 (20×25) at x=0 as placement 1.
fn one_placement() -> ShelfSnapshot {
    shelf(vec![segment(
        S1,
        1,
        40.0,
        vec![Placement::new(PlacementId::new(1), S1, product(1, 20.0, 25.0), 0.0, 1)],
    )])
}

struct Harness {
    session: EditorSession<ScriptedGateway>,
    render: RenderLog,
    notes: NotificationLog,
    confirm: ScriptedConfirm,
}

fn harness(snapshot: ShelfSnapshot) -> Harness {
    let render = RenderLog::default();
    let notes = NotificationLog::default();
    let confirm = ScriptedConfirm::default();
    let session = EditorSession::builder(snapshot, ScriptedGateway::new())
        .render(render.clone())
        .notifications(notes.clone())
        .confirmation(confirm.clone())
        .build()
        .unwrap();
    render.take();
    Harness {
        session,
        render,
        notes,
        confirm,
    }
}

fn block_on<F: std::future::Future>(future: F) -> F::Output {
    pollster::block_on(future)
}

fn drag(session: &mut EditorSession<ScriptedGateway>, from: Point, to: Point) -> Result<PlacementEffect, CommitError> {
    block_on(session.dispatch_placement_input(&PlacementInput::PointerDown {
        pointer: P,
        position: from,
    }))?;
    block_on(session.dispatch_placement_input(&PlacementInput::PointerMove {
        pointer: P,
        position: to,
    }))?;
    block_on(session.dispatch_placement_input(&PlacementInput::PointerUp {
        pointer: P,
        position: to,
    }))
    .map(|t| t.effect)
}

// ============================================================================
// Scenarios
// ============================================================================

#[test]
fn width_overlap_and_height_scenario() {
    let mut h = harness(shelf(vec![segment(S1, 1, 30.0, Vec::new())]));
    let s = &mut h.session;

    let a = block_on(s.create_placement(S1, product(1, 20.0, 25.0), 0.0, 1)).unwrap();
    assert_eq!(s.model().placement(a).unwrap().occupied_width(), 20.0);

    let writes = s.gateway().writes();
    let err = block_on(s.create_placement(S1, product(2, 20.0, 25.0), 15.0, 1)).unwrap_err();
    match err {
        CommitError::LocalRejected(errors) => assert!(errors[0].contains("overlaps")),
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(s.gateway().writes(), writes, "no remote write after a local rejection");

    block_on(s.create_placement(S1, product(2, 20.0, 25.0), 20.0, 1)).unwrap();
    assert_eq!(s.model().placement_count(), 2);

    let err = block_on(s.commit_segment_height(S1, 20.0)).unwrap_err();
    assert!(matches!(err, CommitError::LocalRejected(ref e) if e.len() == 2));
    assert_eq!(s.model().segment(S1).unwrap().height, 30.0);

    assert_eq!(block_on(s.commit_segment_height(S1, 25.0)), Ok(25.0));
    assert_eq!(s.model().segment(S1).unwrap().height, 25.0);
}

#[test]
fn create_snaps_validates_remotely_and_undoes() {
    let mut h = harness(shelf(vec![segment(S1, 1, 30.0, Vec::new())]));
    let before = h.session.statistics();

    let id = block_on(h.session.create_placement(S1, product(7, 10.0, 20.0), 11.0, 2)).unwrap();
    assert_eq!(id, PlacementId::new(100));
    let placed = h.session.model().placement(id).unwrap();
    assert_eq!(placed.x_position, 10.0);
    assert_eq!(placed.occupied_width(), 20.0);

    let calls = h.session.gateway().calls();
    assert!(matches!(calls[0], Call::Validate(ref r) if r.x_position == 10.0 && r.exclude_placement_id.is_none()));
    assert!(matches!(calls[1], Call::Create(ref f) if f.x_position == 10.0));

    let changes = h.render.take();
    assert!(changes.iter().any(|c| matches!(c, ModelChange::PlacementAdded(p) if p.id == id)));
    assert!(changes.iter().any(|c| matches!(c, ModelChange::StatisticsUpdated(s) if s.total_faces == 2)));
    assert_eq!(h.notes.last().unwrap().level, NotificationLevel::Success);

    let after = h.session.statistics();
    assert_eq!(h.session.next_undo_description(), Some("Add product"));
    assert_eq!(h.session.undo(), Ok(Some("Add product".to_string())));
    assert_eq!(h.session.model().placement_count(), 0);
    assert_eq!(h.session.statistics(), before);

    assert_eq!(h.session.redo(), Ok(Some("Add product".to_string())));
    assert_eq!(h.session.statistics(), after);
    // Undo and redo never reach the gateway.
    assert_eq!(h.session.gateway().calls().len(), 2);
}

#[test]
fn drag_commits_move_and_records_history() {
    let mut h = harness(one_placement());
    let effect = drag(&mut h.session, Point::new(5.0, 30.0), Point::new(46.0, 30.0)).unwrap();
    assert!(matches!(effect, PlacementEffect::CommitMove(_)));

    let moved = h.session.model().placement(PlacementId::new(1)).unwrap();
    assert_eq!(moved.x_position, 40.0);
    assert!(!h.session.placement_controller().is_in_flight(PlacementId::new(1)));
    assert!(matches!(
        h.session.gateway().calls().last(),
        Some(Call::Update(_, update)) if update.x_position == 40.0
    ));
    assert_eq!(h.notes.last().unwrap().message, "Product moved");

    h.session.undo().unwrap();
    assert_eq!(h.session.model().placement(PlacementId::new(1)).unwrap().x_position, 0.0);
}

#[test]
fn remote_rejection_reverts_drag_and_notifies() {
    let mut h = harness(one_placement());
    h.session
        .gateway()
        .script([Some(Fault::Reject(vec!["Planogram is locked".into()]))]);
    let before = h.session.model().clone();

    let err = drag(&mut h.session, Point::new(5.0, 30.0), Point::new(46.0, 30.0)).unwrap_err();
    assert_eq!(err, CommitError::RemoteRejected(vec!["Planogram is locked".into()]));
    assert_eq!(h.session.model(), &before);
    assert!(!h.session.can_undo());
    assert!(!h.session.placement_controller().is_in_flight(PlacementId::new(1)));

    let changes = h.render.take();
    assert!(changes.iter().any(|c| matches!(c, ModelChange::PlacementReverted(s) if s.x_position == 0.0)));
    let note = h.notes.last().unwrap();
    assert_eq!(note.level, NotificationLevel::Error);
    assert_eq!(note.message, "Planogram is locked");
}

#[test]
fn transport_failure_uses_generic_message() {
    let mut h = harness(one_placement());
    h.session
        .gateway()
        .script([Some(Fault::Transport(TransportError::Timeout))]);
    let err = block_on(h.session.edit_placement(PlacementId::new(1), None, Some(2))).unwrap_err();
    assert_eq!(err, CommitError::Transport(TransportError::Timeout));
    assert_eq!(h.session.model().placement(PlacementId::new(1)).unwrap().face_count, 1);
    assert_eq!(
        h.notes.last().unwrap().message,
        "Could not save changes. Please try again."
    );
}

#[test]
fn server_validation_failure_blocks_write() {
    let mut h = harness(one_placement());
    *h.session.gateway().validation_errors.borrow_mut() = Some(vec!["Not allowed here".into()]);
    let err = block_on(h.session.edit_placement(PlacementId::new(1), Some(50.0), None)).unwrap_err();
    assert_eq!(err, CommitError::RemoteRejected(vec!["Not allowed here".into()]));
    assert_eq!(h.session.gateway().writes(), 0);
}

#[test]
fn edit_from_panel_changes_faces() {
    let mut h = harness(one_placement());
    h.session.select(PlacementId::new(1));
    let state = block_on(h.session.edit_placement(PlacementId::new(1), None, Some(3))).unwrap();
    assert_eq!(state.face_count, 3);
    assert_eq!(h.session.next_undo_description(), Some("Change faces"));
    assert_eq!(h.notes.last().unwrap().message, "Faces updated");
    let changes = h.render.take();
    assert!(changes.iter().any(|c| matches!(
        c,
        ModelChange::SelectionChanged(Some(d)) if d.face_count == 3 && d.occupied_width == 60.0
    )));

    // Beyond the product's face limit.
    let err = block_on(h.session.edit_placement(PlacementId::new(1), None, Some(5))).unwrap_err();
    assert!(matches!(err, CommitError::LocalRejected(_)));
}

#[test]
fn delete_requires_confirmation() {
    let mut h = harness(one_placement());
    let id = PlacementId::new(1);

    let notes_before = h.notes.count();
    assert_eq!(block_on(h.session.delete_placement(id)), Err(CommitError::Canceled));
    assert_eq!(h.session.model().placement_count(), 1);
    assert_eq!(h.session.gateway().writes(), 0);
    assert_eq!(h.notes.count(), notes_before, "declining is silent");

    h.confirm.answers.borrow_mut().push_back(true);
    h.session.select(id);
    let shortcut = block_on(h.session.handle_key(KeyCode::Delete, Modifiers::ctrl())).unwrap();
    assert!(shortcut.is_some());
    assert_eq!(h.session.model().placement_count(), 0);
    assert_eq!(h.session.selected(), None);
    assert_eq!(h.confirm.asked.borrow().len(), 2);
    let changes = h.render.take();
    assert!(changes.contains(&ModelChange::PlacementRemoved(id)));
    assert!(changes.contains(&ModelChange::SelectionChanged(None)));

    // Undo brings the full placement back.
    block_on(h.session.handle_key(KeyCode::Char('z'), Modifiers::ctrl())).unwrap();
    assert_eq!(h.session.model().placement(id).unwrap().product.id, ProductId::new(1));
}

#[test]
fn save_shortcut_reports_autosave() {
    let mut h = harness(one_placement());
    block_on(h.session.handle_key(KeyCode::Char('s'), Modifiers::ctrl())).unwrap();
    let note = h.notes.last().unwrap();
    assert_eq!(note.level, NotificationLevel::Info);
    assert_eq!(note.message, "Changes are saved automatically");
    assert_eq!(
        block_on(h.session.handle_key(KeyCode::Char('s'), Modifiers::none())),
        Ok(None)
    );
}

#[test]
fn remote_height_record_is_authoritative() {
    let mut h = harness(one_placement());
    h.session.gateway().stored_height.set(Some(45.0));
    assert_eq!(block_on(h.session.commit_segment_height(S1, 50.0)), Ok(45.0));
    assert_eq!(h.session.model().segment(S1).unwrap().height, 45.0);
    h.session.undo().unwrap();
    assert_eq!(h.session.model().segment(S1).unwrap().height, 40.0);
}

#[test]
fn height_within_tolerance_is_a_no_op() {
    let mut h = harness(one_placement());
    assert_eq!(block_on(h.session.commit_segment_height(S1, 40.05)), Ok(40.0));
    assert!(h.session.gateway().calls().is_empty());
    assert!(!h.session.can_undo());
}

fn three_segments() -> ShelfSnapshot {
    shelf(vec![
        segment(S1, 1, 30.0, Vec::new()),
        segment(S2, 2, 30.0, Vec::new()),
        segment(S3, 3, 30.0, Vec::new()),
    ])
}

#[test]
fn bulk_apply_is_one_undo_step() {
    let mut h = harness(three_segments());
    h.session.stage_preset(HeightPreset::Mixed);
    let changes = h.render.take();
    assert!(changes.iter().any(|c| matches!(c, ModelChange::LayoutRecalculated(_))));
    assert!(changes.iter().any(|c| matches!(c, ModelChange::PlacementsRepositioned(_))));

    // Level 2 already matches the preset, so only two writes go out.
    assert_eq!(block_on(h.session.apply_staged_heights()), Ok(2));
    let heights: Vec<f64> = h.session.model().segments().iter().map(|s| s.height).collect();
    assert_eq!(heights, vec![25.0, 30.0, 35.0]);
    assert!(h.session.segment_controller().staged().is_empty());
    assert_eq!(h.session.history().undo_depth(), 1);

    h.session.undo().unwrap();
    let heights: Vec<f64> = h.session.model().segments().iter().map(|s| s.height).collect();
    assert_eq!(heights, vec![30.0, 30.0, 30.0]);
}

#[test]
fn bulk_apply_reverts_on_partial_failure() {
    let mut h = harness(three_segments());
    h.session.stage_preset(HeightPreset::Tall);
    h.session
        .gateway()
        .script([None, Some(Fault::Transport(TransportError::Network("reset".into())))]);

    let err = block_on(h.session.apply_staged_heights()).unwrap_err();
    assert!(matches!(err, CommitError::Transport(_)));
    assert!(h.session.model().segments().iter().all(|s| s.height == 30.0));
    assert!(!h.session.can_undo());

    // Two forward writes, then a compensating write for the first segment.
    let heights: Vec<Call> = h.session.gateway().calls();
    assert_eq!(heights, vec![
        Call::Height(S1, 40.0),
        Call::Height(S2, 40.0),
        Call::Height(S1, 30.0),
    ]);
    // Staged heights survive for a retry.
    assert_eq!(h.session.segment_controller().staged().len(), 3);
}

#[test]
fn bulk_apply_validates_everything_first() {
    let mut h = harness(shelf(vec![
        segment(
            S1,
            1,
            40.0,
            vec![Placement::new(PlacementId::new(1), S1, product(1, 20.0, 35.0), 0.0, 1)],
        ),
        segment(S2, 2, 40.0, Vec::new()),
    ]));
    h.session.stage_preset(HeightPreset::Uniform);
    let err = block_on(h.session.apply_staged_heights()).unwrap_err();
    match err {
        CommitError::LocalRejected(errors) => assert!(errors[0].contains("placement#1")),
        other => panic!("unexpected {other:?}"),
    }
    assert!(h.session.gateway().calls().is_empty());
}

#[test]
fn optimize_stages_content_fitted_heights() {
    let mut h = harness(shelf(vec![
        segment(
            S1,
            1,
            60.0,
            vec![Placement::new(PlacementId::new(1), S1, product(1, 20.0, 25.0), 0.0, 1)],
        ),
        segment(S2, 2, 60.0, Vec::new()),
    ]));
    h.session.stage_optimized();
    assert_eq!(block_on(h.session.apply_staged_heights()), Ok(1));
    assert_eq!(h.session.model().segment(S1).unwrap().height, 30.0);
    // Empty levels keep their height.
    assert_eq!(h.session.model().segment(S2).unwrap().height, 60.0);
    assert_eq!(h.session.segment_summary().total_height, 90.0);
}

#[test]
fn segments_are_added_and_removed_with_confirmation() {
    let mut h = harness(one_placement());
    assert_eq!(h.session.add_segment(S2, 35.0), Ok(S2));
    assert_eq!(h.session.model().segment(S2).unwrap().level, 2);

    // Non-empty segments are refused before any prompt.
    assert!(matches!(h.session.remove_segment(S1), Err(CommitError::LocalRejected(_))));
    assert!(h.confirm.asked.borrow().is_empty());

    assert_eq!(h.session.remove_segment(S2), Err(CommitError::Canceled));
    h.confirm.answers.borrow_mut().push_back(true);
    assert_eq!(h.session.remove_segment(S2), Ok(()));
    assert!(h.session.model().segment(S2).is_none());

    assert_eq!(h.session.undo(), Ok(Some("Delete segment".to_string())));
    assert!(h.session.model().segment(S2).is_some());
    assert_eq!(h.session.undo(), Ok(Some("Add segment".to_string())));
    assert!(h.session.model().segment(S2).is_none());
}

#[test]
fn invalid_config_is_refused() {
    let mut config = EditorConfig::default();
    config.grid.size = 0.0;
    let result = EditorSession::builder(one_placement(), ScriptedGateway::new())
        .config(config)
        .build();
    assert!(result.is_err());
}

#[test]
fn undo_clears_selection_of_removed_placement() {
    let mut h = harness(shelf(vec![segment(S1, 1, 30.0, Vec::new())]));
    let id = block_on(h.session.create_placement(S1, product(3, 10.0, 10.0), 0.0, 1)).unwrap();
    h.session.select(id);
    h.render.take();
    h.session.undo().unwrap();
    assert_eq!(h.session.selected(), None);
    assert!(h.render.take().contains(&ModelChange::SelectionChanged(None)));
}

fn placement_tops(changes: &[ModelChange]) -> Vec<Vec<(PlacementId, f64)>> {
    changes
        .iter()
        .filter_map(|c| match c {
            ModelChange::PlacementsRepositioned(tops) => Some(tops.clone()),
            _ => None,
        })
        .collect()
}

#[test]
fn first_drag_frame_highlights_the_drop_target() {
    let mut h = harness(one_placement());
    block_on(h.session.dispatch_placement_input(&PlacementInput::PointerDown {
        pointer: P,
        position: Point::new(5.0, 30.0),
    }))
    .unwrap();
    h.render.take();
    let t = block_on(h.session.dispatch_placement_input(&PlacementInput::PointerMove {
        pointer: P,
        position: Point::new(15.0, 30.0),
    }))
    .unwrap();
    assert!(matches!(t.effect, PlacementEffect::DragStarted { .. }));
    let changes = h.render.take();
    assert!(changes.iter().any(|c| matches!(
        c,
        ModelChange::DropTargetHighlighted(fb) if fb.placement_id == Some(PlacementId::new(1)) && fb.valid
    )));
}

#[test]
fn slider_commit_rejected_by_server_reverts_height_and_offsets() {
    let mut h = harness(one_placement());
    let t = block_on(h.session.dispatch_segment_input(&SegmentInput::Begin {
        segment: S1,
        control: HeightControl::Slider,
    }))
    .unwrap();
    assert!(matches!(t.effect, SegmentEffect::PreviewStarted { .. }));

    h.render.take();
    block_on(h.session.dispatch_segment_input(&SegmentInput::Change { height: 60.0 })).unwrap();
    // Bottom-anchored: 60 - 25 + 2.
    assert_eq!(
        placement_tops(&h.render.take()),
        vec![vec![(PlacementId::new(1), 37.0)]]
    );
    assert_eq!(h.session.model().segment(S1).unwrap().height, 40.0);

    h.session
        .gateway()
        .script([Some(Fault::Reject(vec!["locked".into()]))]);
    let err = block_on(h.session.dispatch_segment_input(&SegmentInput::Commit)).unwrap_err();
    assert_eq!(err, CommitError::RemoteRejected(vec!["locked".into()]));
    assert_eq!(h.session.gateway().calls(), vec![Call::Height(S1, 60.0)]);
    assert_eq!(h.session.model().segment(S1).unwrap().height, 40.0);
    assert!(!h.session.segment_controller().is_in_flight(S1));
    assert!(!h.session.can_undo());
    assert_eq!(
        placement_tops(&h.render.take()).last(),
        Some(&vec![(PlacementId::new(1), 17.0)])
    );
    assert_eq!(h.notes.last().unwrap().message, "locked");

    // The segment is free for another attempt, which goes through.
    block_on(h.session.dispatch_segment_input(&SegmentInput::Begin {
        segment: S1,
        control: HeightControl::Input,
    }))
    .unwrap();
    block_on(h.session.dispatch_segment_input(&SegmentInput::Change { height: 50.0 })).unwrap();
    let t = block_on(h.session.dispatch_segment_input(&SegmentInput::Commit)).unwrap();
    assert_eq!(
        t.effect,
        SegmentEffect::CommitRequested(HeightChange {
            segment: S1,
            from: 40.0,
            to: 50.0
        })
    );
    assert_eq!(h.session.model().segment(S1).unwrap().height, 50.0);
    assert!(h.session.can_undo());
    assert_eq!(
        placement_tops(&h.render.take()).last(),
        Some(&vec![(PlacementId::new(1), 27.0)])
    );
}

#[test]
fn drag_handle_commits_height_on_release() {
    let mut h = harness(one_placement());
    block_on(h.session.dispatch_segment_input(&SegmentInput::HandleDown {
        segment: S1,
        pointer: P,
        position: Point::new(0.0, 40.0),
    }))
    .unwrap();
    let t = block_on(h.session.dispatch_segment_input(&SegmentInput::HandleMove {
        pointer: P,
        position: Point::new(0.0, 50.0),
    }))
    .unwrap();
    assert!(matches!(t.effect, SegmentEffect::PreviewUpdated(ref p) if p.height == 50.0));

    block_on(h.session.dispatch_segment_input(&SegmentInput::HandleUp {
        pointer: P,
        position: Point::new(0.0, 50.0),
    }))
    .unwrap();
    assert_eq!(h.session.gateway().calls(), vec![Call::Height(S1, 50.0)]);
    assert_eq!(h.session.model().segment(S1).unwrap().height, 50.0);
    assert!(!h.session.segment_controller().is_in_flight(S1));

    h.session.undo().unwrap();
    assert_eq!(h.session.model().segment(S1).unwrap().height, 40.0);
}

#[test]
fn face_resize_gesture_commits_and_reverts_on_rejection() {
    let mut h = harness(one_placement());
    let id = PlacementId::new(1);

    h.session
        .gateway()
        .script([Some(Fault::Reject(vec!["Faces are fixed".into()]))]);
    block_on(h.session.dispatch_placement_input(&PlacementInput::BeginResize { placement: id }))
        .unwrap();
    block_on(h.session.dispatch_placement_input(&PlacementInput::ResizeTo { face_count: 3 }))
        .unwrap();
    h.render.take();
    let err = block_on(h.session.dispatch_placement_input(&PlacementInput::EndResize)).unwrap_err();
    assert_eq!(err, CommitError::RemoteRejected(vec!["Faces are fixed".into()]));
    assert_eq!(h.session.model().placement(id).unwrap().face_count, 1);
    assert!(!h.session.placement_controller().is_in_flight(id));
    assert!(h.render.take().iter().any(|c| matches!(
        c,
        ModelChange::PlacementReverted(s) if s.face_count == 1
    )));

    block_on(h.session.dispatch_placement_input(&PlacementInput::BeginResize { placement: id }))
        .unwrap();
    block_on(h.session.dispatch_placement_input(&PlacementInput::ResizeTo { face_count: 2 }))
        .unwrap();
    let t = block_on(h.session.dispatch_placement_input(&PlacementInput::EndResize)).unwrap();
    assert!(matches!(t.effect, PlacementEffect::CommitResize(ref r) if r.to.face_count == 2));
    let placed = h.session.model().placement(id).unwrap();
    assert_eq!(placed.face_count, 2);
    assert_eq!(placed.occupied_width(), 40.0);
    assert_eq!(h.notes.last().unwrap().message, "Faces updated");
    assert!(h.session.can_undo());
}

// ============================================================================
// Tracing
// ============================================================================

mod capture {
    use super::*;
    use tracing::span::{Attributes, Id};
    use tracing::Subscriber;
    use tracing_subscriber::layer::{Context, SubscriberExt};
    use tracing_subscriber::Layer;

    #[derive(Clone, Default)]
    struct SpanNames(Arc<Mutex<Vec<String>>>);

    impl<S: Subscriber> Layer<S> for SpanNames {
        fn on_new_span(&self, attrs: &Attributes<'_>, _id: &Id, _ctx: Context<'_, S>) {
            if let Ok(mut names) = self.0.lock() {
                names.push(attrs.metadata().name().to_string());
            }
        }
    }

    #[test]
    fn commits_run_inside_a_commit_span() {
        let names = SpanNames::default();
        let subscriber = tracing_subscriber::registry().with(names.clone());
        tracing::subscriber::with_default(subscriber, || {
            let mut h = harness(one_placement());
            block_on(h.session.edit_placement(PlacementId::new(1), Some(40.0), None)).unwrap();
        });
        let names = names.0.lock().unwrap();
        assert!(names.iter().any(|n| n == "shelf.commit"));
    }
}
