#![forbid(unsafe_code)]

//! Collaborator interfaces the editor core calls out to.
//!
//! | port                   | direction | sync/async |
//! |------------------------|-----------|------------|
//! | [`RemoteSyncGateway`]  | persist   | async      |
//! | [`RenderAdapter`]      | project   | sync       |
//! | [`ConfirmationPrompt`] | ask user  | sync       |
//! | [`NotificationSink`]   | inform    | sync       |
//!
//! None of these ever mutate the layout model. The gateway's backend owns the
//! persisted Shelf → Segments → Placements records keyed by integer id.

use serde::{Deserialize, Serialize};
use shelfkit_core::geometry::VerticalSpan;
use shelfkit_core::id::{PlacementId, ProductId, SegmentId};
use shelfkit_layout::{FaceLimits, Placement, PlacementState, ShelfStatistics};
use thiserror::Error;

// ============================================================================
// Remote Sync Gateway
// ============================================================================

/// Infrastructure failure talking to the backend, distinct from a rejection.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("network error: {0}")]
    Network(String),
    #[error("request timed out")]
    Timeout,
    #[error("server responded with status {status}")]
    Status { status: u16 },
    #[error("malformed response: {0}")]
    Malformed(String),
}

/// Remote answer to a write: accepted with the stored record, or rejected
/// with human-readable reasons.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "data", rename_all = "snake_case")]
pub enum RemoteOutcome<T> {
    Accepted(T),
    Rejected(Vec<String>),
}

/// `validatePlacement` request.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValidationRequest {
    pub segment_id: SegmentId,
    pub product_id: ProductId,
    pub x_position: f64,
    pub face_count: u32,
    #[serde(default)]
    pub exclude_placement_id: Option<PlacementId>,
}

/// `validatePlacement` response.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RemoteValidation {
    pub valid: bool,
    #[serde(default)]
    pub errors: Vec<String>,
}

/// Fields of a placement to create.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NewPlacement {
    pub segment_id: SegmentId,
    pub product_id: ProductId,
    pub x_position: f64,
    pub face_count: u32,
}

/// Fields of a placement to update.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlacementUpdate {
    pub segment_id: SegmentId,
    pub x_position: f64,
    pub face_count: u32,
}

impl From<PlacementState> for PlacementUpdate {
    fn from(state: PlacementState) -> Self {
        Self {
            segment_id: state.segment_id,
            x_position: state.x_position,
            face_count: state.face_count,
        }
    }
}

/// Persisted placement as returned by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlacementRecord {
    pub id: PlacementId,
    pub segment_id: SegmentId,
    pub product_id: ProductId,
    pub x_position: f64,
    pub face_count: u32,
}

impl PlacementRecord {
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

/// Persisted segment as returned by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SegmentRecord {
    pub id: SegmentId,
    pub height: f64,
}

/// Backend persistence and authoritative validation.
///
/// Calls suspend only at their await point; the editor performs at most one
/// commit per placement at a time.
#[allow(async_fn_in_trait)]
pub trait RemoteSyncGateway {
    async fn validate_placement(
        &self,
        request: &ValidationRequest,
    ) -> Result<RemoteValidation, TransportError>;

    async fn create_placement(
        &self,
        fields: &NewPlacement,
    ) -> Result<RemoteOutcome<PlacementRecord>, TransportError>;

    async fn update_placement(
        &self,
        id: PlacementId,
        fields: &PlacementUpdate,
    ) -> Result<RemoteOutcome<PlacementRecord>, TransportError>;

    async fn delete_placement(&self, id: PlacementId) -> Result<RemoteOutcome<()>, TransportError>;

    async fn update_segment_height(
        &self,
        id: SegmentId,
        height: f64,
    ) -> Result<RemoteOutcome<SegmentRecord>, TransportError>;
}

// ============================================================================
// Render Adapter
// ============================================================================

/// Side-panel view of the selected placement.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SelectionDetails {
    pub placement_id: PlacementId,
    pub segment_id: SegmentId,
    pub product_id: ProductId,
    pub x_position: f64,
    pub face_count: u32,
    pub occupied_width: f64,
    pub product_width: f64,
    pub product_height: f64,
    pub is_own: bool,
    pub faces: FaceLimits,
}

impl From<&Placement> for SelectionDetails {
    fn from(p: &Placement) -> Self {
        Self {
            placement_id: p.id,
            segment_id: p.segment_id,
            product_id: p.product.id,
            x_position: p.x_position,
            face_count: p.face_count,
            occupied_width: p.occupied_width(),
            product_width: p.product.width,
            product_height: p.product.height,
            is_own: p.product.is_own,
            faces: p.product.faces,
        }
    }
}

/// Live accept/reject signal for a drag or resize preview.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DropFeedback {
    pub placement_id: Option<PlacementId>,
    /// `None` when the pointer is outside every segment.
    pub segment_id: Option<SegmentId>,
    pub x_position: f64,
    pub face_count: u32,
    pub valid: bool,
    pub errors: Vec<String>,
}

/// One-way notifications from the core to the presentation layer.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelChange {
    PlacementAdded(Placement),
    PlacementUpdated(PlacementState),
    PlacementRemoved(PlacementId),
    /// A preview ended without a mutation; redraw at the committed state.
    PlacementReverted(PlacementState),
    SegmentResized { segment_id: SegmentId, height: f64 },
    SegmentAdded { segment_id: SegmentId, level: i32, height: f64 },
    SegmentRemoved(SegmentId),
    /// Vertical spans to draw; may include uncommitted preview heights.
    LayoutRecalculated(Vec<(SegmentId, VerticalSpan)>),
    /// Product-box tops to draw; may reflect uncommitted preview heights.
    PlacementsRepositioned(Vec<(PlacementId, f64)>),
    /// History changed the model in ways not itemized; redraw everything.
    ModelRestored,
    StatisticsUpdated(ShelfStatistics),
    DropTargetHighlighted(DropFeedback),
    DropTargetCleared,
    SelectionChanged(Option<SelectionDetails>),
    HistoryChanged { can_undo: bool, can_redo: bool },
}

/// Presentation sink. Purely reactive.
pub trait RenderAdapter {
    fn apply(&mut self, change: ModelChange);
}

/// Render adapter that drops every change.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullRenderAdapter;

impl RenderAdapter for NullRenderAdapter {
    fn apply(&mut self, _change: ModelChange) {}
}

// ============================================================================
// Confirmation Prompt
// ============================================================================

/// A destructive operation awaiting a yes/no from the user.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConfirmRequest {
    DeletePlacement {
        placement_id: PlacementId,
        product_id: ProductId,
    },
    DeleteSegment {
        segment_id: SegmentId,
        level: i32,
    },
}

impl ConfirmRequest {
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            Self::DeletePlacement { product_id, .. } => {
                format!("Remove {product_id} from the shelf?")
            }
            Self::DeleteSegment { level, .. } => format!("Delete segment at level {level}?"),
        }
    }
}

/// Human-in-the-loop gate before destructive operations.
pub trait ConfirmationPrompt {
    fn confirm(&mut self, request: &ConfirmRequest) -> bool;
}

/// Answers every prompt the same way.
#[derive(Debug, Clone, Copy)]
pub struct FixedConfirmation(pub bool);

impl ConfirmationPrompt for FixedConfirmation {
    fn confirm(&mut self, _request: &ConfirmRequest) -> bool {
        self.0
    }
}

// ============================================================================
// Notification Sink
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationLevel {
    Success,
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub level: NotificationLevel,
    pub message: String,
}

impl Notification {
    #[must_use]
    pub fn new(level: NotificationLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn success(message: impl Into<String>) -> Self {
        Self::new(NotificationLevel::Success, message)
    }

    #[must_use]
    pub fn info(message: impl Into<String>) -> Self {
        Self::new(NotificationLevel::Info, message)
    }

    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self::new(NotificationLevel::Error, message)
    }
}

/// Presentation-agnostic message sink.
pub trait NotificationSink {
    fn notify(&mut self, notification: Notification);
}

/// Forwards notifications into `tracing` under `shelfkit.session`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotificationSink;

impl NotificationSink for TracingNotificationSink {
    fn notify(&mut self, notification: Notification) {
        let message = notification.message.as_str();
        match notification.level {
            NotificationLevel::Success | NotificationLevel::Info => {
                tracing::info!(target: "shelfkit.session", level = ?notification.level, "{message}");
            }
            NotificationLevel::Warning => {
                tracing::warn!(target: "shelfkit.session", "{message}");
            }
            NotificationLevel::Error => {
                tracing::error!(target: "shelfkit.session", "{message}");
            }
        }
    }
}
