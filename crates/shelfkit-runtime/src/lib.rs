#![forbid(unsafe_code)]

//! Runtime for shelfkit: interaction controllers, undo history, and the
//! editing session.
//!
//! # Role in shelfkit
//! `shelfkit-runtime` turns pointer, keyboard, and panel input into
//! committed layout changes. It owns the commit pipeline (local validation,
//! remote validation, remote write, apply, record) and the undo/redo
//! history, and talks to the outside world only through the ports in
//! [`ports`].
//!
//! # Modules
//! - [`session`]: [`EditorSession`], the composition root.
//! - [`placement`]: select/drag/resize state machine for placements.
//! - [`segment`]: height preview/commit state machine and staged changes.
//! - [`undo`]: reversible commands and the bounded history.
//! - [`ports`]: gateway, render, confirmation, and notification interfaces.
//! - [`config`]: [`EditorConfig`] loading and validation.

pub mod config;
pub mod placement;
pub mod ports;
pub mod segment;
pub mod session;
pub mod undo;

pub use config::{ConfigError, EditorConfig, GridConfig, InteractionConfig, SegmentsConfig};
pub use placement::{
    AbandonReason, DropTarget, MoveRequest, PlacementController, PlacementControllerError,
    PlacementEffect, PlacementInput, PlacementInteractionState, PlacementNoopReason,
    PlacementTransition,
};
pub use ports::{
    ConfirmRequest, ConfirmationPrompt, DropFeedback, FixedConfirmation, ModelChange, NewPlacement,
    Notification, NotificationLevel, NotificationSink, NullRenderAdapter, PlacementRecord,
    PlacementUpdate, RemoteOutcome, RemoteSyncGateway, RemoteValidation, RenderAdapter,
    SegmentRecord, SelectionDetails, TracingNotificationSink, TransportError, ValidationRequest,
};
pub use segment::{
    HeightChange, HeightControl, HeightPreview, RevertReason, SegmentController,
    SegmentControllerError, SegmentEffect, SegmentInput, SegmentInteractionState,
    SegmentNoopReason, SegmentTransition,
};
pub use session::{CommitError, EditorSession, EditorSessionBuilder, SessionError};
pub use undo::{
    CommandBatch, CommandError, CommandMetadata, CommandSource, HistoryConfig, HistoryManager,
    ShelfCommand, ShelfEdit, UndoableCmd,
};
