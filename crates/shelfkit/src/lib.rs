#![forbid(unsafe_code)]

//! Shelfkit public facade crate.
//!
//! Re-exports the types an embedding application needs to open a shelf,
//! feed it input, and wire up its collaborators, plus a prelude for
//! day-to-day use.
//!
//! ```rust,ignore
//! use shelfkit::prelude::*;
//!
//! let mut session = EditorSession::builder(snapshot, gateway)
//!     .config(EditorConfig::from_toml_file("shelfkit.toml")?)
//!     .render(canvas)
//!     .build()?;
//! pollster::block_on(session.create_placement(segment, product, 12.0, 2))?;
//! ```

use std::fmt;

// --- Core re-exports -------------------------------------------------------

pub use shelfkit_core::event::{EditorShortcut, KeyCode, Modifiers, PointerButton, PointerId};
pub use shelfkit_core::geometry::{GridSnap, Point, VerticalSpan, ViewTransform, ZoomFactor};
pub use shelfkit_core::id::{PlacementId, ProductId, SegmentId, ShelfId};

// --- Layout re-exports -----------------------------------------------------

pub use shelfkit_layout::{
    FaceLimits, HeightPreset, LayoutConfig, LayoutError, LayoutModel, ModelError, Placement,
    PlacementProposal, PlacementState, ProductSpec, SegmentHeightSummary, SegmentSnapshot, Shelf,
    ShelfSnapshot, ShelfStatistics, ValidationEngine, ValidationReport, Violation,
};

// --- Runtime re-exports ----------------------------------------------------

#[cfg(feature = "runtime")]
pub use shelfkit_runtime::{
    CommitError, ConfigError, ConfirmRequest, ConfirmationPrompt, DropFeedback, EditorConfig,
    EditorSession, EditorSessionBuilder, HeightControl, ModelChange, Notification,
    NotificationLevel, NotificationSink, PlacementInput, RemoteOutcome, RemoteSyncGateway,
    RenderAdapter, SegmentInput, SelectionDetails, SessionError, TransportError,
};

// --- Errors ---------------------------------------------------------------

/// Top-level error type for shelfkit applications.
#[derive(Debug)]
pub enum Error {
    /// A layout query or mutation failed.
    Layout(LayoutError),
    /// Configuration could not be loaded or is invalid.
    #[cfg(feature = "runtime")]
    Config(ConfigError),
    /// A session could not be opened.
    #[cfg(feature = "runtime")]
    Session(SessionError),
    /// A commit, undo, or redo did not go through.
    #[cfg(feature = "runtime")]
    Commit(CommitError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Layout(err) => write!(f, "{err}"),
            #[cfg(feature = "runtime")]
            Self::Config(err) => write!(f, "{err}"),
            #[cfg(feature = "runtime")]
            Self::Session(err) => write!(f, "{err}"),
            #[cfg(feature = "runtime")]
            Self::Commit(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Layout(err) => Some(err),
            #[cfg(feature = "runtime")]
            Self::Config(err) => Some(err),
            #[cfg(feature = "runtime")]
            Self::Session(err) => Some(err),
            #[cfg(feature = "runtime")]
            Self::Commit(err) => Some(err),
        }
    }
}

impl From<LayoutError> for Error {
    fn from(err: LayoutError) -> Self {
        Self::Layout(err)
    }
}

impl From<ModelError> for Error {
    fn from(err: ModelError) -> Self {
        Self::Layout(LayoutError::Model(err))
    }
}

#[cfg(feature = "runtime")]
impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        Self::Config(err)
    }
}

#[cfg(feature = "runtime")]
impl From<SessionError> for Error {
    fn from(err: SessionError) -> Self {
        Self::Session(err)
    }
}

#[cfg(feature = "runtime")]
impl From<CommitError> for Error {
    fn from(err: CommitError) -> Self {
        Self::Commit(err)
    }
}

/// Standard result type for shelfkit APIs.
pub type Result<T> = std::result::Result<T, Error>;

/// Install the default `tracing` subscriber for shelfkit targets.
#[cfg(feature = "logging")]
pub use shelfkit_core::logging::{LogConfig, LogFormat, LoggingError, init as init_logging};

// --- Prelude --------------------------------------------------------------

pub mod prelude {
    pub use crate::{
        Error, FaceLimits, HeightPreset, KeyCode, LayoutModel, Modifiers, PlacementId, Point,
        PointerId, ProductId, ProductSpec, Result, SegmentId, Shelf, ShelfId, ShelfSnapshot,
        ViewTransform,
    };

    #[cfg(feature = "runtime")]
    pub use crate::{
        CommitError, EditorConfig, EditorSession, ModelChange, Notification, PlacementInput,
        RemoteSyncGateway, RenderAdapter, SegmentInput,
    };

    pub use crate::{core, layout};

    #[cfg(feature = "runtime")]
    pub use crate::runtime;
}

pub use shelfkit_core as core;
pub use shelfkit_layout as layout;
#[cfg(feature = "runtime")]
pub use shelfkit_runtime as runtime;
