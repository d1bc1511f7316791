#![forbid(unsafe_code)]

//! Undo/redo command history.
//!
//! Commands capture the values needed to invert themselves at the moment an
//! edit is confirmed, and the history applies them to whatever target is
//! passed in. For shelf editing the target is the session's
//! [`LayoutModel`](shelfkit_layout::LayoutModel).
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                   HistoryManager<T>                  │
//! │  ┌──────────────┐              ┌──────────────┐      │
//! │  │  Undo Stack  │   undo(t)    │  Redo Stack  │      │
//! │  │  cmd N       │  ─────────►  │  cmd N       │      │
//! │  │  ...         │  ◄─────────  │  ...         │      │
//! │  │  cmd 1       │   redo(t)    │              │      │
//! │  └──────────────┘              └──────────────┘      │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! # Module Structure
//!
//! - [`command`]: the generic [`UndoableCmd`] trait and [`CommandBatch`]
//! - [`history`]: [`HistoryManager`] with depth/memory limits
//! - [`shelf`]: [`ShelfCommand`], the shelf edits recorded by the session

pub mod command;
pub mod history;
pub mod shelf;

pub use command::{
    CommandBatch, CommandError, CommandMetadata, CommandResult, CommandSource, UndoableCmd,
};
pub use history::{DEFAULT_MAX_DEPTH, HistoryConfig, HistoryManager};
pub use shelf::{ShelfCommand, ShelfEdit};
