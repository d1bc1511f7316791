#![forbid(unsafe_code)]

//! Undoable command infrastructure.
//!
//! [`UndoableCmd`] is generic over the state it mutates; the target is passed
//! in on every call so commands own only values, never references into it.
//!
//! # Invariants
//!
//! - `execute()` followed by `undo()` restores prior state exactly.
//! - `undo()` followed by `redo()` restores the executed state exactly.
//! - Inverse data is captured when the command is built, never re-derived
//!   from the target at undo time.
//!
//! # Failure Modes
//!
//! - **Stale reference**: the entity a command names no longer resolves.
//!   Surfaces as [`CommandError::Model`]; the command stays on its stack.
//! - **Constraint conflict**: re-applying a state would violate a layout
//!   invariant. Surfaces as [`CommandError::Rejected`].

use std::fmt;

use shelfkit_layout::{LayoutError, ModelError};
use thiserror::Error;
use web_time::Instant;

/// Who/what triggered a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CommandSource {
    /// Direct user action (pointer, keyboard, side panel).
    #[default]
    User,
    /// Triggered programmatically (presets, optimize, bulk apply).
    Programmatic,
    /// Replayed from an external system.
    External,
}

/// Metadata attached to every command for tracing and UI display.
#[derive(Debug, Clone)]
pub struct CommandMetadata {
    /// Human-readable description for UI (e.g., "Move product").
    pub description: String,
    pub timestamp: Instant,
    pub source: CommandSource,
    /// Groups the commands of one bulk operation.
    pub batch_id: Option<u64>,
}

impl CommandMetadata {
    #[must_use]
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            timestamp: Instant::now(),
            source: CommandSource::User,
            batch_id: None,
        }
    }

    #[must_use]
    pub fn with_source(mut self, source: CommandSource) -> Self {
        self.source = source;
        self
    }

    #[must_use]
    pub fn with_batch(mut self, batch_id: u64) -> Self {
        self.batch_id = Some(batch_id);
        self
    }

    /// Size in bytes for memory accounting.
    #[must_use]
    pub fn size_bytes(&self) -> usize {
        std::mem::size_of::<Self>() + self.description.len()
    }
}

impl Default for CommandMetadata {
    fn default() -> Self {
        Self::new("Unknown")
    }
}

pub type CommandResult = Result<(), CommandError>;

/// Why a command could not be applied or inverted.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CommandError {
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error("cannot apply: {}", .0.join("; "))]
    Rejected(Vec<String>),
    #[error("invalid state: {0}")]
    InvalidState(String),
}

impl From<LayoutError> for CommandError {
    fn from(err: LayoutError) -> Self {
        match err {
            LayoutError::Model(model) => Self::Model(model),
            rejected @ LayoutError::Rejected(_) => Self::Rejected(rejected.messages()),
        }
    }
}

/// A reversible operation on a target of type `T`.
pub trait UndoableCmd<T>: Send {
    /// Apply the forward effect.
    fn execute(&mut self, target: &mut T) -> CommandResult;

    /// Apply the inverse effect.
    fn undo(&mut self, target: &mut T) -> CommandResult;

    /// Re-apply after an undo.
    fn redo(&mut self, target: &mut T) -> CommandResult {
        self.execute(target)
    }

    /// Human-readable description for UI display.
    fn description(&self) -> &str {
        &self.metadata().description
    }

    /// Size of this command in bytes for memory budgeting.
    fn size_bytes(&self) -> usize;

    fn metadata(&self) -> &CommandMetadata;

    fn debug_name(&self) -> &'static str {
        "UndoableCmd"
    }
}

/// Several commands undone and redone as one step.
pub struct CommandBatch<T> {
    /// Commands in execution order.
    commands: Vec<Box<dyn UndoableCmd<T>>>,
    metadata: CommandMetadata,
    /// Number of leading commands currently applied.
    executed_to: usize,
}

impl<T> fmt::Debug for CommandBatch<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandBatch")
            .field("commands_count", &self.commands.len())
            .field("metadata", &self.metadata)
            .field("executed_to", &self.executed_to)
            .finish()
    }
}

impl<T> CommandBatch<T> {
    #[must_use]
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            commands: Vec::new(),
            metadata: CommandMetadata::new(description),
            executed_to: 0,
        }
    }

    #[must_use]
    pub fn with_source(mut self, source: CommandSource) -> Self {
        self.metadata.source = source;
        self
    }

    /// Add a command that has not run yet.
    pub fn push(&mut self, cmd: Box<dyn UndoableCmd<T>>) {
        self.commands.push(cmd);
    }

    /// Add a command whose effect is already applied to the target.
    ///
    /// Only valid while every earlier command is applied too.
    pub fn push_executed(&mut self, cmd: Box<dyn UndoableCmd<T>>) {
        self.commands.push(cmd);
        self.executed_to = self.commands.len();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Descriptions of the batched commands in execution order.
    pub fn descriptions(&self) -> impl Iterator<Item = &str> + '_ {
        self.commands.iter().map(|c| c.description())
    }
}

impl<T> UndoableCmd<T> for CommandBatch<T> {
    fn execute(&mut self, target: &mut T) -> CommandResult {
        let start = self.executed_to;
        for i in start..self.commands.len() {
            if let Err(e) = self.commands[i].execute(target) {
                // Roll back what this call applied.
                for j in (start..i).rev() {
                    let _ = self.commands[j].undo(target);
                }
                self.executed_to = start;
                return Err(e);
            }
            self.executed_to = i + 1;
        }
        Ok(())
    }

    fn undo(&mut self, target: &mut T) -> CommandResult {
        let applied = self.executed_to;
        for i in (0..applied).rev() {
            if let Err(e) = self.commands[i].undo(target) {
                // Re-apply the tail so the batch stays all-or-nothing.
                for j in i + 1..applied {
                    let _ = self.commands[j].redo(target);
                }
                return Err(e);
            }
        }
        self.executed_to = 0;
        Ok(())
    }

    fn size_bytes(&self) -> usize {
        std::mem::size_of::<Self>()
            + self.metadata.size_bytes()
            + self.commands.iter().map(|c| c.size_bytes()).sum::<usize>()
    }

    fn metadata(&self) -> &CommandMetadata {
        &self.metadata
    }

    fn debug_name(&self) -> &'static str {
        "CommandBatch"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Adds `delta` to a counter; fails when the result would exceed `limit`.
    struct Add {
        delta: i32,
        limit: i32,
        metadata: CommandMetadata,
    }

    impl Add {
        fn boxed(delta: i32, limit: i32) -> Box<dyn UndoableCmd<i32>> {
            Box::new(Self {
                delta,
                limit,
                metadata: CommandMetadata::new(format!("add {delta}")),
            })
        }
    }

    impl UndoableCmd<i32> for Add {
        fn execute(&mut self, target: &mut i32) -> CommandResult {
            if *target + self.delta > self.limit {
                return Err(CommandError::InvalidState("limit".into()));
            }
            *target += self.delta;
            Ok(())
        }

        fn undo(&mut self, target: &mut i32) -> CommandResult {
            *target -= self.delta;
            Ok(())
        }

        fn size_bytes(&self) -> usize {
            std::mem::size_of::<Self>()
        }

        fn metadata(&self) -> &CommandMetadata {
            &self.metadata
        }
    }

    #[test]
    fn metadata_builders() {
        let meta = CommandMetadata::new("Move product")
            .with_source(CommandSource::Programmatic)
            .with_batch(7);
        assert_eq!(meta.source, CommandSource::Programmatic);
        assert_eq!(meta.batch_id, Some(7));
        assert!(meta.size_bytes() > "Move product".len());
        assert_eq!(CommandMetadata::default().description, "Unknown");
    }

    #[test]
    fn batch_executes_and_undoes_as_one() {
        let mut batch = CommandBatch::new("bulk");
        batch.push(Add::boxed(1, 100));
        batch.push(Add::boxed(2, 100));
        let mut value = 0;
        batch.execute(&mut value).unwrap();
        assert_eq!(value, 3);
        batch.undo(&mut value).unwrap();
        assert_eq!(value, 0);
        batch.redo(&mut value).unwrap();
        assert_eq!(value, 3);
        assert_eq!(batch.descriptions().collect::<Vec<_>>(), vec!["add 1", "add 2"]);
    }

    #[test]
    fn batch_rolls_back_on_failure() {
        let mut batch = CommandBatch::new("bulk");
        batch.push(Add::boxed(5, 10));
        batch.push(Add::boxed(10, 10));
        let mut value = 0;
        assert!(batch.execute(&mut value).is_err());
        assert_eq!(value, 0);
    }

    #[test]
    fn pre_executed_commands_are_undone() {
        let mut value = 4;
        let mut batch = CommandBatch::new("applied");
        batch.push_executed(Add::boxed(4, 100));
        batch.undo(&mut value).unwrap();
        assert_eq!(value, 0);
    }

    #[test]
    fn layout_errors_convert() {
        let err: CommandError = LayoutError::Model(ModelError::UnknownSegment(
            shelfkit_core::id::SegmentId::new(3),
        ))
        .into();
        assert_eq!(err.to_string(), "segment#3 not found");
    }
}
