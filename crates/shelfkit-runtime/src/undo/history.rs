#![forbid(unsafe_code)]

//! History stack for undo/redo operations.
//!
//! [`HistoryManager`] keeps dual stacks of boxed commands:
//!
//! - **Depth limit**: at most `max_depth` undoable entries; the oldest is
//!   evicted and becomes permanently non-undoable.
//! - **Memory limit**: optional byte budget across both stacks.
//! - **Branch handling**: pushing a new command clears the redo stack.
//!
//! # Invariants
//!
//! 1. `total_bytes` always equals the sum of `size_bytes()` for all commands
//! 2. `undo_stack.len() <= config.max_depth` after any operation
//! 3. `total_bytes <= config.max_bytes` after any operation, if enforced
//! 4. The redo stack is empty right after a push
//!
//! ```text
//! push(c5)          Undo: [c1 c2 c3 c4 c5]   Redo: []
//! undo() x2         Undo: [c1 c2 c3]         Redo: [c5 c4]
//! push(c6)          Undo: [c1 c2 c3 c6]      Redo: []
//! ```
//!
//! Commands are applied to the target passed into `undo`/`redo`; the history
//! never talks to a remote gateway.

use std::collections::VecDeque;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::command::{CommandError, UndoableCmd};

/// Default undo capacity.
pub const DEFAULT_MAX_DEPTH: usize = 50;

/// Limits for the history manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Maximum number of commands kept for undo.
    pub max_depth: usize,
    /// Maximum total bytes for all commands (0 = unlimited).
    pub max_bytes: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            max_bytes: 0,
        }
    }
}

impl HistoryConfig {
    #[must_use]
    pub fn new(max_depth: usize, max_bytes: usize) -> Self {
        Self {
            max_depth,
            max_bytes,
        }
    }

    /// No limits (for testing).
    #[must_use]
    pub fn unlimited() -> Self {
        Self {
            max_depth: usize::MAX,
            max_bytes: 0,
        }
    }
}

/// Undo/redo history over a target of type `T`.
pub struct HistoryManager<T> {
    /// Newest at back.
    undo_stack: VecDeque<Box<dyn UndoableCmd<T>>>,
    /// Newest at back.
    redo_stack: VecDeque<Box<dyn UndoableCmd<T>>>,
    config: HistoryConfig,
    total_bytes: usize,
}

impl<T> fmt::Debug for HistoryManager<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HistoryManager")
            .field("undo_depth", &self.undo_stack.len())
            .field("redo_depth", &self.redo_stack.len())
            .field("total_bytes", &self.total_bytes)
            .field("config", &self.config)
            .finish()
    }
}

impl<T> Default for HistoryManager<T> {
    fn default() -> Self {
        Self::new(HistoryConfig::default())
    }
}

impl<T> HistoryManager<T> {
    #[must_use]
    pub fn new(config: HistoryConfig) -> Self {
        Self {
            undo_stack: VecDeque::new(),
            redo_stack: VecDeque::new(),
            config,
            total_bytes: 0,
        }
    }

    // ========================================================================
    // Core Operations
    // ========================================================================

    /// Record an already-applied command.
    ///
    /// Clears the redo stack and enforces limits. The command is NOT executed.
    pub fn push(&mut self, cmd: Box<dyn UndoableCmd<T>>) {
        self.clear_redo();
        tracing::debug!(
            target: "shelfkit.history",
            command = cmd.debug_name(),
            description = cmd.description(),
            depth = self.undo_stack.len() + 1,
            "command recorded"
        );
        self.total_bytes += cmd.size_bytes();
        self.undo_stack.push_back(cmd);
        self.enforce_limits();
    }

    /// Undo the most recent command against `target`.
    ///
    /// - `Some(Ok(description))`: undone, moved to the redo stack
    /// - `Some(Err(error))`: failed, command stays on the undo stack
    /// - `None`: nothing to undo
    pub fn undo(&mut self, target: &mut T) -> Option<Result<String, CommandError>> {
        let mut cmd = self.undo_stack.pop_back()?;
        let description = cmd.description().to_string();

        match cmd.undo(target) {
            Ok(()) => {
                tracing::debug!(target: "shelfkit.history", %description, "undo");
                self.redo_stack.push_back(cmd);
                Some(Ok(description))
            }
            Err(e) => {
                tracing::warn!(target: "shelfkit.history", %description, error = %e, "undo failed");
                self.undo_stack.push_back(cmd);
                Some(Err(e))
            }
        }
    }

    /// Redo the most recently undone command against `target`.
    ///
    /// - `Some(Ok(description))`: redone, moved back to the undo stack
    /// - `Some(Err(error))`: failed, command stays on the redo stack
    /// - `None`: nothing to redo
    pub fn redo(&mut self, target: &mut T) -> Option<Result<String, CommandError>> {
        let mut cmd = self.redo_stack.pop_back()?;
        let description = cmd.description().to_string();

        match cmd.redo(target) {
            Ok(()) => {
                tracing::debug!(target: "shelfkit.history", %description, "redo");
                self.undo_stack.push_back(cmd);
                Some(Ok(description))
            }
            Err(e) => {
                tracing::warn!(target: "shelfkit.history", %description, error = %e, "redo failed");
                self.redo_stack.push_back(cmd);
                Some(Err(e))
            }
        }
    }

    #[must_use]
    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    #[must_use]
    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    // ========================================================================
    // Info
    // ========================================================================

    #[must_use]
    pub fn undo_depth(&self) -> usize {
        self.undo_stack.len()
    }

    #[must_use]
    pub fn redo_depth(&self) -> usize {
        self.redo_stack.len()
    }

    /// Descriptions for undo commands (most recent first).
    pub fn undo_descriptions(&self, limit: usize) -> Vec<&str> {
        self.undo_stack
            .iter()
            .rev()
            .take(limit)
            .map(|c| c.description())
            .collect()
    }

    /// Descriptions for redo commands (most recent first).
    pub fn redo_descriptions(&self, limit: usize) -> Vec<&str> {
        self.redo_stack
            .iter()
            .rev()
            .take(limit)
            .map(|c| c.description())
            .collect()
    }

    #[must_use]
    pub fn next_undo_description(&self) -> Option<&str> {
        self.undo_stack.back().map(|c| c.description())
    }

    #[must_use]
    pub fn next_redo_description(&self) -> Option<&str> {
        self.redo_stack.back().map(|c| c.description())
    }

    #[must_use]
    pub fn memory_usage(&self) -> usize {
        self.total_bytes
    }

    #[must_use]
    pub fn config(&self) -> &HistoryConfig {
        &self.config
    }

    // ========================================================================
    // Maintenance
    // ========================================================================

    /// Clear both stacks.
    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
        self.total_bytes = 0;
    }

    fn clear_redo(&mut self) {
        for cmd in self.redo_stack.drain(..) {
            self.total_bytes = self.total_bytes.saturating_sub(cmd.size_bytes());
        }
    }

    /// Evict oldest commands until depth and memory limits hold.
    fn enforce_limits(&mut self) {
        while self.undo_stack.len() > self.config.max_depth {
            if let Some(cmd) = self.undo_stack.pop_front() {
                self.total_bytes = self.total_bytes.saturating_sub(cmd.size_bytes());
                tracing::debug!(
                    target: "shelfkit.history",
                    description = cmd.description(),
                    "oldest command evicted"
                );
            }
        }

        if self.config.max_bytes > 0 {
            while self.total_bytes > self.config.max_bytes {
                // Speculative redo history goes first.
                if let Some(cmd) = self.redo_stack.pop_front() {
                    self.total_bytes = self.total_bytes.saturating_sub(cmd.size_bytes());
                    continue;
                }
                if let Some(cmd) = self.undo_stack.pop_front() {
                    self.total_bytes = self.total_bytes.saturating_sub(cmd.size_bytes());
                } else {
                    break;
                }
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
