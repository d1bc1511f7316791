#![forbid(unsafe_code)]

//! Input vocabulary shared by the interaction controllers.
//!
//! Host adapters translate their native pointer and keyboard events into
//! these types; the controllers never see platform events directly.

use serde::{Deserialize, Serialize};

/// Identifier of one pointer (mouse, pen, or touch contact).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PointerId(pub u32);

/// Pointer button.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointerButton {
    #[default]
    Primary,
    Secondary,
    Middle,
}

/// Snapshot of active modifiers captured with one input event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Modifiers {
    pub shift: bool,
    pub alt: bool,
    pub ctrl: bool,
    pub meta: bool,
}

impl Modifiers {
    #[must_use]
    pub const fn none() -> Self {
        Self {
            shift: false,
            alt: false,
            ctrl: false,
            meta: false,
        }
    }

    #[must_use]
    pub const fn ctrl() -> Self {
        Self {
            ctrl: true,
            ..Self::none()
        }
    }

    #[must_use]
    pub const fn with_shift(self) -> Self {
        Self {
            shift: true,
            ..self
        }
    }

    /// Ctrl on most platforms, Cmd on macOS.
    #[must_use]
    pub const fn command(self) -> bool {
        self.ctrl || self.meta
    }
}

/// Keys the editor reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyCode {
    Char(char),
    Delete,
    Backspace,
    Enter,
    Escape,
}

/// Editor-level keyboard shortcuts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EditorShortcut {
    Undo,
    Redo,
    Save,
    DeleteSelection,
}

impl EditorShortcut {
    /// Map a key press to a shortcut. Every shortcut requires Ctrl/Cmd.
    #[must_use]
    pub fn from_key(key: KeyCode, modifiers: Modifiers) -> Option<Self> {
        if !modifiers.command() {
            return None;
        }
        match key {
            KeyCode::Char(c) if c.eq_ignore_ascii_case(&'z') => {
                Some(if modifiers.shift { Self::Redo } else { Self::Undo })
            }
            KeyCode::Char(c) if c.eq_ignore_ascii_case(&'s') => Some(Self::Save),
            KeyCode::Delete | KeyCode::Backspace => Some(Self::DeleteSelection),
            _ => None,
        }
    }
}
