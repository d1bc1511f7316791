#![forbid(unsafe_code)]

//! Editor configuration loaded from TOML or JSON.
//!
//! ```toml
//! # shelfkit.toml
//! [grid]
//! size = 5.0
//! enabled = true
//!
//! [history]
//! max_depth = 50
//!
//! [segments]
//! change_tolerance = 0.1
//! ```
//!
//! ```rust,ignore
//! let config = EditorConfig::from_toml_file("shelfkit.toml")?.validated()?;
//! ```
//!
//! Every field has a default, so `EditorConfig::default()` is a complete
//! working configuration and partial files only override what they name.

#[cfg(feature = "config-files")]
use std::path::Path;

use serde::{Deserialize, Serialize};
use shelfkit_core::geometry::{DEFAULT_GRID_SIZE, GeometryError, GridSnap};
use shelfkit_layout::LayoutConfig;
use thiserror::Error;

use crate::undo::HistoryConfig;

/// Top-level editor configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    pub grid: GridConfig,
    pub interaction: InteractionConfig,
    pub layout: LayoutConfig,
    pub history: HistoryConfig,
    pub segments: SegmentsConfig,
}

/// Snap grid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    pub size: f64,
    pub enabled: bool,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            size: DEFAULT_GRID_SIZE,
            enabled: true,
        }
    }
}

impl GridConfig {
    pub fn grid_snap(&self) -> Result<GridSnap, GeometryError> {
        GridSnap::new(self.size, self.enabled)
    }
}

/// Pointer interaction tuning.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InteractionConfig {
    /// View-space distance the pointer must travel before a press becomes a drag.
    pub drag_threshold: f64,
}

impl Default for InteractionConfig {
    fn default() -> Self {
        Self {
            drag_threshold: 3.0,
        }
    }
}

/// Segment height editing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentsConfig {
    /// Staged heights closer than this to the committed height are ignored.
    pub change_tolerance: f64,
    pub optimize_headroom: f64,
    pub optimize_floor: f64,
}

impl Default for SegmentsConfig {
    fn default() -> Self {
        Self {
            change_tolerance: 0.1,
            optimize_headroom: 5.0,
            optimize_floor: 20.0,
        }
    }
}

impl EditorConfig {
    /// Load from a TOML string.
    #[cfg(feature = "config-files")]
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(ConfigError::Toml)
    }

    /// Load from a TOML file on disk.
    #[cfg(feature = "config-files")]
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&content)
    }

    /// Load from a JSON string.
    #[cfg(feature = "config-files")]
    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(s).map_err(ConfigError::Json)
    }

    /// Load from a JSON file on disk.
    #[cfg(feature = "config-files")]
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&content)
    }

    /// Validate all parameters are within acceptable ranges.
    ///
    /// Returns one message per invalid field. An empty list means the config
    /// is valid.
    #[must_use]
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if !self.grid.size.is_finite() || self.grid.size <= 0.0 {
            errors.push(format!("grid.size must be > 0, got {}", self.grid.size));
        }
        if !self.interaction.drag_threshold.is_finite() || self.interaction.drag_threshold < 0.0 {
            errors.push(format!(
                "interaction.drag_threshold must be >= 0, got {}",
                self.interaction.drag_threshold
            ));
        }
        errors.extend(self.layout.validate());
        if self.history.max_depth == 0 {
            errors.push("history.max_depth must be > 0".into());
        }
        if !self.segments.change_tolerance.is_finite() || self.segments.change_tolerance < 0.0 {
            errors.push(format!(
                "segments.change_tolerance must be >= 0, got {}",
                self.segments.change_tolerance
            ));
        }
        if !self.segments.optimize_headroom.is_finite() || self.segments.optimize_headroom < 0.0 {
            errors.push(format!(
                "segments.optimize_headroom must be >= 0, got {}",
                self.segments.optimize_headroom
            ));
        }
        if !self.segments.optimize_floor.is_finite() || self.segments.optimize_floor <= 0.0 {
            errors.push(format!(
                "segments.optimize_floor must be > 0, got {}",
                self.segments.optimize_floor
            ));
        }

        errors
    }

    /// `self` if valid, otherwise every validation message.
    pub fn validated(self) -> Result<Self, ConfigError> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(self)
        } else {
            Err(ConfigError::Validation(errors))
        }
    }
}

/// Errors from loading or validating an [`EditorConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[cfg(feature = "config-files")]
    #[error("invalid TOML config: {0}")]
    Toml(toml::de::Error),
    #[cfg(feature = "config-files")]
    #[error("invalid JSON config: {0}")]
    Json(serde_json::Error),
    #[error("invalid config: {}", .0.join("; "))]
    Validation(Vec<String>),
}
