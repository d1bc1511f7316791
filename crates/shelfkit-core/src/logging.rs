#![forbid(unsafe_code)]

//! Subscriber installation for shelfkit's `tracing` output.
//!
//! Library code only emits through the `tracing` facade. Hosts that want the
//! output on stderr call [`init`] once at startup; `RUST_LOG` overrides the
//! configured directive when set.
//!
//! Targets used across the workspace:
//!
//! | target               | emitted by                         |
//! |----------------------|------------------------------------|
//! | `shelfkit.layout`    | layout model mutations             |
//! | `shelfkit.history`   | undo/redo stack                    |
//! | `shelfkit.placement` | placement interaction controller   |
//! | `shelfkit.segment`   | segment interaction controller     |
//! | `shelfkit.session`   | commit pipelines and notifications |

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing_subscriber::EnvFilter;

/// Default filter directive when `RUST_LOG` is unset.
pub const DEFAULT_DIRECTIVE: &str = "shelfkit=info";

/// Output format for the fmt subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Compact,
    Pretty,
    /// One JSON object per line.
    #[cfg(feature = "tracing-json")]
    Json,
}

/// Subscriber settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub directive: String,
    pub format: LogFormat,
    pub with_target: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            directive: DEFAULT_DIRECTIVE.to_string(),
            format: LogFormat::default(),
            with_target: true,
        }
    }
}

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("invalid log filter directive '{directive}': {reason}")]
    InvalidDirective { directive: String, reason: String },
    #[error("a global tracing subscriber is already installed: {0}")]
    AlreadyInstalled(String),
}

/// Build the filter: `RUST_LOG` first, then the configured directive.
pub fn build_filter(config: &LogConfig) -> Result<EnvFilter, LoggingError> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(&config.directive).map_err(|e| LoggingError::InvalidDirective {
        directive: config.directive.clone(),
        reason: e.to_string(),
    })
}

/// Install the global fmt subscriber.
pub fn init(config: &LogConfig) -> Result<(), LoggingError> {
    let filter = build_filter(config)?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(config.with_target);
    let installed = match config.format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        #[cfg(feature = "tracing-json")]
        LogFormat::Json => builder.json().try_init(),
    };
    installed.map_err(|e| LoggingError::AlreadyInstalled(e.to_string()))
}
