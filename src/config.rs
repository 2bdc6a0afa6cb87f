//! Run configuration.
//!
//! Settings can come from a JSON file; anything missing falls back to the
//! defaults below.
//!
//! ```json
//! { "tick_ms": 250, "max_steps": 1000, "input": 5 }
//! ```

use serde::{Serialize, Deserialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Delay between steps when none is configured.
pub const DEFAULT_TICK_MS: u64 = 1;

/// Step limit the CLI applies when none is configured.
pub const DEFAULT_CLI_MAX_STEPS: u64 = 10_000;

/// Settings for a background run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Delay between steps, in milliseconds.
    pub tick_ms: u64,
    /// Stop after this many successful steps. `None` runs until halt,
    /// error or `stop()`.
    pub max_steps: Option<u64>,
    /// Initial value on the input port.
    pub input: u8,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            tick_ms: DEFAULT_TICK_MS,
            max_steps: None,
            input: 0,
        }
    }
}

impl RunConfig {
    /// Load a configuration from a JSON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_json(&text)
    }

    /// Parse a configuration from JSON text.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)?;
        if config.input > 0x0F {
            return Err(ConfigError::InvalidInput(config.input));
        }
        Ok(config)
    }

    /// Fill in a step limit if none is set.
    pub fn or_max_steps(mut self, max_steps: u64) -> Self {
        self.max_steps.get_or_insert(max_steps);
        self
    }

    /// The inter-step delay.
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }
}

/// Errors that can occur while loading a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config: {0}")]
    Json(#[from] serde_json::Error),

    #[error("input value {0} does not fit in 4 bits")]
    InvalidInput(u8),
}
