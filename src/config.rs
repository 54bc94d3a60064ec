//! Engine configuration parameters
//!
//! Process-wide settings for the cycle engine.  Row-level configuration
//! (maths, filters, redundancy groups) lives in [`crate::rows`].

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};
use crate::rows::MAX_DURATION_SECS;

/// Largest accepted `command_queue_capacity`.
pub const MAX_COMMAND_QUEUE_CAPACITY: usize = 4096;

/// Core engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    // --- Timing ---
    /// Cycle period (milliseconds)
    pub cycle_period_ms: u64,

    // --- Logging ---
    /// Default level filter when `RUST_LOG` is unset
    pub log_level: String,
    /// Keep hidden filter sources in the vector
    pub verbose_vectors: bool,

    // --- Commands ---
    /// Accepted commands held for the next cycle; oldest dropped when full
    pub command_queue_capacity: usize,

    // --- Redundancy ---
    /// Grace period before redundancy decisions report invalid (seconds)
    pub redundant_invalid_value_delay_secs: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            // Timing
            cycle_period_ms: 100, // 10 Hz

            // Logging
            log_level: "info".to_string(),
            verbose_vectors: false,

            // Commands
            command_queue_capacity: 64,

            // Redundancy
            redundant_invalid_value_delay_secs: 0.0,
        }
    }
}

impl EngineConfig {
    pub fn cycle_period(&self) -> Duration {
        Duration::from_millis(self.cycle_period_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.cycle_period_ms == 0 {
            return Err(invalid("cycle_period_ms", "must be greater than zero"));
        }
        if !(1..=MAX_COMMAND_QUEUE_CAPACITY).contains(&self.command_queue_capacity) {
            return Err(invalid(
                "command_queue_capacity",
                format!(
                    "must be between 1 and {MAX_COMMAND_QUEUE_CAPACITY}, got {}",
                    self.command_queue_capacity
                ),
            ));
        }
        let delay = self.redundant_invalid_value_delay_secs;
        if !(0.0..=MAX_DURATION_SECS).contains(&delay) {
            return Err(invalid(
                "redundant_invalid_value_delay_secs",
                format!("must be between 0 and {MAX_DURATION_SECS} seconds, got {delay}"),
            ));
        }
        if self.log_level.parse::<log::LevelFilter>().is_err() {
            return Err(invalid(
                "log_level",
                format!("unknown level '{}'", self.log_level),
            ));
        }
        Ok(())
    }

    /// Read and validate a JSON config file.  Missing keys take defaults.
    pub fn load_from_json(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            invalid("path", format!("cannot read {}: {e}", path.display()))
        })?;
        let config: Self = serde_json::from_str(&text)
            .map_err(|e| invalid("json", format!("{}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }
}

fn invalid(field: &'static str, reason: impl Into<String>) -> crate::error::Error {
    ConfigError::InvalidSetting {
        field,
        reason: reason.into(),
    }
    .into()
}
