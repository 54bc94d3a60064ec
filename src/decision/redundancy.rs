//! Redundant sensor fusion.
//!
//! Combines N readings of the same quantity into one value.  A sensor
//! contributes only while every one of its board-state witnesses reports
//! [`ConnectionState::ReceivingValues`] and its value sits inside the valid
//! range.  With no contributing sensor the decision falls back to the
//! configured invalid value, optionally after a grace period.
//!
//! ## Grace period
//!
//! With `invalid_value_delay_secs > 0` the decision owns
//! `<name>_invalidValueDelay`, an embedded deadline:
//!
//! 1. First cycle with nothing valid: deadline = now + delay, value held.
//! 2. Later cycles before the deadline: value held.
//! 3. First cycle at or past the deadline: value = invalid default.
//! 4. Any valid reading: deadline cleared, normal computation resumes.

use std::fmt;
use std::str::FromStr;

use log::debug;
use serde::{Deserialize, Serialize};

use super::{Decision, PluginField};
use crate::error::{ConfigError, Result};
use crate::sensors::ConnectionState;
use crate::vector::{DataVector, Slot, VectorDescription};

// ───────────────────────────────────────────────────────────────
// Strategy
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RedundancyStrategy {
    #[default]
    Median,
    Max,
    Min,
    Average,
}

impl RedundancyStrategy {
    /// Reduce a non-empty buffer.  `Median` sorts `values` in place.
    pub fn calculate(self, values: &mut [f64]) -> f64 {
        match self {
            Self::Median => median(values),
            Self::Max => values.iter().copied().fold(f64::MIN, f64::max),
            Self::Min => values.iter().copied().fold(f64::MAX, f64::min),
            Self::Average => values.iter().sum::<f64>() / values.len() as f64,
        }
    }
}

fn median(values: &mut [f64]) -> f64 {
    values.sort_unstable_by(f64::total_cmp);
    let middle = values.len() / 2;
    if values.len() % 2 == 1 {
        values[middle]
    } else {
        (values[middle - 1] + values[middle]) / 2.0
    }
}

impl FromStr for RedundancyStrategy {
    type Err = ();

    fn from_str(s: &str) -> core::result::Result<Self, ()> {
        match s {
            "Median" => Ok(Self::Median),
            "Max" => Ok(Self::Max),
            "Min" => Ok(Self::Min),
            "Average" => Ok(Self::Average),
            _ => Err(()),
        }
    }
}

impl fmt::Display for RedundancyStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

// ───────────────────────────────────────────────────────────────
// Config
// ───────────────────────────────────────────────────────────────

/// Immutable per-decision configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct RedundancyConfig {
    name: String,
    sensors: Vec<String>,
    sensor_board_states: Vec<Vec<String>>,
    valid_range: (f64, f64),
    default_invalid_value: f64,
    strategy: RedundancyStrategy,
    invalid_value_delay_secs: f64,
}

impl RedundancyConfig {
    /// `sensor_board_states[i]` lists the witnesses of `sensors[i]`.
    pub fn new(
        name: impl Into<String>,
        sensors: Vec<String>,
        sensor_board_states: Vec<Vec<String>>,
        valid_range: (f64, f64),
        default_invalid_value: f64,
        strategy: RedundancyStrategy,
    ) -> Result<Self> {
        let name = name.into();
        if sensors.len() != sensor_board_states.len() {
            return Err(ConfigError::BoardStateMismatch {
                name,
                sensors: sensors.len(),
                board_states: sensor_board_states.len(),
            }
            .into());
        }
        Ok(Self {
            name,
            sensors,
            sensor_board_states,
            valid_range,
            default_invalid_value,
            strategy,
            invalid_value_delay_secs: 0.0,
        })
    }

    pub fn with_invalid_value_delay(mut self, secs: f64) -> Self {
        self.invalid_value_delay_secs = secs;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn sensors(&self) -> &[String] {
        &self.sensors
    }

    pub fn strategy(&self) -> RedundancyStrategy {
        self.strategy
    }

    pub fn valid_range(&self) -> (f64, f64) {
        self.valid_range
    }

    pub fn default_invalid_value(&self) -> f64 {
        self.default_invalid_value
    }

    pub fn invalid_value_delay_secs(&self) -> f64 {
        self.invalid_value_delay_secs
    }

    fn has_delay(&self) -> bool {
        self.invalid_value_delay_secs > 0.0
    }

    fn delay_field(&self) -> String {
        format!("{}_invalidValueDelay", self.name)
    }

    fn in_range(&self, value: f64) -> bool {
        !(value < self.valid_range.0 || value > self.valid_range.1)
    }
}

// ───────────────────────────────────────────────────────────────
// Decision
// ───────────────────────────────────────────────────────────────

#[derive(Debug)]
struct Indexes {
    value: Slot,
    deadline: Option<Slot>,
    sensors: Vec<usize>,
    board_states: Vec<Vec<usize>>,
}

impl Indexes {
    fn resolve(desc: &VectorDescription, config: &RedundancyConfig) -> Result<Self> {
        let owner = config.name();
        let value = desc.writable_slot(owner, owner)?;
        let deadline = if config.has_delay() {
            Some(desc.writable_slot(&config.delay_field(), owner)?)
        } else {
            None
        };
        let sensors = config
            .sensors
            .iter()
            .map(|s| desc.require(s, owner))
            .collect::<Result<Vec<_>>>()?;
        let board_states = config
            .sensor_board_states
            .iter()
            .map(|states| {
                states
                    .iter()
                    .map(|s| desc.require(s, owner))
                    .collect::<Result<Vec<_>>>()
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            value,
            deadline,
            sensors,
            board_states,
        })
    }
}

/// Fuses redundant sensors into the field named after the decision.
#[derive(Debug)]
pub struct RedundancyDecision {
    config: RedundancyConfig,
    indexes: Option<Indexes>,
    /// Reused every cycle; never grows past the sensor count.
    buffer: Vec<f64>,
}

impl RedundancyDecision {
    pub fn new(config: RedundancyConfig) -> Self {
        let buffer = Vec::with_capacity(config.sensors.len());
        Self {
            config,
            indexes: None,
            buffer,
        }
    }

    pub fn config(&self) -> &RedundancyConfig {
        &self.config
    }
}

impl Decision for RedundancyDecision {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn plugin_fields(&self) -> Vec<PluginField> {
        let mut fields = vec![PluginField::state(self.config.name.clone())];
        if self.config.has_delay() {
            fields.push(PluginField::state(self.config.delay_field()));
        }
        fields
    }

    fn initialize(&mut self, description: &VectorDescription) -> Result<()> {
        self.indexes = Some(Indexes::resolve(description, &self.config)?);
        Ok(())
    }

    fn make_decision(&mut self, vector: &mut DataVector, _events: &[String]) {
        let Self {
            config,
            indexes,
            buffer,
        } = self;
        let Some(ix) = indexes.as_ref() else {
            panic!(
                "redundancy {}: make_decision called before initialize",
                config.name
            );
        };

        buffer.clear();
        for (sensor, witnesses) in ix.sensors.iter().zip(&ix.board_states) {
            if !witnesses
                .iter()
                .all(|&w| ConnectionState::is_receiving(vector[w]))
            {
                continue;
            }
            let value = vector[*sensor];
            if config.in_range(value) {
                buffer.push(value);
            }
        }

        if !buffer.is_empty() {
            vector.write(ix.value, config.strategy.calculate(buffer));
            if let Some(deadline) = ix.deadline {
                vector.write(deadline, 0.0);
            }
            return;
        }

        let Some(deadline_slot) = ix.deadline else {
            vector.write(ix.value, config.default_invalid_value);
            return;
        };
        let deadline = vector[deadline_slot.index()];
        if deadline == 0.0 {
            let delay_ms = (config.invalid_value_delay_secs * 1000.0) as i64;
            vector.write(deadline_slot, vector.time_after(delay_ms));
            debug!("redundancy {}: no valid sensors, holding value", config.name);
        } else if vector.reached(deadline) {
            if vector[ix.value.index()] != config.default_invalid_value {
                debug!("redundancy {}: invalid value delay expired", config.name);
            }
            vector.write(ix.value, config.default_invalid_value);
        }
    }
}
