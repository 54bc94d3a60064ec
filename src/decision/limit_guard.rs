//! Limit guard: a latching safety decision.
//!
//! Registered in the safety group, so it runs **after** every regular
//! decision in the same cycle and can override what they wrote.
//!
//! ## Fault lifecycle
//!
//! 1. The watched sensor exceeds `max`.
//! 2. The guard latches: `<name>_tripped = 1`.
//! 3. Every cycle while latched, each listed output is forced to
//!    `safe_value`, whatever regular decisions commanded.
//! 4. The latch clears only on a `"<name> reset"` event in a cycle where
//!    the sensor is back at or below `max`.  A reset while still over the
//!    limit is ignored.

use log::{error, info, warn};
use serde::{Deserialize, Serialize};

use super::{Decision, PluginField, event_tokens};
use crate::error::Result;
use crate::vector::{DataVector, Slot, VectorDescription};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LimitGuardConfig {
    pub name: String,
    /// Field whose value is compared against `max`.
    pub sensor: String,
    pub max: f64,
    /// Fields forced to `safe_value` while tripped.
    pub outputs: Vec<String>,
    pub safe_value: f64,
}

#[derive(Debug)]
struct Indexes {
    sensor: usize,
    tripped: Slot,
    outputs: Vec<Slot>,
}

/// Latches when a sensor goes over its limit and holds outputs safe.
#[derive(Debug)]
pub struct LimitGuard {
    config: LimitGuardConfig,
    indexes: Option<Indexes>,
}

impl LimitGuard {
    pub fn new(config: LimitGuardConfig) -> Self {
        Self {
            config,
            indexes: None,
        }
    }

    fn tripped_field(&self) -> String {
        format!("{}_tripped", self.config.name)
    }

    fn is_reset(&self, event: &str) -> bool {
        let mut tokens = event_tokens(event);
        matches!(
            (tokens.next(), tokens.next(), tokens.next()),
            (Some(name), Some(cmd), None)
                if name.eq_ignore_ascii_case(&self.config.name)
                    && cmd.eq_ignore_ascii_case("reset")
        )
    }
}

impl Decision for LimitGuard {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn plugin_fields(&self) -> Vec<PluginField> {
        vec![PluginField::state(self.tripped_field())]
    }

    fn handled_events(&self) -> Vec<String> {
        vec![format!("{} reset", self.config.name)]
    }

    fn initialize(&mut self, description: &VectorDescription) -> Result<()> {
        let owner = &self.config.name;
        let sensor = description.require(&self.config.sensor, owner)?;
        let tripped = description.writable_slot(&self.tripped_field(), owner)?;
        let outputs = self
            .config
            .outputs
            .iter()
            .map(|o| description.writable_slot(o, owner))
            .collect::<Result<Vec<_>>>()?;
        self.indexes = Some(Indexes {
            sensor,
            tripped,
            outputs,
        });
        Ok(())
    }

    fn make_decision(&mut self, vector: &mut DataVector, events: &[String]) {
        let Some(ix) = &self.indexes else {
            panic!(
                "limit guard {}: make_decision called before initialize",
                self.config.name
            );
        };
        let value = vector[ix.sensor];
        let over = value > self.config.max;
        let mut tripped = vector[ix.tripped.index()] != 0.0;

        if over && !tripped {
            error!(
                "SAFETY FAULT SET: {} ({} = {value} > {})",
                self.config.name, self.config.sensor, self.config.max
            );
            tripped = true;
        } else if tripped && events.iter().any(|e| self.is_reset(e)) {
            if over {
                warn!(
                    "{}: reset ignored, {} still above {}",
                    self.config.name, self.config.sensor, self.config.max
                );
            } else {
                info!("SAFETY FAULT CLEARED: {}", self.config.name);
                tripped = false;
            }
        }

        vector.write(ix.tripped, if tripped { 1.0 } else { 0.0 });
        if tripped {
            for output in &ix.outputs {
                vector.write(*output, self.config.safe_value);
            }
        }
    }
}
