//! Decision contract.
//!
//! A decision is a state machine that owns a few vector fields and runs
//! once per cycle:
//!
//! ```text
//!   plugin_fields() ──▶ description built ──▶ initialize(desc)
//!                                                  │
//!            ┌─────────────────────────────────────┘
//!            ▼
//!   make_decision(vector, events)   (every cycle, strictly sequential)
//! ```
//!
//! `initialize` resolves every field the decision touches to a slot index
//! once; `make_decision` reads and writes only those slots.  Decisions
//! never run concurrently with each other or with the expansions.

pub mod limit_guard;
pub mod redundancy;

pub use limit_guard::{LimitGuard, LimitGuardConfig};
pub use redundancy::{RedundancyConfig, RedundancyDecision, RedundancyStrategy};

use crate::error::Result;
use crate::vector::{DataVector, FieldDirection, VectorDescription, VectorDescriptionItem};

/// A vector field a decision declares ownership of.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginField {
    pub name: String,
    pub direction: FieldDirection,
    pub upload: bool,
}

impl PluginField {
    pub fn new(name: impl Into<String>, direction: FieldDirection) -> Self {
        Self {
            name: name.into(),
            direction,
            upload: true,
        }
    }

    pub fn state(name: impl Into<String>) -> Self {
        Self::new(name, FieldDirection::State)
    }

    pub fn output(name: impl Into<String>) -> Self {
        Self::new(name, FieldDirection::Output)
    }

    pub fn to_item(&self) -> VectorDescriptionItem {
        VectorDescriptionItem::new(self.name.clone(), self.direction).with_upload(self.upload)
    }
}

/// The interface every control algorithm implements.
pub trait Decision: Send {
    /// Unique name; also the default field the decision owns.
    fn name(&self) -> &str;

    /// Fields to add to the vector description before the first cycle.
    fn plugin_fields(&self) -> Vec<PluginField>;

    /// Command patterns this decision acts on, e.g. `"oven"` or
    /// `"heater reset"`.  Only used to register command names; arguments
    /// are checked inside [`make_decision`](Self::make_decision).
    fn handled_events(&self) -> Vec<String> {
        Vec::new()
    }

    /// Resolve and cache field indexes.  Fails naming the first missing
    /// field.
    fn initialize(&mut self, description: &VectorDescription) -> Result<()>;

    /// Run one state transition against the shared vector.
    ///
    /// # Panics
    ///
    /// When called before a successful [`initialize`](Self::initialize).
    fn make_decision(&mut self, vector: &mut DataVector, events: &[String]);
}

/// Split an event into whitespace-separated tokens.
pub fn event_tokens(event: &str) -> impl Iterator<Item = &str> {
    event.split_whitespace()
}
