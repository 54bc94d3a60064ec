//! Application core.
//!
//! Builds and drives the vector cycle: description assembly, expansions,
//! decisions, command intake and publication.  All interaction with boards,
//! consoles and uploaders happens through the **port traits** in [`ports`],
//! keeping this layer testable without real peripherals.

pub mod commands;
pub mod events;
pub mod ports;
pub mod runner;
pub mod service;

pub use commands::{CommandIntake, CommandOutcome, CommandQueue, CommandRegistry};
pub use events::{PublishedVector, VectorFrame};
pub use ports::{CommandSource, SampleCollector, VectorSink};
pub use runner::Runner;
pub use service::{CycleEngine, EngineBuilder};
