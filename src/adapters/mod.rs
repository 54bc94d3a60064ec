//! Adapters: concrete implementations of the port traits for running the
//! engine as a host process.
//!
//! | Adapter      | Implements        | Connects to                  |
//! |--------------|-------------------|------------------------------|
//! | `log_sink`   | VectorSink        | Log output                   |
//! | `simulated`  | SampleCollector   | Simulated boards             |
//! | `stdin`      | CommandSource     | Console / any `BufRead`      |
//!
//! Board connection states come from [`crate::sync::BoardStateCollector`].

pub mod log_sink;
pub mod simulated;
pub mod stdin;

pub use log_sink::LogVectorSink;
pub use simulated::{SimulatedCollector, SimulatedSensor};
pub use stdin::LineCommands;
