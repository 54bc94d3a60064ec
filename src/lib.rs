//! Vector-cycle engine library.
//!
//! Samples redundant sensors on a fixed period, derives math and filter
//! fields, runs decisions in a deterministic order and publishes one
//! vector per cycle.  The binary wires simulated boards and a console; the
//! library exposes every part for integration testing and other hosts.

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod cadence;
pub mod config;
pub mod decision;
pub mod expansion;
pub mod rows;
pub mod sensors;
pub mod sync;
pub mod vector;

mod error;

pub use error::{ConfigError, Error, ExpressionError, FilterError, Result, VectorError};
