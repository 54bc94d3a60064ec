//! Integration test driver for `tests/integration/` submodules.
//!
//! Each `mod` below maps to a file that drives a built engine end to end
//! against the in-memory adapters in `mock_io`.  No boards, consoles or
//! timers are involved; every cycle is stamped explicitly.

mod command_tests;
mod cycle_tests;
mod mock_io;
mod redundancy_tests;
mod safety_tests;
