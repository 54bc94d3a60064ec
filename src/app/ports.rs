//! Port traits: the boundary between the cycle engine and the outside
//! world.
//!
//! ```text
//!   SampleCollector ──▶ CycleEngine ──▶ VectorSink
//!                           ▲
//!   CommandSource ──▶ Runner┘ (command thread)
//! ```
//!
//! Serial boards, uploaders and consoles implement these traits.  The
//! [`CycleEngine`](super::service::CycleEngine) only ever sees the traits,
//! so tests drive it with in-memory mocks.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use super::events::PublishedVector;
use crate::sensors::{InputConfig, SensorSample};
use crate::sync::CancellationToken;

// ───────────────────────────────────────────────────────────────
// Sample port (driven adapter: hardware → engine)
// ───────────────────────────────────────────────────────────────

/// Produces this cycle's raw samples.
pub trait SampleCollector: Send {
    /// Every input this collector can report.  Each becomes an `Input`
    /// field of the vector description.
    fn inputs(&self) -> Vec<Arc<InputConfig>>;

    /// Append the latest samples to `out`.  `now` is the cycle time.
    fn collect(&mut self, now: DateTime<Utc>, out: &mut Vec<SensorSample>);
}

// ───────────────────────────────────────────────────────────────
// Vector port (driven adapter: engine → upload / UI)
// ───────────────────────────────────────────────────────────────

/// Receives every finished cycle.
pub trait VectorSink: Send {
    fn publish(&mut self, vector: &PublishedVector);
}

// ───────────────────────────────────────────────────────────────
// Command port (driving adapter: operator → engine)
// ───────────────────────────────────────────────────────────────

/// Blocking source of operator command lines.
pub trait CommandSource: Send {
    /// The next line, or `None` once the source is exhausted.
    /// Implementations should return promptly after `token` fires.
    fn next_line(&mut self, token: &CancellationToken) -> Option<String>;
}
