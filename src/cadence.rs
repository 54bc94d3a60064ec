//! Cycle cadence.
//!
//! ```text
//!   start        next         next+P       next+2P
//!     │ cycle ░░░░ │ cycle ░░░░ │ cycle ░░░░░░│░░░░░│ cycle
//!     └─ work ─┘   └─ work ─┘   └──── overrun ─────┘
//!                                  skip to the next boundary
//! ```
//!
//! Deadlines advance by whole periods from the start instant, so sleep
//! jitter does not accumulate.  A cycle that runs past one or more
//! boundaries is logged and the missed boundaries are dropped; the loop
//! never tries to catch up with back-to-back cycles.

use std::time::{Duration, Instant};

use log::warn;

use crate::error::Result;
use crate::sync::CancellationToken;

/// Shortest period a cadence runs at; shorter requests are raised to it.
pub const MIN_PERIOD: Duration = Duration::from_millis(1);

#[derive(Debug)]
pub struct Cadence {
    period: Duration,
    next: Instant,
    overruns: u64,
}

impl Cadence {
    /// The first deadline is one `period` from now.
    pub fn new(period: Duration) -> Self {
        Self::starting_at(period, Instant::now())
    }

    pub fn starting_at(period: Duration, start: Instant) -> Self {
        if period < MIN_PERIOD {
            warn!("cycle period {period:?} raised to {MIN_PERIOD:?}");
        }
        let period = period.max(MIN_PERIOD);
        Self {
            period,
            next: start + period,
            overruns: 0,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Cycles that missed at least one boundary.
    pub fn overruns(&self) -> u64 {
        self.overruns
    }

    /// Advance past `now` and return how long to wait for the next
    /// boundary.
    pub fn advance(&mut self, now: Instant) -> Duration {
        if now > self.next {
            let late = now - self.next;
            let missed = (late.as_nanos() / self.period.as_nanos()) as u32 + 1;
            self.overruns += 1;
            warn!(
                "cycle overran by {} ms, skipping {missed} period(s)",
                late.as_millis()
            );
            self.next += self.period * missed;
        }
        let wait = self.next - now;
        self.next += self.period;
        wait
    }

    /// Sleep until the next boundary.  Wakes early with
    /// `Err(Cancelled)` if `token` fires.
    pub fn wait(&mut self, token: &CancellationToken) -> Result<()> {
        let wait = self.advance(Instant::now());
        token.sleep(wait)
    }
}
