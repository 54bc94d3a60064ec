//! Threads around the engine.
//!
//! ```text
//!   ┌──────────── command thread ───────────┐
//!   │ CommandSource::next_line (blocking)   │
//!   │   └▶ CommandIntake::submit ─▶ queue ──┼──┐
//!   └───────────────────────────────────────┘  │ drained once per cycle
//!   ┌──────────── cycle loop (caller) ──────┐  │
//!   │ run_cycle ◀───────────────────────────┼──┘
//!   │ Cadence::wait                         │
//!   └───────────────────────────────────────┘
//!            both stop on the same CancellationToken
//! ```

use std::thread;
use std::time::Duration;

use chrono::Utc;
use log::{debug, info, warn};

use super::commands::CommandIntake;
use super::ports::CommandSource;
use super::service::CycleEngine;
use crate::cadence::Cadence;
use crate::sync::CancellationToken;

/// Drives a [`CycleEngine`] at a fixed period until cancelled.
pub struct Runner {
    engine: CycleEngine,
    period: Duration,
    max_cycles: Option<u64>,
}

impl Runner {
    pub fn new(engine: CycleEngine, period: Duration) -> Self {
        Self {
            engine,
            period,
            max_cycles: None,
        }
    }

    /// Stop by itself after `cycles` cycles.
    #[must_use]
    pub fn with_max_cycles(mut self, cycles: u64) -> Self {
        self.max_cycles = Some(cycles);
        self
    }

    pub fn token(&self) -> CancellationToken {
        self.engine.token().clone()
    }

    /// Run until the token fires (an `escape` command, a caller, or the
    /// cycle limit) and hand the engine back.
    ///
    /// A command thread still blocked on input at that point is left
    /// detached.
    pub fn run(mut self, source: impl CommandSource + 'static) -> CycleEngine {
        let token = self.token();
        let intake = self.engine.intake();
        let commands = {
            let token = token.clone();
            thread::Builder::new()
                .name("commands".into())
                .spawn(move || command_loop(source, &intake, &token))
        };
        let commands = match commands {
            Ok(handle) => Some(handle),
            Err(e) => {
                warn!("command thread not started, running without commands: {e}");
                None
            }
        };

        info!("cycle loop started, period {} ms", self.period.as_millis());
        let mut cadence = Cadence::new(self.period);
        while !token.is_cancelled() {
            self.engine.run_cycle(Utc::now());
            if self.max_cycles.is_some_and(|max| self.engine.cycles() >= max) {
                info!("cycle limit {} reached", self.engine.cycles());
                token.cancel();
                break;
            }
            if cadence.wait(&token).is_err() {
                break;
            }
        }
        info!(
            "cycle loop stopped after {} cycles ({} overruns)",
            self.engine.cycles(),
            cadence.overruns()
        );

        if let Some(handle) = commands {
            if handle.is_finished() {
                if handle.join().is_err() {
                    warn!("command thread panicked");
                }
            } else {
                debug!("command thread still waiting for input, detaching");
            }
        }
        self.engine
    }
}

fn command_loop(mut source: impl CommandSource, intake: &CommandIntake, token: &CancellationToken) {
    while !token.is_cancelled() {
        let Some(line) = source.next_line(token) else {
            debug!("command source closed");
            return;
        };
        intake.submit(&line);
    }
}
