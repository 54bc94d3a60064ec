//! Inbound operator commands.
//!
//! Command lines arrive on the ingestion thread, are normalized, and are
//! dispatched to every handler registered for their first word:
//!
//! ```text
//!   "  oven_120 "  ──normalize──▶  "oven 120"
//!                                    │
//!                    ┌───────────────┴────────────────┐
//!                    ▼                                ▼
//!          no handler for "oven"         handlers["oven"] (any accepts?)
//!              Unknown                      Accepted / Rejected
//! ```
//!
//! Decisions register their `handled_events` through
//! [`CommandRegistry::register_event`]; the registered handler only checks
//! the shape of the command.  What the command means is up to the decision
//! when the accepted line reaches it as an event.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use log::{error, info, warn};
use parking_lot::Mutex;

/// Result of dispatching one command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    /// At least one handler accepted the command.
    Accepted,
    /// Handlers exist for the name but every one of them refused.
    Rejected,
    /// Nothing is registered under the command name.
    Unknown,
    /// The line was blank.
    Empty,
}

type Handler = Box<dyn Fn(&[&str]) -> bool + Send + Sync>;

/// Case-insensitive command table.  Several handlers may share a name.
#[derive(Default)]
pub struct CommandRegistry {
    handlers: HashMap<String, Vec<Handler>>,
}

impl std::fmt::Debug for CommandRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandRegistry")
            .field("names", &self.names())
            .finish()
    }
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `handler` under `name`.  The handler receives every token of the
    /// normalized line, the command name included.
    pub fn register(
        &mut self,
        name: &str,
        handler: impl Fn(&[&str]) -> bool + Send + Sync + 'static,
    ) {
        self.handlers
            .entry(name.to_ascii_lowercase())
            .or_default()
            .push(Box::new(handler));
    }

    /// Register the first word of a decision's handled event with a
    /// validator for the rest of it.
    pub fn register_event(&mut self, event: &str) {
        let expected: Vec<String> = normalize(event)
            .split_whitespace()
            .map(str::to_string)
            .collect();
        let Some(first) = expected.first().cloned() else {
            return;
        };
        self.register(&first, move |args| matches_event(&expected, args));
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.handlers.contains_key(&name.to_ascii_lowercase())
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Normalize and run `line`, logging the outcome.  Returns the
    /// normalized line with the outcome.
    ///
    /// `help` is built in: it logs every registered name.
    pub fn dispatch(&self, line: &str) -> (String, CommandOutcome) {
        let command = normalize(line);
        let tokens: Vec<&str> = command.split_whitespace().collect();
        let Some(name) = tokens.first() else {
            return (command, CommandOutcome::Empty);
        };

        if name.eq_ignore_ascii_case("help") {
            info!("Commands: {}", self.names().join(", "));
            return (command, CommandOutcome::Accepted);
        }

        let Some(handlers) = self.handlers.get(&name.to_ascii_lowercase()) else {
            info!("Command: {command} - unknown command");
            return (command, CommandOutcome::Unknown);
        };

        // Every handler runs even after one accepts.
        let accepted = handlers
            .iter()
            .fold(false, |accepted, handler| handler(&tokens) | accepted);
        if accepted {
            info!("Command: {command} - command accepted");
            (command, CommandOutcome::Accepted)
        } else {
            error!("Command: {command} - bad command");
            (command, CommandOutcome::Rejected)
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Queue
// ───────────────────────────────────────────────────────────────

/// Accepted commands waiting for the next cycle.  Bounded; when full the
/// oldest entry is dropped.  Storage grows with use, not with `capacity`.
#[derive(Debug)]
pub struct CommandQueue {
    capacity: usize,
    pending: Mutex<VecDeque<String>>,
}

impl CommandQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            pending: Mutex::new(VecDeque::new()),
        }
    }

    pub fn push(&self, command: String) {
        let mut pending = self.pending.lock();
        if pending.len() >= self.capacity {
            if let Some(dropped) = pending.pop_front() {
                warn!("command queue full, dropping '{dropped}'");
            }
        }
        pending.push_back(command);
    }

    /// Take every pending command.  The lock is held only while draining.
    pub fn drain(&self) -> Vec<String> {
        let mut pending = self.pending.lock();
        pending.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Dispatch plus enqueue, shared by the command thread and the engine.
#[derive(Debug, Clone)]
pub struct CommandIntake {
    registry: Arc<CommandRegistry>,
    queue: Arc<CommandQueue>,
}

impl CommandIntake {
    pub fn new(registry: Arc<CommandRegistry>, queue: Arc<CommandQueue>) -> Self {
        Self { registry, queue }
    }

    /// Run `line` through the registry; accepted commands become events of
    /// the next cycle.
    pub fn submit(&self, line: &str) -> CommandOutcome {
        let (command, outcome) = self.registry.dispatch(line);
        if outcome == CommandOutcome::Accepted {
            self.queue.push(command);
        }
        outcome
    }

    pub fn registry(&self) -> &CommandRegistry {
        &self.registry
    }

    pub fn queue(&self) -> &CommandQueue {
        &self.queue
    }
}

/// Underscores become spaces, whitespace runs collapse, ends are trimmed.
pub fn normalize(line: &str) -> String {
    line.replace('_', " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// `args` is the expected event, optionally followed by one numeric
/// argument.  Fixed words compare case-insensitively; the command name
/// already matched through the registry.
fn matches_event(expected: &[String], args: &[&str]) -> bool {
    if args.len() != expected.len() && args.len() != expected.len() + 1 {
        return false;
    }
    let fixed_match = expected
        .iter()
        .zip(args)
        .skip(1)
        .all(|(e, a)| e.eq_ignore_ascii_case(a));
    if !fixed_match {
        return false;
    }
    args.get(expected.len()).is_none_or(|arg| is_numeric_arg(arg))
}

/// Decimal, `0x` hex, or `#` hex.
pub fn is_numeric_arg(arg: &str) -> bool {
    if let Some(hex) = arg.strip_prefix("0x").or_else(|| arg.strip_prefix('#')) {
        return u32::from_str_radix(hex, 16).is_ok();
    }
    arg.parse::<f64>().is_ok()
}
