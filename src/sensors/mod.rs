//! Sensor samples and board connection states.
//!
//! Collectors outside the engine turn raw readings into [`SensorSample`]s;
//! the cycle maps each one onto its vector slot by name.  Board-state
//! witnesses travel as ordinary samples whose value is a
//! [`ConnectionState`] code.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The configured input a sample came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputConfig {
    pub name: String,
    /// Board the input is wired to, if any.
    pub board: Option<String>,
}

impl InputConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            board: None,
        }
    }

    pub fn on_board(mut self, board: impl Into<String>) -> Self {
        self.board = Some(board.into());
        self
    }

    /// Descriptor of the board-state witness for this input.
    pub fn board_state_field(&self) -> Option<String> {
        self.board.as_ref().map(|b| board_state_field(b))
    }
}

/// Descriptor of a board's connection-state field.
pub fn board_state_field(board: &str) -> String {
    format!("{board}_state")
}

// ───────────────────────────────────────────────────────────────
// SensorSample
// ───────────────────────────────────────────────────────────────

/// A named, timestamped value.  Setting the value stamps the time.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorSample {
    name: String,
    value: f64,
    timestamp: DateTime<Utc>,
    /// Milliseconds between the two latest stamps.
    loop_time_ms: f64,
    input: Option<Arc<InputConfig>>,
}

impl SensorSample {
    pub fn new(name: impl Into<String>, value: f64) -> Self {
        Self {
            name: name.into(),
            value,
            timestamp: Utc::now(),
            loop_time_ms: 0.0,
            input: None,
        }
    }

    pub fn from_input(input: Arc<InputConfig>, value: f64) -> Self {
        Self {
            name: input.name.clone(),
            value,
            timestamp: Utc::now(),
            loop_time_ms: 0.0,
            input: Some(input),
        }
    }

    /// Override the stamp; used when replaying recorded readings.
    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn loop_time_ms(&self) -> f64 {
        self.loop_time_ms
    }

    pub fn input(&self) -> Option<&Arc<InputConfig>> {
        self.input.as_ref()
    }

    pub fn set_value(&mut self, value: f64) {
        self.set_value_at(value, Utc::now());
    }

    pub fn set_value_at(&mut self, value: f64, timestamp: DateTime<Utc>) {
        let elapsed = timestamp - self.timestamp;
        self.loop_time_ms = elapsed.num_microseconds().unwrap_or(0) as f64 / 1000.0;
        self.timestamp = timestamp;
        self.value = value;
    }
}

// ───────────────────────────────────────────────────────────────
// ConnectionState
// ───────────────────────────────────────────────────────────────

/// Board connection state, stored in vectors as its numeric code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionState {
    NodeUnreachable = -1,
    Disconnected = 0,
    Connecting = 1,
    Connected = 2,
    ReadError = 3,
    NoDataAvailable = 4,
    ReturningNonValues = 5,
    ReceivingValues = 6,
}

impl ConnectionState {
    pub fn code(self) -> f64 {
        f64::from(self as i8)
    }

    /// Whether a witness slot holding `value` reports live data.
    pub fn is_receiving(value: f64) -> bool {
        value == Self::ReceivingValues.code()
    }

    pub fn from_code(value: f64) -> Option<Self> {
        let state = match value as i64 {
            -1 => Self::NodeUnreachable,
            0 => Self::Disconnected,
            1 => Self::Connecting,
            2 => Self::Connected,
            3 => Self::ReadError,
            4 => Self::NoDataAvailable,
            5 => Self::ReturningNonValues,
            6 => Self::ReceivingValues,
            _ => return None,
        };
        (state.code() == value).then_some(state)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}
