//! Unified error types for the vector-cycle engine.
//!
//! A single `Error` enum that every subsystem converts into, so the
//! builder and the cycle loop handle failures uniformly.  Everything here
//! is a configuration-time or initialization-time fault; adverse runtime
//! conditions (stale sensors, no valid value) are modelled states, not
//! errors.

use thiserror::Error;

// ---------------------------------------------------------------------------
// Top-level engine error
// ---------------------------------------------------------------------------

/// Every fallible operation in the engine funnels into this type.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// A configuration row could not be turned into typed configuration.
    #[error("config: {0}")]
    Config(#[from] ConfigError),
    /// The vector model was used inconsistently.
    #[error("vector: {0}")]
    Vector(#[from] VectorError),
    /// A component referenced a field that is not in the vector description.
    #[error("init: field used by '{owner}' is not in the vector description: {field}")]
    Init { owner: String, field: String },
    /// An expression failed to compile or has the wrong type.
    #[error("expression: {0}")]
    Expression(#[from] ExpressionError),
    /// A filter row points at inputs that do not exist or collide.
    #[error("filter: {0}")]
    Filter(#[from] FilterError),
    /// A blocking wait was aborted by the cancellation token.
    #[error("operation cancelled")]
    Cancelled,
    #[error("encode: {0}")]
    Encode(String),
}

impl Error {
    pub(crate) fn missing_field(owner: &str, field: &str) -> Self {
        Self::Init {
            owner: owner.to_string(),
            field: field.to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// The row is malformed; carries the row text and the expected format.
    #[error("{reason}. Format: {format}. Line {line}: {row}")]
    BadRow {
        reason: String,
        format: &'static str,
        row: String,
        line: usize,
    },
    /// A redundancy group has rows but no sensor list.
    #[error("redundancy - missing sensors for '{name}':\n{rows}")]
    MissingSensors { name: String, rows: String },
    /// Sensor and board-state lists disagree in length.
    #[error("redundancy '{name}' - sensors ({sensors}) must match sensor board states ({board_states})")]
    BoardStateMismatch {
        name: String,
        sensors: usize,
        board_states: usize,
    },
    /// An engine setting is out of range.
    #[error("invalid setting {field}: {reason}")]
    InvalidSetting { field: &'static str, reason: String },
}

// ---------------------------------------------------------------------------
// Vector model errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Error)]
pub enum VectorError {
    /// Two description items share a descriptor.
    #[error("descriptor listed twice in vector: {0}")]
    DuplicateDescriptor(String),
    /// A data buffer does not match the description length.
    #[error("wrong vector length (data, description): {data} <> {description}")]
    LengthMismatch { data: usize, description: usize },
    /// Inputs are produced by sampling only.
    #[error("field '{0}' is an input and cannot be written by the engine")]
    InputNotWritable(String),
    /// Samples may only land in input fields.
    #[error("field '{0}' is not an input and cannot hold a sample")]
    NotAnInput(String),
    /// The descriptor is not part of the description.
    #[error("unknown vector field: {0}")]
    UnknownField(String),
    /// The index is past the end of the vector.
    #[error("vector index {index} out of range (length {len})")]
    IndexOutOfRange { index: usize, len: usize },
}

// ---------------------------------------------------------------------------
// Expression errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExpressionError {
    /// The expression text could not be parsed.
    #[error("failed to parse '{expression}' at offset {offset}: {reason}")]
    Parse {
        expression: String,
        offset: usize,
        reason: String,
    },
    /// A function name is not supported or got the wrong argument count.
    #[error("unsupported function call in '{expression}': {reason}")]
    Function { expression: String, reason: String },
    /// A boolean expression was required.
    #[error("'{name}' requires a boolean expression: {expression}")]
    NotBoolean { name: String, expression: String },
    /// A source field was not among the supplied fields.
    #[error("math {name} uses {source_name} which was not found in received vector fields")]
    MissingSource { name: String, source_name: String },
}

// ---------------------------------------------------------------------------
// Filter errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Error)]
pub enum FilterError {
    /// A filter source does not resolve to any input.
    #[error("filter '{filter}' points to missing sensor: {source_name}")]
    MissingSource { filter: String, source_name: String },
    /// A filter source resolves to more inputs than allowed.
    #[error("filter '{filter}' source '{source_name}' matches {count} inputs (naming collision)")]
    AmbiguousSource {
        filter: String,
        source_name: String,
        count: usize,
    },
    /// DiffAvg needs exactly two sources.
    #[error("filter '{0}' of type DiffAvg must have two source names")]
    DiffAvgSources(String),
    /// Length is not a finite, non-negative number of seconds in range.
    #[error("filter '{filter}' has invalid length {length} s")]
    InvalidLength { filter: String, length: f64 },
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Engine-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
