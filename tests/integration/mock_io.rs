//! In-memory adapters for integration tests.
//!
//! `ScriptedCollector` reports whatever the test last set; `RecordingSink`
//! keeps every published vector for later assertions.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use parking_lot::Mutex;

use vector_cycle::app::PublishedVector;
use vector_cycle::app::ports::{SampleCollector, VectorSink};
use vector_cycle::sensors::{InputConfig, SensorSample};

// ── Clock ─────────────────────────────────────────────────────

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
}

pub fn at(secs: i64) -> DateTime<Utc> {
    t0() + Duration::seconds(secs)
}

// ── ScriptedCollector ─────────────────────────────────────────

/// Reports the current scripted value of each input; an input with no
/// value reports nothing, like a silent board.
#[derive(Clone)]
pub struct ScriptedCollector {
    inputs: Vec<Arc<InputConfig>>,
    values: Arc<Mutex<HashMap<String, f64>>>,
}

#[allow(dead_code)]
impl ScriptedCollector {
    pub fn new(names: &[&str]) -> Self {
        Self::with_inputs(names.iter().map(|n| InputConfig::new(*n)).collect())
    }

    /// Inputs as `(name, board)`.
    pub fn on_boards(inputs: &[(&str, &str)]) -> Self {
        Self::with_inputs(
            inputs
                .iter()
                .map(|(name, board)| InputConfig::new(*name).on_board(*board))
                .collect(),
        )
    }

    fn with_inputs(inputs: Vec<InputConfig>) -> Self {
        Self {
            inputs: inputs.into_iter().map(Arc::new).collect(),
            values: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn set(&self, name: &str, value: f64) {
        self.values.lock().insert(name.to_string(), value);
    }

    pub fn set_all(&self, values: &[(&str, f64)]) {
        for (name, value) in values {
            self.set(name, *value);
        }
    }

    pub fn silence(&self, name: &str) {
        self.values.lock().remove(name);
    }
}

impl SampleCollector for ScriptedCollector {
    fn inputs(&self) -> Vec<Arc<InputConfig>> {
        self.inputs.clone()
    }

    fn collect(&mut self, now: DateTime<Utc>, out: &mut Vec<SensorSample>) {
        let values = self.values.lock();
        for input in &self.inputs {
            if let Some(value) = values.get(&input.name) {
                out.push(SensorSample::from_input(Arc::clone(input), *value).at(now));
            }
        }
    }
}

// ── RecordingSink ─────────────────────────────────────────────

#[derive(Clone, Default)]
pub struct RecordingSink {
    published: Arc<Mutex<Vec<PublishedVector>>>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn published(&self) -> Vec<PublishedVector> {
        self.published.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.published.lock().len()
    }
}

impl VectorSink for RecordingSink {
    fn publish(&mut self, published: &PublishedVector) {
        self.published.lock().push(published.clone());
    }
}
