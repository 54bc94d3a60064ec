//! Simulated board inputs for running the engine without hardware.
//!
//! Each sensor follows a slow sine around its base value.  A sensor whose
//! board is not `ReceivingValues` in the [`BoardRegistry`] reports nothing,
//! the way a disconnected serial board goes quiet.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::app::ports::SampleCollector;
use crate::sensors::{ConnectionState, InputConfig, SensorSample};
use crate::sync::{BoardRegistry, CancellationToken};

#[derive(Debug, Clone)]
pub struct SimulatedSensor {
    pub input: Arc<InputConfig>,
    pub base: f64,
    pub amplitude: f64,
}

pub struct SimulatedCollector {
    sensors: Vec<SimulatedSensor>,
    boards: Arc<BoardRegistry>,
    token: CancellationToken,
    step: u64,
}

impl SimulatedCollector {
    pub fn new(
        sensors: Vec<SimulatedSensor>,
        boards: Arc<BoardRegistry>,
        token: CancellationToken,
    ) -> Self {
        Self {
            sensors,
            boards,
            token,
            step: 0,
        }
    }

    fn board_receiving(&self, input: &InputConfig) -> bool {
        let Some(board) = &input.board else {
            return true;
        };
        matches!(
            self.boards.get(board, &self.token),
            Ok(Some(info)) if info.state == ConnectionState::ReceivingValues
        )
    }
}

impl SampleCollector for SimulatedCollector {
    fn inputs(&self) -> Vec<Arc<InputConfig>> {
        self.sensors.iter().map(|s| Arc::clone(&s.input)).collect()
    }

    fn collect(&mut self, now: DateTime<Utc>, out: &mut Vec<SensorSample>) {
        self.step += 1;
        let phase = self.step as f64 / 20.0;
        for (i, sensor) in self.sensors.iter().enumerate() {
            if !self.board_receiving(&sensor.input) {
                continue;
            }
            let value = sensor.base + sensor.amplitude * (phase + i as f64).sin();
            out.push(SensorSample::from_input(Arc::clone(&sensor.input), value).at(now));
        }
    }
}
