use std::ops::Index;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use super::{FieldDirection, Slot, VectorDescription};
use crate::error::{Result, VectorError};

/// One instant's values, laid out against a [`VectorDescription`].
///
/// The buffer length always equals the description length.  Times stored
/// in the vector itself (deadlines, target times) are milliseconds since
/// the Unix epoch as `f64`; `0.0` means "none".
#[derive(Debug, Clone, PartialEq)]
pub struct DataVector {
    timestamp: DateTime<Utc>,
    data: Vec<f64>,
    description: Arc<VectorDescription>,
}

impl DataVector {
    pub fn new(
        description: Arc<VectorDescription>,
        timestamp: DateTime<Utc>,
        data: Vec<f64>,
    ) -> Result<Self> {
        if data.len() != description.len() {
            return Err(VectorError::LengthMismatch {
                data: data.len(),
                description: description.len(),
            }
            .into());
        }
        Ok(Self {
            timestamp,
            data,
            description,
        })
    }

    /// All-zero vector for `description`.
    pub fn zeroed(description: Arc<VectorDescription>, timestamp: DateTime<Utc>) -> Self {
        let data = vec![0.0; description.len()];
        Self {
            timestamp,
            data,
            description,
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn set_timestamp(&mut self, timestamp: DateTime<Utc>) {
        self.timestamp = timestamp;
    }

    pub fn description(&self) -> &Arc<VectorDescription> {
        &self.description
    }

    pub fn data(&self) -> &[f64] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<f64> {
        self.data.get(index).copied()
    }

    /// Value by descriptor.
    pub fn value(&self, descriptor: &str) -> Option<f64> {
        self.description.index_of(descriptor).map(|i| self.data[i])
    }

    /// Write through a pre-validated slot.
    pub fn write(&mut self, slot: Slot, value: f64) {
        self.data[slot.index()] = value;
    }

    /// Checked write of a non-input field.
    pub fn set(&mut self, index: usize, value: f64) -> Result<()> {
        let item = self
            .description
            .item(index)
            .ok_or(VectorError::IndexOutOfRange {
                index,
                len: self.data.len(),
            })?;
        if item.direction == FieldDirection::Input {
            return Err(VectorError::InputNotWritable(item.descriptor.clone()).into());
        }
        self.data[index] = value;
        Ok(())
    }

    /// Checked write of a non-input field by descriptor.
    pub fn set_field(&mut self, descriptor: &str, value: f64) -> Result<()> {
        let index = self
            .description
            .index_of(descriptor)
            .ok_or_else(|| VectorError::UnknownField(descriptor.to_string()))?;
        self.set(index, value)
    }

    /// Store a sampled value.  Only `Input` fields are accepted here.
    pub fn record_sample(&mut self, index: usize, value: f64) -> Result<()> {
        let item = self
            .description
            .item(index)
            .ok_or(VectorError::IndexOutOfRange {
                index,
                len: self.data.len(),
            })?;
        if item.direction != FieldDirection::Input {
            return Err(VectorError::NotAnInput(item.descriptor.clone()).into());
        }
        self.data[index] = value;
        Ok(())
    }

    // ── Embedded times ────────────────────────────────────────

    /// Vector time as embedded milliseconds.
    pub fn time_ms(&self) -> f64 {
        to_vector_ms(self.timestamp)
    }

    /// Embedded time `milliseconds` after the vector time, saturating at
    /// the ends of the representable calendar.
    pub fn time_after(&self, milliseconds: i64) -> f64 {
        let shifted = Duration::try_milliseconds(milliseconds)
            .and_then(|offset| self.timestamp.checked_add_signed(offset));
        match shifted {
            Some(at) => to_vector_ms(at),
            None if milliseconds < 0 => to_vector_ms(DateTime::<Utc>::MIN_UTC),
            None => to_vector_ms(DateTime::<Utc>::MAX_UTC),
        }
    }

    /// Whether the vector time is at or past `target`.
    pub fn reached(&self, target: f64) -> bool {
        self.time_ms() >= target
    }
}

impl Index<usize> for DataVector {
    type Output = f64;

    fn index(&self, index: usize) -> &f64 {
        &self.data[index]
    }
}

/// Encode a timestamp the way times are embedded in vector slots.
pub fn to_vector_ms(time: DateTime<Utc>) -> f64 {
    time.timestamp_micros() as f64 / 1000.0
}
