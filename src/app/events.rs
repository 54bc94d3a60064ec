//! Outbound cycle results.
//!
//! The [`CycleEngine`](super::service::CycleEngine) hands one
//! [`PublishedVector`] per cycle to every
//! [`VectorSink`](super::ports::VectorSink).  Sinks that forward vectors out
//! of process encode them with [`PublishedVector::encode`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::vector::DataVector;

/// A finished cycle: the vector after safety decisions, plus the events
/// the decisions saw.
#[derive(Debug, Clone, PartialEq)]
pub struct PublishedVector {
    pub vector: DataVector,
    pub events: Vec<String>,
}

/// Wire form of a [`PublishedVector`].  The description is not sent; the
/// receiver already holds it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorFrame {
    pub timestamp: DateTime<Utc>,
    pub data: Vec<f64>,
    pub events: Vec<String>,
}

impl PublishedVector {
    pub fn encode(&self) -> Result<Vec<u8>> {
        let frame = VectorFrame {
            timestamp: self.vector.timestamp(),
            data: self.vector.data().to_vec(),
            events: self.events.clone(),
        };
        postcard::to_allocvec(&frame).map_err(|e| Error::Encode(e.to_string()))
    }

    /// `(descriptor, value)` for every field flagged for upload.
    pub fn uploaded_values(&self) -> Vec<(&str, f64)> {
        self.vector
            .description()
            .items()
            .iter()
            .zip(self.vector.data())
            .filter(|(item, _)| item.upload)
            .map(|(item, value)| (item.descriptor.as_str(), *value))
            .collect()
    }
}

impl VectorFrame {
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        postcard::from_bytes(bytes).map_err(|e| Error::Encode(e.to_string()))
    }
}
