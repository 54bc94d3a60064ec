//! Log-based vector sink adapter.
//!
//! Implements [`VectorSink`] by writing published vectors to the log.  An
//! uploader forwarding vectors to a server would implement the same trait
//! around [`PublishedVector::encode`].

use log::{debug, info, warn};

use crate::app::events::PublishedVector;
use crate::app::ports::VectorSink;

/// Logs one vector every `every` cycles, plus every vector carrying events.
#[derive(Debug)]
pub struct LogVectorSink {
    every: u64,
    seen: u64,
}

impl LogVectorSink {
    pub fn new(every: u64) -> Self {
        Self {
            every: every.max(1),
            seen: 0,
        }
    }
}

impl VectorSink for LogVectorSink {
    fn publish(&mut self, published: &PublishedVector) {
        self.seen += 1;
        if self.seen % self.every != 0 && published.events.is_empty() {
            return;
        }
        let fields = published
            .uploaded_values()
            .iter()
            .map(|(name, value)| format!("{name}={value:.2}"))
            .collect::<Vec<_>>()
            .join(" ");
        info!(
            "VECTOR | {} | {fields} | events={:?}",
            published.vector.timestamp().format("%H:%M:%S%.3f"),
            published.events
        );
        match published.encode() {
            Ok(bytes) => debug!("VECTOR | {} bytes encoded", bytes.len()),
            Err(e) => warn!("VECTOR | encode failed: {e}"),
        }
    }
}
