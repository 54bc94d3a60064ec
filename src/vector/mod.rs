//! Vector model.
//!
//! A [`VectorDescription`] is the ordered catalog of every slot in the
//! cycle vector; a [`DataVector`] is one instant's values laid out against
//! it.  The description is built once per configuration and never changes,
//! so indexes resolved against it stay valid for the life of the process.

mod data;

pub use data::{DataVector, to_vector_ms};

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result, VectorError};

// ───────────────────────────────────────────────────────────────
// Description items
// ───────────────────────────────────────────────────────────────

/// Who produces a field's value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldDirection {
    /// Produced by sampling; the engine never writes it.
    Input,
    /// Internal bookkeeping of expansions and decisions.
    State,
    /// Commanded values for actuators.
    Output,
}

/// One slot in the vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorDescriptionItem {
    pub descriptor: String,
    pub data_type: String,
    pub direction: FieldDirection,
    /// Whether listeners forwarding the vector out of process include it.
    pub upload: bool,
}

impl VectorDescriptionItem {
    pub fn new(descriptor: impl Into<String>, direction: FieldDirection) -> Self {
        Self {
            descriptor: descriptor.into(),
            data_type: "double".to_string(),
            direction,
            upload: true,
        }
    }

    pub fn with_upload(mut self, upload: bool) -> Self {
        self.upload = upload;
        self
    }
}

// ───────────────────────────────────────────────────────────────
// Writable slot handle
// ───────────────────────────────────────────────────────────────

/// Index of a field the holder may write.
///
/// Only obtainable through [`VectorDescription::writable_slot`], which
/// refuses `Input` fields, so writes through a `Slot` never need a check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Slot(usize);

impl Slot {
    pub fn index(self) -> usize {
        self.0
    }
}

// ───────────────────────────────────────────────────────────────
// VectorDescription
// ───────────────────────────────────────────────────────────────

/// Ordered, named catalog of vector slots.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorDescription {
    items: Vec<VectorDescriptionItem>,
    index: HashMap<String, usize>,
}

impl VectorDescription {
    /// Build the catalog.  Fails if two items share a descriptor.
    pub fn new(items: Vec<VectorDescriptionItem>) -> Result<Self> {
        let mut index = HashMap::with_capacity(items.len());
        for (i, item) in items.iter().enumerate() {
            if index.insert(item.descriptor.clone(), i).is_some() {
                return Err(VectorError::DuplicateDescriptor(item.descriptor.clone()).into());
            }
        }
        Ok(Self { items, index })
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[VectorDescriptionItem] {
        &self.items
    }

    pub fn item(&self, index: usize) -> Option<&VectorDescriptionItem> {
        self.items.get(index)
    }

    /// Slot position of `descriptor`, if present.
    pub fn index_of(&self, descriptor: &str) -> Option<usize> {
        self.index.get(descriptor).copied()
    }

    pub fn has_item(&self, descriptor: &str) -> bool {
        self.index.contains_key(descriptor)
    }

    /// Resolve a field `owner` depends on, failing with both names if absent.
    pub fn require(&self, descriptor: &str, owner: &str) -> Result<usize> {
        self.index_of(descriptor)
            .ok_or_else(|| Error::missing_field(owner, descriptor))
    }

    /// Resolve a field `owner` writes.  Inputs are refused.
    pub fn writable_slot(&self, descriptor: &str, owner: &str) -> Result<Slot> {
        let index = self.require(descriptor, owner)?;
        if self.items[index].direction == FieldDirection::Input {
            return Err(VectorError::InputNotWritable(descriptor.to_string()).into());
        }
        Ok(Slot(index))
    }

    pub fn descriptors(&self) -> impl Iterator<Item = &str> {
        self.items.iter().map(|i| i.descriptor.as_str())
    }
}
