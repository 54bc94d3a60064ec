use log::debug;

use super::{BoundExpression, Expression};
use crate::error::Result;
use crate::vector::{DataVector, FieldDirection, Slot, VectorDescription, VectorDescriptionItem};

/// One `Math;Name;expression` row.
#[derive(Debug, Clone, PartialEq)]
pub struct MathConfig {
    pub name: String,
    pub expression: Expression,
}

impl MathConfig {
    pub fn new(name: impl Into<String>, expression: &str) -> Result<Self> {
        Ok(Self {
            name: name.into(),
            expression: Expression::parse(expression)?,
        })
    }
}

/// Computes one `State` field per math row, in declaration order.
///
/// Each expression reads the vector as it stands when its turn comes, so
/// later rows see earlier rows' results from the same cycle, and a row
/// that names itself sees its own previous value.
#[derive(Debug)]
pub struct MathExpansion {
    maths: Vec<MathConfig>,
    bound: Vec<(Slot, BoundExpression)>,
    scratch: Vec<f64>,
}

impl MathExpansion {
    pub fn new(maths: Vec<MathConfig>) -> Self {
        Self {
            maths,
            bound: Vec::new(),
            scratch: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.maths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.maths.is_empty()
    }

    pub fn description_items(&self) -> Vec<VectorDescriptionItem> {
        self.maths
            .iter()
            .map(|m| VectorDescriptionItem::new(m.name.clone(), FieldDirection::State))
            .collect()
    }

    /// Resolve every math field and source.  `description` must already
    /// contain [`description_items`](Self::description_items).
    pub fn initialize(&mut self, description: &VectorDescription) -> Result<()> {
        let mut bound = Vec::with_capacity(self.maths.len());
        for math in &self.maths {
            let slot = description.writable_slot(&math.name, &math.name)?;
            let expr = BoundExpression::bind(math.expression.clone(), description, &math.name)?;
            bound.push((slot, expr));
        }
        let widest = bound.iter().map(|(_, e)| e.arity()).max().unwrap_or(0);
        self.scratch = Vec::with_capacity(widest);
        self.bound = bound;
        debug!("math: {} expressions bound", self.bound.len());
        Ok(())
    }

    pub fn apply(&mut self, vector: &mut DataVector) {
        assert!(
            self.bound.len() == self.maths.len(),
            "MathExpansion::apply called before initialize"
        );
        for (slot, expr) in &self.bound {
            let value = expr.evaluate(vector, &mut self.scratch);
            vector.write(*slot, value);
        }
    }
}
