//! Derived-field expansion.
//!
//! Expansions add fields to the vector description at build time and fill
//! them once per cycle:
//!
//! - [`math::MathExpansion`]: one `State` field per `Math` row.
//! - [`filter::FilterExpansion`]: legacy windowed filters over the raw
//!   sample stream, and `Sustained` decision filters over the vector.

pub mod expression;
pub mod filter;
pub mod math;

pub use expression::Expression;
pub use filter::{FilterConfig, FilterExpansion, FilterKind};
pub use math::{MathConfig, MathExpansion};

use crate::error::{ExpressionError, Result};
use crate::vector::{DataVector, VectorDescription};

/// An expression whose sources are resolved to vector slots.
#[derive(Debug, Clone)]
pub(crate) struct BoundExpression {
    expression: Expression,
    operands: Vec<usize>,
}

impl BoundExpression {
    /// Resolve every source of `expression` against `description`.
    pub(crate) fn bind(
        expression: Expression,
        description: &VectorDescription,
        owner: &str,
    ) -> Result<Self> {
        let operands = expression
            .sources()
            .iter()
            .map(|source| {
                description
                    .index_of(source)
                    .ok_or_else(|| ExpressionError::MissingSource {
                        name: owner.to_string(),
                        source_name: source.clone(),
                    })
            })
            .collect::<core::result::Result<Vec<_>, _>>()?;
        Ok(Self {
            expression,
            operands,
        })
    }

    pub(crate) fn arity(&self) -> usize {
        self.operands.len()
    }

    /// Load operands from `vector` into `scratch` and evaluate.
    pub(crate) fn evaluate(&self, vector: &DataVector, scratch: &mut Vec<f64>) -> f64 {
        scratch.clear();
        scratch.extend(self.operands.iter().map(|&i| vector[i]));
        self.expression.evaluate(scratch)
    }
}
