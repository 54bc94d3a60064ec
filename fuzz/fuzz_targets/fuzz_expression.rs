//! Fuzz target: `Expression::parse` + `evaluate`
//!
//! Arbitrary text must either fail to parse or produce an expression that
//! evaluates without panicking for any operand values.
//!
//! cargo fuzz run fuzz_expression

#![no_main]

use libfuzzer_sys::fuzz_target;
use vector_cycle::expansion::Expression;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(expr) = Expression::parse(text) else {
        return;
    };
    let operands: Vec<f64> = (0..expr.sources().len()).map(|i| i as f64 - 1.0).collect();
    let _ = expr.evaluate(&operands);
    let _ = expr.evaluate_bool(&operands);
});
