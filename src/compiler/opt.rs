//! Machine-independent Optimization
//!
//! Three passes applied in fixed order over a deep copy of the instruction
//! sequence, each a single linear scan: constant folding, constant
//! propagation, dead-code elimination. The passes never reorder
//! instructions, never remove non-`ASSIGN` instructions, and never rewrite
//! jump targets.

pub mod dce;
pub mod fold;
pub mod propagate;

pub use dce::eliminate_dead_code;
pub use fold::fold_constants;
pub use propagate::propagate_constants;

use crate::compiler::ir::Instruction;

/// Optimizes a copy of the given instruction sequence, leaving the input
/// untouched.
#[must_use]
pub fn optimize(instructions: &[Instruction]) -> Vec<Instruction> {
    let mut optimized = instructions.to_vec();

    fold_constants(&mut optimized);
    propagate_constants(&mut optimized);
    eliminate_dead_code(&mut optimized);

    optimized
}

/// A numeric operand value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Value {
    Int(i64),
    Float(f64),
}

impl Value {
    pub(crate) fn as_f64(self) -> f64 {
        match self {
            Value::Int(v) => v as f64,
            Value::Float(v) => v,
        }
    }

    pub(crate) fn is_zero(self) -> bool {
        match self {
            Value::Int(v) => v == 0,
            Value::Float(v) => v == 0.0,
        }
    }
}

/// Parses an operand as a decimal numeric literal, or `None` for
/// identifiers, temporaries, labels, strings, and the `true`/`false`
/// spellings. Boolean-valued folded comparisons therefore never re-fold.
pub(crate) fn numeric(operand: &str) -> Option<Value> {
    let body = operand.strip_prefix('-').unwrap_or(operand);

    let mut digits = false;
    let mut dot = false;

    for c in body.chars() {
        match c {
            '0'..='9' => digits = true,
            '.' if !dot => dot = true,
            _ => return None,
        }
    }

    if !digits {
        return None;
    }

    if dot {
        operand.parse::<f64>().ok().map(Value::Float)
    } else {
        operand
            .parse::<i64>()
            .ok()
            .map(Value::Int)
            .or_else(|| operand.parse::<f64>().ok().map(Value::Float))
    }
}

/// Returns `true` for compiler-generated temporary names `t<N>`.
pub(crate) fn is_temporary(operand: &str) -> bool {
    let Some(digits) = operand.strip_prefix('t') else {
        return false;
    };

    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}
