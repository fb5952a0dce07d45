//! Constant Folding
//!
//! Evaluates arithmetic and comparison instructions whose operands are both
//! numeric literals, rewriting each into an `ASSIGN` of the computed value.
//! Division or modulo by zero is left untouched.

use crate::compiler::ir::{Instruction, Op};
use crate::compiler::opt::{Value, numeric};

/// Folds every constant arithmetic and comparison instruction in place.
pub fn fold_constants(instructions: &mut [Instruction]) {
    for inst in instructions.iter_mut() {
        try_fold(inst);
    }
}

/// Attempts to fold a single instruction, returning `true` if it was
/// rewritten into an `ASSIGN`.
pub(crate) fn try_fold(inst: &mut Instruction) -> bool {
    let arithmetic = matches!(inst.op, Op::Add | Op::Sub | Op::Mul | Op::Div | Op::Mod);
    let comparison = matches!(inst.op, Op::Eq | Op::Ne | Op::Lt | Op::Gt | Op::Le | Op::Ge);

    if !arithmetic && !comparison {
        return false;
    }

    let (Some(arg1), Some(arg2)) = (&inst.arg1, &inst.arg2) else {
        return false;
    };
    let (Some(lhs), Some(rhs)) = (numeric(arg1), numeric(arg2)) else {
        return false;
    };

    if matches!(inst.op, Op::Div | Op::Mod) && rhs.is_zero() {
        return false;
    }

    let value = if arithmetic {
        eval_arithmetic(inst.op, lhs, rhs)
    } else {
        // Boolean results are stringified; they will not re-fold.
        eval_comparison(inst.op, lhs, rhs)
    };

    *inst = Instruction::new(Op::Assign, inst.result.clone(), Some(value), None);

    true
}

/// Evaluates an arithmetic operation; integer when both operands are
/// integers, floating point otherwise.
fn eval_arithmetic(op: Op, lhs: Value, rhs: Value) -> String {
    if let (Value::Int(x), Value::Int(y)) = (lhs, rhs) {
        let v = match op {
            Op::Add => x.wrapping_add(y),
            Op::Sub => x.wrapping_sub(y),
            Op::Mul => x.wrapping_mul(y),
            Op::Div => x.wrapping_div(y),
            Op::Mod => x.wrapping_rem(y),
            _ => unreachable!("non-arithmetic op in arithmetic evaluation"),
        };
        return v.to_string();
    }

    let (x, y) = (lhs.as_f64(), rhs.as_f64());
    let v = match op {
        Op::Add => x + y,
        Op::Sub => x - y,
        Op::Mul => x * y,
        Op::Div => x / y,
        Op::Mod => x % y,
        _ => unreachable!("non-arithmetic op in arithmetic evaluation"),
    };
    v.to_string()
}

/// Evaluates a comparison, stringifying the result as `"true"`/`"false"`.
fn eval_comparison(op: Op, lhs: Value, rhs: Value) -> String {
    let (x, y) = (lhs.as_f64(), rhs.as_f64());

    let v = match op {
        Op::Eq => x == y,
        Op::Ne => x != y,
        Op::Lt => x < y,
        Op::Gt => x > y,
        Op::Le => x <= y,
        Op::Ge => x >= y,
        _ => unreachable!("non-comparison op in comparison evaluation"),
    };
    v.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn binary(op: Op, result: &str, arg1: &str, arg2: &str) -> Instruction {
        Instruction::new(
            op,
            Some(result.into()),
            Some(arg1.into()),
            Some(arg2.into()),
        )
    }

    #[test]
    fn fold_valid_integer_arithmetic() {
        let mut seq = vec![
            binary(Op::Mul, "t0", "3", "4"),
            binary(Op::Add, "t1", "2", "t0"),
        ];
        fold_constants(&mut seq);

        assert_eq!(seq[0], binary_assign("t0", "12"));
        // Second instruction has a non-numeric operand and stays put.
        assert_eq!(seq[1].op, Op::Add);
    }

    #[test]
    fn fold_valid_mixed_operands_promote_to_float() {
        let mut inst = binary(Op::Add, "t0", "1", "0.5");
        try_fold(&mut inst);

        assert_eq!(inst, binary_assign("t0", "1.5"));
    }

    #[test]
    fn fold_valid_comparison_stringifies_boolean() {
        let mut inst = binary(Op::Lt, "t0", "1", "2");
        try_fold(&mut inst);

        assert_eq!(inst, binary_assign("t0", "true"));
    }

    #[test]
    fn fold_valid_boolean_operands_do_not_refold() {
        let mut inst = binary(Op::Eq, "t0", "true", "true");
        let folded = try_fold(&mut inst);

        assert!(!folded);
        assert_eq!(inst.op, Op::Eq);
    }

    #[test]
    fn fold_valid_division_by_zero_untouched() {
        let mut div = binary(Op::Div, "t0", "1", "0");
        let mut modulo = binary(Op::Mod, "t1", "1", "0");

        assert!(!try_fold(&mut div));
        assert!(!try_fold(&mut modulo));
        assert_eq!(div.op, Op::Div);
        assert_eq!(modulo.op, Op::Mod);
    }

    #[test]
    fn fold_valid_negative_results_chain() {
        let mut inst = binary(Op::Sub, "t0", "1", "2");
        try_fold(&mut inst);
        assert_eq!(inst, binary_assign("t0", "-1"));

        // The negative literal still parses as numeric downstream.
        let mut next = binary(Op::Mul, "t1", "-1", "3");
        try_fold(&mut next);
        assert_eq!(next, binary_assign("t1", "-3"));
    }

    fn binary_assign(result: &str, value: &str) -> Instruction {
        Instruction::new(Op::Assign, Some(result.into()), Some(value.into()), None)
    }
}
