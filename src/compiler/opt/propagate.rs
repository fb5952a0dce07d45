//! Constant Propagation
//!
//! Single forward scan maintaining a map from temporaries to constant
//! values. Tracked operands are substituted into `arg1`/`arg2`; an
//! instruction whose operands become fully constant after substitution folds
//! to an `ASSIGN` within the same scan. The pass intentionally does not
//! iterate to fixed point.

use std::collections::HashMap;

use crate::compiler::ir::{Instruction, Op};
use crate::compiler::opt::{fold, is_temporary, numeric};

/// Propagates constants through the instruction sequence in place.
pub fn propagate_constants(instructions: &mut [Instruction]) {
    let mut constants: HashMap<String, String> = HashMap::new();

    for inst in instructions.iter_mut() {
        if let Some(arg1) = &inst.arg1 {
            if let Some(value) = constants.get(arg1) {
                inst.arg1 = Some(value.clone());
            }
        }
        if let Some(arg2) = &inst.arg2 {
            if let Some(value) = constants.get(arg2) {
                inst.arg2 = Some(value.clone());
            }
        }

        // Substitution may have made both operands constant; fold the
        // instruction within the same scan.
        fold::try_fold(inst);

        let Some(result) = &inst.result else {
            continue;
        };

        // Any write invalidates the entry, even if the write itself is
        // constant. The short-circuit lowering writes its temporary on both
        // paths, so only the pre-join value may be treated as known.
        if constants.remove(result).is_some() {
            continue;
        }

        if inst.op == Op::Assign && is_temporary(result) {
            if let Some(arg1) = &inst.arg1 {
                if numeric(arg1).is_some() {
                    constants.insert(result.clone(), arg1.clone());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assign(result: &str, value: &str) -> Instruction {
        Instruction::new(Op::Assign, Some(result.into()), Some(value.into()), None)
    }

    fn binary(op: Op, result: &str, arg1: &str, arg2: &str) -> Instruction {
        Instruction::new(
            op,
            Some(result.into()),
            Some(arg1.into()),
            Some(arg2.into()),
        )
    }

    #[test]
    fn propagate_valid_substitutes_and_folds() {
        let mut seq = vec![
            assign("t0", "12"),
            binary(Op::Add, "t1", "2", "t0"),
            assign("a", "t1"),
        ];
        propagate_constants(&mut seq);

        assert_eq!(seq[1], assign("t1", "14"));
        assert_eq!(seq[2], assign("a", "14"));
    }

    #[test]
    fn propagate_valid_named_variables_are_not_tracked() {
        let mut seq = vec![
            assign("a", "14"),
            Instruction::new(Op::Ret, None, Some("a".into()), None),
        ];
        propagate_constants(&mut seq);

        // `a` is not a temporary, so the return operand stays symbolic.
        assert_eq!(seq[1].arg1.as_deref(), Some("a"));
    }

    #[test]
    fn propagate_valid_rewrite_invalidates_tracking() {
        // The shape produced by short-circuit lowering: the temporary is
        // written on both paths and read after the join.
        let mut seq = vec![
            assign("t0", "1"),
            Instruction::new(Op::JumpTrue, None, Some("t0".into()), Some("L0".into())),
            assign("t0", "2"),
            Instruction::new(Op::Label, Some("L0".into()), None, None),
            assign("b", "t0"),
        ];
        propagate_constants(&mut seq);

        // The second write invalidates the entry even though it is constant,
        // so the post-join read is not substituted.
        assert_eq!(seq[4], assign("b", "t0"));
    }

    #[test]
    fn propagate_valid_non_assign_write_invalidates() {
        let mut seq = vec![
            assign("t0", "3"),
            Instruction::new(
                Op::Call,
                Some("t0".into()),
                Some("f".into()),
                Some("0".into()),
            ),
            assign("b", "t0"),
        ];
        propagate_constants(&mut seq);

        assert_eq!(seq[2], assign("b", "t0"));
    }

    #[test]
    fn propagate_valid_single_pass_no_fixed_point() {
        // `t1` becomes constant only through `t0`; a later use of `t1`
        // before its definition in scan order would not see it. The scan is
        // strictly forward.
        let mut seq = vec![
            binary(Op::Add, "t2", "1", "t1"),
            assign("t0", "5"),
            assign("t1", "t0"),
        ];
        propagate_constants(&mut seq);

        // The first instruction saw nothing; the last collapsed.
        assert_eq!(seq[0], binary(Op::Add, "t2", "1", "t1"));
        assert_eq!(seq[2], assign("t1", "5"));
    }

    #[test]
    fn propagate_valid_jump_targets_untouched() {
        let mut seq = vec![
            assign("t0", "7"),
            Instruction::new(Op::JumpFalse, None, Some("t0".into()), Some("L0".into())),
            Instruction::new(Op::Jump, None, Some("L1".into()), None),
        ];
        propagate_constants(&mut seq);

        // The condition substitutes; the label operands never do.
        assert_eq!(seq[1].arg1.as_deref(), Some("7"));
        assert_eq!(seq[1].arg2.as_deref(), Some("L0"));
        assert_eq!(seq[2].arg1.as_deref(), Some("L1"));
    }
}
