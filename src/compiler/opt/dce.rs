//! Dead-code Elimination
//!
//! Replaces `ASSIGN` instructions whose result is never read with `NOP`,
//! then strips all `NOP`s from the stream. Only `ASSIGN`s are candidates;
//! instructions with side effects are never removed.

use std::collections::HashSet;

use crate::compiler::ir::{Instruction, Op};
use crate::compiler::opt::numeric;

/// Eliminates dead assignments from the instruction sequence.
pub fn eliminate_dead_code(instructions: &mut Vec<Instruction>) {
    // Operand names read anywhere, excluding numeric literals and operands
    // in jump-target position.
    let mut used: HashSet<&str> = HashSet::new();

    for inst in instructions.iter() {
        let target_slot = match inst.op {
            Op::Jump => 1,
            Op::JumpTrue | Op::JumpFalse => 2,
            _ => 0,
        };

        if let Some(arg1) = &inst.arg1 {
            if target_slot != 1 && numeric(arg1).is_none() {
                used.insert(arg1);
            }
        }
        if let Some(arg2) = &inst.arg2 {
            if target_slot != 2 && numeric(arg2).is_none() {
                used.insert(arg2);
            }
        }
    }

    let dead: Vec<usize> = instructions
        .iter()
        .enumerate()
        .filter(|(_, inst)| {
            inst.op == Op::Assign
                && inst
                    .result
                    .as_deref()
                    .is_some_and(|result| !used.contains(result))
        })
        .map(|(i, _)| i)
        .collect();

    for i in &dead {
        instructions[*i] = Instruction::bare(Op::Nop);
    }

    instructions.retain(|inst| inst.op != Op::Nop);
}
