//! Code Generation
//!
//! Compiler pass that emits textual x86 assembly from the (optimized)
//! instruction sequence in one linear walk. Registers `r1`..`r6` are handed
//! out lazily per operand; operands with no register fall back to `.data`
//! cells. The output is illustrative text, not a linkable artifact.

use std::fmt::Write;

use indexmap::{IndexMap, IndexSet};

use crate::compiler::ir::{Instruction, Op};
use crate::compiler::opt::numeric;

/// Emits the assembly text for the given instruction sequence.
#[must_use]
pub fn emit(instructions: &[Instruction]) -> String {
    let mut gen = CodeGen {
        registers: IndexMap::new(),
        reg_count: 0,
        variables: IndexSet::new(),
        text: String::new(),
    };

    for inst in instructions {
        gen.emit_instruction(inst);
    }

    gen.finish()
}

/// Emission state: the register map, the discovered `.data` variables, and
/// the text accumulated so far.
struct CodeGen {
    /// Lazily assigned operand registers.
    registers: IndexMap<String, String>,
    // Number of registers handed out; the ring is r((n mod 6) + 1).
    reg_count: usize,
    /// Operands that fell back to memory; each becomes a `.data` cell.
    variables: IndexSet<String>,
    text: String,
}

impl CodeGen {
    fn emit_instruction(&mut self, inst: &Instruction) {
        match inst.op {
            Op::Label => {
                let label = inst.result.as_deref().unwrap_or_default();
                self.line_at_margin(&format!("{label}:"));
            }
            Op::Enter => {
                self.line("push ebp");
                self.line("mov ebp, esp");
            }
            Op::Leave => {
                self.line("mov esp, ebp");
                self.line("pop ebp");
            }
            Op::Ret => {
                if let Some(value) = &inst.arg1 {
                    let operand = self.operand(value);
                    self.line(&format!("mov eax, {operand}"));

                    // The value has been consumed into eax; its register goes
                    // back to the ring.
                    self.registers.swap_remove(value);
                }
                self.line("ret");
            }
            Op::Assign => {
                let src = self.operand_opt(&inst.arg1);
                let dst = self.reg(inst.result.as_deref().unwrap_or_default());
                self.line(&format!("mov {dst}, {src}"));
            }
            Op::Add | Op::Sub => {
                let mnemonic = if inst.op == Op::Add { "add" } else { "sub" };
                let lhs = self.operand_opt(&inst.arg1);
                let rhs = self.operand_opt(&inst.arg2);
                let dst = self.reg(inst.result.as_deref().unwrap_or_default());

                self.line(&format!("mov {dst}, {lhs}"));
                self.line(&format!("{mnemonic} {dst}, {rhs}"));
            }
            Op::Mul => {
                let lhs = self.operand_opt(&inst.arg1);
                let rhs = self.operand_opt(&inst.arg2);
                let dst = self.reg(inst.result.as_deref().unwrap_or_default());

                self.line(&format!("mov eax, {lhs}"));
                self.line(&format!("imul eax, {rhs}"));
                self.line(&format!("mov {dst}, eax"));
            }
            Op::Div | Op::Mod => {
                let lhs = self.operand_opt(&inst.arg1);
                let rhs = self.operand_opt(&inst.arg2);
                let dst = self.reg(inst.result.as_deref().unwrap_or_default());

                self.line(&format!("mov eax, {lhs}"));
                self.line("cdq");
                self.line(&format!("mov ecx, {rhs}"));
                self.line("idiv ecx");

                // Quotient lands in eax, remainder in edx.
                let src = if inst.op == Op::Div { "eax" } else { "edx" };
                self.line(&format!("mov {dst}, {src}"));
            }
            Op::Neg => {
                let src = self.operand_opt(&inst.arg1);
                let dst = self.reg(inst.result.as_deref().unwrap_or_default());

                self.line(&format!("mov {dst}, {src}"));
                self.line(&format!("neg {dst}"));
            }
            Op::Not => {
                let src = self.operand_opt(&inst.arg1);
                let dst = self.reg(inst.result.as_deref().unwrap_or_default());

                self.line(&format!("mov {dst}, {src}"));
                self.line(&format!("cmp {dst}, 0"));
                self.line("sete al");
                self.line(&format!("movzx {dst}, al"));
            }
            Op::Eq | Op::Ne | Op::Lt | Op::Gt | Op::Le | Op::Ge => {
                let cc = match inst.op {
                    Op::Eq => "e",
                    Op::Ne => "ne",
                    Op::Lt => "l",
                    Op::Gt => "g",
                    Op::Le => "le",
                    _ => "ge",
                };

                let lhs = self.operand_opt(&inst.arg1);
                let rhs = self.operand_opt(&inst.arg2);
                let dst = self.reg(inst.result.as_deref().unwrap_or_default());

                self.line(&format!("cmp {lhs}, {rhs}"));
                self.line(&format!("set{cc} al"));
                self.line(&format!("movzx {dst}, al"));
            }
            Op::Jump => {
                let target = inst.arg1.as_deref().unwrap_or_default();
                self.line(&format!("jmp {target}"));
            }
            Op::JumpTrue | Op::JumpFalse => {
                let cond = self.operand_opt(&inst.arg1);
                let target = inst.arg2.as_deref().unwrap_or_default();
                let jump = if inst.op == Op::JumpTrue { "jne" } else { "je" };

                self.line(&format!("cmp {cond}, 0"));
                self.line(&format!("{jump} {target}"));
            }
            Op::Param => {
                let value = self.operand_opt(&inst.arg1);
                self.line(&format!("push {value}"));
            }
            Op::Call => {
                let callee = inst.arg1.as_deref().unwrap_or_default().to_string();
                let argc: usize = inst
                    .arg2
                    .as_deref()
                    .and_then(|argc| argc.parse().ok())
                    .unwrap_or(0);
                let dst = self.reg(inst.result.as_deref().unwrap_or_default());

                self.line(&format!("call {callee}"));
                self.line(&format!("add esp, {}", argc * 4));
                self.line(&format!("mov {dst}, eax"));
            }
            Op::Print => {
                let value = self.operand_opt(&inst.arg1);
                self.line(&format!("push {value}"));
                self.line("call printf");
                self.line("add esp, 4");
            }
            Op::Nop => self.line("nop"),
        }
    }

    /// Register assigned to the operand, handing out the next one in the
    /// ring on first sight.
    fn reg(&mut self, operand: &str) -> String {
        if let Some(reg) = self.registers.get(operand) {
            return reg.clone();
        }

        let reg = format!("r{}", (self.reg_count % 6) + 1);
        self.reg_count += 1;
        self.registers.insert(operand.to_string(), reg.clone());

        reg
    }

    /// Text for a source operand: numeric literals and string literals pass
    /// through, register-held operands resolve to their register, and
    /// anything else becomes a `.data` cell reference.
    fn operand(&mut self, operand: &str) -> String {
        if numeric(operand).is_some() || operand.starts_with('"') {
            return operand.to_string();
        }

        if let Some(reg) = self.registers.get(operand) {
            return reg.clone();
        }

        self.variables.insert(operand.to_string());
        format!("[{operand}]")
    }

    fn operand_opt(&mut self, operand: &Option<String>) -> String {
        match operand {
            Some(operand) => self.operand(operand),
            None => String::new(),
        }
    }

    fn line(&mut self, text: &str) {
        let _ = writeln!(self.text, "    {text}");
    }

    fn line_at_margin(&mut self, text: &str) {
        let _ = writeln!(self.text, "{text}");
    }

    /// Assembles the final output: the `.data` section built from the
    /// discovered variables, the `.text` section, and the canned entry
    /// trampoline.
    fn finish(self) -> String {
        let mut out = String::new();

        out.push_str("section .data\n");
        out.push_str("    fmt db \"%d\", 10, 0\n");
        for name in &self.variables {
            let _ = writeln!(out, "    {name} dd 0");
        }

        out.push_str("\nsection .text\n");
        out.push_str("    global _start\n\n");
        out.push_str(&self.text);

        out.push_str("\n_start:\n");
        out.push_str("    call main\n");
        out.push_str("    mov ebx, eax\n");
        out.push_str("    mov eax, 1\n");
        out.push_str("    int 0x80\n");
        out.push_str("\nprintf:\n");
        out.push_str("    ret\n");

        out
    }
}
