//! Intermediate Representation
//!
//! Compiler pass that lowers the syntax tree into a flat sequence of
//! three-address code instructions. Operands are strings: numeric literals,
//! identifiers, temporaries `t<N>`, and labels `L<N>`; both counters reset at
//! the start of each compilation.

use std::fmt;

use serde::Serialize;

use crate::compiler::parser::ast::{
    BinaryOperator, Declaration, Expression, Function, Program, Statement, UnaryOperator, VarDecl,
};

/// Three-address code operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Op {
    Label,
    Enter,
    Leave,
    Ret,
    Assign,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Neg,
    Not,
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    Jump,
    JumpTrue,
    JumpFalse,
    Param,
    Call,
    Print,
    Nop,
}

impl Op {
    /// Uppercase mnemonic of the operation.
    #[must_use]
    pub fn mnemonic(&self) -> &'static str {
        match self {
            Op::Label => "LABEL",
            Op::Enter => "ENTER",
            Op::Leave => "LEAVE",
            Op::Ret => "RET",
            Op::Assign => "ASSIGN",
            Op::Add => "ADD",
            Op::Sub => "SUB",
            Op::Mul => "MUL",
            Op::Div => "DIV",
            Op::Mod => "MOD",
            Op::Neg => "NEG",
            Op::Not => "NOT",
            Op::Eq => "EQ",
            Op::Ne => "NE",
            Op::Lt => "LT",
            Op::Gt => "GT",
            Op::Le => "LE",
            Op::Ge => "GE",
            Op::Jump => "JUMP",
            Op::JumpTrue => "JUMPTRUE",
            Op::JumpFalse => "JUMPFALSE",
            Op::Param => "PARAM",
            Op::Call => "CALL",
            Op::Print => "PRINT",
            Op::Nop => "NOP",
        }
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.mnemonic())
    }
}

/// A single three-address instruction. Field meaning depends on `op`: labels
/// live in `result` of `LABEL`, jump targets in `arg1` of `JUMP` and `arg2`
/// of the conditional jumps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Instruction {
    pub op: Op,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arg1: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arg2: Option<String>,
}

impl Instruction {
    /// Returns a new instruction with the given fields.
    #[must_use]
    pub fn new(
        op: Op,
        result: Option<String>,
        arg1: Option<String>,
        arg2: Option<String>,
    ) -> Self {
        Instruction {
            op,
            result,
            arg1,
            arg2,
        }
    }

    /// Returns an operand-less instruction.
    #[must_use]
    pub fn bare(op: Op) -> Self {
        Instruction::new(op, None, None, None)
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let operands: Vec<&str> = [&self.result, &self.arg1, &self.arg2]
            .into_iter()
            .flatten()
            .map(String::as_str)
            .collect();

        if operands.is_empty() {
            write!(f, "{}", self.op.mnemonic())
        } else {
            write!(f, "{:<10}{}", self.op.mnemonic(), operands.join(", "))
        }
    }
}

/// Renders an instruction sequence one mnemonic per line.
#[must_use]
pub fn to_text(instructions: &[Instruction]) -> String {
    let mut out = String::new();
    for inst in instructions {
        out.push_str(&inst.to_string());
        out.push('\n');
    }
    out
}

/// Lowers the given program into a flat three-address instruction sequence.
#[must_use]
pub fn generate(program: &Program) -> Vec<Instruction> {
    let mut builder = TacBuilder {
        instructions: vec![],
        tmp_count: 0,
        label_count: 0,
    };

    for decl in &program.decls {
        match decl {
            Declaration::Func(func) => builder.lower_function(func),
            Declaration::Var(var) => builder.lower_var_decl(var),
        }
    }

    builder.instructions
}

/// Helper for lowering nested expressions into three-address instructions.
struct TacBuilder {
    instructions: Vec<Instruction>,
    tmp_count: usize,
    label_count: usize,
}

impl TacBuilder {
    /// Allocates and returns a fresh temporary name.
    fn new_tmp(&mut self) -> String {
        let tmp = format!("t{}", self.tmp_count);
        self.tmp_count += 1;
        tmp
    }

    /// Allocates and returns a fresh label name.
    fn new_label(&mut self) -> String {
        let label = format!("L{}", self.label_count);
        self.label_count += 1;
        label
    }

    fn emit(&mut self, op: Op, result: Option<String>, arg1: Option<String>, arg2: Option<String>) {
        self.instructions.push(Instruction::new(op, result, arg1, arg2));
    }

    fn lower_function(&mut self, func: &Function) {
        self.emit(Op::Label, Some(func.name.clone()), None, None);
        self.emit(Op::Enter, None, None, None);

        for stmt in &func.body {
            self.lower_statement(stmt);
        }

        // Frame teardown; no implicit return value is synthesized.
        self.emit(Op::Leave, None, None, None);
        self.emit(Op::Ret, None, None, None);
    }

    fn lower_var_decl(&mut self, var: &VarDecl) {
        if let Some(init) = &var.init {
            let value = self.lower_expression(init);
            self.emit(Op::Assign, Some(var.name.clone()), Some(value), None);
        }
    }

    fn lower_statement(&mut self, stmt: &Statement) {
        match stmt {
            Statement::Block(stmts) => {
                for stmt in stmts {
                    self.lower_statement(stmt);
                }
            }
            Statement::VarDecl(var) => self.lower_var_decl(var),
            Statement::If {
                cond,
                then,
                opt_else,
            } => {
                let cond = self.lower_expression(cond);
                let l_else = self.new_label();
                let l_end = self.new_label();

                self.emit(Op::JumpFalse, None, Some(cond), Some(l_else.clone()));
                self.lower_statement(then);
                self.emit(Op::Jump, None, Some(l_end.clone()), None);
                self.emit(Op::Label, Some(l_else), None, None);

                if let Some(else_stmt) = opt_else {
                    self.lower_statement(else_stmt);
                }

                self.emit(Op::Label, Some(l_end), None, None);
            }
            Statement::While { cond, body } => {
                let l_start = self.new_label();
                let l_end = self.new_label();

                self.emit(Op::Label, Some(l_start.clone()), None, None);

                let cond = self.lower_expression(cond);
                self.emit(Op::JumpFalse, None, Some(cond), Some(l_end.clone()));

                self.lower_statement(body);

                self.emit(Op::Jump, None, Some(l_start), None);
                self.emit(Op::Label, Some(l_end), None, None);
            }
            Statement::For {
                init,
                cond,
                step,
                body,
            } => {
                self.lower_statement(init);

                let l_start = self.new_label();
                let l_end = self.new_label();

                self.emit(Op::Label, Some(l_start.clone()), None, None);

                if let Some(cond) = cond {
                    let cond = self.lower_expression(cond);
                    self.emit(Op::JumpFalse, None, Some(cond), Some(l_end.clone()));
                }

                self.lower_statement(body);

                // The step clause runs after the body, before the back edge.
                if let Some(step) = step {
                    let _ = self.lower_expression(step);
                }

                self.emit(Op::Jump, None, Some(l_start), None);
                self.emit(Op::Label, Some(l_end), None, None);
            }
            Statement::Return { value, .. } => {
                let value = value.as_ref().map(|expr| self.lower_expression(expr));
                self.emit(Op::Ret, None, value, None);
            }
            Statement::Print { value, .. } => {
                let value = self.lower_expression(value);
                self.emit(Op::Print, None, Some(value), None);
            }
            Statement::Expression(expr) => {
                let _ = self.lower_expression(expr);
            }
            Statement::Empty => {}
        }
    }

    /// Lowers an expression, returning the operand holding its value.
    fn lower_expression(&mut self, expr: &Expression) -> String {
        match expr {
            // Literals propagate their spelling as the operand.
            Expression::Number { lexeme, .. } | Expression::Str { lexeme, .. } => lexeme.clone(),
            Expression::Bool { value, .. } => value.to_string(),
            Expression::Ident { name, .. } => name.clone(),
            Expression::Unary { op, operand, .. } => {
                let src = self.lower_expression(operand);
                let dst = self.new_tmp();

                let op = match op {
                    UnaryOperator::Negate => Op::Neg,
                    UnaryOperator::Not => Op::Not,
                };

                self.emit(op, Some(dst.clone()), Some(src), None);
                dst
            }
            Expression::Binary { op, lhs, rhs, .. } => match op {
                BinaryOperator::LogAnd | BinaryOperator::LogOr => {
                    self.lower_short_circuit(*op, lhs, rhs)
                }
                _ => {
                    let lhs = self.lower_expression(lhs);
                    let rhs = self.lower_expression(rhs);
                    let dst = self.new_tmp();

                    self.emit(binop_to_op(*op), Some(dst.clone()), Some(lhs), Some(rhs));
                    dst
                }
            },
            Expression::Assign { target, value, .. } => {
                let dst = match &**target {
                    Expression::Ident { name, .. } => name.clone(),
                    other => self.lower_expression(other),
                };

                let value = self.lower_expression(value);
                self.emit(Op::Assign, Some(dst.clone()), Some(value), None);
                dst
            }
            Expression::Call { callee, args, .. } => {
                let name = match &**callee {
                    Expression::Ident { name, .. } => name.clone(),
                    other => self.lower_expression(other),
                };

                // Arguments are fully evaluated left-to-right before any
                // PARAM is emitted, so nested calls cannot interleave.
                let operands: Vec<String> = args
                    .iter()
                    .map(|arg| self.lower_expression(arg))
                    .collect();

                for operand in &operands {
                    self.emit(Op::Param, None, Some(operand.clone()), None);
                }

                let dst = self.new_tmp();
                self.emit(
                    Op::Call,
                    Some(dst.clone()),
                    Some(name),
                    Some(args.len().to_string()),
                );
                dst
            }
            Expression::Grouping(inner) => self.lower_expression(inner),
        }
    }

    /// Lowers `&&`/`||` with short-circuit control flow. The right operand is
    /// evaluated only when the left operand does not already determine the
    /// result.
    fn lower_short_circuit(
        &mut self,
        op: BinaryOperator,
        lhs: &Expression,
        rhs: &Expression,
    ) -> String {
        let lhs = self.lower_expression(lhs);
        let dst = self.new_tmp();
        let l_end = self.new_label();

        let jump = if op == BinaryOperator::LogOr {
            Op::JumpTrue
        } else {
            Op::JumpFalse
        };

        self.emit(Op::Assign, Some(dst.clone()), Some(lhs), None);
        self.emit(jump, None, Some(dst.clone()), Some(l_end.clone()));

        let rhs = self.lower_expression(rhs);
        self.emit(Op::Assign, Some(dst.clone()), Some(rhs), None);
        self.emit(Op::Label, Some(l_end), None, None);

        dst
    }
}

fn binop_to_op(op: BinaryOperator) -> Op {
    match op {
        BinaryOperator::Add => Op::Add,
        BinaryOperator::Subtract => Op::Sub,
        BinaryOperator::Multiply => Op::Mul,
        BinaryOperator::Divide => Op::Div,
        BinaryOperator::Modulo => Op::Mod,
        BinaryOperator::Eq => Op::Eq,
        BinaryOperator::NotEq => Op::Ne,
        BinaryOperator::OrdLess => Op::Lt,
        BinaryOperator::OrdLessEq => Op::Le,
        BinaryOperator::OrdGreater => Op::Gt,
        BinaryOperator::OrdGreaterEq => Op::Ge,
        BinaryOperator::LogAnd | BinaryOperator::LogOr => {
            unreachable!("logical operators lower through short-circuit control flow")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::{lexer, parser};

    fn generate_source(source: &str) -> Vec<Instruction> {
        let (tokens, lex_errors) = lexer::lex(source);
        assert!(lex_errors.is_empty(), "unexpected lexical errors");
        let (program, parse_errors) = parser::parse(&tokens);
        assert!(parse_errors.is_empty(), "unexpected syntax errors");
        generate(&program)
    }

    fn mnemonics(instructions: &[Instruction]) -> Vec<&'static str> {
        instructions.iter().map(|i| i.op.mnemonic()).collect()
    }

    #[test]
    fn ir_valid_minimal_program_frame() {
        let ir = generate_source("int main() { return 0; }");

        assert_eq!(
            mnemonics(&ir),
            ["LABEL", "ENTER", "RET", "LEAVE", "RET"]
        );
        assert_eq!(ir[0].result.as_deref(), Some("main"));
        assert_eq!(ir[2].arg1.as_deref(), Some("0"));
        assert_eq!(ir[4].arg1, None);
    }

    #[test]
    fn ir_valid_expression_temporaries() {
        let ir = generate_source("int main() { int a = 2 + 3 * 4; return a; }");

        let texts: Vec<String> = ir.iter().map(ToString::to_string).collect();
        assert!(texts.iter().any(|t| t.starts_with("MUL") && t.contains("t0, 3, 4")));
        assert!(texts.iter().any(|t| t.starts_with("ADD") && t.contains("t1, 2, t0")));
        assert!(texts.iter().any(|t| t.starts_with("ASSIGN") && t.contains("a, t1")));
    }

    #[test]
    fn ir_valid_while_loop_shape() {
        let ir = generate_source(
            "int main() { int i = 0; while (i < 3) { i = i + 1; } return i; }",
        );

        let labels: Vec<&str> = ir
            .iter()
            .filter(|i| i.op == Op::Label)
            .filter_map(|i| i.result.as_deref())
            .collect();
        assert_eq!(labels, ["main", "L0", "L1"]);

        // One conditional exit, one back edge.
        let jump_false: Vec<&Instruction> =
            ir.iter().filter(|i| i.op == Op::JumpFalse).collect();
        assert_eq!(jump_false.len(), 1);
        assert_eq!(jump_false[0].arg2.as_deref(), Some("L1"));

        let back_edges: Vec<&Instruction> = ir.iter().filter(|i| i.op == Op::Jump).collect();
        assert_eq!(back_edges.len(), 1);
        assert_eq!(back_edges[0].arg1.as_deref(), Some("L0"));
    }

    #[test]
    fn ir_valid_if_else_labels() {
        let ir = generate_source("int main() { if (true) { return 1; } else { return 2; } }");

        let texts: Vec<String> = ir.iter().map(ToString::to_string).collect();
        assert!(texts.iter().any(|t| t.starts_with("JUMPFALSE") && t.contains("true, L0")));
        assert!(texts.iter().any(|t| t.starts_with("JUMP") && t.contains("L1")));
    }

    #[test]
    fn ir_valid_short_circuit_or() {
        let ir = generate_source("int main() { bool b = true || false; return 0; }");

        let texts: Vec<String> = ir.iter().map(ToString::to_string).collect();
        let expected = [
            "ASSIGN    t0, true",
            "JUMPTRUE  t0, L0",
            "ASSIGN    t0, false",
            "LABEL     L0",
            "ASSIGN    b, t0",
        ];

        for (inst, expected) in texts[2..].iter().zip(expected) {
            assert_eq!(inst, expected);
        }
    }

    #[test]
    fn ir_valid_short_circuit_and_uses_jumpfalse() {
        let ir = generate_source("int main() { bool b = false && true; return 0; }");

        assert!(ir.iter().any(|i| i.op == Op::JumpFalse));
        assert!(!ir.iter().any(|i| i.op == Op::JumpTrue));
    }

    #[test]
    fn ir_valid_call_params_in_order() {
        let ir = generate_source(
            "int f(int a, int b) { return a; }\nint main() { return f(1, 2); }",
        );

        let texts: Vec<String> = ir.iter().map(ToString::to_string).collect();
        let param_call: Vec<&String> = texts
            .iter()
            .filter(|t| t.starts_with("PARAM") || t.starts_with("CALL"))
            .collect();

        assert_eq!(param_call[0], "PARAM     1");
        assert_eq!(param_call[1], "PARAM     2");
        assert_eq!(param_call[2], "CALL      t0, f, 2");
    }

    #[test]
    fn ir_valid_for_step_after_body() {
        let ir = generate_source(
            "int main() { for (int i = 0; i < 2; i = i + 1) { print(i); } return 0; }",
        );

        let texts: Vec<String> = ir.iter().map(ToString::to_string).collect();
        let print_at = texts.iter().position(|t| t.starts_with("PRINT")).unwrap();
        let step_at = texts
            .iter()
            .position(|t| t.starts_with("ASSIGN") && t.contains("i, t1"))
            .unwrap();
        let back_edge_at = texts
            .iter()
            .position(|t| t.starts_with("JUMP ") || *t == "JUMP      L0")
            .unwrap();

        assert!(print_at < step_at);
        assert!(step_at < back_edge_at);
    }

    #[test]
    fn ir_valid_undefined_symbol_still_lowers() {
        let ir = generate_source("int main() { return x; }");

        assert!(ir.iter().any(|i| i.op == Op::Ret && i.arg1.as_deref() == Some("x")));
    }

    #[test]
    fn ir_valid_counters_reset_per_compilation() {
        let first = generate_source("int main() { int a = 1 + 2; return a; }");
        let second = generate_source("int main() { int a = 1 + 2; return a; }");

        assert_eq!(first, second);
        assert!(first.iter().any(|i| i.result.as_deref() == Some("t0")));
    }

    #[test]
    fn ir_valid_jump_targets_match_labels() {
        let ir = generate_source(
            "int main() { int i = 0; while (i < 3) { if (i == 1) { i = 2; } i = i + 1; } return i; }",
        );

        let labels: Vec<&str> = ir
            .iter()
            .filter(|i| i.op == Op::Label)
            .filter_map(|i| i.result.as_deref())
            .collect();

        for inst in &ir {
            let target = match inst.op {
                Op::Jump => inst.arg1.as_deref(),
                Op::JumpTrue | Op::JumpFalse => inst.arg2.as_deref(),
                _ => None,
            };

            if let Some(target) = target {
                assert_eq!(
                    labels.iter().filter(|l| **l == target).count(),
                    1,
                    "jump target {target} must match exactly one label"
                );
            }
        }
    }
}
