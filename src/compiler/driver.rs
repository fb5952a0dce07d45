//! Compiler Driver
//!
//! Orchestrates the six-stage pipeline from source text to assembly text. A
//! failure in any stage does not short-circuit the pipeline: later stages
//! run on best-effort partial artifacts so that every category of
//! diagnostic is reported in one pass.

use crate::compiler::diag::Diagnostics;
use crate::compiler::ir::Instruction;
use crate::compiler::lexer::Token;
use crate::compiler::parser::ast::Program;
use crate::compiler::sema::symbols::SymbolTable;
use crate::compiler::{asm, ir, lexer, opt, parser, sema};

/// Every artifact of a pipeline run. All fields are always present; a stage
/// that had nothing to work with leaves an empty container behind.
#[derive(Debug, Clone, PartialEq)]
pub struct CompilationResult {
    /// Token sequence from the lexer.
    pub tokens: Vec<Token>,
    /// Syntax tree, possibly partial after error recovery.
    pub ast: Program,
    /// Scope forest built during semantic analysis.
    pub symbol_table: SymbolTable,
    /// Raw three-address code.
    pub ir: Vec<Instruction>,
    /// Three-address code after the optimization passes.
    pub optimized_ir: Vec<Instruction>,
    /// Textual x86 assembly.
    pub assembly: String,
    /// Diagnostics partitioned by stage.
    pub errors: Diagnostics,
}

/// Compiles the given source text through all six stages. Never fails; all
/// problems are reported through `errors`.
#[must_use]
pub fn compile(source: &str) -> CompilationResult {
    let (tokens, lexical) = lexer::lex(source);
    let (ast, syntax) = parser::parse(&tokens);
    let (symbol_table, semantic) = sema::analyze(&ast);

    let ir = ir::generate(&ast);
    let optimized_ir = opt::optimize(&ir);
    let assembly = asm::emit(&optimized_ir);

    CompilationResult {
        tokens,
        ast,
        symbol_table,
        ir,
        optimized_ir,
        assembly,
        errors: Diagnostics {
            lexical,
            syntax,
            semantic,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::ir::Op;
    use crate::compiler::parser::ast::Declaration;

    #[test]
    fn compile_minimal_program() {
        let result = compile("int main() { return 0; }");

        assert!(result.errors.is_empty());
        assert_eq!(result.tokens.len(), 9);

        assert_eq!(result.ast.decls.len(), 1);
        let Declaration::Func(func) = &result.ast.decls[0] else {
            panic!("expected a function declaration");
        };
        assert_eq!(func.name, "main");

        let mnemonics: Vec<&str> = result.ir.iter().map(|i| i.op.mnemonic()).collect();
        assert_eq!(mnemonics, ["LABEL", "ENTER", "RET", "LEAVE", "RET"]);
        assert_eq!(result.ir[2].arg1.as_deref(), Some("0"));

        // Nothing to optimize; the copy is identical.
        assert_eq!(result.optimized_ir, result.ir);
    }

    #[test]
    fn compile_is_deterministic() {
        let source = "int fib(int n) {\n  if (n <= 1) { return n; }\n  return fib(n - 1) + fib(n - 2);\n}\nint main() { print(fib(10)); return 0; }";

        let first = compile(source);
        let second = compile(source);

        assert_eq!(first, second);
    }

    #[test]
    fn compile_constant_folding_pipeline() {
        let result = compile("int main() { int a = 2 + 3 * 4; return a; }");

        assert!(result.errors.is_empty());

        let raw: Vec<String> = result.ir.iter().map(ToString::to_string).collect();
        assert!(raw.contains(&"MUL       t0, 3, 4".to_string()));
        assert!(raw.contains(&"ADD       t1, 2, t0".to_string()));
        assert!(raw.contains(&"ASSIGN    a, t1".to_string()));

        let optimized: Vec<String> =
            result.optimized_ir.iter().map(ToString::to_string).collect();
        assert!(optimized.contains(&"ASSIGN    a, 14".to_string()));
        assert!(!optimized.iter().any(|t| t.contains("t0")));
        assert!(!optimized.iter().any(|t| t.contains("t1")));
    }

    #[test]
    fn compile_undefined_symbol_still_produces_ir() {
        let result = compile("int main() { return x; }");

        assert!(result.errors.lexical.is_empty());
        assert!(result.errors.syntax.is_empty());
        assert_eq!(result.errors.semantic.len(), 1);
        assert_eq!(result.errors.semantic[0].message, "Undefined symbol 'x'");

        // The IR is still produced with `x` appearing literally.
        assert!(result
            .ir
            .iter()
            .any(|inst| inst.op == Op::Ret && inst.arg1.as_deref() == Some("x")));
        assert!(!result.assembly.is_empty());
    }

    #[test]
    fn compile_type_mismatch_diagnostic() {
        let result = compile("int main() { bool b = 1 + 1; return 0; }");

        assert!(result.errors.semantic.iter().any(|diag| {
            diag.message == "Cannot initialize variable of type 'bool' with value of type 'int'"
        }));
    }

    #[test]
    fn compile_missing_main_diagnostic() {
        let result = compile("int f() { return 0; }");

        assert_eq!(result.errors.semantic.len(), 1);
        assert_eq!(
            result.errors.semantic[0].message,
            "Program must have a main function"
        );
        assert_eq!(
            (result.errors.semantic[0].line, result.errors.semantic[0].column),
            (0, 0)
        );
    }

    #[test]
    fn compile_control_flow_loop() {
        let result =
            compile("int main() { int i = 0; while (i < 3) { i = i + 1; } return i; }");

        assert!(result.errors.is_empty());

        let starts = result
            .ir
            .iter()
            .filter(|i| i.op == Op::Label && i.result.as_deref() == Some("L0"))
            .count();
        let exits = result
            .ir
            .iter()
            .filter(|i| i.op == Op::JumpFalse && i.arg2.as_deref() == Some("L1"))
            .count();
        let back_edges = result
            .ir
            .iter()
            .filter(|i| i.op == Op::Jump && i.arg1.as_deref() == Some("L0"))
            .count();
        assert_eq!((starts, exits, back_edges), (1, 1, 1));

        // `i` is used, so it remains an assignment target after optimization.
        assert!(result
            .optimized_ir
            .iter()
            .any(|i| i.op == Op::Assign && i.result.as_deref() == Some("i")));
    }

    #[test]
    fn compile_lexical_error_does_not_stop_pipeline() {
        let result = compile("int main() { int a = 1 @ 2; return a; }");

        assert!(!result.errors.lexical.is_empty());
        // The remaining tokens still parse into something usable.
        assert!(!result.ir.is_empty());
        assert!(!result.assembly.is_empty());
    }

    #[test]
    fn compile_symbol_table_settles_at_global_scope() {
        let result = compile(
            "int main() { int x = 0; { int y = 1; { int z = 2; } } return x; }",
        );

        assert_eq!(result.symbol_table.current_scope_name(), "global");

        let names: Vec<&str> = result
            .symbol_table
            .scopes()
            .iter()
            .map(|scope| scope.name.as_str())
            .collect();
        assert_eq!(
            names,
            ["global", "function_main", "block_0", "block_1", "block_2"]
        );
    }

    #[test]
    fn compile_canonical_example() {
        let source = "int factorial(int n) {\n  if (n <= 1) { return 1; }\n  return n * factorial(n - 1);\n}\nint main() {\n  int result = factorial(5);\n  print(result);\n  return 0;\n}";
        let result = compile(source);

        assert!(result.errors.is_empty(), "diagnostics: {}", result.errors);
        assert!(result.assembly.contains("factorial:"));
        assert!(result.assembly.contains("main:"));
        assert!(result.assembly.contains("call printf"));
    }

    #[test]
    fn compile_empty_source() {
        let result = compile("");

        assert!(result.tokens.is_empty());
        assert!(result.ir.is_empty());
        assert_eq!(result.errors.semantic.len(), 1, "missing main is reported");
    }
}
