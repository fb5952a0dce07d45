//! Semantic Analysis
//!
//! Compiler pass that walks the syntax tree once, building the symbol table
//! and checking types. Unresolved names and type mismatches produce
//! diagnostics and yield the `unknown` sentinel, which suppresses cascading
//! reports; the walk itself never aborts.

pub mod symbols;

use crate::compiler::diag::Diagnostic;
use crate::compiler::parser::ast::{
    Declaration, Expression, Function, Program, Statement, Type, UnaryOperator, VarDecl,
};
use crate::compiler::sema::symbols::{Symbol, SymbolKind, SymbolTable};

/// Analyzes the given program, returning the populated symbol table and any
/// semantic diagnostics encountered along the way.
#[must_use]
pub fn analyze(program: &Program) -> (SymbolTable, Vec<Diagnostic>) {
    let mut analyzer = Analyzer {
        table: SymbolTable::new(),
        errors: vec![],
    };

    for decl in &program.decls {
        match decl {
            Declaration::Func(func) => analyzer.check_function(func),
            Declaration::Var(var) => analyzer.check_var_decl(var),
        }
    }

    if !matches!(
        analyzer.table.global("main").map(|s| s.kind),
        Some(SymbolKind::Function)
    ) {
        analyzer
            .errors
            .push(Diagnostic::new("Program must have a main function", 0, 0));
    }

    debug_assert_eq!(analyzer.table.current_scope_name(), "global");

    (analyzer.table, analyzer.errors)
}

/// Walk state: the table under construction plus the diagnostic sink.
struct Analyzer {
    table: SymbolTable,
    errors: Vec<Diagnostic>,
}

impl Analyzer {
    fn check_function(&mut self, func: &Function) {
        let params = func
            .params
            .iter()
            .map(|p| (p.name.clone(), p.ty))
            .collect();

        let symbol = Symbol::function(&func.name, params, func.ret, func.line, func.column);
        self.declare(symbol);

        self.table.enter_function(&func.name);

        for param in &func.params {
            let symbol = Symbol::parameter(&param.name, param.ty, param.line, param.column);
            self.declare(symbol);
        }

        // The body is a block node of its own, so it opens a child scope of
        // the function scope.
        self.check_block(&func.body);

        self.table.exit_scope();
    }

    fn check_block(&mut self, stmts: &[Statement]) {
        self.table.enter_block();

        for stmt in stmts {
            self.check_statement(stmt);
        }

        self.table.exit_scope();
    }

    fn check_statement(&mut self, stmt: &Statement) {
        match stmt {
            Statement::Block(stmts) => self.check_block(stmts),
            Statement::VarDecl(var) => self.check_var_decl(var),
            Statement::If {
                cond,
                then,
                opt_else,
            } => {
                self.check_condition(cond);
                self.check_statement(then);

                if let Some(else_stmt) = opt_else {
                    self.check_statement(else_stmt);
                }
            }
            Statement::While { cond, body } => {
                self.check_condition(cond);
                self.check_statement(body);
            }
            Statement::For {
                init,
                cond,
                step,
                body,
            } => {
                self.check_statement(init);

                if let Some(cond) = cond {
                    self.check_condition(cond);
                }

                if let Some(step) = step {
                    let _ = self.check_expression(step);
                }

                self.check_statement(body);
            }
            Statement::Return {
                value,
                line,
                column,
            } => self.check_return(value.as_ref(), *line, *column),
            Statement::Print { value, .. } => {
                let _ = self.check_expression(value);
            }
            Statement::Expression(expr) => {
                let _ = self.check_expression(expr);
            }
            Statement::Empty => {}
        }
    }

    fn check_var_decl(&mut self, var: &VarDecl) {
        let symbol = Symbol::variable(&var.name, var.ty, var.line, var.column);
        self.declare(symbol);

        if let Some(init) = &var.init {
            let init_ty = self.check_expression(init);

            if init_ty != Type::Unknown && var.ty != Type::Unknown && !assignable(var.ty, init_ty) {
                let (line, column) = init.position();
                self.errors.push(Diagnostic::new(
                    format!(
                        "Cannot initialize variable of type '{}' with value of type '{}'",
                        var.ty, init_ty
                    ),
                    line,
                    column,
                ));
            }

            if let Some(symbol) = self.table.resolve_mut(&var.name) {
                symbol.initialized = true;
            }
        }
    }

    fn check_condition(&mut self, cond: &Expression) {
        let ty = self.check_expression(cond);

        if ty != Type::Bool && ty != Type::Unknown {
            let (line, column) = cond.position();
            self.errors.push(Diagnostic::new(
                format!("Condition must be of type 'bool', found '{ty}'"),
                line,
                column,
            ));
        }
    }

    fn check_return(&mut self, value: Option<&Expression>, line: usize, column: usize) {
        let value_ty = value.map(|expr| self.check_expression(expr));

        let Some(func_name) = self.table.enclosing_function().map(str::to_string) else {
            return;
        };
        let Some(ret_ty) = self.table.global(&func_name).and_then(|s| s.return_type) else {
            return;
        };

        match value_ty {
            Some(ty) => {
                if ret_ty == Type::Void {
                    self.errors.push(Diagnostic::new(
                        format!("Void function '{func_name}' cannot return a value"),
                        line,
                        column,
                    ));
                } else if ty != Type::Unknown && !assignable(ret_ty, ty) {
                    self.errors.push(Diagnostic::new(
                        format!(
                            "Cannot return value of type '{ty}' from function of type '{ret_ty}'"
                        ),
                        line,
                        column,
                    ));
                }
            }
            None => {
                if ret_ty != Type::Void {
                    self.errors.push(Diagnostic::new(
                        format!("Function '{func_name}' must return a value of type '{ret_ty}'"),
                        line,
                        column,
                    ));
                }
            }
        }
    }

    fn check_expression(&mut self, expr: &Expression) -> Type {
        match expr {
            Expression::Number { lexeme, .. } => {
                if lexeme.contains('.') {
                    Type::Float
                } else {
                    Type::Int
                }
            }
            Expression::Str { .. } => Type::Str,
            Expression::Bool { .. } => Type::Bool,
            Expression::Ident { name, line, column } => match self.table.resolve(name) {
                Some(symbol) => symbol.ty,
                None => {
                    self.errors.push(Diagnostic::new(
                        format!("Undefined symbol '{name}'"),
                        *line,
                        *column,
                    ));
                    Type::Unknown
                }
            },
            Expression::Unary {
                op,
                operand,
                line,
                column,
            } => {
                let ty = self.check_expression(operand);

                match op {
                    UnaryOperator::Negate => match ty {
                        Type::Int | Type::Float | Type::Unknown => ty,
                        _ => {
                            self.errors.push(Diagnostic::new(
                                format!("Invalid operand type '{ty}' for unary '-'"),
                                *line,
                                *column,
                            ));
                            Type::Unknown
                        }
                    },
                    UnaryOperator::Not => Type::Bool,
                }
            }
            Expression::Binary {
                op,
                lhs,
                rhs,
                line,
                column,
            } => {
                let lhs_ty = self.check_expression(lhs);
                let rhs_ty = self.check_expression(rhs);

                if op.is_arithmetic() {
                    if lhs_ty == Type::Unknown || rhs_ty == Type::Unknown {
                        return Type::Unknown;
                    }

                    if !lhs_ty.is_numeric() || !rhs_ty.is_numeric() {
                        self.errors.push(Diagnostic::new(
                            format!(
                                "Invalid operand types '{lhs_ty}' and '{rhs_ty}' for operator '{op}'"
                            ),
                            *line,
                            *column,
                        ));
                        return Type::Unknown;
                    }

                    if lhs_ty == Type::Int && rhs_ty == Type::Int {
                        Type::Int
                    } else {
                        Type::Float
                    }
                } else {
                    // Comparisons and logical operators yield `bool`; their
                    // operand types are not constrained further.
                    Type::Bool
                }
            }
            Expression::Assign {
                target,
                value,
                line,
                column,
            } => self.check_assignment(target, value, *line, *column),
            Expression::Call {
                callee,
                args,
                line,
                column,
            } => self.check_call(callee, args, *line, *column),
            Expression::Grouping(inner) => self.check_expression(inner),
        }
    }

    fn check_assignment(
        &mut self,
        target: &Expression,
        value: &Expression,
        line: usize,
        column: usize,
    ) -> Type {
        let value_ty = self.check_expression(value);

        let Expression::Ident { name, .. } = target else {
            self.errors.push(Diagnostic::new(
                "Invalid assignment target",
                line,
                column,
            ));
            return Type::Unknown;
        };

        let target_ty = match self.table.resolve(name) {
            Some(symbol)
                if matches!(symbol.kind, SymbolKind::Variable | SymbolKind::Parameter) =>
            {
                symbol.ty
            }
            Some(_) => {
                self.errors.push(Diagnostic::new(
                    format!("Cannot assign to function '{name}'"),
                    line,
                    column,
                ));
                return Type::Unknown;
            }
            None => {
                let (line, column) = target.position();
                self.errors.push(Diagnostic::new(
                    format!("Undefined symbol '{name}'"),
                    line,
                    column,
                ));
                return Type::Unknown;
            }
        };

        if value_ty != Type::Unknown
            && target_ty != Type::Unknown
            && !assignable(target_ty, value_ty)
        {
            self.errors.push(Diagnostic::new(
                format!(
                    "Cannot assign value of type '{value_ty}' to variable of type '{target_ty}'"
                ),
                line,
                column,
            ));
        }

        if let Some(symbol) = self.table.resolve_mut(name) {
            symbol.initialized = true;
        }

        target_ty
    }

    fn check_call(
        &mut self,
        callee: &Expression,
        args: &[Expression],
        line: usize,
        column: usize,
    ) -> Type {
        let arg_types: Vec<Type> = args.iter().map(|arg| self.check_expression(arg)).collect();

        let Expression::Ident { name, .. } = callee else {
            self.errors
                .push(Diagnostic::new("Callee is not a function", line, column));
            return Type::Unknown;
        };

        let symbol = match self.table.resolve(name) {
            Some(symbol) => symbol.clone(),
            None => {
                let (line, column) = callee.position();
                self.errors.push(Diagnostic::new(
                    format!("Undefined symbol '{name}'"),
                    line,
                    column,
                ));
                return Type::Unknown;
            }
        };

        if symbol.kind != SymbolKind::Function {
            self.errors.push(Diagnostic::new(
                format!("'{name}' is not a function"),
                line,
                column,
            ));
            return Type::Unknown;
        }

        let params = symbol.params.unwrap_or_default();

        if params.len() != arg_types.len() {
            self.errors.push(Diagnostic::new(
                format!(
                    "Function '{name}' expects {} argument(s), got {}",
                    params.len(),
                    arg_types.len()
                ),
                line,
                column,
            ));
        } else {
            for ((param_name, param_ty), (arg, arg_ty)) in
                params.iter().zip(args.iter().zip(arg_types))
            {
                if arg_ty != Type::Unknown && !assignable(*param_ty, arg_ty) {
                    let (line, column) = arg.position();
                    self.errors.push(Diagnostic::new(
                        format!(
                            "Cannot pass value of type '{arg_ty}' for parameter '{param_name}' of type '{param_ty}'"
                        ),
                        line,
                        column,
                    ));
                }
            }
        }

        symbol.return_type.unwrap_or(Type::Unknown)
    }

    /// Declares a symbol, reporting a redeclaration that quotes the prior
    /// declaration site.
    fn declare(&mut self, symbol: Symbol) {
        let (name, line, column) = (symbol.name.clone(), symbol.line, symbol.column);

        if let Err((prior_line, prior_column)) = self.table.declare(symbol) {
            self.errors.push(Diagnostic::new(
                format!(
                    "Redeclaration of '{name}' (previously declared at line {prior_line}, column {prior_column})"
                ),
                line,
                column,
            ));
        }
    }
}

/// Returns `true` if a value of type `src` may be stored into a slot of type
/// `dst`, permitting the implicit `int` to `float` widening.
fn assignable(dst: Type, src: Type) -> bool {
    dst == src || (dst == Type::Float && src == Type::Int)
}

impl Type {
    /// Returns `true` for `int` and `float`.
    #[must_use]
    pub fn is_numeric(&self) -> bool {
        matches!(self, Type::Int | Type::Float)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::{lexer, parser};

    fn analyze_source(source: &str) -> (SymbolTable, Vec<Diagnostic>) {
        let (tokens, lex_errors) = lexer::lex(source);
        assert!(lex_errors.is_empty(), "unexpected lexical errors");
        let (program, parse_errors) = parser::parse(&tokens);
        assert!(parse_errors.is_empty(), "unexpected syntax errors");
        analyze(&program)
    }

    #[test]
    fn sema_valid_minimal_program() {
        let (table, errors) = analyze_source("int main() { return 0; }");

        assert!(errors.is_empty());
        assert_eq!(table.current_scope_name(), "global");
        assert_eq!(table.global("main").unwrap().kind, SymbolKind::Function);
    }

    #[test]
    fn sema_valid_shadowing_in_nested_scope() {
        let (_, errors) =
            analyze_source("int main() { int x = 1; { int x = 2; } return x; }");

        assert!(errors.is_empty());
    }

    #[test]
    fn sema_valid_widening_int_to_float() {
        let (_, errors) = analyze_source("int main() { float f = 1; f = 2; return 0; }");

        assert!(errors.is_empty());
    }

    #[test]
    fn sema_valid_call_checks_signature() {
        let (_, errors) = analyze_source(
            "float half(float x) { return x / 2; }\nint main() { float h = half(3); return 0; }",
        );

        assert!(errors.is_empty());
    }

    #[test]
    fn sema_invalid_undefined_symbol() {
        let (_, errors) = analyze_source("int main() { return x; }");

        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message, "Undefined symbol 'x'");
        assert_eq!((errors[0].line, errors[0].column), (1, 21));
    }

    #[test]
    fn sema_invalid_initializer_type_mismatch() {
        let (_, errors) = analyze_source("int main() { bool b = 1 + 1; return 0; }");

        assert_eq!(errors.len(), 1);
        assert_eq!(
            errors[0].message,
            "Cannot initialize variable of type 'bool' with value of type 'int'"
        );
    }

    #[test]
    fn sema_invalid_missing_main() {
        let (_, errors) = analyze_source("int f() { return 0; }");

        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message, "Program must have a main function");
        assert_eq!((errors[0].line, errors[0].column), (0, 0));
    }

    #[test]
    fn sema_invalid_redeclaration_quotes_prior_site() {
        let (_, errors) = analyze_source("int main() { int x = 1; int x = 2; return 0; }");

        assert_eq!(errors.len(), 1);
        assert_eq!(
            errors[0].message,
            "Redeclaration of 'x' (previously declared at line 1, column 18)"
        );
    }

    #[test]
    fn sema_invalid_condition_not_bool() {
        let (_, errors) = analyze_source("int main() { if (1 + 2) { } return 0; }");

        assert_eq!(errors.len(), 1);
        assert_eq!(
            errors[0].message,
            "Condition must be of type 'bool', found 'int'"
        );
    }

    #[test]
    fn sema_invalid_return_type_mismatch() {
        let (_, errors) = analyze_source("bool f() { return 1; }\nint main() { return 0; }");

        assert_eq!(errors.len(), 1);
        assert_eq!(
            errors[0].message,
            "Cannot return value of type 'int' from function of type 'bool'"
        );
    }

    #[test]
    fn sema_invalid_void_return_with_value() {
        let (_, errors) = analyze_source("void f() { return 1; }\nint main() { return 0; }");

        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message, "Void function 'f' cannot return a value");
    }

    #[test]
    fn sema_invalid_arity_mismatch() {
        let (_, errors) =
            analyze_source("int f(int a) { return a; }\nint main() { return f(1, 2); }");

        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message, "Function 'f' expects 1 argument(s), got 2");
    }

    #[test]
    fn sema_invalid_assignment_to_function() {
        let (_, errors) = analyze_source("int f() { return 0; }\nint main() { f = 1; return 0; }");

        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message, "Cannot assign to function 'f'");
    }

    #[test]
    fn sema_unknown_suppresses_cascades() {
        // `x` is undefined; the arithmetic over it must not produce a second
        // diagnostic.
        let (_, errors) = analyze_source("int main() { int a = x + 1; return a; }");

        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message, "Undefined symbol 'x'");
    }
}
