//! Syntax Analysis
//!
//! Compiler pass that parses a stream of tokens into an abstract syntax tree
//! (_AST_) by recursive descent with a single token of lookahead. A failed
//! production reports a diagnostic and resynchronizes at the next `;` or `}`;
//! the parser always produces a (possibly partial) tree.

pub mod ast;

use crate::compiler::diag::Diagnostic;
use crate::compiler::lexer::{Token, TokenKind};
use crate::compiler::parser::ast::{
    BinaryOperator, Declaration, Expression, Function, Param, Program, Statement, Type, UnaryOperator,
    VarDecl,
};

/// Parses the given token sequence, returning the syntax tree and any syntax
/// diagnostics encountered along the way.
#[must_use]
pub fn parse(tokens: &[Token]) -> (Program, Vec<Diagnostic>) {
    let mut parser = Parser {
        tokens,
        cur: 0,
        errors: vec![],
    };

    let program = parser.parse_program();

    (program, parser.errors)
}

/// Cursor state over the token sequence.
struct Parser<'a> {
    tokens: &'a [Token],
    cur: usize,
    errors: Vec<Diagnostic>,
}

impl<'a> Parser<'a> {
    fn parse_program(&mut self) -> Program {
        let mut decls = vec![];

        while !self.at_end() {
            let before = self.cur;

            if let Some(decl) = self.parse_declaration() {
                decls.push(decl);
            } else {
                self.synchronize();
            }

            // A declaration that consumed nothing would loop forever; skip
            // the offending token.
            if self.cur == before {
                self.cur += 1;
            }
        }

        Program { decls }
    }

    /// `declaration := type IDENT ( functionRest | varRest )`
    fn parse_declaration(&mut self) -> Option<Declaration> {
        let ty = self.parse_type()?;
        let (name, line, column) = self.parse_ident()?;

        if self.check_punct("(") {
            let (params, body) = self.parse_function_rest()?;

            Some(Declaration::Func(Function {
                ret: ty,
                name,
                params,
                body,
                line,
                column,
            }))
        } else {
            let init = self.parse_var_rest()?;

            Some(Declaration::Var(VarDecl {
                ty,
                name,
                init,
                line,
                column,
            }))
        }
    }

    /// `functionRest := '(' paramList? ')' block`
    fn parse_function_rest(&mut self) -> Option<(Vec<Param>, Vec<Statement>)> {
        self.expect_punct("(");

        let mut params = vec![];

        if !self.check_punct(")") && !self.at_end() {
            loop {
                let ty = self.parse_type()?;
                let (name, line, column) = self.parse_ident()?;

                params.push(Param {
                    ty,
                    name,
                    line,
                    column,
                });

                if !self.match_punct(",") {
                    break;
                }
            }
        }

        self.expect_punct(")");

        let body = self.parse_block()?;

        Some((params, body))
    }

    /// `varRest := ('=' expression)? ';'`
    fn parse_var_rest(&mut self) -> Option<Option<Expression>> {
        let mut init = None;

        if self.match_op("=") {
            init = Some(self.parse_expression()?);
        }

        self.expect_punct(";");

        Some(init)
    }

    fn parse_block(&mut self) -> Option<Vec<Statement>> {
        self.expect_punct("{");

        let mut stmts = vec![];

        while !self.check_punct("}") && !self.at_end() {
            let before = self.cur;

            if let Some(stmt) = self.parse_statement() {
                stmts.push(stmt);
            } else {
                self.synchronize();
            }

            if self.cur == before {
                self.cur += 1;
            }
        }

        self.expect_punct("}");

        Some(stmts)
    }

    fn parse_statement(&mut self) -> Option<Statement> {
        if self.check_punct("{") {
            return Some(Statement::Block(self.parse_block()?));
        }

        if self.check_punct(";") {
            self.cur += 1;
            return Some(Statement::Empty);
        }

        if self.check_keyword("if") {
            return self.parse_if();
        }

        if self.check_keyword("while") {
            return self.parse_while();
        }

        if self.check_keyword("for") {
            return self.parse_for();
        }

        if self.check_keyword("return") {
            return self.parse_return();
        }

        if self.check_keyword("print") {
            return self.parse_print();
        }

        if self.check_type_keyword() {
            return self.parse_var_decl();
        }

        let expr = self.parse_expression()?;
        self.expect_punct(";");

        Some(Statement::Expression(expr))
    }

    /// `ifStmt := 'if' '(' expression ')' statement ('else' statement)?`
    fn parse_if(&mut self) -> Option<Statement> {
        // Consume the "if" keyword.
        self.cur += 1;

        self.expect_punct("(");
        let cond = self.parse_expression()?;
        self.expect_punct(")");

        let then = Box::new(self.parse_statement()?);

        let mut opt_else = None;
        if self.check_keyword("else") {
            self.cur += 1;
            opt_else = Some(Box::new(self.parse_statement()?));
        }

        Some(Statement::If {
            cond,
            then,
            opt_else,
        })
    }

    /// `whileStmt := 'while' '(' expression ')' statement`
    fn parse_while(&mut self) -> Option<Statement> {
        // Consume the "while" keyword.
        self.cur += 1;

        self.expect_punct("(");
        let cond = self.parse_expression()?;
        self.expect_punct(")");

        let body = Box::new(self.parse_statement()?);

        Some(Statement::While { cond, body })
    }

    /// `forStmt := 'for' '(' (statement|';') expression? ';' expression? ')'
    /// statement`
    fn parse_for(&mut self) -> Option<Statement> {
        // Consume the "for" keyword.
        self.cur += 1;

        self.expect_punct("(");

        // The initial clause is a full statement and consumes its own `;`;
        // a lone `;` parses as `Empty`.
        let init = Box::new(self.parse_statement()?);

        let mut cond = None;
        if !self.check_punct(";") {
            cond = Some(self.parse_expression()?);
        }
        self.expect_punct(";");

        let mut step = None;
        if !self.check_punct(")") {
            step = Some(self.parse_expression()?);
        }
        self.expect_punct(")");

        let body = Box::new(self.parse_statement()?);

        Some(Statement::For {
            init,
            cond,
            step,
            body,
        })
    }

    /// `returnStmt := 'return' expression? ';'`
    fn parse_return(&mut self) -> Option<Statement> {
        let (line, column) = self.position();

        // Consume the "return" keyword.
        self.cur += 1;

        let mut value = None;
        if !self.check_punct(";") {
            value = Some(self.parse_expression()?);
        }
        self.expect_punct(";");

        Some(Statement::Return {
            value,
            line,
            column,
        })
    }

    /// `printStmt := 'print' '(' expression ')' ';'`
    fn parse_print(&mut self) -> Option<Statement> {
        let (line, column) = self.position();

        // Consume the "print" keyword.
        self.cur += 1;

        self.expect_punct("(");
        let value = self.parse_expression()?;
        self.expect_punct(")");
        self.expect_punct(";");

        Some(Statement::Print {
            value,
            line,
            column,
        })
    }

    fn parse_var_decl(&mut self) -> Option<Statement> {
        let ty = self.parse_type()?;
        let (name, line, column) = self.parse_ident()?;
        let init = self.parse_var_rest()?;

        Some(Statement::VarDecl(VarDecl {
            ty,
            name,
            init,
            line,
            column,
        }))
    }

    /// `expression := assignment`, where
    /// `assignment := logicalOr ('=' assignment)?` (right-associative).
    fn parse_expression(&mut self) -> Option<Expression> {
        let lhs = self.parse_logical_or()?;

        if self.check_op("=") {
            let (line, column) = self.position();
            self.cur += 1;

            let value = self.parse_expression()?;

            return Some(Expression::Assign {
                target: Box::new(lhs),
                value: Box::new(value),
                line,
                column,
            });
        }

        Some(lhs)
    }

    fn parse_logical_or(&mut self) -> Option<Expression> {
        let mut lhs = self.parse_logical_and()?;

        while self.check_op("||") {
            let (line, column) = self.position();
            self.cur += 1;

            let rhs = self.parse_logical_and()?;
            lhs = Expression::Binary {
                op: BinaryOperator::LogOr,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                line,
                column,
            };
        }

        Some(lhs)
    }

    fn parse_logical_and(&mut self) -> Option<Expression> {
        let mut lhs = self.parse_equality()?;

        while self.check_op("&&") {
            let (line, column) = self.position();
            self.cur += 1;

            let rhs = self.parse_equality()?;
            lhs = Expression::Binary {
                op: BinaryOperator::LogAnd,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                line,
                column,
            };
        }

        Some(lhs)
    }

    fn parse_equality(&mut self) -> Option<Expression> {
        let mut lhs = self.parse_comparison()?;

        loop {
            let op = if self.check_op("==") {
                BinaryOperator::Eq
            } else if self.check_op("!=") {
                BinaryOperator::NotEq
            } else {
                break;
            };

            let (line, column) = self.position();
            self.cur += 1;

            let rhs = self.parse_comparison()?;
            lhs = Expression::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                line,
                column,
            };
        }

        Some(lhs)
    }

    fn parse_comparison(&mut self) -> Option<Expression> {
        let mut lhs = self.parse_term()?;

        loop {
            let op = if self.check_op("<=") {
                BinaryOperator::OrdLessEq
            } else if self.check_op(">=") {
                BinaryOperator::OrdGreaterEq
            } else if self.check_op("<") {
                BinaryOperator::OrdLess
            } else if self.check_op(">") {
                BinaryOperator::OrdGreater
            } else {
                break;
            };

            let (line, column) = self.position();
            self.cur += 1;

            let rhs = self.parse_term()?;
            lhs = Expression::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                line,
                column,
            };
        }

        Some(lhs)
    }

    fn parse_term(&mut self) -> Option<Expression> {
        let mut lhs = self.parse_factor()?;

        loop {
            let op = if self.check_op("+") {
                BinaryOperator::Add
            } else if self.check_op("-") {
                BinaryOperator::Subtract
            } else {
                break;
            };

            let (line, column) = self.position();
            self.cur += 1;

            let rhs = self.parse_factor()?;
            lhs = Expression::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                line,
                column,
            };
        }

        Some(lhs)
    }

    fn parse_factor(&mut self) -> Option<Expression> {
        let mut lhs = self.parse_unary()?;

        loop {
            let op = if self.check_op("*") {
                BinaryOperator::Multiply
            } else if self.check_op("/") {
                BinaryOperator::Divide
            } else if self.check_op("%") {
                BinaryOperator::Modulo
            } else {
                break;
            };

            let (line, column) = self.position();
            self.cur += 1;

            let rhs = self.parse_unary()?;
            lhs = Expression::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                line,
                column,
            };
        }

        Some(lhs)
    }

    /// `unary := ('!' | '-') unary | call`
    fn parse_unary(&mut self) -> Option<Expression> {
        let op = if self.check_op("!") {
            Some(UnaryOperator::Not)
        } else if self.check_op("-") {
            Some(UnaryOperator::Negate)
        } else {
            None
        };

        if let Some(op) = op {
            let (line, column) = self.position();
            self.cur += 1;

            let operand = self.parse_unary()?;

            return Some(Expression::Unary {
                op,
                operand: Box::new(operand),
                line,
                column,
            });
        }

        self.parse_call()
    }

    /// `call := primary ('(' args? ')')*`
    fn parse_call(&mut self) -> Option<Expression> {
        let mut expr = self.parse_primary()?;

        while self.check_punct("(") {
            let (line, column) = self.position();
            self.cur += 1;

            let mut args = vec![];

            if !self.check_punct(")") && !self.at_end() {
                loop {
                    args.push(self.parse_expression()?);

                    if !self.match_punct(",") {
                        break;
                    }
                }
            }

            self.expect_punct(")");

            expr = Expression::Call {
                callee: Box::new(expr),
                args,
                line,
                column,
            };
        }

        Some(expr)
    }

    fn parse_primary(&mut self) -> Option<Expression> {
        let Some(token) = self.peek() else {
            self.errors.push(Diagnostic::new(
                "Unexpected end of input",
                self.last_position().0,
                self.last_position().1,
            ));
            return None;
        };

        let (line, column) = (token.line, token.column);

        match token.kind {
            TokenKind::Number => {
                let lexeme = token.lexeme.clone();
                self.cur += 1;
                Some(Expression::Number {
                    lexeme,
                    line,
                    column,
                })
            }
            TokenKind::String => {
                let lexeme = token.lexeme.clone();
                self.cur += 1;
                Some(Expression::Str {
                    lexeme,
                    line,
                    column,
                })
            }
            TokenKind::Keyword if token.lexeme == "true" || token.lexeme == "false" => {
                let value = token.lexeme == "true";
                self.cur += 1;
                Some(Expression::Bool {
                    value,
                    line,
                    column,
                })
            }
            TokenKind::Identifier => {
                let name = token.lexeme.clone();
                self.cur += 1;
                Some(Expression::Ident { name, line, column })
            }
            TokenKind::Punctuation if token.lexeme == "(" => {
                self.cur += 1;
                let inner = self.parse_expression()?;
                self.expect_punct(")");
                Some(Expression::Grouping(Box::new(inner)))
            }
            _ => {
                self.errors.push(Diagnostic::new(
                    format!("Unexpected token '{}'", token.lexeme),
                    line,
                    column,
                ));
                None
            }
        }
    }

    /// `type := 'int' | 'float' | 'bool' | 'void'`
    fn parse_type(&mut self) -> Option<Type> {
        if let Some(token) = self.peek() {
            if token.kind == TokenKind::Keyword {
                if let Some(ty) = Type::from_keyword(&token.lexeme) {
                    self.cur += 1;
                    return Some(ty);
                }
            }

            self.errors.push(Diagnostic::new(
                format!("Expected type, found '{}'", token.lexeme),
                token.line,
                token.column,
            ));
        } else {
            let (line, column) = self.last_position();
            self.errors
                .push(Diagnostic::new("Expected type", line, column));
        }

        None
    }

    fn parse_ident(&mut self) -> Option<(String, usize, usize)> {
        if let Some(token) = self.peek() {
            if token.kind == TokenKind::Identifier {
                let ident = (token.lexeme.clone(), token.line, token.column);
                self.cur += 1;
                return Some(ident);
            }

            self.errors.push(Diagnostic::new(
                format!("Expected identifier, found '{}'", token.lexeme),
                token.line,
                token.column,
            ));
        } else {
            let (line, column) = self.last_position();
            self.errors
                .push(Diagnostic::new("Expected identifier", line, column));
        }

        None
    }

    /// Consumes the expected punctuation if present; otherwise reports a
    /// diagnostic and leaves the cursor in place so construction can
    /// proceed.
    fn expect_punct(&mut self, lexeme: &str) {
        if self.match_punct(lexeme) {
            return;
        }

        let (line, column, found) = match self.peek() {
            Some(token) => (token.line, token.column, format!(", found '{}'", token.lexeme)),
            None => {
                let (line, column) = self.last_position();
                (line, column, String::new())
            }
        };

        self.errors
            .push(Diagnostic::new(format!("Expected '{lexeme}'{found}"), line, column));
    }

    fn match_punct(&mut self, lexeme: &str) -> bool {
        if self.check_punct(lexeme) {
            self.cur += 1;
            return true;
        }
        false
    }

    fn match_op(&mut self, lexeme: &str) -> bool {
        if self.check_op(lexeme) {
            self.cur += 1;
            return true;
        }
        false
    }

    fn check_punct(&self, lexeme: &str) -> bool {
        self.check(TokenKind::Punctuation, lexeme)
    }

    fn check_op(&self, lexeme: &str) -> bool {
        self.check(TokenKind::Operator, lexeme)
    }

    fn check_keyword(&self, lexeme: &str) -> bool {
        self.check(TokenKind::Keyword, lexeme)
    }

    fn check_type_keyword(&self) -> bool {
        self.peek().is_some_and(|token| {
            token.kind == TokenKind::Keyword && Type::from_keyword(&token.lexeme).is_some()
        })
    }

    fn check(&self, kind: TokenKind, lexeme: &str) -> bool {
        self.peek()
            .is_some_and(|token| token.kind == kind && token.lexeme == lexeme)
    }

    /// Discards tokens up to and including the next `;`, or up to (not
    /// including) the next `}`.
    fn synchronize(&mut self) {
        while let Some(token) = self.peek() {
            if token.kind == TokenKind::Punctuation {
                match token.lexeme.as_str() {
                    ";" => {
                        self.cur += 1;
                        return;
                    }
                    "}" => return,
                    _ => {}
                }
            }

            self.cur += 1;
        }
    }

    #[inline]
    fn peek(&self) -> Option<&'a Token> {
        self.tokens.get(self.cur)
    }

    #[inline]
    fn at_end(&self) -> bool {
        self.cur >= self.tokens.len()
    }

    /// Position of the current token, for diagnostics.
    fn position(&self) -> (usize, usize) {
        self.peek()
            .map_or_else(|| self.last_position(), |token| (token.line, token.column))
    }

    /// Position just past the final token, for end-of-input diagnostics.
    fn last_position(&self) -> (usize, usize) {
        self.tokens
            .last()
            .map_or((1, 1), |token| (token.line, token.column + token.lexeme.len()))
    }
}
