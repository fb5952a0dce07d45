//! Abstract Syntax Tree
//!
//! Tree produced by the parser. Nodes are tagged sum types with positionally
//! named fields; the flat `{kind, value, children}` record shape used at the
//! tool boundary is produced only by the [`Node`] converter at the bottom of
//! this module.

use std::fmt;

use serde::Serialize;

/// Types of the language, plus the `Unknown` sentinel used by semantic
/// analysis to suppress cascading diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Type {
    Int,
    Float,
    Bool,
    #[serde(rename = "string")]
    Str,
    Void,
    Unknown,
}

impl Type {
    /// Maps a type keyword lexeme to its type, or `None` for any other
    /// lexeme.
    #[must_use]
    pub fn from_keyword(lexeme: &str) -> Option<Type> {
        match lexeme {
            "int" => Some(Type::Int),
            "float" => Some(Type::Float),
            "bool" => Some(Type::Bool),
            "string" => Some(Type::Str),
            "void" => Some(Type::Void),
            _ => None,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Type::Int => "int",
            Type::Float => "float",
            Type::Bool => "bool",
            Type::Str => "string",
            Type::Void => "void",
            Type::Unknown => "unknown",
        };
        write!(f, "{name}")
    }
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    /// `+` - binary operator.
    Add,
    /// `-` - binary operator.
    Subtract,
    /// `*` - binary operator.
    Multiply,
    /// `/` - binary operator.
    Divide,
    /// `%` - binary operator.
    Modulo,
    /// `==` - binary operator.
    Eq,
    /// `!=` - binary operator.
    NotEq,
    /// `<` - binary operator.
    OrdLess,
    /// `<=` - binary operator.
    OrdLessEq,
    /// `>` - binary operator.
    OrdGreater,
    /// `>=` - binary operator.
    OrdGreaterEq,
    /// `&&` - binary operator.
    LogAnd,
    /// `||` - binary operator.
    LogOr,
}

impl BinaryOperator {
    /// Returns `true` for the five arithmetic operators.
    #[must_use]
    pub fn is_arithmetic(&self) -> bool {
        matches!(
            self,
            BinaryOperator::Add
                | BinaryOperator::Subtract
                | BinaryOperator::Multiply
                | BinaryOperator::Divide
                | BinaryOperator::Modulo
        )
    }

    /// Returns `true` for the six comparison operators.
    #[must_use]
    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            BinaryOperator::Eq
                | BinaryOperator::NotEq
                | BinaryOperator::OrdLess
                | BinaryOperator::OrdLessEq
                | BinaryOperator::OrdGreater
                | BinaryOperator::OrdGreaterEq
        )
    }
}

impl fmt::Display for BinaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = match self {
            BinaryOperator::Add => "+",
            BinaryOperator::Subtract => "-",
            BinaryOperator::Multiply => "*",
            BinaryOperator::Divide => "/",
            BinaryOperator::Modulo => "%",
            BinaryOperator::Eq => "==",
            BinaryOperator::NotEq => "!=",
            BinaryOperator::OrdLess => "<",
            BinaryOperator::OrdLessEq => "<=",
            BinaryOperator::OrdGreater => ">",
            BinaryOperator::OrdGreaterEq => ">=",
            BinaryOperator::LogAnd => "&&",
            BinaryOperator::LogOr => "||",
        };
        write!(f, "{op}")
    }
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    /// `-` - unary operator.
    Negate,
    /// `!` - unary operator.
    Not,
}

impl fmt::Display for UnaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = match self {
            UnaryOperator::Negate => "-",
            UnaryOperator::Not => "!",
        };
        write!(f, "{op}")
    }
}

/// Expressions.
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    /// Numeric literal; the lexeme is kept verbatim (`"3"`, `"3.14"`).
    Number {
        lexeme: String,
        line: usize,
        column: usize,
    },
    /// String literal; the lexeme includes the enclosing quotes.
    Str {
        lexeme: String,
        line: usize,
        column: usize,
    },
    /// `true` or `false` literal.
    Bool {
        value: bool,
        line: usize,
        column: usize,
    },
    /// Identifier reference.
    Ident {
        name: String,
        line: usize,
        column: usize,
    },
    /// Unary operator applied to an expression.
    Unary {
        op: UnaryOperator,
        operand: Box<Expression>,
        line: usize,
        column: usize,
    },
    /// Binary operator applied to two expressions.
    Binary {
        op: BinaryOperator,
        lhs: Box<Expression>,
        rhs: Box<Expression>,
        line: usize,
        column: usize,
    },
    /// Assigns `value` to `target`; right-associative. The analyzer enforces
    /// that `target` is an identifier.
    Assign {
        target: Box<Expression>,
        value: Box<Expression>,
        line: usize,
        column: usize,
    },
    /// Call with arguments in source order.
    Call {
        callee: Box<Expression>,
        args: Vec<Expression>,
        line: usize,
        column: usize,
    },
    /// Parenthesized expression.
    Grouping(Box<Expression>),
}

impl Expression {
    /// Source position of the expression (a grouping reports its inner
    /// expression's position).
    #[must_use]
    pub fn position(&self) -> (usize, usize) {
        match self {
            Expression::Number { line, column, .. }
            | Expression::Str { line, column, .. }
            | Expression::Bool { line, column, .. }
            | Expression::Ident { line, column, .. }
            | Expression::Unary { line, column, .. }
            | Expression::Binary { line, column, .. }
            | Expression::Assign { line, column, .. }
            | Expression::Call { line, column, .. } => (*line, *column),
            Expression::Grouping(inner) => inner.position(),
        }
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Number { lexeme, .. } => write!(f, "{lexeme}"),
            Expression::Str { lexeme, .. } => write!(f, "{lexeme}"),
            Expression::Bool { value, .. } => write!(f, "{value}"),
            Expression::Ident { name, .. } => write!(f, "{name}"),
            Expression::Unary { op, operand, .. } => write!(f, "{op}{operand}"),
            Expression::Binary { op, lhs, rhs, .. } => write!(f, "{lhs} {op} {rhs}"),
            Expression::Assign { target, value, .. } => write!(f, "{target} = {value}"),
            Expression::Call { callee, args, .. } => {
                write!(f, "{callee}(")?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                write!(f, ")")
            }
            Expression::Grouping(inner) => write!(f, "({inner})"),
        }
    }
}

/// Variable declaration, at top level or as a statement.
#[derive(Debug, Clone, PartialEq)]
pub struct VarDecl {
    pub ty: Type,
    pub name: String,
    /// Optional initializer.
    pub init: Option<Expression>,
    /// Position of the declared identifier.
    pub line: usize,
    pub column: usize,
}

/// Statements.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    /// Compound statement; introduces a scope.
    Block(Vec<Statement>),
    VarDecl(VarDecl),
    If {
        cond: Expression,
        then: Box<Statement>,
        opt_else: Option<Box<Statement>>,
    },
    While {
        cond: Expression,
        body: Box<Statement>,
    },
    For {
        /// Initial clause; an `Empty` statement when omitted.
        init: Box<Statement>,
        cond: Option<Expression>,
        step: Option<Expression>,
        body: Box<Statement>,
    },
    Return {
        value: Option<Expression>,
        line: usize,
        column: usize,
    },
    Print {
        value: Expression,
        line: usize,
        column: usize,
    },
    Expression(Expression),
    /// Expression statement without an expression (`;`), or an omitted `for`
    /// clause.
    Empty,
}

impl Statement {
    fn fmt_with_indent(&self, f: &mut fmt::Formatter<'_>, indent: usize) -> fmt::Result {
        let pad = "  ".repeat(indent);

        match self {
            Statement::Block(stmts) => {
                writeln!(f, "{pad}Block {{")?;
                for stmt in stmts {
                    stmt.fmt_with_indent(f, indent + 1)?;
                }
                writeln!(f, "{pad}}}")
            }
            Statement::VarDecl(decl) => match &decl.init {
                Some(init) => writeln!(f, "{pad}Decl {} {} = {}", decl.ty, decl.name, init),
                None => writeln!(f, "{pad}Decl {} {}", decl.ty, decl.name),
            },
            Statement::If {
                cond,
                then,
                opt_else,
            } => {
                writeln!(f, "{pad}If ({cond})")?;
                then.fmt_with_indent(f, indent + 1)?;
                if let Some(else_stmt) = opt_else {
                    writeln!(f, "{pad}Else")?;
                    else_stmt.fmt_with_indent(f, indent + 1)?;
                }
                Ok(())
            }
            Statement::While { cond, body } => {
                writeln!(f, "{pad}While ({cond})")?;
                body.fmt_with_indent(f, indent + 1)
            }
            Statement::For {
                init,
                cond,
                step,
                body,
            } => {
                let cond_fmt = cond.as_ref().map(ToString::to_string).unwrap_or_default();
                let step_fmt = step.as_ref().map(ToString::to_string).unwrap_or_default();

                writeln!(f, "{pad}For (..; {cond_fmt}; {step_fmt})")?;
                init.fmt_with_indent(f, indent + 1)?;
                body.fmt_with_indent(f, indent + 1)
            }
            Statement::Return { value, .. } => match value {
                Some(expr) => writeln!(f, "{pad}Return {expr}"),
                None => writeln!(f, "{pad}Return"),
            },
            Statement::Print { value, .. } => writeln!(f, "{pad}Print {value}"),
            Statement::Expression(expr) => writeln!(f, "{pad}Expr: {expr}"),
            Statement::Empty => writeln!(f, "{pad}Empty \";\""),
        }
    }
}

/// Function parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub ty: Type,
    pub name: String,
    pub line: usize,
    pub column: usize,
}

/// Function definition.
#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub ret: Type,
    pub name: String,
    pub params: Vec<Param>,
    /// Body statements; semantically a `Block`.
    pub body: Vec<Statement>,
    /// Position of the function identifier.
    pub line: usize,
    pub column: usize,
}

/// Top-level declaration.
#[derive(Debug, Clone, PartialEq)]
pub enum Declaration {
    Func(Function),
    Var(VarDecl),
}

/// Root of the syntax tree. May be partial when the parser had to recover
/// from errors.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Program {
    pub decls: Vec<Declaration>,
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Program")?;

        for decl in &self.decls {
            match decl {
                Declaration::Func(func) => {
                    write!(f, "  Fn {} {}(", func.ret, func.name)?;
                    for (i, param) in func.params.iter().enumerate() {
                        if i > 0 {
                            write!(f, ", ")?;
                        }
                        write!(f, "{} {}", param.ty, param.name)?;
                    }
                    writeln!(f, ")")?;

                    Statement::Block(func.body.clone()).fmt_with_indent(f, 2)?;
                }
                Declaration::Var(var) => {
                    Statement::VarDecl(var.clone()).fmt_with_indent(f, 1)?;
                }
            }
        }

        Ok(())
    }
}

/// Flat tree-node record: the positional `{kind, value, children}` layout
/// spoken at the tool boundary. Children are interpreted positionally per
/// `kind` (e.g. `FunctionDeclaration` has children
/// `[Type, Identifier, Parameters, Block]`).
#[derive(Debug, Clone, Serialize)]
pub struct Node {
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<usize>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Node>,
}

impl Node {
    fn new(kind: &'static str) -> Self {
        Node {
            kind,
            value: None,
            line: None,
            column: None,
            children: vec![],
        }
    }

    fn leaf(kind: &'static str, value: impl Into<String>, line: usize, column: usize) -> Self {
        Node {
            kind,
            value: Some(value.into()),
            line: Some(line),
            column: Some(column),
            children: vec![],
        }
    }

    fn with_children(kind: &'static str, children: Vec<Node>) -> Self {
        Node {
            kind,
            value: None,
            line: None,
            column: None,
            children,
        }
    }
}

impl Program {
    /// Converts the tree into the flat positional node layout.
    #[must_use]
    pub fn to_node(&self) -> Node {
        let children = self
            .decls
            .iter()
            .map(|decl| match decl {
                Declaration::Func(func) => func_node(func),
                Declaration::Var(var) => var_decl_node(var),
            })
            .collect();

        Node::with_children("Program", children)
    }
}

fn func_node(func: &Function) -> Node {
    let params = func
        .params
        .iter()
        .map(|p| {
            Node::with_children(
                "Parameter",
                vec![
                    Node::leaf("Type", p.ty.to_string(), p.line, p.column),
                    Node::leaf("Identifier", p.name.clone(), p.line, p.column),
                ],
            )
        })
        .collect();

    Node::with_children(
        "FunctionDeclaration",
        vec![
            Node::leaf("Type", func.ret.to_string(), func.line, func.column),
            Node::leaf("Identifier", func.name.clone(), func.line, func.column),
            Node::with_children("Parameters", params),
            block_node(&func.body),
        ],
    )
}

fn var_decl_node(var: &VarDecl) -> Node {
    let mut children = vec![
        Node::leaf("Type", var.ty.to_string(), var.line, var.column),
        Node::leaf("Identifier", var.name.clone(), var.line, var.column),
    ];
    if let Some(init) = &var.init {
        children.push(expr_node(init));
    }

    Node::with_children("VariableDeclaration", children)
}

fn block_node(stmts: &[Statement]) -> Node {
    Node::with_children("Block", stmts.iter().map(stmt_node).collect())
}

fn stmt_node(stmt: &Statement) -> Node {
    match stmt {
        Statement::Block(stmts) => block_node(stmts),
        Statement::VarDecl(var) => var_decl_node(var),
        Statement::If {
            cond,
            then,
            opt_else,
        } => {
            let mut children = vec![expr_node(cond), stmt_node(then)];
            if let Some(else_stmt) = opt_else {
                children.push(stmt_node(else_stmt));
            }
            Node::with_children("IfStatement", children)
        }
        Statement::While { cond, body } => {
            Node::with_children("WhileStatement", vec![expr_node(cond), stmt_node(body)])
        }
        Statement::For {
            init,
            cond,
            step,
            body,
        } => {
            // Missing clauses become placeholder `Empty` nodes so children
            // stay positional.
            let cond_node = cond.as_ref().map_or_else(|| Node::new("Empty"), expr_node);
            let step_node = step.as_ref().map_or_else(|| Node::new("Empty"), expr_node);

            Node::with_children(
                "ForStatement",
                vec![stmt_node(init), cond_node, step_node, stmt_node(body)],
            )
        }
        Statement::Return { value, .. } => {
            let children = value.as_ref().map(expr_node).into_iter().collect();
            Node::with_children("ReturnStatement", children)
        }
        Statement::Print { value, .. } => {
            Node::with_children("PrintStatement", vec![expr_node(value)])
        }
        Statement::Expression(expr) => {
            Node::with_children("ExpressionStatement", vec![expr_node(expr)])
        }
        Statement::Empty => Node::new("Empty"),
    }
}

fn expr_node(expr: &Expression) -> Node {
    match expr {
        Expression::Number {
            lexeme,
            line,
            column,
        } => Node::leaf("Number", lexeme.clone(), *line, *column),
        Expression::Str {
            lexeme,
            line,
            column,
        } => Node::leaf("String", lexeme.clone(), *line, *column),
        Expression::Bool {
            value,
            line,
            column,
        } => Node::leaf("Boolean", value.to_string(), *line, *column),
        Expression::Ident { name, line, column } => {
            Node::leaf("Identifier", name.clone(), *line, *column)
        }
        Expression::Unary {
            op,
            operand,
            line,
            column,
        } => Node {
            kind: "UnaryExpression",
            value: Some(op.to_string()),
            line: Some(*line),
            column: Some(*column),
            children: vec![expr_node(operand)],
        },
        Expression::Binary {
            op,
            lhs,
            rhs,
            line,
            column,
        } => Node {
            kind: "BinaryExpression",
            value: Some(op.to_string()),
            line: Some(*line),
            column: Some(*column),
            children: vec![expr_node(lhs), expr_node(rhs)],
        },
        Expression::Assign { target, value, .. } => {
            Node::with_children("Assignment", vec![expr_node(target), expr_node(value)])
        }
        Expression::Call { callee, args, .. } => {
            let mut children = vec![expr_node(callee)];
            children.extend(args.iter().map(expr_node));
            Node::with_children("FunctionCall", children)
        }
        Expression::Grouping(inner) => Node::with_children("Grouping", vec![expr_node(inner)]),
    }
}
