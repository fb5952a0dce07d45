//! Symbol Table
//!
//! Scope arena used by semantic analysis. Scopes are records indexed by
//! integer ids with parent links as indices; each scope also carries a stable
//! display name (`global`, `function_<name>`, `block_<N>`) with `N` drawn from
//! an incrementing counter so output is deterministic.

use std::fmt;

use indexmap::IndexMap;
use serde::Serialize;

use crate::compiler::parser::ast::Type;

/// What an identifier binds to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SymbolKind {
    Variable,
    Function,
    Parameter,
}

/// A declared identifier.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Symbol {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: Type,
    pub kind: SymbolKind,
    /// Position of the declaration.
    pub line: usize,
    pub column: usize,
    /// Whether the symbol has been assigned a value.
    pub initialized: bool,
    /// Parameter names and types; functions only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Vec<(String, Type)>>,
    /// Declared return type; functions only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_type: Option<Type>,
}

impl Symbol {
    /// Returns a new variable symbol declared at the given position.
    pub fn variable(name: impl Into<String>, ty: Type, line: usize, column: usize) -> Self {
        Symbol {
            name: name.into(),
            ty,
            kind: SymbolKind::Variable,
            line,
            column,
            initialized: false,
            params: None,
            return_type: None,
        }
    }

    /// Returns a new parameter symbol; parameters are initialized by the
    /// caller.
    pub fn parameter(name: impl Into<String>, ty: Type, line: usize, column: usize) -> Self {
        Symbol {
            name: name.into(),
            ty,
            kind: SymbolKind::Parameter,
            line,
            column,
            initialized: true,
            params: None,
            return_type: None,
        }
    }

    /// Returns a new function symbol with the given signature.
    pub fn function(
        name: impl Into<String>,
        params: Vec<(String, Type)>,
        return_type: Type,
        line: usize,
        column: usize,
    ) -> Self {
        Symbol {
            name: name.into(),
            ty: return_type,
            kind: SymbolKind::Function,
            line,
            column,
            initialized: true,
            params: Some(params),
            return_type: Some(return_type),
        }
    }
}

/// A single scope: a symbol map plus a link to the enclosing scope.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Scope {
    /// Stable display name of the scope.
    pub name: String,
    /// Index of the parent scope; `None` only for the global scope.
    pub parent: Option<usize>,
    /// Declared symbols in declaration order.
    pub symbols: IndexMap<String, Symbol>,
}

/// Forest of scopes rooted at a single global scope.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SymbolTable {
    scopes: Vec<Scope>,
    /// Index of the scope the analyzer is currently inside. After analysis
    /// completes this is back at [`SymbolTable::GLOBAL`].
    current: usize,
    // Monotonic counter for unique block-scope names.
    next_block: usize,
}

impl SymbolTable {
    /// Index of the global scope.
    pub const GLOBAL: usize = 0;

    /// Returns a new table holding only an empty global scope.
    #[must_use]
    pub fn new() -> Self {
        SymbolTable {
            scopes: vec![Scope {
                name: "global".into(),
                parent: None,
                symbols: IndexMap::new(),
            }],
            current: Self::GLOBAL,
            next_block: 0,
        }
    }

    /// Enters a new `function_<name>` scope as a child of the global scope.
    pub fn enter_function(&mut self, name: &str) {
        let id = self.scopes.len();
        self.scopes.push(Scope {
            name: format!("function_{name}"),
            parent: Some(Self::GLOBAL),
            symbols: IndexMap::new(),
        });
        self.current = id;
    }

    /// Enters a new uniquely-named block scope as a child of the current
    /// scope.
    pub fn enter_block(&mut self) {
        let id = self.scopes.len();
        let n = self.next_block;
        self.next_block += 1;

        self.scopes.push(Scope {
            name: format!("block_{n}"),
            parent: Some(self.current),
            symbols: IndexMap::new(),
        });
        self.current = id;
    }

    /// Restores the parent of the current scope.
    pub fn exit_scope(&mut self) {
        debug_assert!(self.current != Self::GLOBAL, "attempting to exit global scope");

        if let Some(parent) = self.scopes[self.current].parent {
            self.current = parent;
        }
    }

    /// Declares a symbol in the current scope. On redeclaration, returns the
    /// position of the prior declaration and leaves the table unchanged.
    pub fn declare(&mut self, symbol: Symbol) -> Result<(), (usize, usize)> {
        let scope = &mut self.scopes[self.current];

        if let Some(prior) = scope.symbols.get(&symbol.name) {
            return Err((prior.line, prior.column));
        }

        scope.symbols.insert(symbol.name.clone(), symbol);
        Ok(())
    }

    /// Resolves a name by walking from the current scope through parent links
    /// to the global scope.
    #[must_use]
    pub fn resolve(&self, name: &str) -> Option<&Symbol> {
        let mut scope = Some(self.current);

        while let Some(id) = scope {
            if let Some(symbol) = self.scopes[id].symbols.get(name) {
                return Some(symbol);
            }
            scope = self.scopes[id].parent;
        }

        None
    }

    /// Mutable variant of [`resolve`](Self::resolve), used to mark symbols
    /// initialized.
    pub fn resolve_mut(&mut self, name: &str) -> Option<&mut Symbol> {
        let mut scope = Some(self.current);

        while let Some(id) = scope {
            if self.scopes[id].symbols.contains_key(name) {
                return self.scopes[id].symbols.get_mut(name);
            }
            scope = self.scopes[id].parent;
        }

        None
    }

    /// Walks the scope chain upward to the first `function_<name>` scope and
    /// returns that function's name.
    #[must_use]
    pub fn enclosing_function(&self) -> Option<&str> {
        let mut scope = Some(self.current);

        while let Some(id) = scope {
            if let Some(name) = self.scopes[id].name.strip_prefix("function_") {
                return Some(name);
            }
            scope = self.scopes[id].parent;
        }

        None
    }

    /// Returns the symbol for `name` in the global scope, if any.
    #[must_use]
    pub fn global(&self, name: &str) -> Option<&Symbol> {
        self.scopes[Self::GLOBAL].symbols.get(name)
    }

    /// Display name of the scope the table is currently inside.
    #[must_use]
    pub fn current_scope_name(&self) -> &str {
        &self.scopes[self.current].name
    }

    /// All scopes, in creation order.
    #[must_use]
    pub fn scopes(&self) -> &[Scope] {
        &self.scopes
    }
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SymbolTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for scope in &self.scopes {
            let parent = match scope.parent {
                Some(id) => &self.scopes[id].name,
                None => "-",
            };
            writeln!(f, "{} (parent: {})", scope.name, parent)?;

            for symbol in scope.symbols.values() {
                writeln!(
                    f,
                    "    {:<12} {:<10} {:?} at {}:{}",
                    format!("{:?}", symbol.kind),
                    symbol.ty,
                    symbol.name,
                    symbol.line,
                    symbol.column
                )?;
            }
        }

        Ok(())
    }
}
