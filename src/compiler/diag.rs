//! Diagnostics
//!
//! Location-tagged messages produced by the analysis stages, partitioned by
//! the stage that discovered them.

use std::fmt;

use serde::Serialize;

/// A single location-tagged message.
///
/// Lines and columns are 1-based; diagnostics that refer to the program as a
/// whole (e.g. a missing `main`) use `(0, 0)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    /// Human-readable description of the problem.
    pub message: String,
    /// 1-based source line.
    pub line: usize,
    /// 1-based source column.
    pub column: usize,
}

impl Diagnostic {
    /// Returns a new diagnostic at the given position.
    pub fn new(message: impl Into<String>, line: usize, column: usize) -> Self {
        Diagnostic {
            message: message.into(),
            line,
            column,
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}: {}", self.line, self.column, self.message)
    }
}

/// Diagnostics accumulated over a full pipeline run, one list per analysis
/// stage.
///
/// No stage aborts the pipeline; a non-empty `lexical` or `syntax` list means
/// later artifacts are advisory only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Diagnostics {
    /// Problems found while scanning the source text.
    pub lexical: Vec<Diagnostic>,
    /// Problems found while parsing the token stream.
    pub syntax: Vec<Diagnostic>,
    /// Problems found during semantic analysis.
    pub semantic: Vec<Diagnostic>,
}

impl Diagnostics {
    /// Returns `true` if no stage reported a problem.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lexical.is_empty() && self.syntax.is_empty() && self.semantic.is_empty()
    }

    /// Total number of diagnostics across all stages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lexical.len() + self.syntax.len() + self.semantic.len()
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for diag in &self.lexical {
            writeln!(f, "lexical error: {diag}")?;
        }
        for diag in &self.syntax {
            writeln!(f, "syntax error: {diag}")?;
        }
        for diag in &self.semantic {
            writeln!(f, "semantic error: {diag}")?;
        }
        Ok(())
    }
}
