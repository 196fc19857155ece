//! Centralised error hierarchy and diagnostics for the **treelox** core.
//!
//! Every stage (scanner, parser, resolver, interpreter) converts its failure
//! modes into a [`LoxError`].  Errors that must reach the embedding caller are
//! turned into [`Diagnostic`]s and gathered in a [`Diagnostics`] collector that
//! is threaded through the stage and handed back to the caller; nothing in the
//! crate keeps process-wide error counters.
//!
//! The module **does not** print diagnostics itself.

use std::fmt;
use std::io;

use log::info;
use serde::Serialize;
use thiserror::Error;

/// Canonical error type used throughout the interpreter.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LoxError {
    /// Lexical (scanner) error with source line information.
    #[error("[line {line}] Error: {message}")]
    Lex {
        /// Human‑readable description.
        message: String,

        /// 1‑based line where the error occurred.
        line: usize,
    },

    /// Syntactic (parser) error.
    #[error("[line {line}] Error: {message}")]
    Parse { message: String, line: usize },

    /// Static‑analysis failure (self‑reference in an initializer, local
    /// redeclaration).
    #[error("[line {line}] Error: {message}")]
    Resolve { message: String, line: usize },

    /// Runtime evaluation error.
    #[error("[line {line}] Error: {message}")]
    Runtime { message: String, line: usize },

    /// A violated interpreter invariant.  Never caused by user code when the
    /// parser and resolver are correct.
    #[error("[line {line}] Internal error: {message}")]
    Internal { message: String, line: usize },

    /// Wrapper around `std::io::Error` (transparent).  Enables `?` on I/O ops.
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl LoxError {
    /// Helper constructor for the **scanner**.
    pub fn lex<S: Into<String>>(line: usize, msg: S) -> Self {
        let message: String = msg.into();

        info!("Creating Lex error: line={}, msg={}", line, message);

        LoxError::Lex { message, line }
    }

    /// Helper constructor for the **parser**.
    pub fn parse<S: Into<String>>(line: usize, msg: S) -> Self {
        let message: String = msg.into();

        info!("Creating Parse error: line={}, msg={}", line, message);

        LoxError::Parse { message, line }
    }

    /// Helper constructor for the **resolver**.
    pub fn resolve<S: Into<String>>(line: usize, msg: S) -> Self {
        let message: String = msg.into();

        info!("Creating Resolve error: line={}, msg={}", line, message);

        LoxError::Resolve { message, line }
    }

    /// Helper constructor for the **interpreter**.
    pub fn runtime<S: Into<String>>(line: usize, msg: S) -> Self {
        let message: String = msg.into();

        info!("Creating Runtime error: line={}, msg={}", line, message);

        LoxError::Runtime { message, line }
    }

    /// Helper constructor for invariant violations.
    pub fn internal<S: Into<String>>(line: usize, msg: S) -> Self {
        let message: String = msg.into();

        info!("Creating Internal error: line={}, msg={}", line, message);

        LoxError::Internal { message, line }
    }

    /// Source line the error points at, if it has one.
    pub fn line(&self) -> Option<usize> {
        match self {
            LoxError::Lex { line, .. }
            | LoxError::Parse { line, .. }
            | LoxError::Resolve { line, .. }
            | LoxError::Runtime { line, .. }
            | LoxError::Internal { line, .. } => Some(*line),
            LoxError::Io(_) => None,
        }
    }
}

/// Crate‑wide `Result` alias.
pub type Result<T> = std::result::Result<T, LoxError>;

/// Severity class of a [`Diagnostic`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DiagnosticKind {
    /// A problem in the user's program.
    Normal,

    /// A defect in the interpreter itself.
    Internal,
}

/// A single reportable problem: `{ source line, kind, message }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub line: usize,
    pub kind: DiagnosticKind,
    pub message: String,
}

impl Diagnostic {
    pub fn new<S: Into<String>>(line: usize, kind: DiagnosticKind, message: S) -> Self {
        Self {
            line,
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            DiagnosticKind::Normal => write!(f, "[line {}] Error: {}", self.line, self.message),
            DiagnosticKind::Internal => {
                write!(f, "[line {}] Internal error: {}", self.line, self.message)
            }
        }
    }
}

impl From<LoxError> for Diagnostic {
    fn from(err: LoxError) -> Self {
        match err {
            LoxError::Lex { message, line }
            | LoxError::Parse { message, line }
            | LoxError::Resolve { message, line }
            | LoxError::Runtime { message, line } => {
                Diagnostic::new(line, DiagnosticKind::Normal, message)
            }

            LoxError::Internal { message, line } => {
                Diagnostic::new(line, DiagnosticKind::Internal, message)
            }

            // I/O failures surface while writing program output; they carry no
            // source position of their own.
            LoxError::Io(e) => Diagnostic::new(0, DiagnosticKind::Normal, e.to_string()),
        }
    }
}

/// Ordered collection of diagnostics produced by one stage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Diagnostics {
    items: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an error, converting it into a [`Diagnostic`].
    pub fn report(&mut self, err: LoxError) {
        self.items.push(err.into());
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Diagnostic> {
        self.items.iter()
    }

    /// `true` when at least one diagnostic signals an interpreter defect.
    pub fn has_internal(&self) -> bool {
        self.items
            .iter()
            .any(|d| d.kind == DiagnosticKind::Internal)
    }

    /// `Ok(())` when nothing was reported, otherwise the collector itself.
    pub fn into_result(self) -> std::result::Result<(), Diagnostics> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl From<LoxError> for Diagnostics {
    fn from(err: LoxError) -> Self {
        let mut diagnostics = Diagnostics::new();
        diagnostics.report(err);
        diagnostics
    }
}

impl IntoIterator for Diagnostics {
    type Item = Diagnostic;
    type IntoIter = std::vec::IntoIter<Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<'d> IntoIterator for &'d Diagnostics {
    type Item = &'d Diagnostic;
    type IntoIter = std::slice::Iter<'d, Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, diagnostic) in self.items.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{}", diagnostic)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runtime_error_becomes_normal_diagnostic() {
        let diagnostic: Diagnostic = LoxError::runtime(4, "Operand must be a number.").into();

        assert_eq!(diagnostic.line, 4);
        assert_eq!(diagnostic.kind, DiagnosticKind::Normal);
        assert_eq!(
            diagnostic.to_string(),
            "[line 4] Error: Operand must be a number."
        );
    }

    #[test]
    fn internal_error_is_flagged() {
        let diagnostics: Diagnostics = LoxError::internal(9, "broken scope chain").into();

        assert!(diagnostics.has_internal());
        assert_eq!(
            diagnostics.to_string(),
            "[line 9] Internal error: broken scope chain"
        );
    }

    #[test]
    fn empty_collector_is_ok() {
        assert!(Diagnostics::new().into_result().is_ok());

        let mut diagnostics = Diagnostics::new();
        diagnostics.report(LoxError::parse(1, "Expected expression."));
        diagnostics.report(LoxError::parse(2, "Expected ';' after value."));

        let err = diagnostics.into_result().unwrap_err();
        assert_eq!(err.len(), 2);
        assert_eq!(
            err.to_string(),
            "[line 1] Error: Expected expression.\n[line 2] Error: Expected ';' after value."
        );
    }
}
