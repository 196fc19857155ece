//! **treelox**: parser, resolver and tree-walking interpreter for a small
//! Lox dialect with closures, classes, `break` and `continue`.
//!
//! The stages can be driven one by one (`Scanner` → `Parser` → `Resolver` →
//! `Interpreter`) or through [`run`], which chains them and reports the first
//! stage that failed.

pub mod ast;
pub mod class;
pub mod environment;
pub mod error;
pub mod func;
pub mod interpreter;
pub mod parser;
pub mod printer;
pub mod resolver;
pub mod scanner;
mod stack;
pub mod token;
pub mod value;

use std::fmt;
use std::io::Write;

use log::{debug, info};
use thiserror::Error;

use crate::ast::Stmt;
use crate::error::Diagnostics;
use crate::interpreter::Interpreter;
use crate::parser::Parser;
use crate::resolver::Resolver;
use crate::scanner::Scanner;

/// The pipeline stage that rejected a program.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Scan,
    Parse,
    Resolve,
    Runtime,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Scan => "scan",
            Stage::Parse => "parse",
            Stage::Resolve => "resolve",
            Stage::Runtime => "runtime",
        })
    }
}

#[derive(Debug, Error)]
#[error("{diagnostics}")]
pub struct RunError {
    pub stage: Stage,
    pub diagnostics: Diagnostics,
}

impl RunError {
    fn new(stage: Stage, diagnostics: Diagnostics) -> Self {
        debug!("{} stage failed with {} diagnostic(s)", stage, diagnostics.len());

        RunError { stage, diagnostics }
    }

    /// Process exit status for this failure: 65 for bad input, 70 once the
    /// program has started running.
    pub fn exit_code(&self) -> i32 {
        match self.stage {
            Stage::Scan | Stage::Parse | Stage::Resolve => 65,
            Stage::Runtime => 70,
        }
    }
}

/// Scan, parse and resolve `source`.  The returned tree is ready to run.
pub fn compile(source: &str) -> Result<Vec<Stmt>, RunError> {
    let (tokens, errors) = Scanner::new(source).scan_tokens();

    if !errors.is_empty() {
        let mut diagnostics = Diagnostics::new();
        for e in errors {
            diagnostics.report(e);
        }
        return Err(RunError::new(Stage::Scan, diagnostics));
    }

    info!("Scanned {} tokens", tokens.len());

    let (statements, diagnostics) = Parser::new(&tokens).parse();
    if !diagnostics.is_empty() {
        return Err(RunError::new(Stage::Parse, diagnostics));
    }

    info!("Parsed {} statements", statements.len());

    Resolver::new()
        .resolve(&statements)
        .map_err(|diagnostics| RunError::new(Stage::Resolve, diagnostics))?;

    Ok(statements)
}

/// Compile `source` and execute it on `interpreter`.  Globals defined by
/// earlier runs on the same interpreter stay visible.
pub fn run<W: Write>(source: &str, interpreter: &mut Interpreter<W>) -> Result<(), RunError> {
    let statements = compile(source)?;

    interpreter
        .interpret(&statements)
        .map_err(|diagnostics| RunError::new(Stage::Runtime, diagnostics))
}
