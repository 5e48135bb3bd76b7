//! rill: a small dynamically typed scripting language with closures and
//! single-inheritance classes, run by a tree-walking interpreter.
//!
//! A program goes through four passes:
//!
//! 1. [`scanner`] turns source text into tokens,
//! 2. [`parser`] builds the statement tree,
//! 3. [`resolver`] computes the scope distance of every local reference,
//! 4. [`interpreter`] runs the tree.
//!
//! [`Session`] chains them and keeps one interpreter alive across runs.

pub mod ast_printer;
pub mod class;
pub mod diagnostics;
pub mod environment;
pub mod error;
pub mod expr;
pub mod function;
pub mod interpreter;
pub mod parser;
pub mod resolver;
pub mod scanner;
pub mod stmt;
pub mod token;
pub mod value;

use std::fs;
use std::path::Path;

use log::{debug, info};

use crate::diagnostics::Reporter;
use crate::error::Result;
use crate::interpreter::Interpreter;
use crate::parser::Parser;
use crate::resolver::{Locals, Resolver};
use crate::scanner::Scanner;
use crate::stmt::Stmt;
use crate::token::Token;
use crate::value::Value;

/// How a [`Session::run`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Completed,
    /// Lexical, syntax or resolution errors; nothing was executed.
    StaticError,
    /// Execution started and was stopped by a fault.
    RuntimeError,
}

impl Outcome {
    /// Conventional process exit status (sysexits `EX_DATAERR` /
    /// `EX_SOFTWARE`).
    pub fn exit_code(self) -> i32 {
        match self {
            Outcome::Completed => 0,
            Outcome::StaticError => 65,
            Outcome::RuntimeError => 70,
        }
    }
}

/// Scan `source`, forwarding lexical errors to `reporter`.  Returns `None`
/// if there were any.
pub fn scan(source: &str, reporter: &mut dyn Reporter) -> Option<Vec<Token>> {
    let (tokens, errors) = Scanner::new(source).scan_all();

    for e in &errors {
        reporter.lex_error(e.line, &e.message);
    }

    errors.is_empty().then_some(tokens)
}

/// Scan and parse `source`.  The first syntax error is reported and ends
/// the parse.
pub fn parse(source: &str, reporter: &mut dyn Reporter) -> Option<Vec<Stmt>> {
    let tokens = scan(source, reporter)?;

    match Parser::new(tokens).parse() {
        Ok(statements) => Some(statements),
        Err(e) => {
            debug!("Parse debug: {}", e);
            reporter.error(&e.token, &e.message);
            None
        }
    }
}

pub struct Session {
    interpreter: Interpreter,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self::with_interpreter(Interpreter::new())
    }

    pub fn with_interpreter(interpreter: Interpreter) -> Self {
        info!("Session started");
        Self { interpreter }
    }

    pub fn interpreter(&self) -> &Interpreter {
        &self.interpreter
    }

    /// Run one program.  Globals it defines stay visible to later runs,
    /// even if this one faults.
    pub fn run(&mut self, source: &str, reporter: &mut dyn Reporter) -> Outcome {
        let Some(statements) = parse(source, reporter) else {
            return Outcome::StaticError;
        };

        let resolution = Resolver::new(reporter).resolve(&statements);
        if resolution.has_errors() {
            info!(
                "Skipping execution: {} resolution error(s)",
                resolution.errors.len()
            );
            return Outcome::StaticError;
        }

        if self
            .interpreter
            .interpret(&statements, resolution.locals, reporter)
        {
            Outcome::Completed
        } else {
            Outcome::RuntimeError
        }
    }

    /// Read `path` as UTF-8 source and [`run`](Self::run) it.
    pub fn run_file(&mut self, path: &Path, reporter: &mut dyn Reporter) -> Result<Outcome> {
        info!("Running file {:?}", path);

        let source = String::from_utf8(fs::read(path)?)?;
        Ok(self.run(&source, reporter))
    }

    /// Evaluate `source` as a single expression in the global scope.
    pub fn evaluate(
        &mut self,
        source: &str,
        reporter: &mut dyn Reporter,
    ) -> std::result::Result<Value, Outcome> {
        let tokens = scan(source, reporter).ok_or(Outcome::StaticError)?;

        let expr = Parser::new(tokens).parse_expression().map_err(|e| {
            reporter.error(&e.token, &e.message);
            Outcome::StaticError
        })?;

        // Outside any block every name is global.
        self.interpreter
            .evaluate_expression(&expr, Locals::new())
            .map_err(|e| {
                reporter.runtime_error(&e.message(), e.token());
                Outcome::RuntimeError
            })
    }
}
