//! Diagnostics sink.
//!
//! The passes never print.  Static findings go through
//! [`Reporter::error`] with the offending token, runtime faults through
//! [`Reporter::runtime_error`] with an optional token.  Hosts pick the sink:
//! the CLI writes to stderr, tests and embedders collect.

use std::fmt;

use log::{debug, warn};
use serde::Serialize;

use crate::error::location;
use crate::token::Token;

pub trait Reporter {
    /// Scanner error; there is no token yet, only a line.
    fn lex_error(&mut self, line: usize, message: &str);

    /// Parse failure or resolver finding at `token`.
    fn error(&mut self, token: &Token, message: &str);

    /// Fault that stopped a run.
    fn runtime_error(&mut self, message: &str, token: Option<&Token>);
}

/// Which pass produced a [`Diagnostic`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Phase {
    Lex,
    Static,
    Runtime,
}

/// A reported problem, already rendered.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    pub phase: Phase,
    pub line: Option<usize>,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line {
            Some(line) => write!(f, "[line {}] {}", line, self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

/// Keeps every diagnostic in memory.
#[derive(Debug, Default)]
pub struct Collector {
    pub diagnostics: Vec<Diagnostic>,
}

impl Collector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self, phase: Phase) -> usize {
        self.diagnostics.iter().filter(|d| d.phase == phase).count()
    }

    pub fn messages(&self) -> Vec<String> {
        self.diagnostics.iter().map(|d| d.message.clone()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }
}

impl Reporter for Collector {
    fn lex_error(&mut self, line: usize, message: &str) {
        self.diagnostics.push(Diagnostic {
            phase: Phase::Lex,
            line: Some(line),
            message: format!("Error: {message}"),
        });
    }

    fn error(&mut self, token: &Token, message: &str) {
        debug!("Collected static error at line {}: {}", token.line, message);

        self.diagnostics.push(Diagnostic {
            phase: Phase::Static,
            line: Some(token.line),
            message: format!("Error{}: {}", location(token), message),
        });
    }

    fn runtime_error(&mut self, message: &str, token: Option<&Token>) {
        debug!("Collected runtime error: {}", message);

        self.diagnostics.push(Diagnostic {
            phase: Phase::Runtime,
            line: token.map(|t| t.line),
            message: message.to_string(),
        });
    }
}

/// Writes diagnostics to stderr and remembers what kind was seen, so the
/// CLI can choose its exit code.
#[derive(Debug, Default)]
pub struct StderrReporter {
    pub had_error: bool,
    pub had_runtime_error: bool,
}

impl Reporter for StderrReporter {
    fn lex_error(&mut self, line: usize, message: &str) {
        warn!("Lex error on line {}: {}", line, message);

        self.had_error = true;
        eprintln!("[line {line}] Error: {message}");
    }

    fn error(&mut self, token: &Token, message: &str) {
        warn!("Static error on line {}: {}", token.line, message);

        self.had_error = true;
        eprintln!("[line {}] Error{}: {}", token.line, location(token), message);
    }

    fn runtime_error(&mut self, message: &str, token: Option<&Token>) {
        warn!("Runtime error: {}", message);

        self.had_runtime_error = true;
        match token {
            Some(token) => eprintln!("{message}\n[line {}]", token.line),
            None => eprintln!("{message}"),
        }
    }
}
