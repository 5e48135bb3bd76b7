//! Centralised error hierarchy for the **rill interpreter**.
//!
//! Each pass owns one error type: the scanner produces [`LexError`], the
//! parser [`SyntaxError`], the resolver [`ResolveError`] and the evaluator
//! [`RuntimeError`].  [`RillError`] unifies them (plus I/O) behind one
//! `Result<T>` alias so the driver and the CLI can use `?` across passes.
//!
//! The module **does not** print diagnostics itself; that is the job of a
//! [`Reporter`](crate::diagnostics::Reporter).

use std::io;
use thiserror::Error;

use log::info;

use crate::token::{Token, TokenType};

/// Lexical (scanner) error with source line information.
#[derive(Debug, Error, Clone, PartialEq)]
#[error("[line {line}] Error: {message}")]
pub struct LexError {
    /// 1‑based line where the error occurred.
    pub line: usize,

    /// Human‑readable description.
    pub message: String,
}

impl LexError {
    pub fn new<S: Into<String>>(line: usize, msg: S) -> Self {
        let message: String = msg.into();

        info!("Creating Lex error: line={}, msg={}", line, message);

        LexError { line, message }
    }
}

/// Grammar violation.  Aborts the whole parse.
#[derive(Debug, Error, Clone, PartialEq)]
#[error("[line {}] Error{}: {message}", .token.line, location(.token))]
pub struct SyntaxError {
    /// The offending token.
    pub token: Token,
    pub message: String,
}

impl SyntaxError {
    pub fn new<S: Into<String>>(token: &Token, msg: S) -> Self {
        let message: String = msg.into();

        info!(
            "Creating Syntax error: line={}, msg={}",
            token.line, message
        );

        SyntaxError {
            token: token.clone(),
            message,
        }
    }
}

/// Static scoping violation found by the resolver.  Never fatal to the pass.
#[derive(Debug, Error, Clone, PartialEq)]
#[error("[line {}] Error{}: {message}", .token.line, location(.token))]
pub struct ResolveError {
    pub token: Token,
    pub message: String,
}

impl ResolveError {
    pub fn new<S: Into<String>>(token: &Token, msg: S) -> Self {
        let message: String = msg.into();

        info!(
            "Creating Resolve error: line={}, msg={}",
            token.line, message
        );

        ResolveError {
            token: token.clone(),
            message,
        }
    }
}

/// Fault raised while evaluating.  Unwinds to `Interpreter::interpret`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RuntimeError {
    /// Wrong operand, callee or receiver type.
    #[error("[line {}] TypeError: {message}", .token.line)]
    Type { message: String, token: Token },

    #[error("[line {}] UndefinedPropertyError: Undefined property '{}'.", .token.line, .token.lexeme)]
    UndefinedProperty { token: Token },

    #[error("[line {}] UndefinedVariableError: Undefined variable '{}'.", .token.line, .token.lexeme)]
    UndefinedVariable { token: Token },

    #[error("[line {}] NotAClassError: {message}", .token.line)]
    NotAClass { message: String, token: Token },

    #[error("[line {}] NotAnInstanceError: {message}", .token.line)]
    NotAnInstance { message: String, token: Token },

    /// `print` could not write to its output.
    #[error("failed to write output: {0}")]
    Output(#[from] io::Error),
}

impl RuntimeError {
    pub fn type_error<S: Into<String>>(token: &Token, msg: S) -> Self {
        RuntimeError::Type {
            message: msg.into(),
            token: token.clone(),
        }
    }

    pub fn undefined_variable(token: &Token) -> Self {
        RuntimeError::UndefinedVariable {
            token: token.clone(),
        }
    }

    pub fn undefined_property(token: &Token) -> Self {
        RuntimeError::UndefinedProperty {
            token: token.clone(),
        }
    }

    pub fn not_a_class<S: Into<String>>(token: &Token, msg: S) -> Self {
        RuntimeError::NotAClass {
            message: msg.into(),
            token: token.clone(),
        }
    }

    pub fn not_an_instance<S: Into<String>>(token: &Token, msg: S) -> Self {
        RuntimeError::NotAnInstance {
            message: msg.into(),
            token: token.clone(),
        }
    }

    /// Token at the fault site, if the fault has one.
    pub fn token(&self) -> Option<&Token> {
        match self {
            RuntimeError::Type { token, .. }
            | RuntimeError::UndefinedProperty { token }
            | RuntimeError::UndefinedVariable { token }
            | RuntimeError::NotAClass { token, .. }
            | RuntimeError::NotAnInstance { token, .. } => Some(token),
            RuntimeError::Output(_) => None,
        }
    }

    /// Description without the `[line N]` prefix.
    pub fn message(&self) -> String {
        match self {
            RuntimeError::Type { message, .. } => format!("TypeError: {message}"),
            RuntimeError::UndefinedProperty { token } => {
                format!("UndefinedPropertyError: Undefined property '{}'.", token.lexeme)
            }
            RuntimeError::UndefinedVariable { token } => {
                format!("UndefinedVariableError: Undefined variable '{}'.", token.lexeme)
            }
            RuntimeError::NotAClass { message, .. } => format!("NotAClassError: {message}"),
            RuntimeError::NotAnInstance { message, .. } => {
                format!("NotAnInstanceError: {message}")
            }
            RuntimeError::Output(e) => format!("failed to write output: {e}"),
        }
    }
}

/// Canonical error type used by the driver and the CLI.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RillError {
    #[error(transparent)]
    Lex(#[from] LexError),

    #[error(transparent)]
    Syntax(#[from] SyntaxError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    /// Wrapper around `std::io::Error` (transparent).  Enables `?` on I/O ops.
    #[error(transparent)]
    Io(#[from] io::Error),

    /// UTF‑8 decoding failure when ingesting external text.
    #[error(transparent)]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Crate‑wide `Result` alias.
pub type Result<T> = std::result::Result<T, RillError>;

/// `" at 'x'"`, `" at end"` or nothing for line breaks.
pub(crate) fn location(token: &Token) -> String {
    match token.token_type {
        TokenType::EOF => " at end".to_string(),
        TokenType::NEWLINE => " at line break".to_string(),
        _ => format!(" at '{}'", token.lexeme),
    }
}
