#![allow(dead_code)]

use std::cell::RefCell;
use std::io::{self, Write};
use std::rc::Rc;

use rill::diagnostics::Collector;
use rill::environment::Environments;
use rill::interpreter::Interpreter;
use rill::stmt::Stmt;
use rill::{Outcome, Session};

/// `print` target that the test can read back after the run.
#[derive(Clone, Default)]
pub struct SharedBuf(Rc<RefCell<Vec<u8>>>);

impl SharedBuf {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.borrow()).into_owned()
    }

    pub fn lines(&self) -> Vec<String> {
        self.contents().lines().map(str::to_string).collect()
    }
}

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

pub struct Run {
    pub outcome: Outcome,
    pub output: Vec<String>,
    pub diagnostics: Collector,
}

pub fn session() -> (Session, SharedBuf) {
    let buf = SharedBuf::default();
    let session = Session::with_interpreter(Interpreter::with_output(Box::new(buf.clone())));
    (session, buf)
}

/// A session whose arena collects once `threshold` scopes are live.
pub fn session_with_threshold(threshold: usize) -> (Session, SharedBuf) {
    let buf = SharedBuf::default();
    let interpreter = Interpreter::with_environments(
        Box::new(buf.clone()),
        Environments::with_threshold(threshold),
    );
    (Session::with_interpreter(interpreter), buf)
}

pub fn run(source: &str) -> Run {
    let (mut session, buf) = session();
    let mut diagnostics = Collector::new();
    let outcome = session.run(source, &mut diagnostics);

    Run {
        outcome,
        output: buf.lines(),
        diagnostics,
    }
}

/// Run a program that must complete, returning its printed lines.
pub fn run_ok(source: &str) -> Vec<String> {
    let result = run(source);
    assert_eq!(
        result.outcome,
        Outcome::Completed,
        "diagnostics: {:?}",
        result.diagnostics.messages()
    );
    result.output
}

pub fn parse(source: &str) -> Vec<Stmt> {
    let mut diagnostics = Collector::new();
    match rill::parse(source, &mut diagnostics) {
        Some(statements) => statements,
        None => panic!("parse failed: {:?}", diagnostics.messages()),
    }
}
