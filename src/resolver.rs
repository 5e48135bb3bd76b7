//! Static resolver pass.
//!
//! One walk over the statement list does three things:
//! 1. Build lexical scopes (stack of `HashMap<&str,bool>` tracking declared/defined).
//! 2. Report static errors (redeclaration, read in own initializer, misplaced
//!    `return`, `self` or `super`, self-inheritance).  Errors are reported and
//!    the walk carries on.
//! 3. Record, for each name-bearing expression, how many scopes up its
//!    binding lives.  Names found in no scope get no entry and are looked up
//!    in the globals at run time.
//!
//! The scope pushes here mirror, one for one, the environments the
//! interpreter creates: blocks, `if` branches, the `for` loop scope and its
//! per-iteration body scope, function calls, the `super` scope of a subclass
//! and the `self` scope of a bound method.

use std::collections::HashMap;

use log::{debug, info};

use crate::diagnostics::Reporter;
use crate::error::ResolveError;
use crate::expr::{Expr, ExprId};
use crate::stmt::{ClassDecl, FnDecl, Stmt};
use crate::token::Token;

/// Distance table produced by the resolver and consumed by the interpreter.
///
/// Entries recorded outside any function body are also listed as
/// transient: that code runs once, so the interpreter drops them after the
/// run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Locals {
    distances: HashMap<ExprId, usize>,
    transient: Vec<ExprId>,
}

impl Locals {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: ExprId) -> Option<usize> {
        self.distances.get(&id).copied()
    }

    pub fn insert(&mut self, id: ExprId, depth: usize) {
        self.distances.insert(id, depth);
    }

    pub fn insert_transient(&mut self, id: ExprId, depth: usize) {
        self.distances.insert(id, depth);
        self.transient.push(id);
    }

    pub fn extend(&mut self, other: Locals) {
        self.distances.extend(other.distances);
        self.transient.extend(other.transient);
    }

    /// Hand over the transient ids, leaving the distances in place.
    pub fn take_transient(&mut self) -> Vec<ExprId> {
        std::mem::take(&mut self.transient)
    }

    pub fn forget(&mut self, ids: &[ExprId]) {
        for id in ids {
            self.distances.remove(id);
        }
    }

    pub fn len(&self) -> usize {
        self.distances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.distances.is_empty()
    }
}

/// What kind of function body we are in.  Used to validate `return`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum FunctionKind {
    None,
    Function,
    Method,
    Initializer,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum ClassKind {
    None,
    Class,
    Subclass,
}

/// Enclosing function/class kinds, passed down the walk by value.
#[derive(Copy, Clone, Debug)]
struct Context {
    function: FunctionKind,
    class: ClassKind,
}

impl Context {
    const TOP: Context = Context {
        function: FunctionKind::None,
        class: ClassKind::None,
    };
}

/// Outcome of one resolver pass.
#[derive(Debug, Default)]
pub struct Resolution {
    pub locals: Locals,
    pub errors: Vec<ResolveError>,
}

impl Resolution {
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

pub struct Resolver<'a, 'r> {
    reporter: &'r mut dyn Reporter,
    scopes: Vec<HashMap<&'a str, bool>>, // false=declared, true=defined
    locals: Locals,
    errors: Vec<ResolveError>,
}

impl<'a, 'r> Resolver<'a, 'r> {
    pub fn new(reporter: &'r mut dyn Reporter) -> Self {
        info!("Resolver instantiated");

        Resolver {
            reporter,
            scopes: Vec::new(),
            locals: Locals::new(),
            errors: Vec::new(),
        }
    }

    /// Walk all top‑level statements.
    pub fn resolve(mut self, statements: &'a [Stmt]) -> Resolution {
        info!(
            "Beginning resolve pass over {} statement(s)",
            statements.len()
        );

        for stmt in statements {
            self.resolve_stmt(stmt, Context::TOP);
        }

        info!(
            "Resolve pass finished: {} local(s), {} error(s)",
            self.locals.len(),
            self.errors.len()
        );

        Resolution {
            locals: self.locals,
            errors: self.errors,
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Statement resolution
    // ─────────────────────────────────────────────────────────────────────────

    fn resolve_stmt(&mut self, stmt: &'a Stmt, ctx: Context) {
        match stmt {
            Stmt::Expression(expr) | Stmt::Print(expr) => self.resolve_expr(expr, ctx),

            Stmt::Variable { name, initializer } => {
                self.declare(name);
                if let Some(expr) = initializer {
                    self.resolve_expr(expr, ctx);
                }
                self.define(name);
            }

            Stmt::Block(statements) => self.resolve_scoped(statements, ctx),

            Stmt::Fn(decl) => {
                // the name is visible inside its own body
                self.declare(&decl.name);
                self.define(&decl.name);
                self.resolve_function(decl, FunctionKind::Function, ctx);
            }

            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.resolve_expr(condition, ctx);
                self.resolve_scoped(then_branch, ctx);
                if let Some(else_branch) = else_branch {
                    self.resolve_scoped(else_branch, ctx);
                }
            }

            Stmt::For {
                initializer,
                condition,
                increment,
                body,
            } => {
                // loop scope for the initializer, then one for the body
                self.begin_scope();
                if let Some(init) = initializer {
                    self.resolve_stmt(init, ctx);
                }
                self.resolve_expr(condition, ctx);
                if let Some(inc) = increment {
                    self.resolve_expr(inc, ctx);
                }
                self.resolve_scoped(body, ctx);
                self.end_scope();
            }

            Stmt::Return { keyword, value } => {
                if ctx.function == FunctionKind::None {
                    self.error(keyword, "Can't return from top-level code.");
                }
                if let Some(expr) = value {
                    if ctx.function == FunctionKind::Initializer {
                        self.error(keyword, "Can't return a value from an initializer.");
                    }
                    self.resolve_expr(expr, ctx);
                }
            }

            Stmt::Class(class) => self.resolve_class(class, ctx),
        }
    }

    fn resolve_class(&mut self, class: &'a ClassDecl, ctx: Context) {
        self.declare(&class.name);
        self.define(&class.name);

        let mut class_kind = ClassKind::Class;

        if let Some(superclass) = &class.superclass {
            if let Expr::Var { name, .. } = superclass {
                if name.lexeme == class.name.lexeme {
                    self.error(name, "A class can't inherit from itself.");
                }
            }

            self.resolve_expr(superclass, ctx);

            class_kind = ClassKind::Subclass;
            self.begin_scope();
            self.bind_implicit("super");
        }

        self.begin_scope();
        self.bind_implicit("self");

        for method in &class.methods {
            let kind = if method.name.lexeme == "init" {
                FunctionKind::Initializer
            } else {
                FunctionKind::Method
            };

            self.resolve_function(
                method,
                kind,
                Context {
                    function: kind,
                    class: class_kind,
                },
            );
        }

        self.end_scope();

        if class.superclass.is_some() {
            self.end_scope();
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Expression resolution
    // ─────────────────────────────────────────────────────────────────────────

    fn resolve_expr(&mut self, expr: &'a Expr, ctx: Context) {
        match expr {
            Expr::Literal(_) => {}

            Expr::Grouping(inner) => self.resolve_expr(inner, ctx),

            Expr::Unary { right, .. } => self.resolve_expr(right, ctx),

            Expr::Binary { left, right, .. } | Expr::Logical { left, right, .. } => {
                self.resolve_expr(left, ctx);
                self.resolve_expr(right, ctx);
            }

            Expr::Var { id, name } => {
                if self
                    .scopes
                    .last()
                    .is_some_and(|scope| scope.get(name.lexeme.as_str()) == Some(&false))
                {
                    self.error(name, "Can't read local variable in its own initializer.");
                }
                self.resolve_local(*id, name, ctx);
            }

            Expr::Assign { id, name, value } => {
                self.resolve_expr(value, ctx);
                self.resolve_local(*id, name, ctx);
            }

            Expr::Call {
                callee, arguments, ..
            } => {
                self.resolve_expr(callee, ctx);
                for arg in arguments {
                    self.resolve_expr(arg, ctx);
                }
            }

            Expr::Get { object, .. } => self.resolve_expr(object, ctx),

            Expr::Set { object, value, .. } => {
                self.resolve_expr(object, ctx);
                self.resolve_expr(value, ctx);
            }

            Expr::SelfRef { id, keyword } => {
                if ctx.class == ClassKind::None {
                    self.error(keyword, "Can't use 'self' outside of a class.");
                    return;
                }
                self.resolve_local(*id, keyword, ctx);
            }

            Expr::Super { id, keyword, .. } => {
                match ctx.class {
                    ClassKind::None => {
                        self.error(keyword, "Can't use 'super' outside of a class.");
                        return;
                    }
                    ClassKind::Class => {
                        self.error(keyword, "Can't use 'super' in a class with no superclass.");
                        return;
                    }
                    ClassKind::Subclass => {}
                }
                self.resolve_local(*id, keyword, ctx);
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Scope helpers
    // ─────────────────────────────────────────────────────────────────────────

    /// Fresh scope for parameters + body.  The body shares the parameter
    /// scope: a call creates exactly one environment.
    fn resolve_function(&mut self, decl: &'a FnDecl, kind: FunctionKind, ctx: Context) {
        let inner = Context {
            function: kind,
            ..ctx
        };

        self.begin_scope();
        for param in &decl.params {
            self.declare(param);
            self.define(param);
        }
        for stmt in &decl.body {
            self.resolve_stmt(stmt, inner);
        }
        self.end_scope();
    }

    fn resolve_scoped(&mut self, statements: &'a [Stmt], ctx: Context) {
        self.begin_scope();
        for stmt in statements {
            self.resolve_stmt(stmt, ctx);
        }
        self.end_scope();
    }

    #[inline]
    fn begin_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    #[inline]
    fn end_scope(&mut self) {
        self.scopes.pop();
    }

    fn declare(&mut self, name: &'a Token) {
        let Some(scope) = self.scopes.last_mut() else {
            return;
        };

        if scope.insert(name.lexeme.as_str(), false).is_some() {
            self.error(name, "Already a variable with this name in this scope.");
        }
    }

    fn define(&mut self, name: &'a Token) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.lexeme.as_str(), true);
        }
    }

    fn bind_implicit(&mut self, name: &'static str) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name, true);
        }
    }

    /// Record this occurrence as a local at depth `d`, or leave it to the
    /// globals when no scope declares it.
    fn resolve_local(&mut self, id: ExprId, name: &Token, ctx: Context) {
        let name = name.lexeme.as_str();

        for (depth, scope) in self.scopes.iter().rev().enumerate() {
            if scope.contains_key(name) {
                debug!("Resolved '{}' at depth {}", name, depth);
                if ctx.function == FunctionKind::None {
                    self.locals.insert_transient(id, depth);
                } else {
                    self.locals.insert(id, depth);
                }
                return;
            }
        }

        debug!("Resolved '{}' as global", name);
    }

    fn error(&mut self, token: &Token, message: &str) {
        self.reporter.error(token, message);
        self.errors.push(ResolveError::new(token, message));
    }
}
