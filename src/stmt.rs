use std::rc::Rc;

use serde::Serialize;

use crate::expr::Expr;
use crate::token::Token;

/// A named function: top-level/nested `fn`, or a class method.
///
/// Shared (`Rc`) between the AST and every function value built from it.
#[derive(Debug, Serialize)]
pub struct FnDecl {
    pub name: Token,
    pub params: Vec<Token>,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Serialize)]
pub struct ClassDecl {
    pub name: Token,

    /// Always an `Expr::Var` when present.
    pub superclass: Option<Expr>,

    pub methods: Vec<Rc<FnDecl>>,
}

#[derive(Debug, Serialize)]
pub enum Stmt {
    Expression(Expr),

    Print(Expr),

    // let name (= initializer)?
    Variable {
        name: Token,
        initializer: Option<Expr>,
    },

    Block(Vec<Stmt>),

    Fn(Rc<FnDecl>),

    // Each branch runs in its own scope.
    If {
        condition: Expr,
        then_branch: Vec<Stmt>,
        else_branch: Option<Vec<Stmt>>,
    },

    // The initializer is a `Variable` declared in a loop scope; the body
    // gets a fresh scope per iteration.
    For {
        initializer: Option<Box<Stmt>>,
        condition: Expr,
        increment: Option<Expr>,
        body: Vec<Stmt>,
    },

    Return {
        keyword: Token,
        value: Option<Expr>,
    },

    Class(ClassDecl),
}
