use std::sync::atomic::{AtomicU32, Ordering};

use serde::Serialize;

use crate::token::Token;

/// Identity of a name-bearing expression node.
///
/// Two syntactically identical references at different places get
/// different ids, so each resolves on its own.  Ids are unique for the
/// whole process: a host that parses many chunks into one interpreter
/// never sees two nodes collide in the distance table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ExprId(u32);

impl ExprId {
    pub fn fresh() -> Self {
        static NEXT: AtomicU32 = AtomicU32::new(0);

        ExprId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// A literal constant as written in the source.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum LiteralValue {
    Nil,
    Bool(bool),
    Number(f64),
    Str(String),
}

#[derive(Debug, Serialize)]
pub enum Expr {
    // a + b, a == b, ...
    Binary {
        left: Box<Expr>,
        operator: Token,
        right: Box<Expr>,
    },

    // -a, !a
    Unary {
        operator: Token,
        right: Box<Expr>,
    },

    Literal(LiteralValue),

    // ( inner )
    Grouping(Box<Expr>),

    // variable read
    Var {
        id: ExprId,
        name: Token,
    },

    // name = value
    Assign {
        id: ExprId,
        name: Token,
        value: Box<Expr>,
    },

    // callee(arguments...); `paren` is the closing ')'
    Call {
        callee: Box<Expr>,
        paren: Token,
        arguments: Vec<Expr>,
    },

    // short-circuiting `and` / `or`
    Logical {
        left: Box<Expr>,
        operator: Token,
        right: Box<Expr>,
    },

    // object.name
    Get {
        object: Box<Expr>,
        name: Token,
    },

    // object.name = value
    Set {
        object: Box<Expr>,
        name: Token,
        value: Box<Expr>,
    },

    // `self`
    SelfRef {
        id: ExprId,
        keyword: Token,
    },

    // super.method
    Super {
        id: ExprId,
        keyword: Token,
        method: Token,
    },
}

impl Expr {
    pub fn var(name: Token) -> Self {
        Expr::Var {
            id: ExprId::fresh(),
            name,
        }
    }

    /// Resolution key, for the node kinds that name a binding.
    pub fn id(&self) -> Option<ExprId> {
        match self {
            Expr::Var { id, .. }
            | Expr::Assign { id, .. }
            | Expr::SelfRef { id, .. }
            | Expr::Super { id, .. } => Some(*id),
            _ => None,
        }
    }
}
