use std::cell::RefCell;
use std::rc::Rc;

use chrono::Utc;
use log::debug;

use crate::class::Instance;
use crate::environment::{EnvId, Environments};
use crate::stmt::FnDecl;
use crate::value::Value;

/// A closure: a declaration plus the scope it was declared in.
#[derive(Debug)]
pub struct Function {
    decl: Rc<FnDecl>,
    closure: EnvId,
    is_initializer: bool,
}

impl Function {
    /// Callers must have recorded `closure` with [`Environments::capture`].
    pub fn new(decl: Rc<FnDecl>, closure: EnvId, is_initializer: bool) -> Self {
        Self {
            decl,
            closure,
            is_initializer,
        }
    }

    pub fn name(&self) -> &str {
        &self.decl.name.lexeme
    }

    pub fn decl(&self) -> &FnDecl {
        &self.decl
    }

    pub fn closure(&self) -> EnvId {
        self.closure
    }

    pub fn is_initializer(&self) -> bool {
        self.is_initializer
    }

    /// A copy of this method whose scope chain starts with a scope holding
    /// only `self -> instance`.
    pub fn bind(&self, instance: Rc<RefCell<Instance>>, envs: &mut Environments) -> Function {
        debug!("Binding method '{}'", self.name());

        let env = envs.alloc(Some(self.closure));
        envs.define(env, "self", Value::Instance(instance));
        envs.capture(env);

        Function {
            decl: self.decl.clone(),
            closure: env,
            is_initializer: self.is_initializer,
        }
    }
}

/// Functions provided by the host rather than by source code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Native {
    /// Wall-clock time in milliseconds since the Unix epoch.
    Time,
}

impl Native {
    pub const ALL: [Native; 1] = [Native::Time];

    pub fn name(&self) -> &'static str {
        match self {
            Native::Time => "time",
        }
    }

    pub fn call(&self, _arguments: &[Value]) -> Value {
        match self {
            Native::Time => Value::Number(Utc::now().timestamp_millis() as f64),
        }
    }
}
