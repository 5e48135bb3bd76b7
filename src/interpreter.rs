use std::cell::RefCell;
use std::collections::HashMap;
use std::io::{self, Write};
use std::rc::Rc;

use log::{debug, info};

use crate::class::{Class, Instance, INITIALIZER};
use crate::diagnostics::Reporter;
use crate::environment::{EnvId, Environments};
use crate::error::RuntimeError;
use crate::expr::{Expr, ExprId, LiteralValue};
use crate::function::{Function, Native};
use crate::resolver::Locals;
use crate::stmt::{ClassDecl, Stmt};
use crate::token::{Token, TokenType};
use crate::value::Value;

/// Convenient alias for interpreter results.
pub type IResult<T> = Result<T, RuntimeError>;

/// How a statement finished.  `Return` travels up through blocks and loops
/// until the enclosing call turns it back into a value.
#[derive(Debug)]
enum Flow {
    Normal,
    Return(Value),
}

pub struct Interpreter {
    envs: Environments,
    globals: EnvId,
    locals: Locals,
    /// Scopes of the blocks, loops and calls being executed, innermost last.
    frames: Vec<EnvId>,
    /// Objects held by expressions that are still evaluating their operands.
    temps: Vec<Value>,
    out: Box<dyn Write>,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    /// An interpreter printing to stdout, with the native functions defined.
    pub fn new() -> Self {
        Self::with_output(Box::new(io::stdout()))
    }

    pub fn with_output(out: Box<dyn Write>) -> Self {
        Self::with_environments(out, Environments::new())
    }

    /// `envs` must be empty; it becomes the home of the global scope.
    pub fn with_environments(out: Box<dyn Write>, mut envs: Environments) -> Self {
        info!("Initializing Interpreter");

        let globals = envs.alloc(None);
        envs.capture(globals);

        for native in Native::ALL {
            debug!("Defining native function '{}'", native.name());
            envs.define(globals, native.name(), Value::Native(native));
        }

        Self {
            envs,
            globals,
            locals: Locals::new(),
            frames: vec![globals],
            temps: Vec::new(),
            out,
        }
    }

    pub fn environments(&self) -> &Environments {
        &self.envs
    }

    /// Resolved distances kept for code that can still run.
    pub fn locals(&self) -> &Locals {
        &self.locals
    }

    /// Current value of a global, if defined.
    pub fn global(&self, name: &str) -> Option<Value> {
        self.envs.get(self.globals, name)
    }

    /// Run a program.  A runtime fault is reported to `reporter` and ends
    /// the run; globals defined before the fault stay defined.  Returns
    /// whether the run completed.
    pub fn interpret(
        &mut self,
        statements: &[Stmt],
        mut locals: Locals,
        reporter: &mut dyn Reporter,
    ) -> bool {
        debug!("Interpreting {} statements", statements.len());

        // Top-level code runs once; only function bodies need their
        // distances after this run.
        let transient = locals.take_transient();
        self.locals.extend(locals);

        let mut completed = true;

        for stmt in statements {
            self.maybe_collect();

            match self.execute(stmt, self.globals) {
                Ok(Flow::Normal) => {}
                Ok(Flow::Return(_)) => break,
                Err(e) => {
                    debug!("Runtime debug: {}", e);
                    reporter.runtime_error(&e.message(), e.token());
                    completed = false;
                    break;
                }
            }
        }

        self.locals.forget(&transient);
        self.frames.truncate(1);
        self.temps.clear();

        if let Err(e) = self.out.flush() {
            let e = RuntimeError::from(e);
            reporter.runtime_error(&e.message(), None);
            completed = false;
        }

        if completed {
            info!("Interpretation completed successfully");
        }

        completed
    }

    /// Evaluate one expression in the global scope.
    pub fn evaluate_expression(&mut self, expr: &Expr, locals: Locals) -> IResult<Value> {
        self.locals.extend(locals);
        let result = self.evaluate(expr, self.globals);
        self.frames.truncate(1);
        self.temps.clear();
        result
    }

    /// Collect if the arena has grown enough.  Only called before a
    /// statement or a loop iteration, where every live scope is reachable
    /// from `frames` or `temps`.
    fn maybe_collect(&mut self) {
        if self.envs.should_collect() {
            self.envs.collect(&self.frames, &self.temps);
        }
    }

    /// Allocate a scope under `enclosing` and make it a collection root.
    fn push_frame(&mut self, enclosing: EnvId) -> EnvId {
        let env = self.envs.alloc(Some(enclosing));
        self.frames.push(env);
        env
    }

    fn pop_frame(&mut self, env: EnvId) {
        self.frames.pop();
        self.envs.release(env);
    }

    /// Keep `value` alive across the evaluation of sibling operands.
    fn hold(&mut self, value: &Value) {
        if matches!(
            value,
            Value::Function(_) | Value::Class(_) | Value::Instance(_)
        ) {
            self.temps.push(value.clone());
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Statements
    // ─────────────────────────────────────────────────────────────────────────

    fn execute(&mut self, stmt: &Stmt, env: EnvId) -> IResult<Flow> {
        match stmt {
            Stmt::Expression(expr) => {
                self.evaluate(expr, env)?;
            }

            Stmt::Print(expr) => {
                let value = self.evaluate(expr, env)?;
                writeln!(self.out, "{}", value)?;
                debug!("Printed value: {}", value);
            }

            Stmt::Variable { name, initializer } => {
                let value = match initializer {
                    Some(expr) => self.evaluate(expr, env)?,
                    None => Value::Nil,
                };
                debug!("Defining variable '{}' = {}", name.lexeme, value);
                self.envs.define(env, &name.lexeme, value);
            }

            Stmt::Block(statements) => return self.execute_block(statements, env),

            Stmt::Fn(decl) => {
                debug!("Defining function '{}'", decl.name.lexeme);
                self.envs.capture(env);
                let function = Function::new(decl.clone(), env, false);
                self.envs
                    .define(env, &decl.name.lexeme, Value::Function(Rc::new(function)));
            }

            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.evaluate(condition, env)?.is_truthy() {
                    return self.execute_block(then_branch, env);
                } else if let Some(else_branch) = else_branch {
                    return self.execute_block(else_branch, env);
                }
            }

            Stmt::For {
                initializer,
                condition,
                increment,
                body,
            } => {
                let loop_env = self.push_frame(env);
                let result =
                    self.run_loop(initializer.as_deref(), condition, increment.as_ref(), body, loop_env);
                self.pop_frame(loop_env);
                return result;
            }

            Stmt::Return { value, .. } => {
                let value = match value {
                    Some(expr) => self.evaluate(expr, env)?,
                    None => Value::Nil,
                };
                debug!("Returning value: {}", value);
                return Ok(Flow::Return(value));
            }

            Stmt::Class(decl) => self.declare_class(decl, env)?,
        }

        Ok(Flow::Normal)
    }

    /// Run `statements` in a fresh scope chained to `enclosing`.
    fn execute_block(&mut self, statements: &[Stmt], enclosing: EnvId) -> IResult<Flow> {
        let env = self.push_frame(enclosing);
        let result = self.execute_all(statements, env);
        self.pop_frame(env);
        result
    }

    fn execute_all(&mut self, statements: &[Stmt], env: EnvId) -> IResult<Flow> {
        for stmt in statements {
            self.maybe_collect();
            if let Flow::Return(value) = self.execute(stmt, env)? {
                return Ok(Flow::Return(value));
            }
        }
        Ok(Flow::Normal)
    }

    fn run_loop(
        &mut self,
        initializer: Option<&Stmt>,
        condition: &Expr,
        increment: Option<&Expr>,
        body: &[Stmt],
        loop_env: EnvId,
    ) -> IResult<Flow> {
        if let Some(init) = initializer {
            self.execute(init, loop_env)?;
        }

        loop {
            self.maybe_collect();
            if !self.evaluate(condition, loop_env)?.is_truthy() {
                break;
            }
            if let Flow::Return(value) = self.execute_block(body, loop_env)? {
                return Ok(Flow::Return(value));
            }
            if let Some(increment) = increment {
                self.evaluate(increment, loop_env)?;
            }
        }

        Ok(Flow::Normal)
    }

    fn declare_class(&mut self, decl: &ClassDecl, env: EnvId) -> IResult<()> {
        debug!("Declaring class '{}'", decl.name.lexeme);

        let superclass = match &decl.superclass {
            Some(expr) => match self.evaluate(expr, env)? {
                Value::Class(class) => Some(class),
                other => {
                    let token = match expr {
                        Expr::Var { name, .. } => name,
                        _ => &decl.name,
                    };
                    return Err(RuntimeError::not_a_class(
                        token,
                        format!("Superclass must be a class, not {}.", other.type_name()),
                    ));
                }
            },
            None => None,
        };

        // Visible (as nil) while the methods are being built.
        self.envs.define(env, &decl.name.lexeme, Value::Nil);

        let method_env = match &superclass {
            Some(superclass) => {
                let super_env = self.envs.alloc(Some(env));
                self.envs
                    .define(super_env, "super", Value::Class(superclass.clone()));
                super_env
            }
            None => env,
        };
        self.envs.capture(method_env);

        let methods: HashMap<String, Rc<Function>> = decl
            .methods
            .iter()
            .map(|method| {
                let name = method.name.lexeme.clone();
                let is_initializer = name == INITIALIZER;
                (name, Rc::new(Function::new(method.clone(), method_env, is_initializer)))
            })
            .collect();

        let class = Class::new(decl.name.lexeme.as_str(), methods, superclass);
        self.envs
            .assign(env, &decl.name.lexeme, Value::Class(Rc::new(class)));

        info!("Class '{}' declared", decl.name.lexeme);

        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Expressions
    // ─────────────────────────────────────────────────────────────────────────

    fn evaluate(&mut self, expr: &Expr, env: EnvId) -> IResult<Value> {
        match expr {
            Expr::Literal(literal) => Ok(match literal {
                LiteralValue::Nil => Value::Nil,
                LiteralValue::Bool(b) => Value::Bool(*b),
                LiteralValue::Number(n) => Value::Number(*n),
                LiteralValue::Str(s) => Value::String(s.clone()),
            }),

            Expr::Grouping(inner) => self.evaluate(inner, env),

            Expr::Unary { operator, right } => {
                let right = self.evaluate(right, env)?;
                self.unary(operator, right)
            }

            Expr::Binary {
                left,
                operator,
                right,
            } => {
                let left = self.evaluate(left, env)?;

                let mark = self.temps.len();
                self.hold(&left);
                let right = self.evaluate(right, env);
                self.temps.truncate(mark);

                self.binary(operator, left, right?)
            }

            Expr::Logical {
                left,
                operator,
                right,
            } => {
                let left = self.evaluate(left, env)?;
                let short_circuit = if operator.token_type == TokenType::OR {
                    left.is_truthy()
                } else {
                    !left.is_truthy()
                };
                if short_circuit {
                    return Ok(left);
                }
                self.evaluate(right, env)
            }

            Expr::Var { id, name } => self.look_up(*id, name, env),

            Expr::Assign { id, name, value } => {
                let value = self.evaluate(value, env)?;
                let assigned = match self.locals.get(*id) {
                    Some(distance) => {
                        self.envs
                            .assign_at(env, distance, &name.lexeme, value.clone())
                    }
                    None => self.envs.assign(self.globals, &name.lexeme, value.clone()),
                };
                if !assigned {
                    return Err(RuntimeError::undefined_variable(name));
                }
                Ok(value)
            }

            Expr::Call {
                callee,
                paren,
                arguments,
            } => {
                let callee = self.evaluate(callee, env)?;
                if !matches!(
                    callee,
                    Value::Function(_) | Value::Native(_) | Value::Class(_)
                ) {
                    return Err(not_callable(paren, &callee));
                }

                let mark = self.temps.len();
                self.hold(&callee);

                let mut args = Vec::with_capacity(arguments.len());
                for arg in arguments {
                    match self.evaluate(arg, env) {
                        Ok(arg) => {
                            self.hold(&arg);
                            args.push(arg);
                        }
                        Err(e) => {
                            self.temps.truncate(mark);
                            return Err(e);
                        }
                    }
                }

                let result = self.call_value(callee, args, paren);
                self.temps.truncate(mark);
                result
            }

            Expr::Get { object, name } => match self.evaluate(object, env)? {
                Value::Instance(instance) => self.get_property(&instance, name),
                other => Err(RuntimeError::type_error(
                    name,
                    format!("Only instances have properties, not {}.", other.type_name()),
                )),
            },

            Expr::Set {
                object,
                name,
                value,
            } => {
                let object = self.evaluate(object, env)?;
                let Value::Instance(instance) = &object else {
                    return Err(RuntimeError::type_error(name, "Only instances have fields."));
                };

                let mark = self.temps.len();
                self.hold(&object);
                let value = self.evaluate(value, env);
                self.temps.truncate(mark);

                let value = value?;
                instance.borrow_mut().set_field(&name.lexeme, value.clone());
                Ok(value)
            }

            Expr::SelfRef { id, keyword } => self.look_up(*id, keyword, env),

            Expr::Super {
                id,
                keyword,
                method,
            } => self.super_method(*id, keyword, method, env),
        }
    }

    fn look_up(&self, id: ExprId, name: &Token, env: EnvId) -> IResult<Value> {
        let value = match self.locals.get(id) {
            Some(distance) => self.envs.get_at(env, distance, &name.lexeme),
            None => self.envs.get(self.globals, &name.lexeme),
        };

        value.ok_or_else(|| RuntimeError::undefined_variable(name))
    }

    fn unary(&self, operator: &Token, right: Value) -> IResult<Value> {
        match (&operator.token_type, right) {
            (TokenType::MINUS, Value::Number(n)) => Ok(Value::Number(-n)),
            (TokenType::MINUS, other) => Err(RuntimeError::type_error(
                operator,
                format!("Operand must be a number, not {}.", other.type_name()),
            )),
            (TokenType::BANG, value) => Ok(Value::Bool(!value.is_truthy())),
            _ => unreachable!("parser produced unary operator {:?}", operator.token_type),
        }
    }

    fn binary(&self, operator: &Token, left: Value, right: Value) -> IResult<Value> {
        use TokenType::*;

        let value = match (&operator.token_type, left, right) {
            (PLUS, Value::Number(a), Value::Number(b)) => Value::Number(a + b),
            // A string on the left takes any right operand in its printed form.
            (PLUS, Value::String(a), right) => Value::String(a + &right.to_string()),
            (PLUS, left, right) => {
                return Err(RuntimeError::type_error(
                    operator,
                    format!(
                        "Operands must be two numbers or start with a string, not {} and {}.",
                        left.type_name(),
                        right.type_name()
                    ),
                ))
            }

            (MINUS, Value::Number(a), Value::Number(b)) => Value::Number(a - b),
            (STAR, Value::Number(a), Value::Number(b)) => Value::Number(a * b),
            // IEEE semantics: x / 0 is ±inf or NaN.
            (SLASH, Value::Number(a), Value::Number(b)) => Value::Number(a / b),

            (GREATER, Value::Number(a), Value::Number(b)) => Value::Bool(a > b),
            (GREATER_EQUAL, Value::Number(a), Value::Number(b)) => Value::Bool(a >= b),
            (LESS, Value::Number(a), Value::Number(b)) => Value::Bool(a < b),
            (LESS_EQUAL, Value::Number(a), Value::Number(b)) => Value::Bool(a <= b),

            (EQUAL_EQUAL, left, right) => Value::Bool(left == right),
            (BANG_EQUAL, left, right) => Value::Bool(left != right),

            (_, left, right) => {
                return Err(RuntimeError::type_error(
                    operator,
                    format!(
                        "Operands must be numbers, not {} and {}.",
                        left.type_name(),
                        right.type_name()
                    ),
                ))
            }
        };

        Ok(value)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Calls and objects
    // ─────────────────────────────────────────────────────────────────────────

    fn call_value(&mut self, callee: Value, args: Vec<Value>, paren: &Token) -> IResult<Value> {
        match callee {
            Value::Function(function) => self.call_function(&function, args),

            Value::Native(native) => {
                let result = native.call(&args);
                debug!("Native function '{}' returned: {}", native.name(), result);
                Ok(result)
            }

            Value::Class(class) => self.instantiate(class, args),

            other => Err(not_callable(paren, &other)),
        }
    }

    /// Parameters are bound positionally; missing arguments are `nil` and
    /// extra ones are dropped.
    fn call_function(&mut self, function: &Function, args: Vec<Value>) -> IResult<Value> {
        debug!(
            "Calling function '{}' with {} argument(s)",
            function.name(),
            args.len()
        );

        let env = self.push_frame(function.closure());

        let mut args = args.into_iter();
        for param in &function.decl().params {
            let arg = args.next().unwrap_or(Value::Nil);
            self.envs.define(env, &param.lexeme, arg);
        }

        let result = self.execute_all(&function.decl().body, env);
        self.pop_frame(env);
        let flow = result?;

        if function.is_initializer() {
            return Ok(self
                .envs
                .get(function.closure(), "self")
                .unwrap_or(Value::Nil));
        }

        Ok(match flow {
            Flow::Return(value) => value,
            Flow::Normal => Value::Nil,
        })
    }

    fn instantiate(&mut self, class: Rc<Class>, args: Vec<Value>) -> IResult<Value> {
        debug!("Instantiating class '{}'", class.name());

        let instance = Rc::new(RefCell::new(Instance::new(class.clone())));

        if let Some(initializer) = class.find_method(INITIALIZER) {
            let bound = initializer.bind(instance.clone(), &mut self.envs);
            self.call_function(&bound, args)?;
        }

        Ok(Value::Instance(instance))
    }

    /// Fields shadow methods; methods come back bound to the instance.
    fn get_property(&mut self, instance: &Rc<RefCell<Instance>>, name: &Token) -> IResult<Value> {
        if let Some(value) = instance.borrow().field(&name.lexeme) {
            return Ok(value);
        }

        let method = instance.borrow().class().find_method(&name.lexeme);
        match method {
            Some(method) => {
                let bound = method.bind(instance.clone(), &mut self.envs);
                Ok(Value::Function(Rc::new(bound)))
            }
            None => Err(RuntimeError::undefined_property(name)),
        }
    }

    fn super_method(
        &mut self,
        id: ExprId,
        keyword: &Token,
        method: &Token,
        env: EnvId,
    ) -> IResult<Value> {
        let distance = self.locals.get(id).ok_or_else(|| {
            RuntimeError::not_a_class(keyword, "'super' is only available in subclass methods.")
        })?;

        let superclass = match self.envs.get_at(env, distance, "super") {
            Some(Value::Class(class)) => class,
            _ => {
                return Err(RuntimeError::not_a_class(
                    keyword,
                    "'super' does not refer to a class.",
                ))
            }
        };

        let instance = match distance
            .checked_sub(1)
            .and_then(|d| self.envs.get_at(env, d, "self"))
        {
            Some(Value::Instance(instance)) => instance,
            _ => {
                return Err(RuntimeError::not_an_instance(
                    keyword,
                    "'self' is not bound to an instance.",
                ))
            }
        };

        let method = superclass
            .find_method(&method.lexeme)
            .ok_or_else(|| RuntimeError::undefined_property(method))?;

        Ok(Value::Function(Rc::new(
            method.bind(instance, &mut self.envs),
        )))
    }
}

fn not_callable(paren: &Token, callee: &Value) -> RuntimeError {
    RuntimeError::type_error(
        paren,
        format!("Can only call functions and classes, not {}.", callee.type_name()),
    )
}
