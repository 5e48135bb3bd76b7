use crate::expr::{Expr, LiteralValue};
use crate::stmt::Stmt;

/// Renders the tree as s-expressions: `(+ 1.0 (* 2.0 3.0))`.
pub struct AstPrinter;

impl AstPrinter {
    pub fn print_program(statements: &[Stmt]) -> String {
        statements
            .iter()
            .map(Self::print_stmt)
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn print_stmt(stmt: &Stmt) -> String {
        match stmt {
            Stmt::Expression(expr) => format!("(; {})", Self::print(expr)),

            Stmt::Print(expr) => format!("(print {})", Self::print(expr)),

            Stmt::Variable { name, initializer } => match initializer {
                Some(init) => format!("(let {} {})", name.lexeme, Self::print(init)),
                None => format!("(let {})", name.lexeme),
            },

            Stmt::Block(statements) => format!("(block{})", Self::print_body(statements)),

            Stmt::Fn(decl) => {
                let params: Vec<&str> = decl.params.iter().map(|p| p.lexeme.as_str()).collect();
                format!(
                    "(fn {} ({}){})",
                    decl.name.lexeme,
                    params.join(" "),
                    Self::print_body(&decl.body)
                )
            }

            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                let mut s = format!(
                    "(if {} (then{})",
                    Self::print(condition),
                    Self::print_body(then_branch)
                );
                if let Some(else_branch) = else_branch {
                    s.push_str(&format!(" (else{})", Self::print_body(else_branch)));
                }
                s.push(')');
                s
            }

            Stmt::For {
                initializer,
                condition,
                increment,
                body,
            } => {
                let init = initializer
                    .as_deref()
                    .map_or_else(|| "nil".to_string(), Self::print_stmt);
                let incr = increment
                    .as_ref()
                    .map_or_else(|| "nil".to_string(), Self::print);
                format!(
                    "(for {} {} {}{})",
                    init,
                    Self::print(condition),
                    incr,
                    Self::print_body(body)
                )
            }

            Stmt::Return { value, .. } => match value {
                Some(value) => format!("(return {})", Self::print(value)),
                None => "(return)".to_string(),
            },

            Stmt::Class(class) => {
                let mut s = format!("(class {}", class.name.lexeme);
                if let Some(superclass) = &class.superclass {
                    s.push_str(&format!(" < {}", Self::print(superclass)));
                }
                for method in &class.methods {
                    s.push(' ');
                    s.push_str(&Self::print_stmt(&Stmt::Fn(method.clone())));
                }
                s.push(')');
                s
            }
        }
    }

    pub fn print(expr: &Expr) -> String {
        match expr {
            Expr::Binary {
                left,
                operator,
                right,
            }
            | Expr::Logical {
                left,
                operator,
                right,
            } => format!(
                "({} {} {})",
                operator.lexeme,
                Self::print(left),
                Self::print(right)
            ),

            Expr::Unary { operator, right } => {
                format!("({} {})", operator.lexeme, Self::print(right))
            }

            Expr::Literal(literal) => match literal {
                LiteralValue::Number(n) => {
                    if n.fract() == 0.0 {
                        format!("{:.1}", n)
                    } else {
                        n.to_string()
                    }
                }
                LiteralValue::Str(s) => s.clone(),
                LiteralValue::Bool(b) => b.to_string(),
                LiteralValue::Nil => "nil".to_string(),
            },

            Expr::Grouping(expr) => format!("(group {})", Self::print(expr)),

            Expr::Var { name, .. } => name.lexeme.clone(),

            Expr::Assign { name, value, .. } => {
                format!("(= {} {})", name.lexeme, Self::print(value))
            }

            Expr::Call {
                callee, arguments, ..
            } => {
                let mut s = format!("(call {}", Self::print(callee));
                for arg in arguments {
                    s.push(' ');
                    s.push_str(&Self::print(arg));
                }
                s.push(')');
                s
            }

            Expr::Get { object, name } => format!("(. {} {})", Self::print(object), name.lexeme),

            Expr::Set {
                object,
                name,
                value,
            } => format!(
                "(= (. {} {}) {})",
                Self::print(object),
                name.lexeme,
                Self::print(value)
            ),

            Expr::SelfRef { .. } => "self".to_string(),

            Expr::Super { method, .. } => format!("(super {})", method.lexeme),
        }
    }

    fn print_body(statements: &[Stmt]) -> String {
        statements
            .iter()
            .map(|s| format!(" {}", Self::print_stmt(s)))
            .collect()
    }
}
