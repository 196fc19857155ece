use crate::ast::{AssignTarget, Expr, ForInit, FunDecl, LiteralValue, Stmt, VarDecl};

/// Renders syntax trees in a parenthesised prefix form.
///
/// `1 + (2 * x)` prints as `(+ 1.0 (group (* 2.0 x)))`; statements use the
/// same shape, e.g. `(var a 1.0)` or `(while (< i 3.0) (block ...))`.
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
            Stmt::Expression { expr, .. } => format!("(; {})", Self::print_expr(expr)),

            Stmt::Print { expr, .. } => format!("(print {})", Self::print_expr(expr)),

            Stmt::Var(decl) => Self::print_var(decl),

            Stmt::Function(decl) => Self::print_fun(decl),

            Stmt::Class(decl) => {
                let mut s = format!("(class {}", decl.name);
                for method in &decl.methods {
                    s.push(' ');
                    s.push_str(&Self::print_fun(method));
                }
                s.push(')');
                s
            }

            Stmt::Block { statements, .. } => Self::parenthesize_stmts("block", statements),

            Stmt::If {
                condition,
                then_branch,
                else_branch,
                ..
            } => match else_branch {
                Some(else_branch) => format!(
                    "(if {} {} {})",
                    Self::print_expr(condition),
                    Self::print_stmt(then_branch),
                    Self::print_stmt(else_branch)
                ),
                None => format!(
                    "(if {} {})",
                    Self::print_expr(condition),
                    Self::print_stmt(then_branch)
                ),
            },

            Stmt::While {
                condition, body, ..
            } => format!(
                "(while {} {})",
                Self::print_expr(condition),
                Self::print_stmt(body)
            ),

            Stmt::For {
                initializer,
                condition,
                increment,
                body,
                ..
            } => {
                let init = match initializer {
                    Some(ForInit::Var(decl)) => Self::print_var(decl),
                    Some(ForInit::Expr(expr)) => Self::print_expr(expr),
                    None => "_".into(),
                };

                format!(
                    "(for {} {} {} {})",
                    init,
                    condition.as_ref().map_or("_".into(), Self::print_expr),
                    increment.as_ref().map_or("_".into(), Self::print_expr),
                    Self::print_stmt(body)
                )
            }

            Stmt::Break { .. } => "(break)".into(),

            Stmt::Continue { .. } => "(continue)".into(),

            Stmt::Return { value, .. } => match value {
                Some(value) => format!("(return {})", Self::print_expr(value)),
                None => "(return)".into(),
            },
        }
    }

    pub fn print_expr(expr: &Expr) -> String {
        match expr {
            // ── literals ────────────────────────────────────────────────
            Expr::Literal { value, .. } => match value {
                LiteralValue::Bool(b) => b.to_string(),

                LiteralValue::Nil => "nil".into(),

                LiteralValue::Str(s) => s.clone(),

                LiteralValue::Number(n) => {
                    if n.fract() == 0.0 {
                        // 3.0 → 3.0, not 3
                        format!("{:.1}", n)
                    } else {
                        n.to_string()
                    }
                }
            },

            Expr::Group { inner, .. } => format!("(group {})", Self::print_expr(inner)),

            Expr::Unary { op, right, .. } => format!("({} {})", op, Self::print_expr(right)),

            Expr::Binary {
                left, op, right, ..
            } => format!(
                "({} {} {})",
                op,
                Self::print_expr(left),
                Self::print_expr(right)
            ),

            Expr::Variable { ident, .. } => ident.name.clone(),

            Expr::This { .. } => "this".into(),

            Expr::Assign { target, value, .. } => match target {
                AssignTarget::Variable(ident) => {
                    format!("(= {} {})", ident.name, Self::print_expr(value))
                }
                AssignTarget::Property { object, name } => format!(
                    "(= (. {} {}) {})",
                    Self::print_expr(object),
                    name,
                    Self::print_expr(value)
                ),
            },

            Expr::Get { object, name, .. } => format!("(. {} {})", Self::print_expr(object), name),

            Expr::Call {
                callee, arguments, ..
            } => {
                let mut s = format!("(call {}", Self::print_expr(callee));
                for arg in arguments {
                    s.push(' ');
                    s.push_str(&Self::print_expr(arg));
                }
                s.push(')');
                s
            }
        }
    }

    fn print_var(decl: &VarDecl) -> String {
        match &decl.initializer {
            Some(init) => format!("(var {} {})", decl.name, Self::print_expr(init)),
            None => format!("(var {})", decl.name),
        }
    }

    fn print_fun(decl: &FunDecl) -> String {
        let mut s = format!("(fun {} ({})", decl.name, decl.params.join(" "));
        for stmt in &decl.body {
            s.push(' ');
            s.push_str(&Self::print_stmt(stmt));
        }
        s.push(')');
        s
    }

    fn parenthesize_stmts(name: &str, statements: &[Stmt]) -> String {
        let mut s = format!("({}", name);
        for stmt in statements {
            s.push(' ');
            s.push_str(&Self::print_stmt(stmt));
        }
        s.push(')');
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{BinaryOp, ResolvedIdent, UnaryOp};

    #[test]
    fn prints_nested_expression() {
        let expr = Expr::Binary {
            left: Box::new(Expr::Unary {
                op: UnaryOp::Negate,
                right: Box::new(Expr::Literal {
                    value: LiteralValue::Number(123.0),
                    line: 1,
                }),
                line: 1,
            }),
            op: BinaryOp::Multiply,
            right: Box::new(Expr::Group {
                inner: Box::new(Expr::Literal {
                    value: LiteralValue::Number(45.67),
                    line: 1,
                }),
                line: 1,
            }),
            line: 1,
        };

        assert_eq!(AstPrinter::print_expr(&expr), "(* (- 123.0) (group 45.67))");
    }

    #[test]
    fn prints_assignment_to_variable() {
        let expr = Expr::Assign {
            target: AssignTarget::Variable(ResolvedIdent::new("a")),
            value: Box::new(Expr::Literal {
                value: LiteralValue::Str("hi".into()),
                line: 2,
            }),
            line: 2,
        };

        assert_eq!(AstPrinter::print_expr(&expr), "(= a hi)");
    }
}
