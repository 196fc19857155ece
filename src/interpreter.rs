use std::collections::HashMap;
use std::io::Write;
use std::rc::Rc;

use log::{debug, info, trace};

use crate::ast::{
    AssignTarget, BinaryOp, ClassDecl, Expr, ForInit, LiteralValue, Stmt, UnaryOp, VarDecl,
};
use crate::class::{Class, Instance};
use crate::environment::{EnvRef, Environment};
use crate::error::{Diagnostics, LoxError, Result};
use crate::func::{natives, Function};
use crate::stack::ensure_sufficient_stack;
use crate::value::Value;

/// Deepest allowed nesting of calls before a runtime error is raised.
pub const MAX_CALL_DEPTH: usize = 255;

/// How a statement finished.  Loops consume `Break`/`Continue`, calls
/// consume `Return`; anything else travels outwards unchanged.
#[derive(Debug)]
pub enum Signal {
    Normal,
    Break,
    Continue,
    Return(Value),
}

/// Tree-walking evaluator.  `print` output goes to the injected sink.
pub struct Interpreter<W: Write> {
    globals: EnvRef,
    environment: EnvRef,
    out: W,
    call_depth: usize,
    had_error: bool,
}

impl<W: Write> Interpreter<W> {
    /// Creates a new Interpreter and defines native functions such as `clock`.
    pub fn new(out: W) -> Self {
        info!("Initializing Interpreter");

        let globals = Environment::new_global();

        for native in natives() {
            debug!("Defining native function '{}'", native.name);

            globals
                .borrow_mut()
                .define(native.name, Value::Native(Rc::new(native)));
        }

        Interpreter {
            environment: Rc::clone(&globals),
            globals,
            out,
            call_depth: 0,
            had_error: false,
        }
    }

    /// Sticky: set once any runtime error has been reported.
    pub fn had_error(&self) -> bool {
        self.had_error
    }

    pub fn into_output(self) -> W {
        self.out
    }

    /// Runs a resolved program.  Execution stops at the first runtime error;
    /// side effects already performed stay in place.
    pub fn interpret(&mut self, statements: &[Stmt]) -> std::result::Result<(), Diagnostics> {
        debug!("Interpreting {} statements", statements.len());

        for stmt in statements {
            let outcome = self.execute(stmt).and_then(|signal| match signal {
                Signal::Normal => Ok(()),
                other => {
                    debug_assert!(false, "{:?} escaped to top level", other);
                    Err(LoxError::internal(
                        stmt.line(),
                        format!("{:?} escaped to top level.", other),
                    ))
                }
            });

            if let Err(e) = outcome {
                debug!("Runtime debug: {}", e);

                self.had_error = true;
                // An error can unwind out of nested frames.
                self.environment = Rc::clone(&self.globals);
                self.call_depth = 0;

                return Err(e.into());
            }
        }

        info!("Interpretation completed successfully");
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Statements
    // ─────────────────────────────────────────────────────────────────────────

    /// Executes a single statement.
    pub fn execute(&mut self, stmt: &Stmt) -> Result<Signal> {
        trace!("Executing statement on line {}", stmt.line());

        match stmt {
            Stmt::Expression { expr, .. } => {
                self.evaluate(expr)?;
                Ok(Signal::Normal)
            }

            Stmt::Print { expr, .. } => {
                let value = self.evaluate(expr)?;
                writeln!(self.out, "{}", value)?;
                debug!("Printed value: {}", value);
                Ok(Signal::Normal)
            }

            Stmt::Var(decl) => {
                self.define_var(decl)?;
                Ok(Signal::Normal)
            }

            Stmt::Function(decl) => {
                debug!("Defining function '{}'", decl.name);

                let function = Function::new(Rc::clone(decl), Rc::clone(&self.environment));
                self.define(&decl.name, Value::Function(Rc::new(function)), decl.line)?;
                Ok(Signal::Normal)
            }

            Stmt::Class(decl) => {
                self.define_class(decl)?;
                Ok(Signal::Normal)
            }

            Stmt::Block { statements, .. } => {
                let frame = Environment::with_enclosing(&self.environment);
                self.with_frame(frame, |this| this.execute_all(statements))
            }

            Stmt::If {
                condition,
                then_branch,
                else_branch,
                ..
            } => {
                if self.evaluate(condition)?.is_truthy() {
                    self.execute(then_branch)
                } else if let Some(else_branch) = else_branch {
                    self.execute(else_branch)
                } else {
                    Ok(Signal::Normal)
                }
            }

            Stmt::While {
                condition, body, ..
            } => {
                debug!("Entering while loop");

                while self.evaluate(condition)?.is_truthy() {
                    match self.execute(body)? {
                        Signal::Break => break,
                        Signal::Return(value) => return Ok(Signal::Return(value)),
                        Signal::Normal | Signal::Continue => {}
                    }
                }

                debug!("Exited while loop");
                Ok(Signal::Normal)
            }

            Stmt::For {
                initializer,
                condition,
                increment,
                body,
                ..
            } => {
                debug!("Entering for loop");

                let run = |this: &mut Self| -> Result<Signal> {
                    match initializer {
                        Some(ForInit::Var(decl)) => this.define_var(decl)?,
                        Some(ForInit::Expr(expr)) => {
                            this.evaluate(expr)?;
                        }
                        None => {}
                    }

                    loop {
                        if let Some(condition) = condition {
                            if !this.evaluate(condition)?.is_truthy() {
                                break;
                            }
                        }

                        match this.execute(body)? {
                            Signal::Break => break,
                            Signal::Return(value) => return Ok(Signal::Return(value)),
                            // `continue` still runs the increment.
                            Signal::Normal | Signal::Continue => {}
                        }

                        if let Some(increment) = increment {
                            this.evaluate(increment)?;
                        }
                    }

                    Ok(Signal::Normal)
                };

                let signal = match initializer {
                    Some(ForInit::Var(_)) => {
                        let frame = Environment::with_enclosing(&self.environment);
                        self.with_frame(frame, run)
                    }
                    _ => run(self),
                };

                debug!("Exited for loop");
                signal
            }

            Stmt::Break { .. } => Ok(Signal::Break),

            Stmt::Continue { .. } => Ok(Signal::Continue),

            Stmt::Return { value, .. } => {
                let value = match value {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Nil,
                };
                debug!("Returning value: {}", value);
                Ok(Signal::Return(value))
            }
        }
    }

    /// Runs statements in order, stopping at the first non-`Normal` signal.
    fn execute_all(&mut self, statements: &[Stmt]) -> Result<Signal> {
        for stmt in statements {
            match self.execute(stmt)? {
                Signal::Normal => {}
                other => return Ok(other),
            }
        }

        Ok(Signal::Normal)
    }

    /// Makes `frame` current for the duration of `f`, restoring the previous
    /// frame on every exit path.
    fn with_frame<T>(&mut self, frame: EnvRef, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        let previous = std::mem::replace(&mut self.environment, frame);
        let result = f(self);
        self.environment = previous;
        result
    }

    fn define(&mut self, name: &str, value: Value, line: usize) -> Result<()> {
        if self.environment.borrow_mut().define(name, value) {
            Ok(())
        } else {
            Err(LoxError::runtime(
                line,
                format!("Already a variable named '{}' in this scope.", name),
            ))
        }
    }

    fn define_var(&mut self, decl: &VarDecl) -> Result<()> {
        let value = match &decl.initializer {
            Some(expr) => self.evaluate(expr)?,
            None => Value::Nil,
        };

        debug!("Variable '{}' defined with value: {}", decl.name, value);
        self.define(&decl.name, value, decl.line)
    }

    /// The name is bound (to `nil`) before the methods are built so method
    /// bodies can refer to their own class.
    fn define_class(&mut self, decl: &ClassDecl) -> Result<()> {
        debug!("Defining class '{}'", decl.name);

        self.define(&decl.name, Value::Nil, decl.line)?;

        let methods: HashMap<String, Rc<Function>> = decl
            .methods
            .iter()
            .map(|method| {
                let function = Function::new(Rc::clone(method), Rc::clone(&self.environment));
                (method.name.clone(), Rc::new(function))
            })
            .collect();

        let class = Value::Class(Rc::new(Class::new(decl.name.clone(), methods)));
        let assigned = self.environment.borrow_mut().assign_here(&decl.name, class);
        debug_assert!(assigned, "class '{}' vanished from its frame", decl.name);

        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Expressions
    // ─────────────────────────────────────────────────────────────────────────

    /// Evaluates an expression and returns a Value.
    pub fn evaluate(&mut self, expr: &Expr) -> Result<Value> {
        match expr {
            Expr::Literal { value, .. } => Ok(match value {
                LiteralValue::Nil => Value::Nil,
                LiteralValue::Bool(b) => Value::Bool(*b),
                LiteralValue::Number(n) => Value::Number(*n),
                LiteralValue::Str(s) => Value::from(s.as_str()),
            }),

            Expr::Group { inner, .. } => self.evaluate(inner),

            Expr::Unary { op, right, line } => {
                let right = self.evaluate(right)?;

                match op {
                    UnaryOp::Not => Ok(Value::Bool(!right.is_truthy())),
                    UnaryOp::Negate => match right {
                        Value::Number(n) => Ok(Value::Number(-n)),
                        _ => Err(LoxError::runtime(*line, "Operand must be a number.")),
                    },
                }
            }

            Expr::Binary {
                left,
                op: BinaryOp::Or,
                right,
                ..
            } => {
                let left = self.evaluate(left)?;
                if left.is_truthy() {
                    return Ok(left);
                }
                self.evaluate(right)
            }

            Expr::Binary {
                left,
                op: BinaryOp::And,
                right,
                ..
            } => {
                let left = self.evaluate(left)?;
                if !left.is_truthy() {
                    return Ok(left);
                }
                self.evaluate(right)
            }

            Expr::Binary {
                left,
                op,
                right,
                line,
            } => {
                let left = self.evaluate(left)?;
                let right = self.evaluate(right)?;
                trace!("Left operand: {}, Right operand: {}", left, right);

                binary(*op, left, right, *line)
            }

            Expr::Variable { ident, line } | Expr::This { ident, line } => {
                Environment::get_at(&self.environment, &ident.name, ident.depth(), *line)
            }

            Expr::Assign {
                target,
                value,
                line,
            } => match target {
                AssignTarget::Variable(ident) => {
                    let value = self.evaluate(value)?;
                    Environment::assign_at(
                        &self.environment,
                        &ident.name,
                        ident.depth(),
                        value.clone(),
                        *line,
                    )?;
                    Ok(value)
                }

                AssignTarget::Property { object, name } => match self.evaluate(object)? {
                    Value::Instance(instance) => {
                        let value = self.evaluate(value)?;
                        instance.set(name, value.clone());
                        Ok(value)
                    }
                    _ => Err(LoxError::runtime(*line, "Only instances have fields.")),
                },
            },

            Expr::Get { object, name, line } => match self.evaluate(object)? {
                Value::Instance(instance) => instance.get(name).ok_or_else(|| {
                    LoxError::runtime(*line, format!("Undefined property '{}'.", name))
                }),
                _ => Err(LoxError::runtime(*line, "Only instances have properties.")),
            },

            Expr::Call {
                callee,
                arguments,
                line,
            } => {
                let callee = self.evaluate(callee)?;

                let arity = match &callee {
                    Value::Native(native) => native.arity,
                    Value::Function(function) => function.arity(),
                    Value::Class(class) => class.arity(),
                    _ => {
                        return Err(LoxError::runtime(
                            *line,
                            "Can only call functions and classes.",
                        ))
                    }
                };

                if arguments.len() != arity {
                    return Err(LoxError::runtime(
                        *line,
                        format!(
                            "Expected {} arguments but got {}.",
                            arity,
                            arguments.len()
                        ),
                    ));
                }

                let mut args = Vec::with_capacity(arguments.len());
                for argument in arguments {
                    args.push(self.evaluate(argument)?);
                }

                self.call(callee, args, *line)
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Calls
    // ─────────────────────────────────────────────────────────────────────────

    fn call(&mut self, callee: Value, args: Vec<Value>, line: usize) -> Result<Value> {
        if self.call_depth >= MAX_CALL_DEPTH {
            return Err(LoxError::runtime(line, "Stack overflow."));
        }

        self.call_depth += 1;

        let result = ensure_sufficient_stack(|| match callee {
            Value::Native(native) => native
                .call(&args)
                .map_err(|message| LoxError::runtime(line, message)),

            Value::Function(function) => self.call_function(&function, args, line),

            Value::Class(class) => self.instantiate(class, args, line),

            other => Err(LoxError::internal(
                line,
                format!("Arity checked on a non-callable {}.", other.type_name()),
            )),
        });

        self.call_depth -= 1;
        result
    }

    fn call_function(&mut self, function: &Function, args: Vec<Value>, line: usize) -> Result<Value> {
        debug!("Calling user-defined function '{}'", function.name());

        let frame = Environment::with_enclosing(function.closure());
        {
            let mut frame = frame.borrow_mut();
            for (param, arg) in function.decl().params.iter().zip(args) {
                trace!("Binding parameter '{}' to {}", param, arg);
                frame.define(param, arg);
            }
        }

        let signal = self.with_frame(frame, |this| this.execute_all(&function.decl().body))?;

        match signal {
            Signal::Normal => Ok(Value::Nil),
            Signal::Return(value) => {
                debug!("Function '{}' returned: {}", function.name(), value);
                Ok(value)
            }
            other => Err(LoxError::internal(
                line,
                format!("{:?} escaped function '{}'.", other, function.name()),
            )),
        }
    }

    /// A new instance; a bound `init` runs on it and its result is dropped.
    fn instantiate(&mut self, class: Rc<Class>, args: Vec<Value>, line: usize) -> Result<Value> {
        debug!("Instantiating class '{}'", class.name);

        let instance = Rc::new(Instance::new(Rc::clone(&class)));

        if let Some(init) = class.find_method("init") {
            let bound = init.bind(Rc::clone(&instance));
            self.call_function(&bound, args, line)?;
        }

        Ok(Value::Instance(instance))
    }
}

/// Strict arithmetic, comparison and equality over already-evaluated operands.
fn binary(op: BinaryOp, left: Value, right: Value, line: usize) -> Result<Value> {
    let numbers = |l: &Value, r: &Value| match (l, r) {
        (Value::Number(a), Value::Number(b)) => Ok((*a, *b)),
        _ => Err(LoxError::runtime(line, "Operands must be numbers.")),
    };

    match op {
        BinaryOp::Equal => Ok(Value::Bool(left == right)),
        BinaryOp::NotEqual => Ok(Value::Bool(left != right)),

        BinaryOp::Add => match (&left, &right) {
            (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),
            (Value::String(_), Value::String(_) | Value::Number(_))
            | (Value::Number(_), Value::String(_)) => {
                Ok(Value::from(format!("{}{}", left, right)))
            }
            _ => Err(LoxError::runtime(line, "Operands must be numbers or strings.")),
        },

        BinaryOp::Subtract => numbers(&left, &right).map(|(a, b)| Value::Number(a - b)),
        BinaryOp::Multiply => numbers(&left, &right).map(|(a, b)| Value::Number(a * b)),
        BinaryOp::Divide => {
            let (a, b) = numbers(&left, &right)?;
            if b == 0.0 {
                return Err(LoxError::runtime(line, "Attempted to divide by zero."));
            }
            Ok(Value::Number(a / b))
        }

        BinaryOp::Less => numbers(&left, &right).map(|(a, b)| Value::Bool(a < b)),
        BinaryOp::LessEqual => numbers(&left, &right).map(|(a, b)| Value::Bool(a <= b)),
        BinaryOp::Greater => numbers(&left, &right).map(|(a, b)| Value::Bool(a > b)),
        BinaryOp::GreaterEqual => numbers(&left, &right).map(|(a, b)| Value::Bool(a >= b)),

        BinaryOp::And | BinaryOp::Or => Err(LoxError::internal(
            line,
            format!("Logical operator '{}' reached strict evaluation.", op),
        )),
    }
}
