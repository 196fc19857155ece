//! Callable values: user functions (closures, bound methods) and natives.

use std::fmt;
use std::rc::Rc;
use std::time::{SystemTime, SystemTimeError, UNIX_EPOCH};

use log::{debug, info};

use crate::ast::FunDecl;
use crate::class::Instance;
use crate::environment::{EnvRef, Environment};
use crate::value::Value;

/// A function declaration paired with the frame it closes over.
///
/// The declaration is shared with the syntax tree, so creating a closure or
/// binding a method never copies the body.
pub struct Function {
    decl: Rc<FunDecl>,
    closure: EnvRef,
}

impl Function {
    pub fn new(decl: Rc<FunDecl>, closure: EnvRef) -> Self {
        Function { decl, closure }
    }

    pub fn name(&self) -> &str {
        &self.decl.name
    }

    pub fn arity(&self) -> usize {
        self.decl.params.len()
    }

    pub fn decl(&self) -> &FunDecl {
        &self.decl
    }

    pub fn closure(&self) -> &EnvRef {
        &self.closure
    }

    /// A copy of this function whose closure is wrapped in one extra frame
    /// holding `this`.
    pub fn bind(&self, instance: Rc<Instance>) -> Function {
        debug!("Binding '{}' to a {} instance", self.name(), instance.class().name);

        let frame = Environment::with_enclosing(&self.closure);
        let defined = frame
            .borrow_mut()
            .define("this", Value::Instance(instance));
        debug_assert!(defined, "fresh frame already held 'this'");

        Function {
            decl: Rc::clone(&self.decl),
            closure: frame,
        }
    }
}

// Closures can reach themselves through their frame; keep Debug shallow.
impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Function")
            .field("name", &self.decl.name)
            .field("arity", &self.arity())
            .finish()
    }
}

/// Signature of a builtin.  Errors are plain messages; the interpreter
/// attaches the call site's line.
pub type NativeFn = fn(&[Value]) -> Result<Value, String>;

/// A builtin implemented in Rust.
pub struct NativeFunction {
    pub name: &'static str,
    pub arity: usize,
    pub func: NativeFn,
}

impl NativeFunction {
    pub fn call(&self, args: &[Value]) -> Result<Value, String> {
        debug!("Calling native function '{}'", self.name);

        (self.func)(args)
    }
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeFunction")
            .field("name", &self.name)
            .field("arity", &self.arity)
            .finish()
    }
}

/// `clock()`: seconds since the Unix epoch.
fn clock(_args: &[Value]) -> Result<Value, String> {
    let timestamp: f64 = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e: SystemTimeError| format!("Clock error: {}", e))?
        .as_secs_f64();

    info!("Native function 'clock' returned: {}", timestamp);

    Ok(Value::Number(timestamp))
}

/// Builtins installed in every fresh global frame.
pub fn natives() -> Vec<NativeFunction> {
    vec![NativeFunction {
        name: "clock",
        arity: 0,
        func: clock,
    }]
}
