//! Runtime scope frames.
//!
//! Frames are shared (`Rc<RefCell<_>>`) because closures, bound methods and
//! the interpreter's current-frame pointer all hold on to the same frame and
//! must observe each other's writes.  Lookups never search by name up the
//! chain: they walk exactly the number of parent links the resolver recorded,
//! or go straight to the global frame.

use crate::ast::Depth;
use crate::error::{LoxError, Result};
use crate::value::Value;
use log::trace;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// Shared handle to a frame.
pub type EnvRef = Rc<RefCell<Environment>>;

#[derive(Debug, Default)]
pub struct Environment {
    values: HashMap<String, Value>,
    enclosing: Option<EnvRef>,
    /// Root of the chain; `None` on the global frame itself.
    global: Option<EnvRef>,
}

impl Environment {
    /// A fresh global frame.
    pub fn new_global() -> EnvRef {
        Rc::new(RefCell::new(Environment::default()))
    }

    /// A fresh frame whose parent is `enclosing`.
    pub fn with_enclosing(enclosing: &EnvRef) -> EnvRef {
        let global = enclosing
            .borrow()
            .global
            .clone()
            .unwrap_or_else(|| Rc::clone(enclosing));

        Rc::new(RefCell::new(Environment {
            values: HashMap::new(),
            enclosing: Some(Rc::clone(enclosing)),
            global: Some(global),
        }))
    }

    pub fn is_global(&self) -> bool {
        self.enclosing.is_none()
    }

    /// Bind `name` in this frame.  A local frame refuses a name it already
    /// holds and returns `false`; the global frame always accepts, so a
    /// second global definition simply replaces the first.
    pub fn define(&mut self, name: &str, value: Value) -> bool {
        if !self.is_global() && self.values.contains_key(name) {
            return false;
        }

        self.values.insert(name.to_string(), value);
        true
    }

    /// Read `name` from this frame only.
    pub fn get_here(&self, name: &str) -> Option<Value> {
        self.values.get(name).cloned()
    }

    /// Overwrite an existing binding in this frame only.
    pub fn assign_here(&mut self, name: &str, value: Value) -> bool {
        match self.values.get_mut(name) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    /// Follow `hops` parent links from `env`.
    pub fn ancestor(env: &EnvRef, hops: usize) -> Option<EnvRef> {
        let mut frame = Rc::clone(env);

        for _ in 0..hops {
            let parent = frame.borrow().enclosing.clone()?;
            frame = parent;
        }

        Some(frame)
    }

    /// The frame a resolved name lives in.
    fn target(env: &EnvRef, depth: Depth) -> Option<EnvRef> {
        match depth {
            Depth::Global => Some(
                env.borrow()
                    .global
                    .clone()
                    .unwrap_or_else(|| Rc::clone(env)),
            ),
            Depth::Local(hops) => Self::ancestor(env, hops),
        }
    }

    /// Read `name` at the resolved `depth`, starting from `env`.
    pub fn get_at(env: &EnvRef, name: &str, depth: Depth, line: usize) -> Result<Value> {
        trace!("get '{}' at {:?}", name, depth);

        let frame = Self::target(env, depth).ok_or_else(|| short_chain(name, depth, line))?;
        let value = frame.borrow().get_here(name);

        match (value, depth) {
            (Some(value), _) => Ok(value),
            (None, Depth::Global) => Err(LoxError::runtime(
                line,
                format!("Undefined variable '{}'.", name),
            )),
            (None, Depth::Local(_)) => Err(missing_local(name, depth, line)),
        }
    }

    /// Overwrite `name` at the resolved `depth`, starting from `env`.
    pub fn assign_at(
        env: &EnvRef,
        name: &str,
        depth: Depth,
        value: Value,
        line: usize,
    ) -> Result<()> {
        trace!("assign '{}' at {:?}", name, depth);

        let frame = Self::target(env, depth).ok_or_else(|| short_chain(name, depth, line))?;
        let assigned = frame.borrow_mut().assign_here(name, value);

        match (assigned, depth) {
            (true, _) => Ok(()),
            (false, Depth::Global) => Err(LoxError::runtime(
                line,
                format!("Undefined variable '{}'.", name),
            )),
            (false, Depth::Local(_)) => Err(missing_local(name, depth, line)),
        }
    }
}

fn short_chain(name: &str, depth: Depth, line: usize) -> LoxError {
    debug_assert!(false, "frame chain too short for '{}' at {:?}", name, depth);

    LoxError::internal(
        line,
        format!("No frame at {:?} for '{}'.", depth, name),
    )
}

fn missing_local(name: &str, depth: Depth, line: usize) -> LoxError {
    debug_assert!(false, "resolved local '{}' missing at {:?}", name, depth);

    LoxError::internal(
        line,
        format!("Resolved local '{}' not found at {:?}.", name, depth),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn number(env: &EnvRef, name: &str, depth: Depth) -> f64 {
        match Environment::get_at(env, name, depth, 1) {
            Ok(Value::Number(n)) => n,
            other => panic!("expected a number, got {:?}", other),
        }
    }

    #[test]
    fn local_frames_reject_redefinition() {
        let globals = Environment::new_global();
        let local = Environment::with_enclosing(&globals);

        assert!(local.borrow_mut().define("a", Value::Number(1.0)));
        assert!(!local.borrow_mut().define("a", Value::Number(2.0)));
        assert_eq!(number(&local, "a", Depth::Local(0)), 1.0);
    }

    #[test]
    fn global_frame_accepts_redefinition() {
        let globals = Environment::new_global();

        assert!(globals.borrow_mut().define("a", Value::Number(1.0)));
        assert!(globals.borrow_mut().define("a", Value::Number(2.0)));
        assert_eq!(number(&globals, "a", Depth::Global), 2.0);
    }

    #[test]
    fn depth_selects_the_frame() {
        let globals = Environment::new_global();
        globals.borrow_mut().define("x", Value::Number(0.0));

        let outer = Environment::with_enclosing(&globals);
        outer.borrow_mut().define("x", Value::Number(1.0));

        let inner = Environment::with_enclosing(&outer);
        inner.borrow_mut().define("x", Value::Number(2.0));

        assert_eq!(number(&inner, "x", Depth::Local(0)), 2.0);
        assert_eq!(number(&inner, "x", Depth::Local(1)), 1.0);
        assert_eq!(number(&inner, "x", Depth::Global), 0.0);
    }

    #[test]
    fn missing_global_is_a_runtime_error() {
        let globals = Environment::new_global();
        let local = Environment::with_enclosing(&globals);

        let err = Environment::get_at(&local, "nope", Depth::Global, 7).unwrap_err();
        assert_eq!(err.to_string(), "[line 7] Error: Undefined variable 'nope'.");

        let err =
            Environment::assign_at(&local, "nope", Depth::Global, Value::Nil, 8).unwrap_err();
        assert_eq!(err.to_string(), "[line 8] Error: Undefined variable 'nope'.");
    }

    #[test]
    fn assignment_is_visible_through_shared_frames() {
        let globals = Environment::new_global();
        let captured = Environment::with_enclosing(&globals);
        captured.borrow_mut().define("count", Value::Number(0.0));

        let call = Environment::with_enclosing(&captured);
        Environment::assign_at(&call, "count", Depth::Local(1), Value::Number(5.0), 1).unwrap();

        assert_eq!(number(&captured, "count", Depth::Local(0)), 5.0);
    }

    #[test]
    fn ancestor_walks_parent_links() {
        let globals = Environment::new_global();
        let a = Environment::with_enclosing(&globals);
        let b = Environment::with_enclosing(&a);

        let found = Environment::ancestor(&b, 2).unwrap();
        assert!(Rc::ptr_eq(&found, &globals));
        assert!(Environment::ancestor(&b, 3).is_none());
    }
}
