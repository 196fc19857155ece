//! Static resolver pass.
//!
//! This resolver does two things in one forward walk over the tree:
//! 1. Build lexical scopes (stack of `HashMap<String, bool>` tracking declared/defined)
//!    and report static errors: reading a local inside its own initializer and
//!    redeclaring a name in the same local scope.
//! 2. Record, on *each* variable / `this` occurrence, how many scopes separate the use
//!    from its definition ([`Depth::Local`]), so the interpreter walks exactly that
//!    many frames.  Names found in no local scope stay [`Depth::Global`] and are
//!    looked up in the global frame at run time; whether they exist is not checked
//!    here, which keeps forward references between globals working.
//!
//! Scopes mirror the frames the interpreter creates: one per block, one per
//! function call (parameters + body), one `this` scope per class (the frame a
//! bound method adds), and one for a `for` whose first clause declares a variable.
//! The top level has no scope at all.

use crate::ast::{
    AssignTarget, ClassDecl, Depth, Expr, ForInit, FunDecl, ResolvedIdent, Stmt, VarDecl,
};
use crate::error::{Diagnostics, LoxError, Result};
use log::{debug, info, trace};
use std::collections::HashMap;

/// Tracks scopes, enforces static rules and writes binding distances into the tree.
pub struct Resolver {
    scopes: Vec<HashMap<String, bool>>, // false=declared, true=defined
    diagnostics: Diagnostics,
}

impl Default for Resolver {
    fn default() -> Self {
        Self::new()
    }
}

impl Resolver {
    pub fn new() -> Self {
        info!("Resolver instantiated");

        Resolver {
            scopes: Vec::new(),
            diagnostics: Diagnostics::new(),
        }
    }

    /// Walk all top‑level statements.  Every problem found is reported; the
    /// walk does not stop at the first one.
    pub fn resolve(mut self, statements: &[Stmt]) -> std::result::Result<(), Diagnostics> {
        info!(
            "Beginning resolve pass over {} statement(s)",
            statements.len()
        );

        self.resolve_statements(statements);

        debug_assert!(self.scopes.is_empty(), "unbalanced resolver scopes");

        self.diagnostics.into_result()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Statement resolution
    // ─────────────────────────────────────────────────────────────────────────

    fn resolve_statements(&mut self, statements: &[Stmt]) {
        for stmt in statements {
            self.resolve_stmt(stmt);
        }
    }

    fn resolve_stmt(&mut self, stmt: &Stmt) {
        trace!("Resolving stmt on line {}", stmt.line());

        match stmt {
            Stmt::Expression { expr, .. } | Stmt::Print { expr, .. } => {
                self.resolve_expr(expr);
            }

            Stmt::Var(decl) => self.resolve_var(decl),

            Stmt::Function(decl) => {
                // Bound before the body so the function can call itself.
                if self.declare_defined(&decl.name, decl.line) {
                    self.resolve_function(decl);
                }
            }

            Stmt::Class(decl) => self.resolve_class(decl),

            Stmt::Block { statements, .. } => {
                self.begin_scope();
                self.resolve_statements(statements);
                self.end_scope();
            }

            Stmt::If {
                condition,
                then_branch,
                else_branch,
                ..
            } => {
                self.resolve_expr(condition);
                self.resolve_stmt(then_branch);
                if let Some(eb) = else_branch.as_deref() {
                    self.resolve_stmt(eb);
                }
            }

            Stmt::While {
                condition, body, ..
            } => {
                self.resolve_expr(condition);
                self.resolve_stmt(body);
            }

            Stmt::For {
                initializer,
                condition,
                increment,
                body,
                ..
            } => {
                let scoped = matches!(initializer, Some(ForInit::Var(_)));

                if scoped {
                    self.begin_scope();
                }

                match initializer {
                    Some(ForInit::Var(decl)) => self.resolve_var(decl),
                    Some(ForInit::Expr(expr)) => self.resolve_expr(expr),
                    None => {}
                }

                if let Some(cond) = condition {
                    self.resolve_expr(cond);
                }
                if let Some(inc) = increment {
                    self.resolve_expr(inc);
                }

                self.resolve_stmt(body);

                if scoped {
                    self.end_scope();
                }
            }

            Stmt::Break { .. } | Stmt::Continue { .. } => {}

            Stmt::Return { value, .. } => {
                if let Some(expr) = value {
                    self.resolve_expr(expr);
                }
            }
        }
    }

    /// declare → resolve initializer → define, so the initializer cannot see
    /// the variable it initializes.
    fn resolve_var(&mut self, decl: &VarDecl) {
        if let Err(e) = self.declare(&decl.name, decl.line) {
            self.diagnostics.report(e);
            return;
        }

        if let Some(expr) = &decl.initializer {
            self.resolve_expr(expr);
        }

        self.define(&decl.name);
    }

    /// Fresh scope holding the parameters, then the body in that same scope.
    fn resolve_function(&mut self, decl: &FunDecl) {
        self.begin_scope();

        for param in &decl.params {
            self.declare_defined(param, decl.line);
        }

        self.resolve_statements(&decl.body);

        self.end_scope();
    }

    fn resolve_class(&mut self, decl: &ClassDecl) {
        if !self.declare_defined(&decl.name, decl.line) {
            return;
        }

        // Methods close over a frame that only holds `this`; method names are
        // reached through `this.name`, never as bare variables.
        self.begin_scope();
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert("this".to_string(), true);
        }

        for method in &decl.methods {
            self.resolve_function(method);
        }

        self.end_scope();
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Expression resolution
    // ─────────────────────────────────────────────────────────────────────────

    fn resolve_expr(&mut self, expr: &Expr) {
        if let Err(e) = self.walk_expr(expr) {
            self.diagnostics.report(e);
        }
    }

    fn walk_expr(&mut self, expr: &Expr) -> Result<()> {
        match expr {
            Expr::Literal { .. } => {}

            Expr::Group { inner, .. } => {
                self.walk_expr(inner)?;
            }

            Expr::Unary { right, .. } => {
                self.walk_expr(right)?;
            }

            Expr::Binary { left, right, .. } => {
                self.walk_expr(left)?;
                self.walk_expr(right)?;
            }

            Expr::Variable { ident, line } => {
                self.check_initialized(ident, *line)?;
                self.resolve_local(ident);
            }

            Expr::This { ident, .. } => {
                self.resolve_local(ident);
            }

            Expr::Assign {
                target,
                value,
                line,
            } => {
                self.walk_expr(value)?;

                match target {
                    AssignTarget::Variable(ident) => {
                        self.check_initialized(ident, *line)?;
                        self.resolve_local(ident);
                    }

                    AssignTarget::Property { object, .. } => {
                        self.walk_expr(object)?;
                    }
                }
            }

            Expr::Call {
                callee, arguments, ..
            } => {
                self.walk_expr(callee)?;
                for arg in arguments {
                    self.walk_expr(arg)?;
                }
            }

            // Only the object; the property name is looked up dynamically.
            Expr::Get { object, .. } => self.walk_expr(object)?,
        }

        Ok(())
    }

    /// A name that is declared but not yet defined in the innermost scope is
    /// being used inside its own initializer.
    fn check_initialized(&self, ident: &ResolvedIdent, line: usize) -> Result<()> {
        if let Some(scope) = self.scopes.last() {
            if scope.get(&ident.name) == Some(&false) {
                debug!("'{}' read in its own initializer", ident.name);

                return Err(LoxError::resolve(
                    line,
                    "Can't read local variable in its own initializer.",
                ));
            }
        }

        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Scope management
    // ─────────────────────────────────────────────────────────────────────────

    #[inline]
    fn begin_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    #[inline]
    fn end_scope(&mut self) {
        self.scopes.pop();
    }

    /// Record `name` as declared but uninitialized in the innermost scope.
    /// The global level has no scope and accepts anything.
    fn declare(&mut self, name: &str, line: usize) -> Result<()> {
        if let Some(scope) = self.scopes.last_mut() {
            if scope.contains_key(name) {
                return Err(LoxError::resolve(
                    line,
                    format!("Already a variable named '{}' in this scope.", name),
                ));
            }
            scope.insert(name.to_string(), false);
        }
        Ok(())
    }

    fn define(&mut self, name: &str) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.to_string(), true);
        }
    }

    /// Declare and define in one step, reporting a redeclaration.  Returns
    /// whether the name was bound.
    fn declare_defined(&mut self, name: &str, line: usize) -> bool {
        match self.declare(name, line) {
            Ok(()) => {
                self.define(name);
                true
            }
            Err(e) => {
                self.diagnostics.report(e);
                false
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Binding‑distance helper
    // ─────────────────────────────────────────────────────────────────────────

    /// Record this occurrence as a local at distance `d`, or leave it global
    /// when no enclosing scope binds it.
    fn resolve_local(&mut self, ident: &ResolvedIdent) {
        for (depth, scope) in self.scopes.iter().rev().enumerate() {
            if scope.contains_key(&ident.name) {
                trace!("Resolved '{}' at depth {}", ident.name, depth);

                ident.set_depth(Depth::Local(depth));
                return;
            }
        }

        trace!("Resolved '{}' as global", ident.name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Parser;
    use crate::scanner::Scanner;

    fn parse(source: &str) -> Vec<Stmt> {
        let (tokens, errors) = Scanner::new(source).scan_tokens();
        assert!(errors.is_empty());

        let (statements, diagnostics) = Parser::new(&tokens).parse();
        assert!(diagnostics.is_empty(), "{}", diagnostics);

        statements
    }

    /// Every identifier occurrence in source order, with its recorded depth.
    fn depths(statements: &[Stmt]) -> Vec<(String, Depth)> {
        fn visit_stmt(s: &Stmt, out: &mut Vec<(String, Depth)>) {
            match s {
                Stmt::Expression { expr, .. } | Stmt::Print { expr, .. } => visit_expr(expr, out),
                Stmt::Var(decl) => {
                    if let Some(init) = &decl.initializer {
                        visit_expr(init, out);
                    }
                }
                Stmt::Function(decl) => decl.body.iter().for_each(|s| visit_stmt(s, out)),
                Stmt::Class(decl) => decl
                    .methods
                    .iter()
                    .for_each(|m| m.body.iter().for_each(|s| visit_stmt(s, out))),
                Stmt::Block { statements, .. } => statements.iter().for_each(|s| visit_stmt(s, out)),
                Stmt::If {
                    condition,
                    then_branch,
                    else_branch,
                    ..
                } => {
                    visit_expr(condition, out);
                    visit_stmt(then_branch, out);
                    if let Some(eb) = else_branch {
                        visit_stmt(eb, out);
                    }
                }
                Stmt::While {
                    condition, body, ..
                } => {
                    visit_expr(condition, out);
                    visit_stmt(body, out);
                }
                Stmt::For {
                    initializer,
                    condition,
                    increment,
                    body,
                    ..
                } => {
                    match initializer {
                        Some(ForInit::Var(decl)) => {
                            if let Some(init) = &decl.initializer {
                                visit_expr(init, out);
                            }
                        }
                        Some(ForInit::Expr(e)) => visit_expr(e, out),
                        None => {}
                    }
                    condition.iter().for_each(|e| visit_expr(e, out));
                    increment.iter().for_each(|e| visit_expr(e, out));
                    visit_stmt(body, out);
                }
                Stmt::Return { value, .. } => value.iter().for_each(|e| visit_expr(e, out)),
                Stmt::Break { .. } | Stmt::Continue { .. } => {}
            }
        }

        fn visit_expr(e: &Expr, out: &mut Vec<(String, Depth)>) {
            match e {
                Expr::Variable { ident, .. } | Expr::This { ident, .. } => {
                    out.push((ident.name.clone(), ident.depth()))
                }
                Expr::Assign { target, value, .. } => {
                    visit_expr(value, out);
                    match target {
                        AssignTarget::Variable(ident) => {
                            out.push((ident.name.clone(), ident.depth()))
                        }
                        AssignTarget::Property { object, .. } => visit_expr(object, out),
                    }
                }
                Expr::Unary { right, .. } => visit_expr(right, out),
                Expr::Binary { left, right, .. } => {
                    visit_expr(left, out);
                    visit_expr(right, out);
                }
                Expr::Group { inner, .. } => visit_expr(inner, out),
                Expr::Get { object, .. } => visit_expr(object, out),
                Expr::Call {
                    callee, arguments, ..
                } => {
                    visit_expr(callee, out);
                    arguments.iter().for_each(|a| visit_expr(a, out));
                }
                Expr::Literal { .. } => {}
            }
        }

        let mut out = Vec::new();
        statements.iter().for_each(|s| visit_stmt(s, &mut out));
        out
    }

    fn resolved(source: &str) -> Vec<(String, Depth)> {
        let statements = parse(source);
        Resolver::new()
            .resolve(&statements)
            .unwrap_or_else(|d| panic!("unexpected diagnostics: {}", d));

        depths(&statements)
    }

    fn messages(source: &str) -> Vec<(usize, String)> {
        let statements = parse(source);

        match Resolver::new().resolve(&statements) {
            Ok(()) => Vec::new(),
            Err(diagnostics) => diagnostics
                .into_iter()
                .map(|d| (d.line, d.message))
                .collect(),
        }
    }

    fn entry(name: &str, depth: Depth) -> (String, Depth) {
        (name.to_string(), depth)
    }

    #[test]
    fn globals_stay_unresolved() {
        assert_eq!(
            resolved("var a = 1; print a; print later;"),
            vec![entry("a", Depth::Global), entry("later", Depth::Global)]
        );
    }

    #[test]
    fn block_locals_count_hops() {
        assert_eq!(
            resolved("{ var a = 1; { var b = a; print b; } print a; }"),
            vec![
                entry("a", Depth::Local(1)),
                entry("b", Depth::Local(0)),
                entry("a", Depth::Local(0)),
            ]
        );
    }

    #[test]
    fn closures_see_enclosing_function_scope() {
        assert_eq!(
            resolved(
                "fun counter() { var i = 0; fun inc() { i = i + 1; return i; } return inc; }"
            ),
            vec![
                entry("i", Depth::Local(1)),
                entry("i", Depth::Local(1)),
                entry("i", Depth::Local(1)),
                entry("inc", Depth::Local(0)),
            ]
        );
    }

    #[test]
    fn this_resolves_through_the_class_scope() {
        assert_eq!(
            resolved("class A { fun m(x) { { return this; } } }"),
            vec![entry("this", Depth::Local(2))]
        );
    }

    #[test]
    fn for_declaration_opens_one_scope() {
        assert_eq!(
            resolved("for (var i = 0; i < 2; i = i + 1) { print i; }"),
            vec![
                entry("i", Depth::Local(0)),
                entry("i", Depth::Local(0)),
                entry("i", Depth::Local(0)),
                entry("i", Depth::Local(1)),
            ]
        );
    }

    #[test]
    fn recursion_resolves_own_name() {
        assert_eq!(
            resolved("{ fun f(n) { return f(n); } }"),
            vec![entry("f", Depth::Local(1)), entry("n", Depth::Local(0))]
        );
    }

    #[test]
    fn own_initializer_is_an_error_for_locals_only() {
        assert_eq!(
            messages("var a = 1;\n{\n var a = a;\n}"),
            vec![(
                3,
                "Can't read local variable in its own initializer.".to_string()
            )]
        );
        assert!(messages("var b = b;").is_empty());
    }

    #[test]
    fn local_redeclaration_is_rejected() {
        assert_eq!(
            messages("{\n var a = 1;\n fun a() {}\n}"),
            vec![(3, "Already a variable named 'a' in this scope.".to_string())]
        );
        assert!(messages("var a = 1; var a = 2;").is_empty());
    }

    #[test]
    fn duplicate_parameters_are_rejected() {
        assert_eq!(
            messages("fun f(a, a) {}").len(),
            1,
            "second 'a' should be reported"
        );
    }

    #[test]
    fn all_errors_are_collected() {
        let found = messages("{ var a = a; }\n{ var b = 1; var b = 2; }");

        assert_eq!(found.len(), 2);
        assert_eq!(found[1].0, 2);
    }
}
