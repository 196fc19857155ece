//! Syntax tree produced by the [`Parser`](crate::parser::Parser).
//!
//! Nodes are built once and never restructured.  The only post‑parse write is
//! the scope [`Depth`] the resolver records on each [`ResolvedIdent`]; it sits
//! in a `Cell` so the tree can be shared read‑only (`Rc<FunDecl>` is held by
//! every closure created from a declaration) while still being annotated in
//! place.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use serde::Serialize;

/// Where a name lives relative to the frame that is active at its use site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum Depth {
    /// Not found in any enclosing local scope: looked up in the global frame
    /// at run time.
    #[default]
    Global,

    /// Walk exactly this many parent links from the active frame.
    Local(usize),
}

/// An identifier occurrence plus its resolved scope distance.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedIdent {
    pub name: String,
    depth: Cell<Depth>,
}

impl ResolvedIdent {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            depth: Cell::new(Depth::Global),
        }
    }

    pub fn depth(&self) -> Depth {
        self.depth.get()
    }

    /// Record the static distance.  Written once, by the resolver.
    pub(crate) fn set_depth(&self, depth: Depth) {
        debug_assert_eq!(
            self.depth.get(),
            Depth::Global,
            "'{}' resolved twice",
            self.name
        );

        self.depth.set(depth);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum UnaryOp {
    /// `!`
    Not,
    /// `-`
    Negate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BinaryOp {
    Or,
    And,
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    Add,
    Subtract,
    Multiply,
    Divide,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Or => "or",
            BinaryOp::And => "and",
            BinaryOp::Equal => "==",
            BinaryOp::NotEqual => "!=",
            BinaryOp::Less => "<",
            BinaryOp::LessEqual => "<=",
            BinaryOp::Greater => ">",
            BinaryOp::GreaterEqual => ">=",
            BinaryOp::Add => "+",
            BinaryOp::Subtract => "-",
            BinaryOp::Multiply => "*",
            BinaryOp::Divide => "/",
        }
    }
}

impl UnaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            UnaryOp::Not => "!",
            UnaryOp::Negate => "-",
        }
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// A literal constant that appears directly in the source code.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum LiteralValue {
    Nil,
    Bool(bool),
    Number(f64),
    Str(String),
}

/// Left‑hand side of an assignment.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum AssignTarget {
    /// `name = value`
    Variable(ResolvedIdent),

    /// `object.name = value`; always writes the instance's own fields.
    Property { object: Box<Expr>, name: String },
}

/// Expression nodes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Expr {
    Assign {
        target: AssignTarget,
        value: Box<Expr>,
        line: usize,
    },

    Unary {
        op: UnaryOp,
        right: Box<Expr>,
        line: usize,
    },

    /// Arithmetic, comparison, equality and the short‑circuiting `and`/`or`.
    Binary {
        left: Box<Expr>,
        op: BinaryOp,
        right: Box<Expr>,
        line: usize,
    },

    Literal {
        value: LiteralValue,
        line: usize,
    },

    /// Parenthesised sub‑expression.
    Group {
        inner: Box<Expr>,
        line: usize,
    },

    /// Plain variable reference.
    Variable {
        ident: ResolvedIdent,
        line: usize,
    },

    /// `object.name`; the property name is never resolved statically.
    Get {
        object: Box<Expr>,
        name: String,
        line: usize,
    },

    Call {
        callee: Box<Expr>,
        arguments: Vec<Expr>,
        line: usize,
    },

    /// `this` inside a method body, resolved like a variable.
    This {
        ident: ResolvedIdent,
        line: usize,
    },
}

impl Expr {
    /// Starting source line of the expression.
    pub fn line(&self) -> usize {
        match self {
            Expr::Assign { line, .. }
            | Expr::Unary { line, .. }
            | Expr::Binary { line, .. }
            | Expr::Literal { line, .. }
            | Expr::Group { line, .. }
            | Expr::Variable { line, .. }
            | Expr::Get { line, .. }
            | Expr::Call { line, .. }
            | Expr::This { line, .. } => *line,
        }
    }
}

/// `var name (= initializer)?;`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VarDecl {
    pub name: String,
    pub initializer: Option<Expr>,
    pub line: usize,
}

/// `fun name(params) { body }`, also used for class methods.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunDecl {
    pub name: String,
    pub params: Vec<String>,
    pub body: Vec<Stmt>,
    pub line: usize,
}

/// `class Name { fun method() {…} … }`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassDecl {
    pub name: String,
    pub methods: Vec<Rc<FunDecl>>,
    pub line: usize,
}

/// Optional first clause of a `for`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ForInit {
    /// Opens a scope that lives for the whole loop.
    Var(VarDecl),

    /// Evaluated once in the current scope.
    Expr(Expr),
}

/// Statement nodes.  A program is a `Vec<Stmt>`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Stmt {
    Expression {
        expr: Expr,
        line: usize,
    },

    Print {
        expr: Expr,
        line: usize,
    },

    Var(VarDecl),

    Function(Rc<FunDecl>),

    Class(ClassDecl),

    Block {
        statements: Vec<Stmt>,
        line: usize,
    },

    If {
        condition: Expr,
        then_branch: Box<Stmt>,
        else_branch: Option<Box<Stmt>>,
        line: usize,
    },

    While {
        condition: Expr,
        body: Box<Stmt>,
        line: usize,
    },

    For {
        initializer: Option<ForInit>,
        condition: Option<Expr>,
        increment: Option<Expr>,
        body: Box<Stmt>,
        line: usize,
    },

    Break {
        line: usize,
    },

    Continue {
        line: usize,
    },

    Return {
        value: Option<Expr>,
        line: usize,
    },
}

impl Stmt {
    /// Starting source line of the statement.
    pub fn line(&self) -> usize {
        match self {
            Stmt::Var(decl) => decl.line,
            Stmt::Function(decl) => decl.line,
            Stmt::Class(decl) => decl.line,
            Stmt::Expression { line, .. }
            | Stmt::Print { line, .. }
            | Stmt::Block { line, .. }
            | Stmt::If { line, .. }
            | Stmt::While { line, .. }
            | Stmt::For { line, .. }
            | Stmt::Break { line }
            | Stmt::Continue { line }
            | Stmt::Return { line, .. } => *line,
        }
    }
}
