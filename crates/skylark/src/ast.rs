//! Abstract syntax tree produced by the parser and annotated in place by the
//! resolver. Every node carries a [`Span`] so hosts can render diagnostics;
//! rendering itself is an external collaborator, not part of this crate.

use crate::resolver::scope::BindingRef;

/// A byte-offset range into the original source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub start: u32,
    pub end: u32,
}

impl Span {
    pub fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    pub fn join(self, other: Self) -> Self {
        Self {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

/// A module: the parsed result of one source file, pre-resolution.
#[derive(Debug, Clone)]
pub struct Module {
    pub statements: Vec<Stmt>,
}

#[derive(Debug, Clone)]
pub struct Stmt {
    pub span: Span,
    pub kind: StmtKind,
}

#[derive(Debug, Clone)]
pub enum StmtKind {
    Expr(Expr),
    Assign {
        target: Expr,
        value: Expr,
    },
    AugAssign {
        target: Expr,
        op: BinOp,
        value: Expr,
    },
    Def(Box<FunctionDef>),
    Return(Option<Expr>),
    If {
        test: Expr,
        body: Vec<Stmt>,
        orelse: Vec<Stmt>,
    },
    For {
        target: Expr,
        iter: Expr,
        body: Vec<Stmt>,
    },
    While {
        test: Expr,
        body: Vec<Stmt>,
    },
    Break,
    Continue,
    Pass,
    Load {
        module: String,
        /// (local name, name inside the loaded module)
        bindings: Vec<(Identifier, String)>,
    },
}

/// A function or `def` definition. Shared between statement-level defs
/// (named) and — in principle — any future lambda-like form.
#[derive(Debug, Clone)]
pub struct FunctionDef {
    pub name: Identifier,
    pub params: Vec<Param>,
    pub body: Vec<Stmt>,
    pub span: Span,
    /// Filled in by the resolver.
    pub resolved: Option<crate::resolver::FunctionLayout>,
}

#[derive(Debug, Clone)]
pub enum ParamKind {
    /// Ordinary positional-or-keyword parameter, optionally with a default.
    Normal { default: Option<Expr> },
    /// `*args`
    Star,
    /// A bare `*` marker separating keyword-only parameters (no storage).
    StarMarker,
    /// `**kwargs`
    DoubleStar,
}

#[derive(Debug, Clone)]
pub struct Param {
    pub name: Identifier,
    pub kind: ParamKind,
    pub span: Span,
}

/// An identifier occurrence; `binding` is filled in by the resolver.
#[derive(Debug, Clone)]
pub struct Identifier {
    pub name: String,
    pub span: Span,
    pub binding: Option<BindingRef>,
}

impl Identifier {
    pub fn new(name: impl Into<String>, span: Span) -> Self {
        Self {
            name: name.into(),
            span,
            binding: None,
        }
    }

    pub fn py_eq(&self, other: &Self) -> bool {
        self.name == other.name && self.span == other.span
    }
}

#[derive(Debug, Clone)]
pub struct Expr {
    pub span: Span,
    pub kind: Box<ExprKind>,
}

impl Expr {
    pub fn new(span: Span, kind: ExprKind) -> Self {
        Self {
            span,
            kind: Box::new(kind),
        }
    }
}

#[derive(Debug, Clone)]
pub enum ExprKind {
    None,
    Bool(bool),
    Int(String),
    Float(f64),
    Str(String),
    Identifier(Identifier),
    List(Vec<Expr>),
    Tuple(Vec<Expr>),
    Dict(Vec<(Expr, Expr)>),
    Set(Vec<Expr>),
    ListComp {
        expr: Box<Expr>,
        clauses: Vec<CompClause>,
        /// Filled in by the resolver; the comprehension's own runtime frame layout.
        resolved: Option<crate::resolver::FunctionLayout>,
    },
    DictComp {
        key: Box<Expr>,
        value: Box<Expr>,
        clauses: Vec<CompClause>,
        resolved: Option<crate::resolver::FunctionLayout>,
    },
    SetComp {
        expr: Box<Expr>,
        clauses: Vec<CompClause>,
        resolved: Option<crate::resolver::FunctionLayout>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    BoolOp {
        op: BoolOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Compare {
        op: CompareOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Not(Box<Expr>),
    Conditional {
        body: Box<Expr>,
        test: Box<Expr>,
        orelse: Box<Expr>,
    },
    Call {
        func: Box<Expr>,
        args: Vec<Argument>,
    },
    Index {
        value: Box<Expr>,
        index: Box<Expr>,
    },
    Slice {
        value: Box<Expr>,
        start: Option<Box<Expr>>,
        stop: Option<Box<Expr>>,
        step: Option<Box<Expr>>,
    },
    Attribute {
        value: Box<Expr>,
        attr: Identifier,
    },
    Lambda {
        params: Vec<Param>,
        body: Box<Expr>,
        /// Filled in by the resolver.
        resolved: Option<crate::resolver::FunctionLayout>,
    },
}

#[derive(Debug, Clone)]
pub enum Argument {
    Positional(Expr),
    Named(String, Expr),
    Star(Expr),
    DoubleStar(Expr),
}

#[derive(Debug, Clone)]
pub struct CompClause {
    pub target: Expr,
    pub iter: Expr,
    /// `if` filters attached after the `for`.
    pub ifs: Vec<Expr>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Pos,
    BitNot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Mod,
    Pow,
    BitOr,
    BitAnd,
    BitXor,
    Shl,
    Shr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoolOp {
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    In,
    NotIn,
}
