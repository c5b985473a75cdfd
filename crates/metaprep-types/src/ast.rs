//! AST node types for the meta-script language.
//!
//! Every node carries a [`Span`] in the coordinates of the unit it was
//! parsed from. Function bodies are reference-counted so closures created
//! at run time can hold on to them after the unit's program is dropped.

use crate::Span;
use std::rc::Rc;

// ══════════════════════════════════════════════════════════════════════════════
// Top Level
// ══════════════════════════════════════════════════════════════════════════════

/// A parsed unit: the statements of one directive body plus its preamble.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub stmts: Vec<Stmt>,
    pub span: Span,
}

/// A spanned identifier.
#[derive(Debug, Clone, PartialEq)]
pub struct Ident {
    pub name: String,
    pub span: Span,
}

impl Ident {
    pub fn new(name: impl Into<String>, span: Span) -> Self {
        Self {
            name: name.into(),
            span,
        }
    }
}

/// `{ stmts... }`
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub stmts: Vec<Stmt>,
    pub span: Span,
}

// ══════════════════════════════════════════════════════════════════════════════
// Statements
// ══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    /// `let name = expr`
    Let(LetStmt),
    /// `set place = expr`
    Set(SetStmt),
    /// `fn name(params) { body }`
    Function(Rc<FnDecl>),
    /// `if cond { ... } [else ...]`
    If(IfStmt),
    /// `for item [, index] in expr { ... }`
    For(ForStmt),
    /// `while cond { ... }`
    While(WhileStmt),
    Break(Span),
    Continue(Span),
    /// `return [expr]`
    Return(ReturnStmt),
    /// `assert cond [, message]`
    Assert(AssertStmt),
    /// `global a, b`
    Global(GlobalStmt),
    /// A bare expression, usually a call.
    Expr(ExprStmt),
}

impl Stmt {
    pub fn span(&self) -> Span {
        match self {
            Stmt::Let(s) => s.span,
            Stmt::Set(s) => s.span,
            Stmt::Function(f) => f.span,
            Stmt::If(s) => s.span,
            Stmt::For(s) => s.span,
            Stmt::While(s) => s.span,
            Stmt::Break(span) | Stmt::Continue(span) => *span,
            Stmt::Return(s) => s.span,
            Stmt::Assert(s) => s.span,
            Stmt::Global(s) => s.span,
            Stmt::Expr(s) => s.span,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LetStmt {
    pub name: Ident,
    pub value: Expr,
    pub span: Span,
}

/// `set target = value` where `target` is an identifier, field or index.
#[derive(Debug, Clone, PartialEq)]
pub struct SetStmt {
    pub target: Expr,
    pub value: Expr,
    pub span: Span,
}

/// A named function declaration or an anonymous `fn(...) { }` expression.
#[derive(Debug, Clone, PartialEq)]
pub struct FnDecl {
    pub name: Option<Ident>,
    pub params: Vec<Ident>,
    pub body: Block,
    pub span: Span,
}

/// `if cond { stmts... } [else { stmts... } | else if ...]`
#[derive(Debug, Clone, PartialEq)]
pub struct IfStmt {
    pub condition: Expr,
    pub then_block: Block,
    pub else_branch: Option<ElseBranch>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ElseBranch {
    /// `else if cond { ... }`
    ElseIf(Box<IfStmt>),
    /// `else { ... }`
    Block(Block),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ForStmt {
    pub item: Ident,
    pub index: Option<Ident>,
    pub iterable: Expr,
    pub body: Block,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WhileStmt {
    pub condition: Expr,
    pub body: Block,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReturnStmt {
    pub value: Option<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AssertStmt {
    pub condition: Expr,
    pub message: Option<Expr>,
    pub span: Span,
}

/// Names that bind in the directive namespace wherever they are assigned.
#[derive(Debug, Clone, PartialEq)]
pub struct GlobalStmt {
    pub names: Vec<Ident>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExprStmt {
    pub expr: Expr,
    pub span: Span,
}

// ══════════════════════════════════════════════════════════════════════════════
// Expressions
// ══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

impl Expr {
    pub fn new(kind: ExprKind, span: Span) -> Self {
        Self { kind, span }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    // ── Literals ──
    Int(i64),
    Float(f64),
    /// `"text"` (no interpolation)
    Str(String),
    /// `"text ${expr} text"`
    Interpolation(Vec<StringPart>),
    Bool(bool),
    Nil,
    /// `[expr, ...]`
    List(Vec<Expr>),
    /// `{ key: expr, ... }`
    Record(Vec<RecordField>),

    // ── Access & Calls ──
    Identifier(String),
    /// `callee(args...)`; a field callee makes this a method call.
    Call {
        callee: Box<Expr>,
        args: Vec<Arg>,
    },
    /// `expr.field`
    Field {
        object: Box<Expr>,
        field: Ident,
    },
    /// `expr[index]`
    Index {
        object: Box<Expr>,
        index: Box<Expr>,
    },

    // ── Operators ──
    Binary {
        left: Box<Expr>,
        op: BinOp,
        right: Box<Expr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },

    /// `fn(params) { body }`
    Lambda(Rc<FnDecl>),
    /// `(expr)`
    Paren(Box<Expr>),
}

/// A part of an interpolated string.
#[derive(Debug, Clone, PartialEq)]
pub enum StringPart {
    Literal(String),
    Expr(Expr),
}

/// `key: value` in a record literal; string keys are allowed.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordField {
    pub key: Ident,
    pub value: Expr,
}

/// A call argument, optionally named: `f(x, count: "define")`.
#[derive(Debug, Clone, PartialEq)]
pub struct Arg {
    pub name: Option<Ident>,
    pub value: Expr,
}

// ── Operators ─────────────────────────────────────────────────────────────────

/// Binary operators (in precedence order, lowest first).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Or,
    And,
    Eq,
    NotEq,
    Less,
    Greater,
    LessEq,
    GreaterEq,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

impl BinOp {
    /// Returns the operator symbol for error messages.
    pub fn as_str(&self) -> &'static str {
        match self {
            BinOp::Or => "or",
            BinOp::And => "and",
            BinOp::Eq => "==",
            BinOp::NotEq => "!=",
            BinOp::Less => "<",
            BinOp::Greater => ">",
            BinOp::LessEq => "<=",
            BinOp::GreaterEq => ">=",
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Mod => "%",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    /// `-x`
    Neg,
    /// `not x`
    Not,
}
