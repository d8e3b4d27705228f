// File: src/ast.rs
//
// Abstract syntax produced by the parser and consumed by the compiler.

use crate::errors::SourceLocation;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BinOpKind {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    And,
    Or,
    Xor,
    AndNot,
    Shl,
    Shr,
    LAnd,
    LOr,
    Equal,
    NotEqual,
    Less,
    Greater,
    LessEq,
    GreaterEq,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnOpKind {
    Neg,
    Not,
    BitNot,
}

/// An array element; trailing `...expr` spreads the elements of `expr`
/// into the surrounding literal.
#[derive(Debug, Clone)]
pub enum ArrayElement {
    Single(Expr),
    Spread(Expr),
}

#[derive(Debug, Clone)]
pub struct MapElement {
    pub key: String,
    pub value: Expr,
}

#[derive(Debug, Clone)]
pub struct FunctionLiteral {
    pub params: Vec<String>,
    pub variadic: bool,
    pub body: Vec<Stmt>,
}

/// A single call argument; `...expr` spreads an array into the call.
#[derive(Debug, Clone)]
pub enum CallArg {
    Single(Expr),
    Spread(Expr),
}

#[derive(Debug, Clone)]
pub enum Expr {
    IntLit(i64),
    FloatLit(f64),
    CharLit(char),
    StringLit(String),
    BoolLit(bool),
    Nil,
    Ident(String),

    ArrayLit(Vec<ArrayElement>),
    MapLit(Vec<MapElement>),
    FunctionLit(FunctionLiteral),

    BinaryOp { op: BinOpKind, left: Box<Expr>, right: Box<Expr> },
    UnaryOp { op: UnOpKind, operand: Box<Expr> },
    /// `cond ? a : b`
    Ternary { cond: Box<Expr>, then_expr: Box<Expr>, else_expr: Box<Expr> },

    Index { object: Box<Expr>, index: Box<Expr> },
    /// `a[lo:hi]`; either bound may be omitted.
    Slice { object: Box<Expr>, low: Option<Box<Expr>>, high: Option<Box<Expr>> },
    /// `a.field`, sugar for `a["field"]`.
    Selector { object: Box<Expr>, field: String },

    Call { func: Box<Expr>, args: Vec<CallArg> },

    /// `error(expr)`: wraps a value as an Error.
    ErrorWrap(Box<Expr>),

    /// `import("name")`
    Import(String),
}

#[derive(Debug, Clone)]
pub enum AssignTarget {
    Ident(String),
    Index { object: Expr, index: Expr },
    Selector { object: Expr, field: String },
}

#[derive(Debug, Clone)]
pub enum Stmt {
    ExprStmt(Expr),

    /// `x := expr` or `x, y := expr, expr2` — declares new local(s).
    Define { names: Vec<String>, values: Vec<Expr>, loc: SourceLocation },

    /// `x = expr`, `x += expr`, ... — `op` is `None` for plain `=`.
    Assign { target: AssignTarget, op: Option<BinOpKind>, value: Expr, loc: SourceLocation },

    /// Top-level `export expr`; a module's single export value.
    Export(Expr),

    If { cond: Expr, then_block: Vec<Stmt>, else_block: Option<Vec<Stmt>> },

    /// C-style `for init; cond; post { }`. Any clause may be absent.
    For { init: Option<Box<Stmt>>, cond: Option<Expr>, post: Option<Box<Stmt>>, body: Vec<Stmt> },

    /// `for k, v in expr { }`; `key` is absent for the single-variable form.
    ForIn { key: Option<String>, value: String, iterable: Expr, body: Vec<Stmt> },

    Return(Option<Expr>),
    Break,
    Continue,

    Block(Vec<Stmt>),
}

#[derive(Debug, Clone)]
pub struct Program {
    pub stmts: Vec<Stmt>,
}
