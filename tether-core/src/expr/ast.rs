//! Expression syntax tree.

use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
    Plus,
    Typeof,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    NotEq,
    StrictEq,
    StrictNotEq,
    Less,
    LessEq,
    Greater,
    GreaterEq,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
    Coalesce,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// A primitive literal (`1`, `'a'`, `true`, `null`, `undefined`).
    Literal(Value),

    /// A free identifier, resolved against the scope.
    Ident(String),

    /// An allow-listed helper (`Math`, `parseInt`, ...), never a scope read.
    Global(&'static str),

    /// `object.name`
    Member(Box<Expr>, String),

    /// `object[index]`
    Index(Box<Expr>, Box<Expr>),

    /// `callee(args)`
    Call(Box<Expr>, Vec<Expr>),

    Unary(UnaryOp, Box<Expr>),

    Binary(BinaryOp, Box<Expr>, Box<Expr>),

    /// Short-circuiting operators.
    Logical(LogicalOp, Box<Expr>, Box<Expr>),

    /// `test ? then : otherwise`
    Conditional(Box<Expr>, Box<Expr>, Box<Expr>),

    /// `[a, b, c]`, building a new array on every evaluation.
    Array(Vec<Expr>),

    /// `{ key: value }`, building a new object on every evaluation. Keys
    /// are kept verbatim.
    Object(Vec<(String, Expr)>),
}

impl Expr {
    pub fn undefined() -> Self {
        Expr::Literal(Value::Undefined)
    }

    /// Whether this is a simple assignable path: an identifier followed by
    /// member and index accesses only.
    pub fn is_path(&self) -> bool {
        match self {
            Expr::Ident(_) => true,
            Expr::Member(object, _) | Expr::Index(object, _) => object.is_path(),
            _ => false,
        }
    }

    /// The identifier at the head of a path.
    pub fn path_root(&self) -> Option<&str> {
        match self {
            Expr::Ident(name) => Some(name),
            Expr::Member(object, _) | Expr::Index(object, _) => object.path_root(),
            _ => None,
        }
    }
}
