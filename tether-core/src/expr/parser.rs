//! Recursive-descent expression parser.
//!
//! Precedence, lowest first:
//!
//! | Level | Operators |
//! |---|---|
//! | conditional | `?:` |
//! | coalesce | `??` |
//! | or | `\|\|` |
//! | and | `&&` |
//! | equality | `== != === !==` |
//! | relational | `< <= > >=` |
//! | additive | `+ -` |
//! | multiplicative | `* / %` |
//! | unary | `! - + typeof` |
//! | postfix | `.name [expr] (args)` |
//!
//! Statement keywords are rejected wherever an identifier would be read,
//! while member names and object-literal keys may be any word.

use crate::error::ExprError;

use super::ast::{BinaryOp, Expr, LogicalOp, UnaryOp};
use super::helpers;
use super::lexer::{tokenize, Spanned, Token};
use crate::value::Value;

const DISALLOWED_KEYWORDS: &[&str] = &[
    "var", "let", "const", "function", "return", "if", "else", "for", "while", "do", "switch",
    "case", "break", "continue", "new", "delete", "class", "try", "catch", "finally", "throw",
    "import", "export", "this", "in", "of", "void", "with", "yield", "await",
];

/// Deepest nesting of sub-expressions and prefix operators accepted.
const MAX_DEPTH: usize = 128;

/// Parse `source` into an expression tree.
pub fn parse(source: &str) -> Result<Expr, ExprError> {
    let tokens = tokenize(source)?;
    let mut parser = Parser {
        tokens,
        index: 0,
        depth: 0,
    };
    let expr = parser.expression()?;
    match parser.peek() {
        Token::Eof => Ok(expr),
        other => Err(ExprError::syntax(
            parser.position(),
            format!("unexpected `{other}` after expression"),
        )),
    }
}

struct Parser {
    tokens: Vec<Spanned>,
    index: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        self.tokens
            .get(self.index)
            .map(|spanned| &spanned.token)
            .unwrap_or(&Token::Eof)
    }

    fn position(&self) -> usize {
        self.tokens
            .get(self.index)
            .or_else(|| self.tokens.last())
            .map(|spanned| spanned.position)
            .unwrap_or(0)
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.index < self.tokens.len() {
            self.index += 1;
        }
        token
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == token {
            self.index += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: &Token) -> Result<(), ExprError> {
        if self.eat(token) {
            Ok(())
        } else {
            Err(ExprError::syntax(
                self.position(),
                format!("expected `{token}`, found `{}`", self.peek()),
            ))
        }
    }

    fn expression(&mut self) -> Result<Expr, ExprError> {
        self.nested(Self::conditional)
    }

    /// Run `rule` one nesting level deeper, failing past [`MAX_DEPTH`].
    fn nested(
        &mut self,
        rule: impl FnOnce(&mut Self) -> Result<Expr, ExprError>,
    ) -> Result<Expr, ExprError> {
        if self.depth >= MAX_DEPTH {
            return Err(ExprError::syntax(
                self.position(),
                "expression is nested too deeply",
            ));
        }
        self.depth += 1;
        let result = rule(self);
        self.depth -= 1;
        result
    }

    fn conditional(&mut self) -> Result<Expr, ExprError> {
        let test = self.coalesce()?;
        if !self.eat(&Token::Question) {
            return Ok(test);
        }
        let then = self.expression()?;
        self.expect(&Token::Colon)?;
        let otherwise = self.expression()?;
        Ok(Expr::Conditional(Box::new(test), Box::new(then), Box::new(otherwise)))
    }

    fn coalesce(&mut self) -> Result<Expr, ExprError> {
        let mut left = self.or()?;
        while self.eat(&Token::Coalesce) {
            let right = self.or()?;
            left = Expr::Logical(LogicalOp::Coalesce, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn or(&mut self) -> Result<Expr, ExprError> {
        let mut left = self.and()?;
        while self.eat(&Token::Or) {
            let right = self.and()?;
            left = Expr::Logical(LogicalOp::Or, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn and(&mut self) -> Result<Expr, ExprError> {
        let mut left = self.equality()?;
        while self.eat(&Token::And) {
            let right = self.equality()?;
            left = Expr::Logical(LogicalOp::And, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn binary_level(
        &mut self,
        next: fn(&mut Self) -> Result<Expr, ExprError>,
        operator: fn(&Token) -> Option<BinaryOp>,
    ) -> Result<Expr, ExprError> {
        let mut left = next(self)?;
        while let Some(op) = operator(self.peek()) {
            self.index += 1;
            let right = next(self)?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn equality(&mut self) -> Result<Expr, ExprError> {
        self.binary_level(Self::relational, |token| match token {
            Token::Eq => Some(BinaryOp::Eq),
            Token::NotEq => Some(BinaryOp::NotEq),
            Token::StrictEq => Some(BinaryOp::StrictEq),
            Token::StrictNotEq => Some(BinaryOp::StrictNotEq),
            _ => None,
        })
    }

    fn relational(&mut self) -> Result<Expr, ExprError> {
        self.binary_level(Self::additive, |token| match token {
            Token::Less => Some(BinaryOp::Less),
            Token::LessEq => Some(BinaryOp::LessEq),
            Token::Greater => Some(BinaryOp::Greater),
            Token::GreaterEq => Some(BinaryOp::GreaterEq),
            _ => None,
        })
    }

    fn additive(&mut self) -> Result<Expr, ExprError> {
        self.binary_level(Self::multiplicative, |token| match token {
            Token::Plus => Some(BinaryOp::Add),
            Token::Minus => Some(BinaryOp::Sub),
            _ => None,
        })
    }

    fn multiplicative(&mut self) -> Result<Expr, ExprError> {
        self.binary_level(Self::unary, |token| match token {
            Token::Star => Some(BinaryOp::Mul),
            Token::Slash => Some(BinaryOp::Div),
            Token::Percent => Some(BinaryOp::Rem),
            _ => None,
        })
    }

    fn unary(&mut self) -> Result<Expr, ExprError> {
        let op = match self.peek() {
            Token::Bang => UnaryOp::Not,
            Token::Minus => UnaryOp::Neg,
            Token::Plus => UnaryOp::Plus,
            Token::Ident(name) if name == "typeof" => UnaryOp::Typeof,
            _ => return self.postfix(),
        };
        self.index += 1;
        let operand = self.nested(Self::unary)?;
        Ok(Expr::Unary(op, Box::new(operand)))
    }

    fn postfix(&mut self) -> Result<Expr, ExprError> {
        let mut expr = self.primary()?;
        loop {
            match self.peek() {
                Token::Dot => {
                    self.index += 1;
                    let position = self.position();
                    match self.advance() {
                        Token::Ident(name) => expr = Expr::Member(Box::new(expr), name),
                        other => {
                            return Err(ExprError::syntax(
                                position,
                                format!("expected property name, found `{other}`"),
                            ))
                        }
                    }
                }
                Token::BracketOpen => {
                    self.index += 1;
                    let index = self.expression()?;
                    self.expect(&Token::BracketClose)?;
                    expr = Expr::Index(Box::new(expr), Box::new(index));
                }
                Token::ParenOpen => {
                    self.index += 1;
                    let args = self.list(&Token::ParenClose)?;
                    expr = Expr::Call(Box::new(expr), args);
                }
                _ => return Ok(expr),
            }
        }
    }

    /// Comma-separated expressions up to `close`, which is consumed.
    fn list(&mut self, close: &Token) -> Result<Vec<Expr>, ExprError> {
        let mut items = Vec::new();
        if self.eat(close) {
            return Ok(items);
        }
        loop {
            items.push(self.expression()?);
            if self.eat(close) {
                return Ok(items);
            }
            self.expect(&Token::Comma)?;
            // Trailing comma.
            if self.eat(close) {
                return Ok(items);
            }
        }
    }

    fn primary(&mut self) -> Result<Expr, ExprError> {
        let position = self.position();
        match self.advance() {
            Token::Number(n) => Ok(Expr::Literal(Value::Number(n))),
            Token::Str(s) => Ok(Expr::Literal(Value::str(s))),
            Token::Ident(name) => identifier(name),
            Token::ParenOpen => {
                let expr = self.expression()?;
                self.expect(&Token::ParenClose)?;
                Ok(expr)
            }
            Token::BracketOpen => Ok(Expr::Array(self.list(&Token::BracketClose)?)),
            Token::BraceOpen => self.object(),
            Token::Assign => Err(ExprError::syntax(position, "assignment is not allowed")),
            other => Err(ExprError::syntax(position, format!("unexpected `{other}`"))),
        }
    }

    fn object(&mut self) -> Result<Expr, ExprError> {
        let mut entries = Vec::new();
        loop {
            let position = self.position();
            let key = match self.advance() {
                Token::BraceClose => return Ok(Expr::Object(entries)),
                Token::Ident(name) => name,
                Token::Str(s) => s,
                Token::Number(n) => crate::value::format_number(n),
                other => {
                    return Err(ExprError::syntax(
                        position,
                        format!("expected object key, found `{other}`"),
                    ))
                }
            };
            self.expect(&Token::Colon)?;
            let value = self.expression()?;
            entries.push((key, value));
            if self.eat(&Token::BraceClose) {
                return Ok(Expr::Object(entries));
            }
            self.expect(&Token::Comma)?;
        }
    }
}

fn identifier(name: String) -> Result<Expr, ExprError> {
    match name.as_str() {
        "true" => Ok(Expr::Literal(Value::Bool(true))),
        "false" => Ok(Expr::Literal(Value::Bool(false))),
        "null" => Ok(Expr::Literal(Value::Null)),
        "undefined" => Ok(Expr::Literal(Value::Undefined)),
        "NaN" => Ok(Expr::Literal(Value::Number(f64::NAN))),
        "Infinity" => Ok(Expr::Literal(Value::Number(f64::INFINITY))),
        keyword if DISALLOWED_KEYWORDS.contains(&keyword) => {
            Err(ExprError::DisallowedKeyword(name))
        }
        other => match helpers::global_name(other) {
            Some(global) => Ok(Expr::Global(global)),
            None => Ok(Expr::Ident(name)),
        },
    }
}
