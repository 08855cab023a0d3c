//! Expression Compiler
//!
//! Turns binding source text (`a + b.c`, `items.length > 0`, `user.name`)
//! into getters and setters that run against a [`Scope`].
//!
//! # Pipeline
//!
//! 1. The lexer extracts string literals as whole tokens, so nothing inside
//!    quotes is ever read as an identifier.
//! 2. A recursive-descent parser builds an [`Expr`]. Free identifiers become
//!    scope reads unless they are literals, allow-listed helpers, member
//!    names after a `.`, or object-literal keys. Statement keywords are
//!    rejected.
//! 3. The tree is interpreted directly against the scope.
//!
//! Parsed trees are cached per source string, so the same binding repeated
//! across list items is parsed once.
//!
//! # Failure
//!
//! Compilation errors come back as [`ExprError`]. Callers that cannot
//! propagate them use [`compile_or_noop`], which logs and substitutes a
//! getter that always yields `undefined`.

mod ast;
mod eval;
mod helpers;
mod lexer;
mod parser;

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use tracing::warn;

use crate::error::ExprError;
use crate::reactive::ReactiveContext;
use crate::scope::Scope;
use crate::value::Value;

pub use ast::{BinaryOp, Expr, LogicalOp, UnaryOp};
pub use eval::evaluate;
pub(crate) use eval::member;

/// Parsed sources kept per thread. The oldest entry is evicted first.
const PARSE_CACHE_CAPACITY: usize = 512;

thread_local! {
    static PARSE_CACHE: RefCell<IndexMap<String, Result<Rc<Expr>, ExprError>>> =
        RefCell::new(IndexMap::new());
}

/// Parse `source`, reusing a cached tree when the same text was parsed
/// recently.
pub fn parse(source: &str) -> Result<Rc<Expr>, ExprError> {
    let source = source.trim();
    if let Some(cached) = PARSE_CACHE.with(|cache| cache.borrow().get(source).cloned()) {
        return cached;
    }
    let parsed = parser::parse(source).map(Rc::new);
    PARSE_CACHE.with(|cache| {
        let mut cache = cache.borrow_mut();
        if cache.len() >= PARSE_CACHE_CAPACITY {
            cache.shift_remove_index(0);
        }
        cache.insert(source.to_string(), parsed.clone());
    });
    parsed
}

#[cfg(test)]
fn cached_sources() -> usize {
    PARSE_CACHE.with(|cache| cache.borrow().len())
}

/// A compiled read of an expression.
#[derive(Clone)]
pub struct Getter {
    source: Rc<str>,
    expr: Rc<Expr>,
}

impl Getter {
    /// Wrap an already parsed tree.
    pub fn from_expr(source: &str, expr: Expr) -> Self {
        Self {
            source: Rc::from(source),
            expr: Rc::new(expr),
        }
    }

    /// A getter that always yields `undefined`.
    pub fn noop(source: &str) -> Self {
        Self::from_expr(source, Expr::undefined())
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    /// Evaluate against `scope`.
    pub fn get(&self, scope: &Scope) -> Value {
        evaluate(&self.expr, scope)
    }
}

impl fmt::Debug for Getter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Getter({:?})", self.source)
    }
}

/// A compiled write through an assignable path.
#[derive(Clone)]
pub struct Setter {
    source: Rc<str>,
    target: Rc<Expr>,
}

impl Setter {
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Assign `value` to the path in `scope`.
    ///
    /// The path's base is read without tracking. Writing through a missing
    /// intermediate object is logged and skipped.
    pub fn set(&self, scope: &Scope, value: Value) {
        ReactiveContext::untracked(|| match self.target.as_ref() {
            Expr::Ident(name) => scope.assign(name, value),
            Expr::Member(object, name) => {
                let base = evaluate(object, scope);
                self.assign_member(&base, name, value);
            }
            Expr::Index(object, index) => {
                let base = evaluate(object, scope);
                match (&base, evaluate(index, scope)) {
                    (Value::Array(array), Value::Number(n)) if n >= 0.0 && n.fract() == 0.0 => {
                        array.set_index(n as usize, value)
                    }
                    (_, key) => self.assign_member(&base, &key.to_js_string(), value),
                }
            }
            _ => {}
        });
    }

    fn assign_member(&self, base: &Value, key: &str, value: Value) {
        match base {
            Value::Object(object) => object.set(key, value),
            Value::Array(array) => match key.parse::<usize>() {
                Ok(index) => array.set_index(index, value),
                Err(_) => warn!(path = %self.source, key, "cannot assign to array property"),
            },
            other => warn!(
                path = %self.source,
                found = other.type_name(),
                "cannot assign through a non-object"
            ),
        }
    }
}

impl fmt::Debug for Setter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Setter({:?})", self.source)
    }
}

/// Compile `source` into a getter.
pub fn compile(source: &str) -> Result<Getter, ExprError> {
    let expr = parse(source)?;
    Ok(Getter {
        source: Rc::from(source.trim()),
        expr,
    })
}

/// Compile `source` into a setter. Only plain paths (`a`, `a.b`, `a[0].c`)
/// are assignable.
pub fn compile_setter(source: &str) -> Result<Setter, ExprError> {
    let target = parse(source)?;
    if !target.is_path() {
        return Err(ExprError::NotAssignable(source.trim().to_string()));
    }
    Ok(Setter {
        source: Rc::from(source.trim()),
        target,
    })
}

/// Compile `source`, logging a failure and substituting a no-op getter.
pub fn compile_or_noop(source: &str) -> Getter {
    match compile(source) {
        Ok(getter) => getter,
        Err(error) => {
            warn!(expression = source, %error, "invalid expression, binding disabled");
            Getter::noop(source)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::observe;
    use serde_json::json;

    fn scope(data: serde_json::Value) -> Scope {
        let value = Value::from(data);
        observe(&value);
        Scope::root(value.as_object().cloned().unwrap())
    }

    #[test]
    fn parse_cache_is_bounded() {
        for n in 0..PARSE_CACHE_CAPACITY * 2 {
            parse(&format!("a + {n}")).unwrap();
        }
        assert_eq!(cached_sources(), PARSE_CACHE_CAPACITY);

        // Evicted sources still parse
        let first = parse("a + 0").unwrap();
        assert!(Rc::ptr_eq(&first, &parse("a + 0").unwrap()));
        assert_eq!(cached_sources(), PARSE_CACHE_CAPACITY);
    }

    #[test]
    fn compile_and_get() {
        let s = scope(json!({ "a": 1, "b": { "c": 2 } }));
        assert_eq!(compile("a + b.c").unwrap().get(&s), Value::from(3));
    }

    #[test]
    fn disallowed_keyword_becomes_noop() {
        let s = scope(json!({ "a": 5 }));
        assert_eq!(
            compile("let a = 1").unwrap_err(),
            ExprError::DisallowedKeyword("let".into())
        );
        assert_eq!(compile_or_noop("let a = 1").get(&s), Value::Undefined);
        assert_eq!(s.locals().get_untracked("a"), Value::from(5));
    }

    #[test]
    fn setter_writes_paths() {
        let s = scope(json!({ "user": { "name": "a" }, "list": [1, 2] }));
        compile_setter("user.name").unwrap().set(&s, Value::str("b"));
        compile_setter("list[1]").unwrap().set(&s, Value::from(9));
        compile_setter("fresh").unwrap().set(&s, Value::from(true));

        assert_eq!(compile("user.name").unwrap().get(&s), Value::str("b"));
        assert_eq!(compile("list[1]").unwrap().get(&s), Value::from(9));
        assert_eq!(compile("fresh").unwrap().get(&s), Value::Bool(true));
    }

    #[test]
    fn setter_rejects_non_paths() {
        assert_eq!(
            compile_setter("a + b").unwrap_err(),
            ExprError::NotAssignable("a + b".into())
        );
        assert!(compile_setter("f(a)").is_err());
    }

    #[test]
    fn setter_through_missing_object_is_skipped() {
        let s = scope(json!({}));
        compile_setter("missing.name").unwrap().set(&s, Value::from(1));
        assert_eq!(s.locals().len(), 0);
    }

    #[test]
    fn parse_results_are_cached() {
        let first = parse("cached + 1").unwrap();
        let second = parse("  cached + 1 ").unwrap();
        assert!(Rc::ptr_eq(&first, &second));
    }
}
