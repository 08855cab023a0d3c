//! Expression interpreter.
//!
//! Evaluates an [`Expr`] against a [`Scope`]. Every property read goes
//! through the reactive accessors, so evaluating inside a watcher records
//! exactly the deps the expression touched. Evaluation never fails: a bad
//! call or a read through `undefined` yields `undefined`.

use tracing::warn;

use crate::reactive::{Array, Object};
use crate::scope::Scope;
use crate::value::Value;

use super::ast::{BinaryOp, Expr, LogicalOp, UnaryOp};
use super::helpers;

/// Evaluate `expr` against `scope`.
pub fn evaluate(expr: &Expr, scope: &Scope) -> Value {
    match expr {
        Expr::Literal(value) => value.clone(),
        Expr::Ident(name) => scope.lookup(name),
        Expr::Global(name) => helpers::global_value(*name),
        Expr::Member(object, name) => match object.as_ref() {
            Expr::Global(namespace) => {
                helpers::namespace_member(namespace, name).unwrap_or(Value::Undefined)
            }
            object => member(&evaluate(object, scope), name),
        },
        Expr::Index(object, index) => {
            let object = evaluate(object, scope);
            let index = evaluate(index, scope);
            match (&object, &index) {
                (Value::Array(array), Value::Number(n)) if *n >= 0.0 && n.fract() == 0.0 => {
                    array.get(*n as usize)
                }
                _ => member(&object, &index.to_js_string()),
            }
        }
        Expr::Call(callee, args) => {
            let args: Vec<Value> = args.iter().map(|arg| evaluate(arg, scope)).collect();
            call(callee, &args, scope)
        }
        Expr::Unary(op, operand) => unary(*op, evaluate(operand, scope)),
        Expr::Binary(op, left, right) => {
            binary(*op, &evaluate(left, scope), &evaluate(right, scope))
        }
        Expr::Logical(op, left, right) => {
            let left = evaluate(left, scope);
            let short_circuit = match op {
                LogicalOp::And => !left.is_truthy(),
                LogicalOp::Or => left.is_truthy(),
                LogicalOp::Coalesce => !left.is_nullish(),
            };
            if short_circuit {
                left
            } else {
                evaluate(right, scope)
            }
        }
        Expr::Conditional(test, then, otherwise) => {
            if evaluate(test, scope).is_truthy() {
                evaluate(then, scope)
            } else {
                evaluate(otherwise, scope)
            }
        }
        Expr::Array(items) => Value::Array(Array::from_vec(
            items.iter().map(|item| evaluate(item, scope)).collect(),
        )),
        Expr::Object(entries) => Value::Object(Object::from_pairs(
            entries
                .iter()
                .map(|(key, value)| (key.clone(), evaluate(value, scope))),
        )),
    }
}

/// Read `name` from `value`.
pub(crate) fn member(value: &Value, name: &str) -> Value {
    match value {
        Value::Object(object) => object.get(name),
        Value::Array(array) => match name.parse::<usize>() {
            Ok(index) => array.get(index),
            Err(_) => helpers::property(value, name).unwrap_or(Value::Undefined),
        },
        Value::Str(s) => match name.parse::<usize>() {
            Ok(index) => s
                .chars()
                .nth(index)
                .map_or(Value::Undefined, |c| Value::from(c.to_string())),
            Err(_) => helpers::property(value, name).unwrap_or(Value::Undefined),
        },
        _ => Value::Undefined,
    }
}

fn call(callee: &Expr, args: &[Value], scope: &Scope) -> Value {
    let function = match callee {
        Expr::Member(object, name) => {
            if let Expr::Global(namespace) = object.as_ref() {
                helpers::namespace_member(namespace, name).unwrap_or(Value::Undefined)
            } else {
                let receiver = evaluate(object, scope);
                match &receiver {
                    Value::Object(object) => object.get(name),
                    other => match helpers::call_method(other, name, args) {
                        Some(result) => return result,
                        None => {
                            warn!(
                                method = name.as_str(),
                                receiver = other.type_name(),
                                "method is not available"
                            );
                            return Value::Undefined;
                        }
                    },
                }
            }
        }
        other => evaluate(other, scope),
    };

    match function {
        Value::Function(f) => f.call(args),
        other => {
            warn!(callee = ?callee, found = other.type_name(), "value is not a function");
            Value::Undefined
        }
    }
}

fn unary(op: UnaryOp, value: Value) -> Value {
    match op {
        UnaryOp::Not => Value::Bool(!value.is_truthy()),
        UnaryOp::Neg => Value::Number(-value.to_number()),
        UnaryOp::Plus => Value::Number(value.to_number()),
        UnaryOp::Typeof => Value::str(match value {
            Value::Null | Value::Array(_) | Value::Object(_) => "object",
            other => other.type_name(),
        }),
    }
}

fn binary(op: BinaryOp, left: &Value, right: &Value) -> Value {
    match op {
        BinaryOp::Add => add(left, right),
        BinaryOp::Sub => Value::Number(left.to_number() - right.to_number()),
        BinaryOp::Mul => Value::Number(left.to_number() * right.to_number()),
        BinaryOp::Div => Value::Number(left.to_number() / right.to_number()),
        BinaryOp::Rem => Value::Number(left.to_number() % right.to_number()),
        BinaryOp::Eq => Value::Bool(left.loose_eq(right)),
        BinaryOp::NotEq => Value::Bool(!left.loose_eq(right)),
        BinaryOp::StrictEq => Value::Bool(left == right),
        BinaryOp::StrictNotEq => Value::Bool(left != right),
        BinaryOp::Less => compare(left, right, |o| o.is_lt()),
        BinaryOp::LessEq => compare(left, right, |o| o.is_le()),
        BinaryOp::Greater => compare(left, right, |o| o.is_gt()),
        BinaryOp::GreaterEq => compare(left, right, |o| o.is_ge()),
    }
}

/// Numeric addition for numbers and booleans, concatenation otherwise.
/// `undefined` and `null` concatenate as the empty string.
fn add(left: &Value, right: &Value) -> Value {
    let numeric = |v: &Value| matches!(v, Value::Number(_) | Value::Bool(_));
    if numeric(left) && numeric(right) {
        Value::Number(left.to_number() + right.to_number())
    } else {
        let mut out = left.to_display_string();
        out.push_str(&right.to_display_string());
        Value::from(out)
    }
}

fn compare(left: &Value, right: &Value, test: fn(std::cmp::Ordering) -> bool) -> Value {
    let ordering = match (left, right) {
        (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
        _ => left.to_number().partial_cmp(&right.to_number()),
    };
    Value::Bool(ordering.is_some_and(test))
}
