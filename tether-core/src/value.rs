//! Dynamic Values
//!
//! Scopes hold loosely typed data, the way template expressions expect it.
//! A [`Value`] is either a primitive (compared by value) or a shared handle
//! to a reactive [`Object`], a reactive [`Array`] or a native [`Function`]
//! (compared by identity).
//!
//! Conversions to and from `serde_json::Value` are provided for initial
//! data, snapshots and the `JSON.*` expression helpers.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::rc::Rc;

use crate::reactive::{Array, Object};

/// A loosely typed value living in a scope.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    Str(Rc<str>),
    Object(Object),
    Array(Array),
    Function(Function),
}

impl Value {
    /// Build a string value.
    pub fn str(s: impl AsRef<str>) -> Self {
        Value::Str(Rc::from(s.as_ref()))
    }

    /// Name of the value's kind, as `typeof` would report it.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::Str(_) => "string",
            Value::Object(_) => "object",
            Value::Array(_) => "array",
            Value::Function(_) => "function",
        }
    }

    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Undefined | Value::Null)
    }

    /// Objects and arrays are containers: they carry their own observer.
    pub fn is_container(&self) -> bool {
        matches!(self, Value::Object(_) | Value::Array(_))
    }

    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Array> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&Function> {
        match self {
            Value::Function(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::Str(s) => !s.is_empty(),
            Value::Object(_) | Value::Array(_) | Value::Function(_) => true,
        }
    }

    /// Numeric coercion.
    pub fn to_number(&self) -> f64 {
        match self {
            Value::Undefined => f64::NAN,
            Value::Null => 0.0,
            Value::Bool(b) => f64::from(u8::from(*b)),
            Value::Number(n) => *n,
            Value::Str(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    0.0
                } else {
                    trimmed.parse().unwrap_or(f64::NAN)
                }
            }
            Value::Array(a) => match a.len() {
                0 => 0.0,
                1 => a.get_untracked(0).to_number(),
                _ => f64::NAN,
            },
            Value::Object(_) | Value::Function(_) => f64::NAN,
        }
    }

    /// Text used when a value is rendered into the page.
    ///
    /// `undefined` and `null` render as nothing; objects render as JSON.
    pub fn to_display_string(&self) -> String {
        match self {
            Value::Undefined | Value::Null => String::new(),
            Value::Object(_) => serde_json::to_string(&self.to_json()).unwrap_or_default(),
            other => other.to_js_string(),
        }
    }

    /// String coercion as `String(value)` performs it.
    pub fn to_js_string(&self) -> String {
        match self {
            Value::Undefined => "undefined".to_string(),
            Value::Null => "null".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => format_number(*n),
            Value::Str(s) => s.to_string(),
            Value::Object(_) => "[object Object]".to_string(),
            Value::Array(a) => a
                .to_vec_untracked()
                .iter()
                .map(Value::to_display_string)
                .collect::<Vec<_>>()
                .join(","),
            Value::Function(f) => format!("function {}", f.name()),
        }
    }

    /// Loose equality (`==`).
    pub fn loose_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (a, b) if a.is_nullish() && b.is_nullish() => true,
            (a, b) if a.is_nullish() || b.is_nullish() => false,
            (Value::Number(_), Value::Str(_))
            | (Value::Str(_), Value::Number(_))
            | (Value::Bool(_), _)
            | (_, Value::Bool(_)) => {
                if self.is_container() || other.is_container() {
                    self == other
                } else {
                    self.to_number() == other.to_number()
                }
            }
            _ => self == other,
        }
    }

    /// Recursive copy: containers are duplicated (unobserved), primitives cloned.
    pub fn deep_copy(&self) -> Value {
        fn copy(value: &Value, seen: &mut HashMap<u64, Value>) -> Value {
            match value {
                Value::Object(obj) => {
                    if let Some(existing) = seen.get(&obj.id()) {
                        return existing.clone();
                    }
                    let clone = Object::new();
                    seen.insert(obj.id(), Value::Object(clone.clone()));
                    for (key, child) in obj.entries_untracked() {
                        clone.set(&key, copy(&child, seen));
                    }
                    Value::Object(clone)
                }
                Value::Array(arr) => {
                    if let Some(existing) = seen.get(&arr.id()) {
                        return existing.clone();
                    }
                    let clone = Array::new();
                    seen.insert(arr.id(), Value::Array(clone.clone()));
                    clone.push(arr.to_vec_untracked().iter().map(|v| copy(v, seen)));
                    Value::Array(clone)
                }
                other => other.clone(),
            }
        }
        copy(self, &mut HashMap::new())
    }

    /// Build a plain (not yet observed) value from JSON.
    pub fn from_json(json: &serde_json::Value) -> Value {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::str(s),
            serde_json::Value::Array(items) => {
                Value::Array(Array::from_vec(items.iter().map(Value::from_json).collect()))
            }
            serde_json::Value::Object(map) => {
                let obj = Object::new();
                for (key, value) in map {
                    obj.set(key, Value::from_json(value));
                }
                Value::Object(obj)
            }
        }
    }

    /// Convert to JSON. Functions and `undefined` become `null`, as do
    /// back-references that would make the output cyclic.
    pub fn to_json(&self) -> serde_json::Value {
        fn convert(value: &Value, path: &mut HashSet<u64>) -> serde_json::Value {
            match value {
                Value::Undefined | Value::Null | Value::Function(_) => serde_json::Value::Null,
                Value::Bool(b) => serde_json::Value::Bool(*b),
                Value::Number(n) if n.fract() == 0.0 && n.abs() < 9_007_199_254_740_992.0 => {
                    serde_json::Value::Number(serde_json::Number::from(*n as i64))
                }
                Value::Number(n) => serde_json::Number::from_f64(*n)
                    .map(serde_json::Value::Number)
                    .unwrap_or(serde_json::Value::Null),
                Value::Str(s) => serde_json::Value::String(s.to_string()),
                Value::Object(obj) => {
                    if !path.insert(obj.id()) {
                        return serde_json::Value::Null;
                    }
                    let map = obj
                        .entries_untracked()
                        .into_iter()
                        .filter(|(_, v)| !matches!(v, Value::Undefined | Value::Function(_)))
                        .map(|(k, v)| (k, convert(&v, path)))
                        .collect();
                    path.remove(&obj.id());
                    serde_json::Value::Object(map)
                }
                Value::Array(arr) => {
                    if !path.insert(arr.id()) {
                        return serde_json::Value::Null;
                    }
                    let items = arr
                        .to_vec_untracked()
                        .iter()
                        .map(|v| convert(v, path))
                        .collect();
                    path.remove(&arr.id());
                    serde_json::Value::Array(items)
                }
            }
        }
        convert(self, &mut HashSet::new())
    }
}

/// Number formatting matching what templates expect (`3`, not `3.0`).
pub(crate) fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else if n == n.trunc() && n.abs() < 1e21 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

impl PartialEq for Value {
    /// Strict equality: primitives by value, containers and functions by
    /// identity.
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            (Value::Array(a), Value::Array(b)) => a.ptr_eq(b),
            (Value::Function(a), Value::Function(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => f.write_str("undefined"),
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Number(n) => f.write_str(&format_number(*n)),
            Value::Str(s) => write!(f, "{:?}", &**s),
            Value::Object(_) | Value::Array(_) => write!(f, "{}", self.to_json()),
            Value::Function(func) => write!(f, "function {}", func.name()),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(f64::from(n))
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Value::Number(n as f64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::str(s)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(Rc::from(s))
    }
}

impl From<Object> for Value {
    fn from(o: Object) -> Self {
        Value::Object(o)
    }
}

impl From<Array> for Value {
    fn from(a: Array) -> Self {
        Value::Array(a)
    }
}

impl From<Function> for Value {
    fn from(f: Function) -> Self {
        Value::Function(f)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(Array::from_vec(items))
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        Value::from_json(&json)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

// ----------------------------------------------------------------------------
// Functions
// ----------------------------------------------------------------------------

type NativeFn = dyn Fn(&[Value]) -> Value;

/// A native function callable from expressions (methods, event handlers).
#[derive(Clone)]
pub struct Function {
    name: Rc<str>,
    call: Rc<NativeFn>,
}

impl Function {
    pub fn new<F>(name: &str, call: F) -> Self
    where
        F: Fn(&[Value]) -> Value + 'static,
    {
        Self {
            name: Rc::from(name),
            call: Rc::new(call),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn call(&self, args: &[Value]) -> Value {
        (self.call)(args)
    }

    pub fn ptr_eq(&self, other: &Function) -> bool {
        std::ptr::eq(
            Rc::as_ptr(&self.call) as *const (),
            Rc::as_ptr(&other.call) as *const (),
        )
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Function({})", self.name)
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
