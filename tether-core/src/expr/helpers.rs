//! Allow-listed helpers.
//!
//! Expressions may call a fixed set of pure functions (`Math.*`,
//! `parseInt`, `JSON.stringify`, ...) and a fixed set of methods on string,
//! array and number values. Nothing outside these lists is reachable.

use std::cell::RefCell;
use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::reactive::Array;
use crate::value::{format_number, Function, Value};

const NAMESPACES: &[&str] = &["Math", "JSON", "Date"];

const FUNCTIONS: &[&str] = &[
    "parseInt",
    "parseFloat",
    "isNaN",
    "isFinite",
    "String",
    "Number",
    "Boolean",
    "encodeURIComponent",
    "decodeURIComponent",
];

type Native = fn(&[Value]) -> Value;

thread_local! {
    // One shared Function per helper, so a helper is identical to itself
    // across evaluations.
    static FUNCTION_CACHE: RefCell<HashMap<&'static str, Function>> = RefCell::new(HashMap::new());
}

/// The canonical name of a global helper, if `name` is one.
pub fn global_name(name: &str) -> Option<&'static str> {
    NAMESPACES
        .iter()
        .chain(FUNCTIONS.iter())
        .find(|candidate| **candidate == name)
        .copied()
}

/// The value of a bare global: a function for function helpers, `undefined`
/// for namespaces.
pub fn global_value(name: &'static str) -> Value {
    native(name).map_or(Value::Undefined, |f| Value::Function(cached(name, f)))
}

/// `Math.PI`, `Math.max`, `JSON.parse`, ...
pub fn namespace_member(namespace: &str, member: &str) -> Option<Value> {
    match (namespace, member) {
        ("Math", "PI") => return Some(Value::Number(std::f64::consts::PI)),
        ("Math", "E") => return Some(Value::Number(std::f64::consts::E)),
        _ => {}
    }
    let path: &'static str = NAMESPACE_MEMBERS
        .iter()
        .find(|path| {
            path.split_once('.')
                .is_some_and(|(ns, name)| ns == namespace && name == member)
        })
        .copied()?;
    native(path).map(|f| Value::Function(cached(path, f)))
}

const NAMESPACE_MEMBERS: &[&str] = &[
    "Math.abs",
    "Math.ceil",
    "Math.floor",
    "Math.round",
    "Math.trunc",
    "Math.sign",
    "Math.max",
    "Math.min",
    "Math.pow",
    "Math.sqrt",
    "Date.now",
    "JSON.stringify",
    "JSON.parse",
];

fn cached(path: &'static str, f: Native) -> Function {
    FUNCTION_CACHE.with(|cache| {
        cache
            .borrow_mut()
            .entry(path)
            .or_insert_with(|| Function::new(path, f))
            .clone()
    })
}

fn arg(args: &[Value], index: usize) -> Value {
    args.get(index).cloned().unwrap_or(Value::Undefined)
}

fn num(args: &[Value], index: usize) -> f64 {
    arg(args, index).to_number()
}

fn math(f: fn(f64) -> f64) -> impl Fn(&[Value]) -> Value {
    move |args| Value::Number(f(num(args, 0)))
}

fn native(path: &str) -> Option<Native> {
    let f: Native = match path {
        "Math.abs" => |a| math(f64::abs)(a),
        "Math.ceil" => |a| math(f64::ceil)(a),
        "Math.floor" => |a| math(f64::floor)(a),
        "Math.round" => |a| math(|n| (n + 0.5).floor())(a),
        "Math.trunc" => |a| math(f64::trunc)(a),
        "Math.sign" => |a| {
            math(|n| {
                if n.is_nan() || n == 0.0 {
                    n
                } else {
                    n.signum()
                }
            })(a)
        },
        "Math.sqrt" => |a| math(f64::sqrt)(a),
        "Math.pow" => |a| Value::Number(num(a, 0).powf(num(a, 1))),
        "Math.max" => |a| {
            Value::Number(a.iter().map(Value::to_number).fold(f64::NEG_INFINITY, |acc, n| {
                if acc.is_nan() || n.is_nan() {
                    f64::NAN
                } else {
                    acc.max(n)
                }
            }))
        },
        "Math.min" => |a| {
            Value::Number(a.iter().map(Value::to_number).fold(f64::INFINITY, |acc, n| {
                if acc.is_nan() || n.is_nan() {
                    f64::NAN
                } else {
                    acc.min(n)
                }
            }))
        },
        "Date.now" => |_| {
            let millis = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_millis() as f64)
                .unwrap_or(0.0);
            Value::Number(millis)
        },
        "JSON.stringify" => |a| {
            let value = arg(a, 0);
            if matches!(value, Value::Undefined | Value::Function(_)) {
                return Value::Undefined;
            }
            serde_json::to_string(&value.to_json())
                .map(Value::from)
                .unwrap_or(Value::Undefined)
        },
        "JSON.parse" => |a| {
            serde_json::from_str::<serde_json::Value>(&arg(a, 0).to_js_string())
                .map(Value::from)
                .unwrap_or(Value::Undefined)
        },
        "parseInt" => |a| Value::Number(parse_int(&arg(a, 0).to_js_string(), arg(a, 1))),
        "parseFloat" => |a| Value::Number(parse_float(&arg(a, 0).to_js_string())),
        "isNaN" => |a| Value::Bool(num(a, 0).is_nan()),
        "isFinite" => |a| Value::Bool(num(a, 0).is_finite()),
        "String" => |a| match a.first() {
            Some(value) => Value::str(value.to_js_string()),
            None => Value::str(""),
        },
        "Number" => |a| Value::Number(if a.is_empty() { 0.0 } else { num(a, 0) }),
        "Boolean" => |a| Value::Bool(arg(a, 0).is_truthy()),
        "encodeURIComponent" => |a| Value::from(encode_uri_component(&arg(a, 0).to_js_string())),
        "decodeURIComponent" => |a| Value::from(decode_uri_component(&arg(a, 0).to_js_string())),
        _ => return None,
    };
    Some(f)
}

fn parse_int(text: &str, radix: Value) -> f64 {
    let text = text.trim();
    let (negative, text) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text.strip_prefix('+').unwrap_or(text)),
    };
    let mut radix = match radix {
        Value::Undefined => 10,
        other => other.to_number() as u32,
    };
    let mut digits = text;
    if radix == 0 || radix == 16 {
        if let Some(rest) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
            digits = rest;
            radix = 16;
        }
    }
    if radix == 0 {
        radix = 10;
    }
    if !(2..=36).contains(&radix) {
        return f64::NAN;
    }
    let valid: String = digits.chars().take_while(|c| c.is_digit(radix)).collect();
    if valid.is_empty() {
        return f64::NAN;
    }
    let value = valid
        .chars()
        .filter_map(|c| c.to_digit(radix))
        .fold(0.0, |acc, d| acc * f64::from(radix) + f64::from(d));
    if negative {
        -value
    } else {
        value
    }
}

fn parse_float(text: &str) -> f64 {
    let text = text.trim_start();
    let mut end = 0;
    let mut seen_dot = false;
    let mut seen_exp = false;
    let bytes = text.as_bytes();
    while end < bytes.len() {
        let c = bytes[end];
        let ok = match c {
            b'0'..=b'9' => true,
            b'+' | b'-' => end == 0 || matches!(bytes[end - 1], b'e' | b'E'),
            b'.' if !seen_dot && !seen_exp => {
                seen_dot = true;
                true
            }
            b'e' | b'E' if !seen_exp && end > 0 => {
                seen_exp = true;
                true
            }
            _ => false,
        };
        if !ok {
            break;
        }
        end += 1;
    }
    // Back off a dangling exponent or sign.
    let mut candidate = &text[..end];
    while !candidate.is_empty() {
        if let Ok(n) = candidate.parse::<f64>() {
            return n;
        }
        candidate = &candidate[..candidate.len() - 1];
    }
    if text.starts_with("Infinity") {
        f64::INFINITY
    } else if text.starts_with("-Infinity") {
        f64::NEG_INFINITY
    } else {
        f64::NAN
    }
}

fn encode_uri_component(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for byte in text.bytes() {
        match byte {
            b'A'..=b'Z'
            | b'a'..=b'z'
            | b'0'..=b'9'
            | b'-'
            | b'_'
            | b'.'
            | b'!'
            | b'~'
            | b'*'
            | b'\''
            | b'('
            | b')' => out.push(char::from(byte)),
            other => out.push_str(&format!("%{other:02X}")),
        }
    }
    out
}

fn decode_uri_component(text: &str) -> String {
    let bytes = text.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let byte = std::str::from_utf8(&bytes[i + 1..i + 3])
                .ok()
                .and_then(|hex| u8::from_str_radix(hex, 16).ok());
            if let Some(byte) = byte {
                out.push(byte);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// Read a built-in property of a primitive or array (`length`).
pub fn property(receiver: &Value, name: &str) -> Option<Value> {
    match (receiver, name) {
        (Value::Str(s), "length") => Some(Value::from(s.chars().count())),
        (Value::Array(a), "length") => Some(Value::from(a.len())),
        _ => None,
    }
}

/// Call an allow-listed method on a value. `None` if the method is not
/// allowed for that kind of value.
pub fn call_method(receiver: &Value, method: &str, args: &[Value]) -> Option<Value> {
    match receiver {
        Value::Str(s) => string_method(s, method, args),
        Value::Array(a) => array_method(a, method, args),
        Value::Number(n) => number_method(*n, method, args),
        _ => None,
    }
}

/// Resolve a possibly negative `slice` bound against `len`.
fn relative_index(value: &Value, len: usize, default: usize) -> usize {
    if value.is_nullish() {
        return default;
    }
    let n = value.to_number();
    if n.is_nan() {
        return 0;
    }
    let n = n.trunc();
    if n < 0.0 {
        len.saturating_sub((-n) as usize)
    } else {
        (n as usize).min(len)
    }
}

fn clamp_index(value: &Value, len: usize, default: usize) -> usize {
    if value.is_nullish() {
        return default;
    }
    let n = value.to_number();
    if n.is_nan() || n < 0.0 {
        0
    } else {
        (n as usize).min(len)
    }
}

fn string_method(s: &str, method: &str, args: &[Value]) -> Option<Value> {
    let chars: Vec<char> = s.chars().collect();
    let len = chars.len();
    let text = |from: usize, to: usize| Value::from(chars[from..to.max(from)].iter().collect::<String>());
    let needle = || arg(args, 0).to_js_string();
    let char_index_of = |hay: &str, needle: &str, from: usize| -> Option<usize> {
        let byte_from = hay.char_indices().nth(from).map_or(hay.len(), |(i, _)| i);
        hay[byte_from..]
            .find(needle)
            .map(|byte| hay[..byte_from + byte].chars().count())
    };

    let value = match method {
        "toUpperCase" => Value::from(s.to_uppercase()),
        "toLowerCase" => Value::from(s.to_lowercase()),
        "trim" => Value::str(s.trim()),
        "indexOf" => {
            let from = clamp_index(&arg(args, 1), len, 0);
            match char_index_of(s, &needle(), from) {
                Some(i) => Value::from(i),
                None => Value::Number(-1.0),
            }
        }
        "includes" => Value::Bool(char_index_of(s, &needle(), clamp_index(&arg(args, 1), len, 0)).is_some()),
        "startsWith" => Value::Bool(s.starts_with(needle().as_str())),
        "endsWith" => Value::Bool(s.ends_with(needle().as_str())),
        "charAt" => {
            let index = arg(args, 0).to_number();
            let index = if index.is_nan() { 0.0 } else { index };
            if index < 0.0 || index as usize >= len {
                Value::str("")
            } else {
                text(index as usize, index as usize + 1)
            }
        }
        "slice" => {
            let from = relative_index(&arg(args, 0), len, 0);
            let to = relative_index(&arg(args, 1), len, len);
            text(from, to)
        }
        "substring" => {
            let a = clamp_index(&arg(args, 0), len, 0);
            let b = clamp_index(&arg(args, 1), len, len);
            text(a.min(b), a.max(b))
        }
        "split" => {
            let separator = arg(args, 0);
            let parts: Vec<Value> = match separator {
                Value::Undefined => vec![Value::str(s)],
                sep => {
                    let sep = sep.to_js_string();
                    if sep.is_empty() {
                        chars.iter().map(|c| Value::from(c.to_string())).collect()
                    } else {
                        s.split(sep.as_str()).map(Value::str).collect()
                    }
                }
            };
            Value::Array(Array::from_vec(parts))
        }
        "replace" => {
            let replacement = arg(args, 1).to_js_string();
            Value::from(s.replacen(needle().as_str(), &replacement, 1))
        }
        _ => return None,
    };
    Some(value)
}

fn array_method(array: &Array, method: &str, args: &[Value]) -> Option<Value> {
    array.depend();
    let items = array.to_vec_untracked();
    let len = items.len();
    let value = match method {
        "indexOf" => match items.iter().position(|item| *item == arg(args, 0)) {
            Some(i) => Value::from(i),
            None => Value::Number(-1.0),
        },
        "includes" => {
            let needle = arg(args, 0);
            Value::Bool(items.iter().any(|item| {
                *item == needle
                    || matches!((item, &needle), (Value::Number(a), Value::Number(b)) if a.is_nan() && b.is_nan())
            }))
        }
        "join" => {
            let separator = match arg(args, 0) {
                Value::Undefined => ",".to_string(),
                other => other.to_js_string(),
            };
            Value::from(
                items
                    .iter()
                    .map(Value::to_display_string)
                    .collect::<Vec<_>>()
                    .join(&separator),
            )
        }
        "slice" => {
            let from = relative_index(&arg(args, 0), len, 0);
            let to = relative_index(&arg(args, 1), len, len);
            Value::Array(Array::from_vec(items[from..to.max(from)].to_vec()))
        }
        "concat" => {
            let mut out = items;
            for extra in args {
                match extra {
                    Value::Array(more) => out.extend(more.to_vec_untracked()),
                    other => out.push(other.clone()),
                }
            }
            Value::Array(Array::from_vec(out))
        }
        _ => return None,
    };
    Some(value)
}

fn number_method(n: f64, method: &str, args: &[Value]) -> Option<Value> {
    match method {
        "toFixed" => {
            let digits = arg(args, 0).to_number();
            let digits = if digits.is_nan() { 0 } else { digits.clamp(0.0, 100.0) as usize };
            if !n.is_finite() {
                return Some(Value::from(format_number(n)));
            }
            Some(Value::from(format!("{n:.digits$}")))
        }
        "toString" => Some(Value::from(format_number(n))),
        _ => None,
    }
}
