//! The runtime value model: the closed set of value variants, coercion
//! between them, equality, and the per-variant operator tables that back the
//! expression evaluator's `BinaryOp`/`UnaryOp` dispatch.
//!
//! This is the "dynamic dispatch on values" design note from the
//! specification made concrete: each operator below is a pure function over
//! a tagged `Value` pair (or single operand) returning another `Value` —
//! never a panic, never a Rust-level `Err` that the evaluator has to unwind.
//! A failure is just another `Value::Error` flowing downstream.

use bigdecimal::BigDecimal;
use num_traits::{ToPrimitive, Zero};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;

/// A host-provided callable. Accepts already-evaluated arguments and
/// produces a `Value` — which may itself be `Value::Pending`.
pub type NativeFn = Arc<dyn Fn(&[Value]) -> Value + Send + Sync>;

/// The body of a deferred computation. Invoked off the calling thread by the
/// runtime driver; resolves to a final value or an `Error`.
pub type PendingThunk = Arc<dyn Fn() -> Value + Send + Sync>;

/// The closed set of runtime value variants (spec §3).
#[derive(Clone)]
pub enum Value {
    Number(BigDecimal),
    String(Arc<str>),
    Boolean(bool),
    Object(ValueObject),
    List(Vec<Value>),
    Function(NativeFn),
    Pending(PendingThunk),
    Error(ValueError),
}

impl Value {
    pub fn string(s: impl Into<Arc<str>>) -> Value {
        Value::String(s.into())
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Number(_) => "Number",
            Value::String(_) => "String",
            Value::Boolean(_) => "Boolean",
            Value::Object(_) => "Object",
            Value::List(_) => "List",
            Value::Function(_) => "Function",
            Value::Pending(_) => "Pending",
            Value::Error(_) => "Error",
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Value::Error(_))
    }

    fn error(kind: ErrorKind, message: impl Into<String>) -> Value {
        Value::Error(ValueError::new(kind, message))
    }

    // ── Coercion (spec §4.8 coercion table) ────────────────────────────

    /// `CastNumber`. An `Error` operand propagates itself rather than being
    /// reported as a fresh coercion failure.
    pub fn coerce_number(&self) -> Result<BigDecimal, ValueError> {
        match self {
            Value::Number(n) => Ok(n.clone()),
            Value::String(s) => BigDecimal::from_str(s.trim()).map_err(|_| {
                ValueError::new(
                    ErrorKind::CoercionFailed,
                    format!("cannot coerce string '{s}' to Number"),
                )
            }),
            Value::Boolean(b) => Ok(BigDecimal::from(if *b { 1 } else { 0 })),
            Value::Error(e) => Err(e.clone()),
            other => Err(ValueError::new(
                ErrorKind::CoercionFailed,
                format!("cannot coerce {} to Number", other.type_name()),
            )),
        }
    }

    /// `CastString`.
    pub fn coerce_string(&self) -> Result<String, ValueError> {
        match self {
            Value::Number(n) => Ok(n.to_string()),
            Value::Boolean(b) => Ok(if *b { "true".to_string() } else { "false".to_string() }),
            Value::String(s) => Ok(s.to_string()),
            Value::Error(e) => Err(e.clone()),
            other => Err(ValueError::new(
                ErrorKind::CoercionFailed,
                format!("cannot coerce {} to String", other.type_name()),
            )),
        }
    }

    /// `CastBoolean`.
    pub fn coerce_boolean(&self) -> Result<bool, ValueError> {
        match self {
            Value::Boolean(b) => Ok(*b),
            Value::Number(n) => Ok(!n.is_zero()),
            Value::String(s) => match s.to_ascii_lowercase().as_str() {
                "true" => Ok(true),
                "false" => Ok(false),
                _ => Err(ValueError::new(
                    ErrorKind::CoercionFailed,
                    format!("cannot coerce string '{s}' to Boolean"),
                )),
            },
            Value::Error(e) => Err(e.clone()),
            other => Err(ValueError::new(
                ErrorKind::CoercionFailed,
                format!("cannot coerce {} to Boolean", other.type_name()),
            )),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => write!(f, "Number({n})"),
            Value::String(s) => write!(f, "String({s:?})"),
            Value::Boolean(b) => write!(f, "Boolean({b})"),
            Value::Object(o) => write!(f, "{o:?}"),
            Value::List(items) => write!(f, "List({items:?})"),
            Value::Function(_) => write!(f, "Function(<native>)"),
            Value::Pending(_) => write!(f, "Pending(<thunk>)"),
            Value::Error(e) => write!(f, "Error({e})"),
        }
    }
}

// ── Object ──────────────────────────────────────────────────────────

/// An ordered string→Value mapping with case-insensitive key lookup and
/// insertion-order iteration (spec §3).
#[derive(Clone, Default)]
pub struct ValueObject {
    entries: Vec<(String, Value)>,
    index: HashMap<String, usize>,
}

impl ValueObject {
    pub fn new() -> Self {
        Self::default()
    }

    fn normalize(key: &str) -> String {
        key.to_ascii_lowercase()
    }

    /// Inserts `key`/`value`, overwriting any existing entry with the same
    /// case-insensitive key while preserving its original position. Returns
    /// `true` if `key` was already present.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> bool {
        let key = key.into();
        let norm = Self::normalize(&key);
        if let Some(&pos) = self.index.get(&norm) {
            self.entries[pos] = (key, value);
            true
        } else {
            self.index.insert(norm, self.entries.len());
            self.entries.push((key, value));
            false
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.index.get(&Self::normalize(key)).map(|&pos| &self.entries[pos].1)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.index.contains_key(&Self::normalize(key))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl fmt::Debug for ValueObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.entries.iter().map(|(k, v)| (k, v))).finish()
    }
}

impl<'a> IntoIterator for &'a ValueObject {
    type Item = (&'a str, &'a Value);
    type IntoIter = Box<dyn Iterator<Item = (&'a str, &'a Value)> + 'a>;
    fn into_iter(self) -> Self::IntoIter {
        Box::new(self.iter())
    }
}

// ── Errors (spec §6 RuntimeError kinds) ────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    UnresolvedIdentifier,
    AccessUnsupported,
    AccessFailed,
    InvokeUnsupported,
    CoercionFailed,
    MathDomain,
    DuplicateKey,
    Timeout,
    Internal,
}

/// A carried runtime failure: a kind tag plus a human-readable message.
/// Never unwinds — it is a normal `Value` that flows through slots, skip
/// list checks, and operator coercion like any other value.
#[derive(Debug, Clone, Error, Serialize, Deserialize)]
#[error("{kind:?}: {message}")]
pub struct ValueError {
    pub kind: ErrorKind,
    pub message: String,
}

impl ValueError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

// ── Equality (spec §4.8) ────────────────────────────────────────────

/// Value equality never errors — unsupported pairings are simply unequal.
pub fn value_equals(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x == y,
        (Value::String(x), Value::String(y)) => x == y,
        (Value::Boolean(x), Value::Boolean(y)) => x == y,
        (Value::Number(n), Value::String(s)) | (Value::String(s), Value::Number(n)) => {
            n.to_string() == s.as_ref()
        }
        _ => false,
    }
}

// ── Operators ───────────────────────────────────────────────────────
//
// Each binary/unary operator coerces its operand(s) to the type it expects
// and, on coercion failure (including a propagated `Error` operand),
// produces `Value::Error` rather than a Rust `Result` the caller has to
// handle — this is what lets the evaluator treat every operator uniformly.

fn numeric_binop(
    a: &Value,
    b: &Value,
    f: impl FnOnce(BigDecimal, BigDecimal) -> Result<BigDecimal, ValueError>,
) -> Value {
    match (a.coerce_number(), b.coerce_number()) {
        (Ok(x), Ok(y)) => match f(x, y) {
            Ok(v) => Value::Number(v),
            Err(e) => Value::Error(e),
        },
        (Err(e), _) => Value::Error(e),
        (_, Err(e)) => Value::Error(e),
    }
}

pub fn add(a: &Value, b: &Value) -> Value {
    numeric_binop(a, b, |x, y| Ok(x + y))
}

pub fn sub(a: &Value, b: &Value) -> Value {
    numeric_binop(a, b, |x, y| Ok(x - y))
}

pub fn mul(a: &Value, b: &Value) -> Value {
    numeric_binop(a, b, |x, y| Ok(x * y))
}

pub fn div(a: &Value, b: &Value) -> Value {
    numeric_binop(a, b, |x, y| {
        if y.is_zero() {
            Err(ValueError::new(ErrorKind::MathDomain, "division by zero"))
        } else {
            Ok(x / y)
        }
    })
}

pub fn rem(a: &Value, b: &Value) -> Value {
    numeric_binop(a, b, |x, y| {
        if y.is_zero() {
            return Err(ValueError::new(ErrorKind::MathDomain, "remainder by zero"));
        }
        if !x.is_integer() || !y.is_integer() {
            return Err(ValueError::new(
                ErrorKind::MathDomain,
                "non-integer remainder",
            ));
        }
        Ok(x % y)
    })
}

pub fn pow(a: &Value, b: &Value) -> Value {
    numeric_binop(a, b, |base, exp| {
        if base.is_zero() && exp.is_zero() {
            return Err(ValueError::new(ErrorKind::MathDomain, "0^0 is undefined"));
        }
        if !exp.is_integer() {
            return Err(ValueError::new(
                ErrorKind::MathDomain,
                "fractional exponents are not supported",
            ));
        }
        let exp_i64 = exp
            .to_i64()
            .ok_or_else(|| ValueError::new(ErrorKind::MathDomain, "exponent out of range"))?;
        if exp_i64 >= 0 {
            let mut acc = BigDecimal::from(1);
            for _ in 0..exp_i64 {
                acc *= &base;
            }
            Ok(acc)
        } else {
            if base.is_zero() {
                return Err(ValueError::new(
                    ErrorKind::MathDomain,
                    "division by zero in negative exponent",
                ));
            }
            let mut acc = BigDecimal::from(1);
            for _ in 0..(-exp_i64) {
                acc *= &base;
            }
            Ok(BigDecimal::from(1) / acc)
        }
    })
}

pub fn negate(a: &Value) -> Value {
    match a.coerce_number() {
        Ok(n) => Value::Number(-n),
        Err(e) => Value::Error(e),
    }
}

pub fn logical_not(a: &Value) -> Value {
    match a.coerce_boolean() {
        Ok(b) => Value::Boolean(!b),
        Err(e) => Value::Error(e),
    }
}

pub fn logical_and(a: &Value, b: &Value) -> Value {
    match (a.coerce_boolean(), b.coerce_boolean()) {
        (Ok(x), Ok(y)) => Value::Boolean(x && y),
        (Err(e), _) => Value::Error(e),
        (_, Err(e)) => Value::Error(e),
    }
}

pub fn logical_or(a: &Value, b: &Value) -> Value {
    match (a.coerce_boolean(), b.coerce_boolean()) {
        (Ok(x), Ok(y)) => Value::Boolean(x || y),
        (Err(e), _) => Value::Error(e),
        (_, Err(e)) => Value::Error(e),
    }
}

pub fn concat(a: &Value, b: &Value) -> Value {
    match (a.coerce_string(), b.coerce_string()) {
        (Ok(x), Ok(y)) => Value::string(format!("{x}{y}")),
        (Err(e), _) => Value::Error(e),
        (_, Err(e)) => Value::Error(e),
    }
}

fn compare(a: &Value, b: &Value, f: impl FnOnce(std::cmp::Ordering) -> bool) -> Value {
    match (a.coerce_number(), b.coerce_number()) {
        (Ok(x), Ok(y)) => Value::Boolean(f(x.cmp(&y))),
        (Err(e), _) => Value::Error(e),
        (_, Err(e)) => Value::Error(e),
    }
}

pub fn less_than(a: &Value, b: &Value) -> Value {
    compare(a, b, |o| o.is_lt())
}

pub fn less_equal(a: &Value, b: &Value) -> Value {
    compare(a, b, |o| o.is_le())
}

pub fn greater_than(a: &Value, b: &Value) -> Value {
    compare(a, b, |o| o.is_gt())
}

pub fn greater_equal(a: &Value, b: &Value) -> Value {
    compare(a, b, |o| o.is_ge())
}

pub fn equal(a: &Value, b: &Value) -> Value {
    Value::Boolean(value_equals(a, b))
}

pub fn not_equal(a: &Value, b: &Value) -> Value {
    Value::Boolean(!value_equals(a, b))
}

/// Object member access: case-insensitive key lookup on an `Object`, a
/// type error on anything else (spec §4.8 `Access`).
pub fn access(target: &Value, member: &str) -> Value {
    match target {
        Value::Object(obj) => obj
            .get(member)
            .cloned()
            .unwrap_or_else(|| Value::error(ErrorKind::AccessFailed, format!("no member '{member}'"))),
        Value::Error(e) => Value::Error(e.clone()),
        other => Value::error(
            ErrorKind::AccessUnsupported,
            format!("cannot access member '{member}' on {}", other.type_name()),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn num(s: &str) -> Value {
        Value::Number(BigDecimal::from_str(s).unwrap())
    }

    #[test]
    fn add_coerces_strings() {
        let result = add(&num("1"), &Value::string("2"));
        match result {
            Value::Number(n) => assert_eq!(n, BigDecimal::from(3)),
            other => panic!("expected Number, got {other:?}"),
        }
    }

    #[test]
    fn divide_by_zero_is_math_domain() {
        let result = div(&num("1"), &num("0"));
        match result {
            Value::Error(e) => assert_eq!(e.kind, ErrorKind::MathDomain),
            other => panic!("expected Error, got {other:?}"),
        }
    }

    #[test]
    fn zero_pow_zero_is_undefined() {
        let result = pow(&num("0"), &num("0"));
        assert!(matches!(result, Value::Error(ValueError { kind: ErrorKind::MathDomain, .. })));
    }

    #[test]
    fn number_string_equality_is_stringified() {
        assert!(value_equals(&num("1"), &Value::string("1")));
        assert!(!value_equals(&num("1.0"), &Value::string("1")));
    }

    #[test]
    fn object_lookup_is_case_insensitive() {
        let mut obj = ValueObject::new();
        obj.insert("Name", Value::string("ada"));
        assert!(matches!(obj.get("name"), Some(Value::String(_))));
    }

    #[test]
    fn access_on_non_object_is_unsupported() {
        let result = access(&num("1"), "x");
        assert!(matches!(
            result,
            Value::Error(ValueError { kind: ErrorKind::AccessUnsupported, .. })
        ));
    }

    #[test]
    fn coercion_of_error_propagates_it() {
        let err = Value::Error(ValueError::new(ErrorKind::Internal, "boom"));
        let result = add(&err, &num("1"));
        match result {
            Value::Error(e) => assert_eq!(e.kind, ErrorKind::Internal),
            other => panic!("expected propagated Error, got {other:?}"),
        }
    }
}
