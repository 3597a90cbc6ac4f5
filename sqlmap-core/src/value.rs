//! The dynamic value representation passed between the renderer, the type
//! handlers and the result mapper.
//!
//! The teacher (`asphalt_core::types`) represents every bound value through
//! a compile-time generic (`ToSql<SqlTy, Db>`/`FromSql<'r, SqlTy, Db>`)
//! because its DSL knows every column's Rust type at the call site. This
//! runtime has no such luxury — a `MappedStatement` is addressed by a
//! string id and its parameter/result shape is only known once the mapping
//! document is parsed — so values flow through the pipeline as a small
//! dynamically-typed `Value`, and [`crate::type_handler::TypeHandler`]
//! converts at the edges (binding a driver parameter, reading a driver
//! column) instead of at every call site.
//!
//! `serde_json::Value` was deliberately not reused as-is for the *property
//! path* plumbing below even though parameter/result objects are commonly
//! constructed from it; `Value` adds a `Bytes` variant (for `BINARY`
//! columns, which JSON cannot represent) and keeps object field order via
//! `serde_json`'s `preserve_order` feature, which this crate depends on.

use std::fmt;

use serde_json::Map;

/// A dynamically-typed value flowing through the renderer/executor/mapper.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    I64(i64),
    F64(f64),
    Str(String),
    Bytes(Vec<u8>),
    Array(Vec<Value>),
    Object(Map<String, serde_json::Value>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::I64(v) => Some(*v),
            Value::F64(v) => Some(*v as i64),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::I64(v) => Some(*v as f64),
            Value::F64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(v) => Some(v),
            _ => None,
        }
    }

    /// Length, for the expression engine's `length(...)` built-in. Strings
    /// count chars, arrays/objects count elements/entries.
    pub fn size(&self) -> Option<usize> {
        match self {
            Value::Str(s) => Some(s.chars().count()),
            Value::Array(v) => Some(v.len()),
            Value::Object(m) => Some(m.len()),
            _ => None,
        }
    }

    /// The variant name, used by [`crate::cache::CacheKey`] to distinguish
    /// values that share a `Display` rendering but not a type (`Value::I64(1)`
    /// and `Value::Str("1")` both render `"1"`; `Value::Null` renders the
    /// same text as `Value::Str("null")`). Not used for anything
    /// user-visible.
    pub fn type_tag(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::I64(_) => "i64",
            Value::F64(_) => "f64",
            Value::Str(_) => "str",
            Value::Bytes(_) => "bytes",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
        }
    }

    /// Builds a `Value::Object` from `(key, json)` pairs; a small test/
    /// fixture convenience (production parameter objects arrive already
    /// parsed from `serde_json`, not built field-by-field).
    pub fn object(pairs: impl IntoIterator<Item = (String, serde_json::Value)>) -> Self {
        Value::Object(pairs.into_iter().collect())
    }

    /// Converts a JSON value (as produced by `serde_json`) into our `Value`.
    /// `serde_json` has no byte-string type, so JSON-sourced parameter
    /// objects never produce `Value::Bytes`.
    pub fn from_json(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::I64(i)
                } else {
                    Value::F64(n.as_f64().unwrap_or(0.0))
                }
            }
            serde_json::Value::String(s) => Value::Str(s),
            serde_json::Value::Array(a) => Value::Array(a.into_iter().map(Value::from_json).collect()),
            serde_json::Value::Object(o) => Value::Object(o),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::I64(i) => write!(f, "{i}"),
            Value::F64(v) => write!(f, "{v}"),
            Value::Str(s) => write!(f, "{s}"),
            Value::Bytes(b) => write!(f, "<{} bytes>", b.len()),
            Value::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Value::Object(map) => {
                write!(f, "{{")?;
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{k}={v}", v = Value::from_json(v.clone()))?;
                }
                write!(f, "}}")
            }
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}
impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::I64(v)
    }
}
impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::I64(v as i64)
    }
}
impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::F64(v)
    }
}
impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}
impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_owned())
    }
}
impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}
impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(v) => v.into(),
            None => Value::Null,
        }
    }
}
