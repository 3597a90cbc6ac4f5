//! The Reflective Accessor (`spec.md` §4.2).
//!
//! MyBatis itself walks bean getters/setters through the JVM's reflection
//! API. Rust has no runtime reflection, so the equivalent here is a small
//! [`Reflect`] trait that a parameter/result type implements to expose its
//! fields by name — the same trade-off `spec.md` §9 calls out for proxy
//! generation ("requiring users to expose an interface"), applied to plain
//! field access instead. [`Value`] (the dynamic map/array/object shape used
//! for loosely-typed parameter objects) implements [`Reflect`] itself, so
//! callers who don't want to define a struct can pass a `Value::Object`
//! straight through, exactly like MyBatis callers passing a `Map`.

use serde_json::Map;

use crate::value::Value;

#[derive(Debug, thiserror::Error)]
pub enum ReflectError {
    #[error("no setter for property `{0}`")]
    NoSetter(String),
    #[error("`{0}` is not a list-like property")]
    NotAList(String),
    #[error("index {index} out of bounds for `{path}` (len {len})")]
    IndexOutOfBounds { path: String, index: usize, len: usize },
    #[error("property path `{0}` does not resolve to an object/array")]
    NotNavigable(String),
}

/// Uniform get/set/has-property access over a parameter or result object.
///
/// Implementors model a single level of named fields; nested navigation
/// (`a.b.c`, `a.b[2]`) is handled by [`get_path`]/[`set_path`] by recursing
/// into the [`Value`] tree returned by a field lookup — a Rust struct that
/// nests another Rust struct rather than a `Value` only supports one level
/// of path navigation through this trait, which is the practical ceiling
/// without compile-time derive support.
pub trait Reflect: Send + Sync {
    /// Reads a single field by name (no path navigation).
    fn get_field(&self, name: &str) -> Option<Value>;
    /// Writes a single field by name. Fails if the field is unknown or
    /// read-only.
    fn set_field(&mut self, name: &str, value: Value) -> Result<(), ReflectError>;
    /// Does a getter exist for `name`?
    fn has_getter(&self, name: &str) -> bool;
    /// Does a setter exist for `name`?
    fn has_setter(&self, name: &str) -> bool;
    /// Appends to a list-like field (`Reflective Accessor::add`).
    fn add_field(&mut self, name: &str, value: Value) -> Result<(), ReflectError> {
        let _ = (name, value);
        Err(ReflectError::NotAList(name.to_owned()))
    }
}

impl Reflect for Value {
    fn get_field(&self, name: &str) -> Option<Value> {
        match self {
            Value::Object(map) => map.get(name).cloned().map(Value::from_json),
            _ => None,
        }
    }

    fn set_field(&mut self, name: &str, value: Value) -> Result<(), ReflectError> {
        match self {
            Value::Object(map) => {
                map.insert(name.to_owned(), to_json(value));
                Ok(())
            }
            Value::Null => {
                let mut map = Map::new();
                map.insert(name.to_owned(), to_json(value));
                *self = Value::Object(map);
                Ok(())
            }
            _ => Err(ReflectError::NoSetter(name.to_owned())),
        }
    }

    fn has_getter(&self, name: &str) -> bool {
        matches!(self, Value::Object(map) if map.contains_key(name))
    }

    fn has_setter(&self, name: &str) -> bool {
        matches!(self, Value::Object(_) | Value::Null)
    }

    fn add_field(&mut self, name: &str, value: Value) -> Result<(), ReflectError> {
        match self {
            Value::Object(map) => {
                let entry = map.entry(name.to_owned()).or_insert_with(|| serde_json::Value::Array(vec![]));
                match entry {
                    serde_json::Value::Array(arr) => {
                        arr.push(to_json(value));
                        Ok(())
                    }
                    _ => Err(ReflectError::NotAList(name.to_owned())),
                }
            }
            _ => Err(ReflectError::NotAList(name.to_owned())),
        }
    }
}

pub(crate) fn to_json(v: Value) -> serde_json::Value {
    match v {
        Value::Null => serde_json::Value::Null,
        Value::Bool(b) => serde_json::Value::Bool(b),
        Value::I64(i) => serde_json::Value::Number(i.into()),
        Value::F64(f) => serde_json::Number::from_f64(f)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        Value::Str(s) => serde_json::Value::String(s),
        Value::Bytes(b) => serde_json::Value::Array(
            b.into_iter().map(|byte| serde_json::Value::Number(byte.into())).collect(),
        ),
        Value::Array(items) => serde_json::Value::Array(items.into_iter().map(to_json).collect()),
        Value::Object(map) => serde_json::Value::Object(map),
    }
}

/// One segment of a dotted/indexed property path (`a.b[2].c`).
#[derive(Debug, Clone, PartialEq)]
struct Segment {
    name: String,
    index: Option<usize>,
}

fn parse_path(path: &str) -> Vec<Segment> {
    path.split('.')
        .filter(|p| !p.is_empty())
        .map(|part| match part.find('[') {
            Some(open) if part.ends_with(']') => {
                let name = part[..open].to_owned();
                let idx_str = &part[open + 1..part.len() - 1];
                Segment { name, index: idx_str.parse().ok() }
            }
            _ => Segment { name: part.to_owned(), index: None },
        })
        .collect()
}

/// Case-fold a `snake_case` column name to `camelCase`, honoring the global
/// `mapUnderscoreToCamelCase` setting (`spec.md` §4.2/§6).
pub fn snake_to_camel(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut upper_next = false;
    for ch in input.chars() {
        if ch == '_' {
            upper_next = true;
        } else if upper_next {
            out.extend(ch.to_uppercase());
            upper_next = false;
        } else {
            out.push(ch);
        }
    }
    out
}

/// Reads a (possibly nested, possibly indexed) property path.
///
/// Root-level lookup goes through [`Reflect::get_field`] (so a user struct's
/// own accessor logic runs); once the path descends past the first segment
/// that is itself a [`Value`], further navigation walks the `Value` tree
/// directly, per [`Reflect`]'s doc comment.
pub fn get_path(root: &dyn Reflect, path: &str, fold_snake_case: bool) -> Option<Value> {
    let segments = parse_path(path);
    let mut segments = segments.into_iter();
    let first = segments.next()?;

    let mut current = lookup_first(root, &first, fold_snake_case)?;
    current = index_into(current, first.index)?;

    for seg in segments {
        current = match current {
            Value::Object(map) => map.get(&seg.name).cloned().map(Value::from_json)?,
            _ => return None,
        };
        current = index_into(current, seg.index)?;
    }

    Some(current)
}

fn lookup_first(root: &dyn Reflect, seg: &Segment, fold_snake_case: bool) -> Option<Value> {
    root.get_field(&seg.name).or_else(|| {
        if fold_snake_case {
            root.get_field(&crate::reflect::snake_to_camel(&seg.name))
        } else {
            None
        }
    })
}

fn index_into(value: Value, index: Option<usize>) -> Option<Value> {
    match index {
        None => Some(value),
        Some(i) => match value {
            Value::Array(items) => items.into_iter().nth(i),
            _ => None,
        },
    }
}

/// Does `path` resolve to a present, non-null value?
pub fn has_getter(root: &dyn Reflect, path: &str, fold_snake_case: bool) -> bool {
    let segments = parse_path(path);
    match segments.first() {
        None => false,
        Some(first) if segments.len() == 1 && first.index.is_none() => {
            root.has_getter(&first.name)
                || (fold_snake_case && root.has_getter(&snake_to_camel(&first.name)))
        }
        _ => get_path(root, path, fold_snake_case).is_some(),
    }
}

/// Writes a (possibly nested) property path. Only the root segment may go
/// through a foreign [`Reflect`] implementation; any remaining segments must
/// resolve through `Value::Object` nodes (writes through an unknown
/// sub-path fail, per `spec.md` §4.2).
pub fn set_path(root: &mut dyn Reflect, path: &str, value: Value) -> Result<(), ReflectError> {
    let segments = parse_path(path);
    let Some((first, rest)) = segments.split_first() else {
        return Err(ReflectError::NotNavigable(path.to_owned()));
    };

    if rest.is_empty() && first.index.is_none() {
        return root.set_field(&first.name, value);
    }

    let mut sub = root.get_field(&first.name).unwrap_or(Value::Null);
    set_into_value(&mut sub, first.index, rest, value)?;
    root.set_field(&first.name, sub)
}

fn set_into_value(
    target: &mut Value,
    index: Option<usize>,
    rest: &[Segment],
    value: Value,
) -> Result<(), ReflectError> {
    if let Some(i) = index {
        match target {
            Value::Array(items) => {
                let len = items.len();
                let slot = items.get_mut(i).ok_or(ReflectError::IndexOutOfBounds {
                    path: format!("[{i}]"),
                    index: i,
                    len,
                })?;
                return set_into_value(slot, None, rest, value);
            }
            _ => return Err(ReflectError::NotNavigable(format!("[{i}]"))),
        }
    }

    match rest.split_first() {
        None => {
            *target = value;
            Ok(())
        }
        Some((next, tail)) => {
            if !matches!(target, Value::Object(_)) {
                *target = Value::Object(Map::new());
            }
            let mut child = target.get_field(&next.name).unwrap_or(Value::Null);
            set_into_value(&mut child, next.index, tail, value)?;
            target.set_field(&next.name, child)
        }
    }
}

/// Appends `value` to the list-like property at `path`.
pub fn add(root: &mut dyn Reflect, path: &str, value: Value) -> Result<(), ReflectError> {
    root.add_field(path, value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obj(pairs: &[(&str, Value)]) -> Value {
        let mut map = Map::new();
        for (k, v) in pairs {
            map.insert((*k).to_owned(), to_json(v.clone()));
        }
        Value::Object(map)
    }

    #[test]
    fn reads_simple_property() {
        let v = obj(&[("id", Value::I64(7))]);
        assert_eq!(get_path(&v, "id", false), Some(Value::I64(7)));
    }

    #[test]
    fn folds_snake_case_to_camel() {
        let v = obj(&[("userName", Value::Str("X".into()))]);
        assert_eq!(get_path(&v, "user_name", true), Some(Value::Str("X".into())));
        assert_eq!(get_path(&v, "user_name", false), None);
    }

    #[test]
    fn navigates_nested_indexed_path() {
        let inner = obj(&[("id", Value::I64(1))]);
        let v = obj(&[("orders", Value::Array(vec![inner]))]);
        assert_eq!(get_path(&v, "orders[0].id", false), Some(Value::I64(1)));
        assert_eq!(get_path(&v, "orders[1].id", false), None);
    }

    #[test]
    fn unknown_path_reads_as_none() {
        let v = obj(&[]);
        assert_eq!(get_path(&v, "missing.nested", false), None);
    }

    #[test]
    fn set_path_writes_nested_value() {
        let mut v = obj(&[("user", obj(&[("id", Value::I64(0))]))]);
        set_path(&mut v, "user.id", Value::I64(42)).unwrap();
        assert_eq!(get_path(&v, "user.id", false), Some(Value::I64(42)));
    }

    #[test]
    fn add_appends_to_list_property() {
        let mut v = obj(&[]);
        add(&mut v, "tags", Value::Str("a".into())).unwrap();
        add(&mut v, "tags", Value::Str("b".into())).unwrap();
        assert_eq!(
            get_path(&v, "tags", false),
            Some(Value::Array(vec![Value::Str("a".into()), Value::Str("b".into())]))
        );
    }
}
