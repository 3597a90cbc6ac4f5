use crate::dynamic_sql::expr::ast::{CmpOp, Expr};
use crate::dynamic_sql::expr::parser::Parser;
use crate::error::ScriptingError;
use crate::reflect;
use crate::value::Value;

/// Evaluates `source` against a context: `_parameter` is bound to the root
/// parameter object, `value` to the root parameter itself when it is a
/// simple (non-object/array) value, and every other path is looked up in
/// `bindings` first (the `<bind>`-declared / `foreach` item-index names)
/// then `parameter` (`spec.md` §4.5).
pub fn eval(
    source: &str,
    parameter: &Value,
    bindings: &Value,
    fold_snake_case: bool,
) -> Result<Value, ScriptingError> {
    let expr = Parser::parse(source)?;
    eval_expr(&expr, parameter, bindings, fold_snake_case, source)
}

/// Evaluates `source` and coerces the result to a boolean per `spec.md`
/// §4.5's `<if test="...">` usage: `null`/absent is falsy, any other value
/// is truthy unless it is an explicit `false`.
pub fn eval_bool(
    source: &str,
    parameter: &Value,
    bindings: &Value,
    fold_snake_case: bool,
) -> Result<bool, ScriptingError> {
    Ok(truthy(&eval(source, parameter, bindings, fold_snake_case)?))
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        _ => true,
    }
}

fn resolve_path(path: &str, parameter: &Value, bindings: &Value, fold_snake_case: bool) -> Value {
    if path == "_parameter" {
        return parameter.clone();
    }
    if let Some(rest) = path.strip_prefix("_parameter.") {
        return reflect::get_path(parameter, rest, fold_snake_case).unwrap_or(Value::Null);
    }

    let root = path.split(['.', '[']).next().unwrap_or(path);
    if root == "value" && !matches!(parameter, Value::Object(_) | Value::Array(_)) {
        if path == "value" {
            return parameter.clone();
        }
    }

    if reflect::has_getter(bindings, path, fold_snake_case) {
        return reflect::get_path(bindings, path, fold_snake_case).unwrap_or(Value::Null);
    }

    reflect::get_path(parameter, path, fold_snake_case).unwrap_or(Value::Null)
}

fn eval_expr(
    expr: &Expr,
    parameter: &Value,
    bindings: &Value,
    fold_snake_case: bool,
    source: &str,
) -> Result<Value, ScriptingError> {
    let go = |e: &Expr| eval_expr(e, parameter, bindings, fold_snake_case, source);

    match expr {
        Expr::Null => Ok(Value::Null),
        Expr::Bool(b) => Ok(Value::Bool(*b)),
        Expr::Int(i) => Ok(Value::I64(*i)),
        Expr::Float(f) => Ok(Value::F64(*f)),
        Expr::Str(s) => Ok(Value::Str(s.clone())),
        Expr::Path(path) => Ok(resolve_path(path, parameter, bindings, fold_snake_case)),
        Expr::MethodCall(base, method) => {
            let value = go(base)?;
            match method.as_str() {
                "size" => Ok(Value::I64(value.size().unwrap_or(0) as i64)),
                "isEmpty" => Ok(Value::Bool(value.size().unwrap_or(0) == 0)),
                other => Err(ScriptingError { expr: source.to_owned(), reason: format!("unknown method `{other}`") }),
            }
        }
        Expr::Not(inner) => Ok(Value::Bool(!truthy(&go(inner)?))),
        Expr::Neg(inner) => match go(inner)? {
            Value::I64(i) => Ok(Value::I64(-i)),
            Value::F64(f) => Ok(Value::F64(-f)),
            other => Err(ScriptingError {
                expr: source.to_owned(),
                reason: format!("cannot negate {other}"),
            }),
        },
        Expr::And(a, b) => Ok(Value::Bool(truthy(&go(a)?) && truthy(&go(b)?))),
        Expr::Or(a, b) => Ok(Value::Bool(truthy(&go(a)?) || truthy(&go(b)?))),
        Expr::Cmp(a, op, b) => Ok(Value::Bool(compare(&go(a)?, *op, &go(b)?))),
    }
}

fn compare(a: &Value, op: CmpOp, b: &Value) -> bool {
    if matches!(a, Value::Null) || matches!(b, Value::Null) {
        let both_null = matches!(a, Value::Null) && matches!(b, Value::Null);
        return match op {
            CmpOp::Eq => both_null,
            CmpOp::NotEq => !both_null,
            _ => false,
        };
    }

    if let (Some(x), Some(y)) = (numeric(a), numeric(b)) {
        return match op {
            CmpOp::Eq => x == y,
            CmpOp::NotEq => x != y,
            CmpOp::Lt => x < y,
            CmpOp::Le => x <= y,
            CmpOp::Gt => x > y,
            CmpOp::Ge => x >= y,
        };
    }

    if let (Value::Str(x), Value::Str(y)) = (a, b) {
        return match op {
            CmpOp::Eq => x == y,
            CmpOp::NotEq => x != y,
            CmpOp::Lt => x < y,
            CmpOp::Le => x <= y,
            CmpOp::Gt => x > y,
            CmpOp::Ge => x >= y,
        };
    }

    if let (Value::Bool(x), Value::Bool(y)) = (a, b) {
        return match op {
            CmpOp::Eq => x == y,
            CmpOp::NotEq => x != y,
            _ => false,
        };
    }

    matches!(op, CmpOp::NotEq)
}

fn numeric(v: &Value) -> Option<f64> {
    match v {
        Value::I64(i) => Some(*i as f64),
        Value::F64(f) => Some(*f),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn param(json: serde_json::Value) -> Value {
        Value::from_json(json)
    }

    #[test]
    fn not_null_check() {
        let p = param(json!({"name": "x"}));
        let bindings = Value::Object(Default::default());
        assert!(eval_bool("name != null", &p, &bindings, false).unwrap());
    }

    #[test]
    fn null_check_on_absent_property() {
        let p = param(json!({}));
        let bindings = Value::Object(Default::default());
        assert!(eval_bool("name == null", &p, &bindings, false).unwrap());
    }

    #[test]
    fn and_combinator_short_circuits_on_value() {
        let p = param(json!({"age": 18}));
        let bindings = Value::Object(Default::default());
        assert!(eval_bool("age != null and age >= 18", &p, &bindings, false).unwrap());
    }

    #[test]
    fn numeric_comparison() {
        let p = param(json!({"age": 17}));
        let bindings = Value::Object(Default::default());
        assert!(!eval_bool("age >= 18", &p, &bindings, false).unwrap());
    }
}
