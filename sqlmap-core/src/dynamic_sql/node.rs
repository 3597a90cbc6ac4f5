//! The dynamic-SQL AST (`spec.md` §4.5): each node exposes `apply(context)`,
//! contributing rendered text (and signalling whether it contributed any)
//! to a [`DynamicContext`].

use regex::Regex;

use crate::dynamic_sql::expr;
use crate::dynamic_sql::rewrite::rewrite_parameters;
use crate::error::ScriptingError;
use crate::mapping::BoundSql;
use crate::reflect;
use crate::value::Value;

/// One node of the dynamic-SQL tree.
#[derive(Debug, Clone)]
pub enum SqlNode {
    /// A sequence of sibling nodes (every mapper statement body is one of
    /// these at the root).
    Mixed(Vec<SqlNode>),
    StaticText(String),
    /// Literal text containing `${name}` tokens, substituted against the
    /// context at render time.
    DynamicText { text: String, injection_filter: Option<String> },
    If { test: String, children: Vec<SqlNode> },
    Choose { whens: Vec<(String, Vec<SqlNode>)>, otherwise: Option<Vec<SqlNode>> },
    Where(Vec<SqlNode>),
    Set(Vec<SqlNode>),
    Trim {
        prefix: Option<String>,
        prefix_overrides: Vec<String>,
        suffix: Option<String>,
        suffix_overrides: Vec<String>,
        children: Vec<SqlNode>,
    },
    Foreach {
        collection: String,
        item: Option<String>,
        index: Option<String>,
        open: Option<String>,
        close: Option<String>,
        separator: Option<String>,
        children: Vec<SqlNode>,
    },
    Bind { name: String, value: String },
}

/// Per-invocation rendering state: the root parameter, the
/// additional-parameters bag (`<bind>` names, `foreach` item/index
/// bindings), the text buffer under construction, and the counter that
/// uniquifies `foreach` parameter names.
pub struct DynamicContext {
    parameter: Value,
    bindings: Value,
    sql: String,
    frch_counter: usize,
    fold_snake_case: bool,
}

impl DynamicContext {
    fn new(parameter: Value, fold_snake_case: bool) -> Self {
        Self {
            parameter,
            bindings: Value::Object(Default::default()),
            sql: String::new(),
            frch_counter: 0,
            fold_snake_case,
        }
    }

    fn bind(&mut self, name: &str, value: Value) {
        if let Value::Object(map) = &mut self.bindings {
            map.insert(name.to_owned(), reflect::to_json(value));
        }
    }

    fn get_binding(&self, name: &str) -> Option<Value> {
        match &self.bindings {
            Value::Object(map) => map.get(name).cloned().map(Value::from_json),
            _ => None,
        }
    }

    fn remove_binding(&mut self, name: &str) {
        if let Value::Object(map) = &mut self.bindings {
            map.remove(name);
        }
    }

    fn restore_binding(&mut self, name: &str, prev: Option<Value>) {
        match prev {
            Some(v) => self.bind(name, v),
            None => self.remove_binding(name),
        }
    }

    /// Renders `children` into an isolated buffer, leaving `self.sql`
    /// untouched, so `Trim`/`Where`/`Set`/`Foreach` can post-process the
    /// fragment before splicing it into the parent buffer. Bindings and the
    /// foreach counter are shared, not isolated.
    fn render_isolated(&mut self, children: &[SqlNode]) -> Result<(String, bool), ScriptingError> {
        let saved = std::mem::take(&mut self.sql);
        let mut contributed = false;
        for child in children {
            contributed |= child.apply(self)?;
        }
        let body = std::mem::replace(&mut self.sql, saved);
        Ok((body, contributed))
    }

    fn next_foreach_id(&mut self) -> usize {
        let id = self.frch_counter;
        self.frch_counter += 1;
        id
    }
}

impl SqlNode {
    pub fn apply(&self, ctx: &mut DynamicContext) -> Result<bool, ScriptingError> {
        match self {
            SqlNode::Mixed(children) => Self::apply_all(children, ctx),
            SqlNode::StaticText(text) => {
                ctx.sql.push_str(text);
                Ok(!text.is_empty())
            }
            SqlNode::DynamicText { text, injection_filter } => {
                let rendered = substitute_dynamic_text(text, ctx, injection_filter.as_deref())?;
                let contributed = !rendered.is_empty();
                ctx.sql.push_str(&rendered);
                Ok(contributed)
            }
            SqlNode::If { test, children } => {
                if expr::eval_bool(test, &ctx.parameter, &ctx.bindings, ctx.fold_snake_case)? {
                    Self::apply_all(children, ctx)
                } else {
                    Ok(false)
                }
            }
            SqlNode::Choose { whens, otherwise } => {
                for (test, children) in whens {
                    if expr::eval_bool(test, &ctx.parameter, &ctx.bindings, ctx.fold_snake_case)? {
                        return Self::apply_all(children, ctx);
                    }
                }
                match otherwise {
                    Some(children) => Self::apply_all(children, ctx),
                    None => Ok(false),
                }
            }
            SqlNode::Where(children) => Self::apply_trim(
                ctx,
                children,
                Some("WHERE"),
                &["AND".to_owned(), "OR".to_owned()],
                None,
                &[],
            ),
            SqlNode::Set(children) => {
                Self::apply_trim(ctx, children, Some("SET"), &[], None, &[",".to_owned()])
            }
            SqlNode::Trim { prefix, prefix_overrides, suffix, suffix_overrides, children } => {
                Self::apply_trim(
                    ctx,
                    children,
                    prefix.as_deref(),
                    prefix_overrides,
                    suffix.as_deref(),
                    suffix_overrides,
                )
            }
            SqlNode::Foreach { collection, item, index, open, close, separator, children } => {
                Self::apply_foreach(
                    ctx,
                    collection,
                    item.as_deref(),
                    index.as_deref(),
                    open.as_deref(),
                    close.as_deref(),
                    separator.as_deref(),
                    children,
                )
            }
            SqlNode::Bind { name, value } => {
                let v = expr::eval(value, &ctx.parameter, &ctx.bindings, ctx.fold_snake_case)?;
                ctx.bind(name, v);
                Ok(false)
            }
        }
    }

    fn apply_all(children: &[SqlNode], ctx: &mut DynamicContext) -> Result<bool, ScriptingError> {
        let mut contributed = false;
        for child in children {
            contributed |= child.apply(ctx)?;
        }
        Ok(contributed)
    }

    fn apply_trim(
        ctx: &mut DynamicContext,
        children: &[SqlNode],
        prefix: Option<&str>,
        prefix_overrides: &[String],
        suffix: Option<&str>,
        suffix_overrides: &[String],
    ) -> Result<bool, ScriptingError> {
        let (body, contributed) = ctx.render_isolated(children)?;
        if !contributed || body.trim().is_empty() {
            return Ok(false);
        }

        let mut trimmed = body.trim().to_owned();
        if !prefix_overrides.is_empty() {
            trimmed = strip_prefix_override(&trimmed, prefix_overrides);
        }
        if !suffix_overrides.is_empty() {
            trimmed = strip_suffix_override(&trimmed, suffix_overrides);
        }

        let mut out = String::new();
        if let Some(p) = prefix {
            out.push_str(p);
            out.push(' ');
        }
        out.push_str(&trimmed);
        if let Some(s) = suffix {
            out.push(' ');
            out.push_str(s);
        }
        ctx.sql.push_str(&out);
        Ok(true)
    }

    #[allow(clippy::too_many_arguments)]
    fn apply_foreach(
        ctx: &mut DynamicContext,
        collection: &str,
        item: Option<&str>,
        index: Option<&str>,
        open: Option<&str>,
        close: Option<&str>,
        separator: Option<&str>,
        children: &[SqlNode],
    ) -> Result<bool, ScriptingError> {
        let collection_value = expr::eval(collection, &ctx.parameter, &ctx.bindings, ctx.fold_snake_case)?;
        let entries: Vec<(Value, Value)> = match collection_value {
            Value::Array(items) => items.into_iter().enumerate().map(|(i, v)| (Value::I64(i as i64), v)).collect(),
            Value::Object(map) => map.into_iter().map(|(k, v)| (Value::Str(k), Value::from_json(v))).collect(),
            other => {
                return Err(ScriptingError {
                    expr: collection.to_owned(),
                    reason: format!("foreach collection must be an array or map, got {other}"),
                })
            }
        };

        if entries.is_empty() {
            return Ok(false);
        }

        let item_name = item.unwrap_or("item");
        let index_name = index.unwrap_or("index");
        let mut parts = Vec::with_capacity(entries.len());

        for (key, value) in entries {
            let n = ctx.next_foreach_id();

            let prev_item = ctx.get_binding(item_name);
            let prev_index = ctx.get_binding(index_name);
            ctx.bind(item_name, value.clone());
            ctx.bind(index_name, key.clone());

            let (mut body, _) = ctx.render_isolated(children)?;

            ctx.restore_binding(item_name, prev_item);
            ctx.restore_binding(index_name, prev_index);

            let frch_item = format!("__frch_{item_name}_{n}");
            let frch_index = format!("__frch_{index_name}_{n}");
            body = rewrite_root_token(&body, item_name, &frch_item);
            body = rewrite_root_token(&body, index_name, &frch_index);

            ctx.bind(&frch_item, value);
            ctx.bind(&frch_index, key);

            parts.push(body);
        }

        let mut out = String::new();
        if let Some(o) = open {
            out.push_str(o);
        }
        out.push_str(&parts.join(separator.unwrap_or("")));
        if let Some(c) = close {
            out.push_str(c);
        }
        ctx.sql.push_str(&out);
        Ok(true)
    }
}

/// Rewrites the leading identifier of every `#{name...}` token in `body`
/// from `name` to `replacement`, leaving any trailing property path or
/// inline options (`.id`, `,jdbcType=...`) intact (`spec.md` §4.5).
fn rewrite_root_token(body: &str, name: &str, replacement: &str) -> String {
    let pattern = format!(r"#\{{\s*{}\b", regex::escape(name));
    let re = Regex::new(&pattern).expect("static pattern is always valid");
    re.replace_all(body, format!("#{{{replacement}")).into_owned()
}

fn strip_prefix_override(body: &str, overrides: &[String]) -> String {
    let upper = body.to_ascii_uppercase();
    for ov in overrides {
        let ov_upper = ov.trim().to_ascii_uppercase();
        if upper.starts_with(&ov_upper) {
            return body[ov_upper.len()..].trim_start().to_owned();
        }
    }
    body.to_owned()
}

fn strip_suffix_override(body: &str, overrides: &[String]) -> String {
    let upper = body.to_ascii_uppercase();
    for ov in overrides {
        let ov_upper = ov.trim().to_ascii_uppercase();
        if upper.ends_with(&ov_upper) {
            return body[..body.len() - ov_upper.len()].trim_end().to_owned();
        }
    }
    body.to_owned()
}

fn substitute_dynamic_text(
    text: &str,
    ctx: &DynamicContext,
    injection_filter: Option<&str>,
) -> Result<String, ScriptingError> {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let end = after.find('}').ok_or_else(|| ScriptingError {
            expr: text.to_owned(),
            reason: "unterminated ${...} token".into(),
        })?;
        let expr_src = &after[..end];
        let value = expr::eval(expr_src, &ctx.parameter, &ctx.bindings, ctx.fold_snake_case)?;
        let rendered = value.to_string();

        if let Some(pattern) = injection_filter {
            let re = Regex::new(pattern).map_err(|e| ScriptingError {
                expr: expr_src.to_owned(),
                reason: format!("invalid injection filter `{pattern}`: {e}"),
            })?;
            if !re.is_match(&rendered) {
                return Err(ScriptingError {
                    expr: expr_src.to_owned(),
                    reason: format!("substitution `{rendered}` rejected by injection filter"),
                });
            }
        }

        out.push_str(&rendered);
        rest = &after[end + 1..];
    }
    out.push_str(rest);
    Ok(out)
}

/// Renders `root` against `parameter_object` into a [`BoundSql`]
/// (`spec.md` §4.5's "post-render" step: the rendered text is passed to the
/// `#{...}` rewriter exactly as in the static case).
pub fn render(root: &SqlNode, parameter_object: &Value, fold_snake_case: bool) -> Result<BoundSql, ScriptingError> {
    let mut ctx = DynamicContext::new(parameter_object.clone(), fold_snake_case);
    root.apply(&mut ctx)?;
    let (sql, parameter_mappings) = rewrite_parameters(&ctx.sql)?;
    Ok(BoundSql {
        sql,
        parameter_mappings,
        parameter_object: parameter_object.clone(),
        additional_parameters: ctx.bindings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn text(s: &str) -> SqlNode {
        SqlNode::StaticText(s.to_owned())
    }

    #[test]
    fn if_where_composition() {
        let root = SqlNode::Where(vec![
            SqlNode::If { test: "name != null".into(), children: vec![text("name = #{name}")] },
            SqlNode::If { test: "age != null".into(), children: vec![text(" AND age > #{age}")] },
        ]);
        let param = Value::from_json(json!({"name": serde_json::Value::Null, "age": 18}));
        let bound = render(&root, &param, false).unwrap();
        assert_eq!(bound.sql, "WHERE age > ?");
        assert_eq!(bound.parameter_mappings.len(), 1);
        assert_eq!(bound.parameter_mappings[0].property, "age");
    }

    #[test]
    fn foreach_in_clause() {
        let root = SqlNode::Mixed(vec![
            text("id in "),
            SqlNode::Foreach {
                collection: "ids".into(),
                item: Some("x".into()),
                index: None,
                open: Some("(".into()),
                close: Some(")".into()),
                separator: Some(",".into()),
                children: vec![text("#{x}")],
            },
        ]);
        let param = Value::from_json(json!({"ids": [1, 2, 3]}));
        let bound = render(&root, &param, false).unwrap();
        assert_eq!(bound.sql, "id in (?,?,?)");
        assert_eq!(bound.parameter_mappings.len(), 3);
        let values: Vec<_> = bound
            .parameter_mappings
            .iter()
            .map(|m| bound.value_for(m, false).unwrap())
            .collect();
        assert_eq!(values, vec![Value::I64(1), Value::I64(2), Value::I64(3)]);
    }

    #[test]
    fn set_strips_trailing_comma() {
        let root = SqlNode::Set(vec![
            SqlNode::If { test: "name != null".into(), children: vec![text("name = #{name},")] },
            SqlNode::If { test: "age != null".into(), children: vec![text("age = #{age},")] },
        ]);
        let param = Value::from_json(json!({"name": "bob", "age": serde_json::Value::Null}));
        let bound = render(&root, &param, false).unwrap();
        assert_eq!(bound.sql, "SET name = ?");
    }

    #[test]
    fn bind_declares_a_reusable_name() {
        let root = SqlNode::Mixed(vec![
            SqlNode::Bind { name: "pattern".into(), value: "name".into() },
            text("where name like #{pattern}"),
        ]);
        let param = Value::from_json(json!({"name": "abc"}));
        let bound = render(&root, &param, false).unwrap();
        assert_eq!(bound.sql, "where name like ?");
        assert_eq!(bound.value_for(&bound.parameter_mappings[0], false), Some(Value::Str("abc".into())));
    }
}
