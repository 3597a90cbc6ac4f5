use crate::value::Value;

/// A composite ordered hash (`spec.md` §3): identity of two keys requires an
/// identical update sequence. Rather than folding updates into a single
/// hash incrementally (which would make the invariant hard to verify),
/// updates are recorded as their `Display` string form so `PartialEq`/`Hash`
/// on the resulting vector gives the exact equality semantics `spec.md`
/// §3/§8 demand for free.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    updates: Vec<String>,
}

impl CacheKey {
    pub fn new() -> Self {
        Self { updates: Vec::new() }
    }

    pub fn update(mut self, value: impl std::fmt::Display) -> Self {
        self.updates.push(value.to_string());
        self
    }

    /// Folds one bound parameter value into the key, tagged with its
    /// [`Value::type_tag`] ahead of its `Display` rendering. `Value`'s
    /// `Display` is type-blind (`I64(1)` and `Str("1")` both render `"1"`;
    /// `Null` renders the same text as `Str("null")`), so two calls whose
    /// bound parameters differ only in type would otherwise fold to the
    /// same update step and collide on the same `CacheKey`.
    fn update_value(self, value: &Value) -> Self {
        self.update(format!("{}:{value}", value.type_tag()))
    }

    /// Builds the key the executor computes for one query invocation
    /// (`spec.md` §3: "statement id, row-bounds offset/limit, SQL text,
    /// every parameter value in binding order, environment id").
    pub fn for_statement(
        statement_id: &str,
        offset: Option<u64>,
        limit: Option<u64>,
        sql: &str,
        params: &[Value],
        environment_id: &str,
    ) -> Self {
        let mut key = CacheKey::new()
            .update(statement_id)
            .update(offset.map(|v| v.to_string()).unwrap_or_default())
            .update(limit.map(|v| v.to_string()).unwrap_or_default())
            .update(sql);
        for param in params {
            key = key.update_value(param);
        }
        key.update(environment_id)
    }
}

impl Default for CacheKey {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_update_sequences_are_equal_keys() {
        let a = CacheKey::new().update("stmt").update(1).update("select 1");
        let b = CacheKey::new().update("stmt").update(1).update("select 1");
        assert_eq!(a, b);
    }

    #[test]
    fn different_parameter_value_changes_the_key() {
        let a = CacheKey::for_statement("stmt", None, None, "select ?", &[Value::I64(1)], "env");
        let b = CacheKey::for_statement("stmt", None, None, "select ?", &[Value::I64(2)], "env");
        assert_ne!(a, b);
    }

    #[test]
    fn same_display_different_type_changes_the_key() {
        let int_one = CacheKey::for_statement("stmt", None, None, "select ?", &[Value::I64(1)], "env");
        let str_one = CacheKey::for_statement("stmt", None, None, "select ?", &[Value::Str("1".into())], "env");
        assert_ne!(int_one, str_one);

        let null = CacheKey::for_statement("stmt", None, None, "select ?", &[Value::Null], "env");
        let str_null = CacheKey::for_statement("stmt", None, None, "select ?", &[Value::Str("null".into())], "env");
        assert_ne!(null, str_null);
    }
}
