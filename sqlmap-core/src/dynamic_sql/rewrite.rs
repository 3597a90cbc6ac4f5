//! The `#{property[,option=value]*}` rewriter (`spec.md` §4.4/§6): turns
//! each occurrence into a positional `?` and appends a [`ParameterMapping`]
//! in declaration order. Runs both over static SQL text and over the text a
//! dynamic [`crate::dynamic_sql::SqlNode`] tree renders.

use crate::dbtype::{DbType, LangType};
use crate::error::ScriptingError;
use crate::mapping::{ParameterDirection, ParameterMapping};

pub fn rewrite_parameters(text: &str) -> Result<(String, Vec<ParameterMapping>), ScriptingError> {
    let mut sql = String::with_capacity(text.len());
    let mut mappings = Vec::new();
    let mut rest = text;

    while let Some(start) = rest.find("#{") {
        sql.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let end = after.find('}').ok_or_else(|| ScriptingError {
            expr: text.to_owned(),
            reason: "unterminated #{...} token".into(),
        })?;
        let inner = &after[..end];
        mappings.push(parse_parameter_token(inner)?);
        sql.push('?');
        rest = &after[end + 1..];
    }
    sql.push_str(rest);
    Ok((sql, mappings))
}

fn parse_parameter_token(inner: &str) -> Result<ParameterMapping, ScriptingError> {
    // Shorthand `#{property:JDBCTYPE}`.
    if let Some((prop, jdbc)) = inner.split_once(':') {
        if !prop.contains(',') && !jdbc.contains('=') {
            let mut mapping = ParameterMapping::simple(prop.trim());
            mapping.db_type = Some(DbType::parse(jdbc.trim()));
            return Ok(mapping);
        }
    }

    let mut parts = inner.split(',');
    let property = parts.next().unwrap_or_default().trim();
    if property.is_empty() {
        return Err(ScriptingError { expr: inner.to_owned(), reason: "empty parameter token".into() });
    }
    let mut mapping = ParameterMapping::simple(property);

    for part in parts {
        let Some((key, val)) = part.split_once('=') else { continue };
        let (key, val) = (key.trim(), val.trim());
        match key {
            "javaType" => mapping.lang_type = LangType::parse(val),
            "jdbcType" => mapping.db_type = Some(DbType::parse(val)),
            "mode" => {
                mapping.direction = match val.to_ascii_uppercase().as_str() {
                    "OUT" => ParameterDirection::Out,
                    "INOUT" => ParameterDirection::InOut,
                    _ => ParameterDirection::In,
                }
            }
            "numericScale" => mapping.numeric_scale = val.parse().ok(),
            "resultMap" => mapping.result_map_id = Some(val.to_owned()),
            "typeHandler" => mapping.type_handler = Some(val.to_owned()),
            "jdbcTypeName" => mapping.jdbc_type_name = Some(val.to_owned()),
            _ => {}
        }
    }

    Ok(mapping)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rewrites_simple_token() {
        let (sql, mappings) = rewrite_parameters("select * from t where id = #{id}").unwrap();
        assert_eq!(sql, "select * from t where id = ?");
        assert_eq!(mappings.len(), 1);
        assert_eq!(mappings[0].property, "id");
    }

    #[test]
    fn parses_inline_options() {
        let (_, mappings) =
            rewrite_parameters("#{name,jdbcType=VARCHAR,mode=OUT}").unwrap();
        assert_eq!(mappings[0].db_type, Some(DbType::Text));
        assert_eq!(mappings[0].direction, ParameterDirection::Out);
    }

    #[test]
    fn shorthand_jdbc_type() {
        let (_, mappings) = rewrite_parameters("#{id:BIGINT}").unwrap();
        assert_eq!(mappings[0].db_type, Some(DbType::BigInt));
    }

    #[test]
    fn multiple_tokens_preserve_order() {
        let (sql, mappings) = rewrite_parameters("#{a} and #{b} and #{c}").unwrap();
        assert_eq!(sql, "? and ? and ?");
        assert_eq!(
            mappings.iter().map(|m| m.property.as_str()).collect::<Vec<_>>(),
            vec!["a", "b", "c"]
        );
    }
}
