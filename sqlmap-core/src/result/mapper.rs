//! Result-set materialization (`spec.md` §4.7): discriminator dispatch,
//! object instantiation, nested result composition with row-key caching
//! and ancestor-cycle detection, and auto-mapping.
//!
//! No teacher counterpart — `asphalt_core` materializes a row through a
//! compile-time `FromSql` impl chosen by its DSL's type checker, with no
//! declarative result-map document in between — so this module is grounded
//! directly in `spec.md` §4.7, operating over [`Value`] trees the same way
//! [`crate::reflect`] and [`crate::dynamic_sql`] already do rather than
//! requiring callers to hand-write a `Reflect` impl per result type.

use std::collections::HashMap;

use futures_util::future::BoxFuture;

use crate::catalogue::Configuration;
use crate::config::{AutoMappingBehavior, Settings, UnknownColumnBehavior};
use crate::dbtype::LangType;
use crate::error::ResultMapError;
use crate::mapping::{ResultMap, ResultMapping};
use crate::reflect::{self, Reflect};
use crate::value::Value;

use super::lazy;

/// Runs a nested `<association>`/`<collection> select="..."` sub-query
/// (`spec.md` §4.7 point 4). Implemented by [`crate::session::SqlSession`]
/// so this module stays free of the executor/connection type parameters.
/// `many` mirrors the owning [`ResultMapping::is_collection`]: `false` binds
/// the sub-query's first row as a single object, `true` binds every row as
/// a `Value::Array`.
pub trait NestedQueryRunner: Send + Sync {
    fn run<'a>(
        &'a self,
        statement_id: &'a str,
        parameter: Value,
        many: bool,
    ) -> BoxFuture<'a, Result<Value, ResultMapError>>;
}

/// A [`NestedQueryRunner`] that always fails; used when nested sub-selects
/// aren't expected (e.g. mapping key-generator peer rows) so a stray
/// `nested_query_id` still surfaces a clear error instead of panicking.
pub struct NoNestedQueries;

impl NestedQueryRunner for NoNestedQueries {
    fn run<'a>(
        &'a self,
        statement_id: &'a str,
        _parameter: Value,
        _many: bool,
    ) -> BoxFuture<'a, Result<Value, ResultMapError>> {
        let id = statement_id.to_owned();
        Box::pin(async move { Err(ResultMapError::CannotInstantiate(id)) })
    }
}

fn is_scalar(lang_type: &LangType) -> bool {
    !matches!(lang_type, LangType::Other(_))
}

fn prefixed(column: &str, prefix: Option<&str>) -> String {
    match prefix {
        Some(p) => format!("{p}{column}"),
        None => column.to_owned(),
    }
}

fn combine_prefix(outer: Option<&str>, inner: Option<&str>) -> Option<String> {
    match (outer, inner) {
        (Some(o), Some(i)) => Some(format!("{o}{i}")),
        (Some(o), None) => Some(o.to_owned()),
        (None, Some(i)) => Some(i.to_owned()),
        (None, None) => None,
    }
}

fn row_get(raw_row: &Value, column: &str) -> Value {
    raw_row.get_field(column).unwrap_or(Value::Null)
}

/// Builds the composite row key that decides whether this row continues an
/// already-seen top-level/nested object or starts a new one (`spec.md`
/// §4.7 point 6: "rows sharing the same id-mapping values ... are folded
/// into one object, with repeating nested rows appended to the collection
/// property").
fn row_key(result_map: &ResultMap, raw_row: &Value, column_prefix: Option<&str>) -> String {
    let mut ids: Vec<&ResultMapping> = result_map.id_mappings().collect();
    if ids.is_empty() {
        ids = result_map.mappings.iter().filter(|m| m.nested_result_map_id.is_none()).collect();
    }
    let mut parts = Vec::with_capacity(ids.len());
    for mapping in ids {
        let Some(column) = &mapping.column else { continue };
        let full = prefixed(column, column_prefix);
        parts.push(format!("{full}={}", row_get(raw_row, &full)));
    }
    if parts.is_empty() {
        // No id columns and no plain columns at all (a pure nested-only
        // result map) — every row is necessarily a distinct instance.
        format!("{}#{:p}", result_map.id, raw_row as *const Value)
    } else {
        parts.join("|")
    }
}

fn not_null_satisfied(mapping: &ResultMapping, raw_row: &Value, column_prefix: Option<&str>) -> bool {
    if mapping.not_null_columns.is_empty() {
        let Some(column) = &mapping.column else { return true };
        return !row_get(raw_row, &prefixed(column, column_prefix)).is_null();
    }
    mapping
        .not_null_columns
        .iter()
        .all(|c| !row_get(raw_row, &prefixed(c, column_prefix)).is_null())
}

fn nested_sub_parameter(mapping: &ResultMapping, raw_row: &Value, column_prefix: Option<&str>) -> Value {
    if !mapping.composite.is_empty() {
        let mut obj = serde_json::Map::new();
        for (property, column) in &mapping.composite {
            let value = row_get(raw_row, &prefixed(column, column_prefix));
            obj.insert(property.clone(), reflect::to_json(value));
        }
        return Value::Object(obj);
    }
    match &mapping.column {
        Some(column) => row_get(raw_row, &prefixed(column, column_prefix)),
        None => Value::Null,
    }
}

/// Resolves `result_map`'s discriminator chain against `raw_row`, following
/// `<case>` targets until one has no further discriminator.
fn resolve_discriminated<'a>(
    config: &'a Configuration,
    mut result_map: std::sync::Arc<ResultMap>,
    raw_row: &Value,
    column_prefix: Option<&str>,
) -> Result<std::sync::Arc<ResultMap>, ResultMapError> {
    let mut seen = std::collections::HashSet::new();
    loop {
        let Some(discriminator) = &result_map.discriminator else { return Ok(result_map) };
        if !seen.insert(result_map.id.clone()) {
            return Ok(result_map); // cyclic discriminator chain; stop rather than loop forever
        }
        let column = prefixed(&discriminator.column, column_prefix);
        let value = row_get(raw_row, &column).to_string();
        let Some(target_id) = discriminator.resolve(&value) else { return Ok(result_map) };
        let Some(next) = config.result_map(target_id) else {
            return Err(ResultMapError::AmbiguousDiscriminator { case: value, column });
        };
        result_map = next;
    }
}

/// Builds one mapped object from `raw_row` for `result_map`, recursing into
/// nested result maps embedded in the same row. `seen_ancestors` detects a
/// result map that names itself (directly or transitively) as a nested
/// association, per `spec.md` §9's cyclic-reference note: a repeated
/// ancestor stops recursion and yields `Value::Null` for that property
/// instead of overflowing the stack.
pub async fn build_object(
    config: &Configuration,
    result_map: &ResultMap,
    raw_row: &Value,
    settings: &Settings,
    column_prefix: Option<&str>,
    runner: &dyn NestedQueryRunner,
    seen_ancestors: &mut Vec<String>,
) -> Result<Value, ResultMapError> {
    if is_scalar(&result_map.lang_type) && result_map.mappings.is_empty() {
        // A bare scalar result type (`resultType="i64"` with no declared
        // `<result>` children): take the row's sole column.
        let value = match &raw_row {
            Value::Object(map) => map.values().next().cloned().map(Value::from_json).unwrap_or(Value::Null),
            other => other.clone(),
        };
        let handler = config.type_handlers.resolve(&result_map.lang_type, None);
        return handler
            .get_result("<scalar>", value)
            .map_err(|e| ResultMapError::CannotInstantiate(format!("{}: {e}", result_map.id)));
    }

    if seen_ancestors.contains(&result_map.id) {
        return Ok(Value::Null);
    }
    seen_ancestors.push(result_map.id.clone());

    let mut obj = Value::Object(serde_json::Map::new());
    let mut mapped_columns: Vec<String> = Vec::new();

    for mapping in &result_map.mappings {
        if let Some(nested_id) = &mapping.nested_result_map_id {
            let own_prefix = combine_prefix(column_prefix, mapping.column_prefix.as_deref());
            if !not_null_satisfied(mapping, raw_row, own_prefix.as_deref()) {
                continue;
            }
            let Some(nested_map) = config.result_map(nested_id) else {
                return Err(ResultMapError::CannotInstantiate(nested_id.clone()));
            };
            let nested_map = resolve_discriminated(config, nested_map, raw_row, own_prefix.as_deref())?;
            let value = Box::pin(build_object(
                config,
                &nested_map,
                raw_row,
                settings,
                own_prefix.as_deref(),
                runner,
                seen_ancestors,
            ))
            .await?;
            if mapping.is_collection {
                reflect::add(&mut obj, &mapping.property, value)
                    .map_err(|_| ResultMapError::CannotInstantiate(mapping.property.clone()))?;
            } else {
                reflect::set_path(&mut obj, &mapping.property, value)
                    .map_err(|_| ResultMapError::CannotInstantiate(mapping.property.clone()))?;
            }
        } else if let Some(nested_query_id) = &mapping.nested_query_id {
            let sub_param = nested_sub_parameter(mapping, raw_row, column_prefix);
            if settings.lazy_loading_enabled && mapping.lazy {
                lazy::mark(&mut obj, &mapping.property, nested_query_id.clone(), sub_param, mapping.is_collection);
            } else {
                let value = runner.run(nested_query_id, sub_param, mapping.is_collection).await?;
                reflect::set_path(&mut obj, &mapping.property, value)
                    .map_err(|_| ResultMapError::CannotInstantiate(mapping.property.clone()))?;
            }
        } else if let Some(column) = &mapping.column {
            let full = prefixed(column, column_prefix);
            mapped_columns.push(full.clone());
            let raw_value = row_get(raw_row, &full);
            let lang_type = mapping.lang_type.clone().unwrap_or(LangType::Other("Object".into()));
            let handler = config.type_handlers.resolve(&lang_type, mapping.db_type.as_ref());
            let converted = handler
                .get_result(&full, raw_value)
                .map_err(|e| ResultMapError::CannotInstantiate(format!("{full}: {e}")))?;
            reflect::set_path(&mut obj, &mapping.property, converted)
                .map_err(|_| ResultMapError::CannotInstantiate(mapping.property.clone()))?;
        }
    }

    let auto_map = result_map.auto_mapping.unwrap_or(match settings.auto_mapping_behavior {
        AutoMappingBehavior::None => false,
        AutoMappingBehavior::Partial => !result_map.has_nested_result_maps,
        AutoMappingBehavior::Full => true,
    });

    if auto_map {
        if let Value::Object(columns) = raw_row {
            for (column, raw_value) in columns {
                let Some(own_column) = column_prefix.and_then(|p| column.strip_prefix(p)).or_else(|| {
                    if column_prefix.is_none() {
                        Some(column.as_str())
                    } else {
                        None
                    }
                }) else {
                    continue;
                };
                if mapped_columns.iter().any(|c| c == column) {
                    continue;
                }
                let property = if settings.map_underscore_to_camel_case {
                    reflect::snake_to_camel(own_column)
                } else {
                    own_column.to_owned()
                };
                match settings.auto_mapping_unknown_column_behavior {
                    UnknownColumnBehavior::Failing if !result_map.mapped_properties().contains(&property) => {
                        return Err(ResultMapError::UnmappedColumn { column: column.clone(), result_map: result_map.id.clone() });
                    }
                    UnknownColumnBehavior::Warning => {
                        tracing::warn!(column = %column, result_map = %result_map.id, "auto-mapped unknown column");
                    }
                    _ => {}
                }
                let value = Value::from_json(raw_value.clone());
                let _ = reflect::set_path(&mut obj, &property, value);
            }
        }
    }

    seen_ancestors.pop();
    Ok(obj)
}

/// Materializes every row in `rows` (a `Value::Array` of raw per-column
/// objects produced by [`crate::executor`]) against `result_map`, folding
/// rows that share a row key into one object with accumulated collection
/// properties (`spec.md` §4.7 point 6).
pub async fn map_rows(
    config: &Configuration,
    result_map: &ResultMap,
    rows: Value,
    settings: &Settings,
    runner: &dyn NestedQueryRunner,
) -> Result<Vec<Value>, ResultMapError> {
    let Value::Array(raw_rows) = rows else { return Ok(Vec::new()) };

    let mut objects: HashMap<String, Value> = HashMap::new();
    let mut order: Vec<String> = Vec::new();

    for raw_row in &raw_rows {
        let resolved = resolve_discriminated(
            config,
            std::sync::Arc::new(result_map.clone()),
            raw_row,
            None,
        )?;
        let key = row_key(&resolved, raw_row, None);

        if !objects.contains_key(&key) {
            let mut seen_ancestors = Vec::new();
            let object =
                build_object(config, &resolved, raw_row, settings, None, runner, &mut seen_ancestors).await?;
            order.push(key.clone());
            objects.insert(key, object);
        } else if resolved.has_nested_result_maps {
            // A repeat top-level row: re-run only to pick up additional
            // collection-mapped rows, merging them into the existing object.
            let mut seen_ancestors = Vec::new();
            let fresh =
                build_object(config, &resolved, raw_row, settings, None, runner, &mut seen_ancestors).await?;
            merge_nested(config, &resolved, objects.get_mut(&key).unwrap(), fresh);
        }
    }

    Ok(order.into_iter().filter_map(|k| objects.remove(&k)).collect())
}

/// Extracts a row-key-like identity from an already-materialized object's
/// id-mapped properties, mirroring [`row_key`] but reading the built object
/// instead of a raw row — used by [`merge_nested`] to tell whether a nested
/// child from a duplicate row is one already present in the collection.
/// Returns `None` when the result map has no id mappings and no plain
/// columns to fall back on; such children can never be matched by identity,
/// only appended.
fn object_identity(result_map: &ResultMap, obj: &Value) -> Option<String> {
    let mut ids: Vec<&ResultMapping> = result_map.id_mappings().collect();
    if ids.is_empty() {
        ids = result_map
            .mappings
            .iter()
            .filter(|m| m.nested_result_map_id.is_none() && m.nested_query_id.is_none())
            .collect();
    }
    if ids.is_empty() {
        return None;
    }
    let mut parts = Vec::with_capacity(ids.len());
    for mapping in ids {
        let value = obj.get_field(&mapping.property).unwrap_or(Value::Null);
        parts.push(format!("{}={value}", mapping.property));
    }
    Some(parts.join("|"))
}

/// Folds a freshly built duplicate row into the already-accumulated object
/// for the same row key (`spec.md` §4.7 point 6: a cache of combined-row-key
/// → object "across rows"). A nested collection item is matched against the
/// existing collection by [`object_identity`] rather than appended blindly,
/// so a repeating nested row (e.g. a role repeating across permission rows
/// in a user→roles→permissions join) folds its new grandchild into the role
/// already in the collection instead of adding a duplicate role; recursing
/// lets the fold apply at every nesting depth, not just the top level.
fn merge_nested(config: &Configuration, result_map: &ResultMap, existing: &mut Value, fresh: Value) {
    let Value::Object(fresh_map) = fresh else { return };
    for mapping in result_map.mappings.iter().filter(|m| m.nested_result_map_id.is_some()) {
        let Some(nested_map) = config.result_map(mapping.nested_result_map_id.as_ref().unwrap()) else { continue };

        if mapping.is_collection {
            let fresh_items: Vec<Value> = match fresh_map.get(&mapping.property) {
                Some(serde_json::Value::Array(items)) => items.iter().cloned().map(Value::from_json).collect(),
                _ => continue,
            };
            let mut current: Vec<Value> = match existing.get_field(&mapping.property) {
                Some(Value::Array(items)) => items,
                _ => Vec::new(),
            };
            for item in fresh_items {
                let key = object_identity(&nested_map, &item);
                let matched =
                    key.as_ref().and_then(|k| current.iter_mut().find(|e| object_identity(&nested_map, e).as_ref() == Some(k)));
                match matched {
                    Some(existing_item) => merge_nested(config, &nested_map, existing_item, item),
                    None => current.push(item),
                }
            }
            let _ = reflect::set_path(existing, &mapping.property, Value::Array(current));
        } else {
            let Some(fresh_json) = fresh_map.get(&mapping.property) else { continue };
            let fresh_value = Value::from_json(fresh_json.clone());
            match existing.get_field(&mapping.property) {
                Some(mut existing_value) if !existing_value.is_null() => {
                    merge_nested(config, &nested_map, &mut existing_value, fresh_value);
                    let _ = reflect::set_path(existing, &mapping.property, existing_value);
                }
                _ if !fresh_value.is_null() => {
                    let _ = reflect::set_path(existing, &mapping.property, fresh_value);
                }
                _ => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::{ResultMapBuilder, ResultMappingFlags};

    fn id_mapping(property: &str, column: &str) -> ResultMapping {
        let mut mapping = ResultMapping::simple(property, column);
        mapping.flags = ResultMappingFlags::ID;
        mapping
    }

    fn nested(mut mapping: ResultMapping, nested_result_map_id: &str, is_collection: bool) -> ResultMapping {
        mapping.nested_result_map_id = Some(nested_result_map_id.to_owned());
        mapping.is_collection = is_collection;
        mapping
    }

    /// A three-level user → roles → permissions join where a role repeats
    /// across rows carrying different permissions: the repeating role must
    /// fold into the single role object already in `roles`, not duplicate.
    #[tokio::test]
    async fn deeply_nested_collections_fold_by_their_own_row_key() {
        let config = Configuration::new(Settings::default());

        let permission_map = ResultMapBuilder::new("permissionMap", LangType::Other("Permission".into()))
            .mapping(id_mapping("id", "perm_id"))
            .mapping(ResultMapping::simple("name", "perm_name"))
            .build(|_| None)
            .unwrap();
        config.add_result_map(permission_map).unwrap();

        let role_map = ResultMapBuilder::new("roleMap", LangType::Other("Role".into()))
            .mapping(id_mapping("id", "role_id"))
            .mapping(ResultMapping::simple("name", "role_name"))
            .mapping(nested(ResultMapping::simple("permissions", "perm_id"), "permissionMap", true))
            .build(|_| None)
            .unwrap();
        config.add_result_map(role_map).unwrap();

        let user_map = ResultMapBuilder::new("userMap", LangType::Other("User".into()))
            .mapping(id_mapping("id", "user_id"))
            .mapping(ResultMapping::simple("name", "user_name"))
            .mapping(nested(ResultMapping::simple("roles", "role_id"), "roleMap", true))
            .build(|_| None)
            .unwrap();

        let row = |perm_id: i64, perm_name: &str| {
            Value::object([
                ("user_id".to_owned(), serde_json::json!(1)),
                ("user_name".to_owned(), serde_json::json!("ada")),
                ("role_id".to_owned(), serde_json::json!(10)),
                ("role_name".to_owned(), serde_json::json!("admin")),
                ("perm_id".to_owned(), serde_json::json!(perm_id)),
                ("perm_name".to_owned(), serde_json::json!(perm_name)),
            ])
        };

        let rows = Value::Array(vec![row(100, "read"), row(101, "write")]);
        let settings = Settings::default();
        let objects = map_rows(&config, &user_map, rows, &settings, &NoNestedQueries).await.unwrap();

        assert_eq!(objects.len(), 1);
        let roles = objects[0].get_field("roles").unwrap();
        let Value::Array(roles) = roles else { panic!("roles should be an array") };
        assert_eq!(roles.len(), 1, "repeating role row must fold into one role, not duplicate");

        let permissions = roles[0].get_field("permissions").unwrap();
        let Value::Array(permissions) = permissions else { panic!("permissions should be an array") };
        assert_eq!(permissions.len(), 2, "both permission rows must be folded into the single role");
    }
}
