//! Lazy-loaded properties (`spec.md` §4.7 point 3, §9's proxy-generation
//! note).
//!
//! MyBatis defers a lazily-mapped association/collection by wrapping the
//! whole result object in a runtime-generated subclass whose getter
//! intercepts first access. Rust has no runtime subclassing, so `spec.md`
//! §9 names the alternative for languages without class generation: "an
//! explicit interface-based façade" the caller consults instead of a
//! transparently intercepted getter. This module is that façade: a
//! [`LazyMarker`] recorded alongside the mapped [`Value`] under a reserved
//! field, and [`resolve`]/[`is_pending`] helpers a [`crate::session::SqlSession`]
//! uses to load the real value on demand.

use serde_json::Map;

use crate::value::Value;

/// The field a lazily-mapped property's marker is parked under, namespaced
/// so it never collides with a real mapped property name.
const MARKER_FIELD: &str = "__sqlmap_lazy__";

/// Enough information to run the deferred nested query later.
#[derive(Debug, Clone)]
pub struct LazyMarker {
    pub statement_id: String,
    pub parameter: Value,
    /// Mirrors the owning `ResultMapping::is_collection`: whether the
    /// deferred query should bind every row (a `<collection>`) or just the
    /// first (an `<association>`).
    pub many: bool,
}

/// Records that `property` on `target` (a `Value::Object`) is not yet
/// loaded; the property itself is left absent until [`resolve`] fills it
/// in.
pub fn mark(target: &mut Value, property: &str, statement_id: impl Into<String>, parameter: Value, many: bool) {
    let Value::Object(map) = target else { return };
    let mut markers = match map.remove(MARKER_FIELD) {
        Some(serde_json::Value::Object(m)) => m,
        _ => Map::new(),
    };
    let marker = serde_json::json!({
        "statement_id": statement_id.into(),
        "parameter": crate::reflect::to_json(parameter),
        "many": many,
    });
    markers.insert(property.to_owned(), marker);
    map.insert(MARKER_FIELD.to_owned(), serde_json::Value::Object(markers));
}

/// Is `property` on `target` parked behind a lazy marker?
pub fn is_pending(target: &Value, property: &str) -> bool {
    marker_for(target, property).is_some()
}

fn marker_for(target: &Value, property: &str) -> Option<LazyMarker> {
    let Value::Object(map) = target else { return None };
    let serde_json::Value::Object(markers) = map.get(MARKER_FIELD)? else { return None };
    let entry = markers.get(property)?;
    let statement_id = entry.get("statement_id")?.as_str()?.to_owned();
    let parameter = Value::from_json(entry.get("parameter")?.clone());
    let many = entry.get("many").and_then(|v| v.as_bool()).unwrap_or(false);
    Some(LazyMarker { statement_id, parameter, many })
}

/// Takes the marker for `property`, removing it so a second resolve is a
/// no-op rather than re-running the nested query.
pub fn take(target: &mut Value, property: &str) -> Option<LazyMarker> {
    let marker = marker_for(target, property)?;
    if let Value::Object(map) = target {
        if let Some(serde_json::Value::Object(markers)) = map.get_mut(MARKER_FIELD) {
            markers.remove(property);
        }
    }
    Some(marker)
}
