use crate::dbtype::{DbType, LangType};

/// Direction of a parameter binding — almost always `In`; `Out`/`InOut` only
/// matter for callable (stored-procedure) statements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterDirection {
    In,
    Out,
    InOut,
}

/// One `#{prop,attr=val,...}` occurrence, rewritten to a positional `?` by
/// [`crate::dynamic_sql::rewrite_parameters`] (`spec.md` §3, §4.4).
#[derive(Debug, Clone)]
pub struct ParameterMapping {
    pub property: String,
    pub lang_type: LangType,
    pub db_type: Option<DbType>,
    pub numeric_scale: Option<u32>,
    pub type_handler: Option<String>,
    pub direction: ParameterDirection,
    pub result_map_id: Option<String>,
    pub jdbc_type_name: Option<String>,
}

impl ParameterMapping {
    pub fn simple(property: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            lang_type: LangType::Other("Object".into()),
            db_type: None,
            numeric_scale: None,
            type_handler: None,
            direction: ParameterDirection::In,
            result_map_id: None,
            jdbc_type_name: None,
        }
    }
}
