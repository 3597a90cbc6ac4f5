//! A handful of handlers that ship with the runtime.

use crate::connection::DriverBind;
use crate::dbtype::DbType;
use crate::error::TypeError;
use crate::type_handler::TypeHandler;
use crate::value::Value;

/// Passes the value through unchanged, tagging it with a fixed `DbType` (or
/// none). Registered as the default handler for every scalar `LangType` that
/// has no bespoke conversion.
pub struct IdentityTypeHandler {
    db_type: Option<DbType>,
}

impl IdentityTypeHandler {
    pub fn new(db_type: Option<DbType>) -> Self {
        Self { db_type }
    }
}

impl TypeHandler for IdentityTypeHandler {
    fn set_parameter(&self, _index: usize, value: Value) -> Result<DriverBind, TypeError> {
        Ok(DriverBind { value, db_type: self.db_type })
    }

    fn get_result(&self, _column: &str, value: Value) -> Result<Value, TypeError> {
        Ok(value)
    }
}

/// Maps a fixed, ordered list of variant names to their positional ordinal
/// in the database and back, the dynamic equivalent of MyBatis's
/// `EnumOrdinalTypeHandler`.
///
/// Since this runtime has no compile-time enum type to reflect over, the
/// variant list is supplied explicitly (typically from a `<typeHandler>`
/// configuration entry naming the enum's variants in declaration order).
pub struct OrdinalEnumTypeHandler {
    variants: Vec<String>,
    db_type: Option<DbType>,
}

impl OrdinalEnumTypeHandler {
    pub fn new(variants: Vec<String>, db_type: Option<DbType>) -> Self {
        Self { variants, db_type }
    }
}

impl TypeHandler for OrdinalEnumTypeHandler {
    fn set_parameter(&self, index: usize, value: Value) -> Result<DriverBind, TypeError> {
        let name = value.as_str().ok_or_else(|| TypeError::SetParameter {
            index,
            reason: "enum ordinal handler expects a string variant name".into(),
        })?;
        let ordinal = self
            .variants
            .iter()
            .position(|v| v == name)
            .ok_or_else(|| TypeError::SetParameter {
                index,
                reason: format!("`{name}` is not one of {:?}", self.variants),
            })?;
        Ok(DriverBind { value: Value::I64(ordinal as i64), db_type: self.db_type })
    }

    fn get_result(&self, column: &str, value: Value) -> Result<Value, TypeError> {
        let ordinal = value.as_i64().ok_or_else(|| TypeError::GetResult {
            column: column.to_owned(),
            reason: "enum ordinal handler expects an integer column".into(),
        })?;
        self.variants
            .get(ordinal as usize)
            .map(|name| Value::Str(name.clone()))
            .ok_or_else(|| TypeError::GetResult {
                column: column.to_owned(),
                reason: format!("ordinal {ordinal} out of range for {:?}", self.variants),
            })
    }
}

/// The registry's last resort: no `(lang, db)` pair matched, so the value is
/// passed through as-is and whatever mismatch exists surfaces at the driver
/// instead of here. Mirrors MyBatis's `UnknownTypeHandler`, minus the column
/// metadata introspection it performs to re-resolve a concrete handler — the
/// resolution that introspection would redo is already the registry's own
/// fallback chain (see [`crate::type_handler::TypeHandlerRegistry::resolve`]).
pub struct UnknownTypeHandler;

impl TypeHandler for UnknownTypeHandler {
    fn set_parameter(&self, _index: usize, value: Value) -> Result<DriverBind, TypeError> {
        Ok(DriverBind { value, db_type: None })
    }

    fn get_result(&self, _column: &str, value: Value) -> Result<Value, TypeError> {
        Ok(value)
    }
}
