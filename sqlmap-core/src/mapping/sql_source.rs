use crate::dynamic_sql::SqlNode;
use crate::error::ScriptingError;
use crate::mapping::ParameterMapping;
use crate::reflect::Reflect;
use crate::value::Value;

/// The per-invocation rendered SQL (`spec.md` §3): final text with
/// positional placeholders, the ordered parameter-binding list, the
/// original parameter object, and the additional-parameters bag the
/// renderer populates (loop item/index bindings, `<bind>`-declared names).
#[derive(Debug, Clone)]
pub struct BoundSql {
    pub sql: String,
    pub parameter_mappings: Vec<ParameterMapping>,
    pub parameter_object: Value,
    pub additional_parameters: Value,
}

impl BoundSql {
    /// `spec.md` §8 invariant: the number of `?` placeholders equals the
    /// number of parameter mappings.
    pub fn placeholder_count(&self) -> usize {
        self.sql.matches('?').count()
    }

    pub fn has_additional_parameter(&self, property: &str) -> bool {
        crate::reflect::has_getter(&self.additional_parameters, property, false)
    }

    /// Resolves one mapping's value, consulting the additional-parameters
    /// bag before the root parameter object (`spec.md` §3: "every property
    /// path in the binding list is resolvable ... or the additional
    /// parameters bag").
    pub fn value_for(&self, mapping: &ParameterMapping, fold_snake_case: bool) -> Option<Value> {
        if self.has_additional_parameter(&mapping.property) {
            return crate::reflect::get_path(&self.additional_parameters, &mapping.property, fold_snake_case);
        }
        match &self.parameter_object {
            Value::Object(_) => crate::reflect::get_path(&self.parameter_object, &mapping.property, fold_snake_case),
            // A single non-object parameter is bound directly under its own
            // value regardless of the declared property name (mirrors a
            // simple-typed root parameter in `spec.md` §4.5's `value` binding).
            other => Some(other.clone()),
        }
    }
}

/// Opaque producer of a [`BoundSql`] for a given parameter object
/// (`spec.md` §3).
#[derive(Debug, Clone)]
pub enum SqlSource {
    /// Prepared text and parameter-binding list requiring no per-call work.
    Static { sql: String, parameter_mappings: Vec<ParameterMapping> },
    /// An AST of [`SqlNode`]s rendered fresh on every call.
    Dynamic { root: SqlNode },
}

impl SqlSource {
    pub fn get_bound_sql(
        &self,
        parameter_object: &Value,
        fold_snake_case: bool,
    ) -> Result<BoundSql, ScriptingError> {
        match self {
            SqlSource::Static { sql, parameter_mappings } => Ok(BoundSql {
                sql: sql.clone(),
                parameter_mappings: parameter_mappings.clone(),
                parameter_object: parameter_object.clone(),
                additional_parameters: Value::Object(Default::default()),
            }),
            SqlSource::Dynamic { root } => {
                crate::dynamic_sql::render(root, parameter_object, fold_snake_case)
            }
        }
    }
}

/// Reflects a parameter object so the renderer and `BoundSql::value_for` can
/// share the same path-navigation code regardless of whether the caller
/// passed a `Value::Object` or something implementing [`Reflect`] directly.
pub fn as_reflect(value: &Value) -> &dyn Reflect {
    value
}
