/// Which executor variant new sessions get by default (`spec.md` §4.6/§6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutorType {
    Simple,
    Reuse,
    Batch,
}

/// Scope of the session-local cache (`spec.md` §6:
/// `localCacheScope ∈ {SESSION, STATEMENT}`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalCacheScope {
    Session,
    Statement,
}

/// `spec.md` §6: `autoMappingBehavior ∈ {NONE, PARTIAL, FULL}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutoMappingBehavior {
    /// Disables auto-mapping entirely; only declared mappings apply.
    None,
    /// Auto-maps only result maps with no nested result mappings.
    Partial,
    /// Auto-maps everything, nested result maps included.
    Full,
}

/// `spec.md` §6: `autoMappingUnknownColumnBehavior ∈ {NONE, WARNING, FAILING}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnknownColumnBehavior {
    None,
    Warning,
    Failing,
}

/// The recognised `<settings>` (`spec.md` §6's excerpt table), each with the
/// documented default.
#[derive(Debug, Clone)]
pub struct Settings {
    pub cache_enabled: bool,
    pub lazy_loading_enabled: bool,
    pub aggressive_lazy_loading: bool,
    pub use_generated_keys: bool,
    pub default_executor_type: ExecutorType,
    pub default_statement_timeout: Option<u32>,
    pub default_fetch_size: Option<u32>,
    pub map_underscore_to_camel_case: bool,
    pub safe_row_bounds_enabled: bool,
    pub local_cache_scope: LocalCacheScope,
    pub jdbc_type_for_null: Option<crate::dbtype::DbType>,
    pub lazy_load_trigger_methods: Vec<String>,
    pub auto_mapping_behavior: AutoMappingBehavior,
    pub auto_mapping_unknown_column_behavior: UnknownColumnBehavior,
    pub call_setters_on_nulls: bool,
    pub return_instance_for_empty_row: bool,
    pub use_actual_param_name: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            cache_enabled: true,
            lazy_loading_enabled: false,
            aggressive_lazy_loading: false,
            use_generated_keys: false,
            default_executor_type: ExecutorType::Simple,
            default_statement_timeout: None,
            default_fetch_size: None,
            map_underscore_to_camel_case: false,
            safe_row_bounds_enabled: false,
            local_cache_scope: LocalCacheScope::Session,
            jdbc_type_for_null: None,
            lazy_load_trigger_methods: vec!["equals".into(), "clone".into(), "hash_code".into(), "to_string".into()],
            auto_mapping_behavior: AutoMappingBehavior::Partial,
            auto_mapping_unknown_column_behavior: UnknownColumnBehavior::None,
            call_setters_on_nulls: false,
            return_instance_for_empty_row: false,
            use_actual_param_name: true,
        }
    }
}

impl Settings {
    /// Applies one `<settings><setting name="..." value="..."/>` entry.
    /// Unknown setting names surface as [`crate::error::ConfigurationError`].
    pub fn apply(&mut self, name: &str, value: &str) -> Result<(), crate::error::ConfigurationError> {
        let as_bool = |v: &str| v.eq_ignore_ascii_case("true");
        match name {
            "cacheEnabled" => self.cache_enabled = as_bool(value),
            "lazyLoadingEnabled" => self.lazy_loading_enabled = as_bool(value),
            "aggressiveLazyLoading" => self.aggressive_lazy_loading = as_bool(value),
            "useGeneratedKeys" => self.use_generated_keys = as_bool(value),
            "defaultExecutorType" => {
                self.default_executor_type = match value {
                    "SIMPLE" => ExecutorType::Simple,
                    "REUSE" => ExecutorType::Reuse,
                    "BATCH" => ExecutorType::Batch,
                    other => {
                        return Err(crate::error::ConfigurationError::Other(format!(
                            "unknown defaultExecutorType `{other}`"
                        )))
                    }
                }
            }
            "defaultStatementTimeout" => self.default_statement_timeout = value.parse().ok(),
            "defaultFetchSize" => self.default_fetch_size = value.parse().ok(),
            "mapUnderscoreToCamelCase" => self.map_underscore_to_camel_case = as_bool(value),
            "safeRowBoundsEnabled" => self.safe_row_bounds_enabled = as_bool(value),
            "localCacheScope" => {
                self.local_cache_scope = match value {
                    "SESSION" => LocalCacheScope::Session,
                    "STATEMENT" => LocalCacheScope::Statement,
                    other => {
                        return Err(crate::error::ConfigurationError::Other(format!(
                            "unknown localCacheScope `{other}`"
                        )))
                    }
                }
            }
            "jdbcTypeForNull" => self.jdbc_type_for_null = Some(crate::dbtype::DbType::parse(value)),
            "lazyLoadTriggerMethods" => {
                self.lazy_load_trigger_methods = value.split(',').map(|s| s.trim().to_owned()).collect()
            }
            "autoMappingBehavior" => {
                self.auto_mapping_behavior = match value {
                    "NONE" => AutoMappingBehavior::None,
                    "PARTIAL" => AutoMappingBehavior::Partial,
                    "FULL" => AutoMappingBehavior::Full,
                    other => {
                        return Err(crate::error::ConfigurationError::Other(format!(
                            "unknown autoMappingBehavior `{other}`"
                        )))
                    }
                }
            }
            "autoMappingUnknownColumnBehavior" => {
                self.auto_mapping_unknown_column_behavior = match value {
                    "NONE" => UnknownColumnBehavior::None,
                    "WARNING" => UnknownColumnBehavior::Warning,
                    "FAILING" => UnknownColumnBehavior::Failing,
                    other => {
                        return Err(crate::error::ConfigurationError::Other(format!(
                            "unknown autoMappingUnknownColumnBehavior `{other}`"
                        )))
                    }
                }
            }
            "callSettersOnNulls" => self.call_setters_on_nulls = as_bool(value),
            "returnInstanceForEmptyRow" => self.return_instance_for_empty_row = as_bool(value),
            "useActualParamName" => self.use_actual_param_name = as_bool(value),
            "defaultResultSetType" | "safeResultHandlerEnabled" => {
                // Recognised but not modelled as a field this runtime acts on yet.
            }
            other => return Err(crate::error::ConfigurationError::UnknownSetting(other.to_owned())),
        }
        Ok(())
    }
}
