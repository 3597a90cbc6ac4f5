//! The Configuration Catalogue (`spec.md` §4.4): the process-wide registry
//! of `MappedStatement`s, `ResultMap`s, shared caches, SQL fragments, global
//! settings, and the type-handler registry, plus the deferred-retry
//! machinery `spec.md` §4.4/§9 describes for cross-references that name a
//! not-yet-compiled sibling.
//!
//! No teacher counterpart — `asphalt_core` never needed a runtime,
//! string-addressed catalogue since its statements are compile-time DSL
//! values — so this is grounded directly in `spec.md` §4.4/§9's
//! description, using `dashmap` for the read-mostly registries the same
//! way `type_handler/registry.rs` already does.

mod incomplete;

pub use incomplete::{DeferredCacheRef, DeferredResultMap, DeferredStatement};

use std::sync::Arc;
use std::sync::Mutex;

use dashmap::DashMap;

use crate::cache::Cache;
use crate::config::{Environment, Settings};
use crate::error::ConfigurationError;
use crate::mapping::{MappedStatement, ResultMap};
use crate::type_handler::TypeHandlerRegistry;

/// Qualifies `id` with `namespace` unless it already contains a dot
/// (`spec.md` §4.4: "a reference that contains a dot is treated as fully
/// qualified; otherwise the current namespace is prepended").
pub fn qualify(namespace: &str, id: &str) -> String {
    if id.contains('.') {
        id.to_owned()
    } else {
        format!("{namespace}.{id}")
    }
}

/// The central, process-wide catalogue (`spec.md` §2 component 4). Built
/// once at startup, shared via `Arc` across every [`crate::session::SqlSession`]
/// thereafter (`spec.md` §5).
pub struct Configuration {
    pub settings: Settings,
    pub environment: Option<Environment>,
    pub database_id: Option<String>,
    pub type_handlers: TypeHandlerRegistry,
    pub global_properties: DashMap<String, String>,

    statements: DashMap<String, Arc<MappedStatement>>,
    result_maps: DashMap<String, Arc<ResultMap>>,
    caches: DashMap<String, Arc<Cache>>,
    sql_fragments: DashMap<String, String>,

    incomplete_result_maps: Mutex<Vec<DeferredResultMap>>,
    incomplete_cache_refs: Mutex<Vec<DeferredCacheRef>>,
    incomplete_statements: Mutex<Vec<DeferredStatement>>,
}

impl Configuration {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            environment: None,
            database_id: None,
            type_handlers: TypeHandlerRegistry::bootstrap(),
            global_properties: DashMap::new(),
            statements: DashMap::new(),
            result_maps: DashMap::new(),
            caches: DashMap::new(),
            sql_fragments: DashMap::new(),
            incomplete_result_maps: Mutex::new(Vec::new()),
            incomplete_cache_refs: Mutex::new(Vec::new()),
            incomplete_statements: Mutex::new(Vec::new()),
        }
    }

    // --- MappedStatement -------------------------------------------------

    pub fn add_statement(&self, statement: MappedStatement) -> Result<(), ConfigurationError> {
        let id = statement.id.clone();
        if self.statements.contains_key(&id) {
            return Err(ConfigurationError::DuplicateStatement(id));
        }
        tracing::debug!(statement_id = %id, "compiled mapped statement");
        self.statements.insert(id, Arc::new(statement));
        Ok(())
    }

    pub fn statement(&self, id: &str) -> Option<Arc<MappedStatement>> {
        self.statements.get(id).map(|e| e.value().clone())
    }

    pub fn has_statement(&self, id: &str) -> bool {
        self.statements.contains_key(id)
    }

    // --- ResultMap ---------------------------------------------------------

    pub fn add_result_map(&self, result_map: ResultMap) -> Result<(), ConfigurationError> {
        let id = result_map.id.clone();
        if self.result_maps.contains_key(&id) {
            return Err(ConfigurationError::DuplicateResultMap(id));
        }
        self.result_maps.insert(id, Arc::new(result_map));
        Ok(())
    }

    pub fn result_map(&self, id: &str) -> Option<Arc<ResultMap>> {
        self.result_maps.get(id).map(|e| e.value().clone())
    }

    pub fn park_result_map(&self, deferred: DeferredResultMap) {
        tracing::warn!(result_map_id = %deferred.builder.id(), "result map parked, awaiting extends parent");
        self.incomplete_result_maps.lock().expect("incomplete result map queue poisoned").push(deferred);
    }

    // --- Cache ---------------------------------------------------------------

    pub fn add_cache(&self, namespace: impl Into<String>, cache: Cache) -> Result<Arc<Cache>, ConfigurationError> {
        let namespace = namespace.into();
        if self.caches.contains_key(&namespace) {
            return Err(ConfigurationError::DuplicateCache(namespace));
        }
        let cache = Arc::new(cache);
        self.caches.insert(namespace, cache.clone());
        Ok(cache)
    }

    pub fn cache(&self, namespace: &str) -> Option<Arc<Cache>> {
        self.caches.get(namespace).map(|e| e.value().clone())
    }

    /// Aliases `namespace`'s cache to whatever `target_namespace` resolves
    /// to, or parks the reference if the target isn't built yet
    /// (`spec.md` §4.3: "cache-reference resolution").
    pub fn add_cache_ref(&self, namespace: &str, target_namespace: &str) {
        match self.cache(target_namespace) {
            Some(cache) => {
                self.caches.insert(namespace.to_owned(), cache);
            }
            None => self.park_cache_ref(DeferredCacheRef {
                namespace: namespace.to_owned(),
                target_namespace: target_namespace.to_owned(),
            }),
        }
    }

    pub fn park_cache_ref(&self, deferred: DeferredCacheRef) {
        tracing::warn!(namespace = %deferred.namespace, target = %deferred.target_namespace, "cache-ref parked");
        self.incomplete_cache_refs.lock().expect("incomplete cache-ref queue poisoned").push(deferred);
    }

    // --- SQL fragments ---------------------------------------------------------

    pub fn add_sql_fragment(&self, id: impl Into<String>, raw_body: impl Into<String>) {
        self.sql_fragments.insert(id.into(), raw_body.into());
    }

    pub fn sql_fragment(&self, id: &str) -> Option<String> {
        self.sql_fragments.get(id).map(|e| e.value().clone())
    }

    pub fn park_statement(&self, deferred: DeferredStatement) {
        tracing::warn!(statement_id = %deferred.id, awaiting = %deferred.awaiting, "statement parked");
        self.incomplete_statements.lock().expect("incomplete statement queue poisoned").push(deferred);
    }

    // --- End-of-compilation sweep -------------------------------------------

    /// Retries every parked builder to a fixed point (`spec.md` §4.4: "iterate
    /// the four incomplete-lists, re-attempt each, remove those that now
    /// succeed; remaining entries indicate a genuine configuration error
    /// surfaced at first use"). Returns the first remaining failure, if any.
    pub fn finish_compilation(&self) -> Result<(), ConfigurationError> {
        loop {
            let mut progressed = false;

            progressed |= self.sweep_result_maps()?;
            progressed |= self.sweep_cache_refs();
            progressed |= self.sweep_statements()?;

            if !progressed {
                break;
            }
        }

        if let Some(first) = self.incomplete_result_maps.lock().expect("poisoned").first() {
            return Err(ConfigurationError::UnresolvedReference {
                namespace: first.builder.id().to_owned(),
                reference: first.builder.extends_id().unwrap_or_default().to_owned(),
            });
        }
        if let Some(first) = self.incomplete_cache_refs.lock().expect("poisoned").first() {
            return Err(ConfigurationError::UnresolvedReference {
                namespace: first.namespace.clone(),
                reference: first.target_namespace.clone(),
            });
        }
        if let Some(first) = self.incomplete_statements.lock().expect("poisoned").first() {
            return Err(ConfigurationError::UnresolvedReference {
                namespace: first.id.clone(),
                reference: first.awaiting.clone(),
            });
        }
        Ok(())
    }

    fn sweep_result_maps(&self) -> Result<bool, ConfigurationError> {
        let pending = std::mem::take(&mut *self.incomplete_result_maps.lock().expect("poisoned"));
        let mut still_pending = Vec::new();
        let mut progressed = false;

        for deferred in pending {
            let builder = deferred.builder.clone();
            match builder.build(|pid| self.result_map(pid).map(|arc| (*arc).clone())) {
                Ok(result_map) => {
                    self.add_result_map(result_map)?;
                    progressed = true;
                }
                Err(_incomplete) => still_pending.push(deferred),
            }
        }

        *self.incomplete_result_maps.lock().expect("poisoned") = still_pending;
        Ok(progressed)
    }

    fn sweep_cache_refs(&self) -> bool {
        let pending = std::mem::take(&mut *self.incomplete_cache_refs.lock().expect("poisoned"));
        let mut still_pending = Vec::new();
        let mut progressed = false;

        for deferred in pending {
            match self.cache(&deferred.target_namespace) {
                Some(cache) => {
                    self.caches.insert(deferred.namespace.clone(), cache);
                    progressed = true;
                }
                None => still_pending.push(deferred),
            }
        }

        *self.incomplete_cache_refs.lock().expect("poisoned") = still_pending;
        progressed
    }

    fn sweep_statements(&self) -> Result<bool, ConfigurationError> {
        let pending = std::mem::take(&mut *self.incomplete_statements.lock().expect("poisoned"));
        let mut still_pending = Vec::new();
        let mut progressed = false;

        for deferred in pending {
            match (deferred.retry)(self) {
                Ok(()) => progressed = true,
                Err(_incomplete) => still_pending.push(deferred),
            }
        }

        *self.incomplete_statements.lock().expect("poisoned") = still_pending;
        Ok(progressed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dbtype::LangType;
    use crate::error::IncompleteElement;
    use crate::mapping::{ResultMapBuilder, ResultMapping};

    #[test]
    fn qualify_prepends_namespace_unless_already_qualified() {
        assert_eq!(qualify("ns", "selectAll"), "ns.selectAll");
        assert_eq!(qualify("ns", "other.selectAll"), "other.selectAll");
    }

    #[test]
    fn parked_result_map_resolves_once_parent_arrives() {
        let config = Configuration::new(Settings::default());

        let parent = ResultMapBuilder::new("ns.parent", LangType::Other("User".into()))
            .mapping(ResultMapping::simple("id", "id"))
            .build(|_| None)
            .unwrap();
        config.add_result_map(parent).unwrap();

        let child = ResultMapBuilder::new("ns.child", LangType::Other("User".into()))
            .extends("ns.parent")
            .mapping(ResultMapping::simple("name", "name"));

        match child.clone().build(|pid| config.result_map(pid).map(|a| (*a).clone())) {
            Ok(result_map) => config.add_result_map(result_map).unwrap(),
            Err(_incomplete) => config.park_result_map(DeferredResultMap { builder: child }),
        }

        assert!(config.result_map("ns.child").is_some());
        assert!(config.finish_compilation().is_ok());
    }

    #[test]
    fn statement_parked_on_missing_reference_is_still_pending_after_sweep() {
        let config = Configuration::new(Settings::default());
        config.park_statement(DeferredStatement {
            id: "ns.select".into(),
            awaiting: "ns.neverDefined".into(),
            retry: Box::new(|cfg| {
                if cfg.sql_fragment("ns.neverDefined").is_some() {
                    Ok(())
                } else {
                    Err(IncompleteElement {
                        id: "ns.select".into(),
                        awaiting: "ns.neverDefined".into(),
                    })
                }
            }),
        });

        let result = config.finish_compilation();
        assert!(result.is_err());
    }

    #[test]
    fn cache_ref_resolves_once_target_cache_exists() {
        let config = Configuration::new(Settings::default());
        config.add_cache_ref("child", "parent");
        assert!(config.cache("child").is_none());

        config
            .add_cache(
                "parent",
                Cache::new("parent", Box::new(crate::cache::PerpetualCache::new("parent"))),
            )
            .unwrap();

        assert!(config.finish_compilation().is_ok());
        assert!(config.cache("child").is_some());
    }
}
