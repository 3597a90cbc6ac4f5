//! The Executor (`spec.md` §4.6): drives a [`RawConnection`] through the
//! session-local cache, builds driver binds from a [`BoundSql`], and (for
//! [`CachingExecutor`]) consults the statement's second-level cache before
//! falling through to an inner executor variant.
//!
//! No teacher counterpart — `asphalt_core` executes a query the moment its
//! DSL builder is awaited, with no session-scoped buffering layer in
//! between — so this module is grounded directly in `spec.md` §4.6's three
//! variants plus the cache-consulting wrapper, built the same way the rest
//! of this runtime's seams are: small object-safe traits returning manually
//! boxed futures (mirroring `crate::connection::TransactionManager` and
//! `crate::executor::key_gen::KeyGenerator`) rather than `async-trait`.

pub mod key_gen;

use std::sync::atomic::{AtomicUsize, Ordering};

use dashmap::DashMap;
use futures_util::StreamExt;

use crate::backend::{AsyncResult, Backend};
use crate::cache::{CacheKey, TransactionalCache};
use crate::catalogue::Configuration;
use crate::connection::{DriverBind, RawConnection, Row};
use crate::error::ExecutorError;
use crate::mapping::MappedStatement;
use crate::reflect;
use crate::value::Value;

use self::key_gen::{GeneratedKeyRow, PeerStatementRunner};

/// Pagination bounds applied in-memory after the driver returns every row
/// (`spec.md` §4.6: row bounds are "applied by the executor after the
/// driver returns rows, not pushed into generated SQL").
#[derive(Debug, Clone, Copy, Default)]
pub struct RowBounds {
    pub offset: usize,
    pub limit: Option<usize>,
}

impl RowBounds {
    pub const NONE: RowBounds = RowBounds { offset: 0, limit: None };

    fn apply(&self, rows: Vec<Value>) -> Vec<Value> {
        let iter = rows.into_iter().skip(self.offset);
        match self.limit {
            Some(limit) => iter.take(limit).collect(),
            None => iter.collect(),
        }
    }
}

/// Turns one driver row into a column-name-keyed `Value::Object` of *raw*
/// column values. No [`crate::type_handler::TypeHandler`] conversion
/// happens here — that needs a [`crate::mapping::ResultMap`], which isn't
/// known at this layer; see `crate::result`.
fn row_to_value(row: &impl Row) -> Value {
    let mut map = serde_json::Map::new();
    for i in 0..row.n_columns() {
        map.insert(row.column_name(i).to_owned(), reflect::to_json(row.get_value(i)));
    }
    Value::Object(map)
}

fn generated_key_row(row: &impl Row) -> GeneratedKeyRow {
    let mut columns = Vec::with_capacity(row.n_columns());
    for i in 0..row.n_columns() {
        columns.push((row.column_name(i).to_owned(), row.get_value(i)));
    }
    GeneratedKeyRow { columns }
}

/// The session-local cache (`spec.md` §4.6/§5): every `query` call is
/// memoized here for the life of the session (or the statement, under
/// `localCacheScope=STATEMENT`), including a placeholder for queries still
/// in flight so a circular nested-query reference resolves to an empty
/// result rather than deadlocking or recursing forever (`spec.md` §9).
enum LocalEntry {
    Loading,
    Done(Value),
}

pub struct LocalCache {
    entries: DashMap<CacheKey, LocalEntry>,
}

impl LocalCache {
    pub fn new() -> Self {
        Self { entries: DashMap::new() }
    }

    fn begin(&self, key: &CacheKey) -> Option<Value> {
        match self.entries.get(key).map(|e| match e.value() {
            LocalEntry::Loading => None,
            LocalEntry::Done(v) => Some(v.clone()),
        }) {
            Some(hit) => hit,
            None => {
                self.entries.insert(key.clone(), LocalEntry::Loading);
                None
            }
        }
    }

    fn finish(&self, key: CacheKey, value: Value) {
        self.entries.insert(key, LocalEntry::Done(value));
    }

    pub fn clear(&self) {
        self.entries.clear();
    }
}

impl Default for LocalCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolves every `#{...}` placeholder in a [`crate::mapping::BoundSql`]
/// into a driver-ready [`DriverBind`], applying the registered type handler
/// per binding (`spec.md` §4.1/§4.6).
pub fn bind_parameters(
    config: &Configuration,
    bound_sql: &crate::mapping::BoundSql,
) -> Result<Vec<DriverBind>, ExecutorError> {
    let fold = config.settings.map_underscore_to_camel_case;
    let mut binds = Vec::with_capacity(bound_sql.parameter_mappings.len());
    for (i, mapping) in bound_sql.parameter_mappings.iter().enumerate() {
        let value = bound_sql.value_for(mapping, fold).unwrap_or(Value::Null);
        let db_type = mapping.db_type.clone().or_else(|| {
            if value.is_null() {
                config.settings.jdbc_type_for_null.clone()
            } else {
                None
            }
        });
        let handler = config.type_handlers.resolve(&mapping.lang_type, db_type.as_ref());
        let bind = handler
            .set_parameter(i, value)
            .map_err(|e| ExecutorError::KeyWriteback { property: mapping.property.clone(), reason: e.to_string() })?;
        binds.push(bind);
    }
    Ok(binds)
}

/// The Executor seam (`spec.md` §4.6). Generic over the connection type so
/// a backend crate needs no knowledge of this runtime's caching/key-
/// generation plumbing.
pub trait Executor<Conn: RawConnection>: Send + Sync {
    /// Runs a `SELECT`-shaped statement, returning its rows as
    /// `Value::Array` of raw, per-column `Value::Object`s (not yet passed
    /// through a [`crate::mapping::ResultMap`]).
    fn query<'a>(
        &'a self,
        conn: &'a Conn,
        statement: &'a MappedStatement,
        parameter: &'a Value,
        environment_id: &'a str,
        bounds: RowBounds,
    ) -> AsyncResult<'a, Result<Value, ExecutorError>>;

    /// Runs an `INSERT`/`UPDATE`/`DELETE` statement, writing any generated
    /// keys back onto `parameter`. Returns the affected-row count.
    fn update<'a>(
        &'a self,
        conn: &'a Conn,
        statement: &'a MappedStatement,
        parameter: &'a mut Value,
    ) -> AsyncResult<'a, Result<u64, ExecutorError>>;

    /// Flushes any buffered batched statements (`spec.md` §4.6: "Batch ...
    /// buffers ... until `flushStatements`/commit/rollback").
    fn flush_statements<'a>(&'a self, conn: &'a Conn) -> AsyncResult<'a, Result<(), ExecutorError>>;

    fn clear_local_cache(&self);

    /// Publishes this executor's buffered second-level cache writes, if any
    /// (`spec.md` §4.6: "commit flushes all per-namespace overlays"). A
    /// no-op for every variant but [`CachingExecutor`].
    fn commit_tx_caches(&self) {}

    /// Discards this executor's buffered second-level cache writes, if any
    /// (`spec.md` §4.6: "rollback discards them").
    fn rollback_tx_caches(&self) {}
}

impl<Conn: RawConnection> Executor<Conn> for Box<dyn Executor<Conn>> {
    fn query<'a>(
        &'a self,
        conn: &'a Conn,
        statement: &'a MappedStatement,
        parameter: &'a Value,
        environment_id: &'a str,
        bounds: RowBounds,
    ) -> AsyncResult<'a, Result<Value, ExecutorError>> {
        (**self).query(conn, statement, parameter, environment_id, bounds)
    }

    fn update<'a>(
        &'a self,
        conn: &'a Conn,
        statement: &'a MappedStatement,
        parameter: &'a mut Value,
    ) -> AsyncResult<'a, Result<u64, ExecutorError>> {
        (**self).update(conn, statement, parameter)
    }

    fn flush_statements<'a>(&'a self, conn: &'a Conn) -> AsyncResult<'a, Result<(), ExecutorError>> {
        (**self).flush_statements(conn)
    }

    fn clear_local_cache(&self) {
        (**self).clear_local_cache()
    }

    fn commit_tx_caches(&self) {
        (**self).commit_tx_caches()
    }

    fn rollback_tx_caches(&self) {
        (**self).rollback_tx_caches()
    }
}

/// Runs `statement.id` through this same executor/connection, for
/// [`key_gen::SelectKeyGenerator`] and nested sub-select result mappings.
pub struct ConfigPeerRunner<'a, Conn: RawConnection, E: Executor<Conn>> {
    pub config: &'a Configuration,
    pub conn: &'a Conn,
    pub executor: &'a E,
    pub environment_id: &'a str,
}

impl<'a, Conn: RawConnection, E: Executor<Conn>> PeerStatementRunner for ConfigPeerRunner<'a, Conn, E> {
    fn run_select<'b>(
        &'b self,
        id: &'b str,
        parameter: &'b Value,
    ) -> futures_util::future::BoxFuture<'b, Result<Option<Value>, ExecutorError>> {
        Box::pin(async move {
            let statement = self
                .config
                .statement(id)
                .ok_or_else(|| ExecutorError::NoBoundSql(id.to_owned()))?;
            let result = self
                .executor
                .query(self.conn, &statement, parameter, self.environment_id, RowBounds::NONE)
                .await?;
            let Value::Array(mut rows) = result else { return Ok(None) };
            Ok(if rows.is_empty() { None } else { Some(rows.remove(0)) })
        })
    }
}

/// Shared state/behaviour every executor variant needs: the session-local
/// cache, the nested-query depth counter (cleared only when it drops back
/// to zero, so a deeply nested call tree still shares one local cache
/// generation), and the raw query/update mechanics common to Simple and
/// Reuse execution.
pub struct BaseExecutor {
    pub local_cache: LocalCache,
    query_stack: AtomicUsize,
}

impl BaseExecutor {
    pub fn new() -> Self {
        Self { local_cache: LocalCache::new(), query_stack: AtomicUsize::new(0) }
    }

    async fn run_query<Conn: RawConnection>(
        &self,
        conn: &Conn,
        config: &Configuration,
        statement: &MappedStatement,
        parameter: &Value,
        environment_id: &str,
        bounds: RowBounds,
        local_cache_scope_statement: bool,
    ) -> Result<Value, ExecutorError> {
        let bound_sql = statement
            .sql_source
            .get_bound_sql(parameter, config.settings.map_underscore_to_camel_case)
            .map_err(|e| ExecutorError::NoBoundSql(format!("{}: {e}", statement.id)))?;
        let binds = bind_parameters(config, &bound_sql)?;
        let sql = <Conn::Backend as Backend>::rewrite_placeholders(&bound_sql.sql);
        let params: Vec<Value> = binds.iter().map(|b| b.value.clone()).collect();
        let cache_key = CacheKey::for_statement(
            &statement.id,
            Some(bounds.offset as u64),
            bounds.limit.map(|l| l as u64),
            &bound_sql.sql,
            &params,
            environment_id,
        );

        // `spec.md` §4.6 query path step 3: "If query-stack is 0 and
        // `ms.flushCacheRequired`, clear session local cache" — only at the
        // outermost call, so a `flushCache`-marked SELECT reached via a
        // nested sub-query doesn't wipe results the caller above it is
        // still relying on.
        if self.query_stack.load(Ordering::SeqCst) == 0 && statement.flush_cache_required {
            self.local_cache.clear();
        }

        self.query_stack.fetch_add(1, Ordering::SeqCst);
        let result = async {
            if let Some(cached) = self.local_cache.begin(&cache_key) {
                return Ok(cached);
            }

            let span = tracing::info_span!("executor.query", statement_id = %statement.id);
            let _enter = span.enter();

            let stream = conn
                .query(&sql, &binds)
                .await
                .map_err(|source| ExecutorError::Driver { statement_id: statement.id.clone(), source })?;
            tokio::pin!(stream);
            let mut rows = Vec::new();
            while let Some(row) = stream.next().await {
                let row = row.map_err(|source| ExecutorError::Driver { statement_id: statement.id.clone(), source })?;
                rows.push(row_to_value(&row));
            }
            tracing::debug!(statement_id = %statement.id, n_rows = rows.len(), "query returned rows");
            let rows = bounds.apply(rows);
            let value = Value::Array(rows);
            self.local_cache.finish(cache_key, value.clone());
            Ok(value)
        }
        .await;

        if self.query_stack.fetch_sub(1, Ordering::SeqCst) == 1 && local_cache_scope_statement {
            self.local_cache.clear();
        }

        result
    }

    async fn run_update<Conn: RawConnection>(
        &self,
        conn: &Conn,
        config: &Configuration,
        statement: &MappedStatement,
        parameter: &mut Value,
        environment_id: &str,
        runner: &dyn PeerStatementRunner,
    ) -> Result<u64, ExecutorError> {
        self.local_cache.clear();

        statement.key_generator.process_before(runner, parameter).await?;

        let bound_sql = statement
            .sql_source
            .get_bound_sql(parameter, config.settings.map_underscore_to_camel_case)
            .map_err(|e| ExecutorError::NoBoundSql(format!("{}: {e}", statement.id)))?;
        let binds = bind_parameters(config, &bound_sql)?;
        let sql = <Conn::Backend as Backend>::rewrite_placeholders(&bound_sql.sql);

        let span = tracing::info_span!("executor.update", statement_id = %statement.id);
        let _enter = span.enter();

        let (affected, key_rows) = if !statement.key_properties.is_empty() {
            let (affected, rows) = conn
                .execute_returning_keys(&sql, &binds, &statement.key_columns)
                .await
                .map_err(|source| ExecutorError::Driver { statement_id: statement.id.clone(), source })?;
            let key_rows: Vec<GeneratedKeyRow> = rows.iter().map(generated_key_row).collect();
            (affected, key_rows)
        } else {
            let affected = conn
                .execute(&sql, &binds)
                .await
                .map_err(|source| ExecutorError::Driver { statement_id: statement.id.clone(), source })?;
            (affected, Vec::new())
        };

        let _ = environment_id;
        statement.key_generator.process_after(runner, parameter, &key_rows).await?;
        Ok(affected)
    }
}

impl Default for BaseExecutor {
    fn default() -> Self {
        Self::new()
    }
}

/// Executes every statement directly against the connection with no
/// prepared-statement reuse (`spec.md` §4.6's `SIMPLE` variant).
pub struct SimpleExecutor {
    base: BaseExecutor,
    config: std::sync::Arc<Configuration>,
    local_cache_scope_statement: bool,
}

impl SimpleExecutor {
    pub fn new(config: std::sync::Arc<Configuration>) -> Self {
        let local_cache_scope_statement =
            matches!(config.settings.local_cache_scope, crate::config::LocalCacheScope::Statement);
        Self { base: BaseExecutor::new(), config, local_cache_scope_statement }
    }
}

impl<Conn: RawConnection> Executor<Conn> for SimpleExecutor {
    fn query<'a>(
        &'a self,
        conn: &'a Conn,
        statement: &'a MappedStatement,
        parameter: &'a Value,
        environment_id: &'a str,
        bounds: RowBounds,
    ) -> AsyncResult<'a, Result<Value, ExecutorError>> {
        Box::pin(self.base.run_query(
            conn,
            &self.config,
            statement,
            parameter,
            environment_id,
            bounds,
            self.local_cache_scope_statement,
        ))
    }

    fn update<'a>(
        &'a self,
        conn: &'a Conn,
        statement: &'a MappedStatement,
        parameter: &'a mut Value,
    ) -> AsyncResult<'a, Result<u64, ExecutorError>> {
        Box::pin(async move {
            let runner = ConfigPeerRunner { config: &self.config, conn, executor: self, environment_id: "" };
            self.base.run_update(conn, &self.config, statement, parameter, "", &runner).await
        })
    }

    fn flush_statements<'a>(&'a self, _conn: &'a Conn) -> AsyncResult<'a, Result<(), ExecutorError>> {
        Box::pin(async { Ok(()) })
    }

    fn clear_local_cache(&self) {
        self.base.local_cache.clear();
    }
}

/// Tracks which statement texts have already been seen, mirroring
/// `spec.md` §4.6's `REUSE` variant's intent of reusing a prepared
/// statement handle for identical SQL across calls. `RawConnection` has no
/// explicit prepare/reuse primitive (a real driver, e.g. `tokio-postgres`,
/// already caches prepared statements internally), so this variant's only
/// observable difference from [`SimpleExecutor`] is the `seen` bookkeeping
/// it exposes for diagnostics/tests.
pub struct ReuseExecutor {
    base: BaseExecutor,
    config: std::sync::Arc<Configuration>,
    seen: DashMap<String, ()>,
    local_cache_scope_statement: bool,
}

impl ReuseExecutor {
    pub fn new(config: std::sync::Arc<Configuration>) -> Self {
        let local_cache_scope_statement =
            matches!(config.settings.local_cache_scope, crate::config::LocalCacheScope::Statement);
        Self { base: BaseExecutor::new(), config, seen: DashMap::new(), local_cache_scope_statement }
    }

    pub fn reused_statement_count(&self) -> usize {
        self.seen.len()
    }
}

impl<Conn: RawConnection> Executor<Conn> for ReuseExecutor {
    fn query<'a>(
        &'a self,
        conn: &'a Conn,
        statement: &'a MappedStatement,
        parameter: &'a Value,
        environment_id: &'a str,
        bounds: RowBounds,
    ) -> AsyncResult<'a, Result<Value, ExecutorError>> {
        self.seen.entry(statement.id.clone()).or_insert(());
        Box::pin(self.base.run_query(
            conn,
            &self.config,
            statement,
            parameter,
            environment_id,
            bounds,
            self.local_cache_scope_statement,
        ))
    }

    fn update<'a>(
        &'a self,
        conn: &'a Conn,
        statement: &'a MappedStatement,
        parameter: &'a mut Value,
    ) -> AsyncResult<'a, Result<u64, ExecutorError>> {
        self.seen.entry(statement.id.clone()).or_insert(());
        Box::pin(async move {
            let runner = ConfigPeerRunner { config: &self.config, conn, executor: self, environment_id: "" };
            self.base.run_update(conn, &self.config, statement, parameter, "", &runner).await
        })
    }

    fn flush_statements<'a>(&'a self, _conn: &'a Conn) -> AsyncResult<'a, Result<(), ExecutorError>> {
        Box::pin(async { Ok(()) })
    }

    fn clear_local_cache(&self) {
        self.base.local_cache.clear();
    }
}

/// One queued write: the owning statement plus the binds for one call
/// (`spec.md` §4.6's `BATCH` variant).
struct QueuedUpdate {
    statement_id: String,
    sql: String,
    binds: Vec<DriverBind>,
}

/// Buffers same-shaped `INSERT`/`UPDATE`/`DELETE` calls until
/// [`Executor::flush_statements`] (or commit/rollback) runs them as one
/// group (`spec.md` §4.6: "Batch ... buffers INSERT/UPDATE/DELETE calls of
/// the same statement+SQL, executing them together on flush"). Returns no
/// generated keys until flush, since nothing has actually run yet.
pub struct BatchExecutor {
    base: BaseExecutor,
    config: std::sync::Arc<Configuration>,
    queue: parking_lot::Mutex<Vec<QueuedUpdate>>,
}

impl BatchExecutor {
    pub fn new(config: std::sync::Arc<Configuration>) -> Self {
        Self { base: BaseExecutor::new(), config, queue: parking_lot::Mutex::new(Vec::new()) }
    }
}

impl<Conn: RawConnection> Executor<Conn> for BatchExecutor {
    fn query<'a>(
        &'a self,
        conn: &'a Conn,
        statement: &'a MappedStatement,
        parameter: &'a Value,
        environment_id: &'a str,
        bounds: RowBounds,
    ) -> AsyncResult<'a, Result<Value, ExecutorError>> {
        Box::pin(self.base.run_query(conn, &self.config, statement, parameter, environment_id, bounds, false))
    }

    fn update<'a>(
        &'a self,
        conn: &'a Conn,
        statement: &'a MappedStatement,
        parameter: &'a mut Value,
    ) -> AsyncResult<'a, Result<u64, ExecutorError>> {
        Box::pin(async move {
            self.base.local_cache.clear();
            // Only the BEFORE half applies here: a SelectKeyGenerator's peer
            // query must run before the statement's own SQL is queued.
            // AFTER-style generators (Jdbc3, afterSelectKey) need the actual
            // affected rows, which don't exist until `flush_statements` runs
            // the queue, so they're a no-op for batched statements.
            let runner = ConfigPeerRunner { config: &self.config, conn, executor: self, environment_id: "" };
            statement.key_generator.process_before(&runner, parameter).await?;

            let bound_sql = statement
                .sql_source
                .get_bound_sql(parameter, self.config.settings.map_underscore_to_camel_case)
                .map_err(|e| ExecutorError::NoBoundSql(format!("{}: {e}", statement.id)))?;
            let binds = bind_parameters(&self.config, &bound_sql)?;
            let sql = <Conn::Backend as Backend>::rewrite_placeholders(&bound_sql.sql);
            self.queue.lock().push(QueuedUpdate { statement_id: statement.id.clone(), sql, binds });
            tracing::debug!(statement_id = %statement.id, "queued batched update");
            // Affected-row count is unknown until flush; MyBatis itself
            // returns `Integer.MIN_VALUE` as a sentinel here for the same
            // reason. `u64::MAX` plays that role in this runtime.
            Ok(u64::MAX)
        })
    }

    fn flush_statements<'a>(&'a self, conn: &'a Conn) -> AsyncResult<'a, Result<(), ExecutorError>> {
        Box::pin(async move {
            let queued = std::mem::take(&mut *self.queue.lock());
            for item in queued {
                conn.execute(&item.sql, &item.binds)
                    .await
                    .map_err(|source| ExecutorError::Driver { statement_id: item.statement_id, source })?;
            }
            Ok(())
        })
    }

    fn clear_local_cache(&self) {
        self.base.local_cache.clear();
    }
}

/// Wraps an inner [`Executor`] with second-level cache consultation
/// (`spec.md` §4.6's "cache-consulting wrapper"): a `SELECT` whose
/// statement declares `useCache` is served from the namespace's
/// [`TransactionalCache`] overlay when present, falling through to the
/// inner executor (and populating the overlay) on a miss; any statement
/// with `flushCacheRequired` clears its namespace's overlay first.
pub struct CachingExecutor<Conn, E> {
    inner: E,
    config: std::sync::Arc<Configuration>,
    tx_caches: DashMap<String, TransactionalCache>,
    _conn: std::marker::PhantomData<fn() -> Conn>,
}

impl<Conn: RawConnection, E: Executor<Conn>> CachingExecutor<Conn, E> {
    pub fn new(config: std::sync::Arc<Configuration>, inner: E) -> Self {
        Self { inner, config, tx_caches: DashMap::new(), _conn: std::marker::PhantomData }
    }

    fn tx_cache_for(&self, namespace: &str) -> Option<()> {
        if self.tx_caches.contains_key(namespace) {
            return Some(());
        }
        let statement_cache = self.config.cache(namespace)?;
        self.tx_caches.insert(namespace.to_owned(), TransactionalCache::new(statement_cache, false));
        Some(())
    }

    pub fn commit_caches(&self) {
        for entry in self.tx_caches.iter() {
            entry.value().commit();
        }
    }

    pub fn rollback_caches(&self) {
        for entry in self.tx_caches.iter() {
            entry.value().rollback();
        }
    }
}

impl<Conn: RawConnection, E: Executor<Conn>> Executor<Conn> for CachingExecutor<Conn, E> {
    fn query<'a>(
        &'a self,
        conn: &'a Conn,
        statement: &'a MappedStatement,
        parameter: &'a Value,
        environment_id: &'a str,
        bounds: RowBounds,
    ) -> AsyncResult<'a, Result<Value, ExecutorError>> {
        Box::pin(async move {
            let namespace = statement.cache.as_ref().map(|c| c.namespace.clone());
            let use_cache = self.config.settings.cache_enabled && statement.use_cache && namespace.is_some();

            if !use_cache {
                return self.inner.query(conn, statement, parameter, environment_id, bounds).await;
            }

            let namespace = namespace.unwrap();
            self.tx_cache_for(&namespace);
            let fold = self.config.settings.map_underscore_to_camel_case;
            let bound_sql = statement
                .sql_source
                .get_bound_sql(parameter, fold)
                .map_err(|e| ExecutorError::NoBoundSql(format!("{}: {e}", statement.id)))?;
            let params: Vec<Value> =
                bound_sql.parameter_mappings.iter().filter_map(|m| bound_sql.value_for(m, fold)).collect();
            let key = CacheKey::for_statement(
                &statement.id,
                Some(bounds.offset as u64),
                bounds.limit.map(|l| l as u64),
                &bound_sql.sql,
                &params,
                environment_id,
            );

            if let Some(tx_cache) = self.tx_caches.get(&namespace) {
                if let Some(cached) = tx_cache.get(&key) {
                    tracing::debug!(statement_id = %statement.id, "second-level cache hit");
                    return Ok(cached);
                }
            }

            let result = self.inner.query(conn, statement, parameter, environment_id, bounds).await?;
            if let Some(tx_cache) = self.tx_caches.get(&namespace) {
                tx_cache.put(key, result.clone());
            }
            Ok(result)
        })
    }

    fn update<'a>(
        &'a self,
        conn: &'a Conn,
        statement: &'a MappedStatement,
        parameter: &'a mut Value,
    ) -> AsyncResult<'a, Result<u64, ExecutorError>> {
        Box::pin(async move {
            if statement.flush_cache_required {
                if let Some(cache) = &statement.cache {
                    self.tx_cache_for(&cache.namespace);
                    if let Some(tx_cache) = self.tx_caches.get(&cache.namespace) {
                        tx_cache.clear();
                    }
                }
            }
            self.inner.update(conn, statement, parameter).await
        })
    }

    fn flush_statements<'a>(&'a self, conn: &'a Conn) -> AsyncResult<'a, Result<(), ExecutorError>> {
        self.inner.flush_statements(conn)
    }

    fn clear_local_cache(&self) {
        self.inner.clear_local_cache();
    }

    fn commit_tx_caches(&self) {
        self.commit_caches();
    }

    fn rollback_tx_caches(&self) {
        self.rollback_caches();
    }
}
