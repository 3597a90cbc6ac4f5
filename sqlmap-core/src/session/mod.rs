//! The SQL Session facade (`spec.md` §5: "a single-threaded unit of work
//! holding a transaction, a local cache, and a deferred-load queue").
//!
//! No teacher counterpart — `asphalt_core` hands callers a bare
//! `RawConnection` and lets the DSL builder drive it directly, with no
//! session object in between — so `SqlSession` is new surface grounded in
//! `spec.md` §5's session description, built the same way the rest of this
//! runtime's type-erased seams are: owns an `Arc<Configuration>` and a
//! `Box<dyn Executor<Conn>>` rather than borrowing either, so the session
//! itself can be handed out behind an `Arc` (the `binding` module's
//! `Dispatcher` needs exactly that) without becoming self-referential.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures_util::future::BoxFuture;

use crate::catalogue::Configuration;
use crate::connection::{RawConnection, TransactionConfig, TransactionManager};
use crate::error::{BindingError, Error, ExecutorError, ResultMapError};
use crate::executor::key_gen::PeerStatementRunner;
use crate::executor::{BatchExecutor, CachingExecutor, Executor, ReuseExecutor, RowBounds, SimpleExecutor};
use crate::mapping::MappedStatement;
use crate::reflect;
use crate::result::{self, NestedQueryRunner};
use crate::value::Value;

/// A single-threaded unit of work over one [`RawConnection`] (`spec.md`
/// §5). Not `Sync`-shareable in spirit (every method takes `&self` only
/// because the executor/local-cache internals are interior-mutable, not
/// because concurrent callers are supported) — callers are expected to
/// confine one session to one task/thread, exactly as `spec.md` §5
/// requires.
pub struct SqlSession<Conn: RawConnection> {
    config: Arc<Configuration>,
    conn: Conn,
    executor: Box<dyn Executor<Conn>>,
    closed: AtomicBool,
}

impl<Conn: RawConnection> SqlSession<Conn> {
    /// Builds a session over `conn`, selecting the executor variant named by
    /// `config.settings.default_executor_type` and wrapping it with the
    /// second-level cache-consulting layer (`spec.md` §4.6).
    pub fn new(config: Arc<Configuration>, conn: Conn) -> Self {
        use crate::config::ExecutorType;

        let inner: Box<dyn Executor<Conn>> = match config.settings.default_executor_type {
            ExecutorType::Simple => Box::new(SimpleExecutor::new(config.clone())),
            ExecutorType::Reuse => Box::new(ReuseExecutor::new(config.clone())),
            ExecutorType::Batch => Box::new(BatchExecutor::new(config.clone())),
        };
        let executor: Box<dyn Executor<Conn>> = Box::new(CachingExecutor::new(config.clone(), inner));

        Self { config, conn, executor, closed: AtomicBool::new(false) }
    }

    pub fn configuration(&self) -> &Arc<Configuration> {
        &self.config
    }

    pub fn connection(&self) -> &Conn {
        &self.conn
    }

    fn environment_id(&self) -> &str {
        self.config.environment.as_ref().map(|e| e.id.as_str()).unwrap_or_default()
    }

    fn ensure_open(&self) -> Result<(), ExecutorError> {
        if self.closed.load(Ordering::Acquire) {
            Err(ExecutorError::SessionClosed)
        } else {
            Ok(())
        }
    }

    fn resolve_statement(&self, id: &str) -> Result<Arc<MappedStatement>, Error> {
        self.config
            .statement(id)
            .ok_or_else(|| Error::Executor(ExecutorError::NoBoundSql(id.to_owned())))
    }

    /// Runs `statement_id` and maps every returned row through its declared
    /// result map (`spec.md` §4.7). A statement with no declared result map
    /// hands back the raw per-column objects the executor produced
    /// (`spec.md` §4.7 point 2c's fallback for an undeclared mapping type).
    pub async fn select_mapped(
        &self,
        statement_id: &str,
        parameter: &Value,
        bounds: RowBounds,
    ) -> Result<Vec<Value>, Error> {
        self.ensure_open()?;
        let statement = self.resolve_statement(statement_id)?;
        let rows = self
            .executor
            .query(&self.conn, &statement, parameter, self.environment_id(), bounds)
            .await?;

        let Some(result_map) = statement.result_maps.first() else {
            let Value::Array(rows) = rows else { return Ok(Vec::new()) };
            return Ok(rows);
        };

        let mapped = result::map_rows(&self.config, result_map, rows, &self.config.settings, self).await?;
        Ok(mapped)
    }

    /// `spec.md` §4.8's scalar return shape: the first mapped row, or
    /// `None` if the statement produced no rows.
    pub async fn select_one(&self, statement_id: &str, parameter: Value) -> Result<Option<Value>, Error> {
        let mut rows = self.select_mapped(statement_id, &parameter, RowBounds::NONE).await?;
        Ok(if rows.is_empty() { None } else { Some(rows.remove(0)) })
    }

    /// `spec.md` §4.8's list return shape.
    pub async fn select_list(
        &self,
        statement_id: &str,
        parameter: Value,
        bounds: RowBounds,
    ) -> Result<Vec<Value>, Error> {
        self.select_mapped(statement_id, &parameter, bounds).await
    }

    /// `spec.md` §4.8's map-keyed return shape: every mapped row folded into
    /// an object keyed by `key_property`.
    pub async fn select_map(&self, statement_id: &str, parameter: Value, key_property: &str) -> Result<Value, Error> {
        let rows = self.select_mapped(statement_id, &parameter, RowBounds::NONE).await?;
        let fold = self.config.settings.map_underscore_to_camel_case;
        let mut map = serde_json::Map::new();
        for row in rows {
            let key = reflect::get_path(&row, key_property, fold)
                .ok_or_else(|| BindingError::MissingMapKey { method: statement_id.to_owned() })?;
            map.insert(key.to_string(), reflect::to_json(row));
        }
        Ok(Value::Object(map))
    }

    /// Runs an `INSERT`/`UPDATE`/`DELETE` statement, writing any generated
    /// keys back onto `parameter` (`spec.md` §4.6's update path).
    pub async fn update(&self, statement_id: &str, parameter: &mut Value) -> Result<u64, Error> {
        self.ensure_open()?;
        let statement = self.resolve_statement(statement_id)?;
        Ok(self.executor.update(&self.conn, &statement, parameter).await?)
    }

    /// Alias of [`SqlSession::update`] for `<insert>`-declared statements;
    /// named separately because MyBatis's own `insert`/`update`/`delete`
    /// trio (`spec.md` §4.8) is one call path under the hood.
    pub async fn insert(&self, statement_id: &str, parameter: &mut Value) -> Result<u64, Error> {
        self.update(statement_id, parameter).await
    }

    pub async fn delete(&self, statement_id: &str, parameter: &mut Value) -> Result<u64, Error> {
        self.update(statement_id, parameter).await
    }

    /// Discharges any buffered batched statements (`spec.md` §4.6's `BATCH`
    /// variant).
    pub async fn flush_statements(&self) -> Result<(), Error> {
        self.ensure_open()?;
        Ok(self.executor.flush_statements(&self.conn).await?)
    }

    /// `spec.md` §4.6's commit path: clear the session-local cache, commit
    /// the connection's transaction, then publish second-level cache writes.
    pub async fn commit(&self) -> Result<(), Error> {
        self.ensure_open()?;
        self.flush_statements().await?;
        self.executor.clear_local_cache();
        self.conn.transaction_manager().commit_transaction(&self.conn).await?;
        self.executor.commit_tx_caches();
        Ok(())
    }

    /// `spec.md` §4.6's rollback path: discard the session-local cache, roll
    /// back the connection's transaction, then discard second-level cache
    /// writes.
    pub async fn rollback(&self) -> Result<(), Error> {
        self.ensure_open()?;
        self.executor.clear_local_cache();
        self.conn.transaction_manager().rollback_transaction(&self.conn).await?;
        self.executor.rollback_tx_caches();
        Ok(())
    }

    pub async fn begin(&self, config: TransactionConfig) -> Result<(), Error> {
        self.ensure_open()?;
        Ok(self.conn.transaction_manager().begin_transaction(config, &self.conn).await?)
    }

    /// Closes the session: best-effort rollback of any open transaction,
    /// then marks the session unusable. Idempotent.
    pub async fn close(&self) -> Result<(), Error> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        self.conn.transaction_manager().rollback_transaction(&self.conn).await?;
        Ok(())
    }

    /// Resolves one lazily-mapped property left pending by
    /// [`crate::result::lazy`] (`spec.md` §4.7 point 3: "on a getter, if the
    /// property is still pending, execute the nested query and populate
    /// it"), running its deferred sub-query and writing the result back onto
    /// `target`. A no-op if `property` carries no pending marker.
    pub async fn resolve_lazy(&self, target: &mut Value, property: &str) -> Result<(), Error> {
        let Some(marker) = crate::result::lazy::take(target, property) else { return Ok(()) };
        let value = self.run(&marker.statement_id, marker.parameter, marker.many).await.map_err(Error::ResultMap)?;
        reflect::set_path(target, property, value)
            .map_err(|e| Error::ResultMap(ResultMapError::CannotInstantiate(e.to_string())))?;
        Ok(())
    }
}

/// Runs a nested `<association>`/`<collection select="...">` sub-query
/// (`spec.md` §4.7 point 4) through this same session, so nested lookups
/// respect the session-local cache exactly like a top-level `select`.
impl<Conn: RawConnection> NestedQueryRunner for SqlSession<Conn> {
    fn run<'a>(
        &'a self,
        statement_id: &'a str,
        parameter: Value,
        many: bool,
    ) -> BoxFuture<'a, Result<Value, ResultMapError>> {
        Box::pin(async move {
            let mut rows = self
                .select_mapped(statement_id, &parameter, RowBounds::NONE)
                .await
                .map_err(|e| ResultMapError::CannotInstantiate(format!("{statement_id}: {e}")))?;
            Ok(if many { Value::Array(rows) } else if rows.is_empty() { Value::Null } else { rows.remove(0) })
        })
    }
}

/// Runs `statement.id` through this same session/connection, for
/// [`crate::executor::key_gen::SelectKeyGenerator`] peer statements invoked
/// from outside the executor's own update path (e.g. a caller driving
/// key generation directly rather than through [`SqlSession::update`]).
impl<Conn: RawConnection> PeerStatementRunner for SqlSession<Conn> {
    fn run_select<'a>(
        &'a self,
        id: &'a str,
        parameter: &'a Value,
    ) -> BoxFuture<'a, Result<Option<Value>, ExecutorError>> {
        Box::pin(async move {
            let statement = self.resolve_statement(id).map_err(|_| ExecutorError::NoBoundSql(id.to_owned()))?;
            let result = self
                .executor
                .query(&self.conn, &statement, parameter, self.environment_id(), RowBounds::NONE)
                .await?;
            let Value::Array(mut rows) = result else { return Ok(None) };
            Ok(if rows.is_empty() { None } else { Some(rows.remove(0)) })
        })
    }
}
