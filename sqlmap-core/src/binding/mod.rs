//! The Binding Runtime (`spec.md` §4.8): the idiomatic-Rust analogue to a
//! generated mapper-interface proxy.
//!
//! No teacher counterpart — `asphalt_core` has no runtime method-dispatch
//! layer at all, since every query is a value built and awaited directly at
//! the call site. `spec.md` §9 names the option for host languages without
//! dynamic proxy generation: "an explicit interface-based façade" that
//! dispatches by string id rather than a generated interface
//! implementation. [`Mapper`] is that façade: it resolves a method name to
//! a [`MapperMethod`] descriptor (caching it after first resolution, as
//! `spec.md` §4.8 point 3 describes), dispatches to a [`Dispatcher`]
//! (implemented by [`crate::session::SqlSession`]), and adapts the result
//! per the descriptor's declared [`ReturnShape`] (`spec.md` §4.8 point 5).

use std::sync::Arc;

use dashmap::DashMap;
use futures_util::future::BoxFuture;

use crate::catalogue::{qualify, Configuration};
use crate::error::{BindingError, Error};
use crate::executor::RowBounds;
use crate::mapping::CommandKind;
use crate::reflect;
use crate::value::Value;

/// The return-type shape a mapper method declares (`spec.md` §4.8 point 3:
/// "return-type shape `{void, scalar, list/array/collection, map-keyed,
/// cursor, optional}`"). Cursor-shaped results aren't modelled: this
/// runtime's `Executor::query` already materializes the full row list
/// rather than exposing a driver-backed cursor, so a cursor-shaped mapper
/// method degrades to `List`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnShape {
    Void,
    Scalar,
    Optional,
    List,
    MapKeyed,
}

/// A resolved mapper-method descriptor (`spec.md` §4.8 point 3).
#[derive(Debug, Clone)]
pub struct MapperMethod {
    pub statement_id: String,
    pub command: CommandKind,
    pub return_shape: ReturnShape,
    pub map_key_property: Option<String>,
}

impl MapperMethod {
    /// `spec.md` §4.8 point 3's default when a method carries no explicit
    /// return-shape annotation: a `SELECT` yields a list, a flush yields
    /// void, and every write yields the row-count scalar.
    fn default_return_shape(command: CommandKind) -> ReturnShape {
        match command {
            CommandKind::Select => ReturnShape::List,
            CommandKind::Flush => ReturnShape::Void,
            CommandKind::Insert | CommandKind::Update | CommandKind::Delete | CommandKind::Unknown => {
                ReturnShape::Scalar
            }
        }
    }
}

/// The executor-facing seam [`crate::session::SqlSession`] implements, so
/// this module stays free of the connection type parameter (`spec.md` §4.8
/// point 5: "dispatch to the executor's update/query/flush methods").
pub trait Dispatcher: Send + Sync {
    fn select_list<'a>(
        &'a self,
        statement_id: &'a str,
        parameter: Value,
        bounds: RowBounds,
    ) -> BoxFuture<'a, Result<Vec<Value>, Error>>;

    fn run_update<'a>(&'a self, statement_id: &'a str, parameter: Value) -> BoxFuture<'a, Result<u64, Error>>;

    fn flush<'a>(&'a self) -> BoxFuture<'a, Result<(), Error>>;
}

/// One user-declared mapper namespace: a thin, string-addressed stand-in
/// for a generated proxy (`spec.md` §4.8, §9's proxy-generation note).
/// Built once per namespace and reused across calls so resolved
/// [`MapperMethod`] descriptors stay cached.
pub struct Mapper {
    namespace: String,
    config: Arc<Configuration>,
    dispatcher: Arc<dyn Dispatcher>,
    methods: DashMap<String, Arc<MapperMethod>>,
}

impl Mapper {
    pub fn new(namespace: impl Into<String>, config: Arc<Configuration>, dispatcher: Arc<dyn Dispatcher>) -> Self {
        Self { namespace: namespace.into(), config, dispatcher, methods: DashMap::new() }
    }

    /// Declares `method`'s return shape up front, overriding what
    /// [`Mapper::call`] would otherwise infer from the resolved statement's
    /// command kind. Optional: `spec.md` §4.8 point 3 only requires the
    /// descriptor exist by first call, not that it be pre-registered.
    pub fn declare(
        &self,
        method: impl Into<String>,
        return_shape: ReturnShape,
        map_key_property: Option<String>,
    ) -> Result<(), Error> {
        let method = method.into();
        let statement_id = qualify(&self.namespace, &method);
        let statement = self
            .config
            .statement(&statement_id)
            .ok_or_else(|| BindingError::MethodNotBound { method: method.clone() })?;
        self.methods.insert(
            method,
            Arc::new(MapperMethod { statement_id, command: statement.command, return_shape, map_key_property }),
        );
        Ok(())
    }

    fn resolve(&self, method: &str) -> Result<Arc<MapperMethod>, Error> {
        if let Some(found) = self.methods.get(method) {
            return Ok(found.clone());
        }
        let statement_id = qualify(&self.namespace, method);
        let statement = self
            .config
            .statement(&statement_id)
            .ok_or_else(|| BindingError::MethodNotBound { method: method.to_owned() })?;
        let descriptor = Arc::new(MapperMethod {
            statement_id,
            command: statement.command,
            return_shape: MapperMethod::default_return_shape(statement.command),
            map_key_property: None,
        });
        self.methods.insert(method.to_owned(), descriptor.clone());
        Ok(descriptor)
    }

    /// Invokes `method` with `parameter`, adapting the resolved statement's
    /// result per its descriptor (`spec.md` §4.8 points 3/5). `parameter`
    /// is passed through as-is: point 4's argument-folding into a
    /// `param1..paramN`-keyed map is a Java-reflection concern over a
    /// method's positional arguments, which doesn't arise here since every
    /// caller already builds one [`Value`] parameter object (single value or
    /// `Value::Object` map) the same way [`crate::mapping::BoundSql`]
    /// expects.
    pub async fn call(&self, method: &str, parameter: Value) -> Result<Value, Error> {
        let descriptor = self.resolve(method)?;
        match descriptor.command {
            CommandKind::Select => {
                let rows = self.dispatcher.select_list(&descriptor.statement_id, parameter, RowBounds::NONE).await?;
                self.adapt_select(&descriptor, rows)
            }
            CommandKind::Flush => {
                self.dispatcher.flush().await?;
                Ok(Value::Null)
            }
            CommandKind::Insert | CommandKind::Update | CommandKind::Delete | CommandKind::Unknown => {
                let affected = self.dispatcher.run_update(&descriptor.statement_id, parameter).await?;
                Ok(match descriptor.return_shape {
                    ReturnShape::Void => Value::Null,
                    _ => Value::I64(affected as i64),
                })
            }
        }
    }

    fn adapt_select(&self, descriptor: &MapperMethod, mut rows: Vec<Value>) -> Result<Value, Error> {
        match descriptor.return_shape {
            ReturnShape::List => Ok(Value::Array(rows)),
            ReturnShape::Scalar => rows.into_iter().next().ok_or_else(|| {
                Error::Binding(BindingError::IncompatibleReturnType {
                    method: descriptor.statement_id.clone(),
                    reason: "scalar-return method produced no rows".into(),
                })
            }),
            ReturnShape::Optional => Ok(if rows.is_empty() { Value::Null } else { rows.remove(0) }),
            ReturnShape::Void => Ok(Value::Null),
            ReturnShape::MapKeyed => {
                let key_property = descriptor
                    .map_key_property
                    .as_deref()
                    .ok_or_else(|| BindingError::MissingMapKey { method: descriptor.statement_id.clone() })?;
                let fold = self.config.settings.map_underscore_to_camel_case;
                let mut map = serde_json::Map::new();
                for row in rows {
                    let key = reflect::get_path(&row, key_property, fold)
                        .ok_or_else(|| BindingError::MissingMapKey { method: descriptor.statement_id.clone() })?;
                    map.insert(key.to_string(), reflect::to_json(row));
                }
                Ok(Value::Object(map))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::dbtype::LangType;
    use crate::mapping::{MappedStatement, ResultSetShape, StatementShape};
    use crate::executor::key_gen::NoKeyGenerator;

    struct FakeDispatcher;

    impl Dispatcher for FakeDispatcher {
        fn select_list<'a>(
            &'a self,
            _statement_id: &'a str,
            _parameter: Value,
            _bounds: RowBounds,
        ) -> BoxFuture<'a, Result<Vec<Value>, Error>> {
            Box::pin(async { Ok(vec![Value::object([("id".into(), serde_json::json!(1))])]) })
        }

        fn run_update<'a>(&'a self, _statement_id: &'a str, _parameter: Value) -> BoxFuture<'a, Result<u64, Error>> {
            Box::pin(async { Ok(1) })
        }

        fn flush<'a>(&'a self) -> BoxFuture<'a, Result<(), Error>> {
            Box::pin(async { Ok(()) })
        }
    }

    fn config_with(id: &str, command: CommandKind) -> Arc<Configuration> {
        let config = Configuration::new(Settings::default());
        let sql_source = crate::mapping::SqlSource::Static { sql: "select 1".into(), parameter_mappings: Vec::new() };
        config
            .add_statement(MappedStatement {
                id: id.into(),
                command,
                sql_source: Arc::new(sql_source),
                result_maps: Vec::new(),
                fetch_size: None,
                timeout: None,
                statement_shape: StatementShape::Direct,
                result_set_shape: ResultSetShape::default(),
                flush_cache_required: MappedStatement::default_flush_cache_required(command),
                use_cache: MappedStatement::default_use_cache(command),
                result_ordered: false,
                key_generator: Arc::new(NoKeyGenerator),
                key_properties: Vec::new(),
                key_columns: Vec::new(),
                cache: None,
                database_id: None,
                result_sets: Vec::new(),
            })
            .unwrap();
        Arc::new(config)
    }

    #[tokio::test]
    async fn select_defaults_to_list_shape() {
        let config = config_with("ns.find", CommandKind::Select);
        let mapper = Mapper::new("ns", config, Arc::new(FakeDispatcher));
        let result = mapper.call("find", Value::Null).await.unwrap();
        assert!(matches!(result, Value::Array(ref v) if v.len() == 1));
    }

    #[tokio::test]
    async fn declared_scalar_unwraps_single_row() {
        let config = config_with("ns.findOne", CommandKind::Select);
        let mapper = Mapper::new("ns", config, Arc::new(FakeDispatcher));
        mapper.declare("findOne", ReturnShape::Scalar, None).unwrap();
        let result = mapper.call("findOne", Value::Null).await.unwrap();
        assert!(matches!(result, Value::Object(_)));
    }

    #[tokio::test]
    async fn insert_returns_affected_row_count() {
        let config = config_with("ns.add", CommandKind::Insert);
        let mapper = Mapper::new("ns", config, Arc::new(FakeDispatcher));
        let result = mapper.call("add", Value::Null).await.unwrap();
        assert_eq!(result, Value::I64(1));
    }

    #[tokio::test]
    async fn unbound_method_is_an_error() {
        let config = config_with("ns.add", CommandKind::Insert);
        let mapper = Mapper::new("ns", config, Arc::new(FakeDispatcher));
        assert!(mapper.call("missing", Value::Null).await.is_err());
    }
}
