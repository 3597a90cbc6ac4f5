use std::sync::Arc;

use crate::cache::Cache;
use crate::executor::key_gen::KeyGenerator;
use crate::mapping::{ResultMap, SqlSource};

/// The SQL command kind a `MappedStatement` performs (`spec.md` §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    Select,
    Insert,
    Update,
    Delete,
    Flush,
    Unknown,
}

/// How the statement is prepared against the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementShape {
    Direct,
    Prepared,
    Callable,
}

/// The requested shape of the driver's result set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResultSetShape {
    #[default]
    Default,
    ForwardOnly,
    ScrollInsensitive,
    ScrollSensitive,
}

/// A compiled, addressable SQL operation (`spec.md` §3). Immutable once
/// built by the [`crate::compiler`]; shared via `Arc` from the
/// [`crate::catalogue::Configuration`].
#[derive(Clone)]
pub struct MappedStatement {
    pub id: String,
    pub command: CommandKind,
    pub sql_source: Arc<SqlSource>,
    pub result_maps: Vec<Arc<ResultMap>>,
    pub fetch_size: Option<u32>,
    pub timeout: Option<u32>,
    pub statement_shape: StatementShape,
    pub result_set_shape: ResultSetShape,
    pub flush_cache_required: bool,
    pub use_cache: bool,
    pub result_ordered: bool,
    pub key_generator: Arc<dyn KeyGenerator>,
    pub key_properties: Vec<String>,
    pub key_columns: Vec<String>,
    pub cache: Option<Arc<Cache>>,
    pub database_id: Option<String>,
    pub result_sets: Vec<String>,
}

impl MappedStatement {
    /// Default `flushCacheRequired`/`useCache` per `spec.md` §6: writes flush
    /// and don't cache, reads cache and don't flush, unless overridden.
    pub fn default_flush_cache_required(command: CommandKind) -> bool {
        !matches!(command, CommandKind::Select)
    }

    pub fn default_use_cache(command: CommandKind) -> bool {
        matches!(command, CommandKind::Select)
    }
}
