//! The error taxonomy of the runtime.
//!
//! Each compilation/execution concern gets its own error type so callers can
//! match on the failure category (mirrors `asphalt_core::error`'s
//! `Error`/`ErrorKind` split, but expressed with `thiserror` and widened to
//! the seven categories this runtime needs instead of one database-error
//! kind).

/// Malformed document, unknown setting, duplicated statement id, or a
/// reference left unresolved after the end-of-compilation retry sweep.
#[derive(Debug, thiserror::Error)]
pub enum ConfigurationError {
    #[error("duplicate mapped statement id `{0}`")]
    DuplicateStatement(String),
    #[error("duplicate result map id `{0}`")]
    DuplicateResultMap(String),
    #[error("duplicate cache namespace `{0}`")]
    DuplicateCache(String),
    #[error("unknown setting `{0}`")]
    UnknownSetting(String),
    #[error("malformed mapper document `{namespace}`: {reason}")]
    MalformedDocument { namespace: String, reason: String },
    #[error("unresolved reference `{reference}` in namespace `{namespace}`")]
    UnresolvedReference { namespace: String, reference: String },
    #[error("{0}")]
    Other(String),
}

/// Raised transiently during compilation when a builder depends on a
/// not-yet-compiled sibling (an `extends` parent, a `cache-ref` target, a
/// nested result map). The catalogue parks the builder and retries it at the
/// end of the compilation phase; only if it still fails there does it get
/// promoted to a [`ConfigurationError`].
#[derive(Debug, thiserror::Error)]
#[error("incomplete element `{id}`: waiting on `{awaiting}`")]
pub struct IncompleteElement {
    pub id: String,
    pub awaiting: String,
}

/// A mapper method could not be routed to a statement, or its return type is
/// incompatible with the resolved statement's result shape.
#[derive(Debug, thiserror::Error)]
pub enum BindingError {
    #[error("no mapper registered for `{0}`")]
    MapperNotRegistered(String),
    #[error("method `{method}` is not bound to any statement")]
    MethodNotBound { method: String },
    #[error("return type incompatible with result shape for `{method}`: {reason}")]
    IncompatibleReturnType { method: String, reason: String },
    #[error("method `{method}` requires a `key_property` annotation for map-keyed results")]
    MissingMapKey { method: String },
}

/// No [`TypeHandler`](crate::type_handler::TypeHandler) could materialize or
/// store a value for the demanded language-type/database-type pair, or the
/// handler failed while driving the underlying connection.
#[derive(Debug, thiserror::Error)]
pub enum TypeError {
    #[error("no type handler registered for {lang:?} <-> {db:?}")]
    NoHandler { lang: String, db: String },
    #[error("failed to convert value while setting parameter {index}: {reason}")]
    SetParameter { index: usize, reason: String },
    #[error("failed to convert value while reading column `{column}`: {reason}")]
    GetResult { column: String, reason: String },
}

/// Session closed, cache key collision, illegal nested execution state, or
/// an underlying driver failure wrapped with statement context.
#[derive(Debug, thiserror::Error)]
pub enum ExecutorError {
    #[error("session is closed")]
    SessionClosed,
    #[error("statement `{0}` produced no BoundSql")]
    NoBoundSql(String),
    #[error("nested query stack underflow")]
    QueryStackUnderflow,
    #[error("driver error while executing `{statement_id}`: {source}")]
    Driver {
        statement_id: String,
        #[source]
        source: crate::connection::DriverError,
    },
    #[error("cache is timed out waiting for key `{0}`")]
    CacheTimeout(String),
    #[error("transaction control failed: {0}")]
    Transaction(#[source] crate::connection::DriverError),
    #[error("connection is in a broken state after a failed rollback")]
    ConnectionBroken,
    #[error("failed to write generated key back to property `{property}`: {reason}")]
    KeyWriteback { property: String, reason: String },
}

/// A dynamic-SQL expression (`<if test="...">`, `${...}`) was malformed.
#[derive(Debug, thiserror::Error)]
#[error("malformed expression `{expr}`: {reason}")]
pub struct ScriptingError {
    pub expr: String,
    pub reason: String,
}

/// The result mapper could not instantiate the mapping type, or a column had
/// no matching writable property under the configured unknown-column policy.
#[derive(Debug, thiserror::Error)]
pub enum ResultMapError {
    #[error("cannot instantiate result type for result map `{0}`")]
    CannotInstantiate(String),
    #[error("no constructor of `{result_map}` matches {n_columns} auto-mapped columns")]
    NoMatchingConstructor { result_map: String, n_columns: usize },
    #[error("unmapped column `{column}` (result map `{result_map}`)")]
    UnmappedColumn { column: String, result_map: String },
    #[error("ambiguous discriminator case `{case}` for column `{column}`")]
    AmbiguousDiscriminator { case: String, column: String },
}

/// Unifying error type for callers who don't need to match on category.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error(transparent)]
    Incomplete(#[from] IncompleteElement),
    #[error(transparent)]
    Binding(#[from] BindingError),
    #[error(transparent)]
    Type(#[from] TypeError),
    #[error(transparent)]
    Executor(#[from] ExecutorError),
    #[error(transparent)]
    Scripting(#[from] ScriptingError),
    #[error(transparent)]
    ResultMap(#[from] ResultMapError),
}

/// Result alias used pervasively across the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;
