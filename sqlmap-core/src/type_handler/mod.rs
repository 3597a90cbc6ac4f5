//! TypeHandler registry (`spec.md` §4.1).
//!
//! Grounded in `asphalt_core`'s `ToSql`/`FromSql` seam, but those traits are
//! generic over a compile-time `SqlTy`/`Db` pair resolved by the DSL's type
//! checker; this runtime resolves a statement's parameter/result shape from
//! an XML document at load time, so the handler seam has to be an
//! object-safe trait keyed by a runtime `(LangType, Option<DbType>)` pair
//! instead of a type parameter.

mod builtin;
mod registry;

pub use builtin::{IdentityTypeHandler, OrdinalEnumTypeHandler, UnknownTypeHandler};
pub use registry::TypeHandlerRegistry;

use crate::connection::DriverBind;
use crate::error::TypeError;
use crate::value::Value;

/// Bidirectional conversion between an in-memory [`Value`] and the
/// representation a driver binds/returns.
///
/// A handler is registered for one [`LangType`](crate::dbtype::LangType),
/// optionally narrowed to a single [`DbType`]; see [`TypeHandlerRegistry`]
/// for how a `(lang, db)` pair resolves to one of possibly several
/// registered handlers.
pub trait TypeHandler: Send + Sync {
    /// Converts an application value into a [`DriverBind`] ready to send to
    /// the connection for parameter `index` (used only to build the error
    /// message on failure).
    fn set_parameter(&self, index: usize, value: Value) -> Result<DriverBind, TypeError>;

    /// Converts a value read from a result-set column (already decoded into
    /// a [`Value`] by the backend's [`Row`](crate::connection::Row) impl)
    /// into the application-facing value. `column` is used only to build the
    /// error message on failure.
    fn get_result(&self, column: &str, value: Value) -> Result<Value, TypeError>;
}
