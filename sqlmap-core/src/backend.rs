//! The `Backend` trait — the seam between this runtime and a concrete
//! database driver.
//!
//! Grounded in `asphalt_core::backend`, but shrunk: the teacher needs a
//! `Backend` with associated `Query`/`QueryWriter`/`BindCollector` types
//! because its DSL builds a query incrementally at the type level. This
//! runtime already has a finished SQL string with `?` placeholders and an
//! ordered [`crate::value::Value`] list by the time it reaches a
//! connection (that's what [`crate::mapping::BoundSql`] *is*), so all a
//! `Backend` needs to contribute is how to address the driver: its native
//! placeholder syntax, identifier quoting, and the `RawConnection`
//! implementation itself.

use futures_util::future::BoxFuture;

use crate::connection::RawConnection;

/// A database backend (e.g. `Pg` for PostgreSQL).
pub trait Backend: Sized + Send + Sync + 'static {
    /// The backend's raw connection implementation.
    type RawConnection: RawConnection<Backend = Self>;

    /// Rewrites a SQL string using `?` positional placeholders (the
    /// canonical form every [`crate::mapping::BoundSql`] is rendered in)
    /// into the backend's native placeholder syntax.
    ///
    /// The default implementation is the identity function, which is
    /// correct for backends (MySQL, SQLite) whose placeholder *is* `?`.
    fn rewrite_placeholders(sql: &str) -> String {
        sql.to_owned()
    }

    /// Quotes `identifier` per this backend's quoting rules.
    fn quote_identifier(identifier: &str) -> String;
}

/// A boxed future bound to the lifetime of a borrow, used throughout the
/// connection/executor traits (mirrors `asphalt_core::LocalBoxFuture`, but
/// `Send` since sessions may be moved across an async runtime's worker
/// threads between `.await` points).
pub type AsyncResult<'a, T> = BoxFuture<'a, T>;
