//! Low-level connection contract (`spec.md` §2's "external collaborator":
//! the database driver).
//!
//! Directly grounded in `asphalt_core::connection`'s `RawConnection`: same
//! shape (establish/transaction_manager/simple_execute/execute/query), with
//! `execute`/`query` taking a rendered SQL string plus an ordered bind list
//! instead of the teacher's `Query<Db>` (which carried a type-level
//! `BindCollector`) — see `backend.rs`'s doc comment for why.

mod row;
mod transaction;

#[doc(inline)]
pub use self::row::{Row, RowStream};
#[doc(inline)]
pub use self::transaction::{
    IsolationLevel, NoopTransactionManager, Transaction, TransactionConfig, TransactionManager,
};

use crate::backend::{AsyncResult, Backend};
use crate::dbtype::DbType;
use crate::value::Value;

/// Opaque error type surfaced by a driver. Backend crates box their own
/// error type into this (mirrors `asphalt_core::error::AnyError`).
pub type DriverError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// One bound parameter ready to send to the driver: its value plus an
/// optional explicit database type (from `#{prop,jdbcType=...}` or a
/// resolved [`crate::type_handler::TypeHandler`]).
#[derive(Debug, Clone)]
pub struct DriverBind {
    pub value: Value,
    pub db_type: Option<DbType>,
}

/// A low-level connection to a backend.
pub trait RawConnection: Sized + Send + Sync {
    /// The backend of this connection.
    type Backend: Backend<RawConnection = Self>;
    /// The transaction manager of this connection.
    type TransactionManager: TransactionManager<Self>;
    /// The type of row returned by the connection.
    type Row: Row;
    /// The configuration necessary to establish a connection.
    type Config: ?Sized;

    /// Establishes a new connection.
    fn establish(config: &Self::Config) -> AsyncResult<'_, Result<Self, DriverError>>;

    /// Returns the transaction manager of this connection.
    fn transaction_manager(&self) -> &Self::TransactionManager;

    /// Executes a simple (unparameterized, possibly multi-statement) SQL
    /// string. Used for `BEGIN`/`COMMIT`/`ROLLBACK`/savepoints.
    fn simple_execute(&self, sql: &str) -> AsyncResult<'_, Result<(), DriverError>>;

    /// Executes `sql` (already rewritten to the backend's placeholder
    /// syntax) with `binds`, returning the number of affected rows.
    fn execute<'c>(&'c self, sql: &'c str, binds: &'c [DriverBind]) -> AsyncResult<'c, Result<u64, DriverError>>;

    /// Executes `sql` with `binds`, returning the result set.
    fn query<'c>(
        &'c self,
        sql: &'c str,
        binds: &'c [DriverBind],
    ) -> AsyncResult<'c, Result<RowStream<'c, Self>, DriverError>>;

    /// Executes an `INSERT`/`UPDATE` statement and returns both the
    /// affected-row count and any auto-generated key columns the driver
    /// reports, for [`crate::executor::key_gen::Jdbc3KeyGenerator`].
    fn execute_returning_keys<'c>(
        &'c self,
        sql: &'c str,
        binds: &'c [DriverBind],
        key_columns: &'c [String],
    ) -> AsyncResult<'c, Result<(u64, Vec<Self::Row>), DriverError>>;
}
