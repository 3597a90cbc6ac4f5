//! A single result-set row (`spec.md` §4.7's `ResultSetWrapper` reads
//! through this).

use futures_core::stream::BoxStream;

use crate::connection::{DriverError, RawConnection};
use crate::dbtype::DbType;
use crate::value::Value;

/// A stream of rows resulting from a query (mirrors
/// `asphalt_core::connection::row::RowStream`).
pub type RowStream<'c, Conn> = BoxStream<'c, Result<<Conn as RawConnection>::Row, DriverError>>;

/// A row of data returned from the database backend.
pub trait Row: Send {
    /// Number of columns in this row.
    fn n_columns(&self) -> usize;
    /// The name of column `idx`, as reported by the driver/result-set
    /// metadata.
    fn column_name(&self, idx: usize) -> &str;
    /// The database type of column `idx`, if the driver exposes it.
    fn column_db_type(&self, idx: usize) -> Option<DbType>;
    /// Reads column `idx` as a dynamically-typed [`Value`]. Backends decide
    /// how to decode their wire format into one of `Value`'s variants;
    /// further conversion into an application type is the
    /// [`crate::type_handler::TypeHandler`]'s job.
    fn get_value(&self, idx: usize) -> Value;

    /// Convenience: find a column by name and read it.
    fn get_by_name(&self, name: &str) -> Option<Value> {
        (0..self.n_columns())
            .find(|&i| self.column_name(i) == name)
            .map(|i| self.get_value(i))
    }

    /// Convenience: find a column's index by name.
    fn index_of(&self, name: &str) -> Option<usize> {
        (0..self.n_columns()).find(|&i| self.column_name(i) == name)
    }
}
