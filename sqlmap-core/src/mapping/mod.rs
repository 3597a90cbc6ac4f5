//! The compiled data model (`spec.md` §3): `MappedStatement`, `SqlSource`,
//! `BoundSql`, `ParameterMapping`, `ResultMap`, `ResultMapping`,
//! `Discriminator`.
//!
//! None of this has a direct teacher counterpart — `asphalt_core` never
//! needed an addressable, runtime-built statement catalogue since its
//! queries are values constructed by the DSL at the call site — so these
//! types are grounded in `spec.md` §3's data model directly, shaped the way
//! the teacher shapes its own data structs (plain fields, `Clone`, builder
//! methods over raw struct literals rather than a derive-heavy builder
//! crate).

mod parameter;
mod result_map;
mod sql_source;
mod statement;

pub use parameter::{ParameterDirection, ParameterMapping};
pub use result_map::{Discriminator, ResultMap, ResultMapBuilder, ResultMapping, ResultMappingFlags};
pub use sql_source::{BoundSql, SqlSource};
pub use statement::{CommandKind, MappedStatement, ResultSetShape, StatementShape};
