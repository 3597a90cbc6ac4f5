//! Database type tags (`spec.md` glossary: "database type").
//!
//! The teacher encodes SQL types as zero-sized marker structs
//! (`asphalt_core::types::impls`'s `define_sql_types!` macro) so the type
//! system picks the right [`HasSqlType`] impl at compile time. This runtime
//! addresses statements by string id and resolves types from parsed XML
//! attributes (`jdbcType="INTEGER"`), so the same vocabulary is kept but as
//! a plain `enum` looked up at runtime instead of a marker-type per SQL
//! type.

use std::fmt;

/// A database column type, as named in `#{prop,jdbcType=...}` tokens and in
/// `<result jdbcType="...">` attributes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DbType {
    BigInt,
    Binary,
    Bool,
    Date,
    Double,
    Float,
    Integer,
    Interval,
    Numeric,
    SmallInt,
    Text,
    Time,
    Timestamp,
    TimestampTz,
    TinyInt,
    Uuid,
    Json,
    Other(String),
}

impl DbType {
    pub fn parse(name: &str) -> Self {
        match name.to_ascii_uppercase().as_str() {
            "BIGINT" | "BIGSERIAL" => DbType::BigInt,
            "BINARY" | "BYTEA" | "BLOB" | "VARBINARY" => DbType::Binary,
            "BOOL" | "BOOLEAN" => DbType::Bool,
            "DATE" => DbType::Date,
            "DOUBLE" | "DOUBLE PRECISION" | "FLOAT8" => DbType::Double,
            "FLOAT" | "REAL" | "FLOAT4" => DbType::Float,
            "INTEGER" | "INT" | "SERIAL" | "INT4" => DbType::Integer,
            "INTERVAL" => DbType::Interval,
            "NUMERIC" | "DECIMAL" => DbType::Numeric,
            "SMALLINT" | "SMALLSERIAL" | "INT2" => DbType::SmallInt,
            "TEXT" | "VARCHAR" | "CHAR" => DbType::Text,
            "TIME" => DbType::Time,
            "TIMESTAMP" => DbType::Timestamp,
            "TIMESTAMPTZ" | "TIMESTAMP WITH TIME ZONE" => DbType::TimestampTz,
            "TINYINT" => DbType::TinyInt,
            "UUID" => DbType::Uuid,
            "JSON" | "JSONB" => DbType::Json,
            other => DbType::Other(other.to_owned()),
        }
    }
}

impl fmt::Display for DbType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DbType::BigInt => "BIGINT",
            DbType::Binary => "BINARY",
            DbType::Bool => "BOOL",
            DbType::Date => "DATE",
            DbType::Double => "DOUBLE",
            DbType::Float => "FLOAT",
            DbType::Integer => "INTEGER",
            DbType::Interval => "INTERVAL",
            DbType::Numeric => "NUMERIC",
            DbType::SmallInt => "SMALLINT",
            DbType::Text => "TEXT",
            DbType::Time => "TIME",
            DbType::Timestamp => "TIMESTAMP",
            DbType::TimestampTz => "TIMESTAMPTZ",
            DbType::TinyInt => "TINYINT",
            DbType::Uuid => "UUID",
            DbType::Json => "JSON",
            DbType::Other(s) => s,
        };
        write!(f, "{s}")
    }
}

/// A language (Rust) type tag used to key the [`crate::type_handler`]
/// registry. `Other` covers user-defined/enum types registered explicitly.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LangType {
    Bool,
    I8,
    I16,
    I32,
    I64,
    F32,
    F64,
    String,
    Bytes,
    Other(String),
}

impl LangType {
    /// Parses a `javaType="..."` attribute value (`spec.md` §6's parameter
    /// token grammar) into a `LangType`.
    pub fn parse(name: &str) -> Self {
        match name {
            "bool" | "boolean" | "Boolean" => LangType::Bool,
            "i8" | "byte" | "Byte" => LangType::I8,
            "i16" | "short" | "Short" => LangType::I16,
            "i32" | "int" | "Integer" => LangType::I32,
            "i64" | "long" | "Long" => LangType::I64,
            "f32" | "float" | "Float" => LangType::F32,
            "f64" | "double" | "Double" => LangType::F64,
            "String" | "string" | "str" => LangType::String,
            "bytes" | "Vec<u8>" | "byte[]" => LangType::Bytes,
            other => LangType::Other(other.to_owned()),
        }
    }
}

impl fmt::Display for LangType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LangType::Bool => write!(f, "bool"),
            LangType::I8 => write!(f, "i8"),
            LangType::I16 => write!(f, "i16"),
            LangType::I32 => write!(f, "i32"),
            LangType::I64 => write!(f, "i64"),
            LangType::F32 => write!(f, "f32"),
            LangType::F64 => write!(f, "f64"),
            LangType::String => write!(f, "String"),
            LangType::Bytes => write!(f, "Vec<u8>"),
            LangType::Other(s) => write!(f, "{s}"),
        }
    }
}
