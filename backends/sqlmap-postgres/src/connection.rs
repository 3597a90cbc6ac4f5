use bytes::BytesMut;
use futures_util::stream;
use sqlmap_core::backend::AsyncResult;
use sqlmap_core::connection::{DriverBind, DriverError, Row, RowStream};
use sqlmap_core::dbtype::DbType;
use sqlmap_core::sql::AnsiTransactionManager;
use sqlmap_core::value::Value;
use tokio_postgres::types::{IsNull, ToSql, Type};
use tokio_postgres::{Client, NoTls};

use crate::Pg;

/// The configuration needed to establish a connection; re-exported so
/// callers don't need a direct `tokio-postgres` dependency just to build
/// one (mirrors the teacher's `asphalt_postgres::ConnectionConfig` alias).
pub type ConnectionConfig = tokio_postgres::Config;

/// A PostgreSQL [`RawConnection`](sqlmap_core::connection::RawConnection).
/// Establishes a plain (non-TLS) connection and spawns the driver's
/// background I/O task, matching the teacher's `PgRawConnection::connect`
/// (`asphalt-postgres/src/connection.rs`) — TLS (the teacher's optional
/// `tls` feature, via `rustls`/`tokio-postgres-rustls`) isn't carried over
/// here since neither crate is in the workspace dependency table; see
/// `DESIGN.md`.
pub struct PgConnection {
    client: Client,
    manager: AnsiTransactionManager,
}

impl sqlmap_core::connection::RawConnection for PgConnection {
    type Backend = Pg;
    type TransactionManager = AnsiTransactionManager;
    type Row = PgRow;
    type Config = ConnectionConfig;

    fn establish(config: &Self::Config) -> AsyncResult<'_, Result<Self, DriverError>> {
        Box::pin(async move {
            let (client, connection) = config.connect(NoTls).await.map_err(|e| Box::new(e) as DriverError)?;
            tokio::spawn(async move {
                if let Err(error) = connection.await {
                    tracing::error!(%error, "postgres connection task failed");
                }
            });
            Ok(Self { client, manager: AnsiTransactionManager::default() })
        })
    }

    fn transaction_manager(&self) -> &Self::TransactionManager {
        &self.manager
    }

    fn simple_execute(&self, sql: &str) -> AsyncResult<'_, Result<(), DriverError>> {
        Box::pin(async move { self.client.batch_execute(sql).await.map_err(|e| Box::new(e) as DriverError) })
    }

    fn execute<'c>(&'c self, sql: &'c str, binds: &'c [DriverBind]) -> AsyncResult<'c, Result<u64, DriverError>> {
        Box::pin(async move {
            let params = to_pg_params(binds);
            self.client.execute(sql, &params_refs(&params)).await.map_err(|e| Box::new(e) as DriverError)
        })
    }

    fn query<'c>(&'c self, sql: &'c str, binds: &'c [DriverBind]) -> AsyncResult<'c, Result<RowStream<'c, Self>, DriverError>> {
        Box::pin(async move {
            let params = to_pg_params(binds);
            let rows = self.client.query(sql, &params_refs(&params)).await.map_err(|e| Box::new(e) as DriverError)?;
            let rows: Vec<Result<PgRow, DriverError>> = rows.into_iter().map(|inner| Ok(PgRow { inner })).collect();
            Ok(Box::pin(stream::iter(rows)) as RowStream<'c, Self>)
        })
    }

    fn execute_returning_keys<'c>(
        &'c self,
        sql: &'c str,
        binds: &'c [DriverBind],
        key_columns: &'c [String],
    ) -> AsyncResult<'c, Result<(u64, Vec<Self::Row>), DriverError>> {
        Box::pin(async move {
            let params = to_pg_params(binds);
            let sql_with_returning = if key_columns.is_empty() {
                sql.to_owned()
            } else {
                let quoted: Vec<String> = key_columns.iter().map(|c| <Pg as sqlmap_core::backend::Backend>::quote_identifier(c)).collect();
                format!("{sql} RETURNING {}", quoted.join(", "))
            };
            let rows = self
                .client
                .query(&sql_with_returning, &params_refs(&params))
                .await
                .map_err(|e| Box::new(e) as DriverError)?;
            let affected = rows.len() as u64;
            Ok((affected, rows.into_iter().map(|inner| PgRow { inner }).collect()))
        })
    }
}

/// One bound parameter wrapped for `tokio-postgres`'s `ToSql`, dispatching
/// on [`Value`]'s variant and the column type Postgres reports wanting
/// (mirrors the teacher's `PgParam`, `asphalt-postgres/src/query.rs`, but
/// encoding straight from a [`Value`] instead of through a pre-serialized
/// byte buffer, since this runtime's [`DriverBind`] is already a resolved
/// value rather than a type-directed `ToSql` call).
struct PgParam<'a>(&'a DriverBind);

fn to_pg_params(binds: &[DriverBind]) -> Vec<PgParam<'_>> {
    binds.iter().map(PgParam).collect()
}

fn params_refs<'a>(params: &'a [PgParam<'a>]) -> Vec<&'a (dyn ToSql + Sync)> {
    params.iter().map(|p| p as &(dyn ToSql + Sync)).collect()
}

impl ToSql for PgParam<'_> {
    fn to_sql(&self, ty: &Type, out: &mut BytesMut) -> Result<IsNull, Box<dyn std::error::Error + Sync + Send>> {
        match &self.0.value {
            Value::Null => Ok(IsNull::Yes),
            Value::Bool(b) => b.to_sql(ty, out),
            Value::I64(v) => match *ty {
                Type::INT2 => (*v as i16).to_sql(ty, out),
                Type::INT4 => (*v as i32).to_sql(ty, out),
                _ => v.to_sql(ty, out),
            },
            Value::F64(v) => match *ty {
                Type::FLOAT4 => (*v as f32).to_sql(ty, out),
                _ => v.to_sql(ty, out),
            },
            Value::Str(s) => {
                if *ty == Type::UUID {
                    uuid::Uuid::parse_str(s)?.to_sql(ty, out)
                } else {
                    s.to_sql(ty, out)
                }
            }
            Value::Bytes(b) => b.to_sql(ty, out),
            Value::Array(_) | Value::Object(_) => {
                Err("sqlmap-postgres: composite parameter values are not supported".into())
            }
        }
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    tokio_postgres::types::to_sql_checked!();
}

/// One result-set row (mirrors the teacher's `PgRow`,
/// `asphalt-postgres/src/connection.rs`), decoding straight to [`Value`]
/// instead of through a type-parameterized `FromSql` call — the
/// [`TypeHandler`](sqlmap_core::type_handler::TypeHandler) layer above this
/// does the application-facing conversion.
pub struct PgRow {
    inner: tokio_postgres::Row,
}

impl Row for PgRow {
    fn n_columns(&self) -> usize {
        self.inner.len()
    }

    fn column_name(&self, idx: usize) -> &str {
        self.inner.columns()[idx].name()
    }

    fn column_db_type(&self, idx: usize) -> Option<DbType> {
        Some(pg_type_to_db_type(self.inner.columns()[idx].type_()))
    }

    fn get_value(&self, idx: usize) -> Value {
        decode_column(&self.inner, idx)
    }
}

/// Decodes column `idx` into a [`Value`], covering the scalar set the
/// teacher's own `delegate_to_pgtosql!`/`delegate_to_pgfromsql!` macros
/// support (`asphalt-postgres/src/types.rs`) — bool, integers, floats,
/// text, bytea, uuid. Anything else falls back to a best-effort text read,
/// same scope limitation the teacher has (no temporal-type support without
/// pulling in `chrono`/`time`, which isn't in this workspace either).
fn decode_column(row: &tokio_postgres::Row, idx: usize) -> Value {
    let ty = row.columns()[idx].type_().clone();
    if ty == Type::BOOL {
        return row.try_get::<_, Option<bool>>(idx).ok().flatten().map(Value::Bool).unwrap_or(Value::Null);
    }
    if ty == Type::INT2 {
        return row.try_get::<_, Option<i16>>(idx).ok().flatten().map(|v| Value::I64(v as i64)).unwrap_or(Value::Null);
    }
    if ty == Type::INT4 {
        return row.try_get::<_, Option<i32>>(idx).ok().flatten().map(|v| Value::I64(v as i64)).unwrap_or(Value::Null);
    }
    if ty == Type::INT8 {
        return row.try_get::<_, Option<i64>>(idx).ok().flatten().map(Value::I64).unwrap_or(Value::Null);
    }
    if ty == Type::FLOAT4 {
        return row.try_get::<_, Option<f32>>(idx).ok().flatten().map(|v| Value::F64(v as f64)).unwrap_or(Value::Null);
    }
    if ty == Type::FLOAT8 {
        return row.try_get::<_, Option<f64>>(idx).ok().flatten().map(Value::F64).unwrap_or(Value::Null);
    }
    if ty == Type::BYTEA {
        return row.try_get::<_, Option<Vec<u8>>>(idx).ok().flatten().map(Value::Bytes).unwrap_or(Value::Null);
    }
    if ty == Type::UUID {
        return row.try_get::<_, Option<uuid::Uuid>>(idx).ok().flatten().map(|u| Value::Str(u.to_string())).unwrap_or(Value::Null);
    }
    row.try_get::<_, Option<String>>(idx).ok().flatten().map(Value::Str).unwrap_or(Value::Null)
}

fn pg_type_to_db_type(ty: &Type) -> DbType {
    if *ty == Type::BOOL {
        DbType::Bool
    } else if *ty == Type::INT2 {
        DbType::SmallInt
    } else if *ty == Type::INT4 {
        DbType::Integer
    } else if *ty == Type::INT8 {
        DbType::BigInt
    } else if *ty == Type::FLOAT4 {
        DbType::Float
    } else if *ty == Type::FLOAT8 {
        DbType::Double
    } else if *ty == Type::NUMERIC {
        DbType::Numeric
    } else if *ty == Type::BYTEA {
        DbType::Binary
    } else if *ty == Type::UUID {
        DbType::Uuid
    } else if *ty == Type::DATE {
        DbType::Date
    } else if *ty == Type::TIME {
        DbType::Time
    } else if *ty == Type::TIMESTAMP {
        DbType::Timestamp
    } else if *ty == Type::TIMESTAMPTZ {
        DbType::TimestampTz
    } else if *ty == Type::JSON || *ty == Type::JSONB {
        DbType::Json
    } else if *ty == Type::TEXT || *ty == Type::VARCHAR || *ty == Type::BPCHAR {
        DbType::Text
    } else {
        DbType::Other(ty.name().to_owned())
    }
}
