//! [`AnsiTransactionManager`], the [`TransactionManager`] implementation for
//! backends using the ANSI `BEGIN`/`SAVEPOINT`/`COMMIT`/`ROLLBACK` syntax
//! (PostgreSQL, SQLite, ...).
//!
//! Ported from `asphalt_core::sql::AnsiTransactionManager`: same
//! depth/broken bookkeeping via atomics, same savepoint naming scheme. Two
//! differences from the teacher: errors are wrapped into
//! [`ExecutorError::Transaction`] instead of the teacher's `QueryResult`, and
//! a failed commit always attempts the matching rollback rather than only on
//! a serialization-failure/read-only-transaction `ErrorKind` match — this
//! runtime's [`DriverError`](crate::connection::DriverError) is an opaque
//! boxed error with no such classification, so the safer unconditional retry
//! is used instead.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

use futures_util::future::BoxFuture;

use crate::connection::{IsolationLevel, RawConnection, TransactionConfig, TransactionManager};
use crate::error::ExecutorError;

/// An implementation of [`TransactionManager`] for backends which use the
/// ANSI syntax for transactions and savepoints, such as PostgreSQL and
/// SQLite.
#[derive(Debug, Default)]
pub struct AnsiTransactionManager {
    depth: AtomicU8,
    broken: AtomicBool,
}

impl AnsiTransactionManager {
    fn current_depth(&self) -> u8 {
        self.depth.load(Ordering::Acquire)
    }

    fn increment_depth(&self, result: Result<(), ExecutorError>) -> Result<(), ExecutorError> {
        if result.is_ok() {
            self.depth.fetch_add(1, Ordering::Relaxed);
        }
        result
    }

    fn decrement_depth(&self, result: Result<(), ExecutorError>) -> Result<(), ExecutorError> {
        if result.is_ok() {
            self.depth.fetch_sub(1, Ordering::Relaxed);
        }
        result
    }

    fn set_broken(&self) {
        self.broken.store(true, Ordering::Release);
    }

    fn first_transaction(config: TransactionConfig) -> String {
        let mut stmt = String::from("BEGIN");

        if config.read_only == Some(true) {
            stmt.push_str(" READ ONLY");
        }

        if let Some(lvl) = config.isolation {
            stmt.push_str(" ISOLATION LEVEL ");
            stmt.push_str(match lvl {
                IsolationLevel::ReadCommitted => "READ COMMITTED",
                IsolationLevel::RepeatableRead => "REPEATABLE READ",
                IsolationLevel::Serializable => "SERIALIZABLE",
            });
        }

        stmt
    }
}

async fn simple<Conn: RawConnection>(conn: &Conn, stmt: &str) -> Result<(), ExecutorError> {
    conn.simple_execute(stmt).await.map_err(ExecutorError::Transaction)
}

impl<Conn> TransactionManager<Conn> for AnsiTransactionManager
where
    Conn: RawConnection,
{
    fn begin_transaction<'c>(
        &'c self,
        config: TransactionConfig,
        conn: &'c Conn,
    ) -> BoxFuture<'c, Result<(), ExecutorError>> {
        Box::pin(async move {
            let depth = self.current_depth();

            let stmt = if depth == 0 {
                Self::first_transaction(config)
            } else {
                format!("SAVEPOINT sqlmap_savepoint_{}", depth)
            };

            let res = simple(conn, &stmt).await;
            self.increment_depth(res)
        })
    }

    fn commit_transaction<'c>(&'c self, conn: &'c Conn) -> BoxFuture<'c, Result<(), ExecutorError>> {
        Box::pin(async move {
            let depth = self.current_depth();
            match depth {
                0 => panic!("tried to commit with no transaction opened"),
                1 => match simple(conn, "COMMIT").await {
                    Err(err) => {
                        if let Err(rollback_err) = self.decrement_depth(simple(conn, "ROLLBACK").await) {
                            self.set_broken();
                            return Err(rollback_err);
                        }
                        Err(err)
                    }
                    ok => self.decrement_depth(ok),
                },
                _ => {
                    let stmt = format!("RELEASE SAVEPOINT sqlmap_savepoint_{}", depth - 1);
                    self.decrement_depth(simple(conn, &stmt).await)
                }
            }
        })
    }

    fn rollback_transaction<'c>(&'c self, conn: &'c Conn) -> BoxFuture<'c, Result<(), ExecutorError>> {
        Box::pin(async move {
            let depth = self.current_depth();
            match depth {
                0 => panic!("tried to rollback with no transaction opened"),
                1 => self.decrement_depth(simple(conn, "ROLLBACK").await),
                _ => {
                    let stmt = format!("ROLLBACK TO SAVEPOINT sqlmap_savepoint_{}", depth - 1);
                    self.decrement_depth(simple(conn, &stmt).await)
                }
            }
        })
    }

    fn is_broken(&self) -> bool {
        self.broken.load(Ordering::Relaxed)
    }
}
